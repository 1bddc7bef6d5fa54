//! The connector lifecycle state machine.
//!
//! A [`Connector`] owns a [`Transport`] and guards every call into it:
//!
//! ```text
//! UNKNOWN --initialize--> INITIALIZED --start--> STARTED --stop--> STOPPED
//!                              |                    ^                 |
//!                              |                    +------start------+
//!                              +-------close-------> CLOSED <--close--+
//! ```
//!
//! Lifecycle operations take `&mut self`, so one instance has one writer.
//! Hosts that share a connector wrap it in `tokio::sync::Mutex`.

use crate::error::{BoxError, ConnectorError, ConnectorResult, SharedError};
use crate::state::ConnectorState;
use async_trait::async_trait;
use fame_core::Envelope;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Receives envelopes delivered to a started connector.
#[async_trait]
pub trait EnvelopeHandler: Send + Sync {
    async fn handle(&self, envelope: Envelope) -> Result<(), BoxError>;
}

struct FnHandler<F>(F);

#[async_trait]
impl<F, Fut> EnvelopeHandler for FnHandler<F>
where
    F: Fn(Envelope) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), BoxError>> + Send,
{
    async fn handle(&self, envelope: Envelope) -> Result<(), BoxError> {
        (self.0)(envelope).await
    }
}

/// Wrap an async closure as an [`EnvelopeHandler`].
pub fn handler_fn<F, Fut>(f: F) -> Arc<dyn EnvelopeHandler>
where
    F: Fn(Envelope) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
{
    Arc::new(FnHandler(f))
}

/// Who the transport authenticated on the other end.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizationContext {
    pub authenticated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub principal: Option<String>,
    #[serde(default)]
    pub scopes: Vec<String>,
    #[serde(default)]
    pub claims: serde_json::Map<String, serde_json::Value>,
}

impl AuthorizationContext {
    pub fn has_scope(&self, scope: &str) -> bool {
        self.scopes.iter().any(|s| s == scope)
    }
}

/// Transport-specific behavior plugged into a [`Connector`].
///
/// Every hook has a no-op default except [`Transport::transmit`]. Hooks run
/// only after the connector has checked the transition is legal; a hook
/// error aborts the transition.
#[async_trait]
pub trait Transport: Send {
    async fn on_initialize(&mut self) -> Result<(), BoxError> {
        Ok(())
    }

    async fn on_start(&mut self, _handler: Arc<dyn EnvelopeHandler>) -> Result<(), BoxError> {
        Ok(())
    }

    async fn on_stop(&mut self) -> Result<(), BoxError> {
        Ok(())
    }

    /// Release transport resources. Called at most once per connector.
    async fn on_close(
        &mut self,
        _code: Option<u16>,
        _reason: Option<&str>,
    ) -> Result<(), BoxError> {
        Ok(())
    }

    async fn on_handler_replaced(
        &mut self,
        _old: Option<Arc<dyn EnvelopeHandler>>,
        _new: Arc<dyn EnvelopeHandler>,
    ) -> Result<(), BoxError> {
        Ok(())
    }

    /// Observe a traffic error after it has been recorded.
    fn on_error(&mut self, _error: &(dyn std::error::Error + Send + Sync + 'static)) {}

    /// Put one envelope on the wire.
    async fn transmit(&mut self, envelope: &Envelope) -> Result<(), BoxError>;

    async fn receive(&mut self, _timeout: Option<Duration>) -> Result<Option<Envelope>, BoxError> {
        Ok(None)
    }

    async fn acknowledge(&mut self, _id: &str) -> Result<(), BoxError> {
        Ok(())
    }
}

/// A transport wrapped in the guarded lifecycle.
pub struct Connector<T: Transport> {
    transport: T,
    state: ConnectorState,
    last_error: Option<SharedError>,
    close_code: Option<u16>,
    close_reason: Option<String>,
    authorization: Option<AuthorizationContext>,
    handler: Option<Arc<dyn EnvelopeHandler>>,
    entered: bool,
}

impl<T: Transport> Connector<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            state: ConnectorState::Unknown,
            last_error: None,
            close_code: None,
            close_reason: None,
            authorization: None,
            handler: None,
            entered: false,
        }
    }

    pub fn state(&self) -> ConnectorState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state.is_active()
    }

    pub fn is_inactive(&self) -> bool {
        self.state.is_inactive()
    }

    pub fn can_start(&self) -> bool {
        self.state.can_start()
    }

    pub fn can_stop(&self) -> bool {
        self.state.can_stop()
    }

    pub fn can_close(&self) -> bool {
        self.state.can_close()
    }

    /// The most recent traffic error, if any.
    pub fn last_error(&self) -> Option<&SharedError> {
        self.last_error.as_ref()
    }

    pub fn close_code(&self) -> Option<u16> {
        self.close_code
    }

    pub fn close_reason(&self) -> Option<&str> {
        self.close_reason.as_deref()
    }

    pub fn authorization(&self) -> Option<&AuthorizationContext> {
        self.authorization.as_ref()
    }

    pub fn set_authorization(&mut self, context: AuthorizationContext) {
        debug!(
            authenticated = context.authenticated,
            principal = context.principal.as_deref().unwrap_or(""),
            "Authorization context attached"
        );
        self.authorization = Some(context);
    }

    pub fn handler(&self) -> Option<&Arc<dyn EnvelopeHandler>> {
        self.handler.as_ref()
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    fn transition(&mut self, next: ConnectorState) {
        debug!(from = %self.state, to = %next, "Connector state transition");
        self.state = next;
    }

    /// UNKNOWN -> INITIALIZED.
    pub async fn initialize(&mut self) -> ConnectorResult<()> {
        if self.state != ConnectorState::Unknown {
            return Err(ConnectorError::InvalidTransition {
                operation: "initialize",
                state: self.state,
            });
        }
        self.transport
            .on_initialize()
            .await
            .map_err(|source| ConnectorError::Hook {
                hook: "initialize",
                source,
            })?;
        self.transition(ConnectorState::Initialized);
        Ok(())
    }

    /// INITIALIZED or STOPPED -> STARTED, installing `handler`.
    pub async fn start(&mut self, handler: Arc<dyn EnvelopeHandler>) -> ConnectorResult<()> {
        if !self.state.can_start() {
            return Err(ConnectorError::InvalidTransition {
                operation: "start",
                state: self.state,
            });
        }
        self.transport
            .on_start(Arc::clone(&handler))
            .await
            .map_err(|source| ConnectorError::Hook {
                hook: "start",
                source,
            })?;
        self.handler = Some(handler);
        self.transition(ConnectorState::Started);
        info!("Connector started");
        Ok(())
    }

    /// STARTED -> STOPPED. The handler is kept for a later restart.
    pub async fn stop(&mut self) -> ConnectorResult<()> {
        if !self.state.can_stop() {
            return Err(ConnectorError::InvalidTransition {
                operation: "stop",
                state: self.state,
            });
        }
        self.transport
            .on_stop()
            .await
            .map_err(|source| ConnectorError::Hook {
                hook: "stop",
                source,
            })?;
        self.transition(ConnectorState::Stopped);
        Ok(())
    }

    /// Close the connector. Closing an already closed connector does nothing
    /// and keeps the first code and reason.
    pub async fn close(
        &mut self,
        code: Option<u16>,
        reason: Option<String>,
    ) -> ConnectorResult<()> {
        if self.state == ConnectorState::Closed {
            debug!("Connector already closed");
            return Ok(());
        }
        if !self.state.can_close() {
            return Err(ConnectorError::InvalidTransition {
                operation: "close",
                state: self.state,
            });
        }
        self.transport
            .on_close(code, reason.as_deref())
            .await
            .map_err(|source| ConnectorError::Hook {
                hook: "close",
                source,
            })?;
        self.close_code = code;
        self.close_reason = reason;
        self.transition(ConnectorState::Closed);
        info!(
            code = code.unwrap_or_default(),
            reason = self.close_reason.as_deref().unwrap_or(""),
            "Connector closed"
        );
        Ok(())
    }

    /// Swap the active handler in any state.
    pub async fn replace_handler(
        &mut self,
        handler: Arc<dyn EnvelopeHandler>,
    ) -> ConnectorResult<()> {
        let old = self.handler.clone();
        self.transport
            .on_handler_replaced(old, Arc::clone(&handler))
            .await
            .map_err(|source| ConnectorError::Hook {
                hook: "handler_replaced",
                source,
            })?;
        self.handler = Some(handler);
        debug!(state = %self.state, "Envelope handler replaced");
        Ok(())
    }

    fn ensure_active(&self, operation: &'static str) -> ConnectorResult<()> {
        if self.state.is_active() {
            Ok(())
        } else {
            Err(ConnectorError::NotActive {
                operation,
                state: self.state,
            })
        }
    }

    /// Store `error` as the last error and hand it to the transport.
    pub fn record_error(&mut self, error: BoxError) -> SharedError {
        let shared: SharedError = Arc::from(error);
        warn!(error = %shared, state = %self.state, "Connector traffic error");
        self.transport.on_error(shared.as_ref());
        self.last_error = Some(Arc::clone(&shared));
        shared
    }

    fn traffic_error(&mut self, error: BoxError) -> ConnectorError {
        ConnectorError::Traffic(self.record_error(error))
    }

    /// Transmit an envelope through the transport.
    pub async fn send(&mut self, envelope: &Envelope) -> ConnectorResult<()> {
        self.ensure_active("send")?;
        match self.transport.transmit(envelope).await {
            Ok(()) => Ok(()),
            Err(e) => Err(self.traffic_error(e)),
        }
    }

    /// Deliver an inbound envelope to the active handler.
    pub async fn dispatch(&mut self, envelope: Envelope) -> ConnectorResult<()> {
        self.ensure_active("dispatch")?;
        let Some(handler) = self.handler.clone() else {
            return Err(ConnectorError::NotActive {
                operation: "dispatch",
                state: self.state,
            });
        };
        match handler.handle(envelope).await {
            Ok(()) => Ok(()),
            Err(e) => Err(self.traffic_error(e)),
        }
    }

    /// Pull at most one envelope from the transport, dispatch it, then
    /// acknowledge it. Returns whether an envelope was processed.
    pub async fn receive_once(&mut self, timeout: Option<Duration>) -> ConnectorResult<bool> {
        self.ensure_active("receive")?;
        let envelope = match self.transport.receive(timeout).await {
            Ok(Some(envelope)) => envelope,
            Ok(None) => return Ok(false),
            Err(e) => return Err(self.traffic_error(e)),
        };
        let id = envelope.id().to_string();
        self.dispatch(envelope).await?;
        match self.transport.acknowledge(&id).await {
            Ok(()) => Ok(true),
            Err(e) => Err(self.traffic_error(e)),
        }
    }

    /// Run `body` against this connector, then close it whatever the body
    /// returned.
    ///
    /// If the body fails and close fails too, the close error is returned as
    /// [`ConnectorError::TeardownFailed`] with the body error as its source.
    pub async fn scoped<F, R>(&mut self, body: F) -> ConnectorResult<R>
    where
        F: for<'a> FnOnce(&'a mut Self) -> BoxFuture<'a, Result<R, BoxError>>,
    {
        if self.entered {
            return Err(ConnectorError::AlreadyEntered);
        }
        self.entered = true;

        let outcome = body(self).await;
        let teardown = if self.state.can_close() {
            self.close(None, None).await
        } else {
            Ok(())
        };
        self.entered = false;

        match (outcome, teardown) {
            (Ok(value), Ok(())) => Ok(value),
            (Ok(_), Err(teardown)) => Err(teardown),
            (Err(cause), Ok(())) => Err(ConnectorError::Body(cause)),
            (Err(cause), Err(teardown)) => {
                warn!(error = %teardown, cause = %cause, "Teardown failed after body failure");
                Err(ConnectorError::TeardownFailed {
                    teardown: Box::new(teardown),
                    cause,
                })
            }
        }
    }

    /// Whether [`Connector::scoped`] is currently running.
    pub fn is_entered(&self) -> bool {
        self.entered
    }
}

impl<T: Transport> std::fmt::Debug for Connector<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connector")
            .field("state", &self.state)
            .field("has_handler", &self.handler.is_some())
            .field("last_error", &self.last_error.as_ref().map(|e| e.to_string()))
            .field("close_code", &self.close_code)
            .field("close_reason", &self.close_reason)
            .finish()
    }
}
