//! Errors from the connector layer.

use crate::state::ConnectorState;
use std::sync::Arc;
use thiserror::Error;

/// Error type transports and handlers report through.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// A recorded error, shared between the last-error slot and the caller.
pub type SharedError = Arc<dyn std::error::Error + Send + Sync + 'static>;

/// Errors raised by channels.
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("Channel closed")]
    Closed,
    #[error("Channel is not readable")]
    NotReadable,
    #[error("Channel is not writable")]
    NotWritable,
    #[error("Channel error: {0}")]
    Other(String),
}

/// Errors raised by the connector state machine.
#[derive(Debug, Error)]
pub enum ConnectorError {
    /// The operation is not valid from the current state.
    #[error("Cannot {operation} connector from state: {state}")]
    InvalidTransition {
        operation: &'static str,
        state: ConnectorState,
    },

    /// Traffic was offered to a connector that is not started.
    #[error("Cannot {operation} while connector is {state}")]
    NotActive {
        operation: &'static str,
        state: ConnectorState,
    },

    /// The scoped lifecycle wrapper was entered twice.
    #[error("Connector lifecycle already entered")]
    AlreadyEntered,

    /// A transport lifecycle hook failed; the state did not change.
    #[error("Connector {hook} hook failed: {source}")]
    Hook {
        hook: &'static str,
        #[source]
        source: BoxError,
    },

    /// Sending, receiving or handling an envelope failed. Already recorded as
    /// the connector's last error.
    #[error("Connector traffic error: {0}")]
    Traffic(SharedError),

    /// The body of a scoped lifecycle failed and teardown succeeded.
    #[error("Connector body failed: {0}")]
    Body(BoxError),

    /// Teardown failed while a body failure was propagating. The body
    /// failure is the `source`.
    #[error("{teardown}")]
    TeardownFailed {
        teardown: Box<ConnectorError>,
        #[source]
        cause: BoxError,
    },
}

/// Alias for connector results.
pub type ConnectorResult<T> = Result<T, ConnectorError>;
