//! Integration tests for the connector lifecycle.
//!
//! A recording transport captures every hook call, and an in-memory channel
//! built on tokio mpsc carries envelopes through a real `ChannelTransport`.
//! Everything runs in-process.

use async_trait::async_trait;
use fame_connector::{
    handler_fn, Binding, BoxError, Channel, ChannelError, ChannelTransport, CloseChannel,
    Connector, ConnectorError, ConnectorState, EnvelopeHandler, ReadChannel, Transport,
    WriteChannel,
};
use fame_core::frame::DataFrame;
use fame_core::{create_envelope, Address, Envelope, EnvelopeInit};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_test::{assert_err, assert_ok};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn envelope(payload: &str) -> Envelope {
    create_envelope(EnvelopeInit::new(DataFrame::new(serde_json::json!(payload)))).unwrap()
}

// ---------------------------------------------------------------------------
// Recording transport: logs hook calls, optionally fails chosen hooks
// ---------------------------------------------------------------------------

#[derive(Default)]
struct RecordingTransport {
    calls: Arc<Mutex<Vec<String>>>,
    fail_start: bool,
    fail_close: bool,
    fail_transmit: bool,
    errors: Arc<Mutex<Vec<String>>>,
}

impl RecordingTransport {
    fn new() -> (Self, Arc<Mutex<Vec<String>>>) {
        let transport = Self::default();
        let calls = Arc::clone(&transport.calls);
        (transport, calls)
    }

    fn record(&self, call: &str) {
        self.calls.lock().unwrap().push(call.to_string());
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn on_initialize(&mut self) -> Result<(), BoxError> {
        self.record("initialize");
        Ok(())
    }

    async fn on_start(&mut self, _handler: Arc<dyn EnvelopeHandler>) -> Result<(), BoxError> {
        if self.fail_start {
            return Err("Start refused".into());
        }
        self.record("start");
        Ok(())
    }

    async fn on_stop(&mut self) -> Result<(), BoxError> {
        self.record("stop");
        Ok(())
    }

    async fn on_close(
        &mut self,
        code: Option<u16>,
        reason: Option<&str>,
    ) -> Result<(), BoxError> {
        if self.fail_close {
            return Err("Teardown failed".into());
        }
        self.record(&format!(
            "close:{}:{}",
            code.unwrap_or_default(),
            reason.unwrap_or("")
        ));
        Ok(())
    }

    async fn on_handler_replaced(
        &mut self,
        old: Option<Arc<dyn EnvelopeHandler>>,
        _new: Arc<dyn EnvelopeHandler>,
    ) -> Result<(), BoxError> {
        self.record(&format!("replace:{}", old.is_some()));
        Ok(())
    }

    fn on_error(&mut self, error: &(dyn std::error::Error + Send + Sync + 'static)) {
        self.errors.lock().unwrap().push(error.to_string());
    }

    async fn transmit(&mut self, _envelope: &Envelope) -> Result<(), BoxError> {
        if self.fail_transmit {
            return Err("Transmit failed".into());
        }
        self.record("transmit");
        Ok(())
    }
}

fn noop() -> Arc<dyn EnvelopeHandler> {
    handler_fn(|_env| async { Ok(()) })
}

// ---------------------------------------------------------------------------
// In-memory channel over tokio mpsc
// ---------------------------------------------------------------------------

struct MemoryChannel {
    tx: mpsc::Sender<Envelope>,
    rx: tokio::sync::Mutex<mpsc::Receiver<Envelope>>,
    acked: Mutex<Vec<String>>,
    closes: AtomicUsize,
}

impl MemoryChannel {
    fn new() -> Arc<Self> {
        let (tx, rx) = mpsc::channel(16);
        Arc::new(Self {
            tx,
            rx: tokio::sync::Mutex::new(rx),
            acked: Mutex::new(Vec::new()),
            closes: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl ReadChannel for MemoryChannel {
    async fn receive(&self, timeout: Option<Duration>) -> Result<Option<Envelope>, ChannelError> {
        let mut rx = self.rx.lock().await;
        match timeout {
            Some(limit) => match tokio::time::timeout(limit, rx.recv()).await {
                Ok(envelope) => Ok(envelope),
                Err(_) => Ok(None),
            },
            None => Ok(rx.recv().await),
        }
    }

    async fn acknowledge(&self, id: &str) -> Result<(), ChannelError> {
        self.acked.lock().unwrap().push(id.to_string());
        Ok(())
    }
}

#[async_trait]
impl WriteChannel for MemoryChannel {
    async fn send(&self, envelope: Envelope) -> Result<(), ChannelError> {
        self.tx.send(envelope).await.map_err(|_| ChannelError::Closed)
    }
}

#[async_trait]
impl CloseChannel for MemoryChannel {
    async fn close(&self) -> Result<(), ChannelError> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

impl Channel for MemoryChannel {
    fn as_readable(&self) -> Option<&dyn ReadChannel> {
        Some(self)
    }

    fn as_writable(&self) -> Option<&dyn WriteChannel> {
        Some(self)
    }

    fn as_closable(&self) -> Option<&dyn CloseChannel> {
        Some(self)
    }
}

/// Read-only channel with no close capability.
struct SinkOnly;

#[async_trait]
impl ReadChannel for SinkOnly {
    async fn receive(&self, _timeout: Option<Duration>) -> Result<Option<Envelope>, ChannelError> {
        Ok(None)
    }

    async fn acknowledge(&self, _id: &str) -> Result<(), ChannelError> {
        Ok(())
    }
}

impl Channel for SinkOnly {
    fn as_readable(&self) -> Option<&dyn ReadChannel> {
        Some(self)
    }
}

fn inbox() -> Address {
    Address::parse("agent@/inbox").unwrap()
}

// ---------------------------------------------------------------------------
// Lifecycle guard table
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_lifecycle_guard_table() {
    init_tracing();
    let (transport, calls) = RecordingTransport::new();
    let mut conn = Connector::new(transport);

    let err = assert_err!(conn.start(noop()).await);
    assert_eq!(err.to_string(), "Cannot start connector from state: UNKNOWN");
    assert_eq!(conn.state(), ConnectorState::Unknown);

    assert_ok!(conn.initialize().await);
    assert_ok!(conn.start(noop()).await);
    assert_eq!(conn.state(), ConnectorState::Started);
    assert!(conn.is_active());

    let err = assert_err!(conn.start(noop()).await);
    assert_eq!(err.to_string(), "Cannot start connector from state: STARTED");

    assert_ok!(conn.stop().await);
    assert_eq!(conn.state(), ConnectorState::Stopped);
    assert!(conn.is_inactive());

    let err = assert_err!(conn.stop().await);
    assert_eq!(err.to_string(), "Cannot stop connector from state: STOPPED");

    assert_ok!(conn.start(noop()).await);
    assert_eq!(conn.state(), ConnectorState::Started);

    assert_ok!(conn.close(Some(1000), Some("done".to_string())).await);
    assert_eq!(conn.state(), ConnectorState::Closed);

    let err = assert_err!(conn.start(noop()).await);
    assert_eq!(err.to_string(), "Cannot start connector from state: CLOSED");

    assert_eq!(
        *calls.lock().unwrap(),
        vec!["initialize", "start", "stop", "start", "close:1000:done"]
    );
}

#[tokio::test]
async fn test_close_from_initialized_and_stopped() {
    let mut conn = Connector::new(RecordingTransport::default());
    conn.initialize().await.unwrap();
    assert_ok!(conn.close(None, None).await);
    assert_eq!(conn.state(), ConnectorState::Closed);

    let mut conn = Connector::new(RecordingTransport::default());
    conn.initialize().await.unwrap();
    conn.start(noop()).await.unwrap();
    conn.stop().await.unwrap();
    assert_ok!(conn.close(None, None).await);
    assert_eq!(conn.state(), ConnectorState::Closed);
}

#[tokio::test]
async fn test_close_is_idempotent() {
    let (transport, calls) = RecordingTransport::new();
    let mut conn = Connector::new(transport);
    conn.initialize().await.unwrap();
    conn.start(noop()).await.unwrap();

    conn.close(Some(1000), Some("normal".to_string()))
        .await
        .unwrap();
    conn.close(Some(4000), Some("again".to_string()))
        .await
        .unwrap();

    assert_eq!(conn.close_code(), Some(1000));
    assert_eq!(conn.close_reason(), Some("normal"));
    let closes = calls
        .lock()
        .unwrap()
        .iter()
        .filter(|c| c.starts_with("close"))
        .count();
    assert_eq!(closes, 1);
}

#[tokio::test]
async fn test_failing_hook_leaves_state_unchanged() {
    let transport = RecordingTransport {
        fail_start: true,
        ..Default::default()
    };
    let mut conn = Connector::new(transport);
    conn.initialize().await.unwrap();

    let err = conn.start(noop()).await.unwrap_err();
    assert!(matches!(err, ConnectorError::Hook { hook: "start", .. }));
    assert!(err.to_string().contains("Start refused"));
    assert_eq!(conn.state(), ConnectorState::Initialized);
    assert!(conn.handler().is_none());
}

// ---------------------------------------------------------------------------
// Traffic errors and handlers
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_traffic_error_recorded_without_state_change() {
    let transport = RecordingTransport {
        fail_transmit: true,
        ..Default::default()
    };
    let errors = Arc::clone(&transport.errors);
    let mut conn = Connector::new(transport);
    conn.initialize().await.unwrap();
    conn.start(noop()).await.unwrap();

    let err = conn.send(&envelope("hello")).await.unwrap_err();
    assert!(matches!(err, ConnectorError::Traffic(_)));
    assert_eq!(conn.state(), ConnectorState::Started);
    assert_eq!(
        conn.last_error().map(|e| e.to_string()),
        Some("Transmit failed".to_string())
    );
    assert_eq!(*errors.lock().unwrap(), vec!["Transmit failed"]);
}

#[tokio::test]
async fn test_handler_failure_recorded() {
    let mut conn = Connector::new(RecordingTransport::default());
    conn.initialize().await.unwrap();
    conn.start(handler_fn(|_env| async { Err::<(), BoxError>("handler blew up".into()) }))
        .await
        .unwrap();

    assert_err!(conn.dispatch(envelope("x")).await);
    assert_eq!(conn.state(), ConnectorState::Started);
    assert_eq!(
        conn.last_error().map(|e| e.to_string()),
        Some("handler blew up".to_string())
    );
}

#[tokio::test]
async fn test_replace_handler_notifies_transport() {
    let (transport, calls) = RecordingTransport::new();
    let mut conn = Connector::new(transport);

    // Allowed before start; there is no previous handler yet.
    conn.replace_handler(noop()).await.unwrap();
    conn.initialize().await.unwrap();
    conn.start(noop()).await.unwrap();

    let seen = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&seen);
    conn.replace_handler(handler_fn(move |_env| {
        let counter = Arc::clone(&counter);
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }))
    .await
    .unwrap();

    conn.dispatch(envelope("routed")).await.unwrap();
    assert_eq!(seen.load(Ordering::SeqCst), 1);
    assert_eq!(conn.state(), ConnectorState::Started);

    let calls = calls.lock().unwrap();
    assert_eq!(calls.first().map(String::as_str), Some("replace:false"));
    assert_eq!(calls.last().map(String::as_str), Some("replace:true"));
}

// ---------------------------------------------------------------------------
// Scoped lifecycle
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_scoped_closes_after_success() {
    let (transport, calls) = RecordingTransport::new();
    let mut conn = Connector::new(transport);

    let value = conn
        .scoped(|c| {
            Box::pin(async move {
                c.initialize().await?;
                c.start(noop()).await?;
                c.send(&envelope("ping")).await?;
                Ok::<_, BoxError>(7)
            })
        })
        .await
        .unwrap();

    assert_eq!(value, 7);
    assert_eq!(conn.state(), ConnectorState::Closed);
    assert!(!conn.is_entered());
    assert_eq!(calls.lock().unwrap().last().map(String::as_str), Some("close:0:"));
}

#[tokio::test]
async fn test_scoped_closes_after_body_failure() {
    let mut conn = Connector::new(RecordingTransport::default());
    conn.initialize().await.unwrap();

    let err = conn
        .scoped(|c| {
            Box::pin(async move {
                c.start(noop()).await?;
                Err::<(), BoxError>("Body failed".into())
            })
        })
        .await
        .unwrap_err();

    assert!(matches!(err, ConnectorError::Body(_)));
    assert!(err.to_string().contains("Body failed"));
    assert_eq!(conn.state(), ConnectorState::Closed);
}

#[tokio::test]
async fn test_teardown_failure_chains_body_failure() {
    init_tracing();
    let transport = RecordingTransport {
        fail_close: true,
        ..Default::default()
    };
    let mut conn = Connector::new(transport);
    conn.initialize().await.unwrap();

    let err = conn
        .scoped(|c| {
            Box::pin(async move {
                c.start(noop()).await?;
                Err::<(), BoxError>("Body failed".into())
            })
        })
        .await
        .unwrap_err();

    assert!(matches!(err, ConnectorError::TeardownFailed { .. }));
    assert!(err.to_string().contains("Teardown failed"));
    let cause = std::error::Error::source(&err).expect("body failure is the source");
    assert_eq!(cause.to_string(), "Body failed");
    assert_eq!(conn.state(), ConnectorState::Started);
}

#[tokio::test]
async fn test_scoped_rejects_reentry() {
    let mut conn = Connector::new(RecordingTransport::default());
    conn.initialize().await.unwrap();

    let nested = conn
        .scoped(|c| {
            Box::pin(async move {
                let inner = c.scoped(|_| Box::pin(async { Ok::<(), BoxError>(()) })).await;
                Ok::<_, BoxError>(inner.map_err(|e| e.to_string()))
            })
        })
        .await
        .unwrap();

    assert_eq!(
        nested,
        Err("Connector lifecycle already entered".to_string())
    );
    assert_eq!(conn.state(), ConnectorState::Closed);
}

// ---------------------------------------------------------------------------
// Channel-backed transport
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_channel_transport_round_trip() {
    init_tracing();
    let channel = MemoryChannel::new();
    let binding = Binding::new(Arc::clone(&channel), inbox());
    let mut conn = Connector::new(ChannelTransport::new(binding));

    let (seen_tx, mut seen_rx) = mpsc::unbounded_channel();
    conn.initialize().await.unwrap();
    conn.start(handler_fn(move |env: Envelope| {
        let seen_tx = seen_tx.clone();
        async move {
            seen_tx.send(env.id().to_string())?;
            Ok::<(), BoxError>(())
        }
    }))
    .await
    .unwrap();

    let outbound = envelope("loopback");
    conn.send(&outbound).await.unwrap();

    let processed = conn
        .receive_once(Some(Duration::from_millis(200)))
        .await
        .unwrap();
    assert!(processed);
    assert_eq!(seen_rx.recv().await, Some(outbound.id().to_string()));
    assert_eq!(*channel.acked.lock().unwrap(), vec![outbound.id().to_string()]);

    let idle = conn
        .receive_once(Some(Duration::from_millis(20)))
        .await
        .unwrap();
    assert!(!idle);

    conn.close(None, None).await.unwrap();
    conn.close(None, None).await.unwrap();
    assert_eq!(channel.closes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_channel_transport_without_write_capability() {
    let binding = Binding::new(Arc::new(SinkOnly), inbox());
    let mut conn = Connector::new(ChannelTransport::new(binding));
    conn.initialize().await.unwrap();
    conn.start(noop()).await.unwrap();

    let err = conn.send(&envelope("nowhere")).await.unwrap_err();
    assert_eq!(
        err.to_string(),
        "Connector traffic error: Channel is not writable"
    );
    assert_eq!(conn.state(), ConnectorState::Started);

    // No close capability: close still succeeds.
    assert_ok!(conn.close(None, None).await);
    assert_eq!(conn.transport().address().to_string(), "agent@/inbox");
}

#[tokio::test]
async fn test_dyn_channel_binding_close_delegates() {
    let channel = MemoryChannel::new();
    let dyn_channel: Arc<dyn Channel> = Arc::clone(&channel) as Arc<dyn Channel>;
    let binding = Binding::new(dyn_channel, inbox());
    assert_ok!(binding.close().await);
    assert_eq!(channel.closes.load(Ordering::SeqCst), 1);

    let sink = Binding::new(Arc::new(SinkOnly) as Arc<dyn Channel>, inbox());
    assert_ok!(sink.close().await);
}
