//! Transport-agnostic channels and their address bindings.
//!
//! A channel declares what it can do by returning itself from the matching
//! `as_*` accessor on [`Channel`]. Callers test for a capability by asking,
//! never by downcasting.

use crate::error::ChannelError;
use async_trait::async_trait;
use fame_core::{Address, Envelope};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// A channel that can be read from.
#[async_trait]
pub trait ReadChannel: Send + Sync {
    /// Wait up to `timeout` for the next envelope. `Ok(None)` means nothing
    /// was available, not a failure.
    async fn receive(&self, timeout: Option<Duration>) -> Result<Option<Envelope>, ChannelError>;

    /// Confirm that the envelope with `id` has been processed.
    async fn acknowledge(&self, id: &str) -> Result<(), ChannelError>;
}

/// A channel that can be written to.
#[async_trait]
pub trait WriteChannel: Send + Sync {
    async fn send(&self, envelope: Envelope) -> Result<(), ChannelError>;
}

/// A channel holding a resource that must be released.
#[async_trait]
pub trait CloseChannel: Send + Sync {
    async fn close(&self) -> Result<(), ChannelError>;
}

/// Base trait for every channel; reports its capabilities.
pub trait Channel: Send + Sync {
    fn as_readable(&self) -> Option<&dyn ReadChannel> {
        None
    }

    fn as_writable(&self) -> Option<&dyn WriteChannel> {
        None
    }

    fn as_closable(&self) -> Option<&dyn CloseChannel> {
        None
    }

    fn can_read(&self) -> bool {
        self.as_readable().is_some()
    }

    fn can_write(&self) -> bool {
        self.as_writable().is_some()
    }
}

/// A channel paired with the address it serves.
pub struct Binding<C: Channel + ?Sized> {
    channel: Arc<C>,
    address: Address,
}

impl<C: Channel + ?Sized> Binding<C> {
    pub fn new(channel: Arc<C>, address: Address) -> Self {
        Self { channel, address }
    }

    pub fn channel(&self) -> &Arc<C> {
        &self.channel
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    /// Close the channel if it can be closed; otherwise do nothing.
    pub async fn close(&self) -> Result<(), ChannelError> {
        match self.channel.as_closable() {
            Some(closable) => {
                debug!(address = %self.address, "Closing bound channel");
                closable.close().await
            }
            None => Ok(()),
        }
    }
}

impl<C: Channel + ?Sized> Clone for Binding<C> {
    fn clone(&self) -> Self {
        Self {
            channel: Arc::clone(&self.channel),
            address: self.address.clone(),
        }
    }
}

impl<C: Channel + ?Sized> std::fmt::Debug for Binding<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Binding")
            .field("address", &format_args!("{}", self.address))
            .field("can_read", &self.channel.can_read())
            .field("can_write", &self.channel.can_write())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct WriteOnly;

    #[async_trait]
    impl WriteChannel for WriteOnly {
        async fn send(&self, _envelope: Envelope) -> Result<(), ChannelError> {
            Ok(())
        }
    }

    impl Channel for WriteOnly {
        fn as_writable(&self) -> Option<&dyn WriteChannel> {
            Some(self)
        }
    }

    #[derive(Default)]
    struct Closable {
        closes: AtomicUsize,
    }

    #[async_trait]
    impl CloseChannel for Closable {
        async fn close(&self) -> Result<(), ChannelError> {
            self.closes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    impl Channel for Closable {
        fn as_closable(&self) -> Option<&dyn CloseChannel> {
            Some(self)
        }
    }

    fn addr() -> Address {
        Address::parse("svc@/inbox").unwrap()
    }

    #[test]
    fn test_capability_detection() {
        let ch = WriteOnly;
        assert!(ch.can_write());
        assert!(!ch.can_read());
        assert!(ch.as_closable().is_none());
    }

    #[tokio::test]
    async fn test_close_is_noop_without_capability() {
        let binding = Binding::new(Arc::new(WriteOnly), addr());
        binding.close().await.unwrap();
        assert_eq!(binding.address().to_string(), "svc@/inbox");
    }

    #[tokio::test]
    async fn test_close_delegates() {
        let ch = Arc::new(Closable::default());
        let binding = Binding::new(Arc::clone(&ch), addr());
        binding.close().await.unwrap();
        assert_eq!(ch.closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_dyn_channel_binding() {
        let ch: Arc<dyn Channel> = Arc::new(Closable::default());
        let binding = Binding::new(ch, addr());
        assert!(binding.close().await.is_ok());
        assert!(format!("{binding:?}").contains("svc@/inbox"));
    }
}
