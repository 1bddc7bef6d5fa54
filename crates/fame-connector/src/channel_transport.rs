//! A [`Transport`] that moves envelopes through a bound [`Channel`].

use crate::channel::{Binding, Channel};
use crate::connector::Transport;
use crate::error::{BoxError, ChannelError};
use async_trait::async_trait;
use fame_core::{Address, Envelope};
use std::time::Duration;
use tracing::debug;

/// Drives a connector over whatever capabilities the bound channel offers.
///
/// Sending on a channel without write capability fails with
/// [`ChannelError::NotWritable`]; receiving on a channel without read
/// capability yields nothing.
pub struct ChannelTransport<C: Channel + ?Sized> {
    binding: Binding<C>,
}

impl<C: Channel + ?Sized> ChannelTransport<C> {
    pub fn new(binding: Binding<C>) -> Self {
        Self { binding }
    }

    pub fn binding(&self) -> &Binding<C> {
        &self.binding
    }

    pub fn address(&self) -> &Address {
        self.binding.address()
    }
}

#[async_trait]
impl<C: Channel + ?Sized + 'static> Transport for ChannelTransport<C> {
    async fn on_close(
        &mut self,
        code: Option<u16>,
        reason: Option<&str>,
    ) -> Result<(), BoxError> {
        debug!(
            address = %self.binding.address(),
            code = code.unwrap_or_default(),
            reason = reason.unwrap_or(""),
            "Releasing channel binding"
        );
        self.binding.close().await?;
        Ok(())
    }

    async fn transmit(&mut self, envelope: &Envelope) -> Result<(), BoxError> {
        let writer = self
            .binding
            .channel()
            .as_writable()
            .ok_or(ChannelError::NotWritable)?;
        writer.send(envelope.clone()).await?;
        Ok(())
    }

    async fn receive(&mut self, timeout: Option<Duration>) -> Result<Option<Envelope>, BoxError> {
        match self.binding.channel().as_readable() {
            Some(reader) => Ok(reader.receive(timeout).await?),
            None => Ok(None),
        }
    }

    async fn acknowledge(&mut self, id: &str) -> Result<(), BoxError> {
        if let Some(reader) = self.binding.channel().as_readable() {
            reader.acknowledge(id).await?;
        }
        Ok(())
    }
}

impl<C: Channel + ?Sized> std::fmt::Debug for ChannelTransport<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelTransport")
            .field("binding", &self.binding)
            .finish()
    }
}
