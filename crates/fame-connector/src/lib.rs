//! Channel binding and connector lifecycle for the FAME fabric.
//!
//! Transports plug into a [`Connector`], which enforces the lifecycle
//! `UNKNOWN -> INITIALIZED -> STARTED <-> STOPPED -> CLOSED`, records traffic
//! errors and swaps envelope handlers at runtime.
//!
//! ## Layout
//!
//! - **channel**: capability traits and the channel/address [`Binding`]
//! - **connector**: the guarded state machine and the [`Transport`] hooks
//! - **channel_transport**: a transport backed by a bound channel
//! - **state**: [`ConnectorState`] and its predicates

pub mod channel;
pub mod channel_transport;
pub mod connector;
pub mod error;
pub mod state;

pub use channel::{Binding, Channel, CloseChannel, ReadChannel, WriteChannel};
pub use channel_transport::ChannelTransport;
pub use connector::{handler_fn, AuthorizationContext, Connector, EnvelopeHandler, Transport};
pub use error::{BoxError, ChannelError, ConnectorError, ConnectorResult, SharedError};
pub use state::ConnectorState;
