//! Wire contract for the FAME agent-messaging fabric.
//!
//! This crate defines how participants are addressed, how envelopes and
//! frames are shaped and validated, and the configuration that tunes their
//! defaults. It performs no I/O.
//!
//! ## Layout
//!
//! - **address**: `participant@host/path` parsing, formatting, validation
//! - **frame**: the closed, `type`-tagged set of protocol frames
//! - **envelope**: the validated message envelope and its wire codec
//! - **field_names**: the camelCase/snake_case interop table
//! - **config**: `~/.fame/config.toml` loading

pub mod address;
pub mod binary;
pub mod config;
pub mod envelope;
pub mod error;
pub mod field_names;
pub mod flags;
pub mod frame;
pub mod id;
pub mod meta;
pub mod security;
pub mod serde_compat;
pub mod stickiness;

pub use address::{
    format_address, format_address_from_components, parse_address, parse_address_components,
    Address,
};
pub use envelope::{create_envelope, Envelope, EnvelopeFactory, EnvelopeInit, SerializeOptions};
pub use error::{AddressError, EnvelopeError, FameError, FameResult, FrameError};
pub use flags::{FlowFlags, ResponseType};
pub use frame::Frame;
pub use id::{DefaultIdGenerator, IdGenerator};
