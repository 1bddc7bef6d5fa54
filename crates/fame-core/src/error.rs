//! Shared error types for the FAME wire contract.
//!
//! Each concern has its own enum so callers can tell which invariant failed
//! without parsing messages. [`FameError`] wraps them all for code that does
//! not care which layer rejected the input.

use thiserror::Error;

/// Address syntax errors. Every variant carries the offending substring.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AddressError {
    /// The raw address has no `@` delimiter.
    #[error("Missing '@' in address: {0}")]
    MissingDelimiter(String),

    /// The participant does not match `[A-Za-z0-9_-]+`.
    #[error("Bad participant: {0}")]
    BadParticipant(String),

    /// Nothing follows the `@` delimiter.
    #[error("Empty location in address: {0}")]
    EmptyLocation(String),

    /// Neither a host nor a path was supplied when composing an address.
    #[error("Address for participant '{0}' needs a host or a path")]
    MissingLocation(String),

    /// A host contains an empty dot-separated segment.
    #[error("Empty host segment in: {0}")]
    EmptyHostSegment(String),

    /// A `*` host segment appears anywhere but index 0.
    #[error("Wildcard must be leftmost segment: {0}")]
    WildcardNotLeftmost(String),

    /// A host segment contains characters outside `[A-Za-z0-9-]`.
    #[error("Bad host segment: {0}")]
    BadHostSegment(String),

    /// A path segment contains `*`.
    #[error("Wildcards not allowed in path segments: {0}")]
    WildcardInPath(String),

    /// A path segment contains characters outside `[A-Za-z0-9._-]`.
    #[error("Bad segment: {0}")]
    BadPathSegment(String),
}

/// Frame schema errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    /// The frame object has no `type` discriminant.
    #[error("Missing frame type")]
    MissingType,

    /// The `type` discriminant names no known frame.
    #[error("Unknown frame type: {0}")]
    UnknownType(String),

    /// A binary field is not valid base64.
    #[error("{field} is not valid base64: {reason}")]
    InvalidBase64 {
        /// Wire name of the field.
        field: &'static str,
        /// Decoder message.
        reason: String,
    },

    /// A binary field decoded to the wrong number of bytes.
    #[error("{field} must decode to exactly {expected} bytes, got {actual}")]
    InvalidLength {
        /// Wire name of the field.
        field: &'static str,
        /// Required byte length.
        expected: usize,
        /// Decoded byte length.
        actual: usize,
    },

    /// The frame body does not fit the schema selected by its discriminant.
    #[error("Invalid {frame_type} frame: {reason}")]
    Schema {
        /// The discriminant that selected the schema.
        frame_type: String,
        /// What did not fit.
        reason: String,
    },
}

/// Envelope schema errors.
#[derive(Error, Debug)]
pub enum EnvelopeError {
    /// `flowFlags` carries bits outside SYN|ACK|RESET.
    /// Carries the value as sent.
    #[error("FlowFlags contains unsupported bits: {0}")]
    UnsupportedFlowFlags(String),

    /// `rtype` carries bits outside ACK|REPLY|STREAM.
    #[error("ResponseType contains unsupported bits: {0}")]
    UnsupportedResponseType(String),

    /// A table field arrived under both its camelCase and snake_case names.
    #[error("Field given as both {camel} and {snake}")]
    ConflictingField {
        camel: &'static str,
        snake: &'static str,
    },

    /// `ts` could not be coerced to a timestamp.
    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),

    /// A `meta` entry is outside the flat value grammar.
    #[error("Invalid meta value for key '{key}': {reason}")]
    InvalidMeta {
        /// The offending meta key.
        key: String,
        /// Why the value was rejected.
        reason: String,
    },

    /// The envelope has no frame.
    #[error("Envelope requires a frame")]
    MissingFrame,

    /// An address field failed validation.
    #[error(transparent)]
    Address(#[from] AddressError),

    /// The embedded frame failed validation.
    #[error(transparent)]
    Frame(#[from] FrameError),

    /// The envelope object does not fit the schema.
    #[error("Invalid envelope: {0}")]
    Schema(String),

    /// JSON encoding failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The id generator failed.
    #[error("Id generation failed: {0}")]
    IdGeneration(String),
}

/// Top-level error type for the wire contract.
#[derive(Error, Debug)]
pub enum FameError {
    /// An address failed to parse or format.
    #[error(transparent)]
    Address(#[from] AddressError),

    /// A frame failed validation.
    #[error(transparent)]
    Frame(#[from] FrameError),

    /// An envelope failed validation.
    #[error(transparent)]
    Envelope(#[from] EnvelopeError),

    /// A configuration error occurred.
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Alias for Result with FameError.
pub type FameResult<T> = Result<T, FameError>;
