//! Security metadata carried on envelopes and handshake frames.
//!
//! Structure only: nothing here signs, verifies, encrypts or decrypts.

use serde::{Deserialize, Serialize};

/// AEAD cipher named by `SecureOpen` when the sender does not pick one.
pub const DEFAULT_CHANNEL_ALG: &str = "CHACHA20P1305";

/// Placeholder written in place of `sec` when serializing for logs.
pub const REDACTED: &str = "<redacted>";

/// Envelope signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureHeader {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,
    pub val: String,
}

/// Envelope-level encryption parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptionHeader {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alg: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,
    pub val: String,
}

/// The `sec` envelope field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityHeader {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sig: Option<SignatureHeader>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enc: Option<EncryptionHeader>,
}

/// How a node proves its signing identity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SigningMaterial {
    /// A bare public key.
    #[default]
    RawKey,
    /// A certificate chain.
    X509Chain,
}

/// Security settings a child requests in `NodeHello` and a parent enforces in
/// `NodeWelcome`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecuritySettings {
    #[serde(default)]
    pub signing_material: SigningMaterial,
}
