//! Length-checked base64 fields.
//!
//! Frames carry key material and nonces as standard base64 text. These
//! newtypes keep the text form for the wire but refuse any value that does
//! not decode to the required byte length.

use crate::error::FrameError;
use base64::Engine;
use serde::{Deserialize, Serialize};

fn decode_exact(field: &'static str, text: &str, expected: usize) -> Result<Vec<u8>, FrameError> {
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(text)
        .map_err(|e| FrameError::InvalidBase64 {
            field,
            reason: e.to_string(),
        })?;
    if bytes.len() != expected {
        return Err(FrameError::InvalidLength {
            field,
            expected,
            actual: bytes.len(),
        });
    }
    Ok(bytes)
}

/// A 96-bit AEAD nonce (`nonce` on `Data` frames).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Nonce(String);

impl Nonce {
    pub const LEN: usize = 12;

    /// Accept a base64 nonce that decodes to exactly 12 bytes.
    pub fn from_base64(text: &str) -> Result<Self, FrameError> {
        decode_exact("nonce", text, Self::LEN)?;
        Ok(Self(text.to_string()))
    }

    pub fn from_bytes(bytes: [u8; Self::LEN]) -> Self {
        Self(base64::engine::general_purpose::STANDARD.encode(bytes))
    }

    pub fn as_base64(&self) -> &str {
        &self.0
    }

    pub fn to_bytes(&self) -> [u8; Self::LEN] {
        let mut out = [0u8; Self::LEN];
        if let Ok(bytes) = decode_exact("nonce", &self.0, Self::LEN) {
            out.copy_from_slice(&bytes);
        }
        out
    }
}

impl TryFrom<String> for Nonce {
    type Error = FrameError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_base64(&value)
    }
}

impl From<Nonce> for String {
    fn from(nonce: Nonce) -> Self {
        nonce.0
    }
}

/// An X25519-class ephemeral public key (`ephPub` on secure-channel frames).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EphemeralPublicKey(String);

impl EphemeralPublicKey {
    pub const LEN: usize = 32;

    /// Accept a base64 key that decodes to exactly 32 bytes.
    pub fn from_base64(text: &str) -> Result<Self, FrameError> {
        decode_exact("ephPub", text, Self::LEN)?;
        Ok(Self(text.to_string()))
    }

    pub fn from_bytes(bytes: [u8; Self::LEN]) -> Self {
        Self(base64::engine::general_purpose::STANDARD.encode(bytes))
    }

    pub fn as_base64(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for EphemeralPublicKey {
    type Error = FrameError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_base64(&value)
    }
}

impl From<EphemeralPublicKey> for String {
    fn from(key: EphemeralPublicKey) -> Self {
        key.0
    }
}
