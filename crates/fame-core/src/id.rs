//! Identifier generation for envelope and trace ids.
//!
//! Two modes: random ids for the synchronous fast path, and deterministic
//! fingerprint ids derived from caller-supplied material.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Length of generated ids, in hex characters.
pub const ID_LEN: usize = 32;

/// How an id is derived.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdMode {
    #[default]
    Random,
    Fingerprint,
}

/// Options for [`IdGenerator::generate_id_async`].
#[derive(Debug, Clone, Default)]
pub struct IdOptions {
    pub mode: IdMode,
    /// Input for fingerprint mode. Ignored in random mode.
    pub material: Vec<u8>,
}

impl IdOptions {
    pub fn fingerprint(material: impl Into<Vec<u8>>) -> Self {
        Self {
            mode: IdMode::Fingerprint,
            material: material.into(),
        }
    }
}

/// Source of envelope and trace identifiers.
#[async_trait]
pub trait IdGenerator: Send + Sync {
    /// A fresh random id.
    fn generate_id(&self) -> String;

    /// An id per `options`; may do slow work in fingerprint mode.
    async fn generate_id_async(&self, options: IdOptions) -> Result<String, String>;
}

/// uuid-backed random ids, SHA-256 fingerprints.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultIdGenerator;

/// Deterministic id over `material`.
pub fn fingerprint_id(material: &[u8]) -> String {
    let digest = Sha256::digest(material);
    let mut id = hex::encode(digest);
    id.truncate(ID_LEN);
    id
}

#[async_trait]
impl IdGenerator for DefaultIdGenerator {
    fn generate_id(&self) -> String {
        uuid::Uuid::new_v4().simple().to_string()
    }

    async fn generate_id_async(&self, options: IdOptions) -> Result<String, String> {
        match options.mode {
            IdMode::Random => Ok(self.generate_id()),
            IdMode::Fingerprint => {
                if options.material.is_empty() {
                    return Err("fingerprint mode requires material".to_string());
                }
                Ok(fingerprint_id(&options.material))
            }
        }
    }
}
