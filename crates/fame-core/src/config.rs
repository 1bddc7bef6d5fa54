//! Configuration loading from `~/.fame/config.toml` with defaults.
//!
//! Every field has a default, so a partial file (or none at all) still
//! yields a complete [`FabricConfig`].

use crate::binary::EphemeralPublicKey;
use crate::error::{FameError, FameResult};
use crate::frame::SecureOpenFrame;
use crate::id::IdMode;
use crate::security::{SecuritySettings, SigningMaterial, DEFAULT_CHANNEL_ALG};
use crate::stickiness::{StickinessMode, StickinessPolicy};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Envelope version stamped when the caller supplies none.
pub const ENVELOPE_VERSION: &str = "1.0";

/// Envelope construction defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvelopeConfig {
    pub version: String,
    pub id_mode: IdMode,
}

impl Default for EnvelopeConfig {
    fn default() -> Self {
        Self {
            version: ENVELOPE_VERSION.to_string(),
            id_mode: IdMode::Random,
        }
    }
}

/// Secure-channel defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    pub default_alg: String,
    pub signing_material: SigningMaterial,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            default_alg: DEFAULT_CHANNEL_ALG.to_string(),
            signing_material: SigningMaterial::RawKey,
        }
    }
}

impl SecurityConfig {
    /// The settings this node requests or enforces during the mesh handshake.
    pub fn settings(&self) -> SecuritySettings {
        SecuritySettings {
            signing_material: self.signing_material,
        }
    }

    /// A `SecureOpen` for channel `cid` using the configured cipher.
    pub fn secure_open(
        &self,
        cid: impl Into<String>,
        eph_pub: EphemeralPublicKey,
    ) -> SecureOpenFrame {
        SecureOpenFrame {
            alg: self.default_alg.clone(),
            ..SecureOpenFrame::new(cid, eph_pub)
        }
    }
}

/// Affinity policy a node enforces on its children.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StickinessConfig {
    pub enabled: bool,
    pub modes: Vec<StickinessMode>,
    pub ttl_sec: Option<u64>,
}

impl Default for StickinessConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            modes: vec![StickinessMode::Aft, StickinessMode::Attr],
            ttl_sec: None,
        }
    }
}

impl From<&StickinessConfig> for StickinessPolicy {
    fn from(cfg: &StickinessConfig) -> Self {
        Self {
            enabled: cfg.enabled,
            modes: cfg.modes.clone(),
            ttl_sec: cfg.ttl_sec,
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FabricConfig {
    pub envelope: EnvelopeConfig,
    pub security: SecurityConfig,
    pub stickiness: StickinessConfig,
}

/// Default config location: `~/.fame/config.toml`.
pub fn default_config_path() -> PathBuf {
    dirs::home_dir()
        .map(|h| h.join(".fame"))
        .unwrap_or_else(|| PathBuf::from("."))
        .join("config.toml")
}

/// Parse configuration from TOML text.
pub fn parse_config(text: &str) -> FameResult<FabricConfig> {
    toml::from_str(text).map_err(|e| FameError::Config(e.to_string()))
}

/// Load configuration from `path` (or the default location).
///
/// A missing, unreadable or malformed file logs and falls back to defaults.
pub fn load_config(path: Option<&Path>) -> FabricConfig {
    let config_path = path
        .map(|p| p.to_path_buf())
        .unwrap_or_else(default_config_path);

    if !config_path.exists() {
        info!(
            path = %config_path.display(),
            "Config file not found, using defaults"
        );
        return FabricConfig::default();
    }

    match std::fs::read_to_string(&config_path) {
        Ok(contents) => match parse_config(&contents) {
            Ok(config) => {
                info!(path = %config_path.display(), "Loaded configuration");
                config
            }
            Err(e) => {
                warn!(
                    error = %e,
                    path = %config_path.display(),
                    "Failed to parse config, using defaults"
                );
                FabricConfig::default()
            }
        },
        Err(e) => {
            warn!(
                error = %e,
                path = %config_path.display(),
                "Failed to read config file, using defaults"
            );
            FabricConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let cfg = FabricConfig::default();
        assert_eq!(cfg.envelope.version, "1.0");
        assert_eq!(cfg.envelope.id_mode, IdMode::Random);
        assert_eq!(cfg.security.default_alg, DEFAULT_CHANNEL_ALG);
        assert!(!cfg.stickiness.enabled);
    }

    #[test]
    fn test_partial_file() {
        let cfg = parse_config(
            r#"
            [envelope]
            id_mode = "fingerprint"

            [stickiness]
            enabled = true
            modes = ["attr"]
            ttl_sec = 60
            "#,
        )
        .unwrap();
        assert_eq!(cfg.envelope.version, "1.0");
        assert_eq!(cfg.envelope.id_mode, IdMode::Fingerprint);
        let policy = StickinessPolicy::from(&cfg.stickiness);
        assert!(policy.enabled);
        assert_eq!(policy.modes, vec![StickinessMode::Attr]);
        assert_eq!(policy.ttl_sec, Some(60));
    }

    #[test]
    fn test_security_helpers() {
        let cfg = parse_config("[security]\ndefault_alg = \"AES256GCM\"").unwrap();
        let open = cfg
            .security
            .secure_open("c1", EphemeralPublicKey::from_bytes([3u8; 32]));
        assert_eq!(open.alg, "AES256GCM");
        assert_eq!(open.cid, "c1");
        assert_eq!(cfg.security.settings().signing_material, SigningMaterial::RawKey);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[security]\nsigning_material = \"x509-chain\"").unwrap();
        let cfg = load_config(Some(file.path()));
        assert_eq!(cfg.security.signing_material, SigningMaterial::X509Chain);
    }

    #[test]
    fn test_malformed_file_falls_back() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[envelope\nversion = ").unwrap();
        assert_eq!(load_config(Some(file.path())), FabricConfig::default());
    }

    #[test]
    fn test_missing_file_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = load_config(Some(&dir.path().join("absent.toml")));
        assert_eq!(cfg, FabricConfig::default());
    }
}
