//! Session-affinity negotiation carried by `NodeAttach` / `NodeAttachAck`.
//!
//! The child advertises a preferred mode and the modes it supports; the
//! parent answers with the policy actually in force. When the two sides share
//! no mode the answer is a disabled payload, never an error.

use serde::{Deserialize, Serialize};

/// Affinity mechanisms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StickinessMode {
    /// Signed affinity token carried in the envelope `aft` field.
    Aft,
    /// Routing on envelope attributes.
    Attr,
}

fn default_version() -> u32 {
    1
}

/// The `stickiness` negotiation payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stickiness {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<StickinessMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supported_modes: Option<Vec<StickinessMode>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl_sec: Option<u64>,
    #[serde(default = "default_version")]
    pub version: u32,
}

impl Default for Stickiness {
    fn default() -> Self {
        Self {
            mode: None,
            supported_modes: None,
            enabled: None,
            ttl_sec: None,
            version: default_version(),
        }
    }
}

/// What a parent is willing to enforce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StickinessPolicy {
    pub enabled: bool,
    /// Accepted modes in the parent's order of preference.
    pub modes: Vec<StickinessMode>,
    pub ttl_sec: Option<u64>,
}

impl Stickiness {
    /// A child's offer.
    pub fn offer(preferred: StickinessMode, supported: Vec<StickinessMode>) -> Self {
        Self {
            mode: Some(preferred),
            supported_modes: Some(supported),
            enabled: Some(true),
            ..Self::default()
        }
    }

    /// The payload a parent sends when affinity is off.
    pub fn disabled() -> Self {
        Self {
            enabled: Some(false),
            ..Self::default()
        }
    }

    /// Whether this payload describes an agreed, active affinity policy.
    pub fn is_active(&self) -> bool {
        self.enabled == Some(true) && self.mode.is_some()
    }

    /// Answer this offer with `policy`.
    ///
    /// The child's preferred mode wins when the parent accepts it; otherwise
    /// the parent's most preferred mode among those the child supports.
    /// No common mode yields [`Stickiness::disabled`].
    pub fn negotiate(&self, policy: &StickinessPolicy) -> Stickiness {
        if !policy.enabled || self.enabled == Some(false) {
            return Self::disabled();
        }
        let child_modes: Vec<StickinessMode> = match (&self.supported_modes, self.mode) {
            (Some(modes), _) if !modes.is_empty() => modes.clone(),
            (_, Some(mode)) => vec![mode],
            _ => Vec::new(),
        };

        let chosen = self
            .mode
            .filter(|m| policy.modes.contains(m) && child_modes.contains(m))
            .or_else(|| {
                policy
                    .modes
                    .iter()
                    .copied()
                    .find(|m| child_modes.contains(m))
            });

        match chosen {
            Some(mode) => Stickiness {
                mode: Some(mode),
                supported_modes: None,
                enabled: Some(true),
                ttl_sec: policy.ttl_sec,
                version: self.version,
            },
            None => Self::disabled(),
        }
    }
}
