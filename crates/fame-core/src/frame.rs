//! The closed set of typed payloads an envelope carries.
//!
//! Frames are discriminated by the `type` field on the wire. Every
//! acknowledgement frame flattens a [`DeliveryAckFrame`] into itself, so any
//! ack can be inspected through [`Frame::delivery_ack`] without matching on
//! the concrete variant.
//!
//! Structural checks (field presence, enum values) happen during
//! deserialization; [`Frame::validate`] adds the semantic checks, and
//! [`Frame::from_value`] runs both plus a readable discriminant check.

use crate::address::Address;
use crate::binary::{EphemeralPublicKey, Nonce};
use crate::error::FrameError;
use crate::security::{SecuritySettings, DEFAULT_CHANNEL_ALG};
use crate::stickiness::Stickiness;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A JSON Web Key as exchanged in key-distribution frames.
pub type Jwk = Map<String, Value>;

fn default_true() -> bool {
    true
}

fn default_alg() -> String {
    DEFAULT_CHANNEL_ALG.to_string()
}

// ---------------------------------------------------------------------------
// Delivery acknowledgement
// ---------------------------------------------------------------------------

/// ACK/NACK signal, correlated through `refId`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryAckFrame {
    #[serde(default = "default_true")]
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ref_id: Option<String>,
}

impl Default for DeliveryAckFrame {
    fn default() -> Self {
        Self {
            ok: true,
            code: None,
            reason: None,
            ref_id: None,
        }
    }
}

impl DeliveryAckFrame {
    /// A positive acknowledgement of `ref_id`.
    pub fn ack(ref_id: impl Into<String>) -> Self {
        Self {
            ref_id: Some(ref_id.into()),
            ..Self::default()
        }
    }

    /// A negative acknowledgement of `ref_id`.
    pub fn nack(
        ref_id: impl Into<String>,
        code: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            ok: false,
            code: Some(code.into()),
            reason: Some(reason.into()),
            ref_id: Some(ref_id.into()),
        }
    }
}

// ---------------------------------------------------------------------------
// Address binding
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressBindFrame {
    pub address: Address,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encryption_key_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub physical_path: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressBindAckFrame {
    #[serde(flatten)]
    pub ack: DeliveryAckFrame,
    pub address: Address,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encryption_key_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub physical_path: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressUnbindFrame {
    pub address: Address,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressUnbindAckFrame {
    #[serde(flatten)]
    pub ack: DeliveryAckFrame,
    pub address: Address,
}

// ---------------------------------------------------------------------------
// Liveness
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeHeartbeatFrame {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<Address>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeHeartbeatAckFrame {
    #[serde(flatten)]
    pub ack: DeliveryAckFrame,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<Address>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub routing_epoch: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
}

// ---------------------------------------------------------------------------
// Payload
// ---------------------------------------------------------------------------

/// How a `Data` payload is encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Codec {
    Json,
    B64,
}

/// Generic payload carrier. Channel-encrypted payloads carry `cid` and a
/// 12-byte `nonce`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataFrame {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub codec: Option<Codec>,
    #[serde(default)]
    pub payload: Value,
    /// Payload digest.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pd: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<Nonce>,
}

impl DataFrame {
    pub fn new(payload: Value) -> Self {
        Self {
            payload,
            ..Self::default()
        }
    }

    /// A payload sealed under secure channel `cid`.
    pub fn encrypted(cid: impl Into<String>, nonce: Nonce, ciphertext_b64: String) -> Self {
        Self {
            codec: Some(Codec::B64),
            payload: Value::String(ciphertext_b64),
            cid: Some(cid.into()),
            nonce: Some(nonce),
            ..Self::default()
        }
    }

    pub fn is_encrypted(&self) -> bool {
        self.cid.is_some()
    }
}

// ---------------------------------------------------------------------------
// Mesh handshake
// ---------------------------------------------------------------------------

/// A parent-issued permission to open a connection of some kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionGrant {
    #[serde(rename = "type")]
    pub kind: String,
    pub purpose: String,
    #[serde(flatten)]
    pub params: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeHelloFrame {
    pub system_id: String,
    pub instance_id: String,
    #[serde(default)]
    pub logicals: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capabilities: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supported_transports: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region_hint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub security_settings: Option<SecuritySettings>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeWelcomeFrame {
    pub system_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_system_id: Option<String>,
    pub instance_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_physical_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accepted_capabilities: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accepted_logicals: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejected_logicals: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection_grants: Option<Vec<ConnectionGrant>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub security_settings: Option<SecuritySettings>,
}

/// Direction of an attachment relative to the node receiving it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OriginType {
    #[default]
    Downstream,
    Upstream,
    Peer,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeAttachFrame {
    #[serde(default)]
    pub origin_type: OriginType,
    pub system_id: String,
    pub instance_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capabilities: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accepted_logicals: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keys: Option<Vec<Jwk>>,
    /// Grants the parent may use to open reverse connections.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub callback_grants: Option<Vec<ConnectionGrant>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stickiness: Option<Stickiness>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeAttachAckFrame {
    #[serde(flatten)]
    pub ack: DeliveryAckFrame,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_system_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_physical_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub routing_epoch: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keys: Option<Vec<Jwk>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    /// The affinity policy actually in force.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stickiness: Option<Stickiness>,
}

// ---------------------------------------------------------------------------
// Capability routing
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityAdvertiseFrame {
    pub capabilities: Vec<String>,
    pub address: Address,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityAdvertiseAckFrame {
    #[serde(flatten)]
    pub ack: DeliveryAckFrame,
    pub capabilities: Vec<String>,
    pub address: Address,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityWithdrawFrame {
    pub capabilities: Vec<String>,
    pub address: Address,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityWithdrawAckFrame {
    #[serde(flatten)]
    pub ack: DeliveryAckFrame,
    pub capabilities: Vec<String>,
    pub address: Address,
}

// ---------------------------------------------------------------------------
// Key distribution
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyAnnounceFrame {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<Address>,
    pub physical_path: String,
    pub keys: Vec<Jwk>,
    #[serde(default = "Utc::now")]
    pub created: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires: Option<DateTime<Utc>>,
}

impl KeyAnnounceFrame {
    /// Announce `keys` for `physical_path`, stamped now.
    pub fn new(physical_path: impl Into<String>, keys: Vec<Jwk>) -> Self {
        Self {
            address: None,
            physical_path: physical_path.into(),
            keys,
            created: Utc::now(),
            expires: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyRequestFrame {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<Address>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub physical_path: Option<String>,
}

// ---------------------------------------------------------------------------
// Secure channel handshake
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecureOpenFrame {
    pub cid: String,
    pub eph_pub: EphemeralPublicKey,
    #[serde(default = "default_alg")]
    pub alg: String,
    #[serde(default)]
    pub opts: u32,
}

impl SecureOpenFrame {
    /// Open channel `cid` with the default cipher.
    pub fn new(cid: impl Into<String>, eph_pub: EphemeralPublicKey) -> Self {
        Self {
            cid: cid.into(),
            eph_pub,
            alg: default_alg(),
            opts: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecureAcceptFrame {
    #[serde(flatten)]
    pub ack: DeliveryAckFrame,
    pub cid: String,
    pub eph_pub: EphemeralPublicKey,
    #[serde(default = "default_alg")]
    pub alg: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecureCloseFrame {
    pub cid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

// ---------------------------------------------------------------------------
// Flow control
// ---------------------------------------------------------------------------

/// Grants `credits` more in-flight messages on `flowId`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreditUpdateFrame {
    pub flow_id: String,
    pub credits: i64,
}

// ---------------------------------------------------------------------------
// The union
// ---------------------------------------------------------------------------

macro_rules! frames {
    ($($variant:ident($body:ty)),+ $(,)?) => {
        /// Every frame the protocol knows, tagged by `type`.
        #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
        #[serde(tag = "type")]
        pub enum Frame {
            $($variant($body),)+
        }

        impl Frame {
            /// Every accepted `type` discriminant.
            pub const KNOWN_TYPES: &'static [&'static str] = &[$(stringify!($variant)),+];

            /// The wire discriminant of this frame.
            pub fn frame_type(&self) -> &'static str {
                match self {
                    $(Self::$variant(_) => stringify!($variant),)+
                }
            }
        }

        $(
            impl From<$body> for Frame {
                fn from(frame: $body) -> Self {
                    Self::$variant(frame)
                }
            }
        )+
    };
}

frames! {
    DeliveryAck(DeliveryAckFrame),
    AddressBind(AddressBindFrame),
    AddressBindAck(AddressBindAckFrame),
    AddressUnbind(AddressUnbindFrame),
    AddressUnbindAck(AddressUnbindAckFrame),
    NodeHeartbeat(NodeHeartbeatFrame),
    NodeHeartbeatAck(NodeHeartbeatAckFrame),
    Data(DataFrame),
    NodeHello(NodeHelloFrame),
    NodeWelcome(NodeWelcomeFrame),
    NodeAttach(NodeAttachFrame),
    NodeAttachAck(NodeAttachAckFrame),
    CapabilityAdvertise(CapabilityAdvertiseFrame),
    CapabilityAdvertiseAck(CapabilityAdvertiseAckFrame),
    CapabilityWithdraw(CapabilityWithdrawFrame),
    CapabilityWithdrawAck(CapabilityWithdrawAckFrame),
    KeyAnnounce(KeyAnnounceFrame),
    KeyRequest(KeyRequestFrame),
    SecureOpen(SecureOpenFrame),
    SecureAccept(SecureAcceptFrame),
    SecureClose(SecureCloseFrame),
    CreditUpdate(CreditUpdateFrame),
}

impl Frame {
    /// Parse and validate a frame from its JSON object form.
    pub fn from_value(value: Value) -> Result<Self, FrameError> {
        let frame_type = check_frame_type(&value)?.to_string();
        let frame: Frame = serde_json::from_value(value).map_err(|e| FrameError::Schema {
            frame_type,
            reason: e.to_string(),
        })?;
        frame.validate()?;
        Ok(frame)
    }

    /// The base acknowledgement of any ack-style frame.
    pub fn delivery_ack(&self) -> Option<&DeliveryAckFrame> {
        match self {
            Self::DeliveryAck(f) => Some(f),
            Self::AddressBindAck(f) => Some(&f.ack),
            Self::AddressUnbindAck(f) => Some(&f.ack),
            Self::NodeHeartbeatAck(f) => Some(&f.ack),
            Self::NodeAttachAck(f) => Some(&f.ack),
            Self::CapabilityAdvertiseAck(f) => Some(&f.ack),
            Self::CapabilityWithdrawAck(f) => Some(&f.ack),
            Self::SecureAccept(f) => Some(&f.ack),
            Self::AddressBind(_)
            | Self::AddressUnbind(_)
            | Self::NodeHeartbeat(_)
            | Self::Data(_)
            | Self::NodeHello(_)
            | Self::NodeWelcome(_)
            | Self::NodeAttach(_)
            | Self::CapabilityAdvertise(_)
            | Self::CapabilityWithdraw(_)
            | Self::KeyAnnounce(_)
            | Self::KeyRequest(_)
            | Self::SecureOpen(_)
            | Self::SecureClose(_)
            | Self::CreditUpdate(_) => None,
        }
    }

    /// Semantic checks that the type system does not already enforce.
    pub fn validate(&self) -> Result<(), FrameError> {
        let fail = |reason: &str| {
            Err(FrameError::Schema {
                frame_type: self.frame_type().to_string(),
                reason: reason.to_string(),
            })
        };
        match self {
            Self::Data(f) => {
                match (&f.cid, &f.nonce) {
                    (Some(cid), _) if cid.is_empty() => return fail("cid must not be empty"),
                    (Some(_), None) => return fail("encrypted payload requires nonce"),
                    (None, Some(_)) => return fail("nonce requires cid"),
                    _ => {}
                }
                if f.codec == Some(Codec::B64) && !f.payload.is_string() {
                    return fail("b64 payload must be a string");
                }
            }
            Self::NodeHello(f) => {
                if f.system_id.is_empty() || f.instance_id.is_empty() {
                    return fail("systemId and instanceId are required");
                }
            }
            Self::NodeAttach(f) => {
                if f.system_id.is_empty() || f.instance_id.is_empty() {
                    return fail("systemId and instanceId are required");
                }
            }
            Self::CapabilityAdvertise(CapabilityAdvertiseFrame { capabilities, .. })
            | Self::CapabilityWithdraw(CapabilityWithdrawFrame { capabilities, .. }) => {
                if capabilities.is_empty() {
                    return fail("capabilities must not be empty");
                }
            }
            Self::KeyRequest(f) => {
                if f.kid.is_none() && f.address.is_none() && f.physical_path.is_none() {
                    return fail("one of kid, address or physicalPath is required");
                }
            }
            Self::SecureOpen(SecureOpenFrame { cid, alg, .. })
            | Self::SecureAccept(SecureAcceptFrame { cid, alg, .. }) => {
                if cid.is_empty() {
                    return fail("cid must not be empty");
                }
                if alg.is_empty() {
                    return fail("alg must not be empty");
                }
            }
            Self::SecureClose(f) => {
                if f.cid.is_empty() {
                    return fail("cid must not be empty");
                }
            }
            Self::CreditUpdate(f) => {
                if f.flow_id.is_empty() {
                    return fail("flowId must not be empty");
                }
                if f.credits < 0 {
                    return fail("credits must not be negative");
                }
            }
            _ => {}
        }
        Ok(())
    }
}

/// Check that `value` carries a known `type` discriminant.
pub fn check_frame_type(value: &Value) -> Result<&str, FrameError> {
    let frame_type = value
        .get("type")
        .and_then(Value::as_str)
        .ok_or(FrameError::MissingType)?;
    if Frame::KNOWN_TYPES.contains(&frame_type) {
        Ok(frame_type)
    } else {
        Err(FrameError::UnknownType(frame_type.to_string()))
    }
}
