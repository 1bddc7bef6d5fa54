//! The message envelope.
//!
//! An [`Envelope`] is only ever produced by [`EnvelopeFactory`] (or the
//! [`create_envelope`] shortcut), which fills defaults and validates every
//! field. Its fields are private, so nothing can invalidate it afterwards.
//!
//! On the wire the envelope is a JSON object. [`Envelope::to_wire`] emits
//! snake_case names for the keys in [`FIELD_NAME_TABLE`] by default;
//! [`Envelope::from_wire`] accepts either convention.
//!
//! [`FIELD_NAME_TABLE`]: crate::field_names::FIELD_NAME_TABLE

use crate::address::Address;
use crate::config::EnvelopeConfig;
use crate::error::EnvelopeError;
use crate::field_names::{find_conflict, rename_fields, FieldNaming};
use crate::flags::{FlowFlags, ResponseType};
use crate::frame::Frame;
use crate::id::{DefaultIdGenerator, IdGenerator, IdMode, IdOptions};
use crate::meta::{meta_from_json, Meta};
use crate::security::{SecurityHeader, REDACTED};
use crate::serde_compat::{parse_timestamp, timestamp_lenient_opt};
use chrono::{DateTime, Utc};
use serde::{de, Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;

/// Delivery priority hint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Normal,
    High,
    Critical,
}

/// A validated, immutable envelope.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    version: String,
    id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    sid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    trace_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    to: Option<Address>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_to: Option<Address>,
    #[serde(skip_serializing_if = "Option::is_none")]
    capabilities: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    rtype: Option<ResponseType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    corr_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    flow_id: Option<String>,
    seq_id: u64,
    flow_flags: FlowFlags,
    #[serde(skip_serializing_if = "Option::is_none")]
    ttl: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    priority: Option<Priority>,
    frame: Frame,
    ts: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    sec: Option<SecurityHeader>,
    #[serde(skip_serializing_if = "Option::is_none")]
    aft: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    meta: Option<Meta>,
}

/// Partial envelope input. Unset fields receive defaults at construction.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvelopeInit {
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub sid: Option<String>,
    #[serde(default)]
    pub trace_id: Option<String>,
    #[serde(default)]
    pub to: Option<Address>,
    #[serde(default)]
    pub reply_to: Option<Address>,
    #[serde(default)]
    pub capabilities: Option<Vec<String>>,
    #[serde(default)]
    pub rtype: Option<ResponseType>,
    #[serde(default)]
    pub corr_id: Option<String>,
    #[serde(default)]
    pub flow_id: Option<String>,
    #[serde(default)]
    pub seq_id: Option<u64>,
    #[serde(default)]
    pub flow_flags: Option<FlowFlags>,
    #[serde(default)]
    pub ttl: Option<u64>,
    #[serde(default)]
    pub priority: Option<Priority>,
    #[serde(default)]
    pub frame: Option<Frame>,
    #[serde(default, deserialize_with = "timestamp_lenient_opt")]
    pub ts: Option<DateTime<Utc>>,
    #[serde(default)]
    pub sec: Option<SecurityHeader>,
    #[serde(default)]
    pub aft: Option<String>,
    #[serde(default)]
    pub meta: Option<Meta>,
}

impl EnvelopeInit {
    /// Input carrying just `frame`.
    pub fn new(frame: impl Into<Frame>) -> Self {
        Self {
            frame: Some(frame.into()),
            ..Self::default()
        }
    }

    /// Set `ts` from RFC 3339 text.
    pub fn ts_rfc3339(mut self, text: &str) -> Result<Self, EnvelopeError> {
        self.ts = Some(parse_timestamp(text).map_err(EnvelopeError::InvalidTimestamp)?);
        Ok(self)
    }

    /// Set `meta` from a loosely-typed JSON object.
    pub fn meta_json(mut self, meta: Value) -> Result<Self, EnvelopeError> {
        self.meta = Some(meta_from_json(meta)?);
        Ok(self)
    }
}

/// Output options for [`Envelope::to_wire`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SerializeOptions {
    pub naming: FieldNaming,
    /// Replace `sec` with a placeholder.
    pub safe_log: bool,
}

impl SerializeOptions {
    /// Options for log output: default naming, `sec` redacted.
    pub fn safe_log() -> Self {
        Self {
            safe_log: true,
            ..Self::default()
        }
    }
}

impl Envelope {
    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn sid(&self) -> Option<&str> {
        self.sid.as_deref()
    }

    pub fn trace_id(&self) -> Option<&str> {
        self.trace_id.as_deref()
    }

    pub fn to(&self) -> Option<&Address> {
        self.to.as_ref()
    }

    pub fn reply_to(&self) -> Option<&Address> {
        self.reply_to.as_ref()
    }

    pub fn capabilities(&self) -> Option<&[String]> {
        self.capabilities.as_deref()
    }

    pub fn rtype(&self) -> Option<ResponseType> {
        self.rtype
    }

    pub fn corr_id(&self) -> Option<&str> {
        self.corr_id.as_deref()
    }

    pub fn flow_id(&self) -> Option<&str> {
        self.flow_id.as_deref()
    }

    pub fn seq_id(&self) -> u64 {
        self.seq_id
    }

    pub fn flow_flags(&self) -> FlowFlags {
        self.flow_flags
    }

    pub fn ttl(&self) -> Option<u64> {
        self.ttl
    }

    pub fn priority(&self) -> Option<Priority> {
        self.priority
    }

    pub fn frame(&self) -> &Frame {
        &self.frame
    }

    pub fn into_frame(self) -> Frame {
        self.frame
    }

    pub fn ts(&self) -> DateTime<Utc> {
        self.ts
    }

    pub fn sec(&self) -> Option<&SecurityHeader> {
        self.sec.as_ref()
    }

    pub fn aft(&self) -> Option<&str> {
        self.aft.as_deref()
    }

    pub fn meta(&self) -> Option<&Meta> {
        self.meta.as_ref()
    }

    /// Input for a response correlated with this envelope: addressed to its
    /// `replyTo`, `corrId` set to its id, same trace.
    pub fn reply_init(&self, frame: impl Into<Frame>) -> EnvelopeInit {
        EnvelopeInit {
            to: self.reply_to.clone(),
            corr_id: Some(self.id.clone()),
            trace_id: self.trace_id.clone(),
            ..EnvelopeInit::new(frame)
        }
    }

    /// Serialize to a JSON object per `options`. The envelope is untouched.
    pub fn to_wire(&self, options: SerializeOptions) -> Result<Value, EnvelopeError> {
        let Value::Object(mut object) = serde_json::to_value(self)? else {
            return Err(EnvelopeError::Schema(
                "envelope did not serialize to an object".to_string(),
            ));
        };
        if options.safe_log && object.contains_key("sec") {
            object.insert("sec".to_string(), Value::String(REDACTED.to_string()));
        }
        Ok(Value::Object(rename_fields(object, options.naming)))
    }

    /// Serialize to JSON text per `options`.
    pub fn to_wire_string(&self, options: SerializeOptions) -> Result<String, EnvelopeError> {
        Ok(serde_json::to_string(&self.to_wire(options)?)?)
    }

    /// Decode a wire object in either naming convention, filling defaults.
    pub fn from_wire(value: Value) -> Result<Self, EnvelopeError> {
        EnvelopeFactory::default().from_wire(value)
    }
}

impl<'de> Deserialize<'de> for Envelope {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Self::from_wire(value).map_err(de::Error::custom)
    }
}

/// Builds envelopes from partial input.
#[derive(Clone)]
pub struct EnvelopeFactory {
    config: EnvelopeConfig,
    ids: Arc<dyn IdGenerator>,
}

impl Default for EnvelopeFactory {
    fn default() -> Self {
        Self::new(EnvelopeConfig::default(), Arc::new(DefaultIdGenerator))
    }
}

impl std::fmt::Debug for EnvelopeFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnvelopeFactory")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl EnvelopeFactory {
    pub fn new(config: EnvelopeConfig, ids: Arc<dyn IdGenerator>) -> Self {
        Self { config, ids }
    }

    pub fn config(&self) -> &EnvelopeConfig {
        &self.config
    }

    /// Build an envelope, generating random ids where missing.
    pub fn create(&self, init: EnvelopeInit) -> Result<Envelope, EnvelopeError> {
        let id = match &init.id {
            Some(id) => id.clone(),
            None => self.ids.generate_id(),
        };
        let trace_id = match &init.trace_id {
            Some(t) => t.clone(),
            None => self.ids.generate_id(),
        };
        self.assemble(init, id, trace_id)
    }

    /// Build an envelope through the asynchronous id path.
    ///
    /// In fingerprint mode the id is derived from the envelope's routing
    /// content, so re-sending identical content reuses the same id.
    pub async fn create_async(&self, init: EnvelopeInit) -> Result<Envelope, EnvelopeError> {
        let id = match &init.id {
            Some(id) => id.clone(),
            None => {
                let options = match self.config.id_mode {
                    IdMode::Random => IdOptions::default(),
                    IdMode::Fingerprint => IdOptions::fingerprint(fingerprint_material(&init)?),
                };
                self.ids
                    .generate_id_async(options)
                    .await
                    .map_err(EnvelopeError::IdGeneration)?
            }
        };
        let trace_id = match &init.trace_id {
            Some(t) => t.clone(),
            None => self
                .ids
                .generate_id_async(IdOptions::default())
                .await
                .map_err(EnvelopeError::IdGeneration)?,
        };
        self.assemble(init, id, trace_id)
    }

    /// Decode a wire object (either naming convention) and build an envelope.
    pub fn from_wire(&self, value: Value) -> Result<Envelope, EnvelopeError> {
        let Value::Object(object) = value else {
            return Err(EnvelopeError::Schema("envelope must be an object".to_string()));
        };
        if let Some((camel, snake)) = find_conflict(&object) {
            return Err(EnvelopeError::ConflictingField { camel, snake });
        }
        let mut object = rename_fields(object, FieldNaming::Camel);
        let frame = match object.remove("frame") {
            Some(v) if !v.is_null() => Frame::from_value(v)?,
            _ => return Err(EnvelopeError::MissingFrame),
        };
        precheck_fields(&object)?;
        let mut init: EnvelopeInit = serde_json::from_value(Value::Object(object))
            .map_err(|e| EnvelopeError::Schema(e.to_string()))?;
        init.frame = Some(frame);
        self.create(init)
    }

    fn assemble(
        &self,
        init: EnvelopeInit,
        id: String,
        trace_id: String,
    ) -> Result<Envelope, EnvelopeError> {
        let frame = init.frame.ok_or(EnvelopeError::MissingFrame)?;
        frame.validate()?;
        if id.is_empty() {
            return Err(EnvelopeError::Schema("id must not be empty".to_string()));
        }
        if let Some(caps) = &init.capabilities {
            if caps.iter().any(String::is_empty) {
                return Err(EnvelopeError::Schema(
                    "capabilities must not contain empty names".to_string(),
                ));
            }
        }
        Ok(Envelope {
            version: init.version.unwrap_or_else(|| self.config.version.clone()),
            id,
            sid: init.sid,
            trace_id: Some(trace_id),
            to: init.to,
            reply_to: init.reply_to,
            capabilities: init.capabilities,
            rtype: init.rtype,
            corr_id: init.corr_id,
            flow_id: init.flow_id,
            seq_id: init.seq_id.unwrap_or(0),
            flow_flags: init.flow_flags.unwrap_or(FlowFlags::NONE),
            ttl: init.ttl,
            priority: init.priority,
            frame,
            ts: init.ts.unwrap_or_else(Utc::now),
            sec: init.sec,
            aft: init.aft,
            meta: init.meta,
        })
    }
}

/// Build an envelope with the default configuration and id generator.
pub fn create_envelope(init: EnvelopeInit) -> Result<Envelope, EnvelopeError> {
    EnvelopeFactory::default().create(init)
}

fn fingerprint_material(init: &EnvelopeInit) -> Result<Vec<u8>, EnvelopeError> {
    let frame = init.frame.as_ref().ok_or(EnvelopeError::MissingFrame)?;
    let mut material = serde_json::to_vec(frame)?;
    for part in [
        init.to.as_ref().map(Address::to_string),
        init.corr_id.clone(),
        init.flow_id.clone(),
        init.seq_id.map(|s| s.to_string()),
    ] {
        material.push(0);
        material.extend_from_slice(part.unwrap_or_default().as_bytes());
    }
    Ok(material)
}

/// The `u32` behind a numeric flag field. Negative, fractional or
/// out-of-range numbers fail with `unsupported`, carrying the value as sent;
/// non-numbers are left for serde to report.
fn flag_bits(
    raw: &Value,
    unsupported: fn(String) -> EnvelopeError,
) -> Result<Option<u32>, EnvelopeError> {
    let Value::Number(number) = raw else {
        return Ok(None);
    };
    match number.as_u64() {
        Some(bits) => u32::try_from(bits)
            .map(Some)
            .map_err(|_| unsupported(format!("{bits:#x}"))),
        None => Err(unsupported(number.to_string())),
    }
}

/// Surface field-specific errors before serde folds them into a generic one.
fn precheck_fields(object: &Map<String, Value>) -> Result<(), EnvelopeError> {
    if let Some(raw) = object.get("flowFlags") {
        if let Some(bits) = flag_bits(raw, EnvelopeError::UnsupportedFlowFlags)? {
            FlowFlags::from_bits(bits)?;
        }
    }
    if let Some(raw) = object.get("rtype") {
        if let Some(bits) = flag_bits(raw, EnvelopeError::UnsupportedResponseType)? {
            ResponseType::from_bits(bits)?;
        }
    }
    for key in ["to", "replyTo"] {
        if let Some(raw) = object.get(key).and_then(Value::as_str) {
            Address::parse(raw)?;
        }
    }
    if let Some(raw) = object.get("ts").and_then(Value::as_str) {
        parse_timestamp(raw).map_err(EnvelopeError::InvalidTimestamp)?;
    }
    if let Some(meta) = object.get("meta").filter(|m| !m.is_null()) {
        meta_from_json(meta.clone())?;
    }
    Ok(())
}
