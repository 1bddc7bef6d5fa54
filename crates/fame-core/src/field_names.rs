//! Envelope field-name table for cross-implementation interop.
//!
//! Envelopes serialize with camelCase keys natively. Peers that speak the
//! snake_case convention expect a fixed subset of top-level keys renamed;
//! this table is that subset, and nothing else is ever rewritten.

use serde_json::{Map, Value};

/// `(camelCase, snake_case)` pairs for top-level envelope keys.
pub const FIELD_NAME_TABLE: &[(&str, &str)] = &[
    ("traceId", "trace_id"),
    ("replyTo", "reply_to"),
    ("corrId", "corr_id"),
    ("flowId", "flow_id"),
    ("seqId", "seq_id"),
    ("flowFlags", "flow_flags"),
];

/// Naming convention for top-level envelope keys.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FieldNaming {
    Camel,
    #[default]
    Snake,
}

pub fn to_snake(camel: &str) -> Option<&'static str> {
    FIELD_NAME_TABLE
        .iter()
        .find(|(c, _)| *c == camel)
        .map(|(_, s)| *s)
}

pub fn to_camel(snake: &str) -> Option<&'static str> {
    FIELD_NAME_TABLE
        .iter()
        .find(|(_, s)| *s == snake)
        .map(|(c, _)| *c)
}

/// The first table pair present in `object` under both of its names.
pub fn find_conflict(object: &Map<String, Value>) -> Option<(&'static str, &'static str)> {
    FIELD_NAME_TABLE
        .iter()
        .copied()
        .find(|(camel, snake)| object.contains_key(*camel) && object.contains_key(*snake))
}

/// Rename the table's top-level keys of `object` into `naming`.
///
/// Keys outside the table, and every nested object, are left alone. If a
/// field appears under both names the later key in map order wins; callers
/// decoding untrusted input check [`find_conflict`] first.
pub fn rename_fields(object: Map<String, Value>, naming: FieldNaming) -> Map<String, Value> {
    object
        .into_iter()
        .map(|(key, value)| {
            let renamed = match naming {
                FieldNaming::Snake => to_snake(&key),
                FieldNaming::Camel => to_camel(&key),
            };
            (renamed.map(str::to_string).unwrap_or(key), value)
        })
        .collect()
}
