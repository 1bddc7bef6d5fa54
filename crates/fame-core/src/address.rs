//! Participant addresses.
//!
//! An address is `participant@location`, where the location is a host
//! (`svc@api.example.com`), a path (`svc@/a/b`), or both
//! (`svc@api.example.com/a/b`). Hosts may start with a `*` wildcard segment
//! (`pool@*.fame.fabric`); paths never carry wildcards.
//!
//! Parsing splits at the **last** `@`, so formatting is the exact inverse of
//! parsing for every valid address.

use crate::error::AddressError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The leftmost-only host wildcard token.
pub const WILDCARD: &str = "*";

/// A validated, immutable participant address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address {
    participant: String,
    host: Option<String>,
    path: Option<String>,
}

impl Address {
    /// Parse and validate a raw address string.
    pub fn parse(raw: &str) -> Result<Self, AddressError> {
        let (participant, host, path) = parse_address_components(raw)?;
        Ok(Self {
            participant,
            host,
            path,
        })
    }

    /// Compose an address from a participant and a raw location.
    pub fn new(participant: &str, location: &str) -> Result<Self, AddressError> {
        validate_participant(participant)?;
        let (host, path) = classify_location(participant, location)?;
        Ok(Self {
            participant: participant.to_string(),
            host,
            path,
        })
    }

    /// Compose an address from its components.
    ///
    /// At least one of `host`/`path` must be non-empty. A path without a
    /// leading `/` gets one.
    pub fn from_components(
        participant: &str,
        host: Option<&str>,
        path: Option<&str>,
    ) -> Result<Self, AddressError> {
        validate_participant(participant)?;
        let host = host.filter(|h| !h.is_empty());
        let path = path.filter(|p| !p.is_empty()).map(|p| {
            if p.starts_with('/') {
                p.to_string()
            } else {
                format!("/{p}")
            }
        });
        if host.is_none() && path.is_none() {
            return Err(AddressError::MissingLocation(participant.to_string()));
        }
        if let Some(h) = host {
            validate_host(h, true)?;
        }
        if let Some(p) = &path {
            validate_path(p)?;
        }
        Ok(Self {
            participant: participant.to_string(),
            host: host.map(str::to_string),
            path,
        })
    }

    /// The participant segment.
    pub fn participant(&self) -> &str {
        &self.participant
    }

    /// The host segment, if any.
    pub fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    /// The path segment (always starting with `/`), if any.
    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    /// Everything after the `@`.
    pub fn location(&self) -> String {
        format!(
            "{}{}",
            self.host.as_deref().unwrap_or(""),
            self.path.as_deref().unwrap_or("")
        )
    }

    /// Whether the host starts with the `*` wildcard.
    pub fn is_wildcard(&self) -> bool {
        self.host
            .as_deref()
            .is_some_and(|h| h.split('.').next() == Some(WILDCARD))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.participant, self.location())
    }
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Address {
    type Error = AddressError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Address> for String {
    fn from(addr: Address) -> Self {
        addr.to_string()
    }
}

/// Split a raw address into `(participant, location)`.
pub fn parse_address(raw: &str) -> Result<(String, String), AddressError> {
    let (participant, location) = split_raw(raw)?;
    validate_participant(participant)?;
    classify_location(raw, location)?;
    Ok((participant.to_string(), location.to_string()))
}

/// Split a raw address into `(participant, host, path)`.
pub fn parse_address_components(
    raw: &str,
) -> Result<(String, Option<String>, Option<String>), AddressError> {
    let (participant, location) = split_raw(raw)?;
    validate_participant(participant)?;
    let (host, path) = classify_location(raw, location)?;
    Ok((participant.to_string(), host, path))
}

/// Build an address from a participant and a location.
pub fn format_address(participant: &str, location: &str) -> Result<Address, AddressError> {
    Address::new(participant, location)
}

/// Build an address from a participant and optional host/path components.
pub fn format_address_from_components(
    participant: &str,
    host: Option<&str>,
    path: Option<&str>,
) -> Result<Address, AddressError> {
    Address::from_components(participant, host, path)
}

fn split_raw(raw: &str) -> Result<(&str, &str), AddressError> {
    raw.rsplit_once('@')
        .ok_or_else(|| AddressError::MissingDelimiter(raw.to_string()))
}

fn validate_participant(participant: &str) -> Result<(), AddressError> {
    let ok = !participant.is_empty()
        && participant
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if ok {
        Ok(())
    } else {
        Err(AddressError::BadParticipant(participant.to_string()))
    }
}

/// Classify a location as host-only, path-only, or host+path and validate it.
///
/// `context` is only used to make the empty-location error readable.
fn classify_location(
    context: &str,
    location: &str,
) -> Result<(Option<String>, Option<String>), AddressError> {
    if location.is_empty() {
        return Err(AddressError::EmptyLocation(context.to_string()));
    }
    if location.starts_with('/') {
        validate_path(location)?;
        return Ok((None, Some(location.to_string())));
    }
    match location.split_once('/') {
        Some((host, rest)) => {
            let path = format!("/{rest}");
            validate_host(host, true)?;
            validate_path(&path)?;
            Ok((Some(host.to_string()), Some(path)))
        }
        None => {
            validate_host(location, true)?;
            Ok((Some(location.to_string()), None))
        }
    }
}

/// Validate a dotted host. `*` is accepted only as segment 0 and only when
/// `allow_wildcard` is set.
pub fn validate_host(host: &str, allow_wildcard: bool) -> Result<(), AddressError> {
    for (idx, segment) in host.split('.').enumerate() {
        if segment.is_empty() {
            return Err(AddressError::EmptyHostSegment(host.to_string()));
        }
        if segment == WILDCARD && allow_wildcard {
            if idx != 0 {
                return Err(AddressError::WildcardNotLeftmost(host.to_string()));
            }
            continue;
        }
        if !segment
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-')
        {
            return Err(AddressError::BadHostSegment(segment.to_string()));
        }
    }
    Ok(())
}

/// Validate a `/`-prefixed path.
pub fn validate_path(path: &str) -> Result<(), AddressError> {
    if path == "/" {
        return Ok(());
    }
    let trimmed = path.strip_prefix('/').unwrap_or(path);
    for segment in trimmed.split('/') {
        if segment.contains(WILDCARD) {
            return Err(AddressError::WildcardInPath(segment.to_string()));
        }
        let ok = !segment.is_empty()
            && segment
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'));
        if !ok {
            return Err(AddressError::BadPathSegment(segment.to_string()));
        }
    }
    Ok(())
}
