//! Integer bitmasks carried on the envelope.

use crate::error::EnvelopeError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::BitOr;

/// Flow-control flags (`flowFlags` on the wire).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct FlowFlags(u32);

impl FlowFlags {
    pub const NONE: Self = Self(0);
    /// Opens a flow.
    pub const SYN: Self = Self(1);
    /// Acknowledges a flow segment.
    pub const ACK: Self = Self(2);
    /// Tears a flow down.
    pub const RESET: Self = Self(4);

    const ALL: u32 = 1 | 2 | 4;

    /// Validate raw bits against the supported flag set.
    pub fn from_bits(bits: u32) -> Result<Self, EnvelopeError> {
        if bits & !Self::ALL != 0 {
            return Err(EnvelopeError::UnsupportedFlowFlags(format!("{bits:#x}")));
        }
        Ok(Self(bits))
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for FlowFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl TryFrom<u32> for FlowFlags {
    type Error = EnvelopeError;

    fn try_from(bits: u32) -> Result<Self, Self::Error> {
        Self::from_bits(bits)
    }
}

impl From<FlowFlags> for u32 {
    fn from(flags: FlowFlags) -> Self {
        flags.0
    }
}

impl fmt::Display for FlowFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("NONE");
        }
        let names: Vec<&str> = [(Self::SYN, "SYN"), (Self::ACK, "ACK"), (Self::RESET, "RESET")]
            .into_iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, name)| name)
            .collect();
        f.write_str(&names.join("|"))
    }
}

/// Which responses the sender expects (`rtype` on the wire).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct ResponseType(u32);

impl ResponseType {
    pub const NONE: Self = Self(0);
    /// A delivery acknowledgement.
    pub const ACK: Self = Self(1);
    /// A single reply.
    pub const REPLY: Self = Self(2);
    /// A stream of replies.
    pub const STREAM: Self = Self(4);

    const ALL: u32 = 1 | 2 | 4;

    pub fn from_bits(bits: u32) -> Result<Self, EnvelopeError> {
        if bits & !Self::ALL != 0 {
            return Err(EnvelopeError::UnsupportedResponseType(format!("{bits:#x}")));
        }
        Ok(Self(bits))
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for ResponseType {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl TryFrom<u32> for ResponseType {
    type Error = EnvelopeError;

    fn try_from(bits: u32) -> Result<Self, Self::Error> {
        Self::from_bits(bits)
    }
}

impl From<ResponseType> for u32 {
    fn from(rtype: ResponseType) -> Self {
        rtype.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_supported_combination_is_accepted() {
        for bits in 0..=7 {
            assert_eq!(FlowFlags::from_bits(bits).unwrap().bits(), bits);
        }
        let all = FlowFlags::SYN | FlowFlags::ACK | FlowFlags::RESET;
        assert_eq!(all.to_string(), "SYN|ACK|RESET");
        assert_eq!(FlowFlags::NONE.to_string(), "NONE");
    }

    #[test]
    fn test_extra_bit_is_rejected() {
        let bits = (FlowFlags::SYN | FlowFlags::ACK | FlowFlags::RESET).bits() | 8;
        let err = FlowFlags::from_bits(bits).unwrap_err();
        assert!(err
            .to_string()
            .contains("FlowFlags contains unsupported bits"));
        assert!(serde_json::from_str::<FlowFlags>("15").is_err());
    }

    #[test]
    fn test_response_type_containment() {
        let rtype = ResponseType::ACK | ResponseType::REPLY;
        assert!(rtype.contains(ResponseType::REPLY));
        assert!(!rtype.contains(ResponseType::STREAM));
        assert!(ResponseType::from_bits(16).is_err());
    }
}
