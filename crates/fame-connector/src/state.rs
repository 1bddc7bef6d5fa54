//! Connector lifecycle states.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of a connector. Starts at `Unknown`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConnectorState {
    #[default]
    Unknown,
    Initialized,
    Started,
    Stopped,
    Closed,
}

impl ConnectorState {
    /// Traffic flows only in `Started`.
    pub fn is_active(self) -> bool {
        self == Self::Started
    }

    pub fn is_inactive(self) -> bool {
        matches!(self, Self::Stopped | Self::Closed)
    }

    pub fn can_start(self) -> bool {
        matches!(self, Self::Initialized | Self::Stopped)
    }

    pub fn can_stop(self) -> bool {
        self == Self::Started
    }

    pub fn can_close(self) -> bool {
        matches!(self, Self::Initialized | Self::Started | Self::Stopped)
    }
}

impl fmt::Display for ConnectorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Unknown => "UNKNOWN",
            Self::Initialized => "INITIALIZED",
            Self::Started => "STARTED",
            Self::Stopped => "STOPPED",
            Self::Closed => "CLOSED",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [ConnectorState; 5] = [
        ConnectorState::Unknown,
        ConnectorState::Initialized,
        ConnectorState::Started,
        ConnectorState::Stopped,
        ConnectorState::Closed,
    ];

    #[test]
    fn test_predicates() {
        let active: Vec<_> = ALL.into_iter().filter(|s| s.is_active()).collect();
        assert_eq!(active, vec![ConnectorState::Started]);

        let inactive: Vec<_> = ALL.into_iter().filter(|s| s.is_inactive()).collect();
        assert_eq!(inactive, vec![ConnectorState::Stopped, ConnectorState::Closed]);

        let startable: Vec<_> = ALL.into_iter().filter(|s| s.can_start()).collect();
        assert_eq!(
            startable,
            vec![ConnectorState::Initialized, ConnectorState::Stopped]
        );

        let stoppable: Vec<_> = ALL.into_iter().filter(|s| s.can_stop()).collect();
        assert_eq!(stoppable, vec![ConnectorState::Started]);

        let closable: Vec<_> = ALL.into_iter().filter(|s| s.can_close()).collect();
        assert_eq!(
            closable,
            vec![
                ConnectorState::Initialized,
                ConnectorState::Started,
                ConnectorState::Stopped
            ]
        );
    }

    #[test]
    fn test_display_and_serde() {
        assert_eq!(ConnectorState::Started.to_string(), "STARTED");
        assert_eq!(
            serde_json::to_string(&ConnectorState::Initialized).unwrap(),
            "\"INITIALIZED\""
        );
        assert_eq!(ConnectorState::default(), ConnectorState::Unknown);
    }
}
