use std::fmt;
use std::str::FromStr;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::fingerprint::Fingerprint;

/// Identifier of one monitored pane within a channel. For the fleet grid this
/// is the agent label taken from the pane's `@agent_id` option; for the
/// commander channel it is the fixed id `commander`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PaneId(String);

impl PaneId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PaneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The two broadcast streams the panel serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    /// The single commander pane.
    Console,
    /// The aggregate grid of fleet agent panes.
    Monitor,
}

impl ChannelKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Console => "console",
            Self::Monitor => "monitor",
        }
    }
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown channel '{0}'")]
pub struct UnknownChannel(pub String);

impl FromStr for ChannelKind {
    type Err = UnknownChannel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "console" => Ok(Self::Console),
            "monitor" => Ok(Self::Monitor),
            other => Err(UnknownChannel(other.to_string())),
        }
    }
}

/// Last committed capture for one pane. The fingerprint is always the
/// fingerprint of `text`.
#[derive(Debug, Clone)]
pub struct PaneState {
    pub pane: PaneId,
    pub text: String,
    pub fingerprint: Fingerprint,
}

impl PaneState {
    pub fn new(pane: PaneId, text: String) -> Self {
        let fingerprint = Fingerprint::of(&text);
        Self {
            pane,
            text,
            fingerprint,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_kind_round_trips_through_str() {
        for kind in [ChannelKind::Console, ChannelKind::Monitor] {
            assert_eq!(kind.as_str().parse::<ChannelKind>(), Ok(kind));
        }
        assert!("grid".parse::<ChannelKind>().is_err());
    }

    #[test]
    fn pane_state_fingerprint_matches_text() {
        let state = PaneState::new(PaneId::new("agent1"), "output".to_string());
        assert_eq!(state.fingerprint, Fingerprint::of("output"));
    }
}
