use serde::Deserialize;
use serde::Serialize;

use crate::delta::PatchOp;
use crate::state::ChannelKind;
use crate::state::PaneId;

/// Server-to-client JSON envelope. A subscriber's first frame for any pane is
/// always a `snapshot`; a `patch` is only sent when the subscriber's
/// last-delivered version equals `base_version`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Frame {
    Snapshot {
        channel: ChannelKind,
        pane: PaneId,
        version: u64,
        content: String,
    },
    Patch {
        channel: ChannelKind,
        pane: PaneId,
        base_version: u64,
        version: u64,
        ops: Vec<PatchOp>,
    },
    Error {
        channel: ChannelKind,
        reason: String,
    },
    Heartbeat,
}

/// Client-to-server JSON envelope. Anything that does not parse as a frame is
/// treated by the command channel as a plain-text submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    Join { channel: ChannelKind },
}
