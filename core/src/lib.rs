//! Real-time pane monitoring and broadcast for a fleet of agent terminals.
//!
//! The core samples tmux pane content on an adaptive schedule, detects change
//! with content fingerprints, encodes minimal updates, and fans them out to
//! WebSocket subscribers through per-channel broadcast hubs. Blocking tmux
//! and file-store calls run on a bounded worker pool so the async scheduler
//! is never stalled by an external process.

pub mod bridge;
pub mod config;
pub mod delta;
pub mod fingerprint;
pub mod history;
pub mod hub;
pub mod poller;
pub mod registry;
pub mod report;
pub mod runtime;
pub mod state;
pub mod wire;

pub use bridge::CaptureBridge;
pub use bridge::TmuxBridge;
pub use config::Settings;
pub use hub::BroadcastHub;
pub use registry::ChannelRegistry;
pub use runtime::BridgeRuntime;
pub use state::ChannelKind;
pub use state::PaneId;
