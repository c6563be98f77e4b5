use std::fmt;
use std::process::Command;

use thiserror::Error;
use tracing::debug;

/// Non-literal keys the inject path may send. Everything else is rejected
/// before any tmux invocation. Matches the interrupt/confirmation keys the
/// agent TUIs actually prompt for.
pub const SPECIAL_KEY_ALLOWLIST: [&str; 22] = [
    "Escape", "Enter", "Tab", "BTab", "Up", "Down", "Left", "Right", "Space", "BSpace", "y", "n",
    "0", "1", "2", "3", "4", "5", "6", "7", "8", "9",
];

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("pane {target} no longer exists")]
    PaneNotFound { target: String },
    #[error("key '{key}' is not in the inject allowlist")]
    KeyNotAllowed { key: String },
    #[error("tmux invocation failed: {0}")]
    Io(#[from] std::io::Error),
}

impl BridgeError {
    pub(crate) fn pane_not_found(target: impl fmt::Display) -> Self {
        Self::PaneNotFound {
            target: target.to_string(),
        }
    }
}

/// Address of one tmux pane: `session:0.index`. All monitored panes live in
/// window 0 of their session.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PaneTarget {
    pub session: String,
    pub index: u32,
}

impl PaneTarget {
    pub fn new(session: impl Into<String>, index: u32) -> Self {
        Self {
            session: session.into(),
            index,
        }
    }
}

impl fmt::Display for PaneTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:0.{}", self.session, self.index)
    }
}

/// Keystrokes to deliver to a pane.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InjectPayload {
    /// Literal text, terminated with Enter.
    Text(String),
    /// One allowlisted special key.
    Key(String),
}

impl InjectPayload {
    /// Validate `key` against the allowlist before building a payload.
    pub fn special_key(key: impl Into<String>) -> Result<Self, BridgeError> {
        let key = key.into();
        if SPECIAL_KEY_ALLOWLIST.contains(&key.as_str()) {
            Ok(Self::Key(key))
        } else {
            Err(BridgeError::KeyNotAllowed { key })
        }
    }
}

/// One discovered pane of the fleet session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FleetPane {
    pub index: u32,
    pub agent_id: String,
}

/// Blocking boundary to the terminal multiplexer. Every call here must go
/// through [`crate::runtime::BridgeRuntime`]; the async scheduler never
/// invokes these directly.
pub trait CaptureBridge: Send + Sync + 'static {
    /// Current visible text of the pane, tail-limited to `lines`.
    fn capture(&self, target: &PaneTarget, lines: u32) -> Result<String, BridgeError>;

    /// Deliver keystrokes to the pane.
    fn inject(&self, target: &PaneTarget, payload: &InjectPayload) -> Result<(), BridgeError>;

    /// Enumerate panes of the fleet session with their agent labels.
    fn list_fleet_panes(&self, session: &str) -> Result<Vec<FleetPane>, BridgeError>;
}

/// Bridge backed by the `tmux` CLI.
#[derive(Debug, Default)]
pub struct TmuxBridge;

impl TmuxBridge {
    pub fn new() -> Self {
        Self
    }

    fn run(&self, args: &[&str], target: &str) -> Result<String, BridgeError> {
        debug!(?args, "tmux");
        let output = Command::new("tmux").args(args).output()?;
        if output.status.success() {
            return Ok(String::from_utf8_lossy(&output.stdout).into_owned());
        }
        let stderr = String::from_utf8_lossy(&output.stderr);
        if stderr.contains("can't find") || stderr.contains("no such") {
            return Err(BridgeError::pane_not_found(target));
        }
        Err(BridgeError::Io(std::io::Error::other(format!(
            "tmux {}: {}",
            args.first().copied().unwrap_or_default(),
            stderr.trim()
        ))))
    }
}

impl CaptureBridge for TmuxBridge {
    fn capture(&self, target: &PaneTarget, lines: u32) -> Result<String, BridgeError> {
        let target_str = target.to_string();
        let raw = self.run(&["capture-pane", "-p", "-t", &target_str], &target_str)?;
        Ok(tail_lines(&raw, lines as usize))
    }

    fn inject(&self, target: &PaneTarget, payload: &InjectPayload) -> Result<(), BridgeError> {
        let target_str = target.to_string();
        match payload {
            InjectPayload::Text(text) => {
                self.run(
                    &["send-keys", "-t", &target_str, "-l", "--", text],
                    &target_str,
                )?;
                self.run(&["send-keys", "-t", &target_str, "Enter"], &target_str)?;
            }
            InjectPayload::Key(key) => {
                self.run(&["send-keys", "-t", &target_str, key], &target_str)?;
            }
        }
        Ok(())
    }

    fn list_fleet_panes(&self, session: &str) -> Result<Vec<FleetPane>, BridgeError> {
        let raw = self.run(
            &[
                "list-panes",
                "-t",
                session,
                "-F",
                "#{pane_index}\t#{@agent_id}",
            ],
            session,
        )?;
        Ok(parse_fleet_panes(&raw))
    }
}

/// Keep the last `limit` lines of a capture, without a trailing newline.
pub(crate) fn tail_lines(raw: &str, limit: usize) -> String {
    let lines: Vec<&str> = raw.trim_end_matches('\n').lines().collect();
    let start = lines.len().saturating_sub(limit);
    lines[start..].join("\n")
}

/// Parse `list-panes` output formatted as `index\t@agent_id`. Panes without
/// an agent label fall back to `pane_<index>`.
pub(crate) fn parse_fleet_panes(raw: &str) -> Vec<FleetPane> {
    raw.lines()
        .filter_map(|line| {
            let (index, agent_id) = line.split_once('\t')?;
            let index: u32 = index.trim().parse().ok()?;
            let agent_id = agent_id.trim();
            Some(FleetPane {
                index,
                agent_id: if agent_id.is_empty() {
                    format!("pane_{index}")
                } else {
                    agent_id.to_string()
                },
            })
        })
        .collect()
}
