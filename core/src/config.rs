use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

/// Immutable panel configuration. Loaded and validated once at startup and
/// passed by reference; nothing re-reads the file at runtime.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub server: ServerSettings,
    pub tmux: TmuxSettings,
    pub channels: ChannelSettings,
    pub runtime: RuntimeSettings,
    pub reconnect: ReconnectSettings,
    pub paths: PathSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub heartbeat_interval_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TmuxSettings {
    /// Session holding the agent grid.
    pub fleet_session: String,
    /// Session holding the commander pane.
    pub commander_session: String,
    /// Tail window per capture, in lines.
    pub capture_lines: u32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ChannelSettings {
    pub console: PollTuning,
    pub monitor: PollTuning,
}

/// Adaptive polling knobs for one channel kind.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct PollTuning {
    pub base_interval_ms: u64,
    pub max_interval_ms: u64,
    pub no_change_threshold: u32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RuntimeSettings {
    /// Bounded worker pool size for blocking bridge and file calls.
    pub worker_count: usize,
}

/// Reconnection contract served to clients; never hardcoded client-side.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconnectSettings {
    pub min_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub max_retries: u32,
    /// Delay before the UI shows a disconnected indicator.
    pub disconnect_grace_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PathSettings {
    /// Report file behind the dashboard cache.
    pub report: PathBuf,
    /// Persistent command-queue log.
    pub queue: PathBuf,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

impl Settings {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let settings: Self = toml::from_str(&contents)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, tuning) in [
            ("channels.console", &self.channels.console),
            ("channels.monitor", &self.channels.monitor),
        ] {
            if tuning.base_interval_ms == 0 {
                return Err(invalid(format!("{name}.base_interval_ms must be > 0")));
            }
            if tuning.max_interval_ms < tuning.base_interval_ms {
                return Err(invalid(format!(
                    "{name}.max_interval_ms must be >= base_interval_ms"
                )));
            }
            if tuning.no_change_threshold == 0 {
                return Err(invalid(format!("{name}.no_change_threshold must be >= 1")));
            }
        }
        if self.runtime.worker_count == 0 {
            return Err(invalid("runtime.worker_count must be >= 1".to_string()));
        }
        if self.reconnect.min_backoff_ms > self.reconnect.max_backoff_ms {
            return Err(invalid(
                "reconnect.min_backoff_ms must be <= max_backoff_ms".to_string(),
            ));
        }
        if self.server.heartbeat_interval_ms == 0 {
            return Err(invalid("server.heartbeat_interval_ms must be > 0".to_string()));
        }
        if self.tmux.fleet_session.is_empty() || self.tmux.commander_session.is_empty() {
            return Err(invalid("tmux session names must not be empty".to_string()));
        }
        if self.tmux.capture_lines == 0 {
            return Err(invalid("tmux.capture_lines must be > 0".to_string()));
        }
        Ok(())
    }
}

fn invalid(message: String) -> ConfigError {
    ConfigError::Invalid(message)
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerSettings::default(),
            tmux: TmuxSettings::default(),
            channels: ChannelSettings::default(),
            runtime: RuntimeSettings::default(),
            reconnect: ReconnectSettings::default(),
            paths: PathSettings::default(),
        }
    }
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 30001,
            heartbeat_interval_ms: 15_000,
        }
    }
}

impl Default for TmuxSettings {
    fn default() -> Self {
        Self {
            fleet_session: "fleet".to_string(),
            commander_session: "commander".to_string(),
            capture_lines: 50,
        }
    }
}

impl Default for ChannelSettings {
    fn default() -> Self {
        Self {
            console: PollTuning {
                base_interval_ms: 1_000,
                max_interval_ms: 3_000,
                no_change_threshold: 2,
            },
            monitor: PollTuning {
                base_interval_ms: 5_000,
                max_interval_ms: 10_000,
                no_change_threshold: 2,
            },
        }
    }
}

impl Default for PollTuning {
    fn default() -> Self {
        Self {
            base_interval_ms: 1_000,
            max_interval_ms: 3_000,
            no_change_threshold: 2,
        }
    }
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self { worker_count: 2 }
    }
}

impl Default for ReconnectSettings {
    fn default() -> Self {
        Self {
            min_backoff_ms: 1_000,
            max_backoff_ms: 30_000,
            max_retries: 10,
            disconnect_grace_ms: 2_000,
        }
    }
}

impl Default for PathSettings {
    fn default() -> Self {
        Self {
            report: PathBuf::from("state/report.md"),
            queue: PathBuf::from("state/queue/commands.yaml"),
        }
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn defaults_validate() {
        Settings::default().validate().expect("defaults are valid");
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let settings: Settings = toml::from_str(
            r#"
            [server]
            port = 9000

            [channels.console]
            base_interval_ms = 250
            max_interval_ms = 2000
            "#,
        )
        .expect("parse");
        assert_eq!(settings.server.port, 9000);
        assert_eq!(settings.server.host, "127.0.0.1");
        assert_eq!(settings.channels.console.base_interval_ms, 250);
        assert_eq!(settings.channels.monitor.base_interval_ms, 5_000);
    }

    #[test]
    fn inverted_intervals_are_rejected() {
        let mut settings = Settings::default();
        settings.channels.monitor.max_interval_ms = 10;
        assert_matches!(settings.validate(), Err(ConfigError::Invalid(_)));
    }

    #[test]
    fn zero_workers_are_rejected() {
        let mut settings = Settings::default();
        settings.runtime.worker_count = 0;
        assert_matches!(settings.validate(), Err(ConfigError::Invalid(_)));
    }

    #[test]
    fn inverted_backoff_is_rejected() {
        let mut settings = Settings::default();
        settings.reconnect.min_backoff_ms = 60_000;
        assert_matches!(settings.validate(), Err(ConfigError::Invalid(_)));
    }

    #[test]
    fn zero_threshold_is_rejected() {
        let mut settings = Settings::default();
        settings.channels.console.no_change_threshold = 0;
        assert_matches!(settings.validate(), Err(ConfigError::Invalid(_)));
    }
}
