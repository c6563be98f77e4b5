use std::io::Write;
use std::path::PathBuf;

use chrono::Local;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

/// One entry of the persistent command-queue log shared with the agent-side
/// tooling. Unknown fields written by other tools are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandEntry {
    pub cmd_id: String,
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
    pub instruction: String,
}

#[derive(Debug, Default, Deserialize)]
struct QueueFile {
    #[serde(default)]
    commands: Option<Vec<CommandEntry>>,
}

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("queue log parse failed: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("queue log io failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Read-only history plus append for the YAML command queue. Appends preserve
/// the existing file text byte for byte; entries are only ever added at the
/// end.
pub struct CommandLog {
    path: PathBuf,
}

impl CommandLog {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// All logged commands, newest first. A missing or empty file is an
    /// empty history, not an error.
    pub fn read_newest_first(&self) -> Result<Vec<CommandEntry>, HistoryError> {
        let mut commands = self.read_in_order()?;
        commands.reverse();
        Ok(commands)
    }

    /// Append an instruction with a generated `cmd_NNN` id (highest existing
    /// number plus one) and return the new id.
    pub fn append(&self, instruction: &str) -> Result<String, HistoryError> {
        let existing = self.read_in_order()?;
        let next = existing
            .iter()
            .filter_map(|entry| entry.cmd_id.strip_prefix("cmd_"))
            .filter_map(|suffix| suffix.parse::<u32>().ok())
            .max()
            .unwrap_or(0)
            + 1;
        let cmd_id = format!("cmd_{next:03}");
        let timestamp = Local::now().format("%Y-%m-%dT%H:%M:%S");

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        if file.metadata()?.len() == 0 {
            writeln!(file, "commands:")?;
        }

        let indented = instruction
            .trim_end_matches('\n')
            .lines()
            .map(|line| {
                if line.trim().is_empty() {
                    String::new()
                } else {
                    format!("    {line}")
                }
            })
            .collect::<Vec<_>>()
            .join("\n");
        writeln!(file, "- cmd_id: {cmd_id}")?;
        writeln!(file, "  priority: normal")?;
        writeln!(file, "  status: pending")?;
        writeln!(file, "  timestamp: '{timestamp}'")?;
        writeln!(file, "  instruction: |")?;
        writeln!(file, "{indented}")?;

        Ok(cmd_id)
    }

    fn read_in_order(&self) -> Result<Vec<CommandEntry>, HistoryError> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };
        if contents.trim().is_empty() {
            return Ok(Vec::new());
        }
        let parsed: QueueFile = serde_yaml::from_str(&contents)?;
        Ok(parsed.commands.unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    use super::*;

    fn log_in(dir: &TempDir) -> CommandLog {
        CommandLog::new(dir.path().join("queue/commands.yaml"))
    }

    #[test]
    fn missing_file_reads_as_empty_history() {
        let dir = TempDir::new().expect("tempdir");
        assert_eq!(log_in(&dir).read_newest_first().expect("read"), vec![]);
    }

    #[test]
    fn empty_file_reads_as_empty_history() {
        let dir = TempDir::new().expect("tempdir");
        let log = log_in(&dir);
        std::fs::create_dir_all(dir.path().join("queue")).expect("mkdir");
        std::fs::write(dir.path().join("queue/commands.yaml"), "").expect("write");
        assert_eq!(log.read_newest_first().expect("read"), vec![]);
    }

    #[test]
    fn first_append_creates_the_file_with_cmd_001() {
        let dir = TempDir::new().expect("tempdir");
        let log = log_in(&dir);

        let id = log.append("deploy the fix").expect("append");
        assert_eq!(id, "cmd_001");

        let entries = log.read_newest_first().expect("read");
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].cmd_id, "cmd_001");
        assert_eq!(entries[0].instruction.trim(), "deploy the fix");
        assert_eq!(entries[0].status.as_deref(), Some("pending"));
    }

    #[test]
    fn ids_increment_past_the_highest_existing_number() {
        let dir = TempDir::new().expect("tempdir");
        let log = log_in(&dir);
        std::fs::create_dir_all(dir.path().join("queue")).expect("mkdir");
        std::fs::write(
            dir.path().join("queue/commands.yaml"),
            "commands:\n- cmd_id: cmd_001\n  instruction: first\n- cmd_id: cmd_005\n  instruction: fifth\n",
        )
        .expect("write");

        let id = log.append("sixth").expect("append");
        assert_eq!(id, "cmd_006");

        let entries = log.read_newest_first().expect("read");
        assert_eq!(entries.len(), 3);
        // Newest first.
        assert_eq!(entries[0].cmd_id, "cmd_006");
        assert_eq!(entries[2].cmd_id, "cmd_001");
    }

    #[test]
    fn multiline_instructions_round_trip() {
        let dir = TempDir::new().expect("tempdir");
        let log = log_in(&dir);

        log.append("first line\nsecond line").expect("append");
        let entries = log.read_newest_first().expect("read");
        assert_eq!(entries[0].instruction.trim(), "first line\nsecond line");
    }

    #[test]
    fn append_preserves_existing_entries() {
        let dir = TempDir::new().expect("tempdir");
        let log = log_in(&dir);

        log.append("one").expect("append one");
        log.append("two").expect("append two");
        let entries = log.read_newest_first().expect("read");
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].cmd_id, "cmd_002");
        assert_eq!(entries[1].cmd_id, "cmd_001");
    }
}
