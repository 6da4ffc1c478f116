use chrono::{DateTime, Utc};
use log::info;
use serde::{Deserialize, Serialize};
use std::{io::Write, path::PathBuf};

use crate::error::StgError;
use crate::types::{ChannelIndex, ElectricalMode};

/// A state-changing command issued to a stimulator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum Command {
    /// Empty `channels` means the device-wide form
    SetMode {
        channels: Vec<ChannelIndex>,
        mode: ElectricalMode,
    },
    SetupTrigger {
        channel_masks: Vec<u32>,
        syncout_masks: Vec<u32>,
        repeat_counts: Vec<u32>,
    },
    Download {
        channel: ChannelIndex,
        mode: ElectricalMode,
        amplitudes: Vec<i32>,
        durations_us: Vec<u64>,
    },
    Start {
        trigger_mask: u32,
    },
    Stop {
        trigger_mask: u32,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub timestamp: DateTime<Utc>,
    pub serial_number: u64,
    #[serde(flatten)]
    pub command: Command,
}

/// Append-only record of every command sent to a stimulator.
///
/// Entries are written as JSON lines once `buffer_size` of them have
/// accumulated, and on drop. With `final_format_json` the file is rewritten
/// as a single JSON array when the journal is finalized. Recording may go on
/// after a finalize; the next one folds the new lines into the array.
#[derive(Debug)]
pub struct Journal {
    buffer: Vec<JournalEntry>,
    buffer_size: usize,
    file_path: PathBuf,
    final_format_json: bool,
}

impl Journal {
    pub fn new<P: Into<PathBuf>>(file_path: P, buffer_size: usize, final_format_json: bool) -> Self {
        let mut path = file_path.into();

        let extension = if final_format_json { "json" } else { "jsonl" };
        if path.extension() != Some(std::ffi::OsStr::new(extension)) {
            path.set_extension(extension);
        }

        Self {
            buffer: Vec::with_capacity(buffer_size),
            buffer_size: buffer_size.max(1),
            file_path: path,
            final_format_json,
        }
    }

    pub fn file_path(&self) -> &std::path::Path {
        &self.file_path
    }

    pub fn record(&mut self, serial_number: u64, command: Command) -> Result<(), StgError> {
        self.buffer.push(JournalEntry {
            timestamp: Utc::now(),
            serial_number,
            command,
        });

        if self.buffer.len() >= self.buffer_size {
            if let Err(e) = self.flush() {
                // The caller will not send this command, so it must not be persisted
                self.buffer.pop();
                return Err(e);
            }
        }

        Ok(())
    }

    pub fn flush(&mut self) -> Result<(), StgError> {
        if self.buffer.is_empty() {
            return Ok(());
        }

        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.file_path)
            .map_err(|source| StgError::Io {
                source,
                context: format!("Failed to open journal at {:?}", self.file_path),
            })?;

        let mut writer = std::io::BufWriter::new(file);
        for entry in &self.buffer {
            let json_line = serde_json::to_string(entry)?;
            writeln!(writer, "{json_line}")?;
        }
        writer.flush()?;

        self.buffer.clear();
        Ok(())
    }

    /// Convert the JSONL file into a JSON array
    pub fn finalize_as_json(&mut self) -> Result<(), StgError> {
        if !self.final_format_json {
            return Ok(());
        }

        self.flush()?;

        let content = match std::fs::read_to_string(&self.file_path) {
            Ok(content) => content,
            // Nothing was ever recorded
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(source) => {
                return Err(StgError::Io {
                    source,
                    context: format!("Could not read journal at {:?}", self.file_path),
                });
            }
        };

        // An earlier finalize leaves an array, possibly followed by newer lines
        let mut entries = Vec::new();
        for value in serde_json::Deserializer::from_str(&content).into_iter::<serde_json::Value>() {
            match value? {
                serde_json::Value::Array(items) => {
                    for item in items {
                        entries.push(serde_json::from_value::<JournalEntry>(item)?);
                    }
                }
                line => entries.push(serde_json::from_value::<JournalEntry>(line)?),
            }
        }

        let json_output = serde_json::to_string_pretty(&entries)?;
        std::fs::write(&self.file_path, json_output).map_err(|source| StgError::Io {
            source,
            context: format!("Could not write journal at {:?}", self.file_path),
        })?;

        info!("Converted {} journal entries to JSON", entries.len());
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}

impl Drop for Journal {
    fn drop(&mut self) {
        if let Err(e) = self.flush().and_then(|_| self.finalize_as_json()) {
            log::error!("Failed to write journal {:?}: {e}", self.file_path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_follows_format() {
        let dir = tempfile::tempdir().unwrap();
        let lines = Journal::new(dir.path().join("session"), 4, false);
        assert_eq!(lines.file_path().extension().unwrap(), "jsonl");
        let array = Journal::new(dir.path().join("session.txt"), 4, true);
        assert_eq!(array.file_path().extension().unwrap(), "json");
    }

    #[test]
    fn test_flushes_at_buffer_size() {
        let dir = tempfile::tempdir().unwrap();
        let mut journal = Journal::new(dir.path().join("cmds"), 2, false);

        journal.record(4008, Command::Start { trigger_mask: 1 }).unwrap();
        assert_eq!(journal.len(), 1);
        assert!(!journal.file_path().exists());

        journal.record(4008, Command::Stop { trigger_mask: 1 }).unwrap();
        assert!(journal.is_empty());

        let content = std::fs::read_to_string(journal.file_path()).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        let first: JournalEntry = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first.command, Command::Start { trigger_mask: 1 });
        assert_eq!(first.serial_number, 4008);
        assert!(lines[1].contains("\"command\":\"stop\""));
    }

    #[test]
    fn test_drop_finalizes_json_array() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cmds.json");
        {
            let mut journal = Journal::new(&path, 16, true);
            journal
                .record(
                    1,
                    Command::Download {
                        channel: 0,
                        mode: ElectricalMode::Current,
                        amplitudes: vec![1_000_000, -1_000_000],
                        durations_us: vec![100, 100],
                    },
                )
                .unwrap();
        }

        let content = std::fs::read_to_string(&path).unwrap();
        let entries: Vec<JournalEntry> = serde_json::from_str(&content).unwrap();
        assert_eq!(entries.len(), 1);
        assert!(matches!(
            entries[0].command,
            Command::Download { channel: 0, .. }
        ));
    }

    #[test]
    fn test_unwritable_path_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut journal = Journal::new(dir.path().join("missing").join("cmds"), 1, false);
        let err = journal
            .record(1, Command::Start { trigger_mask: 1 })
            .unwrap_err();
        assert!(matches!(err, StgError::Io { .. }));
        assert!(journal.is_empty());
    }

    #[test]
    fn test_failed_write_drops_unsent_command() {
        let dir = tempfile::tempdir().unwrap();
        let sub = dir.path().join("late");
        let mut journal = Journal::new(sub.join("cmds"), 1, false);

        assert!(journal.record(1, Command::Start { trigger_mask: 1 }).is_err());
        std::fs::create_dir(&sub).unwrap();
        journal.record(1, Command::Stop { trigger_mask: 1 }).unwrap();

        let content = std::fs::read_to_string(journal.file_path()).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains("\"command\":\"stop\""));
    }

    #[test]
    fn test_recording_after_finalize_keeps_one_array() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cmds.json");
        {
            let mut journal = Journal::new(&path, 1, true);
            journal.record(7, Command::Start { trigger_mask: 3 }).unwrap();
            journal.finalize_as_json().unwrap();
            journal.record(7, Command::Stop { trigger_mask: 3 }).unwrap();
            journal.finalize_as_json().unwrap();
            journal.record(7, Command::Start { trigger_mask: 1 }).unwrap();
        }

        let content = std::fs::read_to_string(&path).unwrap();
        let entries: Vec<JournalEntry> = serde_json::from_str(&content).unwrap();
        let commands: Vec<Command> = entries.into_iter().map(|e| e.command).collect();
        assert_eq!(
            commands,
            vec![
                Command::Start { trigger_mask: 3 },
                Command::Stop { trigger_mask: 3 },
                Command::Start { trigger_mask: 1 },
            ]
        );
    }
}
