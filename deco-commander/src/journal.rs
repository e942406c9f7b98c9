//! # Decision Journal
//!
//! Append-only JSON-lines record of every orchestration cycle. Unlike the
//! in-memory network, the journal survives across runs and can be replayed
//! for analysis.

use crate::orchestrator::CycleReport;
use deco_error::{Error, ErrorKind, Result};
use std::fs::OpenOptions;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct DecisionJournal {
    path: PathBuf,
}

impl DecisionJournal {
    /// Open (or create) a journal at `path`, creating parent directories.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                Error::new(ErrorKind::StorageFailed, format!("failed to create journal dir: {}", e))
                    .with_operation("journal::open")
                    .with_context("path", parent.display().to_string())
                    .set_source(e)
            })?;
        }
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one cycle as a single JSON line.
    pub fn append(&self, report: &CycleReport) -> Result<()> {
        let line = serde_json::to_string(report)?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| self.storage_error("journal::append", e))?;
        writeln!(file, "{}", line).map_err(|e| self.storage_error("journal::append", e))?;
        Ok(())
    }

    /// Read every record back, oldest first. A missing file is an empty journal.
    pub fn read_all(&self) -> Result<Vec<CycleReport>> {
        let file = match std::fs::File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(self.storage_error("journal::read_all", e)),
        };

        let mut records = Vec::new();
        for (index, line) in BufReader::new(file).lines().enumerate() {
            let line = line.map_err(|e| self.storage_error("journal::read_all", e))?;
            if line.trim().is_empty() {
                continue;
            }
            let record: CycleReport = serde_json::from_str(&line).map_err(|e| {
                Error::from(e)
                    .with_operation("journal::read_all")
                    .with_context("line", (index + 1).to_string())
            })?;
            records.push(record);
        }
        Ok(records)
    }

    fn storage_error(&self, operation: &'static str, err: std::io::Error) -> Error {
        Error::new(ErrorKind::StorageFailed, err.to_string())
            .with_operation(operation)
            .with_context("path", self.path.display().to_string())
            .set_source(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::Command;
    use crate::executor::DispatchOutcome;
    use chrono::Utc;

    fn report(cycle: usize) -> CycleReport {
        CycleReport {
            cycle,
            timestamp: Utc::now(),
            command: Command::do_nothing("idle"),
            outcome: DispatchOutcome::Idle,
            telemetry: Vec::new(),
        }
    }

    #[test]
    fn test_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let journal = DecisionJournal::open(dir.path().join("none.jsonl")).unwrap();
        assert!(journal.read_all().unwrap().is_empty());
    }

    #[test]
    fn test_append_and_read() {
        let dir = tempfile::tempdir().unwrap();
        let journal = DecisionJournal::open(dir.path().join("a/b/journal.jsonl")).unwrap();
        journal.append(&report(1)).unwrap();
        journal.append(&report(2)).unwrap();

        let records = journal.read_all().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].cycle, 2);

        let raw = std::fs::read_to_string(journal.path()).unwrap();
        assert_eq!(raw.lines().count(), 2);
    }

    #[test]
    fn test_corrupt_line_reports_position() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("journal.jsonl");
        let journal = DecisionJournal::open(&path).unwrap();
        journal.append(&report(1)).unwrap();
        std::fs::OpenOptions::new()
            .append(true)
            .open(&path)
            .unwrap()
            .write_all(b"{oops\n")
            .unwrap();

        let err = journal.read_all().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SerializationFailed);
        assert_eq!(err.context_value("line"), Some("2"));
    }
}
