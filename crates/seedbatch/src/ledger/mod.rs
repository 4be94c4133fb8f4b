//! Append-only record of crashed seeds, one JSON object per line.

use crate::error::LedgerError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrashRecord {
    pub scenario: String,
    pub particle: String,
    pub energy: String,
    pub seed: u64,
    pub attempt: u32,
    pub exit_code: Option<i32>,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CrashLedger {
    path: PathBuf,
}

impl CrashLedger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[inline]
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, record: &CrashRecord) -> Result<(), LedgerError> {
        let mut line = serde_json::to_string(record)?;
        line.push('\n');

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| self.io_error(e))?;
        file.write_all(line.as_bytes()).map_err(|e| self.io_error(e))?;
        Ok(())
    }

    /// All records in append order; an absent ledger is empty.
    pub fn entries(&self) -> Result<Vec<CrashRecord>, LedgerError> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(self.io_error(e)),
        };

        text.lines()
            .enumerate()
            .filter(|(_, l)| !l.trim().is_empty())
            .map(|(i, l)| {
                serde_json::from_str(l).map_err(|source| LedgerError::Decode {
                    path: self.path.clone(),
                    line: i + 1,
                    source,
                })
            })
            .collect()
    }

    /// Records belonging to one scenario
    pub fn entries_for(&self, scenario: &str) -> Result<Vec<CrashRecord>, LedgerError> {
        Ok(self
            .entries()?
            .into_iter()
            .filter(|r| r.scenario == scenario)
            .collect())
    }

    fn io_error(&self, source: io::Error) -> LedgerError {
        LedgerError::Io {
            path: self.path.clone(),
            source,
        }
    }
}
