use crate::error::ArchiveError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::Path;

/// File written into every slot the orchestrator fills
pub const MANIFEST_FILE: &str = "attempt.json";

/// Which attempt produced a slot's artifacts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotManifest {
    pub scenario: String,
    /// Seed injected into the simulator
    pub seed: u64,
    pub attempt: u32,
    pub slot: u32,
    pub archived_at: DateTime<Utc>,
}

impl SlotManifest {
    pub(crate) fn write_to(&self, slot_dir: &Path) -> Result<(), ArchiveError> {
        let path = slot_dir.join(MANIFEST_FILE);
        let json = serde_json::to_string_pretty(self)?;
        fs::write(&path, json).map_err(|source| ArchiveError::Manifest { path, source })
    }

    /// `Ok(None)` when the slot has no manifest (e.g. archived by hand)
    pub fn read_from(slot_dir: &Path) -> Result<Option<Self>, ArchiveError> {
        let path = slot_dir.join(MANIFEST_FILE);
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(ArchiveError::Manifest { path, source }),
        };
        Ok(Some(serde_json::from_str(&text)?))
    }
}
