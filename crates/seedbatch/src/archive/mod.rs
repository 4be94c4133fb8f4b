//! Seed-indexed archive
//!
//! Layout: `<target_root>/<scenario_folder>/seed<N>/<artifact files>`.
//!
//! The next slot index is derived from a census of the scenario folder, never
//! from in-memory counters: it is the number of entries directly under the
//! folder plus one. Slots are created with `create_dir`, so an index that
//! already exists (irregular folders, or a second orchestrator racing on the
//! same tree) fails with [`ArchiveError::SlotOccupied`] instead of being
//! overwritten.
//!
//! [`SeedArchiver::count_existing_seeds`] answers a different question: the
//! highest `seed<N>` ordinal present. The two differ on irregular folders
//! (`seed1, seed2, seed5` gives next index 4 but highest ordinal 5).

mod manifest;

pub use manifest::{SlotManifest, MANIFEST_FILE};

use crate::error::ArchiveError;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Slot name prefix
pub const SLOT_PREFIX: &str = "seed";

/// A freshly filled archive slot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchivedSlot {
    /// 1-based slot index
    pub index: u32,
    pub path: PathBuf,
    /// Listed artifacts moved into the slot
    pub moved: Vec<String>,
    /// Listed artifacts that were not present in the source directory
    pub skipped: Vec<String>,
}

/// Moves run artifacts from the simulator's directory into seed slots
#[derive(Debug, Clone)]
pub struct SeedArchiver {
    target_root: PathBuf,
    source_dir: PathBuf,
    artifacts: Vec<String>,
}

impl SeedArchiver {
    /// Only files named in `artifacts` are ever moved out of `source_dir`.
    pub fn new(
        target_root: impl Into<PathBuf>,
        source_dir: impl Into<PathBuf>,
        artifacts: Vec<String>,
    ) -> Self {
        Self {
            target_root: target_root.into(),
            source_dir: source_dir.into(),
            artifacts,
        }
    }

    #[inline]
    #[must_use]
    pub fn target_root(&self) -> &Path {
        &self.target_root
    }

    #[inline]
    #[must_use]
    pub fn scenario_dir(&self, scenario_folder: &str) -> PathBuf {
        self.target_root.join(scenario_folder)
    }

    /// Allocate the next slot for `scenario_folder` and move the listed
    /// artifacts into it. Absent artifacts are skipped, not errors.
    ///
    /// # Errors
    /// [`ArchiveError`] if the folder or slot cannot be created, the slot
    /// already exists, or a move fails. A failed move leaves a partial slot;
    /// [`ArchiveError::PartialMove`] lists what was already moved.
    pub fn archive(&self, scenario_folder: &str) -> Result<ArchivedSlot, ArchiveError> {
        let scenario_dir = self.scenario_dir(scenario_folder);
        fs::create_dir_all(&scenario_dir).map_err(|source| ArchiveError::CreateFolder {
            path: scenario_dir.clone(),
            source,
        })?;

        let index = self.next_slot_index(scenario_folder)?;
        let slot = scenario_dir.join(slot_name(index));
        fs::create_dir(&slot).map_err(|source| {
            if source.kind() == io::ErrorKind::AlreadyExists {
                ArchiveError::SlotOccupied { path: slot.clone() }
            } else {
                ArchiveError::CreateSlot {
                    path: slot.clone(),
                    source,
                }
            }
        })?;

        let mut moved = Vec::new();
        let mut skipped = Vec::new();
        for name in &self.artifacts {
            let from = self.source_dir.join(name);
            if !from.is_file() {
                tracing::debug!("Artifact {} not present, skipping", from.display());
                skipped.push(name.clone());
                continue;
            }

            if let Err(source) = move_file(&from, &slot.join(name)) {
                tracing::warn!(
                    "Partial archive in {}: {} moved before '{}' failed",
                    slot.display(),
                    moved.len(),
                    name
                );
                return Err(ArchiveError::PartialMove {
                    slot,
                    file: name.clone(),
                    moved,
                    source,
                });
            }
            moved.push(name.clone());
        }

        tracing::info!(
            "Archived {} file(s) into {}",
            moved.len(),
            slot.display()
        );
        Ok(ArchivedSlot {
            index,
            path: slot,
            moved,
            skipped,
        })
    }

    /// Index the next `archive` call will allocate: entry count plus one.
    pub fn next_slot_index(&self, scenario_folder: &str) -> Result<u32, ArchiveError> {
        let scenario_dir = self.scenario_dir(scenario_folder);
        if !scenario_dir.exists() {
            return Ok(1);
        }
        let count = read_entries(&scenario_dir)?.len();
        Ok(u32::try_from(count).unwrap_or(u32::MAX - 1) + 1)
    }

    /// Highest `seed<N>` ordinal under the scenario folder, 0 when none.
    ///
    /// Read-only; used to resume seed numbering across invocations.
    pub fn count_existing_seeds(&self, scenario_folder: &str) -> Result<u32, ArchiveError> {
        Ok(self
            .slots(scenario_folder)?
            .into_iter()
            .map(|(n, _)| n)
            .max()
            .unwrap_or(0))
    }

    /// Existing `seed<N>` slot directories, sorted by N
    pub fn slots(&self, scenario_folder: &str) -> Result<Vec<(u32, PathBuf)>, ArchiveError> {
        let scenario_dir = self.scenario_dir(scenario_folder);
        if !scenario_dir.exists() {
            return Ok(Vec::new());
        }

        let mut slots: Vec<(u32, PathBuf)> = read_entries(&scenario_dir)?
            .into_iter()
            .filter(|p| p.is_dir())
            .filter_map(|p| {
                let n = p.file_name().and_then(|n| n.to_str()).and_then(slot_ordinal)?;
                Some((n, p))
            })
            .collect();
        slots.sort_by_key(|(n, _)| *n);
        Ok(slots)
    }

    /// Record which attempt filled `slot`
    pub fn write_manifest(
        &self,
        slot: &ArchivedSlot,
        manifest: &SlotManifest,
    ) -> Result<(), ArchiveError> {
        manifest.write_to(&slot.path)
    }

    /// Highest simulator seed recorded by any slot manifest of the folder.
    ///
    /// Unreadable manifests are logged and ignored.
    pub fn highest_recorded_seed(
        &self,
        scenario_folder: &str,
    ) -> Result<Option<u64>, ArchiveError> {
        let mut highest = None;
        for (_, slot) in self.slots(scenario_folder)? {
            match SlotManifest::read_from(&slot) {
                Ok(Some(m)) => highest = highest.max(Some(m.seed)),
                Ok(None) => {}
                Err(e) => tracing::warn!("Ignoring manifest in {}: {}", slot.display(), e),
            }
        }
        Ok(highest)
    }
}

/// `seed<N>` for a 1-based index
#[inline]
#[must_use]
pub fn slot_name(index: u32) -> String {
    format!("{SLOT_PREFIX}{index}")
}

/// Parse `seed<N>` into N; anything else is not a slot
#[must_use]
pub fn slot_ordinal(name: &str) -> Option<u32> {
    let digits = name.strip_prefix(SLOT_PREFIX)?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

fn read_entries(dir: &Path) -> Result<Vec<PathBuf>, ArchiveError> {
    let read_err = |source| ArchiveError::ReadDir {
        path: dir.to_path_buf(),
        source,
    };
    fs::read_dir(dir)
        .map_err(read_err)?
        .map(|entry| entry.map(|e| e.path()).map_err(read_err))
        .collect()
}

/// Rename, falling back to copy + remove across filesystems
fn move_file(from: &Path, to: &Path) -> io::Result<()> {
    match fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(rename_err) => {
            fs::copy(from, to).map_err(|_| rename_err)?;
            fs::remove_file(from)
        }
    }
}
