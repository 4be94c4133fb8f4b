//! Error types for seedbatch
//!
//! One error enum per component. Run-time failures are aggregated by
//! [`OrchestratorError`]; catalog and settings errors surface before a run
//! starts and go straight to the caller:
//! - Scenario catalog loading ([`CatalogError`])
//! - Control file rewriting ([`ControlFileError`])
//! - Simulator launch ([`RunnerError`])
//! - Seed archiving ([`ArchiveError`])
//! - Crash ledger I/O ([`LedgerError`])
//! - Settings loading ([`SettingsError`])
//!
//! A crashed run is not an error: it is [`crate::outcome::Outcome::Crashed`],
//! counted and retried by the orchestrator.

use crate::types::RunPhase;
use std::path::PathBuf;

/// Scenario catalog could not be loaded (`ConfigParseError`)
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    /// Catalog file missing or unreadable
    #[error("io error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Document is not a mapping of scenario name to scenario entry
    #[error("malformed scenario catalog {path}: {message}")]
    Malformed { path: PathBuf, message: String },

    /// A scenario entry lacks one of the required fields
    #[error("scenario '{scenario}' is missing required field '{field}'")]
    MissingField {
        scenario: String,
        field: &'static str,
    },

    /// A count field is below 1
    #[error("scenario '{scenario}': '{field}' must be at least 1, got {value}")]
    OutOfRange {
        scenario: String,
        field: &'static str,
        value: i64,
    },
}

impl CatalogError {
    /// Create malformed-document error for path
    pub fn malformed(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        Self::Malformed {
            path: path.into(),
            message: message.to_string(),
        }
    }
}

/// Control file could not be read or rewritten (`ConfigWriteError`)
#[derive(Debug, thiserror::Error)]
pub enum ControlFileError {
    #[error("cannot read control file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file may be partially written when this is returned
    #[error("cannot rewrite control file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Simulator could not be started or waited on (`ProcessLaunchError`)
#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    #[error("failed to launch simulator {executable}: {source}")]
    Launch {
        executable: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to wait on simulator {executable}: {source}")]
    Wait {
        executable: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Archiving a completed run failed (`ArchiveIOError`)
#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    /// Scenario folder under the target root could not be created
    #[error("cannot create scenario folder {path}: {source}")]
    CreateFolder {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot list {path}: {source}")]
    ReadDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The slot computed from the directory census already exists
    #[error("seed slot {path} already exists; refusing to overwrite")]
    SlotOccupied { path: PathBuf },

    #[error("cannot create seed slot {path}: {source}")]
    CreateSlot {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A move failed partway; `moved` lists files already in the slot
    #[error("partial archive in {slot}: moving '{file}' failed after {moved:?}: {source}")]
    PartialMove {
        slot: PathBuf,
        file: String,
        moved: Vec<String>,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot write slot manifest {path}: {source}")]
    Manifest {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot encode slot manifest: {0}")]
    ManifestEncode(#[from] serde_json::Error),
}

/// Crash ledger could not be appended to or read
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("crash ledger {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot encode crash record: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("crash ledger {path} line {line}: {source}")]
    Decode {
        path: PathBuf,
        line: usize,
        #[source]
        source: serde_json::Error,
    },
}

/// Orchestrator settings could not be loaded
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("io error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid settings in {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid setting: {0}")]
    Invalid(String),
}

/// Illegal orchestrator phase transition
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StateMachineError {
    #[error("illegal phase transition {from:?} -> {to:?}")]
    IllegalTransition { from: RunPhase, to: RunPhase },
}

/// Failure of a single configure → run → evaluate → archive cycle
#[derive(Debug, thiserror::Error)]
pub enum AttemptError {
    #[error(transparent)]
    ControlFile(#[from] ControlFileError),

    #[error(transparent)]
    Launch(#[from] RunnerError),

    #[error(transparent)]
    Archive(#[from] ArchiveError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("cannot clear stale artifact {path}: {source}")]
    StaleArtifact {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    StateMachine(#[from] StateMachineError),
}

/// Main orchestrator error type
#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    /// Archive census failed before the first attempt of a scenario
    #[error("scenario '{scenario}': archive census failed: {source}")]
    Census {
        scenario: String,
        #[source]
        source: ArchiveError,
    },

    /// A fatal failure inside one attempt, with enough context to resume by hand
    #[error("scenario '{scenario}' failed at seed {seed} (attempt {attempt}): {source}")]
    Attempt {
        scenario: String,
        seed: u64,
        attempt: u32,
        #[source]
        source: AttemptError,
    },

    #[error(
        "scenario '{scenario}' gave up after {limit} attempts ({successful}/{target} seeds archived)"
    )]
    RetryLimitExceeded {
        scenario: String,
        limit: u32,
        successful: u32,
        target: u32,
    },

    #[error("crash ledger: {0}")]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    StateMachine(#[from] StateMachineError),
}

impl OrchestratorError {
    /// Whether the error only concerns the scenario it occurred in.
    ///
    /// With `keep_going` the batch moves on to the next scenario after a
    /// scenario-scoped failure; anything else stops the batch.
    #[inline]
    #[must_use]
    pub fn is_scenario_scoped(&self) -> bool {
        matches!(
            self,
            Self::Census { .. } | Self::Attempt { .. } | Self::RetryLimitExceeded { .. }
        )
    }

}
