//! Orchestrator settings
//!
//! Loaded from TOML; every field has a default so an empty file (or no file)
//! is valid. CLI flags override individual fields through the `with_*`
//! builders.
//!
//! ```toml
//! crash_ledger = "outputs/crashed_seeds.jsonl"
//!
//! [simulator]
//! executable = "/opt/topas/bin/topas"
//! control_file = "run.txt"
//! work_dir = "."
//!
//! [archive]
//! target_root = "outputs"
//! expected_artifact = "DNADamage.phsp"
//! artifacts = ["DNADamage.phsp", "DNADamage.header", "DNADamage_full.csv", "DNADamage_sdd.txt"]
//! clear_stale_artifact = true
//!
//! [retry]
//! max_attempts = 50
//! seed_policy = "archive-census"
//! keep_going = false
//!
//! [readiness]
//! probes = 3
//! interval_ms = 500
//! ```

use crate::error::SettingsError;
use crate::outcome::ReadinessPolicy;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Name of the crash ledger under the target root when not configured
pub const DEFAULT_CRASH_LEDGER: &str = "crashed_seeds.jsonl";

/// How the injected simulator seed is chosen for a scenario's first attempt.
///
/// Both policies advance the seed by one after every attempt, crashed or not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SeedPolicy {
    /// Start at 0 for every scenario
    Sequential,
    /// Resume after the archive: the highest slot ordinal, or one past the
    /// highest seed any slot manifest recorded, whichever is larger
    #[default]
    ArchiveCensus,
}

impl SeedPolicy {
    pub const VARIANTS: [&'static str; 2] = ["sequential", "archive-census"];
}

impl fmt::Display for SeedPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Sequential => "sequential",
            Self::ArchiveCensus => "archive-census",
        })
    }
}

impl FromStr for SeedPolicy {
    type Err = SettingsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sequential" => Ok(Self::Sequential),
            "archive-census" => Ok(Self::ArchiveCensus),
            other => Err(SettingsError::Invalid(format!(
                "unknown seed policy '{other}' (expected one of {:?})",
                Self::VARIANTS
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimulatorSettings {
    /// Simulator binary
    pub executable: PathBuf,
    /// Control file, relative to `work_dir` unless absolute
    pub control_file: PathBuf,
    /// Directory the simulator runs in and writes artifacts to
    pub work_dir: PathBuf,
}

impl Default for SimulatorSettings {
    fn default() -> Self {
        Self {
            executable: PathBuf::from("topas"),
            control_file: PathBuf::from("run.txt"),
            work_dir: PathBuf::from("."),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ArchiveSettings {
    pub target_root: PathBuf,
    /// Files moved into each seed slot
    pub artifacts: Vec<String>,
    /// File whose nonzero size marks a completed run
    pub expected_artifact: String,
    /// Delete a leftover expected artifact before each launch
    pub clear_stale_artifact: bool,
}

impl Default for ArchiveSettings {
    fn default() -> Self {
        Self {
            target_root: PathBuf::from("outputs"),
            artifacts: vec![
                "DNADamage.phsp".to_string(),
                "DNADamage.header".to_string(),
                "DNADamage_full.csv".to_string(),
                "DNADamage_sdd.txt".to_string(),
            ],
            expected_artifact: "DNADamage.phsp".to_string(),
            clear_stale_artifact: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetrySettings {
    /// Attempts allowed per scenario; unbounded when absent
    pub max_attempts: Option<u32>,
    pub seed_policy: SeedPolicy,
    /// Continue with the next scenario after a scenario-scoped failure
    pub keep_going: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReadinessSettings {
    pub probes: u32,
    pub interval_ms: u64,
}

impl Default for ReadinessSettings {
    fn default() -> Self {
        let policy = ReadinessPolicy::default();
        Self {
            probes: policy.probes,
            interval_ms: u64::try_from(policy.interval.as_millis()).unwrap_or(u64::MAX),
        }
    }
}

/// Full orchestrator configuration
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub simulator: SimulatorSettings,
    pub archive: ArchiveSettings,
    pub retry: RetrySettings,
    pub readiness: ReadinessSettings,
    /// Defaults to `<target_root>/crashed_seeds.jsonl`
    pub crash_ledger: Option<PathBuf>,
}

impl Settings {
    /// Create default settings
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load settings from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let settings = Self::from_toml_str(&text, path)?;
        tracing::debug!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    /// Parse TOML settings; `origin` only labels errors
    pub fn from_toml_str(text: &str, origin: impl Into<PathBuf>) -> Result<Self, SettingsError> {
        let settings: Self = toml::from_str(text).map_err(|source| SettingsError::Parse {
            path: origin.into(),
            source,
        })?;
        settings.validate()?;
        Ok(settings)
    }

    /// Reject settings the orchestrator cannot work with
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.archive.expected_artifact.trim().is_empty() {
            return Err(SettingsError::Invalid(
                "archive.expected_artifact must not be empty".into(),
            ));
        }
        if self.retry.max_attempts == Some(0) {
            return Err(SettingsError::Invalid(
                "retry.max_attempts must be at least 1".into(),
            ));
        }
        if self.archive.artifacts.iter().any(|a| a.contains('/') || a.contains('\\')) {
            return Err(SettingsError::Invalid(
                "archive.artifacts must be plain file names".into(),
            ));
        }
        Ok(())
    }

    /// Control file path as seen from the orchestrator's directory
    #[must_use]
    pub fn control_file_path(&self) -> PathBuf {
        self.simulator.work_dir.join(&self.simulator.control_file)
    }

    /// Expected primary artifact in the work directory
    #[must_use]
    pub fn expected_artifact_path(&self) -> PathBuf {
        self.simulator.work_dir.join(&self.archive.expected_artifact)
    }

    #[must_use]
    pub fn crash_ledger_path(&self) -> PathBuf {
        self.crash_ledger
            .clone()
            .unwrap_or_else(|| self.archive.target_root.join(DEFAULT_CRASH_LEDGER))
    }

    #[must_use]
    pub fn readiness_policy(&self) -> ReadinessPolicy {
        ReadinessPolicy {
            probes: self.readiness.probes,
            interval: Duration::from_millis(self.readiness.interval_ms),
        }
    }

    #[inline]
    #[must_use]
    pub fn with_executable(mut self, executable: impl Into<PathBuf>) -> Self {
        self.simulator.executable = executable.into();
        self
    }

    #[inline]
    #[must_use]
    pub fn with_control_file(mut self, control_file: impl Into<PathBuf>) -> Self {
        self.simulator.control_file = control_file.into();
        self
    }

    #[inline]
    #[must_use]
    pub fn with_work_dir(mut self, work_dir: impl Into<PathBuf>) -> Self {
        self.simulator.work_dir = work_dir.into();
        self
    }

    #[inline]
    #[must_use]
    pub fn with_target_root(mut self, target_root: impl Into<PathBuf>) -> Self {
        self.archive.target_root = target_root.into();
        self
    }

    #[inline]
    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: Option<u32>) -> Self {
        self.retry.max_attempts = max_attempts;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_seed_policy(mut self, policy: SeedPolicy) -> Self {
        self.retry.seed_policy = policy;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_keep_going(mut self, keep_going: bool) -> Self {
        self.retry.keep_going = keep_going;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_readiness(mut self, probes: u32, interval_ms: u64) -> Self {
        self.readiness = ReadinessSettings {
            probes,
            interval_ms,
        };
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn empty_document_gives_defaults() {
        let settings = Settings::from_toml_str("", "seedbatch.toml").unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.retry.seed_policy, SeedPolicy::ArchiveCensus);
        assert_eq!(settings.retry.max_attempts, None);
        assert_eq!(
            settings.crash_ledger_path(),
            PathBuf::from("outputs").join(DEFAULT_CRASH_LEDGER)
        );
    }

    #[test]
    fn partial_sections_merge_with_defaults() {
        let text = r#"
[simulator]
executable = "/opt/topas/bin/topas"

[retry]
max_attempts = 20
seed_policy = "sequential"
"#;
        let settings = Settings::from_toml_str(text, "seedbatch.toml").unwrap();
        assert_eq!(settings.simulator.executable, PathBuf::from("/opt/topas/bin/topas"));
        assert_eq!(settings.simulator.control_file, PathBuf::from("run.txt"));
        assert_eq!(settings.retry.max_attempts, Some(20));
        assert_eq!(settings.retry.seed_policy, SeedPolicy::Sequential);
        assert_eq!(settings.archive.artifacts.len(), 4);
    }

    #[test]
    fn unknown_keys_rejected() {
        let err = Settings::from_toml_str("[retry]\nmax_retries = 3\n", "seedbatch.toml")
            .unwrap_err();
        assert!(matches!(err, SettingsError::Parse { .. }));
    }

    #[test]
    fn zero_attempt_cap_rejected() {
        let err = Settings::from_toml_str("[retry]\nmax_attempts = 0\n", "seedbatch.toml")
            .unwrap_err();
        assert!(matches!(err, SettingsError::Invalid(_)));
    }

    #[test]
    fn paths_resolve_against_work_dir() {
        let settings = Settings::new().with_work_dir("/sim");
        assert_eq!(settings.control_file_path(), PathBuf::from("/sim/run.txt"));
        assert_eq!(
            settings.expected_artifact_path(),
            PathBuf::from("/sim/DNADamage.phsp")
        );
    }

    #[test]
    fn seed_policy_parses_cli_names() {
        for name in SeedPolicy::VARIANTS {
            let policy: SeedPolicy = name.parse().unwrap();
            assert_eq!(policy.to_string(), name);
        }
        assert!("random".parse::<SeedPolicy>().is_err());
    }
}
