//! Core data types shared by the orchestrator components

use serde::{Deserialize, Serialize};
use std::fmt;

/// A named run configuration, created once from the catalog and never mutated
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioSpec {
    /// Scenario name (catalog key)
    pub name: String,
    /// Number of successful seeds to accumulate
    pub target_seeds: u32,
    /// Beam energy in MeV, in its textual form
    pub energy: String,
    /// Beam particle name
    pub particle: String,
    /// Histories per run
    pub histories: u64,
}

impl ScenarioSpec {
    /// Create new scenario spec
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        target_seeds: u32,
        energy: impl Into<String>,
        particle: impl Into<String>,
        histories: u64,
    ) -> Self {
        Self {
            name: name.into(),
            target_seeds,
            energy: energy.into(),
            particle: particle.into(),
            histories,
        }
    }

    /// Archive folder for this scenario: `<name>_<energy>_<particle>`
    #[inline]
    #[must_use]
    pub fn folder_name(&self) -> String {
        format!("{}_{}_{}", self.name, self.energy, self.particle)
    }

    /// Control-file parameters for a run of this scenario with `seed`
    #[must_use]
    pub fn parameters(&self, seed: u64) -> RunParameters {
        RunParameters {
            seed,
            energy: self.energy.clone(),
            particle: self.particle.clone(),
            histories: self.histories,
        }
    }
}

/// Values substituted into the simulator control file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunParameters {
    pub seed: u64,
    pub energy: String,
    pub particle: String,
    pub histories: u64,
}

/// One configure → run → evaluate cycle, discarded after evaluation
#[derive(Debug, Clone, Copy)]
pub struct RunAttempt<'a> {
    pub scenario: &'a ScenarioSpec,
    /// Seed injected into the simulator (not the archive slot index)
    pub seed: u64,
    /// 1-based, counts every attempt of the scenario
    pub ordinal: u32,
}

impl RunAttempt<'_> {
    #[inline]
    #[must_use]
    pub fn parameters(&self) -> RunParameters {
        self.scenario.parameters(self.seed)
    }
}

impl fmt::Display for RunAttempt<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} seed {} (attempt {})",
            self.scenario.name, self.seed, self.ordinal
        )
    }
}

/// Per-scenario loop counters; a fresh value for every scenario
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ScenarioCounters {
    /// Every attempt, whatever its outcome
    pub tries: u32,
    /// Confirmed completed and archived runs
    pub successful: u32,
    /// Runs classified as crashed
    pub crashed: u32,
}

impl ScenarioCounters {
    /// Count a new attempt and return its 1-based ordinal
    #[inline]
    pub fn begin_attempt(&mut self) -> u32 {
        self.tries += 1;
        self.tries
    }

    #[inline]
    pub fn record_success(&mut self) {
        self.successful += 1;
    }

    #[inline]
    pub fn record_crash(&mut self) {
        self.crashed += 1;
    }

    /// Whether `target` successful seeds have been reached
    #[inline]
    #[must_use]
    pub fn is_complete(&self, target: u32) -> bool {
        self.successful >= target
    }
}

/// Orchestrator phases for one scenario
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RunPhase {
    Idle,
    Configuring,
    Running,
    Evaluating,
    Archiving,
    Retrying,
    Done,
    Failed,
}

impl RunPhase {
    /// All phases, in declaration order
    pub const ALL: [RunPhase; 8] = [
        RunPhase::Idle,
        RunPhase::Configuring,
        RunPhase::Running,
        RunPhase::Evaluating,
        RunPhase::Archiving,
        RunPhase::Retrying,
        RunPhase::Done,
        RunPhase::Failed,
    ];
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn folder_name_joins_name_energy_particle() {
        let spec = ScenarioSpec::new("S1", 2, "6", "proton", 1000);
        assert_eq!(spec.folder_name(), "S1_6_proton");
    }

    #[test]
    fn counters_track_tries_and_successes_separately() {
        let mut counters = ScenarioCounters::default();
        assert_eq!(counters.begin_attempt(), 1);
        counters.record_crash();
        assert_eq!(counters.begin_attempt(), 2);
        counters.record_success();

        assert_eq!(counters.tries, 2);
        assert_eq!(counters.successful, 1);
        assert_eq!(counters.crashed, 1);
        assert!(counters.is_complete(1));
        assert!(!counters.is_complete(2));
    }

    #[test]
    fn attempt_display() {
        let spec = ScenarioSpec::new("S1", 2, "6", "proton", 1000);
        let attempt = RunAttempt {
            scenario: &spec,
            seed: 4,
            ordinal: 5,
        };
        assert_eq!(attempt.to_string(), "S1 seed 4 (attempt 5)");
        assert_eq!(attempt.parameters().seed, 4);
    }
}
