//! Run orchestrator
//!
//! Drives each scenario through the loop
//! `Configuring → Running → Evaluating → {Archiving | Retrying}` until the
//! scenario's target number of successful seeds is archived:
//!
//! 1. Rewrite the control file with the current seed and scenario parameters
//! 2. Run the simulator and wait for it
//! 3. Classify the run from its primary artifact
//! 4. On completion, allocate the next seed slot and move the artifacts;
//!    on a crash, record the seed in the crash ledger and retry
//!
//! The injected seed advances after every attempt. Crashes are the only
//! condition absorbed by the loop; control-file, launch and archive failures
//! end the scenario with the seed and attempt ordinal attached.
//!
//! Everything is sequential: one scenario at a time, one attempt at a time.

mod census;
mod report;

pub use census::{census, CensusEntry};
pub use report::{BatchReport, ScenarioFailure, ScenarioSummary};

use crate::archive::{ArchivedSlot, SeedArchiver, SlotManifest};
use crate::catalog::ScenarioCatalog;
use crate::control_file;
use crate::error::{AttemptError, LedgerError, OrchestratorError};
use crate::ledger::{CrashLedger, CrashRecord};
use crate::outcome::{Outcome, OutcomeDetector};
use crate::runner::{ProcessResult, SimulationRunner};
use crate::settings::{SeedPolicy, Settings};
use crate::state_machine::PhaseTracker;
use crate::types::{RunAttempt, RunPhase, ScenarioCounters, ScenarioSpec};
use chrono::Utc;
use std::fs;
use std::io;

/// Sequential batch runner over a scenario catalog
#[derive(Debug)]
pub struct Orchestrator<R> {
    settings: Settings,
    runner: R,
    detector: OutcomeDetector,
    archiver: SeedArchiver,
    ledger: CrashLedger,
}

impl<R: SimulationRunner> Orchestrator<R> {
    pub fn new(settings: Settings, runner: R) -> Self {
        let detector = OutcomeDetector::new(settings.readiness_policy());
        let archiver = archiver_for(&settings);
        let ledger = CrashLedger::new(settings.crash_ledger_path());
        Self {
            settings,
            runner,
            detector,
            archiver,
            ledger,
        }
    }

    #[inline]
    #[must_use]
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    #[inline]
    #[must_use]
    pub fn runner(&self) -> &R {
        &self.runner
    }

    #[inline]
    #[must_use]
    pub fn ledger(&self) -> &CrashLedger {
        &self.ledger
    }

    /// Run every scenario of the catalog in declaration order.
    ///
    /// Stops at the first failed scenario unless `keep_going` is set and the
    /// failure is scenario-scoped; scenarios never started are reported as
    /// skipped.
    pub fn run_all(&self, catalog: &ScenarioCatalog) -> BatchReport {
        let mut report = BatchReport::default();
        let mut pending = catalog.iter();

        for scenario in pending.by_ref() {
            match self.run_scenario(scenario) {
                Ok(summary) => report.summaries.push(summary),
                Err(err) => {
                    tracing::error!("{}", err);
                    let continue_batch = self.settings.retry.keep_going && err.is_scenario_scoped();
                    report.failures.push(ScenarioFailure::new(scenario, &err));
                    if !continue_batch {
                        break;
                    }
                }
            }
        }

        report.skipped = pending.map(|s| s.name.clone()).collect();
        if !report.skipped.is_empty() {
            tracing::warn!("Batch stopped early; not started: {:?}", report.skipped);
        } else if report.failures.is_empty() {
            tracing::info!("All the simulations were finished");
        }
        report
    }

    /// Run one scenario until `target_seeds` runs are archived.
    ///
    /// # Errors
    /// [`OrchestratorError::Attempt`] for control-file, launch, archive or
    /// ledger failures; [`OrchestratorError::RetryLimitExceeded`] when the
    /// configured attempt cap is reached first.
    pub fn run_scenario(&self, scenario: &ScenarioSpec) -> Result<ScenarioSummary, OrchestratorError> {
        let folder = scenario.folder_name();
        let mut phases = PhaseTracker::new(&scenario.name);
        let mut counters = ScenarioCounters::default();
        let start_seed = self.starting_seed(scenario, &folder)?;
        let mut seed = start_seed;
        let mut slots = Vec::with_capacity(scenario.target_seeds as usize);

        tracing::info!(
            "Starting simulation for scenario {} ({} MeV {}, {} histories, {} seed(s)) at seed {}",
            scenario.name,
            scenario.energy,
            scenario.particle,
            scenario.histories,
            scenario.target_seeds,
            start_seed
        );

        phases.advance(RunPhase::Configuring)?;
        loop {
            if let Some(limit) = self.settings.retry.max_attempts {
                if counters.tries >= limit {
                    phases.advance(RunPhase::Failed)?;
                    return Err(OrchestratorError::RetryLimitExceeded {
                        scenario: scenario.name.clone(),
                        limit,
                        successful: counters.successful,
                        target: scenario.target_seeds,
                    });
                }
            }

            let attempt = RunAttempt {
                scenario,
                seed,
                ordinal: counters.begin_attempt(),
            };
            let fail = |phases: &mut PhaseTracker, source: AttemptError| {
                if let Err(e) = phases.advance(RunPhase::Failed) {
                    tracing::error!("{}", e);
                }
                OrchestratorError::Attempt {
                    scenario: scenario.name.clone(),
                    seed: attempt.seed,
                    attempt: attempt.ordinal,
                    source,
                }
            };

            let (outcome, process) = match self.execute(&attempt, &mut phases) {
                Ok(result) => result,
                Err(e) => return Err(fail(&mut phases, e)),
            };

            match outcome {
                Outcome::Completed => {
                    phases.advance(RunPhase::Archiving)?;
                    let slot = match self.archive(&attempt, &folder) {
                        Ok(slot) => slot,
                        Err(e) => return Err(fail(&mut phases, e)),
                    };
                    counters.record_success();
                    slots.push(slot.index);
                    tracing::info!(
                        "Simulation was successful: {} archived as seed{} ({}/{})",
                        attempt,
                        slot.index,
                        counters.successful,
                        scenario.target_seeds
                    );
                }
                Outcome::Crashed => {
                    phases.advance(RunPhase::Retrying)?;
                    counters.record_crash();
                    tracing::warn!(
                        "Simulation crashed: {} (exit {:?}); starting a new seed",
                        attempt,
                        process.exit_code
                    );
                    if let Err(e) = self.record_crash(&attempt, process) {
                        return Err(fail(&mut phases, e.into()));
                    }
                }
            }

            seed += 1;
            if counters.is_complete(scenario.target_seeds) {
                phases.advance(RunPhase::Done)?;
                break;
            }
            phases.advance(RunPhase::Configuring)?;
        }
        phases.advance(RunPhase::Idle)?;

        tracing::info!(
            "Finishing simulations for {}: {} tries, {} successful",
            scenario.name,
            counters.tries,
            counters.successful
        );

        Ok(ScenarioSummary {
            scenario: scenario.name.clone(),
            folder,
            tries: counters.tries,
            successful: counters.successful,
            crashed: counters.crashed,
            start_seed,
            next_seed: seed,
            slots,
        })
    }

    /// Seed for the scenario's first attempt, per the configured policy.
    ///
    /// Under [`SeedPolicy::ArchiveCensus`] this is past every seed the
    /// scenario has already used: the highest slot ordinal, and one past the
    /// highest seed found in a slot manifest or in the crash ledger.
    pub fn starting_seed(&self, scenario: &ScenarioSpec, folder: &str) -> Result<u64, OrchestratorError> {
        match self.settings.retry.seed_policy {
            SeedPolicy::Sequential => Ok(0),
            SeedPolicy::ArchiveCensus => {
                let census_err = |source| OrchestratorError::Census {
                    scenario: scenario.name.clone(),
                    source,
                };
                let existing = self.archiver.count_existing_seeds(folder).map_err(census_err)?;
                let recorded = self
                    .archiver
                    .highest_recorded_seed(folder)
                    .map_err(census_err)?;
                let crashed = self
                    .ledger
                    .entries_for(&scenario.name)?
                    .into_iter()
                    .map(|r| r.seed)
                    .max();
                let after_used = recorded.max(crashed).map_or(0, |s| s + 1);
                Ok(u64::from(existing).max(after_used))
            }
        }
    }

    /// Configure, run and evaluate one attempt
    fn execute(
        &self,
        attempt: &RunAttempt<'_>,
        phases: &mut PhaseTracker,
    ) -> Result<(Outcome, ProcessResult), AttemptError> {
        let control_path = self.settings.control_file_path();
        self.clear_stale_artifact()?;
        control_file::apply(&control_path, &attempt.parameters())?;

        phases.advance(RunPhase::Running)?;
        tracing::info!(
            "Starting simulation for seed {}. Trying for the {}. time",
            attempt.seed,
            attempt.ordinal
        );
        let process = self.runner.run(&control_path)?;

        phases.advance(RunPhase::Evaluating)?;
        tracing::debug!("Simulation finished, checking for crashes");
        let outcome = self.detector.evaluate(&self.settings.expected_artifact_path());
        Ok((outcome, process))
    }

    fn archive(&self, attempt: &RunAttempt<'_>, folder: &str) -> Result<ArchivedSlot, AttemptError> {
        let slot = self.archiver.archive(folder)?;
        if !slot.skipped.is_empty() {
            tracing::warn!(
                "seed{} of {} is missing {:?}",
                slot.index,
                folder,
                slot.skipped
            );
        }

        let manifest = SlotManifest {
            scenario: attempt.scenario.name.clone(),
            seed: attempt.seed,
            attempt: attempt.ordinal,
            slot: slot.index,
            archived_at: Utc::now(),
        };
        self.archiver.write_manifest(&slot, &manifest)?;
        Ok(slot)
    }

    fn record_crash(
        &self,
        attempt: &RunAttempt<'_>,
        process: ProcessResult,
    ) -> Result<(), LedgerError> {
        self.ledger.append(&CrashRecord {
            scenario: attempt.scenario.name.clone(),
            particle: attempt.scenario.particle.clone(),
            energy: attempt.scenario.energy.clone(),
            seed: attempt.seed,
            attempt: attempt.ordinal,
            exit_code: process.exit_code,
            recorded_at: Utc::now(),
        })
    }

    /// Remove a leftover expected artifact so it cannot pass for fresh output
    fn clear_stale_artifact(&self) -> Result<(), AttemptError> {
        if !self.settings.archive.clear_stale_artifact {
            return Ok(());
        }
        let path = self.settings.expected_artifact_path();
        match fs::remove_file(&path) {
            Ok(()) => {
                tracing::debug!("Removed stale {}", path.display());
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(AttemptError::StaleArtifact { path, source }),
        }
    }
}

pub(crate) fn archiver_for(settings: &Settings) -> SeedArchiver {
    SeedArchiver::new(
        settings.archive.target_root.clone(),
        settings.simulator.work_dir.clone(),
        settings.archive.artifacts.clone(),
    )
}
