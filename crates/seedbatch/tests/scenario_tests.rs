//! Whole-batch behaviour with a scripted simulator

use pretty_assertions::assert_eq;
use seedbatch::error::RunnerError;
use seedbatch::prelude::*;
use seedbatch_test_utils::{write_outputs, TestWorkspace, CONTROL_TEMPLATE, PRIMARY_ARTIFACT};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};

/// What the stand-in simulator does on one invocation
#[derive(Debug, Clone, Copy)]
enum Step {
    Complete,
    /// Empty primary artifact
    CrashEmpty,
    /// No artifacts at all
    CrashSilent,
    LaunchFailure,
}

/// Plays back a fixed sequence of steps and records the seed of each call
#[derive(Debug)]
struct ScriptedRunner {
    work_dir: PathBuf,
    steps: RefCell<VecDeque<Step>>,
    seeds: RefCell<Vec<u64>>,
}

impl ScriptedRunner {
    fn new(work_dir: PathBuf, steps: impl IntoIterator<Item = Step>) -> Self {
        Self {
            work_dir,
            steps: RefCell::new(steps.into_iter().collect()),
            seeds: RefCell::new(Vec::new()),
        }
    }

    fn seeds(&self) -> Vec<u64> {
        self.seeds.borrow().clone()
    }

    fn remaining(&self) -> usize {
        self.steps.borrow().len()
    }
}

fn injected_seed(control_file: &Path) -> u64 {
    fs::read_to_string(control_file)
        .unwrap()
        .lines()
        .filter(|l| !l.trim_start().starts_with('#'))
        .find_map(|l| {
            let (key, value) = l.split_once('=')?;
            key.contains("Seed").then(|| value.trim().parse().ok())?
        })
        .unwrap()
}

impl SimulationRunner for ScriptedRunner {
    fn run(&self, control_file: &Path) -> Result<ProcessResult, RunnerError> {
        let seed = injected_seed(control_file);
        self.seeds.borrow_mut().push(seed);
        let step = self
            .steps
            .borrow_mut()
            .pop_front()
            .expect("simulator invoked more often than scripted");

        match step {
            Step::Complete => write_outputs(&self.work_dir, seed),
            Step::CrashEmpty => fs::write(self.work_dir.join(PRIMARY_ARTIFACT), b"").unwrap(),
            Step::CrashSilent => {}
            Step::LaunchFailure => {
                return Err(RunnerError::Launch {
                    executable: PathBuf::from("topas"),
                    source: std::io::Error::from(std::io::ErrorKind::PermissionDenied),
                })
            }
        }
        Ok(ProcessResult { exit_code: Some(0) })
    }
}

fn settings(ws: &TestWorkspace) -> Settings {
    Settings::new()
        .with_work_dir(ws.work_dir())
        .with_target_root(ws.target_root())
        .with_readiness(1, 0)
}

fn catalog(yaml: &str) -> ScenarioCatalog {
    ScenarioCatalog::from_yaml_str(yaml, "scenarios.yaml").unwrap()
}

#[test]
fn test_crash_then_two_completions() {
    let ws = TestWorkspace::new();
    ws.write_control_file(CONTROL_TEMPLATE);
    let runner = ScriptedRunner::new(
        ws.work_dir(),
        [Step::CrashEmpty, Step::Complete, Step::Complete],
    );
    let orch = Orchestrator::new(settings(&ws), runner);

    let report = orch.run_all(&catalog(
        "S1:\n  seeds: 2\n  energy: 6\n  particle: proton\n  histories: 1000\n",
    ));

    assert!(report.passed());
    let s1 = &report.summaries[0];
    assert_eq!((s1.tries, s1.successful), (3, 2));
    assert_eq!(ws.slot_names("S1_6_proton"), vec!["seed1", "seed2"]);

    // Each slot holds the artifacts of the seed it was archived from
    let slot2 = ws.target_root().join("S1_6_proton/seed2");
    assert_eq!(
        fs::read_to_string(slot2.join("DNADamage_sdd.txt")).unwrap(),
        "seed 2\n"
    );
    let manifest = SlotManifest::read_from(&slot2).unwrap().unwrap();
    assert_eq!((manifest.seed, manifest.attempt, manifest.slot), (2, 3, 2));

    // Work directory is emptied of artifacts after archiving
    assert!(!ws.work_dir().join(PRIMARY_ARTIFACT).exists());

    let crashes = orch.ledger().entries().unwrap();
    assert_eq!(crashes.len(), 1);
    assert_eq!(crashes[0].seed, 0);
    assert_eq!(crashes[0].particle, "proton");
}

#[test]
fn test_seeds_are_distinct_and_increasing() {
    let ws = TestWorkspace::new();
    ws.write_control_file(CONTROL_TEMPLATE);
    let runner = ScriptedRunner::new(
        ws.work_dir(),
        [
            Step::CrashSilent,
            Step::CrashEmpty,
            Step::Complete,
            Step::CrashSilent,
            Step::Complete,
        ],
    );
    let orch = Orchestrator::new(settings(&ws), runner);
    let spec = ScenarioSpec::new("S1", 2, "6", "proton", 10);

    let summary = orch.run_scenario(&spec).unwrap();
    assert_eq!(summary.tries, 5);
    assert_eq!(summary.crashed, 3);
    assert_eq!(summary.next_seed, 5);
}

#[test]
fn test_scenarios_run_in_declaration_order() {
    let ws = TestWorkspace::new();
    ws.write_control_file(CONTROL_TEMPLATE);
    let runner = ScriptedRunner::new(ws.work_dir(), [Step::Complete, Step::Complete]);
    let orch = Orchestrator::new(settings(&ws), runner);

    let report = orch.run_all(&catalog(
        "B:\n  seeds: 1\n  energy: 10\n  particle: alpha\n  histories: 5\n\
         A:\n  seeds: 1\n  energy: 6\n  particle: proton\n  histories: 5\n",
    ));

    let order: Vec<_> = report.summaries.iter().map(|s| s.scenario.as_str()).collect();
    assert_eq!(order, vec!["B", "A"]);
    assert_eq!(ws.slot_names("B_10_alpha"), vec!["seed1"]);
    assert_eq!(ws.slot_names("A_6_proton"), vec!["seed1"]);
}

#[test]
fn test_failure_stops_batch_by_default() {
    let ws = TestWorkspace::new();
    ws.write_control_file(CONTROL_TEMPLATE);
    let runner = ScriptedRunner::new(ws.work_dir(), [Step::LaunchFailure]);
    let orch = Orchestrator::new(settings(&ws), runner);

    let report = orch.run_all(&catalog(
        "S1:\n  seeds: 1\n  energy: 6\n  particle: proton\n  histories: 5\n\
         S2:\n  seeds: 1\n  energy: 6\n  particle: proton\n  histories: 5\n",
    ));

    assert!(!report.passed());
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].scenario, "S1");
    assert!(report.failures[0].error.contains("seed 0"));
    assert_eq!(report.skipped, vec!["S2".to_string()]);
}

#[test]
fn test_keep_going_moves_to_next_scenario() {
    let ws = TestWorkspace::new();
    ws.write_control_file(CONTROL_TEMPLATE);
    let runner = ScriptedRunner::new(
        ws.work_dir(),
        [Step::CrashEmpty, Step::CrashEmpty, Step::Complete],
    );
    let orch = Orchestrator::new(
        settings(&ws)
            .with_keep_going(true)
            .with_max_attempts(Some(2)),
        runner,
    );

    let report = orch.run_all(&catalog(
        "S1:\n  seeds: 1\n  energy: 6\n  particle: proton\n  histories: 5\n\
         S2:\n  seeds: 1\n  energy: 10\n  particle: alpha\n  histories: 5\n",
    ));

    assert!(!report.passed());
    assert_eq!(report.failures[0].scenario, "S1");
    assert!(report.skipped.is_empty());
    assert_eq!(report.summaries.len(), 1);
    assert_eq!(report.summaries[0].scenario, "S2");
    assert_eq!(ws.slot_names("S2_10_alpha"), vec!["seed1"]);
}

#[test]
fn test_numbering_continues_after_existing_slots() {
    let ws = TestWorkspace::new();
    ws.write_control_file(CONTROL_TEMPLATE);
    ws.seed_slots("S1_6_proton", &[1, 2, 3]);
    let runner = ScriptedRunner::new(ws.work_dir(), [Step::Complete, Step::Complete]);
    let orch = Orchestrator::new(settings(&ws), runner);
    let spec = ScenarioSpec::new("S1", 2, "6", "proton", 10);

    let summary = orch.run_scenario(&spec).unwrap();
    assert_eq!(summary.slots, vec![4, 5]);
    assert_eq!(summary.start_seed, 3);
    assert_eq!(
        ws.slot_names("S1_6_proton"),
        vec!["seed1", "seed2", "seed3", "seed4", "seed5"]
    );
}

#[test]
fn test_irregular_archive_is_never_overwritten() {
    let ws = TestWorkspace::new();
    ws.write_control_file(CONTROL_TEMPLATE);
    let folder = ws.seed_slots("S1_6_proton", &[1, 3]);
    fs::write(folder.join("seed3/marker"), b"keep").unwrap();
    let runner = ScriptedRunner::new(ws.work_dir(), [Step::Complete]);
    let orch = Orchestrator::new(settings(&ws), runner);

    let err = orch
        .run_scenario(&ScenarioSpec::new("S1", 1, "6", "proton", 10))
        .unwrap_err();
    assert!(matches!(
        err,
        OrchestratorError::Attempt {
            source: AttemptError::Archive(seedbatch::ArchiveError::SlotOccupied { .. }),
            ..
        }
    ));
    assert_eq!(fs::read(folder.join("seed3/marker")).unwrap(), b"keep");
}

#[test]
fn test_census_matches_archive() {
    let ws = TestWorkspace::new();
    ws.write_control_file(CONTROL_TEMPLATE);
    let runner = ScriptedRunner::new(
        ws.work_dir(),
        [Step::CrashSilent, Step::Complete],
    );
    let settings = settings(&ws);
    let cat = catalog("S1:\n  seeds: 1\n  energy: 6\n  particle: proton\n  histories: 5\n");
    let orch = Orchestrator::new(settings.clone(), runner);
    assert!(orch.run_all(&cat).passed());

    let entries = census(&settings, &cat).unwrap();
    assert_eq!(entries[0].existing_seeds, 1);
    assert_eq!(entries[0].next_slot, 2);
    assert_eq!(entries[0].recorded_crashes, 1);
}

#[test]
fn test_runner_sees_every_attempt() {
    let ws = TestWorkspace::new();
    ws.write_control_file(CONTROL_TEMPLATE);
    let runner = ScriptedRunner::new(
        ws.work_dir(),
        [Step::CrashEmpty, Step::Complete],
    );
    let orch = Orchestrator::new(settings(&ws).with_seed_policy(SeedPolicy::Sequential), runner);
    orch.run_scenario(&ScenarioSpec::new("S1", 1, "6", "proton", 10))
        .unwrap();
    assert_eq!(orch_runner_seeds(&orch), vec![0, 1]);
}

fn orch_runner_seeds(orch: &Orchestrator<ScriptedRunner>) -> Vec<u64> {
    let runner = orch.runner();
    assert_eq!(runner.remaining(), 0);
    runner.seeds()
}
