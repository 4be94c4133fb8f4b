//! seedbatch
//!
//! Crash-tolerant batch orchestrator for an external Monte-Carlo simulator.
//! For every scenario of a catalog it rewrites the simulator's control file
//! with a fresh seed, runs the simulator, decides from the primary output
//! artifact whether the run completed, and moves the outputs of completed
//! runs into numbered `seed<N>` slots. Crashed runs are logged to a crash
//! ledger and retried with the next seed.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use seedbatch::prelude::*;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let settings = Settings::load("seedbatch.toml")?;
//! let catalog = ScenarioCatalog::load("scenarios.yaml")?;
//! let runner = ProcessRunner::new(
//!     settings.simulator.executable.clone(),
//!     settings.simulator.work_dir.clone(),
//! );
//!
//! let report = Orchestrator::new(settings, runner).run_all(&catalog);
//! println!("{}", report.generate_text());
//! # Ok(())
//! # }
//! ```

pub mod archive;
pub mod catalog;
pub mod control_file;
pub mod error;
pub mod ledger;
pub mod orchestrator;
pub mod outcome;
pub mod runner;
pub mod settings;
pub mod state_machine;
pub mod types;

// Re-exports
pub use error::*;
pub use types::*;

/// Everything needed to configure and run a batch
pub mod prelude {
    pub use crate::archive::{ArchivedSlot, SeedArchiver, SlotManifest};
    pub use crate::catalog::ScenarioCatalog;
    pub use crate::control_file::{ControlKey, Rewrite};
    pub use crate::error::{AttemptError, OrchestratorError};
    pub use crate::ledger::{CrashLedger, CrashRecord};
    pub use crate::orchestrator::{
        census, BatchReport, CensusEntry, Orchestrator, ScenarioFailure, ScenarioSummary,
    };
    pub use crate::outcome::{Outcome, OutcomeDetector, ReadinessPolicy};
    pub use crate::runner::{ProcessResult, ProcessRunner, SimulationRunner};
    pub use crate::settings::{SeedPolicy, Settings};
    pub use crate::types::{RunParameters, RunPhase, ScenarioSpec};
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
