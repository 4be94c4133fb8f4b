use super::archiver_for;
use crate::catalog::ScenarioCatalog;
use crate::error::OrchestratorError;
use crate::ledger::CrashLedger;
use crate::settings::Settings;
use serde::Serialize;

/// Archive state of one scenario, read without touching anything
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CensusEntry {
    pub scenario: String,
    pub folder: String,
    pub target_seeds: u32,
    /// Highest `seed<N>` ordinal present
    pub existing_seeds: u32,
    /// Index the next archive would allocate
    pub next_slot: u32,
    /// Crashes recorded in the ledger for this scenario
    pub recorded_crashes: usize,
}

/// Census of every catalog scenario's archive folder
pub fn census(
    settings: &Settings,
    catalog: &ScenarioCatalog,
) -> Result<Vec<CensusEntry>, OrchestratorError> {
    let archiver = archiver_for(settings);
    let crashes = CrashLedger::new(settings.crash_ledger_path()).entries()?;

    catalog
        .iter()
        .map(|scenario| {
            let folder = scenario.folder_name();
            let census_err = |source| OrchestratorError::Census {
                scenario: scenario.name.clone(),
                source,
            };
            Ok(CensusEntry {
                scenario: scenario.name.clone(),
                target_seeds: scenario.target_seeds,
                existing_seeds: archiver.count_existing_seeds(&folder).map_err(census_err)?,
                next_slot: archiver.next_slot_index(&folder).map_err(census_err)?,
                recorded_crashes: crashes.iter().filter(|c| c.scenario == scenario.name).count(),
                folder,
            })
        })
        .collect()
}
