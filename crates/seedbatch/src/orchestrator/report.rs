use crate::error::OrchestratorError;
use crate::types::ScenarioSpec;
use serde::Serialize;

/// Outcome of one scenario that reached its target
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScenarioSummary {
    pub scenario: String,
    pub folder: String,
    pub tries: u32,
    pub successful: u32,
    pub crashed: u32,
    /// Seed injected on the first attempt
    pub start_seed: u64,
    /// Seed the next attempt would have used
    pub next_seed: u64,
    /// Slot indices filled, in order
    pub slots: Vec<u32>,
}

/// A scenario that stopped before reaching its target
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScenarioFailure {
    pub scenario: String,
    pub error: String,
}

impl ScenarioFailure {
    pub fn new(scenario: &ScenarioSpec, error: &OrchestratorError) -> Self {
        Self {
            scenario: scenario.name.clone(),
            error: error.to_string(),
        }
    }
}

/// Result of a whole batch
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub summaries: Vec<ScenarioSummary>,
    pub failures: Vec<ScenarioFailure>,
    /// Scenarios never started because the batch stopped early
    pub skipped: Vec<String>,
}

impl BatchReport {
    /// Every scenario reached its target
    #[must_use]
    pub fn passed(&self) -> bool {
        self.failures.is_empty() && self.skipped.is_empty()
    }

    #[must_use]
    pub fn total_tries(&self) -> u32 {
        self.summaries.iter().map(|s| s.tries).sum()
    }

    #[must_use]
    pub fn total_successful(&self) -> u32 {
        self.summaries.iter().map(|s| s.successful).sum()
    }

    pub fn generate_text(&self) -> String {
        let mut report = String::new();

        report.push_str("=== seedbatch Report ===\n\n");
        for s in &self.summaries {
            report.push_str(&format!("Scenario: {}\n", s.scenario));
            report.push_str(&format!("  Folder: {}\n", s.folder));
            report.push_str(&format!("  Total amount of tries: {}\n", s.tries));
            report.push_str(&format!("  Successful simulations: {}\n", s.successful));
            report.push_str(&format!("  Crashed simulations: {}\n", s.crashed));
            report.push_str(&format!(
                "  Seeds: {}..{}\n",
                s.start_seed,
                s.next_seed.saturating_sub(1)
            ));
            if let (Some(first), Some(last)) = (s.slots.first(), s.slots.last()) {
                report.push_str(&format!("  Slots: seed{first}..seed{last}\n"));
            }
        }

        if !self.failures.is_empty() {
            report.push_str("\n=== Failures ===\n");
            for (i, f) in self.failures.iter().enumerate() {
                report.push_str(&format!("{}. {}: {}\n", i + 1, f.scenario, f.error));
            }
        }

        if !self.skipped.is_empty() {
            report.push_str(&format!("\nNot started: {}\n", self.skipped.join(", ")));
        }

        report.push_str(&format!(
            "\nTotal: {} tries, {} successful\n",
            self.total_tries(),
            self.total_successful()
        ));
        report.push_str(&format!(
            "\n=== Result: {} ===\n",
            if self.passed() { "PASS" } else { "FAIL" }
        ));

        report
    }
}
