//! Run outcome classification
//!
//! A run is [`Outcome::Completed`] iff the expected primary artifact exists
//! with a nonzero size; otherwise it is [`Outcome::Crashed`]. The simulator's
//! exit status is deliberately ignored.
//!
//! The artifact is probed up to [`ReadinessPolicy::probes`] times. A nonzero
//! size seen on two consecutive probes completes early; the last probe
//! applies the plain existence-and-size rule.

use serde::Serialize;
use std::fs;
use std::path::Path;
use std::thread;
use std::time::Duration;

/// Classification of a finished run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Outcome {
    Completed,
    Crashed,
}

/// How long to wait for the artifact to settle after the process exits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadinessPolicy {
    pub probes: u32,
    pub interval: Duration,
}

impl ReadinessPolicy {
    /// Single check, no waiting
    #[must_use]
    pub const fn immediate() -> Self {
        Self {
            probes: 1,
            interval: Duration::ZERO,
        }
    }
}

impl Default for ReadinessPolicy {
    fn default() -> Self {
        Self {
            probes: 3,
            interval: Duration::from_millis(500),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct OutcomeDetector {
    policy: ReadinessPolicy,
}

impl OutcomeDetector {
    #[must_use]
    pub fn new(policy: ReadinessPolicy) -> Self {
        Self { policy }
    }

    /// Classify a run from its expected artifact. Has no side effects.
    #[must_use]
    pub fn evaluate(&self, artifact: &Path) -> Outcome {
        let probes = self.policy.probes.max(1);
        let mut previous: Option<u64> = None;

        for probe in 1..=probes {
            if probe > 1 && !self.policy.interval.is_zero() {
                thread::sleep(self.policy.interval);
            }

            let size = artifact_size(artifact);
            tracing::debug!(
                "Readiness probe {}/{} on {}: {:?}",
                probe,
                probes,
                artifact.display(),
                size
            );

            match size {
                Some(n) if n > 0 => {
                    if probe == probes || previous == Some(n) {
                        return Outcome::Completed;
                    }
                    previous = Some(n);
                }
                _ => previous = None,
            }
        }

        Outcome::Crashed
    }
}

/// Size of a regular file, `None` when absent or unreadable
fn artifact_size(path: &Path) -> Option<u64> {
    match fs::metadata(path) {
        Ok(meta) if meta.is_file() => Some(meta.len()),
        Ok(_) => None,
        Err(e) => {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!("Cannot stat {}: {}", path.display(), e);
            }
            None
        }
    }
}
