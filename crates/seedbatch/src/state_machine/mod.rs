use crate::error::StateMachineError;
use crate::types::RunPhase;

/// Validates a phase transition of the orchestrator loop.
pub fn validate_transition(from: RunPhase, to: RunPhase) -> Result<(), StateMachineError> {
    if allowed(from, to) {
        Ok(())
    } else {
        Err(StateMachineError::IllegalTransition { from, to })
    }
}

pub fn allowed_transitions(from: RunPhase) -> Vec<RunPhase> {
    use RunPhase::*;
    match from {
        Idle => vec![Configuring],
        Configuring => vec![Running, Failed],
        Running => vec![Evaluating, Failed],
        Evaluating => vec![Archiving, Retrying],
        Archiving => vec![Configuring, Done, Failed],
        Retrying => vec![Configuring, Failed],
        Done => vec![Idle],
        Failed => vec![],
    }
}

fn allowed(from: RunPhase, to: RunPhase) -> bool {
    allowed_transitions(from).into_iter().any(|s| s == to)
}

/// Current phase of one scenario loop, advanced only through legal transitions.
#[derive(Debug)]
pub struct PhaseTracker {
    scenario: String,
    phase: RunPhase,
}

impl PhaseTracker {
    pub fn new(scenario: impl Into<String>) -> Self {
        Self {
            scenario: scenario.into(),
            phase: RunPhase::Idle,
        }
    }

    #[inline]
    #[must_use]
    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    pub fn advance(&mut self, to: RunPhase) -> Result<(), StateMachineError> {
        validate_transition(self.phase, to)?;
        tracing::trace!("{}: {:?} -> {:?}", self.scenario, self.phase, to);
        self.phase = to;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracker_follows_success_path() {
        let mut t = PhaseTracker::new("S1");
        for to in [
            RunPhase::Configuring,
            RunPhase::Running,
            RunPhase::Evaluating,
            RunPhase::Archiving,
            RunPhase::Done,
            RunPhase::Idle,
        ] {
            t.advance(to).unwrap();
        }
        assert_eq!(t.phase(), RunPhase::Idle);
    }

    #[test]
    fn tracker_rejects_skipping_evaluation() {
        let mut t = PhaseTracker::new("S1");
        t.advance(RunPhase::Configuring).unwrap();
        t.advance(RunPhase::Running).unwrap();

        let err = t.advance(RunPhase::Archiving).unwrap_err();
        assert_eq!(
            err,
            StateMachineError::IllegalTransition {
                from: RunPhase::Running,
                to: RunPhase::Archiving,
            }
        );
        assert_eq!(t.phase(), RunPhase::Running);
    }

    #[test]
    fn failed_is_terminal() {
        assert!(allowed_transitions(RunPhase::Failed).is_empty());
    }
}
