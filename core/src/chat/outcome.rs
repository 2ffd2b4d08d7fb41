use std::fmt;
use tracing::warn;

/// Steps of the per-message flow that talk to an external collaborator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Intention,
    Arguments,
    Execution,
    Draft,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Intention => "intention",
            Stage::Arguments => "arguments",
            Stage::Execution => "execution",
            Stage::Draft => "draft",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a stage that never fails outward: either the real value or a
/// scripted fallback together with the reason it was used.
#[derive(Debug, Clone, PartialEq)]
pub enum StageOutcome<T> {
    Completed(T),
    Degraded { fallback: T, reason: String },
}

impl<T> StageOutcome<T> {
    /// Settle a fallible stage, logging the failure when the fallback is taken
    pub fn from_result<E: fmt::Display>(
        stage: Stage,
        result: Result<T, E>,
        fallback: impl FnOnce() -> T,
    ) -> Self {
        match result {
            Ok(value) => StageOutcome::Completed(value),
            Err(e) => {
                let reason = e.to_string();
                warn!(target: "chat_orchestrator", %stage, error = %reason, "Stage failed; using fallback");
                StageOutcome::Degraded {
                    fallback: fallback(),
                    reason,
                }
            }
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, StageOutcome::Degraded { .. })
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            StageOutcome::Completed(_) => None,
            StageOutcome::Degraded { reason, .. } => Some(reason),
        }
    }

    pub fn value(&self) -> &T {
        match self {
            StageOutcome::Completed(value) => value,
            StageOutcome::Degraded { fallback, .. } => fallback,
        }
    }

    pub fn into_value(self) -> T {
        match self {
            StageOutcome::Completed(value) => value,
            StageOutcome::Degraded { fallback, .. } => fallback,
        }
    }
}
