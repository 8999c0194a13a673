use std::time::Duration;

use thiserror::Error;

/// Failures surfaced by the screening engine. None of these are fatal to the host;
/// each one leaves the session in a state the caller can render and act on.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// Session setup data is missing or out of range. The session stays in `Setup`.
    #[error("validation error: {0}")]
    Validation(String),

    /// No usable detection for distance estimation or eye isolation.
    #[error("sensing unavailable: {0}")]
    SensingUnavailable(String),

    /// Network or non-success response from the classifier. The session stays in `BothComplete`.
    #[error("classification failed: {0}")]
    ClassificationFailure(String),

    #[error("classification timed out after {0:?}")]
    ClassificationTimeout(Duration),

    /// A classifier request for this session is already outstanding.
    #[error("a classification request is already in flight")]
    ClassificationInFlight,

    /// An answer that cannot correspond to the current question or trial.
    #[error("inconsistent answer state: {0}")]
    InconsistentAnswerState(String),

    #[error("cannot {action} while session is {state}")]
    InvalidTransition {
        action: &'static str,
        state: &'static str,
    },

    #[error("no active screening session")]
    NoActiveSession,
}

impl EngineError {
    /// Whether repeating the same call later can succeed without other input changing.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            EngineError::ClassificationFailure(_)
                | EngineError::ClassificationTimeout(_)
                | EngineError::SensingUnavailable(_)
        )
    }
}
