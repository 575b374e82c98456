use crate::core::race::RaceStatus;
use thiserror::Error;

/// Problems with a race configuration. `UnknownDuration` is non-fatal: the caller receives the
/// fallback configuration together with this value.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigurationError {
    #[error("unsupported race duration {requested_secs}s, falling back to {fallback_secs}s")]
    UnknownDuration {
        requested_secs: u32,
        fallback_secs: u32,
    },

    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

/// Setup input that does not allow the race to start. Meant to be shown to the user as is.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SetupValidationError {
    #[error("at least {min} entrants are required, got {got}")]
    InsufficientEntrants { got: usize, min: usize },

    #[error("no more than {max} entrants are allowed")]
    TooManyEntrants { max: usize },

    #[error("entrant name must not be empty")]
    EmptyName,

    #[error("pick at least one rank for the multi-rank selection")]
    NoWinSelection,

    #[error("cannot {action} while the race is in state {state:?}")]
    InvalidTransition {
        action: &'static str,
        state: RaceStatus,
    },
}
