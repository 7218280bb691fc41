// Error taxonomy shared by every derivation in the engine.

use thiserror::Error;

use crate::context::League;

/// Failures reported to the caller. Legitimate zero-denominator cases are not
/// errors; they produce the sentinel values documented on each record.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum EngineError {
    #[error("no constants available for season {season}{}", league_suffix(.league))]
    ConstantsUnavailable {
        season: u16,
        league: Option<League>,
    },

    #[error("insufficient sample: {what}")]
    InsufficientSample { what: String },

    #[error("win expectancy state not found: {detail}")]
    StateNotFound { detail: String },

    #[error("malformed event sequence at event {event_index}: {reason}")]
    MalformedEventSequence { event_index: u32, reason: String },

    #[error("invalid context: {0}")]
    InvalidContext(String),
}

pub type Result<T> = std::result::Result<T, EngineError>;

fn league_suffix(league: &Option<League>) -> String {
    match league {
        Some(l) => format!(" ({l})"),
        None => String::new(),
    }
}

impl EngineError {
    pub(crate) fn malformed(event_index: u32, reason: impl Into<String>) -> Self {
        EngineError::MalformedEventSequence {
            event_index,
            reason: reason.into(),
        }
    }

    pub(crate) fn insufficient(what: impl Into<String>) -> Self {
        EngineError::InsufficientSample { what: what.into() }
    }
}
