// Domain-level errors for match workflows. All of them are recoverable.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchError {
    // Seat out of range, or input addressed a seat without an active player body.
    InvalidSeat(usize),
    DuplicateIdentity(String),
    // Pitch constraints violated; the previous config stays in effect.
    InvalidConfig(String),
    EngineAlreadyRunning,
    EngineNotRunning,
}

impl MatchError {
    /// Stable machine-readable code sent to clients alongside the message.
    pub fn code(&self) -> &'static str {
        match self {
            MatchError::InvalidSeat(_) => "invalid_seat",
            MatchError::DuplicateIdentity(_) => "duplicate_identity",
            MatchError::InvalidConfig(_) => "invalid_config",
            MatchError::EngineAlreadyRunning => "engine_already_running",
            MatchError::EngineNotRunning => "engine_not_running",
        }
    }
}

impl fmt::Display for MatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchError::InvalidSeat(seat) => {
                write!(f, "seat {seat} is out of range or has no active player")
            }
            MatchError::DuplicateIdentity(user) => write!(f, "user '{user}' is already connected"),
            MatchError::InvalidConfig(reason) => write!(f, "invalid pitch config: {reason}"),
            MatchError::EngineAlreadyRunning => write!(f, "match is already running"),
            MatchError::EngineNotRunning => write!(f, "match is not running"),
        }
    }
}

impl std::error::Error for MatchError {}
