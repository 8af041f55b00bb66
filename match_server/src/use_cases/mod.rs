// Use cases layer: match workflows between the wire and the simulation.

pub mod board;
pub mod game;
pub mod roster;
pub mod service;
pub mod types;

pub use board::{Board, BoardSettings};
pub use roster::{Roster, RosterEntry};
pub use service::{MatchService, MatchSettings};
pub use types::{ChatMessage, ConnId, GameEvent, HelloState, JoinReply, MatchStatus, ServerEvent};
