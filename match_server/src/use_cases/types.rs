// Use-case level inputs/outputs for the match task.

use super::roster::RosterEntry;
use crate::domain::{Geometry, MatchError, PitchConfig, Score, Snapshot, Team};
use tokio::sync::{mpsc, oneshot};

pub type ConnId = u64;

/// Reply to a join request: the full state for the new connection, or why it was refused.
pub type JoinReply = Result<HelloState, MatchError>;

/// Commands flowing from connections into the single match task.
#[derive(Debug)]
pub enum GameEvent {
    Join {
        conn_id: ConnId,
        user: String,
        // Per-connection channel for replies addressed to this socket only.
        direct_tx: mpsc::Sender<ServerEvent>,
        reply: oneshot::Sender<JoinReply>,
    },
    Leave {
        conn_id: ConnId,
    },
    Chat {
        conn_id: ConnId,
        message: String,
    },
    PickSeat {
        conn_id: ConnId,
        seat: usize,
    },
    Start {
        conn_id: ConnId,
    },
    Stop {
        conn_id: ConnId,
    },
    Options {
        conn_id: ConnId,
        config: PitchConfig,
    },
    Key {
        conn_id: ConnId,
        code: u32,
        pressed: bool,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub user: String,
    pub message: String,
    /// Milliseconds since the Unix epoch.
    pub timestamp: u64,
}

/// Everything a freshly joined client needs to render the current match.
#[derive(Debug, Clone, PartialEq)]
pub struct HelloState {
    pub users: Vec<RosterEntry>,
    pub seats: Vec<Option<String>>,
    pub score: Score,
    pub running: bool,
    pub config: PitchConfig,
    pub ground: Geometry,
    pub messages: Vec<ChatMessage>,
}

/// Events produced by the match service for connected clients.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerEvent {
    UserChanged(Vec<RosterEntry>),
    PickPlayer(Vec<Option<String>>),
    MatchStart,
    MatchStop,
    Goal(Score),
    Winner(Team),
    Options {
        config: PitchConfig,
        ground: Geometry,
    },
    Positions(Snapshot),
    Message(ChatMessage),
    Error { code: &'static str, message: String },
}

impl From<&MatchError> for ServerEvent {
    fn from(err: &MatchError) -> Self {
        ServerEvent::Error {
            code: err.code(),
            message: err.to_string(),
        }
    }
}

/// Where an event produced by the match service goes.
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    Broadcast(ServerEvent),
    Direct(ConnId, ServerEvent),
}

/// Summary published for the HTTP status route.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct MatchStatus {
    pub running: bool,
    pub score: Score,
    pub players: usize,
}
