use crate::use_cases::{GameEvent, MatchStatus};
use axum::extract::ws::Utf8Bytes;
use tokio::sync::{broadcast, mpsc, watch};

#[derive(Clone)]
pub struct AppState {
    // Commands flowing from connections into the match task.
    pub input_tx: mpsc::Sender<GameEvent>,
    // Serialized server events, shared across all connections.
    pub event_bytes_tx: broadcast::Sender<Utf8Bytes>,
    // Latest serialized positions for lag recovery.
    pub positions_latest_tx: watch::Sender<Utf8Bytes>,
    // Match summary kept current by the match task.
    pub status_tx: watch::Sender<MatchStatus>,
}
