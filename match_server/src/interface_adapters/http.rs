// Plain HTTP routes next to the WebSocket endpoint.

use crate::interface_adapters::state::AppState;
use crate::use_cases::MatchStatus;
use axum::{Json, extract::State};
use std::sync::Arc;

pub async fn status_handler(State(state): State<Arc<AppState>>) -> Json<MatchStatus> {
    // Clone right away so the watch lock is not held while responding.
    let status = state.status_tx.borrow().clone();
    Json(status)
}
