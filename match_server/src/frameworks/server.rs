// Framework bootstrap for the match server runtime.

use crate::domain::PitchConfig;
use crate::frameworks::config;
use crate::interface_adapters::http::status_handler;
use crate::interface_adapters::net::{event_serializer, ws_handler};
use crate::interface_adapters::state::AppState;
use crate::use_cases::game::match_task;
use crate::use_cases::{
    BoardSettings, GameEvent, MatchService, MatchSettings, MatchStatus, ServerEvent,
};

use axum::{Router, extract::ws::Utf8Bytes, routing::get};
use std::net::SocketAddr;
use std::{io::Result, sync::Arc};
use tokio::sync::{broadcast, mpsc, watch};

fn init_runtime() {
    let _ = dotenvy::dotenv();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let json = matches!(std::env::var("LOG_FORMAT").as_deref(), Ok("json"));
    if json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .json()
            .with_current_span(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .compact()
            .init();
    }

    std::panic::set_hook(Box::new(|info| {
        let backtrace = std::backtrace::Backtrace::capture();
        tracing::error!(%info, ?backtrace, "panic");
    }));
}

pub async fn run(listener: tokio::net::TcpListener) -> Result<()> {
    let address = listener.local_addr()?;
    let state = build_state()?;
    let app = Router::new()
        .route("/ws", get(ws_handler))
        .route("/status", get(status_handler))
        .with_state(state);

    tracing::info!(%address, "listening");

    // Serve app and report errors rather than panicking
    axum::serve(listener, app).await.inspect_err(|e| {
        tracing::error!(error = %e, "server error");
    })
}

pub async fn run_with_config() -> Result<()> {
    init_runtime();

    let address = SocketAddr::from(([127, 0, 0, 1], config::http_port()));

    let listener = tokio::net::TcpListener::bind(address)
        .await
        .inspect_err(|e| {
            tracing::error!(%address, error = %e, "failed to bind");
        })?;

    run(listener).await
}

fn build_state() -> Result<Arc<AppState>> {
    let service = MatchService::new(
        PitchConfig::default(),
        MatchSettings {
            board: BoardSettings {
                pause: config::GOAL_PAUSE,
                dt: config::TICK_INTERVAL.as_secs_f32(),
            },
            snapshot_every: config::SNAPSHOT_EVERY,
            chat_history: config::CHAT_HISTORY,
        },
    )
    .map_err(|e| std::io::Error::other(format!("invalid default pitch config: {e}")))?;

    // input_tx/rx: every connection command goes to the single match task.
    let (input_tx, input_rx) = mpsc::channel::<GameEvent>(config::INPUT_CHANNEL_CAPACITY);
    // event_tx/rx: domain events from the match task, serialized once downstream.
    let (event_tx, event_rx) = broadcast::channel::<ServerEvent>(config::EVENT_BROADCAST_CAPACITY);
    let (event_bytes_tx, _event_bytes_rx) =
        broadcast::channel::<Utf8Bytes>(config::EVENT_BROADCAST_CAPACITY);
    let (positions_latest_tx, _positions_latest_rx) =
        watch::channel::<Utf8Bytes>(Utf8Bytes::from(""));
    let (status_tx, _status_rx) = watch::channel(MatchStatus::default());

    tokio::spawn(match_task(
        service,
        input_rx,
        event_tx,
        status_tx.clone(),
        config::TICK_INTERVAL,
    ));
    tokio::spawn(event_serializer(
        event_rx,
        event_bytes_tx.clone(),
        positions_latest_tx.clone(),
    ));
    tracing::debug!(
        tick_ms = config::TICK_INTERVAL.as_millis(),
        snapshot_every = config::SNAPSHOT_EVERY,
        "match task started"
    );

    Ok(Arc::new(AppState {
        input_tx,
        event_bytes_tx,
        positions_latest_tx,
        status_tx,
    }))
}
