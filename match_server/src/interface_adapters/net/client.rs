use crate::domain::MatchError;
use crate::interface_adapters::protocol::{ClientMessage, ErrorDto, ServerMessage};
use crate::interface_adapters::state::AppState;
use crate::interface_adapters::utils::ids::next_conn_id;
use crate::use_cases::{ConnId, GameEvent, ServerEvent};

use axum::{
    Error,
    extract::{
        State,
        ws::{CloseFrame, Message, Utf8Bytes, WebSocket, WebSocketUpgrade, close_code},
    },
    response::IntoResponse,
};
use futures::SinkExt;
use std::{
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::time::timeout;
use tracing::{Instrument, Span, debug, error, info, info_span, warn};

#[derive(Debug)]
enum NetError {
    // Categorizes connection lifecycle failures so callers can decide policy.
    #[allow(dead_code)]
    Ws(axum::Error),
    #[allow(dead_code)]
    Serialization(serde_json::Error),
    InputClosed,
    EventsClosed,
    JoinRequired,
    JoinTimeout,
    InvalidUser,
    Rejected,
    ClosedBeforeJoin,
}

impl From<axum::Error> for NetError {
    fn from(e: axum::Error) -> Self {
        NetError::Ws(e)
    }
}

const LOG_THROTTLE: Duration = Duration::from_secs(2);
const MAX_INVALID_JSON: u32 = 10;
const MAX_USER_LEN: usize = 32;
const JOIN_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);
const DIRECT_CHANNEL_CAPACITY: usize = 32;

pub async fn event_serializer(
    mut event_rx: broadcast::Receiver<ServerEvent>,
    event_bytes_tx: broadcast::Sender<Utf8Bytes>,
    positions_latest_tx: watch::Sender<Utf8Bytes>,
) {
    // Serialize each broadcast event once and fan out the shared bytes.
    loop {
        match event_rx.recv().await {
            Ok(event) => {
                let is_positions = matches!(event, ServerEvent::Positions(_));
                let msg = ServerMessage::from(event);
                let txt = match serde_json::to_string(&msg) {
                    Ok(txt) => txt,
                    Err(e) => {
                        error!(error = ?e, "failed to serialize server event");
                        continue;
                    }
                };

                let bytes = Utf8Bytes::from(txt);
                if is_positions {
                    // Keep the newest positions for lag recovery.
                    let _ = positions_latest_tx.send(bytes.clone());
                }
                let _ = event_bytes_tx.send(bytes);
            }
            Err(broadcast::error::RecvError::Lagged(n)) => {
                warn!(missed = n, "event serializer lagged; skipping to latest event");
            }
            Err(broadcast::error::RecvError::Closed) => {
                warn!("server events channel closed; serializer exiting");
                break;
            }
        }
    }
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| {
        let conn_id = next_conn_id();
        // Every log line of this connection carries its id (and user once joined).
        let span = info_span!("conn", conn_id, user = tracing::field::Empty);
        handle_socket(socket, state, conn_id).instrument(span)
    })
}

async fn handle_socket(mut socket: WebSocket, state: Arc<AppState>, conn_id: ConnId) {
    let mut ctx = match bootstrap_connection(&mut socket, conn_id, &state).await {
        Ok(ctx) => ctx,
        Err(NetError::ClosedBeforeJoin) => {
            info!("client disconnected before join handshake");
            return;
        }
        Err(NetError::Rejected) => {
            info!("join rejected");
            return;
        }
        Err(e) => {
            error!(error = ?e, "failed to bootstrap connection");
            let _ = send_close_with_reason(&mut socket, close_code::POLICY, "bootstrap failed")
                .await;
            return;
        }
    };

    Span::current().record("user", ctx.user.as_str());
    info!(user = %ctx.user, "client connected");

    if let Err(e) = run_client_loop(&mut socket, &mut ctx).await {
        warn!(error = ?e, "client loop exited with error");
    }
}

async fn send_message(socket: &mut WebSocket, msg: &ServerMessage) -> Result<usize, NetError> {
    let txt = serde_json::to_string(msg).map_err(NetError::Serialization)?;
    let bytes = txt.len();
    socket
        .send(Message::Text(txt.into()))
        .await
        .map_err(NetError::Ws)?;
    Ok(bytes)
}

async fn send_close_with_reason(
    socket: &mut WebSocket,
    code: u16,
    reason: &'static str,
) -> Result<(), NetError> {
    socket
        .send(Message::Close(Some(CloseFrame {
            code,
            reason: reason.into(),
        })))
        .await
        .map_err(NetError::Ws)?;
    socket.close().await.map_err(NetError::Ws)
}

struct ConnCtx {
    pub conn_id: ConnId,
    pub user: String,
    pub input_tx: mpsc::Sender<GameEvent>,
    pub event_bytes_rx: broadcast::Receiver<Utf8Bytes>,
    pub positions_latest_rx: watch::Receiver<Utf8Bytes>,
    pub direct_rx: mpsc::Receiver<ServerEvent>,
    // Count lag recovery snapshots sent to this client.
    pub lag_recovery_count: u64,

    pub msgs_in: u64,
    pub msgs_out: u64,
    pub bytes_in: u64,
    pub bytes_out: u64,

    pub invalid_json: u32,

    pub last_input_full_log: Instant,
    pub last_event_lag_log: Instant,
    pub last_invalid_input_log: Instant,

    pub close_frame: Option<CloseFrame>,
}

async fn bootstrap_connection(
    socket: &mut WebSocket,
    conn_id: ConnId,
    state: &AppState,
) -> Result<ConnCtx, NetError> {
    // Subscribe before joining so no broadcast after the hello is missed.
    let event_bytes_rx = state.event_bytes_tx.subscribe();
    let positions_latest_rx = state.positions_latest_tx.subscribe();

    let (user, bytes_in) = match timeout(JOIN_HANDSHAKE_TIMEOUT, read_join_handshake(socket)).await
    {
        Ok(result) => result?,
        Err(_) => {
            let _ = send_close_with_reason(socket, close_code::POLICY, "join timeout").await;
            return Err(NetError::JoinTimeout);
        }
    };

    let (direct_tx, direct_rx) = mpsc::channel(DIRECT_CHANNEL_CAPACITY);
    let (reply, reply_rx) = oneshot::channel();
    state
        .input_tx
        .send(GameEvent::Join {
            conn_id,
            user: user.clone(),
            direct_tx,
            reply,
        })
        .await
        .map_err(|_| NetError::InputClosed)?;

    let hello = match reply_rx.await.map_err(|_| NetError::InputClosed)? {
        Ok(hello) => hello,
        Err(err @ MatchError::DuplicateIdentity(_)) => {
            let rejected = ServerMessage::Rejected(ErrorDto {
                code: err.code().to_string(),
                message: err.to_string(),
            });
            let _ = send_message(socket, &rejected).await;
            let _ = send_close_with_reason(socket, close_code::POLICY, "duplicate identity").await;
            return Err(NetError::Rejected);
        }
        Err(err) => {
            warn!(error = %err, "unexpected join failure");
            return Err(NetError::Rejected);
        }
    };

    // The match task already counts this user as joined; undo that if the hello fails.
    if let Err(e) = send_message(socket, &ServerMessage::Hello(hello.into())).await {
        state
            .input_tx
            .send(GameEvent::Leave { conn_id })
            .await
            .map_err(|_| NetError::InputClosed)?; // InputClosed takes precedence
        return Err(e);
    }

    let now = Instant::now() - LOG_THROTTLE;
    Ok(ConnCtx {
        conn_id,
        user,
        input_tx: state.input_tx.clone(),
        event_bytes_rx,
        positions_latest_rx,
        direct_rx,
        lag_recovery_count: 0,

        msgs_in: 1,
        msgs_out: 1,
        bytes_in,
        bytes_out: 0,

        invalid_json: 0,

        last_input_full_log: now,
        last_event_lag_log: now,
        last_invalid_input_log: now,

        close_frame: None,
    })
}

async fn read_join_handshake(socket: &mut WebSocket) -> Result<(String, u64), NetError> {
    loop {
        let Some(incoming) = socket.recv().await else {
            return Err(NetError::ClosedBeforeJoin);
        };

        let message = incoming.map_err(NetError::Ws)?;
        match message {
            Message::Text(text) => {
                let bytes_in = text.len() as u64;
                let payload = match serde_json::from_str::<ClientMessage>(&text) {
                    Ok(ClientMessage::Join(payload)) => payload,
                    Ok(_) => {
                        let _ = send_close_with_reason(socket, close_code::POLICY, "join required")
                            .await;
                        return Err(NetError::JoinRequired);
                    }
                    Err(_) => {
                        let _ = send_close_with_reason(
                            socket,
                            close_code::POLICY,
                            "invalid join payload",
                        )
                        .await;
                        return Err(NetError::JoinRequired);
                    }
                };

                let user = payload.user.trim();
                if user.is_empty() || user.chars().count() > MAX_USER_LEN {
                    let _ =
                        send_close_with_reason(socket, close_code::POLICY, "invalid user").await;
                    return Err(NetError::InvalidUser);
                }

                return Ok((user.to_string(), bytes_in));
            }
            Message::Binary(_) => {
                let _ = send_close_with_reason(
                    socket,
                    close_code::UNSUPPORTED,
                    "binary messages not supported",
                )
                .await;
                return Err(NetError::JoinRequired);
            }
            Message::Ping(_) | Message::Pong(_) => {}
            Message::Close(_) => return Err(NetError::ClosedBeforeJoin),
        }
    }
}

enum LoopControl {
    Continue,
    Disconnect,
}

fn should_log(last: &mut Instant) -> bool {
    if last.elapsed() >= LOG_THROTTLE {
        *last = Instant::now();
        true
    } else {
        false
    }
}

fn to_game_event(conn_id: ConnId, msg: ClientMessage) -> Option<GameEvent> {
    let event = match msg {
        // Repeated joins after bootstrap are ignored to keep the session stable.
        ClientMessage::Join(_) => return None,
        ClientMessage::Chat(payload) => GameEvent::Chat {
            conn_id,
            message: payload.message,
        },
        ClientMessage::PickSeat(payload) => GameEvent::PickSeat {
            conn_id,
            seat: payload.index,
        },
        ClientMessage::Start => GameEvent::Start { conn_id },
        ClientMessage::Stop => GameEvent::Stop { conn_id },
        ClientMessage::Options(config) => GameEvent::Options { conn_id, config },
        ClientMessage::KeyPress(payload) => GameEvent::Key {
            conn_id,
            code: payload.code,
            pressed: true,
        },
        ClientMessage::KeyRelease(payload) => GameEvent::Key {
            conn_id,
            code: payload.code,
            pressed: false,
        },
    };
    Some(event)
}

async fn forward_command(
    conn_id: ConnId,
    input_tx: &mpsc::Sender<GameEvent>,
    event: GameEvent,
    last_input_full_log: &mut Instant,
) -> Result<LoopControl, NetError> {
    // A dropped release would leave the key held, so releases wait for room.
    if matches!(event, GameEvent::Key { pressed: false, .. }) {
        return match input_tx.send(event).await {
            Ok(()) => Ok(LoopControl::Continue),
            Err(_) => Err(NetError::InputClosed),
        };
    }

    match input_tx.try_send(event) {
        Ok(()) => Ok(LoopControl::Continue),
        Err(mpsc::error::TrySendError::Full(_evt)) => {
            if should_log(last_input_full_log) {
                warn!(conn_id, "input channel full; dropping command");
            }
            Ok(LoopControl::Continue)
        }
        Err(mpsc::error::TrySendError::Closed(_evt)) => Err(NetError::InputClosed),
    }
}

async fn run_client_loop(socket: &mut WebSocket, ctx: &mut ConnCtx) -> Result<(), NetError> {
    let conn_id = ctx.conn_id;

    // Split borrows so `tokio::select!` can hold them concurrently.
    let ConnCtx {
        input_tx,
        event_bytes_rx,
        positions_latest_rx,
        direct_rx,
        lag_recovery_count,
        msgs_in,
        msgs_out,
        bytes_in,
        bytes_out,
        invalid_json,
        last_input_full_log,
        last_event_lag_log,
        last_invalid_input_log,
        close_frame,
        ..
    } = ctx;

    let mut fatal: Option<NetError> = None;

    loop {
        let disconnect: bool = tokio::select! {
            incoming = socket.recv() => {
                match handle_incoming_ws(
                    incoming,
                    conn_id,
                    input_tx,
                    msgs_in,
                    bytes_in,
                    invalid_json,
                    last_input_full_log,
                    last_invalid_input_log,
                    close_frame,
                )
                .await
                {
                    Ok(LoopControl::Continue) => false,
                    Ok(LoopControl::Disconnect) => true,
                    Err(e) => {
                        fatal = Some(e);
                        true
                    }
                }
            }

            // Broadcast events, already serialized.
            event = event_bytes_rx.recv() => {
                match event {
                    Ok(bytes) => match forward_bytes(bytes, socket, msgs_out, bytes_out).await {
                        LoopControl::Continue => false,
                        LoopControl::Disconnect => true,
                    },
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        if should_log(last_event_lag_log) {
                            warn!(missed = n, "server events lagged; sending latest positions");
                        }

                        let latest = positions_latest_rx.borrow().clone();
                        if latest.is_empty() {
                            false
                        } else {
                            *lag_recovery_count += 1;
                            debug!(count = *lag_recovery_count, "sent lag recovery positions");
                            match forward_bytes(latest, socket, msgs_out, bytes_out).await {
                                LoopControl::Continue => false,
                                LoopControl::Disconnect => true,
                            }
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        fatal = Some(NetError::EventsClosed);
                        true
                    }
                }
            }

            // Events addressed to this connection only.
            direct = direct_rx.recv() => {
                match direct {
                    Some(event) => {
                        let msg = ServerMessage::from(event);
                        match send_message(socket, &msg).await {
                            Ok(bytes) => {
                                *msgs_out += 1;
                                *bytes_out += bytes as u64;
                                false
                            }
                            Err(err) => {
                                warn!(error = ?err, "failed to send direct event");
                                true
                            }
                        }
                    }
                    None => {
                        fatal = Some(NetError::EventsClosed);
                        true
                    }
                }
            }
        };

        if disconnect {
            if let Some(frame) = close_frame.take() {
                let _ = socket.send(Message::Close(Some(frame))).await;
            }
            if let Err(err) = socket.close().await.map_err(NetError::Ws) {
                debug!(error = ?err, "socket close error");
            }
            break;
        }
    }

    if let Err(e) = disconnect_cleanup(
        conn_id,
        input_tx,
        *msgs_in,
        *msgs_out,
        *bytes_in,
        *bytes_out,
        *invalid_json,
        *lag_recovery_count,
    )
    .await
    {
        warn!(error = ?e, "error during disconnect cleanup");
        if fatal.is_none() {
            fatal = Some(e);
        }
    }

    if let Some(err) = fatal {
        Err(err)
    } else {
        Ok(())
    }
}

#[allow(clippy::too_many_arguments)]
async fn handle_incoming_ws(
    incoming: Option<Result<Message, Error>>,
    conn_id: ConnId,
    input_tx: &mpsc::Sender<GameEvent>,
    msgs_in: &mut u64,
    bytes_in: &mut u64,
    invalid_json: &mut u32,
    last_input_full_log: &mut Instant,
    last_invalid_input_log: &mut Instant,
    close_frame: &mut Option<CloseFrame>,
) -> Result<LoopControl, NetError> {
    match incoming {
        Some(Ok(msg)) => match msg {
            Message::Text(text) => {
                *msgs_in += 1;
                *bytes_in += text.len() as u64;

                match serde_json::from_str::<ClientMessage>(&text) {
                    Ok(msg) => match to_game_event(conn_id, msg) {
                        Some(event) => {
                            forward_command(conn_id, input_tx, event, last_input_full_log).await
                        }
                        None => {
                            if should_log(last_invalid_input_log) {
                                warn!(conn_id, "duplicate join ignored");
                            }
                            Ok(LoopControl::Continue)
                        }
                    },
                    Err(parse_err) => {
                        *invalid_json += 1;
                        if should_log(last_invalid_input_log) {
                            warn!(
                                conn_id,
                                bytes = text.len(),
                                error = %parse_err,
                                "failed to parse client message"
                            );
                        }

                        if *invalid_json > MAX_INVALID_JSON {
                            *close_frame = Some(CloseFrame {
                                code: close_code::POLICY,
                                reason: "too many invalid messages".into(),
                            });
                            return Ok(LoopControl::Disconnect);
                        }

                        Ok(LoopControl::Continue)
                    }
                }
            }
            Message::Binary(_) => {
                *close_frame = Some(CloseFrame {
                    code: close_code::UNSUPPORTED,
                    reason: "binary messages not supported".into(),
                });
                Ok(LoopControl::Disconnect)
            }
            Message::Ping(_) | Message::Pong(_) => Ok(LoopControl::Continue),
            Message::Close(_) => Ok(LoopControl::Disconnect),
        },
        Some(Err(e)) => {
            warn!(conn_id, error = %e, "websocket recv error");
            Ok(LoopControl::Disconnect)
        }
        None => {
            info!(conn_id, "websocket closed");
            Ok(LoopControl::Disconnect)
        }
    }
}

async fn forward_bytes(
    bytes: Utf8Bytes,
    socket: &mut WebSocket,
    msgs_out: &mut u64,
    bytes_out: &mut u64,
) -> LoopControl {
    let bytes_len = bytes.len();
    match socket.send(Message::Text(bytes)).await.map_err(NetError::Ws) {
        Ok(()) => {
            *msgs_out += 1;
            *bytes_out += bytes_len as u64;
            LoopControl::Continue
        }
        Err(err) => {
            warn!(error = ?err, "failed to send server event");
            LoopControl::Disconnect
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn disconnect_cleanup(
    conn_id: ConnId,
    input_tx: &mpsc::Sender<GameEvent>,
    msgs_in: u64,
    msgs_out: u64,
    bytes_in: u64,
    bytes_out: u64,
    invalid_json: u32,
    lag_recovery_count: u64,
) -> Result<(), NetError> {
    // Frees the seat and removes the player body before the next physics step.
    input_tx
        .send(GameEvent::Leave { conn_id })
        .await
        .map_err(|_| NetError::InputClosed)?;

    debug!(
        conn_id,
        msgs_in,
        msgs_out,
        bytes_in,
        bytes_out,
        invalid_json,
        lag_recovery_count,
        "connection stats"
    );
    info!(conn_id, "client disconnected");
    Ok(())
}
