// Wire protocol DTOs and conversions for public match server messages.

use crate::domain::{Geometry, PitchConfig, Score, Snapshot, Team};
use crate::use_cases::{ChatMessage, HelloState, RosterEntry, ServerEvent};
use serde::{Deserialize, Serialize};

/// Messages the server sends to connected clients over the WebSocket.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "camelCase")]
pub enum ServerMessage {
    // Full state for a connection whose join was accepted.
    Hello(HelloDto),
    UserChanged(Vec<RosterEntry>),
    // Occupant per seat, null for free seats.
    PickPlayer(Vec<Option<String>>),
    MatchStart,
    MatchStop,
    Goal(Score),
    Winner(Team),
    Options(OptionsDto),
    // [ballX, ballY, x, y, shoot, seat, x, y, shoot, seat, ...]
    Positions(Vec<i32>),
    Message(ChatMessageDto),
    Error(ErrorDto),
    // Join refused; the socket is closed right after.
    Rejected(ErrorDto),
}

/// Messages the client sends to the server over the WebSocket.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "camelCase")]
pub enum ClientMessage {
    // Handshake; must be the first message.
    Join(JoinPayload),
    Chat(ChatPayload),
    PickSeat(PickSeatPayload),
    Start,
    Stop,
    Options(PitchConfig),
    KeyPress(KeyPayload),
    KeyRelease(KeyPayload),
}

#[derive(Debug, Clone, Deserialize)]
pub struct JoinPayload {
    pub user: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatPayload {
    pub message: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PickSeatPayload {
    pub index: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct KeyPayload {
    pub code: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct HelloDto {
    pub users: Vec<RosterEntry>,
    pub seats: Vec<Option<String>>,
    pub score: Score,
    pub running: bool,
    pub options: PitchConfig,
    pub ground: Geometry,
    pub messages: Vec<ChatMessageDto>,
}

/// Applied config together with the pitch layout built from it.
#[derive(Debug, Clone, Serialize)]
pub struct OptionsDto {
    pub options: PitchConfig,
    pub ground: Geometry,
}

impl From<HelloState> for HelloDto {
    fn from(hello: HelloState) -> Self {
        Self {
            users: hello.users,
            seats: hello.seats,
            score: hello.score,
            running: hello.running,
            options: hello.config,
            ground: hello.ground,
            messages: hello.messages.into_iter().map(ChatMessageDto::from).collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatMessageDto {
    pub user: String,
    pub message: String,
    pub timestamp: u64,
}

impl From<ChatMessage> for ChatMessageDto {
    fn from(msg: ChatMessage) -> Self {
        Self {
            user: msg.user,
            message: msg.message,
            timestamp: msg.timestamp,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorDto {
    pub code: String,
    pub message: String,
}

/// Flattens a snapshot into the compact numeric sequence clients expect.
pub fn flatten_positions(snapshot: &Snapshot) -> Vec<i32> {
    let mut out = Vec::with_capacity(2 + snapshot.players.len() * 4);
    out.extend([snapshot.ball.0, snapshot.ball.1]);
    for player in &snapshot.players {
        out.extend([player.x, player.y, player.shoot as i32, player.seat as i32]);
    }
    out
}

impl From<ServerEvent> for ServerMessage {
    fn from(event: ServerEvent) -> Self {
        match event {
            ServerEvent::UserChanged(users) => ServerMessage::UserChanged(users),
            ServerEvent::PickPlayer(seats) => ServerMessage::PickPlayer(seats),
            ServerEvent::MatchStart => ServerMessage::MatchStart,
            ServerEvent::MatchStop => ServerMessage::MatchStop,
            ServerEvent::Goal(score) => ServerMessage::Goal(score),
            ServerEvent::Winner(team) => ServerMessage::Winner(team),
            ServerEvent::Options { config, ground } => ServerMessage::Options(OptionsDto {
                options: config,
                ground,
            }),
            ServerEvent::Positions(snapshot) => {
                ServerMessage::Positions(flatten_positions(&snapshot))
            }
            ServerEvent::Message(msg) => ServerMessage::Message(msg.into()),
            ServerEvent::Error { code, message } => ServerMessage::Error(ErrorDto {
                code: code.to_string(),
                message,
            }),
        }
    }
}
