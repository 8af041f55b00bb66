// Match service: routes connection commands to the roster and the board, and turns
// their results into outbound events.

use super::board::{Board, BoardEvent, BoardSettings, OptionsUpdate};
use super::roster::{Roster, SeatChange};
use super::types::{ChatMessage, ConnId, HelloState, MatchStatus, Outbound, ServerEvent};
use crate::domain::{Key, MatchError, PitchConfig};
use std::collections::{HashMap, VecDeque};
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Longest chat message kept, in characters.
pub const MAX_CHAT_LEN: usize = 280;

#[derive(Debug, Clone, Copy)]
pub struct MatchSettings {
    pub board: BoardSettings,
    /// Positions are published every n-th tick.
    pub snapshot_every: u64,
    pub chat_history: usize,
}

pub struct MatchService {
    board: Board,
    roster: Roster,
    // Connection id -> joined identity.
    connections: HashMap<ConnId, String>,
    chat: VecDeque<ChatMessage>,
    settings: MatchSettings,
    tick: u64,
}

impl MatchService {
    pub fn new(config: PitchConfig, settings: MatchSettings) -> Result<Self, MatchError> {
        let roster = Roster::new(config.team_size);
        Ok(Self {
            board: Board::new(config, settings.board)?,
            roster,
            connections: HashMap::new(),
            chat: VecDeque::with_capacity(settings.chat_history),
            settings,
            tick: 0,
        })
    }

    pub fn hello(&self) -> HelloState {
        HelloState {
            users: self.roster.entries(),
            seats: self.roster.seat_list(),
            score: self.board.score(),
            running: self.board.is_running(),
            config: self.board.config().clone(),
            ground: self.board.geometry().clone(),
            messages: self.chat.iter().cloned().collect(),
        }
    }

    pub fn status(&self) -> MatchStatus {
        MatchStatus {
            running: self.board.is_running(),
            score: self.board.score(),
            players: self.roster.occupied_seats().len(),
        }
    }

    pub fn join(
        &mut self,
        conn_id: ConnId,
        user: &str,
    ) -> Result<(HelloState, Vec<Outbound>), MatchError> {
        if !self.roster.register(user) {
            return Err(MatchError::DuplicateIdentity(user.to_string()));
        }
        self.connections.insert(conn_id, user.to_string());
        info!(conn_id, user, "user joined");

        let users = ServerEvent::UserChanged(self.roster.entries());
        Ok((self.hello(), vec![Outbound::Broadcast(users)]))
    }

    pub fn leave(&mut self, conn_id: ConnId) -> Vec<Outbound> {
        let Some(user) = self.connections.remove(&conn_id) else {
            return Vec::new();
        };
        info!(conn_id, user = %user, "user left");

        let changes = self.roster.unregister(&user);
        let mut out = vec![Outbound::Broadcast(ServerEvent::UserChanged(
            self.roster.entries(),
        ))];
        if !changes.is_empty() {
            self.sync_engine(&changes);
            out.push(Outbound::Broadcast(ServerEvent::PickPlayer(
                self.roster.seat_list(),
            )));
        }
        out
    }

    pub fn chat(&mut self, conn_id: ConnId, message: &str, timestamp: u64) -> Vec<Outbound> {
        let Some(user) = self.connections.get(&conn_id) else {
            return Vec::new();
        };
        let message = message.trim();
        if message.is_empty() {
            return Vec::new();
        }

        let entry = ChatMessage {
            user: user.clone(),
            message: message.chars().take(MAX_CHAT_LEN).collect(),
            timestamp,
        };
        if self.chat.len() == self.settings.chat_history {
            self.chat.pop_front();
        }
        self.chat.push_back(entry.clone());
        vec![Outbound::Broadcast(ServerEvent::Message(entry))]
    }

    pub fn pick_seat(&mut self, conn_id: ConnId, seat: usize) -> Vec<Outbound> {
        let Some(user) = self.connections.get(&conn_id).cloned() else {
            return Vec::new();
        };

        // Mid-match, a seat held by someone else cannot be taken over.
        if self.board.is_running() {
            if let Some(occupant) = self.roster.occupant(seat) {
                if occupant != user {
                    debug!(conn_id, seat, occupant, "pick rejected while running");
                    return Vec::new();
                }
            }
        }

        match self.roster.pick(seat, &user) {
            Ok(changes) => {
                info!(conn_id, user = %user, seat, ?changes, "seat picked");
                self.sync_engine(&changes);
                vec![
                    Outbound::Broadcast(ServerEvent::UserChanged(self.roster.entries())),
                    Outbound::Broadcast(ServerEvent::PickPlayer(self.roster.seat_list())),
                ]
            }
            Err(err) => vec![Outbound::Direct(conn_id, ServerEvent::from(&err))],
        }
    }

    pub fn start(&mut self, conn_id: ConnId) -> Vec<Outbound> {
        let seats = self.roster.occupied_seats();
        let engine = match self.board.start() {
            Ok(engine) => engine,
            Err(err) => {
                debug!(conn_id, error = %err, "start ignored");
                return Vec::new();
            }
        };
        for seat in seats {
            if let Err(err) = engine.add_player(seat) {
                error!(seat, error = %err, "seated player could not be added");
            }
        }
        self.tick = 0;
        info!(conn_id, "start requested");
        vec![Outbound::Broadcast(ServerEvent::MatchStart)]
    }

    pub fn stop(&mut self, conn_id: ConnId) -> Vec<Outbound> {
        match self.board.stop() {
            Ok(applied) => {
                info!(conn_id, "stop requested");
                let mut out = vec![Outbound::Broadcast(ServerEvent::MatchStop)];
                if let Some(config) = applied {
                    out.extend(self.on_options_applied(config));
                }
                out
            }
            Err(err) => {
                debug!(conn_id, error = %err, "stop ignored");
                Vec::new()
            }
        }
    }

    pub fn update_options(&mut self, conn_id: ConnId, config: PitchConfig) -> Vec<Outbound> {
        match self.board.update_options(config.clone()) {
            Ok(OptionsUpdate::Applied) => self.on_options_applied(config),
            Ok(OptionsUpdate::Deferred) => {
                info!(conn_id, "options queued until the match stops");
                Vec::new()
            }
            Err(err) => {
                warn!(conn_id, error = %err, "options rejected");
                vec![Outbound::Direct(conn_id, ServerEvent::from(&err))]
            }
        }
    }

    pub fn key(&mut self, conn_id: ConnId, code: u32, pressed: bool) -> Vec<Outbound> {
        let Some(key) = Key::from_code(code) else {
            return Vec::new();
        };
        let Some(seat) = self
            .connections
            .get(&conn_id)
            .and_then(|user| self.roster.seat_of(user))
        else {
            return Vec::new();
        };
        let Some(engine) = self.board.engine_mut() else {
            return Vec::new();
        };

        let result = if pressed {
            engine.key_press(seat, key)
        } else {
            engine.key_release(seat, key)
        };
        match result {
            Ok(()) => Vec::new(),
            Err(err) => vec![Outbound::Direct(conn_id, ServerEvent::from(&err))],
        }
    }

    /// Advances the match by one fixed tick.
    pub fn tick(&mut self, now: Instant) -> Vec<Outbound> {
        if !self.board.is_running() {
            return Vec::new();
        }
        self.tick += 1;

        let mut out = Vec::new();
        for event in self.board.advance(now) {
            match event {
                BoardEvent::Goal(score) => out.push(Outbound::Broadcast(ServerEvent::Goal(score))),
                BoardEvent::Winner { team, .. } => {
                    out.push(Outbound::Broadcast(ServerEvent::Winner(team)))
                }
                BoardEvent::Stopped => out.push(Outbound::Broadcast(ServerEvent::MatchStop)),
                BoardEvent::OptionsApplied(config) => out.extend(self.on_options_applied(config)),
            }
        }

        if self.tick % self.settings.snapshot_every == 0 {
            if let Some(snapshot) = self.board.engine().and_then(|engine| engine.snapshot()) {
                out.push(Outbound::Broadcast(ServerEvent::Positions(snapshot)));
            }
        }
        out
    }

    fn on_options_applied(&mut self, config: PitchConfig) -> Vec<Outbound> {
        let vacated = self.roster.apply_team_size(config.team_size);
        if !vacated.is_empty() {
            info!(seats = ?vacated, "seats vacated by the new team size");
        }
        vec![
            Outbound::Broadcast(ServerEvent::Options {
                config,
                ground: self.board.geometry().clone(),
            }),
            Outbound::Broadcast(ServerEvent::UserChanged(self.roster.entries())),
            Outbound::Broadcast(ServerEvent::PickPlayer(self.roster.seat_list())),
        ]
    }

    // Mirrors seat changes onto player bodies; seating while stopped leaves the engine alone.
    fn sync_engine(&mut self, changes: &[SeatChange]) {
        let Some(engine) = self.board.engine_mut() else {
            return;
        };
        for change in changes {
            let result = match *change {
                SeatChange::Register(seat) => engine.add_player(seat),
                SeatChange::Unregister(seat) => engine.remove_player(seat),
            };
            if let Err(err) = result {
                error!(?change, error = %err, "roster and engine out of sync");
            }
        }
    }
}
