// Roster manager: connected identities and their seat assignment.

use crate::domain::MatchError;
use crate::domain::config::MAX_TEAM_SIZE;
use serde::Serialize;
use tracing::debug;

/// Seat bookkeeping change the match controller mirrors onto engine bodies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeatChange {
    Register(usize),
    Unregister(usize),
}

/// Public roster row; `index` is -1 for users without a seat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RosterEntry {
    pub user: String,
    pub index: i64,
}

#[derive(Debug, Clone)]
pub struct Roster {
    // Join order.
    users: Vec<String>,
    // Fixed table of every seat any team size can use.
    seats: [Option<String>; MAX_TEAM_SIZE * 2],
    seat_limit: usize,
}

impl Roster {
    pub fn new(team_size: usize) -> Self {
        Self {
            users: Vec::new(),
            seats: Default::default(),
            seat_limit: (team_size * 2).min(MAX_TEAM_SIZE * 2),
        }
    }

    /// Adds an identity; returns false when the name is already taken.
    pub fn register(&mut self, identity: &str) -> bool {
        if self.is_registered(identity) {
            return false;
        }
        self.users.push(identity.to_string());
        true
    }

    /// Removes an identity, vacating its seat first.
    pub fn unregister(&mut self, identity: &str) -> Vec<SeatChange> {
        let changes = match self.seat_of(identity) {
            Some(seat) => vec![self.vacate(seat)],
            None => Vec::new(),
        };
        self.users.retain(|user| user != identity);
        changes
    }

    pub fn is_registered(&self, identity: &str) -> bool {
        self.users.iter().any(|user| user == identity)
    }

    pub fn seat_of(&self, identity: &str) -> Option<usize> {
        self.seats
            .iter()
            .position(|occupant| occupant.as_deref() == Some(identity))
    }

    pub fn occupant(&self, seat: usize) -> Option<&str> {
        self.seats.get(seat)?.as_deref()
    }

    /// Seated seats in ascending order.
    pub fn occupied_seats(&self) -> Vec<usize> {
        (0..self.seat_limit)
            .filter(|&seat| self.seats[seat].is_some())
            .collect()
    }

    /// Toggles, moves, swaps or takes over a seat for `identity`.
    pub fn pick(&mut self, seat: usize, identity: &str) -> Result<Vec<SeatChange>, MatchError> {
        if seat >= self.seat_limit || !self.is_registered(identity) {
            return Err(MatchError::InvalidSeat(seat));
        }

        let occupant = self.occupant(seat).map(str::to_string);
        let mine = self.seat_of(identity);

        let changes = match (occupant, mine) {
            (Some(occupant), _) if occupant == identity => vec![self.vacate(seat)],
            (Some(occupant), Some(mine)) => {
                // Swap: both leave, then each takes the other's seat.
                vec![
                    self.vacate(seat),
                    self.vacate(mine),
                    self.assign(mine, &occupant),
                    self.assign(seat, identity),
                ]
            }
            (None, Some(mine)) => vec![self.vacate(mine), self.assign(seat, identity)],
            (None, None) => vec![self.assign(seat, identity)],
            (Some(_), None) => vec![self.vacate(seat), self.assign(seat, identity)],
        };
        Ok(changes)
    }

    /// Shrinks or grows the usable seats; vacates seats beyond `2 * team_size`.
    pub fn apply_team_size(&mut self, team_size: usize) -> Vec<SeatChange> {
        self.seat_limit = (team_size * 2).min(self.seats.len());
        (self.seat_limit..self.seats.len())
            .filter(|&seat| self.seats[seat].is_some())
            .collect::<Vec<_>>()
            .into_iter()
            .map(|seat| self.vacate(seat))
            .collect()
    }

    pub fn entries(&self) -> Vec<RosterEntry> {
        self.users
            .iter()
            .map(|user| RosterEntry {
                user: user.clone(),
                index: self.seat_of(user).map_or(-1, |seat| seat as i64),
            })
            .collect()
    }

    /// Occupant per usable seat, `None` for free seats.
    pub fn seat_list(&self) -> Vec<Option<String>> {
        self.seats[..self.seat_limit].to_vec()
    }

    fn vacate(&mut self, seat: usize) -> SeatChange {
        if let Some(user) = self.seats[seat].take() {
            debug!(seat, user = %user, "seat vacated");
        }
        SeatChange::Unregister(seat)
    }

    fn assign(&mut self, seat: usize, identity: &str) -> SeatChange {
        debug!(seat, user = %identity, "seat taken");
        self.seats[seat] = Some(identity.to_string());
        SeatChange::Register(seat)
    }
}
