// Domain-level match values: teams, score, input flags and snapshots.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Team {
    #[serde(rename = "team1")]
    One,
    #[serde(rename = "team2")]
    Two,
}

impl Team {
    /// Even seats play for team one, odd seats for team two.
    pub fn of_seat(seat: usize) -> Self {
        if seat % 2 == 0 { Team::One } else { Team::Two }
    }

    pub fn opponent(self) -> Self {
        match self {
            Team::One => Team::Two,
            Team::Two => Team::One,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Score {
    pub team1: u32,
    pub team2: u32,
}

impl Score {
    /// Increments the team's counter and returns its new value.
    pub fn record_goal(&mut self, team: Team) -> u32 {
        let counter = match team {
            Team::One => &mut self.team1,
            Team::Two => &mut self.team2,
        };
        *counter += 1;
        *counter
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Up,
    Down,
    Left,
    Right,
    Shoot,
}

impl Key {
    /// Maps browser key codes (arrows and space); anything else is ignored.
    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            37 => Some(Key::Left),
            38 => Some(Key::Up),
            39 => Some(Key::Right),
            40 => Some(Key::Down),
            32 => Some(Key::Shoot),
            _ => None,
        }
    }
}

/// Held keys for one seat.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InputState {
    pub up: bool,
    pub down: bool,
    pub left: bool,
    pub right: bool,
    pub shoot: bool,
}

impl InputState {
    pub fn set(&mut self, key: Key, pressed: bool) {
        let flag = match key {
            Key::Up => &mut self.up,
            Key::Down => &mut self.down,
            Key::Left => &mut self.left,
            Key::Right => &mut self.right,
            Key::Shoot => &mut self.shoot,
        };
        *flag = pressed;
    }

    /// Unit-less direction from the held arrows; opposing keys cancel out.
    pub fn direction(&self) -> (f32, f32) {
        let axis = |neg: bool, pos: bool| (pos as i8 - neg as i8) as f32;
        (axis(self.left, self.right), axis(self.up, self.down))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlayerSnapshot {
    pub seat: usize,
    pub x: i32,
    pub y: i32,
    pub shoot: bool,
}

/// Rounded positions for one tick, players ordered by seat.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub ball: (i32, i32),
    pub players: Vec<PlayerSnapshot>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn when_recording_goals_then_only_that_team_counter_moves() {
        let mut score = Score::default();

        assert_eq!(score.record_goal(Team::Two), 1);
        assert_eq!(score.record_goal(Team::Two), 2);
        assert_eq!(score, Score { team1: 0, team2: 2 });
    }

    #[test]
    fn when_opposing_keys_are_held_then_direction_cancels() {
        let mut input = InputState::default();
        input.set(Key::Left, true);
        input.set(Key::Right, true);
        input.set(Key::Down, true);

        assert_eq!(input.direction(), (0.0, 1.0));

        input.set(Key::Right, false);
        assert_eq!(input.direction(), (-1.0, 1.0));
    }

    #[test]
    fn when_code_is_unknown_then_no_key_is_mapped() {
        assert_eq!(Key::from_code(32), Some(Key::Shoot));
        assert_eq!(Key::from_code(38), Some(Key::Up));
        assert_eq!(Key::from_code(65), None);
    }

    #[test]
    fn when_seat_is_odd_then_team_two() {
        assert_eq!(Team::of_seat(0), Team::One);
        assert_eq!(Team::of_seat(3), Team::Two);
        assert_eq!(Team::One.opponent(), Team::Two);
    }
}
