// Static pitch layout derived from a PitchConfig.

use crate::domain::config::{PitchConfig, SPAWN_SPACING};
use crate::domain::state::{Position, Team};
use serde::Serialize;

/// Axis-aligned rectangle anchored at its top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

impl Rect {
    pub fn center(&self) -> Position {
        Position {
            x: self.x + self.w / 2.0,
            y: self.y + self.h / 2.0,
        }
    }

}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Circle {
    pub x: f32,
    pub y: f32,
    pub r: f32,
}

/// Goal opening tagged with the team that defends it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GoalZone {
    pub rect: Rect,
    pub defended_by: Team,
}

/// Pitch layout; clients draw borders and goals from it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Geometry {
    pub borders: Vec<Rect>,
    /// Left goal (defended by team one) then right goal (defended by team two).
    pub goals: [GoalZone; 2],
    width: f32,
    height: f32,
    border_size: f32,
    #[serde(skip)]
    team_size: usize,
    #[serde(skip)]
    ball_radius: f32,
    #[serde(skip)]
    player_radius: f32,
}

/// Builds the static layout: six border segments with a goal gap on each side.
pub fn generate(config: &PitchConfig) -> Geometry {
    let PitchConfig {
        width,
        height,
        goal_size,
        border_size: bs,
        ..
    } = *config;

    let border_x_size = width - 2.0 * bs;
    let semi_border_y = (height - goal_size) / 2.0;
    let lower_y = semi_border_y + goal_size;

    let borders = vec![
        // top
        Rect { x: bs, y: 0.0, w: border_x_size, h: bs },
        // bottom
        Rect { x: bs, y: height - bs, w: border_x_size, h: bs },
        // left, split around the goal gap
        Rect { x: bs, y: 0.0, w: bs, h: semi_border_y },
        Rect { x: bs, y: lower_y, w: bs, h: semi_border_y },
        // right, split around the goal gap
        Rect { x: width - 2.0 * bs, y: 0.0, w: bs, h: semi_border_y },
        Rect { x: width - 2.0 * bs, y: lower_y, w: bs, h: semi_border_y },
    ];

    let goals = [
        GoalZone {
            rect: Rect { x: 0.0, y: semi_border_y, w: bs, h: goal_size },
            defended_by: Team::One,
        },
        GoalZone {
            rect: Rect { x: width - bs, y: semi_border_y, w: bs, h: goal_size },
            defended_by: Team::Two,
        },
    ];

    Geometry {
        borders,
        goals,
        width,
        height,
        border_size: bs,
        team_size: config.team_size,
        ball_radius: config.ball_radius,
        player_radius: config.player_radius,
    }
}

impl Geometry {
    pub fn width(&self) -> f32 {
        self.width
    }

    pub fn height(&self) -> f32 {
        self.height
    }

    pub fn ball_default_position(&self) -> Position {
        Position {
            x: self.width / 2.0,
            y: self.height / 2.0,
        }
    }

    /// Spawn point for a seat: even seats on the left, odd seats on the right.
    ///
    /// Teammates are spread vertically around mid-height so larger teams do not spawn
    /// stacked on one point.
    pub fn player_default_position(&self, seat: usize) -> Position {
        let x = match Team::of_seat(seat) {
            Team::One => 4.0 * self.border_size,
            Team::Two => self.width - 4.0 * self.border_size,
        };
        let slot = (seat / 2) as f32;
        let center_slot = (self.team_size.max(1) - 1) as f32 / 2.0;
        let y = self.height / 2.0 + (slot - center_slot) * SPAWN_SPACING * self.player_radius;
        Position { x, y }
    }

    pub fn ball_shape(&self, at: Position) -> Circle {
        Circle {
            x: at.x,
            y: at.y,
            r: self.ball_radius,
        }
    }

    pub fn player_shape(&self, at: Position) -> Circle {
        Circle {
            x: at.x,
            y: at.y,
            r: self.player_radius,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Checks that the spans touch end-to-start without overlap and cover [from, to].
    fn assert_tiles(mut spans: Vec<(f32, f32)>, from: f32, to: f32) {
        spans.sort_by(|a, b| a.0.total_cmp(&b.0));
        let mut cursor = from;
        for (start, end) in spans {
            assert!((start - cursor).abs() < 1e-3, "gap or overlap at {cursor}");
            assert!(end > start);
            cursor = end;
        }
        assert!((cursor - to).abs() < 1e-3, "cover ends at {cursor}, expected {to}");
    }

    #[test]
    fn when_generated_then_each_side_is_tiled_by_borders_and_its_goal() {
        for size in 1..=3 {
            let config = PitchConfig::for_team_size(size);
            let geometry = generate(&config);
            assert_eq!(geometry.borders.len(), 6);

            let left_column = config.border_size;
            let right_column = config.width - 2.0 * config.border_size;
            for (column, goal) in [(left_column, geometry.goals[0]), (right_column, geometry.goals[1])] {
                let mut spans: Vec<(f32, f32)> = geometry
                    .borders
                    .iter()
                    .filter(|r| r.x == column && r.w == config.border_size && r.h < config.height - config.goal_size)
                    .map(|r| (r.y, r.y + r.h))
                    .collect();
                assert_eq!(spans.len(), 2);
                spans.push((goal.rect.y, goal.rect.y + goal.rect.h));
                assert_tiles(spans, 0.0, config.height);
            }
        }
    }

    #[test]
    fn when_generated_then_top_and_bottom_span_between_the_side_columns() {
        let config = PitchConfig::default();
        let geometry = generate(&config);
        let top = geometry.borders[0];
        let bottom = geometry.borders[1];

        assert_eq!(top.x, config.border_size);
        assert_eq!(top.x + top.w, config.width - config.border_size);
        assert_eq!(bottom.y + bottom.h, config.height);
        assert_eq!(top.w, bottom.w);
    }

    #[test]
    fn when_generated_then_goal_gap_is_centered_and_sized() {
        let config = PitchConfig::default();
        let geometry = generate(&config);

        for goal in geometry.goals {
            assert_eq!(goal.rect.h, config.goal_size);
            assert!((goal.rect.center().y - config.height / 2.0).abs() < 1e-3);
        }
    }

    #[test]
    fn when_generated_then_left_goal_belongs_to_team_one() {
        let geometry = generate(&PitchConfig::default());

        assert_eq!(geometry.goals[0].defended_by, Team::One);
        assert_eq!(geometry.goals[1].defended_by, Team::Two);
        assert!(geometry.goals[0].rect.x < geometry.goals[1].rect.x);
    }

    #[test]
    fn when_seat_parity_differs_then_spawn_side_differs() {
        let config = PitchConfig::default();
        let geometry = generate(&config);

        let left = geometry.player_default_position(0);
        let right = geometry.player_default_position(1);
        assert_eq!(left.x, 4.0 * config.border_size);
        assert_eq!(right.x, config.width - 4.0 * config.border_size);
        assert_eq!(left.y, config.height / 2.0);
        assert_eq!(geometry.ball_default_position(), Position { x: 850.0, y: 300.0 });
    }

    #[test]
    fn when_team_has_several_players_then_spawns_do_not_coincide() {
        let geometry = generate(&PitchConfig::for_team_size(3));

        let a = geometry.player_default_position(0);
        let b = geometry.player_default_position(2);
        let c = geometry.player_default_position(4);
        assert_eq!(a.x, b.x);
        assert!(a.y < b.y && b.y < c.y);
        assert_eq!(b.y, geometry.height() / 2.0);
    }

    #[test]
    fn when_serialized_then_borders_and_goals_are_sent() {
        let json = serde_json::to_value(generate(&PitchConfig::default())).expect("serializable");

        assert_eq!(json["borders"].as_array().map(Vec::len), Some(6));
        assert_eq!(json["goals"][0]["defendedBy"], "team1");
        assert_eq!(json["goals"][1]["rect"]["x"], 1660.0);
        assert_eq!(json["borderSize"], 40.0);
        assert!(json.get("teamSize").is_none());
    }

    #[test]
    fn when_config_is_valid_then_every_spawn_clears_top_and_bottom_borders() {
        for size in 1..=crate::domain::config::MAX_TEAM_SIZE {
            let config = PitchConfig::for_team_size(size);
            config.validate().expect("preset is valid");
            let geometry = generate(&config);

            for seat in 0..config.seat_count() {
                let spawn = geometry.player_default_position(seat);
                assert!(spawn.y - config.player_radius >= config.border_size, "seat {seat}");
                assert!(
                    spawn.y + config.player_radius <= config.height - config.border_size,
                    "seat {seat}"
                );
            }
        }
    }
}
