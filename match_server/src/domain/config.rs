// Gameplay configuration for a match: pitch layout plus per-body physics parameters.
// Values use client units (pixels, millisecond-based forces); runtime settings such as
// ports and tick rates live in frameworks::config.

use crate::domain::errors::MatchError;
use serde::{Deserialize, Serialize};

/// Largest team size the pitch presets and seat table support.
pub const MAX_TEAM_SIZE: usize = 5;

/// Vertical distance between teammates' spawns, in player radii.
pub const SPAWN_SPACING: f32 = 2.5;

/// Physics parameters for static bodies (borders).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StaticBodyOptions {
    pub friction: f32,
    pub restitution: f32,
}

/// Physics parameters for dynamic bodies (ball, players).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BodyOptions {
    pub friction: f32,
    pub restitution: f32,
    pub mass: f32,
    /// Fraction of velocity lost per tick.
    pub friction_air: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PitchConfig {
    /// Players per team; seats are `0..2 * team_size`.
    pub team_size: usize,
    pub width: f32,
    pub height: f32,
    pub ball_radius: f32,
    pub player_radius: f32,
    pub goal_size: f32,
    pub border_size: f32,
    pub max_goal: u32,
    pub move_force: f32,
    pub shoot_force: f32,
    pub player: BodyOptions,
    pub ball: BodyOptions,
    pub border: StaticBodyOptions,
}

impl Default for PitchConfig {
    fn default() -> Self {
        Self::for_team_size(1)
    }
}

impl PitchConfig {
    /// Default config with the pitch dimensions scaled for `team_size`.
    pub fn for_team_size(team_size: usize) -> Self {
        let (width, height, goal_size) = match team_size {
            0 | 1 => (1700.0, 600.0, 190.0),
            2 => (1850.0, 800.0, 210.0),
            _ => (2500.0, 1100.0, 260.0),
        };

        Self {
            team_size: team_size.max(1),
            width,
            height,
            ball_radius: 20.0,
            player_radius: 30.0,
            goal_size,
            border_size: 40.0,
            max_goal: 2,
            move_force: 0.4,
            shoot_force: 0.55,
            player: BodyOptions {
                friction: 0.1,
                restitution: 0.0,
                mass: 40.0,
                friction_air: 0.05,
            },
            ball: BodyOptions {
                friction: 0.1,
                restitution: 0.5,
                mass: 1.0,
                friction_air: 0.02,
            },
            border: StaticBodyOptions {
                friction: 0.1,
                restitution: 0.2,
            },
        }
    }

    /// Number of seats on the pitch (both teams).
    pub fn seat_count(&self) -> usize {
        self.team_size * 2
    }

    /// Rejects configurations the geometry generator cannot lay out.
    pub fn validate(&self) -> Result<(), MatchError> {
        let invalid = |reason: &str| Err(MatchError::InvalidConfig(reason.to_string()));

        if !(1..=MAX_TEAM_SIZE).contains(&self.team_size) {
            return invalid("team size out of range");
        }

        let positive = [
            ("width", self.width),
            ("height", self.height),
            ("ballRadius", self.ball_radius),
            ("playerRadius", self.player_radius),
            ("goalSize", self.goal_size),
            ("borderSize", self.border_size),
            ("moveForce", self.move_force),
            ("shootForce", self.shoot_force),
            ("player.mass", self.player.mass),
            ("ball.mass", self.ball.mass),
        ];
        for (name, value) in positive {
            if !value.is_finite() || value <= 0.0 {
                return Err(MatchError::InvalidConfig(format!("{name} must be positive")));
            }
        }

        let coefficients = [
            ("player.friction", self.player.friction),
            ("player.restitution", self.player.restitution),
            ("ball.friction", self.ball.friction),
            ("ball.restitution", self.ball.restitution),
            ("border.friction", self.border.friction),
            ("border.restitution", self.border.restitution),
        ];
        for (name, value) in coefficients {
            if !value.is_finite() || value < 0.0 {
                return Err(MatchError::InvalidConfig(format!(
                    "{name} must be non-negative"
                )));
            }
        }

        // Air friction is a per-tick velocity loss; 1.0 would freeze bodies in place.
        for (name, value) in [
            ("player.frictionAir", self.player.friction_air),
            ("ball.frictionAir", self.ball.friction_air),
        ] {
            if !value.is_finite() || !(0.0..1.0).contains(&value) {
                return Err(MatchError::InvalidConfig(format!("{name} must be in [0, 1)")));
            }
        }

        if self.goal_size >= self.height {
            return invalid("goal size must be smaller than pitch height");
        }
        if self.goal_size + 2.0 * self.border_size > self.height {
            return invalid("goal opening overlaps top or bottom border");
        }
        if self.width <= 8.0 * self.border_size {
            return invalid("pitch too narrow for its border size");
        }
        // Outermost teammates must spawn clear of the top and bottom borders.
        let spread = (self.team_size - 1) as f32 / 2.0 * SPAWN_SPACING * self.player_radius;
        if self.height / 2.0 - spread - self.player_radius < self.border_size {
            return invalid("team spawns do not fit between top and bottom borders");
        }
        if self.max_goal == 0 {
            return invalid("max goal must be at least 1");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn when_defaults_are_used_then_config_is_valid_for_every_team_size() {
        for size in 1..=MAX_TEAM_SIZE {
            let config = PitchConfig::for_team_size(size);
            assert_eq!(config.team_size, size);
            assert!(config.validate().is_ok(), "team size {size}");
        }
    }

    #[test]
    fn when_goal_size_reaches_height_then_config_is_rejected() {
        let mut config = PitchConfig::default();
        config.goal_size = config.height;

        assert!(matches!(
            config.validate(),
            Err(MatchError::InvalidConfig(_))
        ));
    }

    #[test]
    fn when_team_spawns_overlap_top_border_then_config_is_rejected() {
        let mut config = PitchConfig::for_team_size(5);
        config.height = 300.0;
        config.goal_size = 100.0;

        assert!(matches!(
            config.validate(),
            Err(MatchError::InvalidConfig(reason)) if reason.contains("spawns")
        ));

        config.team_size = 1;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn when_team_size_is_zero_then_config_is_rejected() {
        let mut config = PitchConfig::default();
        config.team_size = 0;

        assert!(matches!(
            config.validate(),
            Err(MatchError::InvalidConfig(_))
        ));
    }

    #[test]
    fn when_force_is_not_finite_then_config_is_rejected() {
        let mut config = PitchConfig::default();
        config.move_force = f32::NAN;

        assert!(config.validate().is_err());
    }

    #[test]
    fn when_serialized_then_fields_use_camel_case() {
        let json = serde_json::to_value(PitchConfig::default()).expect("serialize config");

        assert_eq!(json["teamSize"], 1);
        assert_eq!(json["maxGoal"], 2);
        assert!(json["ball"]["frictionAir"].is_number());
    }
}
