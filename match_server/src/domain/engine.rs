// Simulation engine: one physics world per running match.
// A step applies movement and shoot forces, integrates, then turns collisions into
// possession changes and goal events. The engine pauses itself on a goal and ignores
// further goal contacts until resumed.

use crate::domain::config::PitchConfig;
use crate::domain::errors::MatchError;
use crate::domain::geometry::Geometry;
use crate::domain::physics::{BodyTag, ContactEvent, PhysicsWorld};
use crate::domain::state::{InputState, Key, PlayerSnapshot, Position, Snapshot, Team};
use rapier2d::prelude::RigidBodyHandle;
use tracing::debug;

/// Extra reach of the possession sensor beyond the player radius.
pub const POSSESSION_MARGIN: f32 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineEvent {
    Goal { scoring: Team },
}

/// Domain meaning of a collision pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Contact {
    PossessionGained(usize),
    PossessionLost(usize),
    GoalEntered { scoring: Team },
}

/// Maps a labelled collision pair to its domain meaning; unrelated pairs yield `None`.
pub fn classify(event: ContactEvent) -> Option<Contact> {
    let (a, b, started) = match event {
        ContactEvent::Started(a, b) => (a, b, true),
        ContactEvent::Stopped(a, b) => (a, b, false),
    };
    let other = match (a, b) {
        (BodyTag::Ball, other) | (other, BodyTag::Ball) => other,
        _ => return None,
    };

    match (other, started) {
        (BodyTag::PossessionSensor(seat), true) => Some(Contact::PossessionGained(seat)),
        (BodyTag::PossessionSensor(seat), false) => Some(Contact::PossessionLost(seat)),
        (BodyTag::Goal(defended_by), true) => Some(Contact::GoalEntered {
            scoring: defended_by.opponent(),
        }),
        _ => None,
    }
}

struct PlayerSlot {
    body: RigidBodyHandle,
    input: InputState,
    has_ball: bool,
}

pub struct SimulationEngine {
    id: u64,
    // `None` once destroyed.
    world: Option<PhysicsWorld>,
    geometry: Geometry,
    config: PitchConfig,
    ball: RigidBodyHandle,
    // Indexed by seat; `None` means no body for that seat.
    players: Vec<Option<PlayerSlot>>,
    paused: bool,
}

impl SimulationEngine {
    /// Builds the static pitch and the ball; players are added per seat afterwards.
    pub fn start(id: u64, geometry: Geometry, config: PitchConfig, dt: f32) -> Self {
        let mut world = PhysicsWorld::new(dt);
        for rect in &geometry.borders {
            world.add_border(*rect, config.border);
        }
        for goal in &geometry.goals {
            world.add_goal_sensor(goal.rect, goal.defended_by);
        }
        let ball = world.add_ball(
            geometry.ball_shape(geometry.ball_default_position()),
            config.ball,
        );
        let players = (0..config.seat_count()).map(|_| None).collect();

        debug!(engine_id = id, "simulation engine started");
        Self {
            id,
            world: Some(world),
            geometry,
            config,
            ball,
            players,
            paused: false,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn is_alive(&self) -> bool {
        self.world.is_some()
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Re-enables goal detection after a goal pause.
    pub fn resume(&mut self) {
        self.paused = false;
    }

    pub fn has_player(&self, seat: usize) -> bool {
        matches!(self.players.get(seat), Some(Some(_)))
    }

    pub fn player_count(&self) -> usize {
        self.players.iter().flatten().count()
    }

    /// Number of rigid bodies in the physics world (zero once destroyed).
    pub fn body_count(&self) -> usize {
        self.world.as_ref().map_or(0, PhysicsWorld::body_count)
    }

    pub fn add_player(&mut self, seat: usize) -> Result<(), MatchError> {
        let world = self.world.as_mut().ok_or(MatchError::EngineNotRunning)?;
        let slot = self
            .players
            .get_mut(seat)
            .ok_or(MatchError::InvalidSeat(seat))?;
        if slot.is_some() {
            return Err(MatchError::InvalidSeat(seat));
        }

        let spawn = self.geometry.player_default_position(seat);
        let body = world.add_player(
            self.geometry.player_shape(spawn),
            self.config.player_radius + POSSESSION_MARGIN,
            self.config.player,
            seat,
        );
        *slot = Some(PlayerSlot {
            body,
            input: InputState::default(),
            has_ball: false,
        });
        debug!(engine_id = self.id, seat, "player body added");
        Ok(())
    }

    pub fn remove_player(&mut self, seat: usize) -> Result<(), MatchError> {
        let world = self.world.as_mut().ok_or(MatchError::EngineNotRunning)?;
        let slot = self
            .players
            .get_mut(seat)
            .and_then(Option::take)
            .ok_or(MatchError::InvalidSeat(seat))?;
        world.remove_body(slot.body);
        debug!(engine_id = self.id, seat, "player body removed");
        Ok(())
    }

    pub fn key_press(&mut self, seat: usize, key: Key) -> Result<(), MatchError> {
        self.slot_mut(seat)?.input.set(key, true);
        Ok(())
    }

    pub fn key_release(&mut self, seat: usize, key: Key) -> Result<(), MatchError> {
        self.slot_mut(seat)?.input.set(key, false);
        Ok(())
    }

    pub fn input(&self, seat: usize) -> Option<InputState> {
        self.players.get(seat)?.as_ref().map(|slot| slot.input)
    }

    pub fn has_possession(&self, seat: usize) -> bool {
        matches!(self.players.get(seat), Some(Some(slot)) if slot.has_ball)
    }

    /// Puts the ball and every player back on their spawn points, at rest.
    pub fn reset_positions(&mut self) {
        let Some(world) = self.world.as_mut() else {
            return;
        };
        world.reset_body(self.ball, self.geometry.ball_default_position());
        for (seat, slot) in self.players.iter_mut().enumerate() {
            if let Some(slot) = slot {
                world.reset_body(slot.body, self.geometry.player_default_position(seat));
                slot.has_ball = false;
            }
        }
    }

    /// Drops the physics world with every body in it. Safe to call more than once.
    pub fn destroy(&mut self) {
        if self.world.take().is_some() {
            self.players.iter_mut().for_each(|slot| *slot = None);
            debug!(engine_id = self.id, "simulation engine destroyed");
        }
    }

    /// Runs one fixed tick and returns the goal events it produced.
    pub fn step(&mut self) -> Vec<EngineEvent> {
        let Some(world) = self.world.as_mut() else {
            return Vec::new();
        };

        let ball_pos = world.position(self.ball);
        for slot in self.players.iter().flatten() {
            let (dx, dy) = slot.input.direction();
            let move_force = self.config.move_force;
            world.set_force(slot.body, (dx * move_force, dy * move_force));

            if slot.input.shoot && slot.has_ball {
                if let (Some(ball), Some(player)) = (ball_pos, world.position(slot.body)) {
                    if let Some(dir) = normalized(ball.x - player.x, ball.y - player.y) {
                        let shoot = self.config.shoot_force;
                        world.apply_impulse(self.ball, (dir.0 * shoot, dir.1 * shoot));
                    }
                }
            }
        }

        let contacts = world.step();

        let mut events = Vec::new();
        for contact in contacts.into_iter().filter_map(classify) {
            match contact {
                Contact::PossessionGained(seat) | Contact::PossessionLost(seat) => {
                    let gained = matches!(contact, Contact::PossessionGained(_));
                    let Some(slot) = self.players.get_mut(seat).and_then(Option::as_mut) else {
                        panic!("possession change for seat {seat} without a player body");
                    };
                    slot.has_ball = gained;
                }
                Contact::GoalEntered { scoring } => {
                    if self.paused {
                        continue;
                    }
                    self.paused = true;
                    debug!(engine_id = self.id, ?scoring, "goal detected");
                    events.push(EngineEvent::Goal { scoring });
                }
            }
        }
        events
    }

    /// Rounded ball and player positions for the outward broadcast.
    pub fn snapshot(&self) -> Option<Snapshot> {
        let world = self.world.as_ref()?;
        let ball = world.position(self.ball)?;
        let players = self
            .players
            .iter()
            .enumerate()
            .filter_map(|(seat, slot)| {
                let slot = slot.as_ref()?;
                let p = world.position(slot.body)?;
                Some(PlayerSnapshot {
                    seat,
                    x: p.x.round() as i32,
                    y: p.y.round() as i32,
                    shoot: slot.input.shoot,
                })
            })
            .collect();

        Some(Snapshot {
            ball: (ball.x.round() as i32, ball.y.round() as i32),
            players,
        })
    }

    pub fn ball_position(&self) -> Option<Position> {
        self.world.as_ref()?.position(self.ball)
    }

    pub fn ball_velocity(&self) -> Option<(f32, f32)> {
        self.world.as_ref()?.velocity(self.ball)
    }

    pub fn player_position(&self, seat: usize) -> Option<Position> {
        let slot = self.players.get(seat)?.as_ref()?;
        self.world.as_ref()?.position(slot.body)
    }

    #[cfg(test)]
    pub fn place_ball(&mut self, at: Position) {
        if let Some(world) = self.world.as_mut() {
            world.reset_body(self.ball, at);
        }
    }

    #[cfg(test)]
    pub fn launch_ball(&mut self, at: Position, velocity: (f32, f32)) {
        if let Some(world) = self.world.as_mut() {
            world.reset_body(self.ball, at);
            world.set_velocity(self.ball, velocity);
        }
    }

    fn slot_mut(&mut self, seat: usize) -> Result<&mut PlayerSlot, MatchError> {
        self.players
            .get_mut(seat)
            .and_then(Option::as_mut)
            .ok_or(MatchError::InvalidSeat(seat))
    }
}

fn normalized(x: f32, y: f32) -> Option<(f32, f32)> {
    let len = (x * x + y * y).sqrt();
    (len > f32::EPSILON).then(|| (x / len, y / len))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::geometry;

    const DT: f32 = 1.0 / 60.0;

    fn engine_with(config: PitchConfig) -> SimulationEngine {
        let geometry = geometry::generate(&config);
        SimulationEngine::start(1, geometry, config, DT)
    }

    fn engine() -> SimulationEngine {
        engine_with(PitchConfig::default())
    }

    fn left_goal_center(engine: &SimulationEngine) -> Position {
        engine.geometry.goals[0].rect.center()
    }

    #[test]
    fn when_started_then_only_static_bodies_and_ball_exist() {
        let engine = engine();

        // six borders, two goal sensors, one ball
        assert_eq!(engine.body_count(), 9);
        assert_eq!(engine.player_count(), 0);
        assert_eq!(engine.ball_position(), Some(Position { x: 850.0, y: 300.0 }));
    }

    #[test]
    fn when_players_are_added_then_each_seat_gets_one_body() {
        let mut engine = engine_with(PitchConfig::for_team_size(2));
        for seat in 0..4 {
            engine.add_player(seat).expect("seat free");
        }

        assert_eq!(engine.player_count(), 4);
        assert_eq!(engine.body_count(), 13);
        assert_eq!(engine.add_player(2), Err(MatchError::InvalidSeat(2)));
        assert_eq!(engine.add_player(4), Err(MatchError::InvalidSeat(4)));
    }

    #[test]
    fn when_player_is_removed_and_readded_then_it_is_back_on_its_spawn() {
        let mut engine = engine();
        engine.add_player(0).expect("seat free");
        engine.key_press(0, Key::Right).expect("seated");
        for _ in 0..10 {
            engine.step();
        }
        let spawn = engine.geometry.player_default_position(0);
        assert!(engine.player_position(0).expect("seated").x > spawn.x);

        engine.remove_player(0).expect("seated");
        assert_eq!(engine.player_count(), 0);
        assert_eq!(engine.remove_player(0), Err(MatchError::InvalidSeat(0)));

        engine.add_player(0).expect("seat free again");
        assert_eq!(engine.player_position(0), Some(spawn));
        assert_eq!(engine.input(0), Some(InputState::default()));
    }

    #[test]
    fn when_key_targets_empty_seat_then_invalid_seat() {
        let mut engine = engine();

        assert_eq!(engine.key_press(1, Key::Up), Err(MatchError::InvalidSeat(1)));
        assert_eq!(engine.key_release(7, Key::Up), Err(MatchError::InvalidSeat(7)));
    }

    #[test]
    fn when_ball_enters_left_goal_then_one_goal_for_team_two() {
        let mut engine = engine();
        let goal = left_goal_center(&engine);
        engine.place_ball(goal);

        let events = engine.step();

        assert_eq!(events, vec![EngineEvent::Goal { scoring: Team::Two }]);
        assert!(engine.is_paused());
    }

    #[test]
    fn when_paused_then_repeated_goal_contacts_are_ignored() {
        let mut engine = engine();
        let goal = left_goal_center(&engine);
        engine.place_ball(goal);
        assert_eq!(engine.step().len(), 1);

        // Leave and re-enter the goal while still paused.
        engine.place_ball(engine.geometry.ball_default_position());
        engine.step();
        engine.place_ball(goal);
        assert!(engine.step().is_empty());

        engine.resume();
        engine.place_ball(engine.geometry.ball_default_position());
        engine.step();
        engine.place_ball(engine.geometry.goals[1].rect.center());
        assert_eq!(engine.step(), vec![EngineEvent::Goal { scoring: Team::One }]);
    }

    #[test]
    fn when_ball_touches_possession_sensor_then_shoot_moves_the_ball() {
        let mut engine = engine();
        engine.add_player(0).expect("seat free");
        let player = engine.player_position(0).expect("seated");
        // Inside the sensor reach, outside the player body.
        let reach = engine.config.player_radius + engine.config.ball_radius + 2.0;
        engine.place_ball(Position {
            x: player.x + reach,
            y: player.y,
        });

        engine.step();
        assert!(engine.has_possession(0));

        engine.key_press(0, Key::Shoot).expect("seated");
        engine.step();

        let (vx, _) = engine.ball_velocity().expect("running");
        assert!(vx > 0.0, "ball should travel away from the shooter, got {vx}");
    }

    #[test]
    fn when_shooting_without_possession_then_ball_does_not_move() {
        let mut engine = engine();
        engine.add_player(0).expect("seat free");
        engine.key_press(0, Key::Shoot).expect("seated");

        for _ in 0..5 {
            engine.step();
        }

        assert!(!engine.has_possession(0));
        assert_eq!(engine.ball_velocity(), Some((0.0, 0.0)));
        assert!(engine.snapshot().expect("running").players[0].shoot);
    }

    #[test]
    fn when_positions_are_reset_then_bodies_return_to_spawn_at_rest() {
        let mut engine = engine();
        engine.add_player(1).expect("seat free");
        engine.key_press(1, Key::Up).expect("seated");
        engine.launch_ball(Position { x: 400.0, y: 200.0 }, (300.0, 0.0));
        for _ in 0..5 {
            engine.step();
        }

        engine.reset_positions();

        assert_eq!(engine.ball_position(), Some(engine.geometry.ball_default_position()));
        assert_eq!(engine.ball_velocity(), Some((0.0, 0.0)));
        assert_eq!(
            engine.player_position(1),
            Some(engine.geometry.player_default_position(1))
        );
        assert!(!engine.has_possession(1));
    }

    #[test]
    fn when_destroyed_then_all_bodies_are_gone_and_destroy_is_idempotent() {
        let mut engine = engine();
        engine.add_player(0).expect("seat free");
        engine.add_player(1).expect("seat free");

        engine.destroy();
        engine.destroy();

        assert!(!engine.is_alive());
        assert_eq!(engine.body_count(), 0);
        assert_eq!(engine.player_count(), 0);
        assert!(engine.step().is_empty());
        assert!(engine.snapshot().is_none());
        assert_eq!(engine.add_player(0), Err(MatchError::EngineNotRunning));
    }

    #[test]
    fn when_snapshot_is_taken_then_positions_are_rounded_and_ordered_by_seat() {
        let mut engine = engine();
        engine.add_player(1).expect("seat free");
        engine.add_player(0).expect("seat free");
        engine.place_ball(Position { x: 100.4, y: 200.6 });

        let snapshot = engine.snapshot().expect("running");

        assert_eq!(snapshot.ball, (100, 201));
        let seats: Vec<usize> = snapshot.players.iter().map(|p| p.seat).collect();
        assert_eq!(seats, vec![0, 1]);
        assert_eq!((snapshot.players[0].x, snapshot.players[0].y), (160, 300));
    }

    #[test]
    fn when_ball_is_fired_at_a_border_at_high_speed_then_it_stays_on_the_pitch() {
        let mut engine = engine();
        let height = engine.geometry.height();
        // 9000 px/s covers more than a border thickness per tick.
        engine.launch_ball(Position { x: 850.0, y: 300.0 }, (0.0, -9000.0));

        for _ in 0..60 {
            engine.step();
            let ball = engine.ball_position().expect("running");
            assert!(ball.y > 0.0 && ball.y < height, "ball escaped at y={}", ball.y);
        }
    }

    #[test]
    fn when_ball_hits_a_player_fast_then_it_does_not_rebound() {
        let mut engine = engine();
        engine.add_player(0).expect("seat free");
        let player = engine.player_position(0).expect("seated");
        engine.launch_ball(
            Position {
                x: player.x + 250.0,
                y: player.y,
            },
            (-1000.0, 0.0),
        );

        let mut max_rebound = f32::MIN;
        let mut possessed = false;
        for _ in 0..40 {
            engine.step();
            if engine.has_possession(0) {
                possessed = true;
                let (vx, _) = engine.ball_velocity().expect("running");
                max_rebound = max_rebound.max(vx);
            }
        }

        assert!(possessed);
        assert!(max_rebound < 30.0, "ball bounced back at {max_rebound} px/s");
    }

    #[test]
    fn when_classifying_then_only_ball_pairs_matter() {
        use BodyTag::*;

        assert_eq!(
            classify(ContactEvent::Started(PossessionSensor(3), Ball)),
            Some(Contact::PossessionGained(3))
        );
        assert_eq!(
            classify(ContactEvent::Stopped(Ball, PossessionSensor(3))),
            Some(Contact::PossessionLost(3))
        );
        assert_eq!(
            classify(ContactEvent::Started(Goal(Team::One), Ball)),
            Some(Contact::GoalEntered { scoring: Team::Two })
        );
        assert_eq!(classify(ContactEvent::Stopped(Goal(Team::One), Ball)), None);
        assert_eq!(classify(ContactEvent::Started(Player(0), Border)), None);
        assert_eq!(classify(ContactEvent::Started(PossessionSensor(0), Player(1))), None);
    }
}
