// rapier2d adapter behind the simulation engine.
// Owns the rapier sets and a side-table from collider handle to BodyTag, so collision pairs
// come back already labelled. Forces and air friction arrive in client units
// (mass·px/ms², per-step velocity loss) and are converted here.

use crate::domain::config::{BodyOptions, StaticBodyOptions};
use crate::domain::geometry::{Circle, Rect};
use crate::domain::state::{Position, Team};
use rapier2d::prelude::*;
use std::collections::{HashMap, HashSet};

/// Converts a client-unit force (mass·px/ms²) into mass·px/s².
pub const FORCE_SCALE: f32 = 1_000_000.0;

/// What a collider stands for in the match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BodyTag {
    Border,
    /// Goal sensor, tagged with the team that defends it.
    Goal(Team),
    Ball,
    Player(usize),
    PossessionSensor(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContactEvent {
    Started(BodyTag, BodyTag),
    Stopped(BodyTag, BodyTag),
}

// Zeroes restitution on solid ball-player contacts. The possession sensor encloses the
// player body, so such a contact only happens with the ball in possession.
#[derive(Default)]
struct PossessionHooks {
    ball: Option<ColliderHandle>,
    player_bodies: HashSet<ColliderHandle>,
}

impl PhysicsHooks for PossessionHooks {
    fn modify_solver_contacts(&self, context: &mut ContactModificationContext) {
        let Some(ball) = self.ball else {
            return;
        };
        let other = if context.collider1 == ball {
            context.collider2
        } else if context.collider2 == ball {
            context.collider1
        } else {
            return;
        };

        if self.player_bodies.contains(&other) {
            for contact in context.solver_contacts.iter_mut() {
                contact.restitution = 0.0;
            }
        }
    }
}

pub struct PhysicsWorld {
    pipeline: PhysicsPipeline,
    gravity: Vector<Real>,
    integration_params: IntegrationParameters,
    island_manager: IslandManager,
    broad_phase: DefaultBroadPhase,
    narrow_phase: NarrowPhase,
    bodies: RigidBodySet,
    colliders: ColliderSet,
    impulse_joints: ImpulseJointSet,
    multibody_joints: MultibodyJointSet,
    ccd_solver: CCDSolver,
    tags: HashMap<ColliderHandle, BodyTag>,
    hooks: PossessionHooks,
}

impl PhysicsWorld {
    /// Zero-gravity world stepping `dt` seconds per tick.
    pub fn new(dt: f32) -> Self {
        let integration_params = IntegrationParameters {
            dt,
            ..IntegrationParameters::default()
        };

        Self {
            pipeline: PhysicsPipeline::new(),
            gravity: vector![0.0, 0.0],
            integration_params,
            island_manager: IslandManager::new(),
            broad_phase: DefaultBroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            bodies: RigidBodySet::new(),
            colliders: ColliderSet::new(),
            impulse_joints: ImpulseJointSet::new(),
            multibody_joints: MultibodyJointSet::new(),
            ccd_solver: CCDSolver::new(),
            tags: HashMap::new(),
            hooks: PossessionHooks::default(),
        }
    }

    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    pub fn add_border(&mut self, rect: Rect, options: StaticBodyOptions) -> RigidBodyHandle {
        let collider = rect_collider(rect)
            .friction(options.friction)
            .restitution(options.restitution)
            .build();
        self.insert_fixed(rect, collider, BodyTag::Border)
    }

    pub fn add_goal_sensor(&mut self, rect: Rect, defended_by: Team) -> RigidBodyHandle {
        let collider = rect_collider(rect)
            .sensor(true)
            .active_events(ActiveEvents::COLLISION_EVENTS)
            .build();
        self.insert_fixed(rect, collider, BodyTag::Goal(defended_by))
    }

    pub fn add_ball(&mut self, shape: Circle, options: BodyOptions) -> RigidBodyHandle {
        let body = self.insert_dynamic(shape, options);
        let collider = ColliderBuilder::ball(shape.r)
            .friction(options.friction)
            .restitution(options.restitution)
            .mass(options.mass)
            .active_events(ActiveEvents::COLLISION_EVENTS)
            .active_hooks(ActiveHooks::MODIFY_SOLVER_CONTACTS)
            .build();
        let handle = self.attach(collider, body, BodyTag::Ball);
        self.hooks.ball = Some(handle);
        body
    }

    /// Player body plus its possession sensor; both colliders share one rigid body.
    pub fn add_player(
        &mut self,
        shape: Circle,
        sensor_radius: f32,
        options: BodyOptions,
        seat: usize,
    ) -> RigidBodyHandle {
        let body = self.insert_dynamic(shape, options);
        let collider = ColliderBuilder::ball(shape.r)
            .friction(options.friction)
            .restitution(options.restitution)
            .mass(options.mass)
            .build();
        let handle = self.attach(collider, body, BodyTag::Player(seat));
        self.hooks.player_bodies.insert(handle);

        let sensor = ColliderBuilder::ball(sensor_radius)
            .sensor(true)
            .density(0.0)
            .active_events(ActiveEvents::COLLISION_EVENTS)
            .build();
        self.attach(sensor, body, BodyTag::PossessionSensor(seat));
        body
    }

    /// Removes the body and every collider attached to it.
    pub fn remove_body(&mut self, body: RigidBodyHandle) {
        if let Some(rb) = self.bodies.get(body) {
            for collider in rb.colliders() {
                self.tags.remove(collider);
                self.hooks.player_bodies.remove(collider);
            }
        }
        self.bodies.remove(
            body,
            &mut self.island_manager,
            &mut self.colliders,
            &mut self.impulse_joints,
            &mut self.multibody_joints,
            true,
        );
    }

    pub fn position(&self, body: RigidBodyHandle) -> Option<Position> {
        self.bodies.get(body).map(|rb| {
            let t = rb.translation();
            Position { x: t.x, y: t.y }
        })
    }

    pub fn velocity(&self, body: RigidBodyHandle) -> Option<(f32, f32)> {
        self.bodies.get(body).map(|rb| {
            let v = rb.linvel();
            (v.x, v.y)
        })
    }

    /// Teleports a body and cancels all of its motion.
    pub fn reset_body(&mut self, body: RigidBodyHandle, at: Position) {
        if let Some(rb) = self.bodies.get_mut(body) {
            rb.set_translation(vector![at.x, at.y], true);
            rb.set_linvel(vector![0.0, 0.0], true);
            rb.set_angvel(0.0, true);
            rb.reset_forces(true);
        }
    }

    /// Sets the linear velocity in pixels per second.
    #[cfg(test)]
    pub fn set_velocity(&mut self, body: RigidBodyHandle, velocity: (f32, f32)) {
        if let Some(rb) = self.bodies.get_mut(body) {
            rb.set_linvel(vector![velocity.0, velocity.1], true);
        }
    }

    /// Replaces the body's accumulated force for the next step.
    pub fn set_force(&mut self, body: RigidBodyHandle, force: (f32, f32)) {
        if let Some(rb) = self.bodies.get_mut(body) {
            rb.reset_forces(false);
            if force != (0.0, 0.0) {
                rb.add_force(vector![force.0, force.1] * FORCE_SCALE, true);
            }
        }
    }

    /// Applies a client-unit force as a single-step impulse.
    pub fn apply_impulse(&mut self, body: RigidBodyHandle, force: (f32, f32)) {
        let dt = self.integration_params.dt;
        if let Some(rb) = self.bodies.get_mut(body) {
            rb.apply_impulse(vector![force.0, force.1] * (FORCE_SCALE * dt), true);
        }
    }

    /// Advances one step and returns the labelled begin/end collision pairs.
    pub fn step(&mut self) -> Vec<ContactEvent> {
        let (collision_send, collision_recv) =
            rapier2d::crossbeam::channel::unbounded::<CollisionEvent>();
        let (force_send, _force_recv) =
            rapier2d::crossbeam::channel::unbounded::<ContactForceEvent>();
        let event_handler = ChannelEventCollector::new(collision_send, force_send);

        self.pipeline.step(
            &self.gravity,
            &self.integration_params,
            &mut self.island_manager,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.bodies,
            &mut self.colliders,
            &mut self.impulse_joints,
            &mut self.multibody_joints,
            &mut self.ccd_solver,
            None,
            &self.hooks,
            &event_handler,
        );

        let mut contacts = Vec::new();
        while let Ok(event) = collision_recv.try_recv() {
            let a = self.tags.get(&event.collider1()).copied();
            let b = self.tags.get(&event.collider2()).copied();
            let (a, b) = match (a, b) {
                (Some(a), Some(b)) => (a, b),
                // End events for colliders we already removed carry no information.
                _ if event.removed() => continue,
                _ => panic!(
                    "collision references an unregistered collider: {:?}",
                    event
                ),
            };
            contacts.push(if event.started() {
                ContactEvent::Started(a, b)
            } else {
                ContactEvent::Stopped(a, b)
            });
        }
        contacts
    }

    fn insert_fixed(&mut self, rect: Rect, collider: Collider, tag: BodyTag) -> RigidBodyHandle {
        let center = rect.center();
        let body = self
            .bodies
            .insert(RigidBodyBuilder::fixed().translation(vector![center.x, center.y]).build());
        self.attach(collider, body, tag);
        body
    }

    fn insert_dynamic(&mut self, shape: Circle, options: BodyOptions) -> RigidBodyHandle {
        let rb = RigidBodyBuilder::dynamic()
            .translation(vector![shape.x, shape.y])
            .linear_damping(linear_damping(options.friction_air, self.integration_params.dt))
            .ccd_enabled(true)
            .can_sleep(false)
            .build();
        self.bodies.insert(rb)
    }

    fn attach(&mut self, collider: Collider, body: RigidBodyHandle, tag: BodyTag) -> ColliderHandle {
        let handle = self
            .colliders
            .insert_with_parent(collider, body, &mut self.bodies);
        self.tags.insert(handle, tag);
        handle
    }
}

fn rect_collider(rect: Rect) -> ColliderBuilder {
    ColliderBuilder::cuboid(rect.w / 2.0, rect.h / 2.0)
}

/// Damping that removes `friction_air` of the velocity every `dt` step.
fn linear_damping(friction_air: f32, dt: f32) -> f32 {
    friction_air / ((1.0 - friction_air) * dt)
}
