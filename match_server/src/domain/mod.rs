// Domain layer: pitch layout, physics-backed simulation and match rules.

pub mod config;
pub mod engine;
pub mod errors;
pub mod geometry;
pub mod physics;
pub mod state;

pub use config::PitchConfig;
pub use engine::{EngineEvent, SimulationEngine};
pub use errors::MatchError;
pub use geometry::Geometry;
pub use state::{Key, Score, Snapshot, Team};
