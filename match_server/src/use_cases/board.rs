// Match controller: engine lifecycle, score, win check and timed pauses.

use crate::domain::geometry::{self, Geometry};
use crate::domain::{EngineEvent, MatchError, PitchConfig, Score, SimulationEngine, Team};
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Timing knobs for the controller.
#[derive(Debug, Clone, Copy)]
pub struct BoardSettings {
    /// Delay between a goal (or the winning goal) and its follow-up.
    pub pause: Duration,
    /// Physics step in seconds.
    pub dt: f32,
}

/// Whether an options update took effect now or waits for the match to stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionsUpdate {
    Applied,
    Deferred,
}

/// Things the controller reports back to the match service.
#[derive(Debug, Clone, PartialEq)]
pub enum BoardEvent {
    /// A goal pause elapsed; bodies are back on their spawns.
    Goal(Score),
    Winner { team: Team, score: Score },
    /// The match stopped on its own (after a win).
    Stopped,
    OptionsApplied(PitchConfig),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Followup {
    GoalReset,
    Winner(Team),
}

// A deferred follow-up bound to the engine instance it was scheduled against.
#[derive(Debug, Clone, Copy)]
struct ScheduledTask {
    deadline: Instant,
    engine_id: u64,
    followup: Followup,
}

pub struct Board {
    config: PitchConfig,
    geometry: Geometry,
    pending: Option<PitchConfig>,
    score: Score,
    engine: Option<SimulationEngine>,
    scheduled: Option<ScheduledTask>,
    next_engine_id: u64,
    settings: BoardSettings,
}

impl Board {
    pub fn new(config: PitchConfig, settings: BoardSettings) -> Result<Self, MatchError> {
        config.validate()?;
        Ok(Self {
            geometry: geometry::generate(&config),
            config,
            pending: None,
            score: Score::default(),
            engine: None,
            scheduled: None,
            next_engine_id: 1,
            settings,
        })
    }

    pub fn config(&self) -> &PitchConfig {
        &self.config
    }

    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    pub fn pending_config(&self) -> Option<&PitchConfig> {
        self.pending.as_ref()
    }

    pub fn score(&self) -> Score {
        self.score
    }

    pub fn is_running(&self) -> bool {
        self.engine.is_some()
    }

    /// True while a goal or win follow-up is outstanding.
    pub fn is_paused(&self) -> bool {
        self.scheduled.is_some()
    }

    pub fn engine(&self) -> Option<&SimulationEngine> {
        self.engine.as_ref()
    }

    pub fn engine_mut(&mut self) -> Option<&mut SimulationEngine> {
        self.engine.as_mut()
    }

    /// Applies a config now when stopped, otherwise keeps it until the next stop.
    pub fn update_options(&mut self, config: PitchConfig) -> Result<OptionsUpdate, MatchError> {
        config.validate()?;
        if self.is_running() {
            debug!("options deferred until the match stops");
            self.pending = Some(config);
            Ok(OptionsUpdate::Deferred)
        } else {
            self.apply(config);
            Ok(OptionsUpdate::Applied)
        }
    }

    /// Builds a fresh engine with zero players and resets the score.
    pub fn start(&mut self) -> Result<&mut SimulationEngine, MatchError> {
        if self.engine.is_some() {
            return Err(MatchError::EngineAlreadyRunning);
        }

        let engine_id = self.next_engine_id;
        self.next_engine_id += 1;
        self.score = Score::default();
        self.scheduled = None;
        info!(engine_id, "match started");

        Ok(self.engine.insert(SimulationEngine::start(
            engine_id,
            self.geometry.clone(),
            self.config.clone(),
            self.settings.dt,
        )))
    }

    /// Tears the engine down; returns the pending config if stopping applied it.
    pub fn stop(&mut self) -> Result<Option<PitchConfig>, MatchError> {
        let mut engine = self.engine.take().ok_or(MatchError::EngineNotRunning)?;
        engine.destroy();
        self.scheduled = None;
        info!(engine_id = engine.id(), score = ?self.score, "match stopped");

        Ok(self.pending.take().map(|config| {
            self.apply(config.clone());
            config
        }))
    }

    /// Runs one physics tick, then fires any follow-up whose deadline has passed.
    pub fn advance(&mut self, now: Instant) -> Vec<BoardEvent> {
        let goals = self.engine.as_mut().map(SimulationEngine::step).unwrap_or_default();
        for EngineEvent::Goal { scoring } in goals {
            self.on_goal(scoring, now);
        }
        self.poll(now)
    }

    /// Fires the outstanding follow-up if due. Stale tasks (engine gone) are dropped.
    pub fn poll(&mut self, now: Instant) -> Vec<BoardEvent> {
        let Some(task) = self.scheduled else {
            return Vec::new();
        };
        if now < task.deadline {
            return Vec::new();
        }
        self.scheduled = None;

        let live = self
            .engine
            .as_ref()
            .is_some_and(|engine| engine.id() == task.engine_id && engine.is_alive());
        if !live {
            debug!(engine_id = task.engine_id, "dropping follow-up for a stopped match");
            return Vec::new();
        }

        match task.followup {
            Followup::GoalReset => {
                if let Some(engine) = self.engine.as_mut() {
                    engine.reset_positions();
                    engine.resume();
                }
                vec![BoardEvent::Goal(self.score)]
            }
            Followup::Winner(team) => {
                info!(?team, score = ?self.score, "match won");
                let mut events = vec![
                    BoardEvent::Goal(self.score),
                    BoardEvent::Winner {
                        team,
                        score: self.score,
                    },
                    BoardEvent::Stopped,
                ];
                if let Ok(Some(config)) = self.stop() {
                    events.push(BoardEvent::OptionsApplied(config));
                }
                events
            }
        }
    }

    /// Scores a goal unless a pause is already running.
    pub fn on_goal(&mut self, scoring: Team, now: Instant) {
        if self.scheduled.is_some() {
            return;
        }
        let Some(engine_id) = self.engine.as_ref().map(SimulationEngine::id) else {
            return;
        };

        let goals = self.score.record_goal(scoring);
        let followup = if goals >= self.config.max_goal {
            Followup::Winner(scoring)
        } else {
            Followup::GoalReset
        };
        info!(?scoring, score = ?self.score, ?followup, "goal");

        self.scheduled = Some(ScheduledTask {
            deadline: now + self.settings.pause,
            engine_id,
            followup,
        });
    }

    fn apply(&mut self, config: PitchConfig) {
        self.geometry = geometry::generate(&config);
        self.config = config;
        info!(team_size = self.config.team_size, "options applied");
    }
}
