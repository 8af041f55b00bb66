use std::{env, time::Duration};

// Runtime/server constants (not gameplay tuning; see `domain::config` for that).

pub fn http_port() -> u16 {
    env::var("MATCH_SERVER_PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(3000)
}

pub const INPUT_CHANNEL_CAPACITY: usize = 1024;
pub const EVENT_BROADCAST_CAPACITY: usize = 128;

pub const TICK_INTERVAL: Duration = Duration::from_millis(1000 / 60);
// Positions go out every n-th tick.
pub const SNAPSHOT_EVERY: u64 = 2;
// Delay after a goal before positions reset, and after the winning goal before the match stops.
pub const GOAL_PAUSE: Duration = Duration::from_millis(1000);
pub const CHAT_HISTORY: usize = 10;
