/// Controller states and timing
use std::fmt;
use std::time::{Duration, Instant};

/// The controller's current state. Cooldown carries its own wake time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BotState {
    /// Waiting for the encounter header
    Searching,
    /// Encounter open; read the name and compare form photos
    Analyzing,
    /// Flee the encounter
    ActionRun,
    /// Run the capture sequence
    ActionCapture,
    /// Do nothing until `until`
    Cooldown { until: Instant },
}

impl BotState {
    /// Cooldown ending `duration` from now
    pub fn cooldown(duration: Duration) -> Self {
        BotState::Cooldown {
            until: Instant::now() + duration,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            BotState::Searching => "SEARCHING",
            BotState::Analyzing => "ANALYZING",
            BotState::ActionRun => "ACTION_RUN",
            BotState::ActionCapture => "ACTION_CAPTURE",
            BotState::Cooldown { .. } => "COOLDOWN",
        }
    }

    pub fn is_cooldown(&self) -> bool {
        matches!(self, BotState::Cooldown { .. })
    }

    /// Wake time, if cooling down
    pub fn wake_time(&self) -> Option<Instant> {
        match self {
            BotState::Cooldown { until } => Some(*until),
            _ => None,
        }
    }
}

impl Default for BotState {
    fn default() -> Self {
        BotState::Searching
    }
}

impl fmt::Display for BotState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Every delay, window and poll interval the bot uses
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Timings {
    /// Pause between controller ticks
    pub tick: Duration,
    /// Sleep while scanning is paused
    pub paused_idle: Duration,

    pub analysis_window: Duration,
    pub analysis_interval: Duration,

    pub capture_item_window: Duration,
    pub capture_item_interval: Duration,
    pub use_item_window: Duration,
    pub use_item_interval: Duration,
    pub completion_window: Duration,
    pub completion_interval: Duration,

    pub run_cooldown: Duration,
    pub capture_cooldown: Duration,
    /// Cooldown forced after an unhandled failure in a tick
    pub fatal_cooldown: Duration,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            tick: Duration::from_millis(200),
            paused_idle: Duration::from_millis(100),
            analysis_window: Duration::from_secs(10),
            analysis_interval: Duration::from_millis(500),
            capture_item_window: Duration::from_secs(10),
            capture_item_interval: Duration::from_millis(500),
            use_item_window: Duration::from_secs(10),
            use_item_interval: Duration::from_millis(200),
            completion_window: Duration::from_secs(25),
            completion_interval: Duration::from_millis(500),
            run_cooldown: Duration::from_secs(3),
            capture_cooldown: Duration::from_secs(5),
            fatal_cooldown: Duration::from_secs(5),
        }
    }
}
