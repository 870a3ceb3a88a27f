/// Bot run lifecycle
///
/// Guards the control surface against double starts and stops while the
/// background threads are being spawned or joined.
use std::time::{Duration, Instant};

use crate::error::RunError;

/// Where the bot is in its start/stop cycle
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum RunPhase {
    /// No background threads
    #[default]
    Stopped,

    /// Validating settings and spawning threads
    Starting,

    /// Scan loop and hotkey listener are up
    Running { since: Instant },

    /// Stop signal set, threads being joined
    Stopping,
}

impl RunPhase {
    pub fn is_stopped(&self) -> bool {
        matches!(self, RunPhase::Stopped)
    }

    pub fn is_running(&self) -> bool {
        matches!(self, RunPhase::Running { .. })
    }

    /// Time since the run started
    pub fn uptime(&self) -> Option<Duration> {
        match self {
            RunPhase::Running { since } => Some(since.elapsed()),
            _ => None,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            RunPhase::Stopped => "Stopped",
            RunPhase::Starting => "Starting...",
            RunPhase::Running { .. } => "Running",
            RunPhase::Stopping => "Stopping...",
        }
    }
}

/// Transitions: Stopped → Starting → Running → Stopping → Stopped
#[derive(Debug, Default)]
pub struct RunLifecycle {
    phase: RunPhase,
}

impl RunLifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    pub fn begin_start(&mut self) -> Result<(), RunError> {
        match self.phase {
            RunPhase::Stopped => {
                self.phase = RunPhase::Starting;
                Ok(())
            }
            RunPhase::Running { .. } => Err(RunError::AlreadyRunning),
            _ => Err(RunError::InTransition),
        }
    }

    pub fn mark_running(&mut self) -> Result<(), RunError> {
        match self.phase {
            RunPhase::Starting => {
                self.phase = RunPhase::Running {
                    since: Instant::now(),
                };
                Ok(())
            }
            _ => Err(RunError::InTransition),
        }
    }

    pub fn begin_stop(&mut self) -> Result<(), RunError> {
        match self.phase {
            RunPhase::Running { .. } => {
                self.phase = RunPhase::Stopping;
                Ok(())
            }
            RunPhase::Stopped => Err(RunError::NotRunning),
            _ => Err(RunError::InTransition),
        }
    }

    pub fn mark_stopped(&mut self) -> Result<(), RunError> {
        match self.phase {
            RunPhase::Stopping => {
                self.phase = RunPhase::Stopped;
                Ok(())
            }
            _ => Err(RunError::InTransition),
        }
    }

    /// Back to Stopped from anywhere, after a failed start
    pub fn force_stop(&mut self) {
        self.phase = RunPhase::Stopped;
    }
}
