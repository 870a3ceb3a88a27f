/// Actuation primitives
///
/// Side effects the bot has on the outside world: pointer motion, external
/// automation scripts, and webhook notifications. The controller only sees
/// the [`Actuator`] and [`Notifier`] traits.
pub mod notify;
pub mod pointer;
pub mod script;

use image::RgbaImage;
use std::path::{Path, PathBuf};

use crate::config::ScreenPoint;
use crate::error::ActuationError;

pub use notify::WebhookNotifier;
pub use pointer::{MotionProfile, PointerMover};
pub use script::ScriptRunner;

/// Input the bot sends to the game
pub trait Actuator {
    /// Move the pointer near `target`
    fn move_pointer(&mut self, target: ScreenPoint) -> Result<(), ActuationError>;

    /// Run an automation script and wait for it to exit
    fn run_script(&mut self, script: &Path) -> Result<(), ActuationError>;
}

/// Outbound messages about what the bot saw
pub trait Notifier {
    /// Deliver `message` with `frame` attached. Delivery failures are the
    /// notifier's to log; they never reach the caller.
    fn notify(&mut self, message: &str, frame: &RgbaImage);
}

/// Real desktop input: rdev pointer motion plus the automation executable
pub struct DesktopActuator {
    pointer: PointerMover,
    scripts: ScriptRunner,
}

impl DesktopActuator {
    pub fn new(executable: Option<PathBuf>) -> Self {
        Self {
            pointer: PointerMover::default(),
            scripts: ScriptRunner::new(executable),
        }
    }
}

impl Actuator for DesktopActuator {
    fn move_pointer(&mut self, target: ScreenPoint) -> Result<(), ActuationError> {
        self.pointer.move_to(target).map(|_| ())
    }

    fn run_script(&mut self, script: &Path) -> Result<(), ActuationError> {
        self.scripts.run(script)
    }
}

impl Notifier for WebhookNotifier {
    fn notify(&mut self, message: &str, frame: &RgbaImage) {
        self.send(message, frame);
    }
}
