/// Randomized pointer motion
///
/// Moves the system pointer along an eased path to a jittered target, then
/// pauses briefly before the caller acts. rdev cannot read the current cursor
/// position, so the mover remembers where it last left the pointer.
use rand::Rng;
use rdev::{simulate, EventType};
use std::thread;
use std::time::Duration;

use crate::config::ScreenPoint;
use crate::error::ActuationError;

/// Timing and jitter of a single pointer move
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionProfile {
    /// Maximum offset, in pixels, applied to each axis of the target
    pub jitter_px: i32,
    pub base_duration: Duration,
    /// Upper bound of the random extra added to `base_duration`
    pub extra_duration: Duration,
    pub settle_min: Duration,
    pub settle_max: Duration,
    /// Interval between intermediate pointer events
    pub step: Duration,
}

impl Default for MotionProfile {
    fn default() -> Self {
        Self {
            jitter_px: 5,
            base_duration: Duration::from_millis(200),
            extra_duration: Duration::from_millis(200),
            settle_min: Duration::from_millis(50),
            settle_max: Duration::from_millis(120),
            step: Duration::from_millis(10),
        }
    }
}

/// Quadratic ease-in/ease-out over `t` in [0, 1]
pub fn ease_in_out_quad(t: f64) -> f64 {
    let t = t.clamp(0.0, 1.0);
    if t < 0.5 {
        2.0 * t * t
    } else {
        1.0 - (-2.0 * t + 2.0).powi(2) / 2.0
    }
}

/// Target offset by up to `jitter` pixels on each axis
pub fn jittered(target: ScreenPoint, jitter: i32, rng: &mut impl Rng) -> ScreenPoint {
    if jitter <= 0 {
        return target;
    }
    ScreenPoint::new(
        target.x + rng.gen_range(-jitter..=jitter),
        target.y + rng.gen_range(-jitter..=jitter),
    )
}

/// Intermediate positions from `from` to `to`, ending exactly on `to`
pub fn eased_path(from: ScreenPoint, to: ScreenPoint, steps: usize) -> Vec<(f64, f64)> {
    let steps = steps.max(1);
    let (dx, dy) = ((to.x - from.x) as f64, (to.y - from.y) as f64);
    (1..=steps)
        .map(|i| {
            let k = ease_in_out_quad(i as f64 / steps as f64);
            (from.x as f64 + dx * k, from.y as f64 + dy * k)
        })
        .collect()
}

/// Moves the system pointer through rdev
pub struct PointerMover {
    profile: MotionProfile,
    last: Option<ScreenPoint>,
}

impl PointerMover {
    pub fn new(profile: MotionProfile) -> Self {
        Self {
            profile,
            last: None,
        }
    }

    /// Move to a jittered `target` and settle. Returns where the pointer ended up.
    pub fn move_to(&mut self, target: ScreenPoint) -> Result<ScreenPoint, ActuationError> {
        let mut rng = rand::thread_rng();
        let profile = self.profile;

        let destination = jittered(target, profile.jitter_px, &mut rng);
        let extra_ms = profile.extra_duration.as_millis() as u64;
        let duration =
            profile.base_duration + Duration::from_millis(rng.gen_range(0..=extra_ms));

        match self.last {
            Some(from) => {
                let step_ms = profile.step.as_millis().max(1);
                let steps = (duration.as_millis() / step_ms).max(1) as usize;
                for (x, y) in eased_path(from, destination, steps) {
                    send(x, y)?;
                    thread::sleep(profile.step);
                }
            }
            // First move of the run: position unknown, jump straight there
            None => {
                send(destination.x as f64, destination.y as f64)?;
                thread::sleep(duration);
            }
        }
        self.last = Some(destination);

        let settle_min = profile.settle_min.as_millis() as u64;
        let settle_max = (profile.settle_max.as_millis() as u64).max(settle_min);
        thread::sleep(Duration::from_millis(rng.gen_range(settle_min..=settle_max)));

        Ok(destination)
    }
}

impl Default for PointerMover {
    fn default() -> Self {
        Self::new(MotionProfile::default())
    }
}

fn send(x: f64, y: f64) -> Result<(), ActuationError> {
    simulate(&EventType::MouseMove { x, y })
        .map_err(|e| ActuationError::PointerFailed(format!("{:?}", e)))
}
