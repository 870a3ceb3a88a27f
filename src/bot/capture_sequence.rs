/// Capture sequence
///
/// ```text
/// open items ─► [capture item marker] ─► click ─► [use marker] ─► click
///                       10s / 0.5s                  10s / 0.2s
///            ─► [no button marker] ─► click, success notification
///                    25s / 0.5s       (timeout: failure notification)
/// ```
///
/// Each wait is a bounded poll of the action scan region. Losing either of
/// the first two markers abandons the sequence.
use anyhow::Result;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use super::controller::Controller;
use super::poll::{poll_for, PollOutcome};
use super::state::BotState;
use crate::actuation::{Actuator, Notifier};
use crate::config::ScreenPoint;
use crate::detection::find_action_marker;
use crate::error::ActuationError;
use crate::perception::Perception;

/// One marker wait in the sequence
struct Phase<'a> {
    name: &'static str,
    marker: Option<&'a Path>,
    point: ScreenPoint,
    window: Duration,
    interval: Duration,
}

impl<P, A, N> Controller<P, A, N>
where
    P: Perception,
    A: Actuator,
    N: Notifier,
{
    pub(super) fn capture_sequence(&mut self) -> Result<BotState> {
        let settings = Arc::clone(&self.settings);
        let timings = self.timings;

        self.log.action("Initiating capture sequence.");
        self.click(settings.open_items_point);

        let phases = [
            Phase {
                name: "Capture item",
                marker: settings.capture_item_image.as_deref(),
                point: settings.capture_item_point,
                window: timings.capture_item_window,
                interval: timings.capture_item_interval,
            },
            Phase {
                name: "Use button",
                marker: settings.use_item_image.as_deref(),
                point: settings.use_item_point,
                window: timings.use_item_window,
                interval: timings.use_item_interval,
            },
        ];

        for phase in &phases {
            match self.wait_for_marker(phase)? {
                PollOutcome::Found(at) => {
                    let target = self.click_target(at, phase.point);
                    self.click(target);
                }
                PollOutcome::TimedOut => {
                    self.log.error(format!(
                        "Capture failed: {} not found in specified area.",
                        phase.name
                    ));
                    return Ok(BotState::cooldown(timings.capture_cooldown));
                }
                PollOutcome::Cancelled => {
                    self.log
                        .warning(format!("Capture cancelled while waiting for {}.", phase.name));
                    return Ok(BotState::cooldown(timings.capture_cooldown));
                }
            }
        }

        self.log.action("Waiting for capture result...");
        let completion = Phase {
            name: "No button",
            marker: settings.no_button_image.as_deref(),
            point: settings.no_button_point,
            window: timings.completion_window,
            interval: timings.completion_interval,
        };

        match self.wait_for_marker(&completion)? {
            PollOutcome::Found(at) => {
                let target = self.click_target(at, completion.point);
                self.click(target);
                self.log.success("Target captured successfully!");
                self.notify_current_frame("Target was captured successfully.");
            }
            PollOutcome::TimedOut => {
                self.log
                    .error("Capture failed: target broke free or timeout occurred.");
                self.notify_current_frame("Capture failed: target broke free or timeout.");
            }
            PollOutcome::Cancelled => {
                self.log
                    .warning("Capture cancelled while waiting for the result.");
            }
        }

        Ok(BotState::cooldown(timings.capture_cooldown))
    }

    /// Poll the action scan region for a phase's marker
    fn wait_for_marker(&mut self, phase: &Phase<'_>) -> Result<PollOutcome<ScreenPoint>> {
        let Some(marker) = phase.marker else {
            self.log
                .error(format!("{} image not configured.", phase.name));
            return Ok(PollOutcome::TimedOut);
        };

        let settings = Arc::clone(&self.settings);
        let run = self.run.clone();
        poll_for(&run, phase.window, phase.interval, || -> Result<_> {
            let frame = self.perception.capture()?;
            Ok(find_action_marker(
                &mut self.perception,
                &frame,
                marker,
                settings.marker_match_threshold,
                settings.action_scan_region,
                &self.log,
            ))
        })
    }

    fn click_target(&self, found: ScreenPoint, configured: ScreenPoint) -> ScreenPoint {
        if self.settings.click_found_markers {
            found
        } else {
            configured
        }
    }

    /// Pointer to `point`, then the capture script. Failures are logged; the
    /// next marker wait shows whether the click landed.
    fn click(&mut self, point: ScreenPoint) {
        if let Err(e) = self.actuator.move_pointer(point) {
            self.log.error(format!("Pointer move to {} failed: {}", point, e));
        }

        let result = match self.settings.capture_script.as_deref() {
            Some(script) => self.actuator.run_script(script),
            None => Err(ActuationError::ScriptMissing("Capture")),
        };
        if let Err(e) = result {
            self.log.error(format!("Capture script failed: {}", e));
        }
    }

    fn notify_current_frame(&mut self, message: &str) {
        match self.perception.capture() {
            Ok(frame) => self.notifier.notify(message, &frame),
            Err(e) => self
                .log
                .error(format!("Could not capture screen for notification: {}", e)),
        }
    }
}
