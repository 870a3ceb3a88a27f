/// Encounter state machine
///
/// One call to [`Controller::tick`] captures the screen, evaluates the current
/// state and moves to the next one. Nothing inside a tick is fatal to the
/// loop: errors and panics are logged and turned into a cooldown.
use anyhow::Result;
use image::RgbaImage;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

use super::poll::{poll_for, PollOutcome};
use super::state::{BotState, Timings};
use crate::actuation::{Actuator, Notifier};
use crate::catalog::TargetCatalog;
use crate::config::Settings;
use crate::detection::{
    classify_form, header_detected, identify_target, match_form, FormAction, Identification,
};
use crate::error::ActuationError;
use crate::perception::Perception;
use crate::runtime::{BotLog, RunContext};

pub struct Controller<P, A, N> {
    pub(super) perception: P,
    pub(super) actuator: A,
    pub(super) notifier: N,
    pub(super) settings: Arc<Settings>,
    pub(super) catalog: Arc<TargetCatalog>,
    pub(super) timings: Timings,
    pub(super) run: RunContext,
    pub(super) log: BotLog,
    state: BotState,
}

impl<P, A, N> Controller<P, A, N>
where
    P: Perception,
    A: Actuator,
    N: Notifier,
{
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        perception: P,
        actuator: A,
        notifier: N,
        settings: Arc<Settings>,
        catalog: Arc<TargetCatalog>,
        timings: Timings,
        run: RunContext,
        log: BotLog,
    ) -> Self {
        Self {
            perception,
            actuator,
            notifier,
            settings,
            catalog,
            timings,
            run,
            log,
            state: BotState::Searching,
        }
    }

    pub fn state(&self) -> BotState {
        self.state
    }

    /// Force a state; used to resume or to drive the machine in tests
    pub fn set_state(&mut self, state: BotState) {
        self.state = state;
    }

    pub fn timings(&self) -> &Timings {
        &self.timings
    }

    pub fn run_context(&self) -> &RunContext {
        &self.run
    }

    pub fn perception(&self) -> &P {
        &self.perception
    }

    pub fn actuator(&self) -> &A {
        &self.actuator
    }

    pub fn notifier(&self) -> &N {
        &self.notifier
    }

    /// Evaluate the current state once and return the next one.
    ///
    /// A cooldown whose wake time has not arrived returns immediately without
    /// capturing. An elapsed cooldown becomes `Searching`, evaluated in the
    /// same tick.
    pub fn tick(&mut self) -> BotState {
        if let BotState::Cooldown { until } = self.state {
            if Instant::now() < until {
                return self.state;
            }
            self.state = BotState::Searching;
        }

        let current = self.state;
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.step(current)));

        let next = match outcome {
            Ok(Ok(next)) => next,
            Ok(Err(e)) => {
                self.log
                    .fatal(format!("Unhandled error in {} state: {:#}", current, e));
                BotState::cooldown(self.timings.fatal_cooldown)
            }
            Err(payload) => {
                self.log.fatal(format!(
                    "Unhandled panic in {} state: {}",
                    current,
                    panic_message(payload.as_ref())
                ));
                BotState::cooldown(self.timings.fatal_cooldown)
            }
        };

        if next.name() != current.name() {
            tracing::debug!("State {} -> {}", current, next);
        }
        self.state = next;
        next
    }

    fn step(&mut self, state: BotState) -> Result<BotState> {
        let scene = match self.perception.capture() {
            Ok(scene) => scene,
            Err(e) => {
                self.log.error(format!("Screen capture failed: {}", e));
                return Ok(state);
            }
        };

        match state {
            BotState::Searching => Ok(self.search(&scene)),
            BotState::Analyzing => self.analyze(&scene),
            BotState::ActionRun => Ok(self.run_away()),
            BotState::ActionCapture => self.capture_sequence(),
            BotState::Cooldown { .. } => Ok(state),
        }
    }

    fn search(&mut self, scene: &RgbaImage) -> BotState {
        if header_detected(&mut self.perception, scene, &self.settings, &self.log) {
            self.log.info("Encounter detected. Moving to analysis.");
            BotState::Analyzing
        } else {
            BotState::Searching
        }
    }

    fn analyze(&mut self, scene: &RgbaImage) -> Result<BotState> {
        let settings = Arc::clone(&self.settings);
        let catalog = Arc::clone(&self.catalog);

        let target =
            match identify_target(&mut self.perception, scene, &settings, &catalog, &self.log) {
                Identification::NoText => return Ok(BotState::Searching),
                Identification::Unknown(name) => {
                    self.log.info(format!("Common target '{}' found.", name));
                    return Ok(BotState::ActionRun);
                }
                Identification::Known(target) => target,
            };

        self.log.success(format!(
            "Rare target '{}' found! Checking forms...",
            target.name
        ));

        let run = self.run.clone();
        let outcome = poll_for(
            &run,
            self.timings.analysis_window,
            self.timings.analysis_interval,
            || -> Result<_> {
                let frame = self.perception.capture()?;
                Ok(
                    match_form(&mut self.perception, &frame, target, &settings, &self.log)
                        .map(|found| (found, frame)),
                )
            },
        )?;

        match outcome {
            PollOutcome::Found((found, frame)) => {
                self.log.success(format!(
                    "Matched form '{}' for '{}'.",
                    found.label, target.name
                ));
                self.notifier.notify(
                    &format!("Found '{}' (Form: {})!", target.name, found.label),
                    &frame,
                );

                Ok(match classify_form(&found.label, &settings) {
                    FormAction::Capture => BotState::ActionCapture,
                    FormAction::Flee => BotState::ActionRun,
                    FormAction::Unclassified => {
                        self.log.warning(format!(
                            "Form '{}' is in neither list. Defaulting to run away.",
                            found.label
                        ));
                        BotState::ActionRun
                    }
                })
            }
            PollOutcome::TimedOut => {
                self.log.warning(format!(
                    "Timeout: No matching form found for '{}'.",
                    target.name
                ));
                self.notifier.notify(
                    &format!("Found rare target '{}' but form is unknown!", target.name),
                    scene,
                );
                Ok(BotState::ActionRun)
            }
            PollOutcome::Cancelled => Ok(BotState::Searching),
        }
    }

    fn run_away(&mut self) -> BotState {
        self.log.action("Running away via automation script.");
        if let Err(e) = flee(&mut self.actuator, &self.settings) {
            self.log
                .error(format!("Could not run the run-away script: {}", e));
        }
        BotState::cooldown(self.timings.run_cooldown)
    }
}

/// Move to the run-away button and fire the run-away script
pub fn flee<A: Actuator + ?Sized>(
    actuator: &mut A,
    settings: &Settings,
) -> Result<(), ActuationError> {
    let script = settings
        .run_away_script
        .as_deref()
        .ok_or(ActuationError::ScriptMissing("Run away"))?;
    actuator.move_pointer(settings.run_away_point)?;
    actuator.run_script(script)
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
