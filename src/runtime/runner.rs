/// Run control surface
///
/// `BotRunner` owns the background threads of one run: the scan loop and
/// the hotkey listener. It is cheap to clone; every clone controls the same
/// run.
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use super::hotkeys::run_hotkey_listener;
use super::log::BotLog;
use super::scan_loop::run_scan_loop;
use super::signal::RunContext;
use crate::actuation::{Actuator, DesktopActuator, Notifier, WebhookNotifier};
use crate::bot::{Controller, Timings};
use crate::catalog::TargetCatalog;
use crate::config::Settings;
use crate::error::RunError;
use crate::perception::{Perception, ScreenPerception};
use crate::state::{RunLifecycle, RunPhase};

#[derive(Clone)]
pub struct BotRunner {
    inner: Arc<RunnerInner>,
}

struct RunnerInner {
    lifecycle: Mutex<RunLifecycle>,
    run: RunContext,
    threads: Mutex<Vec<JoinHandle<()>>>,
    log: BotLog,
    timings: Timings,
    hotkeys: bool,
}

impl BotRunner {
    pub fn new(log: BotLog) -> Self {
        Self::with_timings(log, Timings::default())
    }

    pub fn with_timings(log: BotLog, timings: Timings) -> Self {
        Self::build(log, timings, true)
    }

    /// Runner that never registers global hotkeys
    pub fn without_hotkeys(log: BotLog, timings: Timings) -> Self {
        Self::build(log, timings, false)
    }

    fn build(log: BotLog, timings: Timings, hotkeys: bool) -> Self {
        Self {
            inner: Arc::new(RunnerInner {
                lifecycle: Mutex::new(RunLifecycle::new()),
                run: RunContext::new(false),
                threads: Mutex::new(Vec::new()),
                log,
                timings,
                hotkeys,
            }),
        }
    }

    pub fn phase(&self) -> RunPhase {
        self.inner.lifecycle.lock().phase()
    }

    /// Running and not yet stopped from inside, e.g. by a failed start-up
    /// on the scan thread
    pub fn is_running(&self) -> bool {
        self.phase().is_running() && !self.inner.run.stop.is_set()
    }

    pub fn is_scanning(&self) -> bool {
        self.inner.run.is_scanning()
    }

    pub fn run_context(&self) -> &RunContext {
        &self.inner.run
    }

    /// Start against the live desktop
    pub fn start(&self, settings: Settings, catalog: TargetCatalog) -> Result<(), RunError> {
        self.start_with(settings, catalog, |settings, log| {
            let perception = ScreenPerception::new(settings.tessdata_path.as_deref())?;
            let actuator = DesktopActuator::new(settings.automation_executable.clone());
            let notifier = WebhookNotifier::new(&settings.webhook_urls, log.clone());
            Ok((perception, actuator, notifier))
        })
    }

    /// Start a run whose perception, actuator and notifier come from `build`.
    ///
    /// `build` runs on the scan thread, so the collaborators need not be `Send`.
    /// Scanning starts paused; the pause hotkey or [`BotRunner::toggle_scan`]
    /// begins it.
    pub fn start_with<P, A, N, F>(
        &self,
        settings: Settings,
        catalog: TargetCatalog,
        build: F,
    ) -> Result<(), RunError>
    where
        P: Perception,
        A: Actuator,
        N: Notifier,
        F: FnOnce(&Settings, &BotLog) -> anyhow::Result<(P, A, N)> + Send + 'static,
    {
        let inner = &self.inner;
        self.reap_dead_run();
        inner.lifecycle.lock().begin_start()?;

        let mut problems = match settings.validate() {
            Ok(()) => Vec::new(),
            Err(e) => vec![e.to_string()],
        };
        problems.extend(settings.missing_requirements());
        if !problems.is_empty() {
            inner.lifecycle.lock().force_stop();
            let err = RunError::MissingConfiguration(problems);
            inner.log.error(format!("Cannot start: {}", err));
            return Err(err);
        }

        inner.log.info(format!(
            "Loaded: {} names, {} photos.",
            catalog.len(),
            catalog.photo_count()
        ));

        inner.run.stop.reset();
        inner.run.set_scanning(false);

        let pause_binding = settings.pause_hotkey.clone();
        let shutdown_binding = settings.shutdown_hotkey.clone();
        let settings = Arc::new(settings);
        let catalog = Arc::new(catalog);

        let scan = {
            let run = inner.run.clone();
            let log = inner.log.clone();
            let timings = inner.timings;
            thread::Builder::new()
                .name("scan-loop".to_string())
                .spawn(move || match build(&settings, &log) {
                    Ok((perception, actuator, notifier)) => {
                        let mut controller = Controller::new(
                            perception,
                            actuator,
                            notifier,
                            settings,
                            catalog,
                            timings,
                            run,
                            log,
                        );
                        run_scan_loop(&mut controller);
                    }
                    Err(e) => {
                        log.fatal(format!("Could not initialize the bot: {:#}", e));
                        run.stop.set();
                    }
                })
        };
        let scan = match scan {
            Ok(handle) => handle,
            Err(e) => {
                inner.lifecycle.lock().force_stop();
                return Err(RunError::ThreadSpawnFailed("scan", e));
            }
        };
        inner.threads.lock().push(scan);

        if inner.hotkeys {
            let runner = self.clone();
            let spawned = thread::Builder::new()
                .name("hotkeys".to_string())
                .spawn(move || {
                    let run = runner.inner.run.clone();
                    let log = runner.inner.log.clone();
                    run_hotkey_listener(
                        &run,
                        &pause_binding,
                        &shutdown_binding,
                        &log,
                        || {
                            runner.toggle_scan();
                        },
                        || runner.emergency_shutdown(),
                    );
                });
            match spawned {
                Ok(handle) => inner.threads.lock().push(handle),
                Err(e) => {
                    inner.run.stop.set();
                    self.join_threads();
                    inner.lifecycle.lock().force_stop();
                    return Err(RunError::ThreadSpawnFailed("hotkey", e));
                }
            }
        }

        inner.lifecycle.lock().mark_running()?;
        inner.log.status(format!(
            "Bot started. Scanning is paused; press '{}' to begin.",
            self.pause_hint()
        ));
        Ok(())
    }

    /// Set the stop signal and wait for both threads to exit.
    ///
    /// An external script already running finishes before the scan loop sees
    /// the signal.
    pub fn stop(&self) -> Result<(), RunError> {
        let inner = &self.inner;
        inner.lifecycle.lock().begin_stop()?;

        inner.log.info("Stopping bot...");
        inner.run.set_scanning(false);
        inner.run.stop.set();
        self.join_threads();

        inner.lifecycle.lock().mark_stopped()?;
        inner.log.status("Bot stopped.");
        Ok(())
    }

    /// Flip the scanning flag; returns whether scanning is now active
    pub fn toggle_scan(&self) -> bool {
        let active = self.inner.run.toggle_scanning();
        self.inner.log.status(format!(
            "============== SCAN {} ==============",
            if active { "STARTED" } else { "PAUSED" }
        ));
        active
    }

    /// Stop signal, then terminate the process without joining anything
    pub fn emergency_shutdown(&self) {
        self.inner.log.fatal("Emergency shutdown requested.");
        self.inner.run.set_scanning(false);
        self.inner.run.stop.set();
        std::process::exit(0);
    }

    /// A run whose stop signal was raised from inside still holds its
    /// threads and its Running phase; close it out before starting again.
    fn reap_dead_run(&self) {
        let dead = self.phase().is_running() && self.inner.run.stop.is_set();
        if dead {
            if let Err(e) = self.stop() {
                tracing::warn!("Could not close the previous run: {}", e);
            }
        }
    }

    fn join_threads(&self) {
        let handles: Vec<_> = self.inner.threads.lock().drain(..).collect();
        let current = thread::current().id();
        for handle in handles {
            if handle.thread().id() == current {
                continue;
            }
            if handle.join().is_err() {
                tracing::error!("Background thread panicked during shutdown");
            }
        }
    }

    fn pause_hint(&self) -> &'static str {
        if self.inner.hotkeys {
            "the pause hotkey"
        } else {
            "toggle"
        }
    }
}
