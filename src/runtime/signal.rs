/// Run-scoped shared flags
///
/// `StopSignal` is a one-shot cancellation token: set once per run, never
/// cleared until the next run is started. Sleeping through it wakes up as
/// soon as it is set. The scanning flag is a plain atomic toggled by the
/// pause hotkey or the control surface.
use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Clone, Default)]
pub struct StopSignal {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request stop and wake every waiter
    pub fn set(&self) {
        let (lock, cvar) = &*self.inner;
        *lock.lock() = true;
        cvar.notify_all();
    }

    pub fn is_set(&self) -> bool {
        *self.inner.0.lock()
    }

    /// Clear the signal before a new run
    pub(crate) fn reset(&self) {
        *self.inner.0.lock() = false;
    }

    /// Block until the signal is set
    pub fn wait(&self) {
        let (lock, cvar) = &*self.inner;
        let mut stopped = lock.lock();
        while !*stopped {
            cvar.wait(&mut stopped);
        }
    }

    /// Sleep for `duration` unless stopped first.
    ///
    /// # Returns
    /// `true` if the full duration elapsed, `false` if the signal cut it short.
    pub fn sleep(&self, duration: Duration) -> bool {
        let deadline = Instant::now() + duration;
        let (lock, cvar) = &*self.inner;
        let mut stopped = lock.lock();
        while !*stopped {
            if cvar.wait_until(&mut stopped, deadline).timed_out() {
                return !*stopped;
            }
        }
        false
    }
}

/// Flags shared by the scan loop, the hotkey listener and the control surface
#[derive(Clone)]
pub struct RunContext {
    pub stop: StopSignal,
    scanning: Arc<AtomicBool>,
}

impl RunContext {
    pub fn new(scanning: bool) -> Self {
        Self {
            stop: StopSignal::new(),
            scanning: Arc::new(AtomicBool::new(scanning)),
        }
    }

    pub fn is_scanning(&self) -> bool {
        self.scanning.load(Ordering::SeqCst)
    }

    pub fn set_scanning(&self, active: bool) {
        self.scanning.store(active, Ordering::SeqCst);
    }

    /// Flip the scanning flag; returns the new value
    pub fn toggle_scanning(&self) -> bool {
        !self.scanning.fetch_xor(true, Ordering::SeqCst)
    }

    /// Whether an in-progress encounter should keep going
    pub fn should_continue(&self) -> bool {
        self.is_scanning() && !self.stop.is_set()
    }
}

impl Default for RunContext {
    fn default() -> Self {
        Self::new(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_sleep_runs_full_duration_when_not_stopped() {
        let stop = StopSignal::new();
        let started = Instant::now();
        assert!(stop.sleep(Duration::from_millis(30)));
        assert!(started.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn test_sleep_wakes_early_on_stop() {
        let stop = StopSignal::new();
        let setter = stop.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            setter.set();
        });

        let started = Instant::now();
        assert!(!stop.sleep(Duration::from_secs(5)));
        assert!(started.elapsed() < Duration::from_secs(1));
        handle.join().unwrap();

        // Stays set until reset
        assert!(stop.is_set());
        assert!(!stop.sleep(Duration::from_millis(10)));
        stop.reset();
        assert!(!stop.is_set());
    }

    #[test]
    fn test_wait_returns_after_set() {
        let stop = StopSignal::new();
        let waiter = stop.clone();
        let handle = thread::spawn(move || waiter.wait());
        thread::sleep(Duration::from_millis(10));
        stop.set();
        handle.join().unwrap();
    }

    #[test]
    fn test_toggle_and_should_continue() {
        let run = RunContext::new(false);
        assert!(!run.should_continue());

        assert!(run.toggle_scanning());
        assert!(run.should_continue());
        assert!(!run.toggle_scanning());
        assert!(!run.is_scanning());

        run.set_scanning(true);
        run.stop.set();
        assert!(!run.should_continue());
    }
}
