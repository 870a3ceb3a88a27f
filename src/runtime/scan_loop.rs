/// Background scan loop
///
/// Drives the controller one tick at a time until the stop signal is set.
/// While scanning is paused the controller is not evaluated at all.
use crate::actuation::{Actuator, Notifier};
use crate::bot::Controller;
use crate::perception::Perception;

/// Run until stopped. Every sleep in here wakes on the stop signal.
pub fn run_scan_loop<P, A, N>(controller: &mut Controller<P, A, N>)
where
    P: Perception,
    A: Actuator,
    N: Notifier,
{
    let run = controller.run_context().clone();
    let timings = *controller.timings();

    tracing::info!("Scan loop started");
    while !run.stop.is_set() {
        if !run.is_scanning() {
            run.stop.sleep(timings.paused_idle);
            continue;
        }

        controller.tick();
        run.stop.sleep(timings.tick);
    }
    tracing::info!("Scan loop stopped in {} state", controller.state());
}
