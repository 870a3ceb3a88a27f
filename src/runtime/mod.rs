/// Runtime plumbing around the state machine
///
/// Stop/pause signalling, the scan loop, global hotkeys, the log conduit
/// read by the front end, and the runner that ties them to one bot run.
pub mod hotkeys;
pub mod log;
pub mod runner;
pub mod scan_loop;
pub mod signal;

pub use hotkeys::{parse_hotkey, run_hotkey_listener};
pub use log::{BotLog, LogConduit, LogLine, LogTag};
pub use runner::BotRunner;
pub use scan_loop::run_scan_loop;
pub use signal::{RunContext, StopSignal};
