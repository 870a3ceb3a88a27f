/// State management module
///
/// Lifecycle of a bot run, shared by the control surface and the hotkeys.

pub mod process_state;

pub use process_state::{RunLifecycle, RunPhase};
