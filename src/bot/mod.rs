/// Encounter-handling state machine
///
/// `Controller` sequences the detection policies and actuation primitives:
///
/// ```text
/// SEARCHING ──header──► ANALYZING ──no text──► SEARCHING
///                          │ unknown name / flee form / unknown form
///                          ├──────────────► ACTION_RUN ──► COOLDOWN(3s)
///                          │ special form
///                          └──────────────► ACTION_CAPTURE ──► COOLDOWN(5s)
/// COOLDOWN ──wake time──► SEARCHING
/// ```
pub mod capture_sequence;
pub mod controller;
pub mod poll;
pub mod state;

pub use controller::{flee, Controller};
pub use poll::{poll_for, PollOutcome};
pub use state::{BotState, Timings};
