//! # fbconsole App
//!
//! The Console Loop.
//! Wires the framebuffer, the raw terminal and the renderer together behind a
//! single main loop fed by an input poller, a refresh timer and an OS-signal
//! watcher.

pub mod cli;
pub mod control;
pub mod events;
pub mod logging;
pub mod orchestrator;

pub use control::{ControlOutcome, ControlPolicy};
pub use events::{AppEvent, Cancellation, ConsoleSignal, RefreshTimer, SharedState};
pub use orchestrator::{Orchestrator, ShutdownReason};
