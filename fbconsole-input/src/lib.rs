//! # fbconsole Input
//!
//! The Keyboard Bridge.
//! Puts the controlling terminal into byte-granular raw mode, reads single
//! keystrokes with bounded waits, and guarantees the original attributes come
//! back on every exit path (including panics, via [`emergency_restore`]).

mod emergency;
pub mod error;
pub mod keys;
pub mod terminal;

pub use emergency::emergency_restore;
pub use error::InputError;
pub use keys::{ControlKey, MenuChoice};
pub use terminal::{RawModeOptions, RawTerminalInput};
