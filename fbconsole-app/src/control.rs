//! What Ctrl+C and friends do, decided in one place.

use fbconsole_input::ControlKey;

use crate::events::ConsoleSignal;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlOutcome {
    /// An ordinary key; hand it to the menu.
    NotControl,
    Shutdown(ControlKey),
    /// Recognized and ignored because exit is disabled.
    Swallowed(ControlKey),
}

#[derive(Debug, Clone, Copy)]
pub struct ControlPolicy {
    exit_on_control_keys: bool,
}

impl ControlPolicy {
    pub fn new(exit_on_control_keys: bool) -> Self {
        Self {
            exit_on_control_keys,
        }
    }

    pub fn exits(&self) -> bool {
        self.exit_on_control_keys
    }

    /// Classify `key` read while `location` was on screen.
    pub fn intercept(&self, key: u8, location: &str) -> ControlOutcome {
        let Some(control) = ControlKey::from_byte(key) else {
            return ControlOutcome::NotControl;
        };

        if self.exit_on_control_keys {
            tracing::info!("{} on {}, shutting down", control.label(), location);
            ControlOutcome::Shutdown(control)
        } else {
            tracing::info!("{} on {} ignored, exit is disabled", control.label(), location);
            ControlOutcome::Swallowed(control)
        }
    }

    /// TERM and HUP always end the session; the keyboard signals follow the
    /// same switch as the control bytes.
    pub fn on_signal(&self, signal: ConsoleSignal) -> bool {
        if !signal.is_keyboard_generated() || self.exit_on_control_keys {
            tracing::info!("{} received, shutting down", signal.name());
            true
        } else {
            tracing::info!("{} ignored, exit is disabled", signal.name());
            false
        }
    }
}
