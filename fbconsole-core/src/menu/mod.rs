//! Screens, the key-driven transitions between them, and the painter.

pub mod renderer;
pub mod screens;

use fbconsole_input::keys::{is_enter, ESCAPE};

pub use renderer::{DisplayState, MenuRenderer, PaintOutcome};

/// The privileged actions that need a `y` before they run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmAction {
    RestartServices,
    Reboot,
    Shutdown,
}

/// The single active screen. There is no stack: every modal returns to a
/// fixed parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MenuContext {
    #[default]
    MainStatus,
    ConfigMenu,
    InfoDialog,
    ConfirmDialog(ConfirmAction),
}

/// What a key press asks the orchestrator to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuAction {
    Ignore,
    EnterConfig,
    ShowNetworkInterfaces,
    RunConnectivityTest,
    Confirm(ConfirmAction),
    Execute(ConfirmAction),
    BackToConfig,
    BackToMain,
}

impl MenuContext {
    pub fn is_modal(self) -> bool {
        self != MenuContext::MainStatus
    }

    /// Control keys are intercepted before this is consulted.
    pub fn on_key(self, key: u8) -> MenuAction {
        match self {
            MenuContext::MainStatus if is_enter(key) => MenuAction::EnterConfig,
            MenuContext::MainStatus => MenuAction::Ignore,
            MenuContext::ConfigMenu => match key {
                b'1' => MenuAction::ShowNetworkInterfaces,
                b'2' => MenuAction::Confirm(ConfirmAction::RestartServices),
                b'3' => MenuAction::RunConnectivityTest,
                b'4' => MenuAction::Confirm(ConfirmAction::Reboot),
                b'5' => MenuAction::Confirm(ConfirmAction::Shutdown),
                b'q' | b'Q' | ESCAPE => MenuAction::BackToMain,
                _ => MenuAction::Ignore,
            },
            MenuContext::InfoDialog => MenuAction::BackToConfig,
            MenuContext::ConfirmDialog(action) => match key {
                b'y' | b'Y' => MenuAction::Execute(action),
                _ => MenuAction::BackToConfig,
            },
        }
    }
}
