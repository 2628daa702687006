use fbconsole_display::DisplayError;
use fbconsole_input::InputError;

/// Text and graphic rasterization failures.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("font unavailable: {0}")]
    Font(String),

    #[error("cannot rasterize {text:?}: {reason}")]
    Glyph { text: String, reason: String },

    #[error("symbol encoding failed: {0}")]
    Symbol(String),

    #[error("layout does not fit: {0}")]
    Layout(String),
}

/// Every failure the console can surface, by kind.
#[derive(Debug, thiserror::Error)]
pub enum ConsoleError {
    #[error("device unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("display mapping failed: {0}")]
    MapFailed(String),

    #[error("render failure: {0}")]
    RenderFailure(#[from] RenderError),

    #[error("input device closed")]
    InputDeviceClosed,

    #[error("operation timed out")]
    Timeout,

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("command failed: {0}")]
    Command(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl From<DisplayError> for ConsoleError {
    fn from(e: DisplayError) -> Self {
        match e {
            DisplayError::DeviceUnavailable { .. } | DisplayError::UnsupportedFormat(_) => {
                ConsoleError::DeviceUnavailable(e.to_string())
            }
            DisplayError::MapFailed(msg) => ConsoleError::MapFailed(msg),
        }
    }
}

impl From<InputError> for ConsoleError {
    fn from(e: InputError) -> Self {
        match e {
            InputError::InputDeviceClosed | InputError::Disconnected => {
                ConsoleError::InputDeviceClosed
            }
            InputError::Timeout => ConsoleError::Timeout,
            other => ConsoleError::DeviceUnavailable(other.to_string()),
        }
    }
}

impl ConsoleError {
    /// Errors that end the session rather than the current screen.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ConsoleError::DeviceUnavailable(_)
                | ConsoleError::MapFailed(_)
                | ConsoleError::InputDeviceClosed
        )
    }
}
