use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum InputError {
    #[error("terminal {path} unavailable: {source}")]
    DeviceUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("terminal attributes: {0}")]
    Termios(#[from] nix::Error),

    #[error("input device closed")]
    InputDeviceClosed,

    #[error("input device hung up")]
    Disconnected,

    #[error("timed out waiting for a key")]
    Timeout,

    #[error("terminal read failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("terminal close failed: {}", .0.join("; "))]
    Close(Vec<String>),
}
