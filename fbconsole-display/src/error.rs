use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum DisplayError {
    #[error("framebuffer {path} unavailable: {source}")]
    DeviceUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to map framebuffer memory: {0}")]
    MapFailed(String),

    #[error("unsupported pixel depth: {0} bits per pixel")]
    UnsupportedFormat(u32),
}
