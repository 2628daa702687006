//! # fbconsole Display
//!
//! The Pixel Engine.
//! Maps a Linux fbdev device and writes pixels straight into display memory,
//! encoding each one for the device's native depth. No compositor, no GPU.

pub mod device;
pub mod error;
pub mod format;
pub mod geometry;
mod ioctl;
mod region;

pub use device::{console_resolution, discover_device, DeviceStats, FrameBufferDevice};
pub use error::DisplayError;
pub use format::PixelFormat;
pub use geometry::Rect;

// Surfaces handed to `blit_image` are plain RGBA bitmaps.
pub use image::{Rgba, RgbaImage};

/// Opaque black, the console background.
pub const BLACK: Rgba<u8> = Rgba([0, 0, 0, 255]);
