//! Text rasterization.
//!
//! The painter only needs three things from a font: how big a string is, a
//! bitmap of it, and how far to advance between lines.

pub mod mono;
pub mod truetype;

use image::{Rgba, RgbaImage};

use crate::config::FontConfig;
use crate::error::RenderError;

pub use mono::MonoFontRasterizer;
pub use truetype::TrueTypeRasterizer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineMetrics {
    /// Baseline offset from the top of a rendered line.
    pub ascent: u32,
    /// Vertical advance from one line's top to the next.
    pub line_height: u32,
}

pub trait TextRasterizer: Send + Sync {
    /// Width and height of `text` as `render` would produce it.
    fn measure(&self, text: &str) -> Result<(u32, u32), RenderError>;

    /// Rasterize one line. The background is transparent black.
    fn render(&self, text: &str, color: Rgba<u8>) -> Result<RgbaImage, RenderError>;

    fn line_metrics(&self) -> LineMetrics;

    /// Human-readable font description for the log.
    fn describe(&self) -> String;
}

/// Newlines and other control characters have no glyph on one line.
pub(crate) fn reject_control_chars(text: &str) -> Result<(), RenderError> {
    match text.chars().find(|c| c.is_control()) {
        Some(c) => Err(RenderError::Glyph {
            text: text.to_string(),
            reason: format!("control character U+{:04X}", c as u32),
        }),
        None => Ok(()),
    }
}

/// The configured TrueType font, or the built-in bitmap font when no font
/// file was configured and none exists at the default locations. An
/// explicitly configured font that fails to load is an error.
pub fn load_rasterizer(config: &FontConfig) -> Result<Box<dyn TextRasterizer>, RenderError> {
    match config.resolve_path() {
        Some(path) => {
            let font = TrueTypeRasterizer::from_file(&path, config.size)?;
            Ok(Box::new(font))
        }
        None => {
            tracing::warn!("No font file found, using the built-in bitmap font");
            Ok(Box::new(MonoFontRasterizer::for_size(config.size)))
        }
    }
}
