//! Built-in bitmap font via embedded-graphics. Needs no files, covers ASCII.

use embedded_graphics::mono_font::ascii::{FONT_10X20, FONT_6X10, FONT_8X13, FONT_9X18};
use embedded_graphics::mono_font::{MonoFont, MonoTextStyle};
use embedded_graphics::prelude::*;
use embedded_graphics::text::{Baseline, Text};
use image::{Rgba, RgbaImage};

use super::{reject_control_chars, LineMetrics, TextRasterizer};
use crate::canvas::{to_rgb888, Canvas};
use crate::error::RenderError;

/// Largest first.
const FONTS: [&MonoFont<'static>; 4] = [&FONT_10X20, &FONT_9X18, &FONT_8X13, &FONT_6X10];

/// Holds an index rather than the font: `MonoFont` carries a non-`Sync`
/// glyph mapping.
pub struct MonoFontRasterizer {
    index: usize,
}

impl MonoFontRasterizer {
    /// The largest built-in font no taller than `size` pixels.
    pub fn for_size(size: f32) -> Self {
        let index = FONTS
            .iter()
            .position(|f| f.character_size.height as f32 <= size)
            .unwrap_or(FONTS.len() - 1);
        Self { index }
    }

    fn font(&self) -> &'static MonoFont<'static> {
        FONTS[self.index]
    }

    fn advance(&self) -> u32 {
        self.font().character_size.width + self.font().character_spacing
    }
}

impl TextRasterizer for MonoFontRasterizer {
    fn measure(&self, text: &str) -> Result<(u32, u32), RenderError> {
        reject_control_chars(text)?;
        let chars = text.chars().count() as u32;
        let width = (chars * self.advance()).saturating_sub(self.font().character_spacing);
        Ok((width, self.font().character_size.height))
    }

    fn render(&self, text: &str, color: Rgba<u8>) -> Result<RgbaImage, RenderError> {
        let (width, height) = self.measure(text)?;
        let mut image = RgbaImage::new(width, height);
        let style = MonoTextStyle::new(self.font(), to_rgb888(color));
        let mut canvas = Canvas::new(&mut image);
        // Infallible target.
        let _ = Text::with_baseline(text, Point::zero(), style, Baseline::Top).draw(&mut canvas);
        Ok(image)
    }

    fn line_metrics(&self) -> LineMetrics {
        let height = self.font().character_size.height;
        LineMetrics {
            ascent: self.font().baseline,
            line_height: height + height / 5,
        }
    }

    fn describe(&self) -> String {
        format!(
            "built-in {}x{}",
            self.font().character_size.width, self.font().character_size.height
        )
    }
}
