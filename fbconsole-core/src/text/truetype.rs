//! Outline fonts via ab_glyph.

use std::path::{Path, PathBuf};

use ab_glyph::{point, Font, FontVec, GlyphId, PxScale, ScaleFont};
use image::{Rgba, RgbaImage};

use super::{reject_control_chars, LineMetrics, TextRasterizer};
use crate::error::RenderError;

const MAX_FONT_BYTES: usize = 50 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FontFormat {
    TrueType,
    TrueTypeCollection,
    OpenType,
    Woff,
    Woff2,
}

/// Identify a font file from its magic number.
pub fn sniff_format(bytes: &[u8]) -> Option<FontFormat> {
    match bytes.get(..4)? {
        [0x00, 0x01, 0x00, 0x00] | b"true" => Some(FontFormat::TrueType),
        b"ttcf" => Some(FontFormat::TrueTypeCollection),
        b"OTTO" => Some(FontFormat::OpenType),
        b"wOFF" => Some(FontFormat::Woff),
        b"wOF2" => Some(FontFormat::Woff2),
        _ => None,
    }
}

pub struct TrueTypeRasterizer {
    font: FontVec,
    scale: PxScale,
    source: PathBuf,
}

impl TrueTypeRasterizer {
    pub fn from_file(path: &Path, size: f32) -> Result<Self, RenderError> {
        let bytes = std::fs::read(path)
            .map_err(|e| RenderError::Font(format!("{}: {}", path.display(), e)))?;
        Self::from_bytes(bytes, size, path.to_path_buf())
    }

    pub fn from_bytes(bytes: Vec<u8>, size: f32, source: PathBuf) -> Result<Self, RenderError> {
        if bytes.is_empty() {
            return Err(RenderError::Font(format!("{} is empty", source.display())));
        }
        if bytes.len() > MAX_FONT_BYTES {
            return Err(RenderError::Font(format!(
                "{} is {} bytes, limit is {}",
                source.display(),
                bytes.len(),
                MAX_FONT_BYTES
            )));
        }
        match sniff_format(&bytes) {
            Some(FontFormat::TrueType | FontFormat::TrueTypeCollection | FontFormat::OpenType) => {}
            Some(other) => {
                return Err(RenderError::Font(format!(
                    "{}: {:?} fonts must be decompressed first",
                    source.display(),
                    other
                )))
            }
            None => {
                return Err(RenderError::Font(format!(
                    "{}: not a TrueType/OpenType font",
                    source.display()
                )))
            }
        }
        if !(size > 0.0 && size <= 200.0) {
            return Err(RenderError::Font(format!("invalid font size {}", size)));
        }

        let font = FontVec::try_from_vec(bytes)
            .map_err(|e| RenderError::Font(format!("{}: {}", source.display(), e)))?;
        Ok(Self {
            font,
            scale: PxScale::from(size),
            source,
        })
    }

    /// Pen positions of every glyph plus the total advance.
    fn layout(&self, text: &str) -> (Vec<(GlyphId, f32)>, f32) {
        let scaled = self.font.as_scaled(self.scale);
        let mut caret = 0.0f32;
        let mut prev: Option<GlyphId> = None;
        let mut glyphs = Vec::with_capacity(text.len());
        for c in text.chars() {
            let id = scaled.glyph_id(c);
            if let Some(prev) = prev {
                caret += scaled.kern(prev, id);
            }
            glyphs.push((id, caret));
            caret += scaled.h_advance(id);
            prev = Some(id);
        }
        (glyphs, caret)
    }
}

impl TextRasterizer for TrueTypeRasterizer {
    fn measure(&self, text: &str) -> Result<(u32, u32), RenderError> {
        reject_control_chars(text)?;
        let (_, advance) = self.layout(text);
        Ok((advance.ceil().max(0.0) as u32, self.line_metrics().line_height))
    }

    fn render(&self, text: &str, color: Rgba<u8>) -> Result<RgbaImage, RenderError> {
        let (width, height) = self.measure(text)?;
        let mut image = RgbaImage::new(width, height);
        let scaled = self.font.as_scaled(self.scale);
        let baseline = scaled.ascent();
        let (glyphs, _) = self.layout(text);

        for (id, x) in glyphs {
            let glyph = id.with_scale_and_position(self.scale, point(x, baseline));
            let Some(outlined) = scaled.outline_glyph(glyph) else {
                continue;
            };
            let bounds = outlined.px_bounds();
            outlined.draw(|px, py, coverage| {
                let ix = bounds.min.x as i32 + px as i32;
                let iy = bounds.min.y as i32 + py as i32;
                if ix < 0 || iy < 0 || ix as u32 >= width || iy as u32 >= height {
                    return;
                }
                let alpha = (coverage.clamp(0.0, 1.0) * 255.0) as u16;
                if alpha == 0 {
                    return;
                }
                let shade = |c: u8| ((c as u16 * alpha) / 255) as u8;
                let existing = *image.get_pixel(ix as u32, iy as u32);
                // Overlapping glyph edges keep the stronger coverage.
                let merged = Rgba([
                    existing[0].max(shade(color[0])),
                    existing[1].max(shade(color[1])),
                    existing[2].max(shade(color[2])),
                    255,
                ]);
                image.put_pixel(ix as u32, iy as u32, merged);
            });
        }
        Ok(image)
    }

    fn line_metrics(&self) -> LineMetrics {
        let scaled = self.font.as_scaled(self.scale);
        let ascent = scaled.ascent().ceil().max(0.0) as u32;
        let line_height = (scaled.ascent() - scaled.descent() + scaled.line_gap())
            .ceil()
            .max(1.0) as u32;
        LineMetrics {
            ascent,
            line_height,
        }
    }

    fn describe(&self) -> String {
        format!("{} @ {}px", self.source.display(), self.scale.y)
    }
}
