//! Machine-readable symbols (QR codes) painted under the status fields.

use embedded_graphics::pixelcolor::Rgb888;
use embedded_graphics::prelude::*;
use embedded_graphics::primitives::{PrimitiveStyle, Rectangle};
use image::{Rgba, RgbaImage};
use qrcode::QrCode;

use crate::canvas::Canvas;
use crate::error::RenderError;

pub trait SymbolEncoder: Send + Sync {
    fn encode(&self, data: &str) -> Result<RgbaImage, RenderError>;
}

#[derive(Debug, Clone, Copy)]
pub struct QrEncoder {
    /// Edge length of one module in pixels.
    pub module_px: u32,
    /// Light border, in modules.
    pub quiet_zone: u32,
}

impl Default for QrEncoder {
    fn default() -> Self {
        Self {
            module_px: 4,
            quiet_zone: 2,
        }
    }
}

impl SymbolEncoder for QrEncoder {
    fn encode(&self, data: &str) -> Result<RgbaImage, RenderError> {
        let code = QrCode::new(data.as_bytes()).map_err(|e| RenderError::Symbol(e.to_string()))?;
        let modules = code.width() as u32;
        let side = (modules + 2 * self.quiet_zone) * self.module_px;

        let mut image = RgbaImage::from_pixel(side, side, Rgba([255, 255, 255, 255]));
        let mut canvas = Canvas::new(&mut image);
        let dark = PrimitiveStyle::with_fill(Rgb888::BLACK);
        let module = Size::new(self.module_px, self.module_px);

        for (i, color) in code.to_colors().into_iter().enumerate() {
            if color != qrcode::Color::Dark {
                continue;
            }
            let mx = i as u32 % modules + self.quiet_zone;
            let my = i as u32 / modules + self.quiet_zone;
            let origin = Point::new((mx * self.module_px) as i32, (my * self.module_px) as i32);
            let _ = Rectangle::new(origin, module).into_styled(dark).draw(&mut canvas);
        }
        Ok(image)
    }
}
