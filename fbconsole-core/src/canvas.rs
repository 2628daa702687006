//! embedded-graphics draw target over an RGBA bitmap.

use embedded_graphics::pixelcolor::Rgb888;
use embedded_graphics::prelude::*;
use image::{Rgba, RgbaImage};

pub struct Canvas<'a> {
    image: &'a mut RgbaImage,
}

impl<'a> Canvas<'a> {
    pub fn new(image: &'a mut RgbaImage) -> Self {
        Self { image }
    }
}

impl DrawTarget for Canvas<'_> {
    type Color = Rgb888;
    type Error = core::convert::Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        let (width, height) = self.image.dimensions();
        for Pixel(Point { x, y }, color) in pixels {
            if x < 0 || y < 0 || x as u32 >= width || y as u32 >= height {
                continue;
            }
            self.image
                .put_pixel(x as u32, y as u32, Rgba([color.r(), color.g(), color.b(), 255]));
        }
        Ok(())
    }
}

impl OriginDimensions for Canvas<'_> {
    fn size(&self) -> Size {
        let (width, height) = self.image.dimensions();
        Size::new(width, height)
    }
}

pub fn to_rgb888(color: Rgba<u8>) -> Rgb888 {
    Rgb888::new(color[0], color[1], color[2])
}
