//! In-memory pixel encodings supported by the engine.

use image::Rgba;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// 16 bpp, 5/6/5 bits packed little-endian.
    Rgb565,
    /// 24 bpp, stored B, G, R.
    Rgb888,
    /// 32 bpp, stored B, G, R, A. Alpha is always written opaque.
    Argb8888,
}

impl PixelFormat {
    pub fn from_bits_per_pixel(bits: u32) -> Option<Self> {
        match bits {
            16 => Some(Self::Rgb565),
            24 => Some(Self::Rgb888),
            32 => Some(Self::Argb8888),
            _ => None,
        }
    }

    pub fn bits_per_pixel(self) -> u32 {
        match self {
            Self::Rgb565 => 16,
            Self::Rgb888 => 24,
            Self::Argb8888 => 32,
        }
    }

    pub fn bytes_per_pixel(self) -> usize {
        self.bits_per_pixel() as usize / 8
    }

    /// Encode `color` into `out`, which must be exactly `bytes_per_pixel` long.
    pub fn encode(self, color: Rgba<u8>, out: &mut [u8]) {
        let [r, g, b, _] = color.0;
        match self {
            Self::Rgb565 => {
                let packed = ((r as u16 >> 3) << 11) | ((g as u16 >> 2) << 5) | (b as u16 >> 3);
                out.copy_from_slice(&packed.to_le_bytes());
            }
            Self::Rgb888 => out.copy_from_slice(&[b, g, r]),
            Self::Argb8888 => out.copy_from_slice(&[b, g, r, 0xFF]),
        }
    }

    /// Decode one stored pixel. Channels come back quantized to the depth.
    pub fn decode(self, bytes: &[u8]) -> Rgba<u8> {
        match self {
            Self::Rgb565 => {
                let packed = u16::from_le_bytes([bytes[0], bytes[1]]);
                let r = ((packed >> 11) & 0x1F) as u8;
                let g = ((packed >> 5) & 0x3F) as u8;
                let b = (packed & 0x1F) as u8;
                Rgba([r << 3, g << 2, b << 3, 0xFF])
            }
            Self::Rgb888 => Rgba([bytes[2], bytes[1], bytes[0], 0xFF]),
            Self::Argb8888 => Rgba([bytes[2], bytes[1], bytes[0], bytes[3]]),
        }
    }
}
