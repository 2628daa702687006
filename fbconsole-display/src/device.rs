//! The framebuffer device handle.
//!
//! One lock guards the mapped region and the descriptor. Pixel stores and
//! `close` both take the write side, so once `close` returns every later
//! store is a silent no-op.

use std::fs::{File, OpenOptions};
use std::num::NonZeroUsize;
use std::os::fd::AsRawFd;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use image::{Rgba, RgbaImage};
use nix::sys::mman::{mmap, MapFlags, ProtFlags};

use crate::error::DisplayError;
use crate::format::PixelFormat;
use crate::geometry::Rect;
use crate::ioctl::{self, FbFixScreenInfo, FbVarScreenInfo};
use crate::region::{MappedRegion, Region};

/// A driver reporting more than this is treated as corrupted.
const MAX_MAPPING_BYTES: usize = 1 << 30;

const DEVICE_CANDIDATES: [&str; 3] = ["/dev/fb0", "/dev/fb1", "/dev/fb2"];

const FALLBACK_RESOLUTION: (u32, u32) = (1920, 1080);

/// Write counters, read by the differential painter's tests and diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeviceStats {
    pub pixel_writes: u64,
    pub full_clears: u64,
}

struct DeviceState {
    region: Option<Region>,
    file: Option<File>,
}

pub struct FrameBufferDevice {
    path: PathBuf,
    width: u32,
    height: u32,
    stride: usize,
    format: PixelFormat,
    state: RwLock<DeviceState>,
    pixel_writes: AtomicU64,
    full_clears: AtomicU64,
}

impl std::fmt::Debug for FrameBufferDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameBufferDevice")
            .field("path", &self.path)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("format", &self.format)
            .finish()
    }
}

impl FrameBufferDevice {
    /// Open and map an fbdev device.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, DisplayError> {
        let path = path.as_ref();
        let unavailable = |source: std::io::Error| DisplayError::DeviceUnavailable {
            path: path.to_path_buf(),
            source,
        };

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(unavailable)?;

        let mut fix = FbFixScreenInfo::default();
        let mut var = FbVarScreenInfo::default();
        unsafe { ioctl::get_fix_screen_info(file.as_raw_fd(), &mut fix) }
            .map_err(|e| unavailable(e.into()))?;
        unsafe { ioctl::get_var_screen_info(file.as_raw_fd(), &mut var) }
            .map_err(|e| unavailable(e.into()))?;

        let format = PixelFormat::from_bits_per_pixel(var.bits_per_pixel)
            .ok_or(DisplayError::UnsupportedFormat(var.bits_per_pixel))?;

        let len = fix.smem_len as usize;
        if len > MAX_MAPPING_BYTES {
            return Err(DisplayError::MapFailed(format!(
                "driver reported {} bytes of display memory",
                len
            )));
        }
        let length = NonZeroUsize::new(len).ok_or_else(|| {
            DisplayError::MapFailed("driver reported zero bytes of display memory".into())
        })?;

        let stride = if fix.line_length > 0 {
            fix.line_length as usize
        } else {
            var.xres as usize * format.bytes_per_pixel()
        };

        let ptr = unsafe {
            mmap(
                None,
                length,
                ProtFlags::PROT_READ | ProtFlags::PROT_WRITE,
                MapFlags::MAP_SHARED,
                &file,
                0,
            )
        }
        .map_err(|e| DisplayError::MapFailed(e.to_string()))?;
        let region = unsafe { MappedRegion::from_raw(ptr, len) };

        tracing::info!(
            "Mapped {}: {}x{} @ {} bpp, stride {}, {} bytes",
            path.display(),
            var.xres,
            var.yres,
            var.bits_per_pixel,
            stride,
            len
        );

        Ok(Self::assemble(
            path.to_path_buf(),
            var.xres,
            var.yres,
            stride,
            format,
            Region::Mapped(region),
            Some(file),
        ))
    }

    /// A heap-backed device with the same write semantics as a mapping.
    pub fn shadow(width: u32, height: u32, bits_per_pixel: u32) -> Result<Self, DisplayError> {
        let format = PixelFormat::from_bits_per_pixel(bits_per_pixel)
            .ok_or(DisplayError::UnsupportedFormat(bits_per_pixel))?;
        let stride = width as usize * format.bytes_per_pixel();
        let len = stride * height as usize;
        if len == 0 || len > MAX_MAPPING_BYTES {
            return Err(DisplayError::MapFailed(format!(
                "shadow buffer of {} bytes",
                len
            )));
        }
        Ok(Self::assemble(
            PathBuf::from("shadow"),
            width,
            height,
            stride,
            format,
            Region::Shadow(vec![0; len]),
            None,
        ))
    }

    fn assemble(
        path: PathBuf,
        width: u32,
        height: u32,
        stride: usize,
        format: PixelFormat,
        region: Region,
        file: Option<File>,
    ) -> Self {
        Self {
            path,
            width,
            height,
            stride,
            format,
            state: RwLock::new(DeviceState {
                region: Some(region),
                file,
            }),
            pixel_writes: AtomicU64::new(0),
            full_clears: AtomicU64::new(0),
        }
    }

    fn read_state(&self) -> RwLockReadGuard<'_, DeviceState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, DeviceState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    pub fn is_closed(&self) -> bool {
        self.read_state().region.is_none()
    }

    pub fn stats(&self) -> DeviceStats {
        DeviceStats {
            pixel_writes: self.pixel_writes.load(Ordering::Relaxed),
            full_clears: self.full_clears.load(Ordering::Relaxed),
        }
    }

    fn offset(&self, x: u32, y: u32) -> usize {
        y as usize * self.stride + x as usize * self.format.bytes_per_pixel()
    }

    fn in_bounds(&self, x: i32, y: i32) -> bool {
        x >= 0 && y >= 0 && (x as u32) < self.width && (y as u32) < self.height
    }

    /// Out-of-bounds coordinates and a closed device are silent no-ops.
    pub fn set_pixel(&self, x: i32, y: i32, color: Rgba<u8>) {
        if !self.in_bounds(x, y) {
            return;
        }
        let bpp = self.format.bytes_per_pixel();
        let mut encoded = [0u8; 4];
        self.format.encode(color, &mut encoded[..bpp]);

        let mut state = self.write_state();
        if let Some(region) = state.region.as_mut() {
            if region.store(self.offset(x as u32, y as u32), &encoded[..bpp]) {
                self.pixel_writes.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Copy `image` with its top-left corner at (x, y), clipped to the screen.
    /// Source alpha is ignored: the last write wins.
    pub fn blit_image(&self, image: &RgbaImage, x: i32, y: i32) {
        let visible = Rect::new(x, y, image.width(), image.height()).clip(self.width, self.height);
        if visible.is_empty() {
            return;
        }
        let bpp = self.format.bytes_per_pixel();
        let mut row = vec![0u8; visible.width as usize * bpp];

        let mut state = self.write_state();
        let Some(region) = state.region.as_mut() else {
            return;
        };
        let mut written = 0u64;
        for dy in visible.y..visible.y + visible.height as i32 {
            let src_y = (dy - y) as u32;
            for (i, dx) in (visible.x..visible.x + visible.width as i32).enumerate() {
                let src = image.get_pixel((dx - x) as u32, src_y);
                self.format.encode(*src, &mut row[i * bpp..(i + 1) * bpp]);
            }
            if region.store(self.offset(visible.x as u32, dy as u32), &row) {
                written += visible.width as u64;
            }
        }
        self.pixel_writes.fetch_add(written, Ordering::Relaxed);
    }

    /// Paint a solid rectangle, clipped to the screen.
    pub fn fill_rect(&self, rect: Rect, color: Rgba<u8>) {
        let visible = rect.clip(self.width, self.height);
        if visible.is_empty() {
            return;
        }
        let bpp = self.format.bytes_per_pixel();
        let mut encoded = [0u8; 4];
        self.format.encode(color, &mut encoded[..bpp]);
        let row: Vec<u8> = encoded[..bpp]
            .iter()
            .copied()
            .cycle()
            .take(visible.width as usize * bpp)
            .collect();

        let mut state = self.write_state();
        let Some(region) = state.region.as_mut() else {
            return;
        };
        let mut written = 0u64;
        for dy in visible.y..visible.y + visible.height as i32 {
            if region.store(self.offset(visible.x as u32, dy as u32), &row) {
                written += visible.width as u64;
            }
        }
        self.pixel_writes.fetch_add(written, Ordering::Relaxed);
    }

    /// Zero the whole mapped region.
    pub fn clear(&self) {
        let mut state = self.write_state();
        if let Some(region) = state.region.as_mut() {
            region.bytes_mut().fill(0);
            self.full_clears.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Read one pixel back, quantized to the device depth.
    pub fn pixel(&self, x: i32, y: i32) -> Option<Rgba<u8>> {
        if !self.in_bounds(x, y) {
            return None;
        }
        let state = self.read_state();
        let region = state.region.as_ref()?;
        let bytes = region.load(self.offset(x as u32, y as u32), self.format.bytes_per_pixel())?;
        Some(self.format.decode(bytes))
    }

    /// Copy of the entire display memory, `None` once closed.
    pub fn snapshot(&self) -> Option<Vec<u8>> {
        self.read_state().region.as_ref().map(|r| r.bytes().to_vec())
    }

    /// Unmap, then close the descriptor. A second call is a no-op.
    pub fn close(&self) -> Result<(), DisplayError> {
        let (region, file) = {
            let mut state = self.write_state();
            (state.region.take(), state.file.take())
        };
        let Some(region) = region else {
            return Ok(());
        };

        let len = region.len();
        let unmapped = region.release();
        drop(file);

        match unmapped {
            Ok(()) => {
                tracing::info!("Released {} ({} bytes)", self.path.display(), len);
                Ok(())
            }
            Err(e) => Err(DisplayError::MapFailed(format!("munmap failed: {}", e))),
        }
    }
}

/// First fbdev node that exists, defaulting to `/dev/fb0`.
pub fn discover_device() -> PathBuf {
    discover_device_in(&DEVICE_CANDIDATES)
}

fn discover_device_in(candidates: &[&str]) -> PathBuf {
    candidates
        .iter()
        .map(PathBuf::from)
        .find(|p| p.exists())
        .unwrap_or_else(|| PathBuf::from(DEVICE_CANDIDATES[0]))
}

/// Parse a sysfs `virtual_size` file ("W,H"), falling back to 1920x1080.
pub fn console_resolution(virtual_size: &Path) -> (u32, u32) {
    std::fs::read_to_string(virtual_size)
        .ok()
        .and_then(|raw| {
            let (w, h) = raw.trim().split_once(',')?;
            Some((w.trim().parse().ok()?, h.trim().parse().ok()?))
        })
        .filter(|&(w, h): &(u32, u32)| w > 0 && h > 0)
        .unwrap_or(FALLBACK_RESOLUTION)
}
