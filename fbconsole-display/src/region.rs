//! Owned display memory: either a live fbdev mapping or a heap shadow.
//!
//! This is the only place raw mapped memory is dereferenced. Everything
//! above it works with bounds-checked slices.

use std::ffi::c_void;
use std::mem::ManuallyDrop;
use std::ptr::NonNull;

use nix::sys::mman::munmap;

/// A shared read/write mapping returned by `mmap(2)`.
pub(crate) struct MappedRegion {
    ptr: NonNull<c_void>,
    len: usize,
}

// The mapping is plain memory owned by this value; access is serialized by
// the device lock.
unsafe impl Send for MappedRegion {}
unsafe impl Sync for MappedRegion {}

impl MappedRegion {
    /// # Safety
    /// `ptr` must come from a successful `mmap` of exactly `len` bytes with
    /// read/write protection, and must not be unmapped elsewhere.
    pub(crate) unsafe fn from_raw(ptr: NonNull<c_void>, len: usize) -> Self {
        Self { ptr, len }
    }

    fn bytes(&self) -> &[u8] {
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr().cast::<u8>(), self.len) }
    }

    fn bytes_mut(&mut self) -> &mut [u8] {
        unsafe { std::slice::from_raw_parts_mut(self.ptr.as_ptr().cast::<u8>(), self.len) }
    }

    /// Unmap now and report the result. Drop would swallow it.
    fn unmap(self) -> nix::Result<()> {
        let this = ManuallyDrop::new(self);
        unsafe { munmap(this.ptr, this.len) }
    }
}

impl Drop for MappedRegion {
    fn drop(&mut self) {
        if let Err(e) = unsafe { munmap(self.ptr, self.len) } {
            tracing::warn!("munmap on drop failed: {}", e);
        }
    }
}

pub(crate) enum Region {
    Mapped(MappedRegion),
    Shadow(Vec<u8>),
}

impl Region {
    pub(crate) fn len(&self) -> usize {
        self.bytes().len()
    }

    pub(crate) fn bytes(&self) -> &[u8] {
        match self {
            Region::Mapped(m) => m.bytes(),
            Region::Shadow(v) => v,
        }
    }

    pub(crate) fn bytes_mut(&mut self) -> &mut [u8] {
        match self {
            Region::Mapped(m) => m.bytes_mut(),
            Region::Shadow(v) => v,
        }
    }

    /// Copy `data` to `offset`. Returns false (and writes nothing) when the
    /// store would run past the end of the region.
    pub(crate) fn store(&mut self, offset: usize, data: &[u8]) -> bool {
        let bytes = self.bytes_mut();
        match offset.checked_add(data.len()) {
            Some(end) if end <= bytes.len() => {
                bytes[offset..end].copy_from_slice(data);
                true
            }
            _ => false,
        }
    }

    pub(crate) fn load(&self, offset: usize, len: usize) -> Option<&[u8]> {
        let end = offset.checked_add(len)?;
        self.bytes().get(offset..end)
    }

    pub(crate) fn release(self) -> nix::Result<()> {
        match self {
            Region::Mapped(m) => m.unmap(),
            Region::Shadow(_) => Ok(()),
        }
    }
}
