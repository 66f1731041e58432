//! Buffer acquisition policy and owned media buffers.
//!
//! A resource's bytes live in exactly one place: a read-only mapped view or
//! an aligned heap copy. The enum makes double ownership unrepresentable.

use crate::error::{Error, Result};
use crate::resource::StorageFlags;
use memmap2::Mmap;
use std::alloc::{alloc_zeroed, dealloc, Layout};
use std::ops::{Deref, DerefMut};
use std::ptr::NonNull;

/// Engine-default alignment for resident bank and media buffers.
pub const DEFAULT_ALIGNMENT: usize = 16;

/// How to acquire bytes for one load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireMode {
    /// Memory-map the file and hand the view to the engine. No copy.
    MappedView,
    /// Memory-map, copy into an aligned heap buffer, drop the mapping.
    MappedCopy,
    /// Read into an aligned heap buffer.
    HeapCopy,
    /// Read into a heap buffer tagged for the engine's device-memory pool.
    HeapCopyDevice,
}

impl AcquireMode {
    /// Policy for fully resident loads.
    ///
    /// Banks with embedded media never map: the engine releases those blobs
    /// individually and a single mapping cannot be fragment-freed. Custom
    /// alignment copies through a transient mapping. The exact rule is
    /// engine-SDK-sensitive; see the crate docs before changing it.
    pub fn for_resident(flags: &StorageFlags) -> Self {
        if flags.device_memory {
            AcquireMode::HeapCopyDevice
        } else if flags.embedded_media {
            AcquireMode::HeapCopy
        } else if flags.alignment > 0 {
            AcquireMode::MappedCopy
        } else {
            AcquireMode::MappedView
        }
    }

    /// Prefetch windows are always heap-owned; a partial mapping is never
    /// handed out.
    pub fn for_prefetch(flags: &StorageFlags) -> Self {
        if flags.device_memory {
            AcquireMode::HeapCopyDevice
        } else {
            AcquireMode::HeapCopy
        }
    }

    /// Whether the engine ingests its own copy of the bytes.
    pub fn is_copy(&self) -> bool {
        !matches!(self, AcquireMode::MappedView)
    }
}

/// Heap allocation with explicit alignment.
pub struct AlignedBuf {
    ptr: NonNull<u8>,
    len: usize,
    layout: Layout,
}

// The buffer is plain bytes behind a unique pointer.
unsafe impl Send for AlignedBuf {}
unsafe impl Sync for AlignedBuf {}

impl AlignedBuf {
    /// Zero-filled buffer. `alignment` must be a power of two.
    pub fn zeroed(len: usize, alignment: usize) -> Result<Self> {
        if !alignment.is_power_of_two() {
            return Err(Error::InvalidAlignment(alignment as u32));
        }
        // Zero-length layouts may not be allocated; callers never build empty
        // buffers, but round up rather than trusting that.
        let layout = Layout::from_size_align(len.max(1), alignment)
            .map_err(|_| Error::InvalidAlignment(alignment as u32))?;
        let raw = unsafe { alloc_zeroed(layout) };
        let ptr = NonNull::new(raw).ok_or_else(|| {
            Error::Io(std::io::Error::new(
                std::io::ErrorKind::OutOfMemory,
                "aligned allocation failed",
            ))
        })?;
        Ok(Self { ptr, len, layout })
    }

    pub fn from_slice(bytes: &[u8], alignment: usize) -> Result<Self> {
        let mut buf = Self::zeroed(bytes.len(), alignment)?;
        buf.copy_from_slice(bytes);
        Ok(buf)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn alignment(&self) -> usize {
        self.layout.align()
    }
}

impl Deref for AlignedBuf {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }
}

impl DerefMut for AlignedBuf {
    fn deref_mut(&mut self) -> &mut [u8] {
        unsafe { std::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
    }
}

impl Drop for AlignedBuf {
    fn drop(&mut self) {
        unsafe { dealloc(self.ptr.as_ptr(), self.layout) }
    }
}

impl std::fmt::Debug for AlignedBuf {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlignedBuf")
            .field("len", &self.len)
            .field("align", &self.layout.align())
            .finish()
    }
}

/// Bytes owned by one file record: a view or a copy, never both.
pub enum MediaBuffer {
    /// Read-only mapped view of the whole file.
    Mapped(Mmap),
    /// Aligned heap copy.
    Heap(AlignedBuf),
    /// Heap copy destined for the engine's device-memory pool.
    Device(AlignedBuf),
}

impl MediaBuffer {
    pub fn bytes(&self) -> &[u8] {
        match self {
            MediaBuffer::Mapped(map) => map,
            MediaBuffer::Heap(buf) | MediaBuffer::Device(buf) => buf,
        }
    }

    pub fn len(&self) -> usize {
        self.bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_view(&self) -> bool {
        matches!(self, MediaBuffer::Mapped(_))
    }

    pub fn kind_str(&self) -> &'static str {
        match self {
            MediaBuffer::Mapped(_) => "mapped",
            MediaBuffer::Heap(_) => "heap",
            MediaBuffer::Device(_) => "device",
        }
    }
}

impl std::fmt::Debug for MediaBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "MediaBuffer::{}({} bytes)", self.kind_str(), self.len())
    }
}
