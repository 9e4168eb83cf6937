//! Frame buffer memory
//!
//! Frame memory is owned by the render context and lent to the engine for
//! each pump. Buffers prefer external PSRAM and fall back to internal RAM
//! one buffer at a time.

use alloc::boxed::Box;
use alloc::vec::Vec;

use crate::config::{GraphicsConfig, MemoryRegion};
use crate::error::Error;

/// Maximum number of frame buffers
pub const MAX_FRAME_BUFFERS: usize = 2;

/// Source of frame memory
pub trait RegionAllocator {
    /// Check if `region` exists on this board
    fn has_region(&self, region: MemoryRegion) -> bool;

    /// Allocate `bytes` zeroed bytes from `region`
    fn allocate(&self, region: MemoryRegion, bytes: usize) -> Result<Box<[u8]>, Error>;
}

/// Allocator backed by the global heap
///
/// On the board the global heap spans internal RAM and, when enabled,
/// PSRAM; the region is only recorded.
#[derive(Debug, Clone, Copy)]
pub struct HeapAllocator {
    external: bool,
}

impl HeapAllocator {
    pub const fn new(external: bool) -> Self {
        Self { external }
    }
}

impl RegionAllocator for HeapAllocator {
    fn has_region(&self, region: MemoryRegion) -> bool {
        match region {
            MemoryRegion::External => self.external,
            MemoryRegion::Internal => true,
        }
    }

    fn allocate(&self, region: MemoryRegion, bytes: usize) -> Result<Box<[u8]>, Error> {
        if !self.has_region(region) {
            return Err(Error::AllocationFailure);
        }
        let mut pixels = Vec::new();
        pixels
            .try_reserve_exact(bytes)
            .map_err(|_| Error::AllocationFailure)?;
        pixels.resize(bytes, 0);
        Ok(pixels.into_boxed_slice())
    }
}

/// One contiguous block of pixel memory
pub struct FrameBuffer {
    pixels: Box<[u8]>,
    region: MemoryRegion,
}

impl FrameBuffer {
    pub fn len(&self) -> usize {
        self.pixels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pixels.is_empty()
    }

    /// Region the memory came from
    pub fn region(&self) -> MemoryRegion {
        self.region
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }
}

/// The one or two frame buffers of a render context
///
/// All buffers have the same capacity.
pub struct FrameBuffers {
    buffers: heapless::Vec<FrameBuffer, MAX_FRAME_BUFFERS>,
}

impl FrameBuffers {
    /// Allocate the buffers described by `config`
    ///
    /// Fails with `AllocationFailure` if any buffer cannot be obtained from
    /// either region; buffers already obtained are released.
    pub fn allocate<A>(config: &GraphicsConfig, allocator: &A) -> Result<Self, Error>
    where
        A: RegionAllocator + ?Sized,
    {
        let bytes = config.buffer_bytes();
        let mut buffers = heapless::Vec::new();

        for index in 0..config.buffer_count() {
            let buffer = allocate_one(config.memory, bytes, allocator).map_err(|err| {
                error!("Frame buffer {} ({} bytes) allocation failed", index, bytes);
                err
            })?;
            debug!(
                "Frame buffer {}: {} bytes in {} memory",
                index,
                bytes,
                buffer.region
            );
            buffers.push(buffer).map_err(|_| Error::InvalidArgument)?;
        }

        Ok(Self { buffers })
    }

    /// Number of buffers (one or two)
    pub fn count(&self) -> usize {
        self.buffers.len()
    }

    /// Capacity of each buffer in bytes
    pub fn buffer_bytes(&self) -> usize {
        self.buffers.first().map_or(0, FrameBuffer::len)
    }

    /// Total frame memory in bytes
    pub fn total_bytes(&self) -> usize {
        self.buffers.iter().map(FrameBuffer::len).sum()
    }

    pub fn get(&self, index: usize) -> Option<&FrameBuffer> {
        self.buffers.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &FrameBuffer> {
        self.buffers.iter()
    }
}

fn allocate_one<A>(
    preferred: MemoryRegion,
    bytes: usize,
    allocator: &A,
) -> Result<FrameBuffer, Error>
where
    A: RegionAllocator + ?Sized,
{
    if preferred == MemoryRegion::External && allocator.has_region(MemoryRegion::External) {
        match allocator.allocate(MemoryRegion::External, bytes) {
            Ok(pixels) => {
                return Ok(FrameBuffer {
                    pixels,
                    region: MemoryRegion::External,
                })
            }
            Err(_) => warn!("External memory exhausted, falling back to internal"),
        }
    }

    let pixels = allocator
        .allocate(MemoryRegion::Internal, bytes)
        .map_err(|_| Error::AllocationFailure)?;
    Ok(FrameBuffer {
        pixels,
        region: MemoryRegion::Internal,
    })
}
