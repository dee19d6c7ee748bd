/// Buffer types and usage-to-access mapping

use std::ptr::NonNull;
use bitflags::bitflags;
use crate::error::{Error, Result};
use crate::graphics_device::sync::AccessFlags;

bitflags! {
    /// Buffer usage flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct BufferUsage: u32 {
        const TRANSFER_SRC = 0x1;
        const TRANSFER_DST = 0x2;
        const UNIFORM_TEXEL = 0x4;
        const STORAGE_TEXEL = 0x8;
        const UNIFORM = 0x10;
        const STORAGE = 0x20;
        const INDEX = 0x40;
        const VERTEX = 0x80;
        const INDIRECT = 0x100;
        const SHADER_DEVICE_ADDRESS = 0x2_0000;
    }
}

/// Where a buffer's memory lives and how many copies it has
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferDomain {
    /// Host-visible, write-combined, mapped. Single copy.
    HostWriteCombined,
    /// Device-local, not mapped. Written through staging copies.
    Device,
    /// Device-local and host-visible, mapped. One copy per frame in flight.
    DeviceHostVisible,
}

impl BufferDomain {
    /// Whether allocations in this domain are persistently mapped
    pub fn is_host_visible(&self) -> bool {
        !matches!(self, BufferDomain::Device)
    }

    /// Whether the buffer is replicated once per frame in flight
    pub fn is_replicated_per_frame(&self) -> bool {
        matches!(self, BufferDomain::DeviceHostVisible)
    }
}

/// Buffer creation parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferDesc {
    pub size: u64,
    pub usage: BufferUsage,
    pub domain: BufferDomain,
}

/// One backend buffer bound to its memory allocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllocatedBuffer<B, M> {
    pub buffer: B,
    pub memory: M,
    pub size: u64,
    /// Host pointer for host-visible domains
    pub mapped: Option<NonNull<u8>>,
}

impl<B, M> AllocatedBuffer<B, M> {
    /// Copy `data` into the mapping at `offset`
    ///
    /// Fails without writing anything when the range overflows the buffer or
    /// the buffer is not host mapped.
    pub fn write_mapped(&self, offset: u64, data: &[u8]) -> Result<()> {
        let end = offset.checked_add(data.len() as u64);
        if end.map_or(true, |end| end > self.size) {
            return Err(Error::InvalidResource(format!(
                "write of {} bytes at offset {} overflows buffer of {} bytes",
                data.len(),
                offset,
                self.size
            )));
        }

        let mapped = self.mapped.ok_or_else(|| {
            Error::InvalidResource("buffer is not host mapped".to_string())
        })?;

        // In bounds of a live mapping of `size` bytes
        unsafe {
            std::ptr::copy_nonoverlapping(data.as_ptr(), mapped.as_ptr().add(offset as usize), data.len());
        }
        Ok(())
    }
}

// The mapped pointer refers to memory owned by `memory`, not to thread-local data
unsafe impl<B: Send, M: Send> Send for AllocatedBuffer<B, M> {}
unsafe impl<B: Sync, M: Sync> Sync for AllocatedBuffer<B, M> {}

/// A buffer as seen by the application: one allocation, or one per frame in
/// flight for [`BufferDomain::DeviceHostVisible`]
#[derive(Debug)]
pub struct Buffer<B, M> {
    pub(crate) allocations: Vec<AllocatedBuffer<B, M>>,
    pub(crate) desc: BufferDesc,
}

impl<B: Copy, M: Copy> Buffer<B, M> {
    pub fn desc(&self) -> &BufferDesc {
        &self.desc
    }

    /// Number of backing allocations
    pub fn allocation_count(&self) -> usize {
        self.allocations.len()
    }

    /// Allocation to use while recording for `frame_in_flight`
    pub fn select(&self, frame_in_flight: usize) -> &AllocatedBuffer<B, M> {
        if self.desc.domain.is_replicated_per_frame() {
            &self.allocations[frame_in_flight % self.allocations.len()]
        } else {
            &self.allocations[0]
        }
    }
}

/// Accesses that may have written to a buffer with this usage
///
/// Use as the source access of a barrier that must cover every prior write.
pub fn buffer_usage_to_access_flags_first_scope(usage: BufferUsage) -> AccessFlags {
    let mut flags = AccessFlags::empty();
    if usage.contains(BufferUsage::TRANSFER_DST) {
        flags |= AccessFlags::TRANSFER_WRITE;
    }
    if usage.intersects(BufferUsage::STORAGE_TEXEL | BufferUsage::STORAGE) {
        flags |= AccessFlags::SHADER_STORAGE_WRITE;
    }
    flags
}

/// Every access a buffer with this usage may see
///
/// Use as the destination access of a barrier that must cover every later use.
pub fn buffer_usage_to_access_flags_second_scope(usage: BufferUsage) -> AccessFlags {
    let mut flags = AccessFlags::empty();
    if usage.contains(BufferUsage::TRANSFER_SRC) {
        flags |= AccessFlags::TRANSFER_READ;
    }
    if usage.contains(BufferUsage::TRANSFER_DST) {
        flags |= AccessFlags::TRANSFER_WRITE;
    }
    if usage.intersects(BufferUsage::UNIFORM_TEXEL | BufferUsage::UNIFORM) {
        flags |= AccessFlags::UNIFORM_READ;
    }
    if usage.intersects(BufferUsage::STORAGE_TEXEL | BufferUsage::STORAGE) {
        flags |= AccessFlags::SHADER_STORAGE_READ | AccessFlags::SHADER_STORAGE_WRITE;
    }
    if usage.contains(BufferUsage::INDEX) {
        flags |= AccessFlags::INDEX_READ;
    }
    if usage.contains(BufferUsage::VERTEX) {
        flags |= AccessFlags::VERTEX_ATTRIBUTE_READ;
    }
    if usage.contains(BufferUsage::INDIRECT) {
        flags |= AccessFlags::INDIRECT_COMMAND_READ;
    }
    if usage.contains(BufferUsage::SHADER_DEVICE_ADDRESS) {
        flags |= AccessFlags::SHADER_READ;
    }
    flags
}

#[cfg(test)]
#[path = "buffer_tests.rs"]
mod tests;
