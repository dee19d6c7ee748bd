/// Linear host allocator - write-only staging memory for one frame
///
/// Every `allocate_buffer` creates a new host write-combined buffer of
/// exactly the requested size. Nothing is reused until `reset`, which
/// destroys every buffer at once. The memory is chosen for CPU write
/// throughput: it is written, consumed by a GPU copy, and never read back.

use std::sync::{Arc, Mutex};

use crate::engine_trace;
use crate::error::{Error, Result};
use crate::graphics_device::{GraphicsDevice, AllocatedBuffer, BufferDesc, BufferDomain, BufferUsage};

/// One mapped staging buffer
pub struct MappedHostBuffer<D: GraphicsDevice> {
    allocated: AllocatedBuffer<D::Buffer, D::Memory>,
}

impl<D: GraphicsDevice> MappedHostBuffer<D> {
    pub fn buffer(&self) -> D::Buffer {
        self.allocated.buffer
    }

    pub fn memory(&self) -> D::Memory {
        self.allocated.memory
    }

    pub fn size(&self) -> u64 {
        self.allocated.size
    }

    /// Copy `data` into the mapping at `offset`
    pub fn write(&mut self, offset: u64, data: &[u8]) -> Result<()> {
        self.allocated.write_mapped(offset, data)
    }

    /// Copy a slice of plain-old-data values into the mapping at `offset`
    pub fn write_pod<T: bytemuck::Pod>(&mut self, offset: u64, values: &[T]) -> Result<()> {
        self.write(offset, bytemuck::cast_slice(values))
    }
}

/// Bump allocator of mapped staging buffers
pub struct LinearHostAllocator<D: GraphicsDevice> {
    device: Arc<D>,
    buffers: Vec<MappedHostBuffer<D>>,
}

impl<D: GraphicsDevice> LinearHostAllocator<D> {
    pub fn new(device: Arc<D>) -> Self {
        Self {
            device,
            buffers: Vec::new(),
        }
    }

    /// Create a mapped buffer of exactly `size` bytes
    pub fn allocate_buffer(&mut self, size: u64, queue_family_index: u32) -> Result<&mut MappedHostBuffer<D>> {
        if size == 0 {
            return Err(Error::InvalidResource("zero-sized linear allocation".to_string()));
        }

        let desc = BufferDesc {
            size,
            usage: BufferUsage::TRANSFER_SRC,
            domain: BufferDomain::HostWriteCombined,
        };
        let allocated = self.device.create_buffer(&desc, queue_family_index)?;
        if allocated.mapped.is_none() {
            self.device.destroy_buffer(&allocated);
            return Err(Error::BackendError("host write-combined buffer came back unmapped".to_string()));
        }

        self.buffers.push(MappedHostBuffer { allocated });
        let index = self.buffers.len() - 1;
        Ok(&mut self.buffers[index])
    }

    /// Destroy every buffer allocated since the last reset
    pub fn reset(&mut self) {
        for buffer in self.buffers.drain(..) {
            self.device.destroy_buffer(&buffer.allocated);
        }
    }

    pub fn allocation_count(&self) -> usize {
        self.buffers.len()
    }

    /// Total bytes handed out since the last reset
    pub fn allocated_bytes(&self) -> u64 {
        self.buffers.iter().map(|b| b.size()).sum()
    }
}

impl<D: GraphicsDevice> Drop for LinearHostAllocator<D> {
    fn drop(&mut self) {
        self.reset();
    }
}

/// Shared handle to one allocator handed out by the provider
pub type SharedLinearHostAllocator<D> = Arc<Mutex<LinearHostAllocator<D>>>;

/// Per-frame collection of independent linear allocators
///
/// Each caller that needs staging memory gets its own allocator, so
/// unrelated recorders never share bump state.
pub struct LinearHostAllocatorProvider<D: GraphicsDevice> {
    device: Arc<D>,
    allocators: Vec<SharedLinearHostAllocator<D>>,
}

impl<D: GraphicsDevice> LinearHostAllocatorProvider<D> {
    pub fn new(device: Arc<D>) -> Self {
        Self {
            device,
            allocators: Vec::new(),
        }
    }

    /// Create a fresh allocator that lives until the next reset
    pub fn create_allocator(&mut self) -> SharedLinearHostAllocator<D> {
        let allocator = Arc::new(Mutex::new(LinearHostAllocator::new(self.device.clone())));
        self.allocators.push(allocator.clone());
        allocator
    }

    /// Destroy every allocator and every buffer they hold
    pub fn reset(&mut self) {
        let count = self.allocators.len();
        for allocator in self.allocators.drain(..) {
            // A poisoned allocator still owns its buffers
            let mut allocator = match allocator.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            allocator.reset();
        }
        if count > 0 {
            engine_trace!("inflight::LinearHostAllocatorProvider", "Released {} linear allocators", count);
        }
    }

    pub fn allocator_count(&self) -> usize {
        self.allocators.len()
    }
}

impl<D: GraphicsDevice> Drop for LinearHostAllocatorProvider<D> {
    fn drop(&mut self) {
        self.reset();
    }
}

#[cfg(test)]
#[path = "linear_host_allocator_tests.rs"]
mod tests;
