/// Command buffer recycler - one command pool and the buffers it handed out
///
/// Buffers handed out during a frame are parked as recycled. `reset` resets
/// the whole pool in one call and makes every parked buffer available again,
/// so steady-state frames allocate nothing.

use std::sync::Arc;

use crate::engine_trace;
use crate::error::Result;
use crate::graphics_device::{GraphicsDevice, CommandPoolFlags, CommandPoolResetFlags};

pub struct CommandBufferRecycler<D: GraphicsDevice> {
    device: Arc<D>,
    pool: D::CommandPool,
    queue_family_index: u32,
    /// Reset buffers ready to be handed out
    available: Vec<D::CommandBuffer>,
    /// Buffers handed out since the last reset
    recycled: Vec<D::CommandBuffer>,
}

impl<D: GraphicsDevice> CommandBufferRecycler<D> {
    pub fn new(device: Arc<D>, queue_family_index: u32, flags: CommandPoolFlags) -> Result<Self> {
        let pool = device.create_command_pool(queue_family_index, flags)?;
        Ok(Self {
            device,
            pool,
            queue_family_index,
            available: Vec::new(),
            recycled: Vec::new(),
        })
    }

    /// Take an available buffer, or allocate a new one from the pool
    pub fn get_or_allocate(&mut self) -> Result<D::CommandBuffer> {
        if let Some(command_buffer) = self.available.pop() {
            return Ok(command_buffer);
        }

        let command_buffer = self.device.allocate_command_buffer(self.pool)?;
        engine_trace!(
            "inflight::CommandBufferRecycler",
            "Allocated command buffer {:?} (family {}, {} total)",
            command_buffer,
            self.queue_family_index,
            self.total_count() + 1
        );
        Ok(command_buffer)
    }

    /// Park a buffer until the next reset
    pub fn recycle(&mut self, command_buffer: D::CommandBuffer) {
        self.recycled.push(command_buffer);
    }

    /// Reset the pool and make every recycled buffer available
    ///
    /// Only call once the GPU is done with every buffer from this pool.
    pub fn reset(&mut self, flags: CommandPoolResetFlags) -> Result<()> {
        self.device.reset_command_pool(self.pool, flags)?;
        self.available.append(&mut self.recycled);
        Ok(())
    }

    pub fn pool(&self) -> D::CommandPool {
        self.pool
    }

    pub fn queue_family_index(&self) -> u32 {
        self.queue_family_index
    }

    pub fn available_count(&self) -> usize {
        self.available.len()
    }

    pub fn recycled_count(&self) -> usize {
        self.recycled.len()
    }

    fn total_count(&self) -> usize {
        self.available.len() + self.recycled.len()
    }
}

impl<D: GraphicsDevice> Drop for CommandBufferRecycler<D> {
    fn drop(&mut self) {
        // Buffers are freed with their pool
        self.device.destroy_command_pool(self.pool);
    }
}

#[cfg(test)]
#[path = "command_buffer_recycler_tests.rs"]
mod tests;
