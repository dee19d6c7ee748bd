/// Frame context - per-slot transient state
///
/// One frame context exists per frame in flight. Everything it hands out
/// (command buffers, staging memory, descriptor sets) is valid until the
/// slot comes around again and `start_frame` reclaims it. Zombies are
/// objects the application retired during this slot's frame; they are
/// destroyed on the slot's next `start_frame`.

use std::sync::Arc;

use crate::{engine_debug, engine_trace};
use crate::config::{AsyncComputePolicy, Config};
use crate::error::Result;
use crate::frame::command_buffer_recycler::CommandBufferRecycler;
use crate::frame::command_recorder::CommandRecorder;
use crate::frame::linear_host_allocator::{LinearHostAllocatorProvider, SharedLinearHostAllocator};
use crate::frame::transient_descriptor_allocator::TransientDescriptorSetAllocator;
use crate::graphics_device::{GraphicsDevice, QueueType, CommandPoolFlags, CommandPoolResetFlags};

pub struct FrameContext<D: GraphicsDevice> {
    device: Arc<D>,
    frame_index: usize,
    linear_allocator_provider: LinearHostAllocatorProvider<D>,
    graphics_recycler: CommandBufferRecycler<D>,
    async_compute_recycler: CommandBufferRecycler<D>,
    descriptor_allocator: TransientDescriptorSetAllocator<D>,
    zombie_semaphores: Vec<D::Semaphore>,
    zombie_fences: Vec<D::Fence>,
}

impl<D: GraphicsDevice> FrameContext<D> {
    pub fn new(device: Arc<D>, frame_index: usize, config: &Config) -> Result<Self> {
        let graphics_family = device.queue_family_index(QueueType::Graphics);
        let async_compute_family = match config.async_compute {
            AsyncComputePolicy::DedicatedQueue => device.queue_family_index(QueueType::Compute),
            AsyncComputePolicy::SharedWithGraphics => graphics_family,
        };

        let graphics_recycler = CommandBufferRecycler::new(device.clone(), graphics_family, CommandPoolFlags::TRANSIENT)?;
        let async_compute_recycler =
            CommandBufferRecycler::new(device.clone(), async_compute_family, CommandPoolFlags::TRANSIENT)?;
        let descriptor_allocator = TransientDescriptorSetAllocator::new(
            device.clone(),
            &config.transient_descriptor_pool_sizes,
            config.transient_descriptor_sets_per_pool,
        )?;

        engine_debug!(
            "inflight::FrameContext",
            "Frame context {} created (graphics family {}, async compute family {})",
            frame_index,
            graphics_family,
            async_compute_family
        );

        Ok(Self {
            linear_allocator_provider: LinearHostAllocatorProvider::new(device.clone()),
            device,
            frame_index,
            graphics_recycler,
            async_compute_recycler,
            descriptor_allocator,
            zombie_semaphores: Vec::new(),
            zombie_fences: Vec::new(),
        })
    }

    /// Reclaim everything handed out the last time this slot was current
    ///
    /// Only valid once the GPU has finished this slot's previous frame.
    pub fn start_frame(&mut self) -> Result<()> {
        self.destroy_all_zombies();
        self.linear_allocator_provider.reset();
        self.graphics_recycler.reset(CommandPoolResetFlags::empty())?;
        self.async_compute_recycler.reset(CommandPoolResetFlags::empty())?;
        self.descriptor_allocator.reset()?;
        Ok(())
    }

    pub fn frame_index(&self) -> usize {
        self.frame_index
    }

    // ===== ACQUISITION =====

    /// Command recorder for the graphics queue with its own staging allocator
    pub fn acquire_graphics_command_buffer(&mut self) -> Result<CommandRecorder<D>> {
        let command_buffer = self.graphics_recycler.get_or_allocate()?;
        self.graphics_recycler.recycle(command_buffer);
        let family = self.graphics_recycler.queue_family_index();
        Ok(self.create_recorder(command_buffer, family))
    }

    /// Command recorder for the async compute family with its own staging allocator
    pub fn acquire_async_compute_command_buffer(&mut self) -> Result<CommandRecorder<D>> {
        let command_buffer = self.async_compute_recycler.get_or_allocate()?;
        self.async_compute_recycler.recycle(command_buffer);
        let family = self.async_compute_recycler.queue_family_index();
        Ok(self.create_recorder(command_buffer, family))
    }

    /// Independent linear allocator valid until this slot's next `start_frame`
    pub fn acquire_linear_host_allocator(&mut self) -> SharedLinearHostAllocator<D> {
        self.linear_allocator_provider.create_allocator()
    }

    /// Descriptor set valid until this slot's next `start_frame`
    pub fn allocate_transient_descriptor_set(&mut self, layout: D::DescriptorSetLayout) -> Result<D::DescriptorSet> {
        self.descriptor_allocator.get_set(layout)
    }

    // ===== ZOMBIES =====

    /// Destroy `semaphore` once this slot comes around again
    pub fn zombify_semaphore(&mut self, semaphore: D::Semaphore) {
        self.zombie_semaphores.push(semaphore);
    }

    /// Destroy `fence` once this slot comes around again
    pub fn zombify_fence(&mut self, fence: D::Fence) {
        self.zombie_fences.push(fence);
    }

    pub fn zombie_semaphore_count(&self) -> usize {
        self.zombie_semaphores.len()
    }

    pub fn zombie_fence_count(&self) -> usize {
        self.zombie_fences.len()
    }

    // ===== INTROSPECTION =====

    pub fn graphics_queue_family(&self) -> u32 {
        self.graphics_recycler.queue_family_index()
    }

    pub fn async_compute_queue_family(&self) -> u32 {
        self.async_compute_recycler.queue_family_index()
    }

    pub fn graphics_recycler(&self) -> &CommandBufferRecycler<D> {
        &self.graphics_recycler
    }

    pub fn async_compute_recycler(&self) -> &CommandBufferRecycler<D> {
        &self.async_compute_recycler
    }

    pub fn descriptor_allocator(&self) -> &TransientDescriptorSetAllocator<D> {
        &self.descriptor_allocator
    }

    pub fn linear_allocator_count(&self) -> usize {
        self.linear_allocator_provider.allocator_count()
    }

    fn create_recorder(&mut self, command_buffer: D::CommandBuffer, queue_family_index: u32) -> CommandRecorder<D> {
        let allocator = self.linear_allocator_provider.create_allocator();
        CommandRecorder::new(self.device.clone(), command_buffer, allocator, self.frame_index, queue_family_index)
    }

    fn destroy_all_zombies(&mut self) {
        let semaphores = self.zombie_semaphores.len();
        let fences = self.zombie_fences.len();

        for semaphore in self.zombie_semaphores.drain(..) {
            self.device.destroy_semaphore(semaphore);
        }
        for fence in self.zombie_fences.drain(..) {
            self.device.destroy_fence(fence);
        }

        if semaphores + fences > 0 {
            engine_trace!(
                "inflight::FrameContext",
                "Frame {}: destroyed {} zombie semaphores, {} zombie fences",
                self.frame_index,
                semaphores,
                fences
            );
        }
    }
}

impl<D: GraphicsDevice> Drop for FrameContext<D> {
    fn drop(&mut self) {
        self.destroy_all_zombies();
    }
}

#[cfg(test)]
#[path = "frame_context_tests.rs"]
mod tests;
