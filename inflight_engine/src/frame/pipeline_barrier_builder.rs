/// Batched pipeline barrier recording
///
/// Barriers are queued on the builder and emitted as a single
/// `cmd_pipeline_barrier` on `flush`. A flush with nothing queued records
/// nothing.

use std::sync::Arc;

use crate::graphics_device::{
    GraphicsDevice, AccessFlags, PipelineStages, DependencyFlags, ImageLayout, ImageSubresourceRange,
    MemoryBarrier, BufferBarrier, ImageBarrier, QUEUE_FAMILY_IGNORED,
};

pub struct PipelineBarrierBuilder<D: GraphicsDevice> {
    device: Arc<D>,
    command_buffer: D::CommandBuffer,
    memory_barriers: Vec<MemoryBarrier>,
    buffer_barriers: Vec<BufferBarrier<D::Buffer>>,
    image_barriers: Vec<ImageBarrier<D::Image>>,
}

impl<D: GraphicsDevice> PipelineBarrierBuilder<D> {
    /// Builder bound to one command buffer
    pub fn new(device: Arc<D>, command_buffer: D::CommandBuffer) -> Self {
        Self {
            device,
            command_buffer,
            memory_barriers: Vec::new(),
            buffer_barriers: Vec::new(),
            image_barriers: Vec::new(),
        }
    }

    pub fn command_buffer(&self) -> D::CommandBuffer {
        self.command_buffer
    }

    // ===== MEMORY =====

    pub fn push_memory_barrier(
        &mut self,
        src_stages: PipelineStages,
        src_access: AccessFlags,
        dst_stages: PipelineStages,
        dst_access: AccessFlags,
    ) -> &mut Self {
        self.memory_barriers.push(MemoryBarrier { src_stages, src_access, dst_stages, dst_access });
        self
    }

    // ===== BUFFERS =====

    /// Buffer barrier without ownership transfer
    pub fn push_buffer_barrier(
        &mut self,
        buffer: D::Buffer,
        offset: u64,
        size: u64,
        src_stages: PipelineStages,
        src_access: AccessFlags,
        dst_stages: PipelineStages,
        dst_access: AccessFlags,
    ) -> &mut Self {
        self.push_buffer_barrier_with_queue_families(
            buffer,
            offset,
            size,
            src_stages,
            src_access,
            dst_stages,
            dst_access,
            QUEUE_FAMILY_IGNORED,
            QUEUE_FAMILY_IGNORED,
        )
    }

    pub fn push_buffer_barrier_with_queue_families(
        &mut self,
        buffer: D::Buffer,
        offset: u64,
        size: u64,
        src_stages: PipelineStages,
        src_access: AccessFlags,
        dst_stages: PipelineStages,
        dst_access: AccessFlags,
        src_queue_family: u32,
        dst_queue_family: u32,
    ) -> &mut Self {
        self.buffer_barriers.push(BufferBarrier {
            src_stages,
            src_access,
            dst_stages,
            dst_access,
            src_queue_family,
            dst_queue_family,
            buffer,
            offset,
            size,
        });
        self
    }

    /// Acquire half of a queue family ownership transfer
    ///
    /// The source scope is empty: the release was recorded on the other queue.
    pub fn push_buffer_qfot_import_barrier(
        &mut self,
        buffer: D::Buffer,
        offset: u64,
        size: u64,
        dst_stages: PipelineStages,
        dst_access: AccessFlags,
        src_queue_family: u32,
        dst_queue_family: u32,
    ) -> &mut Self {
        self.push_buffer_barrier_with_queue_families(
            buffer,
            offset,
            size,
            PipelineStages::empty(),
            AccessFlags::empty(),
            dst_stages,
            dst_access,
            src_queue_family,
            dst_queue_family,
        )
    }

    // ===== IMAGES =====

    /// Image barrier without ownership transfer
    pub fn push_image_barrier(
        &mut self,
        image: D::Image,
        range: ImageSubresourceRange,
        old_layout: ImageLayout,
        new_layout: ImageLayout,
        src_stages: PipelineStages,
        src_access: AccessFlags,
        dst_stages: PipelineStages,
        dst_access: AccessFlags,
    ) -> &mut Self {
        self.push_image_barrier_with_queue_families(
            image,
            range,
            old_layout,
            new_layout,
            src_stages,
            src_access,
            dst_stages,
            dst_access,
            QUEUE_FAMILY_IGNORED,
            QUEUE_FAMILY_IGNORED,
        )
    }

    pub fn push_image_barrier_with_queue_families(
        &mut self,
        image: D::Image,
        range: ImageSubresourceRange,
        old_layout: ImageLayout,
        new_layout: ImageLayout,
        src_stages: PipelineStages,
        src_access: AccessFlags,
        dst_stages: PipelineStages,
        dst_access: AccessFlags,
        src_queue_family: u32,
        dst_queue_family: u32,
    ) -> &mut Self {
        self.image_barriers.push(ImageBarrier {
            src_stages,
            src_access,
            dst_stages,
            dst_access,
            old_layout,
            new_layout,
            src_queue_family,
            dst_queue_family,
            image,
            range,
        });
        self
    }

    /// Acquire half of an image queue family ownership transfer
    pub fn push_image_qfot_import_barrier(
        &mut self,
        image: D::Image,
        range: ImageSubresourceRange,
        old_layout: ImageLayout,
        new_layout: ImageLayout,
        dst_stages: PipelineStages,
        dst_access: AccessFlags,
        src_queue_family: u32,
        dst_queue_family: u32,
    ) -> &mut Self {
        self.push_image_barrier_with_queue_families(
            image,
            range,
            old_layout,
            new_layout,
            PipelineStages::empty(),
            AccessFlags::empty(),
            dst_stages,
            dst_access,
            src_queue_family,
            dst_queue_family,
        )
    }

    // ===== FLUSH =====

    /// Record every queued barrier as one command and clear the queues
    pub fn flush(&mut self, dependency_flags: DependencyFlags) {
        if self.is_empty() {
            return;
        }

        self.device.cmd_pipeline_barrier(
            self.command_buffer,
            dependency_flags,
            &self.memory_barriers,
            &self.buffer_barriers,
            &self.image_barriers,
        );

        self.memory_barriers.clear();
        self.buffer_barriers.clear();
        self.image_barriers.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.memory_barriers.is_empty() && self.buffer_barriers.is_empty() && self.image_barriers.is_empty()
    }

    pub fn memory_barrier_count(&self) -> usize {
        self.memory_barriers.len()
    }

    pub fn buffer_barrier_count(&self) -> usize {
        self.buffer_barriers.len()
    }

    pub fn image_barrier_count(&self) -> usize {
        self.image_barriers.len()
    }
}

#[cfg(test)]
#[path = "pipeline_barrier_builder_tests.rs"]
mod tests;
