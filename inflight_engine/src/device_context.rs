/// Device context - frame rotation and resource factories
///
/// Owns one `FrameContext` and one completion fence per frame in flight.
/// `begin_frame` is the only blocking call: it waits for the GPU to retire
/// the current slot's previous frame, then reclaims that slot's transient
/// state. `end_frame` advances to the next slot.
///
/// The application signals `frame_fence()` with the last submission of each
/// frame; a frame without such a submission would block the slot forever.

use std::sync::Arc;

use crate::{engine_error, engine_info, engine_warn};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::frame::FrameContext;
use crate::graphics_device::{
    GraphicsDevice, QueueType, AllocatedBuffer, Buffer, BufferDesc, Image, ImageDesc,
    DescriptorSetLayoutBinding, DescriptorWrite, PipelineLayoutDesc, ComputePipelineDesc,
    GraphicsPipelineDesc, Pipeline, PipelineBindPoint, PipelineStages, SemaphoreSubmit, Submit,
};

/// Buffer created through a device context
pub type DeviceBuffer<D> = Buffer<<D as GraphicsDevice>::Buffer, <D as GraphicsDevice>::Memory>;

/// Image created through a device context
pub type DeviceImage<D> =
    Image<<D as GraphicsDevice>::Image, <D as GraphicsDevice>::ImageView, <D as GraphicsDevice>::Memory>;

/// Descriptor write against a device context's handle types
pub type DeviceDescriptorWrite<'a, D> = DescriptorWrite<
    'a,
    <D as GraphicsDevice>::DescriptorSet,
    <D as GraphicsDevice>::Buffer,
    <D as GraphicsDevice>::ImageView,
>;

pub struct DeviceContext<D: GraphicsDevice> {
    device: Arc<D>,
    frame_contexts: Vec<FrameContext<D>>,
    frame_fences: Vec<D::Fence>,
    current_frame_in_flight: usize,
    max_frames_in_flight: usize,
}

impl<D: GraphicsDevice> DeviceContext<D> {
    /// Create one frame context and one signaled fence per frame in flight
    pub fn new(device: Arc<D>, config: &Config) -> Result<Self> {
        config.validate()?;
        let max_frames_in_flight = config.max_frames_in_flight;

        let mut context = Self {
            device: device.clone(),
            frame_contexts: Vec::with_capacity(max_frames_in_flight),
            frame_fences: Vec::with_capacity(max_frames_in_flight),
            current_frame_in_flight: 0,
            max_frames_in_flight,
        };

        // Partially built state is released by Drop on early return
        for frame_index in 0..max_frames_in_flight {
            context.frame_contexts.push(FrameContext::new(device.clone(), frame_index, config)?);
            context.frame_fences.push(device.create_fence(true)?);
        }

        engine_info!(
            "inflight::DeviceContext",
            "Device context created with {} frames in flight",
            max_frames_in_flight
        );

        Ok(context)
    }

    // ===== FRAME ROTATION =====

    /// Wait for the current slot's previous frame and reclaim its resources
    pub fn begin_frame(&mut self) -> Result<()> {
        let slot = self.current_frame_in_flight;
        let fence = self.frame_fences[slot];

        if let Err(err) = self.device.wait_for_fence(fence, u64::MAX) {
            engine_error!("inflight::DeviceContext", "Frame fence wait failed for slot {}: {}", slot, err);
            return Err(match err {
                Error::DeviceLost(message) => Error::DeviceLost(message),
                other => Error::DeviceLost(other.to_string()),
            });
        }

        // The fence stays signaled until the slot is reclaimed, so a failed
        // start_frame can be retried
        self.frame_contexts[slot].start_frame()?;
        self.device.reset_fence(fence)
    }

    /// Advance to the next slot
    pub fn end_frame(&mut self) {
        self.current_frame_in_flight = (self.current_frame_in_flight + 1) % self.max_frames_in_flight;
    }

    pub fn frame_context(&self) -> &FrameContext<D> {
        &self.frame_contexts[self.current_frame_in_flight]
    }

    pub fn frame_context_mut(&mut self) -> &mut FrameContext<D> {
        &mut self.frame_contexts[self.current_frame_in_flight]
    }

    /// Fence the current frame's last submission must signal
    pub fn frame_fence(&self) -> D::Fence {
        self.frame_fences[self.current_frame_in_flight]
    }

    pub fn current_frame_in_flight(&self) -> usize {
        self.current_frame_in_flight
    }

    pub fn max_frames_in_flight(&self) -> usize {
        self.max_frames_in_flight
    }

    pub fn device(&self) -> &Arc<D> {
        &self.device
    }

    pub fn device_wait_idle(&self) -> Result<()> {
        self.device.wait_idle()
    }

    // ===== SUBMISSION =====

    pub fn submit(
        &self,
        queue: QueueType,
        submit: &Submit<'_, D::Semaphore, D::CommandBuffer>,
        fence: Option<D::Fence>,
    ) -> Result<()> {
        self.device.queue_submit(queue, submit, fence)
    }

    /// Submit one command buffer with at most one wait and one signal
    /// semaphore, both at `ALL_COMMANDS`
    pub fn submit_simple(
        &self,
        queue: QueueType,
        command_buffer: D::CommandBuffer,
        wait_semaphore: Option<D::Semaphore>,
        signal_semaphore: Option<D::Semaphore>,
        fence: Option<D::Fence>,
    ) -> Result<()> {
        let wait: Vec<_> = wait_semaphore
            .map(|s| SemaphoreSubmit::binary(s, PipelineStages::ALL_COMMANDS))
            .into_iter()
            .collect();
        let signal: Vec<_> = signal_semaphore
            .map(|s| SemaphoreSubmit::binary(s, PipelineStages::ALL_COMMANDS))
            .into_iter()
            .collect();

        self.device.queue_submit(
            queue,
            &Submit {
                wait_semaphores: &wait,
                command_buffers: std::slice::from_ref(&command_buffer),
                signal_semaphores: &signal,
            },
            fence,
        )
    }

    // ===== BUFFERS =====

    /// Create a buffer, replicated once per frame in flight when its domain
    /// asks for it
    pub fn create_buffer(&self, desc: &BufferDesc, queue_family_index: u32) -> Result<DeviceBuffer<D>> {
        let copies = if desc.domain.is_replicated_per_frame() {
            self.max_frames_in_flight
        } else {
            1
        };

        let mut allocations: Vec<AllocatedBuffer<D::Buffer, D::Memory>> = Vec::with_capacity(copies);
        for _ in 0..copies {
            match self.device.create_buffer(desc, queue_family_index) {
                Ok(allocated) => allocations.push(allocated),
                Err(err) => {
                    for allocated in &allocations {
                        self.device.destroy_buffer(allocated);
                    }
                    return Err(err);
                }
            }
        }

        Ok(Buffer { allocations, desc: *desc })
    }

    /// Destroy every allocation of `buffer`
    ///
    /// The GPU must be done with it; zombify-style deferral is up to the caller.
    pub fn destroy_buffer(&self, buffer: DeviceBuffer<D>) {
        for allocated in &buffer.allocations {
            self.device.destroy_buffer(allocated);
        }
    }

    /// Allocation of `buffer` for the current frame in flight
    pub fn select_allocated_buffer<'b>(
        &self,
        buffer: &'b DeviceBuffer<D>,
    ) -> &'b AllocatedBuffer<D::Buffer, D::Memory> {
        buffer.select(self.current_frame_in_flight)
    }

    // ===== IMAGES =====

    pub fn create_image(&self, desc: &ImageDesc, queue_family_index: u32) -> Result<DeviceImage<D>> {
        if desc.width == 0 || desc.height == 0 || desc.depth == 0 || desc.mip_levels == 0 || desc.array_layers == 0 {
            return Err(Error::InvalidResource(format!("image with empty extent: {:?}", desc)));
        }
        let allocated = self.device.create_image(desc, queue_family_index)?;
        Ok(Image { allocated, desc: *desc })
    }

    pub fn destroy_image(&self, image: DeviceImage<D>) {
        self.device.destroy_image(&image.allocated);
    }

    // ===== SHADERS & PIPELINES =====

    pub fn create_shader_module(&self, spirv: &[u32]) -> Result<D::ShaderModule> {
        self.device.create_shader_module(spirv)
    }

    pub fn destroy_shader_module(&self, module: D::ShaderModule) {
        self.device.destroy_shader_module(module);
    }

    pub fn create_descriptor_set_layout(&self, bindings: &[DescriptorSetLayoutBinding]) -> Result<D::DescriptorSetLayout> {
        self.device.create_descriptor_set_layout(bindings)
    }

    pub fn destroy_descriptor_set_layout(&self, layout: D::DescriptorSetLayout) {
        self.device.destroy_descriptor_set_layout(layout);
    }

    pub fn create_pipeline_layout(&self, desc: &PipelineLayoutDesc<'_, D::DescriptorSetLayout>) -> Result<D::PipelineLayout> {
        self.device.create_pipeline_layout(desc)
    }

    pub fn destroy_pipeline_layout(&self, layout: D::PipelineLayout) {
        self.device.destroy_pipeline_layout(layout);
    }

    pub fn create_graphics_pipeline(
        &self,
        desc: &GraphicsPipelineDesc<'_, D::ShaderModule, D::PipelineLayout>,
    ) -> Result<Pipeline<D::Pipeline>> {
        let handle = self.device.create_graphics_pipeline(desc)?;
        Ok(Pipeline { handle, bind_point: PipelineBindPoint::Graphics })
    }

    pub fn create_compute_pipeline(
        &self,
        desc: &ComputePipelineDesc<'_, D::ShaderModule, D::PipelineLayout>,
    ) -> Result<Pipeline<D::Pipeline>> {
        let handle = self.device.create_compute_pipeline(desc)?;
        Ok(Pipeline { handle, bind_point: PipelineBindPoint::Compute })
    }

    pub fn destroy_pipeline(&self, pipeline: Pipeline<D::Pipeline>) {
        self.device.destroy_pipeline(pipeline.handle);
    }

    // ===== SYNCHRONIZATION =====

    pub fn create_binary_semaphore(&self) -> Result<D::Semaphore> {
        self.device.create_semaphore()
    }

    pub fn destroy_semaphore(&self, semaphore: D::Semaphore) {
        self.device.destroy_semaphore(semaphore);
    }

    pub fn create_fence(&self, signaled: bool) -> Result<D::Fence> {
        self.device.create_fence(signaled)
    }

    pub fn destroy_fence(&self, fence: D::Fence) {
        self.device.destroy_fence(fence);
    }

    // ===== DESCRIPTORS =====

    pub fn update_descriptor_set(&self, write: &DeviceDescriptorWrite<'_, D>) {
        self.device.update_descriptor_sets(std::slice::from_ref(write));
    }

    pub fn update_descriptor_sets(&self, writes: &[DeviceDescriptorWrite<'_, D>]) {
        if !writes.is_empty() {
            self.device.update_descriptor_sets(writes);
        }
    }
}

impl<D: GraphicsDevice> Drop for DeviceContext<D> {
    fn drop(&mut self) {
        if let Err(err) = self.device.wait_idle() {
            engine_warn!("inflight::DeviceContext", "wait_idle failed during teardown: {}", err);
        }

        for fence in self.frame_fences.drain(..) {
            self.device.destroy_fence(fence);
        }

        // Highest slot first
        while let Some(frame_context) = self.frame_contexts.pop() {
            drop(frame_context);
        }

        engine_info!("inflight::DeviceContext", "Device context destroyed");
    }
}

#[cfg(test)]
#[path = "device_context_tests.rs"]
mod tests;
