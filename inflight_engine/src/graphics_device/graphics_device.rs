/// GraphicsDevice trait - the narrow native API the frame core drives
///
/// Backends expose their native objects as small `Copy` handles. Ownership
/// of those objects stays with whoever created them through this trait; the
/// device never destroys a handle on its own.

use std::fmt::Debug;
use bitflags::bitflags;

use crate::error::Result;
use crate::graphics_device::{
    AllocatedBuffer, AllocatedImage, BufferDesc, ImageDesc, ImageAspects, ImageLayout,
    ImageSubresourceRange, RenderingInfo, Viewport, Rect2D, IndexType, ClearValue, DescriptorPoolSize, DescriptorSetLayoutBinding, DescriptorWrite,
    PipelineLayoutDesc, ComputePipelineDesc, GraphicsPipelineDesc, PipelineBindPoint,
    ShaderStages, DependencyFlags, MemoryBarrier, BufferBarrier, ImageBarrier, Submit,
};

/// Bounds shared by every backend handle type
pub trait DeviceHandle: Copy + Eq + Debug + Send + Sync + 'static {}

impl<T: Copy + Eq + Debug + Send + Sync + 'static> DeviceHandle for T {}

/// Queue a command buffer is recorded for and submitted to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueueType {
    Graphics,
    Compute,
    Transfer,
}

bitflags! {
    /// Command pool creation flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct CommandPoolFlags: u32 {
        /// Command buffers are short-lived (reset every frame)
        const TRANSIENT = 0x1;
        /// Command buffers may be reset individually
        const RESET_COMMAND_BUFFER = 0x2;
    }
}

bitflags! {
    /// Command pool reset flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct CommandPoolResetFlags: u32 {
        /// Return the pool's memory to the system
        const RELEASE_RESOURCES = 0x1;
    }
}

/// Buffer to buffer copy region
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferCopy {
    pub src_offset: u64,
    pub dst_offset: u64,
    pub size: u64,
}

/// Buffer to image copy region
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferImageCopy {
    pub buffer_offset: u64,
    /// Texels per row in the buffer, 0 = tightly packed
    pub buffer_row_length: u32,
    /// Rows per layer in the buffer, 0 = tightly packed
    pub buffer_image_height: u32,
    pub aspects: ImageAspects,
    pub mip_level: u32,
    pub base_array_layer: u32,
    pub layer_count: u32,
    pub image_offset: [i32; 3],
    pub image_extent: [u32; 3],
}

/// Mip level and layers of one image aspect addressed by a copy or blit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageSubresourceLayers {
    pub aspects: ImageAspects,
    pub mip_level: u32,
    pub base_array_layer: u32,
    pub layer_count: u32,
}

impl ImageSubresourceLayers {
    /// First layer of one color mip level
    pub fn color(mip_level: u32) -> Self {
        Self { aspects: ImageAspects::COLOR, mip_level, base_array_layer: 0, layer_count: 1 }
    }
}

/// Image to image copy region
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageCopy {
    pub src_subresource: ImageSubresourceLayers,
    pub src_offset: [i32; 3],
    pub dst_subresource: ImageSubresourceLayers,
    pub dst_offset: [i32; 3],
    pub extent: [u32; 3],
}

/// Scaled image to image blit region, bounded by two corners per side
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageBlit {
    pub src_subresource: ImageSubresourceLayers,
    pub src_offsets: [[i32; 3]; 2],
    pub dst_subresource: ImageSubresourceLayers,
    pub dst_offsets: [[i32; 3]; 2],
}

/// Sampling filter of a blit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Filter {
    Nearest,
    Linear,
}

/// Native device operations used by the frame core
///
/// Implemented by the Vulkan backend and by the in-crate test mock.
pub trait GraphicsDevice: Send + Sync + 'static {
    type CommandPool: DeviceHandle;
    type CommandBuffer: DeviceHandle;
    type DescriptorPool: DeviceHandle;
    type DescriptorSet: DeviceHandle;
    type DescriptorSetLayout: DeviceHandle;
    type Buffer: DeviceHandle;
    type Image: DeviceHandle;
    type ImageView: DeviceHandle;
    type Memory: DeviceHandle;
    type ShaderModule: DeviceHandle;
    type PipelineLayout: DeviceHandle;
    type Pipeline: DeviceHandle;
    type Semaphore: DeviceHandle;
    type Fence: DeviceHandle;

    // ===== QUEUES =====

    /// Queue family index serving `queue` (falls back to graphics when the
    /// device has no dedicated family)
    fn queue_family_index(&self, queue: QueueType) -> u32;

    /// Submit one batch to `queue`, signaling `fence` on completion
    fn queue_submit(
        &self,
        queue: QueueType,
        submit: &Submit<'_, Self::Semaphore, Self::CommandBuffer>,
        fence: Option<Self::Fence>,
    ) -> Result<()>;

    /// Block until every queue is idle
    fn wait_idle(&self) -> Result<()>;

    // ===== COMMAND POOLS & RECORDING =====

    fn create_command_pool(&self, queue_family_index: u32, flags: CommandPoolFlags) -> Result<Self::CommandPool>;
    fn destroy_command_pool(&self, pool: Self::CommandPool);

    /// Reset every command buffer allocated from `pool`
    fn reset_command_pool(&self, pool: Self::CommandPool, flags: CommandPoolResetFlags) -> Result<()>;

    /// Allocate one primary command buffer
    fn allocate_command_buffer(&self, pool: Self::CommandPool) -> Result<Self::CommandBuffer>;

    /// Begin one-time-submit recording
    fn begin_command_buffer(&self, command_buffer: Self::CommandBuffer) -> Result<()>;
    fn end_command_buffer(&self, command_buffer: Self::CommandBuffer) -> Result<()>;

    /// Record one batched pipeline barrier
    fn cmd_pipeline_barrier(
        &self,
        command_buffer: Self::CommandBuffer,
        dependency_flags: DependencyFlags,
        memory_barriers: &[MemoryBarrier],
        buffer_barriers: &[BufferBarrier<Self::Buffer>],
        image_barriers: &[ImageBarrier<Self::Image>],
    );

    fn cmd_copy_buffer(
        &self,
        command_buffer: Self::CommandBuffer,
        src: Self::Buffer,
        dst: Self::Buffer,
        regions: &[BufferCopy],
    );

    fn cmd_copy_buffer_to_image(
        &self,
        command_buffer: Self::CommandBuffer,
        src: Self::Buffer,
        dst: Self::Image,
        dst_layout: ImageLayout,
        regions: &[BufferImageCopy],
    );

    fn cmd_copy_image_to_buffer(
        &self,
        command_buffer: Self::CommandBuffer,
        src: Self::Image,
        src_layout: ImageLayout,
        dst: Self::Buffer,
        regions: &[BufferImageCopy],
    );

    fn cmd_copy_image(
        &self,
        command_buffer: Self::CommandBuffer,
        src: Self::Image,
        src_layout: ImageLayout,
        dst: Self::Image,
        dst_layout: ImageLayout,
        regions: &[ImageCopy],
    );

    fn cmd_blit_image(
        &self,
        command_buffer: Self::CommandBuffer,
        src: Self::Image,
        src_layout: ImageLayout,
        dst: Self::Image,
        dst_layout: ImageLayout,
        regions: &[ImageBlit],
        filter: Filter,
    );

    /// Clear image subresources outside a rendering pass
    ///
    /// Color values clear color images and depth/stencil values clear depth
    /// and stencil images.
    fn cmd_clear_image(
        &self,
        command_buffer: Self::CommandBuffer,
        image: Self::Image,
        layout: ImageLayout,
        value: &ClearValue,
        ranges: &[ImageSubresourceRange],
    );

    fn cmd_bind_pipeline(
        &self,
        command_buffer: Self::CommandBuffer,
        bind_point: PipelineBindPoint,
        pipeline: Self::Pipeline,
    );

    fn cmd_bind_descriptor_sets(
        &self,
        command_buffer: Self::CommandBuffer,
        bind_point: PipelineBindPoint,
        layout: Self::PipelineLayout,
        first_set: u32,
        sets: &[Self::DescriptorSet],
    );

    fn cmd_push_constants(
        &self,
        command_buffer: Self::CommandBuffer,
        layout: Self::PipelineLayout,
        stages: ShaderStages,
        offset: u32,
        data: &[u8],
    );

    fn cmd_dispatch(&self, command_buffer: Self::CommandBuffer, x: u32, y: u32, z: u32);

    /// Dispatch with workgroup ids starting at `base`
    fn cmd_dispatch_base(&self, command_buffer: Self::CommandBuffer, base: [u32; 3], groups: [u32; 3]);

    /// Dispatch with group counts read from `buffer` at `offset`
    fn cmd_dispatch_indirect(&self, command_buffer: Self::CommandBuffer, buffer: Self::Buffer, offset: u64);

    // ===== RENDERING =====

    fn cmd_begin_rendering(
        &self,
        command_buffer: Self::CommandBuffer,
        info: &RenderingInfo<'_, Self::ImageView>,
    );
    fn cmd_end_rendering(&self, command_buffer: Self::CommandBuffer);

    fn cmd_set_viewport(&self, command_buffer: Self::CommandBuffer, viewport: &Viewport);
    fn cmd_set_scissor(&self, command_buffer: Self::CommandBuffer, scissor: &Rect2D);

    /// Bind `buffers[i]` at `offsets[i]` to binding `first_binding + i`
    fn cmd_bind_vertex_buffers(
        &self,
        command_buffer: Self::CommandBuffer,
        first_binding: u32,
        buffers: &[Self::Buffer],
        offsets: &[u64],
    );

    fn cmd_bind_index_buffer(
        &self,
        command_buffer: Self::CommandBuffer,
        buffer: Self::Buffer,
        offset: u64,
        index_type: IndexType,
    );

    fn cmd_draw(
        &self,
        command_buffer: Self::CommandBuffer,
        vertex_count: u32,
        instance_count: u32,
        first_vertex: u32,
        first_instance: u32,
    );

    fn cmd_draw_indexed(
        &self,
        command_buffer: Self::CommandBuffer,
        index_count: u32,
        instance_count: u32,
        first_index: u32,
        vertex_offset: i32,
        first_instance: u32,
    );

    fn cmd_draw_indirect(
        &self,
        command_buffer: Self::CommandBuffer,
        buffer: Self::Buffer,
        offset: u64,
        draw_count: u32,
        stride: u32,
    );

    fn cmd_draw_indexed_indirect(
        &self,
        command_buffer: Self::CommandBuffer,
        buffer: Self::Buffer,
        offset: u64,
        draw_count: u32,
        stride: u32,
    );

    /// Indirect draws whose count is read from `count_buffer`, capped at
    /// `max_draw_count`
    fn cmd_draw_indirect_count(
        &self,
        command_buffer: Self::CommandBuffer,
        buffer: Self::Buffer,
        offset: u64,
        count_buffer: Self::Buffer,
        count_offset: u64,
        max_draw_count: u32,
        stride: u32,
    );

    fn cmd_draw_indexed_indirect_count(
        &self,
        command_buffer: Self::CommandBuffer,
        buffer: Self::Buffer,
        offset: u64,
        count_buffer: Self::Buffer,
        count_offset: u64,
        max_draw_count: u32,
        stride: u32,
    );

    // ===== DESCRIPTORS =====

    fn create_descriptor_pool(&self, sizes: &[DescriptorPoolSize], max_sets: u32) -> Result<Self::DescriptorPool>;
    fn destroy_descriptor_pool(&self, pool: Self::DescriptorPool);

    /// Allocate one set from `pool`
    ///
    /// Must report exhaustion as `Error::OutOfPoolMemory` or
    /// `Error::FragmentedPool` so callers can retry on another pool.
    fn allocate_descriptor_set(
        &self,
        pool: Self::DescriptorPool,
        layout: Self::DescriptorSetLayout,
    ) -> Result<Self::DescriptorSet>;

    /// Return every set allocated from `pool` to it
    fn reset_descriptor_pool(&self, pool: Self::DescriptorPool) -> Result<()>;

    fn create_descriptor_set_layout(&self, bindings: &[DescriptorSetLayoutBinding]) -> Result<Self::DescriptorSetLayout>;
    fn destroy_descriptor_set_layout(&self, layout: Self::DescriptorSetLayout);

    fn update_descriptor_sets(
        &self,
        writes: &[DescriptorWrite<'_, Self::DescriptorSet, Self::Buffer, Self::ImageView>],
    );

    // ===== RESOURCES =====

    /// Create a buffer bound to fresh memory in `desc.domain`
    ///
    /// Host-visible domains come back persistently mapped. Host write-combined
    /// buffers are sub-allocated linearly.
    fn create_buffer(&self, desc: &BufferDesc, queue_family_index: u32) -> Result<AllocatedBuffer<Self::Buffer, Self::Memory>>;
    fn destroy_buffer(&self, buffer: &AllocatedBuffer<Self::Buffer, Self::Memory>);

    /// Create a device-local image and its default view
    fn create_image(&self, desc: &ImageDesc, queue_family_index: u32) -> Result<AllocatedImage<Self::Image, Self::ImageView, Self::Memory>>;
    fn destroy_image(&self, image: &AllocatedImage<Self::Image, Self::ImageView, Self::Memory>);

    fn create_shader_module(&self, spirv: &[u32]) -> Result<Self::ShaderModule>;
    fn destroy_shader_module(&self, module: Self::ShaderModule);

    fn create_pipeline_layout(&self, desc: &PipelineLayoutDesc<'_, Self::DescriptorSetLayout>) -> Result<Self::PipelineLayout>;
    fn destroy_pipeline_layout(&self, layout: Self::PipelineLayout);

    fn create_compute_pipeline(
        &self,
        desc: &ComputePipelineDesc<'_, Self::ShaderModule, Self::PipelineLayout>,
    ) -> Result<Self::Pipeline>;
    fn create_graphics_pipeline(
        &self,
        desc: &GraphicsPipelineDesc<'_, Self::ShaderModule, Self::PipelineLayout>,
    ) -> Result<Self::Pipeline>;
    fn destroy_pipeline(&self, pipeline: Self::Pipeline);

    // ===== SYNCHRONIZATION =====

    /// Create a binary semaphore
    fn create_semaphore(&self) -> Result<Self::Semaphore>;
    fn destroy_semaphore(&self, semaphore: Self::Semaphore);

    fn create_fence(&self, signaled: bool) -> Result<Self::Fence>;
    fn destroy_fence(&self, fence: Self::Fence);

    /// Wait until `fence` is signaled or `timeout_ns` elapses
    fn wait_for_fence(&self, fence: Self::Fence, timeout_ns: u64) -> Result<()>;
    fn reset_fence(&self, fence: Self::Fence) -> Result<()>;
}
