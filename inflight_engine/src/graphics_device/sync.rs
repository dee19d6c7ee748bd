/// Synchronization vocabulary shared by the barrier builder, the command
/// recorder and queue submission.
///
/// Stage and access bits use the synchronization2 bit values so backends
/// can convert with a raw cast.

use bitflags::bitflags;
use crate::graphics_device::image::ImageAspects;

/// Queue family index meaning "no ownership transfer"
pub const QUEUE_FAMILY_IGNORED: u32 = !0;

/// Size meaning "until the end of the buffer"
pub const WHOLE_SIZE: u64 = !0;

/// Level/layer count meaning "all remaining"
pub const REMAINING: u32 = !0;

bitflags! {
    /// Pipeline stages a dependency waits on or blocks
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct PipelineStages: u64 {
        const TOP_OF_PIPE = 0x1;
        const DRAW_INDIRECT = 0x2;
        const VERTEX_INPUT = 0x4;
        const VERTEX_SHADER = 0x8;
        const FRAGMENT_SHADER = 0x80;
        const EARLY_FRAGMENT_TESTS = 0x100;
        const LATE_FRAGMENT_TESTS = 0x200;
        const COLOR_ATTACHMENT_OUTPUT = 0x400;
        const COMPUTE_SHADER = 0x800;
        const ALL_TRANSFER = 0x1000;
        const BOTTOM_OF_PIPE = 0x2000;
        const HOST = 0x4000;
        const ALL_GRAPHICS = 0x8000;
        const ALL_COMMANDS = 0x1_0000;
        const COPY = 0x1_0000_0000;
        const RESOLVE = 0x2_0000_0000;
        const BLIT = 0x4_0000_0000;
        const CLEAR = 0x8_0000_0000;
    }
}

bitflags! {
    /// Memory accesses made visible or available by a dependency
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct AccessFlags: u64 {
        const INDIRECT_COMMAND_READ = 0x1;
        const INDEX_READ = 0x2;
        const VERTEX_ATTRIBUTE_READ = 0x4;
        const UNIFORM_READ = 0x8;
        const INPUT_ATTACHMENT_READ = 0x10;
        const SHADER_READ = 0x20;
        const SHADER_WRITE = 0x40;
        const COLOR_ATTACHMENT_READ = 0x80;
        const COLOR_ATTACHMENT_WRITE = 0x100;
        const DEPTH_STENCIL_ATTACHMENT_READ = 0x200;
        const DEPTH_STENCIL_ATTACHMENT_WRITE = 0x400;
        const TRANSFER_READ = 0x800;
        const TRANSFER_WRITE = 0x1000;
        const HOST_READ = 0x2000;
        const HOST_WRITE = 0x4000;
        const MEMORY_READ = 0x8000;
        const MEMORY_WRITE = 0x1_0000;
        const SHADER_SAMPLED_READ = 0x1_0000_0000;
        const SHADER_STORAGE_READ = 0x2_0000_0000;
        const SHADER_STORAGE_WRITE = 0x4_0000_0000;
    }
}

bitflags! {
    /// Scope flags for a batched pipeline barrier
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct DependencyFlags: u32 {
        const BY_REGION = 0x1;
        const VIEW_LOCAL = 0x2;
        const DEVICE_GROUP = 0x4;
    }
}

/// Image layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageLayout {
    /// Contents may be discarded
    Undefined,
    /// Any access, no layout optimization
    General,
    /// Color attachment
    ColorAttachment,
    /// Depth/stencil attachment
    DepthStencilAttachment,
    /// Depth/stencil read-only
    DepthStencilReadOnly,
    /// Shader read-only access
    ShaderReadOnly,
    /// Transfer source
    TransferSrc,
    /// Transfer destination
    TransferDst,
    /// Host-initialized linear image
    Preinitialized,
    /// Presentation
    PresentSrc,
}

/// Subresource range of an image covered by a barrier or view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ImageSubresourceRange {
    pub aspects: ImageAspects,
    pub base_mip_level: u32,
    pub level_count: u32,
    pub base_array_layer: u32,
    pub layer_count: u32,
}

impl ImageSubresourceRange {
    /// Every mip level and layer of the given aspects
    pub fn whole(aspects: ImageAspects) -> Self {
        Self {
            aspects,
            base_mip_level: 0,
            level_count: REMAINING,
            base_array_layer: 0,
            layer_count: REMAINING,
        }
    }

    /// Every mip level and layer of a color image
    pub fn color() -> Self {
        Self::whole(ImageAspects::COLOR)
    }
}

/// Global memory barrier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryBarrier {
    pub src_stages: PipelineStages,
    pub src_access: AccessFlags,
    pub dst_stages: PipelineStages,
    pub dst_access: AccessFlags,
}

/// Barrier on a buffer range
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferBarrier<B> {
    pub src_stages: PipelineStages,
    pub src_access: AccessFlags,
    pub dst_stages: PipelineStages,
    pub dst_access: AccessFlags,
    pub src_queue_family: u32,
    pub dst_queue_family: u32,
    pub buffer: B,
    pub offset: u64,
    pub size: u64,
}

/// Barrier on an image subresource range, optionally with a layout transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageBarrier<I> {
    pub src_stages: PipelineStages,
    pub src_access: AccessFlags,
    pub dst_stages: PipelineStages,
    pub dst_access: AccessFlags,
    pub old_layout: ImageLayout,
    pub new_layout: ImageLayout,
    pub src_queue_family: u32,
    pub dst_queue_family: u32,
    pub image: I,
    pub range: ImageSubresourceRange,
}

/// Semaphore wait or signal operation of a submission
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SemaphoreSubmit<S> {
    pub semaphore: S,
    /// Timeline value (ignored for binary semaphores)
    pub value: u64,
    pub stages: PipelineStages,
}

impl<S> SemaphoreSubmit<S> {
    /// Binary semaphore operation at the given stages
    pub fn binary(semaphore: S, stages: PipelineStages) -> Self {
        Self { semaphore, value: 0, stages }
    }
}

/// One queue submission batch
#[derive(Debug, Clone, Copy)]
pub struct Submit<'a, S, C> {
    pub wait_semaphores: &'a [SemaphoreSubmit<S>],
    pub command_buffers: &'a [C],
    pub signal_semaphores: &'a [SemaphoreSubmit<S>],
}
