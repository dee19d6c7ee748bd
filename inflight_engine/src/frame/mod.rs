/// Frame module - per-slot recording and transient allocation

pub mod pipeline_barrier_builder;
pub mod command_buffer_recycler;
pub mod linear_host_allocator;
pub mod transient_descriptor_allocator;
pub mod command_recorder;
pub mod frame_context;

pub use pipeline_barrier_builder::PipelineBarrierBuilder;
pub use command_buffer_recycler::CommandBufferRecycler;
pub use linear_host_allocator::{LinearHostAllocator, LinearHostAllocatorProvider, MappedHostBuffer, SharedLinearHostAllocator};
pub use transient_descriptor_allocator::TransientDescriptorSetAllocator;
pub use command_recorder::{CommandRecorder, ImageRegion};
pub use frame_context::FrameContext;
