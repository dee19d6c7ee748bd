/// Shader stage flags and pipeline creation parameters
///
/// Only the state the frame core needs to create and bind pipelines is
/// described here. Rasterization state beyond topology, culling and depth
/// testing is left at backend defaults; viewport and scissor are dynamic.

use bitflags::bitflags;
use crate::graphics_device::image::Format;

bitflags! {
    /// Shader stages
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ShaderStages: u32 {
        const VERTEX = 0x1;
        const TESSELLATION_CONTROL = 0x2;
        const TESSELLATION_EVALUATION = 0x4;
        const GEOMETRY = 0x8;
        const FRAGMENT = 0x10;
        const COMPUTE = 0x20;
        const ALL_GRAPHICS = 0x1F;
    }
}

/// Which pipeline slot a pipeline and its descriptor sets bind to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineBindPoint {
    Graphics,
    Compute,
}

/// Push constant block visible to some stages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PushConstantRange {
    pub stages: ShaderStages,
    pub offset: u32,
    pub size: u32,
}

/// Pipeline layout parameters
#[derive(Debug, Clone, Copy)]
pub struct PipelineLayoutDesc<'a, L> {
    pub set_layouts: &'a [L],
    pub push_constant_ranges: &'a [PushConstantRange],
}

/// Primitive topology
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveTopology {
    PointList,
    LineList,
    LineStrip,
    TriangleList,
    TriangleStrip,
}

/// Face culling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CullMode {
    None,
    Front,
    Back,
}

/// Compute pipeline parameters
#[derive(Debug, Clone, Copy)]
pub struct ComputePipelineDesc<'a, M, L> {
    pub shader: M,
    pub entry_point: &'a str,
    pub layout: L,
}

/// Graphics pipeline parameters (dynamic rendering, no vertex input state)
#[derive(Debug, Clone, Copy)]
pub struct GraphicsPipelineDesc<'a, M, L> {
    pub vertex_shader: M,
    pub vertex_entry_point: &'a str,
    pub fragment_shader: Option<M>,
    pub fragment_entry_point: &'a str,
    pub layout: L,
    pub topology: PrimitiveTopology,
    pub cull_mode: CullMode,
    pub color_formats: &'a [Format],
    pub depth_format: Option<Format>,
    pub depth_test: bool,
}

/// A created pipeline together with the slot it binds to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pipeline<P> {
    pub handle: P,
    pub bind_point: PipelineBindPoint,
}
