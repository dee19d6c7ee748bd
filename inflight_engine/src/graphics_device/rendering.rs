/// Dynamic rendering and draw-state types

use crate::graphics_device::image::ImageAspects;
use crate::graphics_device::sync::ImageLayout;

/// Viewport transform, depth range defaults to `0.0..=1.0`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub min_depth: f32,
    pub max_depth: f32,
}

impl Viewport {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height, min_depth: 0.0, max_depth: 1.0 }
    }
}

/// Integer rectangle used for scissors and render areas
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rect2D {
    pub offset: [i32; 2],
    pub extent: [u32; 2],
}

impl Rect2D {
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self { offset: [x, y], extent: [width, height] }
    }
}

/// Width of the indices in an index buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexType {
    U16,
    U32,
}

impl IndexType {
    /// Bytes per index
    pub fn size(&self) -> u32 {
        match self {
            IndexType::U16 => 2,
            IndexType::U32 => 4,
        }
    }
}

/// Value an attachment or image is cleared to
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClearValue {
    /// Float, unorm and srgb color formats
    Color([f32; 4]),
    ColorInt([i32; 4]),
    ColorUint([u32; 4]),
    DepthStencil { depth: f32, stencil: u32 },
}

impl ClearValue {
    /// Aspects this value can clear
    pub fn aspects(&self) -> ImageAspects {
        match self {
            ClearValue::Color(_) | ClearValue::ColorInt(_) | ClearValue::ColorUint(_) => ImageAspects::COLOR,
            ClearValue::DepthStencil { .. } => ImageAspects::DEPTH | ImageAspects::STENCIL,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttachmentLoadOp {
    Load,
    Clear,
    DontCare,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttachmentStoreOp {
    Store,
    DontCare,
}

/// One attachment of a dynamic rendering pass
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderingAttachment<V> {
    pub view: V,
    pub layout: ImageLayout,
    pub load_op: AttachmentLoadOp,
    pub store_op: AttachmentStoreOp,
    /// Used when `load_op` is `Clear`
    pub clear_value: ClearValue,
}

/// Parameters of `cmd_begin_rendering`
#[derive(Debug, Clone, Copy)]
pub struct RenderingInfo<'a, V> {
    pub render_area: Rect2D,
    pub layer_count: u32,
    pub color_attachments: &'a [RenderingAttachment<V>],
    pub depth_attachment: Option<RenderingAttachment<V>>,
    pub stencil_attachment: Option<RenderingAttachment<V>>,
}

impl<'a, V> RenderingInfo<'a, V> {
    /// Single-layer pass over `render_area` writing only color attachments
    pub fn color(render_area: Rect2D, color_attachments: &'a [RenderingAttachment<V>]) -> Self {
        Self {
            render_area,
            layer_count: 1,
            color_attachments,
            depth_attachment: None,
            stencil_attachment: None,
        }
    }
}

#[cfg(test)]
#[path = "rendering_tests.rs"]
mod tests;
