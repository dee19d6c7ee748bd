/// Image types and usage-to-access mapping

use bitflags::bitflags;
use crate::graphics_device::sync::AccessFlags;

/// Texel formats the core needs to size staging copies
#[allow(non_camel_case_types)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Format {
    R8_UNORM,
    R8G8B8A8_UNORM,
    R8G8B8A8_SRGB,
    B8G8R8A8_UNORM,
    B8G8R8A8_SRGB,
    R16G16B16A16_SFLOAT,
    R32_SFLOAT,
    R32G32_SFLOAT,
    R32G32B32A32_SFLOAT,
    D32_SFLOAT,
    D24_UNORM_S8_UINT,
}

impl Format {
    /// Bytes per texel
    pub fn texel_size(&self) -> u32 {
        match self {
            Format::R8_UNORM => 1,
            Format::R8G8B8A8_UNORM
            | Format::R8G8B8A8_SRGB
            | Format::B8G8R8A8_UNORM
            | Format::B8G8R8A8_SRGB
            | Format::R32_SFLOAT
            | Format::D32_SFLOAT
            | Format::D24_UNORM_S8_UINT => 4,
            Format::R16G16B16A16_SFLOAT | Format::R32G32_SFLOAT => 8,
            Format::R32G32B32A32_SFLOAT => 16,
        }
    }

    /// Aspects an image of this format carries
    pub fn aspects(&self) -> ImageAspects {
        match self {
            Format::D32_SFLOAT => ImageAspects::DEPTH,
            Format::D24_UNORM_S8_UINT => ImageAspects::DEPTH | ImageAspects::STENCIL,
            _ => ImageAspects::COLOR,
        }
    }
}

bitflags! {
    /// Image usage flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ImageUsage: u32 {
        const TRANSFER_SRC = 0x1;
        const TRANSFER_DST = 0x2;
        const SAMPLED = 0x4;
        const STORAGE = 0x8;
        const COLOR_ATTACHMENT = 0x10;
        const DEPTH_STENCIL_ATTACHMENT = 0x20;
        const TRANSIENT_ATTACHMENT = 0x40;
        const INPUT_ATTACHMENT = 0x80;
    }
}

bitflags! {
    /// Image aspects
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ImageAspects: u32 {
        const COLOR = 0x1;
        const DEPTH = 0x2;
        const STENCIL = 0x4;
    }
}

/// Image dimensionality
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageKind {
    D1,
    D2,
    D3,
    Cube,
}

/// Image creation parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageDesc {
    pub kind: ImageKind,
    pub format: Format,
    pub width: u32,
    pub height: u32,
    pub depth: u32,
    pub mip_levels: u32,
    pub array_layers: u32,
    pub usage: ImageUsage,
}

impl ImageDesc {
    /// Single-mip 2D image
    pub fn texture_2d(width: u32, height: u32, format: Format, usage: ImageUsage) -> Self {
        Self {
            kind: ImageKind::D2,
            format,
            width,
            height,
            depth: 1,
            mip_levels: 1,
            array_layers: 1,
            usage,
        }
    }

    /// Byte size of mip level 0 of one layer, tightly packed
    pub fn level0_size(&self) -> u64 {
        self.width as u64 * self.height as u64 * self.depth as u64 * self.format.texel_size() as u64
    }
}

/// One backend image with its default view and memory allocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllocatedImage<I, V, M> {
    pub image: I,
    pub view: V,
    pub memory: M,
}

/// An image as seen by the application
#[derive(Debug)]
pub struct Image<I, V, M> {
    pub(crate) allocated: AllocatedImage<I, V, M>,
    pub(crate) desc: ImageDesc,
}

impl<I: Copy, V: Copy, M: Copy> Image<I, V, M> {
    pub fn handle(&self) -> I {
        self.allocated.image
    }

    pub fn view(&self) -> V {
        self.allocated.view
    }

    pub fn desc(&self) -> &ImageDesc {
        &self.desc
    }
}

/// Accesses that may have written to an image with this usage
pub fn image_usage_to_access_flags_first_scope(usage: ImageUsage) -> AccessFlags {
    let mut flags = AccessFlags::empty();
    if usage.contains(ImageUsage::TRANSFER_DST) {
        flags |= AccessFlags::TRANSFER_WRITE;
    }
    if usage.contains(ImageUsage::STORAGE) {
        flags |= AccessFlags::SHADER_STORAGE_WRITE;
    }
    if usage.contains(ImageUsage::COLOR_ATTACHMENT) {
        flags |= AccessFlags::COLOR_ATTACHMENT_WRITE;
    }
    if usage.contains(ImageUsage::DEPTH_STENCIL_ATTACHMENT) {
        flags |= AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE;
    }
    flags
}

/// Every access an image with this usage may see
pub fn image_usage_to_access_flags_second_scope(usage: ImageUsage) -> AccessFlags {
    let mut flags = AccessFlags::empty();
    if usage.contains(ImageUsage::TRANSFER_SRC) {
        flags |= AccessFlags::TRANSFER_READ;
    }
    if usage.contains(ImageUsage::TRANSFER_DST) {
        flags |= AccessFlags::TRANSFER_WRITE;
    }
    if usage.contains(ImageUsage::SAMPLED) {
        flags |= AccessFlags::SHADER_SAMPLED_READ;
    }
    if usage.contains(ImageUsage::STORAGE) {
        flags |= AccessFlags::SHADER_STORAGE_READ | AccessFlags::SHADER_STORAGE_WRITE;
    }
    if usage.contains(ImageUsage::COLOR_ATTACHMENT) {
        flags |= AccessFlags::COLOR_ATTACHMENT_READ | AccessFlags::COLOR_ATTACHMENT_WRITE;
    }
    if usage.contains(ImageUsage::DEPTH_STENCIL_ATTACHMENT) {
        flags |= AccessFlags::DEPTH_STENCIL_ATTACHMENT_READ
            | AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE;
    }
    flags
}

#[cfg(test)]
#[path = "image_tests.rs"]
mod tests;
