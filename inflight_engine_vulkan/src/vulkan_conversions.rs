/// Conversions from the engine's device vocabulary to Vulkan types
///
/// Stage, access, usage and shader-stage bits are declared with their
/// synchronization2 values on the engine side, so those convert with a raw
/// cast. Enums are mapped explicitly.

use ash::vk;
use gpu_allocator::MemoryLocation;
use inflight_engine::inflight::render::{
    AccessFlags, AttachmentLoadOp, AttachmentStoreOp, BufferDomain, BufferImageCopy, BufferUsage,
    ClearValue, CommandPoolFlags, CommandPoolResetFlags, CullMode, DependencyFlags, DescriptorType,
    Filter, Format, ImageAspects, ImageKind, ImageLayout, ImageSubresourceLayers,
    ImageSubresourceRange, ImageUsage, IndexType, PipelineBindPoint, PipelineStages,
    PrimitiveTopology, Rect2D, RenderingAttachment, ShaderStages, Viewport,
};

// ===== BITS =====

pub(crate) fn pipeline_stages_to_vk(stages: PipelineStages) -> vk::PipelineStageFlags2 {
    vk::PipelineStageFlags2::from_raw(stages.bits())
}

pub(crate) fn access_flags_to_vk(access: AccessFlags) -> vk::AccessFlags2 {
    vk::AccessFlags2::from_raw(access.bits())
}

pub(crate) fn dependency_flags_to_vk(flags: DependencyFlags) -> vk::DependencyFlags {
    vk::DependencyFlags::from_raw(flags.bits())
}

pub(crate) fn buffer_usage_to_vk(usage: BufferUsage) -> vk::BufferUsageFlags {
    vk::BufferUsageFlags::from_raw(usage.bits())
}

pub(crate) fn image_usage_to_vk(usage: ImageUsage) -> vk::ImageUsageFlags {
    vk::ImageUsageFlags::from_raw(usage.bits())
}

pub(crate) fn shader_stages_to_vk(stages: ShaderStages) -> vk::ShaderStageFlags {
    vk::ShaderStageFlags::from_raw(stages.bits())
}

pub(crate) fn image_aspects_to_vk(aspects: ImageAspects) -> vk::ImageAspectFlags {
    let mut flags = vk::ImageAspectFlags::empty();
    if aspects.contains(ImageAspects::COLOR) {
        flags |= vk::ImageAspectFlags::COLOR;
    }
    if aspects.contains(ImageAspects::DEPTH) {
        flags |= vk::ImageAspectFlags::DEPTH;
    }
    if aspects.contains(ImageAspects::STENCIL) {
        flags |= vk::ImageAspectFlags::STENCIL;
    }
    flags
}

pub(crate) fn command_pool_flags_to_vk(flags: CommandPoolFlags) -> vk::CommandPoolCreateFlags {
    let mut vk_flags = vk::CommandPoolCreateFlags::empty();
    if flags.contains(CommandPoolFlags::TRANSIENT) {
        vk_flags |= vk::CommandPoolCreateFlags::TRANSIENT;
    }
    if flags.contains(CommandPoolFlags::RESET_COMMAND_BUFFER) {
        vk_flags |= vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER;
    }
    vk_flags
}

pub(crate) fn command_pool_reset_flags_to_vk(flags: CommandPoolResetFlags) -> vk::CommandPoolResetFlags {
    if flags.contains(CommandPoolResetFlags::RELEASE_RESOURCES) {
        vk::CommandPoolResetFlags::RELEASE_RESOURCES
    } else {
        vk::CommandPoolResetFlags::empty()
    }
}

// ===== ENUMS =====

pub(crate) fn format_to_vk(format: Format) -> vk::Format {
    match format {
        Format::R8_UNORM => vk::Format::R8_UNORM,
        Format::R8G8B8A8_UNORM => vk::Format::R8G8B8A8_UNORM,
        Format::R8G8B8A8_SRGB => vk::Format::R8G8B8A8_SRGB,
        Format::B8G8R8A8_UNORM => vk::Format::B8G8R8A8_UNORM,
        Format::B8G8R8A8_SRGB => vk::Format::B8G8R8A8_SRGB,
        Format::R16G16B16A16_SFLOAT => vk::Format::R16G16B16A16_SFLOAT,
        Format::R32_SFLOAT => vk::Format::R32_SFLOAT,
        Format::R32G32_SFLOAT => vk::Format::R32G32_SFLOAT,
        Format::R32G32B32A32_SFLOAT => vk::Format::R32G32B32A32_SFLOAT,
        Format::D32_SFLOAT => vk::Format::D32_SFLOAT,
        Format::D24_UNORM_S8_UINT => vk::Format::D24_UNORM_S8_UINT,
    }
}

pub(crate) fn image_layout_to_vk(layout: ImageLayout) -> vk::ImageLayout {
    match layout {
        ImageLayout::Undefined => vk::ImageLayout::UNDEFINED,
        ImageLayout::General => vk::ImageLayout::GENERAL,
        ImageLayout::ColorAttachment => vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
        ImageLayout::DepthStencilAttachment => vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
        ImageLayout::DepthStencilReadOnly => vk::ImageLayout::DEPTH_STENCIL_READ_ONLY_OPTIMAL,
        ImageLayout::ShaderReadOnly => vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        ImageLayout::TransferSrc => vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
        ImageLayout::TransferDst => vk::ImageLayout::TRANSFER_DST_OPTIMAL,
        ImageLayout::Preinitialized => vk::ImageLayout::PREINITIALIZED,
        ImageLayout::PresentSrc => vk::ImageLayout::PRESENT_SRC_KHR,
    }
}

pub(crate) fn subresource_range_to_vk(range: &ImageSubresourceRange) -> vk::ImageSubresourceRange {
    // REMAINING shares its value with VK_REMAINING_MIP_LEVELS/ARRAY_LAYERS
    vk::ImageSubresourceRange::default()
        .aspect_mask(image_aspects_to_vk(range.aspects))
        .base_mip_level(range.base_mip_level)
        .level_count(range.level_count)
        .base_array_layer(range.base_array_layer)
        .layer_count(range.layer_count)
}

pub(crate) fn subresource_layers_to_vk(layers: &ImageSubresourceLayers) -> vk::ImageSubresourceLayers {
    vk::ImageSubresourceLayers::default()
        .aspect_mask(image_aspects_to_vk(layers.aspects))
        .mip_level(layers.mip_level)
        .base_array_layer(layers.base_array_layer)
        .layer_count(layers.layer_count)
}

pub(crate) fn offset_3d_to_vk(offset: [i32; 3]) -> vk::Offset3D {
    vk::Offset3D { x: offset[0], y: offset[1], z: offset[2] }
}

pub(crate) fn extent_3d_to_vk(extent: [u32; 3]) -> vk::Extent3D {
    vk::Extent3D { width: extent[0], height: extent[1], depth: extent[2] }
}

pub(crate) fn buffer_image_copy_to_vk(region: &BufferImageCopy) -> vk::BufferImageCopy {
    vk::BufferImageCopy::default()
        .buffer_offset(region.buffer_offset)
        .buffer_row_length(region.buffer_row_length)
        .buffer_image_height(region.buffer_image_height)
        .image_subresource(subresource_layers_to_vk(&ImageSubresourceLayers {
            aspects: region.aspects,
            mip_level: region.mip_level,
            base_array_layer: region.base_array_layer,
            layer_count: region.layer_count,
        }))
        .image_offset(offset_3d_to_vk(region.image_offset))
        .image_extent(extent_3d_to_vk(region.image_extent))
}

pub(crate) fn viewport_to_vk(viewport: &Viewport) -> vk::Viewport {
    vk::Viewport {
        x: viewport.x,
        y: viewport.y,
        width: viewport.width,
        height: viewport.height,
        min_depth: viewport.min_depth,
        max_depth: viewport.max_depth,
    }
}

pub(crate) fn rect_2d_to_vk(rect: &Rect2D) -> vk::Rect2D {
    vk::Rect2D {
        offset: vk::Offset2D { x: rect.offset[0], y: rect.offset[1] },
        extent: vk::Extent2D { width: rect.extent[0], height: rect.extent[1] },
    }
}

pub(crate) fn clear_value_to_vk(value: &ClearValue) -> vk::ClearValue {
    match *value {
        ClearValue::Color(float32) => vk::ClearValue { color: vk::ClearColorValue { float32 } },
        ClearValue::ColorInt(int32) => vk::ClearValue { color: vk::ClearColorValue { int32 } },
        ClearValue::ColorUint(uint32) => vk::ClearValue { color: vk::ClearColorValue { uint32 } },
        ClearValue::DepthStencil { depth, stencil } => vk::ClearValue {
            depth_stencil: vk::ClearDepthStencilValue { depth, stencil },
        },
    }
}

pub(crate) fn rendering_attachment_to_vk(
    attachment: &RenderingAttachment<vk::ImageView>,
) -> vk::RenderingAttachmentInfo<'static> {
    vk::RenderingAttachmentInfo::default()
        .image_view(attachment.view)
        .image_layout(image_layout_to_vk(attachment.layout))
        .load_op(load_op_to_vk(attachment.load_op))
        .store_op(store_op_to_vk(attachment.store_op))
        .clear_value(clear_value_to_vk(&attachment.clear_value))
}

pub(crate) fn load_op_to_vk(op: AttachmentLoadOp) -> vk::AttachmentLoadOp {
    match op {
        AttachmentLoadOp::Load => vk::AttachmentLoadOp::LOAD,
        AttachmentLoadOp::Clear => vk::AttachmentLoadOp::CLEAR,
        AttachmentLoadOp::DontCare => vk::AttachmentLoadOp::DONT_CARE,
    }
}

pub(crate) fn store_op_to_vk(op: AttachmentStoreOp) -> vk::AttachmentStoreOp {
    match op {
        AttachmentStoreOp::Store => vk::AttachmentStoreOp::STORE,
        AttachmentStoreOp::DontCare => vk::AttachmentStoreOp::DONT_CARE,
    }
}

pub(crate) fn index_type_to_vk(index_type: IndexType) -> vk::IndexType {
    match index_type {
        IndexType::U16 => vk::IndexType::UINT16,
        IndexType::U32 => vk::IndexType::UINT32,
    }
}

pub(crate) fn filter_to_vk(filter: Filter) -> vk::Filter {
    match filter {
        Filter::Nearest => vk::Filter::NEAREST,
        Filter::Linear => vk::Filter::LINEAR,
    }
}

pub(crate) fn descriptor_type_to_vk(ty: DescriptorType) -> vk::DescriptorType {
    match ty {
        DescriptorType::Sampler => vk::DescriptorType::SAMPLER,
        DescriptorType::CombinedImageSampler => vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
        DescriptorType::SampledImage => vk::DescriptorType::SAMPLED_IMAGE,
        DescriptorType::StorageImage => vk::DescriptorType::STORAGE_IMAGE,
        DescriptorType::UniformTexelBuffer => vk::DescriptorType::UNIFORM_TEXEL_BUFFER,
        DescriptorType::StorageTexelBuffer => vk::DescriptorType::STORAGE_TEXEL_BUFFER,
        DescriptorType::UniformBuffer => vk::DescriptorType::UNIFORM_BUFFER,
        DescriptorType::StorageBuffer => vk::DescriptorType::STORAGE_BUFFER,
        DescriptorType::UniformBufferDynamic => vk::DescriptorType::UNIFORM_BUFFER_DYNAMIC,
        DescriptorType::StorageBufferDynamic => vk::DescriptorType::STORAGE_BUFFER_DYNAMIC,
        DescriptorType::InputAttachment => vk::DescriptorType::INPUT_ATTACHMENT,
        DescriptorType::AccelerationStructure => vk::DescriptorType::ACCELERATION_STRUCTURE_KHR,
    }
}

pub(crate) fn pipeline_bind_point_to_vk(bind_point: PipelineBindPoint) -> vk::PipelineBindPoint {
    match bind_point {
        PipelineBindPoint::Graphics => vk::PipelineBindPoint::GRAPHICS,
        PipelineBindPoint::Compute => vk::PipelineBindPoint::COMPUTE,
    }
}

pub(crate) fn topology_to_vk(topology: PrimitiveTopology) -> vk::PrimitiveTopology {
    match topology {
        PrimitiveTopology::PointList => vk::PrimitiveTopology::POINT_LIST,
        PrimitiveTopology::LineList => vk::PrimitiveTopology::LINE_LIST,
        PrimitiveTopology::LineStrip => vk::PrimitiveTopology::LINE_STRIP,
        PrimitiveTopology::TriangleList => vk::PrimitiveTopology::TRIANGLE_LIST,
        PrimitiveTopology::TriangleStrip => vk::PrimitiveTopology::TRIANGLE_STRIP,
    }
}

pub(crate) fn cull_mode_to_vk(mode: CullMode) -> vk::CullModeFlags {
    match mode {
        CullMode::None => vk::CullModeFlags::NONE,
        CullMode::Front => vk::CullModeFlags::FRONT,
        CullMode::Back => vk::CullModeFlags::BACK,
    }
}

/// Image type and default view type for an image of `kind` with `array_layers`
pub(crate) fn image_kind_to_vk(kind: ImageKind, array_layers: u32) -> (vk::ImageType, vk::ImageViewType) {
    match kind {
        ImageKind::D1 if array_layers > 1 => (vk::ImageType::TYPE_1D, vk::ImageViewType::TYPE_1D_ARRAY),
        ImageKind::D1 => (vk::ImageType::TYPE_1D, vk::ImageViewType::TYPE_1D),
        ImageKind::D2 if array_layers > 1 => (vk::ImageType::TYPE_2D, vk::ImageViewType::TYPE_2D_ARRAY),
        ImageKind::D2 => (vk::ImageType::TYPE_2D, vk::ImageViewType::TYPE_2D),
        ImageKind::D3 => (vk::ImageType::TYPE_3D, vk::ImageViewType::TYPE_3D),
        ImageKind::Cube if array_layers > 6 => (vk::ImageType::TYPE_2D, vk::ImageViewType::CUBE_ARRAY),
        ImageKind::Cube => (vk::ImageType::TYPE_2D, vk::ImageViewType::CUBE),
    }
}

/// Memory location gpu-allocator should place a buffer of `domain` in
pub(crate) fn buffer_domain_to_location(domain: BufferDomain) -> MemoryLocation {
    match domain {
        BufferDomain::HostWriteCombined => MemoryLocation::CpuToGpu,
        BufferDomain::Device => MemoryLocation::GpuOnly,
        // CpuToGpu prefers device-local host-visible heaps (ReBAR) when present
        BufferDomain::DeviceHostVisible => MemoryLocation::CpuToGpu,
    }
}

#[cfg(test)]
#[path = "vulkan_conversions_tests.rs"]
mod tests;
