/// Descriptor types: pool capacity entries, set layout bindings and writes

use crate::graphics_device::pipeline::ShaderStages;
use crate::graphics_device::sync::ImageLayout;

/// Kind of resource a descriptor binds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DescriptorType {
    Sampler,
    CombinedImageSampler,
    SampledImage,
    StorageImage,
    UniformTexelBuffer,
    StorageTexelBuffer,
    UniformBuffer,
    StorageBuffer,
    UniformBufferDynamic,
    StorageBufferDynamic,
    InputAttachment,
    AccelerationStructure,
}

/// Number of descriptors of one kind a pool can hold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DescriptorPoolSize {
    pub ty: DescriptorType,
    pub count: u32,
}

impl DescriptorPoolSize {
    pub const fn new(ty: DescriptorType, count: u32) -> Self {
        Self { ty, count }
    }
}

/// One binding of a descriptor set layout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DescriptorSetLayoutBinding {
    pub binding: u32,
    pub ty: DescriptorType,
    pub count: u32,
    pub stages: ShaderStages,
}

/// Buffer range bound to a buffer descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DescriptorBufferInfo<B> {
    pub buffer: B,
    pub offset: u64,
    pub range: u64,
}

/// Image view bound to an image descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DescriptorImageInfo<V> {
    pub view: V,
    pub layout: ImageLayout,
}

/// Resources written into consecutive array elements of one binding
#[derive(Debug, Clone, Copy)]
pub enum DescriptorResources<'a, B, V> {
    Buffers(&'a [DescriptorBufferInfo<B>]),
    Images(&'a [DescriptorImageInfo<V>]),
}

impl<B, V> DescriptorResources<'_, B, V> {
    pub fn len(&self) -> usize {
        match self {
            DescriptorResources::Buffers(infos) => infos.len(),
            DescriptorResources::Images(infos) => infos.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Write of one binding of one descriptor set
#[derive(Debug, Clone, Copy)]
pub struct DescriptorWrite<'a, S, B, V> {
    pub set: S,
    pub binding: u32,
    pub array_element: u32,
    pub ty: DescriptorType,
    pub resources: DescriptorResources<'a, B, V>,
}
