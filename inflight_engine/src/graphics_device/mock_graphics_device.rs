/// Mock GraphicsDevice for unit tests (no GPU required)
///
/// Every object is a `u64` handle tracked in a live-object table. Handles are
/// never reused, so a destroyed handle stays dead for the rest of the test.
/// Commands execute at record time: buffer copies move bytes immediately and
/// a submit with a fence signals it right away unless completion is deferred.

use std::ptr::NonNull;
use std::sync::{Mutex, MutexGuard};
use rustc_hash::FxHashMap;

use crate::error::{Error, Result};
use crate::graphics_device::{
    GraphicsDevice, QueueType, CommandPoolFlags, CommandPoolResetFlags, BufferCopy, BufferImageCopy,
    ImageCopy, ImageBlit, Filter, AllocatedBuffer, AllocatedImage, BufferDesc, ImageDesc, ImageLayout,
    ImageSubresourceRange, RenderingInfo, Viewport, Rect2D, IndexType, ClearValue,
    DescriptorPoolSize, DescriptorSetLayoutBinding, DescriptorWrite, DescriptorType,
    PipelineLayoutDesc, ComputePipelineDesc, GraphicsPipelineDesc, PipelineBindPoint, ShaderStages,
    DependencyFlags, MemoryBarrier, BufferBarrier, ImageBarrier, Submit,
};

// ============================================================================
// Recorded state
// ============================================================================

/// Kind of a live mock object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockKind {
    CommandPool,
    CommandBuffer,
    DescriptorPool,
    DescriptorSet,
    DescriptorSetLayout,
    Buffer,
    Memory,
    Image,
    ImageView,
    ShaderModule,
    PipelineLayout,
    Pipeline,
    Semaphore,
    Fence,
}

/// Calls worth asserting on
#[derive(Debug, Clone, PartialEq)]
pub enum MockCall {
    CreateCommandPool { pool: u64, queue_family_index: u32, flags: CommandPoolFlags },
    AllocateCommandBuffer { pool: u64, command_buffer: u64 },
    ResetCommandPool { pool: u64 },
    BeginCommandBuffer { command_buffer: u64 },
    EndCommandBuffer { command_buffer: u64 },
    PipelineBarrier {
        command_buffer: u64,
        dependency_flags: DependencyFlags,
        memory: Vec<MemoryBarrier>,
        buffer: Vec<BufferBarrier<u64>>,
        image: Vec<ImageBarrier<u64>>,
    },
    CopyBuffer { command_buffer: u64, src: u64, dst: u64, regions: Vec<BufferCopy> },
    CopyBufferToImage { command_buffer: u64, src: u64, dst: u64, regions: Vec<BufferImageCopy> },
    CopyImageToBuffer { command_buffer: u64, src: u64, src_layout: ImageLayout, dst: u64, regions: Vec<BufferImageCopy> },
    CopyImage {
        command_buffer: u64,
        src: u64,
        src_layout: ImageLayout,
        dst: u64,
        dst_layout: ImageLayout,
        regions: Vec<ImageCopy>,
    },
    BlitImage { command_buffer: u64, src: u64, dst: u64, regions: Vec<ImageBlit>, filter: Filter },
    ClearImage {
        command_buffer: u64,
        image: u64,
        layout: ImageLayout,
        value: ClearValue,
        ranges: Vec<ImageSubresourceRange>,
    },
    BindPipeline { command_buffer: u64, bind_point: PipelineBindPoint, pipeline: u64 },
    BindDescriptorSets { command_buffer: u64, first_set: u32, sets: Vec<u64> },
    PushConstants { command_buffer: u64, offset: u32, data: Vec<u8> },
    Dispatch { command_buffer: u64, x: u32, y: u32, z: u32 },
    DispatchBase { command_buffer: u64, base: [u32; 3], groups: [u32; 3] },
    DispatchIndirect { command_buffer: u64, buffer: u64, offset: u64 },
    BeginRendering {
        command_buffer: u64,
        render_area: Rect2D,
        layer_count: u32,
        color_views: Vec<u64>,
        depth_view: Option<u64>,
        stencil_view: Option<u64>,
    },
    EndRendering { command_buffer: u64 },
    SetViewport { command_buffer: u64, viewport: Viewport },
    SetScissor { command_buffer: u64, scissor: Rect2D },
    BindVertexBuffers { command_buffer: u64, first_binding: u32, buffers: Vec<u64>, offsets: Vec<u64> },
    BindIndexBuffer { command_buffer: u64, buffer: u64, offset: u64, index_type: IndexType },
    Draw { command_buffer: u64, vertex_count: u32, instance_count: u32, first_vertex: u32, first_instance: u32 },
    DrawIndexed {
        command_buffer: u64,
        index_count: u32,
        instance_count: u32,
        first_index: u32,
        vertex_offset: i32,
        first_instance: u32,
    },
    DrawIndirect { command_buffer: u64, buffer: u64, offset: u64, draw_count: u32, stride: u32, indexed: bool },
    DrawIndirectCount {
        command_buffer: u64,
        buffer: u64,
        offset: u64,
        count_buffer: u64,
        count_offset: u64,
        max_draw_count: u32,
        stride: u32,
        indexed: bool,
    },
    CreateDescriptorPool { pool: u64, max_sets: u32 },
    ResetDescriptorPool { pool: u64 },
    UpdateDescriptorSets { writes: usize },
    Submit {
        queue: QueueType,
        wait_semaphores: Vec<u64>,
        command_buffers: Vec<u64>,
        signal_semaphores: Vec<u64>,
        fence: Option<u64>,
    },
    WaitForFence { fence: u64 },
    ResetFence { fence: u64 },
    Destroy { kind: MockKind, handle: u64 },
    WaitIdle,
}

enum MockObject {
    CommandPool { queue_family_index: u32 },
    CommandBuffer { pool: u64 },
    DescriptorPool { sizes: Vec<DescriptorPoolSize>, max_sets: u32, used: FxHashMap<DescriptorType, u32>, sets: u32 },
    DescriptorSet { pool: u64 },
    DescriptorSetLayout { bindings: Vec<DescriptorSetLayoutBinding> },
    Buffer { bytes: Box<[u8]> },
    Memory,
    Image,
    ImageView,
    ShaderModule,
    PipelineLayout,
    Pipeline,
    Semaphore,
    Fence { signaled: bool },
}

impl MockObject {
    fn kind(&self) -> MockKind {
        match self {
            MockObject::CommandPool { .. } => MockKind::CommandPool,
            MockObject::CommandBuffer { .. } => MockKind::CommandBuffer,
            MockObject::DescriptorPool { .. } => MockKind::DescriptorPool,
            MockObject::DescriptorSet { .. } => MockKind::DescriptorSet,
            MockObject::DescriptorSetLayout { .. } => MockKind::DescriptorSetLayout,
            MockObject::Buffer { .. } => MockKind::Buffer,
            MockObject::Memory => MockKind::Memory,
            MockObject::Image => MockKind::Image,
            MockObject::ImageView => MockKind::ImageView,
            MockObject::ShaderModule => MockKind::ShaderModule,
            MockObject::PipelineLayout => MockKind::PipelineLayout,
            MockObject::Pipeline => MockKind::Pipeline,
            MockObject::Semaphore => MockKind::Semaphore,
            MockObject::Fence { .. } => MockKind::Fence,
        }
    }
}

struct MockState {
    next_handle: u64,
    objects: FxHashMap<u64, MockObject>,
    calls: Vec<MockCall>,
    complete_on_submit: bool,
    pending_fences: Vec<u64>,
    fail_fence_waits: bool,
    descriptor_failures: Vec<Error>,
    command_pool_reset_failures: Vec<Error>,
    descriptor_pool_reset_failures: Vec<Error>,
}

impl MockState {
    fn insert(&mut self, object: MockObject) -> u64 {
        self.next_handle += 1;
        let handle = self.next_handle;
        self.objects.insert(handle, object);
        handle
    }

    fn remove(&mut self, handle: u64, kind: MockKind) {
        let object = self.objects.remove(&handle);
        assert!(
            matches!(&object, Some(o) if o.kind() == kind),
            "destroying {:?} {} which is not alive",
            kind,
            handle
        );
        self.calls.push(MockCall::Destroy { kind, handle });
    }

    fn remove_children(&mut self, parent: u64) {
        self.objects.retain(|_, object| match object {
            MockObject::CommandBuffer { pool } => *pool != parent,
            MockObject::DescriptorSet { pool } => *pool != parent,
            _ => true,
        });
    }

    fn bytes_mut(&mut self, buffer: u64) -> &mut Box<[u8]> {
        match self.objects.get_mut(&buffer) {
            Some(MockObject::Buffer { bytes }) => bytes,
            _ => panic!("buffer {} is not alive", buffer),
        }
    }
}

// ============================================================================
// Mock device
// ============================================================================

/// In-process GraphicsDevice with inspection helpers
pub struct MockGraphicsDevice {
    state: Mutex<MockState>,
    graphics_family: u32,
    compute_family: u32,
    transfer_family: u32,
}

impl MockGraphicsDevice {
    /// Device with distinct graphics (0), compute (1) and transfer (2) families
    pub fn new() -> Self {
        Self::with_queue_families(0, 1, 2)
    }

    pub fn with_queue_families(graphics: u32, compute: u32, transfer: u32) -> Self {
        Self {
            state: Mutex::new(MockState {
                next_handle: 0,
                objects: FxHashMap::default(),
                calls: Vec::new(),
                complete_on_submit: true,
                pending_fences: Vec::new(),
                fail_fence_waits: false,
                descriptor_failures: Vec::new(),
                command_pool_reset_failures: Vec::new(),
                descriptor_pool_reset_failures: Vec::new(),
            }),
            graphics_family: graphics,
            compute_family: compute,
            transfer_family: transfer,
        }
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap()
    }

    // ===== INSPECTION =====

    pub fn is_alive(&self, handle: u64) -> bool {
        self.state().objects.contains_key(&handle)
    }

    pub fn live_count(&self, kind: MockKind) -> usize {
        self.state().objects.values().filter(|o| o.kind() == kind).count()
    }

    pub fn calls(&self) -> Vec<MockCall> {
        self.state().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state().calls.clear();
    }

    /// Handles destroyed so far, in destruction order
    pub fn destroyed(&self, kind: MockKind) -> Vec<u64> {
        self.state()
            .calls
            .iter()
            .filter_map(|call| match call {
                MockCall::Destroy { kind: k, handle } if *k == kind => Some(*handle),
                _ => None,
            })
            .collect()
    }

    pub fn command_buffers_in(&self, pool: u64) -> usize {
        self.state()
            .objects
            .values()
            .filter(|o| matches!(o, MockObject::CommandBuffer { pool: p } if *p == pool))
            .count()
    }

    pub fn command_pool_family(&self, pool: u64) -> Option<u32> {
        match self.state().objects.get(&pool) {
            Some(MockObject::CommandPool { queue_family_index }) => Some(*queue_family_index),
            _ => None,
        }
    }

    pub fn descriptor_sets_in(&self, pool: u64) -> u32 {
        match self.state().objects.get(&pool) {
            Some(MockObject::DescriptorPool { sets, .. }) => *sets,
            _ => 0,
        }
    }

    pub fn buffer_bytes(&self, buffer: u64) -> Vec<u8> {
        self.state().bytes_mut(buffer).to_vec()
    }

    pub fn fence_signaled(&self, fence: u64) -> bool {
        matches!(self.state().objects.get(&fence), Some(MockObject::Fence { signaled: true }))
    }

    // ===== BEHAVIOUR KNOBS =====

    /// When false, submitted fences stay unsignaled until [`Self::complete_submissions`]
    pub fn set_complete_on_submit(&self, complete: bool) {
        self.state().complete_on_submit = complete;
    }

    /// Signal every fence submitted while completion was deferred
    pub fn complete_submissions(&self) {
        let mut state = self.state();
        let pending = std::mem::take(&mut state.pending_fences);
        for fence in pending {
            if let Some(MockObject::Fence { signaled }) = state.objects.get_mut(&fence) {
                *signaled = true;
            }
        }
    }

    pub fn set_fence_waits_fail(&self, fail: bool) {
        self.state().fail_fence_waits = fail;
    }

    /// Errors returned, in order, by the next descriptor set allocations
    pub fn inject_descriptor_failures(&self, errors: Vec<Error>) {
        self.state().descriptor_failures = errors;
    }

    /// Errors returned, in order, by the next command pool resets
    pub fn inject_command_pool_reset_failures(&self, errors: Vec<Error>) {
        self.state().command_pool_reset_failures = errors;
    }

    /// Errors returned, in order, by the next descriptor pool resets
    pub fn inject_descriptor_pool_reset_failures(&self, errors: Vec<Error>) {
        self.state().descriptor_pool_reset_failures = errors;
    }
}

impl GraphicsDevice for MockGraphicsDevice {
    type CommandPool = u64;
    type CommandBuffer = u64;
    type DescriptorPool = u64;
    type DescriptorSet = u64;
    type DescriptorSetLayout = u64;
    type Buffer = u64;
    type Image = u64;
    type ImageView = u64;
    type Memory = u64;
    type ShaderModule = u64;
    type PipelineLayout = u64;
    type Pipeline = u64;
    type Semaphore = u64;
    type Fence = u64;

    fn queue_family_index(&self, queue: QueueType) -> u32 {
        match queue {
            QueueType::Graphics => self.graphics_family,
            QueueType::Compute => self.compute_family,
            QueueType::Transfer => self.transfer_family,
        }
    }

    fn queue_submit(&self, queue: QueueType, submit: &Submit<'_, u64, u64>, fence: Option<u64>) -> Result<()> {
        let mut state = self.state();
        state.calls.push(MockCall::Submit {
            queue,
            wait_semaphores: submit.wait_semaphores.iter().map(|s| s.semaphore).collect(),
            command_buffers: submit.command_buffers.to_vec(),
            signal_semaphores: submit.signal_semaphores.iter().map(|s| s.semaphore).collect(),
            fence,
        });
        if let Some(fence) = fence {
            if state.complete_on_submit {
                if let Some(MockObject::Fence { signaled }) = state.objects.get_mut(&fence) {
                    *signaled = true;
                }
            } else {
                state.pending_fences.push(fence);
            }
        }
        Ok(())
    }

    fn wait_idle(&self) -> Result<()> {
        self.state().calls.push(MockCall::WaitIdle);
        self.complete_submissions();
        Ok(())
    }

    fn create_command_pool(&self, queue_family_index: u32, flags: CommandPoolFlags) -> Result<u64> {
        let mut state = self.state();
        let pool = state.insert(MockObject::CommandPool { queue_family_index });
        state.calls.push(MockCall::CreateCommandPool { pool, queue_family_index, flags });
        Ok(pool)
    }

    fn destroy_command_pool(&self, pool: u64) {
        let mut state = self.state();
        state.remove_children(pool);
        state.remove(pool, MockKind::CommandPool);
    }

    fn reset_command_pool(&self, pool: u64, _flags: CommandPoolResetFlags) -> Result<()> {
        let mut state = self.state();
        if !state.command_pool_reset_failures.is_empty() {
            return Err(state.command_pool_reset_failures.remove(0));
        }
        state.calls.push(MockCall::ResetCommandPool { pool });
        Ok(())
    }

    fn allocate_command_buffer(&self, pool: u64) -> Result<u64> {
        let mut state = self.state();
        let command_buffer = state.insert(MockObject::CommandBuffer { pool });
        state.calls.push(MockCall::AllocateCommandBuffer { pool, command_buffer });
        Ok(command_buffer)
    }

    fn begin_command_buffer(&self, command_buffer: u64) -> Result<()> {
        self.state().calls.push(MockCall::BeginCommandBuffer { command_buffer });
        Ok(())
    }

    fn end_command_buffer(&self, command_buffer: u64) -> Result<()> {
        self.state().calls.push(MockCall::EndCommandBuffer { command_buffer });
        Ok(())
    }

    fn cmd_pipeline_barrier(
        &self,
        command_buffer: u64,
        dependency_flags: DependencyFlags,
        memory_barriers: &[MemoryBarrier],
        buffer_barriers: &[BufferBarrier<u64>],
        image_barriers: &[ImageBarrier<u64>],
    ) {
        self.state().calls.push(MockCall::PipelineBarrier {
            command_buffer,
            dependency_flags,
            memory: memory_barriers.to_vec(),
            buffer: buffer_barriers.to_vec(),
            image: image_barriers.to_vec(),
        });
    }

    fn cmd_copy_buffer(&self, command_buffer: u64, src: u64, dst: u64, regions: &[BufferCopy]) {
        let mut state = self.state();
        for region in regions {
            let src_range = region.src_offset as usize..(region.src_offset + region.size) as usize;
            let data = state.bytes_mut(src)[src_range].to_vec();
            let dst_range = region.dst_offset as usize..(region.dst_offset + region.size) as usize;
            state.bytes_mut(dst)[dst_range].copy_from_slice(&data);
        }
        state.calls.push(MockCall::CopyBuffer { command_buffer, src, dst, regions: regions.to_vec() });
    }

    fn cmd_copy_buffer_to_image(
        &self,
        command_buffer: u64,
        src: u64,
        dst: u64,
        _dst_layout: ImageLayout,
        regions: &[BufferImageCopy],
    ) {
        self.state().calls.push(MockCall::CopyBufferToImage { command_buffer, src, dst, regions: regions.to_vec() });
    }

    fn cmd_copy_image_to_buffer(
        &self,
        command_buffer: u64,
        src: u64,
        src_layout: ImageLayout,
        dst: u64,
        regions: &[BufferImageCopy],
    ) {
        self.state().calls.push(MockCall::CopyImageToBuffer {
            command_buffer,
            src,
            src_layout,
            dst,
            regions: regions.to_vec(),
        });
    }

    fn cmd_copy_image(
        &self,
        command_buffer: u64,
        src: u64,
        src_layout: ImageLayout,
        dst: u64,
        dst_layout: ImageLayout,
        regions: &[ImageCopy],
    ) {
        self.state().calls.push(MockCall::CopyImage {
            command_buffer,
            src,
            src_layout,
            dst,
            dst_layout,
            regions: regions.to_vec(),
        });
    }

    fn cmd_blit_image(
        &self,
        command_buffer: u64,
        src: u64,
        _src_layout: ImageLayout,
        dst: u64,
        _dst_layout: ImageLayout,
        regions: &[ImageBlit],
        filter: Filter,
    ) {
        self.state().calls.push(MockCall::BlitImage { command_buffer, src, dst, regions: regions.to_vec(), filter });
    }

    fn cmd_clear_image(
        &self,
        command_buffer: u64,
        image: u64,
        layout: ImageLayout,
        value: &ClearValue,
        ranges: &[ImageSubresourceRange],
    ) {
        self.state().calls.push(MockCall::ClearImage {
            command_buffer,
            image,
            layout,
            value: *value,
            ranges: ranges.to_vec(),
        });
    }

    fn cmd_bind_pipeline(&self, command_buffer: u64, bind_point: PipelineBindPoint, pipeline: u64) {
        self.state().calls.push(MockCall::BindPipeline { command_buffer, bind_point, pipeline });
    }

    fn cmd_bind_descriptor_sets(
        &self,
        command_buffer: u64,
        _bind_point: PipelineBindPoint,
        _layout: u64,
        first_set: u32,
        sets: &[u64],
    ) {
        self.state().calls.push(MockCall::BindDescriptorSets { command_buffer, first_set, sets: sets.to_vec() });
    }

    fn cmd_push_constants(&self, command_buffer: u64, _layout: u64, _stages: ShaderStages, offset: u32, data: &[u8]) {
        self.state().calls.push(MockCall::PushConstants { command_buffer, offset, data: data.to_vec() });
    }

    fn cmd_dispatch(&self, command_buffer: u64, x: u32, y: u32, z: u32) {
        self.state().calls.push(MockCall::Dispatch { command_buffer, x, y, z });
    }

    fn cmd_dispatch_base(&self, command_buffer: u64, base: [u32; 3], groups: [u32; 3]) {
        self.state().calls.push(MockCall::DispatchBase { command_buffer, base, groups });
    }

    fn cmd_dispatch_indirect(&self, command_buffer: u64, buffer: u64, offset: u64) {
        self.state().calls.push(MockCall::DispatchIndirect { command_buffer, buffer, offset });
    }

    fn cmd_begin_rendering(&self, command_buffer: u64, info: &RenderingInfo<'_, u64>) {
        self.state().calls.push(MockCall::BeginRendering {
            command_buffer,
            render_area: info.render_area,
            layer_count: info.layer_count,
            color_views: info.color_attachments.iter().map(|a| a.view).collect(),
            depth_view: info.depth_attachment.map(|a| a.view),
            stencil_view: info.stencil_attachment.map(|a| a.view),
        });
    }

    fn cmd_end_rendering(&self, command_buffer: u64) {
        self.state().calls.push(MockCall::EndRendering { command_buffer });
    }

    fn cmd_set_viewport(&self, command_buffer: u64, viewport: &Viewport) {
        self.state().calls.push(MockCall::SetViewport { command_buffer, viewport: *viewport });
    }

    fn cmd_set_scissor(&self, command_buffer: u64, scissor: &Rect2D) {
        self.state().calls.push(MockCall::SetScissor { command_buffer, scissor: *scissor });
    }

    fn cmd_bind_vertex_buffers(&self, command_buffer: u64, first_binding: u32, buffers: &[u64], offsets: &[u64]) {
        assert_eq!(buffers.len(), offsets.len(), "one offset per vertex buffer");
        self.state().calls.push(MockCall::BindVertexBuffers {
            command_buffer,
            first_binding,
            buffers: buffers.to_vec(),
            offsets: offsets.to_vec(),
        });
    }

    fn cmd_bind_index_buffer(&self, command_buffer: u64, buffer: u64, offset: u64, index_type: IndexType) {
        self.state().calls.push(MockCall::BindIndexBuffer { command_buffer, buffer, offset, index_type });
    }

    fn cmd_draw(&self, command_buffer: u64, vertex_count: u32, instance_count: u32, first_vertex: u32, first_instance: u32) {
        self.state().calls.push(MockCall::Draw { command_buffer, vertex_count, instance_count, first_vertex, first_instance });
    }

    fn cmd_draw_indexed(
        &self,
        command_buffer: u64,
        index_count: u32,
        instance_count: u32,
        first_index: u32,
        vertex_offset: i32,
        first_instance: u32,
    ) {
        self.state().calls.push(MockCall::DrawIndexed {
            command_buffer,
            index_count,
            instance_count,
            first_index,
            vertex_offset,
            first_instance,
        });
    }

    fn cmd_draw_indirect(&self, command_buffer: u64, buffer: u64, offset: u64, draw_count: u32, stride: u32) {
        self.state().calls.push(MockCall::DrawIndirect { command_buffer, buffer, offset, draw_count, stride, indexed: false });
    }

    fn cmd_draw_indexed_indirect(&self, command_buffer: u64, buffer: u64, offset: u64, draw_count: u32, stride: u32) {
        self.state().calls.push(MockCall::DrawIndirect { command_buffer, buffer, offset, draw_count, stride, indexed: true });
    }

    fn cmd_draw_indirect_count(
        &self,
        command_buffer: u64,
        buffer: u64,
        offset: u64,
        count_buffer: u64,
        count_offset: u64,
        max_draw_count: u32,
        stride: u32,
    ) {
        self.state().calls.push(MockCall::DrawIndirectCount {
            command_buffer,
            buffer,
            offset,
            count_buffer,
            count_offset,
            max_draw_count,
            stride,
            indexed: false,
        });
    }

    fn cmd_draw_indexed_indirect_count(
        &self,
        command_buffer: u64,
        buffer: u64,
        offset: u64,
        count_buffer: u64,
        count_offset: u64,
        max_draw_count: u32,
        stride: u32,
    ) {
        self.state().calls.push(MockCall::DrawIndirectCount {
            command_buffer,
            buffer,
            offset,
            count_buffer,
            count_offset,
            max_draw_count,
            stride,
            indexed: true,
        });
    }

    fn create_descriptor_pool(&self, sizes: &[DescriptorPoolSize], max_sets: u32) -> Result<u64> {
        let mut state = self.state();
        let pool = state.insert(MockObject::DescriptorPool {
            sizes: sizes.to_vec(),
            max_sets,
            used: FxHashMap::default(),
            sets: 0,
        });
        state.calls.push(MockCall::CreateDescriptorPool { pool, max_sets });
        Ok(pool)
    }

    fn destroy_descriptor_pool(&self, pool: u64) {
        let mut state = self.state();
        state.remove_children(pool);
        state.remove(pool, MockKind::DescriptorPool);
    }

    fn allocate_descriptor_set(&self, pool: u64, layout: u64) -> Result<u64> {
        let mut state = self.state();
        if !state.descriptor_failures.is_empty() {
            return Err(state.descriptor_failures.remove(0));
        }

        let bindings = match state.objects.get(&layout) {
            Some(MockObject::DescriptorSetLayout { bindings }) => bindings.clone(),
            _ => panic!("descriptor set layout {} is not alive", layout),
        };

        match state.objects.get_mut(&pool) {
            Some(MockObject::DescriptorPool { sizes, max_sets, used, sets }) => {
                if *sets >= *max_sets {
                    return Err(Error::OutOfPoolMemory);
                }
                for binding in &bindings {
                    let capacity: u32 = sizes.iter().filter(|s| s.ty == binding.ty).map(|s| s.count).sum();
                    let in_use = used.get(&binding.ty).copied().unwrap_or(0);
                    if in_use + binding.count > capacity {
                        return Err(Error::OutOfPoolMemory);
                    }
                }
                for binding in &bindings {
                    *used.entry(binding.ty).or_insert(0) += binding.count;
                }
                *sets += 1;
            }
            _ => panic!("descriptor pool {} is not alive", pool),
        }

        Ok(state.insert(MockObject::DescriptorSet { pool }))
    }

    fn reset_descriptor_pool(&self, pool: u64) -> Result<()> {
        let mut state = self.state();
        if !state.descriptor_pool_reset_failures.is_empty() {
            return Err(state.descriptor_pool_reset_failures.remove(0));
        }
        state.remove_children(pool);
        if let Some(MockObject::DescriptorPool { used, sets, .. }) = state.objects.get_mut(&pool) {
            used.clear();
            *sets = 0;
        }
        state.calls.push(MockCall::ResetDescriptorPool { pool });
        Ok(())
    }

    fn create_descriptor_set_layout(&self, bindings: &[DescriptorSetLayoutBinding]) -> Result<u64> {
        Ok(self.state().insert(MockObject::DescriptorSetLayout { bindings: bindings.to_vec() }))
    }

    fn destroy_descriptor_set_layout(&self, layout: u64) {
        self.state().remove(layout, MockKind::DescriptorSetLayout);
    }

    fn update_descriptor_sets(&self, writes: &[DescriptorWrite<'_, u64, u64, u64>]) {
        self.state().calls.push(MockCall::UpdateDescriptorSets { writes: writes.len() });
    }

    fn create_buffer(&self, desc: &BufferDesc, _queue_family_index: u32) -> Result<AllocatedBuffer<u64, u64>> {
        if desc.size == 0 {
            return Err(Error::InvalidResource("zero-sized buffer".to_string()));
        }
        let mut state = self.state();
        let mut bytes = vec![0u8; desc.size as usize].into_boxed_slice();
        let mapped = if desc.domain.is_host_visible() {
            NonNull::new(bytes.as_mut_ptr())
        } else {
            None
        };
        let buffer = state.insert(MockObject::Buffer { bytes });
        let memory = state.insert(MockObject::Memory);
        Ok(AllocatedBuffer { buffer, memory, size: desc.size, mapped })
    }

    fn destroy_buffer(&self, buffer: &AllocatedBuffer<u64, u64>) {
        let mut state = self.state();
        state.remove(buffer.buffer, MockKind::Buffer);
        state.remove(buffer.memory, MockKind::Memory);
    }

    fn create_image(&self, _desc: &ImageDesc, _queue_family_index: u32) -> Result<AllocatedImage<u64, u64, u64>> {
        let mut state = self.state();
        let image = state.insert(MockObject::Image);
        let view = state.insert(MockObject::ImageView);
        let memory = state.insert(MockObject::Memory);
        Ok(AllocatedImage { image, view, memory })
    }

    fn destroy_image(&self, image: &AllocatedImage<u64, u64, u64>) {
        let mut state = self.state();
        state.remove(image.view, MockKind::ImageView);
        state.remove(image.image, MockKind::Image);
        state.remove(image.memory, MockKind::Memory);
    }

    fn create_shader_module(&self, spirv: &[u32]) -> Result<u64> {
        if spirv.is_empty() {
            return Err(Error::InvalidResource("empty SPIR-V".to_string()));
        }
        Ok(self.state().insert(MockObject::ShaderModule))
    }

    fn destroy_shader_module(&self, module: u64) {
        self.state().remove(module, MockKind::ShaderModule);
    }

    fn create_pipeline_layout(&self, _desc: &PipelineLayoutDesc<'_, u64>) -> Result<u64> {
        Ok(self.state().insert(MockObject::PipelineLayout))
    }

    fn destroy_pipeline_layout(&self, layout: u64) {
        self.state().remove(layout, MockKind::PipelineLayout);
    }

    fn create_compute_pipeline(&self, _desc: &ComputePipelineDesc<'_, u64, u64>) -> Result<u64> {
        Ok(self.state().insert(MockObject::Pipeline))
    }

    fn create_graphics_pipeline(&self, _desc: &GraphicsPipelineDesc<'_, u64, u64>) -> Result<u64> {
        Ok(self.state().insert(MockObject::Pipeline))
    }

    fn destroy_pipeline(&self, pipeline: u64) {
        self.state().remove(pipeline, MockKind::Pipeline);
    }

    fn create_semaphore(&self) -> Result<u64> {
        Ok(self.state().insert(MockObject::Semaphore))
    }

    fn destroy_semaphore(&self, semaphore: u64) {
        self.state().remove(semaphore, MockKind::Semaphore);
    }

    fn create_fence(&self, signaled: bool) -> Result<u64> {
        Ok(self.state().insert(MockObject::Fence { signaled }))
    }

    fn destroy_fence(&self, fence: u64) {
        self.state().remove(fence, MockKind::Fence);
    }

    fn wait_for_fence(&self, fence: u64, _timeout_ns: u64) -> Result<()> {
        let mut state = self.state();
        state.calls.push(MockCall::WaitForFence { fence });
        if state.fail_fence_waits {
            return Err(Error::DeviceLost(format!("wait on fence {} failed", fence)));
        }
        match state.objects.get(&fence) {
            Some(MockObject::Fence { signaled: true }) => Ok(()),
            Some(MockObject::Fence { signaled: false }) => {
                Err(Error::DeviceLost(format!("fence {} never signaled", fence)))
            }
            _ => panic!("fence {} is not alive", fence),
        }
    }

    fn reset_fence(&self, fence: u64) -> Result<()> {
        let mut state = self.state();
        state.calls.push(MockCall::ResetFence { fence });
        if let Some(MockObject::Fence { signaled }) = state.objects.get_mut(&fence) {
            *signaled = false;
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "mock_graphics_device_tests.rs"]
mod tests;
