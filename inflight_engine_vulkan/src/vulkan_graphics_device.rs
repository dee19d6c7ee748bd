/// GraphicsDevice implementation for VulkanGraphicsDevice
///
/// Every operation is a thin ash call. Recording uses synchronization2
/// barriers and submission, pipelines target dynamic rendering.

use ash::vk;
use std::ffi::CString;

use inflight_engine::inflight::{Error, GraphicsDevice, QueueType, Result};
use inflight_engine::inflight::render::{
    AllocatedBuffer, AllocatedImage, BufferBarrier, BufferCopy, BufferDesc, BufferImageCopy,
    ClearValue, CommandPoolFlags, CommandPoolResetFlags, ComputePipelineDesc, DependencyFlags,
    DescriptorPoolSize, DescriptorResources, DescriptorSetLayoutBinding, DescriptorWrite, Filter,
    GraphicsPipelineDesc, ImageBarrier, ImageBlit, ImageCopy, ImageDesc, ImageKind, ImageLayout,
    ImageSubresourceRange, IndexType, MemoryBarrier, PipelineBindPoint, PipelineLayoutDesc, Rect2D,
    RenderingInfo, SemaphoreSubmit, ShaderStages, Submit, Viewport,
};
use inflight_engine::{engine_err, engine_error, engine_trace, engine_warn};

use crate::vulkan_conversions::*;
use crate::vulkan_device::{VulkanGraphicsDevice, VulkanMemory};

/// Storage for the infos a `vk::WriteDescriptorSet` points at
enum DescriptorInfos {
    Buffers(Vec<vk::DescriptorBufferInfo>),
    Images(Vec<vk::DescriptorImageInfo>),
}

impl GraphicsDevice for VulkanGraphicsDevice {
    type CommandPool = vk::CommandPool;
    type CommandBuffer = vk::CommandBuffer;
    type DescriptorPool = vk::DescriptorPool;
    type DescriptorSet = vk::DescriptorSet;
    type DescriptorSetLayout = vk::DescriptorSetLayout;
    type Buffer = vk::Buffer;
    type Image = vk::Image;
    type ImageView = vk::ImageView;
    type Memory = VulkanMemory;
    type ShaderModule = vk::ShaderModule;
    type PipelineLayout = vk::PipelineLayout;
    type Pipeline = vk::Pipeline;
    type Semaphore = vk::Semaphore;
    type Fence = vk::Fence;

    // ===== QUEUES =====

    fn queue_family_index(&self, queue: QueueType) -> u32 {
        self.queue_families.get(queue)
    }

    fn queue_submit(
        &self,
        queue: QueueType,
        submit: &Submit<'_, vk::Semaphore, vk::CommandBuffer>,
        fence: Option<vk::Fence>,
    ) -> Result<()> {
        let to_vk_semaphore = |op: &SemaphoreSubmit<vk::Semaphore>| {
            vk::SemaphoreSubmitInfo::default()
                .semaphore(op.semaphore)
                .value(op.value)
                .stage_mask(pipeline_stages_to_vk(op.stages))
        };
        let wait_infos: Vec<_> = submit.wait_semaphores.iter().map(to_vk_semaphore).collect();
        let signal_infos: Vec<_> = submit.signal_semaphores.iter().map(to_vk_semaphore).collect();
        let command_buffer_infos: Vec<_> = submit
            .command_buffers
            .iter()
            .map(|&cb| vk::CommandBufferSubmitInfo::default().command_buffer(cb))
            .collect();

        let submit_info = vk::SubmitInfo2::default()
            .wait_semaphore_infos(&wait_infos)
            .command_buffer_infos(&command_buffer_infos)
            .signal_semaphore_infos(&signal_infos);

        let _guard = self.lock_submit()?;
        unsafe {
            self.device
                .queue_submit2(self.queue(queue), &[submit_info], fence.unwrap_or(vk::Fence::null()))
                .map_err(|e| match e {
                    vk::Result::ERROR_DEVICE_LOST => {
                        engine_error!("inflight::vulkan", "Device lost during {:?} queue submit", queue);
                        Error::DeviceLost(format!("queue submit: {:?}", e))
                    }
                    _ => engine_err!("inflight::vulkan", "Failed to submit to {:?} queue: {:?}", queue, e),
                })
        }
    }

    fn wait_idle(&self) -> Result<()> {
        let _guard = self.lock_submit()?;
        unsafe {
            self.device
                .device_wait_idle()
                .map_err(|e| engine_err!("inflight::vulkan", "Failed to wait for device idle: {:?}", e))
        }
    }

    // ===== COMMAND POOLS & RECORDING =====

    fn create_command_pool(&self, queue_family_index: u32, flags: CommandPoolFlags) -> Result<vk::CommandPool> {
        let info = vk::CommandPoolCreateInfo::default()
            .queue_family_index(queue_family_index)
            .flags(command_pool_flags_to_vk(flags));
        unsafe {
            self.device
                .create_command_pool(&info, None)
                .map_err(|e| engine_err!("inflight::vulkan", "Failed to create command pool: {:?}", e))
        }
    }

    fn destroy_command_pool(&self, pool: vk::CommandPool) {
        unsafe { self.device.destroy_command_pool(pool, None) }
    }

    fn reset_command_pool(&self, pool: vk::CommandPool, flags: CommandPoolResetFlags) -> Result<()> {
        unsafe {
            self.device
                .reset_command_pool(pool, command_pool_reset_flags_to_vk(flags))
                .map_err(|e| engine_err!("inflight::vulkan", "Failed to reset command pool: {:?}", e))
        }
    }

    fn allocate_command_buffer(&self, pool: vk::CommandPool) -> Result<vk::CommandBuffer> {
        let info = vk::CommandBufferAllocateInfo::default()
            .command_pool(pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(1);
        let buffers = unsafe {
            self.device
                .allocate_command_buffers(&info)
                .map_err(|e| engine_err!("inflight::vulkan", "Failed to allocate command buffer: {:?}", e))?
        };
        buffers
            .into_iter()
            .next()
            .ok_or_else(|| Error::BackendError("driver returned no command buffer".to_string()))
    }

    fn begin_command_buffer(&self, command_buffer: vk::CommandBuffer) -> Result<()> {
        let info = vk::CommandBufferBeginInfo::default().flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
        unsafe {
            self.device
                .begin_command_buffer(command_buffer, &info)
                .map_err(|e| engine_err!("inflight::vulkan", "Failed to begin command buffer: {:?}", e))
        }
    }

    fn end_command_buffer(&self, command_buffer: vk::CommandBuffer) -> Result<()> {
        unsafe {
            self.device
                .end_command_buffer(command_buffer)
                .map_err(|e| engine_err!("inflight::vulkan", "Failed to end command buffer: {:?}", e))
        }
    }

    fn cmd_pipeline_barrier(
        &self,
        command_buffer: vk::CommandBuffer,
        dependency_flags: DependencyFlags,
        memory_barriers: &[MemoryBarrier],
        buffer_barriers: &[BufferBarrier<vk::Buffer>],
        image_barriers: &[ImageBarrier<vk::Image>],
    ) {
        let memory: Vec<vk::MemoryBarrier2> = memory_barriers
            .iter()
            .map(|b| {
                vk::MemoryBarrier2::default()
                    .src_stage_mask(pipeline_stages_to_vk(b.src_stages))
                    .src_access_mask(access_flags_to_vk(b.src_access))
                    .dst_stage_mask(pipeline_stages_to_vk(b.dst_stages))
                    .dst_access_mask(access_flags_to_vk(b.dst_access))
            })
            .collect();

        let buffers: Vec<vk::BufferMemoryBarrier2> = buffer_barriers
            .iter()
            .map(|b| {
                vk::BufferMemoryBarrier2::default()
                    .src_stage_mask(pipeline_stages_to_vk(b.src_stages))
                    .src_access_mask(access_flags_to_vk(b.src_access))
                    .dst_stage_mask(pipeline_stages_to_vk(b.dst_stages))
                    .dst_access_mask(access_flags_to_vk(b.dst_access))
                    .src_queue_family_index(b.src_queue_family)
                    .dst_queue_family_index(b.dst_queue_family)
                    .buffer(b.buffer)
                    .offset(b.offset)
                    .size(b.size)
            })
            .collect();

        let images: Vec<vk::ImageMemoryBarrier2> = image_barriers
            .iter()
            .map(|b| {
                vk::ImageMemoryBarrier2::default()
                    .src_stage_mask(pipeline_stages_to_vk(b.src_stages))
                    .src_access_mask(access_flags_to_vk(b.src_access))
                    .dst_stage_mask(pipeline_stages_to_vk(b.dst_stages))
                    .dst_access_mask(access_flags_to_vk(b.dst_access))
                    .old_layout(image_layout_to_vk(b.old_layout))
                    .new_layout(image_layout_to_vk(b.new_layout))
                    .src_queue_family_index(b.src_queue_family)
                    .dst_queue_family_index(b.dst_queue_family)
                    .image(b.image)
                    .subresource_range(subresource_range_to_vk(&b.range))
            })
            .collect();

        let dependency_info = vk::DependencyInfo::default()
            .dependency_flags(dependency_flags_to_vk(dependency_flags))
            .memory_barriers(&memory)
            .buffer_memory_barriers(&buffers)
            .image_memory_barriers(&images);

        unsafe { self.device.cmd_pipeline_barrier2(command_buffer, &dependency_info) }
    }

    fn cmd_copy_buffer(&self, command_buffer: vk::CommandBuffer, src: vk::Buffer, dst: vk::Buffer, regions: &[BufferCopy]) {
        let regions: Vec<vk::BufferCopy> = regions
            .iter()
            .map(|r| vk::BufferCopy::default().src_offset(r.src_offset).dst_offset(r.dst_offset).size(r.size))
            .collect();
        unsafe { self.device.cmd_copy_buffer(command_buffer, src, dst, &regions) }
    }

    fn cmd_copy_buffer_to_image(
        &self,
        command_buffer: vk::CommandBuffer,
        src: vk::Buffer,
        dst: vk::Image,
        dst_layout: ImageLayout,
        regions: &[BufferImageCopy],
    ) {
        let regions: Vec<vk::BufferImageCopy> = regions.iter().map(buffer_image_copy_to_vk).collect();
        unsafe {
            self.device
                .cmd_copy_buffer_to_image(command_buffer, src, dst, image_layout_to_vk(dst_layout), &regions)
        }
    }

    fn cmd_copy_image_to_buffer(
        &self,
        command_buffer: vk::CommandBuffer,
        src: vk::Image,
        src_layout: ImageLayout,
        dst: vk::Buffer,
        regions: &[BufferImageCopy],
    ) {
        let regions: Vec<vk::BufferImageCopy> = regions.iter().map(buffer_image_copy_to_vk).collect();
        unsafe {
            self.device
                .cmd_copy_image_to_buffer(command_buffer, src, image_layout_to_vk(src_layout), dst, &regions)
        }
    }

    fn cmd_copy_image(
        &self,
        command_buffer: vk::CommandBuffer,
        src: vk::Image,
        src_layout: ImageLayout,
        dst: vk::Image,
        dst_layout: ImageLayout,
        regions: &[ImageCopy],
    ) {
        let regions: Vec<vk::ImageCopy> = regions
            .iter()
            .map(|r| {
                vk::ImageCopy::default()
                    .src_subresource(subresource_layers_to_vk(&r.src_subresource))
                    .src_offset(offset_3d_to_vk(r.src_offset))
                    .dst_subresource(subresource_layers_to_vk(&r.dst_subresource))
                    .dst_offset(offset_3d_to_vk(r.dst_offset))
                    .extent(extent_3d_to_vk(r.extent))
            })
            .collect();
        unsafe {
            self.device.cmd_copy_image(
                command_buffer,
                src,
                image_layout_to_vk(src_layout),
                dst,
                image_layout_to_vk(dst_layout),
                &regions,
            )
        }
    }

    fn cmd_blit_image(
        &self,
        command_buffer: vk::CommandBuffer,
        src: vk::Image,
        src_layout: ImageLayout,
        dst: vk::Image,
        dst_layout: ImageLayout,
        regions: &[ImageBlit],
        filter: Filter,
    ) {
        let regions: Vec<vk::ImageBlit> = regions
            .iter()
            .map(|r| {
                vk::ImageBlit::default()
                    .src_subresource(subresource_layers_to_vk(&r.src_subresource))
                    .src_offsets([offset_3d_to_vk(r.src_offsets[0]), offset_3d_to_vk(r.src_offsets[1])])
                    .dst_subresource(subresource_layers_to_vk(&r.dst_subresource))
                    .dst_offsets([offset_3d_to_vk(r.dst_offsets[0]), offset_3d_to_vk(r.dst_offsets[1])])
            })
            .collect();
        unsafe {
            self.device.cmd_blit_image(
                command_buffer,
                src,
                image_layout_to_vk(src_layout),
                dst,
                image_layout_to_vk(dst_layout),
                &regions,
                filter_to_vk(filter),
            )
        }
    }

    fn cmd_clear_image(
        &self,
        command_buffer: vk::CommandBuffer,
        image: vk::Image,
        layout: ImageLayout,
        value: &ClearValue,
        ranges: &[ImageSubresourceRange],
    ) {
        let ranges: Vec<vk::ImageSubresourceRange> = ranges.iter().map(subresource_range_to_vk).collect();
        let layout = image_layout_to_vk(layout);
        let clear = clear_value_to_vk(value);
        unsafe {
            match value {
                ClearValue::DepthStencil { .. } => {
                    self.device
                        .cmd_clear_depth_stencil_image(command_buffer, image, layout, &clear.depth_stencil, &ranges)
                }
                _ => self.device.cmd_clear_color_image(command_buffer, image, layout, &clear.color, &ranges),
            }
        }
    }

    fn cmd_bind_pipeline(&self, command_buffer: vk::CommandBuffer, bind_point: PipelineBindPoint, pipeline: vk::Pipeline) {
        unsafe {
            self.device
                .cmd_bind_pipeline(command_buffer, pipeline_bind_point_to_vk(bind_point), pipeline)
        }
    }

    fn cmd_bind_descriptor_sets(
        &self,
        command_buffer: vk::CommandBuffer,
        bind_point: PipelineBindPoint,
        layout: vk::PipelineLayout,
        first_set: u32,
        sets: &[vk::DescriptorSet],
    ) {
        unsafe {
            self.device.cmd_bind_descriptor_sets(
                command_buffer,
                pipeline_bind_point_to_vk(bind_point),
                layout,
                first_set,
                sets,
                &[],
            )
        }
    }

    fn cmd_push_constants(
        &self,
        command_buffer: vk::CommandBuffer,
        layout: vk::PipelineLayout,
        stages: ShaderStages,
        offset: u32,
        data: &[u8],
    ) {
        unsafe {
            self.device
                .cmd_push_constants(command_buffer, layout, shader_stages_to_vk(stages), offset, data)
        }
    }

    fn cmd_dispatch(&self, command_buffer: vk::CommandBuffer, x: u32, y: u32, z: u32) {
        unsafe { self.device.cmd_dispatch(command_buffer, x, y, z) }
    }

    fn cmd_dispatch_base(&self, command_buffer: vk::CommandBuffer, base: [u32; 3], groups: [u32; 3]) {
        unsafe {
            self.device
                .cmd_dispatch_base(command_buffer, base[0], base[1], base[2], groups[0], groups[1], groups[2])
        }
    }

    fn cmd_dispatch_indirect(&self, command_buffer: vk::CommandBuffer, buffer: vk::Buffer, offset: u64) {
        unsafe { self.device.cmd_dispatch_indirect(command_buffer, buffer, offset) }
    }

    // ===== RENDERING =====

    fn cmd_begin_rendering(&self, command_buffer: vk::CommandBuffer, info: &RenderingInfo<'_, vk::ImageView>) {
        let color: Vec<vk::RenderingAttachmentInfo> =
            info.color_attachments.iter().map(rendering_attachment_to_vk).collect();
        let depth = info.depth_attachment.as_ref().map(rendering_attachment_to_vk);
        let stencil = info.stencil_attachment.as_ref().map(rendering_attachment_to_vk);

        let mut rendering_info = vk::RenderingInfo::default()
            .render_area(rect_2d_to_vk(&info.render_area))
            .layer_count(info.layer_count)
            .color_attachments(&color);
        if let Some(depth) = depth.as_ref() {
            rendering_info = rendering_info.depth_attachment(depth);
        }
        if let Some(stencil) = stencil.as_ref() {
            rendering_info = rendering_info.stencil_attachment(stencil);
        }

        unsafe { self.device.cmd_begin_rendering(command_buffer, &rendering_info) }
    }

    fn cmd_end_rendering(&self, command_buffer: vk::CommandBuffer) {
        unsafe { self.device.cmd_end_rendering(command_buffer) }
    }

    fn cmd_set_viewport(&self, command_buffer: vk::CommandBuffer, viewport: &Viewport) {
        unsafe { self.device.cmd_set_viewport(command_buffer, 0, &[viewport_to_vk(viewport)]) }
    }

    fn cmd_set_scissor(&self, command_buffer: vk::CommandBuffer, scissor: &Rect2D) {
        unsafe { self.device.cmd_set_scissor(command_buffer, 0, &[rect_2d_to_vk(scissor)]) }
    }

    fn cmd_bind_vertex_buffers(
        &self,
        command_buffer: vk::CommandBuffer,
        first_binding: u32,
        buffers: &[vk::Buffer],
        offsets: &[u64],
    ) {
        unsafe { self.device.cmd_bind_vertex_buffers(command_buffer, first_binding, buffers, offsets) }
    }

    fn cmd_bind_index_buffer(&self, command_buffer: vk::CommandBuffer, buffer: vk::Buffer, offset: u64, index_type: IndexType) {
        unsafe {
            self.device
                .cmd_bind_index_buffer(command_buffer, buffer, offset, index_type_to_vk(index_type))
        }
    }

    fn cmd_draw(
        &self,
        command_buffer: vk::CommandBuffer,
        vertex_count: u32,
        instance_count: u32,
        first_vertex: u32,
        first_instance: u32,
    ) {
        unsafe {
            self.device
                .cmd_draw(command_buffer, vertex_count, instance_count, first_vertex, first_instance)
        }
    }

    fn cmd_draw_indexed(
        &self,
        command_buffer: vk::CommandBuffer,
        index_count: u32,
        instance_count: u32,
        first_index: u32,
        vertex_offset: i32,
        first_instance: u32,
    ) {
        unsafe {
            self.device.cmd_draw_indexed(
                command_buffer,
                index_count,
                instance_count,
                first_index,
                vertex_offset,
                first_instance,
            )
        }
    }

    fn cmd_draw_indirect(
        &self,
        command_buffer: vk::CommandBuffer,
        buffer: vk::Buffer,
        offset: u64,
        draw_count: u32,
        stride: u32,
    ) {
        unsafe { self.device.cmd_draw_indirect(command_buffer, buffer, offset, draw_count, stride) }
    }

    fn cmd_draw_indexed_indirect(
        &self,
        command_buffer: vk::CommandBuffer,
        buffer: vk::Buffer,
        offset: u64,
        draw_count: u32,
        stride: u32,
    ) {
        unsafe {
            self.device
                .cmd_draw_indexed_indirect(command_buffer, buffer, offset, draw_count, stride)
        }
    }

    fn cmd_draw_indirect_count(
        &self,
        command_buffer: vk::CommandBuffer,
        buffer: vk::Buffer,
        offset: u64,
        count_buffer: vk::Buffer,
        count_offset: u64,
        max_draw_count: u32,
        stride: u32,
    ) {
        unsafe {
            self.device.cmd_draw_indirect_count(
                command_buffer,
                buffer,
                offset,
                count_buffer,
                count_offset,
                max_draw_count,
                stride,
            )
        }
    }

    fn cmd_draw_indexed_indirect_count(
        &self,
        command_buffer: vk::CommandBuffer,
        buffer: vk::Buffer,
        offset: u64,
        count_buffer: vk::Buffer,
        count_offset: u64,
        max_draw_count: u32,
        stride: u32,
    ) {
        unsafe {
            self.device.cmd_draw_indexed_indirect_count(
                command_buffer,
                buffer,
                offset,
                count_buffer,
                count_offset,
                max_draw_count,
                stride,
            )
        }
    }

    // ===== DESCRIPTORS =====

    fn create_descriptor_pool(&self, sizes: &[DescriptorPoolSize], max_sets: u32) -> Result<vk::DescriptorPool> {
        let pool_sizes: Vec<vk::DescriptorPoolSize> = sizes
            .iter()
            .map(|s| vk::DescriptorPoolSize { ty: descriptor_type_to_vk(s.ty), descriptor_count: s.count })
            .collect();
        let info = vk::DescriptorPoolCreateInfo::default()
            .pool_sizes(&pool_sizes)
            .max_sets(max_sets);

        unsafe {
            self.device
                .create_descriptor_pool(&info, None)
                .map_err(|e| engine_err!("inflight::vulkan", "Failed to create descriptor pool: {:?}", e))
        }
    }

    fn destroy_descriptor_pool(&self, pool: vk::DescriptorPool) {
        unsafe { self.device.destroy_descriptor_pool(pool, None) }
    }

    fn allocate_descriptor_set(&self, pool: vk::DescriptorPool, layout: vk::DescriptorSetLayout) -> Result<vk::DescriptorSet> {
        let layouts = [layout];
        let info = vk::DescriptorSetAllocateInfo::default()
            .descriptor_pool(pool)
            .set_layouts(&layouts);

        let sets = unsafe {
            match self.device.allocate_descriptor_sets(&info) {
                Ok(sets) => sets,
                // Recoverable: the caller retries on another pool
                Err(vk::Result::ERROR_OUT_OF_POOL_MEMORY) => return Err(Error::OutOfPoolMemory),
                Err(vk::Result::ERROR_FRAGMENTED_POOL) => return Err(Error::FragmentedPool),
                Err(e) => {
                    return Err(engine_err!("inflight::vulkan", "Failed to allocate descriptor set: {:?}", e));
                }
            }
        };
        sets.into_iter()
            .next()
            .ok_or_else(|| Error::BackendError("driver returned no descriptor set".to_string()))
    }

    fn reset_descriptor_pool(&self, pool: vk::DescriptorPool) -> Result<()> {
        unsafe {
            self.device
                .reset_descriptor_pool(pool, vk::DescriptorPoolResetFlags::empty())
                .map_err(|e| engine_err!("inflight::vulkan", "Failed to reset descriptor pool: {:?}", e))
        }
    }

    fn create_descriptor_set_layout(&self, bindings: &[DescriptorSetLayoutBinding]) -> Result<vk::DescriptorSetLayout> {
        let vk_bindings: Vec<vk::DescriptorSetLayoutBinding> = bindings
            .iter()
            .map(|b| {
                vk::DescriptorSetLayoutBinding::default()
                    .binding(b.binding)
                    .descriptor_type(descriptor_type_to_vk(b.ty))
                    .descriptor_count(b.count)
                    .stage_flags(shader_stages_to_vk(b.stages))
            })
            .collect();
        let info = vk::DescriptorSetLayoutCreateInfo::default().bindings(&vk_bindings);

        unsafe {
            self.device
                .create_descriptor_set_layout(&info, None)
                .map_err(|e| engine_err!("inflight::vulkan", "Failed to create descriptor set layout: {:?}", e))
        }
    }

    fn destroy_descriptor_set_layout(&self, layout: vk::DescriptorSetLayout) {
        unsafe { self.device.destroy_descriptor_set_layout(layout, None) }
    }

    fn update_descriptor_sets(&self, writes: &[DescriptorWrite<'_, vk::DescriptorSet, vk::Buffer, vk::ImageView>]) {
        let infos: Vec<DescriptorInfos> = writes
            .iter()
            .map(|write| match write.resources {
                DescriptorResources::Buffers(buffers) => DescriptorInfos::Buffers(
                    buffers
                        .iter()
                        .map(|b| vk::DescriptorBufferInfo { buffer: b.buffer, offset: b.offset, range: b.range })
                        .collect(),
                ),
                DescriptorResources::Images(images) => DescriptorInfos::Images(
                    images
                        .iter()
                        .map(|i| {
                            vk::DescriptorImageInfo::default()
                                .image_view(i.view)
                                .image_layout(image_layout_to_vk(i.layout))
                        })
                        .collect(),
                ),
            })
            .collect();

        let vk_writes: Vec<vk::WriteDescriptorSet> = writes
            .iter()
            .zip(&infos)
            .map(|(write, infos)| {
                let vk_write = vk::WriteDescriptorSet::default()
                    .dst_set(write.set)
                    .dst_binding(write.binding)
                    .dst_array_element(write.array_element)
                    .descriptor_type(descriptor_type_to_vk(write.ty));
                match infos {
                    DescriptorInfos::Buffers(buffers) => vk_write.buffer_info(buffers),
                    DescriptorInfos::Images(images) => vk_write.image_info(images),
                }
            })
            .collect();

        unsafe { self.device.update_descriptor_sets(&vk_writes, &[]) }
    }

    // ===== RESOURCES =====

    fn create_buffer(&self, desc: &BufferDesc, queue_family_index: u32) -> Result<AllocatedBuffer<vk::Buffer, VulkanMemory>> {
        let queue_families = [queue_family_index];
        let info = vk::BufferCreateInfo::default()
            .size(desc.size)
            .usage(buffer_usage_to_vk(desc.usage))
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .queue_family_indices(&queue_families);

        unsafe {
            let buffer = self.device.create_buffer(&info, None).map_err(|e| {
                engine_err!("inflight::vulkan", "Failed to create buffer of size {} bytes: {:?}", desc.size, e)
            })?;

            let requirements = self.device.get_buffer_memory_requirements(buffer);
            let memory = match self.allocate_memory("inflight buffer", requirements, buffer_domain_to_location(desc.domain), true) {
                Ok(memory) => memory,
                Err(err) => {
                    self.device.destroy_buffer(buffer, None);
                    return Err(err);
                }
            };

            let bound = self.with_allocation(memory, |allocation| {
                let mapped = allocation.mapped_ptr().map(|ptr| ptr.cast::<u8>());
                self.device
                    .bind_buffer_memory(buffer, allocation.memory(), allocation.offset())
                    .map(|_| mapped)
            });

            match bound {
                Ok(Ok(mapped)) => {
                    engine_trace!("inflight::vulkan", "Created {:?} buffer of {} bytes", desc.domain, desc.size);
                    Ok(AllocatedBuffer { buffer, memory, size: desc.size, mapped })
                }
                Ok(Err(e)) => {
                    self.free_memory(memory);
                    self.device.destroy_buffer(buffer, None);
                    Err(engine_err!("inflight::vulkan", "Failed to bind buffer memory: {:?}", e))
                }
                Err(err) => {
                    self.free_memory(memory);
                    self.device.destroy_buffer(buffer, None);
                    Err(err)
                }
            }
        }
    }

    fn destroy_buffer(&self, buffer: &AllocatedBuffer<vk::Buffer, VulkanMemory>) {
        unsafe { self.device.destroy_buffer(buffer.buffer, None) };
        self.free_memory(buffer.memory);
    }

    fn create_image(
        &self,
        desc: &ImageDesc,
        queue_family_index: u32,
    ) -> Result<AllocatedImage<vk::Image, vk::ImageView, VulkanMemory>> {
        let (image_type, view_type) = image_kind_to_vk(desc.kind, desc.array_layers);
        let flags = if desc.kind == ImageKind::Cube {
            vk::ImageCreateFlags::CUBE_COMPATIBLE
        } else {
            vk::ImageCreateFlags::empty()
        };
        let format = format_to_vk(desc.format);
        let queue_families = [queue_family_index];

        let info = vk::ImageCreateInfo::default()
            .flags(flags)
            .image_type(image_type)
            .format(format)
            .extent(vk::Extent3D { width: desc.width, height: desc.height, depth: desc.depth })
            .mip_levels(desc.mip_levels)
            .array_layers(desc.array_layers)
            .samples(vk::SampleCountFlags::TYPE_1)
            .tiling(vk::ImageTiling::OPTIMAL)
            .usage(image_usage_to_vk(desc.usage))
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .queue_family_indices(&queue_families)
            .initial_layout(vk::ImageLayout::UNDEFINED);

        unsafe {
            let image = self.device.create_image(&info, None).map_err(|e| {
                engine_err!("inflight::vulkan", "Failed to create {}x{} image: {:?}", desc.width, desc.height, e)
            })?;

            let requirements = self.device.get_image_memory_requirements(image);
            let memory = match self.allocate_memory("inflight image", requirements, gpu_allocator::MemoryLocation::GpuOnly, false) {
                Ok(memory) => memory,
                Err(err) => {
                    self.device.destroy_image(image, None);
                    return Err(err);
                }
            };

            let bound = self.with_allocation(memory, |allocation| {
                self.device.bind_image_memory(image, allocation.memory(), allocation.offset())
            });
            let bind_error = match bound {
                Ok(Ok(())) => None,
                Ok(Err(e)) => Some(engine_err!("inflight::vulkan", "Failed to bind image memory: {:?}", e)),
                Err(err) => Some(err),
            };
            if let Some(err) = bind_error {
                self.free_memory(memory);
                self.device.destroy_image(image, None);
                return Err(err);
            }

            let view_info = vk::ImageViewCreateInfo::default()
                .image(image)
                .view_type(view_type)
                .format(format)
                .subresource_range(subresource_range_to_vk(&ImageSubresourceRange::whole(desc.format.aspects())));

            match self.device.create_image_view(&view_info, None) {
                Ok(view) => Ok(AllocatedImage { image, view, memory }),
                Err(e) => {
                    self.free_memory(memory);
                    self.device.destroy_image(image, None);
                    Err(engine_err!("inflight::vulkan", "Failed to create image view: {:?}", e))
                }
            }
        }
    }

    fn destroy_image(&self, image: &AllocatedImage<vk::Image, vk::ImageView, VulkanMemory>) {
        unsafe {
            self.device.destroy_image_view(image.view, None);
            self.device.destroy_image(image.image, None);
        }
        self.free_memory(image.memory);
    }

    fn create_shader_module(&self, spirv: &[u32]) -> Result<vk::ShaderModule> {
        if spirv.is_empty() {
            return Err(Error::InvalidResource("empty SPIR-V code".to_string()));
        }
        let info = vk::ShaderModuleCreateInfo::default().code(spirv);
        unsafe {
            self.device
                .create_shader_module(&info, None)
                .map_err(|e| engine_err!("inflight::vulkan", "Failed to create shader module: {:?}", e))
        }
    }

    fn destroy_shader_module(&self, module: vk::ShaderModule) {
        unsafe { self.device.destroy_shader_module(module, None) }
    }

    fn create_pipeline_layout(&self, desc: &PipelineLayoutDesc<'_, vk::DescriptorSetLayout>) -> Result<vk::PipelineLayout> {
        let push_constant_ranges: Vec<vk::PushConstantRange> = desc
            .push_constant_ranges
            .iter()
            .map(|r| vk::PushConstantRange {
                stage_flags: shader_stages_to_vk(r.stages),
                offset: r.offset,
                size: r.size,
            })
            .collect();
        let info = vk::PipelineLayoutCreateInfo::default()
            .set_layouts(desc.set_layouts)
            .push_constant_ranges(&push_constant_ranges);

        unsafe {
            self.device
                .create_pipeline_layout(&info, None)
                .map_err(|e| engine_err!("inflight::vulkan", "Failed to create pipeline layout: {:?}", e))
        }
    }

    fn destroy_pipeline_layout(&self, layout: vk::PipelineLayout) {
        unsafe { self.device.destroy_pipeline_layout(layout, None) }
    }

    fn create_compute_pipeline(
        &self,
        desc: &ComputePipelineDesc<'_, vk::ShaderModule, vk::PipelineLayout>,
    ) -> Result<vk::Pipeline> {
        let entry_point = entry_point_name(desc.entry_point)?;
        let stage = vk::PipelineShaderStageCreateInfo::default()
            .stage(vk::ShaderStageFlags::COMPUTE)
            .module(desc.shader)
            .name(&entry_point);
        let info = vk::ComputePipelineCreateInfo::default()
            .flags(vk::PipelineCreateFlags::DISPATCH_BASE)
            .stage(stage)
            .layout(desc.layout);

        let pipelines = unsafe {
            self.device
                .create_compute_pipelines(vk::PipelineCache::null(), &[info], None)
                .map_err(|(_, e)| engine_err!("inflight::vulkan", "Failed to create compute pipeline: {:?}", e))?
        };
        pipelines
            .into_iter()
            .next()
            .ok_or_else(|| Error::BackendError("driver returned no pipeline".to_string()))
    }

    fn create_graphics_pipeline(
        &self,
        desc: &GraphicsPipelineDesc<'_, vk::ShaderModule, vk::PipelineLayout>,
    ) -> Result<vk::Pipeline> {
        let vertex_entry = entry_point_name(desc.vertex_entry_point)?;
        let fragment_entry = entry_point_name(desc.fragment_entry_point)?;

        let mut stages = vec![vk::PipelineShaderStageCreateInfo::default()
            .stage(vk::ShaderStageFlags::VERTEX)
            .module(desc.vertex_shader)
            .name(&vertex_entry)];
        if let Some(fragment_shader) = desc.fragment_shader {
            stages.push(
                vk::PipelineShaderStageCreateInfo::default()
                    .stage(vk::ShaderStageFlags::FRAGMENT)
                    .module(fragment_shader)
                    .name(&fragment_entry),
            );
        }

        let color_formats: Vec<vk::Format> = desc.color_formats.iter().map(|&f| format_to_vk(f)).collect();
        let depth_format = desc.depth_format.map(format_to_vk).unwrap_or(vk::Format::UNDEFINED);
        let mut rendering_info = vk::PipelineRenderingCreateInfo::default()
            .color_attachment_formats(&color_formats)
            .depth_attachment_format(depth_format);

        let vertex_input = vk::PipelineVertexInputStateCreateInfo::default();
        let input_assembly = vk::PipelineInputAssemblyStateCreateInfo::default()
            .topology(topology_to_vk(desc.topology));
        let viewport_state = vk::PipelineViewportStateCreateInfo::default()
            .viewport_count(1)
            .scissor_count(1);
        let rasterization = vk::PipelineRasterizationStateCreateInfo::default()
            .polygon_mode(vk::PolygonMode::FILL)
            .cull_mode(cull_mode_to_vk(desc.cull_mode))
            .front_face(vk::FrontFace::COUNTER_CLOCKWISE)
            .line_width(1.0);
        let multisample = vk::PipelineMultisampleStateCreateInfo::default()
            .rasterization_samples(vk::SampleCountFlags::TYPE_1);
        let depth_stencil = vk::PipelineDepthStencilStateCreateInfo::default()
            .depth_test_enable(desc.depth_test)
            .depth_write_enable(desc.depth_test)
            .depth_compare_op(vk::CompareOp::LESS_OR_EQUAL);
        let blend_attachments: Vec<vk::PipelineColorBlendAttachmentState> = color_formats
            .iter()
            .map(|_| {
                vk::PipelineColorBlendAttachmentState::default()
                    .blend_enable(false)
                    .color_write_mask(vk::ColorComponentFlags::RGBA)
            })
            .collect();
        let color_blend = vk::PipelineColorBlendStateCreateInfo::default().attachments(&blend_attachments);
        let dynamic_states = [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];
        let dynamic_state = vk::PipelineDynamicStateCreateInfo::default().dynamic_states(&dynamic_states);

        let info = vk::GraphicsPipelineCreateInfo::default()
            .push_next(&mut rendering_info)
            .stages(&stages)
            .vertex_input_state(&vertex_input)
            .input_assembly_state(&input_assembly)
            .viewport_state(&viewport_state)
            .rasterization_state(&rasterization)
            .multisample_state(&multisample)
            .depth_stencil_state(&depth_stencil)
            .color_blend_state(&color_blend)
            .dynamic_state(&dynamic_state)
            .layout(desc.layout);

        let pipelines = unsafe {
            self.device
                .create_graphics_pipelines(vk::PipelineCache::null(), &[info], None)
                .map_err(|(_, e)| engine_err!("inflight::vulkan", "Failed to create graphics pipeline: {:?}", e))?
        };
        pipelines
            .into_iter()
            .next()
            .ok_or_else(|| Error::BackendError("driver returned no pipeline".to_string()))
    }

    fn destroy_pipeline(&self, pipeline: vk::Pipeline) {
        unsafe { self.device.destroy_pipeline(pipeline, None) }
    }

    // ===== SYNCHRONIZATION =====

    fn create_semaphore(&self) -> Result<vk::Semaphore> {
        unsafe {
            self.device
                .create_semaphore(&vk::SemaphoreCreateInfo::default(), None)
                .map_err(|e| engine_err!("inflight::vulkan", "Failed to create semaphore: {:?}", e))
        }
    }

    fn destroy_semaphore(&self, semaphore: vk::Semaphore) {
        unsafe { self.device.destroy_semaphore(semaphore, None) }
    }

    fn create_fence(&self, signaled: bool) -> Result<vk::Fence> {
        let flags = if signaled { vk::FenceCreateFlags::SIGNALED } else { vk::FenceCreateFlags::empty() };
        unsafe {
            self.device
                .create_fence(&vk::FenceCreateInfo::default().flags(flags), None)
                .map_err(|e| engine_err!("inflight::vulkan", "Failed to create fence: {:?}", e))
        }
    }

    fn destroy_fence(&self, fence: vk::Fence) {
        unsafe { self.device.destroy_fence(fence, None) }
    }

    fn wait_for_fence(&self, fence: vk::Fence, timeout_ns: u64) -> Result<()> {
        unsafe {
            match self.device.wait_for_fences(&[fence], true, timeout_ns) {
                Ok(()) => Ok(()),
                Err(vk::Result::ERROR_DEVICE_LOST) => Err(Error::DeviceLost("fence wait".to_string())),
                Err(vk::Result::TIMEOUT) => {
                    engine_warn!("inflight::vulkan", "Fence wait timed out after {} ns", timeout_ns);
                    Err(Error::BackendError("fence wait timed out".to_string()))
                }
                Err(e) => Err(engine_err!("inflight::vulkan", "Failed to wait for fence: {:?}", e)),
            }
        }
    }

    fn reset_fence(&self, fence: vk::Fence) -> Result<()> {
        unsafe {
            self.device
                .reset_fences(&[fence])
                .map_err(|e| engine_err!("inflight::vulkan", "Failed to reset fence: {:?}", e))
        }
    }
}

fn entry_point_name(name: &str) -> Result<CString> {
    CString::new(name).map_err(|_| Error::InvalidResource(format!("shader entry point {:?} contains a NUL byte", name)))
}
