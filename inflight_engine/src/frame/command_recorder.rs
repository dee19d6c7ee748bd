/// Command recorder - a command buffer bound to one frame's staging memory
///
/// Handed out by `FrameContext::acquire_*`. Uploads go through the
/// recorder's own linear allocator and copies into per-frame buffers always
/// target the allocation of the recorder's frame in flight.

use std::sync::{Arc, MutexGuard};

use crate::error::{Error, Result};
use crate::frame::linear_host_allocator::{LinearHostAllocator, MappedHostBuffer, SharedLinearHostAllocator};
use crate::frame::pipeline_barrier_builder::PipelineBarrierBuilder;
use crate::graphics_device::{
    GraphicsDevice, Buffer, BufferDomain, BufferCopy, BufferImageCopy, Image, ImageAspects,
    ImageBlit, ImageCopy, ImageLayout, ImageSubresourceRange, Filter, ClearValue, IndexType,
    Pipeline, PipelineBindPoint, Rect2D, RenderingInfo, ShaderStages, Viewport,
};

/// Destination of an image upload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageRegion {
    pub offset: [i32; 3],
    pub extent: [u32; 3],
    pub mip_level: u32,
    pub base_array_layer: u32,
    pub layer_count: u32,
}

impl ImageRegion {
    /// Every texel of one mip level of the first layer
    pub fn mip_level(width: u32, height: u32, depth: u32, mip_level: u32) -> Self {
        Self {
            offset: [0, 0, 0],
            extent: [
                (width >> mip_level).max(1),
                (height >> mip_level).max(1),
                (depth >> mip_level).max(1),
            ],
            mip_level,
            base_array_layer: 0,
            layer_count: 1,
        }
    }

    /// Tightly packed copy between `buffer_offset` and this region
    pub fn buffer_image_copy(&self, buffer_offset: u64, aspects: ImageAspects) -> BufferImageCopy {
        BufferImageCopy {
            buffer_offset,
            buffer_row_length: 0,
            buffer_image_height: 0,
            aspects,
            mip_level: self.mip_level,
            base_array_layer: self.base_array_layer,
            layer_count: self.layer_count,
            image_offset: self.offset,
            image_extent: self.extent,
        }
    }

    fn texel_count(&self) -> u64 {
        self.extent.iter().map(|&e| e as u64).product::<u64>() * self.layer_count as u64
    }
}

pub struct CommandRecorder<D: GraphicsDevice> {
    device: Arc<D>,
    command_buffer: D::CommandBuffer,
    allocator: SharedLinearHostAllocator<D>,
    barriers: PipelineBarrierBuilder<D>,
    frame_in_flight: usize,
    queue_family_index: u32,
}

impl<D: GraphicsDevice> CommandRecorder<D> {
    pub fn new(
        device: Arc<D>,
        command_buffer: D::CommandBuffer,
        allocator: SharedLinearHostAllocator<D>,
        frame_in_flight: usize,
        queue_family_index: u32,
    ) -> Self {
        let barriers = PipelineBarrierBuilder::new(device.clone(), command_buffer);
        Self {
            device,
            command_buffer,
            allocator,
            barriers,
            frame_in_flight,
            queue_family_index,
        }
    }

    pub fn handle(&self) -> D::CommandBuffer {
        self.command_buffer
    }

    pub fn frame_in_flight(&self) -> usize {
        self.frame_in_flight
    }

    pub fn queue_family_index(&self) -> u32 {
        self.queue_family_index
    }

    /// Barrier builder bound to this command buffer
    pub fn barriers(&mut self) -> &mut PipelineBarrierBuilder<D> {
        &mut self.barriers
    }

    // ===== RECORDING =====

    pub fn begin(&mut self) -> Result<()> {
        self.device.begin_command_buffer(self.command_buffer)
    }

    /// Finish recording; barriers still queued on the builder are dropped
    pub fn end(&mut self) -> Result<()> {
        self.device.end_command_buffer(self.command_buffer)
    }

    // ===== TRANSFER =====

    /// Write `data` into `buffer` at `offset`
    ///
    /// Device-local buffers get a staging copy recorded into this command
    /// buffer. Host-visible buffers are written immediately through their
    /// mapping (the allocation for this frame in flight when replicated).
    pub fn upload_buffer_data(
        &mut self,
        buffer: &Buffer<D::Buffer, D::Memory>,
        offset: u64,
        data: &[u8],
    ) -> Result<()> {
        if data.is_empty() {
            return Ok(());
        }

        match buffer.desc().domain {
            BufferDomain::Device => {
                let dst = buffer.select(self.frame_in_flight).buffer;
                let staging = {
                    let mut allocator = self.lock_allocator()?;
                    let staging = allocator.allocate_buffer(data.len() as u64, self.queue_family_index)?;
                    staging.write(0, data)?;
                    staging.buffer()
                };
                self.device.cmd_copy_buffer(
                    self.command_buffer,
                    staging,
                    dst,
                    &[BufferCopy { src_offset: 0, dst_offset: offset, size: data.len() as u64 }],
                );
                Ok(())
            }
            BufferDomain::HostWriteCombined | BufferDomain::DeviceHostVisible => {
                buffer.select(self.frame_in_flight).write_mapped(offset, data)
            }
        }
    }

    /// Record a staging copy of `size` bytes into a device-local buffer and
    /// let `fill` write the staging memory
    ///
    /// Returns `Ok(false)` without recording anything for buffers outside
    /// [`BufferDomain::Device`]; those are written with `upload_buffer_data`.
    pub fn allocate_and_upload_buffer_data<F>(
        &mut self,
        buffer: &Buffer<D::Buffer, D::Memory>,
        offset: u64,
        size: u64,
        fill: F,
    ) -> Result<bool>
    where
        F: FnOnce(&mut MappedHostBuffer<D>) -> Result<()>,
    {
        if buffer.desc().domain != BufferDomain::Device {
            return Ok(false);
        }

        let dst = buffer.select(self.frame_in_flight).buffer;
        let staging = {
            let mut allocator = self.lock_allocator()?;
            let staging = allocator.allocate_buffer(size, self.queue_family_index)?;
            fill(&mut *staging)?;
            staging.buffer()
        };
        self.device.cmd_copy_buffer(
            self.command_buffer,
            staging,
            dst,
            &[BufferCopy { src_offset: 0, dst_offset: offset, size }],
        );
        Ok(true)
    }

    /// Stage `data` and copy it into `region` of a color image
    ///
    /// The image must already be in `ImageLayout::TransferDst`; transition
    /// it through [`Self::barriers`] first.
    pub fn upload_image_data(
        &mut self,
        image: &Image<D::Image, D::ImageView, D::Memory>,
        region: &ImageRegion,
        data: &[u8],
    ) -> Result<()> {
        let expected = region.texel_count() * image.desc().format.texel_size() as u64;
        if data.len() as u64 != expected {
            return Err(Error::InvalidResource(format!(
                "image upload expects {} bytes for region {:?}, got {}",
                expected,
                region.extent,
                data.len()
            )));
        }

        self.allocate_and_upload_image_data(image, region, |staging| staging.write(0, data))
    }

    /// Record a staging copy into `region` of a color image and let `fill`
    /// write the tightly packed texels
    ///
    /// Same layout requirement as [`Self::upload_image_data`]. Depth and
    /// stencil images are rejected.
    pub fn allocate_and_upload_image_data<F>(
        &mut self,
        image: &Image<D::Image, D::ImageView, D::Memory>,
        region: &ImageRegion,
        fill: F,
    ) -> Result<()>
    where
        F: FnOnce(&mut MappedHostBuffer<D>) -> Result<()>,
    {
        let format = image.desc().format;
        if format.aspects() != ImageAspects::COLOR {
            return Err(Error::InvalidResource(format!("cannot stage texels into {:?} image", format)));
        }

        let size = region.texel_count() * format.texel_size() as u64;
        let staging = {
            let mut allocator = self.lock_allocator()?;
            let staging = allocator.allocate_buffer(size, self.queue_family_index)?;
            fill(&mut *staging)?;
            staging.buffer()
        };
        self.device.cmd_copy_buffer_to_image(
            self.command_buffer,
            staging,
            image.handle(),
            ImageLayout::TransferDst,
            &[region.buffer_image_copy(0, ImageAspects::COLOR)],
        );
        Ok(())
    }

    /// Copy between the allocations of `src` and `dst` for this frame in flight
    pub fn copy_buffer(
        &mut self,
        src: &Buffer<D::Buffer, D::Memory>,
        dst: &Buffer<D::Buffer, D::Memory>,
        src_offset: u64,
        dst_offset: u64,
        size: u64,
    ) {
        self.device.cmd_copy_buffer(
            self.command_buffer,
            src.select(self.frame_in_flight).buffer,
            dst.select(self.frame_in_flight).buffer,
            &[BufferCopy { src_offset, dst_offset, size }],
        );
    }

    pub fn copy_buffer_to_image(
        &mut self,
        src: &Buffer<D::Buffer, D::Memory>,
        dst: &Image<D::Image, D::ImageView, D::Memory>,
        dst_layout: ImageLayout,
        region: &BufferImageCopy,
    ) {
        self.device.cmd_copy_buffer_to_image(
            self.command_buffer,
            src.select(self.frame_in_flight).buffer,
            dst.handle(),
            dst_layout,
            std::slice::from_ref(region),
        );
    }

    pub fn copy_image_to_buffer(
        &mut self,
        src: &Image<D::Image, D::ImageView, D::Memory>,
        src_layout: ImageLayout,
        dst: &Buffer<D::Buffer, D::Memory>,
        region: &BufferImageCopy,
    ) {
        self.device.cmd_copy_image_to_buffer(
            self.command_buffer,
            src.handle(),
            src_layout,
            dst.select(self.frame_in_flight).buffer,
            std::slice::from_ref(region),
        );
    }

    pub fn copy_image(
        &mut self,
        src: &Image<D::Image, D::ImageView, D::Memory>,
        src_layout: ImageLayout,
        dst: &Image<D::Image, D::ImageView, D::Memory>,
        dst_layout: ImageLayout,
        region: &ImageCopy,
    ) {
        self.device.cmd_copy_image(
            self.command_buffer,
            src.handle(),
            src_layout,
            dst.handle(),
            dst_layout,
            std::slice::from_ref(region),
        );
    }

    // ===== COMPUTE =====

    /// Bind `pipeline` at the bind point it was created for
    pub fn bind_pipeline(&mut self, pipeline: &Pipeline<D::Pipeline>) {
        self.device.cmd_bind_pipeline(self.command_buffer, pipeline.bind_point, pipeline.handle);
    }

    pub fn bind_compute_pipeline(&mut self, pipeline: &Pipeline<D::Pipeline>) -> Result<()> {
        if pipeline.bind_point != PipelineBindPoint::Compute {
            return Err(Error::InvalidResource("pipeline is not a compute pipeline".to_string()));
        }
        self.bind_pipeline(pipeline);
        Ok(())
    }

    pub fn bind_descriptor_sets(
        &mut self,
        bind_point: PipelineBindPoint,
        layout: D::PipelineLayout,
        first_set: u32,
        sets: &[D::DescriptorSet],
    ) {
        self.device.cmd_bind_descriptor_sets(self.command_buffer, bind_point, layout, first_set, sets);
    }

    pub fn push_constants<T: bytemuck::Pod>(
        &mut self,
        layout: D::PipelineLayout,
        stages: ShaderStages,
        offset: u32,
        value: &T,
    ) {
        self.device.cmd_push_constants(self.command_buffer, layout, stages, offset, bytemuck::bytes_of(value));
    }

    pub fn dispatch(&mut self, x: u32, y: u32, z: u32) {
        self.device.cmd_dispatch(self.command_buffer, x, y, z);
    }

    /// Dispatch `groups` workgroups whose ids start at `base`
    pub fn dispatch_base(&mut self, base: [u32; 3], groups: [u32; 3]) {
        self.device.cmd_dispatch_base(self.command_buffer, base, groups);
    }

    pub fn dispatch_indirect(&mut self, buffer: &Buffer<D::Buffer, D::Memory>, offset: u64) {
        self.device
            .cmd_dispatch_indirect(self.command_buffer, buffer.select(self.frame_in_flight).buffer, offset);
    }

    /// Clear `range` of an image outside a rendering pass
    ///
    /// The clear value must match the image format: color values for color
    /// images, depth/stencil values for depth and stencil images. The aspects
    /// of `range` are replaced with every aspect of the image format.
    pub fn clear_image(
        &mut self,
        image: &Image<D::Image, D::ImageView, D::Memory>,
        layout: ImageLayout,
        value: &ClearValue,
        range: ImageSubresourceRange,
    ) -> Result<()> {
        let aspects = image.desc().format.aspects();
        if !value.aspects().intersects(aspects) {
            return Err(Error::InvalidResource(format!(
                "{:?} cannot clear {:?} image",
                value,
                image.desc().format
            )));
        }

        let range = ImageSubresourceRange { aspects, ..range };
        self.device
            .cmd_clear_image(self.command_buffer, image.handle(), layout, value, &[range]);
        Ok(())
    }

    // ===== GRAPHICS =====

    pub fn begin_rendering(&mut self, info: &RenderingInfo<'_, D::ImageView>) {
        self.device.cmd_begin_rendering(self.command_buffer, info);
    }

    pub fn end_rendering(&mut self) {
        self.device.cmd_end_rendering(self.command_buffer);
    }

    pub fn set_viewport(&mut self, viewport: &Viewport) {
        self.device.cmd_set_viewport(self.command_buffer, viewport);
    }

    pub fn set_scissor(&mut self, scissor: &Rect2D) {
        self.device.cmd_set_scissor(self.command_buffer, scissor);
    }

    /// Bind `(buffer, offset)` pairs to consecutive bindings from `first_binding`
    pub fn bind_vertex_buffers(&mut self, first_binding: u32, buffers: &[(&Buffer<D::Buffer, D::Memory>, u64)]) {
        let (handles, offsets): (Vec<D::Buffer>, Vec<u64>) = buffers
            .iter()
            .map(|(buffer, offset)| (buffer.select(self.frame_in_flight).buffer, *offset))
            .unzip();
        self.device
            .cmd_bind_vertex_buffers(self.command_buffer, first_binding, &handles, &offsets);
    }

    pub fn bind_index_buffer(&mut self, buffer: &Buffer<D::Buffer, D::Memory>, offset: u64, index_type: IndexType) {
        self.device.cmd_bind_index_buffer(
            self.command_buffer,
            buffer.select(self.frame_in_flight).buffer,
            offset,
            index_type,
        );
    }

    pub fn draw(&mut self, vertex_count: u32, instance_count: u32, first_vertex: u32, first_instance: u32) {
        self.device
            .cmd_draw(self.command_buffer, vertex_count, instance_count, first_vertex, first_instance);
    }

    pub fn draw_indexed(
        &mut self,
        index_count: u32,
        instance_count: u32,
        first_index: u32,
        vertex_offset: i32,
        first_instance: u32,
    ) {
        self.device.cmd_draw_indexed(
            self.command_buffer,
            index_count,
            instance_count,
            first_index,
            vertex_offset,
            first_instance,
        );
    }

    pub fn draw_indirect(&mut self, buffer: &Buffer<D::Buffer, D::Memory>, offset: u64, draw_count: u32, stride: u32) {
        self.device.cmd_draw_indirect(
            self.command_buffer,
            buffer.select(self.frame_in_flight).buffer,
            offset,
            draw_count,
            stride,
        );
    }

    pub fn draw_indexed_indirect(
        &mut self,
        buffer: &Buffer<D::Buffer, D::Memory>,
        offset: u64,
        draw_count: u32,
        stride: u32,
    ) {
        self.device.cmd_draw_indexed_indirect(
            self.command_buffer,
            buffer.select(self.frame_in_flight).buffer,
            offset,
            draw_count,
            stride,
        );
    }

    pub fn draw_indirect_count(
        &mut self,
        buffer: &Buffer<D::Buffer, D::Memory>,
        offset: u64,
        count_buffer: &Buffer<D::Buffer, D::Memory>,
        count_offset: u64,
        max_draw_count: u32,
        stride: u32,
    ) {
        self.device.cmd_draw_indirect_count(
            self.command_buffer,
            buffer.select(self.frame_in_flight).buffer,
            offset,
            count_buffer.select(self.frame_in_flight).buffer,
            count_offset,
            max_draw_count,
            stride,
        );
    }

    pub fn draw_indexed_indirect_count(
        &mut self,
        buffer: &Buffer<D::Buffer, D::Memory>,
        offset: u64,
        count_buffer: &Buffer<D::Buffer, D::Memory>,
        count_offset: u64,
        max_draw_count: u32,
        stride: u32,
    ) {
        self.device.cmd_draw_indexed_indirect_count(
            self.command_buffer,
            buffer.select(self.frame_in_flight).buffer,
            offset,
            count_buffer.select(self.frame_in_flight).buffer,
            count_offset,
            max_draw_count,
            stride,
        );
    }

    /// Scaled copy of `region` between two images
    pub fn blit(
        &mut self,
        src: &Image<D::Image, D::ImageView, D::Memory>,
        src_layout: ImageLayout,
        dst: &Image<D::Image, D::ImageView, D::Memory>,
        dst_layout: ImageLayout,
        region: &ImageBlit,
        filter: Filter,
    ) {
        self.device.cmd_blit_image(
            self.command_buffer,
            src.handle(),
            src_layout,
            dst.handle(),
            dst_layout,
            std::slice::from_ref(region),
            filter,
        );
    }

    fn lock_allocator(&self) -> Result<MutexGuard<'_, LinearHostAllocator<D>>> {
        self.allocator
            .lock()
            .map_err(|_| Error::BackendError("linear host allocator lock poisoned".to_string()))
    }
}

#[cfg(test)]
#[path = "command_recorder_tests.rs"]
mod tests;
