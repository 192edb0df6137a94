//! GPU resources for the quad scene and the draw it records each frame.
//!
//! [`SceneResources`] owns everything the draw needs: the render pass and
//! per-image framebuffers, the quad's vertex and index buffers, one uniform
//! buffer and descriptor set per swapchain image, and the pipeline. Resources
//! tied to the swapchain are rebuilt by
//! [`on_swapchain_recreated`](SceneResources::on_swapchain_recreated).

use std::path::{Path, PathBuf};
use std::sync::Arc;

use ash::vk;
use tracing::{debug, info};

use e3d_rhi::RhiResult;
use e3d_rhi::buffer::{Buffer, BufferUsage};
use e3d_rhi::command::{CommandBuffer, CommandPool};
use e3d_rhi::descriptor::{
    DescriptorPool, DescriptorSetLayout, uniform_buffer_binding, write_uniform_buffers,
};
use e3d_rhi::device::Device;
use e3d_rhi::render_pass::{Framebuffers, RenderPass};
use e3d_rhi::swapchain::Swapchain;
use e3d_rhi::vertex::{QUAD_INDICES, QUAD_VERTICES};

use crate::triangle_pipeline::TrianglePipeline;
use crate::ubo::TransformUbo;

/// Binding of the transform uniform block in the vertex shader.
const UBO_BINDING: u32 = 0;

/// Unpacks `0xRRGGBBAA` into normalized RGBA.
///
/// ```
/// use e3d_renderer::scene::color_u32_to_f32;
///
/// assert_eq!(color_u32_to_f32(0xFF0000FF), [1.0, 0.0, 0.0, 1.0]);
/// ```
pub fn color_u32_to_f32(rgba: u32) -> [f32; 4] {
    rgba.to_be_bytes().map(|channel| f32::from(channel) / 255.0)
}

/// Viewport covering `extent` with the full `[0, 1]` depth range.
fn full_viewport(extent: vk::Extent2D) -> vk::Viewport {
    vk::Viewport {
        x: 0.0,
        y: 0.0,
        width: extent.width as f32,
        height: extent.height as f32,
        min_depth: 0.0,
        max_depth: 1.0,
    }
}

fn full_scissor(extent: vk::Extent2D) -> vk::Rect2D {
    vk::Rect2D {
        offset: vk::Offset2D { x: 0, y: 0 },
        extent,
    }
}

/// Per-image uniform buffers and the descriptor sets pointing at them.
///
/// Field order is drop order: sets are freed with their pool before the
/// buffers they reference go away.
struct UniformSets {
    sets: Vec<vk::DescriptorSet>,
    _pool: DescriptorPool,
    buffers: Vec<Buffer>,
}

impl UniformSets {
    fn new(device: &Arc<Device>, layout: &DescriptorSetLayout, count: usize) -> RhiResult<Self> {
        let count_u32 = count as u32;

        let mut buffers = Vec::with_capacity(count);
        for _ in 0..count {
            let mut buffer = Buffer::new(
                device.clone(),
                BufferUsage::Uniform,
                TransformUbo::SIZE as vk::DeviceSize,
            )?;
            buffer.write(&TransformUbo::identity())?;
            buffers.push(buffer);
        }

        let pool = DescriptorPool::for_uniform_buffers(device.clone(), count_u32)?;
        let sets = pool.allocate(layout, count_u32)?;
        write_uniform_buffers(device, &sets, &buffers, UBO_BINDING)?;

        debug!("Created {} uniform buffer(s) and descriptor set(s)", count);

        Ok(Self {
            sets,
            _pool: pool,
            buffers,
        })
    }

    fn len(&self) -> usize {
        self.buffers.len()
    }
}

/// Everything needed to draw the quad into a swapchain image.
///
/// Field order is drop order.
pub struct SceneResources {
    pipeline: TrianglePipeline,
    framebuffers: Framebuffers,
    render_pass: RenderPass,
    uniforms: UniformSets,
    descriptor_set_layout: DescriptorSetLayout,
    index_buffer: Buffer,
    vertex_buffer: Buffer,
    device: Arc<Device>,
    shader_dir: PathBuf,
    clear_color: [f32; 4],
}

impl SceneResources {
    /// Creates the scene for `swapchain`, uploading the quad through
    /// `command_pool` and loading shaders from `shader_dir`.
    pub fn new(
        device: Arc<Device>,
        command_pool: &CommandPool,
        swapchain: &Swapchain,
        shader_dir: &Path,
        clear_color: [f32; 4],
    ) -> RhiResult<Self> {
        let vertex_buffer = Buffer::device_local_with_data(
            device.clone(),
            command_pool,
            BufferUsage::Vertex,
            bytemuck::cast_slice(&QUAD_VERTICES),
        )?;
        let index_buffer = Buffer::device_local_with_data(
            device.clone(),
            command_pool,
            BufferUsage::Index,
            bytemuck::cast_slice(&QUAD_INDICES),
        )?;

        let descriptor_set_layout = DescriptorSetLayout::new(
            device.clone(),
            &[uniform_buffer_binding(
                UBO_BINDING,
                vk::ShaderStageFlags::VERTEX,
            )],
        )?;
        let uniforms = UniformSets::new(&device, &descriptor_set_layout, swapchain.image_count())?;

        let render_pass = RenderPass::single_color(device.clone(), swapchain.format())?;
        let framebuffers = Framebuffers::new(
            device.clone(),
            &render_pass,
            swapchain.image_views(),
            swapchain.extent(),
        )?;
        let pipeline = TrianglePipeline::build(
            device.clone(),
            &render_pass,
            &descriptor_set_layout,
            shader_dir,
        )?;

        info!(
            "Scene resources created for {} swapchain image(s)",
            swapchain.image_count()
        );

        Ok(Self {
            pipeline,
            framebuffers,
            render_pass,
            uniforms,
            descriptor_set_layout,
            index_buffer,
            vertex_buffer,
            device,
            shader_dir: shader_dir.to_path_buf(),
            clear_color,
        })
    }

    /// Records the quad draw for swapchain image `image_index` into `cmd`.
    ///
    /// `cmd` must be recording. The image's uniform buffer is updated here, so
    /// no earlier submission for the same image may still be executing.
    pub fn record_draw(&mut self, cmd: &CommandBuffer, image_index: u32) -> RhiResult<()> {
        let framebuffer = self.framebuffers.get(image_index)?;
        let extent = self.framebuffers.extent();
        let index = image_index as usize;

        let descriptor_set = *self.uniforms.sets.get(index).ok_or_else(|| {
            e3d_rhi::RhiError::InvalidHandle(format!("no descriptor set for image {image_index}"))
        })?;
        self.uniforms.buffers[index].write(&TransformUbo::identity())?;

        cmd.begin_render_pass(
            self.render_pass.handle(),
            framebuffer,
            full_scissor(extent),
            self.clear_color,
        );
        cmd.set_viewport(&full_viewport(extent));
        cmd.set_scissor(&full_scissor(extent));

        let pipeline = self.pipeline.pipeline();
        cmd.bind_pipeline(pipeline.bind_point(), pipeline.handle());
        cmd.bind_vertex_buffers(0, &[self.vertex_buffer.handle()], &[0]);
        cmd.bind_index_buffer(self.index_buffer.handle(), 0, vk::IndexType::UINT16);
        cmd.bind_descriptor_sets(
            pipeline.bind_point(),
            self.pipeline.layout().handle(),
            0,
            &[descriptor_set],
        );
        cmd.draw_indexed(QUAD_INDICES.len() as u32, 1, 0, 0, 0);

        cmd.end_render_pass();
        Ok(())
    }

    /// Rebuilds what depends on `swapchain` after it was recreated.
    ///
    /// Framebuffers are always rebuilt. Uniform buffers and descriptor sets
    /// follow the image count; the render pass and pipeline follow the format.
    /// The device must be idle.
    pub fn on_swapchain_recreated(&mut self, swapchain: &Swapchain) -> RhiResult<()> {
        if swapchain.format() != self.render_pass.color_format() {
            info!(
                "Surface format changed to {:?}, rebuilding render pass and pipeline",
                swapchain.format()
            );
            let render_pass = RenderPass::single_color(self.device.clone(), swapchain.format())?;
            self.pipeline = TrianglePipeline::build(
                self.device.clone(),
                &render_pass,
                &self.descriptor_set_layout,
                &self.shader_dir,
            )?;
            self.render_pass = render_pass;
        }

        if swapchain.image_count() != self.uniforms.len() {
            self.uniforms = UniformSets::new(
                &self.device,
                &self.descriptor_set_layout,
                swapchain.image_count(),
            )?;
        }

        self.framebuffers = Framebuffers::new(
            self.device.clone(),
            &self.render_pass,
            swapchain.image_views(),
            swapchain.extent(),
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_u32_to_f32() {
        assert_eq!(color_u32_to_f32(0x000000FF), [0.0, 0.0, 0.0, 1.0]);
        assert_eq!(color_u32_to_f32(0xFFFFFFFF), [1.0, 1.0, 1.0, 1.0]);
        assert_eq!(color_u32_to_f32(0x00FF0000), [0.0, 1.0, 0.0, 0.0]);
    }

    #[test]
    fn test_color_u32_to_f32_byte_order() {
        let [r, g, b, a] = color_u32_to_f32(0x336699CC);
        assert_eq!(r, 51.0 / 255.0);
        assert_eq!(g, 102.0 / 255.0);
        assert_eq!(b, 153.0 / 255.0);
        assert_eq!(a, 204.0 / 255.0);
    }

    #[test]
    fn test_viewport_and_scissor_cover_extent() {
        let extent = vk::Extent2D {
            width: 1280,
            height: 720,
        };
        let viewport = full_viewport(extent);
        assert_eq!((viewport.x, viewport.y), (0.0, 0.0));
        assert_eq!((viewport.width, viewport.height), (1280.0, 720.0));
        assert_eq!((viewport.min_depth, viewport.max_depth), (0.0, 1.0));

        let scissor = full_scissor(extent);
        assert_eq!(scissor.offset.x, 0);
        assert_eq!(scissor.extent, extent);
    }
}
