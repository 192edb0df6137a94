//! The quad's graphics pipeline.

use std::path::Path;
use std::sync::Arc;

use ash::vk;
use tracing::info;

use e3d_rhi::RhiResult;
use e3d_rhi::descriptor::DescriptorSetLayout;
use e3d_rhi::device::Device;
use e3d_rhi::pipeline::{GraphicsPipelineBuilder, Pipeline, PipelineLayout};
use e3d_rhi::render_pass::RenderPass;
use e3d_rhi::shader::{Shader, ShaderStage};
use e3d_rhi::vertex::Vertex;

/// Compiled vertex shader file name inside the shader directory.
pub const VERTEX_SHADER_FILE: &str = "base.vert.spv";
/// Compiled fragment shader file name inside the shader directory.
pub const FRAGMENT_SHADER_FILE: &str = "base.frag.spv";

/// Pipeline and layout used to draw the quad.
///
/// Field order is drop order: the pipeline goes before its layout.
pub struct TrianglePipeline {
    pipeline: Pipeline,
    layout: PipelineLayout,
}

impl TrianglePipeline {
    /// Loads the shaders from `shader_dir` and builds the pipeline for
    /// subpass 0 of `render_pass`.
    ///
    /// The shader modules only live for the duration of this call.
    ///
    /// # Errors
    ///
    /// - [`RhiError::ShaderLoadError`] if a shader file is missing, unreadable
    ///   or not valid SPIR-V
    /// - [`RhiError::PipelineCreationError`] if the layout or pipeline is rejected
    ///
    /// [`RhiError::ShaderLoadError`]: e3d_rhi::RhiError::ShaderLoadError
    /// [`RhiError::PipelineCreationError`]: e3d_rhi::RhiError::PipelineCreationError
    pub fn build(
        device: Arc<Device>,
        render_pass: &RenderPass,
        descriptor_set_layout: &DescriptorSetLayout,
        shader_dir: &Path,
    ) -> RhiResult<Self> {
        let vertex_shader = Shader::from_spirv_file(
            device.clone(),
            &shader_dir.join(VERTEX_SHADER_FILE),
            ShaderStage::Vertex,
        )?;
        let fragment_shader = Shader::from_spirv_file(
            device.clone(),
            &shader_dir.join(FRAGMENT_SHADER_FILE),
            ShaderStage::Fragment,
        )?;

        let layout = PipelineLayout::new(device.clone(), &[descriptor_set_layout.handle()], &[])?;

        let pipeline = GraphicsPipelineBuilder::new()
            .vertex_shader(&vertex_shader)
            .fragment_shader(&fragment_shader)
            .vertex_binding(Vertex::binding_description())
            .vertex_attributes(&Vertex::attribute_descriptions())
            .cull_mode(vk::CullModeFlags::BACK)
            .front_face(vk::FrontFace::COUNTER_CLOCKWISE)
            .render_pass(render_pass.handle(), 0)
            .build(device, &layout)?;

        info!(
            "Quad pipeline built from {}",
            shader_dir.display()
        );

        Ok(Self { pipeline, layout })
    }

    #[inline]
    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    #[inline]
    pub fn layout(&self) -> &PipelineLayout {
        &self.layout
    }
}
