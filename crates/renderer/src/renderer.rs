//! Main renderer orchestration.
//!
//! This module provides the [`Renderer`] struct that brings up the device,
//! owns the swapchain, and turns each call to
//! [`render_frame`](Renderer::render_frame) into one presented quad.

use std::mem::ManuallyDrop;

use ash::vk;
use tracing::{debug, error, info};

use e3d_core::{ClearColor, EngineConfig, PresentModePreference};
use e3d_rhi::RhiResult;
use e3d_rhi::context::{DeviceConfig, DeviceContext};
use e3d_rhi::surface::SurfaceProvider;
use e3d_rhi::swapchain::{PresentPreference, Swapchain};

use crate::frame_executor::{FrameExecutor, FrameStatus};
use crate::scene::{SceneResources, color_u32_to_f32};

/// Maps the configured present mode onto the swapchain policy.
pub fn present_preference(mode: PresentModePreference) -> PresentPreference {
    match mode {
        PresentModePreference::Mailbox => PresentPreference::Mailbox,
        PresentModePreference::Fifo => PresentPreference::Fifo,
    }
}

/// Normalized RGBA components of the configured clear color.
pub fn clear_color_rgba(color: ClearColor) -> [f32; 4] {
    match color {
        ClearColor::Rgba(rgba) => rgba,
        ClearColor::Packed(packed) => color_u32_to_f32(packed),
    }
}

/// Owns the GPU lifecycle for one window.
///
/// # Resource Destruction Order
///
/// 1. Wait for all GPU work to complete
/// 2. Destroy scene resources (pipeline, framebuffers, buffers, descriptors)
/// 3. Destroy frame slots (command buffers, semaphores, fences)
/// 4. Destroy swapchain
/// 5. Destroy the device context (command pool, device, surface, instance)
///
/// ManuallyDrop is used to ensure correct destruction order.
pub struct Renderer {
    scene: ManuallyDrop<SceneResources>,
    executor: ManuallyDrop<FrameExecutor>,
    swapchain: ManuallyDrop<Swapchain>,
    context: ManuallyDrop<DeviceContext>,

    /// Last non-zero window size, used as the desired swapchain extent.
    window_extent: vk::Extent2D,
    /// Set by a resize; the swapchain is rebuilt before the next frame.
    resize_pending: bool,
    /// Window currently has a zero-sized drawable.
    minimized: bool,
    rebuilds: u64,
}

impl Renderer {
    /// Creates a renderer for `window`.
    ///
    /// # Errors
    ///
    /// Any device bring-up, swapchain, shader or pipeline error.
    pub fn new<P: SurfaceProvider + ?Sized>(window: &P, config: &EngineConfig) -> RhiResult<Self> {
        let (width, height) = window.size();
        let window_extent = vk::Extent2D { width, height };

        let context = DeviceContext::initialize(
            window,
            &DeviceConfig {
                validation: config.graphics.validation,
            },
        )?;

        let swapchain = context.create_swapchain(
            window_extent,
            present_preference(config.graphics.present_mode),
        )?;

        let executor = FrameExecutor::new(
            context.device().clone(),
            context.command_pool(),
            swapchain.image_count(),
        )?;

        let scene = SceneResources::new(
            context.device().clone(),
            context.command_pool(),
            &swapchain,
            &config.graphics.shader_dir,
            clear_color_rgba(config.graphics.clear_color),
        )?;

        info!(
            "Renderer initialized on {} (validation: {})",
            context.adapter_name(),
            context.has_validation()
        );

        Ok(Self {
            scene: ManuallyDrop::new(scene),
            executor: ManuallyDrop::new(executor),
            swapchain: ManuallyDrop::new(swapchain),
            context: ManuallyDrop::new(context),
            window_extent,
            resize_pending: false,
            minimized: width == 0 || height == 0,
            rebuilds: 0,
        })
    }

    /// Notifies the renderer that the window has been resized.
    ///
    /// The actual swapchain recreation will happen on the next frame. A zero
    /// size pauses rendering until a non-zero size arrives.
    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            debug!("Window minimized, pausing rendering");
            self.minimized = true;
            return;
        }

        self.minimized = false;
        if width != self.window_extent.width || height != self.window_extent.height {
            debug!(
                "Resize triggered: {}x{} -> {}x{}",
                self.window_extent.width, self.window_extent.height, width, height
            );
            self.window_extent = vk::Extent2D { width, height };
            self.resize_pending = true;
        }
    }

    /// Renders and presents one frame.
    ///
    /// Returns [`FrameStatus::Skipped`] while the window is minimized or when
    /// the swapchain turned out to be stale; the swapchain is then rebuilt on
    /// the next call.
    pub fn render_frame(&mut self) -> RhiResult<FrameStatus> {
        if self.minimized {
            return Ok(FrameStatus::Skipped);
        }

        if self.resize_pending || self.executor.needs_rebuild() {
            self.rebuild_swapchain()?;
        }

        let scene = &mut *self.scene;
        self.executor
            .render_frame(&self.swapchain, |cmd, image_index| {
                scene.record_draw(cmd, image_index)
            })
    }

    /// Recreates the swapchain and everything sized by it.
    fn rebuild_swapchain(&mut self) -> RhiResult<()> {
        self.executor.wait_all()?;
        self.swapchain.recreate(self.window_extent)?;
        self.executor
            .on_swapchain_recreated(self.swapchain.image_count())?;
        self.scene.on_swapchain_recreated(&self.swapchain)?;

        self.executor.clear_rebuild();
        self.resize_pending = false;
        self.rebuilds += 1;

        let extent = self.swapchain.extent();
        info!(
            "Swapchain rebuilt ({}): {}x{}, {} image(s)",
            self.rebuilds,
            extent.width,
            extent.height,
            self.swapchain.image_count()
        );
        Ok(())
    }

    /// Current swapchain extent.
    pub fn extent(&self) -> vk::Extent2D {
        self.swapchain.extent()
    }

    /// Current swapchain format.
    pub fn format(&self) -> vk::Format {
        self.swapchain.format()
    }

    /// Number of swapchain rebuilds so far.
    pub fn rebuild_count(&self) -> u64 {
        self.rebuilds
    }

    pub fn context(&self) -> &DeviceContext {
        &self.context
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        if let Err(e) = self.context.device().wait_idle() {
            error!(
                "Failed to wait for device idle during renderer drop: {:?}",
                e
            );
        }

        unsafe {
            ManuallyDrop::drop(&mut self.scene);
            ManuallyDrop::drop(&mut self.executor);
            ManuallyDrop::drop(&mut self.swapchain);
            ManuallyDrop::drop(&mut self.context);
        }

        info!("Renderer destroyed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_present_preference_mapping() {
        assert_eq!(
            present_preference(PresentModePreference::Mailbox),
            PresentPreference::Mailbox
        );
        assert_eq!(
            present_preference(PresentModePreference::Fifo),
            PresentPreference::Fifo
        );
    }

    #[test]
    fn test_clear_color_rgba() {
        assert_eq!(
            clear_color_rgba(ClearColor::Rgba([0.5, 0.25, 0.0, 1.0])),
            [0.5, 0.25, 0.0, 1.0]
        );
        assert_eq!(
            clear_color_rgba(ClearColor::Packed(0xFF0000FF)),
            [1.0, 0.0, 0.0, 1.0]
        );
        assert_eq!(clear_color_rgba(ClearColor::default()), [0.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_renderer_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<Renderer>();
    }
}
