//! Device bring-up.
//!
//! [`DeviceContext`] owns every long-lived Vulkan object that does not depend
//! on the swapchain: instance (with optional validation), surface, the chosen
//! adapter, the logical device with its queues, and the main command pool.
//!
//! # Example
//!
//! ```no_run
//! use e3d_rhi::context::{DeviceConfig, DeviceContext};
//! use e3d_rhi::surface::SurfaceProvider;
//!
//! # fn example<P: SurfaceProvider>(window: &P) -> Result<(), e3d_rhi::RhiError> {
//! let context = DeviceContext::initialize(window, &DeviceConfig { validation: true })?;
//! println!("running on {}", context.adapter_name());
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use ash::vk;
use tracing::info;

use crate::command::CommandPool;
use crate::device::Device;
use crate::error::{RhiError, RhiResult};
use crate::instance::Instance;
use crate::physical_device::{self, QueueFamilyIndices};
use crate::surface::{Surface, SurfaceProvider};
use crate::swapchain::{PresentPreference, Swapchain};

/// Options for [`DeviceContext::initialize`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DeviceConfig {
    /// Request the Khronos validation layer. Ignored when the host lacks it.
    pub validation: bool,
}

/// Instance, surface, device and command pool, created in dependency order.
///
/// Fields are declared in reverse creation order so they drop as
/// command pool, device, surface, instance.
pub struct DeviceContext {
    command_pool: CommandPool,
    device: Arc<Device>,
    surface: Surface,
    instance: Instance,
    adapter_name: String,
}

impl DeviceContext {
    /// Brings up Vulkan for `provider`'s window.
    ///
    /// # Errors
    ///
    /// - [`RhiError::LoadingError`] / [`RhiError::InitializationError`] when the
    ///   loader, instance, surface or device cannot be created, or when no
    ///   adapter is present
    /// - [`RhiError::NoSuitableQueueFamily`] when the selected adapter lacks a
    ///   graphics or a present family
    pub fn initialize<P: SurfaceProvider + ?Sized>(
        provider: &P,
        config: &DeviceConfig,
    ) -> RhiResult<Self> {
        let required = provider.required_extensions()?;
        let instance = Instance::new(&required, config.validation)?;
        let surface = Surface::new(provider, instance.entry(), instance.handle())?;

        let adapters = physical_device::enumerate_adapters(instance.handle(), &surface)?;
        let index = physical_device::select_adapter(&adapters)
            .ok_or_else(|| RhiError::InitializationError("no adapter".to_string()))?;
        let adapter = &adapters[index];

        info!(
            "Selected adapter {} ({}) of {} candidate(s)",
            adapter.device_name(),
            adapter.device_type_name(),
            adapters.len()
        );

        let families = physical_device::find_queue_families(adapter)?;
        let device = Device::new(&instance, adapter, families)?;
        let command_pool = CommandPool::new(device.clone(), families.graphics_family)?;

        Ok(Self {
            command_pool,
            device,
            surface,
            instance,
            adapter_name: adapter.device_name().to_string(),
        })
    }

    /// Creates an additional resettable command pool on the graphics family.
    pub fn create_command_pool(&self) -> RhiResult<CommandPool> {
        CommandPool::new(
            self.device.clone(),
            self.device.queue_families().graphics_family,
        )
    }

    /// Creates a swapchain for this context's surface.
    pub fn create_swapchain(
        &self,
        desired_extent: vk::Extent2D,
        preference: PresentPreference,
    ) -> RhiResult<Swapchain> {
        Swapchain::new(
            &self.instance,
            self.device.clone(),
            &self.surface,
            desired_extent,
            preference,
        )
    }

    /// See [`physical_device::find_memory_type`].
    pub fn find_memory_type(
        &self,
        type_bits: u32,
        properties: vk::MemoryPropertyFlags,
    ) -> RhiResult<u32> {
        self.device.find_memory_type(type_bits, properties)
    }

    #[inline]
    pub fn instance(&self) -> &Instance {
        &self.instance
    }

    #[inline]
    pub fn device(&self) -> &Arc<Device> {
        &self.device
    }

    #[inline]
    pub fn surface(&self) -> &Surface {
        &self.surface
    }

    #[inline]
    pub fn command_pool(&self) -> &CommandPool {
        &self.command_pool
    }

    #[inline]
    pub fn queue_families(&self) -> &QueueFamilyIndices {
        self.device.queue_families()
    }

    #[inline]
    pub fn adapter_name(&self) -> &str {
        &self.adapter_name
    }

    pub fn has_validation(&self) -> bool {
        self.instance.has_validation()
    }
}
