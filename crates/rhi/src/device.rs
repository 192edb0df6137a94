//! Vulkan logical device and queue management.
//!
//! The [`Device`] owns the `VkDevice`, the graphics and present queues, and a
//! copy of the adapter's memory properties used to resolve allocations.
//!
//! # Example
//!
//! ```no_run
//! use e3d_rhi::device::Device;
//! use e3d_rhi::instance::Instance;
//! use e3d_rhi::physical_device::{AdapterInfo, find_queue_families};
//!
//! # fn example(instance: &Instance, adapter: &AdapterInfo) -> Result<(), e3d_rhi::RhiError> {
//! let families = find_queue_families(adapter)?;
//! let device = Device::new(instance, adapter, families)?;
//! let _graphics = device.graphics_queue();
//! let _present = device.present_queue();
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use ash::vk;
use tracing::{debug, error, info};

use crate::error::{RhiError, RhiResult};
use crate::instance::Instance;
use crate::physical_device::{self, AdapterInfo, QueueFamilyIndices};

/// Required device extensions.
pub const DEVICE_EXTENSIONS: &[&std::ffi::CStr] = &[ash::khr::swapchain::NAME];

/// Vulkan logical device wrapper.
///
/// Shared as `Arc<Device>` by every object that owns device-level handles, so
/// the device always outlives them.
pub struct Device {
    /// Vulkan logical device.
    device: ash::Device,
    /// Physical device this device was created from.
    physical_device: vk::PhysicalDevice,
    /// Memory heaps and types of the physical device.
    memory_properties: vk::PhysicalDeviceMemoryProperties,
    /// Graphics queue handle.
    graphics_queue: vk::Queue,
    /// Present queue handle (may alias the graphics queue).
    present_queue: vk::Queue,
    /// Queue family indices.
    queue_families: QueueFamilyIndices,
}

impl Device {
    /// Creates a logical device with one queue per distinct family.
    ///
    /// # Errors
    ///
    /// [`RhiError::InitializationError`] if device creation fails.
    pub fn new(
        instance: &Instance,
        adapter: &AdapterInfo,
        queue_families: QueueFamilyIndices,
    ) -> RhiResult<Arc<Self>> {
        let queue_priorities = [1.0_f32];
        let queue_create_infos: Vec<vk::DeviceQueueCreateInfo> = queue_families
            .unique_families()
            .into_iter()
            .map(|family| {
                vk::DeviceQueueCreateInfo::default()
                    .queue_family_index(family)
                    .queue_priorities(&queue_priorities)
            })
            .collect();

        let extension_names: Vec<*const std::ffi::c_char> =
            DEVICE_EXTENSIONS.iter().map(|ext| ext.as_ptr()).collect();
        let features = vk::PhysicalDeviceFeatures::default();

        let create_info = vk::DeviceCreateInfo::default()
            .queue_create_infos(&queue_create_infos)
            .enabled_extension_names(&extension_names)
            .enabled_features(&features);

        let device = unsafe {
            instance
                .handle()
                .create_device(adapter.device, &create_info, None)
        }
        .map_err(|e| RhiError::InitializationError(format!("create device: {e}")))?;

        let graphics_queue = unsafe { device.get_device_queue(queue_families.graphics_family, 0) };
        let present_queue = unsafe { device.get_device_queue(queue_families.present_family, 0) };

        info!(
            "Logical device created on {} ({} queue famil{})",
            adapter.device_name(),
            queue_create_infos.len(),
            if queue_create_infos.len() == 1 { "y" } else { "ies" }
        );

        Ok(Arc::new(Self {
            device,
            physical_device: adapter.device,
            memory_properties: adapter.memory_properties,
            graphics_queue,
            present_queue,
            queue_families,
        }))
    }

    /// Returns the ash device handle.
    #[inline]
    pub fn handle(&self) -> &ash::Device {
        &self.device
    }

    #[inline]
    pub fn physical_device(&self) -> vk::PhysicalDevice {
        self.physical_device
    }

    #[inline]
    pub fn graphics_queue(&self) -> vk::Queue {
        self.graphics_queue
    }

    #[inline]
    pub fn present_queue(&self) -> vk::Queue {
        self.present_queue
    }

    #[inline]
    pub fn queue_families(&self) -> &QueueFamilyIndices {
        &self.queue_families
    }

    #[inline]
    pub fn memory_properties(&self) -> &vk::PhysicalDeviceMemoryProperties {
        &self.memory_properties
    }

    /// Resolves a memory type index for an allocation.
    ///
    /// See [`physical_device::find_memory_type`].
    pub fn find_memory_type(
        &self,
        type_bits: u32,
        properties: vk::MemoryPropertyFlags,
    ) -> RhiResult<u32> {
        physical_device::find_memory_type(&self.memory_properties, type_bits, properties)
    }

    /// Waits for the device to become idle.
    ///
    /// This function blocks until all outstanding operations on all queues
    /// have completed. Required before destroying anything the GPU may still use.
    pub fn wait_idle(&self) -> RhiResult<()> {
        unsafe { self.device.device_wait_idle()? };
        Ok(())
    }

    /// Submits command buffers to the graphics queue.
    ///
    /// # Safety
    ///
    /// The caller must ensure:
    /// - All command buffers are valid and recorded
    /// - Synchronization is properly handled
    /// - The fence (if provided) is unsignaled and not in use
    ///
    /// # Errors
    ///
    /// [`RhiError::SubmitError`] if the submission fails.
    pub unsafe fn submit_graphics(
        &self,
        submit_infos: &[vk::SubmitInfo],
        fence: vk::Fence,
    ) -> RhiResult<()> {
        unsafe {
            self.device
                .queue_submit(self.graphics_queue, submit_infos, fence)
                .map_err(RhiError::SubmitError)
        }
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        unsafe {
            if let Err(e) = self.device.device_wait_idle() {
                error!("Failed to wait for device idle during drop: {:?}", e);
            }
            self.device.destroy_device(None);
        }
        debug!("Logical device destroyed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_extensions_defined() {
        assert_eq!(DEVICE_EXTENSIONS, &[ash::khr::swapchain::NAME]);
    }

    #[test]
    fn test_device_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Device>();
    }
}
