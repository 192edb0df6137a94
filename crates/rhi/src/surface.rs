//! Presentation surface contract.
//!
//! The RHI never talks to a windowing system directly. Whatever owns the
//! native window implements [`SurfaceProvider`]; [`DeviceContext`] asks it
//! which instance extensions it needs and to create the `VkSurfaceKHR`.
//!
//! [`DeviceContext`]: crate::context::DeviceContext

use std::ffi::CStr;

use ash::vk;
use tracing::debug;

use crate::error::RhiResult;

/// A native window able to host a Vulkan surface.
///
/// # Example
///
/// ```no_run
/// use std::ffi::CStr;
/// use e3d_rhi::surface::SurfaceProvider;
/// use e3d_rhi::{RhiResult, vk};
///
/// struct Headless;
///
/// impl SurfaceProvider for Headless {
///     type Event = ();
///
///     fn required_extensions(&self) -> RhiResult<Vec<&'static CStr>> {
///         Ok(vec![ash::khr::surface::NAME])
///     }
///
///     fn create_surface(
///         &self,
///         _entry: &ash::Entry,
///         _instance: &ash::Instance,
///     ) -> RhiResult<vk::SurfaceKHR> {
///         Ok(vk::SurfaceKHR::null())
///     }
///
///     fn poll_event(&mut self) -> Option<()> {
///         None
///     }
///
///     fn size(&self) -> (u32, u32) {
///         (800, 600)
///     }
/// }
/// ```
pub trait SurfaceProvider {
    /// Event type produced by the window.
    type Event;

    /// Instance extensions needed to create a surface for this window.
    fn required_extensions(&self) -> RhiResult<Vec<&'static CStr>>;

    /// Creates a surface on `instance`. Ownership passes to the caller.
    fn create_surface(&self, entry: &ash::Entry, instance: &ash::Instance)
    -> RhiResult<vk::SurfaceKHR>;

    /// Returns the next pending event without blocking.
    fn poll_event(&mut self) -> Option<Self::Event>;

    /// Current drawable size in pixels.
    fn size(&self) -> (u32, u32);
}

/// RAII owner of a `vk::SurfaceKHR`.
///
/// The instance it was created on must outlive it.
pub struct Surface {
    handle: vk::SurfaceKHR,
    loader: ash::khr::surface::Instance,
}

impl Surface {
    /// Creates a surface through `provider` and takes ownership of it.
    pub fn new<P: SurfaceProvider + ?Sized>(
        provider: &P,
        entry: &ash::Entry,
        instance: &ash::Instance,
    ) -> RhiResult<Self> {
        let handle = provider.create_surface(entry, instance)?;
        let loader = ash::khr::surface::Instance::new(entry, instance);
        debug!("Vulkan surface created");
        Ok(Self { handle, loader })
    }

    #[inline]
    pub fn handle(&self) -> vk::SurfaceKHR {
        self.handle
    }

    /// Surface extension loader, for capability, format and present mode queries.
    #[inline]
    pub fn loader(&self) -> &ash::khr::surface::Instance {
        &self.loader
    }

    /// Queries whether `family` on `physical_device` can present to this surface.
    pub fn supports_present(&self, physical_device: vk::PhysicalDevice, family: u32) -> bool {
        unsafe {
            self.loader
                .get_physical_device_surface_support(physical_device, family, self.handle)
                .unwrap_or(false)
        }
    }
}

impl Drop for Surface {
    fn drop(&mut self) {
        unsafe {
            self.loader.destroy_surface(self.handle, None);
        }
        debug!("Vulkan surface destroyed");
    }
}
