//! Swapchain management.
//!
//! This module handles VkSwapchainKHR creation, image acquisition, presentation
//! and recreation after the surface changes.
//!
//! Acquisition and presentation never treat a stale swapchain as an error.
//! `ERROR_OUT_OF_DATE_KHR` and `SUBOPTIMAL_KHR` surface as
//! [`AcquireOutcome::Retry`] / [`PresentOutcome::Retry`]; the caller skips the
//! frame (or finishes it) and calls [`Swapchain::recreate`] before the next
//! acquire. Every other failure is fatal.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use e3d_rhi::device::Device;
//! use e3d_rhi::instance::Instance;
//! use e3d_rhi::surface::Surface;
//! use e3d_rhi::swapchain::{AcquireOutcome, PresentPreference, Swapchain};
//! use e3d_rhi::vk;
//!
//! # fn example(
//! #     instance: &Instance,
//! #     device: Arc<Device>,
//! #     surface: &Surface,
//! #     image_available: vk::Semaphore,
//! # ) -> Result<(), e3d_rhi::RhiError> {
//! let desired = vk::Extent2D { width: 1280, height: 720 };
//! let mut swapchain =
//!     Swapchain::new(instance, device, surface, desired, PresentPreference::Mailbox)?;
//!
//! match swapchain.acquire_next(image_available, u64::MAX)? {
//!     AcquireOutcome::Image(index) => println!("rendering into image {index}"),
//!     AcquireOutcome::Retry => swapchain.recreate(desired)?,
//! }
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use ash::vk;
use tracing::{debug, info, warn};

use crate::device::Device;
use crate::error::{RhiError, RhiResult};
use crate::instance::Instance;
use crate::surface::Surface;

/// Preferred surface format.
pub const PREFERRED_FORMAT: vk::SurfaceFormatKHR = vk::SurfaceFormatKHR {
    format: vk::Format::B8G8R8A8_UNORM,
    color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
};

/// Present mode policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PresentPreference {
    /// MAILBOX when offered, else FIFO.
    #[default]
    Mailbox,
    /// Always FIFO (vsync).
    Fifo,
}

/// Result of [`Swapchain::acquire_next`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireOutcome {
    /// An image is ready to be rendered into.
    Image(u32),
    /// The swapchain is out of date or suboptimal. Skip submission and rebuild.
    Retry,
}

/// Result of [`Swapchain::present`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresentOutcome {
    Presented,
    /// The swapchain is out of date or suboptimal and should be rebuilt.
    Retry,
}

/// Maps a raw acquire result onto [`AcquireOutcome`].
pub fn classify_acquire(result: Result<(u32, bool), vk::Result>) -> RhiResult<AcquireOutcome> {
    match result {
        Ok((index, false)) => Ok(AcquireOutcome::Image(index)),
        Ok((_, true)) | Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(AcquireOutcome::Retry),
        Err(e) => Err(RhiError::AcquireError(e)),
    }
}

/// Maps a raw present result onto [`PresentOutcome`].
pub fn classify_present(result: Result<bool, vk::Result>) -> RhiResult<PresentOutcome> {
    match result {
        Ok(false) => Ok(PresentOutcome::Presented),
        Ok(true) | Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(PresentOutcome::Retry),
        Err(e) => Err(RhiError::PresentError(e)),
    }
}

/// Swapchain surface support details.
#[derive(Debug, Clone)]
pub struct SwapchainSupportDetails {
    /// Surface capabilities (min/max image count, extents, transforms, etc.)
    pub capabilities: vk::SurfaceCapabilitiesKHR,
    /// Supported surface formats (format and color space combinations)
    pub formats: Vec<vk::SurfaceFormatKHR>,
    /// Supported present modes (FIFO, MAILBOX, IMMEDIATE, etc.)
    pub present_modes: Vec<vk::PresentModeKHR>,
}

impl SwapchainSupportDetails {
    /// Queries swapchain support details for a physical device and surface.
    pub fn query(
        physical_device: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
        surface_loader: &ash::khr::surface::Instance,
    ) -> RhiResult<Self> {
        let capabilities = unsafe {
            surface_loader.get_physical_device_surface_capabilities(physical_device, surface)?
        };
        let formats = unsafe {
            surface_loader.get_physical_device_surface_formats(physical_device, surface)?
        };
        let present_modes = unsafe {
            surface_loader.get_physical_device_surface_present_modes(physical_device, surface)?
        };

        debug!(
            "Swapchain support: {} formats, {} present modes, image count: {}-{}",
            formats.len(),
            present_modes.len(),
            capabilities.min_image_count,
            capabilities.max_image_count
        );

        Ok(Self {
            capabilities,
            formats,
            present_modes,
        })
    }

    /// Returns true if at least one format is available. FIFO is always
    /// available, so an empty present mode list is tolerated.
    #[inline]
    pub fn is_adequate(&self) -> bool {
        !self.formats.is_empty()
    }
}

/// Vulkan swapchain wrapper.
///
/// Owns the swapchain and its image views. Framebuffers and anything else
/// bound to the images belong to their users, who must rebuild them after
/// [`recreate`](Self::recreate).
///
/// The [`Surface`] it was created from must outlive it.
pub struct Swapchain {
    device: Arc<Device>,
    swapchain_loader: ash::khr::swapchain::Device,
    surface: vk::SurfaceKHR,
    surface_loader: ash::khr::surface::Instance,
    preference: PresentPreference,

    swapchain: vk::SwapchainKHR,
    images: Vec<vk::Image>,
    image_views: Vec<vk::ImageView>,
    format: vk::Format,
    color_space: vk::ColorSpaceKHR,
    extent: vk::Extent2D,
    present_mode: vk::PresentModeKHR,
}

impl Swapchain {
    /// Creates a swapchain for `surface`.
    ///
    /// `desired_extent` is only used when the surface leaves the extent to
    /// the application.
    ///
    /// # Errors
    ///
    /// [`RhiError::SwapchainError`] when the surface offers no formats, has a
    /// zero extent, or swapchain/image view creation fails.
    pub fn new(
        instance: &Instance,
        device: Arc<Device>,
        surface: &Surface,
        desired_extent: vk::Extent2D,
        preference: PresentPreference,
    ) -> RhiResult<Self> {
        let mut swapchain = Self {
            swapchain_loader: ash::khr::swapchain::Device::new(instance.handle(), device.handle()),
            device,
            surface: surface.handle(),
            surface_loader: surface.loader().clone(),
            preference,
            swapchain: vk::SwapchainKHR::null(),
            images: Vec::new(),
            image_views: Vec::new(),
            format: vk::Format::UNDEFINED,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            extent: vk::Extent2D::default(),
            present_mode: vk::PresentModeKHR::FIFO,
        };
        swapchain.create(desired_extent)?;
        Ok(swapchain)
    }

    fn create(&mut self, desired_extent: vk::Extent2D) -> RhiResult<()> {
        let support = SwapchainSupportDetails::query(
            self.device.physical_device(),
            self.surface,
            &self.surface_loader,
        )?;
        if !support.is_adequate() {
            return Err(RhiError::SwapchainError(
                "surface reports no formats".to_string(),
            ));
        }

        let surface_format = choose_surface_format(&support.formats);
        let present_mode = choose_present_mode(&support.present_modes, self.preference);
        let extent = choose_extent(&support.capabilities, desired_extent);
        let image_count = determine_image_count(&support.capabilities);

        if extent.width == 0 || extent.height == 0 {
            return Err(RhiError::SwapchainError(
                "surface has a zero extent".to_string(),
            ));
        }

        let families = self.device.queue_families();
        let family_indices = [families.graphics_family, families.present_family];
        let (sharing_mode, shared_families): (vk::SharingMode, &[u32]) = if families.is_split() {
            (vk::SharingMode::CONCURRENT, &family_indices)
        } else {
            (vk::SharingMode::EXCLUSIVE, &[])
        };

        let create_info = vk::SwapchainCreateInfoKHR::default()
            .surface(self.surface)
            .min_image_count(image_count)
            .image_format(surface_format.format)
            .image_color_space(surface_format.color_space)
            .image_extent(extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .image_sharing_mode(sharing_mode)
            .queue_family_indices(shared_families)
            .pre_transform(support.capabilities.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(present_mode)
            .clipped(true);

        let swapchain = unsafe { self.swapchain_loader.create_swapchain(&create_info, None) }
            .map_err(|e| RhiError::SwapchainError(format!("create swapchain: {e}")))?;

        let images = match unsafe { self.swapchain_loader.get_swapchain_images(swapchain) } {
            Ok(images) => images,
            Err(e) => {
                unsafe { self.swapchain_loader.destroy_swapchain(swapchain, None) };
                return Err(RhiError::SwapchainError(format!("get swapchain images: {e}")));
            }
        };

        let image_views = match create_image_views(&self.device, &images, surface_format.format) {
            Ok(views) => views,
            Err(e) => {
                unsafe { self.swapchain_loader.destroy_swapchain(swapchain, None) };
                return Err(e);
            }
        };

        info!(
            "Swapchain created: {}x{}, {} images, {:?}, {:?}",
            extent.width,
            extent.height,
            images.len(),
            surface_format.format,
            present_mode
        );

        self.swapchain = swapchain;
        self.images = images;
        self.image_views = image_views;
        self.format = surface_format.format;
        self.color_space = surface_format.color_space;
        self.extent = extent;
        self.present_mode = present_mode;
        Ok(())
    }

    /// Rebuilds the swapchain against the current surface.
    ///
    /// Waits for the device to go idle, destroys the image views and the old
    /// swapchain, then creates everything afresh.
    pub fn recreate(&mut self, desired_extent: vk::Extent2D) -> RhiResult<()> {
        self.device.wait_idle()?;
        self.destroy();
        self.create(desired_extent)
    }

    /// Acquires the next presentable image, signalling `semaphore` when it is ready.
    pub fn acquire_next(&self, semaphore: vk::Semaphore, timeout: u64) -> RhiResult<AcquireOutcome> {
        let result = unsafe {
            self.swapchain_loader.acquire_next_image(
                self.swapchain,
                timeout,
                semaphore,
                vk::Fence::null(),
            )
        };
        classify_acquire(result)
    }

    /// Queues `image_index` for presentation once `wait_semaphore` is signaled.
    pub fn present(
        &self,
        queue: vk::Queue,
        image_index: u32,
        wait_semaphore: vk::Semaphore,
    ) -> RhiResult<PresentOutcome> {
        let wait_semaphores = [wait_semaphore];
        let swapchains = [self.swapchain];
        let image_indices = [image_index];

        let present_info = vk::PresentInfoKHR::default()
            .wait_semaphores(&wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        let result = unsafe { self.swapchain_loader.queue_present(queue, &present_info) };
        classify_present(result)
    }

    #[inline]
    pub fn handle(&self) -> vk::SwapchainKHR {
        self.swapchain
    }

    #[inline]
    pub fn format(&self) -> vk::Format {
        self.format
    }

    #[inline]
    pub fn color_space(&self) -> vk::ColorSpaceKHR {
        self.color_space
    }

    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    #[inline]
    pub fn present_mode(&self) -> vk::PresentModeKHR {
        self.present_mode
    }

    #[inline]
    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    #[inline]
    pub fn image_views(&self) -> &[vk::ImageView] {
        &self.image_views
    }

    fn destroy(&mut self) {
        for view in self.image_views.drain(..) {
            unsafe { self.device.handle().destroy_image_view(view, None) };
        }
        self.images.clear();

        if self.swapchain != vk::SwapchainKHR::null() {
            unsafe {
                self.swapchain_loader
                    .destroy_swapchain(self.swapchain, None);
            }
            self.swapchain = vk::SwapchainKHR::null();
            debug!(
                "Swapchain destroyed (was {}x{})",
                self.extent.width, self.extent.height
            );
        }
    }
}

impl Drop for Swapchain {
    fn drop(&mut self) {
        self.destroy();
    }
}

/// Chooses the surface format.
///
/// Prefers [`PREFERRED_FORMAT`]; otherwise takes the first reported entry.
pub fn choose_surface_format(formats: &[vk::SurfaceFormatKHR]) -> vk::SurfaceFormatKHR {
    if formats.contains(&PREFERRED_FORMAT) {
        return PREFERRED_FORMAT;
    }
    let first = formats.first().copied().unwrap_or(PREFERRED_FORMAT);
    warn!("Preferred surface format unavailable, using {:?}", first.format);
    first
}

/// Chooses the present mode.
///
/// MAILBOX when offered and preferred; FIFO otherwise, which the platform
/// guarantees even if it is missing from `present_modes`.
pub fn choose_present_mode(
    present_modes: &[vk::PresentModeKHR],
    preference: PresentPreference,
) -> vk::PresentModeKHR {
    if preference == PresentPreference::Mailbox
        && present_modes.contains(&vk::PresentModeKHR::MAILBOX)
    {
        return vk::PresentModeKHR::MAILBOX;
    }
    vk::PresentModeKHR::FIFO
}

/// Chooses the swapchain extent.
///
/// Uses the surface's current extent unless it is the `u32::MAX` sentinel,
/// in which case `desired` is clamped to the surface's limits.
pub fn choose_extent(capabilities: &vk::SurfaceCapabilitiesKHR, desired: vk::Extent2D) -> vk::Extent2D {
    if capabilities.current_extent.width != u32::MAX {
        return capabilities.current_extent;
    }

    vk::Extent2D {
        width: desired.width.clamp(
            capabilities.min_image_extent.width,
            capabilities.max_image_extent.width,
        ),
        height: desired.height.clamp(
            capabilities.min_image_extent.height,
            capabilities.max_image_extent.height,
        ),
    }
}

/// One more image than the minimum, capped by the maximum when it is nonzero.
pub fn determine_image_count(capabilities: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let preferred = capabilities.min_image_count + 1;
    if capabilities.max_image_count > 0 {
        preferred.min(capabilities.max_image_count)
    } else {
        preferred
    }
}

fn create_image_views(
    device: &Device,
    images: &[vk::Image],
    format: vk::Format,
) -> RhiResult<Vec<vk::ImageView>> {
    let mut image_views = Vec::with_capacity(images.len());

    for (i, &image) in images.iter().enumerate() {
        let create_info = vk::ImageViewCreateInfo::default()
            .image(image)
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(format)
            .components(vk::ComponentMapping {
                r: vk::ComponentSwizzle::IDENTITY,
                g: vk::ComponentSwizzle::IDENTITY,
                b: vk::ComponentSwizzle::IDENTITY,
                a: vk::ComponentSwizzle::IDENTITY,
            })
            .subresource_range(
                vk::ImageSubresourceRange::default()
                    .aspect_mask(vk::ImageAspectFlags::COLOR)
                    .level_count(1)
                    .layer_count(1),
            );

        match unsafe { device.handle().create_image_view(&create_info, None) } {
            Ok(view) => image_views.push(view),
            Err(e) => {
                for view in image_views {
                    unsafe { device.handle().destroy_image_view(view, None) };
                }
                return Err(RhiError::SwapchainError(format!(
                    "create image view {i}: {e}"
                )));
            }
        }
    }

    Ok(image_views)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn format(format: vk::Format) -> vk::SurfaceFormatKHR {
        vk::SurfaceFormatKHR {
            format,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
        }
    }

    fn counts(min: u32, max: u32) -> vk::SurfaceCapabilitiesKHR {
        vk::SurfaceCapabilitiesKHR {
            min_image_count: min,
            max_image_count: max,
            ..Default::default()
        }
    }

    #[test]
    fn test_choose_surface_format_prefers_bgra_unorm() {
        let formats = [
            format(vk::Format::R8G8B8A8_UNORM),
            format(vk::Format::B8G8R8A8_SRGB),
            format(vk::Format::B8G8R8A8_UNORM),
        ];
        assert_eq!(choose_surface_format(&formats), PREFERRED_FORMAT);
    }

    #[test]
    fn test_choose_surface_format_needs_matching_color_space() {
        let formats = [
            format(vk::Format::R8G8B8A8_UNORM),
            vk::SurfaceFormatKHR {
                format: vk::Format::B8G8R8A8_UNORM,
                color_space: vk::ColorSpaceKHR::EXTENDED_SRGB_LINEAR_EXT,
            },
        ];
        assert_eq!(
            choose_surface_format(&formats).format,
            vk::Format::R8G8B8A8_UNORM
        );
    }

    #[test]
    fn test_choose_surface_format_falls_back_to_first() {
        let formats = [
            format(vk::Format::R16G16B16A16_SFLOAT),
            format(vk::Format::R8G8B8A8_UNORM),
        ];
        assert_eq!(
            choose_surface_format(&formats).format,
            vk::Format::R16G16B16A16_SFLOAT
        );
    }

    #[test]
    fn test_choose_present_mode_prefers_mailbox() {
        let modes = [
            vk::PresentModeKHR::FIFO,
            vk::PresentModeKHR::MAILBOX,
            vk::PresentModeKHR::IMMEDIATE,
        ];
        assert_eq!(
            choose_present_mode(&modes, PresentPreference::Mailbox),
            vk::PresentModeKHR::MAILBOX
        );
    }

    #[test]
    fn test_choose_present_mode_fifo_even_if_unlisted() {
        let modes = [vk::PresentModeKHR::IMMEDIATE];
        assert_eq!(
            choose_present_mode(&modes, PresentPreference::Mailbox),
            vk::PresentModeKHR::FIFO
        );
        assert_eq!(
            choose_present_mode(&[], PresentPreference::Mailbox),
            vk::PresentModeKHR::FIFO
        );
    }

    #[test]
    fn test_choose_present_mode_forced_fifo() {
        let modes = [vk::PresentModeKHR::MAILBOX, vk::PresentModeKHR::FIFO];
        assert_eq!(
            choose_present_mode(&modes, PresentPreference::Fifo),
            vk::PresentModeKHR::FIFO
        );
    }

    #[test]
    fn test_choose_extent_uses_current() {
        let capabilities = vk::SurfaceCapabilitiesKHR {
            current_extent: vk::Extent2D {
                width: 1920,
                height: 1080,
            },
            max_image_extent: vk::Extent2D {
                width: 4096,
                height: 4096,
            },
            ..Default::default()
        };
        let extent = choose_extent(
            &capabilities,
            vk::Extent2D {
                width: 800,
                height: 600,
            },
        );
        assert_eq!((extent.width, extent.height), (1920, 1080));
    }

    #[test]
    fn test_choose_extent_sentinel_uses_desired() {
        let capabilities = vk::SurfaceCapabilitiesKHR {
            current_extent: vk::Extent2D {
                width: u32::MAX,
                height: u32::MAX,
            },
            min_image_extent: vk::Extent2D {
                width: 100,
                height: 100,
            },
            max_image_extent: vk::Extent2D {
                width: 2000,
                height: 2000,
            },
            ..Default::default()
        };

        let within = choose_extent(&capabilities, vk::Extent2D { width: 800, height: 600 });
        assert_eq!((within.width, within.height), (800, 600));

        let clamped = choose_extent(&capabilities, vk::Extent2D { width: 3000, height: 50 });
        assert_eq!((clamped.width, clamped.height), (2000, 100));
    }

    #[test]
    fn test_determine_image_count() {
        assert_eq!(determine_image_count(&counts(2, 4)), 3);
        assert_eq!(determine_image_count(&counts(3, 3)), 3);
        assert_eq!(determine_image_count(&counts(2, 0)), 3);
    }

    #[test]
    fn test_classify_acquire() {
        assert_eq!(classify_acquire(Ok((1, false))).unwrap(), AcquireOutcome::Image(1));
        assert_eq!(classify_acquire(Ok((1, true))).unwrap(), AcquireOutcome::Retry);
        assert_eq!(
            classify_acquire(Err(vk::Result::ERROR_OUT_OF_DATE_KHR)).unwrap(),
            AcquireOutcome::Retry
        );
        assert!(matches!(
            classify_acquire(Err(vk::Result::ERROR_DEVICE_LOST)),
            Err(RhiError::AcquireError(vk::Result::ERROR_DEVICE_LOST))
        ));
    }

    #[test]
    fn test_classify_present() {
        assert_eq!(classify_present(Ok(false)).unwrap(), PresentOutcome::Presented);
        assert_eq!(classify_present(Ok(true)).unwrap(), PresentOutcome::Retry);
        assert_eq!(
            classify_present(Err(vk::Result::ERROR_OUT_OF_DATE_KHR)).unwrap(),
            PresentOutcome::Retry
        );
        assert!(matches!(
            classify_present(Err(vk::Result::ERROR_SURFACE_LOST_KHR)),
            Err(RhiError::PresentError(_))
        ));
    }

    #[test]
    fn test_support_details_adequate_without_present_modes() {
        let details = SwapchainSupportDetails {
            capabilities: vk::SurfaceCapabilitiesKHR::default(),
            formats: vec![PREFERRED_FORMAT],
            present_modes: vec![],
        };
        assert!(details.is_adequate());

        let no_formats = SwapchainSupportDetails {
            formats: vec![],
            ..details
        };
        assert!(!no_formats.is_adequate());
    }
}
