//! Physical device (GPU) selection.
//!
//! Selection is split into a query step that snapshots everything the policy
//! needs into an [`AdapterInfo`], and pure policy functions over those
//! snapshots:
//!
//! 1. [`select_adapter`] picks the last discrete GPU, else the first adapter
//! 2. [`find_queue_families`] finds the first graphics family and, independently,
//!    the first family able to present to the surface
//! 3. [`find_memory_type`] resolves allocation requirements against the
//!    adapter's memory types
//!
//! # Example
//!
//! ```no_run
//! use e3d_rhi::physical_device::{enumerate_adapters, find_queue_families, select_adapter};
//! use e3d_rhi::instance::Instance;
//! use e3d_rhi::surface::Surface;
//!
//! # fn example(instance: &Instance, surface: &Surface) -> Result<(), e3d_rhi::RhiError> {
//! let adapters = enumerate_adapters(instance.handle(), surface)?;
//! if let Some(index) = select_adapter(&adapters) {
//!     let families = find_queue_families(&adapters[index])?;
//!     println!("{} -> {:?}", adapters[index].device_name(), families);
//! }
//! # Ok(())
//! # }
//! ```

use ash::vk;
use tracing::{debug, info};

use crate::error::{RhiError, RhiResult};
use crate::surface::Surface;

/// Queue family indices chosen for a device.
///
/// The two indices may be equal, in which case a single queue serves both roles.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct QueueFamilyIndices {
    /// Index of the queue family that supports graphics operations.
    pub graphics_family: u32,
    /// Index of the queue family that supports presentation to the surface.
    pub present_family: u32,
}

impl QueueFamilyIndices {
    /// Returns true when graphics and presentation use different families.
    #[inline]
    pub fn is_split(&self) -> bool {
        self.graphics_family != self.present_family
    }

    /// Returns the distinct family indices, graphics first.
    pub fn unique_families(&self) -> Vec<u32> {
        if self.is_split() {
            vec![self.graphics_family, self.present_family]
        } else {
            vec![self.graphics_family]
        }
    }
}

/// Read-only snapshot of an available GPU.
#[derive(Clone)]
pub struct AdapterInfo {
    /// Vulkan physical device handle.
    pub device: vk::PhysicalDevice,
    /// Device properties (name, type, limits, API version).
    pub properties: vk::PhysicalDeviceProperties,
    /// Memory heaps and memory types.
    pub memory_properties: vk::PhysicalDeviceMemoryProperties,
    /// Queue family properties in index order.
    pub queue_families: Vec<vk::QueueFamilyProperties>,
    /// Per-family surface presentation support, parallel to `queue_families`.
    pub present_support: Vec<bool>,
}

impl AdapterInfo {
    /// Queries all properties of `device` relevant to selection.
    pub fn query(instance: &ash::Instance, device: vk::PhysicalDevice, surface: &Surface) -> Self {
        let properties = unsafe { instance.get_physical_device_properties(device) };
        let memory_properties = unsafe { instance.get_physical_device_memory_properties(device) };
        let queue_families =
            unsafe { instance.get_physical_device_queue_family_properties(device) };
        let present_support = (0..queue_families.len() as u32)
            .map(|family| surface.supports_present(device, family))
            .collect();

        Self {
            device,
            properties,
            memory_properties,
            queue_families,
            present_support,
        }
    }

    /// Returns the device name as a string.
    pub fn device_name(&self) -> &str {
        self.properties
            .device_name_as_c_str()
            .ok()
            .and_then(|name| name.to_str().ok())
            .unwrap_or("Unknown Device")
    }

    /// Returns the device type (Discrete, Integrated, etc.).
    #[inline]
    pub fn device_type(&self) -> vk::PhysicalDeviceType {
        self.properties.device_type
    }

    /// Returns a human-readable string for the device type.
    pub fn device_type_name(&self) -> &'static str {
        match self.properties.device_type {
            vk::PhysicalDeviceType::DISCRETE_GPU => "Discrete GPU",
            vk::PhysicalDeviceType::INTEGRATED_GPU => "Integrated GPU",
            vk::PhysicalDeviceType::VIRTUAL_GPU => "Virtual GPU",
            vk::PhysicalDeviceType::CPU => "CPU",
            _ => "Other",
        }
    }

    /// Returns the Vulkan API version supported by the device.
    pub fn api_version(&self) -> (u32, u32, u32) {
        let version = self.properties.api_version;
        (
            vk::api_version_major(version),
            vk::api_version_minor(version),
            vk::api_version_patch(version),
        )
    }
}

impl std::fmt::Debug for AdapterInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdapterInfo")
            .field("name", &self.device_name())
            .field("type", &self.device_type_name())
            .field("api_version", &self.api_version())
            .field("queue_families", &self.queue_families.len())
            .finish()
    }
}

/// Enumerates every physical device and snapshots it against `surface`.
pub fn enumerate_adapters(instance: &ash::Instance, surface: &Surface) -> RhiResult<Vec<AdapterInfo>> {
    let devices = unsafe { instance.enumerate_physical_devices() }.map_err(|e| {
        RhiError::InitializationError(format!("enumerate physical devices: {e}"))
    })?;

    let adapters: Vec<AdapterInfo> = devices
        .into_iter()
        .map(|device| AdapterInfo::query(instance, device, surface))
        .collect();

    for adapter in &adapters {
        debug!(
            "Found adapter: {} ({})",
            adapter.device_name(),
            adapter.device_type_name()
        );
    }

    Ok(adapters)
}

/// Picks an adapter index.
///
/// Returns the last discrete GPU in enumeration order, or the first adapter
/// when none is discrete. `None` only for an empty list.
pub fn select_adapter(adapters: &[AdapterInfo]) -> Option<usize> {
    if adapters.is_empty() {
        return None;
    }

    let selected = adapters
        .iter()
        .rposition(|a| a.device_type() == vk::PhysicalDeviceType::DISCRETE_GPU)
        .unwrap_or(0);

    info!(
        "Selected adapter: {} ({})",
        adapters[selected].device_name(),
        adapters[selected].device_type_name()
    );
    Some(selected)
}

/// Finds the graphics and present queue families of `adapter`.
///
/// Families are scanned in index order. The first graphics-capable family and
/// the first present-capable family are recorded independently, and the scan
/// stops as soon as both are known.
///
/// # Errors
///
/// [`RhiError::NoSuitableQueueFamily`] if either role has no family.
pub fn find_queue_families(adapter: &AdapterInfo) -> RhiResult<QueueFamilyIndices> {
    let mut graphics_family = None;
    let mut present_family = None;

    for (i, family) in adapter.queue_families.iter().enumerate() {
        let index = i as u32;

        if graphics_family.is_none()
            && family.queue_count > 0
            && family.queue_flags.contains(vk::QueueFlags::GRAPHICS)
        {
            graphics_family = Some(index);
        }

        if present_family.is_none() && adapter.present_support.get(i).copied().unwrap_or(false) {
            present_family = Some(index);
        }

        if graphics_family.is_some() && present_family.is_some() {
            break;
        }
    }

    match (graphics_family, present_family) {
        (Some(graphics_family), Some(present_family)) => {
            debug!(
                "Queue families: graphics={}, present={}",
                graphics_family, present_family
            );
            Ok(QueueFamilyIndices {
                graphics_family,
                present_family,
            })
        }
        _ => Err(RhiError::NoSuitableQueueFamily),
    }
}

/// Returns the first memory type index allowed by `type_bits` whose property
/// flags contain all of `properties`.
///
/// # Errors
///
/// [`RhiError::NoSuitableMemoryType`] when no type matches. There is no
/// fallback to weaker properties.
pub fn find_memory_type(
    memory_properties: &vk::PhysicalDeviceMemoryProperties,
    type_bits: u32,
    properties: vk::MemoryPropertyFlags,
) -> RhiResult<u32> {
    let count = memory_properties.memory_type_count.min(vk::MAX_MEMORY_TYPES as u32);

    (0..count)
        .find(|&i| {
            type_bits & (1 << i) != 0
                && memory_properties.memory_types[i as usize]
                    .property_flags
                    .contains(properties)
        })
        .ok_or(RhiError::NoSuitableMemoryType {
            type_bits,
            properties,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adapter(device_type: vk::PhysicalDeviceType, families: &[(vk::QueueFlags, bool)]) -> AdapterInfo {
        AdapterInfo {
            device: vk::PhysicalDevice::null(),
            properties: vk::PhysicalDeviceProperties {
                device_type,
                ..Default::default()
            },
            memory_properties: vk::PhysicalDeviceMemoryProperties::default(),
            queue_families: families
                .iter()
                .map(|(flags, _)| vk::QueueFamilyProperties {
                    queue_flags: *flags,
                    queue_count: 1,
                    ..Default::default()
                })
                .collect(),
            present_support: families.iter().map(|(_, present)| *present).collect(),
        }
    }

    fn typed(device_type: vk::PhysicalDeviceType) -> AdapterInfo {
        adapter(device_type, &[(vk::QueueFlags::GRAPHICS, true)])
    }

    fn memory(flags: &[vk::MemoryPropertyFlags]) -> vk::PhysicalDeviceMemoryProperties {
        let mut props = vk::PhysicalDeviceMemoryProperties {
            memory_type_count: flags.len() as u32,
            ..Default::default()
        };
        for (i, f) in flags.iter().enumerate() {
            props.memory_types[i].property_flags = *f;
        }
        props
    }

    #[test]
    fn test_select_adapter_empty() {
        assert_eq!(select_adapter(&[]), None);
    }

    #[test]
    fn test_select_adapter_prefers_last_discrete() {
        let adapters = [
            typed(vk::PhysicalDeviceType::INTEGRATED_GPU),
            typed(vk::PhysicalDeviceType::DISCRETE_GPU),
            typed(vk::PhysicalDeviceType::CPU),
            typed(vk::PhysicalDeviceType::DISCRETE_GPU),
            typed(vk::PhysicalDeviceType::VIRTUAL_GPU),
        ];
        assert_eq!(select_adapter(&adapters), Some(3));
    }

    #[test]
    fn test_select_adapter_falls_back_to_first() {
        let adapters = [
            typed(vk::PhysicalDeviceType::INTEGRATED_GPU),
            typed(vk::PhysicalDeviceType::VIRTUAL_GPU),
        ];
        assert_eq!(select_adapter(&adapters), Some(0));
    }

    #[test]
    fn test_queue_families_shared() {
        let a = adapter(
            vk::PhysicalDeviceType::DISCRETE_GPU,
            &[(vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE, true)],
        );
        let families = find_queue_families(&a).unwrap();
        assert_eq!(families.graphics_family, 0);
        assert_eq!(families.present_family, 0);
        assert!(!families.is_split());
        assert_eq!(families.unique_families(), vec![0]);
    }

    #[test]
    fn test_queue_families_split() {
        let a = adapter(
            vk::PhysicalDeviceType::DISCRETE_GPU,
            &[
                (vk::QueueFlags::GRAPHICS, false),
                (vk::QueueFlags::TRANSFER, true),
            ],
        );
        let families = find_queue_families(&a).unwrap();
        assert_eq!(families.graphics_family, 0);
        assert_eq!(families.present_family, 1);
        assert_eq!(families.unique_families(), vec![0, 1]);
    }

    #[test]
    fn test_queue_families_take_first_match() {
        let a = adapter(
            vk::PhysicalDeviceType::DISCRETE_GPU,
            &[
                (vk::QueueFlags::COMPUTE, true),
                (vk::QueueFlags::GRAPHICS, true),
                (vk::QueueFlags::GRAPHICS, true),
            ],
        );
        let families = find_queue_families(&a).unwrap();
        assert_eq!(families.graphics_family, 1);
        assert_eq!(families.present_family, 0);
    }

    #[test]
    fn test_queue_families_missing_present() {
        let a = adapter(
            vk::PhysicalDeviceType::DISCRETE_GPU,
            &[(vk::QueueFlags::GRAPHICS, false)],
        );
        assert!(matches!(
            find_queue_families(&a),
            Err(RhiError::NoSuitableQueueFamily)
        ));
    }

    #[test]
    fn test_queue_families_missing_graphics() {
        let a = adapter(
            vk::PhysicalDeviceType::DISCRETE_GPU,
            &[(vk::QueueFlags::COMPUTE, true)],
        );
        assert!(matches!(
            find_queue_families(&a),
            Err(RhiError::NoSuitableQueueFamily)
        ));
    }

    #[test]
    fn test_find_memory_type_matches_bit_and_flags() {
        let props = memory(&[
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
            vk::MemoryPropertyFlags::HOST_VISIBLE,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        ]);
        let wanted = vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT;
        assert_eq!(find_memory_type(&props, 0b100, wanted).unwrap(), 2);
        assert_eq!(find_memory_type(&props, 0b111, wanted).unwrap(), 2);
    }

    #[test]
    fn test_find_memory_type_first_of_several() {
        let props = memory(&[
            vk::MemoryPropertyFlags::HOST_VISIBLE,
            vk::MemoryPropertyFlags::HOST_VISIBLE,
        ]);
        assert_eq!(
            find_memory_type(&props, 0b11, vk::MemoryPropertyFlags::HOST_VISIBLE).unwrap(),
            0
        );
    }

    #[test]
    fn test_find_memory_type_bit_excludes_match() {
        let props = memory(&[
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
            vk::MemoryPropertyFlags::HOST_VISIBLE,
        ]);
        let result = find_memory_type(&props, 0b01, vk::MemoryPropertyFlags::HOST_VISIBLE);
        assert!(matches!(
            result,
            Err(RhiError::NoSuitableMemoryType { type_bits: 0b01, .. })
        ));
    }

    #[test]
    fn test_find_memory_type_none() {
        let props = memory(&[]);
        assert!(find_memory_type(&props, u32::MAX, vk::MemoryPropertyFlags::empty()).is_err());
    }
}
