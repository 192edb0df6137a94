//! Bring-up decisions driven through the public API with synthetic adapters
//! and surface capabilities. No Vulkan driver is needed.

use e3d_rhi::RhiError;
use e3d_rhi::physical_device::{AdapterInfo, find_memory_type, find_queue_families, select_adapter};
use e3d_rhi::swapchain::{
    AcquireOutcome, PREFERRED_FORMAT, PresentOutcome, PresentPreference, choose_extent,
    choose_present_mode, choose_surface_format, classify_acquire, classify_present,
    determine_image_count,
};
use e3d_rhi::vk;

fn adapter(
    name: &str,
    device_type: vk::PhysicalDeviceType,
    families: &[(vk::QueueFlags, bool)],
) -> AdapterInfo {
    let mut properties = vk::PhysicalDeviceProperties {
        device_type,
        ..Default::default()
    };
    for (dst, src) in properties.device_name.iter_mut().zip(name.bytes()) {
        *dst = src as std::ffi::c_char;
    }

    AdapterInfo {
        device: vk::PhysicalDevice::null(),
        properties,
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

#[test]
fn laptop_with_two_discrete_gpus_uses_the_last_one() {
    let adapters = vec![
        adapter(
            "integrated",
            vk::PhysicalDeviceType::INTEGRATED_GPU,
            &[(vk::QueueFlags::GRAPHICS, true)],
        ),
        adapter(
            "discrete-a",
            vk::PhysicalDeviceType::DISCRETE_GPU,
            &[(vk::QueueFlags::GRAPHICS, true)],
        ),
        adapter(
            "discrete-b",
            vk::PhysicalDeviceType::DISCRETE_GPU,
            &[
                (vk::QueueFlags::TRANSFER, false),
                (vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE, false),
                (vk::QueueFlags::COMPUTE, true),
            ],
        ),
    ];

    let index = select_adapter(&adapters).expect("an adapter");
    assert_eq!(index, 2);
    assert_eq!(adapters[index].device_name(), "discrete-b");

    let families = find_queue_families(&adapters[index]).expect("queue families");
    assert_eq!(families.graphics_family, 1);
    assert_eq!(families.present_family, 2);
    assert!(families.is_split());
    assert_eq!(families.unique_families(), vec![1, 2]);
}

#[test]
fn adapter_without_present_support_is_rejected() {
    let adapters = vec![adapter(
        "headless",
        vk::PhysicalDeviceType::CPU,
        &[(vk::QueueFlags::GRAPHICS, false)],
    )];

    let index = select_adapter(&adapters).expect("fallback to first adapter");
    assert!(matches!(
        find_queue_families(&adapters[index]),
        Err(RhiError::NoSuitableQueueFamily)
    ));
}

#[test]
fn memory_type_resolution_honours_type_bits() {
    let mut props = vk::PhysicalDeviceMemoryProperties {
        memory_type_count: 3,
        ..Default::default()
    };
    props.memory_types[0].property_flags = vk::MemoryPropertyFlags::DEVICE_LOCAL;
    props.memory_types[1].property_flags =
        vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT;
    props.memory_types[2].property_flags = vk::MemoryPropertyFlags::HOST_VISIBLE
        | vk::MemoryPropertyFlags::HOST_COHERENT
        | vk::MemoryPropertyFlags::HOST_CACHED;

    let host = vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT;
    assert_eq!(find_memory_type(&props, 0b111, host).expect("type"), 1);
    assert_eq!(find_memory_type(&props, 0b100, host).expect("type"), 2);
    assert!(matches!(
        find_memory_type(&props, 0b001, host),
        Err(RhiError::NoSuitableMemoryType { type_bits: 0b001, .. })
    ));
}

#[test]
fn swapchain_parameters_for_a_fixed_size_surface() {
    let capabilities = vk::SurfaceCapabilitiesKHR {
        min_image_count: 2,
        max_image_count: 8,
        current_extent: vk::Extent2D {
            width: 1280,
            height: 720,
        },
        min_image_extent: vk::Extent2D {
            width: 1,
            height: 1,
        },
        max_image_extent: vk::Extent2D {
            width: 4096,
            height: 4096,
        },
        ..Default::default()
    };
    let formats = [
        vk::SurfaceFormatKHR {
            format: vk::Format::R8G8B8A8_SRGB,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
        },
        PREFERRED_FORMAT,
    ];
    let modes = [vk::PresentModeKHR::FIFO, vk::PresentModeKHR::MAILBOX];

    let desired = vk::Extent2D {
        width: 640,
        height: 480,
    };
    assert_eq!(choose_extent(&capabilities, desired), capabilities.current_extent);
    assert_eq!(determine_image_count(&capabilities), 3);
    assert_eq!(choose_surface_format(&formats), PREFERRED_FORMAT);
    assert_eq!(
        choose_present_mode(&modes, PresentPreference::Mailbox),
        vk::PresentModeKHR::MAILBOX
    );
    assert_eq!(
        choose_present_mode(&modes, PresentPreference::Fifo),
        vk::PresentModeKHR::FIFO
    );
}

#[test]
fn swapchain_parameters_when_the_surface_defers_to_the_window() {
    let capabilities = vk::SurfaceCapabilitiesKHR {
        min_image_count: 3,
        max_image_count: 3,
        current_extent: vk::Extent2D {
            width: u32::MAX,
            height: u32::MAX,
        },
        min_image_extent: vk::Extent2D {
            width: 64,
            height: 64,
        },
        max_image_extent: vk::Extent2D {
            width: 1920,
            height: 1080,
        },
        ..Default::default()
    };

    let extent = choose_extent(
        &capabilities,
        vk::Extent2D {
            width: 2560,
            height: 32,
        },
    );
    assert_eq!(extent.width, 1920);
    assert_eq!(extent.height, 64);
    assert_eq!(determine_image_count(&capabilities), 3);
}

#[test]
fn stale_swapchain_results_request_a_rebuild() {
    assert_eq!(
        classify_acquire(Err(vk::Result::ERROR_OUT_OF_DATE_KHR)).expect("retry"),
        AcquireOutcome::Retry
    );
    assert_eq!(
        classify_acquire(Ok((0, true))).expect("retry"),
        AcquireOutcome::Retry
    );
    assert_eq!(
        classify_present(Err(vk::Result::ERROR_OUT_OF_DATE_KHR)).expect("retry"),
        PresentOutcome::Retry
    );
    assert!(matches!(
        classify_present(Err(vk::Result::ERROR_DEVICE_LOST)),
        Err(RhiError::PresentError(vk::Result::ERROR_DEVICE_LOST))
    ));
}
