//! Vulkan instance management.
//!
//! This module handles VkInstance creation, validation layers, and the debug
//! messenger.
//!
//! Validation is all-or-nothing: the Khronos layer is enabled only when the
//! layer itself, `VK_EXT_debug_report` and `VK_EXT_debug_utils` are all
//! installed. When any of them is missing the instance is created without
//! validation and no error is reported.
//!
//! # Example
//!
//! ```no_run
//! use e3d_rhi::instance::Instance;
//!
//! # fn example() -> Result<(), e3d_rhi::RhiError> {
//! let instance = Instance::new(&[ash::khr::surface::NAME], cfg!(debug_assertions))?;
//! println!("validation: {}", instance.has_validation());
//! # Ok(())
//! # }
//! ```

use std::ffi::{CStr, c_char};

use ash::{Entry, vk};
use tracing::{debug, error, info, warn};

use crate::error::{RhiError, RhiResult};

/// The Khronos validation layer name.
pub const VALIDATION_LAYER_NAME: &CStr = c"VK_LAYER_KHRONOS_validation";

/// Instance extensions that must all be present for validation to be enabled.
pub const VALIDATION_EXTENSIONS: [&CStr; 2] =
    [ash::ext::debug_report::NAME, ash::ext::debug_utils::NAME];

/// Returns true when the validation layer and both debug extensions are available.
pub fn validation_supported(extensions: &[&CStr], layers: &[&CStr]) -> bool {
    layers.contains(&VALIDATION_LAYER_NAME)
        && VALIDATION_EXTENSIONS
            .iter()
            .all(|required| extensions.contains(required))
}

/// Builds the instance extension list.
///
/// Starts from the window system's `required` list, adds
/// `VK_KHR_get_physical_device_properties2` when the loader offers it and the
/// debug extensions when `validation` is set. Duplicates are dropped.
pub fn instance_extensions(
    required: &[&'static CStr],
    available: &[&CStr],
    validation: bool,
) -> Vec<&'static CStr> {
    let mut extensions: Vec<&'static CStr> = Vec::with_capacity(required.len() + 3);
    let mut push = |name: &'static CStr| {
        if !extensions.contains(&name) {
            extensions.push(name);
        }
    };

    required.iter().copied().for_each(&mut push);
    if available.contains(&ash::khr::get_physical_device_properties2::NAME) {
        push(ash::khr::get_physical_device_properties2::NAME);
    }
    if validation {
        VALIDATION_EXTENSIONS.iter().copied().for_each(&mut push);
    }
    extensions
}

/// Vulkan instance wrapper with optional validation layer support.
///
/// This struct manages the lifetime of the Vulkan instance and its associated
/// debug messenger. When dropped, it destroys the messenger before the instance.
pub struct Instance {
    /// Vulkan entry point loader
    entry: Entry,
    /// Vulkan instance handle
    instance: ash::Instance,
    /// Debug utils loader and messenger, present only with validation
    debug: Option<(ash::ext::debug_utils::Instance, vk::DebugUtilsMessengerEXT)>,
}

impl Instance {
    /// Creates a new Vulkan instance.
    ///
    /// # Arguments
    ///
    /// * `required_extensions` - Extensions the window system needs for surface creation
    /// * `request_validation` - Enable validation if the host supports it
    ///
    /// # Errors
    ///
    /// Returns [`RhiError::LoadingError`] if the Vulkan library cannot be
    /// loaded and [`RhiError::InitializationError`] if instance or debug
    /// messenger creation fails.
    pub fn new(required_extensions: &[&'static CStr], request_validation: bool) -> RhiResult<Self> {
        let entry = unsafe { Entry::load()? };

        let ext_props = unsafe { entry.enumerate_instance_extension_properties(None) }
            .map_err(|e| init_error("enumerate instance extensions", e))?;
        let layer_props = unsafe { entry.enumerate_instance_layer_properties() }
            .map_err(|e| init_error("enumerate instance layers", e))?;

        let available_extensions: Vec<&CStr> = ext_props
            .iter()
            .filter_map(|p| p.extension_name_as_c_str().ok())
            .collect();
        let available_layers: Vec<&CStr> = layer_props
            .iter()
            .filter_map(|p| p.layer_name_as_c_str().ok())
            .collect();

        let validation = request_validation
            && validation_supported(&available_extensions, &available_layers);
        if request_validation && !validation {
            debug!("Validation requested but layer or debug extensions missing, running without it");
        }

        let enabled_extensions =
            instance_extensions(required_extensions, &available_extensions, validation);

        let app_info = vk::ApplicationInfo::default()
            .application_name(c"Hello Triangle")
            .application_version(vk::make_api_version(0, 1, 0, 0))
            .engine_name(c"e3d")
            .engine_version(vk::make_api_version(0, 1, 0, 0))
            .api_version(vk::API_VERSION_1_0);

        let extension_ptrs: Vec<*const c_char> =
            enabled_extensions.iter().map(|e| e.as_ptr()).collect();
        let layer_ptrs: Vec<*const c_char> = if validation {
            vec![VALIDATION_LAYER_NAME.as_ptr()]
        } else {
            vec![]
        };

        let create_info = vk::InstanceCreateInfo::default()
            .application_info(&app_info)
            .enabled_extension_names(&extension_ptrs)
            .enabled_layer_names(&layer_ptrs);

        let instance = unsafe { entry.create_instance(&create_info, None) }
            .map_err(|e| init_error("create instance", e))?;

        info!(
            "Vulkan instance created with {} extension(s)",
            enabled_extensions.len()
        );

        let debug = if validation {
            let loader = ash::ext::debug_utils::Instance::new(&entry, &instance);
            match Self::setup_debug_messenger(&loader) {
                Ok(messenger) => {
                    info!("Validation layers enabled");
                    Some((loader, messenger))
                }
                Err(e) => {
                    unsafe { instance.destroy_instance(None) };
                    return Err(e);
                }
            }
        } else {
            None
        };

        Ok(Self {
            entry,
            instance,
            debug,
        })
    }

    /// Returns the Vulkan instance handle.
    #[inline]
    pub fn handle(&self) -> &ash::Instance {
        &self.instance
    }

    /// Returns the Vulkan entry point loader.
    #[inline]
    pub fn entry(&self) -> &Entry {
        &self.entry
    }

    /// Returns whether validation layers are enabled.
    #[inline]
    pub fn has_validation(&self) -> bool {
        self.debug.is_some()
    }

    fn setup_debug_messenger(
        debug_utils: &ash::ext::debug_utils::Instance,
    ) -> RhiResult<vk::DebugUtilsMessengerEXT> {
        let create_info = vk::DebugUtilsMessengerCreateInfoEXT::default()
            .message_severity(
                vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE
                    | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                    | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
            )
            .message_type(
                vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                    | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                    | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
            )
            .pfn_user_callback(Some(debug_callback));

        unsafe { debug_utils.create_debug_utils_messenger(&create_info, None) }
            .map_err(|e| init_error("create debug messenger", e))
    }
}

impl Drop for Instance {
    fn drop(&mut self) {
        unsafe {
            if let Some((loader, messenger)) = self.debug.take() {
                loader.destroy_debug_utils_messenger(messenger, None);
            }
            self.instance.destroy_instance(None);
        }
        info!("Vulkan instance destroyed");
    }
}

fn init_error(what: &str, result: vk::Result) -> RhiError {
    RhiError::InitializationError(format!("{what}: {result}"))
}

/// Routes validation layer messages into tracing.
unsafe extern "system" fn debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    _message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    p_callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT<'_>,
    _user_data: *mut std::ffi::c_void,
) -> vk::Bool32 {
    if p_callback_data.is_null() {
        return vk::FALSE;
    }

    let callback_data = unsafe { &*p_callback_data };
    let message = if callback_data.p_message.is_null() {
        std::borrow::Cow::Borrowed("(no message)")
    } else {
        unsafe { CStr::from_ptr(callback_data.p_message).to_string_lossy() }
    };

    match message_severity {
        vk::DebugUtilsMessageSeverityFlagsEXT::ERROR => error!("validation layer: {}", message),
        vk::DebugUtilsMessageSeverityFlagsEXT::WARNING => warn!("validation layer: {}", message),
        _ => debug!("validation layer: {}", message),
    }

    vk::FALSE
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_EXTENSIONS: [&CStr; 3] = [
        ash::khr::surface::NAME,
        ash::ext::debug_report::NAME,
        ash::ext::debug_utils::NAME,
    ];

    #[test]
    fn test_validation_requires_all_three() {
        let layers = [VALIDATION_LAYER_NAME];
        assert!(validation_supported(&ALL_EXTENSIONS, &layers));
    }

    #[test]
    fn test_validation_missing_layer() {
        assert!(!validation_supported(&ALL_EXTENSIONS, &[]));
    }

    #[test]
    fn test_validation_missing_debug_report() {
        let extensions = [ash::khr::surface::NAME, ash::ext::debug_utils::NAME];
        assert!(!validation_supported(&extensions, &[VALIDATION_LAYER_NAME]));
    }

    #[test]
    fn test_validation_missing_debug_utils() {
        let extensions = [ash::khr::surface::NAME, ash::ext::debug_report::NAME];
        assert!(!validation_supported(&extensions, &[VALIDATION_LAYER_NAME]));
    }

    #[test]
    fn test_instance_extensions_without_validation() {
        let required = [ash::khr::surface::NAME];
        let extensions = instance_extensions(&required, &ALL_EXTENSIONS, false);
        assert_eq!(extensions, vec![ash::khr::surface::NAME]);
    }

    #[test]
    fn test_instance_extensions_adds_properties2_and_debug() {
        let required = [ash::khr::surface::NAME, ash::ext::debug_utils::NAME];
        let available = [
            ash::khr::surface::NAME,
            ash::khr::get_physical_device_properties2::NAME,
            ash::ext::debug_report::NAME,
            ash::ext::debug_utils::NAME,
        ];
        let extensions = instance_extensions(&required, &available, true);

        assert_eq!(extensions.len(), 4);
        assert!(extensions.contains(&ash::khr::get_physical_device_properties2::NAME));
        assert!(extensions.contains(&ash::ext::debug_report::NAME));
        assert_eq!(
            extensions
                .iter()
                .filter(|e| **e == ash::ext::debug_utils::NAME)
                .count(),
            1
        );
    }

    #[test]
    fn test_instance_creation_without_validation() {
        // Requires a Vulkan loader on the host
        match Instance::new(&[], false) {
            Ok(instance) => assert!(!instance.has_validation()),
            Err(e) => eprintln!("Skipping test: Vulkan not available ({e})"),
        }
    }
}
