//! Vulkan instance management.
//!
//! Handles VkInstance creation, validation layers, and the debug messenger.

use std::ffi::CStr;

use ash::{Entry, vk};
use tracing::{error, info, warn};

use crate::error::{Error, Result};

/// The Khronos validation layer name.
const VALIDATION_LAYER_NAME: &CStr = c"VK_LAYER_KHRONOS_validation";

/// Vulkan instance wrapper with optional validation layer support.
///
/// Owns the instance and the debug messenger; both are destroyed on drop.
pub struct Instance {
    /// Vulkan entry point loader
    entry: Entry,
    /// Vulkan instance handle
    instance: ash::Instance,
    /// Debug utils loader, present only when validation is active
    debug_utils: Option<ash::ext::debug_utils::Instance>,
    /// Debug messenger handle, present only when validation is active
    debug_messenger: Option<vk::DebugUtilsMessengerEXT>,
}

impl Instance {
    /// Creates a new Vulkan instance.
    ///
    /// # Arguments
    ///
    /// * `enable_validation` - request validation layers and a debug messenger.
    ///   If the layer is not installed the instance is still created and a
    ///   warning is logged.
    ///
    /// # Errors
    ///
    /// Fails when the Vulkan library cannot be loaded or instance creation is
    /// rejected.
    pub fn new(enable_validation: bool) -> Result<Self> {
        let entry = unsafe { Entry::load()? };

        let validation_active = enable_validation && validation_layer_available(&entry)?;
        if enable_validation && !validation_active {
            warn!("Validation layer requested but not available, proceeding without it");
        }

        let app_info = vk::ApplicationInfo::default()
            .application_name(c"prism")
            .application_version(vk::make_api_version(0, 0, 1, 0))
            .engine_name(c"prism")
            .engine_version(vk::make_api_version(0, 0, 1, 0))
            .api_version(vk::API_VERSION_1_3);

        let mut extensions = surface_extensions();
        if validation_active {
            extensions.push(ash::ext::debug_utils::NAME.as_ptr());
        }

        let layers = if validation_active {
            vec![VALIDATION_LAYER_NAME.as_ptr()]
        } else {
            vec![]
        };

        let create_info = vk::InstanceCreateInfo::default()
            .application_info(&app_info)
            .enabled_extension_names(&extensions)
            .enabled_layer_names(&layers);

        let instance = unsafe { entry.create_instance(&create_info, None).map_err(Error::from)? };

        info!("Vulkan instance created (API 1.3)");

        let (debug_utils, debug_messenger) = if validation_active {
            let debug_utils = ash::ext::debug_utils::Instance::new(&entry, &instance);
            let messenger = create_debug_messenger(&debug_utils)?;
            info!("Validation layers enabled");
            (Some(debug_utils), Some(messenger))
        } else {
            (None, None)
        };

        Ok(Self {
            entry,
            instance,
            debug_utils,
            debug_messenger,
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

    /// Returns whether validation layers are active.
    #[inline]
    pub fn has_validation(&self) -> bool {
        self.debug_messenger.is_some()
    }
}

impl Drop for Instance {
    fn drop(&mut self) {
        unsafe {
            if let (Some(debug_utils), Some(messenger)) = (&self.debug_utils, self.debug_messenger)
            {
                debug_utils.destroy_debug_utils_messenger(messenger, None);
            }
            self.instance.destroy_instance(None);
        }
        info!("Vulkan instance destroyed");
    }
}

/// Instance extensions needed to create a window surface on this platform.
fn surface_extensions() -> Vec<*const i8> {
    let mut extensions = vec![ash::khr::surface::NAME.as_ptr()];

    #[cfg(target_os = "windows")]
    extensions.push(ash::khr::win32_surface::NAME.as_ptr());

    #[cfg(target_os = "linux")]
    {
        extensions.push(ash::khr::xlib_surface::NAME.as_ptr());
        extensions.push(ash::khr::wayland_surface::NAME.as_ptr());
    }

    #[cfg(target_os = "macos")]
    extensions.push(ash::ext::metal_surface::NAME.as_ptr());

    extensions
}

/// Checks if the Khronos validation layer is installed.
fn validation_layer_available(entry: &Entry) -> Result<bool> {
    let available = unsafe { entry.enumerate_instance_layer_properties()? };

    let wanted = VALIDATION_LAYER_NAME.to_bytes_with_nul();
    Ok(available.iter().any(|layer| {
        let name = unsafe { CStr::from_ptr(layer.layer_name.as_ptr()) };
        name.to_bytes_with_nul() == wanted
    }))
}

/// Registers the debug messenger for validation layer callbacks.
fn create_debug_messenger(
    debug_utils: &ash::ext::debug_utils::Instance,
) -> Result<vk::DebugUtilsMessengerEXT> {
    let create_info = vk::DebugUtilsMessengerCreateInfoEXT::default()
        .message_severity(
            vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
        )
        .message_type(
            vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
        )
        .pfn_user_callback(Some(debug_callback));

    let messenger = unsafe {
        debug_utils
            .create_debug_utils_messenger(&create_info, None)
            .map_err(Error::from)?
    };

    Ok(messenger)
}

/// Routes validation layer messages into tracing.
///
/// # Safety
///
/// Called by the Vulkan driver; must follow the debug callback contract.
unsafe extern "system" fn debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    p_callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT,
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

    let type_str = match message_type {
        vk::DebugUtilsMessageTypeFlagsEXT::GENERAL => "general",
        vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION => "validation",
        vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE => "performance",
        _ => "unknown",
    };

    match message_severity {
        vk::DebugUtilsMessageSeverityFlagsEXT::ERROR => {
            error!("[vulkan {}] {}", type_str, message);
        }
        vk::DebugUtilsMessageSeverityFlagsEXT::WARNING => {
            warn!("[vulkan {}] {}", type_str, message);
        }
        _ => {
            info!("[vulkan {}] {}", type_str, message);
        }
    }

    vk::FALSE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn surface_extensions_include_base_surface() {
        let extensions = surface_extensions();
        assert!(!extensions.is_empty());
        // First entry is always VK_KHR_surface
        let first = unsafe { CStr::from_ptr(extensions[0]) };
        assert_eq!(first, ash::khr::surface::NAME);
    }

    #[test]
    fn instance_creation_without_validation() {
        // Requires a Vulkan loader on the test machine; skip gracefully otherwise
        match Instance::new(false) {
            Ok(instance) => assert!(!instance.has_validation()),
            Err(Error::Loading(_)) => eprintln!("skipping: vulkan not available"),
            Err(Error::Vulkan(_)) => eprintln!("skipping: vulkan not usable"),
            Err(e) => panic!("unexpected error: {:?}", e),
        }
    }
}
