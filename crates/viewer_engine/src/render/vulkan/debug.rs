//! Validation-layer debug messenger
//!
//! The create/destroy entry points live in `VK_EXT_debug_utils`, not in the
//! core API, so they are resolved once per instance through ash's
//! `DebugUtils` loader and carried alongside the context.

use std::ffi::CStr;

use ash::extensions::ext::DebugUtils;
use ash::vk;

use crate::render::vulkan::context::{VulkanError, VulkanResult};

/// Messenger configuration, shared between the standalone messenger and the
/// instance create-info chain (so instance creation and destruction are
/// covered by the same callback).
pub fn messenger_create_info<'a>() -> vk::DebugUtilsMessengerCreateInfoEXTBuilder<'a> {
    vk::DebugUtilsMessengerCreateInfoEXT::builder()
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
        .pfn_user_callback(Some(debug_callback))
}

/// Create the messenger on an instance whose loader is already resolved.
pub fn create_messenger(debug_utils: &DebugUtils) -> VulkanResult<vk::DebugUtilsMessengerEXT> {
    let create_info = messenger_create_info();
    unsafe { debug_utils.create_debug_utils_messenger(&create_info, None) }
        .map_err(VulkanError::driver("vkCreateDebugUtilsMessengerEXT"))
}

/// Callback for driver diagnostics.
///
/// Warning severity and above goes to the error/warning log targets, the
/// rest to debug. Always returns `vk::FALSE` so the triggering call is
/// never aborted.
unsafe extern "system" fn debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    _user_data: *mut std::ffi::c_void,
) -> vk::Bool32 {
    let message = if callback_data.is_null() || (*callback_data).p_message.is_null() {
        std::borrow::Cow::Borrowed("<no message>")
    } else {
        CStr::from_ptr((*callback_data).p_message).to_string_lossy()
    };

    if message_severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR) {
        log::error!("[vulkan] {:?}: {}", message_type, message);
    } else if message_severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING) {
        log::warn!("[vulkan] {:?}: {}", message_type, message);
    } else {
        log::debug!("[vulkan] {:?}: {}", message_type, message);
    }

    vk::FALSE
}
