//! Instance and device capability negotiation
//!
//! Enumerates the layers and extensions the driver offers, gathers the set
//! the window system and debug tooling require, and checks required-versus-
//! available membership before any creation call is issued. Every gathered
//! list is logged, matching the driver's own naming.

use std::ffi::{CStr, CString};
use std::fmt;
use std::os::raw::c_char;

use ash::extensions::ext::DebugUtils;
use ash::vk;

use crate::render::vulkan::context::{VulkanError, VulkanResult};
use crate::render::window::Window;

/// The single instance layer this application requires.
pub const VALIDATION_LAYER: &str = "VK_LAYER_KHRONOS_validation";

/// Owned, duplicate-free set of layer or extension names.
///
/// Order is preserved for logging only; membership is what matters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapabilityList {
    names: Vec<String>,
}

impl CapabilityList {
    /// Create an empty list.
    pub fn new() -> Self {
        Self { names: Vec::new() }
    }

    /// Append a name unless an identical one is already present.
    pub fn push_unique(&mut self, name: impl Into<String>) {
        let name = name.into();
        if !self.names.iter().any(|existing| *existing == name) {
            self.names.push(name);
        }
    }

    /// Exact, case-sensitive membership test.
    pub fn contains(&self, name: &str) -> bool {
        self.names.iter().any(|existing| existing == name)
    }

    /// Number of names in the list.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Whether the list holds no names.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Iterate over the names in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    /// Names as C strings for create-info marshalling.
    pub fn to_cstrings(&self) -> Vec<CString> {
        self.names
            .iter()
            .map(|name| CString::new(name.as_str()).unwrap())
            .collect()
    }
}

impl fmt::Display for CapabilityList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.names.join(", "))
    }
}

impl FromIterator<String> for CapabilityList {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        let mut list = Self::new();
        for name in iter {
            list.push_unique(name);
        }
        list
    }
}

/// Convert a fixed-size, NUL-terminated name field into an owned string.
fn name_from_raw(raw: &[c_char]) -> String {
    unsafe { CStr::from_ptr(raw.as_ptr()) }
        .to_string_lossy()
        .into_owned()
}

/// Layers the instance-level driver stack offers.
///
/// Each layer's own extension list is logged at debug level beneath it.
pub fn available_instance_layers(entry: &ash::Entry) -> VulkanResult<CapabilityList> {
    let properties = entry
        .enumerate_instance_layer_properties()
        .map_err(VulkanError::allocation_or_driver(
            "vkEnumerateInstanceLayerProperties",
        ))?;

    let layers: CapabilityList = properties
        .iter()
        .map(|prop| name_from_raw(&prop.layer_name))
        .collect();
    log::info!("Available instance layers[{}]: {}", layers.len(), layers);

    for name in layers.iter() {
        let layer_cstring = CString::new(name).unwrap();
        match entry.enumerate_instance_extension_properties(Some(&layer_cstring)) {
            Ok(extensions) => {
                for ext in &extensions {
                    log::debug!("    {} provides {}", name, name_from_raw(&ext.extension_name));
                }
            }
            Err(result) => {
                log::warn!("Could not list extensions of layer {}: {}", name, result);
            }
        }
    }

    Ok(layers)
}

/// Extensions the instance-level driver stack offers.
pub fn available_instance_extensions(entry: &ash::Entry) -> VulkanResult<CapabilityList> {
    let properties = entry
        .enumerate_instance_extension_properties(None)
        .map_err(VulkanError::allocation_or_driver(
            "vkEnumerateInstanceExtensionProperties",
        ))?;

    let extensions: CapabilityList = properties
        .iter()
        .map(|prop| name_from_raw(&prop.extension_name))
        .collect();
    log::info!(
        "Available instance extensions[{}]: {}",
        extensions.len(),
        extensions
    );

    Ok(extensions)
}

/// Extensions a physical device offers.
pub fn available_device_extensions(
    instance: &ash::Instance,
    physical_device: vk::PhysicalDevice,
) -> VulkanResult<CapabilityList> {
    let properties = unsafe { instance.enumerate_device_extension_properties(physical_device) }
        .map_err(VulkanError::allocation_or_driver(
            "vkEnumerateDeviceExtensionProperties",
        ))?;

    let extensions: CapabilityList = properties
        .iter()
        .map(|prop| name_from_raw(&prop.extension_name))
        .collect();
    log::debug!(
        "Available device extensions[{}]: {}",
        extensions.len(),
        extensions
    );

    Ok(extensions)
}

/// Instance layers this application requires.
pub fn required_instance_layers() -> CapabilityList {
    let mut required = CapabilityList::new();
    required.push_unique(VALIDATION_LAYER);
    log::info!("Required instance layers[{}]: {}", required.len(), required);
    required
}

/// Instance extensions this application requires.
///
/// The window system's mandatory extensions plus debug utils, validation
/// features and portability enumeration. The last three are requested
/// unconditionally so instance creation can always hook up the debug
/// messenger and the portability flag.
pub fn required_instance_extensions(window: &Window) -> VulkanResult<CapabilityList> {
    let mut required = CapabilityList::new();
    for name in window.required_instance_extensions()? {
        required.push_unique(name);
    }

    required.push_unique(DebugUtils::name().to_string_lossy().into_owned());
    required.push_unique(
        vk::ExtValidationFeaturesFn::name()
            .to_string_lossy()
            .into_owned(),
    );
    required.push_unique(
        vk::KhrPortabilityEnumerationFn::name()
            .to_string_lossy()
            .into_owned(),
    );

    log::info!(
        "Required instance extensions[{}]: {}",
        required.len(),
        required
    );

    Ok(required)
}

/// Check every required layer against the available set.
///
/// Fails fast at the first required layer missing from `available`, naming
/// it in the error. Matching is exact and case-sensitive.
pub fn check_required_layers(
    available: &CapabilityList,
    required: &CapabilityList,
) -> VulkanResult<()> {
    for name in required.iter() {
        if !available.contains(name) {
            return Err(VulkanError::LayerUnavailable(name.to_string()));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list(names: &[&str]) -> CapabilityList {
        names.iter().map(|name| (*name).to_string()).collect()
    }

    #[test]
    fn push_unique_drops_duplicates() {
        let mut capabilities = CapabilityList::new();
        capabilities.push_unique("VK_KHR_surface");
        capabilities.push_unique("VK_KHR_xcb_surface");
        capabilities.push_unique("VK_KHR_surface");

        assert_eq!(capabilities.len(), 2);
        assert!(capabilities.contains("VK_KHR_surface"));
        assert!(capabilities.contains("VK_KHR_xcb_surface"));
    }

    #[test]
    fn contains_is_case_sensitive() {
        let capabilities = list(&["VK_LAYER_KHRONOS_validation"]);

        assert!(capabilities.contains("VK_LAYER_KHRONOS_validation"));
        assert!(!capabilities.contains("vk_layer_khronos_validation"));
    }

    #[test]
    fn check_succeeds_when_all_required_layers_are_available() {
        let available = list(&["VK_LAYER_A", "VK_LAYER_KHRONOS_validation", "VK_LAYER_B"]);
        let required = list(&["VK_LAYER_KHRONOS_validation", "VK_LAYER_A"]);

        assert!(check_required_layers(&available, &required).is_ok());
    }

    #[test]
    fn check_fails_on_first_missing_layer_and_names_it() {
        let available = list(&["VK_LAYER_A"]);
        let required = list(&["VK_LAYER_A", "VK_LAYER_MISSING_1", "VK_LAYER_MISSING_2"]);

        match check_required_layers(&available, &required) {
            Err(VulkanError::LayerUnavailable(name)) => {
                assert_eq!(name, "VK_LAYER_MISSING_1");
            }
            other => panic!("expected LayerUnavailable, got {:?}", other),
        }
    }

    #[test]
    fn check_succeeds_with_empty_required_set() {
        let available = CapabilityList::new();
        let required = CapabilityList::new();

        assert!(check_required_layers(&available, &required).is_ok());
    }

    #[test]
    fn fixed_extensions_are_not_duplicated() {
        // The window system may already report an extension the fixed set
        // adds; the union must never hold it twice.
        let mut required = list(&["VK_KHR_surface", "VK_EXT_debug_utils"]);
        required.push_unique("VK_EXT_debug_utils");
        required.push_unique("VK_EXT_validation_features");
        required.push_unique("VK_KHR_portability_enumeration");

        assert_eq!(required.len(), 4);
        assert!(required.contains("VK_EXT_debug_utils"));
        assert!(required.contains("VK_EXT_validation_features"));
        assert!(required.contains("VK_KHR_portability_enumeration"));
    }
}
