//! Swapchain creation and parameter selection
//!
//! Parameter selection is a pure function over what the surface reports, so
//! it is testable without a driver. Creation consumes the selected
//! parameters for the context's single presentation queue family.

use ash::extensions::khr::{Surface, Swapchain as SwapchainLoader};
use ash::vk;

use crate::render::vulkan::context::{VulkanError, VulkanResult};

/// Parameters selected for swapchain creation.
#[derive(Debug, Clone, Copy)]
pub struct SwapchainParameters {
    /// Pixel format and color space of the swapchain images.
    pub surface_format: vk::SurfaceFormatKHR,
    /// Presentation mode.
    pub present_mode: vk::PresentModeKHR,
    /// Number of images requested from the driver.
    pub image_count: u32,
    /// Image extent in pixels.
    pub extent: vk::Extent2D,
}

impl SwapchainParameters {
    /// Select creation parameters from the surface's reported capabilities.
    ///
    /// Never fails for valid input: any supported format is usable even if
    /// suboptimal, and FIFO support is guaranteed by the driver. Empty
    /// `formats` or `present_modes` is a caller precondition violation.
    pub fn select(
        capabilities: &vk::SurfaceCapabilitiesKHR,
        formats: &[vk::SurfaceFormatKHR],
        present_modes: &[vk::PresentModeKHR],
        window_extent: vk::Extent2D,
    ) -> Self {
        // One above the minimum so acquisition rarely blocks on the driver;
        // a zero maximum means unbounded.
        let mut image_count = capabilities.min_image_count + 1;
        if capabilities.max_image_count > 0 && image_count > capabilities.max_image_count {
            image_count = capabilities.max_image_count;
        }

        let surface_format = formats
            .iter()
            .find(|sf| {
                sf.format == vk::Format::B8G8R8A8_SRGB
                    && sf.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR
            })
            .copied()
            .unwrap_or(formats[0]);

        let present_mode = present_modes
            .iter()
            .copied()
            .find(|&mode| mode == vk::PresentModeKHR::MAILBOX)
            .unwrap_or(vk::PresentModeKHR::FIFO);

        // u32::MAX on the width is the "use the window size" sentinel.
        let extent = if capabilities.current_extent.width != u32::MAX {
            capabilities.current_extent
        } else {
            vk::Extent2D {
                width: window_extent.width.clamp(
                    capabilities.min_image_extent.width,
                    capabilities.max_image_extent.width,
                ),
                height: window_extent.height.clamp(
                    capabilities.min_image_extent.height,
                    capabilities.max_image_extent.height,
                ),
            }
        };

        Self {
            surface_format,
            present_mode,
            image_count,
            extent,
        }
    }
}

/// Query the surface and create a swapchain for the one presentation queue
/// family.
pub(crate) fn create_swapchain(
    surface_loader: &Surface,
    swapchain_loader: &SwapchainLoader,
    physical_device: vk::PhysicalDevice,
    surface: vk::SurfaceKHR,
    queue_family_index: u32,
    window_extent: vk::Extent2D,
) -> VulkanResult<(vk::SwapchainKHR, SwapchainParameters)> {
    let capabilities = unsafe {
        surface_loader.get_physical_device_surface_capabilities(physical_device, surface)
    }
    .map_err(VulkanError::driver(
        "vkGetPhysicalDeviceSurfaceCapabilitiesKHR",
    ))?;

    let formats =
        unsafe { surface_loader.get_physical_device_surface_formats(physical_device, surface) }
            .map_err(VulkanError::allocation_or_driver(
                "vkGetPhysicalDeviceSurfaceFormatsKHR",
            ))?;

    let present_modes = unsafe {
        surface_loader.get_physical_device_surface_present_modes(physical_device, surface)
    }
    .map_err(VulkanError::allocation_or_driver(
        "vkGetPhysicalDeviceSurfacePresentModesKHR",
    ))?;

    let parameters =
        SwapchainParameters::select(&capabilities, &formats, &present_modes, window_extent);
    log::info!(
        "Swapchain parameters: {:?}/{:?}, {} images, {}x{}, {:?}",
        parameters.surface_format.format,
        parameters.surface_format.color_space,
        parameters.image_count,
        parameters.extent.width,
        parameters.extent.height,
        parameters.present_mode,
    );

    let queue_family_indices = [queue_family_index];
    let create_info = vk::SwapchainCreateInfoKHR::builder()
        .surface(surface)
        .min_image_count(parameters.image_count)
        .image_format(parameters.surface_format.format)
        .image_color_space(parameters.surface_format.color_space)
        .image_extent(parameters.extent)
        .image_array_layers(1)
        .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
        .image_sharing_mode(vk::SharingMode::EXCLUSIVE)
        .queue_family_indices(&queue_family_indices)
        .pre_transform(capabilities.current_transform)
        .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
        .present_mode(parameters.present_mode)
        .clipped(true)
        .old_swapchain(vk::SwapchainKHR::null());

    let swapchain = unsafe { swapchain_loader.create_swapchain(&create_info, None) }
        .map_err(VulkanError::driver("vkCreateSwapchainKHR"))?;

    Ok((swapchain, parameters))
}

#[cfg(test)]
mod tests {
    use super::*;

    const PREFERRED_FORMAT: vk::SurfaceFormatKHR = vk::SurfaceFormatKHR {
        format: vk::Format::B8G8R8A8_SRGB,
        color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
    };

    const OTHER_FORMAT: vk::SurfaceFormatKHR = vk::SurfaceFormatKHR {
        format: vk::Format::R8G8B8A8_UNORM,
        color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
    };

    fn capabilities_with_counts(min: u32, max: u32) -> vk::SurfaceCapabilitiesKHR {
        vk::SurfaceCapabilitiesKHR {
            min_image_count: min,
            max_image_count: max,
            current_extent: vk::Extent2D {
                width: u32::MAX,
                height: u32::MAX,
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
        }
    }

    fn select_with(
        capabilities: &vk::SurfaceCapabilitiesKHR,
        formats: &[vk::SurfaceFormatKHR],
        present_modes: &[vk::PresentModeKHR],
    ) -> SwapchainParameters {
        SwapchainParameters::select(
            capabilities,
            formats,
            present_modes,
            vk::Extent2D {
                width: 1600,
                height: 900,
            },
        )
    }

    #[test]
    fn image_count_is_min_plus_one_when_max_is_unbounded() {
        let capabilities = capabilities_with_counts(2, 0);
        let parameters = select_with(
            &capabilities,
            &[PREFERRED_FORMAT],
            &[vk::PresentModeKHR::FIFO],
        );

        assert_eq!(parameters.image_count, 3);
    }

    #[test]
    fn image_count_is_clamped_to_max() {
        let capabilities = capabilities_with_counts(3, 3);
        let parameters = select_with(
            &capabilities,
            &[PREFERRED_FORMAT],
            &[vk::PresentModeKHR::FIFO],
        );

        assert_eq!(parameters.image_count, 3);
    }

    #[test]
    fn preferred_format_is_chosen_regardless_of_position() {
        let capabilities = capabilities_with_counts(2, 0);
        let parameters = select_with(
            &capabilities,
            &[OTHER_FORMAT, OTHER_FORMAT, PREFERRED_FORMAT],
            &[vk::PresentModeKHR::FIFO],
        );

        assert_eq!(parameters.surface_format.format, vk::Format::B8G8R8A8_SRGB);
        assert_eq!(
            parameters.surface_format.color_space,
            vk::ColorSpaceKHR::SRGB_NONLINEAR
        );
    }

    #[test]
    fn first_format_is_the_fallback() {
        let capabilities = capabilities_with_counts(2, 0);
        let parameters = select_with(
            &capabilities,
            &[OTHER_FORMAT],
            &[vk::PresentModeKHR::FIFO],
        );

        assert_eq!(parameters.surface_format.format, vk::Format::R8G8B8A8_UNORM);
    }

    #[test]
    fn mailbox_is_preferred_when_supported() {
        let capabilities = capabilities_with_counts(2, 0);
        let parameters = select_with(
            &capabilities,
            &[PREFERRED_FORMAT],
            &[vk::PresentModeKHR::FIFO, vk::PresentModeKHR::MAILBOX],
        );

        assert_eq!(parameters.present_mode, vk::PresentModeKHR::MAILBOX);
    }

    #[test]
    fn fifo_is_the_fallback_present_mode() {
        let capabilities = capabilities_with_counts(2, 0);
        let parameters = select_with(
            &capabilities,
            &[PREFERRED_FORMAT],
            &[vk::PresentModeKHR::FIFO],
        );

        assert_eq!(parameters.present_mode, vk::PresentModeKHR::FIFO);
    }

    #[test]
    fn current_extent_is_used_verbatim_when_reported() {
        let mut capabilities = capabilities_with_counts(2, 0);
        capabilities.current_extent = vk::Extent2D {
            width: 800,
            height: 600,
        };

        // Differs from the 1600x900 window size on purpose.
        let parameters = select_with(
            &capabilities,
            &[PREFERRED_FORMAT],
            &[vk::PresentModeKHR::FIFO],
        );

        assert_eq!(parameters.extent.width, 800);
        assert_eq!(parameters.extent.height, 600);
    }

    #[test]
    fn window_extent_is_clamped_component_wise() {
        let mut capabilities = capabilities_with_counts(2, 0);
        capabilities.min_image_extent = vk::Extent2D {
            width: 200,
            height: 1000,
        };
        capabilities.max_image_extent = vk::Extent2D {
            width: 1024,
            height: 2048,
        };

        // Window is 1600x900: width above max, height below min.
        let parameters = select_with(
            &capabilities,
            &[PREFERRED_FORMAT],
            &[vk::PresentModeKHR::FIFO],
        );

        assert_eq!(parameters.extent.width, 1024);
        assert_eq!(parameters.extent.height, 1000);
    }
}
