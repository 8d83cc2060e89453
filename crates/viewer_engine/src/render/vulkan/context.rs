//! Graphics context construction and teardown
//!
//! `GraphicsContext` is the aggregate root for every driver-side resource.
//! Resources are acquired in strict dependency order; any step's failure
//! tears the partial context down in reverse order and propagates the
//! step's error. A handle is either unset (`None`) or live, and a handle is
//! only live once every step before it succeeded.

use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::path::PathBuf;

use ash::extensions::ext::DebugUtils;
use ash::extensions::khr::{Surface, Swapchain as SwapchainLoader};
use ash::vk;
use thiserror::Error;

use crate::render::vulkan::{capabilities, debug, pipeline, swapchain};
use crate::render::window::{Window, WindowError};

/// Vulkan initialization errors
#[derive(Error, Debug)]
pub enum VulkanError {
    /// The Vulkan loader library could not be loaded
    #[error("failed to load the Vulkan library: {0}")]
    LibraryLoad(String),

    /// The window system reported a failure
    #[error("window system error: {0}")]
    Window(#[from] WindowError),

    /// A required instance layer is not available
    #[error("required instance layer is not available: {0}")]
    LayerUnavailable(String),

    /// A required device extension is not available
    #[error("required device extension is not available: {0}")]
    ExtensionUnavailable(String),

    /// The driver rejected a creation or query call
    #[error("{call} failed: {result}")]
    Driver {
        /// The rejected entry point
        call: &'static str,
        /// The driver's result code
        result: vk::Result,
    },

    /// Host memory for a query result could not be obtained
    #[error("out of host memory in {0}")]
    Allocation(&'static str),

    /// No usable physical device was found
    #[error("no usable Vulkan physical device found")]
    NoDevice,

    /// Presentation surface creation failed or the surface is unusable
    #[error("surface error: {0}")]
    Surface(String),

    /// Shader bytecode could not be read
    #[error("failed to read shader bytecode from {path}: {source}")]
    ShaderLoad {
        /// Path of the unreadable shader binary
        path: PathBuf,
        /// Underlying I/O error
        source: std::io::Error,
    },
}

/// Result type for Vulkan operations
pub type VulkanResult<T> = Result<T, VulkanError>;

impl VulkanError {
    /// Map a driver result code onto the named call.
    pub(crate) fn driver(call: &'static str) -> impl FnOnce(vk::Result) -> Self {
        move |result| Self::Driver { call, result }
    }

    /// Like [`VulkanError::driver`], but reports host-memory exhaustion as
    /// an allocation failure. For enumeration/query calls whose only
    /// host-side failure mode is running out of backing storage.
    pub(crate) fn allocation_or_driver(call: &'static str) -> impl FnOnce(vk::Result) -> Self {
        move |result| match result {
            vk::Result::ERROR_OUT_OF_HOST_MEMORY => Self::Allocation(call),
            result => Self::Driver { call, result },
        }
    }
}

/// Aggregate root owning every acquired Vulkan resource.
///
/// Built in one pass by [`GraphicsContext::build`] and destroyed exactly
/// once by [`GraphicsContext::destroy`] (or `Drop`), whether the build
/// completed or failed partway through.
pub struct GraphicsContext {
    entry: Option<ash::Entry>,
    instance: Option<ash::Instance>,
    debug_utils: Option<DebugUtils>,
    debug_messenger: Option<vk::DebugUtilsMessengerEXT>,
    // Enumerated, not created; dropped with the instance.
    physical_device: Option<vk::PhysicalDevice>,
    queue_family_index: u32,
    device: Option<ash::Device>,
    queue: Option<vk::Queue>,
    surface_loader: Option<Surface>,
    surface: Option<vk::SurfaceKHR>,
    swapchain_loader: Option<SwapchainLoader>,
    swapchain: Option<vk::SwapchainKHR>,
    // Owned by the swapchain; retrieved, never destroyed directly.
    swapchain_images: Vec<vk::Image>,
    swapchain_image_views: Vec<vk::ImageView>,
    swapchain_format: vk::Format,
    swapchain_extent: vk::Extent2D,
    pipeline_layout: Option<vk::PipelineLayout>,
    render_pass: Option<vk::RenderPass>,
    pipeline: Option<vk::Pipeline>,
    destroyed: bool,
}

impl GraphicsContext {
    fn empty() -> Self {
        Self {
            entry: None,
            instance: None,
            debug_utils: None,
            debug_messenger: None,
            physical_device: None,
            queue_family_index: 0,
            device: None,
            queue: None,
            surface_loader: None,
            surface: None,
            swapchain_loader: None,
            swapchain: None,
            swapchain_images: Vec::new(),
            swapchain_image_views: Vec::new(),
            swapchain_format: vk::Format::UNDEFINED,
            swapchain_extent: vk::Extent2D::default(),
            pipeline_layout: None,
            render_pass: None,
            pipeline: None,
            destroyed: false,
        }
    }

    /// Build a complete graphics context for the given window.
    ///
    /// On any step's failure the partial context is torn down before the
    /// error is returned; there are no retries.
    pub fn build(window: &mut Window) -> VulkanResult<Self> {
        let mut context = Self::empty();
        if let Err(err) = context.build_inner(window) {
            log::error!("Graphics context initialization failed: {}", err);
            context.destroy();
            return Err(err);
        }
        Ok(context)
    }

    fn build_inner(&mut self, window: &mut Window) -> VulkanResult<()> {
        // Instance
        let entry = unsafe { ash::Entry::load() }
            .map_err(|err| VulkanError::LibraryLoad(err.to_string()))?;
        self.entry = Some(entry.clone());

        let instance = create_instance(&entry, window)?;
        self.instance = Some(instance.clone());
        log::info!("Created Vulkan instance");

        // Debug messenger; the extension entry points are resolved once
        // per instance and carried for teardown.
        let debug_utils = DebugUtils::new(&entry, &instance);
        self.debug_utils = Some(debug_utils.clone());
        self.debug_messenger = Some(debug::create_messenger(&debug_utils)?);
        log::info!("Created debug messenger");

        // Physical device
        let (physical_device, queue_family_index, device_name) =
            select_physical_device(&instance)?;
        self.physical_device = Some(physical_device);
        self.queue_family_index = queue_family_index;
        log::info!(
            "Selected GPU: {} (queue family {})",
            device_name,
            queue_family_index
        );

        // Logical device and presentation queue
        let device = create_logical_device(&instance, physical_device, queue_family_index)?;
        self.device = Some(device.clone());
        self.queue = Some(unsafe { device.get_device_queue(queue_family_index, 0) });
        log::info!("Created logical device and retrieved queue");

        // Surface
        let surface_loader = Surface::new(&entry, &instance);
        self.surface_loader = Some(surface_loader.clone());
        let surface = window
            .create_surface(instance.handle())
            .map_err(|err| VulkanError::Surface(err.to_string()))?;
        self.surface = Some(surface);

        let presentable = unsafe {
            surface_loader.get_physical_device_surface_support(
                physical_device,
                queue_family_index,
                surface,
            )
        }
        .map_err(VulkanError::driver("vkGetPhysicalDeviceSurfaceSupportKHR"))?;
        if !presentable {
            return Err(VulkanError::Surface(format!(
                "queue family {} cannot present to the window surface",
                queue_family_index
            )));
        }
        log::info!("Created presentation surface");

        // Swapchain
        let swapchain_loader = SwapchainLoader::new(&instance, &device);
        self.swapchain_loader = Some(swapchain_loader.clone());

        let (width, height) = window.framebuffer_size();
        let (swapchain, parameters) = swapchain::create_swapchain(
            &surface_loader,
            &swapchain_loader,
            physical_device,
            surface,
            queue_family_index,
            vk::Extent2D { width, height },
        )?;
        self.swapchain = Some(swapchain);
        self.swapchain_format = parameters.surface_format.format;
        self.swapchain_extent = parameters.extent;

        // Swapchain images
        self.swapchain_images = unsafe { swapchain_loader.get_swapchain_images(swapchain) }
            .map_err(VulkanError::allocation_or_driver("vkGetSwapchainImagesKHR"))?;
        log::info!("Retrieved {} swapchain images", self.swapchain_images.len());

        // Image views
        self.create_image_views(&device)?;

        // Pipeline objects
        let pipeline_layout = pipeline::create_pipeline_layout(&device)?;
        self.pipeline_layout = Some(pipeline_layout);
        let render_pass = pipeline::create_render_pass(&device, self.swapchain_format)?;
        self.render_pass = Some(render_pass);
        self.pipeline = Some(pipeline::create_graphics_pipeline(
            &device,
            pipeline_layout,
            render_pass,
        )?);
        log::info!("Created graphics pipeline");

        Ok(())
    }

    fn create_image_views(&mut self, device: &ash::Device) -> VulkanResult<()> {
        for (index, &image) in self.swapchain_images.iter().enumerate() {
            let create_info = vk::ImageViewCreateInfo::builder()
                .image(image)
                .view_type(vk::ImageViewType::TYPE_2D)
                .format(self.swapchain_format)
                .components(vk::ComponentMapping {
                    r: vk::ComponentSwizzle::IDENTITY,
                    g: vk::ComponentSwizzle::IDENTITY,
                    b: vk::ComponentSwizzle::IDENTITY,
                    a: vk::ComponentSwizzle::IDENTITY,
                })
                .subresource_range(vk::ImageSubresourceRange {
                    aspect_mask: vk::ImageAspectFlags::COLOR,
                    base_mip_level: 0,
                    level_count: 1,
                    base_array_layer: 0,
                    layer_count: 1,
                });

            match unsafe { device.create_image_view(&create_info, None) } {
                Ok(view) => self.swapchain_image_views.push(view),
                Err(result) => {
                    log::error!("Failed to create swapchain image view {}", index);
                    return Err(VulkanError::Driver {
                        call: "vkCreateImageView",
                        result,
                    });
                }
            }
        }
        log::info!(
            "Created {} swapchain image views",
            self.swapchain_image_views.len()
        );
        Ok(())
    }

    /// Format of the swapchain images.
    pub fn swapchain_format(&self) -> vk::Format {
        self.swapchain_format
    }

    /// Extent of the swapchain images in pixels.
    pub fn swapchain_extent(&self) -> vk::Extent2D {
        self.swapchain_extent
    }

    /// Number of images the swapchain was created with.
    pub fn image_count(&self) -> usize {
        self.swapchain_images.len()
    }

    /// Tear down every acquired resource in reverse dependency order.
    ///
    /// Safe on a partially built context and on repeated invocation: each
    /// step is skipped when its resource was never acquired, and the whole
    /// sequence runs at most once.
    pub fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        self.destroyed = true;

        unsafe {
            if let Some(device) = &self.device {
                let _ = device.device_wait_idle();

                if let Some(pipeline) = self.pipeline.take() {
                    device.destroy_pipeline(pipeline, None);
                }
                if let Some(render_pass) = self.render_pass.take() {
                    device.destroy_render_pass(render_pass, None);
                }
                if let Some(layout) = self.pipeline_layout.take() {
                    device.destroy_pipeline_layout(layout, None);
                }
                for view in self.swapchain_image_views.drain(..) {
                    if view != vk::ImageView::null() {
                        device.destroy_image_view(view, None);
                    }
                }
                if let (Some(loader), Some(swapchain)) =
                    (&self.swapchain_loader, self.swapchain.take())
                {
                    loader.destroy_swapchain(swapchain, None);
                }
            }
            self.swapchain_images.clear();
            self.swapchain_loader = None;

            if let (Some(loader), Some(surface)) = (&self.surface_loader, self.surface.take()) {
                loader.destroy_surface(surface, None);
            }
            self.surface_loader = None;

            self.queue = None;
            if let Some(device) = self.device.take() {
                device.destroy_device(None);
            }

            if let (Some(utils), Some(messenger)) =
                (&self.debug_utils, self.debug_messenger.take())
            {
                utils.destroy_debug_utils_messenger(messenger, None);
            }
            self.debug_utils = None;
            self.physical_device = None;

            if let Some(instance) = self.instance.take() {
                instance.destroy_instance(None);
            }
            self.entry = None;
        }

        log::info!("Graphics context destroyed");
    }
}

impl Drop for GraphicsContext {
    fn drop(&mut self) {
        self.destroy();
    }
}

/// Negotiate capabilities and create the instance, with the validation
/// feature set and the messenger config chained into the create-info.
fn create_instance(entry: &ash::Entry, window: &Window) -> VulkanResult<ash::Instance> {
    let available_layers = capabilities::available_instance_layers(entry)?;
    capabilities::available_instance_extensions(entry)?;

    let required_layers = capabilities::required_instance_layers();
    capabilities::check_required_layers(&available_layers, &required_layers)?;
    let required_extensions = capabilities::required_instance_extensions(window)?;

    let api_version = entry
        .try_enumerate_instance_version()
        .map_err(VulkanError::allocation_or_driver("vkEnumerateInstanceVersion"))?
        .unwrap_or(vk::API_VERSION_1_0);
    log::info!(
        "Instance API version {}.{}.{}",
        vk::api_version_major(api_version),
        vk::api_version_minor(api_version),
        vk::api_version_patch(api_version)
    );

    let app_name = CString::new("Vulkan viewer").unwrap();
    let app_info = vk::ApplicationInfo::builder()
        .application_name(&app_name)
        .application_version(1)
        .api_version(api_version);

    let layer_cstrings = required_layers.to_cstrings();
    let layer_ptrs: Vec<*const c_char> = layer_cstrings.iter().map(|name| name.as_ptr()).collect();
    let extension_cstrings = required_extensions.to_cstrings();
    let extension_ptrs: Vec<*const c_char> =
        extension_cstrings.iter().map(|name| name.as_ptr()).collect();

    let enabled_validation_features = [
        vk::ValidationFeatureEnableEXT::GPU_ASSISTED,
        vk::ValidationFeatureEnableEXT::GPU_ASSISTED_RESERVE_BINDING_SLOT,
        vk::ValidationFeatureEnableEXT::BEST_PRACTICES,
        vk::ValidationFeatureEnableEXT::SYNCHRONIZATION_VALIDATION,
    ];
    // Valid only because the validation-features extension is always part
    // of the required set.
    let mut validation_features = vk::ValidationFeaturesEXT::builder()
        .enabled_validation_features(&enabled_validation_features);

    // Same callback as the standalone messenger, so creation and
    // destruction of the instance itself are covered too.
    let mut messenger_info = debug::messenger_create_info();

    let create_info = vk::InstanceCreateInfo::builder()
        .flags(vk::InstanceCreateFlags::ENUMERATE_PORTABILITY_KHR)
        .application_info(&app_info)
        .enabled_layer_names(&layer_ptrs)
        .enabled_extension_names(&extension_ptrs)
        .push_next(&mut validation_features)
        .push_next(&mut messenger_info);

    unsafe { entry.create_instance(&create_info, None) }
        .map_err(VulkanError::driver("vkCreateInstance"))
}

/// Rank for device selection; lower is better.
fn device_type_rank(device_type: vk::PhysicalDeviceType) -> u32 {
    match device_type {
        vk::PhysicalDeviceType::DISCRETE_GPU => 0,
        vk::PhysicalDeviceType::INTEGRATED_GPU => 1,
        vk::PhysicalDeviceType::VIRTUAL_GPU => 2,
        vk::PhysicalDeviceType::CPU => 3,
        _ => 4,
    }
}

/// Select the best usable physical device and its graphics queue family.
///
/// Candidates must offer the swapchain device extension and a
/// graphics-capable queue family; among them, discrete GPUs win over
/// integrated, then virtual, then CPU implementations.
fn select_physical_device(
    instance: &ash::Instance,
) -> VulkanResult<(vk::PhysicalDevice, u32, String)> {
    let physical_devices = unsafe { instance.enumerate_physical_devices() }
        .map_err(VulkanError::allocation_or_driver("vkEnumeratePhysicalDevices"))?;
    if physical_devices.is_empty() {
        return Err(VulkanError::NoDevice);
    }

    let swapchain_extension = SwapchainLoader::name().to_string_lossy().into_owned();

    let mut best: Option<(vk::PhysicalDevice, u32, String, u32)> = None;
    for physical_device in physical_devices {
        let properties = unsafe { instance.get_physical_device_properties(physical_device) };
        let name = unsafe { CStr::from_ptr(properties.device_name.as_ptr()) }
            .to_string_lossy()
            .into_owned();

        let extensions = capabilities::available_device_extensions(instance, physical_device)?;
        if !extensions.contains(&swapchain_extension) {
            log::info!("Skipping {}: no swapchain extension", name);
            continue;
        }

        let queue_families =
            unsafe { instance.get_physical_device_queue_family_properties(physical_device) };
        let graphics_family = queue_families
            .iter()
            .position(|family| family.queue_flags.contains(vk::QueueFlags::GRAPHICS));
        let queue_family_index = match graphics_family {
            Some(index) => index as u32,
            None => {
                log::info!("Skipping {}: no graphics queue family", name);
                continue;
            }
        };

        let rank = device_type_rank(properties.device_type);
        let better = match &best {
            Some((_, _, _, best_rank)) => rank < *best_rank,
            None => true,
        };
        if better {
            best = Some((physical_device, queue_family_index, name, rank));
        }
    }

    best.map(|(physical_device, queue_family_index, name, _)| {
        (physical_device, queue_family_index, name)
    })
    .ok_or(VulkanError::NoDevice)
}

/// Create the logical device with one presentation-capable queue at
/// priority 1.0 and the swapchain extension enabled.
fn create_logical_device(
    instance: &ash::Instance,
    physical_device: vk::PhysicalDevice,
    queue_family_index: u32,
) -> VulkanResult<ash::Device> {
    let available = capabilities::available_device_extensions(instance, physical_device)?;
    let swapchain_extension = SwapchainLoader::name().to_string_lossy().into_owned();
    if !available.contains(&swapchain_extension) {
        return Err(VulkanError::ExtensionUnavailable(swapchain_extension));
    }

    let queue_priorities = [1.0];
    let queue_create_infos = [vk::DeviceQueueCreateInfo::builder()
        .queue_family_index(queue_family_index)
        .queue_priorities(&queue_priorities)
        .build()];

    let required_extensions = [SwapchainLoader::name().as_ptr()];
    let features = unsafe { instance.get_physical_device_features(physical_device) };

    let create_info = vk::DeviceCreateInfo::builder()
        .queue_create_infos(&queue_create_infos)
        .enabled_extension_names(&required_extensions)
        .enabled_features(&features);

    unsafe { instance.create_device(physical_device, &create_info, None) }
        .map_err(VulkanError::driver("vkCreateDevice"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn teardown_of_a_never_built_context_is_a_no_op() {
        let mut context = GraphicsContext::empty();
        context.destroy();

        assert!(context.instance.is_none());
        assert!(context.device.is_none());
        assert!(context.swapchain.is_none());
        assert!(context.swapchain_image_views.is_empty());
    }

    #[test]
    fn repeated_teardown_does_not_double_free() {
        let mut context = GraphicsContext::empty();
        context.destroy();
        context.destroy();
        // Drop runs destroy a third time through the guard.
        drop(context);
    }

    #[test]
    fn device_ranking_prefers_discrete_gpus() {
        assert!(
            device_type_rank(vk::PhysicalDeviceType::DISCRETE_GPU)
                < device_type_rank(vk::PhysicalDeviceType::INTEGRATED_GPU)
        );
        assert!(
            device_type_rank(vk::PhysicalDeviceType::INTEGRATED_GPU)
                < device_type_rank(vk::PhysicalDeviceType::VIRTUAL_GPU)
        );
        assert!(
            device_type_rank(vk::PhysicalDeviceType::VIRTUAL_GPU)
                < device_type_rank(vk::PhysicalDeviceType::CPU)
        );
        assert!(
            device_type_rank(vk::PhysicalDeviceType::CPU)
                < device_type_rank(vk::PhysicalDeviceType::OTHER)
        );
    }
}
