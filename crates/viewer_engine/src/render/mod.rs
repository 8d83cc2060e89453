//! Rendering subsystem
//!
//! Split along the external-collaborator boundary: `window` wraps the GLFW
//! windowing layer, `vulkan` owns every driver-side resource. The window is
//! created first and outlives the graphics context; the context only borrows
//! it during the build.

pub mod vulkan;
pub mod window;

pub use vulkan::{CapabilityList, GraphicsContext, SwapchainParameters, VulkanError, VulkanResult};
pub use window::{Window, WindowError};
