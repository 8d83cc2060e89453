//! Vulkan graphics context
//!
//! Low-level Vulkan initialization: capability negotiation, resource
//! acquisition in dependency order, swapchain parameter selection, and
//! reverse-order teardown that tolerates a partially built context.

pub mod capabilities;
pub mod context;
pub mod debug;
pub mod pipeline;
pub mod swapchain;

pub use capabilities::CapabilityList;
pub use context::{GraphicsContext, VulkanError, VulkanResult};
pub use swapchain::SwapchainParameters;
