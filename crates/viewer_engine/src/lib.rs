//! # Viewer Engine
//!
//! Vulkan context initialization for the viewer application.
//!
//! The crate does one job: negotiate capabilities with the Vulkan driver,
//! acquire the chain of resources a presentable rendering context needs
//! (instance, debug messenger, devices, surface, swapchain, image views,
//! pipeline), and tear everything down safely whether the build completed
//! or failed partway through.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use viewer_engine::render::{GraphicsContext, Window};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut window = Window::with_defaults()?;
//!     let context = GraphicsContext::build(&mut window)?;
//!
//!     while !window.should_close() {
//!         window.poll_events();
//!     }
//!
//!     drop(context);
//!     Ok(())
//! }
//! ```

/// Windowing and Vulkan context construction.
pub mod render;
