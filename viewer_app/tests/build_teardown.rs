//! End-to-end context bring-up against a real driver.
//!
//! Requires a Vulkan implementation, the Khronos validation layer, and a
//! display, so it is ignored by default. Run with
//! `cargo test -- --ignored` on a workstation with those available.

use viewer_engine::render::{GraphicsContext, Window};

#[test]
#[ignore = "requires a Vulkan driver and a display"]
fn builds_and_tears_down_a_full_context() {
    let mut window = Window::new(640, 480, "viewer test").expect("window creation");
    let mut context = GraphicsContext::build(&mut window).expect("context build");

    assert!(context.image_count() >= 1);
    let extent = context.swapchain_extent();
    assert!(extent.width > 0 && extent.height > 0);

    // Explicit destroy followed by drop must not double-free.
    context.destroy();
}
