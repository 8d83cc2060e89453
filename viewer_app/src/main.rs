//! Vulkan viewer application
//!
//! Opens a window, brings up the full graphics context, and runs the event
//! loop until the window is closed or Escape is pressed. All driver-side
//! resources are released before exit, in reverse acquisition order.

use viewer_engine::render::{GraphicsContext, Window};

fn main() {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    if let Err(err) = run() {
        log::error!("Viewer failed: {}", err);
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    log::info!("Starting Vulkan viewer");

    let mut window = Window::with_defaults()?;
    let context = GraphicsContext::build(&mut window)?;
    log::info!(
        "Swapchain ready: {} images, {:?}, {}x{}",
        context.image_count(),
        context.swapchain_format(),
        context.swapchain_extent().width,
        context.swapchain_extent().height
    );

    while !window.should_close() {
        window.poll_events();
    }

    log::info!("Shutting down");
    drop(context);
    Ok(())
}
