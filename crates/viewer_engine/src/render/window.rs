//! GLFW-based window management for the Vulkan viewer
//!
//! Owns the GLFW library handle alongside the window, so library init and
//! terminate bracket the window's lifetime exactly once per process. The
//! window is configured for Vulkan only (no client API context).

use thiserror::Error;

/// Default width of the viewer window in pixels.
pub const DEFAULT_WIDTH: u32 = 1600;
/// Default height of the viewer window in pixels.
pub const DEFAULT_HEIGHT: u32 = 900;
/// Title of the viewer window.
pub const WINDOW_TITLE: &str = "Viewer";

/// Window management errors
#[derive(Error, Debug)]
pub enum WindowError {
    /// GLFW library initialization failed
    #[error("GLFW initialization failed")]
    InitializationFailed,

    /// Window creation was rejected by the window system
    #[error("window creation failed")]
    CreationFailed,

    /// Any other GLFW-reported failure
    #[error("GLFW error: {0}")]
    Glfw(String),
}

/// Result type for window operations
pub type WindowResult<T> = Result<T, WindowError>;

/// GLFW window wrapper with scoped library init/terminate.
pub struct Window {
    glfw: glfw::Glfw,
    window: glfw::PWindow,
    events: glfw::GlfwReceiver<(f64, glfw::WindowEvent)>,
}

impl Window {
    /// Create a Vulkan-capable window.
    pub fn new(width: u32, height: u32, title: &str) -> WindowResult<Self> {
        let mut glfw = glfw::init(glfw::fail_on_errors)
            .map_err(|_| WindowError::InitializationFailed)?;

        // Configure for Vulkan (no OpenGL context)
        glfw.window_hint(glfw::WindowHint::ClientApi(glfw::ClientApiHint::NoApi));
        glfw.window_hint(glfw::WindowHint::Resizable(true));

        let (mut window, events) = glfw
            .create_window(width, height, title, glfw::WindowMode::Windowed)
            .ok_or(WindowError::CreationFailed)?;

        window.set_key_polling(true);
        window.set_close_polling(true);
        window.set_framebuffer_size_polling(true);

        Ok(Self {
            glfw,
            window,
            events,
        })
    }

    /// Create the window with the viewer defaults (1600x900, titled "Viewer").
    pub fn with_defaults() -> WindowResult<Self> {
        Self::new(DEFAULT_WIDTH, DEFAULT_HEIGHT, WINDOW_TITLE)
    }

    /// Whether a close has been requested by the user or the application.
    pub fn should_close(&self) -> bool {
        self.window.should_close()
    }

    /// Pump window events, mapping a close request or an Escape key press
    /// to the should-close flag.
    pub fn poll_events(&mut self) {
        self.glfw.poll_events();

        let mut close_requested = false;
        for (_, event) in glfw::flush_messages(&self.events) {
            match event {
                glfw::WindowEvent::Close
                | glfw::WindowEvent::Key(glfw::Key::Escape, _, glfw::Action::Press, _) => {
                    close_requested = true;
                }
                _ => {}
            }
        }

        if close_requested {
            self.window.set_should_close(true);
        }
    }

    /// Current drawable size in pixels.
    pub fn framebuffer_size(&self) -> (u32, u32) {
        let (width, height) = self.window.get_framebuffer_size();
        (width as u32, height as u32)
    }

    /// Instance extensions the window system needs for surface creation.
    pub fn required_instance_extensions(&self) -> WindowResult<Vec<String>> {
        self.glfw
            .get_required_instance_extensions()
            .ok_or_else(|| {
                WindowError::Glfw("no Vulkan-capable instance extensions reported".to_string())
            })
    }

    /// Create a Vulkan surface for this window on the given instance.
    pub fn create_surface(
        &mut self,
        instance: ash::vk::Instance,
    ) -> WindowResult<ash::vk::SurfaceKHR> {
        let mut surface = ash::vk::SurfaceKHR::null();
        let result = self
            .window
            .create_window_surface(instance, std::ptr::null(), &mut surface);

        if result == ash::vk::Result::SUCCESS {
            Ok(surface)
        } else {
            Err(WindowError::Glfw(format!(
                "failed to create Vulkan surface: {:?}",
                result
            )))
        }
    }
}
