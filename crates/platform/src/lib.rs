//! Platform layer for the e3d renderer.
//!
//! - Window creation via winit and Vulkan surface creation via `ash-window`
//! - Translated window events, drained through [`SurfaceProvider::poll_event`]
//! - Keyboard state
//!
//! [`SurfaceProvider::poll_event`]: e3d_rhi::surface::SurfaceProvider::poll_event

mod input;
mod window;

pub use input::{InputState, KeyCode};
pub use window::{EventQueue, Window, WindowEvent, translate_event};

// Window implements this; callers need it in scope for `poll_event`
pub use e3d_rhi::surface::SurfaceProvider;

// Re-export winit types the event loop needs
pub use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
