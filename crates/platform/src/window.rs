//! Window management using winit.
//!
//! [`Window`] is the engine's [`SurfaceProvider`]: it reports the instance
//! extensions the display needs, creates the Vulkan surface, and queues
//! translated winit events until the application drains them.

use std::collections::VecDeque;
use std::ffi::CStr;

use ash::vk;
use e3d_core::{Error, Result, WindowConfig};
use e3d_rhi::surface::SurfaceProvider;
use e3d_rhi::{RhiError, RhiResult};
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use winit::dpi::PhysicalSize;
use winit::event::ElementState;
use winit::event_loop::ActiveEventLoop;
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{Window as WinitWindow, WindowAttributes};

/// Window events the engine cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowEvent {
    CloseRequested,
    Resized { width: u32, height: u32 },
    KeyPressed(KeyCode),
    KeyReleased(KeyCode),
}

/// Translates a winit window event, dropping the ones the engine ignores.
pub fn translate_event(event: &winit::event::WindowEvent) -> Option<WindowEvent> {
    match event {
        winit::event::WindowEvent::CloseRequested => Some(WindowEvent::CloseRequested),
        winit::event::WindowEvent::Resized(size) => Some(resized(*size)),
        winit::event::WindowEvent::KeyboardInput { event, .. } if !event.repeat => {
            key_event(event.state, event.physical_key)
        }
        _ => None,
    }
}

fn resized(size: PhysicalSize<u32>) -> WindowEvent {
    WindowEvent::Resized {
        width: size.width,
        height: size.height,
    }
}

fn key_event(state: ElementState, key: PhysicalKey) -> Option<WindowEvent> {
    let PhysicalKey::Code(code) = key else {
        return None;
    };
    Some(match state {
        ElementState::Pressed => WindowEvent::KeyPressed(code),
        ElementState::Released => WindowEvent::KeyReleased(code),
    })
}

/// FIFO of translated events, drained by [`SurfaceProvider::poll_event`].
#[derive(Debug, Default)]
pub struct EventQueue {
    events: VecDeque<WindowEvent>,
}

impl EventQueue {
    pub fn push(&mut self, event: WindowEvent) {
        self.events.push_back(event);
    }

    pub fn pop(&mut self) -> Option<WindowEvent> {
        self.events.pop_front()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

/// A winit window that can host the renderer's surface.
pub struct Window {
    window: WinitWindow,
    width: u32,
    height: u32,
    events: EventQueue,
}

impl Window {
    /// Creates a resizable window from `config`.
    pub fn new(event_loop: &ActiveEventLoop, config: &WindowConfig) -> Result<Self> {
        let attrs = WindowAttributes::default()
            .with_title(config.title.as_str())
            .with_inner_size(PhysicalSize::new(config.width, config.height))
            .with_resizable(true);

        let window = event_loop
            .create_window(attrs)
            .map_err(|e| Error::Window(e.to_string()))?;

        // The platform may not honour the requested size
        let size = window.inner_size();
        tracing::info!(
            "Window \"{}\" created: {}x{}",
            config.title,
            size.width,
            size.height
        );

        Ok(Self {
            window,
            width: size.width,
            height: size.height,
            events: EventQueue::default(),
        })
    }

    pub fn request_redraw(&self) {
        self.window.request_redraw();
    }

    /// Feeds a winit event into the queue, tracking the size on resize.
    pub fn handle_event(&mut self, event: &winit::event::WindowEvent) {
        let Some(event) = translate_event(event) else {
            return;
        };
        if let WindowEvent::Resized { width, height } = event {
            self.width = width;
            self.height = height;
            tracing::debug!("Window resized: {}x{}", width, height);
        }
        self.events.push(event);
    }
}

impl SurfaceProvider for Window {
    type Event = WindowEvent;

    fn required_extensions(&self) -> RhiResult<Vec<&'static CStr>> {
        let display_handle = self
            .window
            .display_handle()
            .map_err(|e| RhiError::InitializationError(format!("display handle: {e}")))?;

        let extensions = ash_window::enumerate_required_extensions(display_handle.as_raw())
            .map_err(|e| RhiError::InitializationError(format!("surface extensions: {e}")))?;

        // SAFETY: ash_window returns pointers to static, null-terminated
        // extension name constants.
        let names: Vec<&'static CStr> = extensions
            .iter()
            .map(|&ext| unsafe { CStr::from_ptr(ext) })
            .collect();

        tracing::debug!("Required Vulkan extensions for surface: {:?}", names);
        Ok(names)
    }

    fn create_surface(
        &self,
        entry: &ash::Entry,
        instance: &ash::Instance,
    ) -> RhiResult<vk::SurfaceKHR> {
        let display_handle = self
            .window
            .display_handle()
            .map_err(|e| RhiError::InitializationError(format!("display handle: {e}")))?;
        let window_handle = self
            .window
            .window_handle()
            .map_err(|e| RhiError::InitializationError(format!("window handle: {e}")))?;

        // SAFETY: both handles come from the live winit window; the caller
        // owns the returned surface and destroys it before the instance.
        unsafe {
            ash_window::create_surface(
                entry,
                instance,
                display_handle.as_raw(),
                window_handle.as_raw(),
                None,
            )
        }
        .map_err(|e| RhiError::InitializationError(format!("create surface: {e}")))
    }

    fn poll_event(&mut self) -> Option<WindowEvent> {
        self.events.pop()
    }

    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_event_translation() {
        assert_eq!(
            key_event(ElementState::Pressed, PhysicalKey::Code(KeyCode::Escape)),
            Some(WindowEvent::KeyPressed(KeyCode::Escape))
        );
        assert_eq!(
            key_event(ElementState::Released, PhysicalKey::Code(KeyCode::KeyW)),
            Some(WindowEvent::KeyReleased(KeyCode::KeyW))
        );
    }

    #[test]
    fn test_unidentified_key_is_dropped() {
        let key = PhysicalKey::Unidentified(winit::keyboard::NativeKeyCode::Unidentified);
        assert_eq!(key_event(ElementState::Pressed, key), None);
    }

    #[test]
    fn test_translate_close_and_resize() {
        assert_eq!(
            translate_event(&winit::event::WindowEvent::CloseRequested),
            Some(WindowEvent::CloseRequested)
        );
        assert_eq!(
            translate_event(&winit::event::WindowEvent::Resized(PhysicalSize::new(800, 0))),
            Some(WindowEvent::Resized {
                width: 800,
                height: 0
            })
        );
        assert_eq!(
            translate_event(&winit::event::WindowEvent::Focused(true)),
            None
        );
    }

    #[test]
    fn test_event_queue_is_fifo() {
        let mut queue = EventQueue::default();
        assert!(queue.is_empty());

        queue.push(WindowEvent::Resized {
            width: 1,
            height: 1,
        });
        queue.push(WindowEvent::CloseRequested);
        assert_eq!(queue.len(), 2);

        assert!(matches!(queue.pop(), Some(WindowEvent::Resized { .. })));
        assert_eq!(queue.pop(), Some(WindowEvent::CloseRequested));
        assert_eq!(queue.pop(), None);
    }
}
