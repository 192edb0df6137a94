//! e3d - Main Entry Point
//!
//! Opens a window and draws a colored quad every frame until the window is
//! closed or Escape is pressed.

mod args;

use anyhow::{Result, anyhow};
use clap::Parser;
use tracing::{error, info};
use winit::application::ApplicationHandler;
use winit::event::WindowEvent as WinitWindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::WindowId;

use e3d_core::{EngineConfig, FrameStats};
use e3d_platform::{InputState, KeyCode, SurfaceProvider, Window, WindowEvent};
use e3d_renderer::{FrameStatus, Renderer};

use crate::args::Args;

struct App {
    config: EngineConfig,
    // Dropped before the window it renders to
    renderer: Option<Renderer>,
    window: Option<Window>,
    input: InputState,
    stats: FrameStats,
    failure: Option<anyhow::Error>,
}

impl App {
    fn new(config: EngineConfig) -> Self {
        Self {
            config,
            renderer: None,
            window: None,
            input: InputState::new(),
            stats: FrameStats::default(),
            failure: None,
        }
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, err: anyhow::Error) {
        error!("{:#}", err);
        self.failure = Some(err);
        event_loop.exit();
    }

    /// Drains the window's event queue.
    fn process_events(&mut self, event_loop: &ActiveEventLoop) {
        let Some(window) = self.window.as_mut() else {
            return;
        };

        while let Some(event) = window.poll_event() {
            self.input.apply(&event);
            match event {
                WindowEvent::CloseRequested => {
                    info!("Close requested, shutting down");
                    event_loop.exit();
                }
                WindowEvent::Resized { width, height } => {
                    if let Some(renderer) = self.renderer.as_mut() {
                        renderer.resize(width, height);
                    }
                }
                WindowEvent::KeyPressed(_) | WindowEvent::KeyReleased(_) => {}
            }
        }

        if self.input.is_key_just_pressed(KeyCode::Escape) {
            info!("Escape pressed, shutting down");
            event_loop.exit();
        }
    }

    fn draw(&mut self, event_loop: &ActiveEventLoop) {
        let Some(renderer) = self.renderer.as_mut() else {
            return;
        };

        match renderer.render_frame() {
            Ok(status) => {
                if let Some(report) = self.stats.tick(status == FrameStatus::Presented) {
                    info!(
                        "{:.1} fps, {:.2} ms/frame, {} presented, {} skipped, {} rebuild(s)",
                        report.fps,
                        report.avg_frame_ms,
                        report.presented,
                        report.skipped,
                        renderer.rebuild_count()
                    );
                }
            }
            Err(e) => self.fail(event_loop, anyhow!(e).context("render error")),
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let window = match Window::new(event_loop, &self.config.window) {
            Ok(window) => window,
            Err(e) => return self.fail(event_loop, anyhow!(e).context("failed to create window")),
        };

        match Renderer::new(&window, &self.config) {
            Ok(renderer) => {
                info!("Initialization complete, entering main loop");
                self.renderer = Some(renderer);
                self.window = Some(window);
            }
            Err(e) => self.fail(event_loop, anyhow!(e).context("failed to create renderer")),
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _id: WindowId,
        event: WinitWindowEvent,
    ) {
        if let WinitWindowEvent::RedrawRequested = event {
            self.draw(event_loop);
            return;
        }

        if let Some(window) = self.window.as_mut() {
            window.handle_event(&event);
        }
        self.process_events(event_loop);
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        self.input.begin_frame();
        if let Some(window) = self.window.as_ref() {
            window.request_redraw();
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        // Release the GPU before the window goes away
        self.renderer = None;
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = EngineConfig::load(&args.config)?;
    args.apply(&mut config);

    e3d_core::init_logging(config.log_filter.as_deref());
    info!("Starting e3d");

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = App::new(config);
    event_loop.run_app(&mut app)?;

    match app.failure.take() {
        Some(err) => Err(err),
        None => Ok(()),
    }
}
