//! Frame lifecycle and scene rendering.
//!
//! This crate drives the GPU frame by frame:
//! - Frame slots, acquisition, submission and presentation
//! - The quad scene and its graphics pipeline
//! - The [`Renderer`] facade tying both to a window

pub mod frame_executor;
pub mod renderer;
pub mod scene;
pub mod triangle_pipeline;
pub mod ubo;

pub use frame_executor::{FrameExecutor, FrameStatus, MAX_FRAMES_IN_FLIGHT};
pub use renderer::Renderer;
pub use scene::{SceneResources, color_u32_to_f32};
