//! Vulkan abstraction layer (Render Hardware Interface).
//!
//! This crate wraps the `ash` bindings in RAII types and owns the frame-
//! independent part of the GPU lifecycle:
//! - Instance, surface, adapter and device bring-up ([`context::DeviceContext`])
//! - Swapchain creation, acquisition, presentation and recreation
//! - Command pools and buffers, fences and semaphores
//! - Buffers, descriptors, render passes and graphics pipelines

mod error;

pub mod buffer;
pub mod command;
pub mod context;
pub mod descriptor;
pub mod device;
pub mod instance;
pub mod physical_device;
pub mod pipeline;
pub mod render_pass;
pub mod shader;
pub mod surface;
pub mod swapchain;
pub mod sync;
pub mod vertex;

pub use error::{RhiError, RhiResult};

// Re-export ash types that users might need
pub use ash::vk;
