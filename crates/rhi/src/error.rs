//! RHI-specific error types.

use std::path::PathBuf;

use ash::vk;
use thiserror::Error;

/// RHI-specific error type.
///
/// Every setup-phase variant is fatal. The only recoverable condition, a stale
/// or suboptimal swapchain, is not an error at all: it is reported as
/// [`AcquireOutcome::Retry`](crate::swapchain::AcquireOutcome::Retry).
#[derive(Error, Debug)]
pub enum RhiError {
    /// Instance, surface, adapter or device bring-up failed
    #[error("Initialization failed: {0}")]
    InitializationError(String),

    /// No queue family supports graphics, or none can present to the surface
    #[error("No queue family supports both graphics and presentation")]
    NoSuitableQueueFamily,

    /// No memory type matches the requested filter and properties
    #[error("No memory type matches filter {type_bits:#b} with properties {properties:?}")]
    NoSuitableMemoryType {
        type_bits: u32,
        properties: vk::MemoryPropertyFlags,
    },

    /// Swapchain image acquisition failed for a reason other than staleness
    #[error("Failed to acquire swapchain image: {0}")]
    AcquireError(vk::Result),

    /// Queue submission failed
    #[error("Failed to submit command buffer: {0}")]
    SubmitError(vk::Result),

    /// Presentation failed for a reason other than staleness
    #[error("Failed to present swapchain image: {0}")]
    PresentError(vk::Result),

    /// Shader byte code could not be read or is malformed
    #[error("Failed to load shader {path:?}: {source}")]
    ShaderLoadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Pipeline, pipeline layout or render pass creation failed
    #[error("Pipeline creation failed: {0}")]
    PipelineCreationError(String),

    /// Buffer creation, allocation or mapping failed
    #[error("Buffer allocation failed: {0}")]
    BufferAllocationError(String),

    /// Swapchain creation error
    #[error("Swapchain error: {0}")]
    SwapchainError(String),

    /// Invalid handle or out-of-range index
    #[error("Invalid handle: {0}")]
    InvalidHandle(String),

    /// Vulkan API error
    #[error("Vulkan error: {0}")]
    VulkanError(#[from] vk::Result),

    /// Failed to load Vulkan library
    #[error("Failed to load Vulkan: {0}")]
    LoadingError(#[from] ash::LoadingError),
}

/// Result type alias for RHI operations.
pub type RhiResult<T> = std::result::Result<T, RhiError>;
