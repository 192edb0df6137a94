//! Core utilities shared by the e3d crates.
//!
//! - Error types and result aliases
//! - Logging initialization
//! - Frame statistics
//! - Engine configuration loaded from TOML

pub mod config;
mod error;
mod logging;
mod stats;

pub use config::{ClearColor, EngineConfig, GraphicsConfig, PresentModePreference, WindowConfig};
pub use error::{Error, Result};
pub use logging::{DEFAULT_FILTER, init_logging};
pub use stats::{FrameReport, FrameStats};
