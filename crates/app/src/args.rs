//! Command-line arguments.

use std::path::PathBuf;

use clap::Parser;
use e3d_core::config::DEFAULT_CONFIG_FILE;
use e3d_core::{EngineConfig, PresentModePreference};

/// Draws a colored quad with Vulkan.
#[derive(Debug, Parser)]
#[command(name = "e3d", version)]
pub struct Args {
    /// Configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,

    /// Window width in pixels
    #[arg(long)]
    pub width: Option<u32>,

    /// Window height in pixels
    #[arg(long)]
    pub height: Option<u32>,

    /// Window title
    #[arg(long)]
    pub title: Option<String>,

    /// Disable the Vulkan validation layer
    #[arg(long)]
    pub no_validation: bool,

    /// Force FIFO presentation (vsync)
    #[arg(long)]
    pub fifo: bool,
}

impl Args {
    /// Overrides `config` with every option given on the command line.
    pub fn apply(&self, config: &mut EngineConfig) {
        if let Some(width) = self.width {
            config.window.width = width;
        }
        if let Some(height) = self.height {
            config.window.height = height;
        }
        if let Some(title) = &self.title {
            config.window.title = title.clone();
        }
        if self.no_validation {
            config.graphics.validation = false;
        }
        if self.fifo {
            config.graphics.present_mode = PresentModePreference::Fifo;
        }
    }
}
