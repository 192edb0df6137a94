//! Engine configuration.
//!
//! Settings are read from a TOML file (`e3d.toml` by default). Every field has
//! a default, so a missing file or a partial file are both valid:
//!
//! ```toml
//! log_filter = "info,e3d_rhi=trace"
//!
//! [window]
//! title = "e3d"
//! width = 1280
//! height = 720
//!
//! [graphics]
//! validation = true
//! present_mode = "mailbox"
//! shader_dir = "shaders"
//! clear_color = [0.0, 0.0, 0.0, 1.0]   # or packed: 0x000000FF
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{debug, info};

use crate::error::{Error, Result};

/// Default configuration file name, looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "e3d.toml";

/// Top-level engine configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Window creation parameters.
    pub window: WindowConfig,
    /// Device and swapchain parameters.
    pub graphics: GraphicsConfig,
    /// Tracing filter directives used when `RUST_LOG` is unset.
    pub log_filter: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "e3d".to_string(),
            width: 1280,
            height: 720,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct GraphicsConfig {
    /// Request the Khronos validation layer. It is only enabled when the
    /// layer and both debug extensions are installed.
    pub validation: bool,
    /// Preferred presentation mode.
    pub present_mode: PresentModePreference,
    /// Directory holding `base.vert.spv` and `base.frag.spv`.
    pub shader_dir: PathBuf,
    /// Clear color for the scene render pass.
    pub clear_color: ClearColor,
}

impl Default for GraphicsConfig {
    fn default() -> Self {
        Self {
            validation: true,
            present_mode: PresentModePreference::default(),
            shader_dir: PathBuf::from("shaders"),
            clear_color: ClearColor::default(),
        }
    }
}

/// Clear color, either normalized RGBA components or a packed `0xRRGGBBAA`.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ClearColor {
    Rgba([f32; 4]),
    Packed(u32),
}

impl Default for ClearColor {
    fn default() -> Self {
        ClearColor::Rgba([0.0, 0.0, 0.0, 1.0])
    }
}

/// Presentation mode preference.
///
/// `Mailbox` falls back to FIFO when the surface does not offer it;
/// `Fifo` always uses FIFO (vsync).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PresentModePreference {
    #[default]
    Mailbox,
    Fifo,
}

impl EngineConfig {
    /// Parses a configuration from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| Error::Config(e.to_string()))
    }

    /// Loads the configuration at `path`.
    ///
    /// A missing file yields the defaults. A file that exists but cannot be
    /// read or parsed is an error.
    pub fn load(path: &Path) -> Result<Self> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No config at {:?}, using defaults", path);
                return Ok(Self::default());
            }
            Err(e) => return Err(e.into()),
        };

        let config = Self::from_toml_str(&text)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        info!("Loaded config from {:?}", path);
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.window.title, "e3d");
        assert_eq!(config.window.width, 1280);
        assert_eq!(config.window.height, 720);
        assert!(config.graphics.validation);
        assert_eq!(config.graphics.present_mode, PresentModePreference::Mailbox);
        assert_eq!(config.graphics.shader_dir, PathBuf::from("shaders"));
        assert_eq!(
            config.graphics.clear_color,
            ClearColor::Rgba([0.0, 0.0, 0.0, 1.0])
        );
        assert!(config.log_filter.is_none());
    }

    #[test]
    fn test_empty_file_is_default() {
        let config = EngineConfig::from_toml_str("").unwrap();
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn test_partial_override() {
        let config = EngineConfig::from_toml_str(
            r#"
            [window]
            width = 800
            height = 600

            [graphics]
            present_mode = "fifo"
            validation = false
            "#,
        )
        .unwrap();

        assert_eq!(config.window.width, 800);
        assert_eq!(config.window.height, 600);
        assert_eq!(config.window.title, "e3d");
        assert_eq!(config.graphics.present_mode, PresentModePreference::Fifo);
        assert!(!config.graphics.validation);
    }

    #[test]
    fn test_clear_color_forms() {
        let config =
            EngineConfig::from_toml_str("[graphics]\nclear_color = [0.1, 0.2, 0.3, 1.0]\n").unwrap();
        assert_eq!(
            config.graphics.clear_color,
            ClearColor::Rgba([0.1, 0.2, 0.3, 1.0])
        );

        let config = EngineConfig::from_toml_str("[graphics]\nclear_color = 0x336699FF\n").unwrap();
        assert_eq!(config.graphics.clear_color, ClearColor::Packed(0x336699FF));
    }

    #[test]
    fn test_clear_color_rejects_short_array() {
        let result = EngineConfig::from_toml_str("[graphics]\nclear_color = [0.0, 0.0]\n");
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_invalid_present_mode_is_config_error() {
        let result = EngineConfig::from_toml_str("[graphics]\npresent_mode = \"immediate\"\n");
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_missing_file_is_default() {
        let config = EngineConfig::load(Path::new("definitely/not/here/e3d.toml")).unwrap();
        assert_eq!(config, EngineConfig::default());
    }
}
