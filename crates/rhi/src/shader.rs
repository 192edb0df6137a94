//! Shader module management.
//!
//! This module loads SPIR-V byte code and wraps `VkShaderModule`.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::path::Path;
//! use e3d_rhi::device::Device;
//! use e3d_rhi::shader::{Shader, ShaderStage};
//!
//! # fn example(device: Arc<Device>) -> Result<(), e3d_rhi::RhiError> {
//! let vertex_shader = Shader::from_spirv_file(
//!     device.clone(),
//!     Path::new("shaders/base.vert.spv"),
//!     ShaderStage::Vertex,
//! )?;
//! let _stage_info = vertex_shader.stage_create_info();
//! # Ok(())
//! # }
//! ```

use std::ffi::CStr;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use ash::vk;
use tracing::debug;

use crate::device::Device;
use crate::error::{RhiError, RhiResult};

/// Entry point every shader module is expected to export.
pub const ENTRY_POINT: &CStr = c"main";

/// Shader stage type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    /// Vertex shader stage - processes each vertex
    Vertex,
    /// Fragment (pixel) shader stage - processes each fragment
    Fragment,
}

impl ShaderStage {
    /// Converts the shader stage to Vulkan shader stage flags.
    pub fn to_vk_stage(self) -> vk::ShaderStageFlags {
        match self {
            ShaderStage::Vertex => vk::ShaderStageFlags::VERTEX,
            ShaderStage::Fragment => vk::ShaderStageFlags::FRAGMENT,
        }
    }

    /// Returns a human-readable name for the shader stage.
    pub fn name(self) -> &'static str {
        match self {
            ShaderStage::Vertex => "vertex",
            ShaderStage::Fragment => "fragment",
        }
    }
}

impl std::fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Decodes SPIR-V bytes into words, validating size and magic number.
pub fn decode_spirv(bytes: &[u8]) -> std::io::Result<Vec<u32>> {
    ash::util::read_spv(&mut Cursor::new(bytes))
}

/// Reads and decodes the SPIR-V file at `path`.
///
/// # Errors
///
/// [`RhiError::ShaderLoadError`] naming `path` if the file cannot be read or
/// is not valid SPIR-V.
pub fn load_spirv(path: &Path) -> RhiResult<Vec<u32>> {
    let load_error = |source| RhiError::ShaderLoadError {
        path: PathBuf::from(path),
        source,
    };

    let bytes = std::fs::read(path).map_err(load_error)?;
    decode_spirv(&bytes).map_err(load_error)
}

/// Vulkan shader module wrapper.
///
/// The module is destroyed on drop. Pipelines keep no reference to their
/// shader modules, so a `Shader` may be dropped as soon as the pipeline exists.
pub struct Shader {
    /// Reference to the logical device.
    device: Arc<Device>,
    /// Vulkan shader module handle.
    module: vk::ShaderModule,
    /// Shader stage type.
    stage: ShaderStage,
}

impl Shader {
    /// Creates a shader module from a SPIR-V file.
    ///
    /// # Errors
    ///
    /// [`RhiError::ShaderLoadError`] if the file cannot be read or does not
    /// contain valid SPIR-V; a Vulkan error if module creation fails.
    pub fn from_spirv_file(device: Arc<Device>, path: &Path, stage: ShaderStage) -> RhiResult<Self> {
        debug!("Loading {} shader from {:?}", stage, path);
        let code = load_spirv(path)?;
        Self::from_spirv_words(device, &code, stage)
    }

    /// Creates a shader module from decoded SPIR-V words.
    pub fn from_spirv_words(device: Arc<Device>, code: &[u32], stage: ShaderStage) -> RhiResult<Self> {
        let create_info = vk::ShaderModuleCreateInfo::default().code(code);
        let module = unsafe { device.handle().create_shader_module(&create_info, None)? };

        debug!("Created {} shader module ({} words)", stage, code.len());

        Ok(Self {
            device,
            module,
            stage,
        })
    }

    #[inline]
    pub fn handle(&self) -> vk::ShaderModule {
        self.module
    }

    #[inline]
    pub fn stage(&self) -> ShaderStage {
        self.stage
    }

    /// Pipeline stage description for this module, using [`ENTRY_POINT`].
    pub fn stage_create_info(&self) -> vk::PipelineShaderStageCreateInfo<'static> {
        vk::PipelineShaderStageCreateInfo::default()
            .stage(self.stage.to_vk_stage())
            .module(self.module)
            .name(ENTRY_POINT)
    }
}

impl Drop for Shader {
    fn drop(&mut self) {
        unsafe {
            self.device
                .handle()
                .destroy_shader_module(self.module, None);
        }
        debug!("Destroyed {} shader module", self.stage);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SPIRV_MAGIC: u32 = 0x0723_0203;

    #[test]
    fn test_shader_stage_to_vk_stage() {
        assert_eq!(
            ShaderStage::Vertex.to_vk_stage(),
            vk::ShaderStageFlags::VERTEX
        );
        assert_eq!(
            ShaderStage::Fragment.to_vk_stage(),
            vk::ShaderStageFlags::FRAGMENT
        );
    }

    #[test]
    fn test_shader_stage_display() {
        assert_eq!(format!("{}", ShaderStage::Vertex), "vertex");
        assert_eq!(format!("{}", ShaderStage::Fragment), "fragment");
    }

    #[test]
    fn test_decode_spirv_rejects_misaligned() {
        assert!(decode_spirv(&[0u8; 5]).is_err());
    }

    #[test]
    fn test_decode_spirv_accepts_magic() {
        let mut bytes = SPIRV_MAGIC.to_le_bytes().to_vec();
        bytes.extend_from_slice(&0x0001_0000u32.to_le_bytes());
        let words = decode_spirv(&bytes).unwrap();
        assert_eq!(words, vec![SPIRV_MAGIC, 0x0001_0000]);
    }

    /// Writes `bytes` to a per-process file under the system temp directory.
    fn temp_shader(name: &str, bytes: &[u8]) -> PathBuf {
        let path = std::env::temp_dir().join(format!("e3d-{}-{}", std::process::id(), name));
        std::fs::write(&path, bytes).unwrap();
        path
    }

    #[test]
    fn test_load_spirv_missing_file_names_path() {
        let path = Path::new("no/such/dir/base.vert.spv");
        let err = load_spirv(path).unwrap_err();
        assert!(err.to_string().contains("base.vert.spv"));
        match err {
            RhiError::ShaderLoadError { path: failed, source } => {
                assert_eq!(failed, path);
                assert_eq!(source.kind(), std::io::ErrorKind::NotFound);
            }
            other => panic!("expected a shader load error, got {:?}", other),
        }
    }

    #[test]
    fn test_load_spirv_rejects_misaligned_file() {
        let path = temp_shader("misaligned.spv", &[0x03, 0x02, 0x23, 0x07, 0x00]);
        let result = load_spirv(&path);
        std::fs::remove_file(&path).unwrap();

        match result {
            Err(RhiError::ShaderLoadError { path: failed, .. }) => assert_eq!(failed, path),
            other => panic!("expected a shader load error, got {:?}", other),
        }
    }

    #[test]
    fn test_load_spirv_reads_words() {
        let mut bytes = SPIRV_MAGIC.to_le_bytes().to_vec();
        bytes.extend_from_slice(&7u32.to_le_bytes());
        let path = temp_shader("valid.spv", &bytes);
        let result = load_spirv(&path);
        std::fs::remove_file(&path).unwrap();

        assert_eq!(result.unwrap(), vec![SPIRV_MAGIC, 7]);
    }
}
