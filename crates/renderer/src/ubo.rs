//! Uniform buffer object definitions for shaders.
//!
//! These structures must match the GLSL uniform block layouts exactly.
//! They use `#[repr(C)]` and implement `Pod` and `Zeroable` for byte casting.

use bytemuck::{Pod, Zeroable};
use glam::Mat4;

/// Transform block bound at set 0, binding 0 of the quad vertex shader.
///
/// ```glsl
/// layout(binding = 0) uniform UniformBufferObject {
///     mat4 model;
///     mat4 view;
///     mat4 proj;
/// } ubo;
/// ```
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct TransformUbo {
    pub model: Mat4,
    pub view: Mat4,
    pub proj: Mat4,
}

impl TransformUbo {
    pub const SIZE: usize = std::mem::size_of::<Self>();

    /// All three matrices set to identity, so vertices pass through in clip space.
    pub const fn identity() -> Self {
        Self {
            model: Mat4::IDENTITY,
            view: Mat4::IDENTITY,
            proj: Mat4::IDENTITY,
        }
    }
}

impl Default for TransformUbo {
    fn default() -> Self {
        Self::identity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transform_ubo_size() {
        // 3 Mat4 (3 * 64) = 192 bytes
        assert_eq!(TransformUbo::SIZE, 192);
    }

    #[test]
    fn test_transform_ubo_alignment() {
        assert_eq!(std::mem::align_of::<TransformUbo>(), 16);
    }

    #[test]
    fn test_default_is_identity() {
        let ubo = TransformUbo::default();
        assert_eq!(ubo.model, Mat4::IDENTITY);
        assert_eq!(ubo.view, Mat4::IDENTITY);
        assert_eq!(ubo.proj, Mat4::IDENTITY);
    }

    #[test]
    fn test_identity_bytes() {
        let ubo = TransformUbo::identity();
        let floats: &[f32] = bytemuck::cast_slice(bytemuck::bytes_of(&ubo));
        assert_eq!(floats.len(), 48);
        // Column-major diagonal of the first matrix
        assert_eq!(floats[0], 1.0);
        assert_eq!(floats[1], 0.0);
        assert_eq!(floats[5], 1.0);
        assert_eq!(floats[15], 1.0);
    }
}
