//! Vertex data structures and input descriptions.
//!
//! [`Vertex`] is the 2D position + RGB color format drawn by the quad scene.

use ash::vk;
use bytemuck::{Pod, Zeroable};
use glam::{Vec2, Vec3};

/// Vertex with a 2D clip-space position and an RGB color.
///
/// # Memory Layout
///
/// - Offset 0: position (8 bytes)
/// - Offset 8: color (12 bytes)
/// - Total size: 20 bytes
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: Vec2,
    pub color: Vec3,
}

impl Vertex {
    #[inline]
    pub const fn new(position: Vec2, color: Vec3) -> Self {
        Self { position, color }
    }

    /// Binding 0, per-vertex rate, stride of one [`Vertex`].
    pub fn binding_description() -> vk::VertexInputBindingDescription {
        vk::VertexInputBindingDescription {
            binding: 0,
            stride: std::mem::size_of::<Self>() as u32,
            input_rate: vk::VertexInputRate::VERTEX,
        }
    }

    /// Position at location 0, color at location 1.
    pub fn attribute_descriptions() -> [vk::VertexInputAttributeDescription; 2] {
        [
            vk::VertexInputAttributeDescription {
                binding: 0,
                location: 0,
                format: vk::Format::R32G32_SFLOAT,
                offset: std::mem::offset_of!(Vertex, position) as u32,
            },
            vk::VertexInputAttributeDescription {
                binding: 0,
                location: 1,
                format: vk::Format::R32G32B32_SFLOAT,
                offset: std::mem::offset_of!(Vertex, color) as u32,
            },
        ]
    }
}

/// The four corners of the quad, counter-clockwise from bottom-left.
pub const QUAD_VERTICES: [Vertex; 4] = [
    Vertex::new(Vec2::new(-0.5, -0.5), Vec3::new(1.0, 0.0, 0.0)),
    Vertex::new(Vec2::new(0.5, -0.5), Vec3::new(0.0, 1.0, 0.0)),
    Vertex::new(Vec2::new(0.5, 0.5), Vec3::new(0.0, 0.0, 1.0)),
    Vertex::new(Vec2::new(-0.5, 0.5), Vec3::new(1.0, 1.0, 1.0)),
];

/// Two triangles covering the quad.
pub const QUAD_INDICES: [u16; 6] = [0, 1, 2, 2, 3, 0];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vertex_size_and_offsets() {
        assert_eq!(std::mem::size_of::<Vertex>(), 20);

        let binding = Vertex::binding_description();
        assert_eq!(binding.binding, 0);
        assert_eq!(binding.stride, 20);
        assert_eq!(binding.input_rate, vk::VertexInputRate::VERTEX);

        let [position, color] = Vertex::attribute_descriptions();
        assert_eq!(position.location, 0);
        assert_eq!(position.format, vk::Format::R32G32_SFLOAT);
        assert_eq!(position.offset, 0);
        assert_eq!(color.location, 1);
        assert_eq!(color.format, vk::Format::R32G32B32_SFLOAT);
        assert_eq!(color.offset, 8);
    }

    #[test]
    fn test_quad_geometry() {
        assert_eq!(QUAD_VERTICES[0].position, Vec2::new(-0.5, -0.5));
        assert_eq!(QUAD_VERTICES[0].color, Vec3::X);
        assert_eq!(QUAD_VERTICES[1].color, Vec3::Y);
        assert_eq!(QUAD_VERTICES[2].color, Vec3::Z);
        assert_eq!(QUAD_VERTICES[3].color, Vec3::ONE);
        assert_eq!(QUAD_INDICES, [0, 1, 2, 2, 3, 0]);
        assert!(
            QUAD_INDICES
                .iter()
                .all(|&i| (i as usize) < QUAD_VERTICES.len())
        );
    }

    #[test]
    fn test_vertex_bytes_are_tightly_packed() {
        let bytes: &[u8] = bytemuck::cast_slice(&QUAD_VERTICES);
        assert_eq!(bytes.len(), 80);
    }
}
