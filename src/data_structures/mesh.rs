//! CPU-side geometry for the sky cube and the ground plane.

use std::ops::Range;

use cgmath::{InnerSpace, Vector3};

pub trait Vertex {
    fn desc() -> wgpu::VertexBufferLayout<'static>;
}

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct MeshVertex {
    pub position: [f32; 3],
    pub tex_coords: [f32; 2],
    pub normal: [f32; 3],
}

impl Vertex for MeshVertex {
    fn desc() -> wgpu::VertexBufferLayout<'static> {
        use std::mem;
        wgpu::VertexBufferLayout {
            array_stride: mem::size_of::<MeshVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 0,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 3]>() as wgpu::BufferAddress,
                    shader_location: 1,
                    format: wgpu::VertexFormat::Float32x2,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 5]>() as wgpu::BufferAddress,
                    shader_location: 2,
                    format: wgpu::VertexFormat::Float32x3,
                },
            ],
        }
    }
}

/// Indexed triangle geometry. Each entry of `groups` is an index range drawn
/// with the material at the same position in the owning node's material list.
#[derive(Clone, Debug, PartialEq)]
pub struct Geometry {
    pub vertices: Vec<MeshVertex>,
    pub indices: Vec<u32>,
    pub groups: Vec<Range<u32>>,
}

impl Geometry {
    /// Unit cube centred on the origin with one group per face, ordered
    /// +X, -X, +Y, -Y, +Z, -Z. Faces wind counter-clockwise seen from outside.
    pub fn unit_cube() -> Self {
        let faces: [(Vector3<f32>, Vector3<f32>, Vector3<f32>); 6] = [
            (Vector3::unit_x(), -Vector3::unit_z(), Vector3::unit_y()),
            (-Vector3::unit_x(), Vector3::unit_z(), Vector3::unit_y()),
            (Vector3::unit_y(), Vector3::unit_x(), -Vector3::unit_z()),
            (-Vector3::unit_y(), Vector3::unit_x(), Vector3::unit_z()),
            (Vector3::unit_z(), Vector3::unit_x(), Vector3::unit_y()),
            (-Vector3::unit_z(), -Vector3::unit_x(), Vector3::unit_y()),
        ];
        let mut geometry = Self::empty();
        for (normal, u, v) in faces {
            geometry.push_quad(normal * 0.5, u * 0.5, v * 0.5, normal);
        }
        geometry
    }

    /// Flat ground plane on y = 0, facing +Y, with UVs spanning 0..1 once.
    pub fn plane(width: f32, depth: f32) -> Self {
        let mut geometry = Self::empty();
        geometry.push_quad(
            Vector3::new(0.0, 0.0, 0.0),
            Vector3::unit_x() * (width * 0.5),
            -Vector3::unit_z() * (depth * 0.5),
            Vector3::unit_y(),
        );
        geometry
    }

    fn empty() -> Self {
        Self {
            vertices: Vec::new(),
            indices: Vec::new(),
            groups: Vec::new(),
        }
    }

    fn push_quad(
        &mut self,
        centre: Vector3<f32>,
        half_u: Vector3<f32>,
        half_v: Vector3<f32>,
        normal: Vector3<f32>,
    ) {
        let base = self.vertices.len() as u32;
        let corners = [
            (centre - half_u - half_v, [0.0, 1.0]),
            (centre + half_u - half_v, [1.0, 1.0]),
            (centre + half_u + half_v, [1.0, 0.0]),
            (centre - half_u + half_v, [0.0, 0.0]),
        ];
        let normal = normal.normalize();
        for (position, tex_coords) in corners {
            self.vertices.push(MeshVertex {
                position: position.into(),
                tex_coords,
                normal: normal.into(),
            });
        }
        let start = self.indices.len() as u32;
        self.indices
            .extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
        self.groups.push(start..start + 6);
    }

    /// Axis-aligned bounds as (min, max).
    pub fn bounds(&self) -> ([f32; 3], [f32; 3]) {
        let mut min = [f32::INFINITY; 3];
        let mut max = [f32::NEG_INFINITY; 3];
        for vertex in &self.vertices {
            for axis in 0..3 {
                min[axis] = min[axis].min(vertex.position[axis]);
                max[axis] = max[axis].max(vertex.position[axis]);
            }
        }
        (min, max)
    }
}
