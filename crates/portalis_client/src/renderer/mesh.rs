use std::f32::consts::{PI, TAU};
use std::mem;

use bytemuck::{Pod, Zeroable};

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct MeshVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
}

impl MeshVertex {
    pub fn desc() -> wgpu::VertexBufferLayout<'static> {
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
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: (2 * mem::size_of::<[f32; 3]>()) as wgpu::BufferAddress,
                    shader_location: 2,
                    format: wgpu::VertexFormat::Float32x2,
                },
            ],
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct MeshData {
    pub vertices: Vec<MeshVertex>,
    pub indices: Vec<u32>,
}

impl MeshData {
    fn push_quad(&mut self, corners: [[f32; 3]; 4], normal: [f32; 3]) {
        let base = self.vertices.len() as u32;
        let uvs = [[0.0, 1.0], [1.0, 1.0], [1.0, 0.0], [0.0, 0.0]];
        for (position, uv) in corners.into_iter().zip(uvs) {
            self.vertices.push(MeshVertex {
                position,
                normal,
                uv,
            });
        }
        self.indices
            .extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }

    /// Flips winding and normals so the mesh is seen from inside.
    fn inverted(mut self) -> Self {
        for vertex in &mut self.vertices {
            vertex.normal = vertex.normal.map(|n| -n);
        }
        for triangle in self.indices.chunks_exact_mut(3) {
            triangle.swap(1, 2);
        }
        self
    }
}

/// Unit square in the XY plane facing +Z. The top edge samples `v = 0`.
pub fn plane_mesh() -> MeshData {
    let mut mesh = MeshData::default();
    mesh.push_quad(
        [
            [-0.5, -0.5, 0.0],
            [0.5, -0.5, 0.0],
            [0.5, 0.5, 0.0],
            [-0.5, 0.5, 0.0],
        ],
        [0.0, 0.0, 1.0],
    );
    mesh
}

/// Unit cube centered on the origin, counter-clockwise from outside.
pub fn cube_mesh() -> MeshData {
    let mut mesh = MeshData::default();
    // +X
    mesh.push_quad(
        [
            [0.5, -0.5, 0.5],
            [0.5, -0.5, -0.5],
            [0.5, 0.5, -0.5],
            [0.5, 0.5, 0.5],
        ],
        [1.0, 0.0, 0.0],
    );
    // -X
    mesh.push_quad(
        [
            [-0.5, -0.5, -0.5],
            [-0.5, -0.5, 0.5],
            [-0.5, 0.5, 0.5],
            [-0.5, 0.5, -0.5],
        ],
        [-1.0, 0.0, 0.0],
    );
    // +Y
    mesh.push_quad(
        [
            [-0.5, 0.5, 0.5],
            [0.5, 0.5, 0.5],
            [0.5, 0.5, -0.5],
            [-0.5, 0.5, -0.5],
        ],
        [0.0, 1.0, 0.0],
    );
    // -Y
    mesh.push_quad(
        [
            [-0.5, -0.5, -0.5],
            [0.5, -0.5, -0.5],
            [0.5, -0.5, 0.5],
            [-0.5, -0.5, 0.5],
        ],
        [0.0, -1.0, 0.0],
    );
    // +Z
    mesh.push_quad(
        [
            [-0.5, -0.5, 0.5],
            [0.5, -0.5, 0.5],
            [0.5, 0.5, 0.5],
            [-0.5, 0.5, 0.5],
        ],
        [0.0, 0.0, 1.0],
    );
    // -Z
    mesh.push_quad(
        [
            [0.5, -0.5, -0.5],
            [-0.5, -0.5, -0.5],
            [-0.5, 0.5, -0.5],
            [0.5, 0.5, -0.5],
        ],
        [0.0, 0.0, -1.0],
    );
    mesh
}

/// Unit cube visible only from the inside.
pub fn room_mesh() -> MeshData {
    cube_mesh().inverted()
}

/// Unit-radius UV sphere.
pub fn sphere_mesh(width_segments: u32, height_segments: u32) -> MeshData {
    let width_segments = width_segments.max(3);
    let height_segments = height_segments.max(2);
    let mut mesh = MeshData::default();

    for y in 0..=height_segments {
        let v = y as f32 / height_segments as f32;
        let theta = v * PI;
        for x in 0..=width_segments {
            let u = x as f32 / width_segments as f32;
            let phi = u * TAU;
            let normal = [
                -phi.cos() * theta.sin(),
                theta.cos(),
                phi.sin() * theta.sin(),
            ];
            mesh.vertices.push(MeshVertex {
                position: normal,
                normal,
                uv: [u, v],
            });
        }
    }

    let stride = width_segments + 1;
    for y in 0..height_segments {
        for x in 0..width_segments {
            let a = y * stride + x + 1;
            let b = y * stride + x;
            let c = (y + 1) * stride + x;
            let d = (y + 1) * stride + x + 1;
            if y != 0 {
                mesh.indices.extend_from_slice(&[a, b, d]);
            }
            if y != height_segments - 1 {
                mesh.indices.extend_from_slice(&[b, c, d]);
            }
        }
    }
    mesh
}

/// Unit-radius cylinder of height 1 along Y, with caps.
pub fn cylinder_mesh(radial_segments: u32) -> MeshData {
    let radial_segments = radial_segments.max(3);
    let mut mesh = MeshData::default();

    let stride = radial_segments + 1;
    for (row, y) in [0.5_f32, -0.5].into_iter().enumerate() {
        for x in 0..=radial_segments {
            let u = x as f32 / radial_segments as f32;
            let angle = u * TAU;
            let (sin, cos) = angle.sin_cos();
            mesh.vertices.push(MeshVertex {
                position: [sin, y, cos],
                normal: [sin, 0.0, cos],
                uv: [u, row as f32],
            });
        }
    }
    for x in 0..radial_segments {
        let top = x;
        let bottom = stride + x;
        mesh.indices
            .extend_from_slice(&[top, bottom, top + 1, bottom, bottom + 1, top + 1]);
    }

    for (y, sign) in [(0.5_f32, 1.0_f32), (-0.5, -1.0)] {
        let center = mesh.vertices.len() as u32;
        mesh.vertices.push(MeshVertex {
            position: [0.0, y, 0.0],
            normal: [0.0, sign, 0.0],
            uv: [0.5, 0.5],
        });
        for x in 0..=radial_segments {
            let angle = x as f32 / radial_segments as f32 * TAU;
            let (sin, cos) = angle.sin_cos();
            mesh.vertices.push(MeshVertex {
                position: [sin, y, cos],
                normal: [0.0, sign, 0.0],
                uv: [sin * 0.5 + 0.5, cos * 0.5 * sign + 0.5],
            });
        }
        for x in 0..radial_segments {
            let a = center + 1 + x;
            let b = a + 1;
            if sign > 0.0 {
                mesh.indices.extend_from_slice(&[center, a, b]);
            } else {
                mesh.indices.extend_from_slice(&[center, b, a]);
            }
        }
    }
    mesh
}
