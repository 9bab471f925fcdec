//! Geometry assets
//!
//! A section never owns its geometry. It holds a [`GeometryRef`] to an asset
//! that may be shared by any number of sections, components and render
//! contexts. The asset itself is CPU data only: each render mirror uploads
//! the streams it needs on its own backend and destroys them on release.

use std::fmt;
use std::sync::Arc;

use glam::{Vec2, Vec3};

use crate::backend::{BackendResult, BufferDescriptor, BufferUsage, GraphicsBackend, VertexFormat};
use crate::render::geometry_streams::VertexStreams;
use crate::render::vertex_factory::{VertexBuffer, VertexStreamComponent};
use crate::resources::{Aabb, MaterialRef};

/// Shared geometry handle
pub type GeometryRef = Arc<dyn GeometryAsset>;

/// Static geometry consumed by deform mesh sections.
pub trait GeometryAsset: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;

    /// Local-space bounds of the undeformed geometry.
    fn bounding_box(&self) -> Aabb;

    fn default_material(&self) -> Option<MaterialRef>;

    /// Triangle list indices.
    fn indices(&self) -> &[u32];

    fn num_vertices(&self) -> usize;

    /// Upload the position and texcoord streams to `backend`.
    ///
    /// The caller owns the returned buffers and releases them on the same
    /// backend. On error nothing is left allocated.
    fn create_vertex_streams(&self, backend: &mut dyn GraphicsBackend)
        -> BackendResult<VertexStreams>;
}

/// Indexed triangle mesh with any number of texcoord channels.
#[derive(Debug)]
pub struct StaticMesh {
    name: String,
    positions: Vec<Vec3>,
    texcoords: Vec<Vec<Vec2>>,
    indices: Vec<u32>,
    material: Option<MaterialRef>,
    bounding_box: Aabb,
}

impl StaticMesh {
    pub fn new(name: &str, positions: Vec<Vec3>, indices: Vec<u32>) -> Self {
        let bounding_box = Aabb::from_points(positions.iter().copied());
        Self {
            name: name.to_string(),
            positions,
            texcoords: Vec::new(),
            indices,
            material: None,
            bounding_box,
        }
    }

    /// Append a texcoord channel. It is padded or truncated to the vertex count.
    pub fn with_texcoords(mut self, mut channel: Vec<Vec2>) -> Self {
        if channel.len() != self.positions.len() {
            log::warn!(
                "StaticMesh '{}': texcoord channel {} has {} entries for {} vertices",
                self.name,
                self.texcoords.len(),
                channel.len(),
                self.positions.len()
            );
            channel.resize(self.positions.len(), Vec2::ZERO);
        }
        self.texcoords.push(channel);
        self
    }

    pub fn with_material(mut self, material: MaterialRef) -> Self {
        self.material = Some(material);
        self
    }

    pub fn into_ref(self) -> GeometryRef {
        Arc::new(self)
    }

    pub fn positions(&self) -> &[Vec3] {
        &self.positions
    }

    pub fn num_texcoords(&self) -> usize {
        self.texcoords.len()
    }

    /// Calculate triangle count
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Texcoords interleaved per vertex: all channels of vertex 0, then vertex 1, ...
    fn interleaved_texcoords(&self) -> Vec<Vec2> {
        let mut out = Vec::with_capacity(self.positions.len() * self.texcoords.len());
        for vertex in 0..self.positions.len() {
            out.extend(self.texcoords.iter().map(|channel| channel[vertex]));
        }
        out
    }

    fn upload(
        &self,
        backend: &mut dyn GraphicsBackend,
        bytes: &[u8],
        stream: &str,
    ) -> BackendResult<VertexBuffer> {
        let desc = BufferDescriptor::new(bytes.len() as u64, BufferUsage::VERTEX)
            .with_label(format!("{}_{}", self.name, stream));
        let buffer = backend.create_buffer_init(&desc, bytes)?;
        Ok(VertexBuffer {
            buffer,
            size: desc.size,
        })
    }

    /// Create a unit cube centered at origin
    pub fn cube() -> Self {
        // (position, uv) per corner, four per face
        let corners = [
            // Front face
            (Vec3::new(-0.5, -0.5, 0.5), Vec2::new(0.0, 1.0)),
            (Vec3::new(0.5, -0.5, 0.5), Vec2::new(1.0, 1.0)),
            (Vec3::new(0.5, 0.5, 0.5), Vec2::new(1.0, 0.0)),
            (Vec3::new(-0.5, 0.5, 0.5), Vec2::new(0.0, 0.0)),
            // Back face
            (Vec3::new(0.5, -0.5, -0.5), Vec2::new(0.0, 1.0)),
            (Vec3::new(-0.5, -0.5, -0.5), Vec2::new(1.0, 1.0)),
            (Vec3::new(-0.5, 0.5, -0.5), Vec2::new(1.0, 0.0)),
            (Vec3::new(0.5, 0.5, -0.5), Vec2::new(0.0, 0.0)),
            // Right face
            (Vec3::new(0.5, -0.5, 0.5), Vec2::new(0.0, 1.0)),
            (Vec3::new(0.5, -0.5, -0.5), Vec2::new(1.0, 1.0)),
            (Vec3::new(0.5, 0.5, -0.5), Vec2::new(1.0, 0.0)),
            (Vec3::new(0.5, 0.5, 0.5), Vec2::new(0.0, 0.0)),
            // Left face
            (Vec3::new(-0.5, -0.5, -0.5), Vec2::new(0.0, 1.0)),
            (Vec3::new(-0.5, -0.5, 0.5), Vec2::new(1.0, 1.0)),
            (Vec3::new(-0.5, 0.5, 0.5), Vec2::new(1.0, 0.0)),
            (Vec3::new(-0.5, 0.5, -0.5), Vec2::new(0.0, 0.0)),
            // Top face
            (Vec3::new(-0.5, 0.5, 0.5), Vec2::new(0.0, 1.0)),
            (Vec3::new(0.5, 0.5, 0.5), Vec2::new(1.0, 1.0)),
            (Vec3::new(0.5, 0.5, -0.5), Vec2::new(1.0, 0.0)),
            (Vec3::new(-0.5, 0.5, -0.5), Vec2::new(0.0, 0.0)),
            // Bottom face
            (Vec3::new(-0.5, -0.5, -0.5), Vec2::new(0.0, 1.0)),
            (Vec3::new(0.5, -0.5, -0.5), Vec2::new(1.0, 1.0)),
            (Vec3::new(0.5, -0.5, 0.5), Vec2::new(1.0, 0.0)),
            (Vec3::new(-0.5, -0.5, 0.5), Vec2::new(0.0, 0.0)),
        ];

        let (positions, uvs): (Vec<Vec3>, Vec<Vec2>) = corners.into_iter().unzip();

        // Two triangles per face
        let mut indices = Vec::with_capacity(36);
        for face in 0..6u32 {
            let base = face * 4;
            indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
        }

        Self::new("cube", positions, indices).with_texcoords(uvs)
    }

    /// Create a plane on the XZ axis
    pub fn plane(width: f32, depth: f32, subdivisions: u32) -> Self {
        let subdivisions = subdivisions.max(1);
        let half_width = width / 2.0;
        let half_depth = depth / 2.0;
        let step_x = width / subdivisions as f32;
        let step_z = depth / subdivisions as f32;

        let mut positions = Vec::new();
        let mut uvs = Vec::new();
        for z in 0..=subdivisions {
            for x in 0..=subdivisions {
                positions.push(Vec3::new(
                    -half_width + x as f32 * step_x,
                    0.0,
                    -half_depth + z as f32 * step_z,
                ));
                uvs.push(Vec2::new(
                    x as f32 / subdivisions as f32,
                    z as f32 / subdivisions as f32,
                ));
            }
        }

        let mut indices = Vec::new();
        for z in 0..subdivisions {
            for x in 0..subdivisions {
                let current = z * (subdivisions + 1) + x;
                let next = current + subdivisions + 1;
                indices.extend_from_slice(&[
                    current,
                    next,
                    current + 1,
                    current + 1,
                    next,
                    next + 1,
                ]);
            }
        }

        Self::new("plane", positions, indices).with_texcoords(uvs)
    }
}

impl GeometryAsset for StaticMesh {
    fn name(&self) -> &str {
        &self.name
    }

    fn bounding_box(&self) -> Aabb {
        self.bounding_box
    }

    fn default_material(&self) -> Option<MaterialRef> {
        self.material.clone()
    }

    fn indices(&self) -> &[u32] {
        &self.indices
    }

    fn num_vertices(&self) -> usize {
        self.positions.len()
    }

    fn create_vertex_streams(
        &self,
        backend: &mut dyn GraphicsBackend,
    ) -> BackendResult<VertexStreams> {
        let mut streams = VertexStreams::default();

        if !self.positions.is_empty() {
            let vb = self.upload(backend, bytemuck::cast_slice(&self.positions), "Positions")?;
            streams.data.position = Some(VertexStreamComponent {
                buffer: vb.buffer,
                offset: 0,
                stride: VertexFormat::Float32x3.size() as u32,
                format: VertexFormat::Float32x3,
            });
            streams.buffers.push(vb);
        }

        if !self.texcoords.is_empty() {
            let interleaved = self.interleaved_texcoords();
            let vb = match self.upload(backend, bytemuck::cast_slice(&interleaved), "TexCoords") {
                Ok(vb) => vb,
                Err(err) => {
                    streams.release(backend);
                    return Err(err);
                }
            };

            let uv_size = VertexFormat::Float32x2.size();
            let stride = (uv_size as usize * self.texcoords.len()) as u32;
            streams.data.texcoords = (0..self.texcoords.len())
                .map(|channel| VertexStreamComponent {
                    buffer: vb.buffer,
                    offset: uv_size * channel as u64,
                    stride,
                    format: VertexFormat::Float32x2,
                })
                .collect();
            streams.buffers.push(vb);
        }

        Ok(streams)
    }
}
