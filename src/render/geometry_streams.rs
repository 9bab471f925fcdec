//! Vertex streams uploaded from geometry assets
//!
//! Buffer handles only mean something on the backend that created them, so a
//! geometry asset never holds GPU state. Each scene proxy uploads the streams
//! of the assets it draws into its own [`GeometryStreamCache`]: sections of one
//! proxy that share an asset share one upload, and the proxy destroys them all
//! when it is released.

use std::sync::Arc;

use crate::backend::{BackendResult, GraphicsBackend};
use crate::render::vertex_factory::{VertexBuffer, VertexFactoryData};
use crate::resources::GeometryRef;

/// Vertex buffers created from one geometry asset on one backend.
#[derive(Debug, Default)]
pub struct VertexStreams {
    pub data: VertexFactoryData,
    /// Buffers owned by these streams, destroyed by [`VertexStreams::release`]
    pub buffers: Vec<VertexBuffer>,
}

impl VertexStreams {
    pub fn size(&self) -> u64 {
        self.buffers.iter().map(|vb| vb.size).sum()
    }

    pub fn release(&mut self, backend: &mut dyn GraphicsBackend) {
        for vb in self.buffers.drain(..) {
            backend.destroy_buffer(vb.buffer);
        }
        self.data = VertexFactoryData::default();
    }
}

/// Streams of every geometry asset a proxy generation draws.
#[derive(Debug, Default)]
pub struct GeometryStreamCache {
    entries: Vec<(GeometryRef, VertexStreams)>,
}

impl GeometryStreamCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Streams of `geometry`, uploading them on first use.
    pub fn acquire(
        &mut self,
        geometry: &GeometryRef,
        backend: &mut dyn GraphicsBackend,
    ) -> BackendResult<VertexFactoryData> {
        if let Some((_, streams)) = self
            .entries
            .iter()
            .find(|(cached, _)| Arc::ptr_eq(cached, geometry))
        {
            return Ok(streams.data.clone());
        }

        let streams = geometry.create_vertex_streams(backend)?;
        log::trace!(
            "GeometryStreamCache: uploaded '{}' ({} bytes)",
            geometry.name(),
            streams.size()
        );
        let data = streams.data.clone();
        self.entries.push((geometry.clone(), streams));
        Ok(data)
    }

    /// Number of distinct assets uploaded
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn allocated_size(&self) -> usize {
        self.entries.capacity() * std::mem::size_of::<(GeometryRef, VertexStreams)>()
    }

    pub fn release(&mut self, backend: &mut dyn GraphicsBackend) {
        for (_, mut streams) in self.entries.drain(..) {
            streams.release(backend);
        }
    }
}
