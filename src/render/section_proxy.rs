//! Render-side resources of one section

use crate::backend::{BackendResult, BufferDescriptor, BufferHandle, BufferUsage, GraphicsBackend};
use crate::render::resource::{init_or_update_resource, RenderResource};
use crate::render::vertex_factory::{DeformVertexFactory, ProxyId, VertexFactoryData};
use crate::resources::{GeometryRef, MaterialRef};

/// CPU copy of a section's indices and the GPU buffer holding them.
#[derive(Debug)]
pub struct IndexBuffer {
    indices: Vec<u32>,
    label: String,
    buffer: Option<BufferHandle>,
}

impl IndexBuffer {
    pub fn new(indices: Vec<u32>, label: impl Into<String>) -> Self {
        Self {
            indices,
            label: label.into(),
            buffer: None,
        }
    }

    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    pub fn num_indices(&self) -> usize {
        self.indices.len()
    }

    pub fn buffer(&self) -> Option<BufferHandle> {
        self.buffer
    }

    pub fn allocated_size(&self) -> usize {
        self.indices.capacity() * std::mem::size_of::<u32>()
    }
}

impl RenderResource for IndexBuffer {
    fn is_initialized(&self) -> bool {
        self.buffer.is_some()
    }

    fn init_resource(&mut self, backend: &mut dyn GraphicsBackend) -> BackendResult<()> {
        let bytes: &[u8] = bytemuck::cast_slice(&self.indices);
        let desc = BufferDescriptor::new(
            bytes.len() as u64,
            BufferUsage::INDEX | BufferUsage::COPY_DST,
        )
        .with_label(self.label.clone());
        self.buffer = Some(backend.create_buffer_init(&desc, bytes)?);
        Ok(())
    }

    fn update_resource(&mut self, backend: &mut dyn GraphicsBackend) -> BackendResult<()> {
        if let Some(buffer) = self.buffer {
            backend.write_buffer(buffer, 0, bytemuck::cast_slice(&self.indices));
        }
        Ok(())
    }

    fn release_resource(&mut self, backend: &mut dyn GraphicsBackend) {
        if let Some(buffer) = self.buffer.take() {
            backend.destroy_buffer(buffer);
        }
    }
}

/// Everything needed to draw one occupied section.
#[derive(Debug)]
pub struct ProxySection {
    pub geometry: GeometryRef,
    pub index_buffer: IndexBuffer,
    pub vertex_factory: DeformVertexFactory,
    pub material: MaterialRef,
    pub visible: bool,
    pub max_vertex_index: u32,
}

impl ProxySection {
    /// Build and initialize the section's resources.
    ///
    /// `streams` are the geometry's vertex streams on `backend`, owned by the
    /// proxy's stream cache. On failure everything the section created is
    /// released again.
    pub fn new(
        owner: ProxyId,
        slot: usize,
        geometry: GeometryRef,
        streams: VertexFactoryData,
        material: MaterialRef,
        visible: bool,
        backend: &mut dyn GraphicsBackend,
    ) -> BackendResult<Self> {
        let label = format!("DeformMesh_Section{}_{}", slot, geometry.name());
        let mut section = Self {
            index_buffer: IndexBuffer::new(geometry.indices().to_vec(), label),
            vertex_factory: DeformVertexFactory::new(owner, slot as u32),
            max_vertex_index: geometry.num_vertices().saturating_sub(1) as u32,
            geometry,
            material,
            visible,
        };

        section.vertex_factory.set_data(streams);
        if let Err(err) = section.init_resources(backend) {
            section.release(backend);
            return Err(err);
        }
        Ok(section)
    }

    fn init_resources(&mut self, backend: &mut dyn GraphicsBackend) -> BackendResult<()> {
        init_or_update_resource(&mut self.vertex_factory, backend)?;
        init_or_update_resource(&mut self.index_buffer, backend)?;
        Ok(())
    }

    pub fn num_primitives(&self) -> u32 {
        (self.index_buffer.num_indices() / 3) as u32
    }

    pub fn allocated_size(&self) -> usize {
        self.index_buffer.allocated_size() + self.vertex_factory.allocated_size()
    }

    /// Release the section's own resources. The vertex streams belong to the proxy.
    pub fn release(&mut self, backend: &mut dyn GraphicsBackend) {
        self.vertex_factory.release_resource(backend);
        self.index_buffer.release_resource(backend);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BackendError, HeadlessBackend};
    use crate::render::geometry_streams::GeometryStreamCache;
    use crate::render::vertex_factory::MAX_STATIC_TEXCOORDS;
    use crate::resources::{Material, StaticMesh};

    const MAX_TEXCOORD_ATTRIBUTES: usize = MAX_STATIC_TEXCOORDS / 2;

    fn build(
        slot: usize,
        geometry: GeometryRef,
        cache: &mut GeometryStreamCache,
        backend: &mut HeadlessBackend,
    ) -> BackendResult<ProxySection> {
        let streams = cache.acquire(&geometry, backend)?;
        ProxySection::new(
            ProxyId::next(),
            slot,
            geometry,
            streams,
            Material::default_surface(),
            true,
            backend,
        )
    }

    #[test]
    fn section_copies_indices_and_bounds() {
        let mut backend = HeadlessBackend::new();
        let mut cache = GeometryStreamCache::new();
        let cube = StaticMesh::cube().into_ref();
        let mut section = build(2, cube.clone(), &mut cache, &mut backend).unwrap();

        assert_eq!(section.index_buffer.indices(), cube.indices());
        assert_eq!(section.num_primitives(), 12);
        assert_eq!(section.max_vertex_index, 23);
        assert_eq!(section.vertex_factory.transform_index(), 2);
        // positions + texcoords + indices
        assert_eq!(backend.live_buffers(), 3);

        let index_bytes = backend
            .buffer_contents(section.index_buffer.buffer().unwrap())
            .unwrap();
        assert_eq!(index_bytes.len(), 36 * 4);

        section.release(&mut backend);
        assert_eq!(backend.live_buffers(), 2);
        cache.release(&mut backend);
        assert_eq!(backend.live_buffers(), 0);
    }

    #[test]
    fn failed_section_releases_partial_resources() {
        let mut backend = HeadlessBackend::new();
        let mut cache = GeometryStreamCache::new();
        let empty = StaticMesh::new("empty", Vec::new(), vec![0, 1, 2]).into_ref();
        let result = build(0, empty, &mut cache, &mut backend);

        assert!(matches!(result, Err(BackendError::InvalidVertexData(_))));
        assert_eq!(backend.live_buffers(), 0);
    }

    #[test]
    fn position_only_geometry_fits_main_declaration() {
        use glam::Vec3;

        let mut backend = HeadlessBackend::new();
        let mut cache = GeometryStreamCache::new();
        let triangle =
            StaticMesh::new("triangle", vec![Vec3::ZERO, Vec3::X, Vec3::Y], vec![0, 1, 2])
                .into_ref();
        let mut section = build(0, triangle, &mut cache, &mut backend).unwrap();

        let declaration = section.vertex_factory.declaration();
        assert_eq!(declaration.len(), 1 + MAX_TEXCOORD_ATTRIBUTES);
        assert!(declaration[1..].iter().all(|e| e.stream.stride == 0));
        // positions + zero texcoords + indices
        assert_eq!(backend.live_buffers(), 3);

        section.release(&mut backend);
        cache.release(&mut backend);
        assert_eq!(backend.live_buffers(), 0);
    }
}
