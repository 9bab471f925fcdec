//! Deform mesh vertex factory
//!
//! Binds a section's position/texcoord streams and carries the slot of the
//! section in the transform table. Geometry without texcoords is bound to a
//! zero stream with stride 0, so every section fits the main vertex stage. The table itself is not held here:
//! the factory keeps a non-owning [`ProxyId`] of the scene proxy that built
//! it and looks the table view up on that proxy when shader bindings are
//! gathered. A flush that lands after draw assembly is therefore still seen
//! by the draw.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::backend::{
    BackendError, BackendResult, BufferDescriptor, BufferHandle, BufferUsage, BufferViewHandle,
    GraphicsBackend, VertexFormat,
};
use crate::render::resource::RenderResource;
use crate::render::scene_proxy::DeformMeshSceneProxy;
use crate::render::shader::{BASE_TEXCOORD_ATTRIBUTE, POSITION_ATTRIBUTE};

/// Maximum texcoord channels a static mesh may carry.
///
/// The declaration exposes half of them as vertex attributes.
pub const MAX_STATIC_TEXCOORDS: usize = 8;

/// A GPU vertex buffer and its size in bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexBuffer {
    pub buffer: BufferHandle,
    pub size: u64,
}

/// One attribute stream inside a vertex buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexStreamComponent {
    pub buffer: BufferHandle,
    pub offset: u64,
    pub stride: u32,
    pub format: VertexFormat,
}

/// Streams a geometry asset exposes for binding.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VertexFactoryData {
    pub position: Option<VertexStreamComponent>,
    pub texcoords: Vec<VertexStreamComponent>,
}

/// A stream bound to a shader attribute location
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexElement {
    pub attribute: u32,
    pub stream: VertexStreamComponent,
}

/// Identity of one scene proxy generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProxyId(u64);

impl ProxyId {
    pub(crate) fn next() -> Self {
        static NEXT_ID: AtomicU64 = AtomicU64::new(1);
        Self(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Per-draw parameters resolved at bind time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexFactoryShaderBindings {
    /// Slot in the transform table; issued as the draw's first instance
    pub transform_index: u32,
    pub transforms_view: Option<BufferViewHandle>,
}

#[derive(Debug)]
pub struct DeformVertexFactory {
    data: VertexFactoryData,
    declaration: Vec<VertexElement>,
    position_declaration: Vec<VertexElement>,
    transform_index: u32,
    owner: ProxyId,
    null_texcoords: Option<BufferHandle>,
    initialized: bool,
}

impl DeformVertexFactory {
    pub fn new(owner: ProxyId, transform_index: u32) -> Self {
        Self {
            data: VertexFactoryData::default(),
            declaration: Vec::new(),
            position_declaration: Vec::new(),
            transform_index,
            owner,
            null_texcoords: None,
            initialized: false,
        }
    }

    pub fn set_data(&mut self, data: VertexFactoryData) {
        self.data = data;
    }

    pub fn data(&self) -> &VertexFactoryData {
        &self.data
    }

    /// Position plus texcoord attributes
    pub fn declaration(&self) -> &[VertexElement] {
        &self.declaration
    }

    /// Position only, for depth and shadow passes
    pub fn position_declaration(&self) -> &[VertexElement] {
        &self.position_declaration
    }

    pub fn transform_index(&self) -> u32 {
        self.transform_index
    }

    pub fn owner(&self) -> ProxyId {
        self.owner
    }

    pub fn allocated_size(&self) -> usize {
        (self.declaration.capacity() + self.position_declaration.capacity())
            * std::mem::size_of::<VertexElement>()
            + self.data.texcoords.capacity() * std::mem::size_of::<VertexStreamComponent>()
    }

    /// Gather the shader parameters for a draw of this factory.
    ///
    /// # Panics
    ///
    /// If `proxy` is not the proxy that created this factory.
    pub fn element_shader_bindings(
        &self,
        proxy: &DeformMeshSceneProxy,
    ) -> VertexFactoryShaderBindings {
        assert_eq!(
            proxy.id(),
            self.owner,
            "vertex factory bound through a proxy that does not own it"
        );
        VertexFactoryShaderBindings {
            transform_index: self.transform_index,
            transforms_view: proxy.transforms_view(),
        }
    }

    fn position_stream(&self) -> BackendResult<VertexStreamComponent> {
        self.data.position.ok_or_else(|| {
            BackendError::InvalidVertexData("deform vertex factory has no position stream".into())
        })
    }

    /// Zero stream read by every vertex when the geometry has no texcoords.
    fn null_texcoord_stream(
        &mut self,
        backend: &mut dyn GraphicsBackend,
    ) -> BackendResult<VertexStreamComponent> {
        let buffer = match self.null_texcoords {
            Some(buffer) => buffer,
            None => {
                let desc = BufferDescriptor::new(VertexFormat::Float32x2.size(), BufferUsage::VERTEX)
                    .with_label("DeformMesh_NullTexCoord");
                let buffer = backend.create_buffer_init(&desc, &[0; 8])?;
                self.null_texcoords = Some(buffer);
                buffer
            }
        };
        Ok(VertexStreamComponent {
            buffer,
            offset: 0,
            stride: 0,
            format: VertexFormat::Float32x2,
        })
    }

    fn build_declarations(&mut self, backend: &mut dyn GraphicsBackend) -> BackendResult<()> {
        let position = self.position_stream()?;

        let position_element = VertexElement {
            attribute: POSITION_ATTRIBUTE,
            stream: position,
        };
        self.position_declaration = vec![position_element];

        let max_attributes = MAX_STATIC_TEXCOORDS / 2;
        if self.data.texcoords.len() > max_attributes {
            log::warn!(
                "DeformVertexFactory: {} texcoord channels, only {} are bound",
                self.data.texcoords.len(),
                max_attributes
            );
        }

        let mut bound: Vec<VertexStreamComponent> =
            self.data.texcoords.iter().take(max_attributes).copied().collect();
        if bound.is_empty() {
            bound.push(self.null_texcoord_stream(backend)?);
        } else if let Some(buffer) = self.null_texcoords.take() {
            backend.destroy_buffer(buffer);
        }

        let mut declaration = vec![position_element];
        let last = bound[bound.len() - 1];
        for channel in 0..max_attributes {
            declaration.push(VertexElement {
                attribute: BASE_TEXCOORD_ATTRIBUTE + channel as u32,
                stream: bound.get(channel).copied().unwrap_or(last),
            });
        }
        self.declaration = declaration;
        Ok(())
    }
}

impl RenderResource for DeformVertexFactory {
    fn is_initialized(&self) -> bool {
        self.initialized
    }

    fn init_resource(&mut self, backend: &mut dyn GraphicsBackend) -> BackendResult<()> {
        self.build_declarations(backend)?;
        self.initialized = true;
        Ok(())
    }

    fn update_resource(&mut self, backend: &mut dyn GraphicsBackend) -> BackendResult<()> {
        self.build_declarations(backend)
    }

    fn release_resource(&mut self, backend: &mut dyn GraphicsBackend) {
        if let Some(buffer) = self.null_texcoords.take() {
            backend.destroy_buffer(buffer);
        }
        self.declaration.clear();
        self.position_declaration.clear();
        self.initialized = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::HeadlessBackend;
    use crate::render::resource::init_or_update_resource;

    fn stream(buffer: u64, offset: u64) -> VertexStreamComponent {
        VertexStreamComponent {
            buffer: BufferHandle(buffer),
            offset,
            stride: 8,
            format: VertexFormat::Float32x2,
        }
    }

    fn position() -> VertexStreamComponent {
        VertexStreamComponent {
            buffer: BufferHandle(0),
            offset: 0,
            stride: 12,
            format: VertexFormat::Float32x3,
        }
    }

    #[test]
    fn missing_position_stream_is_an_error() {
        let mut backend = HeadlessBackend::new();
        let mut factory = DeformVertexFactory::new(ProxyId::next(), 0);
        let result = factory.init_resource(&mut backend);
        assert!(matches!(result, Err(BackendError::InvalidVertexData(_))));
        assert!(!factory.is_initialized());
        assert_eq!(backend.live_buffers(), 0);
    }

    #[test]
    fn texcoords_are_padded_with_last_channel() {
        let mut backend = HeadlessBackend::new();
        let mut factory = DeformVertexFactory::new(ProxyId::next(), 3);
        factory.set_data(VertexFactoryData {
            position: Some(position()),
            texcoords: vec![stream(1, 0), stream(1, 8)],
        });
        init_or_update_resource(&mut factory, &mut backend).unwrap();

        let attributes: Vec<u32> = factory.declaration().iter().map(|e| e.attribute).collect();
        assert_eq!(attributes, vec![0, 4, 5, 6, 7]);
        assert_eq!(factory.declaration()[3].stream, stream(1, 8));
        assert_eq!(factory.declaration()[4].stream, stream(1, 8));
        assert_eq!(factory.position_declaration().len(), 1);
        assert_eq!(factory.transform_index(), 3);
    }

    #[test]
    fn extra_texcoords_are_dropped() {
        let mut backend = HeadlessBackend::new();
        let mut factory = DeformVertexFactory::new(ProxyId::next(), 0);
        factory.set_data(VertexFactoryData {
            position: Some(position()),
            texcoords: (0..6).map(|i| stream(1, i * 8)).collect(),
        });
        factory.init_resource(&mut backend).unwrap();
        assert_eq!(factory.declaration().len(), 1 + MAX_STATIC_TEXCOORDS / 2);
    }

    #[test]
    fn position_only_geometry_binds_zero_texcoords() {
        let mut backend = HeadlessBackend::new();
        let mut factory = DeformVertexFactory::new(ProxyId::next(), 0);
        factory.set_data(VertexFactoryData {
            position: Some(position()),
            texcoords: Vec::new(),
        });
        factory.init_resource(&mut backend).unwrap();

        let attributes: Vec<u32> = factory.declaration().iter().map(|e| e.attribute).collect();
        assert_eq!(attributes, vec![0, 4, 5, 6, 7]);
        let null = factory.declaration()[1].stream;
        assert_eq!(null.stride, 0);
        assert!(factory.declaration()[1..].iter().all(|e| e.stream == null));
        assert_eq!(backend.buffer_contents(null.buffer), Some(vec![0; 8]));
        assert_eq!(backend.live_buffers(), 1);

        // Rebinding reuses the zero stream
        init_or_update_resource(&mut factory, &mut backend).unwrap();
        assert_eq!(backend.live_buffers(), 1);

        factory.release_resource(&mut backend);
        assert!(factory.declaration().is_empty());
        assert!(!factory.is_initialized());
        assert_eq!(backend.live_buffers(), 0);
    }

    #[test]
    fn proxy_ids_are_unique() {
        assert_ne!(ProxyId::next(), ProxyId::next());
    }
}
