//! Render-side mirror of a deform mesh component
//!
//! A [`DeformMeshSceneProxy`] is built in one piece from a
//! [`ComponentSnapshot`] and never patched structurally: any change in the
//! section set produces a new proxy. Between rebuilds only three things
//! change, each driven by a drained render command: a slot of the transform
//! table, the visibility of a section, and the GPU copy of the table.
//!
//! Vertex streams of the geometry assets are uploaded once per proxy into
//! its [`GeometryStreamCache`] and destroyed with it.
//!
//! The proxy belongs to the thread that built it. Its mutators assert this.

use std::thread::{self, ThreadId};

use glam::Mat4;

use crate::backend::{BackendResult, BufferViewHandle, GraphicsBackend, PrimitiveTopology};
use crate::render::command::ComponentSnapshot;
use crate::render::draw::{
    DepthPriorityGroup, MeshBatch, MeshElementCollector, PrimitiveUniformProvider,
    PrimitiveViewRelevance, SceneView, ViewFamily,
};
use crate::render::geometry_streams::GeometryStreamCache;
use crate::render::resource::RenderResource;
use crate::render::section_proxy::ProxySection;
use crate::render::transform_table::TransformTable;
use crate::render::vertex_factory::ProxyId;
use crate::resources::{Material, MaterialRelevance, MaterialRenderProxy};
use crate::{DeformMeshConfig, PrimitiveFlags};

/// The slice of a primitive the renderer talks to.
pub trait PrimitiveSceneProxy {
    /// Add this frame's batches for every view set in `visibility_map`.
    fn get_dynamic_mesh_elements<'a>(
        &'a self,
        views: &[SceneView],
        family: &ViewFamily,
        visibility_map: u32,
        uniforms: &dyn PrimitiveUniformProvider,
        collector: &mut MeshElementCollector<'a>,
    );

    fn view_relevance(&self, view: &SceneView) -> PrimitiveViewRelevance;

    fn can_be_occluded(&self) -> bool;

    /// Bytes held by the proxy, including heap allocations.
    fn memory_footprint(&self) -> usize;
}

#[derive(Debug)]
pub struct DeformMeshSceneProxy {
    id: ProxyId,
    render_thread: ThreadId,
    sections: Vec<Option<ProxySection>>,
    streams: GeometryStreamCache,
    transforms: TransformTable,
    material_relevance: MaterialRelevance,
    config: DeformMeshConfig,
    released: bool,
}

impl DeformMeshSceneProxy {
    /// Build the proxy and all of its GPU resources.
    ///
    /// Either every resource is created or none is left behind.
    pub fn new(
        snapshot: &ComponentSnapshot,
        backend: &mut dyn GraphicsBackend,
    ) -> BackendResult<Self> {
        let id = ProxyId::next();
        let count = snapshot.sections.len();

        let mut sections: Vec<Option<ProxySection>> = Vec::with_capacity(count);
        let mut streams = GeometryStreamCache::new();
        let transforms = snapshot
            .sections
            .iter()
            .map(|section| section.deform_transform)
            .collect();
        let mut table = TransformTable::new(transforms, snapshot.config.transforms_label.clone());

        let built = Self::build_sections(id, snapshot, &mut streams, &mut sections, backend)
            .and_then(|()| table.init_resource(backend));
        if let Err(err) = built {
            for section in sections.iter_mut().flatten() {
                section.release(backend);
            }
            streams.release(backend);
            return Err(err);
        }

        log::debug!(
            "DeformMeshSceneProxy {:?}: built {} sections ({} occupied, {} geometry uploads)",
            id,
            count,
            sections.iter().flatten().count(),
            streams.len()
        );

        Ok(Self {
            id,
            render_thread: thread::current().id(),
            sections,
            streams,
            transforms: table,
            material_relevance: snapshot.material_relevance,
            config: snapshot.config.clone(),
            released: false,
        })
    }

    fn build_sections(
        id: ProxyId,
        snapshot: &ComponentSnapshot,
        streams: &mut GeometryStreamCache,
        sections: &mut Vec<Option<ProxySection>>,
        backend: &mut dyn GraphicsBackend,
    ) -> BackendResult<()> {
        for (slot, section) in snapshot.sections.iter().enumerate() {
            let Some(geometry) = &section.geometry else {
                sections.push(None);
                continue;
            };

            let material = snapshot
                .materials
                .get(slot)
                .cloned()
                .unwrap_or_else(Material::default_surface);
            let data = streams.acquire(geometry, backend)?;
            sections.push(Some(ProxySection::new(
                id,
                slot,
                geometry.clone(),
                data,
                material,
                section.visible,
                backend,
            )?));
        }
        Ok(())
    }

    pub fn id(&self) -> ProxyId {
        self.id
    }

    /// Number of slots, occupied or not
    pub fn num_sections(&self) -> usize {
        self.sections.len()
    }

    /// `None` for an empty or out-of-range slot
    pub fn section(&self, slot: usize) -> Option<&ProxySection> {
        self.sections.get(slot).and_then(Option::as_ref)
    }

    /// Vertex streams uploaded for this generation
    pub fn geometry_streams(&self) -> &GeometryStreamCache {
        &self.streams
    }

    pub fn transform_table(&self) -> &TransformTable {
        &self.transforms
    }

    pub fn transforms_view(&self) -> Option<BufferViewHandle> {
        self.transforms.view()
    }

    pub fn material_relevance(&self) -> MaterialRelevance {
        self.material_relevance
    }

    pub fn primitive_flags(&self) -> &PrimitiveFlags {
        &self.config.primitive
    }

    fn assert_render_thread(&self, operation: &str) {
        assert_eq!(
            thread::current().id(),
            self.render_thread,
            "DeformMeshSceneProxy::{} called off the render thread",
            operation
        );
    }

    /// Write one slot of the CPU table. Empty and out-of-range slots are ignored.
    pub fn set_transform(&mut self, slot: usize, matrix: Mat4) {
        self.assert_render_thread("set_transform");
        if self.section(slot).is_some() {
            self.transforms.set(slot, matrix);
        } else {
            log::trace!("DeformMeshSceneProxy: set_transform on empty slot {}", slot);
        }
    }

    /// Upload the whole table if it changed.
    pub fn flush_transforms(&mut self, backend: &mut dyn GraphicsBackend) {
        self.assert_render_thread("flush_transforms");
        self.transforms.flush(backend);
    }

    pub fn set_visibility(&mut self, slot: usize, visible: bool) {
        self.assert_render_thread("set_visibility");
        match self.sections.get_mut(slot) {
            Some(Some(section)) => section.visible = visible,
            _ => log::trace!("DeformMeshSceneProxy: set_visibility on empty slot {}", slot),
        }
    }

    /// Destroy every GPU resource owned by this generation.
    pub fn release(&mut self, backend: &mut dyn GraphicsBackend) {
        self.assert_render_thread("release");
        for section in self.sections.iter_mut().flatten() {
            section.release(backend);
        }
        self.streams.release(backend);
        self.transforms.release_resource(backend);
        self.released = true;
        log::debug!("DeformMeshSceneProxy {:?}: released", self.id);
    }

    fn allocated_size(&self) -> usize {
        self.sections.capacity() * std::mem::size_of::<Option<ProxySection>>()
            + self
                .sections
                .iter()
                .flatten()
                .map(ProxySection::allocated_size)
                .sum::<usize>()
            + self.streams.allocated_size()
            + self.transforms.allocated_size()
    }
}

impl PrimitiveSceneProxy for DeformMeshSceneProxy {
    fn get_dynamic_mesh_elements<'a>(
        &'a self,
        views: &[SceneView],
        family: &ViewFamily,
        visibility_map: u32,
        uniforms: &dyn PrimitiveUniformProvider,
        collector: &mut MeshElementCollector<'a>,
    ) {
        let wireframe = self.config.allow_debug_viewmodes && family.show_flags.wireframe;
        let wireframe_material = wireframe.then(|| {
            collector.register_one_frame_material(MaterialRenderProxy::Colored {
                parent: family.wireframe_material.clone(),
                color: self.config.wireframe_color,
            })
        });

        let primitive_uniforms = uniforms.primitive_uniforms();
        let reverse_culling = uniforms.local_to_world().determinant() < 0.0;

        for view_index in 0..views.len() {
            let in_view = 1u32
                .checked_shl(view_index as u32)
                .is_some_and(|bit| visibility_map & bit != 0);
            if !in_view {
                continue;
            }

            for (slot, section) in self.sections.iter().enumerate() {
                let Some(section) = section else { continue };
                if !section.visible {
                    continue;
                }

                let material = wireframe_material
                    .clone()
                    .unwrap_or_else(|| MaterialRenderProxy::Material(section.material.clone()));

                collector.add_mesh(
                    view_index,
                    MeshBatch {
                        section_index: slot,
                        proxy: self,
                        index_buffer: &section.index_buffer,
                        vertex_factory: &section.vertex_factory,
                        material,
                        first_index: 0,
                        num_primitives: section.num_primitives(),
                        min_vertex_index: 0,
                        max_vertex_index: section.max_vertex_index,
                        topology: PrimitiveTopology::TriangleList,
                        depth_priority: DepthPriorityGroup::World,
                        reverse_culling,
                        wireframe,
                        can_apply_view_mode_overrides: false,
                        primitive_uniforms,
                    },
                );
            }
        }
    }

    fn view_relevance(&self, view: &SceneView) -> PrimitiveViewRelevance {
        let flags = &self.config.primitive;
        let mut relevance = PrimitiveViewRelevance {
            draw: flags.visible,
            shadow: flags.cast_shadow && view.show_shadows,
            dynamic: true,
            render_in_main_pass: flags.render_in_main_pass,
            uses_lighting_channels: flags.lighting_channel_mask
                != PrimitiveFlags::DEFAULT_LIGHTING_CHANNELS,
            render_custom_depth: flags.render_custom_depth,
            translucent_self_shadow: flags.cast_volumetric_translucent_shadow,
            ..Default::default()
        };
        self.material_relevance
            .set_primitive_view_relevance(&mut relevance);
        relevance.velocity = flags.movable && relevance.opaque && relevance.render_in_main_pass;
        relevance
    }

    fn can_be_occluded(&self) -> bool {
        !self.material_relevance.disable_depth_test
    }

    fn memory_footprint(&self) -> usize {
        std::mem::size_of::<Self>() + self.allocated_size()
    }
}

impl Drop for DeformMeshSceneProxy {
    fn drop(&mut self) {
        if !self.released {
            log::warn!(
                "DeformMeshSceneProxy {:?} dropped without release, GPU resources leak",
                self.id
            );
        }
    }
}
