//! Per-frame draw collection
//!
//! The host hands the scene proxy its views, a view family and a visibility
//! bitmask; the proxy answers with [`MeshBatch`]es in a
//! [`MeshElementCollector`]. Batches borrow the proxy's render resources for
//! the duration of the frame.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec4};

use crate::backend::PrimitiveTopology;
use crate::render::scene_proxy::DeformMeshSceneProxy;
use crate::render::section_proxy::IndexBuffer;
use crate::render::vertex_factory::{DeformVertexFactory, VertexFactoryShaderBindings};
use crate::resources::{BoxSphereBounds, MaterialRef, MaterialRenderProxy};

/// Sort group for depth testing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DepthPriorityGroup {
    #[default]
    World,
    Foreground,
}

/// One view being rendered this frame
#[derive(Debug, Clone, Default)]
pub struct SceneView {
    pub name: String,
    pub show_shadows: bool,
}

/// Debug switches of a view family
#[derive(Debug, Clone, Copy, Default)]
pub struct EngineShowFlags {
    pub wireframe: bool,
}

/// Settings shared by every view of a frame
#[derive(Debug, Clone, Default)]
pub struct ViewFamily {
    pub show_flags: EngineShowFlags,
    /// Parent of the colored wireframe override, if the engine provides one
    pub wireframe_material: Option<MaterialRef>,
}

/// How a primitive participates in a view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PrimitiveViewRelevance {
    pub draw: bool,
    pub shadow: bool,
    pub dynamic: bool,
    pub render_in_main_pass: bool,
    pub uses_lighting_channels: bool,
    pub render_custom_depth: bool,
    pub translucent_self_shadow: bool,
    pub opaque: bool,
    pub masked: bool,
    pub translucent: bool,
    pub velocity: bool,
}

/// Per-object shader data, laid out like `PrimitiveUniforms` in the shader
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct PrimitiveUniforms {
    pub local_to_world: Mat4,
    pub previous_local_to_world: Mat4,
    /// xyz origin, w sphere radius
    pub world_bounds_origin: Vec4,
    pub world_bounds_extent: Vec4,
    pub local_bounds_min: Vec4,
    pub local_bounds_max: Vec4,
}

/// Source of the owning primitive's per-object data.
pub trait PrimitiveUniformProvider {
    fn local_to_world(&self) -> Mat4;

    fn previous_local_to_world(&self) -> Mat4;

    fn bounds(&self) -> BoxSphereBounds;

    fn local_bounds(&self) -> BoxSphereBounds;

    fn primitive_uniforms(&self) -> PrimitiveUniforms {
        let bounds = self.bounds();
        let local = self.local_bounds().to_aabb();
        PrimitiveUniforms {
            local_to_world: self.local_to_world(),
            previous_local_to_world: self.previous_local_to_world(),
            world_bounds_origin: bounds.origin.extend(bounds.sphere_radius),
            world_bounds_extent: bounds.box_extent.extend(0.0),
            local_bounds_min: local.min.extend(0.0),
            local_bounds_max: local.max.extend(0.0),
        }
    }
}

/// A single draw of one section in one view
#[derive(Debug)]
pub struct MeshBatch<'a> {
    pub section_index: usize,
    pub proxy: &'a DeformMeshSceneProxy,
    pub index_buffer: &'a IndexBuffer,
    pub vertex_factory: &'a DeformVertexFactory,
    pub material: MaterialRenderProxy,
    pub first_index: u32,
    pub num_primitives: u32,
    pub min_vertex_index: u32,
    pub max_vertex_index: u32,
    pub topology: PrimitiveTopology,
    pub depth_priority: DepthPriorityGroup,
    pub reverse_culling: bool,
    pub wireframe: bool,
    pub can_apply_view_mode_overrides: bool,
    pub primitive_uniforms: PrimitiveUniforms,
}

impl MeshBatch<'_> {
    /// Resolve the vertex factory's shader parameters against the proxy.
    pub fn shader_bindings(&self) -> VertexFactoryShaderBindings {
        self.vertex_factory.element_shader_bindings(self.proxy)
    }
}

/// Batches gathered for one frame, grouped per view
#[derive(Debug, Default)]
pub struct MeshElementCollector<'a> {
    views: Vec<Vec<MeshBatch<'a>>>,
    one_frame_materials: Vec<MaterialRenderProxy>,
}

impl<'a> MeshElementCollector<'a> {
    pub fn new(num_views: usize) -> Self {
        Self {
            views: (0..num_views).map(|_| Vec::new()).collect(),
            one_frame_materials: Vec::new(),
        }
    }

    pub fn add_mesh(&mut self, view_index: usize, batch: MeshBatch<'a>) {
        match self.views.get_mut(view_index) {
            Some(batches) => batches.push(batch),
            None => log::warn!(
                "MeshElementCollector: batch for unknown view {} dropped",
                view_index
            ),
        }
    }

    /// Keep a material alive for the rest of the frame.
    pub fn register_one_frame_material(
        &mut self,
        material: MaterialRenderProxy,
    ) -> MaterialRenderProxy {
        self.one_frame_materials.push(material.clone());
        material
    }

    pub fn one_frame_materials(&self) -> &[MaterialRenderProxy] {
        &self.one_frame_materials
    }

    pub fn num_views(&self) -> usize {
        self.views.len()
    }

    pub fn batches(&self, view_index: usize) -> &[MeshBatch<'a>] {
        self.views.get(view_index).map_or(&[], Vec::as_slice)
    }

    pub fn num_batches(&self) -> usize {
        self.views.iter().map(Vec::len).sum()
    }
}
