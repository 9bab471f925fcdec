//! Deform Mesh - multi-section deformable meshes over shared static geometry
//!
//! A deform mesh is one primitive made of many sections. Each section points
//! at a shared [`GeometryAsset`](resources::GeometryAsset) and carries its own
//! transform; the vertex stage applies it from a single GPU transform table,
//! so geometry is never duplicated per section.
//!
//! The crate is split along the thread boundary:
//! - [`scene`]: the control-side [`DeformMeshComponent`] that owns the
//!   sections and sends commands
//! - [`render`]: the render-thread [`RenderContext`] that drains those
//!   commands into a [`DeformMeshSceneProxy`](render::DeformMeshSceneProxy)
//!   and assembles draws
//! - [`backend`]: the buffer API the render side needs, with headless and wgpu
//!   implementations
//! - [`resources`]: bounds, materials and geometry assets
//!
//! # Example
//!
//! ```
//! use deform_mesh::backend::HeadlessBackend;
//! use deform_mesh::render::{command_channel, RenderContext, SceneView, ViewFamily};
//! use deform_mesh::resources::StaticMesh;
//! use deform_mesh::DeformMeshComponent;
//! use glam::{Mat4, Vec3};
//!
//! let (tx, rx) = command_channel();
//! let mut context = RenderContext::new(HeadlessBackend::new(), rx);
//!
//! let mut component = DeformMeshComponent::default();
//! component.attach_render_channel(tx);
//! let cube = StaticMesh::cube().into_ref();
//! component.create_section(0, cube.clone(), Mat4::IDENTITY);
//! component.create_section(1, cube, Mat4::from_translation(Vec3::X));
//! component.send_render_updates();
//!
//! let frame = context.render_frame(&[SceneView::default()], &ViewFamily::default(), 1);
//! assert_eq!(frame.num_batches(), 2);
//! ```

pub mod backend;
pub mod render;
pub mod resources;
pub mod scene;

pub use render::RenderContext;
pub use scene::{DeformMeshComponent, DeformMeshSection, Transform};

#[cfg(feature = "wgpu-backend")]
pub use backend::wgpu_backend::WgpuBackend;

use glam::Vec4;

/// How the primitive takes part in rendering
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrimitiveFlags {
    pub visible: bool,
    pub cast_shadow: bool,
    pub render_in_main_pass: bool,
    pub render_custom_depth: bool,
    /// Transform may change after creation; enables velocity output
    pub movable: bool,
    pub lighting_channel_mask: u8,
    pub cast_volumetric_translucent_shadow: bool,
}

impl PrimitiveFlags {
    /// Lighting channel 0 only
    pub const DEFAULT_LIGHTING_CHANNELS: u8 = 0b001;
}

impl Default for PrimitiveFlags {
    fn default() -> Self {
        Self {
            visible: true,
            cast_shadow: true,
            render_in_main_pass: true,
            render_custom_depth: false,
            movable: true,
            lighting_channel_mask: Self::DEFAULT_LIGHTING_CHANNELS,
            cast_volumetric_translucent_shadow: false,
        }
    }
}

/// Configuration for a deform mesh component and its render mirror
#[derive(Debug, Clone, PartialEq)]
pub struct DeformMeshConfig {
    /// Multiplier on world bounds extent and radius
    pub bounds_scale: f32,
    /// Honor debug view modes such as wireframe
    pub allow_debug_viewmodes: bool,
    /// Color of the wireframe override material
    pub wireframe_color: Vec4,
    /// Debug label of the transform table buffer
    pub transforms_label: String,
    pub primitive: PrimitiveFlags,
}

impl Default for DeformMeshConfig {
    fn default() -> Self {
        Self {
            bounds_scale: 1.0,
            allow_debug_viewmodes: true,
            wireframe_color: Vec4::new(0.0, 0.5, 1.0, 1.0),
            transforms_label: "DeformMesh_TransformsSB".to_string(),
            primitive: PrimitiveFlags::default(),
        }
    }
}
