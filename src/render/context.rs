//! Render context
//!
//! Owns the backend, the receiving end of the command queue and the current
//! scene proxy of one deform mesh. The host calls [`RenderContext::render_frame`]
//! (or [`RenderContext::process_commands`] followed by
//! [`RenderContext::collect_mesh_elements`]) once per frame on its render
//! thread, then [`RenderContext::end_frame`].

use glam::Mat4;

use crate::backend::GraphicsBackend;
use crate::render::command::{PrimitiveTransform, RenderCommand, RenderCommandReceiver};
use crate::render::draw::{MeshElementCollector, PrimitiveUniformProvider, SceneView, ViewFamily};
use crate::render::scene_proxy::{DeformMeshSceneProxy, PrimitiveSceneProxy};
use crate::resources::BoxSphereBounds;

/// Render-side record of the owning primitive's placement
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PrimitiveSceneInfo {
    pub local_to_world: Mat4,
    pub previous_local_to_world: Mat4,
    pub bounds: BoxSphereBounds,
    pub local_bounds: BoxSphereBounds,
}

impl Default for PrimitiveSceneInfo {
    fn default() -> Self {
        Self {
            local_to_world: Mat4::IDENTITY,
            previous_local_to_world: Mat4::IDENTITY,
            bounds: BoxSphereBounds::ZERO,
            local_bounds: BoxSphereBounds::ZERO,
        }
    }
}

impl PrimitiveSceneInfo {
    pub fn update(&mut self, transform: &PrimitiveTransform) {
        self.local_to_world = transform.local_to_world;
        self.bounds = transform.world_bounds;
        self.local_bounds = transform.local_bounds;
    }

    /// The current transform becomes the previous one for the next frame.
    pub fn end_frame(&mut self) {
        self.previous_local_to_world = self.local_to_world;
    }
}

impl PrimitiveUniformProvider for PrimitiveSceneInfo {
    fn local_to_world(&self) -> Mat4 {
        self.local_to_world
    }

    fn previous_local_to_world(&self) -> Mat4 {
        self.previous_local_to_world
    }

    fn bounds(&self) -> BoxSphereBounds {
        self.bounds
    }

    fn local_bounds(&self) -> BoxSphereBounds {
        self.local_bounds
    }
}

pub struct RenderContext<B: GraphicsBackend> {
    backend: B,
    commands: RenderCommandReceiver,
    proxy: Option<DeformMeshSceneProxy>,
    scene_info: PrimitiveSceneInfo,
    frame_number: u64,
}

impl<B: GraphicsBackend> RenderContext<B> {
    pub fn new(backend: B, commands: RenderCommandReceiver) -> Self {
        log::info!("Render context created on {} backend", backend.name());
        Self {
            backend,
            commands,
            proxy: None,
            scene_info: PrimitiveSceneInfo::default(),
            frame_number: 0,
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// Current scene proxy, if one is live
    pub fn proxy(&self) -> Option<&DeformMeshSceneProxy> {
        self.proxy.as_ref()
    }

    pub fn scene_info(&self) -> &PrimitiveSceneInfo {
        &self.scene_info
    }

    pub fn frame_number(&self) -> u64 {
        self.frame_number
    }

    /// Run every queued command in order. Returns how many ran.
    pub fn process_commands(&mut self) -> usize {
        let mut executed = 0;
        while let Some(command) = self.commands.try_recv() {
            self.execute(command);
            executed += 1;
        }
        executed
    }

    fn execute(&mut self, command: RenderCommand) {
        log::trace!("Executing render command {}", command.name());
        match command {
            RenderCommand::Rebuild(snapshot) => {
                self.release_proxy();
                self.scene_info.update(&snapshot.primitive_transform);
                match DeformMeshSceneProxy::new(&snapshot, &mut self.backend) {
                    Ok(proxy) => self.proxy = Some(proxy),
                    Err(err) => log::error!("Failed to build deform mesh scene proxy: {}", err),
                }
            }
            RenderCommand::SetTransform { slot, matrix } => match self.proxy.as_mut() {
                Some(proxy) => proxy.set_transform(slot, matrix),
                None => log::trace!("SetTransform without a scene proxy"),
            },
            RenderCommand::SetVisibility { slot, visible } => match self.proxy.as_mut() {
                Some(proxy) => proxy.set_visibility(slot, visible),
                None => log::trace!("SetVisibility without a scene proxy"),
            },
            RenderCommand::FlushTransforms => {
                if let Some(proxy) = self.proxy.as_mut() {
                    proxy.flush_transforms(&mut self.backend);
                }
            }
            RenderCommand::UpdatePrimitiveTransform(transform) => {
                self.scene_info.update(&transform);
            }
            RenderCommand::Release => self.release_proxy(),
        }
    }

    fn release_proxy(&mut self) {
        if let Some(mut proxy) = self.proxy.take() {
            proxy.release(&mut self.backend);
        }
    }

    /// Assemble this frame's batches from the current proxy.
    pub fn collect_mesh_elements(
        &self,
        views: &[SceneView],
        family: &ViewFamily,
        visibility_map: u32,
    ) -> MeshElementCollector<'_> {
        let mut collector = MeshElementCollector::new(views.len());
        if let Some(proxy) = &self.proxy {
            proxy.get_dynamic_mesh_elements(
                views,
                family,
                visibility_map,
                &self.scene_info,
                &mut collector,
            );
        }
        collector
    }

    /// Drain the command queue, then assemble this frame's batches.
    pub fn render_frame(
        &mut self,
        views: &[SceneView],
        family: &ViewFamily,
        visibility_map: u32,
    ) -> MeshElementCollector<'_> {
        self.process_commands();
        self.collect_mesh_elements(views, family, visibility_map)
    }

    pub fn end_frame(&mut self) {
        self.scene_info.end_frame();
        self.frame_number += 1;
    }
}

impl<B: GraphicsBackend> Drop for RenderContext<B> {
    fn drop(&mut self) {
        self.release_proxy();
    }
}
