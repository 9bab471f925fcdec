//! Deform mesh component
//!
//! The control-side registry of sections and the source of truth for the
//! render mirror. Structural edits (creating, overwriting or clearing a
//! section, changing a material) mark the render state dirty; the host's
//! render-sync step then ships a fresh snapshot and the render context
//! rebuilds its proxy from scratch. Transform and visibility edits go over
//! the command queue as per-slot commands instead.
//!
//! Invalid indices are never an error here. Queries return the empty answer
//! and mutations do nothing.

use glam::Mat4;

use crate::render::command::{
    ComponentSnapshot, PrimitiveTransform, RenderCommand, RenderCommandSender,
};
use crate::resources::{
    Aabb, BoxSphereBounds, GeometryRef, Material, MaterialRef, MaterialRelevance,
};
use crate::scene::DeformMeshSection;
use crate::DeformMeshConfig;

#[derive(Debug)]
pub struct DeformMeshComponent {
    sections: Vec<DeformMeshSection>,
    override_materials: Vec<Option<MaterialRef>>,
    config: DeformMeshConfig,
    world_transform: Mat4,
    local_bounds: BoxSphereBounds,
    bounds: BoxSphereBounds,

    render_channel: Option<RenderCommandSender>,
    render_state_dirty: bool,
    render_transform_dirty: bool,
    // A Rebuild has been sent since the channel was attached
    proxy_live: bool,
}

impl Default for DeformMeshComponent {
    fn default() -> Self {
        Self::new(DeformMeshConfig::default())
    }
}

impl DeformMeshComponent {
    pub fn new(config: DeformMeshConfig) -> Self {
        Self {
            sections: Vec::new(),
            override_materials: Vec::new(),
            config,
            world_transform: Mat4::IDENTITY,
            local_bounds: BoxSphereBounds::ZERO,
            bounds: BoxSphereBounds::ZERO,
            render_channel: None,
            render_state_dirty: false,
            render_transform_dirty: false,
            proxy_live: false,
        }
    }

    pub fn config(&self) -> &DeformMeshConfig {
        &self.config
    }

    fn ensure_slot(&mut self, index: usize) {
        if index >= self.sections.len() {
            self.sections.resize_with(index + 1, DeformMeshSection::default);
        }
    }

    /// Create or overwrite the section at `index` from shared geometry.
    ///
    /// Slots between the old end and `index` are filled with empty sections.
    /// The section's box starts as the geometry's own bounding box.
    pub fn create_section(
        &mut self,
        index: usize,
        geometry: impl Into<Option<GeometryRef>>,
        transform: impl Into<Mat4>,
    ) {
        self.ensure_slot(index);
        let transform = transform.into();

        let geometry = geometry.into();
        let section = &mut self.sections[index];
        section.reset();
        section.deform_transform = transform;
        if let Some(geometry) = &geometry {
            section.local_box += geometry.bounding_box();
        }
        let default_material = geometry.as_ref().and_then(|g| g.default_material());
        section.geometry = geometry;

        self.set_material(index, default_material);
        self.update_local_bounds();
        self.mark_render_state_dirty();
    }

    /// Move a section. Its box grows to also cover the geometry under the
    /// new transform; it never shrinks.
    pub fn update_transform(&mut self, index: usize, transform: impl Into<Mat4>) {
        let transform = transform.into();
        let Some(section) = self.sections.get_mut(index) else {
            log::trace!("DeformMeshComponent: update_transform on missing section {}", index);
            return;
        };

        section.deform_transform = transform;
        section.accumulate_bounds(&transform);

        self.send_command(RenderCommand::SetTransform {
            slot: index,
            matrix: transform,
        });
        self.update_local_bounds();
    }

    /// Ask the render side to upload every pending transform in one write.
    pub fn flush_all(&mut self) {
        self.send_command(RenderCommand::FlushTransforms);
    }

    pub fn clear_section(&mut self, index: usize) {
        let Some(section) = self.sections.get_mut(index) else {
            return;
        };
        section.reset();
        self.update_local_bounds();
        self.mark_render_state_dirty();
    }

    pub fn clear_all(&mut self) {
        self.sections.clear();
        self.update_local_bounds();
        self.mark_render_state_dirty();
    }

    pub fn set_visible(&mut self, index: usize, visible: bool) {
        let Some(section) = self.sections.get_mut(index) else {
            return;
        };
        section.visible = visible;
        self.send_command(RenderCommand::SetVisibility {
            slot: index,
            visible,
        });
    }

    /// `false` for a missing section
    pub fn is_visible(&self, index: usize) -> bool {
        self.sections.get(index).is_some_and(|s| s.visible)
    }

    pub fn section_count(&self) -> usize {
        self.sections.len()
    }

    pub fn section(&self, index: usize) -> Option<&DeformMeshSection> {
        self.sections.get(index)
    }

    pub fn sections(&self) -> &[DeformMeshSection] {
        &self.sections
    }

    /// Overwrite a whole section, growing the store as needed.
    pub fn set_section(&mut self, index: usize, section: DeformMeshSection) {
        self.ensure_slot(index);
        self.sections[index] = section;
        self.update_local_bounds();
        self.mark_render_state_dirty();
    }

    /// Override the material of a slot; `None` falls back to the geometry's.
    pub fn set_material(&mut self, index: usize, material: Option<MaterialRef>) {
        if index >= self.override_materials.len() {
            self.override_materials.resize(index + 1, None);
        }
        self.override_materials[index] = material;
        self.mark_render_state_dirty();
    }

    pub fn material(&self, index: usize) -> Option<MaterialRef> {
        self.override_materials.get(index).cloned().flatten()
    }

    /// One material slot per section
    pub fn num_materials(&self) -> usize {
        self.sections.len()
    }

    /// Material a slot is drawn with: override, then geometry default, then
    /// the engine default surface.
    pub fn resolved_material(&self, index: usize) -> MaterialRef {
        self.material(index)
            .or_else(|| {
                self.sections
                    .get(index)
                    .and_then(|s| s.geometry.as_ref())
                    .and_then(|g| g.default_material())
            })
            .unwrap_or_else(Material::default_surface)
    }

    /// Union of every section box, or the zero box at the origin.
    pub fn local_box(&self) -> Aabb {
        let union = self
            .sections
            .iter()
            .fold(Aabb::EMPTY, |acc, s| acc + s.local_box);
        if union.is_valid() {
            union
        } else {
            Aabb::ZERO
        }
    }

    pub fn local_bounds(&self) -> BoxSphereBounds {
        self.local_bounds
    }

    /// World bounds as of the last bounds update
    pub fn bounds(&self) -> BoxSphereBounds {
        self.bounds
    }

    /// Local bounds moved to world space and scaled by the configured factor.
    pub fn calc_bounds(&self, local_to_world: &Mat4) -> BoxSphereBounds {
        self.local_bounds
            .transform_by(local_to_world)
            .scaled(self.config.bounds_scale)
    }

    pub fn world_transform(&self) -> Mat4 {
        self.world_transform
    }

    /// Place the whole mesh. Only the primitive transform is resent.
    pub fn set_world_transform(&mut self, world_transform: impl Into<Mat4>) {
        self.world_transform = world_transform.into();
        self.update_bounds();
    }

    fn update_local_bounds(&mut self) {
        let union = self
            .sections
            .iter()
            .fold(Aabb::EMPTY, |acc, s| acc + s.local_box);
        self.local_bounds = BoxSphereBounds::from_aabb(&union);
        self.update_bounds();
    }

    fn update_bounds(&mut self) {
        self.bounds = self.calc_bounds(&self.world_transform);
        self.render_transform_dirty = true;
    }

    /// Force the next render sync to rebuild the render mirror.
    pub fn mark_render_state_dirty(&mut self) {
        self.render_state_dirty = true;
    }

    pub fn is_render_state_dirty(&self) -> bool {
        self.render_state_dirty
    }

    pub fn is_render_transform_dirty(&self) -> bool {
        self.render_transform_dirty
    }

    /// Whether per-slot commands currently reach a live render mirror
    pub fn has_live_proxy(&self) -> bool {
        self.render_channel.is_some() && self.proxy_live && !self.render_state_dirty
    }

    /// Connect to a render context. The next sync creates the mirror.
    pub fn attach_render_channel(&mut self, channel: RenderCommandSender) {
        if let Some(previous) = self.render_channel.replace(channel) {
            previous.send(RenderCommand::Release);
        }
        self.proxy_live = false;
        self.mark_render_state_dirty();
    }

    /// Disconnect from the render context, releasing its mirror.
    pub fn detach_render_channel(&mut self) -> Option<RenderCommandSender> {
        let channel = self.render_channel.take()?;
        channel.send(RenderCommand::Release);
        self.proxy_live = false;
        Some(channel)
    }

    fn send_command(&self, command: RenderCommand) {
        if !self.has_live_proxy() {
            return;
        }
        if let Some(channel) = &self.render_channel {
            channel.send(command);
        }
    }

    pub fn primitive_transform(&self) -> PrimitiveTransform {
        PrimitiveTransform {
            local_to_world: self.world_transform,
            world_bounds: self.bounds,
            local_bounds: self.local_bounds,
        }
    }

    /// Capture everything the render mirror is built from.
    pub fn snapshot(&self) -> ComponentSnapshot {
        let materials: Vec<MaterialRef> = (0..self.sections.len())
            .map(|slot| self.resolved_material(slot))
            .collect();
        let material_relevance = MaterialRelevance::from_materials(
            materials
                .iter()
                .zip(&self.sections)
                .filter(|(_, section)| !section.is_empty())
                .map(|(material, _)| material),
        );

        ComponentSnapshot {
            sections: self.sections.clone(),
            materials,
            material_relevance,
            config: self.config.clone(),
            primitive_transform: self.primitive_transform(),
        }
    }

    /// Resolve pending invalidations against the render context.
    ///
    /// A dirty render state ships a full snapshot; otherwise a dirty render
    /// transform ships only the primitive transform.
    pub fn send_render_updates(&mut self) {
        let Some(channel) = &self.render_channel else {
            return;
        };

        if self.render_state_dirty {
            log::debug!(
                "DeformMeshComponent: sending rebuild with {} sections",
                self.sections.len()
            );
            channel.send(RenderCommand::Rebuild(Box::new(self.snapshot())));
            self.proxy_live = true;
        } else if self.render_transform_dirty {
            channel.send(RenderCommand::UpdatePrimitiveTransform(
                self.primitive_transform(),
            ));
        }

        self.render_state_dirty = false;
        self.render_transform_dirty = false;
    }
}

impl Drop for DeformMeshComponent {
    fn drop(&mut self) {
        if let Some(channel) = self.render_channel.take() {
            channel.send(RenderCommand::Release);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::command::{command_channel, RenderCommandReceiver};
    use crate::resources::StaticMesh;
    use glam::Vec3;
    use std::sync::Arc;

    fn drained(rx: &RenderCommandReceiver) -> Vec<&'static str> {
        rx.drain().map(|c| c.name()).collect()
    }

    #[test]
    fn create_section_takes_geometry_material() {
        let material = Arc::new(Material::new("painted"));
        let mesh = StaticMesh::cube().with_material(material.clone()).into_ref();
        let mut component = DeformMeshComponent::default();

        component.create_section(1, mesh, Mat4::IDENTITY);
        assert_eq!(component.num_materials(), 2);
        assert!(Arc::ptr_eq(&component.material(1).unwrap(), &material));
        assert!(component.material(0).is_none());
        assert_eq!(component.resolved_material(0).name, "default_surface");
    }

    #[test]
    fn missing_geometry_contributes_nothing() {
        let mut component = DeformMeshComponent::default();
        component.create_section(0, None, Mat4::IDENTITY);

        assert_eq!(component.section_count(), 1);
        assert!(component.section(0).unwrap().is_empty());
        assert_eq!(component.local_box(), Aabb::ZERO);
        assert_eq!(component.local_bounds(), BoxSphereBounds::ZERO);

        // Moving an empty section is harmless
        component.update_transform(0, Mat4::from_scale(Vec3::splat(2.0)));
        assert_eq!(component.local_box(), Aabb::ZERO);
    }

    #[test]
    fn calc_bounds_applies_scale() {
        let config = DeformMeshConfig {
            bounds_scale: 2.0,
            ..Default::default()
        };
        let mut component = DeformMeshComponent::new(config);
        component.create_section(0, StaticMesh::cube().into_ref(), Mat4::IDENTITY);

        let world = component.calc_bounds(&Mat4::from_translation(Vec3::new(0.0, 10.0, 0.0)));
        assert_eq!(world.origin, Vec3::new(0.0, 10.0, 0.0));
        assert_eq!(world.box_extent, Vec3::splat(1.0));

        component.set_world_transform(Mat4::from_translation(Vec3::X));
        assert_eq!(component.bounds().origin, Vec3::X);
    }

    #[test]
    fn nothing_is_sent_without_a_channel() {
        let mut component = DeformMeshComponent::default();
        component.create_section(0, StaticMesh::cube().into_ref(), Mat4::IDENTITY);
        component.send_render_updates();
        // Still pending for when a channel shows up
        assert!(component.is_render_state_dirty());
        assert!(!component.has_live_proxy());
    }

    #[test]
    fn per_slot_commands_wait_for_rebuild() {
        let (tx, rx) = command_channel();
        let mut component = DeformMeshComponent::default();
        component.attach_render_channel(tx);
        component.create_section(0, StaticMesh::cube().into_ref(), Mat4::IDENTITY);

        // Rebuild pending: the snapshot will carry these
        component.update_transform(0, Mat4::from_translation(Vec3::X));
        component.set_visible(0, false);
        component.flush_all();
        assert!(rx.is_empty());

        component.send_render_updates();
        assert_eq!(drained(&rx), vec!["Rebuild"]);
        assert!(component.has_live_proxy());

        component.update_transform(0, Mat4::from_translation(Vec3::Y));
        component.set_visible(0, true);
        component.flush_all();
        component.send_render_updates();
        assert_eq!(
            drained(&rx),
            vec![
                "SetTransform",
                "SetVisibility",
                "FlushTransforms",
                "UpdatePrimitiveTransform"
            ]
        );

        // Nothing dirty, nothing sent
        component.send_render_updates();
        assert!(rx.is_empty());
    }

    #[test]
    fn snapshot_captures_latest_state() {
        let (tx, rx) = command_channel();
        let mut component = DeformMeshComponent::default();
        component.attach_render_channel(tx);
        component.create_section(0, StaticMesh::cube().into_ref(), Mat4::IDENTITY);
        let moved = Mat4::from_translation(Vec3::Z);
        component.update_transform(0, moved);
        component.set_visible(0, false);
        component.send_render_updates();

        let Some(RenderCommand::Rebuild(snapshot)) = rx.try_recv() else {
            panic!("expected a rebuild");
        };
        assert_eq!(snapshot.sections.len(), 1);
        assert_eq!(snapshot.sections[0].deform_transform, moved);
        assert!(!snapshot.sections[0].visible);
        assert_eq!(snapshot.materials.len(), 1);
        assert!(snapshot.material_relevance.opaque);
    }

    #[test]
    fn detach_and_drop_release_the_mirror() {
        let (tx, rx) = command_channel();
        let mut component = DeformMeshComponent::default();
        component.attach_render_channel(tx);
        component.send_render_updates();

        let tx = component.detach_render_channel().unwrap();
        assert_eq!(drained(&rx), vec!["Rebuild", "Release"]);
        assert!(component.detach_render_channel().is_none());

        component.attach_render_channel(tx);
        drop(component);
        assert_eq!(drained(&rx), vec!["Release"]);
    }
}
