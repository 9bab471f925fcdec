//! Control-side section record

use glam::Mat4;

use crate::resources::{Aabb, GeometryRef};

/// One independently transformed piece of a deform mesh.
#[derive(Debug, Clone)]
pub struct DeformMeshSection {
    /// Shared static geometry; `None` for an empty slot
    pub geometry: Option<GeometryRef>,
    /// Applied to the geometry in the vertex stage
    pub deform_transform: Mat4,
    /// Union of the geometry box under every transform this section has had
    pub local_box: Aabb,
    pub visible: bool,
}

impl Default for DeformMeshSection {
    fn default() -> Self {
        Self {
            geometry: None,
            deform_transform: Mat4::IDENTITY,
            local_box: Aabb::EMPTY,
            visible: true,
        }
    }
}

impl DeformMeshSection {
    pub fn new(geometry: GeometryRef, deform_transform: Mat4) -> Self {
        let local_box = geometry.bounding_box();
        Self {
            geometry: Some(geometry),
            deform_transform,
            local_box,
            visible: true,
        }
    }

    /// Drop the geometry and bounds. The transform is kept.
    pub fn reset(&mut self) {
        self.geometry = None;
        self.local_box = Aabb::EMPTY;
        self.visible = true;
    }

    pub fn is_empty(&self) -> bool {
        self.geometry.is_none()
    }

    /// Grow the local box by the geometry box under `transform`.
    pub(crate) fn accumulate_bounds(&mut self, transform: &Mat4) {
        if let Some(geometry) = &self.geometry {
            self.local_box += geometry.bounding_box().transform_by(transform);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::StaticMesh;
    use glam::Vec3;

    #[test]
    fn reset_keeps_transform() {
        let transform = Mat4::from_translation(Vec3::X);
        let mut section = DeformMeshSection::new(StaticMesh::cube().into_ref(), transform);
        section.visible = false;

        section.reset();
        assert!(section.is_empty());
        assert!(section.visible);
        assert!(!section.local_box.is_valid());
        assert_eq!(section.deform_transform, transform);
    }

    #[test]
    fn empty_section_does_not_accumulate() {
        let mut section = DeformMeshSection::default();
        section.accumulate_bounds(&Mat4::from_scale(Vec3::splat(3.0)));
        assert!(!section.local_box.is_valid());
    }
}
