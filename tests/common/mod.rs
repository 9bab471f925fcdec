//! Shared helpers for the integration tests.

#![allow(dead_code)]

use deform_mesh::backend::{BufferHandle, HeadlessBackend};
use deform_mesh::resources::{Aabb, GeometryRef};
use deform_mesh::DeformMeshSection;
use glam::{Mat4, Vec3};

/// Route `log` output through the test harness.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Decode a transform table buffer of the headless backend.
pub fn read_transforms(backend: &HeadlessBackend, buffer: BufferHandle) -> Vec<Mat4> {
    let bytes = backend
        .buffer_contents(buffer)
        .expect("transform buffer should be alive");
    bytes
        .chunks_exact(std::mem::size_of::<Mat4>())
        .map(bytemuck::pod_read_unaligned)
        .collect()
}

pub fn translation(x: f32, y: f32, z: f32) -> Mat4 {
    Mat4::from_translation(Vec3::new(x, y, z))
}

/// Bounds of `StaticMesh::cube()`
pub fn unit_cube_box() -> Aabb {
    Aabb::new(Vec3::splat(-0.5), Vec3::splat(0.5))
}

pub fn same_geometry(a: &GeometryRef, b: &GeometryRef) -> bool {
    std::ptr::eq(
        std::sync::Arc::as_ptr(a) as *const (),
        std::sync::Arc::as_ptr(b) as *const (),
    )
}

pub fn assert_box_near(actual: Aabb, expected: Aabb) {
    assert!(
        actual.min.abs_diff_eq(expected.min, 1e-5) && actual.max.abs_diff_eq(expected.max, 1e-5),
        "box {:?} != {:?}",
        actual,
        expected
    );
}

pub fn assert_same_section(actual: &DeformMeshSection, expected: &DeformMeshSection) {
    assert_eq!(actual.deform_transform, expected.deform_transform);
    assert_eq!(actual.local_box, expected.local_box);
    assert_eq!(actual.visible, expected.visible);
    match (&actual.geometry, &expected.geometry) {
        (Some(a), Some(b)) => assert!(same_geometry(a, b)),
        (None, None) => {}
        _ => panic!("geometry presence differs"),
    }
}
