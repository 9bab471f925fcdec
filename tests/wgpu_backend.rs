//! Deform mesh resources on a real wgpu device.
//!
//! Skipped when no adapter is available (CI without a GPU or software
//! rasterizer).

#![cfg(feature = "wgpu-backend")]

mod common;

use common::{init_logging, translation};
use deform_mesh::render::shader::DEFORM_MESH_WGSL;
use deform_mesh::render::{command_channel, RenderContext, SceneView, ViewFamily};
use deform_mesh::resources::StaticMesh;
use deform_mesh::{DeformMeshComponent, WgpuBackend};
use glam::Mat4;

fn backend_or_skip() -> Option<WgpuBackend> {
    match WgpuBackend::new_headless() {
        Ok(backend) => Some(backend),
        Err(err) => {
            eprintln!("wgpu backend not available ({}), skipping", err);
            None
        }
    }
}

#[test]
fn transform_table_is_a_storage_bind_group() {
    init_logging();
    let Some(backend) = backend_or_skip() else {
        return;
    };
    let (tx, rx) = command_channel();
    let mut context = RenderContext::new(backend, rx);

    let cube = StaticMesh::cube().into_ref();
    let mut component = DeformMeshComponent::default();
    component.attach_render_channel(tx);
    for slot in 0..3 {
        component.create_section(slot, cube.clone(), translation(slot as f32, 0.0, 0.0));
    }
    component.send_render_updates();
    component.update_transform(1, Mat4::IDENTITY);
    component.flush_all();

    let views = vec![SceneView::default()];
    let batches = context
        .render_frame(&views, &ViewFamily::default(), 1)
        .num_batches();
    assert_eq!(batches, 3);

    let proxy = context.proxy().expect("proxy was built");
    let table = proxy.transform_table();
    let buffer = context
        .backend()
        .buffer(table.buffer().unwrap())
        .expect("transform buffer");
    assert_eq!(buffer.size(), 3 * std::mem::size_of::<Mat4>() as u64);
    assert!(buffer.usage().contains(wgpu::BufferUsages::STORAGE));
    assert!(context
        .backend()
        .bind_group(table.view().unwrap())
        .is_some());
    assert!(!table.is_dirty());
}

#[test]
fn deform_mesh_shader_compiles_on_device() {
    init_logging();
    let Some(backend) = backend_or_skip() else {
        return;
    };
    let device = backend.device();

    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let _module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("deform_mesh.wgsl"),
        source: wgpu::ShaderSource::Wgsl(DEFORM_MESH_WGSL.into()),
    });
    let error = pollster::block_on(device.pop_error_scope());
    assert!(error.is_none(), "shader module error: {:?}", error);
}
