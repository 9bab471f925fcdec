//! wgpu backend implementation
//!
//! Storage buffers map directly onto wgpu buffers. A buffer view is a bind
//! group exposing the buffer as `var<storage, read>` to the vertex stage,
//! laid out to match the transform table binding of `deform_mesh.wgsl`.

use crate::backend::traits::*;
use crate::backend::types::*;
use crate::render::shader::TRANSFORMS_BINDING;
use std::collections::HashMap;
use wgpu::util::DeviceExt;

/// wgpu backend implementation
pub struct WgpuBackend {
    device: wgpu::Device,
    queue: wgpu::Queue,
    transforms_layout: wgpu::BindGroupLayout,

    // Resource storage
    buffers: HashMap<u64, wgpu::Buffer>,
    views: HashMap<u64, wgpu::BindGroup>,

    // Handle counters
    next_buffer_id: u64,
    next_view_id: u64,
}

impl WgpuBackend {
    fn convert_buffer_usage(usage: BufferUsage) -> wgpu::BufferUsages {
        let mut result = wgpu::BufferUsages::empty();
        if usage.contains(BufferUsage::COPY_DST) {
            result |= wgpu::BufferUsages::COPY_DST;
        }
        if usage.contains(BufferUsage::INDEX) {
            result |= wgpu::BufferUsages::INDEX;
        }
        if usage.contains(BufferUsage::VERTEX) {
            result |= wgpu::BufferUsages::VERTEX;
        }
        if usage.contains(BufferUsage::STORAGE) {
            result |= wgpu::BufferUsages::STORAGE;
        }
        result
    }

    /// Create a backend without a surface (native only)
    #[cfg(not(target_arch = "wasm32"))]
    pub fn new_headless() -> BackendResult<Self> {
        pollster::block_on(Self::new_async())
    }

    /// Async backend creation without a surface
    pub async fn new_async() -> BackendResult<Self> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .ok_or_else(|| BackendError::InitializationFailed("No suitable adapter found".into()))?;

        let adapter_info = adapter.get_info();
        log::info!(
            "Selected GPU: {} ({:?} backend)",
            adapter_info.name,
            adapter_info.backend
        );

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("Deform Mesh Device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::default(),
                },
                None,
            )
            .await
            .map_err(|e| BackendError::DeviceCreationFailed(e.to_string()))?;

        Ok(Self::from_device(device, queue))
    }

    /// Wrap a device and queue owned by the host renderer
    pub fn from_device(device: wgpu::Device, queue: wgpu::Queue) -> Self {
        let transforms_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("DeformMesh Transforms Layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: TRANSFORMS_BINDING,
                visibility: wgpu::ShaderStages::VERTEX,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Storage { read_only: true },
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });

        Self {
            device,
            queue,
            transforms_layout,
            buffers: HashMap::new(),
            views: HashMap::new(),
            next_buffer_id: 0,
            next_view_id: 0,
        }
    }

    /// Get reference to the wgpu device
    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    /// Get reference to the wgpu queue
    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    /// Layout of the bind groups created by `create_buffer_view`, for pipeline creation
    pub fn transforms_layout(&self) -> &wgpu::BindGroupLayout {
        &self.transforms_layout
    }

    /// Resolve a buffer handle
    pub fn buffer(&self, buffer: BufferHandle) -> Option<&wgpu::Buffer> {
        self.buffers.get(&buffer.0)
    }

    /// Resolve a view handle to the bind group that exposes it
    pub fn bind_group(&self, view: BufferViewHandle) -> Option<&wgpu::BindGroup> {
        self.views.get(&view.0)
    }
}

impl GraphicsBackend for WgpuBackend {
    fn name(&self) -> &'static str {
        "wgpu Backend"
    }

    fn create_buffer_init(
        &mut self,
        desc: &BufferDescriptor,
        data: &[u8],
    ) -> BackendResult<BufferHandle> {
        if (data.len() as u64) > desc.size {
            return Err(BackendError::BufferCreationFailed(format!(
                "{:?}: initial data ({} bytes) exceeds buffer size ({} bytes)",
                desc.label,
                data.len(),
                desc.size
            )));
        }

        let mut contents = data.to_vec();
        contents.resize(desc.size as usize, 0);

        let buffer = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: desc.label.as_deref(),
            contents: &contents,
            usage: Self::convert_buffer_usage(desc.usage),
        });

        let id = self.next_buffer_id;
        self.next_buffer_id += 1;
        self.buffers.insert(id, buffer);

        Ok(BufferHandle(id))
    }

    fn write_buffer(&mut self, buffer: BufferHandle, offset: u64, data: &[u8]) {
        if let Some(buf) = self.buffers.get(&buffer.0) {
            self.queue.write_buffer(buf, offset, data);
        }
    }

    fn create_buffer_view(&mut self, buffer: BufferHandle) -> BackendResult<BufferViewHandle> {
        let buf = self
            .buffers
            .get(&buffer.0)
            .ok_or(BackendError::UnknownBuffer(buffer))?;

        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("DeformMesh Transforms View"),
            layout: &self.transforms_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: TRANSFORMS_BINDING,
                resource: buf.as_entire_binding(),
            }],
        });

        let id = self.next_view_id;
        self.next_view_id += 1;
        self.views.insert(id, bind_group);

        Ok(BufferViewHandle(id))
    }

    fn destroy_buffer_view(&mut self, view: BufferViewHandle) {
        self.views.remove(&view.0);
    }

    fn destroy_buffer(&mut self, buffer: BufferHandle) {
        if let Some(buf) = self.buffers.remove(&buffer.0) {
            buf.destroy();
        }
    }
}
