//! Headless GPU backend for testing and offscreen hosts.
//!
//! This backend doesn't talk to a GPU. Buffers live in host memory so their
//! contents can be inspected after the render context has run, which makes
//! it the reference backend for verifying transform table uploads.
//!
//! Clones share the same storage: keep one clone on the test side and move
//! the other into the render context.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::backend::traits::*;
use crate::backend::types::*;

#[derive(Debug)]
struct HeadlessBuffer {
    label: Option<String>,
    usage: BufferUsage,
    data: Vec<u8>,
}

#[derive(Debug, Default)]
struct HeadlessState {
    buffers: HashMap<u64, HeadlessBuffer>,
    views: HashMap<u64, BufferHandle>,
    next_buffer_id: u64,
    next_view_id: u64,
    write_count: u64,
}

/// Headless GPU backend.
#[derive(Debug, Clone, Default)]
pub struct HeadlessBackend {
    state: Arc<Mutex<HeadlessState>>,
}

impl HeadlessBackend {
    /// Create a new headless backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the current contents of a buffer.
    pub fn buffer_contents(&self, buffer: BufferHandle) -> Option<Vec<u8>> {
        self.state
            .lock()
            .buffers
            .get(&buffer.0)
            .map(|b| b.data.clone())
    }

    /// Label a buffer was created with.
    pub fn buffer_label(&self, buffer: BufferHandle) -> Option<String> {
        self.state
            .lock()
            .buffers
            .get(&buffer.0)
            .and_then(|b| b.label.clone())
    }

    /// Usage flags a buffer was created with.
    pub fn buffer_usage(&self, buffer: BufferHandle) -> Option<BufferUsage> {
        self.state.lock().buffers.get(&buffer.0).map(|b| b.usage)
    }

    /// Buffer a view was created over.
    pub fn view_target(&self, view: BufferViewHandle) -> Option<BufferHandle> {
        self.state.lock().views.get(&view.0).copied()
    }

    /// Number of buffers that have not been destroyed.
    pub fn live_buffers(&self) -> usize {
        self.state.lock().buffers.len()
    }

    /// Number of views that have not been destroyed.
    pub fn live_views(&self) -> usize {
        self.state.lock().views.len()
    }

    /// Total number of `write_buffer` calls that reached a live buffer.
    pub fn write_count(&self) -> u64 {
        self.state.lock().write_count
    }
}

impl GraphicsBackend for HeadlessBackend {
    fn name(&self) -> &'static str {
        "Headless Backend"
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

        let mut contents = vec![0u8; desc.size as usize];
        contents[..data.len()].copy_from_slice(data);

        let mut state = self.state.lock();
        let id = state.next_buffer_id;
        state.next_buffer_id += 1;
        state.buffers.insert(
            id,
            HeadlessBuffer {
                label: desc.label.clone(),
                usage: desc.usage,
                data: contents,
            },
        );

        log::trace!(
            "HeadlessBackend: created buffer {} {:?} (size: {})",
            id,
            desc.label,
            desc.size
        );
        Ok(BufferHandle(id))
    }

    fn write_buffer(&mut self, buffer: BufferHandle, offset: u64, data: &[u8]) {
        let mut state = self.state.lock();
        let Some(target) = state.buffers.get_mut(&buffer.0) else {
            log::warn!("HeadlessBackend: write to unknown buffer {:?}", buffer);
            return;
        };

        let start = offset as usize;
        let end = start + data.len();
        if end > target.data.len() {
            log::warn!(
                "HeadlessBackend: write of {} bytes at offset {} overruns buffer {:?} ({} bytes)",
                data.len(),
                offset,
                buffer,
                target.data.len()
            );
            return;
        }

        target.data[start..end].copy_from_slice(data);
        state.write_count += 1;
        log::trace!(
            "HeadlessBackend: write_buffer {:?} offset={} len={}",
            buffer,
            offset,
            data.len()
        );
    }

    fn create_buffer_view(&mut self, buffer: BufferHandle) -> BackendResult<BufferViewHandle> {
        let mut state = self.state.lock();
        let Some(target) = state.buffers.get(&buffer.0) else {
            return Err(BackendError::UnknownBuffer(buffer));
        };
        if !target.usage.contains(BufferUsage::STORAGE) {
            return Err(BackendError::ViewCreationFailed(format!(
                "buffer {:?} was not created with STORAGE usage",
                buffer
            )));
        }

        let id = state.next_view_id;
        state.next_view_id += 1;
        state.views.insert(id, buffer);
        Ok(BufferViewHandle(id))
    }

    fn destroy_buffer_view(&mut self, view: BufferViewHandle) {
        self.state.lock().views.remove(&view.0);
    }

    fn destroy_buffer(&mut self, buffer: BufferHandle) {
        self.state.lock().buffers.remove(&buffer.0);
    }
}
