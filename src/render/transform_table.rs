//! Per-section transform table
//!
//! One matrix per section slot, kept on the CPU and mirrored into a single
//! read-only storage buffer. The CPU array is authoritative: mutations land
//! there immediately and only reach the GPU on [`TransformTable::flush`],
//! which always uploads the whole array in one write.

use glam::Mat4;

use crate::backend::{
    BackendResult, BufferDescriptor, BufferHandle, BufferUsage, BufferViewHandle, GraphicsBackend,
};
use crate::render::resource::RenderResource;

/// Upload state of the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableState {
    /// GPU contents match the CPU array
    Clean,
    /// CPU array has mutations not yet flushed
    Dirty,
}

#[derive(Debug)]
pub struct TransformTable {
    transforms: Vec<Mat4>,
    label: String,
    buffer: Option<BufferHandle>,
    view: Option<BufferViewHandle>,
    dirty: bool,
}

impl TransformTable {
    pub fn new(transforms: Vec<Mat4>, label: impl Into<String>) -> Self {
        Self {
            transforms,
            label: label.into(),
            buffer: None,
            view: None,
            dirty: false,
        }
    }

    pub fn len(&self) -> usize {
        self.transforms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transforms.is_empty()
    }

    pub fn get(&self, slot: usize) -> Option<&Mat4> {
        self.transforms.get(slot)
    }

    /// CPU copy of the table
    pub fn transforms(&self) -> &[Mat4] {
        &self.transforms
    }

    pub fn state(&self) -> TableState {
        if self.dirty {
            TableState::Dirty
        } else {
            TableState::Clean
        }
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn buffer(&self) -> Option<BufferHandle> {
        self.buffer
    }

    /// Read-only view bound to the vertex stage
    pub fn view(&self) -> Option<BufferViewHandle> {
        self.view
    }

    /// Byte size of the GPU buffer
    pub fn byte_size(&self) -> u64 {
        std::mem::size_of_val(self.transforms.as_slice()) as u64
    }

    pub fn allocated_size(&self) -> usize {
        self.transforms.capacity() * std::mem::size_of::<Mat4>() + self.label.capacity()
    }

    /// Overwrite one slot on the CPU side. Returns `false` for an out-of-range slot.
    pub fn set(&mut self, slot: usize, matrix: Mat4) -> bool {
        match self.transforms.get_mut(slot) {
            Some(entry) => {
                *entry = matrix;
                self.dirty = true;
                true
            }
            None => false,
        }
    }

    /// Upload the whole CPU array if it changed since the last flush.
    ///
    /// Returns whether anything was written.
    pub fn flush(&mut self, backend: &mut dyn GraphicsBackend) -> bool {
        if !self.dirty {
            return false;
        }
        let Some(buffer) = self.buffer else {
            return false;
        };
        backend.write_buffer(buffer, 0, bytemuck::cast_slice(&self.transforms));
        self.dirty = false;
        log::trace!("{}: flushed {} transforms", self.label, self.transforms.len());
        true
    }
}

impl RenderResource for TransformTable {
    fn is_initialized(&self) -> bool {
        self.buffer.is_some()
    }

    fn init_resource(&mut self, backend: &mut dyn GraphicsBackend) -> BackendResult<()> {
        // No GPU resources for an empty table
        if self.transforms.is_empty() {
            return Ok(());
        }

        let desc = BufferDescriptor::new(
            self.byte_size(),
            BufferUsage::STORAGE | BufferUsage::COPY_DST,
        )
        .with_label(self.label.clone());
        let buffer = backend.create_buffer_init(&desc, bytemuck::cast_slice(&self.transforms))?;

        let view = match backend.create_buffer_view(buffer) {
            Ok(view) => view,
            Err(err) => {
                backend.destroy_buffer(buffer);
                return Err(err);
            }
        };

        self.buffer = Some(buffer);
        self.view = Some(view);
        self.dirty = false;
        Ok(())
    }

    fn update_resource(&mut self, backend: &mut dyn GraphicsBackend) -> BackendResult<()> {
        self.dirty = true;
        self.flush(backend);
        Ok(())
    }

    fn release_resource(&mut self, backend: &mut dyn GraphicsBackend) {
        if let Some(view) = self.view.take() {
            backend.destroy_buffer_view(view);
        }
        if let Some(buffer) = self.buffer.take() {
            backend.destroy_buffer(buffer);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::HeadlessBackend;
    use crate::render::resource::init_or_update_resource;
    use glam::Vec3;

    fn gpu_transforms(backend: &HeadlessBackend, table: &TransformTable) -> Vec<Mat4> {
        let bytes = backend.buffer_contents(table.buffer().unwrap()).unwrap();
        bytes
            .chunks_exact(std::mem::size_of::<Mat4>())
            .map(bytemuck::pod_read_unaligned)
            .collect()
    }

    #[test]
    fn empty_table_allocates_nothing() {
        let mut backend = HeadlessBackend::new();
        let mut table = TransformTable::new(Vec::new(), "empty");
        table.init_resource(&mut backend).unwrap();

        assert!(table.buffer().is_none());
        assert!(table.view().is_none());
        assert_eq!(backend.live_buffers(), 0);
        assert!(!table.flush(&mut backend));
    }

    #[test]
    fn init_uploads_initial_contents() {
        let mut backend = HeadlessBackend::new();
        let initial = vec![Mat4::IDENTITY, Mat4::from_translation(Vec3::X)];
        let mut table = TransformTable::new(initial.clone(), "table");
        table.init_resource(&mut backend).unwrap();

        assert_eq!(gpu_transforms(&backend, &table), initial);
        assert_eq!(backend.buffer_label(table.buffer().unwrap()).as_deref(), Some("table"));
        let usage = backend.buffer_usage(table.buffer().unwrap()).unwrap();
        assert!(usage.contains(BufferUsage::STORAGE));
        assert_eq!(table.state(), TableState::Clean);
    }

    #[test]
    fn mutations_stay_on_cpu_until_flush() {
        let mut backend = HeadlessBackend::new();
        let mut table = TransformTable::new(vec![Mat4::IDENTITY; 3], "table");
        table.init_resource(&mut backend).unwrap();

        let a = Mat4::from_translation(Vec3::new(1.0, 0.0, 0.0));
        let b = Mat4::from_translation(Vec3::new(2.0, 0.0, 0.0));
        assert!(table.set(1, a));
        assert!(table.set(1, b));
        assert!(!table.set(3, a));
        assert_eq!(table.state(), TableState::Dirty);
        assert_eq!(gpu_transforms(&backend, &table)[1], Mat4::IDENTITY);

        assert!(table.flush(&mut backend));
        assert_eq!(table.state(), TableState::Clean);
        assert_eq!(gpu_transforms(&backend, &table), vec![Mat4::IDENTITY, b, Mat4::IDENTITY]);
    }

    #[test]
    fn flush_while_clean_is_a_no_op() {
        let mut backend = HeadlessBackend::new();
        let mut table = TransformTable::new(vec![Mat4::IDENTITY; 2], "table");
        table.init_resource(&mut backend).unwrap();

        table.set(0, Mat4::from_scale(Vec3::splat(2.0)));
        assert!(table.flush(&mut backend));
        let first = gpu_transforms(&backend, &table);
        let writes = backend.write_count();

        assert!(!table.flush(&mut backend));
        assert_eq!(gpu_transforms(&backend, &table), first);
        assert_eq!(backend.write_count(), writes);
    }

    #[test]
    fn update_resource_reuploads_everything() {
        let mut backend = HeadlessBackend::new();
        let mut table = TransformTable::new(vec![Mat4::IDENTITY], "table");
        init_or_update_resource(&mut table, &mut backend).unwrap();
        init_or_update_resource(&mut table, &mut backend).unwrap();

        assert_eq!(backend.live_buffers(), 1);
        assert_eq!(backend.write_count(), 1);
    }

    #[test]
    fn release_destroys_buffer_and_view() {
        let mut backend = HeadlessBackend::new();
        let mut table = TransformTable::new(vec![Mat4::IDENTITY], "table");
        table.init_resource(&mut backend).unwrap();
        table.release_resource(&mut backend);

        assert_eq!(backend.live_buffers(), 0);
        assert_eq!(backend.live_views(), 0);
        assert!(!table.is_initialized());
    }
}
