//! Core backend abstraction traits
//!
//! The render mirror only needs a narrow slice of a GPU API: structured
//! buffers it can create with initial contents, overwrite in place, and
//! expose to the vertex stage through a read-only view.

use crate::backend::types::*;
use thiserror::Error;

/// Backend error type
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("Failed to initialize backend: {0}")]
    InitializationFailed(String),
    #[error("Failed to create device: {0}")]
    DeviceCreationFailed(String),
    #[error("Failed to create buffer: {0}")]
    BufferCreationFailed(String),
    #[error("Failed to create buffer view: {0}")]
    ViewCreationFailed(String),
    #[error("Invalid vertex data: {0}")]
    InvalidVertexData(String),
    #[error("Unknown buffer handle {0:?}")]
    UnknownBuffer(BufferHandle),
}

pub type BackendResult<T> = Result<T, BackendError>;

/// Handle to a GPU buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferHandle(pub(crate) u64);

/// Handle to a read-only shader view over a buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferViewHandle(pub(crate) u64);

/// GPU buffer API consumed by the render side.
///
/// Implementations are driven exclusively from the render context; nothing
/// here needs to be thread-safe beyond `Send` so the backend can move onto
/// the render thread.
pub trait GraphicsBackend {
    /// Get the backend name
    fn name(&self) -> &'static str;

    /// Create a buffer with initial data
    ///
    /// `desc.size` must be at least `data.len()`; the tail is zero-filled.
    fn create_buffer_init(&mut self, desc: &BufferDescriptor, data: &[u8])
        -> BackendResult<BufferHandle>;

    /// Write data to a buffer
    ///
    /// Equivalent to lock, copy, unlock of the written range.
    fn write_buffer(&mut self, buffer: BufferHandle, offset: u64, data: &[u8]);

    /// Create a read-only view over a storage buffer for vertex-stage access
    fn create_buffer_view(&mut self, buffer: BufferHandle) -> BackendResult<BufferViewHandle>;

    /// Destroy a buffer view
    fn destroy_buffer_view(&mut self, view: BufferViewHandle);

    /// Destroy a buffer
    fn destroy_buffer(&mut self, buffer: BufferHandle);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = BackendError::InvalidVertexData("no positions".to_string());
        assert_eq!(err.to_string(), "Invalid vertex data: no positions");

        let err = BackendError::BufferCreationFailed("zero-sized".to_string());
        assert_eq!(err.to_string(), "Failed to create buffer: zero-sized");

        let err = BackendError::UnknownBuffer(BufferHandle(7));
        assert_eq!(err.to_string(), "Unknown buffer handle BufferHandle(7)");
    }
}
