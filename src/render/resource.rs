//! Render resource lifecycle

use crate::backend::{BackendResult, GraphicsBackend};

/// A resource with GPU-side state owned by the render context.
pub trait RenderResource {
    fn is_initialized(&self) -> bool;

    /// Create the GPU-side state.
    fn init_resource(&mut self, backend: &mut dyn GraphicsBackend) -> BackendResult<()>;

    /// Refresh the GPU-side state of an initialized resource in place.
    fn update_resource(&mut self, backend: &mut dyn GraphicsBackend) -> BackendResult<()>;

    /// Destroy the GPU-side state. Safe to call on an uninitialized resource.
    fn release_resource(&mut self, backend: &mut dyn GraphicsBackend);
}

/// Initialize `resource`, or update it in place if it already is.
pub fn init_or_update_resource<R: RenderResource + ?Sized>(
    resource: &mut R,
    backend: &mut dyn GraphicsBackend,
) -> BackendResult<()> {
    if resource.is_initialized() {
        resource.update_resource(backend)
    } else {
        resource.init_resource(backend)
    }
}
