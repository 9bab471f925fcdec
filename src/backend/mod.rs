//! Backend abstraction layer
//!
//! Provides the buffer API the render mirror consumes and the backends that
//! implement it.

pub mod headless;
pub mod traits;
pub mod types;

#[cfg(feature = "wgpu-backend")]
pub mod wgpu_backend;

pub use headless::HeadlessBackend;
pub use traits::*;
pub use types::*;

#[cfg(feature = "wgpu-backend")]
pub use wgpu_backend::WgpuBackend;
