//! Resource management
//!
//! Bounding volumes, materials and the geometry assets sections are built from.

mod bounds;
mod material;
mod mesh;

pub use bounds::*;
pub use material::*;
pub use mesh::*;
