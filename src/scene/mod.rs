//! Control-side scene state
//!
//! The section registry a game or tool thread mutates, and the transforms it
//! is mutated with.

mod component;
mod section;
mod transform;

pub use component::*;
pub use section::*;
pub use transform::*;
