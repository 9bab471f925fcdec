//! Vertex shader shipped with the deform mesh vertex factory
//!
//! The constants below mirror the bind points and attribute locations in
//! `shaders/deform_mesh.wgsl`; pipelines and vertex declarations must agree
//! with them.

/// WGSL source of the deform mesh shader
pub const DEFORM_MESH_WGSL: &str = include_str!("shaders/deform_mesh.wgsl");

/// Vertex entry point
pub const VS_MAIN: &str = "vs_main";
/// Position-only vertex entry point
pub const VS_DEPTH_ONLY: &str = "vs_depth_only";
/// Fragment entry point
pub const FS_MAIN: &str = "fs_main";

/// Bind group holding the transform table
pub const TRANSFORMS_GROUP: u32 = 2;
/// Binding of the transform table inside [`TRANSFORMS_GROUP`]
pub const TRANSFORMS_BINDING: u32 = 0;

/// Attribute location of the position stream
pub const POSITION_ATTRIBUTE: u32 = 0;
/// Attribute location of texcoord channel 0; channel `i` lives at `+ i`
pub const BASE_TEXCOORD_ATTRIBUTE: u32 = 4;
