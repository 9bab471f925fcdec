//! Render-side mirror of deform meshes
//!
//! Everything in here runs on the render thread, driven by commands the
//! control side sends through [`command_channel`].

pub mod command;
pub mod context;
pub mod draw;
pub mod geometry_streams;
pub mod resource;
pub mod scene_proxy;
pub mod section_proxy;
pub mod shader;
pub mod transform_table;
pub mod vertex_factory;

pub use command::{
    command_channel, ComponentSnapshot, PrimitiveTransform, RenderCommand, RenderCommandReceiver,
    RenderCommandSender,
};
pub use context::{PrimitiveSceneInfo, RenderContext};
pub use draw::{
    DepthPriorityGroup, EngineShowFlags, MeshBatch, MeshElementCollector, PrimitiveUniformProvider,
    PrimitiveUniforms, PrimitiveViewRelevance, SceneView, ViewFamily,
};
pub use geometry_streams::{GeometryStreamCache, VertexStreams};
pub use resource::{init_or_update_resource, RenderResource};
pub use scene_proxy::{DeformMeshSceneProxy, PrimitiveSceneProxy};
pub use section_proxy::{IndexBuffer, ProxySection};
pub use transform_table::{TableState, TransformTable};
pub use vertex_factory::{
    DeformVertexFactory, ProxyId, VertexBuffer, VertexElement, VertexFactoryData,
    VertexFactoryShaderBindings, VertexStreamComponent, MAX_STATIC_TEXCOORDS,
};
