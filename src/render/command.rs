//! Control-to-render command queue
//!
//! Commands are small value records moved from the mutation thread to the
//! render thread over an unbounded FIFO. The render context drains the queue
//! before every draw assembly and runs each command to completion in the
//! order it was sent. Nothing is coalesced, dropped or retried.

use crossbeam_channel::{Receiver, Sender, TryIter};
use glam::Mat4;

use crate::resources::{BoxSphereBounds, MaterialRef, MaterialRelevance};
use crate::scene::DeformMeshSection;
use crate::DeformMeshConfig;

/// World placement and bounds of the owning primitive
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PrimitiveTransform {
    pub local_to_world: Mat4,
    /// `local_bounds` in world space, with the configured bounds scale
    pub world_bounds: BoxSphereBounds,
    pub local_bounds: BoxSphereBounds,
}

impl Default for PrimitiveTransform {
    fn default() -> Self {
        Self {
            local_to_world: Mat4::IDENTITY,
            world_bounds: BoxSphereBounds::ZERO,
            local_bounds: BoxSphereBounds::ZERO,
        }
    }
}

/// Everything a scene proxy is built from, captured in one go on the
/// control side.
#[derive(Debug, Clone)]
pub struct ComponentSnapshot {
    pub sections: Vec<DeformMeshSection>,
    /// Resolved material per slot, same length as `sections`
    pub materials: Vec<MaterialRef>,
    pub material_relevance: MaterialRelevance,
    /// Settings of the component, including its primitive flags
    pub config: DeformMeshConfig,
    pub primitive_transform: PrimitiveTransform,
}

/// Work item for the render context
#[derive(Debug)]
pub enum RenderCommand {
    /// Replace the scene proxy with one built from the snapshot
    Rebuild(Box<ComponentSnapshot>),
    /// Write one slot of the CPU transform table
    SetTransform { slot: usize, matrix: Mat4 },
    SetVisibility { slot: usize, visible: bool },
    /// Upload the whole transform table if it is dirty
    FlushTransforms,
    UpdatePrimitiveTransform(PrimitiveTransform),
    /// Destroy the scene proxy and its GPU resources
    Release,
}

impl RenderCommand {
    pub fn name(&self) -> &'static str {
        match self {
            RenderCommand::Rebuild(_) => "Rebuild",
            RenderCommand::SetTransform { .. } => "SetTransform",
            RenderCommand::SetVisibility { .. } => "SetVisibility",
            RenderCommand::FlushTransforms => "FlushTransforms",
            RenderCommand::UpdatePrimitiveTransform(_) => "UpdatePrimitiveTransform",
            RenderCommand::Release => "Release",
        }
    }
}

/// Control-side end of the queue. Not `Clone`: there is one producer.
#[derive(Debug)]
pub struct RenderCommandSender {
    tx: Sender<RenderCommand>,
}

impl RenderCommandSender {
    pub fn send(&self, command: RenderCommand) {
        let name = command.name();
        if self.tx.send(command).is_err() {
            log::warn!("Render context is gone, dropping {} command", name);
        }
    }

    /// Commands sent but not yet drained
    pub fn pending(&self) -> usize {
        self.tx.len()
    }
}

/// Render-side end of the queue
#[derive(Debug)]
pub struct RenderCommandReceiver {
    rx: Receiver<RenderCommand>,
}

impl RenderCommandReceiver {
    pub fn try_recv(&self) -> Option<RenderCommand> {
        self.rx.try_recv().ok()
    }

    /// Commands queued right now, in send order
    pub fn drain(&self) -> TryIter<'_, RenderCommand> {
        self.rx.try_iter()
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}

/// Create a connected sender/receiver pair.
pub fn command_channel() -> (RenderCommandSender, RenderCommandReceiver) {
    let (tx, rx) = crossbeam_channel::unbounded();
    (RenderCommandSender { tx }, RenderCommandReceiver { rx })
}
