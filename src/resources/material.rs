//! Surface materials and their render-side relevance

use std::sync::{Arc, OnceLock};

use glam::Vec4;

use crate::render::draw::PrimitiveViewRelevance;

/// How a material's output combines with the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BlendMode {
    #[default]
    Opaque,
    Masked,
    Translucent,
}

/// Shared material handle
pub type MaterialRef = Arc<Material>;

/// Surface material, reduced to what decides pass relevance.
///
/// Shading parameters live with the host's material system.
#[derive(Debug, Clone, Default)]
pub struct Material {
    pub name: String,
    pub blend_mode: BlendMode,
    /// Drawn on top of everything; such primitives can't be occluded
    pub disable_depth_test: bool,
}

impl Material {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    /// Engine fallback used for sections without a material.
    pub fn default_surface() -> MaterialRef {
        static DEFAULT_SURFACE: OnceLock<MaterialRef> = OnceLock::new();
        DEFAULT_SURFACE
            .get_or_init(|| Arc::new(Material::new("default_surface")))
            .clone()
    }

    pub fn with_blend_mode(mut self, blend_mode: BlendMode) -> Self {
        self.blend_mode = blend_mode;
        self
    }

    pub fn with_disable_depth_test(mut self, disable: bool) -> Self {
        self.disable_depth_test = disable;
        self
    }

    pub fn relevance(&self) -> MaterialRelevance {
        MaterialRelevance {
            opaque: self.blend_mode == BlendMode::Opaque,
            masked: self.blend_mode == BlendMode::Masked,
            translucent: self.blend_mode == BlendMode::Translucent,
            disable_depth_test: self.disable_depth_test,
        }
    }
}

/// Which render passes the materials of a primitive need.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MaterialRelevance {
    pub opaque: bool,
    pub masked: bool,
    pub translucent: bool,
    pub disable_depth_test: bool,
}

impl MaterialRelevance {
    /// Union over a set of materials.
    pub fn from_materials<'a>(materials: impl IntoIterator<Item = &'a MaterialRef>) -> Self {
        materials
            .into_iter()
            .fold(Self::default(), |acc, m| acc | m.relevance())
    }

    pub fn set_primitive_view_relevance(&self, relevance: &mut PrimitiveViewRelevance) {
        relevance.opaque = self.opaque;
        relevance.masked = self.masked;
        relevance.translucent = self.translucent;
    }
}

impl std::ops::BitOr for MaterialRelevance {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self::Output {
        Self {
            opaque: self.opaque || rhs.opaque,
            masked: self.masked || rhs.masked,
            translucent: self.translucent || rhs.translucent,
            disable_depth_test: self.disable_depth_test || rhs.disable_depth_test,
        }
    }
}

impl std::ops::BitOrAssign for MaterialRelevance {
    fn bitor_assign(&mut self, rhs: Self) {
        *self = *self | rhs;
    }
}

/// What a mesh batch is shaded with.
#[derive(Debug, Clone)]
pub enum MaterialRenderProxy {
    Material(MaterialRef),
    /// Flat color override, optionally derived from a parent material
    Colored {
        parent: Option<MaterialRef>,
        color: Vec4,
    },
}

impl MaterialRenderProxy {
    /// The material this proxy ultimately shades with, if any.
    pub fn material(&self) -> Option<&MaterialRef> {
        match self {
            Self::Material(material) => Some(material),
            Self::Colored { parent, .. } => parent.as_ref(),
        }
    }

    pub fn is_colored_override(&self) -> bool {
        matches!(self, Self::Colored { .. })
    }
}
