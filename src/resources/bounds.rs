//! Bounding volumes
//!
//! [`Aabb`] is the accumulating box used for section bounds. It starts out
//! invalid (empty) and only grows through unions. [`BoxSphereBounds`] is the
//! box-plus-sphere form handed to the renderer for the whole primitive.

use glam::{Mat4, Vec3};

/// Axis-aligned bounding box.
///
/// An empty box has `min > max` on every axis and contributes nothing to a
/// union.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    /// The empty box.
    pub const EMPTY: Self = Self {
        min: Vec3::splat(f32::INFINITY),
        max: Vec3::splat(f32::NEG_INFINITY),
    };

    /// Zero-sized box at the origin.
    pub const ZERO: Self = Self {
        min: Vec3::ZERO,
        max: Vec3::ZERO,
    };

    #[inline]
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Smallest box enclosing all points; empty when there are none.
    pub fn from_points(points: impl IntoIterator<Item = Vec3>) -> Self {
        points
            .into_iter()
            .fold(Self::EMPTY, |acc, p| acc.union_point(p))
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        self.min.cmple(self.max).all()
    }

    #[inline]
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    #[inline]
    pub fn extent(&self) -> Vec3 {
        (self.max - self.min) * 0.5
    }

    #[inline]
    pub fn union_point(self, point: Vec3) -> Self {
        Self {
            min: self.min.min(point),
            max: self.max.max(point),
        }
    }

    /// Union of two boxes. Empty operands are ignored.
    pub fn union(self, other: Aabb) -> Self {
        match (self.is_valid(), other.is_valid()) {
            (_, false) => self,
            (false, true) => other,
            (true, true) => Self {
                min: self.min.min(other.min),
                max: self.max.max(other.max),
            },
        }
    }

    /// Whether `other` lies entirely inside this box.
    pub fn contains(&self, other: &Aabb) -> bool {
        if !other.is_valid() {
            return true;
        }
        self.is_valid() && self.min.cmple(other.min).all() && self.max.cmpge(other.max).all()
    }

    /// Box enclosing the eight transformed corners. The empty box stays empty.
    pub fn transform_by(&self, matrix: &Mat4) -> Self {
        if !self.is_valid() {
            return *self;
        }
        let (lo, hi) = (self.min, self.max);
        let corners = [
            Vec3::new(lo.x, lo.y, lo.z),
            Vec3::new(hi.x, lo.y, lo.z),
            Vec3::new(lo.x, hi.y, lo.z),
            Vec3::new(hi.x, hi.y, lo.z),
            Vec3::new(lo.x, lo.y, hi.z),
            Vec3::new(hi.x, lo.y, hi.z),
            Vec3::new(lo.x, hi.y, hi.z),
            Vec3::new(hi.x, hi.y, hi.z),
        ];
        Self::from_points(corners.into_iter().map(|c| matrix.transform_point3(c)))
    }
}

impl Default for Aabb {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl std::ops::Add for Aabb {
    type Output = Self;
    fn add(self, rhs: Self) -> Self::Output {
        self.union(rhs)
    }
}

impl std::ops::AddAssign for Aabb {
    fn add_assign(&mut self, rhs: Self) {
        *self = self.union(rhs);
    }
}

/// Box and bounding sphere sharing one origin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoxSphereBounds {
    pub origin: Vec3,
    pub box_extent: Vec3,
    pub sphere_radius: f32,
}

impl BoxSphereBounds {
    /// Zero-sized bounds at the origin.
    pub const ZERO: Self = Self {
        origin: Vec3::ZERO,
        box_extent: Vec3::ZERO,
        sphere_radius: 0.0,
    };

    /// Bounds of a box; an empty box gives [`BoxSphereBounds::ZERO`].
    pub fn from_aabb(aabb: &Aabb) -> Self {
        if !aabb.is_valid() {
            return Self::ZERO;
        }
        let box_extent = aabb.extent();
        Self {
            origin: aabb.center(),
            box_extent,
            sphere_radius: box_extent.length(),
        }
    }

    pub fn to_aabb(&self) -> Aabb {
        Aabb::new(self.origin - self.box_extent, self.origin + self.box_extent)
    }

    /// Bounds after an affine transform.
    ///
    /// The extent is re-projected onto the world axes and the radius grows by
    /// the largest axis scale.
    pub fn transform_by(&self, matrix: &Mat4) -> Self {
        let x = matrix.x_axis.truncate();
        let y = matrix.y_axis.truncate();
        let z = matrix.z_axis.truncate();

        let box_extent =
            x.abs() * self.box_extent.x + y.abs() * self.box_extent.y + z.abs() * self.box_extent.z;
        let max_scale = x.length().max(y.length()).max(z.length());

        Self {
            origin: matrix.transform_point3(self.origin),
            box_extent,
            sphere_radius: self.sphere_radius * max_scale,
        }
    }

    /// Scale extent and radius around the origin.
    pub fn scaled(mut self, scale: f32) -> Self {
        self.box_extent *= scale;
        self.sphere_radius *= scale;
        self
    }
}

impl Default for BoxSphereBounds {
    fn default() -> Self {
        Self::ZERO
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_box() -> Aabb {
        Aabb::new(Vec3::splat(-0.5), Vec3::splat(0.5))
    }

    #[test]
    fn empty_box_is_identity_for_union() {
        let b = unit_box();
        assert_eq!(Aabb::EMPTY.union(b), b);
        assert_eq!(b.union(Aabb::EMPTY), b);
        assert!(!Aabb::EMPTY.union(Aabb::EMPTY).is_valid());
    }

    #[test]
    fn union_encloses_both() {
        let a = unit_box();
        let b = Aabb::new(Vec3::new(2.0, 0.0, 0.0), Vec3::new(3.0, 1.0, 1.0));
        let u = a + b;
        assert!(u.contains(&a));
        assert!(u.contains(&b));
        assert_eq!(u.min, Vec3::splat(-0.5));
        assert_eq!(u.max, Vec3::new(3.0, 1.0, 1.0));
    }

    #[test]
    fn transform_by_translation() {
        let moved = unit_box().transform_by(&Mat4::from_translation(Vec3::new(10.0, 0.0, 0.0)));
        assert_eq!(moved.min, Vec3::new(9.5, -0.5, -0.5));
        assert_eq!(moved.max, Vec3::new(10.5, 0.5, 0.5));
    }

    #[test]
    fn transform_by_keeps_empty() {
        let moved = Aabb::EMPTY.transform_by(&Mat4::from_scale(Vec3::splat(2.0)));
        assert!(!moved.is_valid());
    }

    #[test]
    fn box_sphere_from_empty_is_zero() {
        assert_eq!(BoxSphereBounds::from_aabb(&Aabb::EMPTY), BoxSphereBounds::ZERO);
        assert_eq!(BoxSphereBounds::ZERO.to_aabb(), Aabb::ZERO);
    }

    #[test]
    fn box_sphere_transform_and_scale() {
        let bounds = BoxSphereBounds::from_aabb(&unit_box());
        assert_eq!(bounds.box_extent, Vec3::splat(0.5));

        let world = bounds.transform_by(&Mat4::from_scale_rotation_translation(
            Vec3::splat(2.0),
            glam::Quat::IDENTITY,
            Vec3::new(0.0, 5.0, 0.0),
        ));
        assert_eq!(world.origin, Vec3::new(0.0, 5.0, 0.0));
        assert_eq!(world.box_extent, Vec3::splat(1.0));
        assert!((world.sphere_radius - bounds.sphere_radius * 2.0).abs() < 1e-5);

        let scaled = world.scaled(1.5);
        assert_eq!(scaled.box_extent, Vec3::splat(1.5));
    }
}
