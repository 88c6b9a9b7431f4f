use glam::{Mat4, Vec3};

/// Axis-aligned bounding box.
///
/// The default box is inverted (`min = +inf`, `max = -inf`) so that the first
/// `grow` call establishes real extents.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingBox {
    pub min: Vec3,
    pub max: Vec3,
}

impl Default for BoundingBox {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl BoundingBox {
    pub const EMPTY: Self = Self {
        min: Vec3::splat(f32::INFINITY),
        max: Vec3::splat(f32::NEG_INFINITY),
    };

    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Grow to include a point.
    #[inline]
    pub fn grow(&mut self, point: Vec3) {
        self.min = self.min.min(point);
        self.max = self.max.max(point);
    }

    /// Grow to include another box.
    #[inline]
    pub fn grow_box(&mut self, other: &BoundingBox) {
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
    }

    pub fn is_empty(&self) -> bool {
        self.min.cmpgt(self.max).any()
    }

    pub fn extent(&self) -> Vec3 {
        if self.is_empty() {
            Vec3::ZERO
        } else {
            self.max - self.min
        }
    }

    /// Half the surface area: `xy + yz + zx`.
    ///
    /// The factor of two is left out on purpose. The value is only ever
    /// compared against other surface areas, and split costs tie-break on it.
    /// An empty box has no area.
    #[inline]
    pub fn surface_area(&self) -> f32 {
        let e = self.extent();
        e.x * e.y + e.y * e.z + e.z * e.x
    }

    pub fn volume(&self) -> f32 {
        let e = self.extent();
        e.x * e.y * e.z
    }

    pub fn contains(&self, point: Vec3) -> bool {
        point.cmpge(self.min).all() && point.cmple(self.max).all()
    }

    pub fn contains_box(&self, other: &BoundingBox) -> bool {
        other.is_empty() || (self.contains(other.min) && self.contains(other.max))
    }

    /// Box enclosing the eight corners of this box after `transform`.
    pub fn transformed(&self, transform: &Mat4) -> BoundingBox {
        if self.is_empty() {
            return *self;
        }
        let mut out = BoundingBox::EMPTY;
        for corner in 0..8 {
            let point = Vec3::new(
                if corner & 1 == 0 { self.min.x } else { self.max.x },
                if corner & 2 == 0 { self.min.y } else { self.max.y },
                if corner & 4 == 0 { self.min.z } else { self.max.z },
            );
            out.grow(transform.transform_point3(point));
        }
        out
    }
}
