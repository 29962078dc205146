use glam::Vec3;

/// A plane in Hessian normal form: every point `p` on the plane satisfies `normal.dot(p) == dist`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct Plane {
    /// The unit normal of the plane.
    pub normal: Vec3,
    /// Distance of the plane from the origin along [`Self::normal`].
    pub dist: f32,
}

/// Which side of a [`Plane`] a point lies on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    /// In the half-space the normal points into.
    Front,
    /// In the opposite half-space.
    Back,
    /// Within epsilon of the plane.
    On,
}

impl Plane {
    /// Creates a plane from a normal and a distance.
    #[inline]
    pub fn new(normal: Vec3, dist: f32) -> Self {
        Self { normal, dist }
    }

    /// Creates the plane with the given normal passing through `point`.
    #[inline]
    pub fn from_point_normal(point: Vec3, normal: Vec3) -> Self {
        Self {
            normal,
            dist: normal.dot(point),
        }
    }

    /// Signed distance of `point` from the plane.
    #[inline]
    pub fn distance(&self, point: Vec3) -> f32 {
        self.normal.dot(point) - self.dist
    }

    /// Returns the plane facing the opposite way.
    #[inline]
    pub fn flipped(&self) -> Self {
        Self {
            normal: -self.normal,
            dist: -self.dist,
        }
    }

    /// Classifies `point` against the plane.
    #[inline]
    pub fn side(&self, point: Vec3, epsilon: f32) -> Side {
        let d = self.distance(point);
        if d > epsilon {
            Side::Front
        } else if d < -epsilon {
            Side::Back
        } else {
            Side::On
        }
    }

    /// Intersects the segment `start..end` with the plane.
    ///
    /// Returns `None` if both endpoints lie strictly on the same side (further than `epsilon`),
    /// or if the segment runs parallel to the plane.
    pub fn intersect_segment(&self, start: Vec3, end: Vec3, epsilon: f32) -> Option<Vec3> {
        let d0 = self.distance(start);
        let d1 = self.distance(end);
        if (d0 > epsilon && d1 > epsilon) || (d0 < -epsilon && d1 < -epsilon) {
            return None;
        }
        let denom = d0 - d1;
        if denom.abs() <= f32::EPSILON {
            return None;
        }
        let t = (d0 / denom).clamp(0.0, 1.0);
        Some(start + (end - start) * t)
    }

    /// Height of the plane above the XY point `point`, if the plane is not vertical.
    #[inline]
    pub fn height_at(&self, point: Vec3) -> Option<f32> {
        if self.normal.z.abs() <= f32::EPSILON {
            return None;
        }
        Some((self.dist - self.normal.x * point.x - self.normal.y * point.y) / self.normal.z)
    }

    /// Moves `point` vertically onto the plane. Vertical planes leave the point untouched.
    #[inline]
    pub fn snap_vertical(&self, point: Vec3) -> Vec3 {
        match self.height_at(point) {
            Some(z) => Vec3::new(point.x, point.y, z),
            None => point,
        }
    }

    /// Approximate equality, used when deduplicating triangle planes.
    #[inline]
    pub fn nearly_equals(&self, other: &Plane, normal_epsilon: f32, dist_epsilon: f32) -> bool {
        self.normal.abs_diff_eq(other.normal, normal_epsilon)
            && (self.dist - other.dist).abs() <= dist_epsilon
    }
}

pub(crate) trait TriangleVertices {
    /// The unit normal of the triangle, or zero if degenerate.
    fn normal(&self) -> Vec3;
}

impl TriangleVertices for [Vec3; 3] {
    #[inline]
    fn normal(&self) -> Vec3 {
        let ab = self[1] - self[0];
        let ac = self[2] - self[0];
        ab.cross(ac).normalize_or_zero()
    }
}

/// Normalizes the XY part of `v`, dropping Z. Returns zero for vertical or zero vectors.
#[inline]
pub(crate) fn horizontal_dir(v: Vec3) -> Vec3 {
    Vec3::new(v.x, v.y, 0.0).normalize_or_zero()
}
