use glam::Vec3;

/// Number of samples kept by a [`CachedSpline`].
pub const SPLINE_SAMPLES: usize = 8;

/// A cubic Bézier curve given by its four control points.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct CubicBezier {
    /// `[start, start handle, end handle, end]`.
    pub points: [Vec3; 4],
}

impl CubicBezier {
    /// Creates a curve from its control points.
    #[inline]
    pub fn new(start: Vec3, ctrl0: Vec3, ctrl1: Vec3, end: Vec3) -> Self {
        Self {
            points: [start, ctrl0, ctrl1, end],
        }
    }

    /// Position at `t` in `[0, 1]`.
    ///
    /// Evaluated in Bernstein form, so `eval(0.0)` and `eval(1.0)` reproduce the endpoints exactly.
    pub fn eval(&self, t: f32) -> Vec3 {
        let [p0, p1, p2, p3] = self.points;
        let s = 1.0 - t;
        let b0 = s * s * s;
        let b1 = 3.0 * s * s * t;
        let b2 = 3.0 * s * t * t;
        let b3 = t * t * t;
        p0 * b0 + p1 * b1 + p2 * b2 + p3 * b3
    }

    /// First derivative at `t`.
    pub fn tangent(&self, t: f32) -> Vec3 {
        let [p0, p1, p2, p3] = self.points;
        let s = 1.0 - t;
        (p1 - p0) * (3.0 * s * s) + (p2 - p1) * (6.0 * s * t) + (p3 - p2) * (3.0 * t * t)
    }

    /// The start point.
    #[inline]
    pub fn start(&self) -> Vec3 {
        self.points[0]
    }

    /// The end point.
    #[inline]
    pub fn end(&self) -> Vec3 {
        self.points[3]
    }
}

/// One sample of a [`CachedSpline`].
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct SplinePoint {
    /// Position of the sample.
    pub pos: Vec3,
    /// Length of the chord from this sample to the next one; zero for the last sample.
    pub length: f32,
    /// Distance along the polyline from the first sample.
    pub offset: f32,
}

/// A curve sampled into a short polyline with cumulative arc lengths.
///
/// Samples are spaced evenly in `t`; the first and last are the curve's endpoints.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct CachedSpline {
    /// The samples, at `t = i / (SPLINE_SAMPLES - 1)`.
    pub points: [SplinePoint; SPLINE_SAMPLES],
    /// Total polyline length.
    pub length: f32,
}

impl CachedSpline {
    /// Samples `curve`.
    pub fn new(curve: &CubicBezier) -> Self {
        let mut points = [SplinePoint::default(); SPLINE_SAMPLES];
        let last = (SPLINE_SAMPLES - 1) as f32;
        for (i, point) in points.iter_mut().enumerate() {
            point.pos = curve.eval(i as f32 / last);
        }
        points[0].pos = curve.start();
        points[SPLINE_SAMPLES - 1].pos = curve.end();

        let mut offset = 0.0;
        for i in 0..SPLINE_SAMPLES {
            points[i].offset = offset;
            if i + 1 < SPLINE_SAMPLES {
                points[i].length = points[i].pos.distance(points[i + 1].pos);
                offset += points[i].length;
            }
        }
        Self {
            points,
            length: offset,
        }
    }

    /// Position at `t` in `[0, 1]`, interpolated linearly between samples.
    pub fn eval(&self, t: f32) -> Vec3 {
        let scaled = t.clamp(0.0, 1.0) * (SPLINE_SAMPLES - 1) as f32;
        let i = (scaled.floor() as usize).min(SPLINE_SAMPLES - 2);
        let frac = scaled - i as f32;
        self.points[i].pos.lerp(self.points[i + 1].pos, frac)
    }

    /// Position at arc length `distance` from the start, clamped to the spline.
    pub fn eval_at_distance(&self, distance: f32) -> Vec3 {
        if distance <= 0.0 {
            return self.start();
        }
        for pair in self.points.windows(2) {
            let [point, next] = [pair[0], pair[1]];
            if point.length > f32::EPSILON && distance <= point.offset + point.length {
                let frac = (distance - point.offset) / point.length;
                return point.pos.lerp(next.pos, frac);
            }
        }
        self.end()
    }

    /// The first sample.
    #[inline]
    pub fn start(&self) -> Vec3 {
        self.points[0].pos
    }

    /// The last sample.
    #[inline]
    pub fn end(&self) -> Vec3 {
        self.points[SPLINE_SAMPLES - 1].pos
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn endpoints_are_exact() {
        let curve = CubicBezier::new(
            Vec3::new(0.3, 1.7, -2.1),
            Vec3::new(5.0, 1.0, 0.0),
            Vec3::new(9.0, -3.0, 4.0),
            Vec3::new(12.9, 0.1, 3.3),
        );
        assert_eq!(curve.eval(0.0), curve.start());
        assert_eq!(curve.eval(1.0), curve.end());

        let cached = CachedSpline::new(&curve);
        assert_eq!(cached.start(), curve.start());
        assert_eq!(cached.end(), curve.end());
        assert_eq!(cached.eval(1.0), curve.end());
    }

    #[test]
    fn straight_curve_length_matches_chord() {
        let a = Vec3::ZERO;
        let b = Vec3::new(30.0, 0.0, 0.0);
        let curve = CubicBezier::new(a, a.lerp(b, 1.0 / 3.0), a.lerp(b, 2.0 / 3.0), b);
        let cached = CachedSpline::new(&curve);
        assert_relative_eq!(cached.length, 30.0, epsilon = 1e-4);
        assert_relative_eq!(cached.points[SPLINE_SAMPLES - 1].offset, 30.0, epsilon = 1e-4);
        assert_relative_eq!(cached.eval_at_distance(15.0).x, 15.0, epsilon = 1e-3);
    }

    #[test]
    fn tangent_at_ends_points_at_handles() {
        let curve = CubicBezier::new(Vec3::ZERO, Vec3::Y, Vec3::new(1.0, 2.0, 0.0), Vec3::X * 4.0);
        assert_eq!(curve.tangent(0.0), Vec3::Y * 3.0);
        assert_eq!(curve.tangent(1.0), (Vec3::X * 4.0 - Vec3::new(1.0, 2.0, 0.0)) * 3.0);
    }
}
