#[cfg(feature = "bevy_reflect")]
use bevy_reflect::prelude::*;

/// Tuning constants for [`Floors`](crate::Floors) queries.
///
/// The defaults are in world units of typical level content, where a character is
/// roughly 64 units tall. Scale every distance together if your world uses meters.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serialize", serde(default))]
#[cfg_attr(feature = "bevy_reflect", derive(Reflect))]
#[cfg_attr(
    all(feature = "serialize", feature = "bevy_reflect"),
    reflect(Serialize, Deserialize)
)]
pub struct FloorsConfig {
    /// Upper bound on the length of a spline tangent handle. `[Units: wu]`
    ///
    /// Handles are also capped at a quarter of their segment's length, so short segments
    /// never overshoot.
    pub smoothness: f32,

    /// How far in-mesh walk points stay from the ends of the edge they cross. `[Units: wu]`
    ///
    /// Edges shorter than twice this value are crossed at their midpoint.
    pub edge_padding: f32,

    /// Half-height of the vertical probe used to drop a floor position that has no triangle
    /// onto its floor. `[Units: wu]`
    pub probe_height: f32,

    /// How far route-optimizer probes are extended past their target. `[Units: wu]`
    pub probe_extension: f32,

    /// Tolerance of plane intersection and side tests. `[Units: wu]`
    pub plane_epsilon: f32,

    /// Positions closer than this are considered to coincide. `[Units: wu]`
    pub arrival_epsilon: f32,

    /// Consecutive optimized steps closer than this are merged. `[Units: wu]`
    pub duplicate_epsilon: f32,

    /// How path costs are accumulated by the planner and the floor walker.
    pub cost_metric: CostMetric,
}

impl Default for FloorsConfig {
    fn default() -> Self {
        Self {
            smoothness: 32.0,
            edge_padding: 8.0,
            probe_height: 16.0,
            probe_extension: 16384.0,
            plane_epsilon: 0.01,
            arrival_epsilon: 0.1,
            duplicate_epsilon: 1.0,
            cost_metric: CostMetric::default(),
        }
    }
}

/// Cost of a path made of straight segments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "bevy_reflect", derive(Reflect))]
pub enum CostMetric {
    /// Sum of squared segment lengths.
    ///
    /// Penalizes long hops much more than many short ones, so it is not the path length.
    /// Kept as the default because existing content was tuned against it.
    #[default]
    SquaredSegments,
    /// Sum of segment lengths.
    Euclidean,
}

impl CostMetric {
    /// Cost of one segment from `a` to `b`.
    #[inline]
    pub fn segment(self, a: glam::Vec3, b: glam::Vec3) -> f32 {
        match self {
            CostMetric::SquaredSegments => a.distance_squared(b),
            CostMetric::Euclidean => a.distance(b),
        }
    }
}
