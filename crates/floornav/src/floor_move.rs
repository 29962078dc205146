use glam::Vec3;

use crate::{
    ids::{ConnectionId, FloorId, WaypointId},
    mesh::ConnectionFlags,
    spline::{CachedSpline, CubicBezier},
};

bitflags::bitflags! {
    /// How a mover should behave while following a [`Step`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
    #[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
    #[repr(transparent)]
    pub struct MoveFlags: u32 {
        /// Face along the path.
        const AUTO_FACE = 0x01;
        /// The step may be interrupted before it completes.
        const INTERRUPTABLE = 0x02;
        /// Pitch along the path.
        const AUTO_PITCH = 0x04;
    }
}

impl From<ConnectionFlags> for MoveFlags {
    fn from(flags: ConnectionFlags) -> Self {
        let mut out = MoveFlags::empty();
        out.set(MoveFlags::AUTO_FACE, flags.contains(ConnectionFlags::AUTO_FACE));
        out.set(MoveFlags::INTERRUPTABLE, flags.contains(ConnectionFlags::INTERRUPTABLE));
        out.set(MoveFlags::AUTO_PITCH, flags.contains(ConnectionFlags::AUTO_PITCH));
        out
    }
}

/// One curve segment of a [`FloorMove`].
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct Step {
    /// The curve.
    pub spline: CubicBezier,
    /// The curve sampled for arc-length lookups.
    pub path: CachedSpline,
    /// Waypoints at the start and end of the step. Walking steps usually have none.
    pub waypoints: [Option<WaypointId>; 2],
    /// Floors at the start and end of the step.
    pub floors: [Option<FloorId>; 2],
    /// The connection this step crosses, if any.
    pub connection: Option<ConnectionId>,
    /// Mover behavior.
    pub flags: MoveFlags,
    /// Commands fired on entering and on leaving the step.
    pub events: [Option<String>; 2],
}

impl Step {
    /// Arc length of the step.
    #[inline]
    pub fn length(&self) -> f32 {
        self.path.length
    }
}

/// The ordered steps of a [`FloorMove`].
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct Route {
    /// The steps, in travel order. Each step starts where the previous one ends.
    pub steps: Vec<Step>,
}

/// A smooth path produced by [`Floors::create_move`](crate::Floors::create_move).
///
/// Self-contained: it holds no reference into the [`Floors`](crate::Floors) it came from.
/// Following the path is up to the caller.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct FloorMove {
    route: Route,
}

impl FloorMove {
    /// Wraps a route.
    pub fn new(route: Route) -> Self {
        Self { route }
    }

    /// The route.
    #[inline]
    pub fn route(&self) -> &Route {
        &self.route
    }

    /// The steps of the route.
    #[inline]
    pub fn steps(&self) -> &[Step] {
        &self.route.steps
    }

    /// Total arc length.
    pub fn length(&self) -> f32 {
        self.route.steps.iter().map(Step::length).sum()
    }

    /// Where the path starts.
    pub fn start(&self) -> Option<Vec3> {
        self.route.steps.first().map(|s| s.spline.start())
    }

    /// Where the path ends.
    pub fn end(&self) -> Option<Vec3> {
        self.route.steps.last().map(|s| s.spline.end())
    }

    /// Position at arc length `distance` from the start, clamped to the path.
    pub fn eval(&self, distance: f32) -> Option<Vec3> {
        let mut remaining = distance.max(0.0);
        for step in &self.route.steps {
            if remaining <= step.length() {
                return Some(step.path.eval_at_distance(remaining));
            }
            remaining -= step.length();
        }
        self.end()
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    fn straight(a: Vec3, b: Vec3) -> Step {
        let spline = CubicBezier::new(a, a.lerp(b, 1.0 / 3.0), a.lerp(b, 2.0 / 3.0), b);
        Step {
            path: CachedSpline::new(&spline),
            spline,
            ..Default::default()
        }
    }

    #[test]
    fn eval_walks_across_steps() {
        let a = Vec3::ZERO;
        let b = Vec3::new(10.0, 0.0, 0.0);
        let c = Vec3::new(10.0, 20.0, 0.0);
        let moved = FloorMove::new(Route {
            steps: vec![straight(a, b), straight(b, c)],
        });
        assert_relative_eq!(moved.length(), 30.0, epsilon = 1e-4);
        let p = moved.eval(15.0).unwrap();
        assert_relative_eq!(p.x, 10.0, epsilon = 1e-3);
        assert_relative_eq!(p.y, 5.0, epsilon = 1e-3);
        assert_eq!(moved.eval(100.0), Some(c));
        assert_eq!(moved.eval(-1.0), Some(a));
    }

    #[test]
    fn connection_flags_map_to_move_flags() {
        let flags = MoveFlags::from(
            ConnectionFlags::A_TO_B | ConnectionFlags::AUTO_PITCH | ConnectionFlags::INTERRUPTABLE,
        );
        assert_eq!(flags, MoveFlags::AUTO_PITCH | MoveFlags::INTERRUPTABLE);
    }

    #[test]
    fn empty_move_has_no_endpoints() {
        let moved = FloorMove::default();
        assert_eq!(moved.start(), None);
        assert_eq!(moved.eval(0.0), None);
    }
}
