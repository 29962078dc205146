use glam::Vec3;

use crate::{
    Floors,
    floor_move::{MoveFlags, Route, Step},
    math::horizontal_dir,
    spline::{CachedSpline, CubicBezier},
    walker::{Hop, WalkStep},
};

impl Floors {
    /// Fits cubic Bézier segments through a discrete route.
    ///
    /// Walking segments get handles that keep the path tangent-continuous in X/Y at every
    /// joint; their vertical handle component follows the segment itself, so the curve never
    /// floats above or sinks below a slope. Hops use the handles stored on their connection.
    pub fn generate_floor_move(&self, route: &[WalkStep]) -> Route {
        let mut out = Route::default();
        let smoothness = self.config.smoothness;

        for (i, cur) in route.iter().enumerate() {
            if let Some(hop) = cur.hop {
                out.steps.push(self.hop_step(cur, &hop));
                continue;
            }
            let Some(next) = route.get(i + 1) else {
                break;
            };
            // The walk ends where the hop begins.
            if next.is_hop() {
                continue;
            }

            let delta = next.pos - cur.pos;
            let next_len = delta.length();
            let v_next = delta.normalize_or_zero();
            let len = (next_len / 4.0).min(smoothness);

            let dir_in = match i.checked_sub(1).map(|p| &route[p]) {
                Some(prev) => {
                    let incoming = match prev.hop {
                        Some(hop) => self.hop_tangent(&hop, 1),
                        None => (cur.pos - prev.pos).normalize_or_zero() + v_next,
                    };
                    blend(incoming, v_next)
                }
                None => v_next,
            };
            let dir_out = match route.get(i + 2) {
                Some(after) => {
                    let outgoing = match after.hop {
                        Some(hop) => self.hop_tangent(&hop, 0),
                        None => (after.pos - next.pos).normalize_or_zero() + v_next,
                    };
                    blend(outgoing, v_next)
                }
                None => v_next,
            };

            let spline = CubicBezier::new(
                cur.pos,
                cur.pos + dir_in * len,
                next.pos - dir_out * len,
                next.pos,
            );
            out.steps.push(Step {
                path: CachedSpline::new(&spline),
                spline,
                waypoints: [cur.waypoint, next.waypoint],
                floors: [cur.floor, next.floor],
                connection: None,
                flags: MoveFlags::AUTO_FACE | MoveFlags::INTERRUPTABLE,
                events: [None, None],
            });
        }
        out
    }

    fn hop_step(&self, cur: &WalkStep, hop: &Hop) -> Step {
        let connection = self.mesh.connection(hop.connection);
        let dir = connection.slot_of(hop.from).unwrap_or(0);
        let target = self.mesh.waypoint(hop.to).pos;
        let spline = CubicBezier::new(
            cur.pos,
            connection.ctrls[dir],
            connection.ctrls[1 - dir],
            target,
        );
        let events = connection
            .commands_from(hop.from)
            .map(|cmd| cmd.and_then(|s| self.mesh.string(s)).map(str::to_owned));
        Step {
            path: CachedSpline::new(&spline),
            spline,
            waypoints: [Some(hop.from), Some(hop.to)],
            floors: [cur.floor, hop.to_floor],
            connection: Some(hop.connection),
            flags: connection.flags.into(),
            events,
        }
    }

    /// Direction of travel along a hop at its start (`end == 0`) or its end (`end == 1`).
    fn hop_tangent(&self, hop: &Hop, end: usize) -> Vec3 {
        let connection = self.mesh.connection(hop.connection);
        let dir = connection.slot_of(hop.from).unwrap_or(0);
        let from = self.mesh.waypoint(hop.from).pos;
        let to = self.mesh.waypoint(hop.to).pos;
        let tangent = if end == 0 {
            connection.ctrls[dir] - from
        } else {
            to - connection.ctrls[1 - dir]
        };
        if horizontal_dir(tangent) == Vec3::ZERO {
            to - from
        } else {
            tangent
        }
    }
}

/// Unit horizontal direction of `xy`, with the vertical slope of `segment` restored.
fn blend(xy: Vec3, segment: Vec3) -> Vec3 {
    let mut dir = horizontal_dir(xy);
    if dir == Vec3::ZERO {
        dir = horizontal_dir(segment);
    }
    dir.z = segment.z;
    dir
}
