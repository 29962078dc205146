//! Traversal inside a single floor: the straight-line march used when nothing is in the way,
//! and the triangle-by-triangle search used when something is.

use glam::Vec3;

use crate::{
    Floors,
    bits::BitSet,
    ids::{ConnectionId, EdgeIndex, FloorId, TriIndex, WaypointId},
    position::FloorPosition,
};

/// A crossing of a waypoint connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct Hop {
    /// The connection being crossed.
    pub connection: ConnectionId,
    /// The waypoint the hop leaves from.
    pub from: WaypointId,
    /// The waypoint the hop arrives at.
    pub to: WaypointId,
    /// The floor of `to`, if any.
    pub to_floor: Option<FloorId>,
}

/// One vertex of a discrete route, before curve fitting.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct WalkStep {
    /// World position of the vertex. For a hop this is the position of [`Hop::from`].
    pub pos: Vec3,
    /// The floor the vertex lies on.
    pub floor: Option<FloorId>,
    /// The floor-local triangle the vertex lies on, or was walked into.
    pub tri: Option<TriIndex>,
    /// The waypoint standing at this vertex, if any.
    pub waypoint: Option<WaypointId>,
    /// Set when the step crosses a waypoint connection instead of walking.
    pub hop: Option<Hop>,
    /// The floor's surface plane changes at this vertex. Such vertices are never smoothed away.
    pub slope_change: bool,
}

impl WalkStep {
    /// A walking vertex on `floor`.
    pub fn on_floor(pos: Vec3, floor: FloorId, tri: TriIndex, slope_change: bool) -> Self {
        Self {
            pos,
            floor: Some(floor),
            tri: Some(tri),
            waypoint: None,
            hop: None,
            slope_change,
        }
    }

    /// A vertex standing at `position`.
    pub fn at(position: &FloorPosition) -> Self {
        Self {
            pos: position.pos,
            floor: position.floor,
            tri: position.tri,
            waypoint: position.waypoint,
            hop: None,
            slope_change: false,
        }
    }

    /// Whether this step crosses a connection.
    #[inline]
    pub fn is_hop(&self) -> bool {
        self.hop.is_some()
    }

    fn position(&self) -> FloorPosition {
        FloorPosition {
            pos: self.pos,
            floor: self.floor,
            tri: self.tri,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct SortedEdge {
    distance: f32,
    edge: EdgeIndex,
}

#[derive(Debug)]
struct WalkFrame {
    tri: u32,
    pos: Vec3,
    cost: f32,
    edges: [SortedEdge; 3],
    len: usize,
    next: usize,
}

impl Floors {
    /// Marches the straight line from `start` to `end` across the triangles of their floor.
    ///
    /// Both positions must be on the same floor with their triangles resolved. Returns the
    /// start, every point where the surface plane changes, and the end. Returns `None` if
    /// the line leaves the floor before reaching `end`'s triangle.
    pub fn find_direct_route(
        &self,
        start: &FloorPosition,
        end: &FloorPosition,
    ) -> Option<Vec<WalkStep>> {
        let (floor_id, start_tri, end_tri) = self.same_floor_tris(start, end)?;
        let floor = self.mesh.floor(floor_id);
        let epsilon = self.config.plane_epsilon;
        let end_global = floor.global_tri(end_tri);

        let mut route = vec![WalkStep {
            waypoint: start.waypoint,
            ..WalkStep::on_floor(start.pos, floor_id, start_tri, false)
        }];
        let mut cur_tri = floor.global_tri(start_tri);
        let mut cur = start.pos;
        let mut crossed: Option<EdgeIndex> = None;

        // A straight line visits each triangle at most once.
        for _ in 0..=floor.num_tris {
            if cur_tri == end_global {
                route.push(WalkStep {
                    waypoint: end.waypoint,
                    ..WalkStep::on_floor(end.pos, floor_id, end_tri, false)
                });
                return Some(route);
            }

            let tri = &self.mesh.tris[cur_tri as usize];
            let mut exit: Option<(f32, EdgeIndex)> = None;
            for &edge in &tri.edges {
                if Some(edge) == crossed {
                    continue;
                }
                let plane = self.mesh.edge_plane_facing(edge, cur_tri);
                // A goal on the edge plane still counts as across it.
                let d_end = plane.distance(end.pos);
                if d_end > epsilon {
                    continue;
                }
                let d_cur = plane.distance(cur).max(0.0);
                let denom = d_cur - d_end;
                if denom <= 0.0 {
                    continue;
                }
                let t = d_cur / denom;
                if exit.is_none_or(|(best, _)| t < best) {
                    exit = Some((t, edge));
                }
            }
            let (t, edge) = exit?;

            let next_tri = self.mesh.edge(edge).other_tri(cur_tri)?;
            let surface = self.mesh.plane(tri.plane);
            let crossing = surface.snap_vertical(cur + (end.pos - cur) * t);
            let next_plane = self.mesh.tris[next_tri as usize].plane;
            if next_plane != tri.plane {
                route.push(WalkStep::on_floor(
                    crossing,
                    floor_id,
                    floor.local_tri(next_tri),
                    true,
                ));
            }

            crossed = Some(edge);
            cur_tri = next_tri;
            cur = crossing;
        }

        tracing::warn!(floor = %floor_id, "Direct route did not converge");
        None
    }

    /// Finds a walking route between two positions on the same floor.
    ///
    /// Tries [`Self::find_direct_route`] first and returns its result untouched if it succeeds.
    /// Otherwise searches the triangle adjacency depth-first, crossing edges near the goal first,
    /// and returns the cheapest route found after [`Self::optimize_route`].
    pub fn walk_floor(&self, start: &FloorPosition, end: &FloorPosition) -> Option<Vec<WalkStep>> {
        if let Some(route) = self.find_direct_route(start, end) {
            return Some(route);
        }
        let (floor_id, start_tri, end_tri) = self.same_floor_tris(start, end)?;
        let floor = self.mesh.floor(floor_id);
        let metric = self.config.cost_metric;
        let end_global = floor.global_tri(end_tri);
        let end_step = WalkStep {
            waypoint: end.waypoint,
            ..WalkStep::on_floor(end.pos, floor_id, end_tri, false)
        };

        let mut visited = BitSet::with_len(floor.num_tris as usize);
        let mut path = vec![WalkStep {
            waypoint: start.waypoint,
            ..WalkStep::on_floor(start.pos, floor_id, start_tri, false)
        }];
        let mut frames = vec![self.walk_frame(
            floor.global_tri(start_tri),
            start.pos,
            0.0,
            None,
            end.pos,
        )];
        visited.insert(start_tri.index());

        let mut best: Option<Vec<WalkStep>> = None;
        let mut best_cost = f32::INFINITY;

        while let Some(frame) = frames.last_mut() {
            if frame.next >= frame.len {
                visited.remove(floor.local_tri(frame.tri).index());
                frames.pop();
                path.pop();
                continue;
            }
            let edge = frame.edges[frame.next].edge;
            frame.next += 1;
            let (tri, pos, cost) = (frame.tri, frame.pos, frame.cost);

            let Some(next_tri) = self.mesh.edge(edge).other_tri(tri) else {
                continue;
            };
            let local = floor.local_tri(next_tri);
            if visited.contains(local.index()) {
                continue;
            }

            let point = self.find_edge_point(pos, edge);
            let cost = cost + metric.segment(pos, point);
            let remaining = metric.segment(point, end.pos);
            if cost + remaining >= best_cost {
                continue;
            }

            let slope_change =
                self.mesh.tris[tri as usize].plane != self.mesh.tris[next_tri as usize].plane;
            let step = WalkStep::on_floor(point, floor_id, local, slope_change);

            if next_tri == end_global {
                best_cost = cost + remaining;
                let mut route = path.clone();
                route.push(step);
                route.push(end_step);
                best = Some(route);
                continue;
            }

            visited.insert(local.index());
            path.push(step);
            frames.push(self.walk_frame(next_tri, point, cost, Some(edge), end.pos));
        }

        let Some(route) = best else {
            tracing::debug!(
                floor = %floor_id,
                "No walking route between triangles {start_tri} and {end_tri}"
            );
            return None;
        };
        Some(self.optimize_route(route))
    }

    /// The point where a walker at `pos` should cross `edge`: `pos` projected onto the edge,
    /// kept at least [`edge_padding`](crate::FloorsConfig::edge_padding) from either end.
    pub fn find_edge_point(&self, pos: Vec3, edge: EdgeIndex) -> Vec3 {
        let edge = self.mesh.edge(edge);
        let pad = self.config.edge_padding;
        let [dist0, dist1] = edge.dist;

        let mut dist = edge.vec.dot(pos).clamp(dist0 + pad, (dist1 - pad).max(dist0 + pad));
        if dist0 + pad > dist1 - pad {
            dist = (dist0 + dist1) * 0.5;
        }
        self.mesh.vertex(edge.verts[0]) + edge.vec * (dist - dist0)
    }

    fn walk_frame(
        &self,
        tri: u32,
        pos: Vec3,
        cost: f32,
        crossed: Option<EdgeIndex>,
        goal: Vec3,
    ) -> WalkFrame {
        let mut edges = [SortedEdge {
            distance: f32::INFINITY,
            edge: EdgeIndex(0),
        }; 3];
        let mut len = 0;
        for &edge in &self.mesh.tris[tri as usize].edges {
            let record = self.mesh.edge(edge);
            if Some(edge) == crossed || record.is_boundary() {
                continue;
            }
            let [a, b] = record.verts.map(|v| self.mesh.vertex(v));
            edges[len] = SortedEdge {
                distance: ((a + b) * 0.5).distance_squared(goal),
                edge,
            };
            len += 1;
        }
        edges[..len].sort_by(|a, b| a.distance.total_cmp(&b.distance));
        WalkFrame {
            tri,
            pos,
            cost,
            edges,
            len,
            next: 0,
        }
    }

    fn same_floor_tris(
        &self,
        start: &FloorPosition,
        end: &FloorPosition,
    ) -> Option<(FloorId, TriIndex, TriIndex)> {
        let floor = start.floor.filter(|f| Some(*f) == end.floor)?;
        let record = self.mesh.floors.get(floor.index())?;
        let (start_tri, end_tri) = (start.tri?, end.tri?);
        if start_tri.0 >= record.num_tris || end_tri.0 >= record.num_tris {
            return None;
        }
        Some((floor, start_tri, end_tri))
    }
}

impl From<&WalkStep> for FloorPosition {
    fn from(step: &WalkStep) -> Self {
        step.position()
    }
}
