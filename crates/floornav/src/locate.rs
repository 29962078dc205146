use glam::Vec3;

use crate::{
    Floors,
    ids::FloorId,
    math::Side,
    position::FloorPosition,
};

impl Floors {
    /// Drops the segment `start..end` onto the nearest enabled floor.
    ///
    /// Every triangle of every enabled floor is tested; of all hits, the one closest to
    /// `start` wins. Returns `None` if the segment misses every enabled floor.
    pub fn clip_to_floor(&self, start: Vec3, end: Vec3) -> Option<FloorPosition> {
        let mut best = None;
        let mut best_dist = f32::INFINITY;
        for floor in (0..self.mesh.floors.len()).map(FloorId::from) {
            if !self.floor_enabled(floor) {
                continue;
            }
            if let Some(hit) = self.clip_floor(floor, start, end, &mut best_dist) {
                best = Some(hit);
            }
        }
        best
    }

    /// Like [`Self::clip_to_floor`], restricted to `floor` and ignoring its enable state.
    pub fn clip_to_floor_on(
        &self,
        floor: FloorId,
        start: Vec3,
        end: Vec3,
    ) -> Option<FloorPosition> {
        if floor.index() >= self.mesh.floors.len() {
            return None;
        }
        let mut best_dist = f32::INFINITY;
        self.clip_floor(floor, start, end, &mut best_dist)
    }

    fn clip_floor(
        &self,
        floor_id: FloorId,
        start: Vec3,
        end: Vec3,
        best_dist: &mut f32,
    ) -> Option<FloorPosition> {
        let epsilon = self.config.plane_epsilon;
        let floor = self.mesh.floor(floor_id);
        let mut best = None;

        for global in floor.tri_range() {
            let tri = &self.mesh.tris[global];
            let Some(hit) = self.mesh.plane(tri.plane).intersect_segment(start, end, epsilon) else {
                continue;
            };
            let dist = hit.distance_squared(start);
            if dist >= *best_dist {
                continue;
            }

            let inside = tri.edges.iter().all(|&edge| {
                let plane = self.mesh.edge_plane_facing(edge, global as u32);
                // Hits on the floor's rim must be clearly inside it.
                if self.mesh.edge(edge).is_boundary() {
                    plane.side(hit, epsilon) == Side::Front
                } else {
                    plane.side(hit, epsilon) != Side::Back
                }
            });
            if inside {
                *best_dist = dist;
                best = Some(FloorPosition::on_floor(
                    hit,
                    floor_id,
                    floor.local_tri(global as u32),
                ));
            }
        }
        best
    }
}
