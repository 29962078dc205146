use std::{collections::HashMap, sync::Arc};

use glam::Vec3;

use crate::{
    config::FloorsConfig,
    floor_move::FloorMove,
    ids::{FloorId, WaypointId},
    mesh::{FloorMesh, FloorMeshError},
    position::FloorPosition,
    walker::{Hop, WalkStep},
};

bitflags::bitflags! {
    /// Runtime state of a floor.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    #[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
    #[repr(transparent)]
    pub struct FloorState: u32 {
        /// The floor can be clipped to and walked on.
        const ENABLED = 0x01;
    }
}

bitflags::bitflags! {
    /// Runtime state of a waypoint.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    #[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
    #[repr(transparent)]
    pub struct WaypointState: u32 {
        /// Routes may pass through the waypoint.
        const ENABLED = 0x01;
    }
}

/// The navigation registry for one level.
///
/// Owns the immutable [`FloorMesh`] and the runtime enable state of its floors and waypoints,
/// and answers every query against them. Queries take `&self`; only the state setters need
/// `&mut self`.
#[derive(Debug, Clone)]
pub struct Floors {
    pub(crate) mesh: FloorMesh,
    pub(crate) config: FloorsConfig,
    floor_states: Vec<FloorState>,
    waypoint_states: Vec<WaypointState>,
    target_names: HashMap<String, Vec<WaypointId>>,
    user_ids: HashMap<String, Vec<WaypointId>>,
}

impl Floors {
    /// Loads `mesh` with the default configuration. Every floor and waypoint starts enabled.
    pub fn load(mesh: FloorMesh) -> Result<Self, FloorMeshError> {
        Self::with_config(mesh, FloorsConfig::default())
    }

    /// Loads `mesh` with the given configuration.
    pub fn with_config(mesh: FloorMesh, config: FloorsConfig) -> Result<Self, FloorMeshError> {
        mesh.validate()?;

        let mut target_names: HashMap<String, Vec<WaypointId>> = HashMap::new();
        let mut user_ids: HashMap<String, Vec<WaypointId>> = HashMap::new();
        for (index, waypoint) in mesh.waypoints.iter().enumerate() {
            let id = WaypointId::from(index);
            if let Some(name) = waypoint.target_name.and_then(|s| mesh.string(s)) {
                target_names.entry(name.to_owned()).or_default().push(id);
            }
            if let Some(user_id) = waypoint.user_id.and_then(|s| mesh.string(s)) {
                user_ids.entry(user_id.to_owned()).or_default().push(id);
            }
        }

        tracing::debug!(
            floors = mesh.floors.len(),
            waypoints = mesh.waypoints.len(),
            connections = mesh.connections.len(),
            "Loaded floors"
        );
        Ok(Self {
            floor_states: vec![FloorState::ENABLED; mesh.floors.len()],
            waypoint_states: vec![WaypointState::ENABLED; mesh.waypoints.len()],
            mesh,
            config,
            target_names,
            user_ids,
        })
    }

    /// The navigation data.
    #[inline]
    pub fn mesh(&self) -> &FloorMesh {
        &self.mesh
    }

    /// The tuning constants.
    #[inline]
    pub fn config(&self) -> &FloorsConfig {
        &self.config
    }

    /// Number of floors.
    #[inline]
    pub fn floor_count(&self) -> usize {
        self.mesh.floors.len()
    }

    /// Number of waypoints.
    #[inline]
    pub fn waypoint_count(&self) -> usize {
        self.mesh.waypoints.len()
    }

    /// Finds a floor by name.
    pub fn find_floor(&self, name: &str) -> Option<FloorId> {
        self.mesh
            .floors
            .iter()
            .position(|floor| self.mesh.string(floor.name) == Some(name))
            .map(FloorId::from)
    }

    /// The name of `floor`.
    pub fn floor_name(&self, floor: FloorId) -> Option<&str> {
        let record = self.mesh.floors.get(floor.index())?;
        self.mesh.string(record.name)
    }

    /// The state of `floor`. Unknown floors report no flags.
    pub fn floor_state(&self, floor: FloorId) -> FloorState {
        self.floor_states.get(floor.index()).copied().unwrap_or_default()
    }

    /// Replaces the state of `floor`. Unknown floors are ignored.
    pub fn set_floor_state(&mut self, floor: FloorId, state: FloorState) {
        if let Some(slot) = self.floor_states.get_mut(floor.index()) {
            *slot = state;
        }
    }

    /// The state of `waypoint`. Unknown waypoints report no flags.
    pub fn waypoint_state(&self, waypoint: WaypointId) -> WaypointState {
        self.waypoint_states
            .get(waypoint.index())
            .copied()
            .unwrap_or_default()
    }

    /// Replaces the state of `waypoint`. Unknown waypoints are ignored.
    pub fn set_waypoint_state(&mut self, waypoint: WaypointId, state: WaypointState) {
        if let Some(slot) = self.waypoint_states.get_mut(waypoint.index()) {
            *slot = state;
        }
    }

    /// The position of `waypoint`, including the floor triangle it stands on.
    pub fn waypoint_position(&self, waypoint: WaypointId) -> Option<FloorPosition> {
        let record = self.mesh.waypoints.get(waypoint.index())?;
        Some(FloorPosition {
            pos: record.pos,
            floor: record.floor,
            tri: record.tri,
            waypoint: Some(waypoint),
            next_waypoint: None,
        })
    }

    /// Waypoints with the given target name.
    pub fn waypoints_for_targetname(&self, name: &str) -> &[WaypointId] {
        self.target_names.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Waypoints with the given user id.
    pub fn waypoints_for_user_id(&self, user_id: &str) -> &[WaypointId] {
        self.user_ids.get(user_id).map(Vec::as_slice).unwrap_or(&[])
    }

    #[inline]
    pub(crate) fn floor_enabled(&self, floor: FloorId) -> bool {
        self.floor_state(floor).contains(FloorState::ENABLED)
    }

    #[inline]
    pub(crate) fn waypoint_enabled(&self, waypoint: WaypointId) -> bool {
        self.waypoint_state(waypoint).contains(WaypointState::ENABLED)
    }

    /// Plans and synthesizes a smooth move from `start` to `end`.
    ///
    /// Positions may stand on a waypoint or on a floor; a floor position without a triangle is
    /// dropped onto its floor first. Returns `None` when there is no route, which is a normal
    /// outcome. Moving to where you already are yields a single zero-length step.
    pub fn create_move(
        &self,
        start: &FloorPosition,
        end: &FloorPosition,
    ) -> Option<Arc<FloorMove>> {
        let route = self.walk(start, end)?;
        Some(Arc::new(FloorMove::new(self.generate_floor_move(&route))))
    }

    /// Like [`Self::create_move`], passing through every position of `positions` in order.
    ///
    /// Returns `None` if fewer than two positions are given or any leg has no route.
    pub fn create_move_seq(&self, positions: &[FloorPosition]) -> Option<Arc<FloorMove>> {
        if positions.len() < 2 {
            return None;
        }
        let mut route = Vec::new();
        for leg in positions.windows(2) {
            let walked = self.walk(&leg[0], &leg[1])?;
            self.append_walk(&mut route, walked);
        }
        Some(Arc::new(FloorMove::new(self.generate_floor_move(&route))))
    }

    /// Builds the discrete route from `start` to `end`: walked floor segments and connection
    /// hops, before curve fitting.
    pub fn walk(&self, start: &FloorPosition, end: &FloorPosition) -> Option<Vec<WalkStep>> {
        let start = self.resolve(start, "start")?;
        let end = self.resolve(end, "end")?;
        let Some(plan) = self.plan_move(&start, &end) else {
            tracing::debug!("No route from {:?} to {:?}", start.pos, end.pos);
            return None;
        };
        let arrival = self.config.arrival_epsilon;

        let mut route: Vec<WalkStep> = Vec::new();
        let mut current = start;
        for step in &plan.steps {
            let target = self.waypoint_position(step.waypoint)?;
            match step.connection {
                Some(connection) => {
                    let from = self.mesh.connection(connection).other(step.waypoint);
                    let origin = self.waypoint_position(from)?;
                    route.push(WalkStep {
                        hop: Some(Hop {
                            connection,
                            from,
                            to: step.waypoint,
                            to_floor: target.floor,
                        }),
                        ..WalkStep::at(&origin)
                    });
                }
                None if target.pos.abs_diff_eq(current.pos, arrival) => {}
                None => {
                    let walked = self.walk_floor(&current, &target)?;
                    self.append_walk(&mut route, walked);
                }
            }
            current = target;
        }

        if current.floor.is_some()
            && end.waypoint.is_none()
            && !end.pos.abs_diff_eq(current.pos, arrival)
        {
            let walked = self.walk_floor(&current, &end)?;
            self.append_walk(&mut route, walked);
        }

        if route.is_empty() {
            route = vec![WalkStep::at(&start), WalkStep::at(&end)];
        }
        Some(route)
    }

    /// Appends a walked segment, dropping its first step if it repeats the route's last one.
    fn append_walk(&self, route: &mut Vec<WalkStep>, walked: Vec<WalkStep>) {
        let mut walked = walked.into_iter().peekable();
        if let (Some(last), Some(first)) = (route.last(), walked.peek()) {
            if !last.is_hop() && last.pos.abs_diff_eq(first.pos, self.config.arrival_epsilon) {
                walked.next();
            }
        }
        route.extend(walked);
    }

    /// Fills in everything planning needs: the floor and triangle of a waypoint, or the
    /// triangle of a bare floor position.
    fn resolve(&self, position: &FloorPosition, what: &str) -> Option<FloorPosition> {
        if let Some(waypoint) = position.waypoint {
            if !self.waypoint_reachable(waypoint) {
                tracing::debug!("{what} waypoint {waypoint} is disabled or unknown");
                return None;
            }
            return self.waypoint_position(waypoint);
        }

        let Some(floor) = position.floor else {
            tracing::warn!("{what} position {:?} is not on a floor", position.pos);
            return None;
        };
        if !self.floor_enabled(floor) {
            tracing::debug!("{what} floor {floor} is disabled or unknown");
            return None;
        }
        match position.tri {
            Some(tri) if tri.0 < self.mesh.floor(floor).num_tris => Some(FloorPosition {
                waypoint: None,
                ..*position
            }),
            Some(tri) => {
                tracing::warn!("{what} triangle {tri} is not on floor {floor}");
                None
            }
            None => {
                let probe = Vec3::Z * self.config.probe_height;
                let clipped =
                    self.clip_to_floor_on(floor, position.pos + probe, position.pos - probe);
                if clipped.is_none() {
                    tracing::warn!("{what} position {:?} is outside floor {floor}", position.pos);
                }
                clipped
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{FloorMeshBuilder, WaypointDesc};

    fn sample() -> Floors {
        let mut builder = FloorMeshBuilder::new();
        let floor = builder.add_floor(
            "hall",
            vec![
                Vec3::new(0.0, 0.0, 0.0),
                Vec3::new(64.0, 0.0, 0.0),
                Vec3::new(64.0, 64.0, 0.0),
                Vec3::new(0.0, 64.0, 0.0),
            ],
            vec![[0, 1, 2], [0, 2, 3]],
        );
        builder.add_waypoint(
            WaypointDesc::new(Vec3::new(10.0, 10.0, 0.0))
                .on_floor(floor)
                .with_target_name("guard_post")
                .with_user_id("g1"),
        );
        builder.add_waypoint(
            WaypointDesc::new(Vec3::new(50.0, 10.0, 0.0)).with_target_name("guard_post"),
        );
        Floors::load(builder.build().unwrap()).unwrap()
    }

    #[test]
    fn lookups_by_name() {
        let floors = sample();
        assert_eq!(floors.find_floor("hall"), Some(FloorId(0)));
        assert_eq!(floors.find_floor("cellar"), None);
        assert_eq!(floors.floor_name(FloorId(0)), Some("hall"));
        assert_eq!(
            floors.waypoints_for_targetname("guard_post"),
            &[WaypointId(0), WaypointId(1)]
        );
        assert_eq!(floors.waypoints_for_user_id("g1"), &[WaypointId(0)]);
        assert!(floors.waypoints_for_user_id("nobody").is_empty());
    }

    #[test]
    fn everything_starts_enabled_and_unknown_ids_are_harmless() {
        let mut floors = sample();
        assert_eq!(floors.floor_state(FloorId(0)), FloorState::ENABLED);
        assert_eq!(floors.waypoint_state(WaypointId(1)), WaypointState::ENABLED);
        assert_eq!(floors.floor_state(FloorId(5)), FloorState::empty());
        floors.set_floor_state(FloorId(5), FloorState::ENABLED);
        floors.set_waypoint_state(WaypointId(99), WaypointState::empty());
        assert_eq!(floors.waypoint_position(WaypointId(99)), None);
    }

    #[test]
    fn waypoint_position_carries_its_triangle() {
        let floors = sample();
        let pos = floors.waypoint_position(WaypointId(0)).unwrap();
        assert_eq!(pos.floor, Some(FloorId(0)));
        assert!(pos.tri.is_some());
        assert_eq!(pos.waypoint, Some(WaypointId(0)));

        let free = floors.waypoint_position(WaypointId(1)).unwrap();
        assert_eq!(free.floor, None);
        assert_eq!(free.tri, None);
    }

    #[test]
    fn unresolved_floor_position_is_dropped_onto_its_floor() {
        let floors = sample();
        let start = FloorPosition::unresolved(Vec3::new(5.0, 40.0, 4.0), FloorId(0));
        let end = FloorPosition::unresolved(Vec3::new(60.0, 5.0, -3.0), FloorId(0));
        let moved = floors.create_move(&start, &end).unwrap();
        assert_eq!(moved.start(), Some(Vec3::new(5.0, 40.0, 0.0)));
        assert_eq!(moved.end(), Some(Vec3::new(60.0, 5.0, 0.0)));

        let outside = FloorPosition::unresolved(Vec3::new(500.0, 5.0, 0.0), FloorId(0));
        assert!(floors.create_move(&start, &outside).is_none());
    }
}
