//! Route planning over the floor/waypoint graph.
//!
//! Nodes are waypoints; from a waypoint the planner may cross one of its connections, or walk
//! to another waypoint of the floor it stands on. The search is a depth-first branch-and-bound
//! over an explicit stack, exploring the candidates nearest to the goal first.

use glam::Vec3;

use crate::{
    Floors,
    bits::BitSet,
    ids::{ConnectionId, FloorId, WaypointId},
    position::FloorPosition,
};

/// One hop of a [`MovePlan`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct MoveStep {
    /// The waypoint reached by this step.
    pub waypoint: WaypointId,
    /// The connection crossed to reach it, or `None` if it is reached by walking its floor.
    pub connection: Option<ConnectionId>,
}

/// The waypoint-level route between two positions.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct MovePlan {
    /// Where the plan starts.
    pub start: FloorPosition,
    /// Where the plan ends.
    pub end: FloorPosition,
    /// The waypoints visited in order. Empty if `start` can reach `end` without any.
    pub steps: Vec<MoveStep>,
    /// Accumulated cost under the configured [`CostMetric`](crate::CostMetric).
    pub cost: f32,
}

#[derive(Debug, Clone, Copy)]
struct Candidate {
    step: MoveStep,
    pos: Vec3,
    floor: Option<FloorId>,
    cost: f32,
    to_goal: f32,
}

#[derive(Debug)]
struct PlanFrame {
    floor: Option<FloorId>,
    candidates: Vec<Candidate>,
    next: usize,
}

struct PlanSearch<'a> {
    floors: &'a Floors,
    end: &'a FloorPosition,
    on_stack_floors: BitSet,
    on_stack_waypoints: BitSet,
    flood: Vec<f32>,
}

impl Floors {
    /// Plans the waypoint hops from `start` to `end`.
    ///
    /// Both positions must be resolved: either standing on a waypoint, or on a floor. An empty
    /// plan means `end` is reachable without any waypoint; `None` means it is not reachable.
    pub fn plan_move(&self, start: &FloorPosition, end: &FloorPosition) -> Option<MovePlan> {
        let known_waypoint =
            |w: Option<WaypointId>| w.is_none_or(|w| w.index() < self.mesh.waypoints.len());
        let known_floor = |f: Option<FloorId>| f.is_none_or(|f| f.index() < self.mesh.floors.len());
        if !(known_waypoint(start.waypoint)
            && known_waypoint(end.waypoint)
            && known_floor(start.floor)
            && known_floor(end.floor))
        {
            tracing::debug!("Plan requested with an unknown floor or waypoint");
            return None;
        }

        let mut plan = MovePlan {
            start: *start,
            end: *end,
            ..Default::default()
        };
        if start.is_waypoint() && start.waypoint == end.waypoint {
            return Some(plan);
        }
        if start.floor.is_some() && start.floor == end.floor && end.waypoint.is_none() {
            return Some(plan);
        }
        if start.waypoint.is_none() && start.floor.is_none() {
            return None;
        }

        let mut search = PlanSearch {
            floors: self,
            end,
            on_stack_floors: BitSet::with_len(self.mesh.floors.len()),
            on_stack_waypoints: BitSet::with_len(self.mesh.waypoints.len()),
            flood: vec![f32::INFINITY; self.mesh.waypoints.len()],
        };
        let (steps, cost) = search.run(start)?;
        plan.steps = steps;
        plan.cost = cost;
        tracing::debug!(steps = plan.steps.len(), cost, "Planned move");
        Some(plan)
    }
}

impl PlanSearch<'_> {
    fn run(&mut self, start: &FloorPosition) -> Option<(Vec<MoveStep>, f32)> {
        let floors = self.floors;
        let mesh = &floors.mesh;
        let metric = floors.config.cost_metric;
        let mut best: Option<Vec<MoveStep>> = None;
        let mut best_cost = f32::INFINITY;
        let mut steps: Vec<MoveStep> = Vec::new();

        if let Some(floor) = start.floor {
            self.on_stack_floors.insert(floor.index());
        }
        if let Some(waypoint) = start.waypoint {
            self.on_stack_waypoints.insert(waypoint.index());
        }
        let mut frames = vec![self.frame(start.pos, start.floor, start.waypoint, 0.0)];

        while let Some(frame) = frames.last_mut() {
            let Some(candidate) = frame.candidates.get(frame.next).copied() else {
                if let Some(step) = steps.pop() {
                    self.on_stack_waypoints.remove(step.waypoint.index());
                    if step.connection.is_some() {
                        if let Some(floor) = mesh.waypoint(step.waypoint).floor {
                            if Some(floor) != frames[frames.len() - 2].floor {
                                self.on_stack_floors.remove(floor.index());
                            }
                        }
                    }
                }
                frames.pop();
                continue;
            };
            frame.next += 1;
            let from_floor = frame.floor;

            let waypoint = candidate.step.waypoint;
            if self.on_stack_waypoints.contains(waypoint.index()) {
                continue;
            }
            let changes_floor = candidate.floor.is_some() && candidate.floor != from_floor;
            if changes_floor
                && candidate
                    .floor
                    .is_some_and(|f| self.on_stack_floors.contains(f.index()))
            {
                continue;
            }
            if candidate.cost >= best_cost {
                continue;
            }
            if candidate.cost >= self.flood[waypoint.index()] {
                continue;
            }
            self.flood[waypoint.index()] = candidate.cost;

            steps.push(candidate.step);

            let goal_cost = match (self.end.waypoint, self.end.floor) {
                (Some(end), _) => (waypoint == end).then_some(candidate.cost),
                (None, Some(end_floor)) => (candidate.floor == Some(end_floor))
                    .then(|| candidate.cost + metric.segment(candidate.pos, self.end.pos)),
                (None, None) => None,
            };
            if let Some(total) = goal_cost {
                if total < best_cost {
                    best_cost = total;
                    best = Some(steps.clone());
                }
                steps.pop();
                continue;
            }

            self.on_stack_waypoints.insert(waypoint.index());
            if changes_floor {
                if let Some(floor) = candidate.floor {
                    self.on_stack_floors.insert(floor.index());
                }
            }
            let next = self.frame(candidate.pos, candidate.floor, Some(waypoint), candidate.cost);
            frames.push(next);
        }

        best.map(|steps| (steps, best_cost))
    }

    /// Collects the moves available at a node, nearest to the goal first.
    fn frame(
        &self,
        pos: Vec3,
        floor: Option<FloorId>,
        waypoint: Option<WaypointId>,
        cost: f32,
    ) -> PlanFrame {
        let floors = self.floors;
        let mesh = &floors.mesh;
        let metric = floors.config.cost_metric;
        let mut candidates = Vec::new();
        let mut push = |step: MoveStep| {
            let target = mesh.waypoint(step.waypoint);
            candidates.push(Candidate {
                step,
                pos: target.pos,
                floor: target.floor,
                cost: cost + metric.segment(pos, target.pos),
                to_goal: target.pos.distance_squared(self.end.pos),
            });
        };

        if let Some(waypoint) = waypoint {
            for connection in mesh.waypoint_connections(waypoint) {
                let record = mesh.connection(connection);
                if !record.allows_from(waypoint) {
                    continue;
                }
                let other = record.other(waypoint);
                if floors.waypoint_reachable(other) {
                    push(MoveStep {
                        waypoint: other,
                        connection: Some(connection),
                    });
                }
            }
        }

        if let Some(floor) = floor.filter(|f| floors.floor_enabled(*f)) {
            for other in mesh.floor_waypoints(floor) {
                if Some(other) != waypoint && floors.waypoint_reachable(other) {
                    push(MoveStep {
                        waypoint: other,
                        connection: None,
                    });
                }
            }
        }

        candidates.sort_by(|a, b| a.to_goal.total_cmp(&b.to_goal));
        PlanFrame {
            floor,
            candidates,
            next: 0,
        }
    }
}

impl Floors {
    /// Whether the planner may enter `waypoint`: it must be enabled and, if it stands on a
    /// floor, that floor must be enabled too.
    pub(crate) fn waypoint_reachable(&self, waypoint: WaypointId) -> bool {
        self.waypoint_enabled(waypoint)
            && self
                .mesh
                .waypoint(waypoint)
                .floor
                .is_none_or(|floor| self.floor_enabled(floor))
    }
}
