#![doc = include_str!("../../../readme.md")]

mod bits;
pub mod builder;
mod config;
mod floor_move;
pub mod format;
mod ids;
mod locate;
pub(crate) mod math;
mod mesh;
mod optimize;
mod planner;
mod position;
mod registry;
mod spline;
mod synth;
mod walker;

pub use builder::{BuildError, ConnectionDesc, FloorDesc, FloorMeshBuilder, WaypointDesc};
pub use config::{CostMetric, FloorsConfig};
pub use floor_move::{FloorMove, MoveFlags, Route, Step};
pub use ids::{ConnectionId, EdgeIndex, FloorId, TriIndex, WaypointId};
pub use math::{Plane, Side};
pub use mesh::{
    ConnectionFlags, Floor, FloorEdge, FloorMesh, FloorMeshError, FloorTri, Waypoint,
    WaypointConnection,
};
pub use planner::{MovePlan, MoveStep};
pub use position::{FloorPosition, ScriptPosition};
pub use registry::{FloorState, Floors, WaypointState};
pub use spline::{CachedSpline, CubicBezier, SPLINE_SAMPLES, SplinePoint};
pub use walker::{Hop, WalkStep};
