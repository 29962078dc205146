//! End-to-end queries against a small level: a courtyard with a hole in the middle, a platform
//! reached by stairs, and a roof you can only jump down from.

use std::{fs, path::PathBuf, sync::Arc};

use approx::assert_relative_eq;
use floornav::{
    ConnectionDesc, ConnectionFlags, CostMetric, FloorId, FloorMesh, FloorMeshBuilder, FloorMove,
    FloorPosition, FloorState, Floors, FloorsConfig, MoveFlags, ScriptPosition, WaypointDesc,
    WaypointId, WaypointState, format,
};
use glam::Vec3;
use serde::Deserialize;

const STAIRS_BOTTOM: WaypointId = WaypointId(0);
const STAIRS_TOP: WaypointId = WaypointId(1);
const ROOF_EDGE: WaypointId = WaypointId(2);
const LANDING: WaypointId = WaypointId(3);

#[derive(Deserialize)]
struct LevelDesc {
    floors: Vec<FloorJson>,
    waypoints: Vec<WaypointJson>,
    connections: Vec<ConnectionJson>,
}

#[derive(Deserialize)]
struct FloorJson {
    name: String,
    vertices: Vec<[f32; 3]>,
    triangles: Vec<[u32; 3]>,
}

#[derive(Deserialize)]
struct WaypointJson {
    pos: [f32; 3],
    floor: Option<String>,
    target_name: Option<String>,
    user_id: Option<String>,
}

#[derive(Deserialize)]
struct ConnectionJson {
    waypoints: [u32; 2],
    flags: u32,
    cmds: [Option<String>; 4],
}

fn level_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("data")
        .join("level.json")
}

fn level_mesh() -> FloorMesh {
    let json = fs::read_to_string(level_path()).unwrap();
    let level: LevelDesc = serde_json::from_str(&json).unwrap();

    let mut builder = FloorMeshBuilder::new();
    for floor in &level.floors {
        builder.add_floor(
            floor.name.clone(),
            floor.vertices.iter().map(|v| Vec3::from_array(*v)).collect(),
            floor.triangles.clone(),
        );
    }
    for waypoint in level.waypoints {
        let mut desc = WaypointDesc::new(Vec3::from_array(waypoint.pos));
        if let Some(floor) = waypoint.floor {
            let index = level.floors.iter().position(|f| f.name == floor).unwrap();
            desc = desc.on_floor(FloorId::from(index));
        }
        desc.target_name = waypoint.target_name;
        desc.user_id = waypoint.user_id;
        builder.add_waypoint(desc);
    }
    for connection in level.connections {
        builder.add_connection(ConnectionDesc {
            waypoints: connection.waypoints.map(WaypointId),
            flags: ConnectionFlags::from_bits_truncate(connection.flags),
            ctrls: None,
            cmds: connection.cmds,
        });
    }
    builder.build().unwrap()
}

fn level() -> Floors {
    Floors::load(level_mesh()).unwrap()
}

fn drop_on(floors: &Floors, x: f32, y: f32) -> FloorPosition {
    floors
        .clip_to_floor(Vec3::new(x, y, 1000.0), Vec3::new(x, y, -1000.0))
        .unwrap_or_else(|| panic!("nothing below ({x}, {y})"))
}

fn waypoint(floors: &Floors, id: WaypointId) -> FloorPosition {
    floors.waypoint_position(id).unwrap()
}

/// Checks position continuity at every joint, and X/Y tangent continuity at every joint whose
/// curves are not vertical there. Walk-to-hop and hop-to-walk joints are included.
fn assert_joints_are_continuous(path: &FloorMove) -> usize {
    let mut checked = 0;
    for pair in path.steps().windows(2) {
        assert_eq!(pair[0].spline.end(), pair[1].spline.start());
        let out = pair[0].spline.tangent(1.0).truncate();
        let into = pair[1].spline.tangent(0.0).truncate();
        if out.length() < 1e-3 || into.length() < 1e-3 {
            continue;
        }
        let (out, into) = (out.normalize(), into.normalize());
        assert_relative_eq!(out.x, into.x, epsilon = 1e-3);
        assert_relative_eq!(out.y, into.y, epsilon = 1e-3);
        checked += 1;
    }
    checked
}

fn hop_joints(path: &FloorMove) -> usize {
    path.steps()
        .windows(2)
        .filter(|pair| pair[0].connection.is_some() != pair[1].connection.is_some())
        .count()
}

#[test]
fn clip_lands_inside_the_triangle_below() {
    let floors = level();
    let courtyard = floors.find_floor("courtyard").unwrap();
    for (x, y) in [(10.0, 5.0), (50.0, 40.0), (170.0, 120.0), (100.0, 180.0), (30.0, 90.0)] {
        let hit = drop_on(&floors, x, y);
        assert_eq!(hit.floor, Some(courtyard));
        let floor = floors.mesh().floor(courtyard);
        let global = floor.global_tri(hit.tri.unwrap());
        assert!(floor.contains_tri(global));
        assert!(floors.mesh().tri_contains_xy(global, hit.pos, 1e-3));
        let plane = floors.mesh().plane(floors.mesh().tri(courtyard, hit.tri.unwrap()).plane);
        assert_relative_eq!(plane.distance(hit.pos), 0.0, epsilon = 1e-3);
        assert_relative_eq!(hit.pos.x, x, epsilon = 1e-3);
        assert_relative_eq!(hit.pos.y, y, epsilon = 1e-3);
        assert_relative_eq!(hit.pos.z, 0.0, epsilon = 1e-3);
    }
    assert_eq!(
        floors.clip_to_floor(Vec3::new(96.0, 96.0, 10.0), Vec3::new(96.0, 96.0, -10.0)),
        None,
        "the middle of the courtyard is a hole"
    );
}

#[test]
fn disabled_floor_disappears_from_queries() {
    let mut floors = level();
    let platform = floors.find_floor("platform").unwrap();
    let start = drop_on(&floors, 20.0, 12.0);
    let end = drop_on(&floors, 400.0, 90.0);
    assert!(floors.create_move(&start, &end).is_some());

    floors.set_floor_state(platform, FloorState::empty());
    assert_eq!(
        floors.clip_to_floor(Vec3::new(400.0, 90.0, 100.0), Vec3::new(400.0, 90.0, 0.0)),
        None
    );
    assert!(floors.create_move(&start, &end).is_none());
    assert!(
        floors
            .create_move(&start, &waypoint(&floors, STAIRS_TOP))
            .is_none()
    );

    floors.set_floor_state(platform, FloorState::ENABLED);
    assert!(floors.create_move(&start, &end).is_some());
}

#[test]
fn moving_to_the_same_spot_is_a_single_empty_step() {
    let floors = level();
    let here = drop_on(&floors, 40.0, 20.0);
    let path = floors.create_move(&here, &here).unwrap();
    assert_eq!(path.steps().len(), 1);
    assert_eq!(path.length(), 0.0);
    assert_eq!(path.start(), Some(here.pos));
    assert_eq!(path.end(), Some(here.pos));
}

#[test]
fn unobstructed_walk_is_the_direct_route() {
    let floors = level();
    let start = drop_on(&floors, 10.0, 5.0);
    let end = drop_on(&floors, 180.0, 20.0);
    let direct = floors.find_direct_route(&start, &end).unwrap();
    assert_eq!(direct.len(), 2);
    assert_eq!(floors.walk_floor(&start, &end).unwrap(), direct);
}

#[test]
fn walking_around_the_hole() {
    let floors = level();
    let start = drop_on(&floors, 32.0, 100.0);
    let end = drop_on(&floors, 160.0, 100.0);
    assert!(floors.find_direct_route(&start, &end).is_none());

    let route = floors.walk_floor(&start, &end).unwrap();
    assert_eq!(route.first().unwrap().pos, start.pos);
    assert_eq!(route.last().unwrap().pos, end.pos);
    for step in &route {
        let inside_hole =
            (64.0..=128.0).contains(&step.pos.x) && (64.0..=128.0).contains(&step.pos.y);
        assert!(!inside_hole, "{:?} is in the hole", step.pos);
    }

    let again = floors.optimize_route(route.clone());
    assert!(again.len() <= route.len());
    assert_eq!(again.first(), route.first());
    assert_eq!(again.last(), route.last());
}

#[test]
fn move_across_floors_is_smooth_and_exact() {
    let floors = level();
    let start = drop_on(&floors, 32.0, 170.0);
    let end = drop_on(&floors, 400.0, 90.0);
    let path = floors.create_move(&start, &end).unwrap();

    assert_eq!(path.start(), Some(start.pos));
    assert_eq!(path.end(), Some(end.pos));
    for step in path.steps() {
        assert_eq!(step.spline.eval(0.0), step.spline.start());
        assert_eq!(step.spline.eval(1.0), step.spline.end());
    }
    assert_eq!(hop_joints(&path), 2);
    assert_eq!(assert_joints_are_continuous(&path), path.steps().len() - 1);

    let hops: Vec<_> = path.steps().iter().filter(|s| s.connection.is_some()).collect();
    assert_eq!(hops.len(), 1);
    assert_eq!(hops[0].waypoints, [Some(STAIRS_BOTTOM), Some(STAIRS_TOP)]);
    assert_eq!(hops[0].events, [Some("climb_up".to_owned()), Some("climb_done".to_owned())]);
    assert_eq!(hops[0].spline.start(), waypoint(&floors, STAIRS_BOTTOM).pos);
    assert_eq!(hops[0].spline.end(), waypoint(&floors, STAIRS_TOP).pos);
}

#[test]
fn reverse_crossing_fires_the_reverse_commands() {
    let floors = level();
    let start = drop_on(&floors, 400.0, 90.0);
    let end = drop_on(&floors, 20.0, 12.0);
    let path = floors.create_move(&start, &end).unwrap();
    let hop = path.steps().iter().find(|s| s.connection.is_some()).unwrap();
    assert_eq!(hop.waypoints, [Some(STAIRS_TOP), Some(STAIRS_BOTTOM)]);
    assert_eq!(hop.events, [Some("climb_down".to_owned()), None]);
}

#[test]
fn direct_connection_plans_one_step() {
    let floors = level();
    let plan = floors
        .plan_move(&waypoint(&floors, STAIRS_BOTTOM), &waypoint(&floors, STAIRS_TOP))
        .unwrap();
    assert_eq!(plan.steps.len(), 1);
    assert_eq!(plan.steps[0].waypoint, STAIRS_TOP);
    assert!(plan.steps[0].connection.is_some());
}

#[test]
fn disabled_link_means_no_path() {
    let mut floors = level();
    floors.set_waypoint_state(STAIRS_TOP, WaypointState::empty());
    let start = drop_on(&floors, 20.0, 12.0);
    let end = drop_on(&floors, 400.0, 90.0);
    assert!(
        floors
            .plan_move(&waypoint(&floors, STAIRS_BOTTOM), &waypoint(&floors, LANDING))
            .is_none()
    );
    assert!(floors.create_move(&start, &end).is_none());
}

#[test]
fn jumping_down_is_one_way() {
    let floors = level();
    let roof = drop_on(&floors, 400.0, 380.0);
    let platform = drop_on(&floors, 400.0, 90.0);

    let down = floors.create_move(&roof, &platform).unwrap();
    let jump = down.steps().iter().find(|s| s.connection.is_some()).unwrap();
    assert_eq!(jump.waypoints, [Some(ROOF_EDGE), Some(LANDING)]);
    assert!(jump.flags.contains(MoveFlags::INTERRUPTABLE | MoveFlags::AUTO_PITCH));
    assert!(!jump.flags.contains(MoveFlags::AUTO_FACE));

    assert!(floors.create_move(&platform, &roof).is_none());
}

#[test]
fn chained_move_visits_every_position() {
    let floors = level();
    let positions = [
        drop_on(&floors, 20.0, 12.0),
        waypoint(&floors, STAIRS_TOP),
        drop_on(&floors, 400.0, 90.0),
    ];
    let path: Arc<FloorMove> = floors.create_move_seq(&positions).unwrap();
    assert_eq!(path.start(), Some(positions[0].pos));
    assert_eq!(path.end(), Some(positions[2].pos));
    assert!(
        path.steps()
            .iter()
            .any(|s| s.spline.end() == positions[1].pos)
    );
    assert_joints_are_continuous(&path);

    assert!(floors.create_move_seq(&positions[..1]).is_none());
    let blocked = [positions[2], drop_on(&floors, 400.0, 380.0)];
    assert!(floors.create_move_seq(&blocked).is_none());
}

#[test]
fn waypoint_lookups() {
    let floors = level();
    assert_eq!(floors.waypoints_for_targetname("stairs"), &[STAIRS_BOTTOM, STAIRS_TOP]);
    assert_eq!(floors.waypoints_for_user_id("jump"), &[ROOF_EDGE]);
    assert_eq!(floors.floor_count(), 3);
    assert_eq!(floors.waypoint_count(), 4);
    assert_eq!(floors.floor_name(FloorId(2)), Some("roof"));
}

#[test]
#[cfg(feature = "serialize")]
fn script_round_trip_is_exact() {
    let floors = level();
    let original = drop_on(&floors, 123.456, 7.89);
    let json = serde_json::to_string(&original.to_script()).unwrap();
    let back = FloorPosition::from(serde_json::from_str::<ScriptPosition>(&json).unwrap());
    assert_eq!(back.pos, original.pos);
    assert_eq!(back.floor, original.floor);
    assert_eq!(back.tri, original.tri);

    let path = floors.create_move(&back, &drop_on(&floors, 20.0, 12.0));
    assert!(path.is_some());
}

#[test]
fn baked_mesh_behaves_like_the_built_one() {
    let mesh = level_mesh();
    let mut bytes = Vec::new();
    format::write_floor_mesh(&mesh, &mut bytes).unwrap();
    let floors = Floors::load(format::load_from_bytes(&bytes).unwrap()).unwrap();

    let start = drop_on(&floors, 32.0, 170.0);
    let end = drop_on(&floors, 400.0, 90.0);
    assert_eq!(
        floors.create_move(&start, &end),
        level().create_move(&start, &end)
    );
}

#[test]
fn euclidean_metric_finds_the_same_stairs() {
    let config = FloorsConfig {
        cost_metric: CostMetric::Euclidean,
        ..Default::default()
    };
    let floors = Floors::with_config(level_mesh(), config).unwrap();
    let plan = floors
        .plan_move(&drop_on(&floors, 20.0, 12.0), &drop_on(&floors, 400.0, 90.0))
        .unwrap();
    let waypoints: Vec<_> = plan.steps.iter().map(|s| s.waypoint).collect();
    assert_eq!(waypoints, vec![STAIRS_BOTTOM, STAIRS_TOP]);
    assert!(plan.cost > 0.0);
}
