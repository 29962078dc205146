//! Assembles a [`FloorMesh`] from already-triangulated floors and a list of waypoints.
//!
//! The builder derives everything the runtime needs from plain triangle lists: shared edges
//! and their adjacency, vertical separating planes, deduplicated surface planes (so slope
//! changes can be detected by plane index), the floor each waypoint stands on, and the
//! nearest-first connection order the planner relies on.

use std::collections::{HashMap, VecDeque};

use glam::Vec3;
use thiserror::Error;

use crate::{
    ids::{ConnectionId, EdgeIndex, FloorId, TriIndex, WaypointId},
    math::{Plane, TriangleVertices as _, horizontal_dir},
    mesh::{
        ConnectionFlags, Floor, FloorEdge, FloorMesh, FloorMeshError, FloorTri, Waypoint,
        WaypointConnection,
    },
};

/// A floor given as an indexed triangle list.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FloorDesc {
    /// Name used by [`Floors::find_floor`](crate::Floors::find_floor).
    pub name: String,
    /// Vertex positions.
    pub vertices: Vec<Vec3>,
    /// Triangles as indices into [`Self::vertices`]. Winding is normalized to face up.
    pub triangles: Vec<[u32; 3]>,
}

/// A waypoint to add to the mesh.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct WaypointDesc {
    /// World position.
    pub pos: Vec3,
    /// The floor the waypoint stands on. The triangle is found by the builder.
    pub floor: Option<FloorId>,
    /// Optional target name.
    pub target_name: Option<String>,
    /// Optional user id.
    pub user_id: Option<String>,
}

impl WaypointDesc {
    /// A free-standing waypoint at `pos`.
    pub fn new(pos: Vec3) -> Self {
        Self {
            pos,
            ..Default::default()
        }
    }

    /// Anchors the waypoint to `floor`.
    pub fn on_floor(mut self, floor: FloorId) -> Self {
        self.floor = Some(floor);
        self
    }

    /// Sets the target name.
    pub fn with_target_name(mut self, name: impl Into<String>) -> Self {
        self.target_name = Some(name.into());
        self
    }

    /// Sets the user id.
    pub fn with_user_id(mut self, id: impl Into<String>) -> Self {
        self.user_id = Some(id.into());
        self
    }
}

/// A connection to add to the mesh.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ConnectionDesc {
    /// Endpoints A and B.
    pub waypoints: [WaypointId; 2],
    /// Behavior flags.
    pub flags: ConnectionFlags,
    /// Bézier handles near A and B. Defaults to the chord's thirds.
    pub ctrls: Option<[Vec3; 2]>,
    /// Commands: `[A->B enter, A->B leave, B->A enter, B->A leave]`.
    pub cmds: [Option<String>; 4],
}

/// Builds a [`FloorMesh`].
#[derive(Debug, Clone)]
pub struct FloorMeshBuilder {
    /// Normal tolerance when merging coplanar triangles onto one plane.
    pub plane_normal_epsilon: f32,
    /// Distance tolerance when merging coplanar triangles onto one plane.
    pub plane_dist_epsilon: f32,
    /// Height tolerance when placing waypoints on their floor.
    pub waypoint_height_tolerance: f32,
    floors: Vec<FloorDesc>,
    waypoints: Vec<WaypointDesc>,
    connections: Vec<ConnectionDesc>,
}

impl Default for FloorMeshBuilder {
    fn default() -> Self {
        Self {
            plane_normal_epsilon: 1e-4,
            plane_dist_epsilon: 0.01,
            waypoint_height_tolerance: 16.0,
            floors: Vec::new(),
            waypoints: Vec::new(),
            connections: Vec::new(),
        }
    }
}

impl FloorMeshBuilder {
    /// Creates an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a floor and returns its id.
    pub fn add_floor(
        &mut self,
        name: impl Into<String>,
        vertices: Vec<Vec3>,
        triangles: Vec<[u32; 3]>,
    ) -> FloorId {
        self.floors.push(FloorDesc {
            name: name.into(),
            vertices,
            triangles,
        });
        FloorId::from(self.floors.len() - 1)
    }

    /// Adds a waypoint and returns its id.
    pub fn add_waypoint(&mut self, waypoint: WaypointDesc) -> WaypointId {
        self.waypoints.push(waypoint);
        WaypointId::from(self.waypoints.len() - 1)
    }

    /// Adds a connection and returns its id.
    pub fn add_connection(&mut self, connection: ConnectionDesc) -> ConnectionId {
        self.connections.push(connection);
        ConnectionId::from(self.connections.len() - 1)
    }

    /// Connects two waypoints both ways with default handles.
    pub fn connect(&mut self, a: WaypointId, b: WaypointId) -> ConnectionId {
        self.add_connection(ConnectionDesc {
            waypoints: [a, b],
            ..Default::default()
        })
    }

    /// Builds the mesh.
    pub fn build(self) -> Result<FloorMesh, BuildError> {
        let mut mesh = FloorMesh::default();
        let mut strings = StringTable::default();

        for (floor_index, desc) in self.floors.iter().enumerate() {
            let floor_id = FloorId::from(floor_index);
            self.build_floor(&mut mesh, &mut strings, floor_id, desc)?;
        }

        let mut floor_waypoints: Vec<Vec<u32>> = vec![Vec::new(); mesh.floors.len()];
        for (index, desc) in self.waypoints.iter().enumerate() {
            let id = WaypointId::from(index);
            let tri = match desc.floor {
                Some(floor) => {
                    if floor.index() >= mesh.floors.len() {
                        return Err(BuildError::UnknownFloor { floor });
                    }
                    let tri = self
                        .locate_waypoint(&mesh, floor, desc.pos)
                        .ok_or(BuildError::WaypointOffFloor { waypoint: id, floor })?;
                    floor_waypoints[floor.index()].push(id.0);
                    Some(tri)
                }
                None => None,
            };
            mesh.waypoints.push(Waypoint {
                floor: desc.floor,
                tri,
                pos: desc.pos,
                first_connection: 0,
                num_connections: 0,
                target_name: desc.target_name.as_deref().map(|s| strings.intern(s)),
                user_id: desc.user_id.as_deref().map(|s| strings.intern(s)),
            });
        }

        let mut waypoint_connections: Vec<Vec<u32>> = vec![Vec::new(); mesh.waypoints.len()];
        for (index, desc) in self.connections.iter().enumerate() {
            let [a, b] = desc.waypoints;
            for waypoint in [a, b] {
                if waypoint.index() >= mesh.waypoints.len() {
                    return Err(BuildError::UnknownWaypoint { waypoint });
                }
            }
            let pa = mesh.waypoint(a).pos;
            let pb = mesh.waypoint(b).pos;
            let ctrls = desc
                .ctrls
                .unwrap_or([pa + (pb - pa) / 3.0, pa + (pb - pa) * (2.0 / 3.0)]);
            let cmds = desc
                .cmds
                .clone()
                .map(|cmd| cmd.as_deref().map(|s| strings.intern(s)));
            mesh.connections.push(WaypointConnection {
                waypoints: [a, b],
                flags: desc.flags,
                ctrls,
                cmds,
            });
            waypoint_connections[a.index()].push(index as u32);
            if b != a {
                waypoint_connections[b.index()].push(index as u32);
            }
        }

        for (floor, waypoints) in mesh.floors.iter_mut().zip(floor_waypoints) {
            floor.first_waypoint = mesh.waypoint_indices.len() as u32;
            floor.num_waypoints = waypoints.len() as u32;
            mesh.waypoint_indices.extend(waypoints);
        }

        // The planner explores connections in this order, so keep the shortest hops first.
        for (index, mut connections) in waypoint_connections.into_iter().enumerate() {
            let connection_length = |c: &u32| {
                let [a, b] = mesh.connections[*c as usize].waypoints;
                mesh.waypoint(a).pos.distance_squared(mesh.waypoint(b).pos)
            };
            connections.sort_by(|l, r| connection_length(l).total_cmp(&connection_length(r)));
            let waypoint = &mut mesh.waypoints[index];
            waypoint.first_connection = mesh.waypoint_indices.len() as u32;
            waypoint.num_connections = connections.len() as u32;
            mesh.waypoint_indices.extend(connections);
        }

        mesh.strings = strings.strings;
        mesh.validate()?;
        Ok(mesh)
    }

    fn build_floor(
        &self,
        mesh: &mut FloorMesh,
        strings: &mut StringTable,
        floor_id: FloorId,
        desc: &FloorDesc,
    ) -> Result<(), BuildError> {
        if desc.triangles.is_empty() {
            return Err(BuildError::EmptyFloor { floor: floor_id });
        }
        let vertex_offset = mesh.vertices.len() as u32;
        mesh.vertices.extend(desc.vertices.iter().copied());
        let first_tri = mesh.tris.len() as u32;
        let mut edge_lookup: HashMap<(u32, u32), EdgeIndex> = HashMap::new();

        for (local, indices) in desc.triangles.iter().enumerate() {
            if let Some(&vertex) = indices.iter().find(|v| **v as usize >= desc.vertices.len()) {
                return Err(BuildError::VertexOutOfRange {
                    floor: floor_id,
                    vertex,
                });
            }
            let mut verts = indices.map(|v| v + vertex_offset);
            let mut positions = verts.map(|v| mesh.vertex(v));
            let mut normal = positions.normal();
            if normal.z < 0.0 {
                verts.swap(1, 2);
                positions.swap(1, 2);
                normal = -normal;
            }
            if normal.z <= f32::EPSILON {
                return Err(BuildError::DegenerateTriangle {
                    floor: floor_id,
                    tri: TriIndex::from(local),
                });
            }

            let surface = Plane::from_point_normal(positions[0], normal);
            let plane = self.intern_plane(mesh, surface);
            let global = first_tri + local as u32;
            let mut edges = [EdgeIndex::default(); 3];

            for i in 0..3 {
                let (a, b) = (verts[i], verts[(i + 1) % 3]);
                let key = (a.min(b), a.max(b));
                if let Some(&existing) = edge_lookup.get(&key) {
                    let record = &mut mesh.edges[existing.index()];
                    if record.tris[1].is_some() {
                        return Err(BuildError::NonManifoldEdge {
                            floor: floor_id,
                            verts: [a - vertex_offset, b - vertex_offset],
                        });
                    }
                    record.tris[1] = Some(global);
                    edges[i] = existing;
                    continue;
                }

                let (pa, pb) = (mesh.vertex(a), mesh.vertex(b));
                let vec = (pb - pa).normalize_or_zero();
                let third = positions[(i + 2) % 3];
                let mut separating =
                    Plane::from_point_normal(pa, horizontal_dir(Vec3::Z.cross(pb - pa)));
                if separating.distance(third) < 0.0 {
                    separating = separating.flipped();
                }
                mesh.planes.push(separating);
                let edge = EdgeIndex::from(mesh.edges.len());
                mesh.edges.push(FloorEdge {
                    verts: [a, b],
                    tris: [Some(global), None],
                    vec,
                    dist: [vec.dot(pa), vec.dot(pb)],
                    plane: mesh.planes.len() as u32 - 1,
                });
                edge_lookup.insert(key, edge);
                edges[i] = edge;
            }

            mesh.tris.push(FloorTri {
                edges,
                verts,
                plane,
            });
        }

        let floor = Floor {
            name: strings.intern(&desc.name),
            first_tri,
            num_tris: desc.triangles.len() as u32,
            first_waypoint: 0,
            num_waypoints: 0,
        };
        if !is_connected(mesh, &floor) {
            return Err(BuildError::DisconnectedFloor { floor: floor_id });
        }
        mesh.floors.push(floor);
        Ok(())
    }

    fn intern_plane(&self, mesh: &mut FloorMesh, plane: Plane) -> u32 {
        if let Some(existing) = mesh.planes.iter().position(|p| {
            p.nearly_equals(&plane, self.plane_normal_epsilon, self.plane_dist_epsilon)
        }) {
            return existing as u32;
        }
        mesh.planes.push(plane);
        mesh.planes.len() as u32 - 1
    }

    fn locate_waypoint(&self, mesh: &FloorMesh, floor: FloorId, pos: Vec3) -> Option<TriIndex> {
        let record = mesh.floor(floor);
        record
            .tri_range()
            .filter(|&tri| mesh.tri_contains_xy(tri as u32, pos, 0.01))
            .filter_map(|tri| {
                let height = mesh.plane(mesh.tris[tri].plane).height_at(pos)?;
                let error = (height - pos.z).abs();
                (error <= self.waypoint_height_tolerance).then_some((tri, error))
            })
            .min_by(|(_, l), (_, r)| l.total_cmp(r))
            .map(|(tri, _)| record.local_tri(tri as u32))
    }
}

fn is_connected(mesh: &FloorMesh, floor: &Floor) -> bool {
    let mut reached = vec![false; floor.num_tris as usize];
    let mut queue = VecDeque::from([floor.first_tri]);
    reached[0] = true;
    let mut count = 1;
    while let Some(tri) = queue.pop_front() {
        for &edge in &mesh.tris[tri as usize].edges {
            let Some(other) = mesh.edge(edge).other_tri(tri) else {
                continue;
            };
            let local = floor.local_tri(other).index();
            if !reached[local] {
                reached[local] = true;
                count += 1;
                queue.push_back(other);
            }
        }
    }
    count == reached.len()
}

#[derive(Default)]
struct StringTable {
    strings: Vec<String>,
    lookup: HashMap<String, u32>,
}

impl StringTable {
    fn intern(&mut self, s: &str) -> u32 {
        if let Some(&index) = self.lookup.get(s) {
            return index;
        }
        let index = self.strings.len() as u32;
        self.strings.push(s.to_owned());
        self.lookup.insert(s.to_owned(), index);
        index
    }
}

/// Errors that can occur in [`FloorMeshBuilder::build`].
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BuildError {
    /// A floor has no triangles.
    #[error("floor {floor} has no triangles")]
    EmptyFloor {
        /// The floor.
        floor: FloorId,
    },
    /// A triangle references a vertex its floor does not have.
    #[error("floor {floor} references missing vertex {vertex}")]
    VertexOutOfRange {
        /// The floor.
        floor: FloorId,
        /// The vertex index within the floor.
        vertex: u32,
    },
    /// A triangle has no area or stands vertically.
    #[error("triangle {tri} of floor {floor} is degenerate or vertical")]
    DegenerateTriangle {
        /// The floor.
        floor: FloorId,
        /// The triangle.
        tri: TriIndex,
    },
    /// More than two triangles share an edge.
    #[error("edge {verts:?} of floor {floor} is shared by more than two triangles")]
    NonManifoldEdge {
        /// The floor.
        floor: FloorId,
        /// The edge's vertex indices within the floor.
        verts: [u32; 2],
    },
    /// Some triangle of the floor cannot be reached from the others.
    #[error("floor {floor} is not connected")]
    DisconnectedFloor {
        /// The floor.
        floor: FloorId,
    },
    /// A waypoint names a floor that was never added.
    #[error("floor {floor} does not exist")]
    UnknownFloor {
        /// The floor.
        floor: FloorId,
    },
    /// A connection names a waypoint that was never added.
    #[error("waypoint {waypoint} does not exist")]
    UnknownWaypoint {
        /// The waypoint.
        waypoint: WaypointId,
    },
    /// A floor-anchored waypoint does not stand above any triangle of its floor.
    #[error("waypoint {waypoint} is not above floor {floor}")]
    WaypointOffFloor {
        /// The waypoint.
        waypoint: WaypointId,
        /// The floor it was anchored to.
        floor: FloorId,
    },
    /// The assembled mesh failed validation.
    #[error(transparent)]
    Invalid(#[from] FloorMeshError),
}
