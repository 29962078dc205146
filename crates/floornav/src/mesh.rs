//! The immutable navigation data consumed by [`Floors`](crate::Floors): triangulated floors with
//! shared edges, and a sparse graph of waypoints joined by connections.
//!
//! Records reference each other by index, mirroring the flat tables of the binary format
//! (see [`crate::format`]). Floor waypoint lists and waypoint connection lists are both ranges
//! into the shared [`FloorMesh::waypoint_indices`] table.

use std::ops::Range;

use glam::Vec3;
use thiserror::Error;

use crate::{
    ids::{ConnectionId, EdgeIndex, FloorId, TriIndex, WaypointId},
    math::Plane,
};

/// A complete navigation mesh: floors, their triangles and edges, and the waypoint graph.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct FloorMesh {
    /// String table referenced by floor names, waypoint target names/user ids and connection
    /// commands.
    pub strings: Vec<String>,
    /// Vertex pool shared by triangles and edges.
    pub vertices: Vec<Vec3>,
    /// Plane pool. Coplanar triangles share a plane index.
    pub planes: Vec<Plane>,
    /// All floors.
    pub floors: Vec<Floor>,
    /// All triangles, grouped contiguously per floor.
    pub tris: Vec<FloorTri>,
    /// All edges.
    pub edges: Vec<FloorEdge>,
    /// All waypoints.
    pub waypoints: Vec<Waypoint>,
    /// All connections, each listed by both of its waypoints.
    pub connections: Vec<WaypointConnection>,
    /// Index table holding waypoint ids (for floors) and connection ids (for waypoints).
    pub waypoint_indices: Vec<u32>,
}

/// A flat, triangulated walkable region.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct Floor {
    /// String index of the floor's name.
    pub name: u32,
    /// Global index of the floor's first triangle.
    pub first_tri: u32,
    /// Number of triangles in the floor.
    pub num_tris: u32,
    /// Offset into [`FloorMesh::waypoint_indices`] of the waypoints lying on this floor.
    pub first_waypoint: u32,
    /// Number of waypoints lying on this floor.
    pub num_waypoints: u32,
}

impl Floor {
    /// Range of global triangle indices owned by this floor.
    #[inline]
    pub fn tri_range(&self) -> Range<usize> {
        self.first_tri as usize..(self.first_tri + self.num_tris) as usize
    }

    /// Converts a floor-local triangle index to a global one.
    #[inline]
    pub fn global_tri(&self, tri: TriIndex) -> u32 {
        self.first_tri + tri.0
    }

    /// Converts a global triangle index to a floor-local one.
    #[inline]
    pub fn local_tri(&self, global: u32) -> TriIndex {
        TriIndex(global - self.first_tri)
    }

    /// Whether the global triangle index belongs to this floor.
    #[inline]
    pub fn contains_tri(&self, global: u32) -> bool {
        self.tri_range().contains(&(global as usize))
    }
}

/// A triangle of a floor.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct FloorTri {
    /// The three edges bounding the triangle.
    pub edges: [EdgeIndex; 3],
    /// The three vertices of the triangle.
    pub verts: [u32; 3],
    /// Plane index of the triangle's surface.
    pub plane: u32,
}

/// An edge shared by one or two triangles.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct FloorEdge {
    /// The two endpoints.
    pub verts: [u32; 2],
    /// Global indices of the triangles on either side. `None` marks the mesh boundary.
    pub tris: [Option<u32>; 2],
    /// Unit direction from `verts[0]` to `verts[1]`.
    pub vec: Vec3,
    /// Projections of both endpoints onto [`Self::vec`].
    pub dist: [f32; 2],
    /// Plane index of the vertical separating plane through the edge.
    /// Its normal faces into `tris[0]`.
    pub plane: u32,
}

impl FloorEdge {
    /// Returns the triangle on the other side of the edge from `global_tri`.
    #[inline]
    pub fn other_tri(&self, global_tri: u32) -> Option<u32> {
        if self.tris[0] == Some(global_tri) {
            self.tris[1]
        } else {
            self.tris[0]
        }
    }

    /// Whether only one triangle uses this edge.
    #[inline]
    pub fn is_boundary(&self) -> bool {
        self.tris[0].is_none() || self.tris[1].is_none()
    }
}

/// A node of the waypoint graph.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct Waypoint {
    /// The floor the waypoint stands on, if any.
    pub floor: Option<FloorId>,
    /// The floor-local triangle the waypoint stands on, if any.
    pub tri: Option<TriIndex>,
    /// World position.
    pub pos: Vec3,
    /// Offset into [`FloorMesh::waypoint_indices`] of this waypoint's connections.
    pub first_connection: u32,
    /// Number of connections touching this waypoint.
    pub num_connections: u32,
    /// String index of the target name used by gameplay lookups.
    pub target_name: Option<u32>,
    /// String index of the user id used by gameplay lookups.
    pub user_id: Option<u32>,
}

bitflags::bitflags! {
    /// Behavior flags of a [`WaypointConnection`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
    #[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
    #[repr(transparent)]
    pub struct ConnectionFlags: u32 {
        /// The connection may be crossed from `waypoints[0]` to `waypoints[1]`.
        const A_TO_B = 0x01;
        /// The connection may be crossed from `waypoints[1]` to `waypoints[0]`.
        const B_TO_A = 0x02;
        /// The mover should face along the path.
        const AUTO_FACE = 0x04;
        /// The move may be interrupted mid-step.
        const INTERRUPTABLE = 0x08;
        /// The mover should pitch along the path.
        const AUTO_PITCH = 0x10;
        /// Crossing B->A fires the A->B command pair.
        const B_TO_A_USE_A_TO_B_SCRIPT = 0x20;

        /// Traversable both ways.
        const BIDIRECTIONAL = Self::A_TO_B.bits() | Self::B_TO_A.bits();
    }
}

impl Default for ConnectionFlags {
    fn default() -> Self {
        Self::BIDIRECTIONAL | Self::AUTO_FACE
    }
}

/// An undirected edge of the waypoint graph carrying Bézier tangent handles.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct WaypointConnection {
    /// The two endpoints, A and B.
    pub waypoints: [WaypointId; 2],
    /// Behavior flags.
    pub flags: ConnectionFlags,
    /// Bézier control handles; `ctrls[i]` belongs to `waypoints[i]`.
    pub ctrls: [Vec3; 2],
    /// Command string indices: `[A->B enter, A->B leave, B->A enter, B->A leave]`.
    pub cmds: [Option<u32>; 4],
}

impl WaypointConnection {
    /// The endpoint slot of `from`, or `None` if `from` is not an endpoint.
    #[inline]
    pub fn slot_of(&self, from: WaypointId) -> Option<usize> {
        self.waypoints.iter().position(|w| *w == from)
    }

    /// The endpoint opposite to `from`.
    #[inline]
    pub fn other(&self, from: WaypointId) -> WaypointId {
        if self.waypoints[0] == from {
            self.waypoints[1]
        } else {
            self.waypoints[0]
        }
    }

    /// Whether the connection may be crossed starting at `from`.
    #[inline]
    pub fn allows_from(&self, from: WaypointId) -> bool {
        match self.slot_of(from) {
            Some(0) => self.flags.contains(ConnectionFlags::A_TO_B),
            Some(_) => self.flags.contains(ConnectionFlags::B_TO_A),
            None => false,
        }
    }

    /// The `(enter, leave)` command string indices fired when crossing from `from`.
    pub fn commands_from(&self, from: WaypointId) -> [Option<u32>; 2] {
        let mut set = usize::from(self.waypoints[0] != from);
        if set == 1 && self.flags.contains(ConnectionFlags::B_TO_A_USE_A_TO_B_SCRIPT) {
            set = 0;
        }
        [self.cmds[set * 2], self.cmds[set * 2 + 1]]
    }
}

impl FloorMesh {
    /// Returns the floor with the given id.
    ///
    /// # Panics
    ///
    /// Panics if the id is out of range.
    #[inline]
    pub fn floor(&self, floor: FloorId) -> &Floor {
        &self.floors[floor.index()]
    }

    /// Returns the triangle `tri` of `floor`.
    #[inline]
    pub fn tri(&self, floor: FloorId, tri: TriIndex) -> &FloorTri {
        &self.tris[self.floor(floor).global_tri(tri) as usize]
    }

    /// Returns the edge with the given index.
    #[inline]
    pub fn edge(&self, edge: EdgeIndex) -> &FloorEdge {
        &self.edges[edge.index()]
    }

    /// Returns the plane with the given index.
    #[inline]
    pub fn plane(&self, plane: u32) -> &Plane {
        &self.planes[plane as usize]
    }

    /// Returns the vertex with the given index.
    #[inline]
    pub fn vertex(&self, vertex: u32) -> Vec3 {
        self.vertices[vertex as usize]
    }

    /// Returns the waypoint with the given id.
    #[inline]
    pub fn waypoint(&self, waypoint: WaypointId) -> &Waypoint {
        &self.waypoints[waypoint.index()]
    }

    /// Returns the connection with the given id.
    #[inline]
    pub fn connection(&self, connection: ConnectionId) -> &WaypointConnection {
        &self.connections[connection.index()]
    }

    /// Returns the string with the given index, or `None` if out of range.
    #[inline]
    pub fn string(&self, index: u32) -> Option<&str> {
        self.strings.get(index as usize).map(String::as_str)
    }

    /// The waypoints lying on `floor`.
    pub fn floor_waypoints(&self, floor: FloorId) -> impl Iterator<Item = WaypointId> + '_ {
        let floor = self.floor(floor);
        let start = floor.first_waypoint as usize;
        self.waypoint_indices[start..start + floor.num_waypoints as usize]
            .iter()
            .map(|&i| WaypointId(i))
    }

    /// The connections touching `waypoint`, in nearest-first order.
    pub fn waypoint_connections(
        &self,
        waypoint: WaypointId,
    ) -> impl Iterator<Item = ConnectionId> + '_ {
        let waypoint = self.waypoint(waypoint);
        let start = waypoint.first_connection as usize;
        self.waypoint_indices[start..start + waypoint.num_connections as usize]
            .iter()
            .map(|&i| ConnectionId(i))
    }

    /// The separating plane of `edge`, oriented so its front faces into `global_tri`.
    #[inline]
    pub fn edge_plane_facing(&self, edge: EdgeIndex, global_tri: u32) -> Plane {
        let record = self.edge(edge);
        let plane = *self.plane(record.plane);
        if record.tris[0] == Some(global_tri) {
            plane
        } else {
            plane.flipped()
        }
    }

    /// Whether `point` lies within the vertical prism of the triangle, allowing `epsilon` of slack
    /// on every edge.
    pub fn tri_contains_xy(&self, global_tri: u32, point: Vec3, epsilon: f32) -> bool {
        self.tris[global_tri as usize]
            .edges
            .iter()
            .all(|&edge| self.edge_plane_facing(edge, global_tri).distance(point) >= -epsilon)
    }

    /// Checks that every index in the mesh points at an existing record.
    ///
    /// The search code indexes without bounds checks beyond the slice's own, so loaded data
    /// must pass this before it is handed to [`Floors`](crate::Floors).
    pub fn validate(&self) -> Result<(), FloorMeshError> {
        let check_string = |index: Option<u32>| match index {
            Some(i) if i as usize >= self.strings.len() => {
                Err(FloorMeshError::StringOutOfRange { index: i })
            }
            _ => Ok(()),
        };
        let check_indices = |first: u32, count: u32| -> Result<(), FloorMeshError> {
            let end = first as usize + count as usize;
            if end > self.waypoint_indices.len() {
                return Err(FloorMeshError::IndexTableOutOfRange {
                    first,
                    count,
                    len: self.waypoint_indices.len(),
                });
            }
            Ok(())
        };

        for (i, floor) in self.floors.iter().enumerate() {
            check_string(Some(floor.name))?;
            if floor.tri_range().end > self.tris.len() {
                return Err(FloorMeshError::FloorTrianglesOutOfRange { floor: FloorId::from(i) });
            }
            check_indices(floor.first_waypoint, floor.num_waypoints)?;
            for waypoint in self.floor_waypoints(FloorId::from(i)) {
                if waypoint.index() >= self.waypoints.len() {
                    return Err(FloorMeshError::WaypointOutOfRange { waypoint });
                }
            }
        }

        for (i, tri) in self.tris.iter().enumerate() {
            if tri.plane as usize >= self.planes.len() {
                return Err(FloorMeshError::PlaneOutOfRange { plane: tri.plane });
            }
            if let Some(&vertex) = tri.verts.iter().find(|v| **v as usize >= self.vertices.len()) {
                return Err(FloorMeshError::VertexOutOfRange { vertex });
            }
            for edge in tri.edges {
                let Some(record) = self.edges.get(edge.index()) else {
                    return Err(FloorMeshError::EdgeOutOfRange { edge });
                };
                if !record.tris.contains(&Some(i as u32)) {
                    return Err(FloorMeshError::EdgeNotShared { edge, tri: i as u32 });
                }
            }
        }

        for (i, edge) in self.edges.iter().enumerate() {
            if edge.plane as usize >= self.planes.len() {
                return Err(FloorMeshError::PlaneOutOfRange { plane: edge.plane });
            }
            if let Some(&vertex) = edge.verts.iter().find(|v| **v as usize >= self.vertices.len()) {
                return Err(FloorMeshError::VertexOutOfRange { vertex });
            }
            if let Some(tri) = edge
                .tris
                .iter()
                .flatten()
                .find(|t| **t as usize >= self.tris.len())
            {
                return Err(FloorMeshError::TriangleOutOfRange {
                    edge: EdgeIndex::from(i),
                    tri: *tri,
                });
            }
        }

        for (i, waypoint) in self.waypoints.iter().enumerate() {
            let id = WaypointId::from(i);
            match (waypoint.floor, waypoint.tri) {
                (Some(floor), Some(tri)) => {
                    let Some(record) = self.floors.get(floor.index()) else {
                        return Err(FloorMeshError::FloorOutOfRange { floor });
                    };
                    if tri.0 >= record.num_tris {
                        return Err(FloorMeshError::WaypointTriangleOutOfRange { waypoint: id });
                    }
                }
                (None, None) => {}
                _ => return Err(FloorMeshError::WaypointTriangleOutOfRange { waypoint: id }),
            }
            check_string(waypoint.target_name)?;
            check_string(waypoint.user_id)?;
            check_indices(waypoint.first_connection, waypoint.num_connections)?;
            for connection in self.waypoint_connections(id) {
                let Some(record) = self.connections.get(connection.index()) else {
                    return Err(FloorMeshError::ConnectionOutOfRange { connection });
                };
                if record.slot_of(id).is_none() {
                    return Err(FloorMeshError::ConnectionNotTouching { connection, waypoint: id });
                }
            }
        }

        for connection in &self.connections {
            if let Some(&waypoint) = connection
                .waypoints
                .iter()
                .find(|w| w.index() >= self.waypoints.len())
            {
                return Err(FloorMeshError::WaypointOutOfRange { waypoint });
            }
            for cmd in connection.cmds {
                check_string(cmd)?;
            }
        }

        Ok(())
    }
}

/// Errors reported by [`FloorMesh::validate`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FloorMeshError {
    /// A string index does not exist in the string table.
    #[error("string index {index} is out of range")]
    StringOutOfRange {
        /// The offending index.
        index: u32,
    },
    /// A floor's triangle range extends past the triangle table.
    #[error("triangles of floor {floor} are out of range")]
    FloorTrianglesOutOfRange {
        /// The offending floor.
        floor: FloorId,
    },
    /// A floor id does not exist.
    #[error("floor {floor} is out of range")]
    FloorOutOfRange {
        /// The offending floor.
        floor: FloorId,
    },
    /// A range into the waypoint index table extends past its end.
    #[error("index table range {first}+{count} exceeds table length {len}")]
    IndexTableOutOfRange {
        /// Start of the range.
        first: u32,
        /// Length of the range.
        count: u32,
        /// Length of the table.
        len: usize,
    },
    /// A plane index does not exist.
    #[error("plane {plane} is out of range")]
    PlaneOutOfRange {
        /// The offending plane index.
        plane: u32,
    },
    /// A vertex index does not exist.
    #[error("vertex {vertex} is out of range")]
    VertexOutOfRange {
        /// The offending vertex index.
        vertex: u32,
    },
    /// An edge index does not exist.
    #[error("edge {edge} is out of range")]
    EdgeOutOfRange {
        /// The offending edge.
        edge: EdgeIndex,
    },
    /// A triangle lists an edge that does not list the triangle back.
    #[error("edge {edge} does not reference triangle {tri}")]
    EdgeNotShared {
        /// The edge.
        edge: EdgeIndex,
        /// The global triangle index.
        tri: u32,
    },
    /// An edge references a triangle that does not exist.
    #[error("edge {edge} references missing triangle {tri}")]
    TriangleOutOfRange {
        /// The edge.
        edge: EdgeIndex,
        /// The global triangle index.
        tri: u32,
    },
    /// A waypoint id does not exist.
    #[error("waypoint {waypoint} is out of range")]
    WaypointOutOfRange {
        /// The offending waypoint.
        waypoint: WaypointId,
    },
    /// A waypoint's floor anchoring is inconsistent or out of range.
    #[error("waypoint {waypoint} has an invalid floor triangle")]
    WaypointTriangleOutOfRange {
        /// The offending waypoint.
        waypoint: WaypointId,
    },
    /// A connection id does not exist.
    #[error("connection {connection} is out of range")]
    ConnectionOutOfRange {
        /// The offending connection.
        connection: ConnectionId,
    },
    /// A waypoint lists a connection that does not touch it.
    #[error("connection {connection} is listed by waypoint {waypoint} but does not touch it")]
    ConnectionNotTouching {
        /// The connection.
        connection: ConnectionId,
        /// The waypoint listing it.
        waypoint: WaypointId,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connection(flags: ConnectionFlags) -> WaypointConnection {
        WaypointConnection {
            waypoints: [WaypointId(4), WaypointId(9)],
            flags,
            ctrls: [Vec3::ZERO; 2],
            cmds: [Some(0), Some(1), Some(2), Some(3)],
        }
    }

    #[test]
    fn one_way_connection() {
        let c = connection(ConnectionFlags::A_TO_B);
        assert!(c.allows_from(WaypointId(4)));
        assert!(!c.allows_from(WaypointId(9)));
        assert!(!c.allows_from(WaypointId(1)));
        assert_eq!(c.other(WaypointId(9)), WaypointId(4));
    }

    #[test]
    fn reverse_commands_can_reuse_forward_script() {
        let c = connection(ConnectionFlags::BIDIRECTIONAL);
        assert_eq!(c.commands_from(WaypointId(4)), [Some(0), Some(1)]);
        assert_eq!(c.commands_from(WaypointId(9)), [Some(2), Some(3)]);

        let c =
            connection(ConnectionFlags::BIDIRECTIONAL | ConnectionFlags::B_TO_A_USE_A_TO_B_SCRIPT);
        assert_eq!(c.commands_from(WaypointId(9)), [Some(0), Some(1)]);
    }

    #[test]
    fn empty_mesh_is_valid() {
        FloorMesh::default().validate().unwrap();
    }

    #[test]
    fn dangling_floor_name_is_rejected() {
        let mesh = FloorMesh {
            floors: vec![Floor::default()],
            ..Default::default()
        };
        assert_eq!(
            mesh.validate(),
            Err(FloorMeshError::StringOutOfRange { index: 0 })
        );
    }
}
