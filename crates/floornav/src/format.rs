//! Reading and writing the little-endian record layout produced by the map compiler.
//!
//! Layout: a header (`magic`, `version`, then nine section counts) followed by the sections
//! in header order: strings, vertices, planes, floors, triangles, edges, waypoints,
//! connections and the shared waypoint index table. Signed fields use `-1` for "none".

use std::io::{Read, Write};

use anyhow::{Context as _, bail};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use glam::Vec3;

use crate::{
    ids::{EdgeIndex, FloorId, TriIndex, WaypointId},
    math::Plane,
    mesh::{
        ConnectionFlags, Floor, FloorEdge, FloorMesh, FloorTri, Waypoint, WaypointConnection,
    },
};

/// Magic number of a floor section ('FLRS' in little-endian).
pub const FLOORS_MAGIC: u32 = 0x5352_4C46;

/// Current version of the floor section.
pub const FLOORS_VERSION: u32 = 1;

/// Reads and validates a [`FloorMesh`] from a byte slice.
pub fn load_from_bytes(bytes: &[u8]) -> anyhow::Result<FloorMesh> {
    read_floor_mesh(&mut &bytes[..])
}

/// Reads and validates a [`FloorMesh`].
pub fn read_floor_mesh<R: Read>(reader: &mut R) -> anyhow::Result<FloorMesh> {
    let magic = reader.read_u32::<LittleEndian>().context("Failed to read magic")?;
    if magic != FLOORS_MAGIC {
        bail!("Not a floor section: magic {magic:#010x}");
    }
    let version = reader.read_u32::<LittleEndian>().context("Failed to read version")?;
    if version != FLOORS_VERSION {
        bail!("Unsupported floor section version {version}, expected {FLOORS_VERSION}");
    }
    let mut counts = [0_u32; 9];
    reader
        .read_u32_into::<LittleEndian>(&mut counts)
        .context("Failed to read section counts")?;
    let [strings, vertices, planes, floors, tris, edges, waypoints, connections, indices] = counts;

    let mut mesh = FloorMesh::default();
    mesh.strings = read_section(reader, strings, read_string).context("Failed to read strings")?;
    mesh.vertices = read_section(reader, vertices, read_vec3).context("Failed to read vertices")?;
    mesh.planes = read_section(reader, planes, read_plane).context("Failed to read planes")?;
    mesh.floors = read_section(reader, floors, read_floor).context("Failed to read floors")?;
    mesh.tris = read_section(reader, tris, read_tri).context("Failed to read triangles")?;
    mesh.edges = read_section(reader, edges, read_edge).context("Failed to read edges")?;
    mesh.waypoints =
        read_section(reader, waypoints, read_waypoint).context("Failed to read waypoints")?;
    mesh.connections = read_section(reader, connections, read_connection)
        .context("Failed to read connections")?;
    mesh.waypoint_indices = read_section(reader, indices, |r| r.read_u32::<LittleEndian>())
        .context("Failed to read waypoint indices")?;

    mesh.validate().context("Floor section is inconsistent")?;
    tracing::debug!(
        floors = mesh.floors.len(),
        triangles = mesh.tris.len(),
        waypoints = mesh.waypoints.len(),
        "Loaded floor section"
    );
    Ok(mesh)
}

/// Writes `mesh` in the layout [`read_floor_mesh`] expects.
pub fn write_floor_mesh<W: Write>(mesh: &FloorMesh, writer: &mut W) -> anyhow::Result<()> {
    writer.write_u32::<LittleEndian>(FLOORS_MAGIC)?;
    writer.write_u32::<LittleEndian>(FLOORS_VERSION)?;
    for count in [
        mesh.strings.len(),
        mesh.vertices.len(),
        mesh.planes.len(),
        mesh.floors.len(),
        mesh.tris.len(),
        mesh.edges.len(),
        mesh.waypoints.len(),
        mesh.connections.len(),
        mesh.waypoint_indices.len(),
    ] {
        writer.write_u32::<LittleEndian>(u32::try_from(count).context("Section too large")?)?;
    }

    for s in &mesh.strings {
        writer.write_u32::<LittleEndian>(s.len() as u32)?;
        writer.write_all(s.as_bytes())?;
    }
    for v in &mesh.vertices {
        write_vec3(writer, *v)?;
    }
    for plane in &mesh.planes {
        write_vec3(writer, plane.normal)?;
        writer.write_f32::<LittleEndian>(plane.dist)?;
    }
    for floor in &mesh.floors {
        for value in [
            floor.name,
            floor.first_tri,
            floor.num_tris,
            floor.first_waypoint,
            floor.num_waypoints,
        ] {
            writer.write_u32::<LittleEndian>(value)?;
        }
    }
    for tri in &mesh.tris {
        for edge in tri.edges {
            writer.write_u32::<LittleEndian>(edge.0)?;
        }
        for vert in tri.verts {
            writer.write_u32::<LittleEndian>(vert)?;
        }
        writer.write_u32::<LittleEndian>(tri.plane)?;
    }
    for edge in &mesh.edges {
        for vert in edge.verts {
            writer.write_u32::<LittleEndian>(vert)?;
        }
        for tri in edge.tris {
            writer.write_i32::<LittleEndian>(tri.map_or(-1, |t| t as i32))?;
        }
        write_vec3(writer, edge.vec)?;
        writer.write_f32::<LittleEndian>(edge.dist[0])?;
        writer.write_f32::<LittleEndian>(edge.dist[1])?;
        writer.write_u32::<LittleEndian>(edge.plane)?;
    }
    for waypoint in &mesh.waypoints {
        writer.write_i32::<LittleEndian>(FloorId::to_record(waypoint.floor))?;
        writer.write_i32::<LittleEndian>(TriIndex::to_record(waypoint.tri))?;
        write_vec3(writer, waypoint.pos)?;
        writer.write_u32::<LittleEndian>(waypoint.first_connection)?;
        writer.write_u32::<LittleEndian>(waypoint.num_connections)?;
        writer.write_i32::<LittleEndian>(string_record(waypoint.target_name))?;
        writer.write_i32::<LittleEndian>(string_record(waypoint.user_id))?;
    }
    for connection in &mesh.connections {
        writer.write_u32::<LittleEndian>(connection.waypoints[0].0)?;
        writer.write_u32::<LittleEndian>(connection.waypoints[1].0)?;
        writer.write_i32::<LittleEndian>(connection.flags.bits() as i32)?;
        write_vec3(writer, connection.ctrls[0])?;
        write_vec3(writer, connection.ctrls[1])?;
        for cmd in connection.cmds {
            writer.write_i32::<LittleEndian>(string_record(cmd))?;
        }
    }
    for index in &mesh.waypoint_indices {
        writer.write_u32::<LittleEndian>(*index)?;
    }
    Ok(())
}

fn read_section<R: Read, T>(
    reader: &mut R,
    count: u32,
    mut read: impl FnMut(&mut R) -> std::io::Result<T>,
) -> std::io::Result<Vec<T>> {
    // Counts come from untrusted data; let the reader fail before we allocate for them.
    let mut items = Vec::with_capacity((count as usize).min(4096));
    for _ in 0..count {
        items.push(read(reader)?);
    }
    Ok(items)
}

fn read_string<R: Read>(reader: &mut R) -> std::io::Result<String> {
    let len = reader.read_u32::<LittleEndian>()?;
    let mut bytes = Vec::new();
    reader.take(len as u64).read_to_end(&mut bytes)?;
    if bytes.len() != len as usize {
        return Err(std::io::ErrorKind::UnexpectedEof.into());
    }
    String::from_utf8(bytes).map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
}

fn read_vec3<R: Read>(reader: &mut R) -> std::io::Result<Vec3> {
    let mut v = [0.0_f32; 3];
    reader.read_f32_into::<LittleEndian>(&mut v)?;
    Ok(Vec3::from_array(v))
}

fn write_vec3<W: Write>(writer: &mut W, v: Vec3) -> std::io::Result<()> {
    for c in v.to_array() {
        writer.write_f32::<LittleEndian>(c)?;
    }
    Ok(())
}

fn read_plane<R: Read>(reader: &mut R) -> std::io::Result<Plane> {
    let normal = read_vec3(reader)?;
    let dist = reader.read_f32::<LittleEndian>()?;
    Ok(Plane::new(normal, dist))
}

fn read_floor<R: Read>(reader: &mut R) -> std::io::Result<Floor> {
    let mut v = [0_u32; 5];
    reader.read_u32_into::<LittleEndian>(&mut v)?;
    Ok(Floor {
        name: v[0],
        first_tri: v[1],
        num_tris: v[2],
        first_waypoint: v[3],
        num_waypoints: v[4],
    })
}

fn read_tri<R: Read>(reader: &mut R) -> std::io::Result<FloorTri> {
    let mut v = [0_u32; 7];
    reader.read_u32_into::<LittleEndian>(&mut v)?;
    Ok(FloorTri {
        edges: [EdgeIndex(v[0]), EdgeIndex(v[1]), EdgeIndex(v[2])],
        verts: [v[3], v[4], v[5]],
        plane: v[6],
    })
}

fn read_edge<R: Read>(reader: &mut R) -> std::io::Result<FloorEdge> {
    let verts = [
        reader.read_u32::<LittleEndian>()?,
        reader.read_u32::<LittleEndian>()?,
    ];
    let tris = [
        u32::try_from(reader.read_i32::<LittleEndian>()?).ok(),
        u32::try_from(reader.read_i32::<LittleEndian>()?).ok(),
    ];
    let vec = read_vec3(reader)?;
    let dist = [
        reader.read_f32::<LittleEndian>()?,
        reader.read_f32::<LittleEndian>()?,
    ];
    let plane = reader.read_u32::<LittleEndian>()?;
    Ok(FloorEdge {
        verts,
        tris,
        vec,
        dist,
        plane,
    })
}

fn read_waypoint<R: Read>(reader: &mut R) -> std::io::Result<Waypoint> {
    let floor = FloorId::from_record(reader.read_i32::<LittleEndian>()?);
    let tri = TriIndex::from_record(reader.read_i32::<LittleEndian>()?);
    let pos = read_vec3(reader)?;
    let first_connection = reader.read_u32::<LittleEndian>()?;
    let num_connections = reader.read_u32::<LittleEndian>()?;
    let target_name = u32::try_from(reader.read_i32::<LittleEndian>()?).ok();
    let user_id = u32::try_from(reader.read_i32::<LittleEndian>()?).ok();
    Ok(Waypoint {
        floor,
        tri,
        pos,
        first_connection,
        num_connections,
        target_name,
        user_id,
    })
}

fn read_connection<R: Read>(reader: &mut R) -> std::io::Result<WaypointConnection> {
    let waypoints = [
        WaypointId(reader.read_u32::<LittleEndian>()?),
        WaypointId(reader.read_u32::<LittleEndian>()?),
    ];
    let flags = ConnectionFlags::from_bits_retain(reader.read_i32::<LittleEndian>()? as u32);
    let ctrls = [read_vec3(reader)?, read_vec3(reader)?];
    let mut cmds = [None; 4];
    for cmd in &mut cmds {
        *cmd = u32::try_from(reader.read_i32::<LittleEndian>()?).ok();
    }
    Ok(WaypointConnection {
        waypoints,
        flags,
        ctrls,
        cmds,
    })
}

fn string_record(index: Option<u32>) -> i32 {
    index.map_or(-1, |i| i as i32)
}

#[cfg(test)]
mod tests {
    use glam::Vec3;

    use super::*;
    use crate::builder::{FloorMeshBuilder, WaypointDesc};

    fn sample_mesh() -> FloorMesh {
        let mut builder = FloorMeshBuilder::new();
        let floor = builder.add_floor(
            "lobby",
            vec![
                Vec3::new(0.0, 0.0, 0.0),
                Vec3::new(64.0, 0.0, 0.0),
                Vec3::new(64.0, 64.0, 0.0),
                Vec3::new(0.0, 64.0, 0.0),
            ],
            vec![[0, 1, 2], [0, 2, 3]],
        );
        let a = builder.add_waypoint(
            WaypointDesc::new(Vec3::new(32.0, 8.0, 0.0))
                .on_floor(floor)
                .with_user_id("spawn"),
        );
        let b = builder.add_waypoint(WaypointDesc::new(Vec3::new(32.0, 200.0, 40.0)));
        builder.connect(a, b);
        builder.build().unwrap()
    }

    #[test]
    fn written_mesh_loads_back() {
        let mesh = sample_mesh();
        let mut bytes = Vec::new();
        write_floor_mesh(&mesh, &mut bytes).unwrap();
        let loaded = load_from_bytes(&bytes).unwrap();
        assert_eq!(loaded, mesh);
    }

    #[test]
    fn wrong_magic_is_rejected() {
        let err = load_from_bytes(&[0, 0, 0, 0, 1, 0, 0, 0]).unwrap_err();
        assert!(err.to_string().contains("magic"));
    }

    #[test]
    fn truncated_section_reports_context() {
        let mut bytes = Vec::new();
        write_floor_mesh(&sample_mesh(), &mut bytes).unwrap();
        bytes.truncate(bytes.len() - 2);
        let err = load_from_bytes(&bytes).unwrap_err();
        assert!(format!("{err:#}").contains("waypoint indices"));
    }

    #[test]
    fn inconsistent_records_fail_validation() {
        let mut mesh = sample_mesh();
        mesh.tris[0].plane = 999;
        let mut bytes = Vec::new();
        write_floor_mesh(&mesh, &mut bytes).unwrap();
        let err = load_from_bytes(&bytes).unwrap_err();
        assert!(err.to_string().contains("inconsistent"));
    }
}
