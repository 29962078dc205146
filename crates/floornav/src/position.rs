#[cfg(feature = "bevy_reflect")]
use bevy_reflect::prelude::*;
use glam::Vec3;

use crate::ids::{FloorId, TriIndex, WaypointId};

/// A navigable position: a point on a floor triangle, a waypoint, or both.
///
/// Produced by [`Floors::clip_to_floor`](crate::Floors::clip_to_floor) and
/// [`Floors::waypoint_position`](crate::Floors::waypoint_position), and consumed by
/// [`Floors::create_move`](crate::Floors::create_move).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct FloorPosition {
    /// World position.
    pub pos: Vec3,
    /// The floor the position is on, `None` for a free-standing waypoint.
    pub floor: Option<FloorId>,
    /// The floor-local triangle. `None` means "on `floor`, triangle not yet known";
    /// planning resolves it with a short vertical probe.
    pub tri: Option<TriIndex>,
    /// The waypoint the position stands on, if any.
    pub waypoint: Option<WaypointId>,
    /// Reserved for movers that track the waypoint they are heading to. Never read by planning.
    pub next_waypoint: Option<WaypointId>,
}

impl FloorPosition {
    /// A position on triangle `tri` of `floor`.
    pub fn on_floor(pos: Vec3, floor: FloorId, tri: TriIndex) -> Self {
        Self {
            pos,
            floor: Some(floor),
            tri: Some(tri),
            ..Default::default()
        }
    }

    /// A position on `floor` whose triangle is not known yet.
    pub fn unresolved(pos: Vec3, floor: FloorId) -> Self {
        Self {
            pos,
            floor: Some(floor),
            ..Default::default()
        }
    }

    /// Whether the position stands on a waypoint.
    #[inline]
    pub fn is_waypoint(&self) -> bool {
        self.waypoint.is_some()
    }

    /// The position in its scripting form.
    pub fn to_script(&self) -> ScriptPosition {
        ScriptPosition::from(*self)
    }
}

/// The scripting-facing form of a [`FloorPosition`].
///
/// Position, floor and triangle are all that is needed to round-trip a floor position
/// through a script; `-1` stands for "none".
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "bevy_reflect", derive(Reflect))]
pub struct ScriptPosition {
    /// World position.
    pub pos: [f32; 3],
    /// Floor index or `-1`.
    pub floor: i32,
    /// Floor-local triangle index or `-1`.
    pub tri: i32,
}

impl From<FloorPosition> for ScriptPosition {
    fn from(value: FloorPosition) -> Self {
        Self {
            pos: value.pos.to_array(),
            floor: FloorId::to_record(value.floor),
            tri: TriIndex::to_record(value.tri),
        }
    }
}

impl From<ScriptPosition> for FloorPosition {
    fn from(value: ScriptPosition) -> Self {
        Self {
            pos: Vec3::from_array(value.pos),
            floor: FloorId::from_record(value.floor),
            tri: TriIndex::from_record(value.tri),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn script_round_trip_preserves_floor_tri_and_position() {
        let original =
            FloorPosition::on_floor(Vec3::new(1.25, -7.5, 0.1), FloorId(3), TriIndex(41));
        let back = FloorPosition::from(original.to_script());
        assert_eq!(back.pos, original.pos);
        assert_eq!(back.floor, original.floor);
        assert_eq!(back.tri, original.tri);
    }

    #[test]
    fn missing_floor_marshals_as_negative() {
        let script = FloorPosition::default().to_script();
        assert_eq!(script.floor, -1);
        assert_eq!(script.tri, -1);
    }

    #[cfg(feature = "serialize")]
    #[test]
    fn script_schema_uses_pos_floor_tri() {
        let position = FloorPosition::on_floor(Vec3::new(0.1, 0.2, 0.3), FloorId(1), TriIndex(2));
        let json = serde_json::to_value(position.to_script()).unwrap();
        assert_eq!(json["floor"], 1);
        assert_eq!(json["tri"], 2);
        assert_eq!(json["pos"].as_array().unwrap().len(), 3);

        let parsed: ScriptPosition = serde_json::from_value(json).unwrap();
        let back = FloorPosition::from(parsed);
        assert_eq!(back.pos.to_array(), position.pos.to_array());
        assert_eq!(back.floor, position.floor);
        assert_eq!(back.tri, position.tri);
    }
}
