//! Typed indices into the flat record tables of a [`FloorMesh`](crate::FloorMesh).
//!
//! All records live in owned `Vec`s; these newtypes keep floor-local triangle
//! indices, global edge indices and waypoint/connection indices from being mixed up.

use std::fmt;

macro_rules! index_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
        #[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
        #[cfg_attr(feature = "serialize", serde(transparent))]
        #[repr(transparent)]
        pub struct $name(pub u32);

        impl $name {
            /// Returns the index as a `usize`, suitable for slice access.
            #[inline]
            pub fn index(self) -> usize {
                self.0 as usize
            }

            /// Converts a signed record value, where negative means "none".
            #[inline]
            pub fn from_record(value: i32) -> Option<Self> {
                u32::try_from(value).ok().map(Self)
            }

            /// Converts an optional index back into a signed record value (`-1` for `None`).
            #[inline]
            pub fn to_record(value: Option<Self>) -> i32 {
                value.map_or(-1, |v| v.0 as i32)
            }
        }

        impl From<u32> for $name {
            #[inline]
            fn from(value: u32) -> Self {
                Self(value)
            }
        }

        impl From<usize> for $name {
            #[inline]
            fn from(value: usize) -> Self {
                Self(value as u32)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

index_type!(
    /// Index of a floor in [`FloorMesh::floors`](crate::FloorMesh::floors).
    FloorId
);
index_type!(
    /// Index of a triangle relative to its floor's `first_tri`.
    TriIndex
);
index_type!(
    /// Global index of an edge in [`FloorMesh::edges`](crate::FloorMesh::edges).
    EdgeIndex
);
index_type!(
    /// Index of a waypoint in [`FloorMesh::waypoints`](crate::FloorMesh::waypoints).
    WaypointId
);
index_type!(
    /// Index of a connection in [`FloorMesh::connections`](crate::FloorMesh::connections).
    ConnectionId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negative_record_values_are_none() {
        assert_eq!(FloorId::from_record(-1), None);
        assert_eq!(FloorId::from_record(3), Some(FloorId(3)));
        assert_eq!(WaypointId::to_record(None), -1);
        assert_eq!(WaypointId::to_record(Some(WaypointId(7))), 7);
    }
}
