//! Types shared by the jetpack server and its clients: the tile map model and
//! the fixed-size wire packet.
//!
//! Both ends of a connection must be built from the same version of this
//! crate. The packet carries no version tag, so `MAX_CLIENTS`, the map payload
//! capacity and the byte layout are the whole protocol contract.

pub mod map;
pub mod protocol;

pub use map::{CellKind, Coord, MapError, TileMap};
pub use protocol::{MapPayload, Packet, ProtocolError, SlotPhase, PACKET_SIZE};

/// Number of player slots in a session.
pub const MAX_CLIENTS: usize = 10;

/// Occupied slots required before a round starts.
pub const MIN_PLAYERS: usize = 2;

/// Capacity of the map text carried by the welcome packet.
pub const MAP_PAYLOAD_SIZE: usize = 2000;

/// Positions travel as integers scaled by this factor.
pub const POSITION_SCALE: f32 = 100.0;

/// Converts a tile-unit coordinate to its wire representation.
pub fn to_fixed(value: f32) -> i32 {
    (value * POSITION_SCALE).round() as i32
}

/// Converts a wire coordinate back to tile units.
pub fn from_fixed(value: i32) -> f32 {
    value as f32 / POSITION_SCALE
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn test_fixed_point_scale() {
        assert_eq!(to_fixed(1.0), 100);
        assert_eq!(to_fixed(2.345), 235);
        assert_eq!(to_fixed(-0.5), -50);
        assert_eq!(to_fixed(0.0), 0);
    }

    #[test]
    fn test_fixed_point_back_to_tiles() {
        assert_approx_eq!(from_fixed(250), 2.5, 1e-6);
        assert_approx_eq!(from_fixed(to_fixed(4.99)), 4.99, 1e-4);
    }

    #[test]
    fn test_protocol_constants_fit_together() {
        assert!(MIN_PLAYERS <= MAX_CLIENTS);
        assert!(PACKET_SIZE > MAP_PAYLOAD_SIZE);
    }
}
