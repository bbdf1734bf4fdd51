//! Input sources deciding the jetpack intent sent each input tick

use crate::game::ClientView;
use shared::{CellKind, TileMap};

/// Columns scanned ahead of the player for coins and hazards.
const LOOKAHEAD: i32 = 4;

pub trait Pilot {
    fn jetpack(&mut self, view: &ClientView) -> bool;
}

/// Never thrusts; the player drifts along the floor.
#[derive(Debug, Default, Clone, Copy)]
pub struct Idle;

impl Pilot for Idle {
    fn jetpack(&mut self, _view: &ClientView) -> bool {
        false
    }
}

/// Steers toward the nearest coin ahead, or the middle row when there is
/// none, and thrusts over electric tiles.
#[derive(Debug, Default, Clone, Copy)]
pub struct Autopilot;

impl Autopilot {
    pub fn decide(map: &TileMap, x: f32, y: f32) -> bool {
        let column = x.floor() as i32;
        let row = y.floor() as i32;

        if map.cell_at(column + 1, row + 1) == CellKind::Electric {
            return true;
        }

        let target = Self::target_row(map, column);
        y > target as f32 + 0.5
    }

    /// Row of the closest coin in the next columns, else the middle row.
    fn target_row(map: &TileMap, column: i32) -> i32 {
        (column..=column + LOOKAHEAD)
            .find_map(|x| (0..map.height() as i32).find(|&y| map.cell_at(x, y) == CellKind::Coin))
            .unwrap_or(map.height() as i32 / 2)
    }
}

impl Pilot for Autopilot {
    fn jetpack(&mut self, view: &ClientView) -> bool {
        let (x, y) = view.position(view.slot());
        Self::decide(view.map(), x, y)
    }
}
