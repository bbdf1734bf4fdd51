//! One-tick advance of a player against the tile map.

use crate::player::{PlayerInput, PlayerState};
use shared::{CellKind, TileMap};

/// Downward acceleration, tiles/s².
pub const GRAVITY: f32 = 20.0;
/// Upward acceleration while the jetpack fires, tiles/s².
pub const JETPACK_FORCE: f32 = 25.0;
/// Constant forward scroll, tiles/s.
pub const SCROLL_SPEED: f32 = 5.0;
/// Vertical speed cap in both directions, tiles/s.
pub const MAX_VERTICAL_VELOCITY: f32 = 10.0;
/// Distance kept from the bottom edge so `floor(y)` stays inside the grid.
pub const FLOOR_MARGIN: f32 = 0.01;

/// What the player's final cell did to them this tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TileEvent {
    CoinCollected,
    Electrocuted,
    Finished,
}

/// Advances `state` by `dt` seconds. Terminal players are left untouched.
///
/// Coins are consumed on `map`, so the first player to reach one is the
/// only one to score it.
pub fn advance(
    state: &mut PlayerState,
    input: PlayerInput,
    map: &mut TileMap,
    dt: f32,
) -> Option<TileEvent> {
    if state.is_terminal() {
        return None;
    }

    state.jetpack_active = input.jetpack_active;

    let velocity_x = SCROLL_SPEED;
    if input.jetpack_active {
        state.velocity_y -= JETPACK_FORCE * dt;
    } else {
        state.velocity_y += GRAVITY * dt;
    }
    state.velocity_y = state
        .velocity_y
        .clamp(-MAX_VERTICAL_VELOCITY, MAX_VERTICAL_VELOCITY);

    let new_x = state.x + velocity_x * dt;
    let mut new_y = state.y + state.velocity_y * dt;

    let bottom = map.height() as f32 - FLOOR_MARGIN;
    if new_y < 0.0 {
        new_y = 0.0;
        state.velocity_y = 0.0;
    } else if new_y > bottom {
        new_y = bottom;
        state.velocity_y = 0.0;
    }

    state.x = new_x;
    let cell_x = new_x.floor() as i32;
    if map.cell_at(cell_x, new_y.floor() as i32) == CellKind::Wall {
        state.velocity_y = 0.0;
    } else {
        state.y = new_y;
    }

    apply_cell_effect(state, map)
}

fn apply_cell_effect(state: &mut PlayerState, map: &mut TileMap) -> Option<TileEvent> {
    let (x, y) = (state.x.floor() as i32, state.y.floor() as i32);
    match map.cell_at(x, y) {
        CellKind::Coin => {
            if map.consume_coin(x, y) {
                state.score += 1;
                Some(TileEvent::CoinCollected)
            } else {
                None
            }
        }
        CellKind::Electric => {
            state.alive = false;
            Some(TileEvent::Electrocuted)
        }
        CellKind::Finish => {
            state.finished = true;
            Some(TileEvent::Finished)
        }
        CellKind::Empty | CellKind::Wall => None,
    }
}
