//! Seeded level generator used when no map file is given.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use shared::{MapError, TileMap};

pub const WIDTH: usize = 48;
pub const HEIGHT: usize = 8;
/// Columns at the start kept free of hazards.
const SPAWN_COLUMNS: usize = 5;
const HAZARD_CHANCE: f64 = 0.3;
const COIN_CHANCE: f64 = 0.4;
const MAX_HAZARD_LENGTH: usize = 3;

/// Builds the text form of a level: walls on the top and bottom rows, both
/// starts in the second column, hazards and coins in between and a finish
/// line in the last column. The same seed always yields the same level.
pub fn generate_text(seed: u64) -> String {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut grid = vec![vec!['.'; WIDTH]; HEIGHT];

    grid[0].fill('#');
    grid[HEIGHT - 1].fill('#');
    grid[HEIGHT / 2 - 1][1] = 'S';
    grid[HEIGHT / 2][1] = 's';

    let mut last_hazard = 0;
    for x in SPAWN_COLUMNS..WIDTH - 1 {
        // Leave at least one clear column after each hazard.
        if x > last_hazard + 1 && rng.gen_bool(HAZARD_CHANCE) {
            let length = rng.gen_range(1..=MAX_HAZARD_LENGTH);
            let top = rng.gen_range(1..HEIGHT - length);
            for row in grid.iter_mut().skip(top).take(length) {
                row[x] = 'E';
            }
            last_hazard = x;
        } else if rng.gen_bool(COIN_CHANCE) {
            let y = rng.gen_range(1..HEIGHT - 1);
            grid[y][x] = '$';
        }
    }

    for row in grid.iter_mut().take(HEIGHT - 1).skip(1) {
        row[WIDTH - 1] = 'F';
    }

    let mut text = format!("{} {}\n", WIDTH, HEIGHT);
    for row in grid {
        text.extend(row);
        text.push('\n');
    }
    text
}

pub fn generate(seed: u64) -> Result<TileMap, MapError> {
    TileMap::load_from_text(&generate_text(seed))
}
