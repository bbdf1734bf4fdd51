//! Static tile grid a session is played on.
//!
//! Text grammar: the first line holds `"<width> <height>"`, followed by
//! `height` rows of up to `width` characters:
//!
//! | char | meaning          |
//! |------|------------------|
//! | `#`  | wall             |
//! | `.`  | empty            |
//! | `$`  | coin             |
//! | `E`  | electric         |
//! | `S`  | start of slot 0  |
//! | `s`  | start of slot 1  |
//! | `F`  | finish           |
//!
//! Unknown characters read as empty and short rows are padded with empty
//! cells. A file with fewer rows than declared is rejected.

use crate::MAP_PAYLOAD_SIZE;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellKind {
    Empty,
    Wall,
    Coin,
    Electric,
    Finish,
}

impl CellKind {
    fn from_char(c: char) -> Self {
        match c {
            '#' => CellKind::Wall,
            '$' => CellKind::Coin,
            'E' => CellKind::Electric,
            'F' => CellKind::Finish,
            _ => CellKind::Empty,
        }
    }

    fn as_char(self) -> char {
        match self {
            CellKind::Empty => '.',
            CellKind::Wall => '#',
            CellKind::Coin => '$',
            CellKind::Electric => 'E',
            CellKind::Finish => 'F',
        }
    }
}

/// Integer tile coordinate, `y` grows downwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Coord {
    pub x: i32,
    pub y: i32,
}

impl Coord {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

impl fmt::Display for Coord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

#[derive(Debug, Error)]
pub enum MapError {
    #[error("failed to read map file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("map has no dimension header")]
    MissingHeader,
    #[error("invalid map dimensions: {0:?}")]
    InvalidDimensions(String),
    #[error("map declares {expected} rows but only {found} are present")]
    MissingRows { expected: usize, found: usize },
    #[error("map text is {size} bytes, the welcome payload holds {limit}")]
    TooLarge { size: usize, limit: usize },
}

/// Tile grid plus the positions derived from it at load time.
#[derive(Debug, Clone, PartialEq)]
pub struct TileMap {
    width: usize,
    height: usize,
    cells: Vec<CellKind>,
    coins: Vec<Coord>,
    obstacles: Vec<Coord>,
    start_positions: Vec<Coord>,
    finish: Option<Coord>,
}

impl TileMap {
    /// Parses a map from its text form.
    pub fn load_from_text(text: &str) -> Result<Self, MapError> {
        let mut lines = text.lines();
        let header = lines.next().ok_or(MapError::MissingHeader)?;
        let (width, height) = parse_dimensions(header)?;

        // The grid must fit the welcome payload once written back out.
        let size = text_size(width, height)
            .ok_or_else(|| MapError::InvalidDimensions(header.to_string()))?;
        if size > MAP_PAYLOAD_SIZE {
            return Err(MapError::TooLarge {
                size,
                limit: MAP_PAYLOAD_SIZE,
            });
        }

        let mut cells = vec![CellKind::Empty; width * height];
        let mut coins = Vec::new();
        let mut obstacles = Vec::new();
        let mut starts: [Option<Coord>; 2] = [None, None];
        let mut finish = None;

        let mut rows = 0;
        for (y, line) in lines.take(height).enumerate() {
            rows += 1;
            for (x, c) in line.chars().take(width).enumerate() {
                let coord = Coord::new(x as i32, y as i32);
                let kind = CellKind::from_char(c);
                match c {
                    'S' if starts[0].is_none() => starts[0] = Some(coord),
                    's' if starts[1].is_none() => starts[1] = Some(coord),
                    _ => {}
                }
                match kind {
                    CellKind::Coin => coins.push(coord),
                    CellKind::Electric => obstacles.push(coord),
                    CellKind::Finish => finish = Some(coord),
                    _ => {}
                }
                cells[y * width + x] = kind;
            }
        }

        if rows < height {
            return Err(MapError::MissingRows {
                expected: height,
                found: rows,
            });
        }

        // Slots 0 and 1 always get a start; missing markers default to the origin.
        let start_positions = starts.iter().map(|s| s.unwrap_or_default()).collect();

        Ok(Self {
            width,
            height,
            cells,
            coins,
            obstacles,
            start_positions,
            finish,
        })
    }

    /// Reads and parses a map file.
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, MapError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| MapError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::load_from_text(&text)
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Returns the cell at `(x, y)`; anything outside the grid is a wall.
    pub fn cell_at(&self, x: i32, y: i32) -> CellKind {
        match self.index(x, y) {
            Some(i) => self.cells[i],
            None => CellKind::Wall,
        }
    }

    /// Turns a coin cell into an empty one. Returns false if there was no
    /// coin to take, so a coin can only ever be scored once.
    pub fn consume_coin(&mut self, x: i32, y: i32) -> bool {
        match self.index(x, y) {
            Some(i) if self.cells[i] == CellKind::Coin => {
                self.cells[i] = CellKind::Empty;
                true
            }
            _ => false,
        }
    }

    /// Coins as laid out in the source map, consumed or not.
    pub fn coins(&self) -> &[Coord] {
        &self.coins
    }

    pub fn obstacles(&self) -> &[Coord] {
        &self.obstacles
    }

    pub fn start_positions(&self) -> &[Coord] {
        &self.start_positions
    }

    /// Spawn point for a slot, wrapping when there are more slots than starts.
    pub fn start_position(&self, slot: usize) -> Coord {
        self.start_positions[slot % self.start_positions.len()]
    }

    pub fn finish(&self) -> Option<Coord> {
        self.finish
    }

    /// Serializes the current grid back into the text grammar.
    pub fn to_text(&self) -> String {
        let mut out = String::with_capacity((self.width + 1) * (self.height + 1));
        out.push_str(&format!("{} {}\n", self.width, self.height));
        for y in 0..self.height {
            for x in 0..self.width {
                let coord = Coord::new(x as i32, y as i32);
                let kind = self.cells[y * self.width + x];
                let c = if kind == CellKind::Empty && self.start_positions[0] == coord {
                    'S'
                } else if kind == CellKind::Empty && self.start_positions[1] == coord {
                    's'
                } else {
                    kind.as_char()
                };
                out.push(c);
            }
            out.push('\n');
        }
        out
    }

    fn index(&self, x: i32, y: i32) -> Option<usize> {
        if x < 0 || y < 0 {
            return None;
        }
        let (x, y) = (x as usize, y as usize);
        if x >= self.width || y >= self.height {
            return None;
        }
        Some(y * self.width + x)
    }
}

fn parse_dimensions(header: &str) -> Result<(usize, usize), MapError> {
    let invalid = || MapError::InvalidDimensions(header.to_string());
    let mut parts = header.split_whitespace();
    let width: usize = parts
        .next()
        .and_then(|w| w.parse().ok())
        .ok_or_else(invalid)?;
    let height: usize = parts
        .next()
        .and_then(|h| h.parse().ok())
        .ok_or_else(invalid)?;
    if width == 0 || height == 0 || parts.next().is_some() {
        return Err(invalid());
    }
    Ok((width, height))
}

/// Length of [`TileMap::to_text`] for a grid of this size, `None` on overflow.
fn text_size(width: usize, height: usize) -> Option<usize> {
    let header = format!("{} {}\n", width, height).len();
    width.checked_add(1)?.checked_mul(height)?.checked_add(header)
}
