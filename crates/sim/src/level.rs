use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::math::{Rect, Vec2};

pub const DEFAULT_TILE_SIZE: f32 = 32.0;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TileKind {
    Floor,
    #[default]
    Wall,
    Door,
    StairsDown,
    StairsUp,
}

impl TileKind {
    pub fn walkable(self) -> bool {
        !matches!(self, TileKind::Wall)
    }

    pub fn blocks_sight(self) -> bool {
        matches!(self, TileKind::Wall)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileCoord {
    pub x: i32,
    pub y: i32,
}

impl TileCoord {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Room rectangle in tile units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomRect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl RoomRect {
    pub fn center(&self) -> TileCoord {
        TileCoord::new(self.x + self.width / 2, self.y + self.height / 2)
    }

    pub fn contains(&self, tile: TileCoord) -> bool {
        tile.x >= self.x
            && tile.x < self.x + self.width
            && tile.y >= self.y
            && tile.y < self.y + self.height
    }

    /// Overlap test with `padding` tiles of clearance on every side.
    pub fn overlaps(&self, other: &RoomRect, padding: i32) -> bool {
        self.x - padding < other.x + other.width
            && self.x + self.width + padding > other.x
            && self.y - padding < other.y + other.height
            && self.y + self.height + padding > other.y
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LevelGridError {
    #[error("level grid dimensions must be positive: {width}x{height}")]
    EmptyGrid { width: u32, height: u32 },
    #[error("tile count mismatch: expected {expected}, got {actual}")]
    TileCountMismatch { expected: usize, actual: usize },
}

/// Navigable tile grid handed over by the level generator. Row-major,
/// origin at world (0, 0).
#[derive(Debug, Clone, PartialEq)]
pub struct LevelGrid {
    width: u32,
    height: u32,
    tile_size: f32,
    tiles: Vec<TileKind>,
    rooms: Vec<RoomRect>,
}

impl LevelGrid {
    pub fn new(
        width: u32,
        height: u32,
        tiles: Vec<TileKind>,
        rooms: Vec<RoomRect>,
    ) -> Result<Self, LevelGridError> {
        if width == 0 || height == 0 {
            return Err(LevelGridError::EmptyGrid { width, height });
        }
        let expected = width as usize * height as usize;
        if tiles.len() != expected {
            return Err(LevelGridError::TileCountMismatch {
                expected,
                actual: tiles.len(),
            });
        }
        Ok(Self {
            width,
            height,
            tile_size: DEFAULT_TILE_SIZE,
            tiles,
            rooms,
        })
    }

    /// Every tile set to `kind`.
    pub fn filled(width: u32, height: u32, kind: TileKind) -> Result<Self, LevelGridError> {
        Self::new(
            width,
            height,
            vec![kind; width as usize * height as usize],
            Vec::new(),
        )
    }

    pub fn with_tile_size(mut self, tile_size: f32) -> Self {
        if tile_size > 0.0 && tile_size.is_finite() {
            self.tile_size = tile_size;
        }
        self
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn tile_size(&self) -> f32 {
        self.tile_size
    }

    pub fn rooms(&self) -> &[RoomRect] {
        &self.rooms
    }

    pub fn index_of(&self, tile: TileCoord) -> Option<usize> {
        if tile.x < 0 || tile.y < 0 {
            return None;
        }
        let (x, y) = (tile.x as u32, tile.y as u32);
        if x >= self.width || y >= self.height {
            return None;
        }
        Some(y as usize * self.width as usize + x as usize)
    }

    pub fn tile(&self, tile: TileCoord) -> Option<TileKind> {
        self.index_of(tile).map(|index| self.tiles[index])
    }

    pub fn set_tile(&mut self, tile: TileCoord, kind: TileKind) -> bool {
        let Some(index) = self.index_of(tile) else {
            return false;
        };
        self.tiles[index] = kind;
        true
    }

    /// Out-of-bounds tiles are not walkable.
    pub fn is_walkable(&self, tile: TileCoord) -> bool {
        self.tile(tile).is_some_and(TileKind::walkable)
    }

    /// Out-of-bounds tiles block sight.
    pub fn blocks_sight(&self, tile: TileCoord) -> bool {
        self.tile(tile).map(TileKind::blocks_sight).unwrap_or(true)
    }

    pub fn world_to_tile(&self, world: Vec2) -> TileCoord {
        TileCoord::new(
            (world.x / self.tile_size).floor() as i32,
            (world.y / self.tile_size).floor() as i32,
        )
    }

    pub fn tile_to_world_center(&self, tile: TileCoord) -> Vec2 {
        Vec2::new(
            tile.x as f32 * self.tile_size + self.tile_size * 0.5,
            tile.y as f32 * self.tile_size + self.tile_size * 0.5,
        )
    }

    pub fn is_walkable_world(&self, world: Vec2) -> bool {
        self.is_walkable(self.world_to_tile(world))
    }

    pub fn tile_rect(&self, tile: TileCoord) -> Rect {
        Rect {
            x: tile.x as f32 * self.tile_size,
            y: tile.y as f32 * self.tile_size,
            width: self.tile_size,
            height: self.tile_size,
        }
    }

    /// True when `rect` touches no blocking tile.
    pub fn rect_is_clear(&self, rect: &Rect) -> bool {
        let min = self.world_to_tile(Vec2::new(rect.x, rect.y));
        let max = self.world_to_tile(Vec2::new(
            rect.x + rect.width - f32::EPSILON,
            rect.y + rect.height - f32::EPSILON,
        ));
        for y in min.y..=max.y {
            for x in min.x..=max.x {
                if !self.is_walkable(TileCoord::new(x, y)) {
                    return false;
                }
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_dimensions_are_rejected() {
        assert_eq!(
            LevelGrid::filled(0, 4, TileKind::Floor),
            Err(LevelGridError::EmptyGrid {
                width: 0,
                height: 4
            })
        );
    }

    #[test]
    fn tile_count_must_match_dimensions() {
        let result = LevelGrid::new(2, 2, vec![TileKind::Floor; 3], Vec::new());
        assert_eq!(
            result,
            Err(LevelGridError::TileCountMismatch {
                expected: 4,
                actual: 3
            })
        );
    }

    #[test]
    fn out_of_bounds_is_blocked() {
        let grid = LevelGrid::filled(3, 3, TileKind::Floor).expect("grid");
        assert!(grid.is_walkable(TileCoord::new(2, 2)));
        assert!(!grid.is_walkable(TileCoord::new(3, 0)));
        assert!(!grid.is_walkable(TileCoord::new(-1, 0)));
        assert!(grid.blocks_sight(TileCoord::new(0, -1)));
    }

    #[test]
    fn world_conversion_uses_tile_centres() {
        let grid = LevelGrid::filled(4, 4, TileKind::Floor).expect("grid");
        assert_eq!(grid.world_to_tile(Vec2::new(33.0, 95.9)), TileCoord::new(1, 2));
        assert_eq!(grid.world_to_tile(Vec2::new(-0.5, 0.0)), TileCoord::new(-1, 0));
        assert_eq!(grid.tile_to_world_center(TileCoord::new(1, 2)), Vec2::new(48.0, 80.0));
    }

    #[test]
    fn walls_block_and_doors_do_not() {
        assert!(!TileKind::Wall.walkable());
        assert!(TileKind::Wall.blocks_sight());
        assert!(TileKind::Door.walkable());
        assert!(!TileKind::StairsDown.blocks_sight());
    }

    #[test]
    fn rect_clearance_detects_walls() {
        let mut grid = LevelGrid::filled(4, 4, TileKind::Floor).expect("grid");
        grid.set_tile(TileCoord::new(2, 1), TileKind::Wall);
        let clear = Rect {
            x: 2.0,
            y: 2.0,
            width: 28.0,
            height: 28.0,
        };
        let blocked = Rect {
            x: 50.0,
            y: 40.0,
            width: 28.0,
            height: 28.0,
        };
        assert!(grid.rect_is_clear(&clear));
        assert!(!grid.rect_is_clear(&blocked));
    }
}
