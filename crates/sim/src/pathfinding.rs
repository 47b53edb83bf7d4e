//! Grid A* over the level's walkable tiles.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use tracing::debug;

use crate::level::{LevelGrid, TileCoord};
use crate::math::Vec2;

pub const ORTHOGONAL_COST: f32 = 1.0;
pub const DIAGONAL_COST: f32 = 1.414;
pub const MAX_SNAP_RADIUS: i32 = 5;

const NEIGHBOR_OFFSETS: [(i32, i32); 8] = [
    (0, 1),
    (1, 0),
    (0, -1),
    (-1, 0),
    (1, 1),
    (-1, 1),
    (1, -1),
    (-1, -1),
];

#[derive(Debug, Clone, Copy)]
struct OpenNode {
    tile: TileCoord,
    f_cost: f32,
    insertion_order: u64,
}

impl PartialEq for OpenNode {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for OpenNode {}

impl PartialOrd for OpenNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OpenNode {
    // Reversed so the max-heap pops the lowest f-cost, earliest insertion first.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .f_cost
            .total_cmp(&self.f_cost)
            .then_with(|| other.insertion_order.cmp(&self.insertion_order))
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Pathfinder<'a> {
    grid: &'a LevelGrid,
}

impl<'a> Pathfinder<'a> {
    pub fn new(grid: &'a LevelGrid) -> Self {
        Self { grid }
    }

    /// World-space path from `start` to `goal` through tile centres, start
    /// tile included. When no path exists the result is the single literal
    /// `goal` point; see [`is_direct_fallback`].
    pub fn find_path(&self, start: Vec2, goal: Vec2) -> Vec<Vec2> {
        let start_tile = self.snap_to_walkable(self.grid.world_to_tile(start));
        let goal_tile = self.snap_to_walkable(self.grid.world_to_tile(goal));

        match self.find_tile_path(start_tile, goal_tile) {
            Some(tiles) => tiles
                .into_iter()
                .map(|tile| self.grid.tile_to_world_center(tile))
                .collect(),
            None => {
                debug!(
                    start_x = start_tile.x,
                    start_y = start_tile.y,
                    goal_x = goal_tile.x,
                    goal_y = goal_tile.y,
                    "path_not_found"
                );
                vec![goal]
            }
        }
    }

    /// Nearest walkable tile on diamond rings of radius 1..=5, or `tile`
    /// itself when it is walkable or nothing nearby is.
    pub fn snap_to_walkable(&self, tile: TileCoord) -> TileCoord {
        if self.grid.is_walkable(tile) {
            return tile;
        }
        for radius in 1..=MAX_SNAP_RADIUS {
            for dx in -radius..=radius {
                for dy in -radius..=radius {
                    if dx.abs() + dy.abs() != radius {
                        continue;
                    }
                    let candidate = TileCoord::new(tile.x + dx, tile.y + dy);
                    if self.grid.is_walkable(candidate) {
                        return candidate;
                    }
                }
            }
        }
        tile
    }

    /// Tile path including both endpoints, or `None` when the goal is unreachable.
    pub fn find_tile_path(&self, start: TileCoord, goal: TileCoord) -> Option<Vec<TileCoord>> {
        let start_index = self.grid.index_of(start)?;
        let goal_index = self.grid.index_of(goal)?;
        if start == goal {
            return Some(vec![start]);
        }

        let node_count = self.grid.width() as usize * self.grid.height() as usize;
        let mut closed = vec![false; node_count];
        let mut best_g = vec![f32::INFINITY; node_count];
        let mut parent = vec![None::<usize>; node_count];
        let mut open = BinaryHeap::new();
        let mut next_insertion = 0u64;

        best_g[start_index] = 0.0;
        open.push(OpenNode {
            tile: start,
            f_cost: manhattan_distance(start, goal),
            insertion_order: next_insertion,
        });
        next_insertion += 1;

        while let Some(current) = open.pop() {
            let Some(current_index) = self.grid.index_of(current.tile) else {
                continue;
            };
            if closed[current_index] {
                continue;
            }
            closed[current_index] = true;

            if current_index == goal_index {
                return Some(self.reconstruct_tile_path(&parent, start_index, goal_index));
            }

            let current_g = best_g[current_index];
            for (dx, dy) in NEIGHBOR_OFFSETS {
                let neighbor = TileCoord::new(current.tile.x + dx, current.tile.y + dy);
                let Some(neighbor_index) = self.grid.index_of(neighbor) else {
                    continue;
                };
                if closed[neighbor_index] || !self.grid.is_walkable(neighbor) {
                    continue;
                }
                let step = if dx != 0 && dy != 0 {
                    DIAGONAL_COST
                } else {
                    ORTHOGONAL_COST
                };
                let tentative_g = current_g + step;
                if tentative_g >= best_g[neighbor_index] {
                    continue;
                }
                best_g[neighbor_index] = tentative_g;
                parent[neighbor_index] = Some(current_index);
                open.push(OpenNode {
                    tile: neighbor,
                    f_cost: tentative_g + manhattan_distance(neighbor, goal),
                    insertion_order: next_insertion,
                });
                next_insertion += 1;
            }
        }
        None
    }

    fn reconstruct_tile_path(
        &self,
        parent: &[Option<usize>],
        start_index: usize,
        goal_index: usize,
    ) -> Vec<TileCoord> {
        let width = self.grid.width() as usize;
        let mut cursor = goal_index;
        let mut indices = vec![cursor];
        while cursor != start_index {
            let Some(next) = parent.get(cursor).copied().flatten() else {
                break;
            };
            cursor = next;
            indices.push(cursor);
        }
        indices.reverse();
        indices
            .into_iter()
            .map(|index| TileCoord::new((index % width) as i32, (index / width) as i32))
            .collect()
    }
}

/// True when `path` is the single-point fallback returned for an unreachable goal.
pub fn is_direct_fallback(path: &[Vec2], goal: Vec2) -> bool {
    path.len() == 1 && path[0] == goal
}

fn manhattan_distance(a: TileCoord, b: TileCoord) -> f32 {
    (a.x.abs_diff(b.x) + a.y.abs_diff(b.y)) as f32
}
