//! Room-and-corridor level generator plus the spawn plan that populates it.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use sim::{LevelGrid, LevelGridError, RoomRect, TileCoord, TileKind, Vec2};
use tracing::{debug, info, warn};

const ENEMY_TYPES: [&str; 2] = ["goblin", "slime"];
const SLIME_ROOM_CHANCE: f64 = 0.35;
pub(crate) const BOSS_TYPE: &str = "goblin_chief";

#[derive(Debug, Clone, Copy)]
pub(crate) struct DungeonParams {
    pub(crate) width: u32,
    pub(crate) height: u32,
    pub(crate) room_attempts: u32,
    pub(crate) max_rooms: usize,
    pub(crate) min_room_size: i32,
    pub(crate) max_room_size: i32,
    pub(crate) room_padding: i32,
    pub(crate) max_enemies_per_room: u32,
}

impl Default for DungeonParams {
    fn default() -> Self {
        Self {
            width: 80,
            height: 60,
            room_attempts: 80,
            max_rooms: 10,
            min_room_size: 6,
            max_room_size: 12,
            room_padding: 2,
            max_enemies_per_room: 3,
        }
    }
}

/// Carves non-overlapping rooms into solid rock and joins every room to the
/// nearest earlier one with an L-shaped corridor.
pub(crate) fn generate(seed: u64, params: &DungeonParams) -> Result<LevelGrid, LevelGridError> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let width = params.width as i32;
    let height = params.height as i32;
    let mut tiles = vec![TileKind::Wall; params.width as usize * params.height as usize];
    let mut rooms: Vec<RoomRect> = Vec::new();

    let min_size = params.min_room_size.max(1);
    let max_size = params.max_room_size.max(min_size);
    for _ in 0..params.room_attempts {
        if rooms.len() >= params.max_rooms {
            break;
        }
        let room_width = rng.gen_range(min_size..=max_size);
        let room_height = rng.gen_range(min_size..=max_size);
        if room_width + 2 >= width || room_height + 2 >= height {
            continue;
        }
        let candidate = RoomRect {
            x: rng.gen_range(1..width - room_width - 1),
            y: rng.gen_range(1..height - room_height - 1),
            width: room_width,
            height: room_height,
        };
        if rooms
            .iter()
            .any(|room| room.overlaps(&candidate, params.room_padding))
        {
            continue;
        }
        rooms.push(candidate);
    }

    if rooms.is_empty() {
        warn!(seed, "dungeon_without_rooms");
    }
    for room in &rooms {
        for y in room.y..room.y + room.height {
            for x in room.x..room.x + room.width {
                carve(&mut tiles, width, TileCoord::new(x, y), TileKind::Floor);
            }
        }
    }

    for index in 1..rooms.len() {
        let from = rooms[index].center();
        let Some(nearest) = rooms[..index]
            .iter()
            .min_by_key(|room| squared_distance(room.center(), from))
        else {
            continue;
        };
        let to = nearest.center();
        if rng.gen_bool(0.5) {
            carve_horizontal(&mut tiles, width, from.x, to.x, from.y);
            carve_vertical(&mut tiles, width, from.y, to.y, to.x);
        } else {
            carve_vertical(&mut tiles, width, from.y, to.y, from.x);
            carve_horizontal(&mut tiles, width, from.x, to.x, to.y);
        }
    }

    if let (Some(first), Some(last)) = (rooms.first(), rooms.last()) {
        if rooms.len() > 1 {
            carve(&mut tiles, width, first.center(), TileKind::StairsUp);
            carve(&mut tiles, width, last.center(), TileKind::StairsDown);
        }
    }

    info!(
        seed,
        rooms = rooms.len(),
        width = params.width,
        height = params.height,
        "dungeon_generated"
    );
    LevelGrid::new(params.width, params.height, tiles, rooms)
}

fn carve(tiles: &mut [TileKind], width: i32, tile: TileCoord, kind: TileKind) {
    if tile.x < 0 || tile.y < 0 || tile.x >= width {
        return;
    }
    let index = (tile.y * width + tile.x) as usize;
    if let Some(slot) = tiles.get_mut(index) {
        *slot = kind;
    }
}

fn carve_horizontal(tiles: &mut [TileKind], width: i32, x1: i32, x2: i32, y: i32) {
    for x in x1.min(x2)..=x1.max(x2) {
        if tile_at(tiles, width, TileCoord::new(x, y)) == Some(TileKind::Wall) {
            carve(tiles, width, TileCoord::new(x, y), TileKind::Floor);
        }
    }
}

fn carve_vertical(tiles: &mut [TileKind], width: i32, y1: i32, y2: i32, x: i32) {
    for y in y1.min(y2)..=y1.max(y2) {
        if tile_at(tiles, width, TileCoord::new(x, y)) == Some(TileKind::Wall) {
            carve(tiles, width, TileCoord::new(x, y), TileKind::Floor);
        }
    }
}

fn tile_at(tiles: &[TileKind], width: i32, tile: TileCoord) -> Option<TileKind> {
    if tile.x < 0 || tile.y < 0 || tile.x >= width {
        return None;
    }
    tiles.get((tile.y * width + tile.x) as usize).copied()
}

fn squared_distance(a: TileCoord, b: TileCoord) -> i32 {
    let dx = a.x - b.x;
    let dy = a.y - b.y;
    dx * dx + dy * dy
}

/// Where the run's actors start. The player takes the first room, the boss
/// the last, and every room in between gets a small pack of one type.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct SpawnPlan {
    pub(crate) player: Vec2,
    pub(crate) enemies: Vec<(&'static str, Vec2)>,
    pub(crate) boss: Option<Vec2>,
}

pub(crate) fn plan_spawns(grid: &LevelGrid, seed: u64, params: &DungeonParams) -> SpawnPlan {
    let mut rng = ChaCha8Rng::seed_from_u64(seed ^ 0x5157_4e5f_504c_414e);
    let rooms = grid.rooms();
    let Some(first) = rooms.first() else {
        let center = TileCoord::new(grid.width() as i32 / 2, grid.height() as i32 / 2);
        return SpawnPlan {
            player: grid.tile_to_world_center(center),
            enemies: Vec::new(),
            boss: None,
        };
    };

    let mut enemies = Vec::new();
    let last_index = rooms.len() - 1;
    for room in rooms.iter().take(last_index).skip(1) {
        let enemy_type = if rng.gen_bool(SLIME_ROOM_CHANCE) {
            ENEMY_TYPES[1]
        } else {
            ENEMY_TYPES[0]
        };
        let count = rng.gen_range(1..=params.max_enemies_per_room.max(1));
        for _ in 0..count {
            let tile = TileCoord::new(
                rng.gen_range(room.x + 1..(room.x + room.width - 1).max(room.x + 2)),
                rng.gen_range(room.y + 1..(room.y + room.height - 1).max(room.y + 2)),
            );
            enemies.push((enemy_type, grid.tile_to_world_center(tile)));
        }
    }
    let boss = (last_index > 0).then(|| grid.tile_to_world_center(rooms[last_index].center()));

    debug!(
        enemies = enemies.len(),
        has_boss = boss.is_some(),
        "spawn_plan_ready"
    );
    SpawnPlan {
        player: grid.tile_to_world_center(first.center()),
        enemies,
        boss,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sim::pathfinding::Pathfinder;

    fn small_params() -> DungeonParams {
        DungeonParams {
            width: 60,
            height: 40,
            ..DungeonParams::default()
        }
    }

    #[test]
    fn rooms_respect_size_and_padding() {
        let params = small_params();
        let grid = generate(7, &params).expect("grid");
        let rooms = grid.rooms();
        assert!(rooms.len() >= 2, "expected several rooms, got {}", rooms.len());

        for (index, room) in rooms.iter().enumerate() {
            assert!((params.min_room_size..=params.max_room_size).contains(&room.width));
            assert!((params.min_room_size..=params.max_room_size).contains(&room.height));
            for other in &rooms[index + 1..] {
                assert!(!room.overlaps(other, params.room_padding));
            }
        }
    }

    #[test]
    fn same_seed_generates_same_level() {
        let params = small_params();
        let first = generate(99, &params).expect("grid");
        let second = generate(99, &params).expect("grid");
        assert_eq!(first, second);
    }

    #[test]
    fn every_room_is_reachable_from_the_first() {
        let grid = generate(3, &small_params()).expect("grid");
        let rooms = grid.rooms();
        let pathfinder = Pathfinder::new(&grid);
        let start = rooms[0].center();
        for room in &rooms[1..] {
            assert!(
                pathfinder.find_tile_path(start, room.center()).is_some(),
                "room at {},{} unreachable",
                room.x,
                room.y
            );
        }
    }

    #[test]
    fn spawn_plan_places_player_first_and_boss_last() {
        let params = small_params();
        let grid = generate(11, &params).expect("grid");
        let plan = plan_spawns(&grid, 11, &params);
        let rooms = grid.rooms();

        assert_eq!(plan.player, grid.tile_to_world_center(rooms[0].center()));
        assert_eq!(
            plan.boss,
            Some(grid.tile_to_world_center(rooms[rooms.len() - 1].center()))
        );
        for (enemy_type, position) in &plan.enemies {
            assert!(ENEMY_TYPES.contains(enemy_type));
            assert!(grid.is_walkable_world(*position));
        }
    }
}
