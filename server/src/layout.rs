//! Spawn points and the randomised block layout of a fresh match.

use rand::Rng;
use shared::{Block, BlockGrid, Cell, PowerupKind, Tile, NUM_TILES};

const LAST: i32 = NUM_TILES - 1;
const MID: i32 = NUM_TILES / 2;

/// Corners first, then edge midpoints.
pub const SPAWN_TILES: [Tile; 8] = [
    Tile { row: 0, col: 0 },
    Tile { row: LAST, col: LAST },
    Tile { row: 0, col: LAST },
    Tile { row: LAST, col: 0 },
    Tile { row: 0, col: MID },
    Tile { row: LAST, col: MID },
    Tile { row: MID, col: 0 },
    Tile { row: MID, col: LAST },
];

/// Spawn tile for the `index`-th player of a match.
pub fn spawn_tile(index: usize) -> Tile {
    SPAWN_TILES[index % SPAWN_TILES.len()]
}

/// A spawn tile and its orthogonal neighbours stay open.
pub fn is_spawn_zone(tile: Tile) -> bool {
    SPAWN_TILES
        .iter()
        .any(|spawn| (spawn.row - tile.row).abs() + (spawn.col - tile.col).abs() <= 1)
}

/// Pillars plus destructible blocks scattered over the remaining open tiles.
pub fn generate_grid<R: Rng>(rng: &mut R, density: f64, powerup_chance: f64) -> BlockGrid {
    let mut grid = BlockGrid::with_pillars();
    for row in 0..NUM_TILES {
        for col in 0..NUM_TILES {
            let tile = Tile::new(row, col);
            if BlockGrid::is_pillar(tile) || is_spawn_zone(tile) {
                continue;
            }
            if !rng.gen_bool(density) {
                continue;
            }
            let powerup = if rng.gen_bool(powerup_chance) {
                Some(if rng.gen_bool(0.5) {
                    PowerupKind::ExtraBomb
                } else {
                    PowerupKind::BlastSize
                })
            } else {
                None
            };
            grid.set(tile, Cell::Block(Block::destructible(powerup)));
        }
    }
    grid
}
