//! Code shared verbatim by the authoritative server and the predicting client:
//! map constants, tile/coordinate geometry, the block grid, the movement
//! resolver and the wire protocol.

pub mod geometry;
pub mod grid;
pub mod movement;
pub mod protocol;

pub use geometry::{
    circle_collision, circle_rectangle_collision, clamp_to_map, coord_to_tile, distance,
    rectangle_collision, tile_to_coord, tile_to_rectangle, Circle, Coord, Rectangle, Tile,
};
pub use grid::{Block, BlockGrid, Cell};
pub use movement::move_player;
pub use protocol::{
    decode_packet, encode_packet, sanitize_name, BlockView, BombView, ExplosionView, Move, Packet,
    PlayerView, PowerupKind, PowerupView, ProtocolError, SequencedMove, Snapshot, MAX_PACKET_SIZE,
};

pub const NUM_TILES: i32 = 15;
pub const TILE_SIZE: f32 = 50.0;
pub const MAP_SIZE: f32 = NUM_TILES as f32 * TILE_SIZE;

pub const PLAYER_RADIUS: f32 = 20.0;
pub const PLAYER_SPEED: f32 = 200.0;

/// Half the side of a bomb's square footprint.
pub const BOMB_HALF_EXTENT: f32 = 22.0;
pub const POWERUP_RADIUS: f32 = 15.0;

pub const BOMB_FUSE_MS: u64 = 2000;
/// Fuse a blast leaves on any other bomb it reaches, so chains stagger by a tick.
pub const CHAIN_DETONATION_DELAY_MS: u64 = 1;
/// Slightly less than the 250ms a player needs to cross one tile.
pub const BOMB_COOLDOWN_MS: u64 = 200;
pub const STARTING_BOMBS: u32 = 1;
pub const STARTING_BOMB_SIZE: u32 = 2;

pub const TICK_RATE: u32 = 60;
pub const SIM_DT: f32 = 1.0 / TICK_RATE as f32;

pub const CLIENT_VERSION: u32 = 1;
pub const MAX_NAME_LEN: usize = 16;
