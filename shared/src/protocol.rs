//! Wire protocol between clients and the server. One `Packet` per datagram,
//! encoded with bincode.

use crate::geometry::Coord;
use crate::MAX_NAME_LEN;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Largest datagram either side will produce or accept.
pub const MAX_PACKET_SIZE: usize = 16 * 1024;

/// Movement and bomb intents held at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Move {
    pub left: bool,
    pub right: bool,
    pub up: bool,
    pub down: bool,
    pub bomb: bool,
}

impl Move {
    /// Unit direction per axis; opposing intents cancel to zero.
    pub fn direction(&self) -> (f32, f32) {
        let x = match (self.left, self.right) {
            (true, false) => -1.0,
            (false, true) => 1.0,
            _ => 0.0,
        };
        let y = match (self.up, self.down) {
            (true, false) => -1.0,
            (false, true) => 1.0,
            _ => 0.0,
        };
        (x, y)
    }

    pub fn is_idle(&self) -> bool {
        *self == Move::default()
    }

    pub fn is_moving(&self) -> bool {
        self.left || self.right || self.up || self.down
    }

    /// The same move without the bomb trigger.
    pub fn without_bomb(&self) -> Move {
        Move {
            bomb: false,
            ..*self
        }
    }
}

/// A move tagged with its client-local, strictly increasing sequence number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequencedMove {
    pub sequence: u32,
    pub mv: Move,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PowerupKind {
    /// One more bomb on the field at a time.
    ExtraBomb,
    /// Blasts reach one more tile.
    BlastSize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerView {
    pub id: u32,
    pub name: String,
    pub x: f32,
    pub y: f32,
    pub alive: bool,
    pub max_bombs: u32,
    pub bomb_size: u32,
    /// Last move sequence the server applied to this player.
    pub sequence: u32,
}

impl PlayerView {
    pub fn position(&self) -> Coord {
        Coord::new(self.x, self.y)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BombView {
    pub id: u32,
    pub x: f32,
    pub y: f32,
    pub exploded: bool,
}

impl BombView {
    pub fn position(&self) -> Coord {
        Coord::new(self.x, self.y)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockView {
    pub row: i32,
    pub col: i32,
    pub destructible: bool,
    pub destroyed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PowerupView {
    pub id: u32,
    pub x: f32,
    pub y: f32,
    pub kind: PowerupKind,
    pub destroyed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExplosionView {
    pub tiles: Vec<crate::geometry::Tile>,
}

/// Authoritative world state for one recipient at one tick.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Snapshot {
    /// Server simulation time in milliseconds.
    pub t: u64,
    pub tick_rate: f32,
    pub waiting_message: Option<String>,
    pub me: Option<PlayerView>,
    pub others: Vec<PlayerView>,
    pub bombs: Vec<BombView>,
    pub blocks: Vec<BlockView>,
    pub powerups: Vec<PowerupView>,
    pub explosions: Vec<ExplosionView>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub enum Packet {
    Connect { client_version: u32 },
    Join { name: String },
    Spectate,
    Input { moves: Vec<SequencedMove> },
    Disconnect,
    /// Keepalive; `timestamp` is the sender's local clock in milliseconds.
    Ping { timestamp: u64 },

    Connected { client_id: u32 },
    Rejected { reason: String },
    Snapshot(Box<Snapshot>),
    GameOver,
    /// Echo of a [`Packet::Ping`] timestamp.
    Pong { timestamp: u64 },
}

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("packet of {0} bytes exceeds the datagram size limit")]
    TooLarge(usize),
    #[error("malformed packet: {0}")]
    Malformed(#[from] bincode::Error),
}

pub fn encode_packet(packet: &Packet) -> Result<Vec<u8>, ProtocolError> {
    let data = bincode::serialize(packet)?;
    if data.len() > MAX_PACKET_SIZE {
        return Err(ProtocolError::TooLarge(data.len()));
    }
    Ok(data)
}

pub fn decode_packet(data: &[u8]) -> Result<Packet, ProtocolError> {
    if data.len() > MAX_PACKET_SIZE {
        return Err(ProtocolError::TooLarge(data.len()));
    }
    Ok(bincode::deserialize(data)?)
}

/// Trims, strips control characters and bounds the length of a display name.
pub fn sanitize_name(raw: &str) -> String {
    let cleaned: String = raw
        .trim()
        .chars()
        .filter(|c| !c.is_control())
        .take(MAX_NAME_LEN)
        .collect();
    if cleaned.is_empty() {
        "anonymous".to_string()
    } else {
        cleaned
    }
}
