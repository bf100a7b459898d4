//! Bombs and the blast flood fill.

use crate::player::Player;
use crate::powerup::Powerup;
use shared::{
    circle_rectangle_collision, coord_to_tile, rectangle_collision, tile_to_rectangle, BlockGrid,
    BombView, Circle, Coord, ExplosionView, PowerupKind, Rectangle, Tile,
    BOMB_HALF_EXTENT, CHAIN_DETONATION_DELAY_MS, PLAYER_RADIUS,
};
use std::collections::{BTreeMap, HashSet, VecDeque};

#[derive(Debug, Clone, PartialEq)]
pub struct Bomb {
    pub id: u32,
    pub position: Coord,
    pub explode_at: u64,
    pub exploded: bool,
    /// Blast reach in tiles along each ray.
    pub size: u32,
    pub owner: u32,
}

impl Bomb {
    pub fn new(id: u32, position: Coord, explode_at: u64, size: u32, owner: u32) -> Self {
        Self {
            id,
            position,
            explode_at,
            exploded: false,
            size,
            owner,
        }
    }

    pub fn tile(&self) -> Tile {
        coord_to_tile(self.position)
    }

    pub fn footprint(&self) -> Rectangle {
        Rectangle::centered(self.position, BOMB_HALF_EXTENT)
    }

    pub fn overlaps(&self, other: &Bomb) -> bool {
        rectangle_collision(&self.footprint(), &other.footprint())
    }

    pub fn is_due(&self, now: u64) -> bool {
        !self.exploded && now >= self.explode_at
    }

    /// Brings the fuse forward to just after `now`; never delays it.
    pub fn shorten_fuse(&mut self, now: u64) {
        self.explode_at = self.explode_at.min(now + CHAIN_DETONATION_DELAY_MS);
    }

    pub fn view(&self) -> BombView {
        BombView {
            id: self.id,
            x: self.position.x,
            y: self.position.y,
            exploded: self.exploded,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Explosion {
    pub tiles: Vec<Tile>,
}

impl Explosion {
    pub fn view(&self) -> ExplosionView {
        ExplosionView {
            tiles: self.tiles.clone(),
        }
    }
}

/// Everything a blast can reach.
pub struct BlastTargets<'a> {
    pub players: &'a mut BTreeMap<u32, Player>,
    pub bombs: &'a mut [Bomb],
    pub grid: &'a mut BlockGrid,
    pub powerups: &'a mut [Powerup],
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Detonation {
    pub explosion: Explosion,
    /// Powerups released by destroyed blocks, not yet turned into entities.
    pub revealed: Vec<(Tile, PowerupKind)>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Ray {
    Origin,
    Step(i32, i32),
}

const DIRECTIONS: [(i32, i32); 4] = [(-1, 0), (1, 0), (0, -1), (0, 1)];

/// Floods the blast of `bomb_id` from `origin` along the four cardinal rays.
///
/// A ray ends at the map edge, after `size` tiles, or at the first solid block,
/// which is destroyed when destructible and never part of the explosion itself.
pub fn detonate(
    bomb_id: u32,
    origin: Tile,
    size: u32,
    now: u64,
    targets: BlastTargets<'_>,
) -> Detonation {
    let mut detonation = Detonation::default();
    let mut seen = HashSet::new();
    let mut queue = VecDeque::from([(origin, Ray::Origin, 0u32)]);

    while let Some((tile, ray, distance)) = queue.pop_front() {
        if !tile.in_bounds() || distance > size || !seen.insert(tile) {
            continue;
        }
        if targets.grid.solid_at(tile) {
            if let Some(kind) = targets.grid.destroy(tile) {
                detonation.revealed.push((tile, kind));
            }
            continue;
        }

        let area = tile_to_rectangle(tile);
        for player in targets.players.values_mut() {
            let body = Circle::new(player.position, PLAYER_RADIUS);
            if player.alive && circle_rectangle_collision(&body, &area) {
                player.alive = false;
            }
        }
        for bomb in targets.bombs.iter_mut() {
            if bomb.id != bomb_id
                && !bomb.exploded
                && rectangle_collision(&bomb.footprint(), &area)
            {
                bomb.shorten_fuse(now);
            }
        }
        for powerup in targets.powerups.iter_mut() {
            if powerup.is_live() && circle_rectangle_collision(&powerup.circle(), &area) {
                powerup.destroyed = true;
            }
        }
        detonation.explosion.tiles.push(tile);

        match ray {
            Ray::Origin => {
                for (dr, dc) in DIRECTIONS {
                    queue.push_back((tile.offset(dr, dc), Ray::Step(dr, dc), 1));
                }
            }
            Ray::Step(dr, dc) => queue.push_back((tile.offset(dr, dc), ray, distance + 1)),
        }
    }

    detonation
}
