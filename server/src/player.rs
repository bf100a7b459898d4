use crate::bomb::Bomb;
use shared::{
    coord_to_tile, move_player, tile_to_coord, BlockGrid, Coord, Move, PlayerView, PowerupKind,
    SequencedMove, BOMB_COOLDOWN_MS, BOMB_FUSE_MS, STARTING_BOMBS, STARTING_BOMB_SIZE,
};

/// A move waiting to be applied, stamped with the server time it arrived.
#[derive(Debug, Clone, Copy, PartialEq)]
struct PendingMove {
    sequenced: SequencedMove,
    received_at: u64,
}

/// Server-side state of one participating player.
#[derive(Debug, Clone)]
pub struct Player {
    pub id: u32,
    pub name: String,
    pub position: Coord,
    pub alive: bool,
    pub max_bombs: u32,
    pub bomb_size: u32,
    /// Bombs of this player currently on the field.
    pub bombs_placed: u32,
    /// Earliest time the next bomb may be placed.
    pub next_bomb_at: u64,
    pending: Vec<PendingMove>,
    last_applied: Option<PendingMove>,
}

impl Player {
    pub fn new(id: u32, name: String, position: Coord) -> Self {
        Self {
            id,
            name,
            position,
            alive: true,
            max_bombs: STARTING_BOMBS,
            bomb_size: STARTING_BOMB_SIZE,
            bombs_placed: 0,
            next_bomb_at: 0,
            pending: Vec::new(),
            last_applied: None,
        }
    }

    /// Sequence number of the last move applied, 0 before any.
    pub fn last_sequence(&self) -> u32 {
        self.last_applied
            .map(|applied| applied.sequenced.sequence)
            .unwrap_or(0)
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Buffers incoming moves in sequence order. Replays of already applied or
    /// already queued sequences are dropped, and a backlog over `max_pending`
    /// loses its oldest entries.
    pub fn queue_moves(&mut self, moves: &[SequencedMove], now: u64, max_pending: usize) {
        let applied = self.last_sequence();
        for sequenced in moves {
            if sequenced.sequence <= applied
                || self
                    .pending
                    .iter()
                    .any(|p| p.sequenced.sequence == sequenced.sequence)
            {
                continue;
            }
            self.pending.push(PendingMove {
                sequenced: *sequenced,
                received_at: now,
            });
        }
        self.pending.sort_by_key(|p| p.sequenced.sequence);
        if self.pending.len() > max_pending {
            let excess = self.pending.len() - max_pending;
            self.pending.drain(..excess);
        }
    }

    /// The move to apply this tick: the oldest pending one, else the last one
    /// (without its bomb trigger) while it is younger than `staleness_ms`.
    pub fn next_move(&mut self, now: u64, staleness_ms: u64) -> Option<Move> {
        if !self.pending.is_empty() {
            let next = self.pending.remove(0);
            self.last_applied = Some(next);
            return Some(next.sequenced.mv);
        }
        self.last_applied
            .filter(|last| now.saturating_sub(last.received_at) <= staleness_ms)
            .map(|last| last.sequenced.mv.without_bomb())
    }

    /// Applies at most one move. Returns whether it asked for a bomb.
    pub fn update(
        &mut self,
        now: u64,
        dt: f32,
        grid: &BlockGrid,
        bombs: &[Coord],
        staleness_ms: u64,
    ) -> bool {
        if !self.alive {
            return false;
        }
        let Some(mv) = self.next_move(now, staleness_ms) else {
            return false;
        };
        self.position = move_player(self.position, dt, &mv, grid, bombs);
        mv.bomb
    }

    /// Places a bomb on the player's tile when capacity, cooldown and the
    /// footprints of `existing` bombs allow it.
    pub fn try_place_bomb(&mut self, now: u64, existing: &[Bomb], bomb_id: u32) -> Option<Bomb> {
        if !self.alive || self.bombs_placed >= self.max_bombs || now < self.next_bomb_at {
            return None;
        }
        let at = tile_to_coord(coord_to_tile(self.position));
        let candidate = Bomb::new(bomb_id, at, now + BOMB_FUSE_MS, self.bomb_size, self.id);
        if existing
            .iter()
            .any(|bomb| !bomb.exploded && bomb.overlaps(&candidate))
        {
            return None;
        }
        self.bombs_placed += 1;
        self.next_bomb_at = now + BOMB_COOLDOWN_MS;
        Some(candidate)
    }

    pub fn bomb_detonated(&mut self) {
        self.bombs_placed = self.bombs_placed.saturating_sub(1);
    }

    pub fn collect(&mut self, kind: PowerupKind) {
        match kind {
            PowerupKind::ExtraBomb => self.max_bombs += 1,
            PowerupKind::BlastSize => self.bomb_size += 1,
        }
    }

    pub fn view(&self) -> PlayerView {
        PlayerView {
            id: self.id,
            name: self.name.clone(),
            x: self.position.x,
            y: self.position.y,
            alive: self.alive,
            max_bombs: self.max_bombs,
            bomb_size: self.bomb_size,
            sequence: self.last_sequence(),
        }
    }
}
