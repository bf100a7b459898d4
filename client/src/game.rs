//! Client-side view of the match: predicts the local player, reconciles it
//! against authoritative snapshots and interpolates everyone else.

use log::debug;
use shared::{
    distance, move_player, BlockGrid, BlockView, BombView, Coord, ExplosionView, PlayerView,
    PowerupView, SequencedMove, Snapshot, SIM_DT,
};
use std::collections::{BTreeMap, HashMap, VecDeque};

/// Thresholds for correcting the predicted player.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReconcileConfig {
    /// Below this distance an idle player keeps its predicted position.
    pub ignore_distance: f32,
    /// Fraction of the remaining error closed on every update.
    pub blend_ratio: f32,
    /// At or beyond this distance the player jumps to the server position.
    pub snap_distance: f32,
    /// How far behind the server clock remote entities are drawn.
    pub render_delay_ms: u64,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            ignore_distance: 10.0,
            blend_ratio: 0.1,
            snap_distance: 100.0,
            render_delay_ms: 100,
        }
    }
}

/// What gets drawn this frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderState {
    /// Predicted local player, absent while spectating.
    pub me: Option<PlayerView>,
    /// The local player exactly as the newest snapshot reported it.
    pub server_me: Option<PlayerView>,
    pub others: Vec<PlayerView>,
    pub bombs: Vec<BombView>,
    pub blocks: Vec<BlockView>,
    pub powerups: Vec<PowerupView>,
    pub explosions: Vec<ExplosionView>,
    pub waiting_message: Option<String>,
    pub tick_rate: f32,
}

/// How [`reconcile`] treated the gap between prediction and authority.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Correction {
    /// No earlier prediction for that sequence; the server position is taken.
    Adopted,
    Ignored,
    Blended,
    Snapped,
}

/// Rebases the position predicted for a sequence number onto the position the
/// server reported for it.
pub fn reconcile(
    predicted: Option<Coord>,
    server: Coord,
    is_moving: bool,
    config: &ReconcileConfig,
) -> (Coord, Correction) {
    let Some(predicted) = predicted else {
        return (server, Correction::Adopted);
    };

    let error = distance(&predicted, &server);
    if !is_moving && error < config.ignore_distance {
        (predicted, Correction::Ignored)
    } else if error < config.snap_distance {
        (predicted.lerp(&server, config.blend_ratio), Correction::Blended)
    } else {
        (server, Correction::Snapped)
    }
}

/// Position of `render_t` between two snapshot times, clamped to [0, 1].
pub fn interpolation_ratio(base_t: u64, next_t: u64, render_t: i64) -> f32 {
    if next_t <= base_t {
        return 0.0;
    }
    let ratio = (render_t - base_t as i64) as f64 / (next_t - base_t) as f64;
    ratio.clamp(0.0, 1.0) as f32
}

/// Moves every player in `base` toward its counterpart in `next`. Players
/// missing from `next` stay where `base` has them.
pub fn interpolate_players(
    base: &[PlayerView],
    next: &[PlayerView],
    ratio: f32,
) -> Vec<PlayerView> {
    let next_by_id: HashMap<u32, &PlayerView> = next.iter().map(|p| (p.id, p)).collect();
    base.iter()
        .map(|player| match next_by_id.get(&player.id) {
            Some(target) => {
                let at = player.position().lerp(&target.position(), ratio);
                PlayerView {
                    x: at.x,
                    y: at.y,
                    ..player.clone()
                }
            }
            None => player.clone(),
        })
        .collect()
}

pub fn interpolate_bombs(base: &[BombView], next: &[BombView], ratio: f32) -> Vec<BombView> {
    let next_by_id: HashMap<u32, &BombView> = next.iter().map(|b| (b.id, b)).collect();
    base.iter()
        .map(|bomb| match next_by_id.get(&bomb.id) {
            Some(target) => {
                let at = bomb.position().lerp(&target.position(), ratio);
                BombView {
                    x: at.x,
                    y: at.y,
                    ..bomb.clone()
                }
            }
            None => bomb.clone(),
        })
        .collect()
}

/// Remote entities of one render frame.
#[derive(Debug, Clone, Default, PartialEq)]
struct Entities {
    others: Vec<PlayerView>,
    bombs: Vec<BombView>,
    blocks: Vec<BlockView>,
    powerups: Vec<PowerupView>,
    explosions: Vec<ExplosionView>,
}

impl Entities {
    fn from_snapshot(snapshot: &Snapshot) -> Self {
        Self {
            others: snapshot.others.clone(),
            bombs: snapshot.bombs.clone(),
            blocks: snapshot.blocks.clone(),
            powerups: snapshot.powerups.clone(),
            explosions: snapshot.explosions.clone(),
        }
    }

    fn between(base: &Snapshot, next: &Snapshot, ratio: f32) -> Self {
        Self {
            others: interpolate_players(&base.others, &next.others, ratio),
            bombs: interpolate_bombs(&base.bombs, &next.bombs, ratio),
            ..Self::from_snapshot(base)
        }
    }
}

pub struct ClientGameState {
    config: ReconcileConfig,
    snapshots: VecDeque<Snapshot>,
    /// Server time of the first snapshot and the local time it arrived.
    anchor: Option<(u64, u64)>,
    local_moves: Vec<SequencedMove>,
    is_moving: bool,
    /// Predicted position after each sequence number.
    history: BTreeMap<u32, Coord>,
    render: Option<RenderState>,
}

impl ClientGameState {
    pub fn new(config: ReconcileConfig) -> Self {
        Self {
            config,
            snapshots: VecDeque::new(),
            anchor: None,
            local_moves: Vec::new(),
            is_moving: false,
            history: BTreeMap::new(),
            render: None,
        }
    }

    pub fn snapshot_count(&self) -> usize {
        self.snapshots.len()
    }

    pub fn pending_moves(&self) -> &[SequencedMove] {
        &self.local_moves
    }

    pub fn predicted_at(&self, sequence: u32) -> Option<Coord> {
        self.history.get(&sequence).copied()
    }

    pub fn render_state(&self) -> Option<&RenderState> {
        self.render.as_ref()
    }

    /// Queues moves that were just sent so they are replayed on top of every
    /// snapshot until the server acknowledges them. The newest move decides
    /// whether the player counts as moving.
    pub fn add_local_moves(&mut self, moves: &[SequencedMove]) {
        if let Some(newest) = moves.last() {
            self.is_moving = newest.mv.is_moving();
        }
        self.local_moves.extend_from_slice(moves);
    }

    /// Buffers a snapshot received at local time `now_ms`. Snapshots not newer
    /// than the last buffered one are dropped.
    pub fn add_snapshot(&mut self, snapshot: Snapshot, now_ms: u64) {
        if let Some(latest) = self.snapshots.back() {
            if snapshot.t <= latest.t {
                debug!(
                    "Dropping stale snapshot t={} (latest t={})",
                    snapshot.t, latest.t
                );
                return;
            }
        }
        if self.anchor.is_none() {
            self.anchor = Some((snapshot.t, now_ms));
        }
        self.snapshots.push_back(snapshot);
    }

    /// Forgets unacknowledged moves and predictions, keeping the snapshots.
    pub fn reset_prediction(&mut self) {
        self.local_moves.clear();
        self.history.clear();
        self.is_moving = false;
    }

    /// Forgets everything, including the server clock anchor.
    pub fn clear(&mut self) {
        self.reset_prediction();
        self.snapshots.clear();
        self.anchor = None;
        self.render = None;
    }

    /// Server time remote entities are drawn at for local time `now_ms`.
    pub fn render_time(&self, now_ms: u64) -> Option<i64> {
        let (server_t, local_ms) = self.anchor?;
        let elapsed = now_ms as i64 - local_ms as i64;
        Some(server_t as i64 + elapsed - self.config.render_delay_ms as i64)
    }

    /// Builds the frame for local time `now_ms`.
    pub fn update(&mut self, now_ms: u64) -> Option<&RenderState> {
        let render_t = self.render_time(now_ms)?;

        if let Some(newest_due) = self
            .snapshots
            .iter()
            .rposition(|s| s.t as i64 <= render_t)
        {
            self.snapshots.drain(..newest_due);
        }

        let entities = match (self.snapshots.front(), self.snapshots.get(1)) {
            (Some(base), Some(next)) => {
                let ratio = interpolation_ratio(base.t, next.t, render_t);
                Entities::between(base, next, ratio)
            }
            (Some(only), None) => Entities::from_snapshot(only),
            (None, _) => return None,
        };

        let latest = self.snapshots.back()?;
        let server_me = latest.me.clone();
        let waiting_message = latest.waiting_message.clone();
        let tick_rate = latest.tick_rate;

        let me = match &server_me {
            Some(server_me) => Some(self.predict(server_me, &entities)),
            None => None,
        };

        self.render = Some(RenderState {
            me,
            server_me,
            others: entities.others,
            bombs: entities.bombs,
            blocks: entities.blocks,
            powerups: entities.powerups,
            explosions: entities.explosions,
            waiting_message,
            tick_rate,
        });
        self.render.as_ref()
    }

    /// Corrects the prediction for the acknowledged sequence and replays every
    /// move the server has not applied yet.
    fn predict(&mut self, server_me: &PlayerView, entities: &Entities) -> PlayerView {
        let acked = server_me.sequence;
        let (base, correction) = reconcile(
            self.history.get(&acked).copied(),
            server_me.position(),
            self.is_moving,
            &self.config,
        );
        if correction == Correction::Snapped {
            debug!(
                "Snapping to server position ({:.1}, {:.1}) at sequence {}",
                base.x, base.y, acked
            );
        }
        self.history.insert(acked, base);

        self.local_moves.retain(|m| m.sequence > acked);
        self.history.retain(|sequence, _| *sequence >= acked);

        let grid = BlockGrid::from_views(&entities.blocks);
        let bombs: Vec<Coord> = entities
            .bombs
            .iter()
            .filter(|b| !b.exploded)
            .map(|b| b.position())
            .collect();

        let mut position = base;
        for sm in &self.local_moves {
            position = move_player(position, SIM_DT, &sm.mv, &grid, &bombs);
            self.history.insert(sm.sequence, position);
        }

        PlayerView {
            x: position.x,
            y: position.y,
            ..server_me.clone()
        }
    }
}

impl Default for ClientGameState {
    fn default() -> Self {
        Self::new(ReconcileConfig::default())
    }
}
