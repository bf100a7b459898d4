//! The authoritative match: a lobby, a round and a scoreboard, one roster
//! carried through all three.

use crate::bomb::{detonate, BlastTargets, Bomb, Explosion};
use crate::config::MatchConfig;
use crate::layout::{generate_grid, spawn_tile};
use crate::player::Player;
use crate::powerup::Powerup;
use crate::ticker::FixedStep;
use log::{debug, info};
use rand::rngs::StdRng;
use rand::SeedableRng;
use shared::{
    circle_collision, sanitize_name, tile_to_coord, BlockGrid, Circle, Coord,
    ExplosionView, Packet, PlayerView, SequencedMove, Snapshot, PLAYER_RADIUS,
};
use std::collections::{BTreeMap, BTreeSet, VecDeque};

pub type ClientId = u32;

/// Roster and input changes coming from the network, applied at the top of a step.
#[derive(Debug, Clone, PartialEq)]
pub enum MatchEvent {
    Join { client_id: ClientId, name: String },
    Spectate { client_id: ClientId },
    Input { client_id: ClientId, moves: Vec<SequencedMove> },
    Disconnect { client_id: ClientId },
}

/// A packet addressed to one client.
#[derive(Debug, Clone, PartialEq)]
pub struct Outbound {
    pub client_id: ClientId,
    pub packet: Packet,
}

/// What a phase may touch while it advances.
pub struct StepContext<'a> {
    pub now: u64,
    pub dt: f32,
    pub config: &'a MatchConfig,
    pub rng: &'a mut StdRng,
    pub outbox: &'a mut Vec<Outbound>,
    /// Set when clients should get a snapshot this step.
    pub force_flush: bool,
}

#[derive(Debug, Clone)]
pub enum Phase {
    Waiting(WaitingPhase),
    Playing(PlayingPhase),
    Done(DonePhase),
}

impl Phase {
    pub fn name(&self) -> &'static str {
        match self {
            Phase::Waiting(_) => "waiting",
            Phase::Playing(_) => "playing",
            Phase::Done(_) => "done",
        }
    }

    fn apply(&mut self, event: MatchEvent, ctx: &mut StepContext<'_>) {
        match self {
            Phase::Waiting(phase) => phase.apply(event, ctx),
            Phase::Playing(phase) => phase.apply(event, ctx),
            Phase::Done(phase) => phase.apply(event, ctx),
        }
    }

    /// Runs one step of the active phase and returns its successor, if any.
    pub fn advance(&mut self, ctx: &mut StepContext<'_>) -> Option<Phase> {
        match self {
            Phase::Waiting(phase) => phase.advance(ctx),
            Phase::Playing(phase) => phase.advance(ctx),
            Phase::Done(phase) => phase.advance(ctx),
        }
    }

    /// Every client that receives snapshots, players and spectators alike.
    pub fn recipients(&self) -> Vec<ClientId> {
        let (players, spectators): (Vec<ClientId>, &BTreeSet<ClientId>) = match self {
            Phase::Waiting(phase) => (phase.players.keys().copied().collect(), &phase.spectators),
            Phase::Playing(phase) => (phase.players.keys().copied().collect(), &phase.spectators),
            Phase::Done(phase) => (phase.players.keys().copied().collect(), &phase.spectators),
        };
        players
            .into_iter()
            .chain(spectators.iter().copied())
            .collect()
    }

    fn take_explosions(&mut self) -> Vec<ExplosionView> {
        let explosions = match self {
            Phase::Waiting(_) => return Vec::new(),
            Phase::Playing(phase) => &mut phase.explosions,
            Phase::Done(phase) => &mut phase.explosions,
        };
        explosions.drain(..).map(|e| e.view()).collect()
    }

    pub fn snapshot_for(
        &self,
        client_id: ClientId,
        now: u64,
        config: &MatchConfig,
        explosions: &[ExplosionView],
    ) -> Snapshot {
        let mut snapshot = match self {
            Phase::Waiting(phase) => phase.snapshot_for(client_id, now, config),
            Phase::Playing(phase) => phase.snapshot_for(client_id),
            Phase::Done(phase) => phase.snapshot_for(client_id),
        };
        snapshot.t = now;
        snapshot.explosions = explosions.to_vec();
        snapshot
    }
}

/// Splits `views` into the recipient's own player and everyone else.
fn split_views(
    client_id: ClientId,
    views: impl Iterator<Item = PlayerView>,
) -> (Option<PlayerView>, Vec<PlayerView>) {
    let mut me = None;
    let mut others = Vec::new();
    for view in views {
        if view.id == client_id {
            me = Some(view);
        } else {
            others.push(view);
        }
    }
    (me, others)
}

#[derive(Debug, Clone, Default)]
pub struct WaitingPhase {
    /// Clients who intend to play, with their display names.
    pub players: BTreeMap<ClientId, String>,
    pub spectators: BTreeSet<ClientId>,
    pub countdown_started: Option<u64>,
}

impl WaitingPhase {
    pub fn new() -> Self {
        Self::default()
    }

    /// A lobby where everyone from the last round starts out spectating.
    pub fn with_spectators(spectators: impl IntoIterator<Item = ClientId>) -> Self {
        Self {
            spectators: spectators.into_iter().collect(),
            ..Self::default()
        }
    }

    fn apply(&mut self, event: MatchEvent, ctx: &mut StepContext<'_>) {
        match event {
            MatchEvent::Join { client_id, name } => {
                let name = sanitize_name(&name);
                if self.players.contains_key(&client_id)
                    || self.players.len() < ctx.config.max_players
                {
                    self.spectators.remove(&client_id);
                    info!("{} joined the lobby as client {}", name, client_id);
                    self.players.insert(client_id, name);
                } else {
                    info!("Lobby full, client {} spectates", client_id);
                    self.spectators.insert(client_id);
                }
            }
            MatchEvent::Spectate { client_id } => {
                self.players.remove(&client_id);
                self.spectators.insert(client_id);
            }
            MatchEvent::Disconnect { client_id } => {
                self.players.remove(&client_id);
                self.spectators.remove(&client_id);
            }
            MatchEvent::Input { .. } => return,
        }
        ctx.force_flush = true;
    }

    fn advance(&mut self, ctx: &mut StepContext<'_>) -> Option<Phase> {
        if self.players.len() < ctx.config.min_players {
            if self.countdown_started.take().is_some() {
                info!("Countdown cancelled, {} players left", self.players.len());
                ctx.force_flush = true;
            }
            return None;
        }

        match self.countdown_started {
            None => {
                info!("Countdown started with {} players", self.players.len());
                self.countdown_started = Some(ctx.now);
                ctx.force_flush = true;
                None
            }
            Some(started) if ctx.now.saturating_sub(started) >= ctx.config.countdown_ms => {
                Some(Phase::Playing(PlayingPhase::start(self, ctx)))
            }
            Some(_) => None,
        }
    }

    pub fn message(&self, now: u64, config: &MatchConfig) -> String {
        if self.players.len() < config.min_players {
            return format!(
                "Waiting for {} more player(s)...",
                config.min_players - self.players.len()
            );
        }
        let elapsed = self
            .countdown_started
            .map(|started| now.saturating_sub(started))
            .unwrap_or(0);
        let remaining_ms = config.countdown_ms.saturating_sub(elapsed);
        format!("Game starts in {}...", remaining_ms.div_ceil(1000))
    }

    /// Lobby members shown on the spawn tiles they will start from.
    fn lobby_views(&self) -> impl Iterator<Item = PlayerView> + '_ {
        self.players.iter().enumerate().map(|(index, (id, name))| {
            let at = tile_to_coord(spawn_tile(index));
            PlayerView {
                id: *id,
                name: name.clone(),
                x: at.x,
                y: at.y,
                alive: true,
                max_bombs: shared::STARTING_BOMBS,
                bomb_size: shared::STARTING_BOMB_SIZE,
                sequence: 0,
            }
        })
    }

    fn snapshot_for(&self, client_id: ClientId, now: u64, config: &MatchConfig) -> Snapshot {
        let (me, others) = split_views(client_id, self.lobby_views());
        Snapshot {
            waiting_message: Some(self.message(now, config)),
            me,
            others,
            blocks: BlockGrid::with_pillars().views(),
            ..Snapshot::default()
        }
    }
}

#[derive(Debug, Clone)]
pub struct PlayingPhase {
    pub players: BTreeMap<ClientId, Player>,
    pub spectators: BTreeSet<ClientId>,
    pub bombs: Vec<Bomb>,
    pub grid: BlockGrid,
    pub powerups: Vec<Powerup>,
    /// Detonations not yet announced to clients.
    pub explosions: Vec<Explosion>,
    next_entity_id: u32,
}

impl PlayingPhase {
    /// A round over `players`, spawned in order on the spawn tiles.
    pub fn new(
        players: impl IntoIterator<Item = (ClientId, String)>,
        spectators: BTreeSet<ClientId>,
        grid: BlockGrid,
    ) -> Self {
        let players = players
            .into_iter()
            .enumerate()
            .map(|(index, (id, name))| {
                (id, Player::new(id, name, tile_to_coord(spawn_tile(index))))
            })
            .collect();
        Self {
            players,
            spectators,
            bombs: Vec::new(),
            grid,
            powerups: Vec::new(),
            explosions: Vec::new(),
            next_entity_id: 1,
        }
    }

    fn start(lobby: &mut WaitingPhase, ctx: &mut StepContext<'_>) -> Self {
        let grid = generate_grid(
            ctx.rng,
            ctx.config.block_density,
            ctx.config.powerup_chance,
        );
        info!(
            "Match started with {} players and {} blocks",
            lobby.players.len(),
            grid.block_count()
        );
        Self::new(
            std::mem::take(&mut lobby.players),
            std::mem::take(&mut lobby.spectators),
            grid,
        )
    }

    fn next_id(&mut self) -> u32 {
        let id = self.next_entity_id;
        self.next_entity_id += 1;
        id
    }

    fn apply(&mut self, event: MatchEvent, ctx: &mut StepContext<'_>) {
        match event {
            MatchEvent::Join { client_id, .. } => {
                if self.players.contains_key(&client_id) {
                    return;
                }
                info!("Client {} joined mid-match, spectating", client_id);
                self.spectators.insert(client_id);
            }
            MatchEvent::Spectate { client_id } => {
                if self.players.remove(&client_id).is_some() {
                    info!("Client {} left the round to spectate", client_id);
                }
                self.spectators.insert(client_id);
            }
            MatchEvent::Input { client_id, moves } => {
                if let Some(player) = self.players.get_mut(&client_id) {
                    player.queue_moves(&moves, ctx.now, ctx.config.max_pending_moves);
                }
                return;
            }
            MatchEvent::Disconnect { client_id } => {
                self.players.remove(&client_id);
                self.spectators.remove(&client_id);
            }
        }
        ctx.force_flush = true;
    }

    fn advance(&mut self, ctx: &mut StepContext<'_>) -> Option<Phase> {
        let now = ctx.now;

        // Leftovers of the previous step are gone for good.
        self.powerups.retain(Powerup::is_live);
        self.grid.prune_destroyed();

        let bomb_positions: Vec<Coord> = self.bombs.iter().map(|b| b.position).collect();
        let ids: Vec<ClientId> = self.players.keys().copied().collect();
        for id in ids {
            let Some(player) = self.players.get_mut(&id) else {
                continue;
            };
            let wants_bomb = player.update(
                now,
                ctx.dt,
                &self.grid,
                &bomb_positions,
                ctx.config.move_staleness_ms,
            );
            if !wants_bomb {
                continue;
            }
            let bomb_id = self.next_entity_id;
            if let Some(bomb) = player.try_place_bomb(now, &self.bombs, bomb_id) {
                debug!("Player {} placed bomb {}", id, bomb_id);
                self.next_entity_id += 1;
                self.bombs.push(bomb);
                ctx.force_flush = true;
            }
        }

        for player in self.players.values_mut() {
            let body = Circle::new(player.position, PLAYER_RADIUS);
            for powerup in self.powerups.iter_mut() {
                if powerup.is_live() && circle_collision(&body, &powerup.circle()) {
                    powerup.used = true;
                    player.collect(powerup.kind);
                    ctx.force_flush = true;
                }
            }
        }

        for index in 0..self.bombs.len() {
            if !self.bombs[index].is_due(now) {
                continue;
            }
            self.bombs[index].exploded = true;
            let (bomb_id, origin, size, owner) = {
                let bomb = &self.bombs[index];
                (bomb.id, bomb.tile(), bomb.size, bomb.owner)
            };
            if let Some(owner) = self.players.get_mut(&owner) {
                owner.bomb_detonated();
            }
            let detonation = detonate(
                bomb_id,
                origin,
                size,
                now,
                BlastTargets {
                    players: &mut self.players,
                    bombs: &mut self.bombs,
                    grid: &mut self.grid,
                    powerups: &mut self.powerups,
                },
            );
            for (tile, kind) in detonation.revealed {
                let id = self.next_id();
                self.powerups.push(Powerup::new(id, tile, kind));
            }
            self.explosions.push(detonation.explosion);
            ctx.force_flush = true;
        }
        self.bombs.retain(|bomb| !bomb.exploded);

        let dead: Vec<ClientId> = self
            .players
            .iter()
            .filter(|(_, player)| !player.alive)
            .map(|(id, _)| *id)
            .collect();
        for id in dead {
            if let Some(player) = self.players.remove(&id) {
                info!("{} was blown up", player.name);
            }
            self.spectators.insert(id);
            ctx.outbox.push(Outbound {
                client_id: id,
                packet: Packet::GameOver,
            });
            ctx.force_flush = true;
        }

        if self.players.len() <= 1 {
            return Some(Phase::Done(DonePhase::finish(self, now)));
        }
        None
    }

    fn snapshot_for(&self, client_id: ClientId) -> Snapshot {
        let (me, others) = split_views(client_id, self.players.values().map(Player::view));
        Snapshot {
            me,
            others,
            bombs: self.bombs.iter().map(Bomb::view).collect(),
            blocks: self.grid.views(),
            powerups: self
                .powerups
                .iter()
                .filter(|p| !p.used)
                .map(Powerup::view)
                .collect(),
            ..Snapshot::default()
        }
    }
}

/// The frozen end of a round.
#[derive(Debug, Clone)]
pub struct DonePhase {
    pub started_at: u64,
    pub message: String,
    /// Survivors as they stood when the round ended.
    pub players: BTreeMap<ClientId, PlayerView>,
    pub spectators: BTreeSet<ClientId>,
    pub explosions: Vec<Explosion>,
    frame: Snapshot,
}

impl DonePhase {
    fn finish(round: &mut PlayingPhase, now: u64) -> Self {
        let message = match round.players.values().next() {
            Some(winner) => format!("{} wins!", winner.name),
            None => "Draw!".to_string(),
        };
        info!("Match over: {}", message);
        let frame = round.snapshot_for(0);
        Self {
            started_at: now,
            message,
            players: round
                .players
                .iter()
                .map(|(id, player)| (*id, player.view()))
                .collect(),
            spectators: std::mem::take(&mut round.spectators),
            explosions: std::mem::take(&mut round.explosions),
            frame,
        }
    }

    fn apply(&mut self, event: MatchEvent, ctx: &mut StepContext<'_>) {
        match event {
            MatchEvent::Join { client_id, .. } | MatchEvent::Spectate { client_id } => {
                if self.players.contains_key(&client_id) {
                    return;
                }
                self.spectators.insert(client_id);
            }
            MatchEvent::Disconnect { client_id } => {
                self.players.remove(&client_id);
                self.spectators.remove(&client_id);
            }
            MatchEvent::Input { .. } => return,
        }
        ctx.force_flush = true;
    }

    fn advance(&mut self, ctx: &mut StepContext<'_>) -> Option<Phase> {
        if ctx.now.saturating_sub(self.started_at) < ctx.config.done_hold_ms {
            return None;
        }
        let everyone = self
            .players
            .keys()
            .copied()
            .chain(self.spectators.iter().copied());
        Some(Phase::Waiting(WaitingPhase::with_spectators(everyone)))
    }

    fn snapshot_for(&self, client_id: ClientId) -> Snapshot {
        let (me, others) = split_views(client_id, self.players.values().cloned());
        Snapshot {
            waiting_message: Some(self.message.clone()),
            me,
            others,
            ..self.frame.clone()
        }
    }
}

/// One match server-side: the active phase plus everything that outlives it.
pub struct Match {
    config: MatchConfig,
    phase: Phase,
    rng: StdRng,
    events: VecDeque<MatchEvent>,
    outbox: Vec<Outbound>,
    flush_requested: bool,
    now: u64,
}

impl Match {
    pub fn new(config: MatchConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            config,
            phase: Phase::Waiting(WaitingPhase::new()),
            rng,
            events: VecDeque::new(),
            outbox: Vec::new(),
            flush_requested: false,
            now: 0,
        }
    }

    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    /// The running round, if any.
    pub fn playing_mut(&mut self) -> Option<&mut PlayingPhase> {
        match &mut self.phase {
            Phase::Playing(phase) => Some(phase),
            _ => None,
        }
    }

    pub fn now(&self) -> u64 {
        self.now
    }

    pub fn enqueue(&mut self, event: MatchEvent) {
        self.events.push_back(event);
    }

    /// Back to an empty lobby.
    pub fn reset(&mut self) {
        info!("Resetting match");
        self.phase = Phase::Waiting(WaitingPhase::new());
        self.flush_requested = true;
    }

    /// Applies queued events, then advances the active phase by one step.
    pub fn step(&mut self, now: u64, dt: f32) {
        self.now = now;
        let mut ctx = StepContext {
            now,
            dt,
            config: &self.config,
            rng: &mut self.rng,
            outbox: &mut self.outbox,
            force_flush: false,
        };

        while let Some(event) = self.events.pop_front() {
            self.phase.apply(event, &mut ctx);
        }

        if let Some(next) = self.phase.advance(&mut ctx) {
            info!("Phase {} -> {}", self.phase.name(), next.name());
            self.phase = next;
            ctx.force_flush = true;
        }
        self.flush_requested |= ctx.force_flush;

        let abandoned = self.phase.recipients().is_empty();
        if abandoned && !matches!(self.phase, Phase::Waiting(_)) {
            self.reset();
        }
    }

    pub fn wants_flush(&self) -> bool {
        self.flush_requested
    }

    /// Pending direct packets followed by one snapshot per recipient.
    pub fn flush(&mut self, now: u64, tick_rate: f32) -> Vec<Outbound> {
        self.flush_requested = false;
        let explosions = self.phase.take_explosions();
        let mut outbound = std::mem::take(&mut self.outbox);
        for client_id in self.phase.recipients() {
            let mut snapshot = self
                .phase
                .snapshot_for(client_id, now, &self.config, &explosions);
            snapshot.tick_rate = tick_rate;
            outbound.push(Outbound {
                client_id,
                packet: Packet::Snapshot(Box::new(snapshot)),
            });
        }
        outbound
    }
}

impl FixedStep for Match {
    type Output = Outbound;

    fn step(&mut self, now_ms: u64, dt: f32) {
        Match::step(self, now_ms, dt);
    }

    fn wants_flush(&self) -> bool {
        Match::wants_flush(self)
    }

    fn flush(&mut self, now_ms: u64, tick_rate: f32) -> Vec<Outbound> {
        Match::flush(self, now_ms, tick_rate)
    }
}
