//! Server configuration assembled from command-line arguments.

use crate::layout::SPAWN_TILES;
use std::time::Duration;
use thiserror::Error;

/// Rules of a match. The staleness window is a hand-tuned value kept
/// configurable rather than baked in.
#[derive(Debug, Clone)]
pub struct MatchConfig {
    /// Players needed in the lobby before the countdown starts.
    pub min_players: usize,
    /// Lobby capacity; further joins spectate.
    pub max_players: usize,
    pub countdown_ms: u64,
    /// How long the final scoreboard stays up before a new lobby opens.
    pub done_hold_ms: u64,
    /// How long a player's last move keeps being replayed without new input.
    pub move_staleness_ms: u64,
    /// Pending moves beyond this supersede the oldest ones.
    pub max_pending_moves: usize,
    pub block_density: f64,
    pub powerup_chance: f64,
    /// Fixed RNG seed for reproducible layouts.
    pub seed: Option<u64>,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            min_players: 2,
            max_players: SPAWN_TILES.len(),
            countdown_ms: 3000,
            done_hold_ms: 5000,
            move_staleness_ms: 100,
            max_pending_moves: 32,
            block_density: 0.7,
            powerup_chance: 0.3,
            seed: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TickerConfig {
    /// Simulation steps per second.
    pub tick_rate: u32,
    /// Snapshots go out every this many steps unless a flush is forced.
    pub broadcast_every: u32,
    /// Steps a single poll may run before skipping ahead.
    pub max_catch_up_steps: u32,
    /// Largest `dt` handed to the simulation in one step.
    pub max_step_dt: Duration,
}

impl Default for TickerConfig {
    fn default() -> Self {
        Self {
            tick_rate: shared::TICK_RATE,
            broadcast_every: 3,
            max_catch_up_steps: 8,
            max_step_dt: Duration::from_millis(50),
        }
    }
}

impl TickerConfig {
    pub fn step(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.tick_rate as f64)
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub max_clients: usize,
    pub client_timeout: Duration,
    /// Moves accepted from one input packet; older excess is dropped.
    pub max_moves_per_packet: usize,
    pub ticker: TickerConfig,
    pub game: MatchConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            max_clients: 32,
            client_timeout: Duration::from_secs(5),
            max_moves_per_packet: 64,
            ticker: TickerConfig::default(),
            game: MatchConfig::default(),
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("tick rate must be between 1 and 1000, got {0}")]
    TickRate(u32),
    #[error("clients predict at {expected}Hz, the server cannot step at {got}Hz")]
    SharedTickRate { expected: u32, got: u32 },
    #[error("broadcast divisor must be at least 1")]
    BroadcastEvery,
    #[error("catch-up cap must be at least 1")]
    CatchUp,
    #[error("minimum players must be between 2 and {max}, got {min}")]
    MinPlayers { min: usize, max: usize },
    #[error("at most {spawns} players are supported, got {max}")]
    MaxPlayers { max: usize, spawns: usize },
    #[error("{name} must be within [0, 1], got {value}")]
    Probability { name: &'static str, value: f64 },
    #[error("server must accept at least one client")]
    MaxClients,
    #[error("pending move cap must be at least 1")]
    PendingMoves,
}

impl ServerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_clients == 0 {
            return Err(ConfigError::MaxClients);
        }
        self.ticker.validate()?;
        if self.ticker.tick_rate != shared::TICK_RATE {
            return Err(ConfigError::SharedTickRate {
                expected: shared::TICK_RATE,
                got: self.ticker.tick_rate,
            });
        }
        self.game.validate()
    }
}

impl TickerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_rate == 0 || self.tick_rate > 1000 {
            return Err(ConfigError::TickRate(self.tick_rate));
        }
        if self.broadcast_every == 0 {
            return Err(ConfigError::BroadcastEvery);
        }
        if self.max_catch_up_steps == 0 {
            return Err(ConfigError::CatchUp);
        }
        Ok(())
    }
}

impl MatchConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_players > SPAWN_TILES.len() {
            return Err(ConfigError::MaxPlayers {
                max: self.max_players,
                spawns: SPAWN_TILES.len(),
            });
        }
        if self.min_players < 2 || self.min_players > self.max_players {
            return Err(ConfigError::MinPlayers {
                min: self.min_players,
                max: self.max_players,
            });
        }
        for (name, value) in [
            ("block density", self.block_density),
            ("powerup chance", self.powerup_chance),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::Probability { name, value });
            }
        }
        if self.max_pending_moves == 0 {
            return Err(ConfigError::PendingMoves);
        }
        Ok(())
    }
}
