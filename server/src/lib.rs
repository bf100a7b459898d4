//! # Arena Server Library
//!
//! The authoritative half of the arena game. It owns the only true copy of a
//! match, applies every client's moves to it at a fixed rate and tells each
//! client what the world looks like from where they stand.
//!
//! ## Architecture
//!
//! ### Single-Owner Event Loop
//! One loop owns the [`game::Match`] and its [`ticker::Ticker`]. Network tasks
//! never touch the simulation; they hand datagrams to the loop over channels,
//! where they become [`game::MatchEvent`]s applied at the top of the next step.
//!
//! ### Fixed Timestep
//! The ticker turns wall-clock time into whole simulation steps. Every third
//! step (by default) a snapshot goes to every client, and any step that
//! changes the roster or sets off a bomb flushes immediately.
//!
//! ### Phases
//! A match cycles through a lobby (`Waiting`), a round (`Playing`) and a
//! frozen scoreboard (`Done`). Each phase owns its roster and entities outright
//! and hands them to its successor on transition.
//!
//! ## Modules
//!
//! - `client_manager`: socket addresses, capacity, timeouts
//! - `config`: server, ticker and match settings
//! - `game`: the match state machine
//! - `layout`: spawn tiles and random block layouts
//! - `player`, `bomb`, `powerup`: entities of a round
//! - `ticker`: fixed-step scheduling with an injectable clock
//! - `network`: UDP tasks and the main loop
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::config::ServerConfig;
//! use server::network::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut server = Server::new(ServerConfig::default()).await?;
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

pub mod bomb;
pub mod client_manager;
pub mod config;
pub mod game;
pub mod layout;
pub mod network;
pub mod player;
pub mod powerup;
pub mod ticker;
