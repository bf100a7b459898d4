//! # Arena Client Library
//!
//! The predicting half of the arena game. The client shows its own player
//! where it will be once the server catches up, and everyone else where they
//! were a moment ago.
//!
//! ## Architecture Overview
//!
//! ### Client-Side Prediction
//! Each local step drains the [`input::MoveBuffer`] and sends the moves to the
//! server. The same moves are replayed with the shared movement resolver on top
//! of the newest authoritative position, so the player reacts without waiting
//! for a round trip.
//!
//! ### Server Reconciliation
//! Every snapshot names the last move the server applied to us. Moves up to
//! that sequence are dropped, and the position predicted for it is pulled
//! toward the server's: small idle errors are ignored, moderate ones are
//! blended out over several frames and large ones snap.
//!
//! ### Interpolation
//! Remote players and bombs are drawn a fixed delay behind the server clock,
//! between the two buffered snapshots that bracket that moment.
//!
//! ## Module Organization
//!
//! - `game`: snapshot buffer, prediction, reconciliation, interpolation
//! - `input`: edge-triggered move buffer and keyboard capture
//! - `session`: menu, waiting room and round phases
//! - `network`: UDP task on a background tokio runtime
//! - `rendering`: macroquad drawing
//!
//! ## Usage Example
//!
//! ```rust
//! use client::game::ReconcileConfig;
//! use client::input::MoveKey;
//! use client::session::Session;
//! use shared::Packet;
//!
//! let mut session = Session::new(ReconcileConfig::default());
//! session.handle_packet(Packet::Connected { client_id: 1 }, 0);
//! assert!(session.join().is_some());
//!
//! session.moves_mut().set(MoveKey::Right, true);
//! // Nothing is sent until a round is running.
//! assert!(session.frame(100).is_none());
//! ```

pub mod game;
pub mod input;
pub mod network;
pub mod rendering;
pub mod session;
