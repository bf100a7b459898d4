//! Coarse client state: which screen is up, when to join, spectate or send
//! input, and how server packets move the client between screens.

use crate::game::{ClientGameState, ReconcileConfig, RenderState};
use crate::input::MoveBuffer;
use log::{info, warn};
use shared::{sanitize_name, Packet, SequencedMove, MAX_NAME_LEN, TICK_RATE};

/// Most local steps one frame may emit after a stall.
const MAX_STEPS_PER_FRAME: u32 = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Entering a name.
    Menu,
    /// Joined or spectating while the server is in its lobby or showing a result.
    WaitingRoom,
    /// A round is running.
    Playing,
}

pub struct Session {
    phase: SessionPhase,
    name: String,
    client_id: Option<u32>,
    spectating: bool,
    /// Whether the server has shown us our own player since the last join.
    seen_self: bool,
    rejection: Option<String>,
    moves: MoveBuffer,
    game: ClientGameState,
    step_ms: f64,
    accumulator_ms: f64,
    last_frame_ms: Option<u64>,
}

impl Session {
    pub fn new(config: ReconcileConfig) -> Self {
        Self {
            phase: SessionPhase::Menu,
            name: String::new(),
            client_id: None,
            spectating: false,
            seen_self: false,
            rejection: None,
            moves: MoveBuffer::new(),
            game: ClientGameState::new(config),
            step_ms: 1000.0 / TICK_RATE as f64,
            accumulator_ms: 0.0,
            last_frame_ms: None,
        }
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn client_id(&self) -> Option<u32> {
        self.client_id
    }

    pub fn is_spectating(&self) -> bool {
        self.spectating
    }

    pub fn rejection(&self) -> Option<&str> {
        self.rejection.as_deref()
    }

    pub fn game(&self) -> &ClientGameState {
        &self.game
    }

    pub fn moves_mut(&mut self) -> &mut MoveBuffer {
        &mut self.moves
    }

    /// Whether keyboard input should currently be captured.
    pub fn wants_input(&self) -> bool {
        self.phase == SessionPhase::Playing && !self.spectating
    }

    pub fn push_char(&mut self, c: char) {
        if self.phase == SessionPhase::Menu
            && !c.is_control()
            && self.name.chars().count() < MAX_NAME_LEN
        {
            self.name.push(c);
        }
    }

    pub fn pop_char(&mut self) {
        if self.phase == SessionPhase::Menu {
            self.name.pop();
        }
    }

    /// Leaves the menu as a player. Nothing is sent before the server has
    /// accepted the connection.
    pub fn join(&mut self) -> Option<Packet> {
        if self.phase != SessionPhase::Menu || self.client_id.is_none() {
            return None;
        }
        let name = sanitize_name(&self.name);
        info!("Joining as {}", name);
        self.enter_waiting_room(false);
        Some(Packet::Join { name })
    }

    /// Leaves the menu as a spectator.
    pub fn spectate(&mut self) -> Option<Packet> {
        if self.phase != SessionPhase::Menu || self.client_id.is_none() {
            return None;
        }
        info!("Spectating");
        self.enter_waiting_room(true);
        Some(Packet::Spectate)
    }

    fn enter_waiting_room(&mut self, spectating: bool) {
        self.phase = SessionPhase::WaitingRoom;
        self.spectating = spectating;
        self.seen_self = false;
        self.rejection = None;
    }

    fn return_to_menu(&mut self) {
        self.phase = SessionPhase::Menu;
        self.spectating = false;
        self.seen_self = false;
        self.moves.reset();
        self.game.reset_prediction();
    }

    /// Applies one packet from the server received at local time `now_ms`.
    pub fn handle_packet(&mut self, packet: Packet, now_ms: u64) {
        match packet {
            Packet::Connected { client_id } => {
                info!("Connected! Client ID: {}", client_id);
                self.client_id = Some(client_id);
            }

            Packet::Rejected { reason } => {
                warn!("Rejected by server: {}", reason);
                self.client_id = None;
                self.rejection = Some(reason);
                self.return_to_menu();
                self.game.clear();
            }

            Packet::Snapshot(snapshot) => {
                self.follow_snapshot(snapshot.waiting_message.is_some(), snapshot.me.is_some());
                self.game.add_snapshot(*snapshot, now_ms);
            }

            Packet::GameOver => {
                info!("Game over");
                self.return_to_menu();
            }

            other => warn!("Unexpected packet from server: {:?}", other),
        }
    }

    fn follow_snapshot(&mut self, waiting: bool, has_self: bool) {
        if self.phase == SessionPhase::Menu {
            return;
        }

        if !self.spectating {
            if has_self {
                self.seen_self = true;
            } else if self.seen_self {
                info!("No longer in the match");
                self.return_to_menu();
                return;
            }
        }

        match (self.phase, waiting) {
            (SessionPhase::WaitingRoom, false) => {
                info!("Round started");
                self.phase = SessionPhase::Playing;
                self.moves.reset();
                self.game.reset_prediction();
                self.accumulator_ms = 0.0;
            }
            (SessionPhase::Playing, true) => {
                info!("Round over");
                self.phase = SessionPhase::WaitingRoom;
                self.moves.reset();
                self.game.reset_prediction();
            }
            _ => {}
        }
    }

    /// Advances the local step clock to `now_ms` and returns the input packet
    /// to send, if any. Every step drains the move buffer once.
    pub fn frame(&mut self, now_ms: u64) -> Option<Packet> {
        let elapsed = match self.last_frame_ms.replace(now_ms) {
            Some(last) => now_ms.saturating_sub(last) as f64,
            None => 0.0,
        };

        if !self.wants_input() {
            self.accumulator_ms = 0.0;
            return None;
        }

        self.accumulator_ms += elapsed;
        let mut steps = 0;
        let mut moves: Vec<SequencedMove> = Vec::new();
        while self.accumulator_ms >= self.step_ms {
            self.accumulator_ms -= self.step_ms;
            steps += 1;
            moves.extend(self.moves.drain());
            if steps >= MAX_STEPS_PER_FRAME {
                self.accumulator_ms = 0.0;
                break;
            }
        }

        if moves.is_empty() {
            return None;
        }
        self.game.add_local_moves(&moves);
        Some(Packet::Input { moves })
    }

    /// Frame to draw at local time `now_ms`.
    pub fn render(&mut self, now_ms: u64) -> Option<&RenderState> {
        self.game.update(now_ms)
    }
}
