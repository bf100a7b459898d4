//! Client input management with sequencing and change detection

use macroquad::prelude::*;
use shared::{Move, SequencedMove};

/// One of the keys that make up a [`Move`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveKey {
    Left,
    Right,
    Up,
    Down,
    Bomb,
}

/// Turns key edges into sequenced moves.
///
/// Every press or release that changes the held move is queued with the next
/// sequence number. Draining an empty buffer re-emits the last move under a
/// fresh sequence number so a held key keeps producing input; the idle move
/// is never re-emitted and neither is the bomb trigger.
#[derive(Debug, Clone)]
pub struct MoveBuffer {
    held: Move,
    next_sequence: u32,
    queued: Vec<SequencedMove>,
    last: Option<Move>,
}

impl MoveBuffer {
    pub fn new() -> Self {
        Self {
            held: Move::default(),
            next_sequence: 1,
            queued: Vec::new(),
            last: None,
        }
    }

    pub fn held(&self) -> Move {
        self.held
    }

    pub fn next_sequence(&self) -> u32 {
        self.next_sequence
    }

    /// Records a key edge. Returns whether the held move changed.
    pub fn set(&mut self, key: MoveKey, pressed: bool) -> bool {
        let field = match key {
            MoveKey::Left => &mut self.held.left,
            MoveKey::Right => &mut self.held.right,
            MoveKey::Up => &mut self.held.up,
            MoveKey::Down => &mut self.held.down,
            MoveKey::Bomb => &mut self.held.bomb,
        };
        if *field == pressed {
            return false;
        }
        *field = pressed;

        let mv = self.held;
        self.push(mv);
        true
    }

    /// Takes everything queued since the last drain.
    pub fn drain(&mut self) -> Vec<SequencedMove> {
        if self.queued.is_empty() {
            return match self.last {
                Some(last) if !last.without_bomb().is_idle() => {
                    let repeat = last.without_bomb();
                    self.push(repeat);
                    std::mem::take(&mut self.queued)
                }
                _ => Vec::new(),
            };
        }
        std::mem::take(&mut self.queued)
    }

    /// Releases every key and forgets queued moves. Sequence numbers keep
    /// increasing across resets.
    pub fn reset(&mut self) {
        self.held = Move::default();
        self.queued.clear();
        self.last = None;
    }

    fn push(&mut self, mv: Move) {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.queued.push(SequencedMove { sequence, mv });
        self.last = Some(mv);
    }
}

impl Default for MoveBuffer {
    fn default() -> Self {
        Self::new()
    }
}

/// Debug switches flipped by single key presses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Toggles {
    pub server_ghost: bool,
    pub print_positions: bool,
}

/// Samples the keyboard once per frame and feeds edges into a [`MoveBuffer`].
pub struct InputCapture {
    capturing: bool,
    prev_key_g: bool,
    prev_key_p: bool,
}

const KEY_BINDINGS: [(MoveKey, [KeyCode; 2]); 5] = [
    (MoveKey::Left, [KeyCode::Left, KeyCode::A]),
    (MoveKey::Right, [KeyCode::Right, KeyCode::D]),
    (MoveKey::Up, [KeyCode::Up, KeyCode::W]),
    (MoveKey::Down, [KeyCode::Down, KeyCode::S]),
    (MoveKey::Bomb, [KeyCode::Space, KeyCode::X]),
];

impl InputCapture {
    pub fn new() -> Self {
        Self {
            capturing: false,
            prev_key_g: false,
            prev_key_p: false,
        }
    }

    pub fn is_capturing(&self) -> bool {
        self.capturing
    }

    pub fn start(&mut self) {
        self.capturing = true;
    }

    /// Stops capturing and releases every key held in `buffer`.
    pub fn stop(&mut self, buffer: &mut MoveBuffer) {
        self.capturing = false;
        buffer.reset();
    }

    /// Feeds this frame's key state into `buffer` and returns which debug
    /// toggles were pressed.
    pub fn update(&mut self, buffer: &mut MoveBuffer) -> Toggles {
        if self.capturing {
            for (key, codes) in KEY_BINDINGS {
                let down = codes.iter().any(|code| is_key_down(*code));
                buffer.set(key, down);
            }
        }

        let key_g = is_key_down(KeyCode::G);
        let key_p = is_key_down(KeyCode::P);
        let toggles = Toggles {
            server_ghost: key_g && !self.prev_key_g,
            print_positions: key_p && !self.prev_key_p,
        };
        self.prev_key_g = key_g;
        self.prev_key_p = key_p;

        toggles
    }
}

impl Default for InputCapture {
    fn default() -> Self {
        Self::new()
    }
}
