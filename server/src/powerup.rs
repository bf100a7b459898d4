use shared::{tile_to_coord, Circle, Coord, PowerupKind, PowerupView, Tile, POWERUP_RADIUS};

#[derive(Debug, Clone, PartialEq)]
pub struct Powerup {
    pub id: u32,
    pub position: Coord,
    pub kind: PowerupKind,
    /// Caught in a blast before anyone picked it up.
    pub destroyed: bool,
    /// Picked up by a player.
    pub used: bool,
}

impl Powerup {
    pub fn new(id: u32, tile: Tile, kind: PowerupKind) -> Self {
        Self {
            id,
            position: tile_to_coord(tile),
            kind,
            destroyed: false,
            used: false,
        }
    }

    pub fn is_live(&self) -> bool {
        !self.destroyed && !self.used
    }

    pub fn circle(&self) -> Circle {
        Circle::new(self.position, POWERUP_RADIUS)
    }

    pub fn view(&self) -> PowerupView {
        PowerupView {
            id: self.id,
            x: self.position.x,
            y: self.position.y,
            kind: self.kind,
            destroyed: self.destroyed,
        }
    }
}
