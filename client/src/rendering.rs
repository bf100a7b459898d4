use crate::game::RenderState;
use macroquad::prelude::*;
use shared::{
    tile_to_rectangle, BlockView, Coord, PlayerView, PowerupKind, Tile, BOMB_HALF_EXTENT,
    MAP_SIZE, PLAYER_RADIUS, POWERUP_RADIUS, TILE_SIZE,
};

const HUD_HEIGHT: f32 = 40.0;

#[derive(Debug, Clone)]
pub struct RenderConfig {
    pub client_id: Option<u32>,
    pub spectating: bool,
    pub show_server_ghost: bool,
    pub ping_ms: u64,
    pub fake_ping_ms: u64,
}

/// Maps map units onto the window: uniform scale, centred below the HUD.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub scale: f32,
    pub offset_x: f32,
    pub offset_y: f32,
}

impl Viewport {
    pub fn fit(width: f32, height: f32) -> Self {
        let usable_height = (height - HUD_HEIGHT).max(1.0);
        let scale = (width / MAP_SIZE).min(usable_height / MAP_SIZE);
        Self {
            scale,
            offset_x: (width - MAP_SIZE * scale) / 2.0,
            offset_y: HUD_HEIGHT + (usable_height - MAP_SIZE * scale) / 2.0,
        }
    }

    pub fn to_screen(&self, at: Coord) -> (f32, f32) {
        (
            self.offset_x + at.x * self.scale,
            self.offset_y + at.y * self.scale,
        )
    }

    pub fn scaled(&self, map_units: f32) -> f32 {
        map_units * self.scale
    }
}

pub struct Renderer {
    width: f32,
    height: f32,
}

impl Renderer {
    pub fn new(width: usize, height: usize) -> Self {
        Renderer {
            width: width as f32,
            height: height as f32,
        }
    }

    fn viewport(&mut self) -> Viewport {
        self.width = screen_width();
        self.height = screen_height();
        Viewport::fit(self.width, self.height)
    }

    pub fn render(&mut self, state: &RenderState, config: &RenderConfig) {
        clear_background(Color::from_rgba(26, 26, 26, 255));
        let view = self.viewport();

        self.draw_field(&view, &state.blocks);
        for powerup in state.powerups.iter().filter(|p| !p.destroyed) {
            self.draw_powerup(&view, Coord::new(powerup.x, powerup.y), powerup.kind);
        }
        for bomb in state.bombs.iter().filter(|b| !b.exploded) {
            self.draw_bomb(&view, bomb.position());
        }
        for explosion in &state.explosions {
            for tile in &explosion.tiles {
                self.draw_tile(&view, *tile, Color::from_rgba(255, 140, 0, 200));
            }
        }

        for other in &state.others {
            self.draw_player(&view, other, Color::from_rgba(255, 68, 68, 255));
        }
        if config.show_server_ghost {
            if let Some(server_me) = &state.server_me {
                self.draw_ghost(&view, server_me.position());
            }
        }
        if let Some(me) = &state.me {
            self.draw_player(&view, me, GREEN);
        }

        if let Some(message) = &state.waiting_message {
            self.draw_banner(message);
        }
        self.draw_hud(state, config);
    }

    /// Name prompt over whatever the server is currently showing.
    pub fn render_menu(
        &mut self,
        background: Option<&RenderState>,
        name: &str,
        connected: bool,
        rejection: Option<&str>,
        config: &RenderConfig,
    ) {
        match background {
            Some(state) => self.render(state, config),
            None => {
                self.viewport();
                clear_background(Color::from_rgba(26, 26, 26, 255));
            }
        }

        draw_rectangle(
            0.0,
            0.0,
            self.width,
            self.height,
            Color::from_rgba(0, 0, 0, 160),
        );

        let center_y = self.height / 2.0;
        self.draw_centered("Enter your name", center_y - 40.0, 28.0, WHITE);
        self.draw_centered(&format!("{}_", name), center_y, 32.0, YELLOW);

        let hint = if connected {
            "Enter to join, Tab to spectate"
        } else {
            "Connecting..."
        };
        self.draw_centered(hint, center_y + 40.0, 20.0, LIGHTGRAY);
        if let Some(reason) = rejection {
            self.draw_centered(reason, center_y + 70.0, 20.0, RED);
        }
    }

    fn draw_field(&mut self, view: &Viewport, blocks: &[BlockView]) {
        let (x, y) = view.to_screen(Coord::new(0.0, 0.0));
        let side = view.scaled(MAP_SIZE);
        draw_rectangle(x, y, side, side, Color::from_rgba(46, 84, 46, 255));

        for block in blocks.iter().filter(|b| !b.destroyed) {
            let color = if block.destructible {
                Color::from_rgba(150, 100, 50, 255)
            } else {
                Color::from_rgba(90, 90, 90, 255)
            };
            self.draw_tile(view, Tile::new(block.row, block.col), color);
        }

        draw_rectangle_lines(x, y, side, side, 2.0, WHITE);
    }

    fn draw_tile(&mut self, view: &Viewport, tile: Tile, color: Color) {
        let rect = tile_to_rectangle(tile);
        let (x, y) = view.to_screen(Coord::new(rect.x, rect.y));
        let side = view.scaled(TILE_SIZE);
        draw_rectangle(x, y, side, side, color);
        draw_rectangle_lines(x, y, side, side, 1.0, Color::from_rgba(0, 0, 0, 80));
    }

    fn draw_powerup(&mut self, view: &Viewport, at: Coord, kind: PowerupKind) {
        let (x, y) = view.to_screen(at);
        let (color, label) = match kind {
            PowerupKind::ExtraBomb => (Color::from_rgba(255, 170, 0, 255), "B"),
            PowerupKind::BlastSize => (Color::from_rgba(0, 200, 255, 255), "S"),
        };
        draw_circle(x, y, view.scaled(POWERUP_RADIUS), color);
        draw_text(label, x - 5.0, y + 5.0, 18.0, BLACK);
    }

    fn draw_bomb(&mut self, view: &Viewport, at: Coord) {
        let (x, y) = view.to_screen(at);
        draw_circle(x, y, view.scaled(BOMB_HALF_EXTENT), BLACK);
        draw_circle_lines(x, y, view.scaled(BOMB_HALF_EXTENT), 2.0, DARKGRAY);
    }

    fn draw_player(&mut self, view: &Viewport, player: &PlayerView, color: Color) {
        let (x, y) = view.to_screen(player.position());
        let radius = view.scaled(PLAYER_RADIUS);
        draw_circle(x, y, radius, color);
        draw_circle_lines(x, y, radius, 2.0, WHITE);

        let dims = measure_text(&player.name, None, 16, 1.0);
        draw_text(&player.name, x - dims.width / 2.0, y - radius - 4.0, 16.0, WHITE);
    }

    fn draw_ghost(&mut self, view: &Viewport, at: Coord) {
        let (x, y) = view.to_screen(at);
        let color = Color::from_rgba(255, 255, 255, 120);
        draw_circle_lines(x, y, view.scaled(PLAYER_RADIUS), 2.0, color);
    }

    fn draw_banner(&mut self, message: &str) {
        let center_y = HUD_HEIGHT + (self.height - HUD_HEIGHT) / 2.0;
        draw_rectangle(
            0.0,
            center_y - 30.0,
            self.width,
            50.0,
            Color::from_rgba(0, 0, 0, 170),
        );
        self.draw_centered(message, center_y + 5.0, 30.0, WHITE);
    }

    fn draw_centered(&mut self, text: &str, y: f32, size: f32, color: Color) {
        let dims = measure_text(text, None, size as u16, 1.0);
        draw_text(text, (self.width - dims.width) / 2.0, y, size, color);
    }

    fn draw_hud(&mut self, state: &RenderState, config: &RenderConfig) {
        let connection_color = if config.client_id.is_some() { GREEN } else { RED };
        draw_rectangle(10.0, 10.0, 8.0, 8.0, connection_color);
        draw_text("CON", 20.0, 18.0, 12.0, WHITE);

        // The measured round trip already includes any simulated latency.
        let total_ping = config.ping_ms;
        let ping_bars = ((total_ping / 20).min(10)) as i32;
        for i in 0..10i32 {
            let bar_color = if i < ping_bars {
                if total_ping < 50 {
                    GREEN
                } else if total_ping < 100 {
                    YELLOW
                } else {
                    RED
                }
            } else {
                Color::from_rgba(51, 51, 51, 255)
            };
            draw_rectangle(10.0 + (i as f32) * 3.0, 24.0, 2.0, 8.0, bar_color);
        }
        let ping_text = if config.fake_ping_ms > 0 {
            format!("{}ms ({} fake)", total_ping, config.fake_ping_ms)
        } else {
            format!("{}ms", total_ping)
        };
        draw_text(&ping_text, 45.0, 32.0, 12.0, WHITE);

        draw_text(
            &format!("{:.0} ticks/s", state.tick_rate),
            130.0,
            32.0,
            12.0,
            WHITE,
        );

        let status = match (&state.me, config.spectating) {
            (_, true) => "spectating".to_string(),
            (Some(me), false) => format!(
                "{}  bombs {}  blast {}",
                me.name, me.max_bombs, me.bomb_size
            ),
            (None, false) => String::new(),
        };
        draw_text(&status, 220.0, 32.0, 16.0, WHITE);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn test_viewport_fits_map_below_hud() {
        let view = Viewport::fit(MAP_SIZE, MAP_SIZE + HUD_HEIGHT);
        assert_approx_eq!(view.scale, 1.0);
        assert_eq!(view.to_screen(Coord::new(0.0, 0.0)), (0.0, HUD_HEIGHT));
    }

    #[test]
    fn test_viewport_centres_wide_windows() {
        let view = Viewport::fit(1000.0, 415.0);
        assert_approx_eq!(view.scale, 0.5);
        assert_approx_eq!(view.offset_x, (1000.0 - MAP_SIZE * 0.5) / 2.0);
        assert_approx_eq!(view.scaled(TILE_SIZE), 25.0);
    }
}
