//! The one movement resolver. The server applies it authoritatively and the
//! client applies it to predict its own player; there is no other copy.

use crate::geometry::{
    circle_rectangle_collision, clamp_to_map, coord_to_tile, tile_to_rectangle, Circle, Coord,
    Rectangle,
};
use crate::grid::BlockGrid;
use crate::protocol::Move;
use crate::{BOMB_HALF_EXTENT, PLAYER_RADIUS, PLAYER_SPEED};

/// Gap left between a resolved player and the block it was pushed out of, so the
/// next axis pass does not see a rounding-level overlap.
const CONTACT_EPSILON: f32 = 0.01;

/// Moves a player centred at `position` by one step of `dt` seconds.
///
/// Each axis is displaced and resolved against the solid blocks around the
/// destination tile on its own. Bombs push the player out along the axis of
/// smaller overlap, except bombs the player already overlapped before moving.
pub fn move_player(
    position: Coord,
    dt: f32,
    mv: &Move,
    blocks: &BlockGrid,
    bombs: &[Coord],
) -> Coord {
    let (dir_x, dir_y) = mv.direction();
    let step = dt * PLAYER_SPEED;

    let standing_on: Vec<bool> = bombs
        .iter()
        .map(|bomb| overlaps_bomb(position, bomb))
        .collect();

    let mut pos = position;

    if dir_x != 0.0 {
        pos.x += dir_x * step;
        pos = clamp_to_map(pos, PLAYER_RADIUS);
        pos.x = resolve_blocks_x(pos, dir_x, blocks);
    }

    if dir_y != 0.0 {
        pos.y += dir_y * step;
        pos = clamp_to_map(pos, PLAYER_RADIUS);
        pos.y = resolve_blocks_y(pos, dir_y, blocks);
    }

    for (bomb, was_on) in bombs.iter().zip(standing_on) {
        if !was_on {
            pos = push_out_of_bomb(pos, bomb);
        }
    }

    clamp_to_map(pos, PLAYER_RADIUS)
}

fn player_circle(pos: Coord) -> Circle {
    Circle::new(pos, PLAYER_RADIUS)
}

fn overlaps_bomb(pos: Coord, bomb: &Coord) -> bool {
    circle_rectangle_collision(
        &player_circle(pos),
        &Rectangle::centered(*bomb, BOMB_HALF_EXTENT),
    )
}

/// Horizontal distance from the circle centre at which it just touches `rect`,
/// given its vertical offset from the rectangle.
fn contact_reach(offset: f32) -> f32 {
    (PLAYER_RADIUS * PLAYER_RADIUS - offset * offset)
        .max(0.0)
        .sqrt()
}

fn resolve_blocks_x(pos: Coord, dir_x: f32, blocks: &BlockGrid) -> f32 {
    let mut x = pos.x;
    for tile in blocks.solid_neighbourhood(coord_to_tile(pos)) {
        let rect = tile_to_rectangle(tile);
        let candidate = Coord::new(x, pos.y);
        if !circle_rectangle_collision(&player_circle(candidate), &rect) {
            continue;
        }
        let offset_y = pos.y - pos.y.clamp(rect.top(), rect.bottom());
        let reach = contact_reach(offset_y) + CONTACT_EPSILON;
        if dir_x > 0.0 {
            x = x.min(rect.left() - reach);
        } else {
            x = x.max(rect.right() + reach);
        }
    }
    x
}

fn resolve_blocks_y(pos: Coord, dir_y: f32, blocks: &BlockGrid) -> f32 {
    let mut y = pos.y;
    for tile in blocks.solid_neighbourhood(coord_to_tile(pos)) {
        let rect = tile_to_rectangle(tile);
        let candidate = Coord::new(pos.x, y);
        if !circle_rectangle_collision(&player_circle(candidate), &rect) {
            continue;
        }
        let offset_x = pos.x - pos.x.clamp(rect.left(), rect.right());
        let reach = contact_reach(offset_x) + CONTACT_EPSILON;
        if dir_y > 0.0 {
            y = y.min(rect.top() - reach);
        } else {
            y = y.max(rect.bottom() + reach);
        }
    }
    y
}

fn push_out_of_bomb(pos: Coord, bomb: &Coord) -> Coord {
    if !overlaps_bomb(pos, bomb) {
        return pos;
    }
    let rect = Rectangle::centered(*bomb, BOMB_HALF_EXTENT);
    let overlap_x =
        (pos.x + PLAYER_RADIUS).min(rect.right()) - (pos.x - PLAYER_RADIUS).max(rect.left());
    let overlap_y =
        (pos.y + PLAYER_RADIUS).min(rect.bottom()) - (pos.y - PLAYER_RADIUS).max(rect.top());

    let mut out = pos;
    if overlap_x < overlap_y {
        if pos.x < bomb.x {
            out.x -= overlap_x + CONTACT_EPSILON;
        } else {
            out.x += overlap_x + CONTACT_EPSILON;
        }
    } else if pos.y < bomb.y {
        out.y -= overlap_y + CONTACT_EPSILON;
    } else {
        out.y += overlap_y + CONTACT_EPSILON;
    }
    out
}
