//! Tile/coordinate conversion and collision tests. Everything here is pure.

use crate::{MAP_SIZE, NUM_TILES, TILE_SIZE};
use serde::{Deserialize, Serialize};

/// A cell on the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Tile {
    pub row: i32,
    pub col: i32,
}

impl Tile {
    pub fn new(row: i32, col: i32) -> Self {
        Self { row, col }
    }

    pub fn in_bounds(&self) -> bool {
        (0..NUM_TILES).contains(&self.row) && (0..NUM_TILES).contains(&self.col)
    }

    pub fn offset(&self, d_row: i32, d_col: i32) -> Tile {
        Tile {
            row: self.row + d_row,
            col: self.col + d_col,
        }
    }
}

/// A continuous position in map units, origin at the top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Coord {
    pub x: f32,
    pub y: f32,
}

impl Coord {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Linear interpolation towards `other`.
    pub fn lerp(&self, other: &Coord, ratio: f32) -> Coord {
        Coord {
            x: self.x + (other.x - self.x) * ratio,
            y: self.y + (other.y - self.y) * ratio,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Circle {
    pub x: f32,
    pub y: f32,
    pub radius: f32,
}

impl Circle {
    pub fn new(center: Coord, radius: f32) -> Self {
        Self {
            x: center.x,
            y: center.y,
            radius,
        }
    }
}

/// Axis-aligned rectangle given by its top-left corner and size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rectangle {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rectangle {
    /// Square of side `2 * half_extent` centred on `center`.
    pub fn centered(center: Coord, half_extent: f32) -> Self {
        Self {
            x: center.x - half_extent,
            y: center.y - half_extent,
            width: half_extent * 2.0,
            height: half_extent * 2.0,
        }
    }

    pub fn left(&self) -> f32 {
        self.x
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn top(&self) -> f32 {
        self.y
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    pub fn center(&self) -> Coord {
        Coord {
            x: self.x + self.width / 2.0,
            y: self.y + self.height / 2.0,
        }
    }
}

pub fn distance(a: &Coord, b: &Coord) -> f32 {
    let dx = a.x - b.x;
    let dy = a.y - b.y;
    (dx * dx + dy * dy).sqrt()
}

/// Maps a coordinate to the tile containing it, clamped to the grid.
pub fn coord_to_tile(c: Coord) -> Tile {
    let max_tile = NUM_TILES - 1;
    Tile {
        row: ((c.y / TILE_SIZE).trunc() as i32).clamp(0, max_tile),
        col: ((c.x / TILE_SIZE).trunc() as i32).clamp(0, max_tile),
    }
}

/// Centre of a tile.
pub fn tile_to_coord(t: Tile) -> Coord {
    Coord {
        x: t.col as f32 * TILE_SIZE + TILE_SIZE / 2.0,
        y: t.row as f32 * TILE_SIZE + TILE_SIZE / 2.0,
    }
}

pub fn tile_to_rectangle(t: Tile) -> Rectangle {
    Rectangle {
        x: t.col as f32 * TILE_SIZE,
        y: t.row as f32 * TILE_SIZE,
        width: TILE_SIZE,
        height: TILE_SIZE,
    }
}

/// Closest-point test. Touching edges do not count as a collision.
pub fn circle_rectangle_collision(circle: &Circle, rect: &Rectangle) -> bool {
    let closest_x = circle.x.clamp(rect.left(), rect.right());
    let closest_y = circle.y.clamp(rect.top(), rect.bottom());
    let dx = circle.x - closest_x;
    let dy = circle.y - closest_y;
    dx * dx + dy * dy < circle.radius * circle.radius
}

pub fn rectangle_collision(a: &Rectangle, b: &Rectangle) -> bool {
    !(a.right() <= b.left()
        || b.right() <= a.left()
        || a.bottom() <= b.top()
        || b.bottom() <= a.top())
}

pub fn circle_collision(a: &Circle, b: &Circle) -> bool {
    let dx = a.x - b.x;
    let dy = a.y - b.y;
    let reach = a.radius + b.radius;
    dx * dx + dy * dy < reach * reach
}

/// Keeps a circle of `radius` inside the map.
pub fn clamp_to_map(c: Coord, radius: f32) -> Coord {
    Coord {
        x: c.x.clamp(radius, MAP_SIZE - radius),
        y: c.y.clamp(radius, MAP_SIZE - radius),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use proptest::prelude::*;

    #[test]
    fn test_coord_to_tile_edges() {
        assert_eq!(
            coord_to_tile(Coord::new(TILE_SIZE - 1.0, TILE_SIZE - 1.0)),
            Tile::new(0, 0)
        );
        assert_eq!(
            coord_to_tile(Coord::new(TILE_SIZE, TILE_SIZE)),
            Tile::new(1, 1)
        );
        assert_eq!(
            coord_to_tile(Coord::new(MAP_SIZE - 1.0, MAP_SIZE - 1.0)),
            Tile::new(NUM_TILES - 1, NUM_TILES - 1)
        );
    }

    #[test]
    fn test_coord_to_tile_clamps() {
        assert_eq!(coord_to_tile(Coord::new(-30.0, -1.0)), Tile::new(0, 0));
        assert_eq!(
            coord_to_tile(Coord::new(MAP_SIZE + 200.0, MAP_SIZE)),
            Tile::new(NUM_TILES - 1, NUM_TILES - 1)
        );
    }

    #[test]
    fn test_round_trip_on_every_tile() {
        for row in 0..NUM_TILES {
            for col in 0..NUM_TILES {
                let t = Tile::new(row, col);
                assert_eq!(coord_to_tile(tile_to_coord(t)), t);
            }
        }
    }

    #[test]
    fn test_tile_to_coord_is_center() {
        let c = tile_to_coord(Tile::new(2, 3));
        assert_approx_eq!(c.x, 3.0 * TILE_SIZE + TILE_SIZE / 2.0);
        assert_approx_eq!(c.y, 2.0 * TILE_SIZE + TILE_SIZE / 2.0);
    }

    #[test]
    fn test_circle_rectangle_collision() {
        let rect = tile_to_rectangle(Tile::new(1, 1));
        let inside = Circle::new(rect.center(), 5.0);
        assert!(circle_rectangle_collision(&inside, &rect));

        // Touching the left edge exactly is not an overlap
        let touching = Circle::new(Coord::new(rect.left() - 10.0, rect.center().y), 10.0);
        assert!(!circle_rectangle_collision(&touching, &rect));

        // Near the corner but outside the rounded reach
        let corner = Circle::new(Coord::new(rect.left() - 8.0, rect.top() - 8.0), 10.0);
        assert!(!circle_rectangle_collision(&corner, &rect));
        let corner_hit = Circle::new(Coord::new(rect.left() - 6.0, rect.top() - 6.0), 10.0);
        assert!(circle_rectangle_collision(&corner_hit, &rect));
    }

    #[test]
    fn test_rectangle_collision() {
        let a = Rectangle::centered(Coord::new(100.0, 100.0), 10.0);
        let b = Rectangle::centered(Coord::new(115.0, 100.0), 10.0);
        let c = Rectangle::centered(Coord::new(120.0, 100.0), 10.0);
        assert!(rectangle_collision(&a, &b));
        assert!(!rectangle_collision(&a, &c));
    }

    #[test]
    fn test_circle_collision() {
        let a = Circle::new(Coord::new(0.0, 0.0), 5.0);
        let b = Circle::new(Coord::new(9.0, 0.0), 5.0);
        let c = Circle::new(Coord::new(10.0, 0.0), 5.0);
        assert!(circle_collision(&a, &b));
        assert!(!circle_collision(&a, &c));
    }

    #[test]
    fn test_clamp_to_map() {
        let c = clamp_to_map(Coord::new(-5.0, MAP_SIZE + 5.0), 20.0);
        assert_eq!(c, Coord::new(20.0, MAP_SIZE - 20.0));
    }

    proptest! {
        #[test]
        fn prop_tile_round_trip(row in 0..NUM_TILES, col in 0..NUM_TILES) {
            let t = Tile::new(row, col);
            prop_assert_eq!(coord_to_tile(tile_to_coord(t)), t);
        }

        #[test]
        fn prop_coord_to_tile_always_in_bounds(x in -2000.0f32..2000.0, y in -2000.0f32..2000.0) {
            prop_assert!(coord_to_tile(Coord::new(x, y)).in_bounds());
        }
    }
}
