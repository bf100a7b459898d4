//! The block grid as a flat arena of cells.

use crate::geometry::Tile;
use crate::protocol::{BlockView, PowerupKind};
use crate::NUM_TILES;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Block {
    pub destructible: bool,
    pub destroyed: bool,
    /// Revealed when the block is destroyed.
    pub powerup: Option<PowerupKind>,
}

impl Block {
    pub fn indestructible() -> Self {
        Self {
            destructible: false,
            destroyed: false,
            powerup: None,
        }
    }

    pub fn destructible(powerup: Option<PowerupKind>) -> Self {
        Self {
            destructible: true,
            destroyed: false,
            powerup,
        }
    }

    /// Whether the block still stops players and blasts.
    pub fn is_solid(&self) -> bool {
        !self.destroyed
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Cell {
    #[default]
    Empty,
    Block(Block),
}

/// `NUM_TILES * NUM_TILES` cells indexed by `row * NUM_TILES + col`.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockGrid {
    cells: Vec<Cell>,
}

impl Default for BlockGrid {
    fn default() -> Self {
        Self::empty()
    }
}

impl BlockGrid {
    pub fn empty() -> Self {
        Self {
            cells: vec![Cell::Empty; (NUM_TILES * NUM_TILES) as usize],
        }
    }

    /// Indestructible pillars on every odd row/odd column intersection.
    pub fn with_pillars() -> Self {
        let mut grid = Self::empty();
        for row in (1..NUM_TILES).step_by(2) {
            for col in (1..NUM_TILES).step_by(2) {
                grid.set(Tile::new(row, col), Cell::Block(Block::indestructible()));
            }
        }
        grid
    }

    pub fn is_pillar(tile: Tile) -> bool {
        tile.row % 2 == 1 && tile.col % 2 == 1
    }

    fn index(tile: Tile) -> Option<usize> {
        if tile.in_bounds() {
            Some((tile.row * NUM_TILES + tile.col) as usize)
        } else {
            None
        }
    }

    /// Out-of-bounds tiles read as empty.
    pub fn get(&self, tile: Tile) -> Cell {
        Self::index(tile)
            .map(|i| self.cells[i])
            .unwrap_or(Cell::Empty)
    }

    pub fn block(&self, tile: Tile) -> Option<&Block> {
        match Self::index(tile).map(|i| &self.cells[i]) {
            Some(Cell::Block(block)) => Some(block),
            _ => None,
        }
    }

    /// Writes are ignored outside the grid.
    pub fn set(&mut self, tile: Tile, cell: Cell) {
        if let Some(i) = Self::index(tile) {
            self.cells[i] = cell;
        }
    }

    pub fn solid_at(&self, tile: Tile) -> bool {
        self.block(tile).map(Block::is_solid).unwrap_or(false)
    }

    /// Solid blocks in the 3x3 neighbourhood around `center`.
    pub fn solid_neighbourhood(&self, center: Tile) -> impl Iterator<Item = Tile> + '_ {
        (-1..=1)
            .flat_map(move |dr| (-1..=1).map(move |dc| center.offset(dr, dc)))
            .filter(move |t| self.solid_at(*t))
    }

    /// Marks a destructible block destroyed and hands back its embedded powerup.
    /// Indestructible or already destroyed blocks are left untouched.
    pub fn destroy(&mut self, tile: Tile) -> Option<PowerupKind> {
        let i = Self::index(tile)?;
        match &mut self.cells[i] {
            Cell::Block(block) if block.destructible && !block.destroyed => {
                block.destroyed = true;
                block.powerup.take()
            }
            _ => None,
        }
    }

    /// Turns destroyed blocks into empty cells for good.
    pub fn prune_destroyed(&mut self) -> usize {
        let mut pruned = 0;
        for cell in &mut self.cells {
            if matches!(cell, Cell::Block(block) if block.destroyed) {
                *cell = Cell::Empty;
                pruned += 1;
            }
        }
        pruned
    }

    pub fn blocks(&self) -> impl Iterator<Item = (Tile, &Block)> {
        self.cells.iter().enumerate().filter_map(|(i, cell)| match cell {
            Cell::Block(block) => Some((
                Tile::new(i as i32 / NUM_TILES, i as i32 % NUM_TILES),
                block,
            )),
            Cell::Empty => None,
        })
    }

    pub fn block_count(&self) -> usize {
        self.blocks().count()
    }

    /// Sparse wire form. Embedded powerups are not included.
    pub fn views(&self) -> Vec<BlockView> {
        self.blocks()
            .map(|(tile, block)| BlockView {
                row: tile.row,
                col: tile.col,
                destructible: block.destructible,
                destroyed: block.destroyed,
            })
            .collect()
    }

    pub fn from_views(views: &[BlockView]) -> Self {
        let mut grid = Self::empty();
        for view in views {
            grid.set(
                Tile::new(view.row, view.col),
                Cell::Block(Block {
                    destructible: view.destructible,
                    destroyed: view.destroyed,
                    powerup: None,
                }),
            );
        }
        grid
    }
}
