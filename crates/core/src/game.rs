//! Row type for the `game` relation and board helpers.
//!
//! The board is a flattened, row-major string with one symbol per cell;
//! `'0'` marks an empty intersection.

use crate::identity::Identity;
use alloc::string::String;
use alloc::vec::Vec;
use serde::{Deserialize, Serialize};

/// Primary key of a game row.
pub type GameId = u64;

/// Board symbol for an empty cell.
pub const EMPTY_CELL: char = '0';

/// Lobby status, derived from the player seats.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GameStatus {
    /// The white seat is still open.
    Waiting,
    /// Both seats are taken.
    Full,
}

/// A single board cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Cell {
    Empty,
    Stone(char),
}

impl Cell {
    fn from_symbol(symbol: char) -> Self {
        if symbol == EMPTY_CELL {
            Cell::Empty
        } else {
            Cell::Stone(symbol)
        }
    }
}

/// A row of the `game` relation, keyed by `id`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Game {
    pub id: GameId,
    pub board_size: u32,
    pub board: String,
    #[serde(default)]
    pub player_white: Option<Identity>,
    #[serde(default)]
    pub player_black: Option<Identity>,
}

impl Game {
    /// Creates a game with an empty `board_size` x `board_size` board.
    pub fn new(id: GameId, board_size: u32, player_black: Option<Identity>) -> Self {
        let cells = (board_size as usize) * (board_size as usize);
        Self {
            id,
            board_size,
            board: core::iter::repeat(EMPTY_CELL).take(cells).collect(),
            player_white: None,
            player_black,
        }
    }

    /// Returns the lobby status.
    pub fn status(&self) -> GameStatus {
        if self.player_white.is_some() {
            GameStatus::Full
        } else {
            GameStatus::Waiting
        }
    }

    /// Returns true if another player can still join.
    #[inline]
    pub fn is_joinable(&self) -> bool {
        self.status() == GameStatus::Waiting
    }

    /// Returns the cell at column `x`, row `y`, or `None` outside the board.
    pub fn cell(&self, x: u32, y: u32) -> Option<Cell> {
        if x >= self.board_size || y >= self.board_size {
            return None;
        }
        let idx = (y as usize) * (self.board_size as usize) + (x as usize);
        self.board.chars().nth(idx).map(Cell::from_symbol)
    }

    /// Iterates the board row by row.
    ///
    /// A board string shorter than `board_size²` yields short final rows.
    pub fn rows(&self) -> impl Iterator<Item = Vec<Cell>> + '_ {
        let size = (self.board_size as usize).max(1);
        let cells: Vec<Cell> = self.board.chars().map(Cell::from_symbol).collect();
        let row_count = if self.board_size == 0 { 0 } else { cells.len().div_ceil(size) };
        (0..row_count).map(move |row| {
            let start = row * size;
            let end = (start + size).min(cells.len());
            cells[start..end].to_vec()
        })
    }

    /// Returns true if `identity` is seated in this game.
    pub fn has_player(&self, identity: &Identity) -> bool {
        self.player_white.as_ref() == Some(identity) || self.player_black.as_ref() == Some(identity)
    }
}
