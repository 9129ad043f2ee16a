use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::ops;

// Internal type aliases for the packed representation
pub(crate) type BoardRaw = u64;
pub(crate) type Line = u64;
pub(crate) type Tile = u64;
pub(crate) type Score = u64;

/// The tile value that wins the game.
pub const WINNING_TILE: u32 = 2048;

/// A direction to move/merge tiles.
///
/// The order of [`Move::ALL`] is the tie-break order used by the move
/// selector: when two directions score equally, the earlier one wins.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Move {
    Left,
    Right,
    Up,
    Down,
}

impl Move {
    /// Every direction, in tie-break order.
    pub const ALL: [Move; 4] = [Move::Left, Move::Right, Move::Up, Move::Down];

    /// Stable single-byte encoding used by run traces.
    #[inline]
    pub fn as_u8(self) -> u8 {
        match self {
            Move::Left => 0,
            Move::Right => 1,
            Move::Up => 2,
            Move::Down => 3,
        }
    }
}

impl TryFrom<u8> for Move {
    type Error = EngineError;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        match byte {
            0 => Ok(Move::Left),
            1 => Ok(Move::Right),
            2 => Ok(Move::Up),
            3 => Ok(Move::Down),
            other => Err(EngineError::InvalidDirection(other)),
        }
    }
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Move::Left => "left",
            Move::Right => "right",
            Move::Up => "up",
            Move::Down => "down",
        };
        write!(f, "{}", name)
    }
}

/// Result of applying a move: the successor board, whether anything changed,
/// and the summed value of tiles created by merges.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoveOutcome {
    pub board: Board,
    pub moved: bool,
    pub score_delta: u64,
}

/// Failures at the engine boundary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// A direction byte outside 0..=3 arrived from untyped input.
    #[error("invalid direction byte {0}")]
    InvalidDirection(u8),
    /// A spawn was requested on a board with no empty cell.
    #[error("no empty cell left to spawn into")]
    ExhaustedBoard,
    /// An external grid held a cell that is not empty or a power of two
    /// in 2..=32768.
    #[error("cell ({row}, {col}) holds invalid value {value}")]
    MalformedBoard { row: usize, col: usize, value: u32 },
}

/// Packed 4x4 2048 board as 16 4-bit nibbles in a `u64`.
///
/// Each nibble stores a tile's exponent (0 = empty, 1 = tile 2, ...),
/// row-major from the top-left. `Board` is `Copy`, so simulations work on
/// cheap value copies and never touch the caller's board; equality is
/// structural.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Board(pub(crate) BoardRaw);

impl Board {
    /// A constant empty board (all zeros).
    pub const EMPTY: Board = Board(0);

    /// Side length of the square grid.
    pub const SIZE: usize = 4;

    /// Construct a `Board` from its raw packed representation.
    #[inline]
    pub fn from_raw(raw: BoardRaw) -> Self {
        Board(raw)
    }

    /// Consume this `Board`, returning the raw packed `u64`.
    #[inline]
    pub fn into_raw(self) -> BoardRaw {
        self.0
    }

    /// Borrow the raw packed `u64` for this `Board`.
    #[inline]
    pub fn raw(&self) -> BoardRaw {
        self.0
    }

    /// Slide and merge tiles in `dir` (no random insert).
    ///
    /// ```
    /// use mc_2048::engine::{Board, Move};
    /// let board = Board::from_grid([
    ///     [2, 2, 0, 0],
    ///     [0, 0, 0, 0],
    ///     [0, 0, 0, 0],
    ///     [0, 0, 0, 0],
    /// ]).unwrap();
    /// let outcome = board.apply(Move::Left);
    /// assert!(outcome.moved);
    /// assert_eq!(outcome.score_delta, 4);
    /// assert_eq!(outcome.board.get(0, 0), 4);
    /// ```
    #[inline]
    pub fn apply(self, dir: Move) -> MoveOutcome {
        ops::apply_move(self, dir)
    }

    /// Insert a random 2 (90%) or 4 (10%) tile into a random empty cell,
    /// using the provided RNG.
    ///
    /// ```
    /// use mc_2048::engine::Board;
    /// use rand::{rngs::StdRng, SeedableRng};
    /// let mut rng = StdRng::seed_from_u64(7);
    /// let board = Board::EMPTY.spawn_tile(&mut rng).unwrap();
    /// assert_eq!(board.count_empty(), 15);
    /// ```
    #[inline]
    pub fn spawn_tile<R: Rng + ?Sized>(self, rng: &mut R) -> Result<Self, EngineError> {
        ops::spawn_tile(self, rng)
    }

    /// Value at `(row, col)`, 0 when the cell is empty.
    ///
    /// Panics if `row` or `col` is out of range.
    #[inline]
    pub fn get(self, row: usize, col: usize) -> u32 {
        assert!(row < Self::SIZE && col < Self::SIZE, "cell out of range");
        ops::cell_value(self, row * Self::SIZE + col)
    }

    /// Put `value` at `(row, col)`; 0 clears the cell. Rejects values that
    /// are not powers of two in 2..=32768.
    ///
    /// Panics if `row` or `col` is out of range.
    pub fn set(&mut self, row: usize, col: usize, value: u32) -> Result<(), EngineError> {
        assert!(row < Self::SIZE && col < Self::SIZE, "cell out of range");
        let rank = ops::value_rank(value)
            .ok_or(EngineError::MalformedBoard { row, col, value })?;
        *self = ops::with_rank(*self, row * Self::SIZE + col, rank);
        Ok(())
    }

    /// Build a board from plain cell values, validating every cell.
    ///
    /// ```
    /// use mc_2048::engine::Board;
    /// assert!(Board::from_grid([
    ///     [2, 3, 0, 0],
    ///     [0, 0, 0, 0],
    ///     [0, 0, 0, 0],
    ///     [0, 0, 0, 0],
    /// ]).is_err());
    /// ```
    pub fn from_grid(grid: [[u32; 4]; 4]) -> Result<Self, EngineError> {
        let mut board = Board::EMPTY;
        for (row, cells) in grid.iter().enumerate() {
            for (col, &value) in cells.iter().enumerate() {
                board.set(row, col, value)?;
            }
        }
        Ok(board)
    }

    /// Plain cell values, row-major.
    pub fn to_grid(self) -> [[u32; 4]; 4] {
        let mut grid = [[0u32; 4]; 4];
        for (row, cells) in grid.iter_mut().enumerate() {
            for (col, cell) in cells.iter_mut().enumerate() {
                *cell = ops::cell_value(self, row * Self::SIZE + col);
            }
        }
        grid
    }

    /// Coordinates of every empty cell, row-major.
    pub fn empty_cells(self) -> impl Iterator<Item = (usize, usize)> {
        (0..Self::SIZE * Self::SIZE)
            .filter(move |&idx| ops::get_rank(self, idx) == 0)
            .map(|idx| (idx / Self::SIZE, idx % Self::SIZE))
    }

    /// True when no cell is empty.
    #[inline]
    pub fn is_full(self) -> bool {
        ops::count_empty(self) == 0
    }

    /// True if any cell holds exactly `value`.
    #[inline]
    pub fn has_value(self, value: u32) -> bool {
        ops::has_value(self, value)
    }

    /// Count the number of empty cells on the board.
    #[inline]
    pub fn count_empty(self) -> u64 {
        ops::count_empty(self)
    }

    /// Highest tile value present (0 for an empty board).
    #[inline]
    pub fn highest_tile(self) -> u32 {
        ops::highest_tile(self)
    }

    /// Sum of all tile values.
    #[inline]
    pub fn total_value(self) -> u64 {
        ops::total_value(self)
    }

    /// True if any cell holds the winning 2048 tile.
    #[inline]
    pub fn is_won(self) -> bool {
        ops::is_won(self)
    }

    /// True if the board is full and no direction changes it.
    #[inline]
    pub fn is_lost(self) -> bool {
        ops::is_lost(self)
    }
}

impl fmt::Debug for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Board({:#018x})", self.0)
    }
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cells: Vec<String> = (0..16)
            .map(|idx| ops::format_val(&(ops::get_rank(*self, idx) as u8)))
            .collect();
        write!(
            f,
            "\n{}|{}|{}|{}\n--------------------------------\n{}|{}|{}|{}\n--------------------------------\n{}|{}|{}|{}\n--------------------------------\n{}|{}|{}|{}\n",
            cells[0], cells[1], cells[2], cells[3],
            cells[4], cells[5], cells[6], cells[7],
            cells[8], cells[9], cells[10], cells[11],
            cells[12], cells[13], cells[14], cells[15]
        )
    }
}
