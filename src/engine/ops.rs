use rand::Rng;

use super::state::{Board, BoardRaw, EngineError, Line, Move, MoveOutcome, Score, Tile, WINNING_TILE};
use super::tables::{get_line_entry, get_merge_entry, stores};

/// Slide and merge tiles in `direction`, reporting whether the board changed
/// and the summed value of tiles created by merges.
///
/// Pure: the caller's board is left untouched and no tile is spawned.
pub fn apply_move(board: Board, direction: Move) -> MoveOutcome {
    let (raw, score_delta) = match direction {
        Move::Left | Move::Right => shift_rows(board, direction),
        Move::Up | Move::Down => shift_cols(board, direction),
    };
    let next = Board(raw);
    MoveOutcome {
        board: next,
        moved: next != board,
        score_delta,
    }
}

/// Insert a 2 (90%) or 4 (10%) tile into a uniformly random empty cell.
///
/// Fails with [`EngineError::ExhaustedBoard`] when no cell is empty.
pub fn spawn_tile<R: Rng + ?Sized>(board: Board, rng: &mut R) -> Result<Board, EngineError> {
    let empty = count_empty(board);
    if empty == 0 {
        return Err(EngineError::ExhaustedBoard);
    }
    let index = rng.gen_range(0..empty);
    let rank = draw_spawn_rank(rng);
    Ok(insert_at_nth_empty(board, rank, index))
}

/// Start-of-game board: two 2 tiles at distinct random empty cells.
///
/// ```
/// use mc_2048::engine;
/// use rand::{rngs::StdRng, SeedableRng};
/// let mut rng = StdRng::seed_from_u64(42);
/// let board = engine::new_game(&mut rng);
/// assert_eq!(board.count_empty(), 14);
/// assert_eq!(engine::total_value(board), 4);
/// ```
pub fn new_game<R: Rng + ?Sized>(rng: &mut R) -> Board {
    let mut board = Board::EMPTY;
    for _ in 0..2 {
        let index = rng.gen_range(0..count_empty(board));
        board = insert_at_nth_empty(board, 1, index);
    }
    board
}

/// True if any cell holds the winning 2048 tile.
pub fn is_won(board: Board) -> bool {
    has_value(board, WINNING_TILE)
}

/// True if the board is full and no direction changes it.
pub fn is_lost(board: Board) -> bool {
    if count_empty(board) != 0 {
        return false;
    }
    Move::ALL
        .iter()
        .all(|&direction| !apply_move(board, direction).moved)
}

// https://stackoverflow.com/questions/38225571/count-number-of-zero-nibbles-in-an-unsigned-64-bit-integer
/// Count the number of empty cells.
pub fn count_empty(board: Board) -> u64 {
    16 - count_non_empty(board)
}

/// Highest tile value on the board (0 for an empty board).
pub fn highest_tile(board: Board) -> u32 {
    (0..16).map(|idx| cell_value(board, idx)).max().unwrap_or(0)
}

/// Sum of all tile values on the board.
pub fn total_value(board: Board) -> u64 {
    (0..16).map(|idx| cell_value(board, idx) as u64).sum()
}

pub(crate) fn has_value(board: Board, value: u32) -> bool {
    value != 0 && (0..16).any(|idx| cell_value(board, idx) == value)
}

// Credit to Nneonneo
pub(crate) fn transpose(x: BoardRaw) -> BoardRaw {
    let a1 = x & 0xF0F00F0FF0F00F0F;
    let a2 = x & 0x0000F0F00000F0F0;
    let a3 = x & 0x0F0F00000F0F0000;
    let a = a1 | (a2 << 12) | (a3 >> 12);
    let b1 = a & 0xFF00FF0000FF00FF;
    let b2 = a & 0x00FF00FF00000000;
    let b3 = a & 0x00000000FF00FF00;
    b1 | (b2 >> 24) | (b3 << 24)
}

pub(crate) fn extract_line(board: BoardRaw, line_idx: u64) -> Line {
    (board >> ((3 - line_idx) * 16)) & 0xffff
}

/// Tile exponent (0 for empty) at a row-major cell index in 0..16.
pub(crate) fn get_rank(board: Board, idx: usize) -> Tile {
    (board.0 >> (60 - (4 * idx))) & 0xf
}

/// Replace the nibble at a row-major cell index.
pub(crate) fn with_rank(board: Board, idx: usize, rank: Tile) -> Board {
    let shift = 60 - (4 * idx);
    Board((board.0 & !(0xf << shift)) | (rank << shift))
}

/// The cell's actual value (0 if empty), e.g., 2, 4, 8, ...
pub(crate) fn cell_value(board: Board, idx: usize) -> u32 {
    rank_value(get_rank(board, idx))
}

fn rank_value(rank: Tile) -> u32 {
    if rank == 0 {
        0
    } else {
        1u32 << rank
    }
}

/// Exponent for a cell value arriving from outside: 0 stays empty, powers of
/// two in 2..=32768 map to their exponent, everything else is rejected.
pub(crate) fn value_rank(value: u32) -> Option<Tile> {
    if value == 0 {
        return Some(0);
    }
    if value.is_power_of_two() && (2..=32768).contains(&value) {
        Some(value.trailing_zeros() as Tile)
    } else {
        None
    }
}

pub(crate) fn line_to_vec(line: Line) -> Vec<Tile> {
    (0..4).fold(Vec::new(), |mut tiles, tile_idx| {
        tiles.push(line >> ((3 - tile_idx) * 4) & 0xf);
        tiles
    })
}

pub(crate) fn draw_spawn_rank<R: Rng + ?Sized>(rng: &mut R) -> Tile {
    if rng.gen_range(0..10) < 9 {
        1
    } else {
        2
    }
}

// Walks nibbles from the low end of the word; `index` counts empty cells
// encountered along the way, so it must be < count_empty(board).
fn insert_at_nth_empty(board: Board, rank: Tile, index: u64) -> Board {
    debug_assert!(index < count_empty(board));
    let mut index = index;
    let mut tmp = board.0;
    let mut tile = rank;
    loop {
        while (tmp & 0xf) != 0 {
            tmp >>= 4;
            tile <<= 4;
        }
        if index == 0 {
            break;
        }
        index -= 1;
        tmp >>= 4;
        tile <<= 4;
    }
    Board(board.0 | tile)
}

fn shift_rows(board: Board, direction: Move) -> (BoardRaw, Score) {
    let s = stores();
    let table: &[u64] = match direction {
        Move::Left => &s.shift_left,
        Move::Right => &s.shift_right,
        _ => panic!("shift_rows called with a vertical move"),
    };
    (0..4).fold((0, 0), |(raw, score), row_idx| {
        let row_val = extract_line(board.0, row_idx) as u16;
        (
            raw | (get_line_entry(table, row_val) << (48 - (16 * row_idx))),
            score + get_merge_entry(row_val),
        )
    })
}

fn shift_cols(board: Board, direction: Move) -> (BoardRaw, Score) {
    let transposed = transpose(board.0);
    let s = stores();
    let table: &[u64] = match direction {
        Move::Up => &s.shift_up,
        Move::Down => &s.shift_down,
        _ => panic!("shift_cols called with a horizontal move"),
    };
    (0..4).fold((0, 0), |(raw, score), col_idx| {
        let col_val = extract_line(transposed, col_idx) as u16;
        (
            raw | (get_line_entry(table, col_val) << (12 - (4 * col_idx))),
            score + get_merge_entry(col_val),
        )
    })
}

pub(crate) fn shift_line(line: Line, direction: Move) -> Line {
    let (tiles, _) = shift_vec(line_to_vec(line), direction);
    match direction {
        Move::Left | Move::Right => vec_to_row(tiles),
        Move::Up | Move::Down => vec_to_col(tiles),
    }
}

/// Summed value of tiles created by merging the line; identical for either
/// scan direction, so the table build only computes the left scan.
pub(crate) fn line_merge_score(line: Line) -> Score {
    let (_, score) = shift_vec_left(line_to_vec(line));
    score
}

fn vec_to_row(tiles: Vec<Tile>) -> Line {
    tiles[0] << 12 | tiles[1] << 8 | tiles[2] << 4 | tiles[3]
}

fn vec_to_col(tiles: Vec<Tile>) -> Line {
    tiles[0] << 48 | tiles[1] << 32 | tiles[2] << 16 | tiles[3]
}

fn shift_vec(vec: Vec<Tile>, direction: Move) -> (Vec<Tile>, Score) {
    match direction {
        Move::Left | Move::Up => shift_vec_left(vec),
        Move::Right | Move::Down => shift_vec_right(vec),
    }
}

fn shift_vec_right(vec: Vec<Tile>) -> (Vec<Tile>, Score) {
    let rev_vec: Vec<Tile> = vec.into_iter().rev().collect();
    let (shifted, score) = shift_vec_left(rev_vec);
    (shifted.into_iter().rev().collect(), score)
}

fn shift_vec_left(mut vec: Vec<Tile>) -> (Vec<Tile>, Score) {
    let mut score = 0;
    for i in 0..4 {
        score += calculate_left_shift(&mut vec[i..]);
    }
    (vec, score)
}

// One compaction step over a suffix: pull the first tile to slice[0] and
// merge the next tile into it when the ranks match. Each call merges at most
// one pair, so a tile never merges twice in one move. Returns the value of
// the tile the merge created, or 0.
fn calculate_left_shift(slice: &mut [Tile]) -> Score {
    let mut acc = 0;
    let mut score = 0;
    for s in slice.iter_mut() {
        let val = *s;
        if acc != 0 && acc == val && acc < 0xf {
            // rank 15 is the nibble ceiling; two 32768 tiles do not merge
            *s = 0;
            acc += 1;
            score = 1 << acc;
            break;
        } else if acc != 0 && val != 0 {
            break;
        } else if acc == 0 && val != 0 {
            *s = 0;
            acc = val;
        }
    }
    slice[0] = acc;
    score
}

fn count_non_empty(board: Board) -> u64 {
    let mut board_copy = board.0;
    board_copy |= board_copy >> 1;
    board_copy |= board_copy >> 2;
    board_copy &= 0x1111111111111111;
    board_copy.count_ones() as u64
}

pub(crate) fn format_val(val: &u8) -> String {
    match val {
        0 => String::from("       "),
        &x => {
            let mut x = (2_i32.pow(x as u32)).to_string();
            while x.len() < 7 {
                match x.len() {
                    6 => x = format!(" {}", x),
                    _ => x = format!(" {} ", x),
                }
            }
            x
        }
    }
}
