use std::sync::OnceLock;

use super::state::{Move, Score};

/// Precomputed lookup tables for all possible 4-tile lines (16-bit packed).
///
/// Shifting/merging a row or column depends only on its 4 nibbles, and there
/// are 2^16 possible 16-bit values, so the result of shifting a line
/// left/right/up/down and the merge score it releases are precomputed once.
/// This keeps moves branch-light and fast at runtime.
///
/// Layout:
/// - `shift_left/right[i]`: replacement 16-bit row after the move.
/// - `shift_up/down[i]`: replacement column, pre-spread across the four
///   row groups so `shift_cols` only has to OR it in at the column offset.
/// - `merge_score[i]`: sum of tile values created by merges when the line
///   is moved. The sum is the same for either scan direction (a run of
///   equal tiles yields the same pairs either way), so one table serves
///   all four moves.
///
/// Access is via `stores()`, which lazily initializes a single global
/// `Stores` on first use. The public `engine::new()` simply forces init
/// early so the cost never lands mid-game.
pub(crate) struct Stores {
    pub(crate) shift_left: Box<[u64]>,
    pub(crate) shift_right: Box<[u64]>,
    pub(crate) shift_up: Box<[u64]>,
    pub(crate) shift_down: Box<[u64]>,
    pub(crate) merge_score: Box<[Score]>,
}

const LINE_TABLE_SIZE: usize = 0x1_0000; // 65,536 possible 16-bit lines

static STORES: OnceLock<Stores> = OnceLock::new();

/// Ensure lookup tables are initialized.
pub(crate) fn init() {
    let _ = STORES.get_or_init(create_stores);
}

#[inline(always)]
pub(crate) fn stores() -> &'static Stores {
    STORES.get_or_init(create_stores)
}

fn create_stores() -> Stores {
    // Allocate on the heap to keep stack frames small during init.
    let mut shift_left = vec![0u64; LINE_TABLE_SIZE];
    let mut shift_right = vec![0u64; LINE_TABLE_SIZE];
    let mut shift_up = vec![0u64; LINE_TABLE_SIZE];
    let mut shift_down = vec![0u64; LINE_TABLE_SIZE];
    let mut merge_score = vec![0u64; LINE_TABLE_SIZE];

    let mut val: usize = 0;
    while val < LINE_TABLE_SIZE {
        let line = val as u64;
        shift_left[val] = super::ops::shift_line(line, Move::Left);
        shift_right[val] = super::ops::shift_line(line, Move::Right);
        shift_up[val] = super::ops::shift_line(line, Move::Up);
        shift_down[val] = super::ops::shift_line(line, Move::Down);
        merge_score[val] = super::ops::line_merge_score(line);
        val += 1;
    }

    Stores {
        shift_left: shift_left.into_boxed_slice(),
        shift_right: shift_right.into_boxed_slice(),
        shift_up: shift_up.into_boxed_slice(),
        shift_down: shift_down.into_boxed_slice(),
        merge_score: merge_score.into_boxed_slice(),
    }
}

#[inline(always)]
pub(crate) fn get_line_entry(table: &[u64], idx: u16) -> u64 {
    debug_assert!((idx as usize) < LINE_TABLE_SIZE);
    unsafe { *table.get_unchecked(idx as usize) }
}

#[inline(always)]
pub(crate) fn get_merge_entry(idx: u16) -> Score {
    debug_assert!((idx as usize) < LINE_TABLE_SIZE);
    let merge_table = &stores().merge_score;
    unsafe { *merge_table.get_unchecked(idx as usize) }
}
