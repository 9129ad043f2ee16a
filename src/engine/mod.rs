//! Engine module: compact 2048 board, the move transition function, and
//! random tile spawning. Public API stays small and ergonomic.
//!
//! - `Board` is the packed 4x4 state with useful methods.
//! - Free functions mirror the methods when convenient (e.g., `apply_move`).
//! - Internals (lookup tables and hot ops) live in submodules.
//!
//! Every random draw takes the caller's RNG, so games and simulations
//! replay exactly under a seeded generator.

mod ops;
pub mod state;
mod tables;

pub use state::{Board, EngineError, Move, MoveOutcome, WINNING_TILE};

pub use ops::{
    apply_move, count_empty, highest_tile, is_lost, is_won, new_game, spawn_tile, total_value,
};

/// Initialize internal precomputed tables on first use.
/// Safe to call multiple times; tables otherwise build lazily on first move.
pub fn new() {
    tables::init();
}
