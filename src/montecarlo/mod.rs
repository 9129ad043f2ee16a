//! Monte Carlo rollout policy (single-threaded and parallel) for 2048.
//!
//! This module provides two policy implementations:
//! - [`MonteCarlo`]: single-threaded rollouts.
//! - [`MonteCarloParallel`]: rayon-based parallel rollouts.
//!
//! Both variants share the same contract: each direction is applied once to
//! the root board; a direction that changes nothing scores 0 and runs no
//! playouts, while a legal direction scores its own merge delta plus the
//! accumulated merge deltas of `rollouts_per_move` random playouts from the
//! post-move board. Each playout spawns its own tile first, picks uniformly
//! random directions for up to `rollout_depth` accepted steps, and stops at
//! the first pick that changes nothing. The direction with the strictly
//! highest aggregate wins; ties go to the earliest entry of [`Move::ALL`].
//!
//! Randomness always comes from the RNG handed to each call, so a seeded
//! generator reproduces a decision exactly, in both variants.
//!
//! Quick start
//! ```
//! use mc_2048::engine::{self, Move};
//! use mc_2048::montecarlo::{MonteCarlo, MonteCarloParallel};
//! use rand::{rngs::StdRng, SeedableRng};
//!
//! engine::new();
//! let mut rng = StdRng::seed_from_u64(123);
//! let board = engine::new_game(&mut rng);
//!
//! let mut policy = MonteCarlo::new();
//! let direction = policy.best_move(board, &mut rng);
//! assert!(Move::ALL.contains(&direction));
//!
//! let mut par_policy = MonteCarloParallel::new();
//! let par_direction = par_policy.best_move(board, &mut rng);
//! assert!(Move::ALL.contains(&par_direction));
//! ```

use crate::engine;
use crate::engine::Move;

mod rollout;
mod search_par;
mod search_seq;

pub use search_par::MonteCarloParallel;
pub use search_seq::MonteCarlo;

/// Knobs for the rollout search.
///
/// Defaults run 100 playouts of at most 10 steps per candidate direction.
#[derive(Debug, Clone, Copy)]
pub struct MonteCarloConfig {
    /// Random playouts per legal direction.
    pub rollouts_per_move: usize,
    /// Maximum accepted steps in one playout.
    pub rollout_depth: usize,
}

impl Default for MonteCarloConfig {
    fn default() -> Self {
        Self {
            rollouts_per_move: 100,
            rollout_depth: 10,
        }
    }
}

/// Aggregate rollout score for taking `dir` from the current board.
///
/// `legal` is false when the move is a no-op for the current board; such a
/// branch always carries score 0.
#[derive(Debug, Clone, Copy)]
pub struct BranchEval {
    pub dir: Move,
    pub score: u64,
    pub legal: bool,
}

/// Rollout counters, accumulated across searches until reset.
#[derive(Debug, Clone, Copy, Default)]
pub struct SearchStats {
    /// Playouts actually run (illegal directions contribute none).
    pub rollouts: u64,
    /// Accepted random steps summed over those playouts.
    pub steps: u64,
}

/// Highest-scoring branch, first of [`Move::ALL`] on ties.
pub(crate) fn best_direction(evals: &[BranchEval; 4]) -> Move {
    let mut best = evals[0];
    for &eval in &evals[1..] {
        if eval.score > best.score {
            best = eval;
        }
    }
    best.dir
}

/// Common helper for constructors to ensure engine tables are initialized.
fn warm_engine() {
    engine::new();
}
