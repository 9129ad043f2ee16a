use rand::Rng;

use crate::engine::{self, Board, Move};

use super::rollout::rollout;
use super::{best_direction, warm_engine, BranchEval, MonteCarloConfig, SearchStats};

/// Single-threaded Monte Carlo move selection.
///
/// Constructors warm the engine tables. All randomness flows through the RNG
/// handed to each call, so a seeded generator replays the same decision.
pub struct MonteCarlo {
    cfg: MonteCarloConfig,
    stats: SearchStats,
}

impl MonteCarlo {
    pub fn new() -> Self {
        Self::with_config(MonteCarloConfig::default())
    }

    pub fn with_config(cfg: MonteCarloConfig) -> Self {
        warm_engine();
        Self {
            cfg,
            stats: SearchStats::default(),
        }
    }

    /// Pick the direction with the highest aggregate rollout score.
    ///
    /// Example
    /// ```
    /// use mc_2048::engine::{self, Move};
    /// use mc_2048::montecarlo::MonteCarlo;
    /// use rand::{rngs::StdRng, SeedableRng};
    /// let mut rng = StdRng::seed_from_u64(7);
    /// let board = engine::new_game(&mut rng);
    /// let mut policy = MonteCarlo::new();
    /// let direction = policy.best_move(board, &mut rng);
    /// assert!(Move::ALL.contains(&direction));
    /// ```
    #[inline]
    pub fn best_move<R: Rng + ?Sized>(&mut self, board: Board, rng: &mut R) -> Move {
        let branches = self.branch_evals(board, rng);
        best_direction(&branches)
    }

    /// Aggregate score for each direction, in tie-break order.
    ///
    /// An illegal direction scores 0 and runs no playouts. A legal one scores
    /// its own merge delta plus the scores of `rollouts_per_move` random
    /// playouts from the post-move board.
    pub fn branch_evals<R: Rng + ?Sized>(&mut self, board: Board, rng: &mut R) -> [BranchEval; 4] {
        let mut rollouts = 0;
        let mut steps = 0;
        let mut out = [
            BranchEval { dir: Move::Left, score: 0, legal: false },
            BranchEval { dir: Move::Right, score: 0, legal: false },
            BranchEval { dir: Move::Up, score: 0, legal: false },
            BranchEval { dir: Move::Down, score: 0, legal: false },
        ];
        for (i, &dir) in Move::ALL.iter().enumerate() {
            let outcome = engine::apply_move(board, dir);
            if !outcome.moved {
                continue;
            }
            let mut aggregate = outcome.score_delta;
            for _ in 0..self.cfg.rollouts_per_move {
                let playout = rollout(outcome.board, self.cfg.rollout_depth, rng);
                aggregate += playout.score;
                rollouts += 1;
                steps += playout.steps;
            }
            out[i] = BranchEval {
                dir,
                score: aggregate,
                legal: true,
            };
        }
        self.stats.rollouts += rollouts;
        self.stats.steps += steps;
        out
    }

    /// Statistics accumulated over every search since construction or the
    /// last [`Self::reset_stats`].
    #[inline]
    pub fn last_stats(&self) -> SearchStats {
        self.stats
    }

    /// Reset accumulated stats to zero.
    #[inline]
    pub fn reset_stats(&mut self) {
        self.stats = SearchStats::default();
    }
}

impl Default for MonteCarlo {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn same_seed_picks_the_same_move() {
        let board = engine::new_game(&mut StdRng::seed_from_u64(21));
        let mut policy = MonteCarlo::new();
        let first = policy.best_move(board, &mut StdRng::seed_from_u64(33));
        let second = policy.best_move(board, &mut StdRng::seed_from_u64(33));
        assert_eq!(first, second);
    }

    #[test]
    fn zero_rollouts_reduce_to_merge_deltas() {
        let mut policy = MonteCarlo::with_config(MonteCarloConfig {
            rollouts_per_move: 0,
            rollout_depth: 0,
        });
        // A vertical pair in the left column: up and down both merge it for
        // 4, right slides for 0, left changes nothing.
        let board = Board::from_grid([
            [2, 0, 0, 0],
            [2, 0, 0, 0],
            [0, 0, 0, 0],
            [0, 0, 0, 0],
        ])
        .unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        let branches = policy.branch_evals(board, &mut rng);
        assert!(!branches[0].legal);
        assert_eq!(branches[0].score, 0);
        assert!(branches[1].legal);
        assert_eq!(branches[1].score, 0);
        assert_eq!(branches[2].score, 4);
        assert_eq!(branches[3].score, 4);
        // up and down tie at 4; up comes first in the enumeration
        assert_eq!(policy.best_move(board, &mut rng), Move::Up);
    }

    #[test]
    fn all_zero_tie_returns_the_first_direction() {
        let mut policy = MonteCarlo::with_config(MonteCarloConfig {
            rollouts_per_move: 0,
            rollout_depth: 0,
        });
        // Single tile in the top-left corner: left and up change nothing,
        // right and down slide without merging.
        let board = Board::from_grid([
            [2, 0, 0, 0],
            [0, 0, 0, 0],
            [0, 0, 0, 0],
            [0, 0, 0, 0],
        ])
        .unwrap();
        let mut rng = StdRng::seed_from_u64(9);
        let branches = policy.branch_evals(board, &mut rng);
        assert!(branches.iter().all(|branch| branch.score == 0));
        assert!(!branches[0].legal);
        assert!(branches[1].legal);
        assert_eq!(policy.best_move(board, &mut rng), Move::Left);
    }

    #[test]
    fn legal_flags_match_the_engine() {
        let mut rng = StdRng::seed_from_u64(77);
        let board = engine::new_game(&mut rng);
        let mut policy = MonteCarlo::with_config(MonteCarloConfig {
            rollouts_per_move: 4,
            rollout_depth: 3,
        });
        let branches = policy.branch_evals(board, &mut rng);
        for (i, branch) in branches.iter().enumerate() {
            assert_eq!(branch.dir, Move::ALL[i]);
            assert_eq!(branch.legal, engine::apply_move(board, branch.dir).moved);
            if !branch.legal {
                assert_eq!(branch.score, 0);
            }
        }
    }

    #[test]
    fn stats_count_playouts() {
        let mut rng = StdRng::seed_from_u64(55);
        let board = engine::new_game(&mut rng);
        let mut policy = MonteCarlo::with_config(MonteCarloConfig {
            rollouts_per_move: 8,
            rollout_depth: 5,
        });
        policy.best_move(board, &mut rng);
        let stats = policy.last_stats();
        let legal = Move::ALL
            .iter()
            .filter(|&&dir| engine::apply_move(board, dir).moved)
            .count() as u64;
        assert_eq!(stats.rollouts, legal * 8);
        assert!(stats.steps <= stats.rollouts * 5);

        // A second search on the same board adds to the running totals.
        policy.best_move(board, &mut rng);
        assert_eq!(policy.last_stats().rollouts, legal * 16);
        policy.reset_stats();
        assert_eq!(policy.last_stats().rollouts, 0);
    }
}
