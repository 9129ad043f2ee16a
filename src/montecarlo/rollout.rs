use rand::Rng;

use crate::engine::{self, Board, Move};

pub(crate) struct RolloutOutcome {
    pub score: u64,
    pub steps: u64,
}

/// Play up to `depth` random moves from a freshly spawned successor of
/// `start`, accumulating merge scores.
///
/// The playout ends early at the first drawn direction that changes nothing;
/// that draw does not count as a step. A full `start` board scores 0.
pub(crate) fn rollout<R: Rng + ?Sized>(start: Board, depth: usize, rng: &mut R) -> RolloutOutcome {
    let mut board = match engine::spawn_tile(start, rng) {
        Ok(spawned) => spawned,
        Err(_) => return RolloutOutcome { score: 0, steps: 0 },
    };
    let mut score = 0;
    let mut steps = 0;
    while steps < depth as u64 {
        let direction = random_direction(rng);
        let outcome = engine::apply_move(board, direction);
        if !outcome.moved {
            break;
        }
        score += outcome.score_delta;
        steps += 1;
        // a move that changed the board always leaves an empty cell
        board = match engine::spawn_tile(outcome.board, rng) {
            Ok(spawned) => spawned,
            Err(_) => break,
        };
    }
    RolloutOutcome { score, steps }
}

fn random_direction<R: Rng + ?Sized>(rng: &mut R) -> Move {
    Move::ALL[rng.gen_range(0..Move::ALL.len())]
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn zero_depth_playout_scores_nothing() {
        let mut rng = StdRng::seed_from_u64(1);
        let board = engine::new_game(&mut rng);
        let outcome = rollout(board, 0, &mut rng);
        assert_eq!(outcome.score, 0);
        assert_eq!(outcome.steps, 0);
    }

    #[test]
    fn playout_on_a_full_board_scores_nothing() {
        let board = Board::from_grid([
            [2, 4, 2, 4],
            [4, 2, 4, 2],
            [2, 4, 2, 4],
            [4, 2, 4, 2],
        ])
        .unwrap();
        let mut rng = StdRng::seed_from_u64(2);
        let outcome = rollout(board, 10, &mut rng);
        assert_eq!(outcome.score, 0);
        assert_eq!(outcome.steps, 0);
    }

    #[test]
    fn steps_never_exceed_depth() {
        let mut rng = StdRng::seed_from_u64(3);
        let start = engine::new_game(&mut rng);
        for depth in [0usize, 1, 5, 10] {
            for _ in 0..50 {
                let outcome = rollout(start, depth, &mut rng);
                assert!(outcome.steps <= depth as u64);
            }
        }
    }

    #[test]
    fn same_seed_same_playout() {
        let start = engine::new_game(&mut StdRng::seed_from_u64(4));
        let first = rollout(start, 10, &mut StdRng::seed_from_u64(5));
        let second = rollout(start, 10, &mut StdRng::seed_from_u64(5));
        assert_eq!(first.score, second.score);
        assert_eq!(first.steps, second.steps);
    }
}
