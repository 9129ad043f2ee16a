use mc_2048::engine::{self, Move};
use mc_2048::montecarlo::MonteCarlo;

fn main() {
    engine::new();
    let mut policy = MonteCarlo::new();
    let mut rng = rand::thread_rng();
    let mut board = engine::new_game(&mut rng);
    println!("{}", board);
    let mut move_count = 0_u32;
    let mut score = 0_u64;
    let mut won_at: Option<u32> = None;
    while !board.is_lost() {
        let direction = policy.best_move(board, &mut rng);
        let mut outcome = engine::apply_move(board, direction);
        if !outcome.moved {
            // Every branch scored zero; take the first direction that moves.
            outcome = Move::ALL
                .iter()
                .map(|&mv| engine::apply_move(board, mv))
                .find(|o| o.moved)
                .unwrap();
        }
        move_count += 1;
        score += outcome.score_delta;
        if won_at.is_none() && outcome.board.is_won() {
            won_at = Some(move_count);
        }
        board = engine::spawn_tile(outcome.board, &mut rng).unwrap();
        println!("{}", board);
    }
    if let Some(step) = won_at {
        println!("Reached 2048 at move {}", step);
    }
    let stats = policy.last_stats();
    println!(
        "Moves made: {}, score: {}, highest tile: {}, rollouts played: {}",
        move_count,
        score,
        board.highest_tile(),
        stats.rollouts
    )
}
