use std::fs;
use std::path::PathBuf;
use std::time::Instant;

use anyhow::Context;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use mc_2048::engine::{self, Board, Move, WINNING_TILE};
use mc_2048::montecarlo::{MonteCarlo, MonteCarloConfig, MonteCarloParallel};
use mc_2048::trace::{self, Meta};

#[derive(Debug, Parser)]
#[command(name = "selfplay", about = "Monte Carlo 2048 self-play runner")]
struct Args {
    /// Number of games to play
    #[arg(long, default_value_t = 1)]
    games: u32,

    /// Rollouts per direction for every move decision
    #[arg(long, default_value_t = 100)]
    rollouts: usize,

    /// Random steps per rollout
    #[arg(long, default_value_t = 10)]
    depth: usize,

    /// Master seed; omit to draw one from OS entropy
    #[arg(long)]
    seed: Option<u64>,

    /// Per game: stop after this many moves
    #[arg(long)]
    steps: Option<u64>,

    /// Per game: stop once the highest tile reaches this value
    #[arg(long)]
    stop_tile: Option<u32>,

    /// Evaluate directions on a single thread instead of rayon workers
    #[arg(long)]
    sequential: bool,

    /// Write a binary trace per game into this directory
    #[arg(long)]
    out_dir: Option<PathBuf>,

    /// Suppress the progress bar
    #[arg(long)]
    quiet: bool,
}

enum Policy {
    Seq(MonteCarlo),
    Par(MonteCarloParallel),
}

impl Policy {
    fn new(cfg: MonteCarloConfig, sequential: bool) -> Self {
        if sequential {
            Policy::Seq(MonteCarlo::with_config(cfg))
        } else {
            Policy::Par(MonteCarloParallel::with_config(cfg))
        }
    }

    fn best_move(&mut self, board: Board, rng: &mut StdRng) -> Move {
        match self {
            Policy::Seq(p) => p.best_move(board, rng),
            Policy::Par(p) => p.best_move(board, rng),
        }
    }

    fn rollouts_played(&self) -> u64 {
        match self {
            Policy::Seq(p) => p.last_stats().rollouts,
            Policy::Par(p) => p.last_stats().rollouts,
        }
    }
}

struct GameRecord {
    states: Vec<u64>,
    moves: Vec<Move>,
    score: u64,
    highest: u32,
    elapsed_s: f64,
    start_unix_s: u64,
}

fn play_game(
    policy: &mut Policy,
    rng: &mut StdRng,
    steps: Option<u64>,
    stop_tile: Option<u32>,
) -> GameRecord {
    let start = Instant::now();
    let start_wall = trace::now_unix_seconds();
    let mut board = engine::new_game(rng);

    // In-memory trace buffers
    let mut states: Vec<u64> = Vec::with_capacity(1024);
    let mut moves: Vec<Move> = Vec::with_capacity(1024);
    states.push(board.raw());

    let mut score = 0_u64;
    let mut move_count = 0_u64;
    while !board.is_lost() {
        let mut dir = policy.best_move(board, rng);
        let mut outcome = engine::apply_move(board, dir);
        if !outcome.moved {
            // Every branch scored zero; take the first direction that moves.
            let Some((fallback_dir, fallback)) = Move::ALL
                .iter()
                .map(|&mv| (mv, engine::apply_move(board, mv)))
                .find(|(_, o)| o.moved)
            else {
                break;
            };
            dir = fallback_dir;
            outcome = fallback;
        }
        let Ok(spawned) = engine::spawn_tile(outcome.board, rng) else {
            break;
        };
        move_count += 1;
        score += outcome.score_delta;
        moves.push(dir);
        board = spawned;
        states.push(board.raw());
        if let Some(limit) = steps {
            if move_count >= limit {
                break;
            }
        }
        if let Some(tile) = stop_tile {
            if board.highest_tile() >= tile {
                break;
            }
        }
    }

    // Metadata in a post-pass to keep per-move overhead down
    let highest = states
        .iter()
        .map(|&s| Board::from_raw(s).highest_tile())
        .max()
        .unwrap_or(0);
    GameRecord {
        states,
        moves,
        score,
        highest,
        elapsed_s: start.elapsed().as_secs_f64(),
        start_unix_s: start_wall,
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    engine::new();

    let cfg = MonteCarloConfig {
        rollouts_per_move: args.rollouts,
        rollout_depth: args.depth,
    };
    let master_seed = args.seed.unwrap_or_else(|| rand::thread_rng().gen());
    let mut master = StdRng::seed_from_u64(master_seed);
    let policy_label = format!(
        "montecarlo {}x{}{}",
        args.rollouts,
        args.depth,
        if args.sequential { "" } else { " par" }
    );

    if let Some(dir) = &args.out_dir {
        fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    }

    let pb = if args.quiet {
        None
    } else {
        let pb = ProgressBar::new(args.games as u64);
        pb.set_style(ProgressStyle::with_template(
            "{bar:30} {pos}/{len} games | {msg}",
        )?);
        Some(pb)
    };

    let start = Instant::now();
    let mut policy = Policy::new(cfg, args.sequential);
    let mut total_moves = 0_u64;
    let mut total_score = 0_u64;
    let mut best_score = 0_u64;
    let mut best_tile = 0_u32;
    let mut wins = 0_u32;

    for idx in 0..args.games {
        let mut rng = StdRng::seed_from_u64(master.gen());
        let game = play_game(&mut policy, &mut rng, args.steps, args.stop_tile);
        total_moves += game.moves.len() as u64;
        total_score += game.score;
        best_score = best_score.max(game.score);
        best_tile = best_tile.max(game.highest);
        if game.highest >= WINNING_TILE {
            wins += 1;
        }

        if let Some(dir) = &args.out_dir {
            let meta = Meta {
                steps: game.moves.len() as u32,
                start_unix_s: game.start_unix_s,
                elapsed_s: game.elapsed_s as f32,
                final_score: game.score,
                highest_tile: game.highest,
                policy_str: Some(policy_label.clone()),
            };
            let path = dir.join(format!("run-{}-{:04}.mcrun", game.start_unix_s, idx));
            trace::write_run_to_path(&path, &meta, &game.states, &game.moves)
                .with_context(|| format!("writing {}", path.display()))?;
        }
        if let Some(pb) = &pb {
            pb.inc(1);
            pb.set_message(format!(
                "last score {} | best tile {}",
                game.score, best_tile
            ));
        }
    }
    if let Some(pb) = pb {
        pb.finish_and_clear();
    }

    let elapsed = start.elapsed().as_secs_f64().max(1e-6);
    println!("Seed: {}", master_seed);
    println!(
        "Games: {} | mean score: {:.1} | best score: {} | best tile: {} | reached 2048: {}",
        args.games,
        total_score as f64 / f64::from(args.games.max(1)),
        best_score,
        best_tile,
        wins
    );
    println!(
        "Moves: {} | moves/sec: {:.1} | rollouts played: {}",
        total_moves,
        total_moves as f64 / elapsed,
        policy.rollouts_played()
    );
    Ok(())
}
