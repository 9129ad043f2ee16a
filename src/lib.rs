//! mc-2048: a 2048 game engine + Monte Carlo rollout policy
//!
//! This crate provides:
//! - A compact `Board` type with ergonomic methods (`apply`, `spawn_tile`, `is_won`, ...)
//! - A Monte Carlo move policy (`montecarlo` module) with single-threaded and parallel variants
//! - A binary trace format for recorded runs (`trace` module)
//!
//! Quick start:
//! ```
//! use mc_2048::engine::{self, Move};
//! use mc_2048::montecarlo::MonteCarlo;
//! use rand::{rngs::StdRng, SeedableRng};
//!
//! // One-time table init
//! engine::new();
//!
//! // Deterministic setup with a seeded RNG
//! let mut rng = StdRng::seed_from_u64(42);
//! let board = engine::new_game(&mut rng);
//! assert_eq!(board.count_empty(), 14);
//!
//! let mut policy = MonteCarlo::new();
//! let chosen = policy.best_move(board, &mut rng);
//! assert!(Move::ALL.contains(&chosen));
//! ```
//!
//! Every random draw in the crate goes through an RNG the caller passes in,
//! so whole games replay bit-for-bit from a seed.
pub mod engine;
pub mod montecarlo;
pub mod trace;
