//! Binary run traces: a compact on-disk record of one played game,
//! replayable through the engine for integrity checks.

use std::fs;
use std::io::{self, Write};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::engine::{apply_move, Board, EngineError, Move};

const MAGIC: &[u8; 4] = b"MCR1"; // ASCII magic
const VERSION: u8 = 1;
const ENDIAN_LE: u8 = 0; // 0 = little-endian

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Meta {
    pub steps: u32,
    pub start_unix_s: u64,
    pub elapsed_s: f32,
    pub final_score: u64,
    pub highest_tile: u32,
    pub policy_str: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Run {
    pub meta: Meta,
    pub states: Vec<u64>, // length = steps + 1
    pub moves: Vec<Move>, // length = steps
}

#[derive(thiserror::Error, Debug)]
pub enum TraceError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("invalid magic or version")]
    MagicOrVersion,
    #[error("unsupported endianness")]
    Endianness,
    #[error("file too short or malformed")]
    Malformed,
    #[error("checksum mismatch")]
    Checksum,
    #[error("invalid move byte in trace: {0}")]
    Direction(#[from] EngineError),
    #[error("step {step}: {reason}")]
    Inconsistent { step: u32, reason: &'static str },
}

#[inline]
fn read_u16_le(bytes: &[u8]) -> Option<u16> {
    if bytes.len() < 2 {
        return None;
    }
    Some(u16::from_le_bytes([bytes[0], bytes[1]]))
}

#[inline]
fn read_u32_le(bytes: &[u8]) -> Option<u32> {
    if bytes.len() < 4 {
        return None;
    }
    Some(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

#[inline]
fn read_u64_le(bytes: &[u8]) -> Option<u64> {
    if bytes.len() < 8 {
        return None;
    }
    Some(u64::from_le_bytes([
        bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5], bytes[6], bytes[7],
    ]))
}

#[inline]
fn read_f32_le(bytes: &[u8]) -> Option<f32> {
    read_u32_le(bytes).map(f32::from_bits)
}

pub fn encode_run(meta: &Meta, states: &[u64], moves: &[Move]) -> Vec<u8> {
    // Validate lengths consistent
    assert_eq!(states.len(), meta.steps as usize + 1);
    assert_eq!(moves.len(), meta.steps as usize);

    let policy_bytes = meta
        .policy_str
        .as_ref()
        .map(|s| s.as_bytes())
        .unwrap_or(&[]);
    let policy_len: u16 = policy_bytes
        .len()
        .try_into()
        .expect("policy_str too long for u16 length");

    // Header size:
    // 4 magic + 1 version + 1 endian + 4 steps + 8 start + 4 elapsed + 8 final_score + 4 highest_tile + 2 policy_len
    let header_len = 4 + 1 + 1 + 4 + 8 + 4 + 8 + 4 + 2;
    let states_len = states.len() * 8;
    let moves_len = moves.len();
    let payload_len = policy_len as usize + states_len + moves_len;
    let total_without_checksum = header_len + payload_len;
    let mut buf = Vec::with_capacity(total_without_checksum + 4);

    // Header
    buf.extend_from_slice(MAGIC);
    buf.push(VERSION);
    buf.push(ENDIAN_LE);
    buf.extend_from_slice(&meta.steps.to_le_bytes());
    buf.extend_from_slice(&meta.start_unix_s.to_le_bytes());
    buf.extend_from_slice(&meta.elapsed_s.to_bits().to_le_bytes());
    buf.extend_from_slice(&meta.final_score.to_le_bytes());
    buf.extend_from_slice(&meta.highest_tile.to_le_bytes());
    buf.extend_from_slice(&policy_len.to_le_bytes());

    // Variable metadata
    buf.extend_from_slice(policy_bytes);

    // Payload: states LE u64, then one byte per move
    for &v in states {
        buf.extend_from_slice(&v.to_le_bytes());
    }
    buf.extend(moves.iter().map(|m| m.as_u8()));

    // Trailer: CRC32C of all preceding bytes
    let checksum = crc32c::crc32c(&buf);
    buf.extend_from_slice(&checksum.to_le_bytes());
    buf
}

pub fn write_run_to_path<P: AsRef<Path>>(
    path: P,
    meta: &Meta,
    states: &[u64],
    moves: &[Move],
) -> Result<(), TraceError> {
    let data = encode_run(meta, states, moves);
    let mut f = fs::File::create(path)?;
    f.write_all(&data)?;
    Ok(())
}

pub fn parse_run_bytes(bytes: &[u8]) -> Result<Run, TraceError> {
    // header + checksum at minimum (no payload)
    if bytes.len() < 4 + 1 + 1 + 4 + 8 + 4 + 8 + 4 + 2 + 4 {
        return Err(TraceError::Malformed);
    }

    // Validate the checksum first to avoid reading fields of a damaged file
    let (content, trailer) = bytes.split_at(bytes.len() - 4);
    let file_crc = read_u32_le(trailer).ok_or(TraceError::Malformed)?;
    let calc_crc = crc32c::crc32c(content);
    if file_crc != calc_crc {
        return Err(TraceError::Checksum);
    }

    // Fixed header
    if &content[..4] != MAGIC {
        return Err(TraceError::MagicOrVersion);
    }
    if content[4] != VERSION {
        return Err(TraceError::MagicOrVersion);
    }
    if content[5] != ENDIAN_LE {
        return Err(TraceError::Endianness);
    }

    let mut off = 6;
    let steps = read_u32_le(&content[off..]).ok_or(TraceError::Malformed)?;
    off += 4;
    let start_unix_s = read_u64_le(&content[off..]).ok_or(TraceError::Malformed)?;
    off += 8;
    let elapsed_s = read_f32_le(&content[off..]).ok_or(TraceError::Malformed)?;
    off += 4;
    let final_score = read_u64_le(&content[off..]).ok_or(TraceError::Malformed)?;
    off += 8;
    let highest_tile = read_u32_le(&content[off..]).ok_or(TraceError::Malformed)?;
    off += 4;
    let policy_len = read_u16_le(&content[off..]).ok_or(TraceError::Malformed)? as usize;
    off += 2;

    if content.len() < off + policy_len {
        return Err(TraceError::Malformed);
    }
    let policy_bytes = &content[off..off + policy_len];
    off += policy_len;
    let policy_str = if policy_len > 0 {
        match std::str::from_utf8(policy_bytes) {
            Ok(s) => Some(s.to_string()),
            Err(_) => None,
        }
    } else {
        None
    };

    let states_count = steps as usize + 1;
    let states_bytes_len = states_count.checked_mul(8).ok_or(TraceError::Malformed)?;
    let moves_len = steps as usize;

    if content.len() < off + states_bytes_len + moves_len {
        return Err(TraceError::Malformed);
    }

    let mut states = Vec::with_capacity(states_count);
    let mut i = 0;
    while i < states_bytes_len {
        let v = read_u64_le(&content[off + i..]).ok_or(TraceError::Malformed)?;
        states.push(v);
        i += 8;
    }
    off += states_bytes_len;

    let mut moves = Vec::with_capacity(moves_len);
    for &b in &content[off..off + moves_len] {
        moves.push(Move::try_from(b)?);
    }

    let meta = Meta {
        steps,
        start_unix_s,
        elapsed_s,
        final_score,
        highest_tile,
        policy_str,
    };

    Ok(Run { meta, states, moves })
}

pub fn parse_run_file<P: AsRef<Path>>(path: P) -> Result<Run, TraceError> {
    let data = fs::read(path)?;
    parse_run_bytes(&data)
}

/// Replays a run through the engine and checks it against its own metadata.
///
/// Every recorded move must change the board, every post-move state must
/// differ from the replayed one by exactly one spawned 2 or 4, and the
/// summed merge scores and highest tile must match the header.
pub fn verify_run(run: &Run) -> Result<(), TraceError> {
    let steps = run.meta.steps as usize;
    if run.states.len() != steps + 1 || run.moves.len() != steps {
        return Err(TraceError::Inconsistent {
            step: 0,
            reason: "state and move counts do not match the step count",
        });
    }

    let mut score = 0_u64;
    for (i, &mv) in run.moves.iter().enumerate() {
        let step = i as u32;
        let before = Board::from_raw(run.states[i]);
        let outcome = apply_move(before, mv);
        if !outcome.moved {
            return Err(TraceError::Inconsistent {
                step,
                reason: "recorded move does not change the board",
            });
        }
        score += outcome.score_delta;
        check_spawn(step, outcome.board, Board::from_raw(run.states[i + 1]))?;
    }

    if score != run.meta.final_score {
        return Err(TraceError::Inconsistent {
            step: run.meta.steps,
            reason: "merge scores do not add up to the recorded final score",
        });
    }

    let highest = run
        .states
        .iter()
        .map(|&s| Board::from_raw(s).highest_tile())
        .max()
        .unwrap_or(0);
    if highest != run.meta.highest_tile {
        return Err(TraceError::Inconsistent {
            step: run.meta.steps,
            reason: "highest tile does not match the recorded value",
        });
    }

    Ok(())
}

fn check_spawn(step: u32, played: Board, recorded: Board) -> Result<(), TraceError> {
    let before = played.to_grid();
    let after = recorded.to_grid();
    let mut spawned = 0;
    for row in 0..Board::SIZE {
        for col in 0..Board::SIZE {
            let (old, new) = (before[row][col], after[row][col]);
            if old == new {
                continue;
            }
            if old == 0 && (new == 2 || new == 4) {
                spawned += 1;
                continue;
            }
            return Err(TraceError::Inconsistent {
                step,
                reason: "state differs from the replay outside the spawned cell",
            });
        }
    }
    if spawned == 1 {
        Ok(())
    } else {
        Err(TraceError::Inconsistent {
            step,
            reason: "expected exactly one spawned tile after the move",
        })
    }
}

pub fn now_unix_seconds() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use tempfile::NamedTempFile;

    /// Plays a short seeded game with a fixed policy and records it.
    fn recorded_game(seed: u64, max_steps: usize) -> Run {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut board = engine::new_game(&mut rng);
        let mut states = vec![board.into_raw()];
        let mut moves = Vec::new();
        let mut score = 0_u64;

        while moves.len() < max_steps {
            let Some((mv, outcome)) = Move::ALL
                .iter()
                .map(|&mv| (mv, engine::apply_move(board, mv)))
                .find(|(_, o)| o.moved)
            else {
                break;
            };
            score += outcome.score_delta;
            board = engine::spawn_tile(outcome.board, &mut rng).unwrap();
            states.push(board.into_raw());
            moves.push(mv);
        }

        let highest = states
            .iter()
            .map(|&s| Board::from_raw(s).highest_tile())
            .max()
            .unwrap();
        let meta = Meta {
            steps: moves.len() as u32,
            start_unix_s: 1_700_000_000,
            elapsed_s: 0.5,
            final_score: score,
            highest_tile: highest,
            policy_str: Some("montecarlo 100x10".to_string()),
        };
        Run { meta, states, moves }
    }

    #[test]
    fn round_trip_small() {
        let states = vec![0x1000_0000_0000_0000_u64, 0x1000_0000_0000_1100];
        let moves = vec![Move::Down];
        let meta = Meta {
            steps: moves.len() as u32,
            start_unix_s: 1_700_000_000,
            elapsed_s: 12.34,
            final_score: 12345,
            highest_tile: 2048,
            policy_str: Some("montecarlo 100x10".to_string()),
        };

        let tmp = NamedTempFile::new().unwrap();
        write_run_to_path(tmp.path(), &meta, &states, &moves).unwrap();
        let run = parse_run_file(tmp.path()).unwrap();
        assert_eq!(run.meta, meta);
        assert_eq!(run.states, states);
        assert_eq!(run.moves, moves);
    }

    #[test]
    fn checksum_mismatch() {
        let states = vec![0_u64, 1_u64];
        let moves = vec![Move::Up];
        let meta = Meta {
            steps: 1,
            start_unix_s: 0,
            elapsed_s: 0.0,
            final_score: 0,
            highest_tile: 0,
            policy_str: None,
        };
        let mut bytes = encode_run(&meta, &states, &moves);
        // Flip one byte in the payload
        let header_len = 4 + 1 + 1 + 4 + 8 + 4 + 8 + 4 + 2;
        bytes[header_len] ^= 0xFF;
        let err = parse_run_bytes(&bytes).unwrap_err();
        assert!(matches!(err, TraceError::Checksum));
    }

    #[test]
    fn malformed_bounds() {
        let states = vec![0_u64, 1_u64, 2_u64];
        let moves = vec![Move::Up, Move::Left];
        let meta = Meta {
            steps: 2,
            start_unix_s: 0,
            elapsed_s: 0.0,
            final_score: 0,
            highest_tile: 0,
            policy_str: None,
        };
        let mut bytes = encode_run(&meta, &states, &moves);
        // Truncate to simulate an incomplete file
        bytes.truncate(bytes.len() - 5);
        let err = parse_run_bytes(&bytes).unwrap_err();
        assert!(matches!(err, TraceError::Malformed));
    }

    #[test]
    fn rejects_unknown_move_bytes() {
        let states = vec![0_u64, 1_u64];
        let moves = vec![Move::Left];
        let meta = Meta {
            steps: 1,
            start_unix_s: 0,
            elapsed_s: 0.0,
            final_score: 0,
            highest_tile: 0,
            policy_str: None,
        };
        let mut bytes = encode_run(&meta, &states, &moves);
        // Overwrite the single move byte and re-seal the checksum so the
        // parser gets past the trailer check.
        let header_len = 4 + 1 + 1 + 4 + 8 + 4 + 8 + 4 + 2;
        let move_at = header_len + states.len() * 8;
        bytes[move_at] = 9;
        let content_len = bytes.len() - 4;
        let crc = crc32c::crc32c(&bytes[..content_len]);
        bytes[content_len..].copy_from_slice(&crc.to_le_bytes());

        let err = parse_run_bytes(&bytes).unwrap_err();
        assert!(matches!(
            err,
            TraceError::Direction(EngineError::InvalidDirection(9))
        ));
    }

    #[test]
    fn verify_accepts_a_recorded_game() {
        for seed in 0..20 {
            let run = recorded_game(seed, 40);
            assert!(run.meta.steps > 0);
            verify_run(&run).unwrap();
        }
    }

    #[test]
    fn verify_round_trips_through_bytes() {
        let run = recorded_game(7, 25);
        let bytes = encode_run(&run.meta, &run.states, &run.moves);
        let parsed = parse_run_bytes(&bytes).unwrap();
        assert_eq!(parsed, run);
        verify_run(&parsed).unwrap();
    }

    #[test]
    fn verify_rejects_a_wrong_final_score() {
        let mut run = recorded_game(3, 25);
        run.meta.final_score += 4;
        let err = verify_run(&run).unwrap_err();
        assert!(matches!(err, TraceError::Inconsistent { .. }));
    }

    #[test]
    fn verify_rejects_a_tampered_state() {
        let mut run = recorded_game(5, 25);
        // Any nibble change breaks either the replay match or the spawn shape.
        run.states[1] ^= 0x7;
        let err = verify_run(&run).unwrap_err();
        assert!(matches!(err, TraceError::Inconsistent { step: 0, .. }));
    }

    #[test]
    fn verify_rejects_a_move_that_does_not_move() {
        let board = Board::from_grid([[2, 0, 0, 0], [0; 4], [0; 4], [0; 4]]).unwrap();
        let meta = Meta {
            steps: 1,
            start_unix_s: 0,
            elapsed_s: 0.0,
            final_score: 0,
            highest_tile: 2,
            policy_str: None,
        };
        let run = Run {
            meta,
            states: vec![board.into_raw(), board.into_raw()],
            moves: vec![Move::Left],
        };
        let err = verify_run(&run).unwrap_err();
        assert!(matches!(err, TraceError::Inconsistent { step: 0, .. }));
    }

    #[test]
    fn verify_rejects_mismatched_lengths() {
        let mut run = recorded_game(1, 10);
        run.moves.pop();
        let err = verify_run(&run).unwrap_err();
        assert!(matches!(err, TraceError::Inconsistent { step: 0, .. }));
    }
}
