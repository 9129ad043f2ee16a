use std::path::{Path, PathBuf};

use clap::Parser;
use env_logger::Env;
use log::{info, warn};
use serde::Serialize;
use walkdir::WalkDir;

use mc_2048::engine::Board;
use mc_2048::trace::{self, Run, TraceError};

#[derive(Debug, Parser)]
#[command(name = "replay", about = "Parse and verify recorded .mcrun trace files")]
struct Args {
    /// Input path: either a single .mcrun file or a directory containing them
    input: PathBuf,

    /// Print each run's metadata and final board
    #[arg(short, long)]
    verbose: bool,

    /// Emit one JSON report line per file on stdout
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Serialize)]
struct RunReport {
    file: String,
    ok: bool,
    steps: u32,
    final_score: u64,
    highest_tile: u32,
    policy: Option<String>,
    error: Option<String>,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let files = collect_inputs(&args.input)?;
    if files.is_empty() {
        info!("No .mcrun files found in {}", args.input.display());
        return Ok(());
    }

    let mut failed = 0_usize;
    for file in &files {
        let report = match check_run(file) {
            Ok(run) => {
                info!(
                    "✓ {}: {} steps, score {}, highest tile {}",
                    file.display(),
                    run.meta.steps,
                    run.meta.final_score,
                    run.meta.highest_tile
                );
                if args.verbose {
                    if let Some(policy) = &run.meta.policy_str {
                        info!("  policy: {}", policy);
                    }
                    info!("  elapsed: {:.1}s", run.meta.elapsed_s);
                    if let Some(&last) = run.states.last() {
                        println!("{}", Board::from_raw(last));
                    }
                }
                report_for(file, Some(&run), None)
            }
            Err(e) => {
                failed += 1;
                warn!("✗ {}: {}", file.display(), e);
                report_for(file, None, Some(e))
            }
        };
        if args.json {
            println!("{}", serde_json::to_string(&report)?);
        }
    }

    info!(
        "Checked {} file(s): {} ok, {} failed",
        files.len(),
        files.len() - failed,
        failed
    );
    if failed > 0 {
        anyhow::bail!("{} of {} runs failed verification", failed, files.len());
    }
    Ok(())
}

fn collect_inputs(input: &Path) -> anyhow::Result<Vec<PathBuf>> {
    if input.is_file() {
        return Ok(vec![input.to_path_buf()]);
    }
    if input.is_dir() {
        let mut files = Vec::new();
        for entry in WalkDir::new(input) {
            let entry = entry?;
            if entry.file_type().is_file() {
                if let Some(ext) = entry.path().extension() {
                    if ext == "mcrun" {
                        files.push(entry.path().to_path_buf());
                    }
                }
            }
        }
        files.sort();
        return Ok(files);
    }
    anyhow::bail!(
        "Input path '{}' is neither a file nor a directory",
        input.display()
    );
}

fn check_run(path: &Path) -> Result<Run, TraceError> {
    let run = trace::parse_run_file(path)?;
    trace::verify_run(&run)?;
    Ok(run)
}

fn report_for(file: &Path, run: Option<&Run>, err: Option<TraceError>) -> RunReport {
    match run {
        Some(run) => RunReport {
            file: file.display().to_string(),
            ok: true,
            steps: run.meta.steps,
            final_score: run.meta.final_score,
            highest_tile: run.meta.highest_tile,
            policy: run.meta.policy_str.clone(),
            error: None,
        },
        None => RunReport {
            file: file.display().to_string(),
            ok: false,
            steps: 0,
            final_score: 0,
            highest_tile: 0,
            policy: None,
            error: err.map(|e| e.to_string()),
        },
    }
}
