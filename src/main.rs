//! MARS - CLI entry point
//!
//! Loads Redcode warrior files, plays the requested number of rounds
//! and prints a wins/ties/losses table:
//!
//! ```text
//! mars imp.red dwarf.red --rounds 10 --size 8000 --cycles 80000
//! ```

use std::path::PathBuf;
use std::process;

use clap::Parser;
use log::info;

use mars::{parse, Outcome, Round, RoundConfig, Warrior};

#[derive(Parser)]
#[command(name = "mars")]
#[command(version = "0.1.0")]
#[command(about = "MARS (Memory Array Redcode Simulator)")]
struct Cli {
    /// Warrior redcode filenames
    #[arg(required = true)]
    warriors: Vec<PathBuf>,

    /// Rounds to play
    #[arg(short, long, default_value_t = 1)]
    rounds: u32,

    /// The core size along x
    #[arg(short, long, default_value_t = 8000)]
    size: i32,

    /// The core size along y (1 plays classical 1D Core War)
    #[arg(long, default_value_t = 1)]
    height: i32,

    /// Cycles until tie
    #[arg(short, long, default_value_t = 80_000)]
    cycles: u32,

    /// Max processes per warrior
    #[arg(short, long, default_value_t = 8000)]
    processes: usize,

    /// Max warrior length
    #[arg(short, long, default_value_t = 100)]
    length: usize,

    /// Minimum warrior distance
    #[arg(short, long, default_value_t = 100)]
    distance: usize,

    /// Placement seed, for reproducible rounds
    #[arg(long)]
    seed: Option<u64>,
}

/// Per-warrior score across rounds.
#[derive(Default)]
struct Score {
    wins: u32,
    ties: u32,
    losses: u32,
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let warriors = load_warriors(&cli.warriors);
    let mut scores: Vec<Score> = warriors.iter().map(|_| Score::default()).collect();

    for round_index in 0..cli.rounds {
        let config = RoundConfig {
            core_width: cli.size,
            core_height: cli.height,
            cycles: cli.cycles,
            max_processes: cli.processes,
            max_length: cli.length,
            min_distance: cli.distance,
            // Derive a fresh seed per round so rounds stay independent.
            rng_seed: cli.seed.map(|seed| seed + u64::from(round_index)),
        };

        let mut round = match Round::new(config, &warriors) {
            Ok(round) => round,
            Err(e) => {
                eprintln!("error: {e}");
                process::exit(1);
            }
        };

        let outcome = round.run();
        info!("round {}: {:?} after {} cycles", round_index + 1, outcome, round.cycle());

        let queues = round.queues();
        for (id, score) in scores.iter_mut().enumerate() {
            let alive = !queues[&id].is_empty();
            match outcome {
                Outcome::Winner(winner) if winner == id => score.wins += 1,
                Outcome::Tie if alive => score.ties += 1,
                _ => score.losses += 1,
            }
        }
    }

    print_results(&warriors, &scores, cli.rounds);
}

fn load_warriors(paths: &[PathBuf]) -> Vec<Warrior> {
    let mut warriors = Vec::with_capacity(paths.len());
    for path in paths {
        let source = match std::fs::read_to_string(path) {
            Ok(source) => source,
            Err(e) => {
                eprintln!("error: cannot read {}: {e}", path.display());
                process::exit(1);
            }
        };

        match parse(&source) {
            Ok(mut warrior) => {
                if warrior.name == "Unnamed" {
                    if let Some(stem) = path.file_stem() {
                        warrior.name = stem.to_string_lossy().into_owned();
                    }
                }
                warriors.push(warrior);
            }
            Err(e) => {
                eprintln!("error: {}: {e}", path.display());
                process::exit(1);
            }
        }
    }
    warriors
}

fn print_results(warriors: &[Warrior], scores: &[Score], rounds: u32) {
    println!("Results: ({rounds} rounds)");
    println!("{:<40} {:>5} {:>5} {:>6}", "Warrior (Author)", "wins", "ties", "losses");
    for (warrior, score) in warriors.iter().zip(scores) {
        let title = format!("{} ({})", warrior.name, warrior.author);
        println!(
            "{:<40} {:>5} {:>5} {:>6}",
            title, score.wins, score.ties, score.losses
        );
    }
}
