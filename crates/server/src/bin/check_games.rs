//! Check local PGN games against repertoire study exports.
//!
//! Usage: cargo run --bin check-games -- --white <study.pgn> --black <study.pgn> --user <name> <games glob...>
//!
//! Prints one JSON line per game, then a summary line.

use std::env;
use std::fs;

use anyhow::{bail, Context};
use chess_core::pgn::{lichess_game_id, parse_games};
use serde_json::json;
use server::analysis::{GameOutcome, Repertoire};
use tracing_subscriber::EnvFilter;

struct Args {
    white: String,
    black: String,
    user: String,
    patterns: Vec<String>,
}

fn parse_args() -> anyhow::Result<Args> {
    let args: Vec<String> = env::args().collect();
    let mut white = None;
    let mut black = None;
    let mut user = None;
    let mut patterns = Vec::new();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            flag @ ("--white" | "--black" | "--user") => {
                let value = args
                    .get(i + 1)
                    .with_context(|| format!("{flag} needs a value"))?
                    .clone();
                match flag {
                    "--white" => white = Some(value),
                    "--black" => black = Some(value),
                    _ => user = Some(value),
                }
                i += 2;
            }
            other => {
                patterns.push(other.to_string());
                i += 1;
            }
        }
    }

    match (white, black, user) {
        (Some(white), Some(black), Some(user)) if !patterns.is_empty() => Ok(Args {
            white,
            black,
            user,
            patterns,
        }),
        _ => bail!(
            "Usage: {} --white <study.pgn> --black <study.pgn> --user <name> <games glob...>",
            args.first().map(String::as_str).unwrap_or("check-games")
        ),
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .with_writer(std::io::stderr)
        .init();

    let args = parse_args()?;

    let white_pgn = fs::read_to_string(&args.white).with_context(|| format!("reading {}", args.white))?;
    let black_pgn = fs::read_to_string(&args.black).with_context(|| format!("reading {}", args.black))?;
    let repertoire = Repertoire::from_pgn(&white_pgn, &black_pgn).context("building repertoire")?;

    let (mut games, mut deviations, mut in_book, mut failed) = (0usize, 0usize, 0usize, 0usize);

    for pattern in &args.patterns {
        let paths = glob::glob(pattern).with_context(|| format!("bad glob pattern {pattern}"))?;
        for entry in paths {
            let path = entry?;
            let text = fs::read_to_string(&path).with_context(|| format!("reading {}", path.display()))?;

            for (n, parsed) in parse_games(&text).into_iter().enumerate() {
                games += 1;
                let fallback_id = format!("{}#{}", path.display(), n + 1);

                let line = match parsed {
                    Ok(game) => {
                        let id = game
                            .metadata
                            .site
                            .as_deref()
                            .and_then(lichess_game_id)
                            .unwrap_or(fallback_id);
                        match repertoire.analyze_game(&game, &args.user) {
                            GameOutcome::Deviation { record, .. } => {
                                deviations += 1;
                                json!({ "game": id, "result": "deviation", "deviation": record })
                            }
                            GameOutcome::InBook => {
                                in_book += 1;
                                json!({ "game": id, "result": "in_book" })
                            }
                            GameOutcome::Failed(reason) => {
                                failed += 1;
                                json!({ "game": id, "result": "error", "reason": reason })
                            }
                        }
                    }
                    Err(e) => {
                        failed += 1;
                        json!({ "game": fallback_id, "result": "error", "reason": e.to_string() })
                    }
                };
                println!("{line}");
            }
        }
    }

    println!(
        "{}",
        json!({ "summary": { "games": games, "deviations": deviations, "in_book": in_book, "errors": failed } })
    );
    Ok(())
}
