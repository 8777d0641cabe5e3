use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use earmark::db::Database;
use earmark::engine::TimeWindow;
use earmark::fingerprint::StrategyId;
use earmark::matcher::MatchResult;
use earmark::registrar::BatchEvent;
use earmark::{decode, engine, registrar};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "earmark", version, about = "Offline audio recognition")]
struct Cli {
    /// Path to the SQLite database
    #[arg(long, global = true)]
    db_path: Option<PathBuf>,

    /// Verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan directories and register reference recordings
    Register {
        /// Directories to scan (defaults to config file music_dirs)
        paths: Vec<String>,

        /// Fingerprint strategy (defaults to config file setting)
        #[arg(short, long, value_enum)]
        strategy: Option<StrategyId>,

        /// Number of parallel workers (0 = auto-detect from config)
        #[arg(short = 'j', long, default_value = "0")]
        jobs: usize,
    },

    /// Identify an unknown clip against the registered corpus
    Identify {
        /// Audio file to identify
        file: PathBuf,

        /// Match only the segment starting here (seconds or mm:ss)
        #[arg(long)]
        from: Option<String>,

        /// End of the segment (seconds or mm:ss; defaults to end of file)
        #[arg(long)]
        to: Option<String>,

        /// Fingerprint strategy (must match the registered corpus)
        #[arg(short, long, value_enum)]
        strategy: Option<StrategyId>,

        /// Minimum alignment score to accept a match
        #[arg(long)]
        min_score: Option<u32>,
    },

    /// Show corpus statistics
    Stats,

    /// Delete every recording and fingerprint
    Clear {
        /// Confirm the deletion
        #[arg(long)]
        yes: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    // Load config file (optional, defaults if missing)
    let config = earmark::config::AppConfig::load();

    // Resolve database path: CLI > config > XDG default
    let db_path = cli
        .db_path
        .or(config.db_path.clone())
        .unwrap_or_else(earmark::config::default_db_path);
    log::info!("Database: {}", db_path.display());

    let db = Database::open(&db_path).context("Failed to open database")?;

    match cli.command {
        Commands::Register {
            paths,
            strategy,
            jobs,
        } => {
            let scan_paths = if !paths.is_empty() {
                paths
            } else if !config.music_dirs.is_empty() {
                config
                    .music_dirs
                    .iter()
                    .map(|p| p.to_string_lossy().to_string())
                    .collect()
            } else {
                anyhow::bail!(
                    "No directories to scan. Pass paths as arguments or set music_dirs in config."
                );
            };

            let strategy = config.fingerprint.strategy(strategy);
            let workers = if jobs > 0 {
                jobs
            } else {
                config.resolve_workers()
            };

            let pb = ProgressBar::hidden();
            let result = registrar::register_directories(
                &db,
                &scan_paths,
                &strategy,
                workers,
                &mut |event| match event {
                    BatchEvent::Scanned { total } => {
                        pb.set_length(total as u64);
                        pb.set_style(
                            ProgressStyle::with_template(
                                "{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}",
                            )
                            .unwrap()
                            .progress_chars("#>-"),
                        );
                        pb.set_draw_target(indicatif::ProgressDrawTarget::stderr());
                    }
                    BatchEvent::Started { .. } => {}
                    BatchEvent::Registered { path, .. } => {
                        pb.set_message(
                            path.file_name()
                                .map(|f| f.to_string_lossy().to_string())
                                .unwrap_or_default(),
                        );
                        pb.inc(1);
                    }
                    BatchEvent::Skipped { .. } | BatchEvent::Failed { .. } => pb.inc(1),
                },
            )
            .context("Registration failed")?;
            pb.finish_and_clear();

            println!(
                "Registration complete: {} scanned, {} registered, {} skipped, {} failed",
                result.scanned, result.registered, result.skipped, result.failed
            );
        }

        Commands::Identify {
            file,
            from,
            to,
            strategy,
            min_score,
        } => {
            let strategy = config.fingerprint.strategy(strategy);
            let params = config.fingerprint.match_params(min_score);

            let samples = decode::decode_to_rate(&file, strategy.sample_rate())
                .with_context(|| format!("Failed to decode {}", file.display()))?;

            let window = match (&from, &to) {
                (None, None) => None,
                (start, end) => {
                    let start_secs = start.as_deref().map(parse_timestamp).transpose()?.unwrap_or(0.0);
                    let end_secs = end
                        .as_deref()
                        .map(parse_timestamp)
                        .transpose()?
                        .unwrap_or(samples.len() as f64 / f64::from(strategy.sample_rate()));
                    Some(TimeWindow {
                        start_secs,
                        end_secs,
                    })
                }
            };

            let result = engine::identify(
                &samples,
                strategy.sample_rate(),
                &strategy,
                &db,
                &params,
                window,
            )
            .context("Matching failed")?;

            match result {
                MatchResult::Match(info) => {
                    let recording = db
                        .get_recording(info.audio_id)
                        .context("Query failed")?
                        .context("Matched recording missing from database")?;
                    println!("Best match: {} (id {})", recording.display_name, info.audio_id);
                    println!("  path:   {}", recording.file_path);
                    println!("  score:  {} aligned fingerprints", info.score);
                    println!("  offset: {} frames", info.offset);
                }
                MatchResult::NoMatch => {
                    println!("No match found.");
                }
            }
        }

        Commands::Stats => {
            let stats = db.stats().context("Failed to get stats")?;
            println!("Corpus Statistics");
            println!("=================");
            println!("Recordings: {}", stats.recordings);
            println!();
            println!("Fingerprints:");
            for (label, count) in &stats.fingerprints {
                println!("  {:<16} {}", label, count);
            }
        }

        Commands::Clear { yes } => {
            if !yes {
                anyhow::bail!("This deletes every recording and fingerprint. Re-run with --yes.");
            }
            db.clear_all().context("Failed to clear database")?;
            println!("Database cleared.");
        }
    }

    Ok(())
}

/// Parse a timestamp given as plain seconds ("12.5") or mm:ss ("3:25").
fn parse_timestamp(value: &str) -> Result<f64> {
    let value = value.trim();
    if let Some((minutes, seconds)) = value.split_once(':') {
        let minutes: f64 = minutes
            .parse()
            .with_context(|| format!("Invalid minutes in '{value}'"))?;
        let seconds: f64 = seconds
            .parse()
            .with_context(|| format!("Invalid seconds in '{value}'"))?;
        Ok(minutes * 60.0 + seconds)
    } else {
        value
            .parse()
            .with_context(|| format!("Invalid timestamp '{value}' (expected seconds or mm:ss)"))
    }
}
