//! presnap CLI - batch driver for the route clustering pipeline
//!
//! Usage:
//!   presnap-cli clusters <data-dir> [--weeks N] [--output <dir>] [--config <file>]
//!   presnap-cli features <data-dir> [--weeks N] [--clusters <dir>] [--output <dir>]
//!   presnap-cli synthetic <output-dir> [--games N] [--seed S]
//!
//! `clusters` trains the outlier filter and clusterer on the reference week,
//! applies them to every requested week and writes the cluster tables.
//! `features` joins those tables back onto tracking and play context.

use clap::{Parser, Subcommand};
use log::{error, info};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Instant;

use presnap::synthetic::SyntheticScenario;
use presnap::{PipelineConfig, Result, assembly, io, pipeline};

#[derive(Parser)]
#[command(name = "presnap-cli")]
#[command(about = "Pre-snap route clustering and play feature pipeline", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// JSON configuration file; defaults apply to missing fields
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose debug output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Train route models and write the cluster tables
    Clusters {
        /// Folder containing tracking_week_N.csv and player_play.csv
        data: PathBuf,

        /// Number of tracking weeks to read (1-9)
        #[arg(short, long, default_value = "9")]
        weeks: u8,

        /// Output directory (defaults to the data folder)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Assemble play features and ORPSP targets from the cluster tables
    Features {
        /// Folder containing tracking, plays.csv, players.csv and player_play.csv
        data: PathBuf,

        /// Number of tracking weeks to read (1-9)
        #[arg(short, long, default_value = "9")]
        weeks: u8,

        /// Folder containing the cluster tables (defaults to the data folder)
        #[arg(long)]
        clusters: Option<PathBuf>,

        /// Output directory (defaults to the data folder)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Write a deterministic synthetic dataset
    Synthetic {
        /// Output directory
        output: PathBuf,

        /// Number of games
        #[arg(short, long, default_value = "6")]
        games: usize,

        /// RNG seed
        #[arg(short, long, default_value = "42")]
        seed: u64,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format(|buf, record| writeln!(buf, "[{:5}] {}", record.level(), record.args()))
        .init();

    let result = load_config(cli.config.as_deref()).and_then(|config| match cli.command {
        Commands::Clusters {
            data,
            weeks,
            output,
        } => run_clusters(&data, weeks, output.as_deref().unwrap_or(&data), &config),
        Commands::Features {
            data,
            weeks,
            clusters,
            output,
        } => run_features(
            &data,
            weeks,
            clusters.as_deref().unwrap_or(&data),
            output.as_deref().unwrap_or(&data),
            &config,
        ),
        Commands::Synthetic {
            output,
            games,
            seed,
        } => run_synthetic(&output, games, seed),
    });

    if let Err(e) = result {
        error!("{}", e);
        std::process::exit(1);
    }
}

fn load_config(path: Option<&Path>) -> Result<PipelineConfig> {
    match path {
        Some(path) => {
            info!("Loading configuration from {}", path.display());
            PipelineConfig::load(path)
        }
        None => Ok(PipelineConfig::default()),
    }
}

fn run_clusters(data: &Path, weeks: u8, output: &Path, config: &PipelineConfig) -> Result<()> {
    let start = Instant::now();
    let tracking = io::read_tracking_weeks(data, weeks)?;
    let participation = io::read_player_plays(data)?;

    let run = pipeline::run_clustering(&tracking, &participation, config)?;

    std::fs::create_dir_all(output)?;
    io::write_cluster_tables(output, &run.tables)?;
    io::write_complete_plays(output, &run.complete_plays)?;
    io::save_models(&output.join(io::MODELS_FILE), &run.models)?;

    println!("\n{}", "=".repeat(60));
    println!("CLUSTERING SUMMARY");
    println!("{}", "=".repeat(60));
    println!("Route segments:     {}", run.stats.segments);
    println!("Clusters:           {}", run.models.clusterer.n_clusters());
    println!("Clustered routes:   {}", run.tables.assignments.len());
    println!("Reception zones:    {}", run.tables.reception_zones.len());
    println!("Complete plays:     {}", run.complete_plays.len());
    println!("Elapsed:            {:.2?}", start.elapsed());
    Ok(())
}

fn run_features(
    data: &Path,
    weeks: u8,
    clusters: &Path,
    output: &Path,
    config: &PipelineConfig,
) -> Result<()> {
    let start = Instant::now();
    let tables = io::read_cluster_tables(clusters)?;
    let complete = io::read_complete_plays(clusters)?;
    let plays = io::read_plays(data)?;
    let players = io::read_players(data)?;
    let participation = io::read_player_plays(data)?;
    let tracking = io::read_tracking_weeks(data, weeks)?;

    let targets = assembly::orpsp_targets(&complete, &plays, &participation);
    let rows =
        assembly::assemble_play_features(&complete, &plays, &players, &tables, &tracking, config);

    std::fs::create_dir_all(output)?;
    io::write_targets(output, &targets)?;
    io::write_play_features(output, &rows)?;

    println!("\n{}", "=".repeat(60));
    println!("FEATURE SUMMARY");
    println!("{}", "=".repeat(60));
    println!("Feature rows:       {}", rows.len());
    println!("Labelled runners:   {}", targets.len());
    println!("Elapsed:            {:.2?}", start.elapsed());
    Ok(())
}

fn run_synthetic(output: &Path, games: usize, seed: u64) -> Result<()> {
    let dataset = SyntheticScenario::with_games(games, seed).generate();
    dataset.write_to(output)?;
    info!(
        "Wrote {} tracking frames for {} plays to {}",
        dataset.tracking.len(),
        dataset.plays.len(),
        output.display()
    );
    Ok(())
}
