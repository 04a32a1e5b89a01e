// main.rs - maze-explorer: generate, explore, persist and inspect segment trees.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::{info, warn};
use maze_segment_engine::{EngineConfig, ExplorationEngine, PersistenceCodec, RunConfig, SegmentId};
use maze_segment_explorer::http_server::{self, ServerState};
use maze_segment_explorer::report;
use std::path::{Path, PathBuf};
use std::time::Instant;

const DEFAULT_TREE: &str = "pathsegment_tree.json";

/// CLI
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Generate a maze, explore it and save the tree snapshot
    Run {
        /// JSON run configuration; flags below override its fields
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Maze width in cells
        #[arg(short = 'W', long, allow_negative_numbers = true)]
        width: Option<i32>,

        /// Maze height in cells
        #[arg(short = 'H', long, allow_negative_numbers = true)]
        height: Option<i32>,

        /// Generator seed
        #[arg(short, long)]
        seed: Option<u64>,

        /// Upper bound on exploration steps
        #[arg(long)]
        max_steps: Option<u64>,

        /// Snapshot output path
        #[arg(short, long, default_value = DEFAULT_TREE)]
        output: PathBuf,
    },

    /// Print the root-first lineage of one segment
    Lineage {
        /// Segment id: `root` or `s<n>`
        segment: String,

        #[arg(short, long, default_value = DEFAULT_TREE)]
        input: PathBuf,
    },

    /// List every segment grouped by generation
    List {
        #[arg(short, long, default_value = DEFAULT_TREE)]
        input: PathBuf,
    },

    /// Print exploration statistics as JSON
    Stats {
        #[arg(short, long, default_value = DEFAULT_TREE)]
        input: PathBuf,
    },

    /// Start the HTTP query service
    Serve {
        /// Snapshot to serve; a fresh engine is generated when omitted
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Engine configuration used for generation and `POST /reset`
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Listen port (falls back to $PORT, then 3030)
        #[arg(short, long)]
        port: Option<u16>,
    },
}

fn load_run_config(path: Option<&Path>) -> Result<RunConfig> {
    match path {
        Some(path) => RunConfig::from_json_file(path)
            .with_context(|| format!("Failed to read run configuration {}", path.display())),
        None => Ok(RunConfig::default()),
    }
}

fn load_tree(path: &Path) -> Result<ExplorationEngine> {
    PersistenceCodec::load_from_file(path)
        .with_context(|| format!("Failed to load segment tree {}", path.display()))
}

fn run_exploration(config: RunConfig, output: &Path) -> Result<()> {
    let EngineConfig { width, height, seed } = config.engine;
    let mut engine = ExplorationEngine::from_config(&config.engine)
        .with_context(|| format!("Failed to generate {width}x{height} maze"))?;
    info!(
        "Maze {}x{} (seed {}): start {}, goal {}",
        engine.maze().width(),
        engine.maze().height(),
        seed,
        engine.maze().start(),
        engine.maze().goal()
    );

    let started = Instant::now();
    while engine.total_steps() < config.max_steps {
        let more = engine.step();
        let steps = engine.total_steps();
        if steps % 10 == 0 {
            info!(
                "Step {}: {} active segments, {} total",
                steps,
                engine.active_ids().len(),
                engine.segment_count()
            );
        }
        if !more {
            break;
        }
    }
    info!("Exploration finished in {:?} after {} steps", started.elapsed(), engine.total_steps());

    if engine.goal_found() {
        engine.enable_winner_only_mode();
    } else {
        warn!("Goal not reached within {} steps", config.max_steps);
    }

    PersistenceCodec::save_to_file(&engine, output)
        .with_context(|| format!("Failed to write segment tree {}", output.display()))?;
    print!("{}", report::summary(&engine.statistics()));
    println!("Snapshot written to {}", output.display());
    Ok(())
}

async fn serve(input: Option<PathBuf>, config: Option<PathBuf>, port: Option<u16>) -> Result<()> {
    let engine_config = load_run_config(config.as_deref())?.engine;
    let state = match input {
        Some(path) => ServerState::new(load_tree(&path)?, engine_config),
        None => ServerState::from_config(engine_config).context("Failed to generate maze")?,
    };
    http_server::start_server(state, http_server::resolve_port(port)).await
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    match args.command {
        Command::Run {
            config,
            width,
            height,
            seed,
            max_steps,
            output,
        } => {
            let mut run_config = load_run_config(config.as_deref())?;
            if let Some(width) = width {
                run_config.engine.width = width;
            }
            if let Some(height) = height {
                run_config.engine.height = height;
            }
            if let Some(seed) = seed {
                run_config.engine.seed = seed;
            }
            if let Some(max_steps) = max_steps {
                run_config.max_steps = max_steps;
            }
            run_exploration(run_config, &output)
        }
        Command::Lineage { segment, input } => {
            let engine = load_tree(&input)?;
            let id: SegmentId = segment.parse()?;
            print!("{}", report::lineage_report(&engine, id)?);
            Ok(())
        }
        Command::List { input } => {
            let engine = load_tree(&input)?;
            print!("{}", report::generation_listing(&engine));
            Ok(())
        }
        Command::Stats { input } => {
            let engine = load_tree(&input)?;
            let json = serde_json::to_string_pretty(&engine.statistics())
                .context("Failed to serialize statistics")?;
            println!("{json}");
            Ok(())
        }
        Command::Serve { input, config, port } => serve(input, config, port).await,
    }
}
