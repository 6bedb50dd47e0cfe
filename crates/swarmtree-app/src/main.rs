use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use swarmtree_app::{RunOptions, format_parent_chain, load_config, run};
use swarmtree_core::{SwarmConfig, SwarmWorld};
use tracing::info;

#[derive(Parser, Debug)]
#[command(
    name = "swarmtree",
    version,
    about = "Hierarchical swarm simulation with leader rivalry"
)]
struct Cli {
    /// JSON configuration file; missing fields fall back to the defaults.
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Start from the large preset (16384 agents, depth 9) when no file is given.
    #[arg(long, conflicts_with = "config")]
    large: bool,
    #[arg(short = 'n', long, env = "ITERATIONS", default_value_t = 16)]
    iterations: usize,
    /// Overrides `output_dir` from the configuration.
    #[arg(short, long)]
    output_dir: Option<PathBuf>,
    /// Overrides `rng_seed` from the configuration.
    #[arg(long)]
    seed: Option<u64>,
    /// Skip writing per-iteration PNG frames.
    #[arg(long)]
    no_images: bool,
    /// Verify the tree invariant after every step.
    #[arg(long)]
    check: bool,
    /// Print the parent chain of this agent once the run finishes.
    #[arg(long, value_name = "AGENT")]
    inspect: Option<usize>,
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let mut config = match (&cli.config, cli.large) {
        (Some(path), _) => load_config(path)?,
        (None, true) => SwarmConfig::large_case(),
        (None, false) => SwarmConfig::default(),
    };
    if let Some(seed) = cli.seed {
        config.rng_seed = Some(seed);
    }
    if let Some(dir) = &cli.output_dir {
        config.output_dir = dir.display().to_string();
    }

    let mut options = RunOptions::new(cli.iterations, &config.output_dir);
    options.images = !cli.no_images;
    options.check = cli.check;

    let mut world = SwarmWorld::new(config)?;
    info!(
        agents = world.agents().len(),
        leaders = world.leaders().len(),
        iterations = options.iterations,
        output = %options.output_dir.display(),
        "starting swarmtree run"
    );
    run(&mut world, &options)?;

    if let Some(agent) = cli.inspect {
        let chain = world.parent_chain(agent)?;
        println!("parent chain of agent {agent}:");
        print!("{}", format_parent_chain(&chain));
    }
    Ok(())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}
