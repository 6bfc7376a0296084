use std::{path::PathBuf, time::Duration};

use anyhow::Context;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64;
use rexevo_engine::{DriverConfig, GameDriver, SimConfig, SimulatedRunner};
use rexevo_training::{
    CheckpointConfig, GeneticParams, Learner, LearnerState, LiveSessionEvaluator, Population,
    save_checkpoint,
};
use tokio::sync::watch;

use crate::util;

#[derive(Debug, Clone, clap::Args)]
pub(crate) struct TrainArg {
    /// Number of genomes per generation
    #[arg(long, default_value_t = 12)]
    population: usize,
    /// Number of fittest genomes kept unchanged each generation
    #[arg(long, default_value_t = 4)]
    selection: usize,
    /// Probability of perturbing each weight of a new genome
    #[arg(long, default_value_t = 0.25)]
    mutation_prob: f64,
    /// Genome set to start from
    #[arg(long)]
    load: Option<PathBuf>,
    /// Directory for population checkpoints
    #[arg(long)]
    checkpoint_dir: Option<PathBuf>,
    /// Save a checkpoint every N generations
    #[arg(long, default_value_t = 10)]
    checkpoint_every: u64,
    /// Stop after N generations (default: until Ctrl-C)
    #[arg(long)]
    generations: Option<u64>,
    /// Random seed for reproducible runs
    #[arg(long)]
    seed: Option<u64>,
    /// Sensor polling period in milliseconds
    #[arg(long, default_value_t = 40, value_parser = clap::value_parser!(u64).range(1..))]
    sensor_interval_ms: u64,
    /// Game state polling period in milliseconds
    #[arg(long, default_value_t = 200, value_parser = clap::value_parser!(u64).range(1..))]
    state_interval_ms: u64,
}

pub(crate) async fn run(arg: &TrainArg) -> anyhow::Result<()> {
    let params = GeneticParams::new(arg.population, arg.selection, arg.mutation_prob)
        .context("Invalid genetic algorithm parameters")?;

    let seed = arg.seed.unwrap_or_else(|| rand::rng().random());
    tracing::info!(seed, "random seed");
    let mut rng = Pcg64::seed_from_u64(seed);

    let sim = SimulatedRunner::new(SimConfig {
        seed: rng.random(),
        ..SimConfig::default()
    });
    let config = DriverConfig {
        sensor_interval: Duration::from_millis(arg.sensor_interval_ms),
        state_interval: Duration::from_millis(arg.state_interval_ms),
        ..DriverConfig::default()
    };
    let driver = GameDriver::connect(sim, config)
        .await
        .context("Failed to connect to the game")?;
    let (handle, _driver_task) = driver.spawn();

    let population = match &arg.load {
        Some(path) => {
            let loaded = util::read_genome_file(path)?;
            tracing::info!(
                path = %path.display(),
                loaded = loaded.genomes.len(),
                skipped = loaded.errors.len(),
                "genome set loaded"
            );
            Population::from_genomes(loaded.genomes)
        }
        None => Population::new(),
    };

    let (control, control_rx) = watch::channel(LearnerState::Running);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("stop requested; finishing the current session");
            control.send_replace(LearnerState::Stopped);
        }
    });

    let mut learner = Learner::new(LiveSessionEvaluator::new(handle), params, rng, control_rx)
        .with_population(population);
    if let Some(generations) = arg.generations {
        learner = learner.with_max_generations(generations);
    }
    if let Some(dir) = &arg.checkpoint_dir {
        learner = learner.with_checkpoint(CheckpointConfig {
            dir: dir.clone(),
            every: arg.checkpoint_every,
        });
    }

    let result = learner.run().await;

    let population = learner.population();
    if let Some(dir) = &arg.checkpoint_dir {
        let path = save_checkpoint(dir, population).context("Failed to save final population")?;
        eprintln!("Population saved to {}", path.display());
    }
    result.context("Training halted")?;

    eprintln!("Training finished after {} generations", population.generation());
    if let Some(summary) = population.fitness_summary() {
        eprintln!("  Fitness Stats:");
        eprintln!("    Min:  {:.1}", summary.min);
        eprintln!("    Max:  {:.1}", summary.max);
        eprintln!("    Mean: {:.3}", summary.mean);
    }
    if let Some(best) = population.best() {
        eprintln!("  Best genome: {}", best.topology());
    }

    Ok(())
}
