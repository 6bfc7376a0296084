//! The generation loop.
//!
//! ```text
//!            ┌──────────────────────────────────────────────────┐
//!            ↓                                                  │
//! RUNNING: fill population → evaluate each genome in order → evolve → checkpoint?
//!            │ STOPPED (checked between genomes)
//!            ↓
//!          return
//! ```
//!
//! The control is a [`watch`] channel so any task (a signal handler, a UI) can
//! flip it. A stop request never interrupts a running evaluation: the current
//! genome finishes its session, then the loop returns without evolving.

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use chrono::Utc;
use rand::Rng;
use rexevo_genome::schema;
use tokio::sync::watch;

use crate::{
    evaluator::{EvaluateError, FitnessEvaluator},
    genetic::ReproduceError,
    params::GeneticParams,
    population::Population,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display, derive_more::IsVariant)]
pub enum LearnerState {
    #[display("RUNNING")]
    Running,
    #[display("STOPPED")]
    Stopped,
}

#[derive(Debug, derive_more::Display, derive_more::Error, derive_more::From)]
pub enum LearnerError {
    #[display("failed to produce the next generation: {_0}")]
    #[from]
    Reproduce(ReproduceError),
    #[display("evaluation cannot continue: {_0}")]
    #[from]
    Evaluate(EvaluateError),
}

#[derive(Debug, derive_more::Display, derive_more::Error, derive_more::From)]
pub enum CheckpointError {
    #[display("failed to encode population: {_0}")]
    #[from]
    Encode(serde_json::Error),
    #[display("failed to write {}: {source}", path.display())]
    Write { path: PathBuf, source: io::Error },
}

/// Periodic population snapshots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckpointConfig {
    pub dir: PathBuf,
    /// Save after every `every` generations; `0` disables periodic saves.
    pub every: u64,
}

/// Writes the population to `dir/gen_<generation>_<unix-millis>.json`.
pub fn save_checkpoint(dir: &Path, population: &Population) -> Result<PathBuf, CheckpointError> {
    let json = schema::to_json(population.genomes())?;
    let path = dir.join(format!(
        "gen_{}_{}.json",
        population.generation(),
        Utc::now().timestamp_millis()
    ));
    fs::create_dir_all(dir)
        .and_then(|()| fs::write(&path, json))
        .map_err(|source| CheckpointError::Write {
            path: path.clone(),
            source,
        })?;
    Ok(path)
}

#[derive(Debug)]
pub struct Learner<E, R> {
    evaluator: E,
    params: GeneticParams,
    population: Population,
    rng: R,
    control: watch::Receiver<LearnerState>,
    checkpoint: Option<CheckpointConfig>,
    max_generations: Option<u64>,
}

impl<E, R> Learner<E, R>
where
    E: FitnessEvaluator,
    R: Rng,
{
    pub fn new(
        evaluator: E,
        params: GeneticParams,
        rng: R,
        control: watch::Receiver<LearnerState>,
    ) -> Self {
        Self {
            evaluator,
            params,
            population: Population::new(),
            rng,
            control,
            checkpoint: None,
            max_generations: None,
        }
    }

    #[must_use]
    pub fn with_population(mut self, population: Population) -> Self {
        self.population = population;
        self
    }

    #[must_use]
    pub fn with_checkpoint(mut self, checkpoint: CheckpointConfig) -> Self {
        self.checkpoint = Some(checkpoint);
        self
    }

    /// Stops after `max` completed generations in total.
    #[must_use]
    pub fn with_max_generations(mut self, max: u64) -> Self {
        self.max_generations = Some(max);
        self
    }

    #[must_use]
    pub fn population(&self) -> &Population {
        &self.population
    }

    #[must_use]
    pub fn into_population(self) -> Population {
        self.population
    }

    fn is_stopped(&self) -> bool {
        self.control.borrow().is_stopped()
    }

    /// Runs generations until the control reads STOPPED or the generation limit
    /// is reached.
    ///
    /// Per-genome evaluation errors are logged and leave that genome without
    /// fitness. Crossover shape errors and a closed driver end the loop with an
    /// error.
    pub async fn run(&mut self) -> Result<(), LearnerError> {
        tracing::info!(
            genome_units = self.params.genome_units(),
            selection = self.params.selection(),
            mutation_prob = self.params.mutation_prob(),
            "learner started"
        );
        loop {
            if self.is_stopped() {
                break;
            }
            if self
                .max_generations
                .is_some_and(|max| self.population.generation() >= max)
            {
                tracing::info!("generation limit reached");
                break;
            }

            self.population.fill(self.params.genome_units(), &mut self.rng);
            if !self.evaluate_generation().await? {
                tracing::info!(
                    generation = self.population.generation(),
                    "stopped during evaluation; generation discarded"
                );
                break;
            }
            self.report();
            self.periodic_checkpoint();

            self.population.evolve(&self.params, &mut self.rng)?;
        }
        tracing::info!(generation = self.population.generation(), "learner stopped");
        Ok(())
    }

    /// Returns `false` if a stop request cut the generation short.
    async fn evaluate_generation(&mut self) -> Result<bool, LearnerError> {
        let generation = self.population.generation();
        for (index, genome) in self.population.genomes_mut().iter_mut().enumerate() {
            if self.control.borrow().is_stopped() {
                return Ok(false);
            }
            genome.set_fitness(None);
            match self.evaluator.evaluate(genome).await {
                Ok(fitness) => {
                    tracing::info!(generation, genome = index, fitness, "genome evaluated");
                    genome.set_fitness(Some(fitness));
                }
                Err(err) if err.is_fatal() => return Err(err.into()),
                Err(err) => {
                    tracing::warn!(generation, genome = index, "evaluation failed: {err}");
                }
            }
        }
        Ok(true)
    }

    fn report(&self) {
        let generation = self.population.generation();
        match self.population.fitness_summary() {
            Some(summary) => tracing::info!(
                generation,
                evaluated = summary.evaluated,
                min = summary.min,
                max = summary.max,
                mean = summary.mean,
                "generation evaluated"
            ),
            None => tracing::warn!(generation, "no genome was evaluated successfully"),
        }
    }

    fn periodic_checkpoint(&self) {
        let Some(checkpoint) = &self.checkpoint else {
            return;
        };
        if checkpoint.every == 0 || (self.population.generation() + 1) % checkpoint.every != 0 {
            return;
        }
        match save_checkpoint(&checkpoint.dir, &self.population) {
            Ok(path) => tracing::info!(path = %path.display(), "checkpoint saved"),
            Err(err) => tracing::warn!("checkpoint failed: {err}"),
        }
    }
}
