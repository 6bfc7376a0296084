//! Neuroevolution of game controllers.
//!
//! This crate evolves [`Genome`](rexevo_genome::Genome)s with a genetic algorithm
//! whose fitness function is a live game session driven by `rexevo-engine`.
//!
//! # How Training Works
//!
//! 1. **Population** - seed `genome_units` controllers (4 → 4 relu → 3 softmax)
//! 2. **Evaluation** - play one session per genome, strictly one at a time
//! 3. **Fitness** - obstacles passed during that session
//! 4. **Selection** - keep the `selection` fittest genomes
//! 5. **Reproduction** - elites + crossover children + mutated clones
//! 6. **Repeat** - until the learner is stopped
//!
//! # Architecture
//!
//! ```text
//! Learner (generation loop, RUNNING/STOPPED)
//!     ↓ one genome at a time
//! FitnessEvaluator ── LiveSessionEvaluator ── DriverHandle (rexevo-engine)
//!     ↓ fitness
//! Population
//!     ↓ select_elite / crossover / mutate / reproduce
//! next Population
//! ```
//!
//! # Current Limitations
//!
//! - **One session per genome**: fitness is the points of a single play-through, so
//!   lucky obstacle layouts are rewarded as much as skill
//! - **Truncation selection only**: no tournament selection or speciation
//! - **Sequential evaluation**: one environment, one genome at a time

pub mod evaluator;
pub mod genetic;
pub mod learner;
pub mod params;
pub mod population;

pub use self::{
    evaluator::{EvaluateError, FitnessEvaluator, LiveSessionEvaluator},
    genetic::{CrossoverError, ReproduceError, crossover, mutate, reproduce, select_elite, splice},
    learner::{
        CheckpointConfig, CheckpointError, Learner, LearnerError, LearnerState, save_checkpoint,
    },
    params::{ConfigError, GeneticParams, MUTATION_RANGE},
    population::{FitnessSummary, Population},
};
