use rand::Rng;
use rexevo_genome::Genome;

use crate::{
    genetic::{self, ReproduceError},
    params::GeneticParams,
};

/// Fitness statistics over the evaluated genomes of a population.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitnessSummary {
    pub evaluated: usize,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
}

/// The genomes of one generation.
#[derive(Debug, Clone, Default)]
pub struct Population {
    genomes: Vec<Genome>,
    generation: u64,
}

impl Population {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts from previously saved genomes, for example a loaded checkpoint.
    #[must_use]
    pub fn from_genomes(genomes: Vec<Genome>) -> Self {
        Self {
            genomes,
            generation: 0,
        }
    }

    #[must_use]
    pub fn genomes(&self) -> &[Genome] {
        &self.genomes
    }

    #[must_use]
    pub fn genomes_mut(&mut self) -> &mut [Genome] {
        &mut self.genomes
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.genomes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.genomes.is_empty()
    }

    /// Number of completed generations.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Brings the population to exactly `genome_units` genomes.
    ///
    /// Missing slots get fresh controllers; genomes beyond the size are dropped
    /// from the tail.
    pub fn fill<R>(&mut self, genome_units: usize, rng: &mut R)
    where
        R: Rng + ?Sized,
    {
        if self.genomes.len() > genome_units {
            tracing::warn!(
                loaded = self.genomes.len(),
                genome_units,
                "population larger than configured; truncating"
            );
            self.genomes.truncate(genome_units);
        }
        while self.genomes.len() < genome_units {
            self.genomes.push(Genome::controller(rng));
        }
    }

    /// Replaces the population with the next generation and advances the
    /// generation counter.
    ///
    /// On error the population is left unchanged.
    pub fn evolve<R>(&mut self, params: &GeneticParams, rng: &mut R) -> Result<(), ReproduceError>
    where
        R: Rng + ?Sized,
    {
        let elites = genetic::select_elite(self.genomes.clone(), params.selection());
        self.genomes = genetic::reproduce(&elites, params, rng)?;
        self.generation += 1;
        Ok(())
    }

    /// Genome with the highest fitness, if any was evaluated.
    #[must_use]
    pub fn best(&self) -> Option<&Genome> {
        self.genomes
            .iter()
            .filter_map(|g| g.fitness().map(|f| (g, f)))
            .max_by(|(_, a), (_, b)| a.total_cmp(b))
            .map(|(g, _)| g)
    }

    /// Returns `None` when no genome has been evaluated.
    #[must_use]
    pub fn fitness_summary(&self) -> Option<FitnessSummary> {
        let mut evaluated = 0;
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        let mut sum = 0.0;
        for fitness in self.genomes.iter().filter_map(Genome::fitness) {
            evaluated += 1;
            min = min.min(fitness);
            max = max.max(fitness);
            sum += fitness;
        }
        if evaluated == 0 {
            return None;
        }
        #[expect(clippy::cast_precision_loss)]
        let mean = sum / evaluated as f64;
        Some(FitnessSummary {
            evaluated,
            min,
            max,
            mean,
        })
    }
}
