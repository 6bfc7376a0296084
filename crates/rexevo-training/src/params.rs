/// Half-width of the uniform perturbation applied by mutation.
pub const MUTATION_RANGE: f32 = 0.05;

#[derive(Debug, Clone, Copy, PartialEq, derive_more::Display, derive_more::Error)]
pub enum ConfigError {
    #[display("population size must be positive")]
    EmptyPopulation,
    #[display("selection must be in 1..{genome_units}, got {selection}")]
    Selection {
        selection: usize,
        genome_units: usize,
    },
    #[display("mutation probability must be in [0, 1], got {_0}")]
    MutationProb(#[error(not(source))] f64),
}

/// Process-wide genetic algorithm settings, validated once at startup.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeneticParams {
    genome_units: usize,
    selection: usize,
    mutation_prob: f64,
}

impl Default for GeneticParams {
    fn default() -> Self {
        Self {
            genome_units: 12,
            selection: 4,
            mutation_prob: 0.25,
        }
    }
}

impl GeneticParams {
    /// # Arguments
    ///
    /// * `genome_units` - Population size, positive
    /// * `selection` - Elite count, `0 < selection < genome_units`
    /// * `mutation_prob` - Per-weight mutation probability in `[0, 1]`
    pub fn new(
        genome_units: usize,
        selection: usize,
        mutation_prob: f64,
    ) -> Result<Self, ConfigError> {
        if genome_units == 0 {
            return Err(ConfigError::EmptyPopulation);
        }
        if selection == 0 || selection >= genome_units {
            return Err(ConfigError::Selection {
                selection,
                genome_units,
            });
        }
        if !(0.0..=1.0).contains(&mutation_prob) {
            return Err(ConfigError::MutationProb(mutation_prob));
        }
        Ok(Self {
            genome_units,
            selection,
            mutation_prob,
        })
    }

    #[must_use]
    pub fn genome_units(&self) -> usize {
        self.genome_units
    }

    #[must_use]
    pub fn selection(&self) -> usize {
        self.selection
    }

    #[must_use]
    pub fn mutation_prob(&self) -> f64 {
        self.mutation_prob
    }

    /// Size the crossover phase of reproduction fills up to.
    #[must_use]
    pub fn crossover_target(&self) -> usize {
        self.genome_units.saturating_sub(2)
    }
}
