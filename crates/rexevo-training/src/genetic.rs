//! Genetic operators over [`Genome`]s.
//!
//! # Algorithm Overview
//!
//! One generation step turns an evaluated population into the next one:
//!
//! 1. **Selection** - [`select_elite`] keeps the `selection` fittest genomes (truncation)
//! 2. **Elitism** - the elites are cloned unchanged into the next generation
//! 3. **Crossover + Mutation** - [`crossover`] children of random elite pairs, each
//!    passed through [`mutate`], fill the population up to `genome_units - 2`
//! 4. **Mutation only** - mutated clones of random elites fill the remaining slots
//!
//! [`reproduce`] performs steps 2-4 and checks that the result has exactly
//! `genome_units` genomes.
//!
//! # Single-Point Crossover
//!
//! Each trainable tensor is cut independently at a uniformly random index `i`: the
//! child takes elements `..i` from parent A and `i..` from parent B. Parents must
//! share their topology; a mismatch is a configuration error and is reported with
//! both parents' topologies.
//!
//! # Uniform Mutation
//!
//! Every weight independently, with probability `mutation_prob`, moves by a value
//! drawn from `U(-0.05, 0.05)`.

use std::cmp::Ordering;

use rand::{Rng, seq::IndexedRandom};
use rexevo_genome::{Genome, Topology};

use crate::params::{GeneticParams, MUTATION_RANGE};

#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display, derive_more::Error)]
pub enum CrossoverError {
    #[display("parents have {count_a} and {count_b} tensors (parents: {parent_a} / {parent_b})")]
    TensorCount {
        count_a: usize,
        count_b: usize,
        parent_a: Topology,
        parent_b: Topology,
    },
    #[display(
        "tensor {tensor} has shape {shape_a:?} in parent A and {shape_b:?} in parent B \
         (parents: {parent_a} / {parent_b})"
    )]
    Shape {
        tensor: usize,
        shape_a: Vec<usize>,
        shape_b: Vec<usize>,
        parent_a: Topology,
        parent_b: Topology,
    },
    #[display("got {actual} cut points for {expected} tensors (parents: {parent_a} / {parent_b})")]
    CutCount {
        expected: usize,
        actual: usize,
        parent_a: Topology,
        parent_b: Topology,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display, derive_more::Error, derive_more::From)]
pub enum ReproduceError {
    #[display("no elite genomes to reproduce from")]
    NoElites,
    #[display("crossover failed: {_0}")]
    #[from]
    Crossover(CrossoverError),
    #[display("reproduction produced {actual} genomes instead of {expected}")]
    SizeMismatch { expected: usize, actual: usize },
}

/// Descending by fitness; genomes never evaluated sort last.
fn by_fitness_desc(a: &Genome, b: &Genome) -> Ordering {
    match (a.fitness(), b.fitness()) {
        (Some(a), Some(b)) => b.total_cmp(&a),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Truncation selection.
///
/// Sorts by fitness descending and keeps the first `selection` genomes. The sort is
/// stable, so genomes of equal fitness keep their population order.
#[must_use]
pub fn select_elite(mut genomes: Vec<Genome>, selection: usize) -> Vec<Genome> {
    genomes.sort_by(by_fitness_desc);
    genomes.truncate(selection);
    genomes
}

fn check_compatible(a: &Genome, b: &Genome) -> Result<(), CrossoverError> {
    let count_a = a.tensors().count();
    let count_b = b.tensors().count();
    if count_a != count_b {
        return Err(CrossoverError::TensorCount {
            count_a,
            count_b,
            parent_a: a.topology(),
            parent_b: b.topology(),
        });
    }
    for (tensor, (ta, tb)) in a.tensors().zip(b.tensors()).enumerate() {
        if ta.shape() != tb.shape() {
            return Err(CrossoverError::Shape {
                tensor,
                shape_a: ta.shape().to_vec(),
                shape_b: tb.shape().to_vec(),
                parent_a: a.topology(),
                parent_b: b.topology(),
            });
        }
    }
    Ok(())
}

/// Single-point crossover with explicit cut points, one per tensor.
///
/// The child mirrors `a`'s topology, takes `..cut` of each tensor from `a` and
/// `cut..` from `b`, and has no fitness. Cut points past the end of a tensor
/// take the whole tensor from `a`. `cuts` needs one entry per tensor.
pub fn splice(a: &Genome, b: &Genome, cuts: &[usize]) -> Result<Genome, CrossoverError> {
    check_compatible(a, b)?;
    let expected = a.tensors().count();
    if cuts.len() != expected {
        return Err(CrossoverError::CutCount {
            expected,
            actual: cuts.len(),
            parent_a: a.topology(),
            parent_b: b.topology(),
        });
    }
    let mut child = a.clone();
    child.set_fitness(None);
    for ((tensor, source), &cut) in child.tensors_mut().zip(b.tensors()).zip(cuts) {
        let cut = cut.min(tensor.len());
        tensor.values_mut()[cut..].copy_from_slice(&source.values()[cut..]);
    }
    Ok(child)
}

/// Single-point per-tensor crossover of two parents.
///
/// Parent roles are swapped with probability 0.5, then every tensor is cut at a
/// uniformly random index in `0..len`.
pub fn crossover<R>(a: &Genome, b: &Genome, rng: &mut R) -> Result<Genome, CrossoverError>
where
    R: Rng + ?Sized,
{
    let (a, b) = if rng.random_bool(0.5) { (b, a) } else { (a, b) };
    check_compatible(a, b)?;
    let cuts: Vec<usize> = a
        .tensors()
        .map(|t| if t.is_empty() { 0 } else { rng.random_range(0..t.len()) })
        .collect();
    splice(a, b, &cuts)
}

/// Perturbs each weight with probability `prob` and clears the fitness.
///
/// # Panics
///
/// Panics if `prob` is not in `[0, 1]`; [`GeneticParams`] guarantees it is.
pub fn mutate<R>(genome: &mut Genome, prob: f64, rng: &mut R)
where
    R: Rng + ?Sized,
{
    genome.set_fitness(None);
    for tensor in genome.tensors_mut() {
        for w in tensor.values_mut() {
            if rng.random_bool(prob) {
                *w += rng.random_range(-MUTATION_RANGE..MUTATION_RANGE);
            }
        }
    }
}

/// Refills a population from its elites.
///
/// Returns elites (unchanged) + crossover children up to
/// [`GeneticParams::crossover_target`] + mutated elite clones up to
/// [`GeneticParams::genome_units`]. A crossover error aborts reproduction.
pub fn reproduce<R>(
    elites: &[Genome],
    params: &GeneticParams,
    rng: &mut R,
) -> Result<Vec<Genome>, ReproduceError>
where
    R: Rng + ?Sized,
{
    if elites.is_empty() {
        return Err(ReproduceError::NoElites);
    }
    let expected = params.genome_units();
    let mut next = Vec::with_capacity(expected);
    next.extend_from_slice(elites);

    while next.len() < params.crossover_target() {
        let (Some(a), Some(b)) = (elites.choose(rng), elites.choose(rng)) else {
            return Err(ReproduceError::NoElites);
        };
        let mut child = crossover(a, b, rng)?;
        mutate(&mut child, params.mutation_prob(), rng);
        next.push(child);
    }

    while next.len() < expected {
        let Some(parent) = elites.choose(rng) else {
            return Err(ReproduceError::NoElites);
        };
        let mut child = parent.clone();
        mutate(&mut child, params.mutation_prob(), rng);
        next.push(child);
    }

    if next.len() != expected {
        return Err(ReproduceError::SizeMismatch {
            expected,
            actual: next.len(),
        });
    }
    Ok(next)
}
