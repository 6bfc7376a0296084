use rand::SeedableRng;
use rand_pcg::Pcg64;
use rexevo_genome::{Genome, Tensor};
use rexevo_training::{GeneticParams, Population, select_elite};

fn is_splice_of(child: &Tensor, a: &Tensor, b: &Tensor) -> bool {
    (0..=child.len()).any(|cut| {
        child.values()[..cut] == a.values()[..cut] && child.values()[cut..] == b.values()[cut..]
    })
}

fn drawn_from(child: &Genome, elites: &[Genome]) -> bool {
    child.tensors().enumerate().all(|(index, tensor)| {
        elites.iter().any(|a| {
            elites.iter().any(|b| {
                let ta = a.tensors().nth(index).unwrap();
                let tb = b.tensors().nth(index).unwrap();
                is_splice_of(tensor, ta, tb)
            })
        })
    })
}

#[test]
fn test_one_generation_without_mutation() {
    let mut rng = Pcg64::seed_from_u64(2024);
    let params = GeneticParams::new(12, 4, 0.0).unwrap();

    let mut population = Population::new();
    population.fill(params.genome_units(), &mut rng);
    for (i, genome) in population.genomes_mut().iter_mut().enumerate() {
        let fitness = f64::from(u32::try_from(i * 7 % 12).unwrap());
        genome.set_fitness(Some(fitness));
    }
    let elites = select_elite(population.genomes().to_vec(), params.selection());
    let elite_fitness: Vec<_> = elites.iter().map(|g| g.fitness().unwrap()).collect();
    assert_eq!(elite_fitness, [11.0, 10.0, 9.0, 8.0]);

    population.evolve(&params, &mut rng).unwrap();
    let next = population.genomes();

    assert_eq!(next.len(), 12);
    assert_eq!(population.generation(), 1);
    assert_eq!(next[..4], elites[..]);
    for child in &next[4..] {
        assert_eq!(child.fitness(), None);
        assert_eq!(child.topology(), elites[0].topology());
        assert!(drawn_from(child, &elites));
    }
}

#[test]
fn test_population_size_is_stable_across_generations() {
    let mut rng = Pcg64::seed_from_u64(9);
    let params = GeneticParams::new(7, 6, 0.3).unwrap();
    let mut population = Population::new();
    population.fill(params.genome_units(), &mut rng);
    for _ in 0..5 {
        for genome in population.genomes_mut() {
            let score = genome.tensors().next().unwrap().values()[0];
            genome.set_fitness(Some(f64::from(score)));
        }
        population.evolve(&params, &mut rng).unwrap();
        assert_eq!(population.len(), 7);
    }
    assert_eq!(population.generation(), 5);
}
