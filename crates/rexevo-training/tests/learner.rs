use rand::SeedableRng;
use rand_pcg::Pcg64;
use rexevo_engine::DriverError;
use rexevo_genome::{Genome, load_records};
use rexevo_training::{
    CheckpointConfig, EvaluateError, FitnessEvaluator, GeneticParams, Learner, LearnerError,
    LearnerState, Population,
};
use tempfile::TempDir;
use tokio::sync::watch;

/// Scores a genome by its first weight; can flip the control after a number of calls.
#[derive(Debug, Default)]
struct FirstWeight {
    calls: usize,
    stop_after: Option<(usize, watch::Sender<LearnerState>)>,
    fail_every: Option<usize>,
}

impl FitnessEvaluator for FirstWeight {
    async fn evaluate(&mut self, genome: &Genome) -> Result<f64, EvaluateError> {
        self.calls += 1;
        if let Some((after, control)) = &self.stop_after
            && self.calls == *after
        {
            control.send_replace(LearnerState::Stopped);
        }
        if self.fail_every.is_some_and(|n| self.calls % n == 0) {
            return Err(EvaluateError::OutputWidth(0));
        }
        let first = genome.tensors().next().map_or(0.0, |t| t.values()[0]);
        Ok(f64::from(first))
    }
}

#[derive(Debug)]
struct ClosedDriver;

impl FitnessEvaluator for ClosedDriver {
    async fn evaluate(&mut self, _genome: &Genome) -> Result<f64, EvaluateError> {
        Err(DriverError::Closed.into())
    }
}

#[tokio::test]
async fn test_runs_requested_generations() {
    let (_control, rx) = watch::channel(LearnerState::Running);
    let params = GeneticParams::new(6, 2, 0.5).unwrap();
    let mut learner = Learner::new(FirstWeight::default(), params, Pcg64::seed_from_u64(1), rx)
        .with_max_generations(3);
    learner.run().await.unwrap();

    let population = learner.population();
    assert_eq!(population.generation(), 3);
    assert_eq!(population.len(), 6);
}

#[tokio::test]
async fn test_stop_lets_current_evaluation_finish() {
    let (control, rx) = watch::channel(LearnerState::Running);
    let evaluator = FirstWeight {
        stop_after: Some((3, control)),
        ..FirstWeight::default()
    };
    let params = GeneticParams::default();
    let mut learner = Learner::new(evaluator, params, Pcg64::seed_from_u64(2), rx);
    learner.run().await.unwrap();

    let population = learner.population();
    assert_eq!(population.generation(), 0);
    assert_eq!(population.len(), 12);
    let evaluated = population
        .genomes()
        .iter()
        .filter(|g| g.fitness().is_some())
        .count();
    assert_eq!(evaluated, 3);
}

#[tokio::test]
async fn test_stopped_learner_does_nothing() {
    let (_control, rx) = watch::channel(LearnerState::Stopped);
    let mut learner = Learner::new(
        FirstWeight::default(),
        GeneticParams::default(),
        Pcg64::seed_from_u64(3),
        rx,
    );
    learner.run().await.unwrap();
    assert!(learner.population().is_empty());
}

#[tokio::test]
async fn test_failed_evaluations_are_skipped() {
    let (_control, rx) = watch::channel(LearnerState::Running);
    let evaluator = FirstWeight {
        fail_every: Some(2),
        ..FirstWeight::default()
    };
    let params = GeneticParams::new(4, 2, 0.0).unwrap();
    let mut learner =
        Learner::new(evaluator, params, Pcg64::seed_from_u64(4), rx).with_max_generations(2);
    learner.run().await.unwrap();
    assert_eq!(learner.population().generation(), 2);
}

#[tokio::test]
async fn test_closed_driver_is_fatal() {
    let (_control, rx) = watch::channel(LearnerState::Running);
    let mut learner = Learner::new(
        ClosedDriver,
        GeneticParams::default(),
        Pcg64::seed_from_u64(5),
        rx,
    );
    let err = learner.run().await.unwrap_err();
    assert!(matches!(err, LearnerError::Evaluate(_)));
}

#[tokio::test]
async fn test_checkpoints_are_loadable() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path().join("checkpoints");

    let (_control, rx) = watch::channel(LearnerState::Running);
    let params = GeneticParams::new(5, 2, 0.1).unwrap();
    let mut learner = Learner::new(FirstWeight::default(), params, Pcg64::seed_from_u64(6), rx)
        .with_max_generations(2)
        .with_checkpoint(CheckpointConfig {
            dir: dir.clone(),
            every: 1,
        });
    learner.run().await.unwrap();

    let mut names: Vec<_> = std::fs::read_dir(&dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().into_string().unwrap())
        .collect();
    names.sort();
    assert_eq!(names.len(), 2);
    assert!(names[0].starts_with("gen_0_") && names[0].ends_with(".json"));
    assert!(names[1].starts_with("gen_1_"));

    let json = std::fs::read_to_string(dir.join(&names[1])).unwrap();
    let loaded = load_records(&json).unwrap();
    assert!(loaded.errors.is_empty());
    assert_eq!(loaded.genomes.len(), 5);
    assert!(loaded.genomes.iter().all(|g| g.fitness().is_some()));

    // resuming keeps the saved genomes
    let (_control, rx) = watch::channel(LearnerState::Stopped);
    let learner = Learner::new(FirstWeight::default(), params, Pcg64::seed_from_u64(7), rx)
        .with_population(Population::from_genomes(loaded.genomes.clone()));
    assert_eq!(learner.population().genomes(), loaded.genomes);
}
