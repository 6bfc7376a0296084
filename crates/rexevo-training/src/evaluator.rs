//! Fitness evaluation protocol.
//!
//! [`LiveSessionEvaluator`] plays one genome through one game session:
//!
//! 1. request a fresh session from the driver and wait until it is PLAYING,
//! 2. for every sensor frame, in arrival order, run the genome on
//!    [`SensorFrame::features`](rexevo_engine::SensorFrame::features) and issue the
//!    arg-max action,
//! 3. when the session ends, return its points as the fitness.
//!
//! Scoring itself happens in the driver, so the points a genome earns do not
//! depend on how fast inference keeps up with the sensor cadence.

use std::future::Future;

use rexevo_engine::{DriverError, DriverHandle, select_action};
use rexevo_genome::{Genome, GenomeError};

#[derive(Debug, derive_more::Display, derive_more::Error, derive_more::From)]
pub enum EvaluateError {
    #[display("game driver error: {_0}")]
    #[from]
    Driver(DriverError),
    #[display("inference failed: {_0}")]
    #[from]
    Genome(GenomeError),
    #[display("network produced {_0} outputs, expected 3")]
    OutputWidth(#[error(not(source))] usize),
}

impl EvaluateError {
    /// Whether no further evaluation can succeed.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Driver(DriverError::Closed))
    }
}

/// Scores one genome.
pub trait FitnessEvaluator {
    fn evaluate(
        &mut self,
        genome: &Genome,
    ) -> impl Future<Output = Result<f64, EvaluateError>> + Send;
}

/// Evaluates genomes against live sessions of a [`GameDriver`](rexevo_engine::GameDriver).
#[derive(Debug, Clone)]
pub struct LiveSessionEvaluator {
    driver: DriverHandle,
}

impl LiveSessionEvaluator {
    #[must_use]
    pub fn new(driver: DriverHandle) -> Self {
        Self { driver }
    }
}

impl FitnessEvaluator for LiveSessionEvaluator {
    async fn evaluate(&mut self, genome: &Genome) -> Result<f64, EvaluateError> {
        let mut lease = self.driver.start_session().await?;
        lease.started().await?;

        let mut frames = 0_u64;
        while let Some(frame) = lease.next_frame().await {
            let outputs = genome.predict(&frame.features())?;
            let outputs = <[f32; 3]>::try_from(outputs.as_slice())
                .map_err(|_| EvaluateError::OutputWidth(outputs.len()))?;
            self.driver.issue(select_action(outputs))?;
            frames += 1;
        }

        let points = lease.finish().await?;
        tracing::debug!(points, frames, "session finished");
        Ok(f64::from(points))
    }
}
