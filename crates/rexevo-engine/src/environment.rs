//! Boundary to a live game instance.
//!
//! A concrete environment (a browser page, a simulator) exposes one operation to
//! read its raw state and one to send control signals. Everything above this
//! trait is environment-agnostic.

use std::future::Future;

use serde::{Deserialize, Serialize};

/// Agent (runner) position and size in environment pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AgentGeometry {
    pub x: f64,
    /// Top edge; grows downwards.
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl AgentGeometry {
    /// Vertical coordinate of the ground when the agent stands on it.
    #[must_use]
    pub fn ground_level(&self) -> f64 {
        self.y + self.height
    }
}

/// One obstacle as reported by the environment.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RawObstacle {
    /// Leading (left) edge.
    pub x: f64,
    /// Top edge; grows downwards.
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl RawObstacle {
    #[must_use]
    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }
}

/// A single poll of the environment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawObservation {
    pub crashed: bool,
    pub speed: f64,
    pub canvas_width: f64,
    pub agent: AgentGeometry,
    pub obstacles: Vec<RawObstacle>,
}

/// Physical keys the controller may touch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, derive_more::Display)]
pub enum Key {
    /// Session-start control (space bar in the browser game).
    #[display("Space")]
    Start,
    #[display("ArrowUp")]
    Up,
    #[display("ArrowDown")]
    Down,
}

/// Control signal sent to the environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display)]
pub enum KeyInput {
    #[display("press {_0}")]
    Press(Key),
    #[display("hold {_0}")]
    Hold(Key),
    #[display("release {_0}")]
    Release(Key),
}

#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display, derive_more::Error)]
pub enum EnvironmentError {
    /// The game object could not be found on this poll. Transient.
    #[display("game instance unavailable")]
    Unavailable,
    #[display("control signal rejected: {_0}")]
    Control(#[error(not(source))] String),
}

/// A live game instance polled by the driver.
///
/// Implementations must be cheap to poll at the sensor cadence (tens of
/// milliseconds). Both operations are awaited from a single task, so
/// implementations never see concurrent calls.
pub trait Environment: Send + 'static {
    /// Reads the current raw state.
    fn observe(&mut self) -> impl Future<Output = Result<RawObservation, EnvironmentError>> + Send;

    /// Sends one control signal.
    fn send(&mut self, input: KeyInput) -> impl Future<Output = Result<(), EnvironmentError>> + Send;
}
