//! Real-time game plumbing for the reflex runner.
//!
//! This crate owns everything that touches the live environment:
//!
//! - [`environment`] - The boundary trait for a game instance (poll raw state, send keys)
//! - [`sensor`] - Converts raw observations into a bounded [`SensorFrame`](sensor::SensorFrame)
//! - [`session`] - PLAYING/OVER state machine with one-shot session boundary signals
//! - [`action`] - Discrete actions and the key-issuing discipline
//! - [`driver`] - The async task that owns the environment and both polling cadences
//! - [`sim`] - A headless simulated runner implementing [`Environment`](environment::Environment)
//!
//! # Data Flow
//!
//! ```text
//! Environment
//!     ↓ observe() every sensor tick / state tick
//! GameDriver (single writer)
//!     ├─ SensorNormalizer → SensorFrame → GameSession::score → frame channel
//!     └─ GameSession::poll → start / end one-shot signals
//!     ↑ issue(Action) through ActionIssuer
//! Fitness evaluator (rexevo-training)
//! ```
//!
//! The driver is the only writer of the sensor frame and the session state. Consumers
//! receive frames in arrival order through an unbounded channel and never share state
//! with the driver task.

pub mod action;
pub mod driver;
pub mod environment;
pub mod sensor;
pub mod session;
pub mod sim;

pub use self::{
    action::{Action, ActionIssuer, ParseActionError, select_action},
    driver::{DriverConfig, DriverError, DriverHandle, DriverSnapshot, GameDriver, SessionLease},
    environment::{
        AgentGeometry, Environment, EnvironmentError, Key, KeyInput, RawObservation, RawObstacle,
    },
    sensor::{SensorFrame, SensorNormalizer},
    session::{GameSession, SessionState, Transition},
    sim::{SimConfig, SimulatedRunner},
};
