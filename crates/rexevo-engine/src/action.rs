//! Discrete controller actions and the key-issuing discipline.

use std::{str::FromStr, time::Duration};

use tokio::time::Instant;

use crate::environment::{Key, KeyInput};

/// How long a jump holds the Up key, and the refractory window between jumps.
pub const JUMP_DURATION: Duration = Duration::from_millis(200);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, derive_more::Display, derive_more::IsVariant)]
pub enum Action {
    #[display("DOWN")]
    Down,
    #[display("NORM")]
    Norm,
    #[display("JUMP")]
    Jump,
}

impl Action {
    /// Output index order of the controller network.
    pub const ALL: [Self; 3] = [Self::Down, Self::Norm, Self::Jump];
}

#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display, derive_more::Error)]
#[display("invalid action {_0:?}: expected DOWN, NORM or JUMP")]
pub struct ParseActionError(#[error(not(source))] String);

impl FromStr for Action {
    type Err = ParseActionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "DOWN" => Ok(Self::Down),
            "NORM" => Ok(Self::Norm),
            "JUMP" => Ok(Self::Jump),
            _ => Err(ParseActionError(s.to_owned())),
        }
    }
}

/// Maps three output logits to an action by arg-max.
///
/// Index 0 is DOWN, 1 is NORM, 2 is JUMP. The first maximum wins ties; NaN
/// never wins against a number.
#[must_use]
pub fn select_action(outputs: [f32; 3]) -> Action {
    let mut best = 0;
    for (i, value) in outputs.iter().enumerate().skip(1) {
        if *value > outputs[best] || (outputs[best].is_nan() && !value.is_nan()) {
            best = i;
        }
    }
    Action::ALL[best]
}

/// Key inputs to send for one action request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ControlPlan {
    pub inputs: Vec<KeyInput>,
    /// When set, Up must be released at this instant.
    pub release_jump_at: Option<Instant>,
}

impl ControlPlan {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inputs.is_empty() && self.release_jump_at.is_none()
    }
}

/// Turns a stream of desired actions into a minimal stream of key inputs.
///
/// - JUMP is edge-triggered: it holds Up and schedules its release after
///   [`JUMP_DURATION`]; requests inside that window are ignored.
/// - DOWN and NORM are level-triggered but only re-issued when they differ from
///   the last requested action.
#[derive(Debug, Clone, Default)]
pub struct ActionIssuer {
    last: Option<Action>,
    last_jump_at: Option<Instant>,
}

impl ActionIssuer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn last(&self) -> Option<Action> {
        self.last
    }

    /// Forgets the last requested action so the next DOWN/NORM is always sent.
    pub fn reset(&mut self) {
        self.last = None;
    }

    pub fn plan(&mut self, action: Action, now: Instant) -> ControlPlan {
        let mut plan = ControlPlan::default();
        match action {
            Action::Down if self.last != Some(Action::Down) => {
                plan.inputs = vec![KeyInput::Release(Key::Up), KeyInput::Hold(Key::Down)];
            }
            Action::Norm if self.last != Some(Action::Norm) => {
                plan.inputs = vec![KeyInput::Release(Key::Up), KeyInput::Release(Key::Down)];
            }
            Action::Jump => {
                let ready = self
                    .last_jump_at
                    .is_none_or(|at| now.saturating_duration_since(at) > JUMP_DURATION);
                if ready {
                    self.last_jump_at = Some(now);
                    plan.inputs = vec![KeyInput::Hold(Key::Up), KeyInput::Release(Key::Down)];
                    plan.release_jump_at = Some(now + JUMP_DURATION);
                }
            }
            Action::Down | Action::Norm => {}
        }
        self.last = Some(action);
        plan
    }
}
