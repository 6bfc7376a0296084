//! Session state machine for one environment instance.
//!
//! ```text
//!            not crashed                     crashed
//!   OVER ─────────────────▶ PLAYING ─────────────────▶ OVER
//!   (initial)  reset points,          fire end signal
//!              fire start signal      with final points
//! ```
//!
//! Repeated polls in the same state are no-ops. Each boundary signal is a
//! [`tokio::sync::oneshot`] sender armed by the consumer and consumed by the
//! transition, so it fires at most once per session.

use tokio::sync::oneshot;

use crate::sensor::SensorFrame;

#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display, derive_more::IsVariant)]
pub enum SessionState {
    #[display("OVER")]
    Over,
    #[display("PLAYING")]
    Playing,
}

/// A state change reported by [`GameSession::poll`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::IsVariant)]
pub enum Transition {
    Started,
    Ended { points: u32 },
}

#[derive(Debug)]
pub struct GameSession {
    state: SessionState,
    points: u32,
    on_start: Option<oneshot::Sender<()>>,
    on_end: Option<oneshot::Sender<u32>>,
}

impl Default for GameSession {
    fn default() -> Self {
        Self::new()
    }
}

impl GameSession {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: SessionState::Over,
            points: 0,
            on_start: None,
            on_end: None,
        }
    }

    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.state
    }

    /// Points accumulated since the last OVER→PLAYING transition.
    #[must_use]
    pub const fn points(&self) -> u32 {
        self.points
    }

    /// Arms the one-shot "session started" signal, replacing any previous one.
    pub fn arm_start(&mut self, tx: oneshot::Sender<()>) {
        self.on_start = Some(tx);
    }

    /// Arms the one-shot "session ended" signal, replacing any previous one.
    ///
    /// The signal carries the final points of the session.
    pub fn arm_end(&mut self, tx: oneshot::Sender<u32>) {
        self.on_end = Some(tx);
    }

    /// Feeds the environment's crashed flag into the state machine.
    ///
    /// The caller is responsible for resetting the sensor frame on
    /// [`Transition::Started`].
    pub fn poll(&mut self, crashed: bool) -> Option<Transition> {
        match (self.state, crashed) {
            (SessionState::Over, false) => {
                self.state = SessionState::Playing;
                self.points = 0;
                if let Some(tx) = self.on_start.take() {
                    // receiver may have given up waiting
                    let _ = tx.send(());
                }
                Some(Transition::Started)
            }
            (SessionState::Playing, true) => {
                self.state = SessionState::Over;
                if let Some(tx) = self.on_end.take() {
                    let _ = tx.send(self.points);
                }
                Some(Transition::Ended {
                    points: self.points,
                })
            }
            (SessionState::Over, true) | (SessionState::Playing, false) => None,
        }
    }

    /// Applies the scoring rule to a frame. Returns whether a point was added.
    pub fn score(&mut self, frame: &SensorFrame) -> bool {
        if self.state.is_playing() && frame.passed_obstacle() {
            self.points += 1;
            true
        } else {
            false
        }
    }
}
