//! The game driver: single owner of a live environment.
//!
//! [`GameDriver`] runs as one tokio task that multiplexes:
//!
//! - a high-frequency **sensor tick** (normalize, score, forward the frame),
//! - a low-frequency **state tick** (PLAYING/OVER transitions),
//! - a **restart tick** that presses Start until a requested session begins,
//! - the scheduled **jump release**,
//! - **commands** from [`DriverHandle`]s.
//!
//! Because only this task touches the environment, the sensor frame and the
//! session state, there is never more than one writer.
//!
//! # Session Leases
//!
//! [`DriverHandle::start_session`] returns a [`SessionLease`] holding three
//! single-use ends: a start signal, the frame stream of that session, and an end
//! signal carrying the final points. Only one lease may be pending or active at a
//! time; a second request fails with [`DriverError::SessionBusy`].
//!
//! ```text
//! start_session ──▶ (OVER) press Start every restart_interval ──▶ PLAYING
//!                   (PLAYING) wait for the running game to end ──┘
//! PLAYING: frames ──▶ lease.next_frame()        crash ──▶ lease.finish() = points
//! ```

use std::time::Duration;

use tokio::{
    sync::{mpsc, oneshot},
    task::JoinHandle,
    time::{self, Instant, MissedTickBehavior},
};

use crate::{
    action::{Action, ActionIssuer},
    environment::{Environment, EnvironmentError, Key, KeyInput, RawObservation},
    sensor::{SensorFrame, SensorNormalizer},
    session::{GameSession, SessionState, Transition},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriverConfig {
    pub sensor_interval: Duration,
    pub state_interval: Duration,
    pub restart_interval: Duration,
}

impl DriverConfig {
    /// Rejects zero intervals, which a timer cannot tick at.
    pub fn validate(&self) -> Result<(), DriverError> {
        let intervals = [
            ("sensor_interval", self.sensor_interval),
            ("state_interval", self.state_interval),
            ("restart_interval", self.restart_interval),
        ];
        match intervals.into_iter().find(|(_, d)| d.is_zero()) {
            Some((name, _)) => Err(DriverError::ZeroInterval(name)),
            None => Ok(()),
        }
    }
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            sensor_interval: Duration::from_millis(40),
            state_interval: Duration::from_millis(200),
            restart_interval: Duration::from_millis(300),
        }
    }
}

#[derive(Debug, derive_more::Display, derive_more::Error)]
pub enum DriverError {
    #[display("failed to calibrate ground level: {_0}")]
    Calibration(EnvironmentError),
    #[display("{_0} must be non-zero")]
    ZeroInterval(#[error(not(source))] &'static str),
    #[display("another session is already pending or running")]
    SessionBusy,
    #[display("game driver has shut down")]
    Closed,
}

/// Point-in-time view of the driver, for status reporting.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DriverSnapshot {
    pub state: SessionState,
    pub points: u32,
    pub frame: SensorFrame,
    pub last_action: Option<Action>,
}

/// One evaluation's view of one game session.
#[derive(Debug)]
pub struct SessionLease {
    started: Option<oneshot::Receiver<()>>,
    frames: mpsc::UnboundedReceiver<SensorFrame>,
    ended: oneshot::Receiver<u32>,
}

impl SessionLease {
    /// Waits until the requested session is PLAYING.
    pub async fn started(&mut self) -> Result<(), DriverError> {
        match self.started.take() {
            Some(rx) => rx.await.map_err(|_| DriverError::Closed),
            None => Ok(()),
        }
    }

    /// Next frame of this session, in arrival order.
    ///
    /// Returns `None` once the session has ended and every queued frame has
    /// been delivered.
    pub async fn next_frame(&mut self) -> Option<SensorFrame> {
        self.frames.recv().await
    }

    /// Waits for the end of the session and returns its final points.
    pub async fn finish(self) -> Result<u32, DriverError> {
        self.ended.await.map_err(|_| DriverError::Closed)
    }
}

#[derive(Debug)]
enum Command {
    StartSession(oneshot::Sender<Result<SessionLease, DriverError>>),
    Issue(Action),
    Snapshot(oneshot::Sender<DriverSnapshot>),
}

/// Cloneable handle to a spawned [`GameDriver`]. The driver stops once every
/// handle is dropped.
#[derive(Debug, Clone)]
pub struct DriverHandle {
    commands: mpsc::UnboundedSender<Command>,
}

impl DriverHandle {
    fn send(&self, command: Command) -> Result<(), DriverError> {
        self.commands.send(command).map_err(|_| DriverError::Closed)
    }

    /// Requests a fresh session. See the module documentation.
    pub async fn start_session(&self) -> Result<SessionLease, DriverError> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::StartSession(tx))?;
        rx.await.map_err(|_| DriverError::Closed)?
    }

    /// Asks the driver to perform an action.
    pub fn issue(&self, action: Action) -> Result<(), DriverError> {
        self.send(Command::Issue(action))
    }

    pub async fn snapshot(&self) -> Result<DriverSnapshot, DriverError> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Snapshot(tx))?;
        rx.await.map_err(|_| DriverError::Closed)
    }
}

#[derive(Debug)]
struct PendingSession {
    started: Option<oneshot::Sender<()>>,
    frames: mpsc::UnboundedSender<SensorFrame>,
    ended: oneshot::Sender<u32>,
}

#[derive(Debug)]
enum Event {
    SensorTick,
    StateTick,
    RestartTick,
    ReleaseJump,
    Command(Command),
}

#[derive(Debug)]
pub struct GameDriver<E> {
    env: E,
    config: DriverConfig,
    normalizer: SensorNormalizer,
    session: GameSession,
    issuer: ActionIssuer,
    /// Requested session waiting to start.
    pending: Option<PendingSession>,
    /// Whether Start is being pressed for `pending`.
    restarting: bool,
    /// Frame sink of the running leased session.
    frames: Option<mpsc::UnboundedSender<SensorFrame>>,
    release_jump_at: Option<Instant>,
}

impl<E> GameDriver<E>
where
    E: Environment,
{
    /// Validates `config`, connects to an environment and calibrates the ground
    /// level from one observation.
    pub async fn connect(mut env: E, config: DriverConfig) -> Result<Self, DriverError> {
        config.validate()?;
        let obs = env.observe().await.map_err(DriverError::Calibration)?;
        let ground_level = obs.agent.ground_level();
        tracing::info!(ground_level, "calibrated ground level");
        Ok(Self {
            env,
            config,
            normalizer: SensorNormalizer::new(ground_level),
            session: GameSession::new(),
            issuer: ActionIssuer::new(),
            pending: None,
            restarting: false,
            frames: None,
            release_jump_at: None,
        })
    }

    /// Moves the driver into its own task.
    pub fn spawn(self) -> (DriverHandle, JoinHandle<E>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(self.run(rx));
        (DriverHandle { commands: tx }, task)
    }

    /// Runs until all handles are dropped, then returns the environment.
    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<Command>) -> E {
        let mut sensor = time::interval(self.config.sensor_interval);
        sensor.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut state = time::interval(self.config.state_interval);
        state.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut restart = time::interval(self.config.restart_interval);
        restart.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let restarting = self.restarting;
            let release_at = self.release_jump_at;
            let event = tokio::select! {
                _ = sensor.tick() => Event::SensorTick,
                _ = state.tick() => Event::StateTick,
                _ = restart.tick(), if restarting => Event::RestartTick,
                () = time::sleep_until(release_at.unwrap_or_else(Instant::now)),
                    if release_at.is_some() => Event::ReleaseJump,
                command = commands.recv() => match command {
                    Some(command) => Event::Command(command),
                    None => break,
                },
            };
            let pressed_start = match event {
                Event::SensorTick => {
                    self.poll_sensors().await;
                    false
                }
                Event::StateTick => self.poll_state().await,
                Event::RestartTick => {
                    self.send_key(KeyInput::Press(Key::Start)).await;
                    false
                }
                Event::ReleaseJump => {
                    self.release_jump_at = None;
                    self.send_key(KeyInput::Release(Key::Up)).await;
                    false
                }
                Event::Command(command) => self.handle_command(command).await,
            };
            if pressed_start {
                // next press one full interval after the immediate one
                restart.reset();
            }
        }

        tracing::debug!("all driver handles dropped; stopping");
        self.env
    }

    async fn observe(&mut self) -> Option<RawObservation> {
        match self.env.observe().await {
            Ok(obs) => Some(obs),
            Err(EnvironmentError::Unavailable) => {
                tracing::debug!("game instance unavailable; poll skipped");
                None
            }
            Err(err) => {
                tracing::warn!("environment poll failed: {err}");
                None
            }
        }
    }

    async fn send_key(&mut self, input: KeyInput) {
        if let Err(err) = self.env.send(input).await {
            tracing::warn!(%input, "failed to send control signal: {err}");
        }
    }

    async fn poll_sensors(&mut self) {
        let Some(obs) = self.observe().await else {
            return;
        };
        let Some(frame) = self.normalizer.update(&obs) else {
            return;
        };
        if self.session.score(&frame) {
            tracing::trace!(points = self.session.points(), "obstacle passed");
        }
        if let Some(frames) = &self.frames
            && frames.send(frame).is_err()
        {
            tracing::debug!("session consumer went away; dropping frame stream");
            self.frames = None;
        }
    }

    /// Returns `true` when a Start press was just sent for a pending session.
    async fn poll_state(&mut self) -> bool {
        let Some(obs) = self.observe().await else {
            return false;
        };
        match self.session.poll(obs.crashed) {
            Some(Transition::Started) => {
                self.on_started().await;
                false
            }
            Some(Transition::Ended { points }) => self.on_ended(points).await,
            None => false,
        }
    }

    async fn on_started(&mut self) {
        self.normalizer.reset();
        self.issuer.reset();
        self.perform(Action::Norm).await;

        let armed = self
            .pending
            .as_ref()
            .is_some_and(|pending| pending.started.is_none());
        if armed && let Some(pending) = self.pending.take() {
            self.restarting = false;
            self.session.arm_end(pending.ended);
            self.frames = Some(pending.frames);
            tracing::debug!("leased session started");
        } else {
            tracing::debug!("session started without a pending request");
        }
    }

    async fn on_ended(&mut self, points: u32) -> bool {
        self.perform(Action::Norm).await;
        // closing the sink lets the consumer drain and then see the end
        self.frames = None;
        tracing::debug!(points, "session ended");

        if self.pending.is_some() && !self.restarting {
            self.begin_restart().await;
            return true;
        }
        false
    }

    /// Arms the start signal of the pending session and presses Start once.
    async fn begin_restart(&mut self) {
        let Some(pending) = &mut self.pending else {
            return;
        };
        if let Some(started) = pending.started.take() {
            self.session.arm_start(started);
        }
        self.restarting = true;
        self.send_key(KeyInput::Press(Key::Start)).await;
    }

    /// Returns `true` when a Start press was just sent.
    async fn handle_command(&mut self, command: Command) -> bool {
        match command {
            Command::StartSession(reply) => {
                let busy = self.pending.is_some()
                    || self.frames.as_ref().is_some_and(|tx| !tx.is_closed());
                if busy {
                    let _ = reply.send(Err(DriverError::SessionBusy));
                    return false;
                }

                let (started_tx, started_rx) = oneshot::channel();
                let (frames_tx, frames_rx) = mpsc::unbounded_channel();
                let (ended_tx, ended_rx) = oneshot::channel();
                let lease = SessionLease {
                    started: Some(started_rx),
                    frames: frames_rx,
                    ended: ended_rx,
                };
                if reply.send(Ok(lease)).is_err() {
                    return false;
                }
                self.pending = Some(PendingSession {
                    started: Some(started_tx),
                    frames: frames_tx,
                    ended: ended_tx,
                });

                if self.session.state().is_over() {
                    self.begin_restart().await;
                    true
                } else {
                    tracing::debug!("game still running; restarting after it ends");
                    false
                }
            }
            Command::Issue(action) => {
                if self.session.state().is_playing() {
                    self.perform(action).await;
                } else {
                    // keys on the game-over screen may restart the game
                    tracing::trace!(%action, "ignoring action while game is over");
                }
                false
            }
            Command::Snapshot(reply) => {
                let _ = reply.send(DriverSnapshot {
                    state: self.session.state(),
                    points: self.session.points(),
                    frame: *self.normalizer.frame(),
                    last_action: self.issuer.last(),
                });
                false
            }
        }
    }

    async fn perform(&mut self, action: Action) {
        let plan = self.issuer.plan(action, Instant::now());
        for input in plan.inputs {
            self.send_key(input).await;
        }
        if let Some(at) = plan.release_jump_at {
            self.release_jump_at = Some(at);
        }
    }
}
