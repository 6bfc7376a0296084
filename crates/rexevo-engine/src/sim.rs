//! Headless endless-runner implementing [`Environment`].
//!
//! The simulation follows the geometry of the browser dinosaur game closely
//! enough that a controller trained here sees the same kind of sensor frames:
//! ground cacti that must be jumped, birds at three altitudes, and a speed that
//! grows over time. It advances in fixed 60 fps frames driven by
//! [`tokio::time::Instant`], so paused-clock tests are deterministic.
//!
//! The runner starts crashed and waits for a [`Key::Start`] press, like a game
//! sitting on its "game over" screen.

use std::{future::Future, time::Duration};

use rand::{Rng, SeedableRng as _};
use rand_pcg::Pcg64;
use tokio::time::Instant;

use crate::environment::{
    AgentGeometry, Environment, EnvironmentError, Key, KeyInput, RawObservation, RawObstacle,
};

const FRAME: Duration = Duration::from_nanos(1_000_000_000 / 60);
/// Upper bound on frames simulated per poll, so a stalled poller cannot
/// trigger an unbounded catch-up loop.
const MAX_CATCH_UP_FRAMES: u32 = 600;

const AGENT_X: f64 = 50.0;
const AGENT_WIDTH: f64 = 44.0;
const AGENT_HEIGHT: f64 = 47.0;
const DUCK_WIDTH: f64 = 59.0;
const DUCK_HEIGHT: f64 = 25.0;
const JUMP_VELOCITY: f64 = -10.0;
const GRAVITY: f64 = 0.6;
const FAST_FALL_GRAVITY: f64 = 1.8;
/// Collision boxes are shrunk by this many pixels on every side.
const HITBOX_INSET: f64 = 4.0;

const MIN_GAP: f64 = 120.0;
const GAP_COEFFICIENT: f64 = 0.6;
const BIRD_MIN_SPEED: f64 = 8.5;
const BIRD_WIDTH: f64 = 46.0;
const BIRD_HEIGHT: f64 = 40.0;
/// Bird bottoms measured upwards from the ground.
const BIRD_ALTITUDES: [f64; 3] = [0.0, 25.0, 50.0];
const CACTUS_SIZES: [(f64, f64); 2] = [(17.0, 35.0), (25.0, 50.0)];

#[derive(Debug, Clone)]
pub struct SimConfig {
    pub seed: u64,
    pub canvas_width: f64,
    pub ground_level: f64,
    pub initial_speed: f64,
    pub max_speed: f64,
    /// Speed gained per frame.
    pub acceleration: f64,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            canvas_width: 600.0,
            ground_level: 140.0,
            initial_speed: 6.0,
            max_speed: 13.0,
            acceleration: 0.001,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Controls {
    up: bool,
    down: bool,
}

#[derive(Debug, Clone)]
pub struct SimulatedRunner {
    config: SimConfig,
    rng: Pcg64,
    crashed: bool,
    speed: f64,
    /// Agent top edge.
    agent_y: f64,
    velocity_y: f64,
    ducking: bool,
    controls: Controls,
    obstacles: Vec<RawObstacle>,
    next_gap: f64,
    frames: u64,
    last_step: Option<Instant>,
}

impl SimulatedRunner {
    #[must_use]
    pub fn new(config: SimConfig) -> Self {
        let rng = Pcg64::seed_from_u64(config.seed);
        let speed = config.initial_speed;
        let agent_y = config.ground_level - AGENT_HEIGHT;
        Self {
            config,
            rng,
            crashed: true,
            speed,
            agent_y,
            velocity_y: 0.0,
            ducking: false,
            controls: Controls::default(),
            obstacles: Vec::new(),
            next_gap: 0.0,
            frames: 0,
            last_step: None,
        }
    }

    #[must_use]
    pub fn is_crashed(&self) -> bool {
        self.crashed
    }

    /// Frames simulated since the last restart.
    #[must_use]
    pub fn frames(&self) -> u64 {
        self.frames
    }

    #[must_use]
    pub fn observation(&self) -> RawObservation {
        let (width, height) = self.agent_size();
        RawObservation {
            crashed: self.crashed,
            speed: self.speed,
            canvas_width: self.config.canvas_width,
            agent: AgentGeometry {
                x: AGENT_X,
                y: self.agent_y,
                width,
                height,
            },
            obstacles: self.obstacles.clone(),
        }
    }

    /// Starts a fresh run.
    pub fn restart(&mut self) {
        self.crashed = false;
        self.speed = self.config.initial_speed;
        self.agent_y = self.config.ground_level - AGENT_HEIGHT;
        self.velocity_y = 0.0;
        self.ducking = false;
        self.obstacles.clear();
        self.next_gap = 0.0;
        self.frames = 0;
    }

    /// Applies one control signal immediately.
    pub fn apply(&mut self, input: KeyInput) {
        match input {
            KeyInput::Press(Key::Start) | KeyInput::Hold(Key::Start) => {
                if self.crashed {
                    self.restart();
                }
            }
            KeyInput::Release(Key::Start) => {}
            KeyInput::Hold(Key::Up) => self.controls.up = true,
            KeyInput::Release(Key::Up) => self.controls.up = false,
            KeyInput::Press(Key::Up) => self.try_jump(),
            KeyInput::Hold(Key::Down) => self.controls.down = true,
            KeyInput::Release(Key::Down) | KeyInput::Press(Key::Down) => {
                self.controls.down = false;
            }
        }
    }

    /// Advances the simulation by `count` frames.
    pub fn step_frames(&mut self, count: u32) {
        for _ in 0..count {
            if self.crashed {
                break;
            }
            self.step();
        }
    }

    fn advance_to(&mut self, now: Instant) {
        let Some(last) = self.last_step else {
            self.last_step = Some(now);
            return;
        };
        let mut last = last;
        let mut steps = 0;
        while last + FRAME <= now && steps < MAX_CATCH_UP_FRAMES {
            last += FRAME;
            steps += 1;
        }
        if steps == MAX_CATCH_UP_FRAMES {
            last = now;
        }
        self.last_step = Some(last);
        self.step_frames(steps);
    }

    fn agent_size(&self) -> (f64, f64) {
        if self.ducking {
            (DUCK_WIDTH, DUCK_HEIGHT)
        } else {
            (AGENT_WIDTH, AGENT_HEIGHT)
        }
    }

    fn on_ground(&self) -> bool {
        let (_, height) = self.agent_size();
        self.agent_y + height >= self.config.ground_level
    }

    fn try_jump(&mut self) {
        if !self.crashed && self.on_ground() && !self.ducking {
            self.velocity_y = JUMP_VELOCITY;
            self.agent_y -= 1.0;
        }
    }

    fn step(&mut self) {
        self.frames += 1;
        self.speed = (self.speed + self.config.acceleration).min(self.config.max_speed);

        if self.controls.up {
            self.try_jump();
        }
        self.update_agent();
        self.update_obstacles();

        if self.is_colliding() {
            self.crashed = true;
            self.controls = Controls::default();
        }
    }

    fn update_agent(&mut self) {
        let ground = self.config.ground_level;
        if self.on_ground() && self.velocity_y >= 0.0 {
            self.ducking = self.controls.down;
            let (_, height) = self.agent_size();
            self.agent_y = ground - height;
            self.velocity_y = 0.0;
            return;
        }

        self.ducking = false;
        let gravity = if self.controls.down {
            FAST_FALL_GRAVITY
        } else {
            GRAVITY
        };
        self.velocity_y += gravity;
        self.agent_y += self.velocity_y;
        if self.agent_y + AGENT_HEIGHT >= ground {
            self.agent_y = ground - AGENT_HEIGHT;
            self.velocity_y = 0.0;
        }
    }

    fn update_obstacles(&mut self) {
        for obstacle in &mut self.obstacles {
            obstacle.x -= self.speed;
        }
        self.obstacles.retain(|o| o.x + o.width > 0.0);

        let spawn = self
            .obstacles
            .last()
            .is_none_or(|o| o.x + o.width + self.next_gap < self.config.canvas_width);
        if spawn {
            let obstacle = self.random_obstacle();
            let gap = obstacle.width * self.speed + MIN_GAP * GAP_COEFFICIENT;
            self.next_gap = self.rng.random_range(gap..=gap * 1.5);
            self.obstacles.push(obstacle);
        }
    }

    fn random_obstacle(&mut self) -> RawObstacle {
        let ground = self.config.ground_level;
        let x = self.config.canvas_width;
        if self.speed >= BIRD_MIN_SPEED && self.rng.random_bool(0.25) {
            let altitude = BIRD_ALTITUDES[self.rng.random_range(0..BIRD_ALTITUDES.len())];
            return RawObstacle {
                x,
                y: ground - altitude - BIRD_HEIGHT,
                width: BIRD_WIDTH,
                height: BIRD_HEIGHT,
            };
        }
        let (width, height) = CACTUS_SIZES[self.rng.random_range(0..CACTUS_SIZES.len())];
        let group = f64::from(self.rng.random_range(1..=3_u8));
        RawObstacle {
            x,
            y: ground - height,
            width: width * group,
            height,
        }
    }

    fn is_colliding(&self) -> bool {
        let (width, height) = self.agent_size();
        let left = AGENT_X + HITBOX_INSET;
        let right = AGENT_X + width - HITBOX_INSET;
        let top = self.agent_y + HITBOX_INSET;
        let bottom = self.agent_y + height - HITBOX_INSET;
        self.obstacles.iter().any(|o| {
            let o_left = o.x + HITBOX_INSET;
            let o_right = o.x + o.width - HITBOX_INSET;
            let o_top = o.y + HITBOX_INSET;
            let o_bottom = o.bottom() - HITBOX_INSET;
            left < o_right && o_left < right && top < o_bottom && o_top < bottom
        })
    }
}

impl Environment for SimulatedRunner {
    fn observe(&mut self) -> impl Future<Output = Result<RawObservation, EnvironmentError>> + Send {
        self.advance_to(Instant::now());
        std::future::ready(Ok(self.observation()))
    }

    fn send(&mut self, input: KeyInput) -> impl Future<Output = Result<(), EnvironmentError>> + Send {
        self.advance_to(Instant::now());
        self.apply(input);
        std::future::ready(Ok(()))
    }
}
