//! Sensor normalization: raw environment state to a bounded feature vector.
//!
//! The normalizer turns one [`RawObservation`] into one [`SensorFrame`]:
//!
//! | field             | formula                                               | range       |
//! |-------------------|-------------------------------------------------------|-------------|
//! | `distance`        | `clamp(gap, 0, 0.7·canvas_width) / (0.7·canvas_width)` | `[0, 1]`    |
//! | `obstacle_width`  | `width / (1.2·agent_width)`                           | `[0, 1]`    |
//! | `obstacle_height` | `(ground − obstacle_bottom) / agent_height`           | unbounded   |
//! | `speed`           | `speed / MAX_SPEED_OBSERVED`                          | `[0, ∞)`    |
//! | `dino_height`     | `(ground − agent_y − agent_height) / agent_height`    | `≥ 0`       |
//!
//! The gap is measured from the agent's leading edge plus a margin of 0.3 agent
//! widths. Only obstacles strictly ahead of that point are considered.
//!
//! # Obstacle Crossing
//!
//! `last_value` always holds the previous frame's `distance`. A frame where the
//! distance jumps from below 0.3 to above 0.5 means the tracked obstacle has been
//! passed and the next one (or none) is now tracked; see
//! [`SensorFrame::passed_obstacle`].

use serde::{Deserialize, Serialize};

use crate::environment::{RawObservation, RawObstacle};

/// Speed used to normalize the game speed. A calibration constant.
pub const MAX_SPEED_OBSERVED: f64 = 6.0;

const MAX_DISTANCE_FACTOR: f64 = 0.7;
const MARGIN_FACTOR: f64 = 0.3;
const MAX_OBSTACLE_WIDTH_FACTOR: f64 = 1.2;
const AIRBORNE_HEIGHT: f64 = 0.2;
const TRACKING_THRESHOLD: f64 = 0.98;

const PASSED_DISTANCE: f64 = 0.5;
const PASSED_LAST_VALUE: f64 = 0.3;

/// Normalized per-frame view of the environment.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SensorFrame {
    pub distance: f64,
    pub obstacle_width: f64,
    pub obstacle_height: f64,
    pub speed: f64,
    pub dino_height: f64,
    pub is_bird: bool,
    pub last_value: f64,
}

impl SensorFrame {
    /// Frame with no obstacle in range.
    pub const INITIAL: Self = Self {
        distance: 1.0,
        obstacle_width: 0.0,
        obstacle_height: 0.0,
        speed: 0.0,
        dino_height: 0.0,
        is_bird: false,
        last_value: 1.0,
    };

    /// Network input vector: `[distance, obstacle_width, obstacle_height, speed]`.
    #[expect(clippy::cast_possible_truncation)]
    #[must_use]
    pub fn features(&self) -> [f32; 4] {
        [
            self.distance as f32,
            self.obstacle_width as f32,
            self.obstacle_height as f32,
            self.speed as f32,
        ]
    }

    /// Whether this frame registers a passed obstacle.
    ///
    /// True when the previous frame was near or under an obstacle and this one
    /// is clear. Scoring uses this instead of raw survival time.
    #[must_use]
    pub fn passed_obstacle(&self) -> bool {
        self.distance > PASSED_DISTANCE && self.last_value < PASSED_LAST_VALUE
    }
}

impl Default for SensorFrame {
    fn default() -> Self {
        Self::INITIAL
    }
}

/// Stateful converter from raw observations to [`SensorFrame`]s.
#[derive(Debug, Clone)]
pub struct SensorNormalizer {
    ground_level: f64,
    frame: SensorFrame,
    crash_latched: bool,
}

impl SensorNormalizer {
    #[must_use]
    pub fn new(ground_level: f64) -> Self {
        Self {
            ground_level,
            frame: SensorFrame::INITIAL,
            crash_latched: false,
        }
    }

    #[must_use]
    pub fn ground_level(&self) -> f64 {
        self.ground_level
    }

    /// Most recent frame. Its `last_value` is the distance the next frame will
    /// report as its own `last_value`.
    #[must_use]
    pub fn frame(&self) -> &SensorFrame {
        &self.frame
    }

    /// Restores the initial frame and clears the crash latch.
    pub fn reset(&mut self) {
        self.frame = SensorFrame::INITIAL;
        self.crash_latched = false;
    }

    /// Processes one observation.
    ///
    /// Returns the new frame, whose `last_value` is the previous frame's
    /// distance. Returns `None` on crash frames: the first one forces the
    /// distance to 0, later ones are ignored until the latch clears.
    pub fn update(&mut self, obs: &RawObservation) -> Option<SensorFrame> {
        if obs.crashed {
            if !self.crash_latched {
                self.crash_latched = true;
                self.frame.distance = 0.0;
            }
            return None;
        }
        self.crash_latched = false;

        let previous = self.frame.distance;
        let mut next = self.frame;
        next.last_value = previous;
        next.speed = normalize_speed(obs.speed);

        if let Some((obstacle, gap)) = nearest_obstacle(obs) {
            let agent = &obs.agent;
            let max_distance = obs.canvas_width * MAX_DISTANCE_FACTOR;
            next.distance = if max_distance > 0.0 {
                gap.clamp(0.0, max_distance) / max_distance
            } else {
                0.0
            };
            next.obstacle_width =
                (obstacle.width / (agent.width * MAX_OBSTACLE_WIDTH_FACTOR)).clamp(0.0, 1.0);
            next.obstacle_height = (self.ground_level - obstacle.bottom()) / agent.height;
            next.dino_height =
                ((self.ground_level - agent.y - agent.height) / agent.height).max(0.0);

            // a new obstacle just entered tracking range
            if previous > TRACKING_THRESHOLD && next.distance < TRACKING_THRESHOLD {
                next.is_bird = next.obstacle_height > AIRBORNE_HEIGHT;
            }
        } else {
            next.distance = 1.0;
            next.obstacle_width = 0.0;
            next.obstacle_height = 0.0;
            next.dino_height = 0.0;
            next.is_bird = false;
        }

        self.frame = next;
        Some(next)
    }
}

fn normalize_speed(speed: f64) -> f64 {
    speed.max(0.0) / MAX_SPEED_OBSERVED
}

/// Selects the obstacle with the smallest positive gap ahead of the agent.
fn nearest_obstacle(obs: &RawObservation) -> Option<(&RawObstacle, f64)> {
    let origin = obs.agent.x + obs.agent.width * MARGIN_FACTOR;
    obs.obstacles
        .iter()
        .map(|o| (o, o.x - origin))
        .filter(|(_, gap)| *gap > 0.0)
        .min_by(|(_, a), (_, b)| a.total_cmp(b))
}
