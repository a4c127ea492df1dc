//! Game-state collaborator driven by remote commands.
//!
//! The channel only ever talks to the game through [`GameActions`]. The
//! [`RunnerState`] implementation is a headless endless-runner model used by
//! the client binary and the tests.

use log::debug;
use shared::{
    FALL_SPEED, JUMP_HEIGHT, JUMP_LENGTH, LANE_MAX, LANE_MIN, RUN_SPEED, SLIDE_LENGTH, START_SCENE,
};

/// Actions a command may trigger on the running game.
pub trait GameActions {
    /// Moves one lane in `direction` (-1 or +1) if the result stays in range.
    fn change_lane(&mut self, direction: i32);
    /// Starts a jump unless already jumping or sliding.
    fn jump(&mut self);
    /// Starts a slide unless already jumping or sliding.
    fn slide(&mut self);
    fn load_scene(&mut self, name: &str);
}

/// Point-in-time view of a [`RunnerState`] for debugging and tests.
#[derive(Debug, Clone, PartialEq)]
pub struct RunnerDiagnostics {
    pub scene: String,
    pub lane: i32,
    pub height: f32,
    pub distance: f32,
    pub jumping: bool,
    pub sliding: bool,
    pub run_speed: f32,
}

#[derive(Debug, Clone)]
pub struct RunnerState {
    scene: String,
    lane: i32,
    height: f32,
    distance: f32,
    run_speed: f32,
    jumping: bool,
    sliding: bool,
    jump_start: f32,
    slide_start: f32,
}

impl RunnerState {
    pub fn new() -> Self {
        Self {
            scene: START_SCENE.to_string(),
            lane: 0,
            height: 0.0,
            distance: 0.0,
            run_speed: RUN_SPEED,
            jumping: false,
            sliding: false,
            jump_start: 0.0,
            slide_start: 0.0,
        }
    }

    /// Advances the run by `dt` seconds and finishes jumps and slides whose
    /// distance has elapsed.
    pub fn update(&mut self, dt: f32) {
        self.distance += self.run_speed * dt;

        if self.jumping {
            let ratio = (self.distance - self.jump_start) / JUMP_LENGTH;
            if ratio >= 1.0 {
                self.jumping = false;
                debug!("Jump finished at distance {:.2}", self.distance);
            } else {
                self.height = (ratio * std::f32::consts::PI).sin() * JUMP_HEIGHT;
            }
        }

        if !self.jumping {
            self.height = (self.height - FALL_SPEED * dt).max(0.0);
        }

        if self.sliding {
            let ratio = (self.distance - self.slide_start) / SLIDE_LENGTH;
            if ratio >= 1.0 {
                self.sliding = false;
                debug!("Slide finished at distance {:.2}", self.distance);
            }
        }
    }

    pub fn lane(&self) -> i32 {
        self.lane
    }

    pub fn is_jumping(&self) -> bool {
        self.jumping
    }

    pub fn is_sliding(&self) -> bool {
        self.sliding
    }

    pub fn scene(&self) -> &str {
        &self.scene
    }

    pub fn diagnostics(&self) -> RunnerDiagnostics {
        RunnerDiagnostics {
            scene: self.scene.clone(),
            lane: self.lane,
            height: self.height,
            distance: self.distance,
            jumping: self.jumping,
            sliding: self.sliding,
            run_speed: self.run_speed,
        }
    }
}

impl Default for RunnerState {
    fn default() -> Self {
        Self::new()
    }
}

impl GameActions for RunnerState {
    fn change_lane(&mut self, direction: i32) {
        let target = self.lane + direction;
        if (LANE_MIN..=LANE_MAX).contains(&target) {
            self.lane = target;
        }
    }

    fn jump(&mut self) {
        if !self.jumping && !self.sliding {
            self.jumping = true;
            self.jump_start = self.distance;
        }
    }

    fn slide(&mut self) {
        if !self.jumping && !self.sliding {
            self.sliding = true;
            self.slide_start = self.distance;
        }
    }

    fn load_scene(&mut self, name: &str) {
        *self = Self::new();
        self.scene = name.to_string();
    }
}
