//! # Simulated drive base
//!
//! A simple differential drive plant for running the follower without
//! hardware. Each wheel's speed responds to its motor output with a first
//! order lag, and the pose is integrated from the wheel speeds.
//!
//! The plant is advanced lazily: every time a motor is set or a sensor is read
//! the state is integrated up to the current time of the clock with the motor
//! outputs held since the previous access.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};
use util::maths::normalise_angle;

// Internal
use crate::follower::{DirectionSource, DistanceSource, DriveIo, Motor, TimestampSource};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A clock which only moves when told to.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    time_s: Arc<Mutex<f64>>,
}

/// Physical parameters of the simulated drive.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct SimParams {
    /// Wheel speed at full output.
    ///
    /// Units: meters/second
    pub max_wheel_speed_ms: f64,

    /// First order time constant of the wheel speed response.
    ///
    /// Units: seconds
    pub time_constant_s: f64,

    /// Units: meters
    pub base_width_m: f64,

    /// Scale applied to each wheel's speed, to simulate mismatched motors.
    pub left_gain: f64,
    pub right_gain: f64,
}

/// Pose of the simulated robot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct SimPose {
    pub x_m: f64,
    pub y_m: f64,
    pub heading_rad: f64,
}

/// The simulated drive. Clones share the same plant.
#[derive(Clone)]
pub struct SimDrive {
    params: SimParams,
    clock: Arc<dyn TimestampSource + Send + Sync>,
    state: Arc<Mutex<SimState>>,
}

#[derive(Debug, Default)]
struct SimState {
    last_time_s: Option<f64>,

    left_output: f64,
    right_output: f64,

    left_vel_ms: f64,
    right_vel_ms: f64,

    /// Total distance rolled by each wheel
    left_m: f64,
    right_m: f64,

    /// Wheel distances at the last encoder reset
    left_zero_m: f64,
    right_zero_m: f64,

    pose: SimPose,
}

#[derive(Debug, Clone, Copy)]
enum Side {
    Left,
    Right,
}

/// Motor adapter for one side of the drive.
pub struct SimMotor {
    drive: SimDrive,
    side: Side,
}

/// Encoder adapter for one side of the drive.
pub struct SimEncoder {
    drive: SimDrive,
    side: Side,
}

/// Heading sensor adapter.
pub struct SimGyro {
    drive: SimDrive,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move the clock forward by `dt_s`.
    pub fn advance(&self, dt_s: f64) {
        let mut t = lock(&self.time_s);
        *t += dt_s;
    }

    pub fn set(&self, time_s: f64) {
        *lock(&self.time_s) = time_s;
    }
}

impl TimestampSource for ManualClock {
    fn now(&self) -> f64 {
        *lock(&self.time_s)
    }
}

impl Default for SimParams {
    fn default() -> Self {
        Self {
            max_wheel_speed_ms: 1.0,
            time_constant_s: 0.1,
            base_width_m: 0.5,
            left_gain: 1.0,
            right_gain: 1.0,
        }
    }
}

impl SimDrive {
    pub fn new(params: SimParams, clock: Arc<dyn TimestampSource + Send + Sync>) -> Self {
        Self {
            params,
            clock,
            state: Arc::new(Mutex::new(SimState::default())),
        }
    }

    pub fn left_motor(&self) -> SimMotor {
        SimMotor {
            drive: self.clone(),
            side: Side::Left,
        }
    }

    pub fn right_motor(&self) -> SimMotor {
        SimMotor {
            drive: self.clone(),
            side: Side::Right,
        }
    }

    pub fn left_encoder(&self) -> SimEncoder {
        SimEncoder {
            drive: self.clone(),
            side: Side::Left,
        }
    }

    pub fn right_encoder(&self) -> SimEncoder {
        SimEncoder {
            drive: self.clone(),
            side: Side::Right,
        }
    }

    pub fn gyro(&self) -> SimGyro {
        SimGyro {
            drive: self.clone(),
        }
    }

    /// Build the full set of follower devices for this drive.
    pub fn drive_io(&self, clock: Box<dyn TimestampSource + Send>) -> DriveIo {
        DriveIo {
            clock,
            left_motor: Box::new(self.left_motor()),
            right_motor: Box::new(self.right_motor()),
            left_encoder: Box::new(self.left_encoder()),
            right_encoder: Box::new(self.right_encoder()),
            gyro: Some(Box::new(self.gyro())),
        }
    }

    /// Current pose of the robot.
    pub fn pose(&self) -> SimPose {
        self.step().pose
    }

    /// Total distance rolled by each wheel since the start of the simulation.
    pub fn wheel_distances(&self) -> (f64, f64) {
        let state = self.step();
        (state.left_m, state.right_m)
    }

    /// Integrate the plant up to the current time, returning the locked
    /// state.
    fn step(&self) -> MutexGuard<'_, SimState> {
        let now = self.clock.now();
        let mut state = lock(&self.state);

        let dt = match state.last_time_s {
            Some(t) => now - t,
            None => 0.0,
        };
        state.last_time_s = Some(now);

        if dt <= 0.0 {
            return state;
        }

        let p = &self.params;
        let (dl, vl) = wheel_response(
            state.left_vel_ms,
            state.left_output * p.max_wheel_speed_ms * p.left_gain,
            p.time_constant_s,
            dt,
        );
        let (dr, vr) = wheel_response(
            state.right_vel_ms,
            state.right_output * p.max_wheel_speed_ms * p.right_gain,
            p.time_constant_s,
            dt,
        );

        state.left_m += dl;
        state.right_m += dr;
        state.left_vel_ms = vl;
        state.right_vel_ms = vr;

        // Integrate the pose along the mean heading of the step
        let dh = if p.base_width_m > 0.0 {
            (dr - dl) / p.base_width_m
        }
        else {
            0.0
        };
        let mid = state.pose.heading_rad + dh / 2.0;
        let dc = (dl + dr) / 2.0;

        state.pose.x_m += dc * mid.cos();
        state.pose.y_m += dc * mid.sin();
        state.pose.heading_rad = normalise_angle(state.pose.heading_rad + dh);

        state
    }
}

impl Motor for SimMotor {
    fn set(&mut self, output: f64) {
        let mut state = self.drive.step();
        let output = output.clamp(-1.0, 1.0);
        match self.side {
            Side::Left => state.left_output = output,
            Side::Right => state.right_output = output,
        }
    }
}

impl DistanceSource for SimEncoder {
    fn distance(&mut self) -> f64 {
        let state = self.drive.step();
        match self.side {
            Side::Left => state.left_m - state.left_zero_m,
            Side::Right => state.right_m - state.right_zero_m,
        }
    }

    fn reset_distance(&mut self) {
        let mut state = self.drive.step();
        match self.side {
            Side::Left => state.left_zero_m = state.left_m,
            Side::Right => state.right_zero_m = state.right_m,
        }
    }
}

impl DirectionSource for SimGyro {
    fn heading(&mut self) -> f64 {
        self.drive.step().pose.heading_rad
    }
}

/// Distance covered and final speed of a wheel over `dt` with a first order
/// response towards `target_ms`.
fn wheel_response(vel_ms: f64, target_ms: f64, tau_s: f64, dt: f64) -> (f64, f64) {
    if tau_s <= 0.0 {
        return (target_ms * dt, target_ms);
    }

    let decay = (-dt / tau_s).exp();
    let dist = target_ms * dt + (vel_ms - target_ms) * tau_s * (1.0 - decay);
    let vel = target_ms + (vel_ms - target_ms) * decay;

    (dist, vel)
}

/// Lock a mutex, recovering the data if another thread panicked holding it.
fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}
