//! Time sampled snapshots of a trajectory

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::Serialize;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// The target state of the centre of the robot at one instant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Moment {
    pub pos_m: f64,
    pub vel_ms: f64,
    pub accel_mss: f64,

    /// The direction the robot faces.
    pub heading_rad: f64,

    pub time_s: f64,

    /// Heading at the start of the trajectory.
    pub init_heading_rad: f64,

    /// True if the robot is driving backwards.
    pub backwards: bool,
}

/// The target state of both sides of a tank drive at one instant.
///
/// Wheel values are given in the robot's own frame: the left wheel is always
/// the robot's left wheel, and a positive distance is the wheel rolling
/// forwards.
///
/// The struct is flat so it can be archived as a CSV record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct TankMoment {
    pub left_pos_m: f64,
    pub left_vel_ms: f64,
    pub left_accel_mss: f64,

    pub right_pos_m: f64,
    pub right_vel_ms: f64,
    pub right_accel_mss: f64,

    pub heading_rad: f64,
    pub time_s: f64,
    pub init_heading_rad: f64,
    pub backwards: bool,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl TankMoment {
    /// Collapse to the centre of the robot, the mean of the two wheels.
    pub fn center(&self) -> Moment {
        Moment {
            pos_m: (self.left_pos_m + self.right_pos_m) / 2.0,
            vel_ms: (self.left_vel_ms + self.right_vel_ms) / 2.0,
            accel_mss: (self.left_accel_mss + self.right_accel_mss) / 2.0,
            heading_rad: self.heading_rad,
            time_s: self.time_s,
            init_heading_rad: self.init_heading_rad,
            backwards: self.backwards,
        }
    }
}
