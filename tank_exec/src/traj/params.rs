//! Trajectory parameters

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::Deserialize;

use super::TrajError;
use crate::{
    path::{PathType, Waypoint, DEFAULT_SAMPLE_COUNT},
    profile::DEFAULT_TOLERANCE,
};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Physical limits of the robot.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct RobotSpecs {
    /// Maximum speed of either wheel.
    ///
    /// Units: meters/second
    pub max_vel_ms: f64,

    /// Maximum acceleration of either wheel.
    ///
    /// Units: meters/second^2
    pub max_accel_mss: f64,

    /// Distance between the left and right wheels.
    ///
    /// Units: meters
    pub base_width_m: f64,
}

/// Parameters describing a trajectory through waypoints.
#[derive(Debug, Clone, Deserialize)]
pub struct TrajParams {
    pub waypoints: Vec<Waypoint>,

    /// Scale of the waypoint tangents.
    pub alpha: f64,

    /// Number of samples in the arc length table.
    #[serde(default = "default_sample_count")]
    pub sample_count: usize,

    #[serde(default)]
    pub path_type: PathType,

    /// Drive the path facing away from the direction of travel.
    #[serde(default)]
    pub backwards: bool,

    /// Tolerance of the motion profile's time and distance comparisons.
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl RobotSpecs {
    /// Check the limits are usable for planning.
    pub fn validate(&self) -> Result<(), TrajError> {
        if !(self.max_vel_ms.is_finite() && self.max_vel_ms > 0.0) {
            return Err(TrajError::InvalidSpecs(format!(
                "max_vel_ms must be positive, got {}",
                self.max_vel_ms
            )));
        }
        if !(self.max_accel_mss.is_finite() && self.max_accel_mss > 0.0) {
            return Err(TrajError::InvalidSpecs(format!(
                "max_accel_mss must be positive, got {}",
                self.max_accel_mss
            )));
        }
        if !(self.base_width_m.is_finite() && self.base_width_m >= 0.0) {
            return Err(TrajError::InvalidSpecs(format!(
                "base_width_m must be non-negative, got {}",
                self.base_width_m
            )));
        }

        Ok(())
    }

    pub fn base_radius_m(&self) -> f64 {
        self.base_width_m / 2.0
    }
}

fn default_sample_count() -> usize {
    DEFAULT_SAMPLE_COUNT
}

fn default_tolerance() -> f64 {
    DEFAULT_TOLERANCE
}
