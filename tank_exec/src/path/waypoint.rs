//! Waypoints the path is fitted through

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use nalgebra::Vector2;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A point the path must pass through, with the direction of travel at that
/// point.
///
/// Waypoints are value types and cannot be modified once built, use the
/// `with_*` functions to derive a new waypoint.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Waypoint {
    /// Units: meters
    x_m: f64,

    /// Units: meters
    y_m: f64,

    /// Direction of travel, angle to the +ve x axis.
    ///
    /// Units: radians
    heading_rad: f64,

    /// Optional speed at this waypoint. Only the first waypoint's velocity is
    /// used, as the initial velocity of the trajectory.
    ///
    /// Units: meters/second
    #[serde(default)]
    velocity_ms: Option<f64>,

    /// Optional second derivative of the curve at this waypoint, along the
    /// left hand normal of the heading. Only quintic segments can honour it.
    ///
    /// Units: meters/parameter^2
    #[serde(default)]
    accel_m: Option<f64>,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Waypoint {
    /// Create a new waypoint from a position and heading.
    pub fn new(x_m: f64, y_m: f64, heading_rad: f64) -> Self {
        Self {
            x_m,
            y_m,
            heading_rad,
            velocity_ms: None,
            accel_m: None,
        }
    }

    /// Derive a waypoint with the given velocity.
    pub fn with_velocity(self, velocity_ms: f64) -> Self {
        Self {
            velocity_ms: Some(velocity_ms),
            ..self
        }
    }

    /// Derive a waypoint with the given curve acceleration.
    pub fn with_accel(self, accel_m: f64) -> Self {
        Self {
            accel_m: Some(accel_m),
            ..self
        }
    }

    /// Derive a waypoint at a new pose, keeping the optional constraints.
    pub(crate) fn moved(self, position_m: Vector2<f64>, heading_rad: f64) -> Self {
        Self {
            x_m: position_m[0],
            y_m: position_m[1],
            heading_rad,
            ..self
        }
    }

    pub fn x_m(&self) -> f64 {
        self.x_m
    }

    pub fn y_m(&self) -> f64 {
        self.y_m
    }

    pub fn heading_rad(&self) -> f64 {
        self.heading_rad
    }

    pub fn velocity_ms(&self) -> Option<f64> {
        self.velocity_ms
    }

    pub fn accel_m(&self) -> Option<f64> {
        self.accel_m
    }

    /// The waypoint's position as a vector.
    pub fn position(&self) -> Vector2<f64> {
        Vector2::new(self.x_m, self.y_m)
    }

    /// Unit vector in the direction of the heading.
    pub fn direction(&self) -> Vector2<f64> {
        util::maths::polar(1.0, self.heading_rad)
    }

    /// The second derivative vector imposed on the curve at this waypoint,
    /// zero if no acceleration was given.
    pub fn accel_vector(&self) -> Vector2<f64> {
        match self.accel_m {
            Some(a) => util::maths::left_normal(&self.direction()) * a,
            None => Vector2::zeros(),
        }
    }
}
