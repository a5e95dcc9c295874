//! Sensor and actuator interfaces
//!
//! The follower only talks to hardware through these traits. Drivers for real
//! motors and encoders live outside this crate, the [`crate::sim`] module
//! provides simulated ones.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use std::time::Instant;

// ---------------------------------------------------------------------------
// TRAITS
// ---------------------------------------------------------------------------

/// A monotonic source of time.
pub trait TimestampSource {
    /// Current time.
    ///
    /// Units: seconds
    fn now(&self) -> f64;
}

/// Measures the distance a wheel has rolled.
pub trait DistanceSource {
    /// Distance since the last reset, positive rolling forwards.
    ///
    /// Units: meters
    fn distance(&mut self) -> f64;

    fn reset_distance(&mut self);
}

/// Measures the heading of the robot.
pub trait DirectionSource {
    /// Heading, positive anticlockwise.
    ///
    /// Units: radians
    fn heading(&mut self) -> f64;
}

/// A motor driven by a normalised output.
pub trait Motor {
    /// Set the output, in `[-1, 1]`.
    fn set(&mut self, output: f64);
}

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Wall clock time since the clock was created.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    start: Instant,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl TimestampSource for MonotonicClock {
    fn now(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }
}
