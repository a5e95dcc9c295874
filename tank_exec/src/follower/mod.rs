//! # Trajectory follower
//!
//! The follower drives the left and right motors so the wheels track the
//! distances given by a [`crate::traj::Followable`]. Each wheel's output is
//!
//! ```text
//! u = k_a * a + k_v * v + k_p * e + k_d * (de/dt - v)
//! ```
//!
//! where `v` and `a` are the target velocity and acceleration and `e` is the
//! measured distance minus the target distance. If a heading sensor is
//! present the heading error (measured minus target, both relative to their
//! starting values) times `k_dp` is added to the left output and subtracted
//! from the right. Outputs are clamped to `[-1, 1]`.
//!
//! A follower is either ticked by hand with [`Follower::run`] or handed to a
//! [`FollowerRunner`] which ticks it at a fixed period on its own thread.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

pub mod params;
pub mod runner;
pub mod sensors;
pub mod state;

// ---------------------------------------------------------------------------
// EXPORTS
// ---------------------------------------------------------------------------

pub use params::Gains;
pub use runner::{FollowerRunner, RunnerError, RunnerExit};
pub use sensors::*;
pub use state::*;
