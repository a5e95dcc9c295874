//! # Tank drive trajectory library
//!
//! Plans smooth trajectories for differential drive robots and follows them.
//!
//! - [`path`] fits splines through waypoints and parameterises them by arc
//!   length.
//! - [`profile`] plans trapezoidal velocity profiles over a distance.
//! - [`traj`] combines the two into per-wheel targets over time.
//! - [`follower`] tracks a trajectory with feedforward and feedback control.
//! - [`sim`] is a simulated drive base for running the follower without
//!   hardware.

pub mod follower;
pub mod path;
pub mod profile;
pub mod sim;
pub mod traj;
