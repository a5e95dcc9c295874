//! # Trajectories
//!
//! A trajectory couples a geometric path (or an in-place manoeuvre) with
//! motion profiles to give the target state of each wheel at every instant.
//!
//! Anything the follower can track implements [`Followable`]. Trajectories
//! which can re-plan from the measured state of the robot also implement
//! [`DynamicFollowable`].

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod moment;
mod params;
mod tank;

// ---------------------------------------------------------------------------
// EXPORTS
// ---------------------------------------------------------------------------

pub use moment::{Moment, TankMoment};
pub use params::{RobotSpecs, TrajParams};
pub use tank::{TankTrajectory, TrajSource};

use crate::{
    path::PathError,
    profile::{ProfileError, ProfileState},
};

// ---------------------------------------------------------------------------
// TRAITS
// ---------------------------------------------------------------------------

/// Something which gives the target state of a tank drive over time.
pub trait Followable {
    /// Time at which the trajectory ends.
    fn total_time(&self) -> f64;

    /// Target state at `time_s`, measured from the start of the trajectory.
    fn get(&self, time_s: f64) -> Result<TankMoment, TrajError>;

    /// Access the re-planning interface, if this followable has one.
    fn as_dynamic(&mut self) -> Option<&mut dyn DynamicFollowable> {
        None
    }
}

/// A followable which can re-plan the rest of itself from a measured state.
pub trait DynamicFollowable: Followable {
    /// Re-plan from the measured left and right wheel states at `time_s`.
    ///
    /// # Outputs
    /// - `Ok(true)` if the new plan overshoots its target.
    /// - `Ok(false)` otherwise.
    fn update(
        &mut self,
        time_s: f64,
        left: &ProfileState,
        right: &ProfileState,
    ) -> Result<bool, TrajError>;
}

// ---------------------------------------------------------------------------
// ENUMS
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum TrajError {
    #[error("Path error: {0}")]
    Path(#[from] PathError),

    #[error("Motion profile error: {0}")]
    Profile(#[from] ProfileError),

    #[error("Invalid robot specs: {0}")]
    InvalidSpecs(String),
}
