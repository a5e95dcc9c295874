//! # Motion profiles
//!
//! Time parameterisations of one dimensional moves. The trapezoidal profile
//! plans a single distance, the dual profile pairs the left and right wheels
//! of a tank drive.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod dual;
mod trapezoidal;

// ---------------------------------------------------------------------------
// EXPORTS
// ---------------------------------------------------------------------------

pub use dual::{DualMotionProfile, WheelTable};
pub use trapezoidal::{
    Overshoot, ProfileState, TrapezoidalMotionProfile, DEFAULT_TOLERANCE,
};

// ---------------------------------------------------------------------------
// ENUMS
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ProfileError {
    #[error("Invalid profile argument: {0}")]
    InvalidArgument(String),

    #[error("Time {time_s} s is outside the profile [{start_s}, {end_s}] s")]
    TimeOutOfRange {
        time_s: f64,
        start_s: f64,
        end_s: f64,
    },

    #[error("Position {pos_m} m is never reached by the profile from {start_m} m to {end_m} m")]
    PositionOutOfRange {
        pos_m: f64,
        start_m: f64,
        end_m: f64,
    },
}
