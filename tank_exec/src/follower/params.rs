//! Follower parameters

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::Deserialize;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Controller gains for the follower.
///
/// Position errors are computed as `measured - target`, so feedback gains
/// which drive the error to zero are negative.
#[derive(Deserialize, Debug, Clone, Copy, Default, PartialEq)]
#[serde(default)]
pub struct Gains {
    /// Velocity feedforward gain
    pub k_v: f64,

    /// Acceleration feedforward gain
    pub k_a: f64,

    /// Proportional gain on the wheel position error
    pub k_p: f64,

    /// Derivative gain on the wheel position error
    pub k_d: f64,

    /// Proportional gain on the heading error, added to the left output and
    /// subtracted from the right.
    pub k_dp: f64,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_gains_defaults() {
        let gains: Gains = util::params::from_str("k_v = 0.5\nk_p = -2.0").unwrap();

        assert_eq!(gains.k_v, 0.5);
        assert_eq!(gains.k_p, -2.0);
        assert_eq!(gains.k_a, 0.0);
        assert_eq!(gains.k_dp, 0.0);
    }
}
