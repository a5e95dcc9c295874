//! Left and right wheel profiles for a tank drive

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::debug;

// Internal
use super::{ProfileError, ProfileState, TrapezoidalMotionProfile};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Maps a distance travelled by the centre of the robot onto the distance
/// travelled by each wheel.
///
/// Each wheel's distance is the integral of its scale along the centre arc
/// length. For a path with curvature `k` and base radius `r` the scales are
/// `1 - k r` on the left and `1 + k r` on the right.
#[derive(Debug, Clone)]
pub struct WheelTable {
    /// Centre distance of each sample, strictly increasing.
    s_m: Vec<f64>,

    left_scale: Vec<f64>,
    right_scale: Vec<f64>,

    /// Integrated wheel distance at each sample.
    left_m: Vec<f64>,
    right_m: Vec<f64>,
}

/// Wheel-side values at a given centre distance.
#[derive(Debug, Clone, Copy, PartialEq)]
struct WheelSample {
    dist_m: f64,
    scale: f64,
}

// ---------------------------------------------------------------------------
// ENUMS
// ---------------------------------------------------------------------------

/// A pair of wheel profiles.
#[derive(Debug, Clone)]
pub enum DualMotionProfile {
    /// Each wheel follows its own profile. When one side finishes first it
    /// holds its final state until the other side is done.
    Independent {
        left: TrapezoidalMotionProfile,
        right: TrapezoidalMotionProfile,
    },

    /// The centre of the robot follows a single profile which is split
    /// between the wheels through a [`WheelTable`].
    Split {
        center: TrapezoidalMotionProfile,
        table: WheelTable,
    },
}

#[derive(Clone, Copy)]
enum Side {
    Left,
    Right,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl WheelTable {
    /// Build a table from the wheel scales sampled at the given centre
    /// distances.
    pub fn from_scales(
        s_m: Vec<f64>,
        left_scale: Vec<f64>,
        right_scale: Vec<f64>,
    ) -> Result<Self, ProfileError> {
        if s_m.len() < 2 || left_scale.len() != s_m.len() || right_scale.len() != s_m.len() {
            return Err(ProfileError::InvalidArgument(format!(
                "wheel table needs at least 2 samples of each series, got {}, {} and {}",
                s_m.len(),
                left_scale.len(),
                right_scale.len()
            )));
        }
        if s_m.windows(2).any(|w| !(w[1] > w[0])) {
            return Err(ProfileError::InvalidArgument(
                "wheel table distances must be strictly increasing".into(),
            ));
        }

        let left_m = integrate(&s_m, &left_scale);
        let right_m = integrate(&s_m, &right_scale);

        Ok(Self {
            s_m,
            left_scale,
            right_scale,
            left_m,
            right_m,
        })
    }

    /// A table with constant scales, as for an arc or a straight line.
    pub fn uniform(left_scale: f64, right_scale: f64) -> Self {
        Self {
            s_m: vec![0.0, 1.0],
            left_scale: vec![left_scale; 2],
            right_scale: vec![right_scale; 2],
            left_m: vec![0.0, left_scale],
            right_m: vec![0.0, right_scale],
        }
    }

    /// Left wheel distance at the centre distance `s_m`.
    pub fn left_at(&self, s_m: f64) -> f64 {
        self.sample(Side::Left, s_m).dist_m
    }

    /// Right wheel distance at the centre distance `s_m`.
    pub fn right_at(&self, s_m: f64) -> f64 {
        self.sample(Side::Right, s_m).dist_m
    }

    /// Largest absolute scale on either side.
    pub fn max_scale(&self) -> f64 {
        self.left_scale
            .iter()
            .chain(self.right_scale.iter())
            .fold(0f64, |m, s| m.max(s.abs()))
    }

    /// Interpolate one side of the table, extrapolating with the end scales
    /// outside of it.
    fn sample(&self, side: Side, s_m: f64) -> WheelSample {
        let (scale, dist) = match side {
            Side::Left => (&self.left_scale, &self.left_m),
            Side::Right => (&self.right_scale, &self.right_m),
        };
        let n = self.s_m.len();

        if s_m <= self.s_m[0] {
            return WheelSample {
                dist_m: dist[0] + (s_m - self.s_m[0]) * scale[0],
                scale: scale[0],
            };
        }
        if s_m >= self.s_m[n - 1] {
            return WheelSample {
                dist_m: dist[n - 1] + (s_m - self.s_m[n - 1]) * scale[n - 1],
                scale: scale[n - 1],
            };
        }

        let i = self.s_m.partition_point(|s| *s <= s_m) - 1;
        let ds = s_m - self.s_m[i];
        let frac = ds / (self.s_m[i + 1] - self.s_m[i]);
        let k = util::maths::lerp(scale[i], scale[i + 1], frac);

        WheelSample {
            dist_m: dist[i] + ds * (scale[i] + k) / 2.0,
            scale: k,
        }
    }
}

impl DualMotionProfile {
    /// Left wheel state at `time_s`.
    pub fn left(&self, time_s: f64) -> Result<ProfileState, ProfileError> {
        self.side(Side::Left, time_s)
    }

    /// Right wheel state at `time_s`.
    pub fn right(&self, time_s: f64) -> Result<ProfileState, ProfileError> {
        self.side(Side::Right, time_s)
    }

    fn side(&self, side: Side, time_s: f64) -> Result<ProfileState, ProfileError> {
        match self {
            DualMotionProfile::Independent { left, right } => {
                let profile = match side {
                    Side::Left => left,
                    Side::Right => right,
                };
                if time_s > profile.total_time() && time_s <= self.total_time() {
                    profile.state(profile.total_time())
                }
                else {
                    profile.state(time_s)
                }
            }
            DualMotionProfile::Split { center, table } => {
                let c = center.state(time_s)?;
                let w = table.sample(side, c.pos_m);

                Ok(ProfileState {
                    pos_m: w.dist_m,
                    vel_ms: c.vel_ms * w.scale,
                    accel_mss: c.accel_mss * w.scale,
                })
            }
        }
    }

    /// Set the tolerance of every profile, re-planning each from its start.
    pub fn with_tolerance(self, tolerance: f64) -> Self {
        match self {
            DualMotionProfile::Independent { left, right } => DualMotionProfile::Independent {
                left: left.with_tolerance(tolerance),
                right: right.with_tolerance(tolerance),
            },
            DualMotionProfile::Split { center, table } => DualMotionProfile::Split {
                center: center.with_tolerance(tolerance),
                table,
            },
        }
    }

    pub fn tolerance(&self) -> f64 {
        match self {
            DualMotionProfile::Independent { left, .. } => left.tolerance(),
            DualMotionProfile::Split { center, .. } => center.tolerance(),
        }
    }

    /// Time at which both wheels have finished.
    pub fn total_time(&self) -> f64 {
        match self {
            DualMotionProfile::Independent { left, right } => {
                left.total_time().max(right.total_time())
            }
            DualMotionProfile::Split { center, .. } => center.total_time(),
        }
    }

    /// True if the robot as a whole moves in the negative direction.
    pub fn is_reversed(&self) -> bool {
        match self {
            DualMotionProfile::Independent { left, right } => {
                left.target_m() + right.target_m() < 0.0
            }
            DualMotionProfile::Split { center, .. } => center.is_reversed(),
        }
    }

    /// Re-plan both wheels from their measured states.
    ///
    /// A split profile is re-planned from the mean of the two wheels, which
    /// is the centre of the robot.
    ///
    /// # Outputs
    /// - `Ok(true)` if any re-planned profile overshoots its target.
    pub fn update(
        &mut self,
        time_s: f64,
        left_state: &ProfileState,
        right_state: &ProfileState,
    ) -> Result<bool, ProfileError> {
        match self {
            DualMotionProfile::Independent { left, right } => {
                let l = left.update(
                    time_s,
                    left_state.pos_m,
                    left_state.vel_ms,
                    left_state.accel_mss,
                )?;
                let r = right.update(
                    time_s,
                    right_state.pos_m,
                    right_state.vel_ms,
                    right_state.accel_mss,
                )?;
                Ok(l || r)
            }
            DualMotionProfile::Split { center, .. } => {
                let pos = (left_state.pos_m + right_state.pos_m) / 2.0;
                let vel = (left_state.vel_ms + right_state.vel_ms) / 2.0;
                let accel = (left_state.accel_mss + right_state.accel_mss) / 2.0;

                debug!(
                    "Re-planning centre profile at {:.3} s from {:.4} m, {:.4} m/s",
                    time_s, pos, vel
                );

                center.update(time_s, pos, vel, accel)
            }
        }
    }
}

/// Cumulative trapezoid integral of `y` over `x`.
fn integrate(x: &[f64], y: &[f64]) -> Vec<f64> {
    let mut acc = 0.0;
    let mut out = Vec::with_capacity(x.len());
    out.push(0.0);

    for i in 1..x.len() {
        acc += (x[i] - x[i - 1]) * (y[i] + y[i - 1]) / 2.0;
        out.push(acc);
    }

    out
}

#[cfg(test)]
mod test {
    use super::*;
    use approx::assert_abs_diff_eq;

    const EPS: f64 = 1e-9;

    #[test]
    fn test_uniform_table() {
        let table = WheelTable::uniform(0.5, 1.5);

        assert_abs_diff_eq!(table.left_at(4.0), 2.0, epsilon = EPS);
        assert_abs_diff_eq!(table.right_at(4.0), 6.0, epsilon = EPS);
        assert_abs_diff_eq!(table.left_at(-2.0), -1.0, epsilon = EPS);
        assert_abs_diff_eq!(table.max_scale(), 1.5);
    }

    #[test]
    fn test_varying_table() {
        // Scale ramps linearly from 1 to 2 over 2 m
        let table = WheelTable::from_scales(
            vec![0.0, 1.0, 2.0],
            vec![1.0, 1.5, 2.0],
            vec![1.0, 0.5, 0.0],
        )
        .unwrap();

        // Integral of 1 + s/2 is s + s^2/4
        for i in 0..=20 {
            let s = i as f64 / 10.0;
            assert_abs_diff_eq!(table.left_at(s), s + s * s / 4.0, epsilon = EPS);
            assert_abs_diff_eq!(table.right_at(s), s - s * s / 4.0, epsilon = EPS);
        }

        assert!(WheelTable::from_scales(vec![0.0], vec![1.0], vec![1.0]).is_err());
        assert!(WheelTable::from_scales(
            vec![0.0, 0.0],
            vec![1.0, 1.0],
            vec![1.0, 1.0]
        )
        .is_err());
    }

    #[test]
    fn test_split_profile() {
        let center = TrapezoidalMotionProfile::new(1.0, 1.0, 4.0).unwrap();
        let profile = DualMotionProfile::Split {
            center: center.clone(),
            table: WheelTable::uniform(0.5, 1.5),
        };
        let total = profile.total_time();

        assert_abs_diff_eq!(total, center.total_time());
        assert_abs_diff_eq!(profile.left(total).unwrap().pos_m, 2.0, epsilon = 1e-6);
        assert_abs_diff_eq!(profile.right(total).unwrap().pos_m, 6.0, epsilon = 1e-6);

        let c = center.state(1.5).unwrap();
        let l = profile.left(1.5).unwrap();
        let r = profile.right(1.5).unwrap();
        assert_abs_diff_eq!(l.vel_ms, 0.5 * c.vel_ms, epsilon = EPS);
        assert_abs_diff_eq!(r.vel_ms, 1.5 * c.vel_ms, epsilon = EPS);
        assert_abs_diff_eq!(r.accel_mss, 1.5 * c.accel_mss, epsilon = EPS);
        assert!(!profile.is_reversed());
    }

    #[test]
    fn test_independent_hold() {
        let profile = DualMotionProfile::Independent {
            left: TrapezoidalMotionProfile::new(1.0, 1.0, -1.0).unwrap(),
            right: TrapezoidalMotionProfile::new(1.0, 1.0, 4.0).unwrap(),
        };
        let total = profile.total_time();

        let left = profile.left(total).unwrap();
        assert_abs_diff_eq!(left.pos_m, -1.0, epsilon = 1e-6);
        assert_abs_diff_eq!(left.vel_ms, 0.0, epsilon = 1e-6);
        assert_abs_diff_eq!(profile.right(total).unwrap().pos_m, 4.0, epsilon = 1e-6);

        assert!(profile.left(total + 1.0).is_err());
        assert!(!profile.is_reversed());
    }

    #[test]
    fn test_split_update() {
        let mut profile = DualMotionProfile::Split {
            center: TrapezoidalMotionProfile::new(1.0, 1.0, 4.0).unwrap(),
            table: WheelTable::uniform(1.0, 1.0),
        };

        let left = ProfileState { pos_m: 1.0, vel_ms: 1.0, accel_mss: 0.0 };
        let right = ProfileState { pos_m: 1.2, vel_ms: 1.0, accel_mss: 0.0 };

        assert!(!profile.update(2.0, &left, &right).unwrap());
        assert_abs_diff_eq!(profile.left(2.0).unwrap().pos_m, 1.1, epsilon = 1e-9);
        assert_abs_diff_eq!(
            profile.left(profile.total_time()).unwrap().pos_m,
            4.0,
            epsilon = 1e-6
        );
    }
}
