//! # Trapezoidal motion profile
//!
//! Plans a one dimensional move over a distance: accelerate at the maximum
//! acceleration to a cruise velocity, cruise, then decelerate to rest at the
//! target. Short moves never reach the maximum velocity and the profile
//! becomes triangular.
//!
//! All planning is done on the distance magnitude, a negative distance sets
//! the `reversed` flag and the outputs are negated.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{debug, warn};
use serde::Serialize;
use util::maths::solve_quadratic;

// Internal
use super::ProfileError;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Default tolerance used when comparing times and distances.
pub const DEFAULT_TOLERANCE: f64 = 1e-7;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Position, velocity and acceleration of a profile at one instant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ProfileState {
    pub pos_m: f64,
    pub vel_ms: f64,
    pub accel_mss: f64,
}

/// Reported when the initial velocity is too high to stop within the
/// requested distance.
///
/// The profile then only decelerates, stopping beyond the target.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Overshoot {
    /// The distance which was asked for.
    pub requested_m: f64,

    /// The distance actually covered while stopping.
    pub actual_m: f64,
}

#[derive(Debug, Clone)]
pub struct TrapezoidalMotionProfile {
    max_vel_ms: f64,
    max_accel_mss: f64,

    /// Target position, fixed at construction and kept across updates.
    target_m: f64,

    /// Planned distance magnitude from the start position.
    dist_m: f64,

    reversed: bool,

    /// Initial velocity in the direction of the target.
    init_vel_ms: f64,

    cruise_vel_ms: f64,

    t_accel_s: f64,
    t_cruise_s: f64,
    t_decel_s: f64,

    /// Duration of the current plan, measured from `init_time_s`.
    t_total_s: f64,

    accel_dist_m: f64,
    cruise_dist_m: f64,

    /// Time and position the current plan starts from.
    init_time_s: f64,
    init_dist_m: f64,

    overshoot: Option<Overshoot>,

    tolerance: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl TrapezoidalMotionProfile {
    /// Plan a move from rest over `distance_m`.
    pub fn new(
        max_vel_ms: f64,
        max_accel_mss: f64,
        distance_m: f64,
    ) -> Result<Self, ProfileError> {
        Self::with_init_vel(max_vel_ms, max_accel_mss, distance_m, 0.0)
    }

    /// Plan a move over `distance_m` starting at `init_vel_ms`.
    ///
    /// The initial velocity is signed in the same frame as the distance, so a
    /// positive velocity on a negative distance is moving away from the
    /// target.
    pub fn with_init_vel(
        max_vel_ms: f64,
        max_accel_mss: f64,
        distance_m: f64,
        init_vel_ms: f64,
    ) -> Result<Self, ProfileError> {
        if !max_vel_ms.is_finite() || max_vel_ms <= 0.0 {
            return Err(ProfileError::InvalidArgument(format!(
                "maximum velocity must be positive, got {}",
                max_vel_ms
            )));
        }
        if !max_accel_mss.is_finite() || max_accel_mss <= 0.0 {
            return Err(ProfileError::InvalidArgument(format!(
                "maximum acceleration must be positive, got {}",
                max_accel_mss
            )));
        }
        if !distance_m.is_finite() {
            return Err(ProfileError::InvalidArgument(format!(
                "distance must be finite, got {}",
                distance_m
            )));
        }
        if !init_vel_ms.is_finite() || init_vel_ms.abs() > max_vel_ms {
            return Err(ProfileError::InvalidArgument(format!(
                "initial velocity {} exceeds the maximum velocity {}",
                init_vel_ms, max_vel_ms
            )));
        }

        let mut profile = Self {
            max_vel_ms,
            max_accel_mss,
            target_m: distance_m,
            dist_m: 0.0,
            reversed: false,
            init_vel_ms: 0.0,
            cruise_vel_ms: 0.0,
            t_accel_s: 0.0,
            t_cruise_s: 0.0,
            t_decel_s: 0.0,
            t_total_s: 0.0,
            accel_dist_m: 0.0,
            cruise_dist_m: 0.0,
            init_time_s: 0.0,
            init_dist_m: 0.0,
            overshoot: None,
            tolerance: DEFAULT_TOLERANCE,
        };

        profile.plan(distance_m, init_vel_ms);

        Ok(profile)
    }

    /// Set the tolerance used for boundary comparisons.
    ///
    /// The current plan is recomputed from its start state with the new
    /// tolerance.
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance.abs();

        let vel_ms = self.direction() * self.init_vel_ms;
        self.plan(self.target_m - self.init_dist_m, vel_ms);

        self
    }

    /// Compute the phases for a move over `remaining_m` starting at
    /// `vel_ms`.
    fn plan(&mut self, remaining_m: f64, vel_ms: f64) {
        let a = self.max_accel_mss;

        self.reversed = remaining_m < 0.0;
        let dir = self.direction();

        let mut dist = remaining_m.abs();
        let v0 = dir * vel_ms;

        // Distance covered while accelerating if the move were triangular
        let d_accel = dist / 2.0 - v0 * v0 / (4.0 * a);

        let d_decel = if d_accel < 0.0 && v0 > 0.0 {
            let stop_dist = v0 * v0 / (2.0 * a);
            warn!(
                "Motion profile overshoots: requested {:.4} m but needs {:.4} m to stop from {:.4} m/s",
                dist, stop_dist, v0
            );
            self.overshoot = Some(Overshoot {
                requested_m: dist,
                actual_m: stop_dist,
            });
            dist = stop_dist;
            stop_dist
        }
        else {
            self.overshoot = None;
            dist - d_accel
        };

        let cruise_vel = self.max_vel_ms.min((2.0 * a * d_decel).sqrt());

        let t_accel = ((cruise_vel - v0) / a).max(0.0);
        let accel_dist = v0 * t_accel + a * t_accel * t_accel / 2.0;

        let t_decel = cruise_vel / a;
        let decel_dist = t_decel * t_decel * a / 2.0;

        let cruise_dist = (dist - accel_dist - decel_dist).max(0.0);
        let t_cruise = if cruise_vel > self.tolerance {
            cruise_dist / cruise_vel
        }
        else {
            0.0
        };

        self.dist_m = dist;
        self.init_vel_ms = v0;
        self.cruise_vel_ms = cruise_vel;
        self.t_accel_s = t_accel;
        self.t_cruise_s = t_cruise;
        self.t_decel_s = t_decel;
        self.t_total_s = t_accel + t_cruise + t_decel;
        self.accel_dist_m = accel_dist;
        self.cruise_dist_m = cruise_dist;

        debug!(
            "Planned {:.4} m (reversed: {}): v0 {:.4} m/s, cruise {:.4} m/s, phases {:.4}/{:.4}/{:.4} s",
            dist, self.reversed, v0, cruise_vel, t_accel, t_cruise, t_decel
        );
    }

    /// Re-plan from a measured state so the rest of the move is continuous
    /// with where the robot actually is.
    ///
    /// The target position is kept, the new plan starts at `time_s` from
    /// `pos_m` with velocity `vel_ms`. A velocity beyond the maximum is
    /// clamped. The measured acceleration is accepted for symmetry with the
    /// other states but does not affect the plan.
    ///
    /// # Outputs
    /// - `Ok(true)` if the new plan overshoots the target, see
    ///   [`TrapezoidalMotionProfile::overshoot`].
    /// - `Ok(false)` otherwise.
    pub fn update(
        &mut self,
        time_s: f64,
        pos_m: f64,
        vel_ms: f64,
        _accel_mss: f64,
    ) -> Result<bool, ProfileError> {
        if !time_s.is_finite() || !pos_m.is_finite() || !vel_ms.is_finite() {
            return Err(ProfileError::InvalidArgument(format!(
                "cannot update from a non-finite state (t: {}, pos: {}, vel: {})",
                time_s, pos_m, vel_ms
            )));
        }

        let vel_ms = if vel_ms.abs() > self.max_vel_ms {
            warn!(
                "Measured velocity {:.4} m/s exceeds the maximum, clamping to {:.4} m/s",
                vel_ms, self.max_vel_ms
            );
            vel_ms.signum() * self.max_vel_ms
        }
        else {
            vel_ms
        };

        self.plan(self.target_m - pos_m, vel_ms);
        self.init_time_s = time_s;
        self.init_dist_m = pos_m;

        Ok(self.overshoot.is_some())
    }

    // -----------------------------------------------------------------------
    // Evaluation
    // -----------------------------------------------------------------------

    /// Position at `time_s`.
    pub fn position(&self, time_s: f64) -> Result<f64, ProfileError> {
        self.state(time_s).map(|s| s.pos_m)
    }

    /// Velocity at `time_s`.
    pub fn velocity(&self, time_s: f64) -> Result<f64, ProfileError> {
        self.state(time_s).map(|s| s.vel_ms)
    }

    /// Acceleration at `time_s`.
    pub fn acceleration(&self, time_s: f64) -> Result<f64, ProfileError> {
        self.state(time_s).map(|s| s.accel_mss)
    }

    /// Full state of the profile at `time_s`.
    ///
    /// Times within the tolerance of either end of the profile are clamped
    /// onto it, anything further out is a range error.
    pub fn state(&self, time_s: f64) -> Result<ProfileState, ProfileError> {
        let tau = time_s - self.init_time_s;

        if !tau.is_finite() || tau < -self.tolerance || tau > self.t_total_s + self.tolerance {
            return Err(ProfileError::TimeOutOfRange {
                time_s,
                start_s: self.init_time_s,
                end_s: self.total_time(),
            });
        }

        let tau = tau.max(0.0).min(self.t_total_s);
        let a = self.max_accel_mss;
        let vc = self.cruise_vel_ms;

        let (pos, vel, accel) = if tau < self.t_accel_s - self.tolerance {
            (
                self.init_vel_ms * tau + a * tau * tau / 2.0,
                self.init_vel_ms + a * tau,
                a,
            )
        }
        else if tau < self.t_accel_s + self.t_cruise_s - self.tolerance {
            (
                self.accel_dist_m + vc * (tau - self.t_accel_s),
                vc,
                0.0,
            )
        }
        else {
            let td = (tau - self.t_accel_s - self.t_cruise_s).max(0.0);
            (
                self.accel_dist_m + self.cruise_dist_m + vc * td - a * td * td / 2.0,
                vc - a * td,
                -a,
            )
        };

        let dir = self.direction();

        Ok(ProfileState {
            pos_m: self.init_dist_m + dir * pos,
            vel_ms: dir * vel,
            accel_mss: dir * accel,
        })
    }

    /// The earliest time at which the profile reaches `pos_m`.
    pub fn time_at(&self, pos_m: f64) -> Result<f64, ProfileError> {
        let p = self.direction() * (pos_m - self.init_dist_m);
        let a = self.max_accel_mss;
        let vc = self.cruise_vel_ms;
        let tol = self.tolerance;

        // Smallest root of a phase's quadratic lying within [0, duration]
        let first_in = |roots: Vec<f64>, duration: f64| {
            roots
                .into_iter()
                .find(|r| *r >= -tol && *r <= duration + tol)
                .map(|r| r.max(0.0).min(duration))
        };

        let local_t = first_in(
            solve_quadratic(a / 2.0, self.init_vel_ms, -p),
            self.t_accel_s,
        )
        .or_else(|| {
            if vc <= tol {
                return None;
            }
            let t = (p - self.accel_dist_m) / vc;
            if t >= -tol && t <= self.t_cruise_s + tol {
                Some(self.t_accel_s + t.max(0.0).min(self.t_cruise_s))
            }
            else {
                None
            }
        })
        .or_else(|| {
            first_in(
                solve_quadratic(-a / 2.0, vc, self.accel_dist_m + self.cruise_dist_m - p),
                self.t_decel_s,
            )
            .map(|t| self.t_accel_s + self.t_cruise_s + t)
        });

        match local_t {
            Some(t) => Ok(self.init_time_s + t),
            None => Err(ProfileError::PositionOutOfRange {
                pos_m,
                start_m: self.init_dist_m,
                end_m: self.end_position(),
            }),
        }
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    /// Time at which the profile ends.
    pub fn total_time(&self) -> f64 {
        self.init_time_s + self.t_total_s
    }

    /// Time at which the current plan starts.
    pub fn start_time(&self) -> f64 {
        self.init_time_s
    }

    /// Position the profile comes to rest at.
    pub fn end_position(&self) -> f64 {
        self.init_dist_m + self.direction() * self.dist_m
    }

    /// The position the profile was asked to reach.
    pub fn target_m(&self) -> f64 {
        self.target_m
    }

    /// Magnitude of the planned distance from the start of the current plan.
    pub fn distance_m(&self) -> f64 {
        self.dist_m
    }

    pub fn is_reversed(&self) -> bool {
        self.reversed
    }

    pub fn max_vel_ms(&self) -> f64 {
        self.max_vel_ms
    }

    pub fn max_accel_mss(&self) -> f64 {
        self.max_accel_mss
    }

    pub fn cruise_vel_ms(&self) -> f64 {
        self.cruise_vel_ms
    }

    /// Durations of the acceleration, cruise and deceleration phases.
    pub fn phase_times(&self) -> (f64, f64, f64) {
        (self.t_accel_s, self.t_cruise_s, self.t_decel_s)
    }

    /// Set if the current plan cannot stop at the target.
    pub fn overshoot(&self) -> Option<Overshoot> {
        self.overshoot
    }

    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    fn direction(&self) -> f64 {
        if self.reversed {
            -1.0
        }
        else {
            1.0
        }
    }
}
