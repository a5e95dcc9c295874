//! # Path
//!
//! A path is a continuous curve fitted through a sequence of waypoints, made
//! up of one spline segment between each pair of waypoints.
//!
//! The path is parameterised by a global parameter `t` in
//! `[0, segment_count]`, the integer part selecting the segment. Once
//! [`Path::compute_len`] has been called the path can also be queried by arc
//! length, which is what the motion profiles work in.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod segment;
mod waypoint;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::debug;
use nalgebra::Vector2;
use std::f64::consts::{FRAC_PI_2, PI};
use util::maths::{cross2, left_normal, lerp, polar, reflect};

pub use segment::{PathType, SplineSegment};
pub use waypoint::Waypoint;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Number of samples used to build the arc length table when none is given.
pub const DEFAULT_SAMPLE_COUNT: usize = 10_000;

/// Below this speed (units per parameter) the tangent is treated as zero.
const SPEED_EPSILON: f64 = 1e-9;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A continuous curve through a set of waypoints.
#[derive(Debug, Clone)]
pub struct Path {
    waypoints: Vec<Waypoint>,

    segments: Vec<SplineSegment>,

    path_type: PathType,

    /// Scale applied to the waypoint headings to get the segment tangents.
    alpha: f64,

    /// Half the robot's track width, used to place the wheels.
    ///
    /// Units: meters
    base_radius_m: f64,

    /// True if the robot drives this path facing away from the direction of
    /// travel.
    backwards: bool,

    len_table: Option<LenTable>,
}

/// Cumulative arc length sampled at evenly spaced parameter values.
#[derive(Debug, Clone)]
struct LenTable {
    /// Arc length at each sample, `s_m[i]` being at `t = i * t_step`.
    s_m: Vec<f64>,

    t_step: f64,
}

// ---------------------------------------------------------------------------
// ENUMS
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum PathError {
    #[error("A path needs at least 2 waypoints, got {0}")]
    InvalidWaypoints(usize),

    #[error("Alpha must be finite and non-negative, got {0}")]
    InvalidAlpha(f64),

    #[error("At least 2 samples are needed to compute the arc length, got {0}")]
    InvalidSampleCount(usize),

    #[error("The arc length of the path has not been computed")]
    LengthNotComputed,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Path {
    /// Fit a new path through the given waypoints.
    ///
    /// The tangent at each waypoint is `alpha` times the unit vector of its
    /// heading. Larger values of `alpha` give wider, smoother turns.
    pub fn new(
        waypoints: Vec<Waypoint>,
        alpha: f64,
        path_type: PathType,
    ) -> Result<Self, PathError> {
        if waypoints.len() < 2 {
            return Err(PathError::InvalidWaypoints(waypoints.len()));
        }
        if !alpha.is_finite() || alpha < 0.0 {
            return Err(PathError::InvalidAlpha(alpha));
        }

        Ok(Self::build(waypoints, alpha, path_type, 0.0, false))
    }

    /// Set the base radius (half the track width) of the robot following this
    /// path.
    pub fn with_base_radius(mut self, base_radius_m: f64) -> Self {
        self.base_radius_m = base_radius_m;
        self
    }

    /// Set whether the robot drives this path backwards.
    pub fn with_backwards(mut self, backwards: bool) -> Self {
        self.backwards = backwards;
        self
    }

    /// Build the segments for an already validated set of waypoints.
    fn build(
        waypoints: Vec<Waypoint>,
        alpha: f64,
        path_type: PathType,
        base_radius_m: f64,
        backwards: bool,
    ) -> Self {
        let segments = waypoints
            .windows(2)
            .map(|w| {
                SplineSegment::from_hermite(
                    path_type,
                    w[0].position(),
                    w[1].position(),
                    w[0].direction() * alpha,
                    w[1].direction() * alpha,
                    w[0].accel_vector(),
                    w[1].accel_vector(),
                )
            })
            .collect();

        Self {
            waypoints,
            segments,
            path_type,
            alpha,
            base_radius_m,
            backwards,
            len_table: None,
        }
    }

    /// Build a new path from transformed waypoints, keeping every other
    /// property of this path.
    fn derive(&self, waypoints: Vec<Waypoint>, backwards: bool) -> Self {
        Self::build(
            waypoints,
            self.alpha,
            self.path_type,
            self.base_radius_m,
            backwards,
        )
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn waypoints(&self) -> &[Waypoint] {
        &self.waypoints
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    pub fn path_type(&self) -> PathType {
        self.path_type
    }

    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    pub fn base_radius_m(&self) -> f64 {
        self.base_radius_m
    }

    pub fn is_backwards(&self) -> bool {
        self.backwards
    }

    /// Upper bound of the global parameter.
    pub fn t_max(&self) -> f64 {
        self.segments.len() as f64
    }

    /// Total arc length, available once [`Path::compute_len`] has been called.
    pub fn length_m(&self) -> Result<f64, PathError> {
        self.table().map(|tab| tab.s_m.last().copied().unwrap_or(0.0))
    }

    pub fn is_length_computed(&self) -> bool {
        self.len_table.is_some()
    }

    // -----------------------------------------------------------------------
    // Geometry
    // -----------------------------------------------------------------------

    /// Position on the path at global parameter `t`.
    pub fn at(&self, t: f64) -> Vector2<f64> {
        let (seg, local) = self.locate(t);
        self.segments[seg].at(local)
    }

    /// First derivative of the path with respect to the global parameter.
    pub fn deriv_at(&self, t: f64) -> Vector2<f64> {
        let (seg, local) = self.locate(t);
        self.segments[seg].deriv_at(local)
    }

    /// Second derivative of the path with respect to the global parameter.
    pub fn second_deriv_at(&self, t: f64) -> Vector2<f64> {
        let (seg, local) = self.locate(t);
        self.segments[seg].second_deriv_at(local)
    }

    /// Signed curvature at `t`, positive when turning left.
    ///
    /// Units: 1/meters
    pub fn curvature(&self, t: f64) -> f64 {
        let d = self.deriv_at(t);
        let speed = d.norm();

        if speed < SPEED_EPSILON {
            return 0.0;
        }

        cross2(&d, &self.second_deriv_at(t)) / speed.powi(3)
    }

    /// Direction of travel along the path at `t`.
    ///
    /// Units: radians
    pub fn heading_at(&self, t: f64) -> f64 {
        let dir = self.tangent_at(t);
        dir[1].atan2(dir[0])
    }

    /// Left and right wheel positions at `t`, in that order.
    ///
    /// The wheels sit `base_radius_m` either side of the path along its
    /// normal. When driving backwards the robot's left wheel is on the right
    /// of the path so the pair is swapped.
    pub fn wheels_at(&self, t: f64) -> (Vector2<f64>, Vector2<f64>) {
        let centre = self.at(t);
        let offset = left_normal(&self.tangent_at(t)) * self.base_radius_m;

        let left = centre + offset;
        let right = centre - offset;

        if self.backwards {
            (right, left)
        }
        else {
            (left, right)
        }
    }

    /// Unit tangent at `t`.
    ///
    /// Where the derivative vanishes (only at waypoints when `alpha` is zero)
    /// the nearest waypoint's heading is used instead.
    fn tangent_at(&self, t: f64) -> Vector2<f64> {
        let d = self.deriv_at(t);
        let speed = d.norm();

        if speed >= SPEED_EPSILON {
            return d / speed;
        }

        let idx = (t.max(0.0).round() as usize).min(self.waypoints.len() - 1);
        self.waypoints[idx].direction()
    }

    /// Split a global parameter into its segment index and local parameter.
    fn locate(&self, t: f64) -> (usize, f64) {
        let t = t.max(0.0).min(self.t_max());
        let seg = (t.floor() as usize).min(self.segments.len() - 1);

        (seg, t - seg as f64)
    }

    // -----------------------------------------------------------------------
    // Arc length
    // -----------------------------------------------------------------------

    /// Compute the arc length table using `sample_count` evenly spaced
    /// samples over the whole parameter range, returning the total length.
    ///
    /// The length is integrated from the derivative magnitude with the
    /// trapezoid rule.
    pub fn compute_len(&mut self, sample_count: usize) -> Result<f64, PathError> {
        if sample_count < 2 {
            return Err(PathError::InvalidSampleCount(sample_count));
        }

        let t_step = self.t_max() / (sample_count - 1) as f64;

        let mut s_m = Vec::with_capacity(sample_count);
        s_m.push(0.0);

        let mut last_speed = self.deriv_at(0.0).norm();
        let mut total_m = 0.0;

        for i in 1..sample_count {
            let speed = self.deriv_at(i as f64 * t_step).norm();
            total_m += 0.5 * (last_speed + speed) * t_step;
            s_m.push(total_m);
            last_speed = speed;
        }

        debug!(
            "Path length {:.4} m from {} samples over {} segments",
            total_m,
            sample_count,
            self.segments.len()
        );

        self.len_table = Some(LenTable { s_m, t_step });

        Ok(total_m)
    }

    /// Parameter at which the arc length from the start equals `s_m`.
    ///
    /// `s_m` is clamped to the length of the path. Where the table is flat the
    /// parameter at the start of the flat region is returned.
    pub fn s2t(&self, s_m: f64) -> Result<f64, PathError> {
        let tab = self.table()?;
        let n = tab.s_m.len();

        let idx = tab.s_m.partition_point(|s| *s < s_m);

        if idx == 0 {
            return Ok(0.0);
        }
        if idx >= n {
            return Ok(self.t_max());
        }

        let s_lo = tab.s_m[idx - 1];
        let s_hi = tab.s_m[idx];
        let frac = (s_m - s_lo) / (s_hi - s_lo);

        Ok(((idx - 1) as f64 + frac) * tab.t_step)
    }

    /// Arc length from the start of the path to parameter `t`.
    pub fn t2s(&self, t: f64) -> Result<f64, PathError> {
        let tab = self.table()?;
        let n = tab.s_m.len();

        let f = t.max(0.0).min(self.t_max()) / tab.t_step;
        let idx = (f.floor() as usize).min(n - 2);

        Ok(lerp(tab.s_m[idx], tab.s_m[idx + 1], f - idx as f64))
    }

    fn table(&self) -> Result<&LenTable, PathError> {
        self.len_table.as_ref().ok_or(PathError::LengthNotComputed)
    }

    // -----------------------------------------------------------------------
    // Transforms
    // -----------------------------------------------------------------------

    /// Reflect the path about the line through the first waypoint along its
    /// heading, so left turns become right turns.
    pub fn mirror_left_right(&self) -> Self {
        let (origin, h0) = self.origin();
        let line_dir = polar(1.0, h0);

        let waypoints = self
            .mirrored_waypoints(&origin, &line_dir, 2.0 * h0);

        self.derive(waypoints, self.backwards)
    }

    /// Reflect the path about the line through the first waypoint
    /// perpendicular to its heading. The robot then drives the mirrored path
    /// in the opposite direction.
    pub fn mirror_front_back(&self) -> Self {
        let (origin, h0) = self.origin();
        let line_dir = polar(1.0, h0 + FRAC_PI_2);

        let waypoints = self
            .mirrored_waypoints(&origin, &line_dir, 2.0 * h0 + PI);

        self.derive(waypoints, !self.backwards)
    }

    /// The same curve traced from end to start, driven in the opposite
    /// direction.
    pub fn retrace(&self) -> Self {
        let waypoints = self
            .waypoints
            .iter()
            .rev()
            .map(|w| {
                let wp = w.moved(w.position(), w.heading_rad() + PI);
                match w.accel_m() {
                    Some(a) => wp.with_accel(-a),
                    None => wp,
                }
            })
            .collect();

        self.derive(waypoints, !self.backwards)
    }

    fn origin(&self) -> (Vector2<f64>, f64) {
        let first = &self.waypoints[0];
        (first.position(), first.heading_rad())
    }

    /// Reflect every waypoint about the given line. A reflection about a line
    /// at angle `a` maps a heading `h` to `2a - h`, so `heading_sum` is `2a`.
    ///
    /// Reflection reverses the sense of every turn so the curve accelerations
    /// are negated.
    fn mirrored_waypoints(
        &self,
        line_point: &Vector2<f64>,
        line_dir: &Vector2<f64>,
        heading_sum: f64,
    ) -> Vec<Waypoint> {
        self.waypoints
            .iter()
            .map(|w| {
                let wp = w.moved(
                    reflect(&w.position(), line_point, line_dir),
                    heading_sum - w.heading_rad(),
                );
                match w.accel_m() {
                    Some(a) => wp.with_accel(-a),
                    None => wp,
                }
            })
            .collect()
    }
}
