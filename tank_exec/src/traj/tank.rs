//! Tank drive trajectory

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{info, warn};
use std::f64::consts::PI;
use util::maths::normalise_angle;

// Internal
use super::{DynamicFollowable, Followable, RobotSpecs, TankMoment, TrajError, TrajParams};
use crate::{
    path::Path,
    profile::{
        DualMotionProfile, ProfileState, TrapezoidalMotionProfile, WheelTable, DEFAULT_TOLERANCE,
    },
};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A trajectory for a differential drive robot.
///
/// Trajectories don't change once generated, except through the re-planning
/// of [`DynamicFollowable::update`]. The transforms build a new trajectory
/// from the original plan.
#[derive(Debug, Clone)]
pub struct TankTrajectory {
    source: TrajSource,

    profile: DualMotionProfile,

    specs: RobotSpecs,

    /// Number of samples used for the path tables.
    sample_count: usize,

    /// Heading the robot faces at the start.
    init_heading_rad: f64,

    backwards: bool,
}

// ---------------------------------------------------------------------------
// ENUMS
// ---------------------------------------------------------------------------

/// What the trajectory was generated from.
#[derive(Debug, Clone)]
pub enum TrajSource {
    Path(Path),

    /// Turn on the spot, positive angles turning left.
    PointTurn {
        angle_rad: f64,
    },

    /// Drive in a straight line, negative distances driving backwards.
    Straight {
        distance_m: f64,
    },
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl TankTrajectory {
    /// Fit a path through the parameter waypoints and generate a trajectory
    /// along it.
    pub fn generate(specs: &RobotSpecs, params: &TrajParams) -> Result<Self, TrajError> {
        let path = Path::new(params.waypoints.clone(), params.alpha, params.path_type)?
            .with_backwards(params.backwards);

        Ok(Self::from_path(path, specs, params.sample_count)?.with_tolerance(params.tolerance))
    }

    /// Generate a trajectory following the given path.
    ///
    /// The centre of the robot follows a single motion profile along the
    /// path's arc length, split between the wheels by the curvature. The
    /// profile limits are reduced so that the outer wheel on the tightest
    /// turn stays within the robot's limits.
    pub fn from_path(path: Path, specs: &RobotSpecs, sample_count: usize) -> Result<Self, TrajError> {
        specs.validate()?;

        let r = specs.base_radius_m();
        let mut path = path.with_base_radius(r);
        let length_m = path.compute_len(sample_count)?;

        let table = if length_m > DEFAULT_TOLERANCE {
            let n = sample_count;
            let mut s_m = Vec::with_capacity(n);
            let mut left_scale = Vec::with_capacity(n);
            let mut right_scale = Vec::with_capacity(n);

            for i in 0..n {
                let s = length_m * i as f64 / (n - 1) as f64;
                let k = path.curvature(path.s2t(s)?);

                s_m.push(s);
                left_scale.push(1.0 - k * r);
                right_scale.push(1.0 + k * r);
            }

            WheelTable::from_scales(s_m, left_scale, right_scale)?
        }
        else {
            WheelTable::uniform(1.0, 1.0)
        };

        let derate = table.max_scale().max(1.0);
        let max_vel_ms = specs.max_vel_ms / derate;
        let max_accel_mss = specs.max_accel_mss / derate;

        let mut init_vel_ms = path.waypoints()[0].velocity_ms().unwrap_or(0.0);
        if init_vel_ms.abs() > max_vel_ms {
            warn!(
                "Initial velocity {:.4} m/s exceeds the path's velocity limit, clamping to {:.4} m/s",
                init_vel_ms, max_vel_ms
            );
            init_vel_ms = init_vel_ms.signum() * max_vel_ms;
        }

        let center = TrapezoidalMotionProfile::with_init_vel(
            max_vel_ms,
            max_accel_mss,
            length_m,
            init_vel_ms,
        )?;

        let backwards = path.is_backwards();
        let init_heading_rad = robot_heading(path.heading_at(0.0), backwards);

        info!(
            "Generated path trajectory: {:.3} m in {:.3} s (limits derated by {:.3}, backwards: {})",
            length_m,
            center.total_time(),
            derate,
            backwards
        );

        Ok(Self {
            source: TrajSource::Path(path),
            profile: DualMotionProfile::Split { center, table },
            specs: *specs,
            sample_count,
            init_heading_rad,
            backwards,
        })
    }

    /// Generate a turn on the spot through `angle_rad`, positive turning left.
    pub fn point_turn(
        specs: &RobotSpecs,
        angle_rad: f64,
        init_heading_rad: f64,
    ) -> Result<Self, TrajError> {
        specs.validate()?;

        let wheel_m = angle_rad * specs.base_radius_m();
        let profile = DualMotionProfile::Independent {
            left: TrapezoidalMotionProfile::new(specs.max_vel_ms, specs.max_accel_mss, -wheel_m)?,
            right: TrapezoidalMotionProfile::new(specs.max_vel_ms, specs.max_accel_mss, wheel_m)?,
        };

        info!(
            "Generated point turn: {:.3} rad in {:.3} s",
            angle_rad,
            profile.total_time()
        );

        Ok(Self {
            source: TrajSource::PointTurn { angle_rad },
            profile,
            specs: *specs,
            sample_count: crate::path::DEFAULT_SAMPLE_COUNT,
            init_heading_rad,
            backwards: false,
        })
    }

    /// Generate a straight drive over `distance_m`, negative driving
    /// backwards.
    pub fn straight(
        specs: &RobotSpecs,
        distance_m: f64,
        init_heading_rad: f64,
    ) -> Result<Self, TrajError> {
        specs.validate()?;

        let profile = DualMotionProfile::Independent {
            left: TrapezoidalMotionProfile::new(specs.max_vel_ms, specs.max_accel_mss, distance_m)?,
            right: TrapezoidalMotionProfile::new(specs.max_vel_ms, specs.max_accel_mss, distance_m)?,
        };

        info!(
            "Generated straight drive: {:.3} m in {:.3} s",
            distance_m,
            profile.total_time()
        );

        Ok(Self {
            source: TrajSource::Straight { distance_m },
            profile,
            specs: *specs,
            sample_count: crate::path::DEFAULT_SAMPLE_COUNT,
            init_heading_rad,
            backwards: distance_m < 0.0,
        })
    }

    /// Set the tolerance of the trajectory's motion profiles.
    ///
    /// Times within the tolerance past either end of the trajectory are
    /// clamped onto it rather than rejected.
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.profile = self.profile.with_tolerance(tolerance);
        self
    }

    // -----------------------------------------------------------------------
    // Transforms
    // -----------------------------------------------------------------------

    /// The same trajectory with left and right turns exchanged.
    pub fn mirror_left_right(&self) -> Result<Self, TrajError> {
        let traj = match &self.source {
            TrajSource::Path(p) => {
                Self::from_path(p.mirror_left_right(), &self.specs, self.sample_count)
            }
            TrajSource::PointTurn { angle_rad } => {
                Self::point_turn(&self.specs, -angle_rad, self.init_heading_rad)
            }
            TrajSource::Straight { distance_m } => {
                Self::straight(&self.specs, *distance_m, self.init_heading_rad)
            }
        }?;

        Ok(traj.with_tolerance(self.profile.tolerance()))
    }

    /// The same trajectory reflected front to back, so the robot drives it in
    /// the opposite direction.
    pub fn mirror_front_back(&self) -> Result<Self, TrajError> {
        let traj = match &self.source {
            TrajSource::Path(p) => {
                Self::from_path(p.mirror_front_back(), &self.specs, self.sample_count)
            }
            TrajSource::PointTurn { angle_rad } => {
                Self::point_turn(&self.specs, -angle_rad, self.init_heading_rad)
            }
            TrajSource::Straight { distance_m } => {
                Self::straight(&self.specs, -distance_m, self.init_heading_rad)
            }
        }?;

        Ok(traj.with_tolerance(self.profile.tolerance()))
    }

    /// A trajectory which takes the robot from the end of this one back to
    /// its start.
    pub fn retrace(&self) -> Result<Self, TrajError> {
        let traj = match &self.source {
            TrajSource::Path(p) => Self::from_path(p.retrace(), &self.specs, self.sample_count),
            TrajSource::PointTurn { angle_rad } => Self::point_turn(
                &self.specs,
                -angle_rad,
                normalise_angle(self.init_heading_rad + angle_rad),
            ),
            TrajSource::Straight { distance_m } => {
                Self::straight(&self.specs, -distance_m, self.init_heading_rad)
            }
        }?;

        Ok(traj.with_tolerance(self.profile.tolerance()))
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn source(&self) -> &TrajSource {
        &self.source
    }

    /// The path this trajectory follows, if it was generated from one.
    pub fn path(&self) -> Option<&Path> {
        match &self.source {
            TrajSource::Path(p) => Some(p),
            _ => None,
        }
    }

    pub fn profile(&self) -> &DualMotionProfile {
        &self.profile
    }

    pub fn specs(&self) -> &RobotSpecs {
        &self.specs
    }

    pub fn init_heading_rad(&self) -> f64 {
        self.init_heading_rad
    }

    pub fn is_backwards(&self) -> bool {
        self.backwards
    }

    /// Convert wheel states between the path frame and the robot frame.
    ///
    /// A robot driving a path backwards has its left wheel on the right of the
    /// path, rolling the opposite way. The conversion is its own inverse.
    fn swap_frame(&self, left: ProfileState, right: ProfileState) -> (ProfileState, ProfileState) {
        if self.backwards && matches!(self.source, TrajSource::Path(_)) {
            (negate(right), negate(left))
        }
        else {
            (left, right)
        }
    }
}

impl Followable for TankTrajectory {
    fn total_time(&self) -> f64 {
        self.profile.total_time()
    }

    fn get(&self, time_s: f64) -> Result<TankMoment, TrajError> {
        let path_left = self.profile.left(time_s)?;
        let path_right = self.profile.right(time_s)?;

        let heading_rad = match &self.source {
            TrajSource::Path(path) => {
                let s_m = (path_left.pos_m + path_right.pos_m) / 2.0;
                robot_heading(path.heading_at(path.s2t(s_m)?), self.backwards)
            }
            TrajSource::PointTurn { .. } | TrajSource::Straight { .. } => {
                let turned_rad = if self.specs.base_width_m > 0.0 {
                    (path_right.pos_m - path_left.pos_m) / self.specs.base_width_m
                }
                else {
                    0.0
                };
                normalise_angle(self.init_heading_rad + turned_rad)
            }
        };

        let (left, right) = self.swap_frame(path_left, path_right);

        Ok(TankMoment {
            left_pos_m: left.pos_m,
            left_vel_ms: left.vel_ms,
            left_accel_mss: left.accel_mss,
            right_pos_m: right.pos_m,
            right_vel_ms: right.vel_ms,
            right_accel_mss: right.accel_mss,
            heading_rad,
            time_s,
            init_heading_rad: self.init_heading_rad,
            backwards: self.backwards,
        })
    }

    fn as_dynamic(&mut self) -> Option<&mut dyn DynamicFollowable> {
        Some(self)
    }
}

impl DynamicFollowable for TankTrajectory {
    fn update(
        &mut self,
        time_s: f64,
        left: &ProfileState,
        right: &ProfileState,
    ) -> Result<bool, TrajError> {
        let (path_left, path_right) = self.swap_frame(*left, *right);

        Ok(self.profile.update(time_s, &path_left, &path_right)?)
    }
}

/// The direction the robot faces given its direction of travel.
fn robot_heading(travel_rad: f64, backwards: bool) -> f64 {
    if backwards {
        normalise_angle(travel_rad + PI)
    }
    else {
        travel_rad
    }
}

fn negate(s: ProfileState) -> ProfileState {
    ProfileState {
        pos_m: -s.pos_m,
        vel_ms: -s.vel_ms,
        accel_mss: -s.accel_mss,
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::path::{PathType, Waypoint};
    use approx::assert_abs_diff_eq;
    use std::f64::consts::{FRAC_PI_2, FRAC_PI_4};
    use util::maths::ang_dist;

    const SPECS: RobotSpecs = RobotSpecs {
        max_vel_ms: 1.0,
        max_accel_mss: 2.0,
        base_width_m: 0.5,
    };

    /// Left hand quarter turn of radius 1 starting at (1, 0).
    fn arc() -> Path {
        Path::new(
            vec![Waypoint::new(1.0, 0.0, FRAC_PI_2), Waypoint::new(0.0, 1.0, PI)],
            4.0 * (2f64.sqrt() - 1.0),
            PathType::CubicHermite,
        )
        .unwrap()
    }

    fn end(traj: &TankTrajectory) -> TankMoment {
        traj.get(traj.total_time()).unwrap()
    }

    #[test]
    fn test_straight_path() {
        let params = TrajParams {
            waypoints: vec![Waypoint::new(0.0, 0.0, 0.0), Waypoint::new(4.0, 0.0, 0.0)],
            alpha: 1.0,
            sample_count: 2000,
            path_type: PathType::QuinticHermite,
            backwards: false,
            tolerance: DEFAULT_TOLERANCE,
        };
        let traj = TankTrajectory::generate(&SPECS, &params).unwrap();

        let start = traj.get(0.0).unwrap();
        assert_abs_diff_eq!(start.left_pos_m, 0.0, epsilon = 1e-9);
        assert_abs_diff_eq!(start.heading_rad, 0.0, epsilon = 1e-9);

        let end = end(&traj);
        assert_abs_diff_eq!(end.left_pos_m, 4.0, epsilon = 1e-3);
        assert_abs_diff_eq!(end.right_pos_m, 4.0, epsilon = 1e-3);
        assert_abs_diff_eq!(end.left_vel_ms, 0.0, epsilon = 1e-6);
        assert!(!end.backwards);
    }

    #[test]
    fn test_arc_wheels() {
        let traj = TankTrajectory::from_path(arc(), &SPECS, 2000).unwrap();
        let len = traj.path().unwrap().length_m().unwrap();

        let end = end(&traj);
        assert!(end.right_pos_m > end.left_pos_m);
        assert_abs_diff_eq!(end.center().pos_m, len, epsilon = 1e-6);
        assert_abs_diff_eq!(ang_dist(end.heading_rad, PI), 0.0, epsilon = 1e-6);

        // Roughly the inner and outer radii
        assert_abs_diff_eq!(end.left_pos_m, 0.75 * FRAC_PI_2, epsilon = 0.02);
        assert_abs_diff_eq!(end.right_pos_m, 1.25 * FRAC_PI_2, epsilon = 0.02);

        // No wheel exceeds the robot's limits
        let n = 500;
        for i in 0..=n {
            let m = traj.get(traj.total_time() * i as f64 / n as f64).unwrap();
            assert!(m.left_vel_ms.abs() <= SPECS.max_vel_ms + 1e-6);
            assert!(m.right_vel_ms.abs() <= SPECS.max_vel_ms + 1e-6);
            assert!(m.right_accel_mss.abs() <= SPECS.max_accel_mss + 1e-6);
        }
    }

    #[test]
    fn test_retrace() {
        let traj = TankTrajectory::from_path(arc(), &SPECS, 2000).unwrap();
        let back = traj.retrace().unwrap();

        assert!(back.is_backwards());
        assert_abs_diff_eq!(
            ang_dist(back.init_heading_rad(), end(&traj).heading_rad),
            0.0,
            epsilon = 1e-6
        );

        // Each wheel rolls back over the distance it covered
        let fwd_end = end(&traj);
        let back_end = end(&back);
        assert_abs_diff_eq!(back_end.left_pos_m, -fwd_end.left_pos_m, epsilon = 1e-3);
        assert_abs_diff_eq!(back_end.right_pos_m, -fwd_end.right_pos_m, epsilon = 1e-3);
        assert_abs_diff_eq!(
            ang_dist(back_end.heading_rad, traj.init_heading_rad()),
            0.0,
            epsilon = 1e-6
        );
    }

    #[test]
    fn test_mirrors() {
        let traj = TankTrajectory::from_path(arc(), &SPECS, 2000).unwrap();

        let lr = traj.mirror_left_right().unwrap();
        let lr_end = end(&lr);
        let fwd_end = end(&traj);
        assert!(!lr.is_backwards());
        assert_abs_diff_eq!(lr_end.left_pos_m, fwd_end.right_pos_m, epsilon = 1e-3);
        assert_abs_diff_eq!(lr_end.right_pos_m, fwd_end.left_pos_m, epsilon = 1e-3);

        let fb = traj.mirror_front_back().unwrap();
        assert!(fb.is_backwards());
        assert_abs_diff_eq!(
            ang_dist(fb.init_heading_rad(), traj.init_heading_rad()),
            0.0,
            epsilon = 1e-9
        );
        assert!(end(&fb).center().pos_m < 0.0);
    }

    #[test]
    fn test_point_turn() {
        let traj = TankTrajectory::point_turn(&SPECS, FRAC_PI_2, 0.0).unwrap();

        let end = end(&traj);
        assert_abs_diff_eq!(end.left_pos_m, -FRAC_PI_4 * 0.5, epsilon = 1e-6);
        assert_abs_diff_eq!(end.right_pos_m, FRAC_PI_4 * 0.5, epsilon = 1e-6);
        assert_abs_diff_eq!(end.heading_rad, FRAC_PI_2, epsilon = 1e-6);
        assert_abs_diff_eq!(end.center().pos_m, 0.0, epsilon = 1e-9);

        let mirrored = traj.mirror_left_right().unwrap();
        assert_abs_diff_eq!(
            mirrored.get(mirrored.total_time()).unwrap().heading_rad,
            -FRAC_PI_2,
            epsilon = 1e-6
        );

        let back = traj.retrace().unwrap();
        assert_abs_diff_eq!(back.init_heading_rad(), FRAC_PI_2, epsilon = 1e-9);
        assert_abs_diff_eq!(
            back.get(back.total_time()).unwrap().heading_rad,
            0.0,
            epsilon = 1e-6
        );
    }

    #[test]
    fn test_straight_drive() {
        let traj = TankTrajectory::straight(&SPECS, -2.0, 0.3).unwrap();

        assert!(traj.is_backwards());
        let end = end(&traj);
        assert_abs_diff_eq!(end.left_pos_m, -2.0, epsilon = 1e-6);
        assert_abs_diff_eq!(end.right_pos_m, -2.0, epsilon = 1e-6);
        assert_abs_diff_eq!(end.heading_rad, 0.3, epsilon = 1e-9);
        assert!(traj.profile().is_reversed());
    }

    #[test]
    fn test_dynamic_update() {
        let mut traj = TankTrajectory::straight(&SPECS, 2.0, 0.0).unwrap();
        let planned = traj.get(1.0).unwrap();

        let behind = ProfileState {
            pos_m: planned.left_pos_m - 0.05,
            vel_ms: planned.left_vel_ms,
            accel_mss: 0.0,
        };
        let overshoot = traj
            .as_dynamic()
            .unwrap()
            .update(1.0, &behind, &behind)
            .unwrap();

        assert!(!overshoot);
        let now = traj.get(1.0).unwrap();
        assert_abs_diff_eq!(now.left_pos_m, behind.pos_m, epsilon = 1e-9);
        assert_abs_diff_eq!(end(&traj).left_pos_m, 2.0, epsilon = 1e-6);
    }

    #[test]
    fn test_backwards_update_frame() {
        let path = arc().with_backwards(true);
        let mut traj = TankTrajectory::from_path(path, &SPECS, 1000).unwrap();
        let planned = traj.get(0.5).unwrap();

        let left = ProfileState {
            pos_m: planned.left_pos_m,
            vel_ms: planned.left_vel_ms,
            accel_mss: planned.left_accel_mss,
        };
        let right = ProfileState {
            pos_m: planned.right_pos_m,
            vel_ms: planned.right_vel_ms,
            accel_mss: planned.right_accel_mss,
        };

        // Feeding back the planned state keeps the plan where it was
        traj.update(0.5, &left, &right).unwrap();
        let now = traj.get(0.5).unwrap();
        assert_abs_diff_eq!(now.left_pos_m, planned.left_pos_m, epsilon = 1e-6);
        assert_abs_diff_eq!(now.right_pos_m, planned.right_pos_m, epsilon = 1e-6);
        assert!(planned.left_pos_m < 0.0);
    }

    #[test]
    fn test_invalid_specs() {
        let specs = RobotSpecs {
            max_vel_ms: -1.0,
            ..SPECS
        };
        assert!(matches!(
            TankTrajectory::straight(&specs, 1.0, 0.0),
            Err(TrajError::InvalidSpecs(_))
        ));
    }

    #[test]
    fn test_tolerance_carried_through() {
        let params = TrajParams {
            waypoints: vec![Waypoint::new(0.0, 0.0, 0.0), Waypoint::new(2.0, 0.0, 0.0)],
            alpha: 1.0,
            sample_count: 1000,
            path_type: PathType::QuinticHermite,
            backwards: false,
            tolerance: 0.01,
        };
        let traj = TankTrajectory::generate(&SPECS, &params).unwrap();
        let total = traj.total_time();

        assert_eq!(traj.profile().tolerance(), 0.01);
        assert!(traj.get(total + 0.005).is_ok());
        assert!(traj.get(total + 0.05).is_err());

        // Transforms keep the tolerance they were planned with
        assert_eq!(traj.retrace().unwrap().profile().tolerance(), 0.01);
        assert_eq!(traj.mirror_left_right().unwrap().profile().tolerance(), 0.01);

        let turn = TankTrajectory::point_turn(&SPECS, FRAC_PI_2, 0.0)
            .unwrap()
            .with_tolerance(0.02);
        assert_eq!(turn.mirror_front_back().unwrap().profile().tolerance(), 0.02);
        assert!(turn.get(-0.01).is_ok());
        assert!(turn.get(-0.1).is_err());

        // The default is tight
        let plain = TankTrajectory::straight(&SPECS, 1.0, 0.0).unwrap();
        assert_eq!(plain.profile().tolerance(), DEFAULT_TOLERANCE);
        assert!(plain.get(plain.total_time() + 1e-3).is_err());
    }
}
