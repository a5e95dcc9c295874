//! Follower state machine

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{debug, info, trace, warn};
use serde::Serialize;
use std::sync::mpsc::Sender;
use util::{maths::ang_dist, module::Cyclic};

// Internal
use super::{DirectionSource, DistanceSource, Gains, Motor, TimestampSource};
use crate::{
    profile::ProfileState,
    traj::{Followable, TrajError},
};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// The devices a follower drives and reads.
pub struct DriveIo {
    pub clock: Box<dyn TimestampSource + Send>,

    pub left_motor: Box<dyn Motor + Send>,
    pub right_motor: Box<dyn Motor + Send>,

    pub left_encoder: Box<dyn DistanceSource + Send>,
    pub right_encoder: Box<dyn DistanceSource + Send>,

    /// Optional heading sensor, enables heading correction.
    pub gyro: Option<Box<dyn DirectionSource + Send>>,
}

/// Tracks a [`Followable`] with a tank drive, using feedforward on the target
/// velocity and acceleration plus PD feedback on the wheel positions.
pub struct Follower<F: Followable> {
    followable: F,
    gains: Gains,
    io: DriveIo,

    /// If set, how often the measured state is fed back into a dynamic
    /// followable.
    update_period_s: Option<f64>,

    state: FollowerState,

    init_time_s: f64,
    last_time_s: f64,

    last_left_error_m: f64,
    last_right_error_m: f64,

    /// Gyro reading at initialisation.
    init_heading_rad: f64,

    /// Relative time of the last dynamic update.
    last_update_s: f64,

    last_left_m: f64,
    last_right_m: f64,

    /// Wheel velocities differentiated from the encoders.
    left_vel_ms: f64,
    right_vel_ms: f64,

    report_tx: Option<Sender<TickReport>>,
    last_report: Option<TickReport>,
}

/// Everything the follower computed in one tick.
///
/// Flat so it can be archived as a CSV record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct TickReport {
    /// Time since the follower was initialised
    pub time_s: f64,

    pub left_target_m: f64,
    pub right_target_m: f64,
    pub left_measured_m: f64,
    pub right_measured_m: f64,

    /// `measured - target`
    pub left_error_m: f64,
    pub right_error_m: f64,

    /// Target and measured headings relative to their starting values
    pub heading_target_rad: f64,
    pub heading_measured_rad: f64,
    pub heading_error_rad: f64,

    pub left_output: f64,
    pub right_output: f64,

    /// True if a dynamic update this tick made the plan overshoot
    pub overshoot: bool,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowerState {
    Idle,
    Running,
    Finished,
}

#[derive(Debug, thiserror::Error)]
pub enum FollowerError {
    #[error("Cannot change the follower's configuration while it is running")]
    Running,

    #[error("Trajectory error: {0}")]
    Traj(#[from] TrajError),

    #[error("An update period was set but the followable cannot be updated")]
    NotDynamic,

    #[error("Invalid update period: {0} s")]
    InvalidPeriod(f64),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl<F: Followable> Follower<F> {
    pub fn new(followable: F, gains: Gains, io: DriveIo) -> Self {
        Self {
            followable,
            gains,
            io,
            update_period_s: None,
            state: FollowerState::Idle,
            init_time_s: 0.0,
            last_time_s: 0.0,
            last_left_error_m: 0.0,
            last_right_error_m: 0.0,
            init_heading_rad: 0.0,
            last_update_s: 0.0,
            last_left_m: 0.0,
            last_right_m: 0.0,
            left_vel_ms: 0.0,
            right_vel_ms: 0.0,
            report_tx: None,
            last_report: None,
        }
    }

    /// Reset the sensors and start timing the followable from now.
    ///
    /// Does nothing if the follower is already running.
    pub fn initialize(&mut self) -> Result<(), FollowerError> {
        if self.state == FollowerState::Running {
            return Ok(());
        }

        self.io.left_encoder.reset_distance();
        self.io.right_encoder.reset_distance();

        let now = self.io.clock.now();
        self.init_time_s = now;
        self.last_time_s = now;

        self.last_left_error_m = 0.0;
        self.last_right_error_m = 0.0;
        self.last_update_s = 0.0;
        self.last_left_m = 0.0;
        self.last_right_m = 0.0;
        self.left_vel_ms = 0.0;
        self.right_vel_ms = 0.0;

        self.init_heading_rad = match self.io.gyro.as_mut() {
            Some(g) => g.heading(),
            None => 0.0,
        };

        self.state = FollowerState::Running;

        info!(
            "Follower started, following for {:.3} s",
            self.followable.total_time()
        );

        Ok(())
    }

    /// Process one control tick.
    ///
    /// Initialises the follower if it is idle. Once the followable's time has
    /// elapsed the motors are stopped and further calls do nothing.
    pub fn run(&mut self) -> Result<(), FollowerError> {
        match self.state {
            FollowerState::Finished => return Ok(()),
            FollowerState::Idle => self.initialize()?,
            FollowerState::Running => (),
        }

        let now = self.io.clock.now();
        let time_s = now - self.init_time_s;

        if time_s > self.followable.total_time() {
            self.stop();
            info!("Follower finished after {:.3} s", time_s);
            return Ok(());
        }

        let dt = now - self.last_time_s;

        // Measurements
        let left_m = self.io.left_encoder.distance();
        let right_m = self.io.right_encoder.distance();

        if dt > 0.0 {
            self.left_vel_ms = (left_m - self.last_left_m) / dt;
            self.right_vel_ms = (right_m - self.last_right_m) / dt;
        }

        let overshoot = self.dynamic_update(time_s, left_m, right_m)?;

        let moment = self.followable.get(time_s)?;

        // Wheel feedforward and feedback
        let left_error_m = left_m - moment.left_pos_m;
        let right_error_m = right_m - moment.right_pos_m;

        let mut left_output = self.wheel_output(
            left_error_m,
            self.last_left_error_m,
            dt,
            moment.left_vel_ms,
            moment.left_accel_mss,
        );
        let mut right_output = self.wheel_output(
            right_error_m,
            self.last_right_error_m,
            dt,
            moment.right_vel_ms,
            moment.right_accel_mss,
        );

        // Heading correction
        let heading_target_rad = moment.heading_rad - moment.init_heading_rad;
        let (heading_measured_rad, heading_error_rad) = match self.io.gyro.as_mut() {
            Some(g) => {
                let measured = g.heading() - self.init_heading_rad;
                let error = ang_dist(heading_target_rad, measured);

                left_output += self.gains.k_dp * error;
                right_output -= self.gains.k_dp * error;

                (measured, error)
            }
            None => (0.0, 0.0),
        };

        let left_output = left_output.clamp(-1.0, 1.0);
        let right_output = right_output.clamp(-1.0, 1.0);

        self.io.left_motor.set(left_output);
        self.io.right_motor.set(right_output);

        self.last_time_s = now;
        self.last_left_error_m = left_error_m;
        self.last_right_error_m = right_error_m;
        self.last_left_m = left_m;
        self.last_right_m = right_m;

        let report = TickReport {
            time_s,
            left_target_m: moment.left_pos_m,
            right_target_m: moment.right_pos_m,
            left_measured_m: left_m,
            right_measured_m: right_m,
            left_error_m,
            right_error_m,
            heading_target_rad,
            heading_measured_rad,
            heading_error_rad,
            left_output,
            right_output,
            overshoot,
        };
        self.publish(report);

        Ok(())
    }

    /// Zero the motors and finish.
    pub fn stop(&mut self) {
        self.io.left_motor.set(0.0);
        self.io.right_motor.set(0.0);
        self.state = FollowerState::Finished;
    }

    /// Feedforward plus PD output for one wheel.
    fn wheel_output(
        &self,
        error_m: f64,
        last_error_m: f64,
        dt: f64,
        target_vel_ms: f64,
        target_accel_mss: f64,
    ) -> f64 {
        let deriv = if dt > 0.0 {
            (error_m - last_error_m) / dt - target_vel_ms
        }
        else {
            0.0
        };

        self.gains.k_a * target_accel_mss
            + self.gains.k_v * target_vel_ms
            + self.gains.k_p * error_m
            + self.gains.k_d * deriv
    }

    /// Feed the measured state back into the followable if an update is due.
    fn dynamic_update(
        &mut self,
        time_s: f64,
        left_m: f64,
        right_m: f64,
    ) -> Result<bool, FollowerError> {
        let period_s = match self.update_period_s {
            Some(p) => p,
            None => return Ok(false),
        };

        if time_s - self.last_update_s < period_s {
            return Ok(false);
        }
        self.last_update_s = time_s;

        let left = ProfileState {
            pos_m: left_m,
            vel_ms: self.left_vel_ms,
            accel_mss: 0.0,
        };
        let right = ProfileState {
            pos_m: right_m,
            vel_ms: self.right_vel_ms,
            accel_mss: 0.0,
        };

        let dynamic = self
            .followable
            .as_dynamic()
            .ok_or(FollowerError::NotDynamic)?;
        let overshoot = dynamic.update(time_s, &left, &right)?;

        if overshoot {
            warn!("Dynamic update at {:.3} s overshoots the target", time_s);
        }
        else {
            debug!("Dynamic update at {:.3} s", time_s);
        }

        Ok(overshoot)
    }

    fn publish(&mut self, report: TickReport) {
        trace!("{:?}", report);

        if let Some(tx) = &self.report_tx {
            if tx.send(report).is_err() {
                debug!("Tick report receiver dropped, no longer sending reports");
                self.report_tx = None;
            }
        }

        self.last_report = Some(report);
    }

    // -----------------------------------------------------------------------
    // Configuration
    // -----------------------------------------------------------------------

    fn check_not_running(&self) -> Result<(), FollowerError> {
        match self.state {
            FollowerState::Running => Err(FollowerError::Running),
            _ => Ok(()),
        }
    }

    pub fn set_followable(&mut self, followable: F) -> Result<(), FollowerError> {
        self.check_not_running()?;
        self.followable = followable;
        Ok(())
    }

    pub fn set_gains(&mut self, gains: Gains) -> Result<(), FollowerError> {
        self.check_not_running()?;
        self.gains = gains;
        Ok(())
    }

    pub fn set_clock(&mut self, clock: Box<dyn TimestampSource + Send>) -> Result<(), FollowerError> {
        self.check_not_running()?;
        self.io.clock = clock;
        Ok(())
    }

    pub fn set_motors(
        &mut self,
        left: Box<dyn Motor + Send>,
        right: Box<dyn Motor + Send>,
    ) -> Result<(), FollowerError> {
        self.check_not_running()?;
        self.io.left_motor = left;
        self.io.right_motor = right;
        Ok(())
    }

    pub fn set_encoders(
        &mut self,
        left: Box<dyn DistanceSource + Send>,
        right: Box<dyn DistanceSource + Send>,
    ) -> Result<(), FollowerError> {
        self.check_not_running()?;
        self.io.left_encoder = left;
        self.io.right_encoder = right;
        Ok(())
    }

    pub fn set_gyro(
        &mut self,
        gyro: Option<Box<dyn DirectionSource + Send>>,
    ) -> Result<(), FollowerError> {
        self.check_not_running()?;
        self.io.gyro = gyro;
        Ok(())
    }

    /// Feed the measured state back into the followable every `period_s`.
    ///
    /// The followable must be dynamic.
    pub fn set_update_period(&mut self, period_s: Option<f64>) -> Result<(), FollowerError> {
        self.check_not_running()?;

        if let Some(p) = period_s {
            if !p.is_finite() || p <= 0.0 {
                return Err(FollowerError::InvalidPeriod(p));
            }
            if self.followable.as_dynamic().is_none() {
                return Err(FollowerError::NotDynamic);
            }
        }

        self.update_period_s = period_s;
        Ok(())
    }

    /// Send a report of every tick down the given channel.
    pub fn set_report_sender(&mut self, tx: Sender<TickReport>) {
        self.report_tx = Some(tx);
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn state(&self) -> FollowerState {
        self.state
    }

    pub fn is_finished(&self) -> bool {
        self.state == FollowerState::Finished
    }

    pub fn followable(&self) -> &F {
        &self.followable
    }

    pub fn gains(&self) -> &Gains {
        &self.gains
    }

    pub fn last_report(&self) -> Option<&TickReport> {
        self.last_report.as_ref()
    }
}

impl<F: Followable> Cyclic for Follower<F> {
    type Error = FollowerError;

    fn initialize(&mut self) -> Result<(), Self::Error> {
        Follower::initialize(self)
    }

    fn run(&mut self) -> Result<(), Self::Error> {
        Follower::run(self)
    }

    fn stop(&mut self) {
        Follower::stop(self)
    }

    fn is_finished(&self) -> bool {
        Follower::is_finished(self)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        path::{Path, PathType, Waypoint},
        sim::{ManualClock, SimDrive, SimParams},
        traj::{RobotSpecs, TankMoment, TankTrajectory},
    };
    use approx::assert_abs_diff_eq;
    use std::f64::consts::FRAC_PI_2;
    use std::sync::{mpsc, Arc, Mutex};

    /// A followable which holds every target at zero.
    struct Hold {
        total_s: f64,
    }

    impl Followable for Hold {
        fn total_time(&self) -> f64 {
            self.total_s
        }

        fn get(&self, time_s: f64) -> Result<TankMoment, TrajError> {
            Ok(TankMoment {
                time_s,
                ..Default::default()
            })
        }
    }

    #[derive(Clone, Default)]
    struct Shared(Arc<Mutex<f64>>);

    impl Shared {
        fn get(&self) -> f64 {
            *self.0.lock().unwrap()
        }

        fn put(&self, v: f64) {
            *self.0.lock().unwrap() = v;
        }
    }

    impl Motor for Shared {
        fn set(&mut self, output: f64) {
            self.put(output)
        }
    }

    impl DistanceSource for Shared {
        fn distance(&mut self) -> f64 {
            self.get()
        }

        fn reset_distance(&mut self) {
            self.put(0.0)
        }
    }

    impl DirectionSource for Shared {
        fn heading(&mut self) -> f64 {
            self.get()
        }
    }

    struct Rig {
        clock: ManualClock,
        left_motor: Shared,
        right_motor: Shared,
        left_enc: Shared,
        right_enc: Shared,
        gyro: Shared,
    }

    fn rig<F: Followable>(followable: F, gains: Gains, with_gyro: bool) -> (Follower<F>, Rig) {
        let rig = Rig {
            clock: ManualClock::new(),
            left_motor: Shared::default(),
            right_motor: Shared::default(),
            left_enc: Shared::default(),
            right_enc: Shared::default(),
            gyro: Shared::default(),
        };

        let io = DriveIo {
            clock: Box::new(rig.clock.clone()),
            left_motor: Box::new(rig.left_motor.clone()),
            right_motor: Box::new(rig.right_motor.clone()),
            left_encoder: Box::new(rig.left_enc.clone()),
            right_encoder: Box::new(rig.right_enc.clone()),
            gyro: if with_gyro {
                Some(Box::new(rig.gyro.clone()))
            }
            else {
                None
            },
        };

        (Follower::new(followable, gains, io), rig)
    }

    fn p_only() -> Gains {
        Gains {
            k_p: 1.0,
            ..Default::default()
        }
    }

    #[test]
    fn test_proportional_output() {
        let (mut follower, rig) = rig(Hold { total_s: 10.0 }, p_only(), false);

        follower.initialize().unwrap();
        rig.left_enc.put(5.0);
        rig.right_enc.put(0.25);
        rig.clock.advance(0.1);
        follower.run().unwrap();

        // Saturated at exactly 1
        assert_eq!(rig.left_motor.get(), 1.0);
        assert_abs_diff_eq!(rig.right_motor.get(), 0.25);

        rig.left_enc.put(-5.0);
        rig.clock.advance(0.1);
        follower.run().unwrap();
        assert_eq!(rig.left_motor.get(), -1.0);

        let report = follower.last_report().unwrap();
        assert_abs_diff_eq!(report.left_error_m, -5.0);
        assert_abs_diff_eq!(report.time_s, 0.2, epsilon = 1e-12);
    }

    #[test]
    fn test_derivative_term() {
        let gains = Gains {
            k_d: 1.0,
            ..Default::default()
        };
        let (mut follower, rig) = rig(Hold { total_s: 10.0 }, gains, false);

        // No time has passed on the first tick so there is no derivative
        follower.run().unwrap();
        assert_eq!(rig.left_motor.get(), 0.0);

        // Error grows by 0.05 over 0.1 s
        rig.left_enc.put(0.05);
        rig.clock.advance(0.1);
        follower.run().unwrap();
        assert_abs_diff_eq!(rig.left_motor.get(), 0.5, epsilon = 1e-9);
    }

    #[test]
    fn test_feedforward() {
        let specs = RobotSpecs {
            max_vel_ms: 1.0,
            max_accel_mss: 2.0,
            base_width_m: 0.5,
        };
        let traj = TankTrajectory::straight(&specs, 2.0, 0.0).unwrap();
        let gains = Gains {
            k_v: 0.5,
            k_a: 0.1,
            ..Default::default()
        };
        let (mut follower, rig) = rig(traj, gains, false);

        follower.initialize().unwrap();
        rig.clock.advance(0.25);
        follower.run().unwrap();

        // Accelerating at 2 m/s^2, 0.5 m/s after 0.25 s
        assert_abs_diff_eq!(rig.left_motor.get(), 0.5 * 0.5 + 0.1 * 2.0, epsilon = 1e-9);
        assert_abs_diff_eq!(rig.right_motor.get(), 0.5 * 0.5 + 0.1 * 2.0, epsilon = 1e-9);
    }

    #[test]
    fn test_heading_correction() {
        let gains = Gains {
            k_dp: 0.5,
            ..Default::default()
        };
        let (mut follower, rig) = rig(Hold { total_s: 10.0 }, gains, true);

        rig.gyro.put(1.0);
        follower.initialize().unwrap();

        // Turned 0.2 rad left of the target
        rig.gyro.put(1.2);
        rig.clock.advance(0.1);
        follower.run().unwrap();

        assert_abs_diff_eq!(rig.left_motor.get(), 0.1, epsilon = 1e-9);
        assert_abs_diff_eq!(rig.right_motor.get(), -0.1, epsilon = 1e-9);
        assert_abs_diff_eq!(follower.last_report().unwrap().heading_error_rad, 0.2, epsilon = 1e-9);
    }

    #[test]
    fn test_lifecycle() {
        let (mut follower, rig) = rig(Hold { total_s: 1.0 }, p_only(), false);
        assert_eq!(follower.state(), FollowerState::Idle);

        follower.run().unwrap();
        assert_eq!(follower.state(), FollowerState::Running);

        // Configuration is locked while running
        assert!(matches!(follower.set_gains(Gains::default()), Err(FollowerError::Running)));
        assert!(matches!(
            follower.set_followable(Hold { total_s: 2.0 }),
            Err(FollowerError::Running)
        ));
        assert!(matches!(follower.set_gyro(None), Err(FollowerError::Running)));

        rig.left_enc.put(0.5);
        rig.clock.advance(1.5);
        follower.run().unwrap();
        assert!(follower.is_finished());
        assert_eq!(rig.left_motor.get(), 0.0);

        // Running after finishing doesn't restart
        let init = rig.clock.now();
        rig.clock.advance(0.1);
        follower.run().unwrap();
        assert!(follower.is_finished());
        assert_eq!(rig.left_motor.get(), 0.0);

        // An explicit initialise does
        follower.set_gains(Gains::default()).unwrap();
        follower.initialize().unwrap();
        assert_eq!(follower.state(), FollowerState::Running);
        assert_eq!(rig.left_enc.get(), 0.0);
        assert!(rig.clock.now() > init);
    }

    #[test]
    fn test_update_period_requires_dynamic() {
        let (mut follower, _rig) = rig(Hold { total_s: 1.0 }, p_only(), false);

        assert!(matches!(
            follower.set_update_period(Some(0.1)),
            Err(FollowerError::NotDynamic)
        ));
        assert!(follower.set_update_period(None).is_ok());
    }

    #[test]
    fn test_reports() {
        let (mut follower, rig) = rig(Hold { total_s: 1.0 }, p_only(), false);
        let (tx, rx) = mpsc::channel();
        follower.set_report_sender(tx);

        follower.run().unwrap();
        rig.clock.advance(0.1);
        follower.run().unwrap();

        let reports: Vec<TickReport> = rx.try_iter().collect();
        assert_eq!(reports.len(), 2);
        assert_abs_diff_eq!(reports[1].time_s, 0.1, epsilon = 1e-12);

        // A dropped receiver doesn't stop the follower
        drop(rx);
        rig.clock.advance(0.1);
        assert!(follower.run().is_ok());
    }

    /// Gains for the simulated drive, feedforward matched to the plant.
    fn sim_gains(sim: &SimParams) -> Gains {
        Gains {
            k_v: 1.0 / sim.max_wheel_speed_ms,
            k_a: sim.time_constant_s / sim.max_wheel_speed_ms,
            k_p: -2.0,
            k_d: 0.0,
            k_dp: 0.5,
        }
    }

    fn sim_follower<F: Followable>(
        followable: F,
        sim_params: SimParams,
    ) -> (Follower<F>, SimDrive, ManualClock) {
        let clock = ManualClock::new();
        let drive = SimDrive::new(sim_params, Arc::new(clock.clone()));
        let io = drive.drive_io(Box::new(clock.clone()));

        (Follower::new(followable, sim_gains(&sim_params), io), drive, clock)
    }

    fn sim_params() -> SimParams {
        SimParams {
            max_wheel_speed_ms: 2.0,
            time_constant_s: 0.05,
            base_width_m: 0.5,
            ..Default::default()
        }
    }

    #[test]
    fn test_follow_straight_in_sim() {
        let specs = RobotSpecs {
            max_vel_ms: 1.0,
            max_accel_mss: 2.0,
            base_width_m: 0.5,
        };
        let traj = TankTrajectory::straight(&specs, 2.0, 0.0).unwrap();
        let (mut follower, drive, clock) = sim_follower(traj, sim_params());

        for _ in 0..2000 {
            if follower.is_finished() {
                break;
            }
            follower.run().unwrap();
            clock.advance(0.01);
        }
        assert!(follower.is_finished());

        let (left, right) = drive.wheel_distances();
        assert_abs_diff_eq!(left, 2.0, epsilon = 0.05);
        assert_abs_diff_eq!(right, 2.0, epsilon = 0.05);
    }

    #[test]
    fn test_follow_arc_in_sim_with_updates() {
        let specs = RobotSpecs {
            max_vel_ms: 1.0,
            max_accel_mss: 2.0,
            base_width_m: 0.5,
        };
        let path = Path::new(
            vec![
                Waypoint::new(0.0, 0.0, 0.0),
                Waypoint::new(1.5, 1.5, FRAC_PI_2),
            ],
            2.0,
            PathType::QuinticHermite,
        )
        .unwrap();
        let traj = TankTrajectory::from_path(path, &specs, 2000).unwrap();
        let (mut follower, drive, clock) = sim_follower(traj, sim_params());
        follower.set_update_period(Some(0.1)).unwrap();

        for _ in 0..2000 {
            if follower.is_finished() {
                break;
            }
            follower.run().unwrap();
            clock.advance(0.01);
        }
        assert!(follower.is_finished());

        let pose = drive.pose();
        assert_abs_diff_eq!(pose.heading_rad, FRAC_PI_2, epsilon = 0.1);
        assert_abs_diff_eq!(pose.x_m, 1.5, epsilon = 0.1);
        assert_abs_diff_eq!(pose.y_m, 1.5, epsilon = 0.1);
    }
}
