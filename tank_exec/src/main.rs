//! Tank drive trajectory executable.
//!
//! Generates a trajectory from the parameter file, then follows it on the
//! simulated drive base in real time.
//!
//! # Outputs
//!
//! Each run creates a new session directory containing:
//!
//!     - `tank_exec.log`, the log file
//!     - `traj.json`, the planned trajectory sampled at the runner period
//!     - `waypoints.json`, the waypoints of the path, if there is one
//!     - `arch/ticks.csv`, one record per follower tick
//!     - `final_pose.json`, the pose of the simulated robot at the end

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use color_eyre::{
    eyre::{eyre, WrapErr},
    Report,
};
use log::{debug, info, warn};
use serde::Deserialize;
use std::{
    path::PathBuf,
    sync::{mpsc, Arc},
    time::Duration,
};
use structopt::StructOpt;

// Internal
use tank_lib::{
    follower::{Follower, FollowerRunner, Gains, MonotonicClock, TickReport},
    sim::{SimDrive, SimParams},
    traj::{Followable, RobotSpecs, TankMoment, TankTrajectory, TrajParams},
};
use util::{
    archive::Archiver,
    logger::{logger_init, LoggerParams},
    session::Session,
};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

#[derive(Debug, StructOpt)]
#[structopt(name = "tank_exec", about = "Follow a tank drive trajectory on a simulated robot")]
struct Opt {
    /// Parameter file to load. If not given `tank_exec.toml` is loaded from
    /// the `params` directory of the software root.
    #[structopt(short, long, parse(from_os_str))]
    params: Option<PathBuf>,

    /// Directory in which the session directory is created.
    #[structopt(long, default_value = "sessions", parse(from_os_str))]
    sessions_dir: PathBuf,

    /// Turn on the spot by this angle instead of following the path.
    #[structopt(long, allow_hyphen_values = true)]
    point_turn_rad: Option<f64>,

    /// Drive in a straight line for this distance instead of following the
    /// path.
    #[structopt(long, allow_hyphen_values = true, conflicts_with = "point-turn-rad")]
    straight_m: Option<f64>,

    /// Mirror the trajectory left to right.
    #[structopt(long)]
    mirror_lr: bool,

    /// Mirror the trajectory front to back.
    #[structopt(long)]
    mirror_fb: bool,

    /// Drive the trajectory in reverse, back to its start.
    #[structopt(long)]
    retrace: bool,
}

#[derive(Debug, Deserialize)]
struct ExecParams {
    logger: LoggerParams,
    specs: RobotSpecs,
    traj: TrajParams,
    #[serde(default)]
    gains: Gains,
    runner: RunnerParams,
    #[serde(default)]
    sim: SimParams,
}

#[derive(Debug, Deserialize)]
struct RunnerParams {
    /// Period between follower ticks.
    ///
    /// Units: seconds
    period_s: f64,

    /// Period between re-basing the trajectory on the measured wheel states,
    /// none to follow the plan open loop.
    ///
    /// Units: seconds
    #[serde(default)]
    update_period_s: Option<f64>,
}

// ---------------------------------------------------------------------------
// MAIN
// ---------------------------------------------------------------------------

fn main() -> Result<(), Report> {
    color_eyre::install()?;

    let opt = Opt::from_args();

    // ---- EARLY INITIALISATION ----

    let session = Session::new("tank_exec", &opt.sessions_dir)
        .wrap_err("Failed to create the session")?;

    let params: ExecParams = match &opt.params {
        Some(path) => util::params::load_path(path),
        None => util::params::load("tank_exec.toml"),
    }
    .wrap_err("Could not load the executable parameters")?;

    logger_init(&params.logger, &session).wrap_err("Failed to initialise logging")?;

    info!("Tank Trajectory Executable\n");
    info!("Session directory: {:?}\n", session.session_root);

    // ---- TRAJECTORY GENERATION ----

    let traj = build_traj(&opt, &params).wrap_err("Failed to generate the trajectory")?;
    info!(
        "Trajectory generated, duration {:.3} s, backwards: {}",
        traj.total_time(),
        traj.is_backwards()
    );

    let plan = sample(&traj, params.runner.period_s).wrap_err("Failed to sample the trajectory")?;
    debug!("Sampled {} planned moments", plan.len());
    session.save("traj.json", plan);
    if let Some(path) = traj.path() {
        session.save("waypoints.json", path.waypoints().to_vec());
    }

    // ---- FOLLOWER INITIALISATION ----

    let clock = MonotonicClock::new();
    let sim = SimDrive::new(params.sim, Arc::new(clock));

    let mut follower = Follower::new(traj, params.gains, sim.drive_io(Box::new(clock)));
    follower
        .set_update_period(params.runner.update_period_s)
        .wrap_err("Invalid trajectory update period")?;

    let (report_tx, report_rx) = mpsc::channel::<TickReport>();
    follower.set_report_sender(report_tx);

    let mut ticks_arch =
        Archiver::from_path(&session, "ticks.csv").wrap_err("Failed to create the tick archive")?;

    // ---- MAIN LOOP ----

    info!("Starting the follower");

    let runner = FollowerRunner::start(follower, params.runner.period_s)
        .wrap_err("Failed to start the follower runner")?;

    // Archive reports as they arrive. The follower keeps the sender, so the
    // channel stays open until the runner is joined.
    loop {
        match report_rx.recv_timeout(Duration::from_millis(100)) {
            Ok(report) => {
                ticks_arch
                    .serialise(report)
                    .wrap_err("Failed to archive a tick report")?;
            }
            Err(mpsc::RecvTimeoutError::Timeout) => {
                if !runner.is_running() {
                    break;
                }
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => break,
        }
    }

    let exit = runner.join().wrap_err("Failed to join the follower runner")?;

    for report in report_rx.try_iter() {
        ticks_arch
            .serialise(report)
            .wrap_err("Failed to archive a tick report")?;
    }
    ticks_arch.flush().wrap_err("Failed to flush the tick archive")?;

    // ---- SHUTDOWN ----

    info!(
        "Follower exited after {} ticks, {} reports archived",
        exit.ticks,
        ticks_arch.num_records()
    );

    if let Some(report) = exit.controller.last_report() {
        info!(
            "Final wheel errors: left {:.4} m, right {:.4} m, heading {:.4} rad",
            report.left_error_m, report.right_error_m, report.heading_error_rad
        );
    }

    let pose = sim.pose();
    info!(
        "Final pose: x {:.4} m, y {:.4} m, heading {:.4} rad",
        pose.x_m, pose.y_m, pose.heading_rad
    );
    session.save("final_pose.json", pose);

    let result = exit.result.wrap_err("Follower failed");
    if result.is_err() {
        warn!("Follower stopped on an error");
    }

    session.exit();

    result
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Build the trajectory selected on the command line and apply the requested
/// transforms.
fn build_traj(opt: &Opt, params: &ExecParams) -> Result<TankTrajectory, Report> {
    let mut traj = match (opt.point_turn_rad, opt.straight_m) {
        (Some(angle_rad), _) => {
            info!("Generating a {:.4} rad point turn", angle_rad);
            TankTrajectory::point_turn(&params.specs, angle_rad, 0.0)?
        }
        (None, Some(distance_m)) => {
            info!("Generating a {:.4} m straight", distance_m);
            TankTrajectory::straight(&params.specs, distance_m, 0.0)?
        }
        (None, None) => {
            info!(
                "Generating a path through {} waypoints",
                params.traj.waypoints.len()
            );
            TankTrajectory::generate(&params.specs, &params.traj)?
        }
    };

    if opt.mirror_lr {
        info!("Mirroring left to right");
        traj = traj.mirror_left_right()?;
    }
    if opt.mirror_fb {
        info!("Mirroring front to back");
        traj = traj.mirror_front_back()?;
    }
    if opt.retrace {
        info!("Retracing");
        traj = traj.retrace()?;
    }

    Ok(traj)
}

/// Sample the trajectory every `period_s` from start to end inclusive.
fn sample<F: Followable>(traj: &F, period_s: f64) -> Result<Vec<TankMoment>, Report> {
    if !(period_s.is_finite() && period_s > 0.0) {
        return Err(eyre!(
            "Sample period must be positive, got {}",
            period_s
        ));
    }

    let total_s = traj.total_time();
    let count = (total_s / period_s).ceil() as usize;

    (0..=count)
        .map(|i| {
            let t = (i as f64 * period_s).min(total_s);
            traj.get(t).map_err(Report::from)
        })
        .collect()
}
