//! # Trajectory Benchmark

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::f64::consts::FRAC_PI_2;

use tank_lib::{
    path::{Path, PathType, Waypoint},
    traj::{Followable, RobotSpecs, TankTrajectory},
};

fn traj_benchmark(c: &mut Criterion) {
    // ---- Build an S shaped path ----

    let specs = RobotSpecs {
        max_vel_ms: 1.5,
        max_accel_mss: 2.0,
        base_width_m: 0.6,
    };

    let waypoints = vec![
        Waypoint::new(0.0, 0.0, 0.0),
        Waypoint::new(2.0, 1.0, FRAC_PI_2),
        Waypoint::new(0.0, 2.0, -FRAC_PI_2 * 2.0),
        Waypoint::new(-2.0, 3.0, FRAC_PI_2),
        Waypoint::new(0.0, 4.0, 0.0),
    ];

    let path = Path::new(waypoints, 2.0, PathType::QuinticHermite).unwrap();

    c.bench_function("Path::compute_len", |b| {
        b.iter(|| {
            let mut p = path.clone();
            p.compute_len(black_box(10_000)).unwrap()
        })
    });

    c.bench_function("TankTrajectory::from_path", |b| {
        b.iter(|| TankTrajectory::from_path(path.clone(), &specs, black_box(10_000)).unwrap())
    });

    let traj = TankTrajectory::from_path(path, &specs, 10_000).unwrap();
    let total_s = traj.total_time();

    c.bench_function("TankTrajectory::get", |b| {
        let mut t = 0.0;
        b.iter(|| {
            t = (t + 0.01) % total_s;
            traj.get(black_box(t)).unwrap()
        })
    });
}

criterion_group!(benches, traj_benchmark);
criterion_main!(benches);
