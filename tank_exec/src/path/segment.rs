//! Spline segments
//!
//! Each segment is a parametric curve over the local parameter `t` in
//! `[0, 1]`. All segment types are evaluated in closed form from their basis
//! polynomials.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use nalgebra::Vector2;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// The type of spline used to join waypoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PathType {
    /// Cubic Bezier curves, built from the same endpoint tangents as the
    /// cubic Hermite.
    Bezier,

    /// Cubic Hermite curves. Second derivatives cannot be constrained so the
    /// path may have small jumps in curvature at the waypoints.
    CubicHermite,

    /// Quintic Hermite curves, second derivative continuous.
    QuinticHermite,
}

/// A single piece of the path between two waypoints.
#[derive(Debug, Clone, PartialEq)]
pub enum SplineSegment {
    Bezier {
        /// The four control points
        control_m: [Vector2<f64>; 4],
    },
    CubicHermite {
        p0: Vector2<f64>,
        p1: Vector2<f64>,
        m0: Vector2<f64>,
        m1: Vector2<f64>,
    },
    QuinticHermite {
        p0: Vector2<f64>,
        p1: Vector2<f64>,
        v0: Vector2<f64>,
        v1: Vector2<f64>,
        a0: Vector2<f64>,
        a1: Vector2<f64>,
    },
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for PathType {
    fn default() -> Self {
        PathType::QuinticHermite
    }
}

impl SplineSegment {
    /// Build a segment of the given type from Hermite endpoint data.
    ///
    /// `p` are the endpoints, `m` the tangents and `a` the second derivatives.
    /// The second derivatives are ignored by the cubic types.
    pub fn from_hermite(
        path_type: PathType,
        p0: Vector2<f64>,
        p1: Vector2<f64>,
        m0: Vector2<f64>,
        m1: Vector2<f64>,
        a0: Vector2<f64>,
        a1: Vector2<f64>,
    ) -> Self {
        match path_type {
            PathType::Bezier => SplineSegment::Bezier {
                control_m: [p0, p0 + m0 / 3.0, p1 - m1 / 3.0, p1],
            },
            PathType::CubicHermite => SplineSegment::CubicHermite { p0, p1, m0, m1 },
            PathType::QuinticHermite => SplineSegment::QuinticHermite {
                p0,
                p1,
                v0: m0,
                v1: m1,
                a0,
                a1,
            },
        }
    }

    /// Position on the segment at local parameter `t`.
    pub fn at(&self, t: f64) -> Vector2<f64> {
        self.eval(t, 0)
    }

    /// First derivative with respect to the local parameter.
    pub fn deriv_at(&self, t: f64) -> Vector2<f64> {
        self.eval(t, 1)
    }

    /// Second derivative with respect to the local parameter.
    pub fn second_deriv_at(&self, t: f64) -> Vector2<f64> {
        self.eval(t, 2)
    }

    /// Evaluate the `order`th derivative, weighting each control vector by the
    /// matching basis function.
    fn eval(&self, t: f64, order: usize) -> Vector2<f64> {
        match self {
            SplineSegment::Bezier { control_m } => {
                let b = bernstein(t, order);
                control_m
                    .iter()
                    .zip(b.iter())
                    .fold(Vector2::zeros(), |acc, (p, w)| acc + p * *w)
            }
            SplineSegment::CubicHermite { p0, p1, m0, m1 } => {
                let h = cubic_hermite(t, order);
                p0 * h[0] + m0 * h[1] + p1 * h[2] + m1 * h[3]
            }
            SplineSegment::QuinticHermite {
                p0,
                p1,
                v0,
                v1,
                a0,
                a1,
            } => {
                let h = quintic_hermite(t, order);
                p0 * h[0] + v0 * h[1] + a0 * h[2] + a1 * h[3] + v1 * h[4] + p1 * h[5]
            }
        }
    }
}

// ---------------------------------------------------------------------------
// BASIS FUNCTIONS
// ---------------------------------------------------------------------------

/// Cubic Bernstein basis (or its derivatives) for control points P0..P3.
fn bernstein(t: f64, order: usize) -> [f64; 4] {
    let u = 1.0 - t;
    match order {
        0 => [u * u * u, 3.0 * u * u * t, 3.0 * u * t * t, t * t * t],
        // B' = 3u^2 (P1 - P0) + 6ut (P2 - P1) + 3t^2 (P3 - P2)
        1 => [
            -3.0 * u * u,
            3.0 * u * u - 6.0 * u * t,
            6.0 * u * t - 3.0 * t * t,
            3.0 * t * t,
        ],
        // B'' = 6u (P2 - 2P1 + P0) + 6t (P3 - 2P2 + P1)
        _ => [
            6.0 * u,
            -12.0 * u + 6.0 * t,
            6.0 * u - 12.0 * t,
            6.0 * t,
        ],
    }
}

/// Cubic Hermite basis ordered as [p0, m0, p1, m1].
fn cubic_hermite(t: f64, order: usize) -> [f64; 4] {
    let t2 = t * t;
    let t3 = t2 * t;
    match order {
        0 => [
            2.0 * t3 - 3.0 * t2 + 1.0,
            t3 - 2.0 * t2 + t,
            -2.0 * t3 + 3.0 * t2,
            t3 - t2,
        ],
        1 => [
            6.0 * t2 - 6.0 * t,
            3.0 * t2 - 4.0 * t + 1.0,
            -6.0 * t2 + 6.0 * t,
            3.0 * t2 - 2.0 * t,
        ],
        _ => [
            12.0 * t - 6.0,
            6.0 * t - 4.0,
            -12.0 * t + 6.0,
            6.0 * t - 2.0,
        ],
    }
}

/// Quintic Hermite basis ordered as [p0, v0, a0, a1, v1, p1].
fn quintic_hermite(t: f64, order: usize) -> [f64; 6] {
    let t2 = t * t;
    let t3 = t2 * t;
    let t4 = t3 * t;
    let t5 = t4 * t;
    match order {
        0 => [
            1.0 - 10.0 * t3 + 15.0 * t4 - 6.0 * t5,
            t - 6.0 * t3 + 8.0 * t4 - 3.0 * t5,
            0.5 * t2 - 1.5 * t3 + 1.5 * t4 - 0.5 * t5,
            0.5 * t3 - t4 + 0.5 * t5,
            -4.0 * t3 + 7.0 * t4 - 3.0 * t5,
            10.0 * t3 - 15.0 * t4 + 6.0 * t5,
        ],
        1 => [
            -30.0 * t2 + 60.0 * t3 - 30.0 * t4,
            1.0 - 18.0 * t2 + 32.0 * t3 - 15.0 * t4,
            t - 4.5 * t2 + 6.0 * t3 - 2.5 * t4,
            1.5 * t2 - 4.0 * t3 + 2.5 * t4,
            -12.0 * t2 + 28.0 * t3 - 15.0 * t4,
            30.0 * t2 - 60.0 * t3 + 30.0 * t4,
        ],
        _ => [
            -60.0 * t + 180.0 * t2 - 120.0 * t3,
            -36.0 * t + 96.0 * t2 - 60.0 * t3,
            1.0 - 9.0 * t + 18.0 * t2 - 10.0 * t3,
            3.0 * t - 12.0 * t2 + 10.0 * t3,
            -24.0 * t + 84.0 * t2 - 60.0 * t3,
            60.0 * t - 180.0 * t2 + 120.0 * t3,
        ],
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn assert_vec_eq(a: Vector2<f64>, b: Vector2<f64>) {
        assert_abs_diff_eq!(a[0], b[0], epsilon = 1e-9);
        assert_abs_diff_eq!(a[1], b[1], epsilon = 1e-9);
    }

    fn all_types(
        p0: Vector2<f64>,
        p1: Vector2<f64>,
        m0: Vector2<f64>,
        m1: Vector2<f64>,
    ) -> Vec<SplineSegment> {
        [PathType::Bezier, PathType::CubicHermite, PathType::QuinticHermite]
            .iter()
            .map(|t| SplineSegment::from_hermite(*t, p0, p1, m0, m1, Vector2::zeros(), Vector2::zeros()))
            .collect()
    }

    #[test]
    fn test_endpoint_constraints() {
        let p0 = Vector2::new(0.0, 0.0);
        let p1 = Vector2::new(3.0, 1.0);
        let m0 = Vector2::new(2.0, 0.0);
        let m1 = Vector2::new(0.0, 2.0);

        for seg in all_types(p0, p1, m0, m1) {
            assert_vec_eq(seg.at(0.0), p0);
            assert_vec_eq(seg.at(1.0), p1);
            assert_vec_eq(seg.deriv_at(0.0), m0);
            assert_vec_eq(seg.deriv_at(1.0), m1);
        }
    }

    #[test]
    fn test_cubic_types_agree() {
        // A Bezier built from Hermite data is the same cubic polynomial
        let p0 = Vector2::new(1.0, -1.0);
        let p1 = Vector2::new(4.0, 2.0);
        let m0 = Vector2::new(1.0, 3.0);
        let m1 = Vector2::new(-2.0, 1.0);
        let segs = all_types(p0, p1, m0, m1);

        for i in 0..=10 {
            let t = i as f64 / 10.0;
            assert_vec_eq(segs[0].at(t), segs[1].at(t));
            assert_vec_eq(segs[0].deriv_at(t), segs[1].deriv_at(t));
            assert_vec_eq(segs[0].second_deriv_at(t), segs[1].second_deriv_at(t));
        }
    }

    #[test]
    fn test_quintic_second_derivative() {
        let a0 = Vector2::new(0.0, 4.0);
        let a1 = Vector2::new(-1.0, 0.5);
        let seg = SplineSegment::from_hermite(
            PathType::QuinticHermite,
            Vector2::new(0.0, 0.0),
            Vector2::new(5.0, 0.0),
            Vector2::new(1.0, 0.0),
            Vector2::new(1.0, 0.0),
            a0,
            a1,
        );

        assert_vec_eq(seg.second_deriv_at(0.0), a0);
        assert_vec_eq(seg.second_deriv_at(1.0), a1);
    }

    #[test]
    fn test_derivatives_match_finite_difference() {
        let h = 1e-6;
        let segs = all_types(
            Vector2::new(0.0, 0.0),
            Vector2::new(2.0, 3.0),
            Vector2::new(4.0, 0.0),
            Vector2::new(0.0, 4.0),
        );

        for seg in segs {
            for i in 1..10 {
                let t = i as f64 / 10.0;
                let fd = (seg.at(t + h) - seg.at(t - h)) / (2.0 * h);
                let fd2 = (seg.deriv_at(t + h) - seg.deriv_at(t - h)) / (2.0 * h);
                assert_abs_diff_eq!(fd[0], seg.deriv_at(t)[0], epsilon = 1e-5);
                assert_abs_diff_eq!(fd[1], seg.deriv_at(t)[1], epsilon = 1e-5);
                assert_abs_diff_eq!(fd2[0], seg.second_deriv_at(t)[0], epsilon = 1e-5);
                assert_abs_diff_eq!(fd2[1], seg.second_deriv_at(t)[1], epsilon = 1e-5);
            }
        }
    }
}
