//! Utility maths functions

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use nalgebra::Vector2;
use num_traits::{Float, FloatConst};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Values below this magnitude are treated as zero by the polynomial solvers.
const ROOT_EPSILON: f64 = 1e-12;

// ---------------------------------------------------------------------------
// SCALAR FUNCTIONS
// ---------------------------------------------------------------------------

/// Compare two values for equality within an absolute tolerance.
pub fn float_eq<T>(a: T, b: T, tolerance: T) -> bool
where
    T: Float
{
    (a - b).abs() <= tolerance
}

/// Linear interpolation between `a` and `b`, `f` being the fraction of the
/// way from `a` to `b`.
pub fn lerp<T>(a: T, b: T, f: T) -> T
where
    T: Float
{
    a + (b - a) * f
}

/// Calculates the least nonnegative remainder of `lhs (mod rhs)`.
///
/// This function is taken from the std library as num is missing it.
///
/// In particular, the return value `r` satisfies `0.0 <= r < rhs.abs()` in
/// most cases. However, due to a floating point round-off error it can
/// result in `r == rhs.abs()`, violating the mathematical definition, if
/// `self` is much smaller than `rhs.abs()` in magnitude and `self < 0.0`.
pub fn rem_euclid<T>(lhs: T, rhs: T) -> T
where
    T: Float
{
    let r = lhs % rhs;
    if r < T::zero() { r + rhs.abs() } else { r }
}

/// Map an angle into the range `(-pi, pi]`.
pub fn normalise_angle<T>(angle: T) -> T
where
    T: Float + FloatConst
{
    let pi_t = T::PI();
    let tau_t = pi_t + pi_t;

    let wrapped = rem_euclid(angle + pi_t, tau_t) - pi_t;

    // rem_euclid maps onto [0, tau) so -pi is the only value needing a flip
    if wrapped <= -pi_t {
        wrapped + tau_t
    }
    else {
        wrapped
    }
}

/// Get the shortest signed angular distance to travel from `a` to `b`.
///
/// A positive result is an anticlockwise rotation.
pub fn ang_dist<T>(a: T, b: T) -> T
where
    T: Float + FloatConst
{
    normalise_angle(b - a)
}

/// Interpolate between two angles along the shortest arc.
///
/// The result is normalised into `(-pi, pi]`.
pub fn lerp_angle<T>(a: T, b: T, f: T) -> T
where
    T: Float + FloatConst
{
    normalise_angle(a + ang_dist(a, b) * f)
}

// ---------------------------------------------------------------------------
// POLYNOMIAL ROOTS
// ---------------------------------------------------------------------------

/// Find the real roots of `a x^2 + b x + c = 0`.
///
/// Roots are returned in ascending order, a repeated root is returned once.
/// If the leading coefficient is zero the linear equation is solved instead.
pub fn solve_quadratic(a: f64, b: f64, c: f64) -> Vec<f64> {
    if a.abs() < ROOT_EPSILON {
        if b.abs() < ROOT_EPSILON {
            return vec![];
        }
        return vec![-c / b];
    }

    let disc = b * b - 4.0 * a * c;

    if disc < -ROOT_EPSILON {
        return vec![];
    }
    if disc <= ROOT_EPSILON {
        return vec![-b / (2.0 * a)];
    }

    // Numerically stable form, avoids cancellation between b and sqrt(disc)
    let sign_b = if b < 0.0 { -1.0 } else { 1.0 };
    let q = -0.5 * (b + sign_b * disc.sqrt());

    let mut roots = if q.abs() < ROOT_EPSILON {
        vec![-b / (2.0 * a)]
    }
    else {
        vec![q / a, c / q]
    };

    roots.sort_by(|x, y| x.partial_cmp(y).unwrap_or(std::cmp::Ordering::Equal));
    roots.dedup_by(|x, y| float_eq(*x, *y, ROOT_EPSILON));
    roots
}

/// Find the real roots of `a x^3 + b x^2 + c x + d = 0`.
///
/// Roots are returned in ascending order with repeated roots merged. If the
/// leading coefficient is zero the quadratic is solved instead.
pub fn solve_cubic(a: f64, b: f64, c: f64, d: f64) -> Vec<f64> {
    if a.abs() < ROOT_EPSILON {
        return solve_quadratic(b, c, d);
    }

    let b = b / a;
    let c = c / a;
    let d = d / a;

    // Substitute x = t - b/3 to get the depressed cubic t^3 + p t + q = 0
    let shift = b / 3.0;
    let p = c - b * b / 3.0;
    let q = 2.0 * b * b * b / 27.0 - b * c / 3.0 + d;

    let disc = q * q / 4.0 + p * p * p / 27.0;

    let mut roots = if disc > ROOT_EPSILON {
        // One real root, Cardano
        let s = disc.sqrt();
        let u = (-q / 2.0 + s).cbrt();
        let v = (-q / 2.0 - s).cbrt();
        vec![u + v - shift]
    }
    else if disc.abs() <= ROOT_EPSILON {
        // A double root and a single root, or a triple root
        let u = (-q / 2.0).cbrt();
        vec![2.0 * u - shift, -u - shift]
    }
    else {
        // Three distinct real roots, trigonometric form (p < 0 here)
        let r = 2.0 * (-p / 3.0).sqrt();
        let phi = ((3.0 * q / (2.0 * p)) * (-3.0 / p).sqrt())
            .clamp(-1.0, 1.0)
            .acos();

        (0..3)
            .map(|k| {
                r * (phi / 3.0 - 2.0 * std::f64::consts::PI * k as f64 / 3.0).cos() - shift
            })
            .collect()
    };

    roots.sort_by(|x, y| x.partial_cmp(y).unwrap_or(std::cmp::Ordering::Equal));
    roots.dedup_by(|x, y| float_eq(*x, *y, 1e-9));
    roots
}

// ---------------------------------------------------------------------------
// VECTOR FUNCTIONS
// ---------------------------------------------------------------------------

/// Build a vector from its magnitude and angle to the +ve x axis.
pub fn polar(magnitude: f64, angle_rad: f64) -> Vector2<f64> {
    Vector2::new(magnitude * angle_rad.cos(), magnitude * angle_rad.sin())
}

/// The z component of the cross product of two vectors on the XY plane.
pub fn cross2(a: &Vector2<f64>, b: &Vector2<f64>) -> f64 {
    a[0] * b[1] - a[1] * b[0]
}

/// Rotate a vector by +90 degrees, giving the left hand normal.
pub fn left_normal(v: &Vector2<f64>) -> Vector2<f64> {
    Vector2::new(-v[1], v[0])
}

/// Reflect a point about the line passing through `line_point` with direction
/// `line_dir`.
///
/// `line_dir` does not need to be normalised but must be non-zero.
pub fn reflect(
    point: &Vector2<f64>,
    line_point: &Vector2<f64>,
    line_dir: &Vector2<f64>
) -> Vector2<f64> {
    let dir = line_dir.normalize();
    let rel = point - line_point;

    // Projection onto the line, the reflection is then twice that minus the
    // original offset
    let proj = dir * rel.dot(&dir);

    line_point + proj * 2.0 - rel
}

#[cfg(test)]
mod test {
    use super::*;
    use approx::assert_abs_diff_eq;
    use std::f64::consts::{FRAC_PI_2, FRAC_PI_4, PI};

    #[test]
    fn test_normalise_angle() {
        assert_abs_diff_eq!(normalise_angle(0f64), 0.0);
        assert_abs_diff_eq!(normalise_angle(3.0 * PI), PI, epsilon = 1e-12);
        assert_abs_diff_eq!(normalise_angle(-PI), PI, epsilon = 1e-12);
        assert_abs_diff_eq!(normalise_angle(-FRAC_PI_2 - 2.0 * PI), -FRAC_PI_2, epsilon = 1e-12);
    }

    #[test]
    fn test_ang_dist() {
        assert_abs_diff_eq!(ang_dist(1f64, 2f64), 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(ang_dist(2f64, 1f64), -1.0, epsilon = 1e-12);

        // Crossing the +-pi boundary goes the short way round
        assert_abs_diff_eq!(ang_dist(PI - 0.1, -PI + 0.1), 0.2, epsilon = 1e-12);
        assert_abs_diff_eq!(ang_dist(-PI + 0.1, PI - 0.1), -0.2, epsilon = 1e-12);
    }

    #[test]
    fn test_lerp_angle() {
        assert_abs_diff_eq!(lerp_angle(0f64, FRAC_PI_2, 0.5), FRAC_PI_4, epsilon = 1e-12);
        assert_abs_diff_eq!(lerp_angle(0.3f64, -0.3, 1.0), -0.3, epsilon = 1e-12);

        // Goes through the wrap rather than back through zero
        let mid = lerp_angle(PI - 0.2, -PI + 0.2, 0.5);
        assert_abs_diff_eq!(ang_dist(mid, PI), 0.0, epsilon = 1e-12);

        let quarter = lerp_angle(PI - 0.2, -PI + 0.2, 0.75);
        assert_abs_diff_eq!(quarter, -PI + 0.1, epsilon = 1e-12);
    }

    #[test]
    fn test_lerp() {
        assert_abs_diff_eq!(lerp(2f64, 4f64, 0.25), 2.5);
        assert_abs_diff_eq!(lerp(2f64, 4f64, 1.5), 5.0);
    }

    #[test]
    fn test_solve_quadratic() {
        // (x - 1)(x - 3)
        let roots = solve_quadratic(1.0, -4.0, 3.0);
        assert_eq!(roots.len(), 2);
        assert_abs_diff_eq!(roots[0], 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(roots[1], 3.0, epsilon = 1e-12);

        // (x + 2)^2
        let roots = solve_quadratic(1.0, 4.0, 4.0);
        assert_eq!(roots, vec![-2.0]);

        assert!(solve_quadratic(1.0, 0.0, 1.0).is_empty());

        // Linear fallback
        assert_eq!(solve_quadratic(0.0, 2.0, -4.0), vec![2.0]);
    }

    #[test]
    fn test_solve_cubic() {
        // (x - 1)(x - 2)(x - 3)
        let roots = solve_cubic(1.0, -6.0, 11.0, -6.0);
        assert_eq!(roots.len(), 3);
        assert_abs_diff_eq!(roots[0], 1.0, epsilon = 1e-9);
        assert_abs_diff_eq!(roots[1], 2.0, epsilon = 1e-9);
        assert_abs_diff_eq!(roots[2], 3.0, epsilon = 1e-9);

        // Scaling the coefficients doesn't change the roots
        let roots = solve_cubic(-2.0, 12.0, -22.0, 12.0);
        assert_eq!(roots.len(), 3);
        assert_abs_diff_eq!(roots[1], 2.0, epsilon = 1e-9);

        // x^3 + x + 2 = (x + 1)(x^2 - x + 2)
        let roots = solve_cubic(1.0, 0.0, 1.0, 2.0);
        assert_eq!(roots.len(), 1);
        assert_abs_diff_eq!(roots[0], -1.0, epsilon = 1e-9);

        // (x - 2)^3
        let roots = solve_cubic(1.0, -6.0, 12.0, -8.0);
        assert_eq!(roots.len(), 1);
        assert_abs_diff_eq!(roots[0], 2.0, epsilon = 1e-6);

        // (x - 1)^2 (x + 2) = x^3 - 3x + 2
        let roots = solve_cubic(1.0, 0.0, -3.0, 2.0);
        assert_eq!(roots.len(), 2);
        assert_abs_diff_eq!(roots[0], -2.0, epsilon = 1e-9);
        assert_abs_diff_eq!(roots[1], 1.0, epsilon = 1e-6);

        // Quadratic fallback
        let roots = solve_cubic(0.0, 1.0, -4.0, 3.0);
        assert_eq!(roots.len(), 2);
        assert_abs_diff_eq!(roots[0], 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_reflect() {
        // Reflect about the y axis
        let p = reflect(
            &Vector2::new(2.0, 1.0),
            &Vector2::new(0.0, 0.0),
            &Vector2::new(0.0, 3.0)
        );
        assert_abs_diff_eq!(p[0], -2.0, epsilon = 1e-12);
        assert_abs_diff_eq!(p[1], 1.0, epsilon = 1e-12);

        // Reflect about y = x + 1
        let p = reflect(
            &Vector2::new(1.0, 0.0),
            &Vector2::new(0.0, 1.0),
            &Vector2::new(1.0, 1.0)
        );
        assert_abs_diff_eq!(p[0], -1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(p[1], 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_vector_helpers() {
        let v = polar(2.0, FRAC_PI_2);
        assert_abs_diff_eq!(v[0], 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(v[1], 2.0, epsilon = 1e-12);

        let n = left_normal(&Vector2::new(1.0, 0.0));
        assert_abs_diff_eq!(n[1], 1.0);
        assert_abs_diff_eq!(cross2(&Vector2::new(1.0, 0.0), &n), 1.0);
    }
}
