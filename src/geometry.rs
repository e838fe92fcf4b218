//! Ellipse fitting and point picking in image space.

use std::f64::consts::{FRAC_PI_2, FRAC_PI_4, PI};

use nalgebra::{Matrix5, Vector5};
use serde::{Deserialize, Serialize};

use crate::error::GeometryError;

/// Screen-space pick radius at zoom 1.0.
pub const PICK_RADIUS: f64 = 10.0;

pub const MIN_FIT_POINTS: usize = 5;

const MAX_ITERATIONS: usize = 500;
const MAX_DAMPING: f64 = 1e12;
const RELATIVE_TOLERANCE: f64 = 1e-14;

// ── Primitives ──────────────────────────────────────────────────────────────

/// A coordinate in image space. Serialized as `[x, y]`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 2]", into = "[f64; 2]")]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance_squared(self, other: Point) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }

    pub fn translated(self, dx: f64, dy: f64) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }
}

impl From<[f64; 2]> for Point {
    fn from([x, y]: [f64; 2]) -> Self {
        Self { x, y }
    }
}

impl From<Point> for [f64; 2] {
    fn from(p: Point) -> Self {
        [p.x, p.y]
    }
}

impl From<(f64, f64)> for Point {
    fn from((x, y): (f64, f64)) -> Self {
        Self { x, y }
    }
}

/// A drawn ellipse: full axis lengths in `size`, rotation in degrees.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Ellipse {
    pub center: Point,
    pub size: (f64, f64),
    pub angle: f64,
}

impl Ellipse {
    pub fn new(center: Point, size: (f64, f64), angle: f64) -> Self {
        Self {
            center,
            size,
            angle,
        }
    }
}

/// Raw optimizer output: semi-axes and rotation in radians.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EllipseParams {
    pub xc: f64,
    pub yc: f64,
    pub a: f64,
    pub b: f64,
    pub theta: f64,
}

impl EllipseParams {
    pub fn to_ellipse(self) -> Ellipse {
        Ellipse {
            center: Point::new(self.xc, self.yc),
            size: (2.0 * self.a, 2.0 * self.b),
            angle: self.theta.to_degrees(),
        }
    }

    fn from_vector(v: &Vector5<f64>) -> Self {
        Self {
            xc: v[0],
            yc: v[1],
            a: v[2],
            b: v[3],
            theta: v[4],
        }
    }
}

// ── Fitting ─────────────────────────────────────────────────────────────────

/// Least-squares ellipse fit over `(xc, yc, a, b, θ)` minimizing the squared
/// algebraic distance, subject to `a >= b`.
///
/// Uses Levenberg-Marquardt with every iterate projected onto the feasible
/// set, so the constraint holds throughout. The first start is the mean
/// centre with the x/y extents as axes and `θ = 0`; three more starts at
/// 45° increments let the solver leave the `a == b` boundary where the
/// rotation gradient vanishes. The lowest-cost result wins, earliest on ties.
pub fn fit_ellipse(points: &[Point]) -> Result<EllipseParams, GeometryError> {
    if points.len() < MIN_FIT_POINTS {
        return Err(GeometryError::TooFewPoints {
            needed: MIN_FIT_POINTS,
            got: points.len(),
        });
    }

    let n = points.len() as f64;
    let mean = Point::new(
        points.iter().map(|p| p.x).sum::<f64>() / n,
        points.iter().map(|p| p.y).sum::<f64>() / n,
    );
    let extent = points
        .iter()
        .map(|p| (p.x - mean.x).abs().max((p.y - mean.y).abs()))
        .fold(0.0_f64, f64::max);
    if !extent.is_finite() || extent <= 0.0 {
        return Err(GeometryError::Degenerate);
    }
    let min_axis = extent * 1e-6;

    let mut best: Option<(f64, Vector5<f64>)> = None;
    for start in 0..4 {
        let theta = start as f64 * FRAC_PI_4;
        let (sin, cos) = theta.sin_cos();
        let (mut a, mut b) = (0.0_f64, 0.0_f64);
        for p in points {
            let (dx, dy) = (p.x - mean.x, p.y - mean.y);
            a = a.max((dx * cos + dy * sin).abs());
            b = b.max((dx * sin - dy * cos).abs());
        }

        let initial = Vector5::new(mean.x, mean.y, a, b, theta);
        let (params, cost) = minimize(points, initial, min_axis);
        log::trace!("ellipse fit start {start}: cost {cost:e}");
        if cost.is_finite() && best.as_ref().map_or(true, |(c, _)| cost < *c) {
            best = Some((cost, params));
        }
    }

    let (_, params) = best.ok_or(GeometryError::Degenerate)?;
    let mut fitted = EllipseParams::from_vector(&params);
    fitted.theta = normalize_angle(fitted.theta);
    Ok(fitted)
}

fn minimize(points: &[Point], initial: Vector5<f64>, min_axis: f64) -> (Vector5<f64>, f64) {
    let mut params = project(initial, min_axis);
    let mut cost = cost(points, &params);
    let mut damping = 1e-3;

    for _ in 0..MAX_ITERATIONS {
        let (jtj, jtr) = normal_equations(points, &params);
        let mut decrease = None;

        while damping < MAX_DAMPING {
            let mut damped = jtj;
            for i in 0..5 {
                damped[(i, i)] += damping * jtj[(i, i)].max(1e-12);
            }
            let Some(chol) = damped.cholesky() else {
                damping *= 10.0;
                continue;
            };
            let candidate = project(params + chol.solve(&(-jtr)), min_axis);
            let candidate_cost = self::cost(points, &candidate);
            if candidate_cost.is_finite() && candidate_cost < cost {
                decrease = Some(cost - candidate_cost);
                params = candidate;
                cost = candidate_cost;
                damping = (damping / 10.0).max(1e-12);
                break;
            }
            damping *= 10.0;
        }

        match decrease {
            Some(d) if d > RELATIVE_TOLERANCE * (1.0 + cost) => {}
            _ => break,
        }
    }

    (params, cost)
}

/// Keeps both axes positive and `a >= b`, moving to the nearest feasible
/// point when violated.
fn project(mut p: Vector5<f64>, min_axis: f64) -> Vector5<f64> {
    p[2] = p[2].max(min_axis);
    p[3] = p[3].max(min_axis);
    if p[2] < p[3] {
        let mid = 0.5 * (p[2] + p[3]);
        p[2] = mid;
        p[3] = mid;
    }
    p
}

fn residual(p: Point, params: &Vector5<f64>) -> (f64, f64, f64) {
    let (sin, cos) = params[4].sin_cos();
    let dx = p.x - params[0];
    let dy = p.y - params[1];
    let u = dx * cos + dy * sin;
    let v = dx * sin - dy * cos;
    let r = (u / params[2]).powi(2) + (v / params[3]).powi(2) - 1.0;
    (r, u, v)
}

fn cost(points: &[Point], params: &Vector5<f64>) -> f64 {
    points.iter().map(|&p| residual(p, params).0.powi(2)).sum()
}

fn normal_equations(points: &[Point], params: &Vector5<f64>) -> (Matrix5<f64>, Vector5<f64>) {
    let (sin, cos) = params[4].sin_cos();
    let (a, b) = (params[2], params[3]);
    let (a2, b2) = (a * a, b * b);

    let mut jtj = Matrix5::zeros();
    let mut jtr = Vector5::zeros();
    for &p in points {
        let (r, u, v) = residual(p, params);
        let row = Vector5::new(
            -2.0 * u / a2 * cos - 2.0 * v / b2 * sin,
            -2.0 * u / a2 * sin + 2.0 * v / b2 * cos,
            -2.0 * u * u / (a2 * a),
            -2.0 * v * v / (b2 * b),
            2.0 * u * v * (1.0 / b2 - 1.0 / a2),
        );
        jtj += row * row.transpose();
        jtr += row * r;
    }
    (jtj, jtr)
}

/// Maps an ellipse rotation into `(-π/2, π/2]`.
fn normalize_angle(theta: f64) -> f64 {
    let t = theta.rem_euclid(PI);
    if t > FRAC_PI_2 {
        t - PI
    } else {
        t
    }
}

// ── Picking ─────────────────────────────────────────────────────────────────

/// Nearest point to `cursor`, if it lies within the pick radius scaled by
/// `1 / zoom`. The first point at the minimum distance wins.
pub fn find_closest_point(points: &[Point], cursor: Point, zoom: f64) -> Option<(usize, Point)> {
    let mut best: Option<(usize, f64)> = None;
    for (i, p) in points.iter().enumerate() {
        let dist = p.distance_squared(cursor);
        if best.map_or(true, |(_, d)| dist < d) {
            best = Some((i, dist));
        }
    }

    let radius = PICK_RADIUS / zoom;
    best.filter(|&(_, d)| d < radius * radius)
        .map(|(i, _)| (i, points[i]))
}

/// `count` evenly spaced points on the ellipse boundary, starting on the
/// major-axis end and turning with the ellipse rotation.
pub fn points_on_ellipse(ellipse: &Ellipse, count: usize) -> Vec<Point> {
    let (sin, cos) = ellipse.angle.to_radians().sin_cos();
    let (ra, rb) = (ellipse.size.0 / 2.0, ellipse.size.1 / 2.0);
    (0..count)
        .map(|k| {
            let t = 2.0 * PI * k as f64 / count as f64;
            let (x, y) = (ra * t.cos(), rb * t.sin());
            Point::new(
                ellipse.center.x + x * cos - y * sin,
                ellipse.center.y + x * sin + y * cos,
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(center: Point, a: f64, b: f64, angle_deg: f64, count: usize) -> Vec<Point> {
        points_on_ellipse(&Ellipse::new(center, (2.0 * a, 2.0 * b), angle_deg), count)
    }

    #[test]
    fn test_fit_recovers_rotated_ellipse() {
        let points = sample(Point::new(120.0, 80.0), 40.0, 20.0, 30.0, 16);
        let fit = fit_ellipse(&points).unwrap();

        assert!((fit.xc - 120.0).abs() < 1e-3, "xc = {}", fit.xc);
        assert!((fit.yc - 80.0).abs() < 1e-3, "yc = {}", fit.yc);
        assert!((fit.a - 40.0).abs() < 1e-3, "a = {}", fit.a);
        assert!((fit.b - 20.0).abs() < 1e-3, "b = {}", fit.b);
        assert!((fit.theta.to_degrees() - 30.0).abs() < 1e-2);
    }

    #[test]
    fn test_fit_recovers_circle() {
        let points = sample(Point::new(50.0, 50.0), 25.0, 25.0, 0.0, 8);
        let fit = fit_ellipse(&points).unwrap();

        assert!((fit.a - 25.0).abs() < 1e-3);
        assert!((fit.b - 25.0).abs() < 1e-3);
        assert!(fit.a >= fit.b);
    }

    #[test]
    fn test_fit_vertical_ellipse_keeps_major_axis_first() {
        // Taller than wide: the x/y extents start with a < b.
        let points = sample(Point::new(0.0, 0.0), 30.0, 10.0, 90.0, 12);
        let fit = fit_ellipse(&points).unwrap();

        assert!(fit.a >= fit.b);
        assert!((fit.a - 30.0).abs() < 1e-2, "a = {}", fit.a);
        assert!((fit.b - 10.0).abs() < 1e-2, "b = {}", fit.b);
        assert!(fit.theta.cos().abs() < 1e-3, "theta = {}", fit.theta);
    }

    #[test]
    fn test_fit_irregular_points_respects_axis_order() {
        let sets = [
            vec![(10.0, 12.0), (31.0, 5.0), (44.0, 20.0), (35.0, 41.0), (12.0, 38.0), (4.0, 22.0)],
            vec![(0.0, 0.0), (3.0, 40.0), (-2.0, 80.0), (6.0, 41.0), (-5.0, 39.0)],
            vec![
                (100.0, 100.0),
                (140.0, 101.0),
                (120.0, 90.0),
                (121.0, 111.0),
                (99.0, 103.0),
                (138.0, 97.0),
                (119.0, 100.0),
            ],
        ];
        for set in sets {
            let points: Vec<Point> = set.into_iter().map(Point::from).collect();
            let fit = fit_ellipse(&points).unwrap();
            assert!(fit.a >= fit.b - 1e-9, "a = {}, b = {}", fit.a, fit.b);
            assert!(fit.b > 0.0);
        }
    }

    #[test]
    fn test_fit_is_reproducible() {
        let points = sample(Point::new(64.0, 48.0), 22.0, 14.0, -20.0, 9);
        assert_eq!(fit_ellipse(&points).unwrap(), fit_ellipse(&points).unwrap());
    }

    #[test]
    fn test_fit_rejects_too_few_points() {
        let points = vec![Point::new(0.0, 0.0); 4];
        assert_eq!(
            fit_ellipse(&points),
            Err(GeometryError::TooFewPoints { needed: 5, got: 4 })
        );
    }

    #[test]
    fn test_fit_rejects_coincident_points() {
        let points = vec![Point::new(3.0, 3.0); 6];
        assert_eq!(fit_ellipse(&points), Err(GeometryError::Degenerate));
    }

    #[test]
    fn test_params_to_ellipse() {
        let e = EllipseParams { xc: 1.0, yc: 2.0, a: 5.0, b: 3.0, theta: FRAC_PI_2 }.to_ellipse();
        assert_eq!(e.center, Point::new(1.0, 2.0));
        assert_eq!(e.size, (10.0, 6.0));
        assert!((e.angle - 90.0).abs() < 1e-12);
    }

    #[test]
    fn test_closest_point_threshold_scales_with_zoom() {
        for zoom in [0.1, 1.0, 25.0] {
            let radius = PICK_RADIUS / zoom;
            let points = [Point::new(0.0, 0.0)];

            let inside = Point::new(radius * 0.99, 0.0);
            assert_eq!(find_closest_point(&points, inside, zoom), Some((0, points[0])));

            let on_edge = Point::new(radius, 0.0);
            assert_eq!(find_closest_point(&points, on_edge, zoom), None);

            let outside = Point::new(radius * 1.5, 0.0);
            assert_eq!(find_closest_point(&points, outside, zoom), None);
        }
    }

    #[test]
    fn test_closest_point_picks_nearest_then_first() {
        let points = [
            Point::new(5.0, 0.0),
            Point::new(2.0, 0.0),
            Point::new(0.0, 2.0),
        ];
        let hit = find_closest_point(&points, Point::new(0.0, 0.0), 1.0);
        assert_eq!(hit, Some((1, Point::new(2.0, 0.0))));
    }

    #[test]
    fn test_closest_point_empty() {
        assert_eq!(find_closest_point(&[], Point::new(0.0, 0.0), 1.0), None);
    }

    #[test]
    fn test_points_on_ellipse_axis_aligned() {
        let e = Ellipse::new(Point::new(96.0, 96.0), (96.0, 96.0), 0.0);
        let pts = points_on_ellipse(&e, 5);
        assert_eq!(pts.len(), 5);
        assert!((pts[0].x - 144.0).abs() < 1e-9);
        assert!((pts[0].y - 96.0).abs() < 1e-9);
        for p in pts {
            assert!((p.distance_squared(e.center) - 48.0 * 48.0).abs() < 1e-6);
        }
    }

    #[test]
    fn test_point_serializes_as_pair() {
        let json = serde_json::to_string(&Point::new(1.5, -2.0)).unwrap();
        assert_eq!(json, "[1.5,-2.0]");
        let back: Point = serde_json::from_str("[3, 4]").unwrap();
        assert_eq!(back, Point::new(3.0, 4.0));
    }
}
