use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign};

pub const TWO_PI: f64 = 2.0 * PI;

/// Tolerance for angle-closure checks and "too small to matter" deltas.
pub const EPSILON_3: f64 = 1e-3;
/// Tolerance for near-zero and parallel checks.
pub const EPSILON_7: f64 = 1e-7;

/// Cut-point queries treat centers and radii closer than this as equal.
const CUT_POINT_EPSILON: f64 = 1.0;

/// A point or direction in the drawing plane.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq)]
pub struct Vec2 {
    pub x: f64,
    pub y: f64,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };

    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn from_angle(angle: f64) -> Self {
        Self::new(angle.cos(), angle.sin())
    }

    pub fn dot(self, other: Vec2) -> f64 {
        self.x * other.x + self.y * other.y
    }

    /// z-component of the 3D cross product.
    pub fn cross(self, other: Vec2) -> f64 {
        self.x * other.y - self.y * other.x
    }

    pub fn length_squared(self) -> f64 {
        self.dot(self)
    }

    pub fn length(self) -> f64 {
        self.length_squared().sqrt()
    }

    pub fn distance(self, other: Vec2) -> f64 {
        (other - self).length()
    }

    pub fn unit(self) -> Vec2 {
        let len = self.length();
        Vec2::new(self.x / len, self.y / len)
    }

    /// Unit normal pointing to the right of `self`.
    pub fn normal(self) -> Vec2 {
        Vec2::new(self.y, -self.x).unit()
    }

    /// Rotate about the origin; positive angles turn clockwise.
    pub fn rotate(self, angle: f64) -> Vec2 {
        self.rotate_around(Vec2::ZERO, angle)
    }

    /// Rotate about `center`; positive angles turn clockwise.
    pub fn rotate_around(self, center: Vec2, angle: f64) -> Vec2 {
        let phi = -angle;
        let (sin, cos) = phi.sin_cos();
        let d = self - center;
        Vec2::new(
            center.x + d.x * cos - d.y * sin,
            center.y + d.x * sin + d.y * cos,
        )
    }

    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl Add for Vec2 {
    type Output = Vec2;
    fn add(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl AddAssign for Vec2 {
    fn add_assign(&mut self, rhs: Vec2) {
        self.x += rhs.x;
        self.y += rhs.y;
    }
}

impl Sub for Vec2 {
    type Output = Vec2;
    fn sub(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl SubAssign for Vec2 {
    fn sub_assign(&mut self, rhs: Vec2) {
        self.x -= rhs.x;
        self.y -= rhs.y;
    }
}

impl Mul<f64> for Vec2 {
    type Output = Vec2;
    fn mul(self, rhs: f64) -> Vec2 {
        Vec2::new(self.x * rhs, self.y * rhs)
    }
}

impl Mul<Vec2> for f64 {
    type Output = Vec2;
    fn mul(self, rhs: Vec2) -> Vec2 {
        rhs * self
    }
}

impl Neg for Vec2 {
    type Output = Vec2;
    fn neg(self) -> Vec2 {
        Vec2::new(-self.x, -self.y)
    }
}

// ── Orientation and angles ──────────────────────────────────────────

/// Whether `point` lies to the right of the directed line `start -> end`.
///
/// Compares the distances from `point` to `end` shifted by the line's normal
/// in both directions; a point on the line counts as "not right".
pub fn is_to_the_right(start: Vec2, end: Vec2, point: Vec2) -> bool {
    let line = end - start;
    let normal = Vec2::new(line.y, -line.x);
    let right = end + normal;
    let left = end - normal;
    (point - right).length_squared() < (point - left).length_squared()
}

/// Same as [`is_to_the_right`] with the line given as anchor plus direction.
pub fn is_to_the_right_of_vector(start: Vec2, direction: Vec2, point: Vec2) -> bool {
    is_to_the_right(start, start + direction, point)
}

/// Unsigned angle in `[0, π]` between two vectors.
pub fn angle_between(v1: Vec2, v2: Vec2) -> f64 {
    let cos = v1.unit().dot(v2.unit());
    if (cos + 1.0).abs() < EPSILON_7 {
        PI
    } else if (cos - 1.0).abs() < EPSILON_7 {
        0.0
    } else {
        cos.acos()
    }
}

/// Unsigned angle at `vertex` spanned by `p1` and `p3`.
pub fn angle_at(p1: Vec2, vertex: Vec2, p3: Vec2) -> f64 {
    angle_between(p1 - vertex, p3 - vertex)
}

/// Angle subtended by a chord of length `distance` on a circle of `radius`.
pub fn distance_to_angle(radius: f64, distance: f64) -> f64 {
    2.0 * (distance / (2.0 * radius)).asin()
}

// ── Solvers ─────────────────────────────────────────────────────────

/// Real roots of a quadratic equation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Roots {
    None,
    One(f64),
    Two(f64, f64),
}

/// Solve `a·x² + b·x + c = 0`.
pub fn solve_quadratic(a: f64, b: f64, c: f64) -> Roots {
    let discr = b * b - 4.0 * a * c;
    if discr < 0.0 {
        return Roots::None;
    }
    let sqrt = discr.sqrt();
    let x1 = (-b + sqrt) / (2.0 * a);
    if discr == 0.0 {
        Roots::One(x1)
    } else {
        Roots::Two(x1, (-b - sqrt) / (2.0 * a))
    }
}

/// Intersection points of two curves.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum CutPoints {
    None,
    One(Vec2),
    Two(Vec2, Vec2),
    /// The circles are (nearly) identical; every point is shared.
    Coincident,
}

impl CutPoints {
    pub fn points(&self) -> Vec<Vec2> {
        match *self {
            CutPoints::None | CutPoints::Coincident => vec![],
            CutPoints::One(p) => vec![p],
            CutPoints::Two(p, q) => vec![p, q],
        }
    }
}

/// Cut points of two circles.
///
/// Centers within one length unit of each other are concentric (no cut
/// points) or, with radii also within one unit, coincident.
pub fn circle_circle_cuts(c1: Vec2, r1: f64, c2: Vec2, r2: f64) -> CutPoints {
    let small_dx = (c1.x - c2.x).abs() < CUT_POINT_EPSILON;
    let small_dy = (c1.y - c2.y).abs() < CUT_POINT_EPSILON;
    if small_dx && small_dy {
        return if (r1 - r2).abs() < CUT_POINT_EPSILON {
            CutPoints::Coincident
        } else {
            CutPoints::None
        };
    }

    let d = c2 - c1;
    let dist = d.length();
    if dist > r1 + r2 || dist < (r1 - r2).abs() {
        return CutPoints::None;
    }

    // Distance from c1 to the radical line, then half the chord length.
    let a = (r1 * r1 - r2 * r2 + dist * dist) / (2.0 * dist);
    let h_sq = r1 * r1 - a * a;
    let dir = d * (1.0 / dist);
    let base = c1 + dir * a;
    if h_sq <= 0.0 {
        return CutPoints::One(base);
    }
    let offset = Vec2::new(-dir.y, dir.x) * h_sq.sqrt();
    CutPoints::Two(base + offset, base - offset)
}

/// Cut points of a circle and the infinite line `anchor + t·direction`.
pub fn circle_line_cuts(center: Vec2, radius: f64, anchor: Vec2, direction: Vec2) -> CutPoints {
    let rel = anchor - center;
    let a = direction.length_squared();
    let b = 2.0 * direction.dot(rel);
    let c = rel.length_squared() - radius * radius;
    match solve_quadratic(a, b, c) {
        Roots::None => CutPoints::None,
        Roots::One(t) => CutPoints::One(anchor + direction * t),
        Roots::Two(t1, t2) => CutPoints::Two(anchor + direction * t1, anchor + direction * t2),
    }
}

/// Circle through three points, or `None` when they are collinear.
pub fn circumcircle(a: Vec2, b: Vec2, c: Vec2) -> Option<(Vec2, f64)> {
    let d = 2.0 * (a.x * (b.y - c.y) + b.x * (c.y - a.y) + c.x * (a.y - b.y));
    if d.abs() < EPSILON_7 {
        return None;
    }
    let a2 = a.length_squared();
    let b2 = b.length_squared();
    let c2 = c.length_squared();
    let center = Vec2::new(
        (a2 * (b.y - c.y) + b2 * (c.y - a.y) + c2 * (a.y - b.y)) / d,
        (a2 * (c.x - b.x) + b2 * (a.x - c.x) + c2 * (b.x - a.x)) / d,
    );
    Some((center, center.distance(a)))
}

// ── Segments and closest points ─────────────────────────────────────

/// Whether segments `a-b` and `x-y` share a point.
///
/// Collinear overlapping segments intersect; merely parallel ones do not.
pub fn segments_intersect(a: Vec2, b: Vec2, x: Vec2, y: Vec2) -> bool {
    let eps = EPSILON_7;
    let (ab_min_x, ab_max_x) = (a.x.min(b.x), a.x.max(b.x));
    let (ab_min_y, ab_max_y) = (a.y.min(b.y), a.y.max(b.y));
    if (x.x < ab_min_x - eps && y.x < ab_min_x - eps)
        || (x.x > ab_max_x + eps && y.x > ab_max_x + eps)
        || (x.y < ab_min_y - eps && y.y < ab_min_y - eps)
        || (x.y > ab_max_y + eps && y.y > ab_max_y + eps)
    {
        return false;
    }

    let ab = b - a;
    let yx = x - y;
    let denominator = ab.cross(yx);
    if denominator.abs() < eps {
        // Parallel: only collinear overlap counts.
        let (sx, sy) = if ab.x.abs() > eps {
            let sx = (x.x - a.x) / ab.x;
            if (a.y + sx * ab.y - x.y).abs() > eps {
                return false;
            }
            (sx, (y.x - a.x) / ab.x)
        } else {
            let sx = (x.y - a.y) / ab.y;
            if (a.x + sx * ab.x - x.x).abs() > eps {
                return false;
            }
            (sx, (y.y - a.y) / ab.y)
        };
        let on_ab = |s: f64| (0.0..=1.0).contains(&s);
        return on_ab(sx) || on_ab(sy) || (sx < 0.0 && sy > 1.0) || (sy < 0.0 && sx > 1.0);
    }

    let ax = a - x;
    let s = yx.cross(ax) / denominator;
    let t = ax.cross(ab) / denominator;
    (0.0..=1.0).contains(&s) && (0.0..=1.0).contains(&t)
}

/// Point on segment `a-b` closest to `p`.
pub fn closest_point_on_segment(a: Vec2, b: Vec2, p: Vec2) -> Vec2 {
    let ab = b - a;
    let len_sq = ab.length_squared();
    if len_sq == 0.0 {
        return a;
    }
    let t = ((p - a).dot(ab) / len_sq).clamp(0.0, 1.0);
    a + ab * t
}

/// Point of triangle `a, b, c` closest to `p`.
///
/// Checks each edge's outward side; exact for acute triangles, which is
/// all bulge geometry ever produces. A point inside is its own answer.
pub fn closest_point_on_triangle(a: Vec2, b: Vec2, c: Vec2, p: Vec2) -> Vec2 {
    for (s, e, opposite) in [(a, b, c), (b, c, a), (c, a, b)] {
        if is_to_the_right(s, e, opposite) != is_to_the_right(s, e, p) {
            return closest_point_on_segment(s, e, p);
        }
    }
    p
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq(a: f64, b: f64, tol: f64) -> bool {
        (a - b).abs() < tol
    }

    #[test]
    fn test_right_of_line() {
        let s = Vec2::new(0.0, 0.0);
        let e = Vec2::new(0.0, 1.0);
        assert!(is_to_the_right(s, e, Vec2::new(1.0, 0.5)));
        assert!(!is_to_the_right(s, e, Vec2::new(-1.0, 0.5)));
        assert!(!is_to_the_right(s, e, Vec2::new(0.0, 3.0)));
    }

    #[test]
    fn test_normal_points_right() {
        let v = Vec2::new(0.0, 2.0);
        let n = v.normal();
        assert!(approx_eq(n.x, 1.0, 1e-12));
        assert!(approx_eq(n.y, 0.0, 1e-12));
        assert!(is_to_the_right_of_vector(Vec2::ZERO, v, n));
    }

    #[test]
    fn test_rotation_is_clockwise() {
        let p = Vec2::new(0.0, 1.0).rotate(PI / 2.0);
        assert!(approx_eq(p.x, 1.0, 1e-12));
        assert!(approx_eq(p.y, 0.0, 1e-12));

        let q = Vec2::new(2.0, 1.0).rotate_around(Vec2::new(1.0, 1.0), PI);
        assert!(approx_eq(q.x, 0.0, 1e-12));
        assert!(approx_eq(q.y, 1.0, 1e-12));
    }

    #[test]
    fn test_angle_between_short_circuits() {
        assert_eq!(angle_between(Vec2::new(1.0, 0.0), Vec2::new(-3.0, 0.0)), PI);
        assert_eq!(angle_between(Vec2::new(1.0, 1.0), Vec2::new(2.0, 2.0)), 0.0);
        let a = angle_at(Vec2::new(1.0, 0.0), Vec2::ZERO, Vec2::new(0.0, 5.0));
        assert!(approx_eq(a, PI / 2.0, 1e-12));
    }

    #[test]
    fn test_chord_angle() {
        let angle = distance_to_angle(10.0, 10.0);
        assert!(approx_eq(angle, PI / 3.0, 1e-12));
        assert!(approx_eq(distance_to_angle(10.0, 20.0), PI, 1e-12));
    }

    #[test]
    fn test_quadratic() {
        assert_eq!(solve_quadratic(1.0, 0.0, 1.0), Roots::None);
        assert_eq!(solve_quadratic(1.0, -2.0, 1.0), Roots::One(1.0));
        assert_eq!(solve_quadratic(1.0, 0.0, -4.0), Roots::Two(2.0, -2.0));
    }

    #[test]
    fn test_circle_circle_cuts() {
        let cuts = circle_circle_cuts(Vec2::ZERO, 5.0, Vec2::new(8.0, 0.0), 5.0);
        let pts = cuts.points();
        assert_eq!(pts.len(), 2);
        for p in pts {
            assert!(approx_eq(p.x, 4.0, 1e-9));
            assert!(approx_eq(p.y.abs(), 3.0, 1e-9));
        }
        assert_eq!(
            circle_circle_cuts(Vec2::ZERO, 5.0, Vec2::new(0.5, 0.2), 5.3),
            CutPoints::Coincident
        );
        assert_eq!(
            circle_circle_cuts(Vec2::ZERO, 5.0, Vec2::new(0.5, 0.2), 9.0),
            CutPoints::None
        );
        assert_eq!(
            circle_circle_cuts(Vec2::ZERO, 1.0, Vec2::new(10.0, 0.0), 1.0),
            CutPoints::None
        );
    }

    #[test]
    fn test_circle_line_cuts() {
        let cuts = circle_line_cuts(Vec2::ZERO, 5.0, Vec2::new(-10.0, 3.0), Vec2::new(1.0, 0.0));
        let mut xs: Vec<f64> = cuts.points().iter().map(|p| p.x).collect();
        xs.sort_by(|a, b| a.total_cmp(b));
        assert_eq!(xs.len(), 2);
        assert!(approx_eq(xs[0], -4.0, 1e-9));
        assert!(approx_eq(xs[1], 4.0, 1e-9));

        let miss = circle_line_cuts(Vec2::ZERO, 1.0, Vec2::new(0.0, 2.0), Vec2::new(1.0, 0.0));
        assert_eq!(miss, CutPoints::None);
    }

    #[test]
    fn test_circumcircle() {
        let (c, r) = circumcircle(
            Vec2::new(1.0, 0.0),
            Vec2::new(0.0, 1.0),
            Vec2::new(-1.0, 0.0),
        )
        .unwrap();
        assert!(approx_eq(c.x, 0.0, 1e-12));
        assert!(approx_eq(c.y, 0.0, 1e-12));
        assert!(approx_eq(r, 1.0, 1e-12));

        let collinear = circumcircle(Vec2::ZERO, Vec2::new(1.0, 1.0), Vec2::new(2.0, 2.0));
        assert!(collinear.is_none());
    }

    #[test]
    fn test_segments_intersect() {
        let a = Vec2::new(0.0, 0.0);
        let b = Vec2::new(2.0, 2.0);
        assert!(segments_intersect(a, b, Vec2::new(0.0, 2.0), Vec2::new(2.0, 0.0)));
        assert!(!segments_intersect(a, b, Vec2::new(3.0, 0.0), Vec2::new(4.0, 1.0)));
        // collinear overlap
        assert!(segments_intersect(a, b, Vec2::new(1.0, 1.0), Vec2::new(3.0, 3.0)));
        // parallel, offset
        assert!(!segments_intersect(a, b, Vec2::new(0.0, 1.0), Vec2::new(1.0, 2.0)));
        // enclosing
        assert!(segments_intersect(
            Vec2::new(0.5, 0.5),
            Vec2::new(1.0, 1.0),
            Vec2::new(-1.0, -1.0),
            Vec2::new(3.0, 3.0)
        ));
    }

    #[test]
    fn test_closest_point_on_triangle() {
        let a = Vec2::new(0.0, 0.0);
        let b = Vec2::new(4.0, 0.0);
        let c = Vec2::new(2.0, 3.0);
        let below = closest_point_on_triangle(a, b, c, Vec2::new(2.0, -5.0));
        assert!(approx_eq(below.x, 2.0, 1e-12));
        assert!(approx_eq(below.y, 0.0, 1e-12));

        let inside = Vec2::new(2.0, 1.0);
        assert_eq!(closest_point_on_triangle(a, b, c, inside), inside);
    }
}
