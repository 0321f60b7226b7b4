use crate::geometry::{is_to_the_right, Vec2};
use crate::types::PairTable;

/// Circle enclosing the bases of one loop.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct LoopBox {
    pub center: Vec2,
    pub radius: f64,
}

impl LoopBox {
    /// Place the loop opened by the pair at `start` on the side of its
    /// closing pair that the baseline drawing bends towards.
    pub fn build(pt: &PairTable, coords: &[Vec2], start: usize, radius: f64) -> Self {
        let current = coords[start];
        let next = coords[start + 1];
        let last = coords[pt.partner(start)];
        let dir = if is_to_the_right(current, next, last) { 1.0 } else { -1.0 };

        let pair = current - last;
        let center_dist = (radius * radius - 0.25 * pair.length_squared()).sqrt();
        Self {
            center: last + pair * 0.5 + pair.normal() * (dir * center_dist),
            radius,
        }
    }

    pub fn translate(&mut self, v: Vec2) {
        self.center += v;
    }
}

/// A bulge base as seen from its stem's frame: the side of the stem it
/// sticks out on and the positions of it and its neighbours along `a`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Bulge {
    /// +1 for the 5' strand, -1 for the 3' strand.
    pub side: f64,
    pub prev: f64,
    pub this: f64,
    pub next: f64,
}

/// Oriented rectangle around a stem.
///
/// `a` points from the stem's outer end into its loop, `b` from the 3'
/// strand to the 5' strand. The half extents are `half_length` along `a`
/// and `half_width` along `b`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StemBox {
    pub a: Vec2,
    pub b: Vec2,
    pub c: Vec2,
    pub half_length: f64,
    pub half_width: f64,
    pub bulges: Vec<Bulge>,
    /// How far a bulge apex sits outside the rectangle.
    pub bulge_dist: f64,
}

impl StemBox {
    /// Rectangle spanned by the first base `s`, the innermost 5' base `e`
    /// and the partner `sp` of `s`. Carries no bulges.
    pub fn from_corners(s: Vec2, e: Vec2, sp: Vec2) -> Self {
        let mut a = (e - s) * 0.5;
        let b = (s - sp) * 0.5;
        let mut len_a = a.length();
        let len_b = b.length();
        if len_a == 0.0 {
            // Single-pair stem: borrow a direction from b.
            len_a = 0.1;
            a = b.normal() * len_a;
        }
        Self {
            a: a * (1.0 / len_a),
            b: b * (1.0 / len_b),
            c: s + a - b,
            half_length: len_a,
            half_width: len_b,
            bulges: Vec::new(),
            bulge_dist: 0.0,
        }
    }

    /// Stem from `stem_start` up to the loop opened at `loop_start`,
    /// bulges included.
    pub fn build(
        pt: &PairTable,
        coords: &[Vec2],
        stem_start: usize,
        loop_start: usize,
        bulge_dist: f64,
    ) -> Self {
        let mut stem = Self::from_corners(
            coords[stem_start],
            coords[loop_start],
            coords[pt.partner(stem_start)],
        );
        stem.bulge_dist = bulge_dist;

        let left = (stem_start..loop_start).map(|i| (i, 1.0));
        let right = (pt.partner(loop_start)..pt.partner(stem_start)).map(|i| (i, -1.0));
        let bulges = left
            .chain(right)
            .filter(|&(i, _)| !pt.is_paired(i))
            .map(|(i, side)| Bulge {
                side,
                prev: stem.coordinate_along(coords[i - 1]),
                this: stem.coordinate_along(coords[i]),
                next: stem.coordinate_along(coords[i + 1]),
            })
            .collect();
        stem.bulges = bulges;
        stem
    }

    /// Coordinate of `p` along `a` in the stem's own frame.
    fn coordinate_along(&self, p: Vec2) -> f64 {
        let (a, b) = (self.a, self.b);
        let p = p - self.c;
        if b.x == 0.0 {
            p.x / a.x
        } else if b.y == 0.0 {
            p.y / a.y
        } else {
            (p.x * b.y - p.y * b.x) / (a.x * b.y - a.y * b.x)
        }
    }

    /// Corners `[A, B, C, D]`: A and B on the 5' side, B and C at the loop end.
    pub fn corners(&self) -> [Vec2; 4] {
        let ea = self.a * self.half_length;
        let eb = self.b * self.half_width;
        [
            self.c - ea + eb,
            self.c + ea + eb,
            self.c + ea - eb,
            self.c - ea - eb,
        ]
    }

    /// Triangle `[prev, apex, next]` of a bulge, with the apex pushed
    /// `extra` further out.
    pub fn bulge_points(&self, index: usize, extra: f64) -> [Vec2; 3] {
        let bulge = &self.bulges[index];
        let side = self.b * bulge.side;
        [
            self.c + self.a * bulge.prev + side * self.half_width,
            self.c + self.a * bulge.this + side * (self.half_width + extra + self.bulge_dist),
            self.c + self.a * bulge.next + side * self.half_width,
        ]
    }

    /// Final position of a bulge base.
    pub fn bulge_apex(&self, index: usize) -> Vec2 {
        self.bulge_points(index, 0.0)[1]
    }

    /// Point of the rectangle closest to `p`.
    pub fn closest_point(&self, p: Vec2) -> Vec2 {
        let d = p - self.c;
        let along = d.dot(self.a).clamp(-self.half_length.abs(), self.half_length.abs());
        let across = d.dot(self.b).clamp(-self.half_width.abs(), self.half_width.abs());
        self.c + self.a * along + self.b * across
    }

    pub fn translate(&mut self, v: Vec2) {
        self.c += v;
    }
}

/// Axis-aligned box around a node's stem, bulges and loop.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Aabb {
    pub min: Vec2,
    pub max: Vec2,
}

impl Aabb {
    pub fn enclosing(stem: &StemBox, lp: &LoopBox) -> Self {
        let r = Vec2::new(lp.radius, lp.radius);
        let points = stem
            .corners()
            .into_iter()
            .chain([lp.center - r, lp.center + r])
            .chain((0..stem.bulges.len()).map(|i| stem.bulge_apex(i)));

        let mut aabb = Aabb {
            min: Vec2::new(f64::INFINITY, f64::INFINITY),
            max: Vec2::new(f64::NEG_INFINITY, f64::NEG_INFINITY),
        };
        for p in points {
            aabb.min.x = aabb.min.x.min(p.x);
            aabb.min.y = aabb.min.y.min(p.y);
            aabb.max.x = aabb.max.x.max(p.x);
            aabb.max.y = aabb.max.y.max(p.y);
        }
        aabb
    }

    /// Whether the boxes come closer than `margin` on both axes.
    pub fn overlaps(&self, other: &Aabb, margin: f64) -> bool {
        !(self.max.x < other.min.x - margin
            || other.max.x < self.min.x - margin
            || self.max.y < other.min.y - margin
            || other.max.y < self.min.y - margin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq(a: f64, b: f64, tol: f64) -> bool {
        (a - b).abs() < tol
    }

    #[test]
    fn test_stem_from_corners() {
        // Vertical stem: 5' strand at x=100 going up, 3' strand at x=135.
        let stem = StemBox::from_corners(
            Vec2::new(100.0, 100.0),
            Vec2::new(100.0, 175.0),
            Vec2::new(135.0, 100.0),
        );
        assert!(approx_eq(stem.a.x, 0.0, 1e-12) && approx_eq(stem.a.y, 1.0, 1e-12));
        assert!(approx_eq(stem.b.x, -1.0, 1e-12) && approx_eq(stem.b.y, 0.0, 1e-12));
        assert!(approx_eq(stem.c.x, 117.5, 1e-12));
        assert!(approx_eq(stem.c.y, 137.5, 1e-12));
        assert!(approx_eq(stem.half_length, 37.5, 1e-12));
        assert!(approx_eq(stem.half_width, 17.5, 1e-12));

        let [a, b, c, d] = stem.corners();
        assert!(approx_eq(a.x, 100.0, 1e-9) && approx_eq(a.y, 100.0, 1e-9));
        assert!(approx_eq(b.x, 100.0, 1e-9) && approx_eq(b.y, 175.0, 1e-9));
        assert!(approx_eq(c.x, 135.0, 1e-9) && approx_eq(c.y, 175.0, 1e-9));
        assert!(approx_eq(d.x, 135.0, 1e-9) && approx_eq(d.y, 100.0, 1e-9));
    }

    #[test]
    fn test_single_pair_stem_gets_thin_box() {
        let s = Vec2::new(0.0, 0.0);
        let stem = StemBox::from_corners(s, s, Vec2::new(35.0, 0.0));
        assert!(approx_eq(stem.half_length, 0.1, 1e-12));
        assert!(approx_eq(stem.a.length(), 1.0, 1e-12));
    }

    #[test]
    fn test_closest_point_clamps_to_rectangle() {
        let stem = StemBox::from_corners(
            Vec2::new(0.0, 0.0),
            Vec2::new(0.0, 50.0),
            Vec2::new(20.0, 0.0),
        );
        let p = stem.closest_point(Vec2::new(100.0, 25.0));
        assert!(approx_eq(p.x, 20.0, 1e-9) && approx_eq(p.y, 25.0, 1e-9));
        let inside = Vec2::new(5.0, 5.0);
        let q = stem.closest_point(inside);
        assert!(approx_eq(q.x, 5.0, 1e-9) && approx_eq(q.y, 5.0, 1e-9));
    }

    #[test]
    fn test_aabb_overlap_margin() {
        let a = Aabb {
            min: Vec2::new(0.0, 0.0),
            max: Vec2::new(10.0, 10.0),
        };
        let b = Aabb {
            min: Vec2::new(20.0, 0.0),
            max: Vec2::new(30.0, 10.0),
        };
        assert!(!a.overlaps(&b, 5.0));
        assert!(a.overlaps(&b, 14.0));
    }
}
