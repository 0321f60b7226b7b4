use std::f64::consts::{FRAC_PI_2, PI};

use crate::config::{is_bulge_loop, Config};
use crate::geometry::{distance_to_angle, Vec2};
use crate::types::PairTable;

/// Height of the exterior backbone line; base 1 sits at `(EXTERIOR_Y, EXTERIOR_Y)`.
pub const EXTERIOR_Y: f64 = 100.0;

/// Turn applied when entering loops; -1 bends the backbone clockwise.
const DIRECTION: f64 = -1.0;

/// Turtle step leaving a base: the turn before the step and its length.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Step {
    /// Turn (counter-clockwise positive) taken on arrival at this base.
    pub angle: f64,
    /// Length of the step from this base to the next one.
    pub distance: f64,
}

/// Affine description of the baseline drawing: one [`Step`] per base,
/// padded so neighbour lookups past the last base stay in bounds.
///
/// The baseline is only a starting point and does not always close. A
/// hairpin with a single unpaired base turns by less than its pair needs,
/// so the 3' strand of its stem drifts away from the 5' strand and every
/// enclosing pair inherits the offset. Final coordinates are rebuilt from
/// the stem boxes, which puts pairs back at `paired` apart, except that
/// base 1 stays pinned at the start of the exterior line: when it opens a
/// pair, that one pair can come out short.
pub fn compute_affine(
    pt: &PairTable,
    configs: &[Option<Config>],
    paired: f64,
    unpaired: f64,
) -> Vec<Step> {
    let n = pt.len();
    let mut turtle = Turtle {
        pt,
        configs,
        paired,
        unpaired,
        steps: vec![
            Step {
                angle: 0.0,
                distance: unpaired,
            };
            n + 3
        ],
    };
    turtle.walk_exterior();
    turtle.steps
}

/// Integrate turtle steps into Cartesian coordinates, 1-indexed like the table.
pub fn affine_to_cartesian(steps: &[Step], n: usize) -> Vec<Vec2> {
    let mut coords = vec![Vec2::ZERO; n + 1];
    if n == 0 {
        return coords;
    }
    coords[1] = Vec2::new(EXTERIOR_Y, EXTERIOR_Y);
    let mut heading = 0.0;
    for i in 2..=n {
        heading -= steps[i].angle;
        coords[i] = coords[i - 1] + Vec2::from_angle(heading) * steps[i - 1].distance;
    }
    coords
}

struct Turtle<'a> {
    pt: &'a PairTable,
    configs: &'a [Option<Config>],
    paired: f64,
    unpaired: f64,
    steps: Vec<Step>,
}

impl Turtle<'_> {
    fn walk_exterior(&mut self) {
        let n = self.pt.len();
        let mut current = 1;
        let mut dangles = 0;

        while current < n {
            if !self.pt.is_paired(current) {
                current = self.exterior_run(current);
                dangles += 1;
            }
            if current >= n {
                break;
            }

            if current == 1 {
                // Structure opens with a pair: start heading up.
                if dangles < 1 {
                    self.steps[0].angle = -FRAC_PI_2;
                    self.steps[1].angle = -FRAC_PI_2;
                    self.steps[2].angle = -FRAC_PI_2;
                }
                self.stem(current);
                current = self.pt.partner(current) + 1;
                if current == n {
                    self.steps[current].angle = -FRAC_PI_2;
                }
                continue;
            }

            if self.pt.is_paired(current - 1) {
                // Two exterior stems back to back.
                self.steps[current].angle += DIRECTION * FRAC_PI_2;
                self.steps[current + 1].distance = self.unpaired;
                self.steps[current + 1].angle += DIRECTION * FRAC_PI_2;
                dangles += 1;
            }
            self.stem(current);
            current = self.pt.partner(current) + 1;
            if current == n {
                current = self.exterior_run(current);
            }
        }
    }

    /// Lay unpaired exterior bases along the exterior line; returns the
    /// first paired base (or N).
    fn exterior_run(&mut self, mut current: usize) -> usize {
        let n = self.pt.len();
        if current > 1 {
            self.steps[current].angle += DIRECTION * FRAC_PI_2;
        }
        while current < n && !self.pt.is_paired(current) {
            self.steps[current + 1].angle = 0.0;
            current += 1;
        }
        if current < n {
            self.steps[current + 1].angle = DIRECTION * FRAC_PI_2;
        }
        current
    }

    fn stem(&mut self, start: usize) {
        let end = self.pt.partner(start) + 1;
        let mut i = start + 1;
        loop {
            let p = self.pt.partner(i);
            let stacked = p > 0 && (p == end - 1 || p + 1 == self.pt.partner(i - 1));
            if !stacked {
                break;
            }
            self.steps[i + 1].angle = 0.0;
            i += 1;
        }
        if self.pt.partner(i) != end - 1 {
            self.enclosed_loop(i - 1);
        }
    }

    fn enclosed_loop(&mut self, start: usize) {
        if is_bulge_loop(self.pt, start) {
            self.bulge(start);
            return;
        }

        let configs = self.configs;
        let Some(cfg) = configs.get(start).and_then(|c| c.as_ref()) else {
            return;
        };
        let end = self.pt.partner(start);
        let r = cfg.radius;
        let angle_paired = distance_to_angle(r, self.paired);
        let arc_params = |arc: usize| {
            let backbone = (cfg.angle(arc) - angle_paired) / cfg.arcs[arc].segments as f64;
            let distance = (2.0 * r * r * (1.0 - backbone.cos())).sqrt();
            let delta_ab = 0.5 * (PI + angle_paired + backbone);
            let delta_bb = PI + backbone;
            (distance, delta_ab, delta_bb)
        };

        let (mut distance, mut delta_ab, mut delta_bb) = arc_params(0);
        let mut next_arc = 1;

        let mut i = start;
        self.steps[i + 1].angle += DIRECTION * (PI - delta_ab);
        self.steps[i].distance = distance;
        i += 1;

        let mut stems_since_arc = 0;
        while i < end {
            let p = self.pt.partner(i);
            if p == 0 {
                self.steps[i + 1].angle = -DIRECTION * (delta_bb - PI);
                self.steps[i].distance = distance;
                i += 1;
            } else if p > i {
                self.steps[i + 1].angle = DIRECTION * (PI - delta_ab);
                stems_since_arc += 1;
                self.stem(i);
                i = p;
            } else {
                if stems_since_arc == 1 && next_arc < cfg.arc_count() {
                    stems_since_arc = 0;
                    (distance, delta_ab, delta_bb) = arc_params(next_arc);
                    next_arc += 1;
                }
                self.steps[i + 1].angle += DIRECTION * (PI - delta_ab);
                self.steps[i].distance = distance;
                i += 1;
            }
        }
        if i < self.pt.len() {
            self.steps[i + 1].angle = DIRECTION * (PI - delta_ab);
        }
    }

    /// A single unpaired base between two stacked pairs: kink the strand
    /// out by an equilateral triangle and carry on with the inner stem.
    fn bulge(&mut self, start: usize) {
        let alpha = (self.unpaired / (2.0 * self.unpaired)).acos();
        let mut i = start;
        if !self.pt.is_paired(i + 1) {
            self.steps[i + 1].angle += DIRECTION * alpha;
            i += 1;
            self.steps[i + 1].angle = -DIRECTION * alpha * 2.0;
            i += 1;
            self.steps[i + 1].angle = DIRECTION * alpha;
            self.stem(i);
        } else {
            i += 1;
            self.stem(i);
            i = self.pt.partner(i);
            self.steps[i + 1].angle += DIRECTION * alpha;
            i += 1;
            self.steps[i + 1].angle = -DIRECTION * alpha * 2.0;
            i += 1;
            self.steps[i + 1].angle = DIRECTION * alpha;
        }
    }
}
