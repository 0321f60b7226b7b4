use tracing::warn;

use crate::geometry::{distance_to_angle, EPSILON_3, TWO_PI};
use crate::types::PairTable;

const MAX_NEWTON_ITERATIONS: usize = 1000;
/// Growth applied by [`RadiusUpdate::Grow`] when the minimum is not far ahead.
const GROWTH_FACTOR: f64 = 1.05;
const GROWTH_SLACK: f64 = 1.0;

/// Angular span claimed by one stem (or the closing pair) plus the
/// unpaired run leading up to it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Arc {
    pub angle: f64,
    /// Backbone segments along the arc (unpaired bases + 1).
    pub segments: usize,
}

/// Angular layout of a single loop.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Config {
    pub radius: f64,
    /// Smallest radius that fits the current arcs.
    pub min_radius: f64,
    /// Radius of the relaxed, evenly spaced loop.
    pub default_radius: f64,
    /// One arc per child stem, then one ending at the closing pair.
    pub arcs: Vec<Arc>,
}

/// How [`Config::apply_changes`] picks the new radius.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum RadiusUpdate {
    /// Use the given radius, but never less than the minimum.
    AtLeast(f64),
    /// Snap to the minimum radius.
    Minimum,
    /// Jump to the minimum if it is well above the current radius,
    /// otherwise grow by five percent.
    Grow,
}

/// Radius of a circle holding `stems` chords of length `paired` and
/// `segments` chords of length `unpaired` within `angle`.
///
/// Newton iteration started between the all-paired and all-unpaired
/// bounds; the result is clamped back into that bracket.
pub fn approximate_arc_radius(
    paired: f64,
    unpaired: f64,
    stems: f64,
    segments: f64,
    angle: f64,
) -> f64 {
    let (a, b, m, n) = (paired, unpaired, stems, segments);
    let half_step = (angle / (m + n)) / 2.0;
    let lower = (b / 2.0) / half_step.sin();
    let upper = (a / 2.0) / half_step.sin();
    let mut r = (0.5 * (lower + upper)).max(0.5 * a).max(0.5 * b);

    let mut converged = false;
    for _ in 0..MAX_NEWTON_ITERATIONS {
        let f = 2.0 * (m * (a / (2.0 * r)).asin() + n * (b / (2.0 * r)).asin() - angle / 2.0);
        let df = -(a * m / (r * (r * r - a * a / 4.0).sqrt())
            + b * n / (r * (r * r - b * b / 4.0).sqrt()));
        let dx = f / df;
        r -= dx;
        if dx.abs() < EPSILON_3 {
            converged = true;
            break;
        }
    }
    if !converged {
        warn!(iterations = MAX_NEWTON_ITERATIONS, "radius approximation hit iteration limit");
    }

    if r < lower {
        warn!(radius = r, lower, "approximated radius too small, clamping");
        r = lower;
    } else if r > upper {
        warn!(radius = r, upper, "approximated radius too large, clamping");
        r = upper;
    }
    r
}

impl Config {
    /// Relaxed configuration of the loop closed by the pair opened at `start`.
    pub fn default_for_loop(
        pt: &PairTable,
        start: usize,
        paired: f64,
        unpaired: f64,
        radius: f64,
    ) -> Self {
        let angle_paired = distance_to_angle(radius, paired);
        let angle_unpaired = distance_to_angle(radius, unpaired);
        let end = pt.partner(start);

        let mut arcs = Vec::new();
        let mut run = 0;
        let mut i = start + 1;
        while i <= end {
            if !pt.is_paired(i) {
                run += 1;
                i += 1;
                continue;
            }
            arcs.push(Arc {
                angle: angle_paired + (run + 1) as f64 * angle_unpaired,
                segments: run + 1,
            });
            if i == end {
                break;
            }
            run = 0;
            i = pt.partner(i) + 1;
        }

        Self {
            radius,
            min_radius: radius,
            default_radius: radius,
            arcs,
        }
    }

    pub fn arc_count(&self) -> usize {
        self.arcs.len()
    }

    pub fn angle(&self, arc: usize) -> f64 {
        self.arcs[arc].angle
    }

    pub fn angle_sum(&self) -> f64 {
        self.arcs.iter().map(|a| a.angle).sum()
    }

    /// Smallest radius at which every arc still fits its chords.
    pub fn approximate_radius(&self, paired: f64, unpaired: f64) -> f64 {
        self.arcs
            .iter()
            .map(|arc| approximate_arc_radius(paired, unpaired, 1.0, arc.segments as f64, arc.angle))
            .fold(0.0, f64::max)
    }

    /// Whether applying `deltas` keeps every angle in `(0, 2π)` and the
    /// total at 2π.
    pub fn is_valid(&self, deltas: &[f64]) -> bool {
        if deltas.len() != self.arcs.len() {
            return false;
        }
        let mut sum = 0.0;
        let mut singles_ok = true;
        for (arc, delta) in self.arcs.iter().zip(deltas) {
            let angle = arc.angle + delta;
            sum += angle;
            singles_ok &= 0.0 < angle && angle < TWO_PI;
        }
        singles_ok && (sum - TWO_PI).abs() < EPSILON_3
    }

    /// Add `deltas` to the arcs and pick a new radius. Returns the radius.
    pub fn apply_changes(
        &mut self,
        deltas: Option<&[f64]>,
        update: RadiusUpdate,
        paired: f64,
        unpaired: f64,
    ) -> f64 {
        if let Some(deltas) = deltas {
            for (arc, delta) in self.arcs.iter_mut().zip(deltas) {
                arc.angle += delta;
            }
        }

        let old = self.radius;
        self.min_radius = self.approximate_radius(paired, unpaired);
        self.radius = match update {
            RadiusUpdate::AtLeast(r) => r.max(self.min_radius),
            RadiusUpdate::Minimum => self.min_radius,
            RadiusUpdate::Grow => {
                if self.min_radius - GROWTH_SLACK > old {
                    self.min_radius
                } else {
                    old * GROWTH_FACTOR
                }
            }
        };
        self.radius
    }
}

/// Default configuration for every loop, indexed by the base opening the
/// loop's closing pair. Bulges (one unpaired base between two stacked
/// pairs) extend their stem and get no configuration of their own.
pub fn generate_configs(pt: &PairTable, paired: f64, unpaired: f64) -> Vec<Option<Config>> {
    let n = pt.len();
    let mut configs: Vec<Option<Config>> = vec![None; n + 1];

    let mut pending: Vec<usize> = Vec::new();
    let mut i = 1;
    while i < n {
        let p = pt.partner(i);
        if p > i {
            pending.push(i);
            i = p;
        }
        i += 1;
    }

    while let Some(stem_start) = pending.pop() {
        let start = last_stacked_pair(pt, stem_start);
        let counts = LoopCounts::of(pt, start);

        if counts.is_bulge() {
            let next = if pt.is_paired(start + 1) { start + 1 } else { start + 2 };
            pending.push(next);
            continue;
        }

        let radius = approximate_arc_radius(
            paired,
            unpaired,
            counts.stems as f64,
            (counts.unpaired + counts.stems) as f64,
            TWO_PI,
        );
        configs[start] = Some(Config::default_for_loop(pt, start, paired, unpaired, radius));
        pending.extend(counts.inner_stems);
    }

    configs
}

/// Composition of the loop closed by the pair opened at `start`.
struct LoopCounts {
    /// Stems touching the loop, the closing one included.
    stems: usize,
    unpaired: usize,
    inner_stems: Vec<usize>,
}

impl LoopCounts {
    fn of(pt: &PairTable, start: usize) -> Self {
        let end = pt.partner(start);
        let mut counts = LoopCounts {
            stems: 1,
            unpaired: 0,
            inner_stems: Vec::new(),
        };
        let mut j = start + 1;
        while j < end {
            let p = pt.partner(j);
            if p == 0 {
                counts.unpaired += 1;
            } else if p > j {
                counts.stems += 1;
                counts.inner_stems.push(j);
                j = p;
            }
            j += 1;
        }
        counts
    }

    fn is_bulge(&self) -> bool {
        self.stems == 2 && self.unpaired == 1
    }
}

/// Whether the loop closed at `start` is a single-base bulge inside a stem.
pub(crate) fn is_bulge_loop(pt: &PairTable, start: usize) -> bool {
    LoopCounts::of(pt, start).is_bulge()
}

/// Walk a stem of directly stacked pairs to its innermost opening base.
fn last_stacked_pair(pt: &PairTable, mut i: usize) -> usize {
    while i + 1 < pt.partner(i) && pt.partner(i + 1) + 1 == pt.partner(i) {
        i += 1;
    }
    i
}
