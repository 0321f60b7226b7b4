//! Shrinking loops that resolution left wider than they need to be.
//!
//! A loop is shrunk by searching for the smallest radius that keeps its
//! subtree clear of itself and of its ancestors. Between searches, room is
//! moved from the arc with the widest backbone spacing to the others so
//! the next search can go further.

use std::f64::consts::PI;

use tracing::{debug, warn};

use crate::config::{Config, RadiusUpdate};
use crate::geometry::{distance_to_angle, EPSILON_3, EPSILON_7, TWO_PI};
use crate::intersect::intersect_node_lists;
use crate::options::RadiusSearch;

use super::wedge::bounding_wedge;
use super::Resolver;

/// Loops closer than this to their relaxed radius are not worth a try.
const MIN_RADIUS_EXCESS: f64 = 5.0;
/// An arc donates room only if it has this many unpaired steps to spare.
const MIN_SPARE_STEPS: f64 = 2.0;
/// Share of the spare room an arc gives away per attempt.
const DONATION_FACTOR: f64 = 0.5;
/// Angle changes are backed off in this many steps when they collide.
const BACKOFF_STEPS: usize = 10;

const LINEAR_MIN_RANGE: f64 = 1.0;
const LINEAR_STEPS: usize = 10;
const BINARY_MIN_STEP: f64 = 10.0;
const BINARY_MAX_DEPTH: usize = 10;

/// Nodes whose overlaps matter while a loop changes shape.
struct Scope {
    subtree: Vec<usize>,
    ancestors: Vec<usize>,
}

impl Resolver<'_> {
    /// Shrink the loops below `id`, innermost first, while everything stays
    /// free of intersections. Returns the product of all shrink ratios.
    pub fn optimize_tree(&mut self, id: usize) -> f64 {
        if !self.puzzler.options.optimize {
            return 1.0;
        }
        let scope = Scope {
            subtree: self.tree.subtree(id),
            ancestors: self.tree.ancestors(id),
        };
        if self.intersecting(&scope) {
            warn!(node = id, "subtree still intersecting, skipping optimization");
            return 1.0;
        }
        self.optimize_subtree(id, &scope)
    }

    fn intersecting(&self, scope: &Scope) -> bool {
        let check_exterior = self.puzzler.options.check_exterior;
        intersect_node_lists(self.tree, &scope.subtree, &scope.subtree, check_exterior)
            || intersect_node_lists(self.tree, &scope.subtree, &scope.ancestors, check_exterior)
    }

    fn optimize_subtree(&mut self, id: usize, scope: &Scope) -> f64 {
        let mut shrinking = 1.0;
        loop {
            if self.puzzler.exhausted() {
                break;
            }
            let mut min_ratio: f64 = 1.0;
            for i in 0..self.tree.children(id).len() {
                let child = self.tree.children(id)[i];
                let ratio = self.optimize_subtree(child, scope);
                min_ratio = min_ratio.min(ratio);
                shrinking *= ratio;
            }
            if min_ratio < 1.0 {
                continue;
            }
            if !self.tree.is_exterior(id) {
                let ratio = self.optimize_node(id, scope);
                min_ratio = min_ratio.min(ratio);
                shrinking *= ratio;
            }
            if min_ratio >= 1.0 {
                break;
            }
        }
        shrinking
    }

    /// Shrink the loop of `id`. Returns new radius over old radius.
    fn optimize_node(&mut self, id: usize, scope: &Scope) -> f64 {
        let (paired, unpaired) = (self.tree.paired(), self.tree.unpaired());
        let node = self.tree.node(id);
        if node.children.is_empty() || node.cfg.radius - node.cfg.default_radius < MIN_RADIUS_EXCESS {
            return 1.0;
        }

        let initial = node.cfg.clone();
        let size = initial.arcs.len();
        let mut best = initial.clone();
        let mut alphas = Vec::new();
        let mut spaces = vec![0.0; size];
        let mut order: Vec<usize> = (0..size).collect();
        let mut unpaired_angle = 0.0;
        let mut next = 0;
        let mut changed = true;
        let max_runs = 100 * size;
        let mut runs = 0;

        while next < size && runs < max_runs {
            runs += 1;
            if changed {
                let cfg = &self.tree.node(id).cfg;
                unpaired_angle = distance_to_angle(cfg.radius, unpaired);
                alphas = backbone_spacing(cfg, paired);
                let shrinkable = alphas.iter().all(|&a| a > unpaired_angle);
                if shrinkable && self.shrink_radius(id, scope) < 1.0 {
                    let cfg = &self.tree.node(id).cfg;
                    best = cfg.clone();
                    next = 0;
                    unpaired_angle = distance_to_angle(cfg.radius, unpaired);
                    alphas = backbone_spacing(cfg, paired);
                } else {
                    self.apply_config(id, &best);
                }
                if next == 0 {
                    let paired_angle = distance_to_angle(self.tree.node(id).cfg.radius, paired);
                    spaces = self.free_spaces(id, paired_angle);
                    order = rank_arcs(&alphas, &spaces);
                }
            } else {
                self.apply_config(id, &best);
            }

            let min_space = MIN_SPARE_STEPS * unpaired_angle;
            let Some((offset, arc)) = order[next..]
                .iter()
                .enumerate()
                .find(|&(_, &arc)| spaces[arc].min(PI) > min_space)
                .map(|(k, &arc)| (k, arc))
            else {
                break;
            };
            next += offset + 1;

            let segments = self.tree.node(id).cfg.arcs[arc].segments as f64;
            let spare = segments * alphas[arc] - segments * unpaired_angle;
            let decrease = DONATION_FACTOR * spare.min(spaces[arc]);
            if decrease < EPSILON_3 {
                continue;
            }
            let deltas = donation(&self.tree.node(id).cfg, &alphas, arc, decrease);
            changed = self.search_best_config(id, deltas, scope);
        }

        self.apply_config(id, &best);
        if runs >= max_runs {
            warn!(node = id, runs, "loop optimization hit its run limit");
        }

        if best.radius < initial.radius && self.puzzler.spend() {
            debug!(
                change = self.puzzler.changes_applied,
                node = id,
                old_radius = initial.radius,
                new_radius = best.radius,
                "optimized loop"
            );
        } else {
            self.apply_config(id, &initial);
        }
        self.tree.node(id).cfg.radius / initial.radius
    }

    /// Apply `deltas`, then back them off step by step until the scope is
    /// clear. Returns whether a clear config was reached.
    fn search_best_config(&mut self, id: usize, mut deltas: Vec<f64>, scope: &Scope) -> bool {
        let radius = self.tree.node(id).cfg.radius;
        self.apply_deltas(id, &deltas, radius);
        let factor = 1.0 / BACKOFF_STEPS as f64;
        deltas.iter_mut().for_each(|d| *d *= -factor);

        let mut intersecting = self.intersecting(scope);
        if intersecting {
            for _ in 0..BACKOFF_STEPS - 1 {
                let radius = self.tree.node(id).cfg.radius;
                self.apply_deltas(id, &deltas, radius);
                intersecting = self.intersecting(scope);
                if !intersecting {
                    break;
                }
            }
        }
        !intersecting
    }

    fn shrink_radius(&mut self, id: usize, scope: &Scope) -> f64 {
        match self.puzzler.options.radius_search {
            RadiusSearch::Linear => self.shrink_radius_linear(id, scope),
            RadiusSearch::Binary => self.shrink_radius_binary(id, scope),
        }
    }

    /// Try ten radii from the minimum upward and keep the first clear one.
    fn shrink_radius_linear(&mut self, id: usize, scope: &Scope) -> f64 {
        let cfg = &self.tree.node(id).cfg;
        let (max, min) = (cfg.radius, cfg.min_radius);
        if max - min < LINEAR_MIN_RANGE {
            return 1.0;
        }

        let step = (max - min) / LINEAR_STEPS as f64;
        let mut radius = min;
        let mut cleared = false;
        for _ in 0..LINEAR_STEPS {
            self.tree.apply_changes(id, None, RadiusUpdate::AtLeast(radius));
            if !self.intersecting(scope) {
                cleared = true;
                break;
            }
            radius += step;
        }
        if !cleared || self.tree.node(id).cfg.radius > max {
            self.tree.apply_changes(id, None, RadiusUpdate::AtLeast(max));
        }
        self.tree.node(id).cfg.radius / max
    }

    /// Bisect between the minimum and the current radius.
    fn shrink_radius_binary(&mut self, id: usize, scope: &Scope) -> f64 {
        let cfg = &self.tree.node(id).cfg;
        let (max, min) = (cfg.radius, cfg.min_radius);
        let mut valid = max;
        let mut radius = min;
        let mut step = 0.5 * (max - min);
        let mut depth = 0;

        let mut searching = min + BINARY_MIN_STEP < max;
        while searching {
            depth += 1;
            self.tree.apply_changes(id, None, RadiusUpdate::AtLeast(radius));
            if self.intersecting(scope) {
                radius += step;
            } else {
                valid = radius;
                radius -= step;
            }
            step *= 0.5;
            searching = depth <= BINARY_MAX_DEPTH && radius >= min && step >= BINARY_MIN_STEP;
        }

        // The last radius tried may have failed on either side.
        if self.tree.node(id).cfg.radius != valid {
            self.tree.apply_changes(id, None, RadiusUpdate::AtLeast(valid));
        }
        valid / max
    }

    /// Apply `deltas` with radius `target` unless that changes nothing.
    fn apply_deltas(&mut self, id: usize, deltas: &[f64], target: f64) {
        let cfg = &self.tree.node(id).cfg;
        if target != cfg.radius || deltas.iter().any(|&d| d != 0.0) {
            self.tree.apply_changes(id, Some(deltas), RadiusUpdate::AtLeast(target));
        }
    }

    fn apply_config(&mut self, id: usize, target: &Config) {
        let cfg = &self.tree.node(id).cfg;
        let deltas: Vec<f64> = target
            .arcs
            .iter()
            .zip(&cfg.arcs)
            .map(|(want, have)| want.angle - have.angle)
            .collect();
        self.apply_deltas(id, &deltas, target.radius);
    }

    /// Angular room around each arc that no child subtree covers.
    fn free_spaces(&self, id: usize, paired_angle: f64) -> Vec<f64> {
        let size = self.tree.node(id).cfg.arcs.len();
        let mut left = vec![0.0; size];
        let mut right = vec![0.0; size];
        left[0] = 0.5 * paired_angle;
        for i in 0..size - 1 {
            let wedge = bounding_wedge(self.tree, id, i);
            right[i] = wedge.min;
            left[i + 1] = wedge.max;
        }
        right[size - 1] = TWO_PI - 0.5 * paired_angle;
        right.iter().zip(&left).map(|(r, l)| r - l).collect()
    }
}

/// Angle per backbone step on each arc, the closing stem's chord removed.
fn backbone_spacing(cfg: &Config, paired: f64) -> Vec<f64> {
    let paired_angle = distance_to_angle(cfg.radius, paired);
    cfg.arcs
        .iter()
        .map(|arc| (arc.angle - paired_angle) / arc.segments as f64)
        .collect()
}

/// Arc indices by spacing, widest first; ties go to the arc with more room.
fn rank_arcs(alphas: &[f64], spaces: &[f64]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..alphas.len()).collect();
    let n = order.len();
    for i in 0..n.saturating_sub(1) {
        for j in 0..n - i - 1 {
            let (this, next) = (order[j], order[j + 1]);
            let diff = alphas[next] - alphas[this];
            let swap = diff > EPSILON_7
                || (diff.abs() < EPSILON_7 && spaces[next] - spaces[this] > EPSILON_7);
            if swap {
                order.swap(j, j + 1);
            }
        }
    }
    order
}

/// Take `decrease` from `arc` and hand it to the other arcs in proportion
/// to their backbone length.
fn donation(cfg: &Config, alphas: &[f64], arc: usize, decrease: f64) -> Vec<f64> {
    let weight = |i: usize| cfg.arcs[i].segments as f64 * alphas[i];
    let total: f64 = (0..cfg.arcs.len()).filter(|&i| i != arc).map(weight).sum();
    (0..cfg.arcs.len())
        .map(|i| {
            if i == arc {
                -decrease
            } else {
                weight(i) / total * decrease
            }
        })
        .collect()
}
