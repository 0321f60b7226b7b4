use std::f64::consts::{FRAC_PI_2, PI};

use tracing::{debug, warn};

use crate::boxes::{Aabb, LoopBox, StemBox};
use crate::geometry::{is_to_the_right, Vec2};
use crate::intersect::{node_exterior, node_node, Intersection};
use crate::options::RotationSign;
use crate::turtle::EXTERIOR_Y;

use super::calc_deltas;
use super::rotation::rotation_angle;
use super::Resolver;

impl Resolver<'_> {
    /// Check `id` against every loop above it and, when enabled, against
    /// the exterior line. Returns the node whose config was changed.
    pub(super) fn check_node_against_ancestors(&mut self, id: usize) -> Option<usize> {
        let mut top = id;
        let mut ancestor = self.tree.parent(id);
        while let Some(anc) = ancestor.filter(|&a| !self.tree.is_exterior(a)) {
            top = anc;
            if !node_node(self.tree, id, anc).is_none() {
                if let Some(changed) = self.handle_with_ancestor(anc, id) {
                    return Some(changed);
                }
            }
            ancestor = self.tree.parent(anc);
        }

        if node_exterior(self.tree, id, self.puzzler.options.check_exterior) {
            self.setup_exterior(top, id);
            return self.handle_with_ancestor(0, id);
        }
        None
    }

    /// Give the exterior a stand-in loop and stem along the exterior line,
    /// between the top-level loop above `int` and the side `int` dips on.
    fn setup_exterior(&mut self, top: usize, int: usize) {
        let upper = EXTERIOR_Y;
        let lower = upper - self.tree.paired();
        let loop_x = self.tree.node(top).loop_box.center.x;
        let bounds = self.tree.node(int).aabb;

        let lp = LoopBox {
            center: Vec2::new(loop_x, upper - 0.5 * (upper - lower)),
            radius: 0.5 * (upper - lower),
        };
        let above = StemBox::from_corners(
            Vec2::new(bounds.min.x, upper),
            Vec2::new(loop_x, upper),
            Vec2::new(bounds.min.x, lower),
        );
        let below = StemBox::from_corners(
            Vec2::new(bounds.max.x, lower),
            Vec2::new(loop_x, lower),
            Vec2::new(bounds.max.x, upper),
        );

        if bounds.max.x < loop_x {
            self.set_exterior_boxes(lp, above);
        } else if loop_x < bounds.min.x {
            self.set_exterior_boxes(lp, below);
        } else {
            self.set_exterior_boxes(lp, above);
            if node_node(self.tree, int, 0).is_none() {
                self.set_exterior_boxes(lp, below);
            }
        }
    }

    fn set_exterior_boxes(&mut self, lp: LoopBox, stem: StemBox) {
        let exterior = self.tree.node_mut(0);
        exterior.aabb = Aabb::enclosing(&stem, &lp);
        exterior.loop_box = lp;
        exterior.stem_box = stem;
    }

    /// Resolve an overlap between `int` and its ancestor `anc` by rotating
    /// one of the loops on the path between them.
    fn handle_with_ancestor(&mut self, anc: usize, int: usize) -> Option<usize> {
        let kind = node_node(self.tree, anc, int);
        if kind.is_none() {
            warn!(anc, int, "no intersection to resolve");
            return None;
        }

        let path = self.reduced_path(anc, int, kind);
        let child_index: Vec<usize> = path
            .windows(2)
            .map(|w| self.tree.child_index(w[0], w[1]))
            .collect::<Option<_>>()?;

        let Some(sign) = self.rotation_sign(&path, kind) else {
            warn!(anc, int, "zero rotation sign");
            return None;
        };

        // Interior loops first, nearest to the intersector first.
        let candidates = (0..path.len().saturating_sub(1)).rev();
        let order: Vec<usize> = candidates
            .clone()
            .filter(|&i| self.tree.is_interior_loop(path[i]))
            .chain(candidates.filter(|&i| self.tree.is_multi_loop(path[i])))
            .collect();
        let changed = order
            .into_iter()
            .find_map(|i| self.fix(anc, path[i], int, child_index[i], sign, kind));

        if changed.is_none() {
            warn!(anc, int, tag = %kind, "failed to resolve ancestor intersection");
        }
        changed
    }

    /// Path from `anc` down to `int` without the straight interior loops,
    /// which cannot rotate anything. A loop-first ancestor is left out too.
    fn reduced_path(&self, anc: usize, int: usize, kind: Intersection) -> Vec<usize> {
        let mut path = vec![int];
        let mut node = int;
        while node != anc {
            let Some(parent) = self.tree.parent(node) else {
                break;
            };
            node = parent;
            let skip_anc = node == anc && kind.is_loop_first();
            if !self.tree.is_straight_interior_loop(node) && !skip_anc {
                path.push(node);
            }
        }
        path.reverse();
        path
    }

    /// +1 for a clockwise fix, -1 for counter-clockwise, `None` when the
    /// path does not turn at all.
    fn rotation_sign(&self, path: &[usize], kind: Intersection) -> Option<f64> {
        let mut angle: f64 = path
            .windows(2)
            .map(|w| self.tree.child_angle(w[0], w[1]) - PI)
            .sum();

        let (first, last) = (self.tree.node(*path.first()?), self.tree.node(*path.last()?));
        if self.puzzler.options.rotation_sign == RotationSign::PathTurningBulgeAware {
            let side = match kind {
                Intersection::BxL => {
                    Some(is_to_the_right(first.stem_box.c, first.loop_box.center, last.stem_box.c))
                }
                Intersection::LxB => {
                    Some(is_to_the_right(last.stem_box.c, last.loop_box.center, first.stem_box.c))
                }
                _ => None,
            };
            match side {
                Some(true) => angle += FRAC_PI_2,
                Some(false) => angle -= FRAC_PI_2,
                None => {}
            }
        }

        if angle < 0.0 {
            Some(1.0)
        } else if angle > 0.0 {
            Some(-1.0)
        } else {
            None
        }
    }

    /// Try to clear `int` from `anc` by turning the children of `rot` from
    /// `index` on. Returns `rot` when its config changed.
    fn fix(
        &mut self,
        anc: usize,
        rot: usize,
        int: usize,
        index: usize,
        sign: f64,
        kind: Intersection,
    ) -> Option<usize> {
        if rot == anc && kind.is_loop_first() {
            return None;
        }

        // Interior loops only ever turn towards straight.
        let mut gap = None;
        if self.tree.is_interior_loop(rot) {
            let child = self.tree.children(rot)[0];
            let angle = self.tree.child_angle(rot, child);
            let allowed = if angle > PI {
                -1.0
            } else if angle < PI {
                1.0
            } else {
                0.0
            };
            if sign != allowed {
                return None;
            }
            gap = Some(PI - angle);
        }

        let mut angle = rotation_angle(self.tree, anc, rot, int, kind, sign);
        if let Some(gap) = gap {
            if angle.abs() > gap.abs() {
                angle = gap;
            }
        }
        if angle == 0.0 {
            return None;
        }

        let index = index as isize;
        let (left, right) = if angle > 0.0 { (-1, index) } else { (index, -1) };
        let (changed, mut deltas) = calc_deltas(self.tree, rot, Some(anc), left, right, angle.abs());
        debug!(anc, rot, int, tag = %kind, angle, changed, "rotating loop");

        let tag = if self.tree.is_exterior(anc) {
            Intersection::Exterior
        } else {
            kind
        };
        self.check_and_apply(rot, &mut deltas, tag).then_some(rot)
    }
}
