use std::f64::consts::FRAC_PI_2;

use tracing::{debug, warn};

use crate::intersect::{intersect_trees, Intersection};

use super::wedge::bounding_wedge;
use super::{calc_deltas, Resolver};

/// What a sibling check did to its loop.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(super) enum Outcome {
    /// Nothing overlapped, or nothing could be done about it.
    Unchanged,
    /// The loop's config changed; its subtree needs another pass.
    Changed,
    /// Siblings overlap but the change budget is used up.
    Exhausted,
}

impl Resolver<'_> {
    /// Spread apart overlapping child subtrees of `id` by widening the
    /// arcs between them. Stops at the first pair that could be fixed.
    pub(super) fn check_siblings(&mut self, id: usize) -> Outcome {
        let children = self.tree.children(id);
        let mut pairs = Vec::new();
        for (i, &a) in children.iter().enumerate() {
            for (j, &b) in children.iter().enumerate().skip(i + 1) {
                if intersect_trees(self.tree, a, b) {
                    pairs.push((i, j));
                }
            }
        }
        if pairs.is_empty() {
            return Outcome::Unchanged;
        }
        debug!(node = id, overlaps = pairs.len(), "sibling subtrees overlap");
        if self.puzzler.exhausted() {
            return Outcome::Exhausted;
        }

        for (left, right) in pairs {
            let target = bounding_wedge(self.tree, id, right).min - bounding_wedge(self.tree, id, left).max;
            if target >= 0.0 {
                continue;
            }
            // Wider openings in one step tend to wreck the loop.
            let target = target.max(-FRAC_PI_2);
            let parent = self.tree.parent(id);
            let (changed, mut deltas) =
                calc_deltas(self.tree, id, parent, left as isize, right as isize, -target);
            if changed != 0.0 && self.check_and_apply(id, &mut deltas, Intersection::Siblings) {
                return Outcome::Changed;
            }
        }
        warn!(node = id, "could not separate sibling subtrees");
        Outcome::Unchanged
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::{Puzzler, PuzzlerOptions};
    use crate::resolve::tests::prepared;

    #[test]
    fn test_separate_siblings_are_unchanged() {
        let mut tree = prepared("((.((...))..((...)).))");
        let mut puzzler = Puzzler::new(PuzzlerOptions::default());
        let outcome = Resolver::new(&mut tree, &mut puzzler).check_siblings(1);
        assert_eq!(outcome, Outcome::Unchanged);
        assert_eq!(puzzler.changes_applied, 0);
    }

    /// Two branches separated by a single backbone step, the second
    /// moved onto the first.
    fn collided() -> crate::tree::ConfigTree {
        let mut tree = prepared("((......((((...))))((((...))))......))");
        assert_eq!(tree.children(1), &[2, 3]);
        let shift = tree.node(2).loop_box.center - tree.node(3).loop_box.center;
        tree.translate(3, shift);
        assert!(intersect_trees(&tree, 2, 3));
        tree
    }

    #[test]
    fn test_overlapping_siblings_get_spread() {
        let mut tree = collided();
        let before = tree.node(1).cfg.angle(1);
        let mut puzzler = Puzzler::new(PuzzlerOptions::default());
        let outcome = Resolver::new(&mut tree, &mut puzzler).check_siblings(1);
        assert_eq!(outcome, Outcome::Changed);
        assert_eq!(puzzler.changes_applied, 1);
        assert!(tree.node(1).cfg.angle(1) > before);
    }

    #[test]
    fn test_exhausted_budget_reports_exhausted() {
        let mut tree = collided();
        let mut puzzler = Puzzler::new(PuzzlerOptions {
            max_changes: 0,
            ..PuzzlerOptions::default()
        });
        let outcome = Resolver::new(&mut tree, &mut puzzler).check_siblings(1);
        assert_eq!(outcome, Outcome::Exhausted);
        assert!(puzzler.budget_exceeded);
    }
}
