//! Intersection resolution over the configuration tree.
//!
//! The driver walks the tree with an explicit frame stack. Each frame
//! checks its node against its ancestors, descends into the children and
//! finally untangles the children among themselves. A config change deep
//! in the tree unwinds the stack up to the changed node, which then starts
//! over.

mod ancestor;
mod deltas;
mod optimize;
mod rotation;
mod siblings;
mod wedge;

use tracing::{debug, trace, warn};

use crate::config::RadiusUpdate;
use crate::geometry::EPSILON_3;
use crate::intersect::Intersection;
use crate::options::Puzzler;
use crate::tree::ConfigTree;

pub use deltas::calc_deltas;
pub use wedge::{bounding_wedge, Wedge};

/// Extra clearance the fixing code adds on top of the recognition margin.
pub const EPSILON_FIX: f64 = 19.0;

/// Doubling rounds applied to deltas that are all too small to matter.
const MAX_DOUBLINGS: usize = 100;

/// Loops this many times wider than their relaxed size get optimized
/// even when they sit deep in the tree.
const OPTIMIZE_RADIUS_FACTOR: f64 = 10.0;

/// Mutable state of one resolution pass.
pub struct Resolver<'a> {
    pub(crate) tree: &'a mut ConfigTree,
    pub(crate) puzzler: &'a mut Puzzler,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Phase {
    Ancestors,
    Children,
    Siblings,
}

struct Frame {
    node: usize,
    phase: Phase,
    child: usize,
}

impl Frame {
    fn new(node: usize) -> Self {
        Self {
            node,
            phase: Phase::Ancestors,
            child: 0,
        }
    }

    fn restart(&mut self) {
        self.phase = Phase::Ancestors;
        self.child = 0;
    }
}

impl<'a> Resolver<'a> {
    pub fn new(tree: &'a mut ConfigTree, puzzler: &'a mut Puzzler) -> Self {
        Self { tree, puzzler }
    }

    /// Resolve every intersection below `root`, optimizing loops on the way
    /// back up when enabled.
    pub fn run(&mut self, root: usize) {
        let mut stack = vec![Frame::new(root)];
        // Outcome of the frame popped last: the node whose config changed.
        let mut returned: Option<Option<usize>> = None;

        while let Some(frame) = stack.last_mut() {
            let node = frame.node;
            if let Some(result) = returned.take() {
                match result {
                    Some(changed) if changed < node => {
                        trace!(node, changed, "unwinding to changed ancestor");
                        stack.pop();
                        returned = Some(Some(changed));
                        continue;
                    }
                    Some(changed) if changed == node => {
                        trace!(node, "restarting after change");
                        frame.restart();
                        continue;
                    }
                    _ => frame.child += 1,
                }
            }

            match frame.phase {
                Phase::Ancestors => {
                    trace!(node, "checking node");
                    frame.phase = Phase::Children;
                    if self.puzzler.options.check_ancestors && !self.tree.is_exterior(node) {
                        if let Some(changed) = self.check_node_against_ancestors(node) {
                            stack.pop();
                            returned = Some(Some(changed));
                        }
                    }
                }
                Phase::Children => match self.tree.children(node).get(frame.child) {
                    Some(&child) => stack.push(Frame::new(child)),
                    None => frame.phase = Phase::Siblings,
                },
                Phase::Siblings => {
                    if self.puzzler.options.check_siblings && !self.tree.is_exterior(node) {
                        match self.check_siblings(node) {
                            siblings::Outcome::Changed => {
                                frame.restart();
                                continue;
                            }
                            siblings::Outcome::Exhausted => {
                                stack.pop();
                                returned = Some(None);
                                continue;
                            }
                            siblings::Outcome::Unchanged => {}
                        }
                    }
                    stack.pop();
                    self.optimize_after_resolve(node);
                    trace!(node, "node settled");
                    returned = Some(None);
                }
            }
        }
    }

    fn optimize_after_resolve(&mut self, node: usize) {
        if !self.puzzler.options.optimize || self.tree.is_exterior(node) {
            return;
        }
        let top_level = self.tree.parent(node).is_some_and(|p| self.tree.is_exterior(p));
        let cfg = &self.tree.node(node).cfg;
        if top_level || cfg.radius > OPTIMIZE_RADIUS_FACTOR * cfg.default_radius {
            self.optimize_tree(node);
        }
    }

    /// Apply `deltas` to the config of `node` if they keep it valid.
    ///
    /// Every call counts against the change budget, accepted or not.
    pub(crate) fn check_and_apply(&mut self, node: usize, deltas: &mut [f64], tag: Intersection) -> bool {
        for _ in 0..MAX_DOUBLINGS {
            if deltas.iter().any(|d| d.abs() >= EPSILON_3) {
                break;
            }
            deltas.iter_mut().for_each(|d| *d *= 2.0);
        }

        if !self.puzzler.spend() {
            return false;
        }

        let cfg = &self.tree.node(node).cfg;
        if !cfg.is_valid(deltas) {
            warn!(tag = %tag, node, "discarding invalid config change");
            return false;
        }
        let old_radius = cfg.radius;
        let new_radius = self.tree.apply_changes(node, Some(deltas), RadiusUpdate::Grow);
        debug!(
            change = self.puzzler.changes_applied,
            tag = %tag,
            node,
            old_radius,
            new_radius,
            "applied config change"
        );
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::generate_configs;
    use crate::options::PuzzlerOptions;
    use crate::parser::parse;
    use crate::turtle::{affine_to_cartesian, compute_affine};

    pub(super) fn prepared(structure: &str) -> ConfigTree {
        let pt = parse(structure).unwrap();
        let configs = generate_configs(&pt, 35.0, 25.0);
        let steps = compute_affine(&pt, &configs, 35.0, 25.0);
        let coords = affine_to_cartesian(&steps, pt.len());
        let mut tree = ConfigTree::build(&pt, &configs, &coords, 35.0, 25.0);
        tree.update_bounding_boxes(0);
        tree
    }

    #[test]
    fn test_invalid_deltas_are_rejected() {
        let mut tree = prepared("((.((...))..((...)).))");
        let mut puzzler = Puzzler::new(PuzzlerOptions::default());
        let before = tree.node(1).cfg.clone();

        let mut resolver = Resolver::new(&mut tree, &mut puzzler);
        let mut deltas = vec![0.1, 0.1, 0.1];
        assert!(!resolver.check_and_apply(1, &mut deltas, Intersection::Siblings));

        assert_eq!(puzzler.changes_applied, 1);
        assert_eq!(tree.node(1).cfg, before);
    }

    #[test]
    fn test_valid_deltas_are_applied() {
        let mut tree = prepared("((.((...))..((...)).))");
        let mut puzzler = Puzzler::new(PuzzlerOptions::default());
        let before = tree.node(1).cfg.clone();

        let mut resolver = Resolver::new(&mut tree, &mut puzzler);
        let mut deltas = vec![0.1, -0.1, 0.0];
        assert!(resolver.check_and_apply(1, &mut deltas, Intersection::Siblings));

        let cfg = &tree.node(1).cfg;
        assert!((cfg.angle(0) - before.angle(0) - 0.1).abs() < 1e-12);
        assert!((cfg.angle_sum() - crate::geometry::TWO_PI).abs() < 1e-3);
        assert!(cfg.radius > before.radius);
    }

    #[test]
    fn test_tiny_deltas_are_scaled_up() {
        let mut tree = prepared("((.((...))..((...)).))");
        let mut puzzler = Puzzler::new(PuzzlerOptions::default());
        let before = tree.node(1).cfg.angle(0);

        let mut resolver = Resolver::new(&mut tree, &mut puzzler);
        let mut deltas = vec![1e-5, -1e-5, 0.0];
        assert!(resolver.check_and_apply(1, &mut deltas, Intersection::Siblings));
        assert!(deltas[0] >= EPSILON_3);
        assert!(tree.node(1).cfg.angle(0) - before >= EPSILON_3);
    }

    #[test]
    fn test_budget_blocks_changes() {
        let mut tree = prepared("((.((...))..((...)).))");
        let mut puzzler = Puzzler::new(PuzzlerOptions {
            max_changes: 0,
            ..PuzzlerOptions::default()
        });
        let mut resolver = Resolver::new(&mut tree, &mut puzzler);
        let mut deltas = vec![0.1, -0.1, 0.0];
        assert!(!resolver.check_and_apply(1, &mut deltas, Intersection::LxL));
        assert!(puzzler.budget_exceeded);
        assert_eq!(puzzler.changes_applied, 0);
    }

    #[test]
    fn test_run_leaves_hairpin_untouched() {
        let mut tree = prepared("((((....))))");
        let before = tree.node(1).cfg.clone();
        let mut puzzler = Puzzler::new(PuzzlerOptions::default());
        Resolver::new(&mut tree, &mut puzzler).run(0);
        assert_eq!(puzzler.changes_applied, 0);
        assert_eq!(tree.node(1).cfg, before);
    }
}
