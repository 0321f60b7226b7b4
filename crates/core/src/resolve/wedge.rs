use crate::geometry::{angle_between, is_to_the_right_of_vector, Vec2};
use crate::tree::ConfigTree;

use super::EPSILON_FIX;

/// Angular interval covered by a child subtree, measured clockwise at the
/// parent's loop center from the parent's stem.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Wedge {
    pub min: f64,
    pub max: f64,
}

impl Wedge {
    fn include(&mut self, angle: f64) {
        self.min = self.min.min(angle);
        self.max = self.max.max(angle);
    }
}

/// Wedge of the `index`-th child of `root`, padded by the fixing margin.
///
/// Covers the tangents to every loop of the subtree, every bulge apex and
/// the two outer corners of the child's own stem.
pub fn bounding_wedge(tree: &ConfigTree, root: usize, index: usize) -> Wedge {
    let child = tree.children(root)[index];
    let angle = tree.child_angle(root, child);
    let mut wedge = Wedge {
        min: angle,
        max: angle,
    };
    widen(tree, root, child, angle, &mut wedge);
    wedge
}

fn widen(tree: &ConfigTree, root: usize, id: usize, node_angle: f64, wedge: &mut Wedge) {
    let center = tree.node(root).loop_box.center;
    let node = tree.node(id);
    let to_node = node.loop_box.center - center;
    let stem = &node.stem_box;

    let tangent = ((node.loop_box.radius + EPSILON_FIX) / to_node.length()).asin();
    // NaN once the root center lies inside the padded loop.
    if !tangent.is_nan() {
        wedge.include(node_angle + tangent);
        wedge.include(node_angle - tangent);
    }

    let mut points: Vec<Vec2> = (0..stem.bulges.len())
        .map(|i| stem.bulge_points(i, EPSILON_FIX)[1])
        .collect();
    if node.parent == Some(root) {
        let [a, _, _, d] = stem.corners();
        points.extend([a, d]);
    }
    for p in points {
        wedge.include(node_angle + signed_angle(center, to_node, p));
    }

    for &child in &node.children {
        let offset = signed_angle(center, to_node, tree.node(child).loop_box.center);
        widen(tree, root, child, node_angle + offset, wedge);
    }
}

/// Angle from `reference` to `p` as seen from `center`; clockwise positive.
fn signed_angle(center: Vec2, reference: Vec2, p: Vec2) -> f64 {
    let angle = angle_between(reference, p - center);
    if is_to_the_right_of_vector(center, reference, p) {
        angle
    } else {
        -angle
    }
}
