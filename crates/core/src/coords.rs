//! Base coordinates from the resolved configuration tree.

use tracing::{debug, warn};

use crate::geometry::{distance_to_angle, Vec2};
use crate::intersect::intersect_trees;
use crate::tree::{ConfigTree, TreeNode};
use crate::turtle::EXTERIOR_Y;
use crate::types::PairTable;

/// Place every base along its stem, its loop or the exterior line.
///
/// Returns 1-indexed coordinates; index 0 is unused.
pub fn base_coordinates(tree: &ConfigTree, pt: &PairTable) -> Vec<Vec2> {
    let n = pt.len();
    let mut coords = vec![Vec2::ZERO; n + 1];
    if n == 0 {
        return coords;
    }

    for node in tree.nodes().iter().filter(|node| !tree.is_exterior(node.id)) {
        place_stem(node, pt, &mut coords);
        place_loop(node, pt, tree.paired(), &mut coords);
    }
    place_exterior(pt, tree.unpaired(), &mut coords);
    coords
}

fn place_stem(node: &TreeNode, pt: &PairTable, coords: &mut [Vec2]) {
    let Some(stem_start) = node.stem_start else {
        return;
    };
    let stem = &node.stem_box;
    let [a, b, c, d] = stem.corners();
    let left_bulges = stem.bulges.iter().filter(|bulge| bulge.side > 0.0).count();
    let right_bulges = stem.bulges.len() - left_bulges;
    let mut bulge = 0;

    // 5' strand from A to B.
    let (start, end) = (stem_start, node.loop_start);
    let segments = (end - start - left_bulges) as f64;
    for nt in start..end {
        if pt.is_paired(nt) {
            let step = (nt - start - bulge) as f64;
            coords[nt] = a + (b - a) * (step / segments);
        } else {
            coords[nt] = stem.bulge_apex(bulge);
            bulge += 1;
        }
    }
    coords[end] = b;

    // 3' strand from C to D.
    let (start, end) = (pt.partner(node.loop_start), pt.partner(stem_start));
    let segments = (end - start - right_bulges) as f64;
    for nt in start..end {
        if pt.is_paired(nt) {
            let step = (nt - start) as f64 - (bulge - left_bulges) as f64;
            coords[nt] = c + (d - c) * (step / segments);
        } else {
            coords[nt] = stem.bulge_apex(bulge);
            bulge += 1;
        }
    }
    coords[end] = d;
}

/// Unpaired loop bases, clockwise from the closing pair.
fn place_loop(node: &TreeNode, pt: &PairTable, paired: f64, coords: &mut [Vec2]) {
    let cfg = &node.cfg;
    let center = node.loop_box.center;
    let paired_angle = distance_to_angle(cfg.radius, paired);
    let to_stem = node.stem_box.c - center;
    let mut start = to_stem.y.atan2(to_stem.x) - 0.5 * paired_angle;

    let mut nt = node.loop_start + 1;
    for arc in &cfg.arcs {
        let step = (arc.angle - paired_angle) / arc.segments as f64;
        for segment in 1..arc.segments {
            let angle = start - segment as f64 * step;
            coords[nt] = center + Vec2::from_angle(angle) * cfg.radius;
            nt += 1;
        }
        nt = pt.partner(nt) + 1;
        start -= arc.angle;
    }
}

/// Unpaired exterior bases on a horizontal line, one backbone step apart.
fn place_exterior(pt: &PairTable, unpaired: f64, coords: &mut [Vec2]) {
    let n = pt.len();
    coords[1] = Vec2::new(EXTERIOR_Y, EXTERIOR_Y);
    let mut nt = if pt.is_paired(1) { pt.partner(1) + 1 } else { 2 };
    while nt <= n {
        if pt.is_paired(nt) {
            nt = pt.partner(nt) + 1;
        } else {
            coords[nt] = Vec2::new(coords[nt - 1].x + unpaired, EXTERIOR_Y);
            nt += 1;
        }
    }
}

/// Push overlapping exterior branches apart by stretching the exterior
/// backbone in front of them. With `allow_flipping`, a branch that only
/// hits branches above the line is mirrored below it instead.
pub fn spread_exterior_branches(
    tree: &mut ConfigTree,
    pt: &PairTable,
    allow_flipping: bool,
    coords: &mut [Vec2],
) {
    let branches = tree.children(0).to_vec();
    let count = branches.len();
    if count < 2 {
        return;
    }
    let n = pt.len();
    let unpaired = tree.unpaired();

    // Opening base of each branch, and the exterior steps in front of it
    // counted from the previous branch's closing base.
    let mut first = Vec::with_capacity(count);
    let mut backbone = vec![0usize; count];
    let mut base = 1;
    while base < n && first.len() < count {
        if pt.is_paired(base) && pt.partner(base) > base {
            first.push(base);
            base = pt.partner(base);
        } else {
            base += 1;
            backbone[first.len()] += 1;
        }
    }
    if first.len() < count {
        warn!(branches = count, found = first.len(), "exterior branches out of sync with pair table");
        return;
    }

    let mut distance = vec![0.0; count];
    let mut upper = vec![0];
    let mut lower = Vec::new();
    let mut offset = 0.0;
    for s in 1..count {
        if offset > 0.0 {
            tree.translate(branches[s], Vec2::new(offset, 0.0));
        }
        let mut attempts = 0;
        loop {
            let hits = |set: &[usize], tree: &ConfigTree| {
                set.iter().any(|&other| intersect_trees(tree, branches[s], branches[other]))
            };
            let hits_upper = hits(&upper, tree);
            let hits_lower = allow_flipping && hits(&lower, tree);
            let stuck = hits_upper && (!allow_flipping || hits_lower);

            if stuck && attempts < n {
                attempts += 1;
                distance[s] += unpaired;
                let shift = unpaired * backbone[s].max(1) as f64;
                tree.translate(branches[s], Vec2::new(shift, 0.0));
                offset += shift;
                continue;
            }
            if stuck {
                warn!(branch = s, attempts, "exterior branch still overlapping");
            }
            if allow_flipping && hits_upper {
                debug!(branch = s, "flipping exterior branch");
                lower.push(s);
            } else {
                upper.push(s);
            }
            break;
        }
    }

    // Stretch the exterior backbone in front of each moved branch.
    let mut accumulated = 0.0;
    for s in 1..count {
        let from = pt.partner(first[s - 1]) + 1;
        for (k, base) in (from..=first[s]).enumerate() {
            coords[base].x += (k + 1) as f64 * distance[s] + accumulated;
        }
        accumulated += distance[s] * backbone[s] as f64;
    }
    for base in pt.partner(first[count - 1]) + 1..=n {
        coords[base].x += accumulated;
    }

    let exterior_y = coords[1].y;
    let mut translation = 0.0;
    for s in 1..count {
        translation += distance[s] * backbone[s] as f64;
        let bases = first[s] + 1..=pt.partner(first[s]);
        let flip = lower.contains(&s);
        for base in bases {
            coords[base].x += translation;
            if flip {
                coords[base].y = 2.0 * exterior_y - coords[base].y;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::generate_configs;
    use crate::parser::parse;
    use crate::turtle::{affine_to_cartesian, compute_affine};

    fn approx_eq(a: f64, b: f64, tol: f64) -> bool {
        (a - b).abs() < tol
    }

    fn prepared(structure: &str) -> (PairTable, ConfigTree) {
        let pt = parse(structure).unwrap();
        let configs = generate_configs(&pt, 35.0, 25.0);
        let steps = compute_affine(&pt, &configs, 35.0, 25.0);
        let coords = affine_to_cartesian(&steps, pt.len());
        let mut tree = ConfigTree::build(&pt, &configs, &coords, 35.0, 25.0);
        tree.update_bounding_boxes(0);
        (pt, tree)
    }

    #[test]
    fn test_hairpin_bond_lengths() {
        let (pt, tree) = prepared("((((....))))");
        let coords = base_coordinates(&tree, &pt);
        assert_eq!(coords.len(), 13);
        for i in 1..12 {
            let d = coords[i].distance(coords[i + 1]);
            if pt.partner(i) == i + 1 {
                continue;
            }
            assert!(approx_eq(d, 25.0, 0.1), "backbone {i}: {d}");
        }
        for i in 1..=4 {
            let d = coords[i].distance(coords[pt.partner(i)]);
            assert!(approx_eq(d, 35.0, 1e-6), "pair {i}: {d}");
        }
    }

    #[test]
    fn test_exterior_bases_lie_on_line() {
        let (pt, tree) = prepared("..((...))..");
        let coords = base_coordinates(&tree, &pt);
        assert_eq!(coords[1], Vec2::new(EXTERIOR_Y, EXTERIOR_Y));
        assert_eq!(coords[2], Vec2::new(EXTERIOR_Y + 25.0, EXTERIOR_Y));
        for i in [10, 11] {
            assert!(approx_eq(coords[i].y, EXTERIOR_Y, 1e-12));
            assert!(approx_eq(coords[i].x - coords[i - 1].x, 25.0, 1e-12));
        }
    }

    #[test]
    fn test_loop_bases_sit_on_the_circle() {
        let (pt, tree) = prepared("((.((...))..((...)).))");
        let coords = base_coordinates(&tree, &pt);
        let node = tree.node(1);
        for nt in [3, 11, 12, 20] {
            assert!(!pt.is_paired(nt));
            let r = coords[nt].distance(node.loop_box.center);
            assert!(approx_eq(r, node.cfg.radius, 1e-6), "base {nt}: {r}");
        }
    }

    #[test]
    fn test_bulge_base_leaves_the_stem() {
        let (pt, tree) = prepared("((.((...))))");
        let coords = base_coordinates(&tree, &pt);
        let stem = &tree.node(1).stem_box;
        assert_eq!(stem.bulges.len(), 1);
        assert_eq!(coords[3], stem.bulge_apex(0));
    }

    #[test]
    fn test_separate_branches_stay_put() {
        let (pt, mut tree) = prepared("((((....))))...((((....))))");
        assert!(!intersect_trees(&tree, 1, 2));
        let before = base_coordinates(&tree, &pt);
        let mut coords = before.clone();
        spread_exterior_branches(&mut tree, &pt, false, &mut coords);
        assert_eq!(coords, before);
    }

    #[test]
    fn test_overlapping_branches_are_pushed_apart() {
        let (pt, mut tree) = prepared("((((....))))((((....))))");
        let shift = tree.node(1).loop_box.center - tree.node(2).loop_box.center;
        tree.translate(2, shift);
        assert!(intersect_trees(&tree, 1, 2));

        let before = base_coordinates(&tree, &pt);
        let mut coords = before.clone();
        spread_exterior_branches(&mut tree, &pt, false, &mut coords);
        assert!(!intersect_trees(&tree, 1, 2));

        let moved = coords[13].x - before[13].x;
        assert!(moved > 0.0);
        for nt in 14..=24 {
            assert!(approx_eq(coords[nt].x - before[nt].x, moved, 1e-9));
            assert_eq!(coords[nt].y, before[nt].y);
        }
        for nt in 1..=12 {
            assert_eq!(coords[nt], before[nt]);
        }
    }

    #[test]
    fn test_flipping_mirrors_instead_of_stretching() {
        let (pt, mut tree) = prepared("((((....))))((((....))))");
        let shift = tree.node(1).loop_box.center - tree.node(2).loop_box.center;
        tree.translate(2, shift);

        let before = base_coordinates(&tree, &pt);
        let mut coords = before.clone();
        spread_exterior_branches(&mut tree, &pt, true, &mut coords);
        for nt in 14..=23 {
            assert_eq!(coords[nt].x, before[nt].x);
            assert!(approx_eq(coords[nt].y, 2.0 * EXTERIOR_Y - before[nt].y, 1e-9));
        }
    }
}
