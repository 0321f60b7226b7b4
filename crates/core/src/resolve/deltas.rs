//! Turning a required rotation into per-arc angle changes.
//!
//! Arc `i` of a loop sits between child `i - 1` and child `i`, where child
//! `-1` stands for the loop's own stem. Rotating children `left + 1 ..= right`
//! means growing the arcs in that range and shrinking the rest.

use std::f64::consts::PI;

use tracing::warn;

use crate::geometry::{EPSILON_3, TWO_PI};
use crate::tree::ConfigTree;

use super::wedge::bounding_wedge;

/// Rounds of the nearest-neighbour decrease before giving up on the rest.
const MAX_DECREASE_ROUNDS: usize = 1000;

/// Compute deltas for the loop of `id` that grow the arcs from stem index
/// `left` (exclusive) to `right` (inclusive) by `delta` in total and take
/// the same amount from the other arcs.
///
/// Returns how much of `delta` could be placed together with the deltas.
/// When the loop cannot absorb the change the deltas are all zero. If
/// the parent chain up to `recursive_end` could take part of the rotation
/// instead, only the share that fits here is placed.
pub fn calc_deltas(
    tree: &ConfigTree,
    id: usize,
    recursive_end: Option<usize>,
    left: isize,
    right: isize,
    delta: f64,
) -> (f64, Vec<f64>) {
    let node = tree.node(id);
    let cfg = &node.cfg;
    let size = node.children.len() + 1;
    let mut deltas = vec![0.0; size];

    if delta < 0.0 {
        warn!(node = id, delta, "cannot distribute a negative angle");
        return (0.0, deltas);
    }
    let last = size as isize - 1;
    let in_range = |i: isize| (-1..last).contains(&i);
    if size < 2 || left == right || !in_range(left) || !in_range(right) {
        warn!(node = id, left, right, "invalid arc range");
        return (0.0, deltas);
    }

    let min_outer = (tree.paired() / (2.0 * cfg.radius)).asin();
    let current: Vec<f64> = cfg.arcs.iter().map(|a| a.angle).collect();
    let wedges: Vec<_> = (0..size - 1).map(|i| bounding_wedge(tree, id, i)).collect();

    let mut space = vec![0.0; size];
    space[0] = wedges[0].min - min_outer;
    for i in 1..size - 1 {
        space[i] = wedges[i].min - wedges[i - 1].max;
    }
    space[size - 1] = TWO_PI - min_outer - wedges[size - 2].max;
    for (s, angle) in space.iter_mut().zip(&current) {
        *s = s.min(angle - 2.0 * min_outer);
    }

    let advance = |i: isize| if i + 1 == last { -1 } else { i + 1 };
    let mut increase = vec![false; size];
    let mut decrease = vec![false; size];
    let mut i = left;
    while i != right {
        increase[(i + 1) as usize] = true;
        i = advance(i);
    }
    while i != left {
        let arc = (i + 1) as usize;
        decrease[arc] = space[arc] > 0.0;
        i = advance(i);
    }

    let mut target = delta;
    increase_evenly(&mut deltas, &increase, target);
    target = nearest_neighbors_first(target, left, right, &decrease, &space, &mut deltas);

    if target != 0.0 && !can_escalate(tree, id, recursive_end, left) {
        target = maximum_first(target, left, right, &current, min_outer, &mut deltas);
    }
    increase_evenly(&mut deltas, &increase, -target);

    let sum: f64 = deltas.iter().sum();
    if sum.abs() > EPSILON_3 || !cfg.is_valid(&deltas) {
        warn!(node = id, sum, "deltas break the loop, resetting");
        deltas.fill(0.0);
        target = delta;
    }
    (delta - target, deltas)
}

fn increase_evenly(deltas: &mut [f64], increase: &[bool], angle: f64) {
    let count = increase.iter().filter(|&&inc| inc).count();
    if count == 0 {
        return;
    }
    let part = angle / count as f64;
    for (d, _) in deltas.iter_mut().zip(increase).filter(|(_, &inc)| inc) {
        *d += part;
    }
}

/// Take the angle from the arcs next to the grown range first, spreading
/// it outwards pair by pair.
fn nearest_neighbors_first(
    mut target: f64,
    left: isize,
    right: isize,
    decrease: &[bool],
    space: &[f64],
    deltas: &mut [f64],
) -> f64 {
    let size = decrease.len();
    let mut steps = 0;
    let mut it = right;
    while it != left {
        it += 1;
        if it == size as isize {
            it = -1;
        }
        steps += 1;
    }
    let pairs = steps / 2;

    for _ in 0..MAX_DECREASE_ROUNDS {
        let mut l = if left == -1 { size - 1 } else { left as usize };
        let mut r = if right + 1 == size as isize { 0 } else { (right + 1) as usize };
        let mut picked = Vec::with_capacity(steps);
        for _ in 0..pairs {
            if decrease[l] {
                picked.push(l);
            }
            if decrease[r] {
                picked.push(r);
            }
            l = if l == 0 { size - 1 } else { l - 1 };
            r = if r + 1 == size { 0 } else { r + 1 };
        }
        if 2 * pairs < steps {
            picked.push(l);
        }
        if picked.is_empty() {
            break;
        }

        let part = target / picked.len() as f64;
        let mut changed = false;
        for &j in picked.iter().filter(|&&j| decrease[j]) {
            let diff = -(space[j] + deltas[j]).min(part);
            deltas[j] += diff;
            target += diff;
            changed |= diff != 0.0;
        }
        if !changed {
            break;
        }
    }
    target
}

/// Whether a loop between `id` and `recursive_end` could still rotate the
/// subtree in the wanted direction.
fn can_escalate(tree: &ConfigTree, id: usize, recursive_end: Option<usize>, left: isize) -> bool {
    let mut parent = tree.parent(id);
    while let Some(p) = parent {
        if Some(p) == recursive_end || tree.is_exterior(p) {
            break;
        }
        if tree.is_multi_loop(p) {
            return true;
        }
        let angle = tree.node(p).cfg.angle(0);
        if (angle - PI).abs() >= EPSILON_3 && ((angle > PI && left == 0) || (angle < PI && left == -1)) {
            return true;
        }
        parent = tree.parent(p);
    }
    false
}

/// Take the angle from whichever shrinkable arc has the most room left,
/// halving the bite until the rest is small.
fn maximum_first(
    initial: f64,
    left: isize,
    right: isize,
    current: &[f64],
    min_outer: f64,
    deltas: &mut [f64],
) -> f64 {
    let size = current.len();
    let last = size as isize - 1;
    let mut target = initial;

    loop {
        let room = |i: usize, deltas: &[f64]| current[i] + deltas[i] - 2.0 * min_outer;
        let mut best: Option<(usize, f64)> = None;
        let mut consider = |i: usize, space: f64| {
            if space > best.map_or(0.0, |(_, s)| s) {
                best = Some((i, space));
            }
        };

        if left == -1 {
            let right = right as usize;
            let mut sum: f64 = (0..=right).map(|i| room(i, deltas)).sum();
            for i in right + 1..size {
                if sum >= PI {
                    break;
                }
                let space = room(i, deltas);
                consider(i, space);
                sum += space;
            }
        } else if right == -1 {
            let left = left as usize;
            let mut sum: f64 = (left + 1..size).map(|i| room(i, deltas)).sum();
            for i in (0..=left).rev() {
                if sum >= PI {
                    break;
                }
                let space = room(i, deltas);
                consider(i, space);
                sum += space;
            }
        } else {
            let mut i = if right == last { -1 } else { right };
            while i != left {
                let arc = (i + 1) as usize;
                consider(arc, room(arc, deltas));
                i += 1;
                if i == last {
                    i = -1;
                }
            }
        }

        let mut diff = 0.0;
        if let Some((i, space)) = best {
            let factor = if target < 0.1 * initial { 1.0 } else { 0.5 };
            diff = -(factor * space).min(target);
            deltas[i] += diff;
            target += diff;
        }
        if !(target > 0.0 && diff.abs() > EPSILON_3) {
            break;
        }
    }
    target
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolve::tests::prepared;

    fn approx_eq(a: f64, b: f64, tol: f64) -> bool {
        (a - b).abs() < tol
    }

    #[test]
    fn test_negative_angle_is_refused() {
        let tree = prepared("((.((...))..((...)).))");
        let (changed, deltas) = calc_deltas(&tree, 1, None, 0, 1, -0.1);
        assert_eq!(changed, 0.0);
        assert!(deltas.iter().all(|&d| d == 0.0));
    }

    #[test]
    fn test_equal_indices_are_refused() {
        let tree = prepared("((.((...))..((...)).))");
        let (changed, deltas) = calc_deltas(&tree, 1, None, 0, 0, 0.1);
        assert_eq!(changed, 0.0);
        assert_eq!(deltas.len(), 3);
    }

    #[test]
    fn test_sibling_gap_grows_middle_arc() {
        let tree = prepared("((.((...))..((...)).))");
        let cfg = tree.node(1).cfg.clone();
        let (changed, deltas) = calc_deltas(&tree, 1, Some(0), 0, 1, 0.05);
        assert!(changed > 0.0);
        assert!(deltas[1] > 0.0);
        assert!(deltas[0] <= 0.0 && deltas[2] <= 0.0);
        assert!(approx_eq(deltas.iter().sum::<f64>(), 0.0, 1e-3));
        assert!(cfg.is_valid(&deltas));
    }

    #[test]
    fn test_rotation_from_stem_grows_leading_arcs() {
        let tree = prepared("((.((...))..((...)).))");
        let (changed, deltas) = calc_deltas(&tree, 1, Some(0), -1, 0, 0.05);
        assert!(changed > 0.0);
        assert!(deltas[0] > 0.0);
        assert!(deltas[1] <= 0.0 && deltas[2] <= 0.0);
        assert!(approx_eq(deltas.iter().sum::<f64>(), 0.0, 1e-3));
    }

    #[test]
    fn test_impossible_rotation_leaves_config_alone() {
        let tree = prepared("((.((...))..((...)).))");
        let (changed, deltas) = calc_deltas(&tree, 1, Some(0), 0, 1, 10.0);
        assert!(changed < 10.0);
        let cfg = &tree.node(1).cfg;
        assert!(cfg.is_valid(&deltas));
    }

    #[test]
    fn test_increase_evenly_splits_angle() {
        let mut deltas = vec![0.0; 4];
        increase_evenly(&mut deltas, &[true, false, true, false], 0.4);
        assert_eq!(deltas, vec![0.2, 0.0, 0.2, 0.0]);
    }
}
