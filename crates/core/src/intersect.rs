use std::fmt;

use crate::boxes::{LoopBox, StemBox};
use crate::geometry::{closest_point_on_triangle, segments_intersect};
use crate::tree::{ConfigTree, TreeNode};
use crate::turtle::EXTERIOR_Y;

/// Clearance below which two shapes count as touching.
pub const EPSILON_RECOGNIZE: f64 = 14.0;

/// Which shapes of two nodes overlap, first node's shape first.
///
/// `Siblings` and `Exterior` never come out of a geometric test; they tag
/// the changes made by the sibling and exterior resolvers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Intersection {
    None,
    LxL,
    LxS,
    SxL,
    SxS,
    LxB,
    BxL,
    SxB,
    BxS,
    BxB,
    Siblings,
    Exterior,
}

/// The three kinds of bounding shape a node carries.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Shape {
    Loop,
    Stem,
    Bulges,
}

impl Intersection {
    pub fn tag(self) -> &'static str {
        match self {
            Intersection::None => "---",
            Intersection::LxL => "LxL",
            Intersection::LxS => "LxS",
            Intersection::SxL => "SxL",
            Intersection::SxS => "SxS",
            Intersection::LxB => "LxB",
            Intersection::BxL => "BxL",
            Intersection::SxB => "SxB",
            Intersection::BxS => "BxS",
            Intersection::BxB => "BxB",
            Intersection::Siblings => "BRA",
            Intersection::Exterior => "EXT",
        }
    }

    pub fn is_none(self) -> bool {
        self == Intersection::None
    }

    /// Whether the first node's loop is the colliding shape.
    pub fn is_loop_first(self) -> bool {
        matches!(self, Intersection::LxL | Intersection::LxS | Intersection::LxB)
    }

    /// The colliding shapes of a geometric intersection.
    pub fn shapes(self) -> Option<(Shape, Shape)> {
        use Shape::*;
        Some(match self {
            Intersection::LxL => (Loop, Loop),
            Intersection::LxS => (Loop, Stem),
            Intersection::SxL => (Stem, Loop),
            Intersection::SxS => (Stem, Stem),
            Intersection::LxB => (Loop, Bulges),
            Intersection::BxL => (Bulges, Loop),
            Intersection::SxB => (Stem, Bulges),
            Intersection::BxS => (Bulges, Stem),
            Intersection::BxB => (Bulges, Bulges),
            Intersection::None | Intersection::Siblings | Intersection::Exterior => return None,
        })
    }
}

impl fmt::Display for Intersection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// A node's bounding shape, borrowed for a collision test.
#[derive(Clone, Copy, Debug)]
pub enum Volume<'a> {
    Loop(&'a LoopBox),
    Stem(&'a StemBox),
    /// The bulge triangles hanging off a stem.
    Bulges(&'a StemBox),
}

impl TreeNode {
    pub fn volume(&self, shape: Shape) -> Volume<'_> {
        match shape {
            Shape::Loop => Volume::Loop(&self.loop_box),
            Shape::Stem => Volume::Stem(&self.stem_box),
            Shape::Bulges => Volume::Bulges(&self.stem_box),
        }
    }
}

/// Bulges involved in a collision, by index into their stem's bulge list.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Contact {
    pub first: Option<usize>,
    pub second: Option<usize>,
}

/// Exact collision test between two shapes.
pub fn collide(first: Volume<'_>, second: Volume<'_>) -> Option<Contact> {
    let hit = |yes: bool| yes.then(Contact::default);
    match (first, second) {
        (Volume::Loop(l1), Volume::Loop(l2)) => hit(loop_loop(l1, l2)),
        (Volume::Stem(s), Volume::Loop(l)) | (Volume::Loop(l), Volume::Stem(s)) => {
            hit(stem_loop(s, l))
        }
        (Volume::Stem(s1), Volume::Stem(s2)) => hit(stem_stem(s1, s2)),
        (Volume::Loop(l), Volume::Bulges(s)) => loop_bulges(l, s).map(|i| Contact {
            first: None,
            second: Some(i),
        }),
        (Volume::Bulges(s), Volume::Loop(l)) => loop_bulges(l, s).map(|i| Contact {
            first: Some(i),
            second: None,
        }),
        (Volume::Stem(s1), Volume::Bulges(s2)) => stem_bulges(s1, s2).map(|i| Contact {
            first: None,
            second: Some(i),
        }),
        (Volume::Bulges(s1), Volume::Stem(s2)) => stem_bulges(s2, s1).map(|i| Contact {
            first: Some(i),
            second: None,
        }),
        (Volume::Bulges(s1), Volume::Bulges(s2)) => bulges_bulges(s1, s2).map(|(i, j)| Contact {
            first: Some(i),
            second: Some(j),
        }),
    }
}

fn loop_loop(l1: &LoopBox, l2: &LoopBox) -> bool {
    let reach = l1.radius + l2.radius + EPSILON_RECOGNIZE;
    l1.center.distance(l2.center) < reach
}

fn stem_loop(stem: &StemBox, lp: &LoopBox) -> bool {
    let p = stem.closest_point(lp.center);
    let reach = lp.radius + EPSILON_RECOGNIZE;
    (p - lp.center).length_squared() < reach * reach
}

/// Only the two long sides are tested; the short ends are always
/// covered by the adjacent loops.
fn stem_stem(s1: &StemBox, s2: &StemBox) -> bool {
    let [a1, b1, c1, d1] = s1.corners();
    let [a2, b2, c2, d2] = s2.corners();
    segments_intersect(a1, b1, a2, b2)
        || segments_intersect(a1, b1, c2, d2)
        || segments_intersect(c1, d1, a2, b2)
        || segments_intersect(c1, d1, c2, d2)
}

fn loop_bulges(lp: &LoopBox, stem: &StemBox) -> Option<usize> {
    let r = lp.radius + EPSILON_RECOGNIZE;
    (0..stem.bulges.len()).find(|&i| {
        let [prev, this, next] = stem.bulge_points(i, 0.0);
        let p = closest_point_on_triangle(prev, this, next, lp.center);
        (lp.center - p).length_squared() <= r * r
    })
}

fn bulges_bulges(s1: &StemBox, s2: &StemBox) -> Option<(usize, usize)> {
    let extra = 0.5 * EPSILON_RECOGNIZE;
    for i in 0..s1.bulges.len() {
        let [ip, it, inx] = s1.bulge_points(i, extra);
        for j in 0..s2.bulges.len() {
            let [jp, jt, jn] = s2.bulge_points(j, extra);
            if segments_intersect(ip, it, jp, jt)
                || segments_intersect(ip, it, jt, jn)
                || segments_intersect(it, inx, jp, jt)
                || segments_intersect(it, inx, jt, jn)
            {
                return Some((i, j));
            }
        }
    }
    None
}

/// Bulge of `s2` crossing either long side of `s1`.
fn stem_bulges(s1: &StemBox, s2: &StemBox) -> Option<usize> {
    if s2.bulges.is_empty() {
        return None;
    }
    let ea = s1.a * s1.half_length;
    let eb = s1.b * s1.half_width;
    let nw = s1.c + ea - eb;
    let sw = s1.c - ea - eb;
    let ne = s1.c + ea + eb;
    let se = s1.c - ea + eb;

    (0..s2.bulges.len()).find(|&i| {
        let [prev, this, next] = s2.bulge_points(i, EPSILON_RECOGNIZE);
        segments_intersect(nw, sw, prev, this)
            || segments_intersect(nw, sw, this, next)
            || segments_intersect(ne, se, prev, this)
            || segments_intersect(ne, se, this, next)
    })
}

/// Classify the overlap of two nodes, skipping the classes that cannot
/// occur between a parent and its child or between siblings.
pub fn node_node(tree: &ConfigTree, first: usize, second: usize) -> Intersection {
    if first == second {
        return Intersection::None;
    }
    let n1 = tree.node(first);
    let n2 = tree.node(second);

    let mut count = 0.0;
    for stem in [&n1.stem_box, &n2.stem_box] {
        if stem.bulge_dist > 0.0 {
            count += 1.0;
        }
    }
    let mut margin = EPSILON_RECOGNIZE;
    if count > 0.0 {
        margin += (n1.stem_box.bulge_dist + n2.stem_box.bulge_dist) / count;
    }
    if !n1.aabb.overlaps(&n2.aabb, margin) {
        return Intersection::None;
    }

    let first_is_parent = n2.parent == Some(first);
    let second_is_parent = n1.parent == Some(second);
    let common_parent = n1.parent == n2.parent;
    let related = first_is_parent || second_is_parent;

    let checks = [
        (Intersection::SxS, !related && !common_parent),
        (Intersection::LxL, !related),
        (Intersection::SxL, !second_is_parent),
        (Intersection::LxS, !first_is_parent),
        (Intersection::LxB, !first_is_parent),
        (Intersection::BxL, !second_is_parent),
        (Intersection::SxB, true),
        (Intersection::BxS, true),
        (Intersection::BxB, true),
    ];
    for (kind, allowed) in checks {
        let Some((s1, s2)) = kind.shapes() else {
            continue;
        };
        if allowed && collide(n1.volume(s1), n2.volume(s2)).is_some() {
            return kind;
        }
    }
    Intersection::None
}

/// Whether the loop of `id` dips to the exterior line. Top-level loops
/// and the exterior itself never do.
pub fn node_exterior(tree: &ConfigTree, id: usize, check_exterior: bool) -> bool {
    if !check_exterior || tree.is_exterior(id) {
        return false;
    }
    match tree.parent(id) {
        Some(parent) if !tree.is_exterior(parent) => {
            let lp = &tree.node(id).loop_box;
            lp.center.y - (lp.radius + EPSILON_RECOGNIZE) <= EXTERIOR_Y
        }
        _ => false,
    }
}

/// Whether any node below `t1` overlaps any node below `t2`.
pub fn intersect_trees(tree: &ConfigTree, t1: usize, t2: usize) -> bool {
    let second = tree.subtree(t2);
    tree.subtree(t1)
        .into_iter()
        .any(|a| second.iter().any(|&b| !node_node(tree, a, b).is_none()))
}

/// Whether any pair from the two lists overlaps. The exterior stands for
/// the exterior line.
pub fn intersect_node_lists(
    tree: &ConfigTree,
    list1: &[usize],
    list2: &[usize],
    check_exterior: bool,
) -> bool {
    list1.iter().any(|&a| {
        list2.iter().any(|&b| {
            if tree.is_exterior(a) {
                node_exterior(tree, b, check_exterior)
            } else if tree.is_exterior(b) {
                node_exterior(tree, a, check_exterior)
            } else {
                !node_node(tree, a, b).is_none()
            }
        })
    })
}
