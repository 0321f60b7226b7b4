//! Rotation angles that pull a mobile shape clear of a static one.
//!
//! A rotation turns the subtree below some loop around that loop's
//! center. The mobile shape travels on a circle around the rotation
//! center; the angle returned is the smallest turn in the requested
//! direction that parks it [`EPSILON_FIX`] away from the static shape.

use tracing::{debug, warn};

use crate::boxes::StemBox;
use crate::geometry::{
    angle_between, circle_circle_cuts, circle_line_cuts, circumcircle, is_to_the_right_of_vector, CutPoints,
    Vec2, TWO_PI,
};
use crate::intersect::{collide, Contact, Intersection};
use crate::tree::ConfigTree;

use super::EPSILON_FIX;

const MIN_POSITIVE_ANGLE: f64 = 1e-10;
const MIN_NEGATIVE_ANGLE: f64 = -1e-10;

/// Angle by which rotating around the loop of `rot` moves the colliding
/// shape of `int` away from `anc`. Zero means this loop cannot help.
pub(super) fn rotation_angle(
    tree: &ConfigTree,
    anc: usize,
    rot: usize,
    int: usize,
    kind: Intersection,
    sign: f64,
) -> f64 {
    let a = tree.node(anc);
    let i = tree.node(int);
    let rot_c = tree.node(rot).loop_box.center;
    let contact = kind
        .shapes()
        .and_then(|(s1, s2)| collide(a.volume(s1), i.volume(s2)))
        .unwrap_or_default();

    let angle = match kind {
        Intersection::LxL => fix_circles(
            a.loop_box.center,
            a.loop_box.radius,
            i.loop_box.center,
            i.loop_box.radius,
            rot_c,
            sign,
        ),
        Intersection::LxS => -fix_rect(&i.stem_box, a.loop_box.center, a.loop_box.radius, rot_c, -sign),
        Intersection::SxL | Intersection::SxS => {
            fix_rect(&a.stem_box, i.loop_box.center, i.loop_box.radius, rot_c, sign)
        }
        Intersection::LxB => match bulge_circle(&i.stem_box, contact.second) {
            Some((c, r)) => fix_circles(a.loop_box.center, a.loop_box.radius, c, r, rot_c, sign),
            None => 0.0,
        },
        Intersection::BxL => match bulge_circle(&a.stem_box, contact.first) {
            Some((c, r)) => fix_circles(c, r, i.loop_box.center, i.loop_box.radius, rot_c, sign),
            None => 0.0,
        },
        Intersection::SxB => match bulge_circle(&i.stem_box, contact.second) {
            Some((c, r)) => fix_rect(&a.stem_box, c, r, rot_c, sign),
            None => 0.0,
        },
        Intersection::BxS => match bulge_circle(&a.stem_box, contact.first) {
            Some((c, r)) => fix_rect(&i.stem_box, c, r, rot_c, sign),
            None => 0.0,
        },
        Intersection::BxB => bulge_pair(tree, anc, int, contact)
            .map(|((c1, r1), (c2, r2))| fix_circles(c1, r1, c2, r2, rot_c, sign))
            .unwrap_or(0.0),
        Intersection::None | Intersection::Siblings | Intersection::Exterior => {
            warn!(tag = %kind, "no rotation for this intersection");
            0.0
        }
    };

    if angle == 0.0 {
        debug!(tag = %kind, anc, rot, int, "promoting to the next loop");
    }
    angle
}

fn bulge_circle(stem: &StemBox, index: Option<usize>) -> Option<(Vec2, f64)> {
    let [prev, apex, next] = stem.bulge_points(index?, 0.0);
    circumcircle(prev, apex, next)
}

fn bulge_pair(
    tree: &ConfigTree,
    anc: usize,
    int: usize,
    contact: Contact,
) -> Option<((Vec2, f64), (Vec2, f64))> {
    let first = bulge_circle(&tree.node(anc).stem_box, contact.first)?;
    let second = bulge_circle(&tree.node(int).stem_box, contact.second)?;
    Some((first, second))
}

/// Rotation angle of `p` around `center`, measured from `reference` and
/// taken the long way round when it points against `sign`.
fn point_to_angle(center: Vec2, reference: Vec2, sign: f64, p: Vec2) -> f64 {
    let angle = angle_between(reference, p - center);
    let cw = is_to_the_right_of_vector(center, reference, p);
    match (sign > 0.0, cw) {
        (true, true) => angle,
        (true, false) => TWO_PI - angle,
        (false, true) => angle - TWO_PI,
        (false, false) => -angle,
    }
}

fn lift_zero(angle: f64) -> f64 {
    if angle != 0.0 {
        angle
    } else if angle.is_sign_negative() {
        MIN_NEGATIVE_ANGLE
    } else {
        MIN_POSITIVE_ANGLE
    }
}

/// Turn that moves a circle clear of a fixed rectangle.
fn fix_rect(rect: &StemBox, mobile_c: Vec2, mobile_r: f64, rot_c: Vec2, sign: f64) -> f64 {
    if sign == 0.0 {
        warn!("invalid rotation sign");
        return 0.0;
    }
    let reference = mobile_c - rot_c;
    let rot_r = reference.length();
    let offset = rect.half_width + EPSILON_FIX + mobile_r;

    let mut cuts = circle_line_cuts(rot_c, rot_r, rect.c + rect.b * offset, rect.a).points();
    cuts.extend(circle_line_cuts(rot_c, rot_r, rect.c - rect.b * offset, rect.a).points());
    if cuts.is_empty() {
        // Out of reach: take the points of the circle closest to the lines.
        let normal = rect.a.normal();
        cuts = vec![rot_c + normal * rot_r, rot_c - normal * rot_r];
    }

    let mut angle = sign * TWO_PI;
    for p in cuts {
        let candidate = lift_zero(point_to_angle(rot_c, reference, sign, p));
        if sign > 0.0 && candidate > 0.0 {
            angle = angle.min(candidate);
        }
        if sign < 0.0 && candidate < 0.0 {
            angle = angle.max(candidate);
        }
    }

    if angle == 0.0 || angle.abs() == TWO_PI {
        warn!("no valid rotation clears the stem");
        return 0.0;
    }
    angle
}

/// Turn that moves one circle clear of another.
fn fix_circles(static_c: Vec2, static_r: f64, mobile_c: Vec2, mobile_r: f64, rot_c: Vec2, sign: f64) -> f64 {
    if sign == 0.0 {
        warn!("invalid rotation sign");
        return 0.0;
    }
    let reference = mobile_c - rot_c;
    let rot_r = reference.length();

    let (p1, p2) = match circle_circle_cuts(rot_c, rot_r, static_c, static_r + mobile_r + EPSILON_FIX) {
        CutPoints::Two(p, q) => (p, q),
        CutPoints::One(p) => (p, p),
        CutPoints::None | CutPoints::Coincident => {
            warn!(?static_c, static_r, ?mobile_c, mobile_r, "circles have no cut points");
            return 0.0;
        }
    };

    let signed = |p: Vec2| {
        let angle = angle_between(reference, p - rot_c);
        let cw = is_to_the_right_of_vector(rot_c, reference, p);
        (lift_zero(if cw { angle } else { -angle }), cw)
    };
    let (mut a1, cw1) = signed(p1);
    let (mut a2, cw2) = signed(p2);

    // Both cuts on one side: reach the nearer one's partner from the other side.
    let other_side = |a: f64, cw: bool| if cw { a - TWO_PI } else { TWO_PI - a };
    if cw1 == cw2 {
        if a1.abs() < a2.abs() {
            a2 = other_side(a2, cw2);
        } else {
            a1 = other_side(a1, cw1);
        }
    }

    let angle = if sign == 1.0 {
        a1.max(a2)
    } else if sign == -1.0 {
        a1.min(a2)
    } else {
        0.0
    };
    if angle == 0.0 {
        warn!("no valid rotation clears the loop");
    }
    angle
}
