use std::f64::consts::PI;

use rnapuzzler_core::intersect::{intersect_node_lists, intersect_trees};
use rnapuzzler_core::config::generate_configs;
use rnapuzzler_core::turtle::{affine_to_cartesian, compute_affine, EXTERIOR_Y};
use rnapuzzler_core::{
    layout, parse, ConfigTree, Engine, PairTable, Puzzler, PuzzlerOptions, RadiusSearch, RotationSign,
};

fn approx_eq(a: f64, b: f64, tol: f64) -> bool {
    (a - b).abs() < tol
}

const STRUCTURES: &[&str] = &[
    "((((....))))",
    "((.((...))..((...)).))",
    "(((.(((....))))))",
    "((((((.((((....)))).((((....)))).((((....)))).((((....)))).))))))",
    "(((((.(((((((....))))))).(((((((....))))))).)))))",
    "(((((((((((((..(((......)))...)))))(((((.......))))).)))))((((...))))(((((....))))))))",
];

/// Needs a handful of config changes before it is overlap-free.
const CROWDED: &str = "(((((((((((((..(((......)))...)))))(((((.......))))).)))))((((...))))(((((....))))))))";

/// Two five-way multiloops side by side under one stem; their hairpins
/// collide in the baseline drawing.
const BUSHY: &str = "((((((((((....))))((((....))))((((....))))((((....))))((((....)))))))\
(((((((....))))((((....))))((((....))))((((....))))((((....))))))))))";

/// A long hairpin hanging off a top-level interior loop; the baseline
/// drops it below the exterior line.
const SINKING: &str = "((((.........((((((((((((((((((((((((....))))))))))))))))))))))))))))";

/// The tree as resolution first sees it, boxes refreshed.
fn baseline_tree(table: &PairTable) -> ConfigTree {
    let configs = generate_configs(table, 35.0, 25.0);
    let steps = compute_affine(table, &configs, 35.0, 25.0);
    let coords = affine_to_cartesian(&steps, table.len());
    let mut tree = ConfigTree::build(table, &configs, &coords, 35.0, 25.0);
    tree.update_bounding_boxes(0);
    tree
}

fn is_sunk(tree: &ConfigTree) -> bool {
    tree.nodes()
        .iter()
        .filter(|n| n.parent.is_some_and(|p| p != 0))
        .any(|n| n.loop_box.center.y - n.loop_box.radius <= EXTERIOR_Y)
}

fn sibling_overlaps(tree: &ConfigTree) -> Vec<(usize, usize)> {
    let mut found = Vec::new();
    for node in tree.nodes().iter().skip(1) {
        for (i, &a) in node.children.iter().enumerate() {
            for &b in &node.children[i + 1..] {
                if intersect_trees(tree, a, b) {
                    found.push((a, b));
                }
            }
        }
    }
    found
}

#[test]
fn test_every_loop_closes() {
    for structure in STRUCTURES {
        let table = parse(structure).unwrap();
        let mut puzzler = Puzzler::new(PuzzlerOptions::default());
        let mut engine = Engine::prepare(&table, &mut puzzler);
        engine.resolve();

        let tree = engine.tree();
        for node in tree.nodes().iter().skip(1) {
            let cfg = &node.cfg;
            assert!(
                approx_eq(cfg.angle_sum(), 2.0 * PI, 1e-3),
                "{structure}: loop {} sums to {}",
                node.id,
                cfg.angle_sum()
            );
            for arc in &cfg.arcs {
                assert!(arc.angle > 0.0 && arc.angle < 2.0 * PI);
            }
        }
    }
}

#[test]
fn test_coordinates_are_deterministic() {
    let options = PuzzlerOptions::default();
    for structure in STRUCTURES {
        let table = parse(structure).unwrap();
        let first = layout(&table, &options).unwrap();
        let second = layout(&table, &options).unwrap();
        assert_eq!(first, second, "{structure}");
        assert!(first.coords.iter().all(|p| p.is_finite()));
    }
}

#[test]
fn test_budget_is_never_overrun() {
    let table = parse(CROWDED).unwrap();
    for max_changes in [0, 1, 2, 5, 50] {
        let options = PuzzlerOptions {
            max_changes,
            ..PuzzlerOptions::default()
        };
        let result = layout(&table, &options).unwrap();
        assert!(result.changes_applied <= max_changes);
        assert_eq!(result.coords.len(), table.len());
    }
}

#[test]
fn test_zero_budget_is_flagged() {
    let options = PuzzlerOptions {
        max_changes: 0,
        ..PuzzlerOptions::default()
    };
    let result = layout(&parse(CROWDED).unwrap(), &options).unwrap();
    assert_eq!(result.changes_applied, 0);
    assert!(result.budget_exceeded);
}

#[test]
fn test_crowded_structure_is_untangled() {
    let table = parse(CROWDED).unwrap();
    let mut puzzler = Puzzler::new(PuzzlerOptions::default());
    let mut engine = Engine::prepare(&table, &mut puzzler);
    engine.resolve();
    assert!(engine.puzzler().changes_applied > 0);
    assert!(!engine.puzzler().budget_exceeded);

    let tree = engine.tree();
    let all: Vec<usize> = (0..tree.len()).collect();
    assert!(!intersect_node_lists(tree, &all, &all, true));
}

#[test]
fn test_relaxed_structures_need_no_changes() {
    for structure in &STRUCTURES[..5] {
        let table = parse(structure).unwrap();
        let result = layout(&table, &PuzzlerOptions::default()).unwrap();
        assert_eq!(result.changes_applied, 0, "{structure}");
    }
}

#[test]
fn test_optimization_is_idempotent() {
    let table = parse(STRUCTURES[3]).unwrap();
    let mut puzzler = Puzzler::new(PuzzlerOptions::default());
    let mut engine = Engine::prepare(&table, &mut puzzler);
    engine.resolve();
    let before = engine.tree().node(1).cfg.clone();
    assert_eq!(engine.optimize_tree(1), 1.0);
    assert_eq!(engine.optimize_tree(1), 1.0);
    assert_eq!(engine.tree().node(1).cfg, before);
}

#[test]
fn test_strategies_keep_loops_closed() {
    let table = parse(CROWDED).unwrap();
    for (sign, search) in [
        (RotationSign::PathTurningBulgeAware, RadiusSearch::Linear),
        (RotationSign::PathTurning, RadiusSearch::Binary),
    ] {
        let mut puzzler = Puzzler::new(PuzzlerOptions {
            rotation_sign: sign,
            radius_search: search,
            ..PuzzlerOptions::default()
        });
        let mut engine = Engine::prepare(&table, &mut puzzler);
        engine.resolve();
        for node in engine.tree().nodes().iter().skip(1) {
            assert!(approx_eq(node.cfg.angle_sum(), 2.0 * PI, 1e-3));
        }
        let coords = engine.coordinates();
        assert_eq!(coords.len(), table.len() + 1);
    }
}

#[test]
fn test_flipping_only_mirrors_colliding_branches() {
    let structure = "((((....))))((((....))))";
    let table = parse(structure).unwrap();
    let plain = layout(&table, &PuzzlerOptions::default()).unwrap();
    let flipped = layout(
        &table,
        &PuzzlerOptions {
            allow_flipping: true,
            ..PuzzlerOptions::default()
        },
    )
    .unwrap();

    // The first branch never moves.
    assert_eq!(plain.coords[..12], flipped.coords[..12]);
    for p in &flipped.coords {
        assert!(p.is_finite());
    }
}

#[test]
fn test_overlapping_siblings_are_spread_apart() {
    let table = parse(BUSHY).unwrap();
    assert!(!sibling_overlaps(&baseline_tree(&table)).is_empty());

    let mut puzzler = Puzzler::new(PuzzlerOptions::default());
    let mut engine = Engine::prepare(&table, &mut puzzler);
    engine.resolve();
    assert!(engine.puzzler().changes_applied > 0);
    assert!(!engine.puzzler().budget_exceeded);
    assert!(sibling_overlaps(engine.tree()).is_empty());
}

#[test]
fn test_nested_loops_are_lifted_above_the_exterior() {
    let table = parse(SINKING).unwrap();
    assert!(is_sunk(&baseline_tree(&table)));

    let mut puzzler = Puzzler::new(PuzzlerOptions::default());
    let mut engine = Engine::prepare(&table, &mut puzzler);
    engine.resolve();
    assert!(engine.puzzler().changes_applied > 0);
    let tree = engine.tree();
    assert!(!is_sunk(tree));
    let all: Vec<usize> = (0..tree.len()).collect();
    assert!(!intersect_node_lists(tree, &all, &all, true));
}
