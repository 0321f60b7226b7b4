//! Overlap-free layout of RNA secondary structures.
//!
//! A baseline drawing is turned into a tree of loops and stems, then loop
//! configurations are bent and widened until no two parts of the drawing
//! overlap. [`layout`] runs the whole pass; [`Engine`] exposes its stages.

pub mod boxes;
pub mod config;
pub mod coords;
mod error;
pub mod geometry;
pub mod intersect;
mod options;
mod parser;
pub mod resolve;
pub mod tree;
pub mod turtle;
mod types;

use tracing::debug;

pub use error::{LayoutError, Result};
pub use geometry::Vec2;
pub use intersect::Intersection;
pub use options::{Puzzler, PuzzlerOptions, RadiusSearch, RotationSign};
pub use parser::parse;
pub use tree::ConfigTree;
pub use types::*;

use resolve::Resolver;

/// One layout pass over a pairing table, stage by stage.
pub struct Engine<'a> {
    table: &'a PairTable,
    tree: ConfigTree,
    puzzler: &'a mut Puzzler,
}

impl<'a> Engine<'a> {
    /// Generate default loop configs, draw the baseline and build the tree.
    pub fn prepare(table: &'a PairTable, puzzler: &'a mut Puzzler) -> Self {
        let (paired, unpaired) = (puzzler.options.paired, puzzler.options.unpaired);
        let configs = config::generate_configs(table, paired, unpaired);
        let steps = turtle::compute_affine(table, &configs, paired, unpaired);
        let baseline = turtle::affine_to_cartesian(&steps, table.len());
        let tree = ConfigTree::build(table, &configs, &baseline, paired, unpaired);
        debug!(bases = table.len(), loops = tree.len(), "prepared configuration tree");
        Self { table, tree, puzzler }
    }

    /// Resolve intersections, optimizing loops on the way when enabled.
    pub fn resolve(&mut self) {
        if !self.puzzler.options.any_check() {
            return;
        }
        self.tree.update_bounding_boxes(0);
        Resolver::new(&mut self.tree, self.puzzler).run(0);
    }

    /// Shrink the loops below `node`. Returns the radius ratio of `node`.
    pub fn optimize_tree(&mut self, node: usize) -> f64 {
        Resolver::new(&mut self.tree, self.puzzler).optimize_tree(node)
    }

    /// Per-base coordinates, 1-indexed like the table.
    pub fn coordinates(&mut self) -> Vec<Vec2> {
        let mut coords = coords::base_coordinates(&self.tree, self.table);
        coords::spread_exterior_branches(
            &mut self.tree,
            self.table,
            self.puzzler.options.allow_flipping,
            &mut coords,
        );
        coords
    }

    pub fn tree(&self) -> &ConfigTree {
        &self.tree
    }

    pub fn puzzler(&self) -> &Puzzler {
        &*self.puzzler
    }
}

/// Lay out a validated pairing table.
pub fn layout(table: &PairTable, options: &PuzzlerOptions) -> Result<Layout> {
    options.validate()?;
    if table.is_empty() {
        return Ok(Layout::default());
    }

    let mut puzzler = Puzzler::new(options.clone());
    let coords = {
        let mut engine = Engine::prepare(table, &mut puzzler);
        engine.resolve();
        engine.coordinates()
    };
    debug!(
        changes = puzzler.changes_applied,
        budget_exceeded = puzzler.budget_exceeded,
        "layout finished"
    );

    Ok(Layout {
        coords: coords.into_iter().skip(1).collect(),
        changes_applied: puzzler.changes_applied,
        budget_exceeded: puzzler.budget_exceeded,
    })
}

/// Parse dot-bracket notation and lay it out.
pub fn layout_structure(structure: &str, options: &PuzzlerOptions) -> Result<Layout> {
    layout(&parse(structure)?, options)
}

/// String entry point: dot-bracket and JSON options in, JSON layout out.
///
/// Blank options mean defaults. Returns an empty string on any error.
pub fn layout_json(structure: &str, options_json: &str) -> String {
    let options = if options_json.trim().is_empty() {
        PuzzlerOptions::default()
    } else {
        match serde_json::from_str(options_json) {
            Ok(options) => options,
            Err(_) => return String::new(),
        }
    };
    layout_structure(structure, &options)
        .ok()
        .and_then(|result| serde_json::to_string(&result).ok())
        .unwrap_or_default()
}
