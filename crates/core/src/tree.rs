use std::f64::consts::PI;

use crate::boxes::{Aabb, LoopBox, StemBox};
use crate::config::{Config, RadiusUpdate};
use crate::geometry::{angle_at, is_to_the_right_of_vector, Vec2, EPSILON_7, TWO_PI};
use crate::turtle::EXTERIOR_Y;
use crate::types::PairTable;

/// One loop of the structure together with the stem leading into it.
#[derive(Clone, Debug)]
pub struct TreeNode {
    /// Preorder number; the exterior loop is 0.
    pub id: usize,
    pub parent: Option<usize>,
    pub children: Vec<usize>,
    /// Base opening the loop's closing pair (1 for the exterior).
    pub loop_start: usize,
    /// First base of the stem leading into the loop; `None` for the exterior.
    pub stem_start: Option<usize>,
    /// Empty for the exterior.
    pub cfg: Config,
    pub loop_box: LoopBox,
    pub stem_box: StemBox,
    pub aabb: Aabb,
}

/// Arena of loop nodes indexed by preorder id.
#[derive(Clone, Debug)]
pub struct ConfigTree {
    nodes: Vec<TreeNode>,
    paired: f64,
    unpaired: f64,
}

impl ConfigTree {
    /// Build the tree and its bounding shapes from the baseline drawing.
    ///
    /// `configs` is indexed by loop start as produced by
    /// [`generate_configs`](crate::config::generate_configs).
    pub fn build(
        pt: &PairTable,
        configs: &[Option<Config>],
        coords: &[Vec2],
        paired: f64,
        unpaired: f64,
    ) -> Self {
        let mut builder = Builder {
            pt,
            configs,
            coords,
            bulge_dist: (unpaired * unpaired - 0.25 * unpaired * unpaired).sqrt(),
            nodes: vec![TreeNode {
                id: 0,
                parent: None,
                children: Vec::new(),
                loop_start: 1,
                stem_start: None,
                cfg: Config::default(),
                loop_box: LoopBox::default(),
                stem_box: StemBox::default(),
                aabb: Aabb::default(),
            }],
        };

        let n = pt.len();
        let mut i = 1;
        while i < n {
            if pt.partner(i) > i {
                builder.stem(0, i);
                i = pt.partner(i);
            }
            i += 1;
        }

        Self {
            nodes: builder.nodes,
            paired,
            unpaired,
        }
    }

    pub fn paired(&self) -> f64 {
        self.paired
    }

    pub fn unpaired(&self) -> f64 {
        self.unpaired
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn nodes(&self) -> &[TreeNode] {
        &self.nodes
    }

    pub fn node(&self, id: usize) -> &TreeNode {
        &self.nodes[id]
    }

    pub(crate) fn node_mut(&mut self, id: usize) -> &mut TreeNode {
        &mut self.nodes[id]
    }

    pub fn is_exterior(&self, id: usize) -> bool {
        id == 0
    }

    pub fn parent(&self, id: usize) -> Option<usize> {
        self.nodes[id].parent
    }

    pub fn children(&self, id: usize) -> &[usize] {
        &self.nodes[id].children
    }

    pub fn is_interior_loop(&self, id: usize) -> bool {
        !self.is_exterior(id) && self.nodes[id].children.len() == 1
    }

    pub fn is_multi_loop(&self, id: usize) -> bool {
        !self.is_exterior(id) && self.nodes[id].children.len() > 1
    }

    /// Whether `id` is an interior loop whose child continues its stem
    /// in a straight line.
    pub fn is_straight_interior_loop(&self, id: usize) -> bool {
        self.is_interior_loop(id) && self.child_angle(id, self.nodes[id].children[0]) == PI
    }

    /// `id` followed by all its descendants in preorder.
    pub fn subtree(&self, id: usize) -> Vec<usize> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(node) = stack.pop() {
            out.push(node);
            stack.extend(self.nodes[node].children.iter().rev());
        }
        out
    }

    /// Parent chain of `id`, nearest first, ending with the exterior.
    pub fn ancestors(&self, id: usize) -> Vec<usize> {
        std::iter::successors(self.parent(id), |&a| self.parent(a)).collect()
    }

    /// Index of the child of `id` whose subtree holds node `target`.
    pub fn child_index(&self, id: usize, target: usize) -> Option<usize> {
        let children = &self.nodes[id].children;
        children
            .iter()
            .position(|&c| c > target)
            .unwrap_or(children.len())
            .checked_sub(1)
    }

    /// Clockwise angle at `parent`'s loop center from its own stem to
    /// `child`'s loop center, in `[0, 2π)`.
    pub fn child_angle(&self, parent: usize, child: usize) -> f64 {
        let p = &self.nodes[parent];
        let loop_center = p.loop_box.center;
        let stem_center = p.stem_box.c;
        let child_center = self.nodes[child].loop_box.center;

        let angle = angle_at(stem_center, loop_center, child_center);
        if is_to_the_right_of_vector(loop_center, stem_center - loop_center, child_center) {
            angle
        } else {
            TWO_PI - angle
        }
    }

    /// Re-derive loop and stem positions below `id` from the configs.
    ///
    /// The node's own stem stays fixed; its loop is moved to the end of
    /// the stem, then every child stem is re-aimed along its arc.
    pub fn update_bounding_boxes(&mut self, id: usize) {
        let (paired, unpaired) = (self.paired, self.unpaired);
        let exterior = self.is_exterior(id);

        if !exterior {
            let node = &mut self.nodes[id];
            let r = node.cfg.radius;
            let stem_length = quantize(node.stem_box.half_length, unpaired);
            let dist = 0.5 * stem_length + (r * r - 0.25 * paired * paired).sqrt();
            node.loop_box.center = node.stem_box.c + node.stem_box.a * dist;
            node.loop_box.radius = r;
            node.aabb = Aabb::enclosing(&node.stem_box, &node.loop_box);
        }

        let (center, stem_dir, stem_offset) = {
            let node = &self.nodes[id];
            let r = node.cfg.radius;
            let offset = if exterior {
                0.0
            } else {
                (r * r - 0.25 * paired * paired).sqrt()
            };
            (node.loop_box.center, node.stem_box.a, offset)
        };

        let mut arc_sum = 0.0;
        for i in 0..self.nodes[id].children.len() {
            let child = self.nodes[id].children[i];
            let a = if exterior {
                Vec2::new(0.0, 1.0)
            } else {
                arc_sum += self.nodes[id].cfg.angle(i);
                stem_dir.rotate(arc_sum - PI)
            };

            let parent_center = if exterior {
                Vec2::new(self.nodes[child].loop_box.center.x, EXTERIOR_Y)
            } else {
                center
            };
            let stem = &mut self.nodes[child].stem_box;
            let stem_length = quantize(stem.half_length, unpaired);
            stem.half_length = 0.5 * stem_length;
            stem.half_width = 0.5 * paired;
            stem.a = a;
            stem.b = -a.normal();
            stem.c = parent_center + a * (stem_offset + 0.5 * stem_length);
            if stem_length == 0.0 {
                stem.half_length = EPSILON_7;
            }
        }

        for i in 0..self.nodes[id].children.len() {
            let child = self.nodes[id].children[i];
            self.update_bounding_boxes(child);
        }
    }

    /// Shift the whole subtree of `id` by `v`.
    pub fn translate(&mut self, id: usize, v: Vec2) {
        for node in self.subtree(id) {
            let node = &mut self.nodes[node];
            node.stem_box.translate(v);
            node.loop_box.translate(v);
            node.aabb = Aabb::enclosing(&node.stem_box, &node.loop_box);
        }
    }

    /// Change the config of `id` and refresh the shapes of its subtree.
    /// Returns the new radius.
    pub fn apply_changes(&mut self, id: usize, deltas: Option<&[f64]>, update: RadiusUpdate) -> f64 {
        let (paired, unpaired) = (self.paired, self.unpaired);
        let radius = self.nodes[id].cfg.apply_changes(deltas, update, paired, unpaired);
        self.update_bounding_boxes(id);
        radius
    }
}

/// Snap a stem's half extent to a whole number of backbone steps.
fn quantize(half_length: f64, unpaired: f64) -> f64 {
    unpaired * (2.0 * half_length / unpaired).round()
}

struct Builder<'a> {
    pt: &'a PairTable,
    configs: &'a [Option<Config>],
    coords: &'a [Vec2],
    bulge_dist: f64,
    nodes: Vec<TreeNode>,
}

impl Builder<'_> {
    /// Add the node for the stem opened at `stem_start`, then its children.
    fn stem(&mut self, parent: usize, stem_start: usize) {
        let n = self.pt.len();
        let Some((loop_start, cfg)) = (stem_start..=n)
            .find_map(|i| self.configs.get(i).and_then(|c| c.as_ref()).map(|c| (i, c)))
        else {
            return;
        };

        let loop_box = LoopBox::build(self.pt, self.coords, loop_start, cfg.radius);
        let stem_box = StemBox::build(self.pt, self.coords, stem_start, loop_start, self.bulge_dist);
        let id = self.nodes.len();
        self.nodes.push(TreeNode {
            id,
            parent: Some(parent),
            children: Vec::new(),
            loop_start,
            stem_start: Some(stem_start),
            cfg: cfg.clone(),
            aabb: Aabb::enclosing(&stem_box, &loop_box),
            loop_box,
            stem_box,
        });
        self.nodes[parent].children.push(id);

        let end = self.pt.partner(loop_start);
        let mut i = loop_start + 1;
        while i < end {
            if self.pt.partner(i) > i {
                self.stem(id, i);
                i = self.pt.partner(i);
            }
            i += 1;
        }
    }
}
