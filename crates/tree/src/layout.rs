//! Tree layout for the advancement screen.
//!
//! A Reingold–Tilford layout (with the linear-time ancestor/thread
//! bookkeeping of Walker and Buchheim et al.) over a throwaway wrapper tree.
//! The wrapper tree only contains advancements with display metadata;
//! children of invisible advancements are lifted into the nearest visible
//! ancestor, keeping their left-to-right order.
//!
//! `x` is the depth (column) and `y` the row. Rows start out relative to the
//! previous sibling and are made absolute in the second walk; a third walk
//! shifts everything down when a row went negative.

use crate::graph::AdvancementGraph;
use mdadvance_core::{AdvancementId, DisplayPosition};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::debug;

/// Layout precondition violations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LayoutError {
    /// The requested root has no display metadata.
    #[error("can't position children of an invisible root {0}")]
    InvisibleRoot(AdvancementId),
    /// The requested root is not in the graph.
    #[error("unknown layout root {0}")]
    UnknownRoot(AdvancementId),
}

/// Positions computed by one layout run, keyed by advancement id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LayoutResult {
    positions: BTreeMap<AdvancementId, DisplayPosition>,
}

impl LayoutResult {
    /// Position of one advancement.
    pub fn get(&self, id: &AdvancementId) -> Option<DisplayPosition> {
        self.positions.get(id).copied()
    }

    /// All positions, ordered by id.
    pub fn iter(&self) -> impl Iterator<Item = (&AdvancementId, &DisplayPosition)> {
        self.positions.iter()
    }

    /// Number of positioned advancements.
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    /// Whether nothing was positioned.
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

impl IntoIterator for LayoutResult {
    type Item = (AdvancementId, DisplayPosition);
    type IntoIter = std::collections::btree_map::IntoIter<AdvancementId, DisplayPosition>;

    fn into_iter(self) -> Self::IntoIter {
        self.positions.into_iter()
    }
}

/// Wrapper node. Links are arena indices.
#[derive(Debug)]
struct LayoutNode {
    id: AdvancementId,
    parent: Option<usize>,
    /// Previous sibling among the parent's wrapper children.
    sibling: Option<usize>,
    /// 1-based position among the parent's wrapper children.
    index: usize,
    children: Vec<usize>,
    ancestor: usize,
    thread: Option<usize>,
    x: i32,
    y: f32,
    modifier: f32,
    change: f32,
    shift: f32,
}

/// Arena for a single layout run.
pub struct TreeLayout {
    nodes: Vec<LayoutNode>,
}

impl TreeLayout {
    /// Lay out the visible tree under `root`.
    pub fn layout(
        graph: &AdvancementGraph,
        root: &AdvancementId,
    ) -> Result<LayoutResult, LayoutError> {
        let advancement = graph
            .get(root)
            .ok_or_else(|| LayoutError::UnknownRoot(root.clone()))?;
        if advancement.display().is_none() {
            return Err(LayoutError::InvisibleRoot(root.clone()));
        }

        let mut tree = TreeLayout { nodes: Vec::new() };
        let root_node = tree.push_node(graph, root, None, None, 1, 0);
        tree.first_walk(root_node);
        let start = tree.nodes[root_node].y;
        let min = tree.second_walk(root_node, 0.0, 0, start);
        if min < 0.0 {
            tree.third_walk(root_node, -min);
        }

        debug!(root = %root, nodes = tree.nodes.len(), "Laid out advancement tree");
        Ok(tree.finish())
    }

    fn push_node(
        &mut self,
        graph: &AdvancementGraph,
        id: &AdvancementId,
        parent: Option<usize>,
        sibling: Option<usize>,
        index: usize,
        x: i32,
    ) -> usize {
        let node = self.nodes.len();
        self.nodes.push(LayoutNode {
            id: id.clone(),
            parent,
            sibling,
            index,
            children: Vec::new(),
            ancestor: node,
            thread: None,
            x,
            y: -1.0,
            modifier: 0.0,
            change: 0.0,
            shift: 0.0,
        });

        let mut previous = None;
        for child in graph.children(id) {
            previous = self.build_subtree(graph, node, child, previous);
        }
        node
    }

    /// Attach `id` (or, when invisible, its descendants) under `owner`.
    fn build_subtree(
        &mut self,
        graph: &AdvancementGraph,
        owner: usize,
        id: &AdvancementId,
        mut previous: Option<usize>,
    ) -> Option<usize> {
        let visible = graph
            .get(id)
            .is_some_and(|advancement| advancement.display().is_some());
        if visible {
            let index = self.nodes[owner].children.len() + 1;
            let x = self.nodes[owner].x + 1;
            let node = self.push_node(graph, id, Some(owner), previous, index, x);
            self.nodes[owner].children.push(node);
            Some(node)
        } else {
            for child in graph.children(id) {
                previous = self.build_subtree(graph, owner, child, previous);
            }
            previous
        }
    }

    fn first_walk(&mut self, v: usize) {
        if self.nodes[v].children.is_empty() {
            self.nodes[v].y = match self.nodes[v].sibling {
                Some(sibling) => self.nodes[sibling].y + 1.0,
                None => 0.0,
            };
            return;
        }

        let children = self.nodes[v].children.clone();
        let mut default_ancestor: Option<usize> = None;
        for &child in &children {
            self.first_walk(child);
            default_ancestor = Some(self.apportion(child, default_ancestor.unwrap_or(child)));
        }
        self.execute_shifts(v);

        let first = self.nodes[children[0]].y;
        let last = self.nodes[children[children.len() - 1]].y;
        let midpoint = (first + last) / 2.0;
        match self.nodes[v].sibling {
            Some(sibling) => {
                let y = self.nodes[sibling].y + 1.0;
                self.nodes[v].y = y;
                self.nodes[v].modifier = y - midpoint;
            }
            None => self.nodes[v].y = midpoint,
        }
    }

    fn second_walk(&mut self, v: usize, mod_sum: f32, depth: i32, mut min: f32) -> f32 {
        let node = &mut self.nodes[v];
        node.y += mod_sum;
        node.x = depth;
        if node.y < min {
            min = node.y;
        }
        let child_sum = mod_sum + node.modifier;
        let children = node.children.clone();
        for child in children {
            min = self.second_walk(child, child_sum, depth + 1, min);
        }
        min
    }

    fn third_walk(&mut self, v: usize, offset: f32) {
        self.nodes[v].y += offset;
        let children = self.nodes[v].children.clone();
        for child in children {
            self.third_walk(child, offset);
        }
    }

    /// Apply accumulated shifts right to left.
    fn execute_shifts(&mut self, v: usize) {
        let mut shift = 0.0;
        let mut change = 0.0;
        let children = self.nodes[v].children.clone();
        for &child in children.iter().rev() {
            let node = &mut self.nodes[child];
            node.y += shift;
            node.modifier += shift;
            change += node.change;
            shift += node.shift + change;
        }
    }

    fn first_child(&self, v: usize) -> Option<usize> {
        self.nodes[v]
            .thread
            .or_else(|| self.nodes[v].children.first().copied())
    }

    fn last_child(&self, v: usize) -> Option<usize> {
        self.nodes[v]
            .thread
            .or_else(|| self.nodes[v].children.last().copied())
    }

    /// Push the subtree of `v` clear of everything left of it, walking the
    /// facing contours level by level.
    fn apportion(&mut self, v: usize, default_ancestor: usize) -> usize {
        let (Some(sibling), Some(parent)) = (self.nodes[v].sibling, self.nodes[v].parent) else {
            return default_ancestor;
        };

        let mut inner_right = v;
        let mut outer_right = v;
        let mut inner_left = sibling;
        let mut outer_left = self.nodes[parent].children[0];
        let mut sum_inner_right = self.nodes[inner_right].modifier;
        let mut sum_outer_right = self.nodes[outer_right].modifier;
        let mut sum_inner_left = self.nodes[inner_left].modifier;
        let mut sum_outer_left = self.nodes[outer_left].modifier;

        while let (Some(next_left), Some(next_right)) =
            (self.last_child(inner_left), self.first_child(inner_right))
        {
            inner_left = next_left;
            inner_right = next_right;
            outer_left = self.first_child(outer_left).unwrap_or(outer_left);
            outer_right = self.last_child(outer_right).unwrap_or(outer_right);
            self.nodes[outer_right].ancestor = v;

            let overlap = self.nodes[inner_left].y + sum_inner_left
                - (self.nodes[inner_right].y + sum_inner_right)
                + 1.0;
            if overlap > 0.0 {
                let ancestor = self.ancestor_of(inner_left, v, default_ancestor);
                self.move_subtree(ancestor, v, overlap);
                sum_inner_right += overlap;
                sum_outer_right += overlap;
            }

            sum_inner_left += self.nodes[inner_left].modifier;
            sum_inner_right += self.nodes[inner_right].modifier;
            sum_outer_left += self.nodes[outer_left].modifier;
            sum_outer_right += self.nodes[outer_right].modifier;
        }

        if self.last_child(inner_left).is_some() && self.last_child(outer_right).is_none() {
            self.nodes[outer_right].thread = self.last_child(inner_left);
            self.nodes[outer_right].modifier += sum_inner_left - sum_outer_right;
            default_ancestor
        } else {
            if self.first_child(inner_right).is_some() && self.first_child(outer_left).is_none() {
                self.nodes[outer_left].thread = self.first_child(inner_right);
                self.nodes[outer_left].modifier += sum_inner_right - sum_outer_left;
            }
            v
        }
    }

    /// Shift `right` by `shift` and spread the change over the siblings
    /// between `left` and `right`.
    fn move_subtree(&mut self, left: usize, right: usize, shift: f32) {
        let subtrees = self.nodes[right].index as f32 - self.nodes[left].index as f32;
        if subtrees != 0.0 {
            self.nodes[right].change -= shift / subtrees;
            self.nodes[left].change += shift / subtrees;
        }
        let node = &mut self.nodes[right];
        node.shift += shift;
        node.y += shift;
        node.modifier += shift;
    }

    /// The greatest uncommon ancestor of `inner_left`, if it is a sibling of
    /// `v`; otherwise `default_ancestor`.
    fn ancestor_of(&self, inner_left: usize, v: usize, default_ancestor: usize) -> usize {
        let ancestor = self.nodes[inner_left].ancestor;
        let is_sibling = self.nodes[v]
            .parent
            .is_some_and(|parent| self.nodes[parent].children.contains(&ancestor));
        if is_sibling {
            ancestor
        } else {
            default_ancestor
        }
    }

    fn finish(self) -> LayoutResult {
        LayoutResult {
            positions: self
                .nodes
                .into_iter()
                .map(|node| (node.id, DisplayPosition::new(node.x as f32, node.y)))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mdadvance_core::{AdvancementBuilder, DisplayInfo};
    use proptest::prelude::*;

    fn id(s: &str) -> AdvancementId {
        AdvancementId::parse(s).unwrap()
    }

    /// `(id, parent, visible)` triples.
    fn graph(entries: &[(&str, Option<&str>, bool)]) -> AdvancementGraph {
        let mut pending = BTreeMap::new();
        for (name, parent, visible) in entries {
            let mut builder = AdvancementBuilder::new();
            if let Some(parent) = parent {
                builder = builder.parent(id(parent));
            }
            if *visible {
                builder = builder.display(DisplayInfo::new(*name, "stone"));
            }
            pending.insert(id(name), builder);
        }
        let (graph, report) = AdvancementGraph::from_builders(pending);
        assert!(report.check().is_ok());
        graph
    }

    fn pos(result: &LayoutResult, name: &str) -> (f32, f32) {
        let p = result.get(&id(name)).unwrap();
        (p.x, p.y)
    }

    #[test]
    fn lone_root_sits_at_origin() {
        let g = graph(&[("root", None, true)]);
        let result = TreeLayout::layout(&g, &id("root")).unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(pos(&result, "root"), (0.0, 0.0));
    }

    #[test]
    fn parent_centres_over_children() {
        let g = graph(&[
            ("r", None, true),
            ("a", Some("r"), true),
            ("b", Some("r"), true),
            ("c", Some("r"), true),
        ]);
        let result = TreeLayout::layout(&g, &id("r")).unwrap();
        assert_eq!(pos(&result, "r"), (0.0, 1.0));
        assert_eq!(pos(&result, "a"), (1.0, 0.0));
        assert_eq!(pos(&result, "b"), (1.0, 1.0));
        assert_eq!(pos(&result, "c"), (1.0, 2.0));
    }

    #[test]
    fn overlapping_subtrees_are_pushed_apart() {
        let g = graph(&[
            ("r", None, true),
            ("a", Some("r"), true),
            ("a1", Some("a"), true),
            ("a2", Some("a"), true),
            ("b", Some("r"), true),
            ("b1", Some("b"), true),
            ("b2", Some("b"), true),
        ]);
        let result = TreeLayout::layout(&g, &id("r")).unwrap();
        assert_eq!(pos(&result, "r"), (0.0, 1.5));
        assert_eq!(pos(&result, "a"), (1.0, 0.5));
        assert_eq!(pos(&result, "b"), (1.0, 2.5));
        assert_eq!(pos(&result, "a1"), (2.0, 0.0));
        assert_eq!(pos(&result, "a2"), (2.0, 1.0));
        assert_eq!(pos(&result, "b1"), (2.0, 2.0));
        assert_eq!(pos(&result, "b2"), (2.0, 3.0));
    }

    #[test]
    fn touching_subtrees_keep_their_rows() {
        let g = graph(&[
            ("r", None, true),
            ("a", Some("r"), true),
            ("a1", Some("a"), true),
            ("b", Some("r"), true),
            ("b1", Some("b"), true),
        ]);
        let result = TreeLayout::layout(&g, &id("r")).unwrap();
        assert_eq!(pos(&result, "a"), (1.0, 0.0));
        assert_eq!(pos(&result, "b"), (1.0, 1.0));
        assert_eq!(pos(&result, "a1"), (2.0, 0.0));
        assert_eq!(pos(&result, "b1"), (2.0, 1.0));
        assert_eq!(pos(&result, "r"), (0.0, 0.5));
    }

    #[test]
    fn negative_rows_are_normalised() {
        let g = graph(&[
            ("r", None, true),
            ("a", Some("r"), true),
            ("b", Some("r"), true),
            ("b1", Some("b"), true),
            ("b2", Some("b"), true),
            ("b3", Some("b"), true),
            ("b4", Some("b"), true),
            ("b5", Some("b"), true),
        ]);
        let result = TreeLayout::layout(&g, &id("r")).unwrap();
        assert_eq!(pos(&result, "r"), (0.0, 1.5));
        assert_eq!(pos(&result, "a"), (1.0, 1.0));
        assert_eq!(pos(&result, "b"), (1.0, 2.0));
        assert_eq!(pos(&result, "b1"), (2.0, 0.0));
        assert_eq!(pos(&result, "b5"), (2.0, 4.0));
        assert!(result.iter().all(|(_, p)| p.y >= 0.0));
    }

    #[test]
    fn invisible_nodes_are_spliced_out() {
        let g = graph(&[
            ("r", None, true),
            ("a", Some("r"), false),
            ("a1", Some("a"), true),
            ("a2", Some("a"), true),
            ("c", Some("r"), true),
        ]);
        assert_eq!(g.children(&id("r")), &[id("a"), id("c")]);
        let result = TreeLayout::layout(&g, &id("r")).unwrap();
        assert!(result.get(&id("a")).is_none());
        assert_eq!(pos(&result, "a1"), (1.0, 0.0));
        assert_eq!(pos(&result, "a2"), (1.0, 1.0));
        assert_eq!(pos(&result, "c"), (1.0, 2.0));
        assert_eq!(pos(&result, "r"), (0.0, 1.0));
    }

    #[test]
    fn invisible_or_unknown_root_is_rejected() {
        let g = graph(&[("r", None, false)]);
        assert_eq!(
            TreeLayout::layout(&g, &id("r")),
            Err(LayoutError::InvisibleRoot(id("r")))
        );
        assert_eq!(
            TreeLayout::layout(&g, &id("nope")),
            Err(LayoutError::UnknownRoot(id("nope")))
        );
    }

    /// Random tree where node `i` hangs off `parents[i - 1] % i`.
    fn random_graph(parents: &[usize], hidden: &[bool]) -> AdvancementGraph {
        let names: Vec<String> = (0..=parents.len()).map(|i| format!("n{i}")).collect();
        let mut entries = vec![(names[0].as_str(), None, true)];
        for (i, parent) in parents.iter().enumerate() {
            let node = i + 1;
            let visible = !hidden.get(i).copied().unwrap_or(false);
            entries.push((names[node].as_str(), Some(names[parent % node].as_str()), visible));
        }
        graph(&entries)
    }

    proptest! {
        #[test]
        fn rows_never_collide_within_a_column(
            parents in prop::collection::vec(any::<usize>(), 0..40),
            hidden in prop::collection::vec(prop::bool::weighted(0.15), 0..40),
        ) {
            let g = random_graph(&parents, &hidden);
            let result = TreeLayout::layout(&g, &id("n0")).unwrap();

            let mut columns: BTreeMap<i64, Vec<f32>> = BTreeMap::new();
            for (_, p) in result.iter() {
                prop_assert!(p.y >= 0.0);
                columns.entry(p.x as i64).or_default().push(p.y);
            }
            for rows in columns.values_mut() {
                rows.sort_by(|a, b| a.partial_cmp(b).unwrap());
                for pair in rows.windows(2) {
                    prop_assert!(pair[1] - pair[0] >= 1.0 - 1e-3, "rows {:?}", rows);
                }
            }
        }

        #[test]
        fn layout_is_deterministic(parents in prop::collection::vec(any::<usize>(), 0..30)) {
            let g = random_graph(&parents, &[]);
            let first = TreeLayout::layout(&g, &id("n0")).unwrap();
            let second = TreeLayout::layout(&g, &id("n0")).unwrap();
            prop_assert_eq!(first, second);
        }
    }
}
