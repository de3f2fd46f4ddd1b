//! The advancement forest.
//!
//! Builders are resolved in dependency order with a worklist: each pass builds
//! every builder whose parent is already in the graph and re-queues the rest.
//! A pass that builds nothing ends the load and everything still queued is
//! reported as unresolved. Whatever did resolve stays in the graph.

use crate::layout::{LayoutResult, TreeLayout};
use mdadvance_core::{Advancement, AdvancementBuilder, AdvancementId, DisplayPosition};
use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Errors surfaced by graph loading.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    /// Builders whose parent chain never resolved (missing parent or cycle).
    #[error("couldn't load {} advancement(s): {}", ids.len(), join_ids(ids))]
    Unresolved {
        /// Every builder left in the worklist.
        ids: Vec<AdvancementId>,
    },
}

fn join_ids(ids: &[AdvancementId]) -> String {
    ids.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Push notifications for collaborators mirroring the graph (e.g., the
/// advancement screen's tabs).
pub trait GraphListener: Send + Sync {
    /// A root was added.
    fn on_add_root(&mut self, advancement: &Advancement);
    /// A root was removed.
    fn on_remove_root(&mut self, advancement: &Advancement);
    /// A non-root was added.
    fn on_add_task(&mut self, advancement: &Advancement);
    /// A non-root was removed.
    fn on_remove_task(&mut self, advancement: &Advancement);
    /// Everything was cleared.
    fn on_cleared(&mut self);
}

/// Outcome of [`AdvancementGraph::load`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    /// Number of advancements built by this load.
    pub loaded: usize,
    /// Builders whose id was already present; they were skipped.
    pub duplicates: Vec<AdvancementId>,
    /// Builders whose parent never resolved.
    pub unresolved: Vec<AdvancementId>,
}

impl LoadReport {
    /// Turn unresolved builders into an error.
    pub fn check(&self) -> Result<(), GraphError> {
        if self.unresolved.is_empty() {
            Ok(())
        } else {
            Err(GraphError::Unresolved {
                ids: self.unresolved.clone(),
            })
        }
    }
}

struct Node {
    advancement: Advancement,
    children: Vec<AdvancementId>,
}

/// All advancement definitions with parent/child links and the layout side
/// table.
#[derive(Default)]
pub struct AdvancementGraph {
    nodes: BTreeMap<AdvancementId, Node>,
    roots: Vec<AdvancementId>,
    tasks: Vec<AdvancementId>,
    positions: BTreeMap<AdvancementId, DisplayPosition>,
    listener: Option<Box<dyn GraphListener>>,
}

impl fmt::Debug for AdvancementGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdvancementGraph")
            .field("advancements", &self.nodes.len())
            .field("roots", &self.roots)
            .field("positions", &self.positions.len())
            .finish()
    }
}

impl AdvancementGraph {
    /// Empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a fresh graph from pending builders.
    pub fn from_builders(pending: BTreeMap<AdvancementId, AdvancementBuilder>) -> (Self, LoadReport) {
        let mut graph = Self::new();
        let report = graph.load(pending);
        (graph, report)
    }

    /// Add builders to the graph, resolving parents in dependency order.
    pub fn load(&mut self, pending: BTreeMap<AdvancementId, AdvancementBuilder>) -> LoadReport {
        let mut report = LoadReport::default();
        let mut queue: VecDeque<(AdvancementId, AdvancementBuilder)> = VecDeque::new();
        for (id, builder) in pending {
            if self.nodes.contains_key(&id) {
                warn!("Advancement {id} is already loaded, ignoring duplicate");
                report.duplicates.push(id);
            } else {
                queue.push_back((id, builder));
            }
        }

        while !queue.is_empty() {
            let mut progressed = false;
            for _ in 0..queue.len() {
                let Some((id, builder)) = queue.pop_front() else {
                    break;
                };
                if !builder.resolves(|parent| self.nodes.contains_key(parent)) {
                    queue.push_back((id, builder));
                    continue;
                }
                match builder.build(id.clone(), |parent| self.nodes.contains_key(parent)) {
                    Ok(advancement) => {
                        self.insert(advancement);
                        report.loaded += 1;
                        progressed = true;
                    }
                    Err(err) => {
                        error!("Couldn't build advancement {id}: {err}");
                        report.unresolved.push(id);
                    }
                }
            }

            if !progressed {
                for (id, builder) in queue.drain(..) {
                    error!(
                        "Couldn't load advancement {id}: parent {} never resolved",
                        builder
                            .parent_id()
                            .map(ToString::to_string)
                            .unwrap_or_else(|| "<none>".to_string())
                    );
                    report.unresolved.push(id);
                }
            }
        }

        info!("Loaded {} advancements", self.nodes.len());
        report
    }

    fn insert(&mut self, advancement: Advancement) {
        let id = advancement.id().clone();
        match advancement.parent() {
            Some(parent) => {
                if let Some(parent) = self.nodes.get_mut(parent) {
                    parent.children.push(id.clone());
                }
                self.tasks.push(id.clone());
                if let Some(listener) = self.listener.as_mut() {
                    listener.on_add_task(&advancement);
                }
            }
            None => {
                self.roots.push(id.clone());
                if let Some(listener) = self.listener.as_mut() {
                    listener.on_add_root(&advancement);
                }
            }
        }
        self.nodes.insert(
            id,
            Node {
                advancement,
                children: Vec::new(),
            },
        );
    }

    /// Remove advancements and all their descendants. Unknown ids are
    /// logged and skipped.
    pub fn remove_all<'a>(&mut self, ids: impl IntoIterator<Item = &'a AdvancementId>) {
        for id in ids {
            if self.nodes.contains_key(id) {
                self.remove(id);
            } else {
                warn!("Told to remove advancement {id} but I don't know what that is");
            }
        }
    }

    fn remove(&mut self, id: &AdvancementId) {
        let children = match self.nodes.get(id) {
            Some(node) => node.children.clone(),
            None => return,
        };
        for child in &children {
            self.remove(child);
        }

        let Some(node) = self.nodes.remove(id) else {
            return;
        };
        self.positions.remove(id);
        debug!("Forgot about advancement {id}");
        match node.advancement.parent() {
            Some(parent) => {
                if let Some(parent) = self.nodes.get_mut(parent) {
                    parent.children.retain(|child| child != id);
                }
                self.tasks.retain(|task| task != id);
                if let Some(listener) = self.listener.as_mut() {
                    listener.on_remove_task(&node.advancement);
                }
            }
            None => {
                self.roots.retain(|root| root != id);
                if let Some(listener) = self.listener.as_mut() {
                    listener.on_remove_root(&node.advancement);
                }
            }
        }
    }

    /// Drop every advancement and position.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.roots.clear();
        self.tasks.clear();
        self.positions.clear();
        if let Some(listener) = self.listener.as_mut() {
            listener.on_cleared();
        }
    }

    /// Install (or remove) the listener. A new listener is told about every
    /// existing root, then every existing task.
    pub fn set_listener(&mut self, listener: Option<Box<dyn GraphListener>>) {
        self.listener = listener;
        if let Some(listener) = self.listener.as_mut() {
            for id in &self.roots {
                if let Some(node) = self.nodes.get(id) {
                    listener.on_add_root(&node.advancement);
                }
            }
            for id in &self.tasks {
                if let Some(node) = self.nodes.get(id) {
                    listener.on_add_task(&node.advancement);
                }
            }
        }
    }

    /// Look up an advancement.
    pub fn get(&self, id: &AdvancementId) -> Option<&Advancement> {
        self.nodes.get(id).map(|node| &node.advancement)
    }

    /// Whether an id is loaded.
    pub fn contains(&self, id: &AdvancementId) -> bool {
        self.nodes.contains_key(id)
    }

    /// Every advancement, ordered by id.
    pub fn advancements(&self) -> impl Iterator<Item = &Advancement> {
        self.nodes.values().map(|node| &node.advancement)
    }

    /// Roots in insertion order.
    pub fn roots(&self) -> impl Iterator<Item = &Advancement> {
        self.roots.iter().filter_map(|id| self.get(id))
    }

    /// Non-roots in insertion order.
    pub fn tasks(&self) -> impl Iterator<Item = &Advancement> {
        self.tasks.iter().filter_map(|id| self.get(id))
    }

    /// Children of an advancement in insertion order.
    pub fn children(&self, id: &AdvancementId) -> &[AdvancementId] {
        self.nodes
            .get(id)
            .map(|node| node.children.as_slice())
            .unwrap_or(&[])
    }

    /// Parent of an advancement, if loaded.
    pub fn parent(&self, id: &AdvancementId) -> Option<&Advancement> {
        self.get(id)
            .and_then(Advancement::parent)
            .and_then(|parent| self.get(parent))
    }

    /// Number of advancements.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the graph is empty.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Position computed by the last layout pass.
    pub fn position(&self, id: &AdvancementId) -> Option<DisplayPosition> {
        self.positions.get(id).copied()
    }

    /// Store layout results in the side table.
    pub fn set_layout(&mut self, layout: LayoutResult) {
        self.positions.extend(layout);
    }

    /// Store a single position (used by clients receiving positions).
    pub fn set_position(&mut self, id: AdvancementId, position: DisplayPosition) {
        self.positions.insert(id, position);
    }

    /// Lay out every displayed root and replace the side table.
    pub fn layout_roots(&mut self) {
        self.positions.clear();
        let mut results = Vec::new();
        for root in self.roots() {
            if root.display().is_none() {
                continue;
            }
            match TreeLayout::layout(self, root.id()) {
                Ok(result) => results.push(result),
                Err(err) => warn!("Skipping layout of {}: {err}", root.id()),
            }
        }
        for result in results {
            self.set_layout(result);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mdadvance_core::DisplayInfo;
    use std::sync::{Arc, Mutex};

    fn id(s: &str) -> AdvancementId {
        AdvancementId::parse(s).unwrap()
    }

    fn child_of(parent: &str) -> AdvancementBuilder {
        AdvancementBuilder::new().parent(id(parent))
    }

    #[derive(Default, Clone)]
    struct Recorder(Arc<Mutex<Vec<String>>>);

    impl Recorder {
        fn events(&self) -> Vec<String> {
            self.0.lock().unwrap().clone()
        }
    }

    impl GraphListener for Recorder {
        fn on_add_root(&mut self, a: &Advancement) {
            self.0.lock().unwrap().push(format!("add_root {}", a.id()));
        }
        fn on_remove_root(&mut self, a: &Advancement) {
            self.0.lock().unwrap().push(format!("remove_root {}", a.id()));
        }
        fn on_add_task(&mut self, a: &Advancement) {
            self.0.lock().unwrap().push(format!("add_task {}", a.id()));
        }
        fn on_remove_task(&mut self, a: &Advancement) {
            self.0.lock().unwrap().push(format!("remove_task {}", a.id()));
        }
        fn on_cleared(&mut self) {
            self.0.lock().unwrap().push("cleared".to_string());
        }
    }

    #[test]
    fn resolves_out_of_order_builders() {
        let mut pending = BTreeMap::new();
        // Lexical order puts the grandchild first.
        pending.insert(id("a/a"), child_of("b"));
        pending.insert(id("b"), child_of("c"));
        pending.insert(id("c"), AdvancementBuilder::new());

        let (graph, report) = AdvancementGraph::from_builders(pending);
        assert_eq!(report.loaded, 3);
        assert!(report.check().is_ok());
        assert_eq!(graph.roots().count(), 1);
        assert_eq!(graph.tasks().count(), 2);
        assert_eq!(graph.children(&id("c")), &[id("b")]);
        assert_eq!(graph.parent(&id("a/a")).map(|p| p.id().clone()), Some(id("b")));
    }

    #[test]
    fn partial_failure_keeps_resolved_nodes() {
        let mut pending = BTreeMap::new();
        pending.insert(id("a"), AdvancementBuilder::new());
        pending.insert(id("b"), child_of("a"));
        pending.insert(id("c"), child_of("missing"));

        let (graph, report) = AdvancementGraph::from_builders(pending);
        assert_eq!(report.loaded, 2);
        assert_eq!(report.unresolved, vec![id("c")]);
        assert!(graph.contains(&id("a")));
        assert!(graph.contains(&id("b")));
        assert!(!graph.contains(&id("c")));
        assert_eq!(
            report.check(),
            Err(GraphError::Unresolved { ids: vec![id("c")] })
        );
    }

    #[test]
    fn cycles_are_reported_as_unresolved() {
        let mut pending = BTreeMap::new();
        pending.insert(id("x"), child_of("y"));
        pending.insert(id("y"), child_of("x"));
        let (graph, report) = AdvancementGraph::from_builders(pending);
        assert!(graph.is_empty());
        assert_eq!(report.unresolved.len(), 2);
    }

    #[test]
    fn removal_is_post_order_and_tolerates_unknown_ids() {
        let mut pending = BTreeMap::new();
        pending.insert(id("root"), AdvancementBuilder::new());
        pending.insert(id("mid"), child_of("root"));
        pending.insert(id("leaf"), child_of("mid"));
        let (mut graph, _) = AdvancementGraph::from_builders(pending);

        let recorder = Recorder::default();
        graph.set_listener(Some(Box::new(recorder.clone())));
        assert_eq!(recorder.events().len(), 3);

        graph.remove_all([&id("mid"), &id("unknown")]);
        let events = recorder.events();
        assert_eq!(
            &events[3..],
            &["remove_task minecraft:leaf", "remove_task minecraft:mid"]
        );
        assert!(graph.children(&id("root")).is_empty());
        assert_eq!(graph.len(), 1);

        graph.remove_all([&id("root")]);
        assert!(graph.is_empty());
        assert_eq!(recorder.events().last().unwrap(), "remove_root minecraft:root");
    }

    #[test]
    fn listener_sees_incremental_adds_and_clear() {
        let mut graph = AdvancementGraph::new();
        let recorder = Recorder::default();
        graph.set_listener(Some(Box::new(recorder.clone())));

        let mut pending = BTreeMap::new();
        pending.insert(id("r"), AdvancementBuilder::new());
        graph.load(pending);
        let mut pending = BTreeMap::new();
        pending.insert(id("t"), child_of("r"));
        graph.load(pending);
        graph.clear();

        assert_eq!(
            recorder.events(),
            vec!["add_root minecraft:r", "add_task minecraft:t", "cleared"]
        );
    }

    #[test]
    fn duplicate_ids_are_skipped() {
        let mut graph = AdvancementGraph::new();
        let mut pending = BTreeMap::new();
        pending.insert(id("r"), AdvancementBuilder::new());
        graph.load(pending.clone());
        let report = graph.load(pending);
        assert_eq!(report.duplicates, vec![id("r")]);
        assert_eq!(graph.roots().count(), 1);
    }

    #[test]
    fn layout_roots_skips_invisible_roots() {
        let mut pending = BTreeMap::new();
        pending.insert(id("shown"), AdvancementBuilder::new().display(DisplayInfo::new("Shown", "stone")));
        pending.insert(id("hidden_root"), AdvancementBuilder::new());
        let (mut graph, _) = AdvancementGraph::from_builders(pending);
        graph.layout_roots();
        assert_eq!(graph.position(&id("shown")), Some(DisplayPosition::new(0.0, 0.0)));
        assert_eq!(graph.position(&id("hidden_root")), None);
    }
}
