//! Data-pack backed advancement graph with reload.

use crate::config::ServerConfig;
use crate::packs;
use anyhow::{Context, Result};
use mdadvance_core::{AdvancementBuilder, AdvancementId, PlayerProfile};
use mdadvance_server::{
    AdvancementHooks, LogHooks, PlayerAdvancements, ProgressStore, TriggerRegistry,
};
use mdadvance_tree::{AdvancementGraph, LoadReport};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Build a graph from definitions and lay out every displayed root.
pub fn build_graph(
    definitions: BTreeMap<AdvancementId, AdvancementBuilder>,
) -> (AdvancementGraph, LoadReport) {
    let (mut graph, report) = AdvancementGraph::from_builders(definitions);
    graph.layout_roots();
    (graph, report)
}

/// Owns the current advancement graph.
///
/// Readers hold an `Arc` to the graph they started with; a reload builds the
/// replacement off to the side and swaps it in only when complete.
#[derive(Debug)]
pub struct AdvancementManager {
    packs_dir: PathBuf,
    store: ProgressStore,
    announce_advancements: bool,
    graph: Arc<AdvancementGraph>,
}

impl AdvancementManager {
    /// Manager with an empty graph; call [`Self::reload`] to read the packs.
    pub fn new(config: &ServerConfig) -> Self {
        Self {
            packs_dir: config.data_packs_dir.clone(),
            store: ProgressStore::new(&config.player_data_dir),
            announce_advancements: config.announce_advancements,
            graph: Arc::new(AdvancementGraph::new()),
        }
    }

    /// Create and load in one step.
    pub fn load(config: &ServerConfig) -> Result<Self> {
        let mut manager = Self::new(config);
        manager.reload()?;
        Ok(manager)
    }

    /// Current graph.
    pub fn graph(&self) -> Arc<AdvancementGraph> {
        Arc::clone(&self.graph)
    }

    /// Player progress store.
    pub fn store(&self) -> &ProgressStore {
        &self.store
    }

    /// Re-read every data pack and swap in the new graph.
    ///
    /// Definitions whose parent never resolves are dropped from the new graph
    /// and listed in the report; the rest of the graph is still used.
    #[instrument(skip(self), fields(packs_dir = %self.packs_dir.display()))]
    pub fn reload(&mut self) -> Result<LoadReport> {
        let definitions = packs::load_advancements(&self.packs_dir)
            .with_context(|| format!("Failed to load data packs from {}", self.packs_dir.display()))?;
        let (graph, report) = build_graph(definitions);
        if !report.unresolved.is_empty() {
            warn!(
                unresolved = report.unresolved.len(),
                "Some advancements were not loaded"
            );
        }
        info!(
            advancements = graph.len(),
            roots = graph.roots().count(),
            "Advancement graph reloaded"
        );
        self.graph = Arc::new(graph);
        Ok(report)
    }

    /// Advancement state for a joining player, using logging hooks.
    pub fn join(
        &self,
        profile: PlayerProfile,
        triggers: Box<dyn TriggerRegistry>,
    ) -> PlayerAdvancements {
        self.join_with_hooks(profile, triggers, Box::new(LogHooks::new(self.announce_advancements)))
    }

    /// Advancement state for a joining player with host-provided hooks.
    pub fn join_with_hooks(
        &self,
        profile: PlayerProfile,
        triggers: Box<dyn TriggerRegistry>,
        hooks: Box<dyn AdvancementHooks>,
    ) -> PlayerAdvancements {
        PlayerAdvancements::new(
            profile,
            self.graph(),
            triggers,
            hooks,
            Some(self.store.clone()),
        )
    }

    /// Reload the graph and every connected player against it.
    pub fn reload_players<'a>(
        &mut self,
        players: impl IntoIterator<Item = &'a mut PlayerAdvancements>,
    ) -> Result<LoadReport> {
        let report = self.reload()?;
        for player in players {
            player.save();
            player.reload(self.graph());
        }
        Ok(report)
    }
}
