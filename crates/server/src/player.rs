//! Per-player advancement state: progress, visibility and sync deltas.

use crate::hooks::{AdvancementHooks, Announcement};
use crate::store::{ProgressRecords, ProgressStore};
use crate::triggers::{CriterionListener, TriggerRegistry};
use mdadvance_core::{
    Advancement, AdvancementId, AdvancementProgress, PlayerProfile, AUTOMATIC_CRITERION,
};
use mdadvance_net::{AdvancementInfoMessage, AdvancementWire, SeenAdvancementsAction, ServerMessage};
use mdadvance_tree::AdvancementGraph;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

/// Levels examined by the visibility walk: the advancement, its parent and
/// its grandparent.
const VISIBILITY_DEPTH: usize = 3;

/// Changes accumulated since the previous flush.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AdvancementDelta {
    /// First sync of the session; the client drops what it knew.
    pub reset: bool,
    /// Progress of visible advancements that changed.
    pub added: BTreeMap<AdvancementId, AdvancementProgress>,
    /// Advancements that became visible.
    pub shown: Vec<AdvancementId>,
    /// Advancements that became invisible.
    pub hidden: Vec<AdvancementId>,
}

/// Change of the selected advancement tab.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TabSelection {
    /// Selected root, `None` when the selection was cleared.
    pub tab: Option<AdvancementId>,
}

impl From<TabSelection> for ServerMessage {
    fn from(selection: TabSelection) -> Self {
        ServerMessage::SelectAdvancementsTab { tab: selection.tab }
    }
}

/// Advancement state of one connected player.
///
/// Owned by the player's session and driven from the game loop; nothing here
/// locks. The graph is shared read-only and replaced through [`Self::reload`].
pub struct PlayerAdvancements {
    profile: PlayerProfile,
    graph: Arc<AdvancementGraph>,
    triggers: Box<dyn TriggerRegistry>,
    hooks: Box<dyn AdvancementHooks>,
    store: Option<ProgressStore>,
    progress: BTreeMap<AdvancementId, AdvancementProgress>,
    visible: BTreeSet<AdvancementId>,
    visibility_changed: BTreeSet<AdvancementId>,
    progress_changed: BTreeSet<AdvancementId>,
    last_selected_tab: Option<AdvancementId>,
    first_packet: bool,
}

impl fmt::Debug for PlayerAdvancements {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlayerAdvancements")
            .field("profile", &self.profile)
            .field("progress", &self.progress.len())
            .field("visible", &self.visible.len())
            .field("last_selected_tab", &self.last_selected_tab)
            .field("first_packet", &self.first_packet)
            .finish()
    }
}

/// Get-or-create the record for `advancement`, reconciled on creation.
fn start_progress<'a>(
    progress: &'a mut BTreeMap<AdvancementId, AdvancementProgress>,
    advancement: &Advancement,
) -> &'a mut AdvancementProgress {
    progress
        .entry(advancement.id().clone())
        .or_insert_with(|| {
            let mut record = AdvancementProgress::new();
            record.update_from(advancement);
            record
        })
}

impl PlayerAdvancements {
    /// Load the player's state from `store` (if any) against `graph`.
    ///
    /// Automatic advancements are granted, done advancements made visible and
    /// criterion listeners registered before this returns.
    pub fn new(
        profile: PlayerProfile,
        graph: Arc<AdvancementGraph>,
        triggers: Box<dyn TriggerRegistry>,
        hooks: Box<dyn AdvancementHooks>,
        store: Option<ProgressStore>,
    ) -> Self {
        let mut state = Self {
            profile,
            graph,
            triggers,
            hooks,
            store,
            progress: BTreeMap::new(),
            visible: BTreeSet::new(),
            visibility_changed: BTreeSet::new(),
            progress_changed: BTreeSet::new(),
            last_selected_tab: None,
            first_packet: true,
        };
        state.load();
        state
    }

    /// Player this state belongs to.
    pub fn profile(&self) -> &PlayerProfile {
        &self.profile
    }

    /// Graph the state is evaluated against.
    pub fn graph(&self) -> &Arc<AdvancementGraph> {
        &self.graph
    }

    /// Progress record of an advancement, if one was started.
    pub fn progress(&self, id: &AdvancementId) -> Option<&AdvancementProgress> {
        self.progress.get(id)
    }

    /// Whether the advancement is currently shown to the player.
    pub fn is_visible(&self, id: &AdvancementId) -> bool {
        self.visible.contains(id)
    }

    /// Advancements currently shown to the player.
    pub fn visible(&self) -> &BTreeSet<AdvancementId> {
        &self.visible
    }

    /// Tab last selected through [`Self::set_selected_tab`].
    pub fn selected_tab(&self) -> Option<&AdvancementId> {
        self.last_selected_tab.as_ref()
    }

    fn load(&mut self) {
        if let Some(store) = &self.store {
            match store.load(self.profile.id) {
                Ok(Some(records)) => self.apply_records(records),
                Ok(None) => debug!(player = %self.profile.name, "No saved advancement progress"),
                Err(err) => error!(
                    player = %self.profile.name,
                    "Couldn't load player advancements: {err}"
                ),
            }
        }
        self.check_for_automatic_triggers();
        self.ensure_all_visible();
        self.register_all_listeners();
    }

    fn apply_records(&mut self, records: ProgressRecords) {
        let mut records: Vec<_> = records.into_iter().collect();
        records.sort_by(|(_, a), (_, b)| a.cmp_by_first_progress(b));

        let graph = Arc::clone(&self.graph);
        for (id, mut progress) in records {
            match graph.get(&id) {
                Some(advancement) => {
                    progress.update_from(advancement);
                    self.progress.insert(id, progress);
                }
                None => warn!(
                    player = %self.profile.name,
                    "Ignored advancement '{id}' in progress file - it doesn't exist anymore?"
                ),
            }
        }
    }

    /// Award every advancement that has no criteria and was never awarded.
    pub fn check_for_automatic_triggers(&mut self) {
        let graph = Arc::clone(&self.graph);
        for advancement in graph.advancements() {
            if !advancement.criteria().is_empty() {
                continue;
            }
            let awarded = self
                .progress
                .get(advancement.id())
                .is_some_and(AdvancementProgress::has_progress);
            if !awarded {
                self.award(advancement.id(), AUTOMATIC_CRITERION);
            }
        }
    }

    fn ensure_all_visible(&mut self) {
        let done: Vec<AdvancementId> = self
            .progress
            .iter()
            .filter(|(_, progress)| progress.is_done())
            .map(|(id, _)| id.clone())
            .collect();
        for id in done {
            self.ensure_visibility(&id);
        }
    }

    fn register_all_listeners(&mut self) {
        let graph = Arc::clone(&self.graph);
        for advancement in graph.advancements() {
            self.register_listeners(advancement);
        }
    }

    fn register_listeners(&mut self, advancement: &Advancement) {
        let progress = start_progress(&mut self.progress, advancement);
        if progress.is_done() {
            return;
        }
        for (name, criterion) in advancement.criteria() {
            let pending = progress
                .criterion(name)
                .is_some_and(|c| !c.is_obtained());
            if pending {
                self.triggers.add_listener(
                    self.profile.id,
                    &criterion.trigger,
                    CriterionListener::new(advancement.id().clone(), name.clone()),
                );
            }
        }
    }

    fn unregister_listeners(&mut self, advancement: &Advancement) {
        let progress = start_progress(&mut self.progress, advancement);
        let done = progress.is_done();
        for (name, criterion) in advancement.criteria() {
            let settled = progress
                .criterion(name)
                .is_some_and(|c| c.is_obtained() || done);
            if settled {
                self.triggers.remove_listener(
                    self.profile.id,
                    &criterion.trigger,
                    &CriterionListener::new(advancement.id().clone(), name.clone()),
                );
            }
        }
    }

    /// Grant one criterion. Returns whether anything changed.
    ///
    /// Completing the advancement grants its rewards, announces it in chat
    /// when both the display flag and the game rule allow it, and fires the
    /// completion hook. Fake players never earn advancements.
    pub fn award(&mut self, id: &AdvancementId, criterion: &str) -> bool {
        if !self.profile.is_real() {
            return false;
        }
        let graph = Arc::clone(&self.graph);
        let Some(advancement) = graph.get(id) else {
            warn!(player = %self.profile.name, "Cannot award unknown advancement '{id}'");
            return false;
        };

        let progress = start_progress(&mut self.progress, advancement);
        let was_done = progress.is_done();
        let granted = progress.grant(criterion);
        let done = progress.is_done();

        if granted {
            self.unregister_listeners(advancement);
            self.progress_changed.insert(id.clone());
            if !was_done && done {
                info!(player = %self.profile.name, advancement = %id, "Advancement completed");
                self.hooks.grant_rewards(&self.profile, advancement);
                let announce = advancement.display().is_some_and(|d| d.announce_to_chat);
                if announce && self.hooks.announce_advancements() {
                    if let Some(announcement) = Announcement::new(&self.profile, advancement) {
                        self.hooks.announce(announcement);
                    }
                }
                self.hooks.advancement_completed(&self.profile, advancement);
            }
        }

        if done {
            self.ensure_visibility(id);
        }
        granted
    }

    /// Reset one criterion. Returns whether anything changed.
    pub fn revoke(&mut self, id: &AdvancementId, criterion: &str) -> bool {
        let graph = Arc::clone(&self.graph);
        let Some(advancement) = graph.get(id) else {
            warn!(player = %self.profile.name, "Cannot revoke unknown advancement '{id}'");
            return false;
        };

        let progress = start_progress(&mut self.progress, advancement);
        let revoked = progress.revoke(criterion);
        let has_progress = progress.has_progress();

        if revoked {
            self.register_listeners(advancement);
            self.progress_changed.insert(id.clone());
        }
        if !has_progress {
            self.ensure_visibility(id);
        }
        revoked
    }

    /// Whether `id` should be shown to the player.
    ///
    /// Walks up at most two ancestors. A completed advancement or descendant
    /// makes the starting node visible; otherwise the first ancestor that is
    /// done decides, and a missing display or a hidden flag stops the walk.
    pub fn should_be_visible(&self, id: &AdvancementId) -> bool {
        let mut current = self.graph.get(id);
        for depth in 0..VISIBILITY_DEPTH {
            let Some(advancement) = current else {
                return false;
            };
            if depth == 0 && self.has_completed_children_or_self(advancement.id()) {
                return true;
            }
            let Some(display) = advancement.display() else {
                return false;
            };
            if self.is_done(advancement.id()) {
                return true;
            }
            if display.hidden {
                return false;
            }
            current = advancement.parent().and_then(|parent| self.graph.get(parent));
        }
        false
    }

    fn has_completed_children_or_self(&self, id: &AdvancementId) -> bool {
        self.is_done(id)
            || self
                .graph
                .children(id)
                .iter()
                .any(|child| self.has_completed_children_or_self(child))
    }

    fn is_done(&self, id: &AdvancementId) -> bool {
        self.progress.get(id).is_some_and(AdvancementProgress::is_done)
    }

    /// Recompute visibility of `id`, then of its parent when it flipped, and
    /// always of its children.
    pub fn ensure_visibility(&mut self, id: &AdvancementId) {
        let graph = Arc::clone(&self.graph);
        self.update_visibility(&graph, id);
    }

    fn update_visibility(&mut self, graph: &AdvancementGraph, id: &AdvancementId) {
        let Some(advancement) = graph.get(id) else {
            return;
        };
        let visible = self.should_be_visible(id);
        let was_visible = self.visible.contains(id);

        if visible && !was_visible {
            self.visible.insert(id.clone());
            self.visibility_changed.insert(id.clone());
        } else if !visible && was_visible {
            self.visible.remove(id);
            self.visibility_changed.insert(id.clone());
        }
        if visible != was_visible && self.progress.contains_key(id) {
            self.progress_changed.insert(id.clone());
        }

        if visible != was_visible {
            if let Some(parent) = advancement.parent() {
                self.update_visibility(graph, parent);
            }
        }
        for child in graph.children(id) {
            self.update_visibility(graph, child);
        }
    }

    /// Collect the pending sync delta.
    ///
    /// Returns `None` when there is nothing to send. Dirty sets are cleared
    /// whenever a flush was due, even if the resulting delta is empty, and the
    /// first-packet flag clears after every call.
    pub fn flush_dirty(&mut self) -> Option<AdvancementDelta> {
        let mut delta = None;
        if self.first_packet
            || !self.visibility_changed.is_empty()
            || !self.progress_changed.is_empty()
        {
            let added: BTreeMap<AdvancementId, AdvancementProgress> = self
                .progress_changed
                .iter()
                .filter(|id| self.visible.contains(*id))
                .filter_map(|id| self.progress.get(id).map(|p| (id.clone(), p.clone())))
                .collect();
            let (shown, hidden): (Vec<AdvancementId>, Vec<AdvancementId>) = self
                .visibility_changed
                .iter()
                .cloned()
                .partition(|id| self.visible.contains(id));

            if self.first_packet || !added.is_empty() || !shown.is_empty() || !hidden.is_empty()
            {
                delta = Some(AdvancementDelta {
                    reset: self.first_packet,
                    added,
                    shown,
                    hidden,
                });
            }
            self.visibility_changed.clear();
            self.progress_changed.clear();
        }
        self.first_packet = false;
        delta
    }

    /// Wire message for a delta: full definitions with layout positions for
    /// shown advancements, ids for hidden ones.
    pub fn sync_message(&self, delta: &AdvancementDelta) -> AdvancementInfoMessage {
        AdvancementInfoMessage {
            reset: delta.reset,
            added: delta
                .shown
                .iter()
                .filter_map(|id| self.graph.get(id))
                .map(|advancement| {
                    let position = self.graph.position(advancement.id());
                    AdvancementWire::from_advancement(advancement, position)
                })
                .collect(),
            removed: delta.hidden.clone(),
            progress: delta.added.clone(),
        }
    }

    /// Flush and convert in one step.
    pub fn flush_message(&mut self) -> Option<ServerMessage> {
        let delta = self.flush_dirty()?;
        Some(ServerMessage::AdvancementInfo(self.sync_message(&delta)))
    }

    /// Select the tab shown in the advancement screen.
    ///
    /// Only displayed roots can be selected; anything else clears the
    /// selection. Returns the change to send, if the selection changed.
    pub fn set_selected_tab(&mut self, id: Option<&AdvancementId>) -> Option<TabSelection> {
        let previous = self.last_selected_tab.take();
        self.last_selected_tab = id
            .and_then(|id| self.graph.get(id))
            .filter(|advancement| advancement.is_root() && advancement.display().is_some())
            .map(|advancement| advancement.id().clone());
        (previous != self.last_selected_tab).then(|| TabSelection {
            tab: self.last_selected_tab.clone(),
        })
    }

    /// React to the client's advancement screen activity.
    pub fn handle_seen_advancements(
        &mut self,
        action: &SeenAdvancementsAction,
    ) -> Option<ServerMessage> {
        match action {
            SeenAdvancementsAction::OpenedTab(tab) if self.graph.contains(tab) => {
                self.set_selected_tab(Some(tab)).map(ServerMessage::from)
            }
            SeenAdvancementsAction::OpenedTab(tab) => {
                debug!(player = %self.profile.name, "Ignoring unknown tab '{tab}'");
                None
            }
            SeenAdvancementsAction::ClosedScreen => None,
        }
    }

    /// Swap in a reloaded graph and rebuild all state from storage.
    #[instrument(skip(self, graph), fields(player = %self.profile.name))]
    pub fn reload(&mut self, graph: Arc<AdvancementGraph>) {
        self.dispose();
        self.graph = graph;
        self.progress.clear();
        self.visible.clear();
        self.visibility_changed.clear();
        self.progress_changed.clear();
        self.first_packet = true;
        self.last_selected_tab = None;
        self.load();
    }

    /// Persist progress. Failures are logged, never returned.
    pub fn save(&self) {
        let Some(store) = &self.store else {
            return;
        };
        if let Err(err) = store.save(self.profile.id, &self.progress) {
            error!(player = %self.profile.name, "Couldn't save player advancements: {err}");
        }
    }

    /// Drop every criterion listener of this player.
    pub fn dispose(&mut self) {
        self.triggers.remove_all_listeners(self.profile.id);
    }
}
