//! Criterion trigger listener registry.
//!
//! Players register one listener per unobtained criterion of every
//! unfinished advancement. When the host engine observes a trigger (an item
//! picked up, a dimension entered, ...) it asks the registry which listeners a
//! player has for that trigger and awards the matching criteria.

use mdadvance_core::{AdvancementId, PlayerId};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, PoisonError};

/// Criterion of one advancement waiting for its trigger.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CriterionListener {
    /// Advancement owning the criterion.
    pub advancement: AdvancementId,
    /// Criterion name.
    pub criterion: String,
}

impl CriterionListener {
    /// Construct a listener.
    pub fn new(advancement: AdvancementId, criterion: impl Into<String>) -> Self {
        Self {
            advancement,
            criterion: criterion.into(),
        }
    }
}

/// Registry of criterion listeners, injected into each player's state.
pub trait TriggerRegistry: Send {
    /// Start listening for `trigger` on behalf of `player`.
    fn add_listener(&mut self, player: PlayerId, trigger: &AdvancementId, listener: CriterionListener);
    /// Stop listening.
    fn remove_listener(
        &mut self,
        player: PlayerId,
        trigger: &AdvancementId,
        listener: &CriterionListener,
    );
    /// Drop every listener of `player`.
    fn remove_all_listeners(&mut self, player: PlayerId);
}

/// In-memory registry keyed by trigger, then player.
#[derive(Debug, Default)]
pub struct CriterionTriggers {
    listeners: BTreeMap<AdvancementId, BTreeMap<PlayerId, BTreeSet<CriterionListener>>>,
}

impl CriterionTriggers {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Listeners `player` has for `trigger`.
    pub fn listeners(
        &self,
        trigger: &AdvancementId,
        player: PlayerId,
    ) -> impl Iterator<Item = &CriterionListener> {
        self.listeners
            .get(trigger)
            .and_then(|players| players.get(&player))
            .into_iter()
            .flatten()
    }

    /// Total number of registered listeners.
    pub fn len(&self) -> usize {
        self.listeners
            .values()
            .flat_map(BTreeMap::values)
            .map(BTreeSet::len)
            .sum()
    }

    /// Whether nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl TriggerRegistry for CriterionTriggers {
    fn add_listener(&mut self, player: PlayerId, trigger: &AdvancementId, listener: CriterionListener) {
        self.listeners
            .entry(trigger.clone())
            .or_default()
            .entry(player)
            .or_default()
            .insert(listener);
    }

    fn remove_listener(
        &mut self,
        player: PlayerId,
        trigger: &AdvancementId,
        listener: &CriterionListener,
    ) {
        let Some(players) = self.listeners.get_mut(trigger) else {
            return;
        };
        if let Some(set) = players.get_mut(&player) {
            set.remove(listener);
            if set.is_empty() {
                players.remove(&player);
            }
        }
        if players.is_empty() {
            self.listeners.remove(trigger);
        }
    }

    fn remove_all_listeners(&mut self, player: PlayerId) {
        self.listeners.retain(|_, players| {
            players.remove(&player);
            !players.is_empty()
        });
    }
}

/// Engine-wide registries are shared between player sessions.
impl<T: TriggerRegistry> TriggerRegistry for Arc<Mutex<T>> {
    fn add_listener(&mut self, player: PlayerId, trigger: &AdvancementId, listener: CriterionListener) {
        self.lock()
            .unwrap_or_else(PoisonError::into_inner)
            .add_listener(player, trigger, listener);
    }

    fn remove_listener(
        &mut self,
        player: PlayerId,
        trigger: &AdvancementId,
        listener: &CriterionListener,
    ) {
        self.lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove_listener(player, trigger, listener);
    }

    fn remove_all_listeners(&mut self, player: PlayerId) {
        self.lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove_all_listeners(player);
    }
}
