//! Criteria and the requirement formula that combines them.

use crate::AdvancementId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A single named condition of an advancement.
///
/// The trigger decides when the criterion is met; `conditions` is handed to
/// the trigger implementation untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Criterion {
    /// Trigger type key (e.g., `minecraft:inventory_changed`).
    pub trigger: AdvancementId,
    /// Trigger-specific conditions.
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub conditions: serde_json::Value,
}

impl Criterion {
    /// Criterion with no trigger conditions.
    pub fn new(trigger: AdvancementId) -> Self {
        Self {
            trigger,
            conditions: serde_json::Value::Null,
        }
    }
}

/// Requirement groups: the outer list is AND-combined, each inner list is an
/// OR-group of criterion names.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Requirements {
    groups: Vec<Vec<String>>,
}

impl Requirements {
    /// Requirements with no groups. Never satisfied.
    pub const fn empty() -> Self {
        Self { groups: Vec::new() }
    }

    /// Requirements from explicit groups.
    pub fn new(groups: Vec<Vec<String>>) -> Self {
        Self { groups }
    }

    /// Every criterion must be obtained (one group per criterion).
    pub fn all_of(criteria: impl IntoIterator<Item = String>) -> Self {
        Self {
            groups: criteria.into_iter().map(|c| vec![c]).collect(),
        }
    }

    /// Any one criterion is enough (a single group).
    pub fn any_of(criteria: impl IntoIterator<Item = String>) -> Self {
        let criteria: Vec<String> = criteria.into_iter().collect();
        if criteria.is_empty() {
            Self::empty()
        } else {
            Self {
                groups: vec![criteria],
            }
        }
    }

    /// The requirement groups.
    pub fn groups(&self) -> &[Vec<String>] {
        &self.groups
    }

    /// Number of AND-groups.
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    /// Whether there are no groups at all.
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Every criterion name referenced by any group.
    pub fn names(&self) -> BTreeSet<&str> {
        self.groups
            .iter()
            .flat_map(|group| group.iter().map(String::as_str))
            .collect()
    }

    /// Evaluate the formula. Empty requirements are never satisfied.
    pub fn test(&self, obtained: impl Fn(&str) -> bool) -> bool {
        if self.groups.is_empty() {
            return false;
        }
        self.groups
            .iter()
            .all(|group| group.iter().any(|name| obtained(name)))
    }

    /// Number of groups with at least one obtained criterion.
    pub fn count_completed(&self, obtained: impl Fn(&str) -> bool) -> usize {
        self.groups
            .iter()
            .filter(|group| group.iter().any(|name| obtained(name)))
            .count()
    }
}

/// How requirements are derived when a definition does not list them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequirementsStrategy {
    /// All criteria must be obtained.
    #[default]
    And,
    /// Any single criterion is enough.
    Or,
}

impl RequirementsStrategy {
    /// Build requirements from criterion names.
    pub fn merge<'a>(self, names: impl IntoIterator<Item = &'a String>) -> Requirements {
        let names = names.into_iter().cloned();
        match self {
            Self::And => Requirements::all_of(names),
            Self::Or => Requirements::any_of(names),
        }
    }
}
