//! Advancement definitions and the builder used while resolving parents.

use crate::{AdvancementId, Criterion, DisplayInfo, Requirements, RequirementsStrategy};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

/// Errors raised while reading or validating an advancement definition.
#[derive(Debug, Error)]
pub enum DefinitionError {
    /// Malformed JSON or wrong field types.
    #[error("failed to parse advancement definition: {0}")]
    Parse(#[from] serde_json::Error),
    /// A requirement group names a criterion that is not defined.
    #[error("unknown required criterion '{0}'")]
    UnknownRequiredCriterion(String),
    /// A defined criterion is not referenced by any requirement group.
    #[error("criterion '{0}' isn't a requirement for completion, all criteria must be required")]
    UnrequiredCriterion(String),
    /// A requirement group has no members.
    #[error("requirement entry cannot be empty")]
    EmptyRequirementGroup,
    /// `build` was called before the parent was resolved.
    #[error("tried to build advancement {id} before its parent {parent} was resolved")]
    UnresolvedParent {
        /// Advancement being built.
        id: AdvancementId,
        /// Missing parent.
        parent: AdvancementId,
    },
}

/// Rewards granted once when an advancement completes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Rewards {
    /// Experience points.
    pub experience: i32,
    /// Loot table keys to roll.
    pub loot: Vec<String>,
    /// Recipe keys to unlock.
    pub recipes: Vec<String>,
    /// Function to schedule.
    pub function: Option<String>,
}

impl Rewards {
    /// True when nothing would be granted.
    pub fn is_empty(&self) -> bool {
        self.experience == 0
            && self.loot.is_empty()
            && self.recipes.is_empty()
            && self.function.is_none()
    }
}

/// A built advancement. Immutable once placed in a graph.
#[derive(Debug, Clone, PartialEq)]
pub struct Advancement {
    id: AdvancementId,
    parent: Option<AdvancementId>,
    display: Option<DisplayInfo>,
    rewards: Rewards,
    criteria: BTreeMap<String, Criterion>,
    requirements: Requirements,
}

impl Advancement {
    /// Unique identifier.
    pub fn id(&self) -> &AdvancementId {
        &self.id
    }

    /// Parent identifier, `None` for roots.
    pub fn parent(&self) -> Option<&AdvancementId> {
        self.parent.as_ref()
    }

    /// Whether this advancement has no parent.
    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    /// Display metadata; `None` means invisible.
    pub fn display(&self) -> Option<&DisplayInfo> {
        self.display.as_ref()
    }

    /// Completion rewards.
    pub fn rewards(&self) -> &Rewards {
        &self.rewards
    }

    /// Named criteria.
    pub fn criteria(&self) -> &BTreeMap<String, Criterion> {
        &self.criteria
    }

    /// Requirement formula over the criteria.
    pub fn requirements(&self) -> &Requirements {
        &self.requirements
    }
}

/// Raw JSON shape of a requirements field: a flat list means every name is
/// its own group.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawRequirements {
    Groups(Vec<Vec<String>>),
    List(Vec<String>),
}

#[derive(Deserialize)]
struct RawDefinition {
    #[serde(default)]
    parent: Option<AdvancementId>,
    #[serde(default)]
    display: Option<DisplayInfo>,
    #[serde(default)]
    rewards: Rewards,
    #[serde(default)]
    criteria: BTreeMap<String, Criterion>,
    #[serde(default)]
    requirements: Option<RawRequirements>,
}

/// Unbuilt advancement waiting for its parent to resolve.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AdvancementBuilder {
    parent: Option<AdvancementId>,
    display: Option<DisplayInfo>,
    rewards: Rewards,
    criteria: BTreeMap<String, Criterion>,
    requirements: Option<Requirements>,
    strategy: RequirementsStrategy,
}

impl AdvancementBuilder {
    /// Empty builder (a root with no display and no criteria).
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse and validate a JSON definition.
    pub fn from_json(input: &str) -> Result<Self, DefinitionError> {
        let raw: RawDefinition = serde_json::from_str(input)?;
        let requirements = raw.requirements.map(|r| match r {
            RawRequirements::Groups(groups) => Requirements::new(groups),
            RawRequirements::List(names) => Requirements::all_of(names),
        });
        let builder = Self {
            parent: raw.parent,
            display: raw.display,
            rewards: raw.rewards,
            criteria: raw.criteria,
            requirements,
            strategy: RequirementsStrategy::And,
        };
        builder.validate()?;
        Ok(builder)
    }

    /// Set the parent id.
    pub fn parent(mut self, parent: AdvancementId) -> Self {
        self.parent = Some(parent);
        self
    }

    /// Set display metadata.
    pub fn display(mut self, display: DisplayInfo) -> Self {
        self.display = Some(display);
        self
    }

    /// Set rewards.
    pub fn rewards(mut self, rewards: Rewards) -> Self {
        self.rewards = rewards;
        self
    }

    /// Add a criterion.
    pub fn criterion(mut self, name: impl Into<String>, criterion: Criterion) -> Self {
        self.criteria.insert(name.into(), criterion);
        self
    }

    /// Set explicit requirement groups.
    pub fn requirements(mut self, requirements: Requirements) -> Self {
        self.requirements = Some(requirements);
        self
    }

    /// Strategy used when no explicit requirements are set.
    pub fn strategy(mut self, strategy: RequirementsStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Declared parent id.
    pub fn parent_id(&self) -> Option<&AdvancementId> {
        self.parent.as_ref()
    }

    /// Display metadata, if any.
    pub fn display_info(&self) -> Option<&DisplayInfo> {
        self.display.as_ref()
    }

    /// Whether the declared parent is available. Builders without a parent
    /// always resolve.
    pub fn resolves(&self, is_built: impl Fn(&AdvancementId) -> bool) -> bool {
        self.parent.as_ref().map_or(true, is_built)
    }

    /// Check the requirement formula against the criteria map.
    pub fn validate(&self) -> Result<(), DefinitionError> {
        let Some(requirements) = &self.requirements else {
            return Ok(());
        };
        if requirements.groups().iter().any(Vec::is_empty) {
            return Err(DefinitionError::EmptyRequirementGroup);
        }
        let required: BTreeSet<&str> = requirements.names();
        if let Some(unknown) = required.iter().find(|name| !self.criteria.contains_key(**name)) {
            return Err(DefinitionError::UnknownRequiredCriterion(unknown.to_string()));
        }
        if let Some(extra) = self
            .criteria
            .keys()
            .find(|name| !required.contains(name.as_str()))
        {
            return Err(DefinitionError::UnrequiredCriterion(extra.clone()));
        }
        Ok(())
    }

    /// Build the advancement. The caller must have checked [`Self::resolves`].
    pub fn build(
        self,
        id: AdvancementId,
        is_built: impl Fn(&AdvancementId) -> bool,
    ) -> Result<Advancement, DefinitionError> {
        if let Some(parent) = &self.parent {
            if !is_built(parent) {
                return Err(DefinitionError::UnresolvedParent {
                    id,
                    parent: parent.clone(),
                });
            }
        }
        let requirements = match self.requirements {
            Some(requirements) => requirements,
            None => self.strategy.merge(self.criteria.keys()),
        };
        Ok(Advancement {
            id,
            parent: self.parent,
            display: self.display,
            rewards: self.rewards,
            criteria: self.criteria,
            requirements,
        })
    }
}
