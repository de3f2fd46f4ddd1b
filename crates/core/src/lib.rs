#![warn(missing_docs)]
//! Core advancement types shared across the workspace.

mod advancement;
mod criteria;
mod display;
mod id;
mod progress;

pub use advancement::{Advancement, AdvancementBuilder, DefinitionError, Rewards};
pub use criteria::{Criterion, Requirements, RequirementsStrategy};
pub use display::{DisplayInfo, DisplayPosition, FrameType};
pub use id::{AdvancementId, AdvancementIdError, DEFAULT_NAMESPACE};
pub use progress::{AdvancementProgress, CriterionProgress, AUTOMATIC_CRITERION, DATE_FORMAT};

use serde::{Deserialize, Serialize};

/// Trigger key that never fires; used for criteria whose definition is not
/// known locally (e.g., on clients, which only receive criterion names).
pub const IMPOSSIBLE_TRIGGER: &str = "minecraft:impossible";

/// Stable player identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PlayerId(pub u64);

/// Whether a player is a connected human or a server-side stand-in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlayerKind {
    /// Connected player.
    #[default]
    Real,
    /// Automation / fake player; never earns advancements.
    Fake,
}

/// Identity of the player whose advancements are tracked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerProfile {
    /// Stable id (also names the player's progress file).
    pub id: PlayerId,
    /// Display name used in announcements.
    pub name: String,
    /// Real or fake.
    pub kind: PlayerKind,
}

impl PlayerProfile {
    /// Real player profile.
    pub fn new(id: u64, name: impl Into<String>) -> Self {
        Self {
            id: PlayerId(id),
            name: name.into(),
            kind: PlayerKind::Real,
        }
    }

    /// Fake player profile.
    pub fn fake(id: u64, name: impl Into<String>) -> Self {
        Self {
            kind: PlayerKind::Fake,
            ..Self::new(id, name)
        }
    }

    /// Whether this profile belongs to a real player.
    pub fn is_real(&self) -> bool {
        self.kind == PlayerKind::Real
    }
}

impl Criterion {
    /// Criterion bound to [`IMPOSSIBLE_TRIGGER`].
    pub fn impossible() -> Self {
        Self::new(AdvancementId::from_static(DEFAULT_NAMESPACE, "impossible"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn impossible_criterion_uses_impossible_trigger() {
        assert_eq!(Criterion::impossible().trigger.to_string(), IMPOSSIBLE_TRIGGER);
    }

    #[test]
    fn fake_profiles_are_not_real() {
        assert!(PlayerProfile::new(1, "Alex").is_real());
        assert!(!PlayerProfile::fake(2, "Bot").is_real());
    }
}
