//! Side effects of completing an advancement.

use mdadvance_core::{Advancement, AdvancementId, PlayerProfile};
use tracing::info;

/// Chat broadcast for a completed advancement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Announcement {
    /// Translation key, `chat.type.advancement.<frame>`.
    pub translation_key: String,
    /// Name of the player who completed it.
    pub player: String,
    /// Advancement id.
    pub advancement: AdvancementId,
    /// Advancement title.
    pub title: String,
}

impl Announcement {
    /// Announcement for `advancement` completed by `player`. `None` when the
    /// advancement has no display.
    pub fn new(player: &PlayerProfile, advancement: &Advancement) -> Option<Self> {
        let display = advancement.display()?;
        Some(Self {
            translation_key: format!("chat.type.advancement.{}", display.frame.name()),
            player: player.name.clone(),
            advancement: advancement.id().clone(),
            title: display.title.clone(),
        })
    }
}

/// Host engine collaborator invoked when a player completes an advancement.
pub trait AdvancementHooks: Send {
    /// Deliver experience, loot, recipes and the reward function.
    fn grant_rewards(&mut self, player: &PlayerProfile, advancement: &Advancement);

    /// Game-rule toggle for chat announcements.
    fn announce_advancements(&self) -> bool {
        true
    }

    /// Broadcast a completion message.
    fn announce(&mut self, announcement: Announcement);

    /// Fired after rewards and the announcement.
    fn advancement_completed(&mut self, _player: &PlayerProfile, _advancement: &Advancement) {}
}

/// Hooks that only log. Used by the CLI and as a default for tools.
#[derive(Debug, Clone)]
pub struct LogHooks {
    announce: bool,
}

impl LogHooks {
    /// Log hooks with the given announcement game rule.
    pub fn new(announce: bool) -> Self {
        Self { announce }
    }
}

impl Default for LogHooks {
    fn default() -> Self {
        Self::new(true)
    }
}

impl AdvancementHooks for LogHooks {
    fn grant_rewards(&mut self, player: &PlayerProfile, advancement: &Advancement) {
        let rewards = advancement.rewards();
        if rewards.is_empty() {
            return;
        }
        info!(
            player = %player.name,
            advancement = %advancement.id(),
            experience = rewards.experience,
            loot = rewards.loot.len(),
            recipes = rewards.recipes.len(),
            function = ?rewards.function,
            "Granting advancement rewards"
        );
    }

    fn announce_advancements(&self) -> bool {
        self.announce
    }

    fn announce(&mut self, announcement: Announcement) {
        info!(
            key = %announcement.translation_key,
            "{} has made the advancement [{}]",
            announcement.player,
            announcement.title
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mdadvance_core::{AdvancementBuilder, DisplayInfo, FrameType};

    #[test]
    fn announcement_uses_frame_key() {
        let advancement = AdvancementBuilder::new()
            .display(DisplayInfo::new("Free the End", "dragon_egg").with_frame(FrameType::Challenge))
            .build(AdvancementId::parse("end/kill_dragon").unwrap(), |_| true)
            .unwrap();
        let player = PlayerProfile::new(1, "Alex");

        let announcement = Announcement::new(&player, &advancement).unwrap();
        assert_eq!(announcement.translation_key, "chat.type.advancement.challenge");
        assert_eq!(announcement.player, "Alex");
        assert_eq!(announcement.title, "Free the End");
    }

    #[test]
    fn no_announcement_without_display() {
        let advancement = AdvancementBuilder::new()
            .build(AdvancementId::parse("recipes/root").unwrap(), |_| true)
            .unwrap();
        assert!(Announcement::new(&PlayerProfile::new(1, "Alex"), &advancement).is_none());
    }
}
