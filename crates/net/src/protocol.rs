//! Protocol message definitions for advancement synchronization.
//!
//! All messages use postcard serialization for compact binary encoding.

use mdadvance_core::{
    Advancement, AdvancementBuilder, AdvancementId, AdvancementProgress, Criterion, DisplayInfo,
    DisplayPosition, FrameType, Requirements,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Protocol version for compatibility checking.
pub const PROTOCOL_VERSION: u16 = 1;

/// Maximum advancement definitions per sync message.
pub const MAX_ADVANCEMENTS: usize = 4096;

/// Maximum removed ids per sync message.
pub const MAX_REMOVED: usize = 4096;

/// Maximum progress records per sync message.
pub const MAX_PROGRESS: usize = 4096;

/// Maximum criteria per advancement.
pub const MAX_CRITERIA: usize = 256;

/// Maximum length of a title, description, icon or background string.
pub const MAX_TEXT_LEN: usize = 512;

/// Maximum length of an advancement id in a tab message.
pub const MAX_ID_LEN: usize = 256;

/// Messages sent from client to server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum ClientMessage {
    /// The player opened a tab or closed the advancement screen.
    SeenAdvancements(SeenAdvancementsAction),
}

impl ClientMessage {
    /// Check limits before the server acts on the message.
    pub fn verify(&self) -> Result<(), &'static str> {
        match self {
            ClientMessage::SeenAdvancements(SeenAdvancementsAction::OpenedTab(tab)) => {
                verify_tab(Some(tab))
            }
            ClientMessage::SeenAdvancements(SeenAdvancementsAction::ClosedScreen) => Ok(()),
        }
    }
}

fn verify_tab(tab: Option<&AdvancementId>) -> Result<(), &'static str> {
    match tab {
        Some(id) if id.namespace().len() + id.path().len() + 1 > MAX_ID_LEN => {
            Err("Tab id too long")
        }
        _ => Ok(()),
    }
}

/// Advancement screen interaction reported by the client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum SeenAdvancementsAction {
    /// A tab was opened.
    OpenedTab(AdvancementId),
    /// The screen was closed.
    ClosedScreen,
}

/// Messages sent from server to client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum ServerMessage {
    /// Incremental advancement sync.
    AdvancementInfo(AdvancementInfoMessage),

    /// Select the tab shown in the advancement screen; `None` clears it.
    SelectAdvancementsTab {
        /// Root advancement whose tab is selected.
        tab: Option<AdvancementId>,
    },
}

impl ServerMessage {
    /// Check sync limits before the client applies the message.
    pub fn verify(&self) -> Result<(), &'static str> {
        match self {
            ServerMessage::AdvancementInfo(info) => info.verify(),
            ServerMessage::SelectAdvancementsTab { tab } => verify_tab(tab.as_ref()),
        }
    }
}

/// Advancement sync delta.
///
/// `reset` asks the client to drop everything it knows before applying the
/// rest. Definitions carry their parent id inline so the client can rebuild
/// its graph without another round trip.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AdvancementInfoMessage {
    /// Clear all client state first.
    pub reset: bool,
    /// Newly visible advancement definitions.
    pub added: Vec<AdvancementWire>,
    /// Ids that are no longer visible.
    pub removed: Vec<AdvancementId>,
    /// Progress records for visible advancements.
    pub progress: BTreeMap<AdvancementId, AdvancementProgress>,
}

impl AdvancementInfoMessage {
    /// Whether the message carries nothing beyond the reset flag.
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.progress.is_empty()
    }

    /// Verify message limits and validity.
    pub fn verify(&self) -> Result<(), &'static str> {
        if self.added.len() > MAX_ADVANCEMENTS {
            return Err("Too many advancements");
        }
        if self.removed.len() > MAX_REMOVED {
            return Err("Too many removed advancements");
        }
        if self.progress.len() > MAX_PROGRESS {
            return Err("Too many progress records");
        }
        for advancement in &self.added {
            advancement.verify()?;
        }
        Ok(())
    }
}

/// Display metadata as sent to clients, including the laid out position.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DisplayWire {
    /// Title.
    pub title: String,
    /// Description.
    pub description: String,
    /// Icon item key.
    pub icon: String,
    /// Background texture (roots).
    pub background: Option<String>,
    /// Frame type.
    pub frame: FrameType,
    /// Toast on completion.
    pub show_toast: bool,
    /// Hidden until completed.
    pub hidden: bool,
    /// Layout column.
    pub x: f32,
    /// Layout row.
    pub y: f32,
}

impl DisplayWire {
    fn new(display: &DisplayInfo, position: DisplayPosition) -> Self {
        Self {
            title: display.title.clone(),
            description: display.description.clone(),
            icon: display.icon.clone(),
            background: display.background.clone(),
            frame: display.frame,
            show_toast: display.show_toast,
            hidden: display.hidden,
            x: position.x,
            y: position.y,
        }
    }

    /// Client-side display info. Announcements never happen on clients.
    pub fn to_display(&self) -> DisplayInfo {
        DisplayInfo {
            title: self.title.clone(),
            description: self.description.clone(),
            icon: self.icon.clone(),
            background: self.background.clone(),
            frame: self.frame,
            show_toast: self.show_toast,
            announce_to_chat: false,
            hidden: self.hidden,
        }
    }

    /// Laid out position.
    pub fn position(&self) -> DisplayPosition {
        DisplayPosition::new(self.x, self.y)
    }
}

/// Full advancement definition as sent to clients.
///
/// Criteria are sent by name only; clients never evaluate triggers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AdvancementWire {
    /// Advancement id.
    pub id: AdvancementId,
    /// Parent id, inline.
    pub parent: Option<AdvancementId>,
    /// Display metadata with position.
    pub display: Option<DisplayWire>,
    /// Criterion names.
    pub criteria: Vec<String>,
    /// Requirement groups.
    pub requirements: Vec<Vec<String>>,
}

impl AdvancementWire {
    /// Wire form of a built advancement. Displayed advancements without a
    /// computed position are sent at the origin.
    pub fn from_advancement(advancement: &Advancement, position: Option<DisplayPosition>) -> Self {
        Self {
            id: advancement.id().clone(),
            parent: advancement.parent().cloned(),
            display: advancement
                .display()
                .map(|display| DisplayWire::new(display, position.unwrap_or_default())),
            criteria: advancement.criteria().keys().cloned().collect(),
            requirements: advancement.requirements().groups().to_vec(),
        }
    }

    /// Rebuild a builder whose criteria are bound to the impossible trigger.
    pub fn to_builder(&self) -> AdvancementBuilder {
        let mut builder = AdvancementBuilder::new()
            .requirements(Requirements::new(self.requirements.clone()));
        if let Some(parent) = &self.parent {
            builder = builder.parent(parent.clone());
        }
        if let Some(display) = &self.display {
            builder = builder.display(display.to_display());
        }
        for name in &self.criteria {
            builder = builder.criterion(name.clone(), Criterion::impossible());
        }
        builder
    }

    /// Verify message limits and validity.
    pub fn verify(&self) -> Result<(), &'static str> {
        if self.criteria.len() > MAX_CRITERIA {
            return Err("Too many criteria");
        }
        if self.requirements.len() > MAX_CRITERIA {
            return Err("Too many requirement groups");
        }
        if let Some(display) = &self.display {
            let too_long = [&display.title, &display.description, &display.icon]
                .into_iter()
                .chain(display.background.as_ref())
                .any(|text| text.len() > MAX_TEXT_LEN);
            if too_long {
                return Err("Display text too long");
            }
            if !display.x.is_finite() || !display.y.is_finite() {
                return Err("Display position not finite");
            }
        }
        Ok(())
    }
}
