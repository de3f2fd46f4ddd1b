//! Display metadata for advancements shown in the advancement screen.

use serde::{Deserialize, Serialize};

/// Frame drawn around an advancement icon; also selects the chat message key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameType {
    /// Regular task.
    #[default]
    Task,
    /// Challenge (spiky frame).
    Challenge,
    /// Goal (rounded frame).
    Goal,
}

impl FrameType {
    /// Lowercase name used in translation keys.
    pub fn name(self) -> &'static str {
        match self {
            Self::Task => "task",
            Self::Challenge => "challenge",
            Self::Goal => "goal",
        }
    }
}

/// How an advancement is presented to players.
///
/// Layout coordinates are not part of the definition; they live in the
/// graph's layout side table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplayInfo {
    /// Title shown in the screen and in announcements.
    pub title: String,
    /// Tooltip description.
    #[serde(default)]
    pub description: String,
    /// Item key used as icon.
    pub icon: String,
    /// Background texture, only meaningful on roots.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background: Option<String>,
    /// Frame type.
    #[serde(default)]
    pub frame: FrameType,
    /// Show a toast when completed.
    #[serde(default = "default_true")]
    pub show_toast: bool,
    /// Broadcast a chat message when completed.
    #[serde(default = "default_true")]
    pub announce_to_chat: bool,
    /// Hidden until completed.
    #[serde(default)]
    pub hidden: bool,
}

impl DisplayInfo {
    /// Plain task display with default flags.
    pub fn new(title: impl Into<String>, icon: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: String::new(),
            icon: icon.into(),
            background: None,
            frame: FrameType::Task,
            show_toast: true,
            announce_to_chat: true,
            hidden: false,
        }
    }

    /// Builder-style `hidden` flag.
    pub fn hidden(mut self, hidden: bool) -> Self {
        self.hidden = hidden;
        self
    }

    /// Builder-style frame.
    pub fn with_frame(mut self, frame: FrameType) -> Self {
        self.frame = frame;
        self
    }
}

fn default_true() -> bool {
    true
}

/// Grid position computed by the layout engine.
///
/// `x` is the tree depth (column); `y` is the row and may be fractional for
/// parents centred over their children.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DisplayPosition {
    /// Column.
    pub x: f32,
    /// Row.
    pub y: f32,
}

impl DisplayPosition {
    /// Construct a position.
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}
