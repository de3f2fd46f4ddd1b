#![warn(missing_docs)]
//! Server-side advancement tracking for connected players.

mod hooks;
mod player;
mod store;
mod triggers;

pub use hooks::{AdvancementHooks, Announcement, LogHooks};
pub use player::{AdvancementDelta, PlayerAdvancements, TabSelection};
pub use store::{
    ProgressRecords, ProgressStore, StoreError, CURRENT_DATA_VERSION, LEGACY_DATA_VERSION,
};
pub use triggers::{CriterionListener, CriterionTriggers, TriggerRegistry};
