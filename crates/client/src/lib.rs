#![warn(missing_docs)]
//! Client-side mirror of the player's advancements.
//!
//! The client rebuilds a partial graph from the definitions the server sends
//! and keeps the progress records of everything visible.

use anyhow::{anyhow, Result};
use mdadvance_core::{Advancement, AdvancementBuilder, AdvancementId, AdvancementProgress};
use mdadvance_net::{
    decode_server_message, AdvancementInfoMessage, ClientMessage, SeenAdvancementsAction,
    ServerMessage,
};
use mdadvance_tree::{AdvancementGraph, GraphListener};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// UI notifications raised while applying server messages.
pub trait ClientListener: Send {
    /// Progress of a known advancement was replaced.
    fn on_progress(&mut self, advancement: &Advancement, progress: &AdvancementProgress);

    /// An advancement was completed during this session and wants a toast.
    fn on_toast(&mut self, _advancement: &Advancement) {}

    /// The selected tab changed.
    fn on_select_tab(&mut self, tab: Option<&Advancement>);
}

/// Local advancement graph plus progress, fed by [`AdvancementInfoMessage`]s.
#[derive(Debug, Default)]
pub struct ClientAdvancements {
    graph: AdvancementGraph,
    progress: BTreeMap<AdvancementId, AdvancementProgress>,
    selected_tab: Option<AdvancementId>,
    listener: Option<ListenerSlot>,
}

struct ListenerSlot(Box<dyn ClientListener>);

impl std::fmt::Debug for ListenerSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ClientListener")
    }
}

impl ClientAdvancements {
    /// Empty mirror.
    pub fn new() -> Self {
        Self::default()
    }

    /// Local graph.
    pub fn graph(&self) -> &AdvancementGraph {
        &self.graph
    }

    /// Progress of an advancement as last sent by the server.
    pub fn progress(&self, id: &AdvancementId) -> Option<&AdvancementProgress> {
        self.progress.get(id)
    }

    /// Currently selected tab.
    pub fn selected_tab(&self) -> Option<&AdvancementId> {
        self.selected_tab.as_ref()
    }

    /// Install the UI listener. The current tab and every known progress
    /// record are replayed to it.
    pub fn set_listener(&mut self, listener: Option<Box<dyn ClientListener>>) {
        self.listener = listener.map(ListenerSlot);
        let Some(ListenerSlot(listener)) = self.listener.as_mut() else {
            return;
        };
        for (id, progress) in &self.progress {
            if let Some(advancement) = self.graph.get(id) {
                listener.on_progress(advancement, progress);
            }
        }
        let tab = self.selected_tab.as_ref().and_then(|id| self.graph.get(id));
        listener.on_select_tab(tab);
    }

    /// Forward graph structure notifications (tabs appearing and vanishing).
    pub fn set_graph_listener(&mut self, listener: Option<Box<dyn GraphListener>>) {
        self.graph.set_listener(listener);
    }

    /// Decode, verify and apply one framed server message.
    pub fn receive(&mut self, frame: &[u8]) -> Result<()> {
        let message = decode_server_message(frame)?;
        message.verify().map_err(|reason| anyhow!("Rejected server message: {reason}"))?;
        self.handle(&message);
        Ok(())
    }

    /// Apply a decoded server message.
    pub fn handle(&mut self, message: &ServerMessage) {
        match message {
            ServerMessage::AdvancementInfo(info) => self.apply(info),
            ServerMessage::SelectAdvancementsTab { tab } => {
                self.select_tab(tab.as_ref(), false);
            }
        }
    }

    /// Apply an advancement sync delta.
    pub fn apply(&mut self, info: &AdvancementInfoMessage) {
        if info.reset {
            self.graph.clear();
            self.progress.clear();
        }
        self.graph.remove_all(&info.removed);
        for id in &info.removed {
            self.progress.remove(id);
        }

        let builders: BTreeMap<AdvancementId, AdvancementBuilder> = info
            .added
            .iter()
            .map(|wire| (wire.id.clone(), wire.to_builder()))
            .collect();
        let report = self.graph.load(builders);
        if !report.unresolved.is_empty() {
            warn!(
                "Server sent {} advancements without their parents",
                report.unresolved.len()
            );
        }
        for wire in &info.added {
            if let Some(display) = &wire.display {
                if self.graph.contains(&wire.id) {
                    self.graph.set_position(wire.id.clone(), display.position());
                }
            }
        }

        for (id, progress) in &info.progress {
            let Some(advancement) = self.graph.get(id) else {
                warn!("Server informed client about progress for unknown advancement {id}");
                continue;
            };
            let mut progress = progress.clone();
            progress.update_from(advancement);
            if let Some(ListenerSlot(listener)) = self.listener.as_mut() {
                listener.on_progress(advancement, &progress);
                let toast = advancement.display().is_some_and(|d| d.show_toast);
                if !info.reset && progress.is_done() && toast {
                    listener.on_toast(advancement);
                }
            }
            self.progress.insert(id.clone(), progress);
        }
        debug!(
            advancements = self.graph.len(),
            progress = self.progress.len(),
            "Applied advancement sync"
        );
    }

    /// Select a tab locally. Returns the message to send when `tell_server`
    /// is set and a tab is selected.
    pub fn select_tab(
        &mut self,
        tab: Option<&AdvancementId>,
        tell_server: bool,
    ) -> Option<ClientMessage> {
        let advancement = tab.and_then(|id| self.graph.get(id));
        self.selected_tab = advancement.map(|a| a.id().clone());
        if let Some(ListenerSlot(listener)) = self.listener.as_mut() {
            listener.on_select_tab(advancement);
        }
        let selected = self.selected_tab.clone()?;
        tell_server.then(|| {
            ClientMessage::SeenAdvancements(SeenAdvancementsAction::OpenedTab(selected))
        })
    }

    /// Message to send when the advancement screen closes.
    pub fn close_screen(&self) -> ClientMessage {
        ClientMessage::SeenAdvancements(SeenAdvancementsAction::ClosedScreen)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mdadvance_core::{Criterion, DisplayInfo, DisplayPosition};
    use mdadvance_net::{encode_server_message, AdvancementWire};
    use std::sync::{Arc, Mutex};

    fn id(s: &str) -> AdvancementId {
        AdvancementId::parse(s).unwrap()
    }

    fn wire(name: &str, parent: Option<&str>, y: f32) -> AdvancementWire {
        let mut builder = AdvancementBuilder::new()
            .display(DisplayInfo::new(name, "stone"))
            .criterion("done", Criterion::new(id("tick")));
        if let Some(parent) = parent {
            builder = builder.parent(id(parent));
        }
        let advancement = builder.build(id(name), |_| true).unwrap();
        let x = if parent.is_some() { 1.0 } else { 0.0 };
        AdvancementWire::from_advancement(&advancement, Some(DisplayPosition::new(x, y)))
    }

    fn done_progress() -> AdvancementProgress {
        let mut progress = AdvancementProgress::new();
        let name = "done".to_string();
        progress.update_names([&name], &mdadvance_core::Requirements::empty());
        progress.grant(&name);
        progress
    }

    #[derive(Clone, Default)]
    struct Events(Arc<Mutex<Vec<String>>>);

    impl ClientListener for Events {
        fn on_progress(&mut self, advancement: &Advancement, progress: &AdvancementProgress) {
            self.0
                .lock()
                .unwrap()
                .push(format!("progress {} {}", advancement.id(), progress.is_done()));
        }

        fn on_toast(&mut self, advancement: &Advancement) {
            self.0.lock().unwrap().push(format!("toast {}", advancement.id()));
        }

        fn on_select_tab(&mut self, tab: Option<&Advancement>) {
            self.0
                .lock()
                .unwrap()
                .push(format!("tab {:?}", tab.map(|a| a.id().to_string())));
        }
    }

    #[test]
    fn reset_sync_builds_graph_without_toasts() {
        let events = Events::default();
        let mut client = ClientAdvancements::new();
        client.set_listener(Some(Box::new(events.clone())));

        client.apply(&AdvancementInfoMessage {
            reset: true,
            added: vec![wire("child", Some("root"), 0.0), wire("root", None, 0.0)],
            removed: Vec::new(),
            progress: BTreeMap::from([(id("root"), done_progress())]),
        });

        assert_eq!(client.graph().len(), 2);
        assert_eq!(client.graph().position(&id("child")), Some(DisplayPosition::new(1.0, 0.0)));
        let progress = client.progress(&id("root")).unwrap();
        assert!(progress.is_done());
        assert_eq!(progress.requirements().len(), 1);
        assert_eq!(
            events.0.lock().unwrap().clone(),
            vec!["tab None", "progress minecraft:root true"]
        );
    }

    #[test]
    fn incremental_completion_toasts_and_removal_forgets() {
        let events = Events::default();
        let mut client = ClientAdvancements::new();
        client.apply(&AdvancementInfoMessage {
            reset: true,
            added: vec![wire("root", None, 0.0)],
            ..Default::default()
        });
        client.set_listener(Some(Box::new(events.clone())));

        client.apply(&AdvancementInfoMessage {
            progress: BTreeMap::from([(id("root"), done_progress())]),
            ..Default::default()
        });
        assert!(events.0.lock().unwrap().contains(&"toast minecraft:root".to_string()));

        client.apply(&AdvancementInfoMessage {
            removed: vec![id("root")],
            progress: BTreeMap::from([(id("root"), done_progress())]),
            ..Default::default()
        });
        assert!(client.graph().is_empty());
        assert!(client.progress(&id("root")).is_none());
    }

    #[test]
    fn tab_selection_round_trip() {
        let mut client = ClientAdvancements::new();
        let frame = encode_server_message(&ServerMessage::AdvancementInfo(AdvancementInfoMessage {
            reset: true,
            added: vec![wire("root", None, 0.0)],
            ..Default::default()
        }))
        .unwrap();
        client.receive(&frame).unwrap();

        assert_eq!(
            client.select_tab(Some(&id("root")), true),
            Some(ClientMessage::SeenAdvancements(SeenAdvancementsAction::OpenedTab(id("root"))))
        );
        assert_eq!(client.select_tab(Some(&id("missing")), true), None);
        assert!(client.selected_tab().is_none());

        client.handle(&ServerMessage::SelectAdvancementsTab {
            tab: Some(id("root")),
        });
        assert_eq!(client.selected_tab(), Some(&id("root")));
    }

    #[test]
    fn receive_rejects_garbage() {
        let mut client = ClientAdvancements::new();
        assert!(client.receive(&[1, 2, 3]).is_err());
    }
}
