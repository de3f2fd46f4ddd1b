use mdadvance::{AdvancementManager, ServerConfig};
use mdadvance_client::ClientAdvancements;
use mdadvance_core::{AdvancementId, PlayerProfile};
use mdadvance_net::{encode_client_message, decode_client_message, encode_server_message, ClientMessage};
use mdadvance_server::CriterionTriggers;
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};

fn write(path: &Path, contents: &str) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

fn id(s: &str) -> AdvancementId {
    AdvancementId::parse(s).unwrap()
}

const ROOT: &str = r#"{
  "display": { "title": "Minecraft", "icon": "grass_block", "background": "stone.png" },
  "criteria": { "crafting_table": { "trigger": "minecraft:inventory_changed" } }
}"#;

fn child(parent: &str, title: &str, hidden: bool) -> String {
    format!(
        r#"{{
  "parent": "minecraft:{parent}",
  "display": {{ "title": "{title}", "icon": "stone", "hidden": {hidden} }},
  "criteria": {{ "a": {{ "trigger": "minecraft:tick" }}, "b": {{ "trigger": "minecraft:tick" }} }},
  "requirements": [["a", "b"]]
}}"#
    )
}

fn setup(root: &Path) -> ServerConfig {
    let config = ServerConfig {
        data_packs_dir: root.join("datapacks"),
        player_data_dir: root.join("players"),
        ..ServerConfig::default()
    };
    let adv = config.data_packs_dir.join("vanilla/advancements/minecraft/story");
    write(&adv.join("root.json"), ROOT);
    write(&adv.join("mine_stone.json"), &child("story/root", "Stone Age", false));
    write(&adv.join("upgrade_tools.json"), &child("story/mine_stone", "Getting an Upgrade", false));
    write(&adv.join("secret.json"), &child("story/root", "Secret", true));
    write(
        &config.data_packs_dir.join("vanilla/advancements/minecraft/recipes/root.json"),
        r#"{ "criteria": { "impossible": { "trigger": "minecraft:impossible" } } }"#,
    );
    config
}

#[test]
fn server_sync_reaches_the_client() {
    let dir = tempfile::tempdir().unwrap();
    let config = setup(dir.path());
    let manager = AdvancementManager::load(&config).unwrap();

    let triggers = Arc::new(Mutex::new(CriterionTriggers::new()));
    let mut player = manager.join(PlayerProfile::new(7, "Alex"), Box::new(Arc::clone(&triggers)));
    assert!(player.award(&id("story/root"), "crafting_table"));

    let mut client = ClientAdvancements::new();
    let message = player.flush_message().unwrap();
    client.receive(&encode_server_message(&message).unwrap()).unwrap();

    let graph = client.graph();
    assert!(graph.contains(&id("story/root")));
    assert!(graph.contains(&id("story/mine_stone")));
    assert!(graph.contains(&id("story/upgrade_tools")));
    assert!(!graph.contains(&id("story/secret")));
    assert!(!graph.contains(&id("recipes/root")));
    assert!(client.progress(&id("story/root")).unwrap().is_done());
    assert_eq!(
        graph.position(&id("story/upgrade_tools")),
        manager.graph().position(&id("story/upgrade_tools"))
    );

    // One criterion of an OR group finishes the advancement
    assert!(player.award(&id("story/mine_stone"), "b"));
    let message = player.flush_message().unwrap();
    client.receive(&encode_server_message(&message).unwrap()).unwrap();
    assert!(client.progress(&id("story/mine_stone")).unwrap().is_done());

    let opened = client.select_tab(Some(&id("story/root")), true).unwrap();
    let ClientMessage::SeenAdvancements(action) =
        decode_client_message(&encode_client_message(&opened).unwrap()).unwrap();
    let reply = player.handle_seen_advancements(&action).unwrap();
    client.receive(&encode_server_message(&reply).unwrap()).unwrap();
    assert_eq!(client.selected_tab(), Some(&id("story/root")));
}

#[test]
fn progress_persists_across_sessions() {
    let dir = tempfile::tempdir().unwrap();
    let config = setup(dir.path());
    let manager = AdvancementManager::load(&config).unwrap();

    let mut player = manager.join(PlayerProfile::new(7, "Alex"), Box::new(CriterionTriggers::new()));
    player.award(&id("story/root"), "crafting_table");
    player.award(&id("story/mine_stone"), "a");
    player.save();
    player.dispose();

    let saved: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(config.player_data_dir.join("7.json")).unwrap())
            .unwrap();
    assert_eq!(saved["DataVersion"], 2);
    assert_eq!(saved["minecraft:story/root"]["done"], true);

    let mut again = manager.join(PlayerProfile::new(7, "Alex"), Box::new(CriterionTriggers::new()));
    assert!(again.progress(&id("story/mine_stone")).unwrap().is_done());
    let delta = again.flush_dirty().unwrap();
    assert!(delta.reset);
    assert!(delta.shown.contains(&id("story/upgrade_tools")));
}
