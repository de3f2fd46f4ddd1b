//! Data pack discovery and advancement definition loading.
//!
//! A data pack is a directory under the packs root. Advancements live in
//! `<pack>/advancements/<namespace>/<path>.json` and get the id
//! `namespace:path`.

use anyhow::{Context, Result};
use mdadvance_core::{AdvancementBuilder, AdvancementId};
use serde::Deserialize;
use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};
use tracing::{debug, error, warn};
use walkdir::WalkDir;

/// Data pack manifest file name.
pub const PACK_MANIFEST_FILE: &str = "pack.json";

/// Directory inside a pack holding advancement definitions.
pub const ADVANCEMENTS_DIR: &str = "advancements";

/// Optional per-pack manifest.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PackManifest {
    /// Human-friendly pack name (defaults to the directory name).
    pub name: Option<String>,
    /// Optional description, purely informational.
    pub description: Option<String>,
    /// If false, the pack is ignored.
    pub enabled: bool,
    /// Load order; higher priorities load later and override earlier packs.
    pub priority: i32,
}

impl Default for PackManifest {
    fn default() -> Self {
        Self {
            name: None,
            description: None,
            enabled: true,
            priority: 0,
        }
    }
}

/// A pack found on disk.
#[derive(Debug, Clone)]
pub struct DataPack {
    /// Directory name.
    pub id: String,
    /// Pack root.
    pub dir: PathBuf,
    /// Parsed manifest (defaults when absent).
    pub manifest: PackManifest,
}

fn load_manifest(pack_dir: &Path, pack_id: &str) -> Result<PackManifest> {
    let manifest_path = pack_dir.join(PACK_MANIFEST_FILE);
    let mut manifest = if !manifest_path.exists() {
        PackManifest::default()
    } else {
        let contents = fs::read_to_string(&manifest_path)
            .with_context(|| format!("Failed to read {}", manifest_path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse {}", manifest_path.display()))?
    };

    if manifest.name.as_deref().unwrap_or("").is_empty() {
        manifest.name = Some(pack_id.to_string());
    }
    Ok(manifest)
}

/// Discover pack directories under `root` in sorted order. A missing root
/// yields no packs.
pub fn discover_pack_dirs(root: &Path) -> Result<Vec<PathBuf>> {
    let entries = match fs::read_dir(root) {
        Ok(entries) => entries,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(err).with_context(|| format!("Failed to read {}", root.display())),
    };

    let mut dirs = Vec::new();
    for entry in entries {
        let entry =
            entry.with_context(|| format!("Failed to read dir entry in {}", root.display()))?;
        let path = entry.path();
        if path.is_dir() {
            dirs.push(path);
        }
    }

    dirs.sort();
    Ok(dirs)
}

/// Enabled packs under `root`, ordered by priority then directory name.
///
/// Packs with unreadable manifests are skipped with a warning.
pub fn discover_packs(root: &Path) -> Result<Vec<DataPack>> {
    let mut packs = Vec::new();
    for pack_dir in discover_pack_dirs(root)? {
        let id = pack_dir
            .file_name()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| pack_dir.display().to_string());
        let manifest = match load_manifest(&pack_dir, &id) {
            Ok(manifest) => manifest,
            Err(err) => {
                warn!(
                    "Skipping data pack {} due to invalid manifest: {err:#}",
                    pack_dir.display()
                );
                continue;
            }
        };
        if !manifest.enabled {
            debug!(pack = %id, "Data pack disabled");
            continue;
        }
        packs.push(DataPack {
            id,
            dir: pack_dir,
            manifest,
        });
    }

    packs.sort_by(|a, b| {
        a.manifest
            .priority
            .cmp(&b.manifest.priority)
            .then_with(|| a.id.cmp(&b.id))
    });
    Ok(packs)
}

/// Id for a definition file relative to a namespace directory, or `None` if
/// the file is not a definition.
fn advancement_id(namespace: &str, relative: &Path) -> Option<Result<AdvancementId>> {
    if relative.extension().and_then(|ext| ext.to_str()) != Some("json") {
        return None;
    }
    let stem = relative.with_extension("");
    let segments: Vec<String> = stem
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    let path = segments.join("/");
    Some(
        AdvancementId::new(namespace, &path)
            .with_context(|| format!("Invalid advancement id {namespace}:{path}")),
    )
}

/// Read every advancement definition of one pack.
///
/// Invalid files are logged and skipped.
pub fn load_pack_advancements(pack: &DataPack) -> BTreeMap<AdvancementId, AdvancementBuilder> {
    let mut definitions = BTreeMap::new();
    let root = pack.dir.join(ADVANCEMENTS_DIR);
    let namespaces = match discover_pack_dirs(&root) {
        Ok(dirs) => dirs,
        Err(err) => {
            warn!("Failed to scan {}: {err:#}", root.display());
            return definitions;
        }
    };

    for namespace_dir in namespaces {
        let namespace = namespace_dir
            .file_name()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        for entry in WalkDir::new(&namespace_dir)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|entry| entry.ok())
        {
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            let Ok(relative) = path.strip_prefix(&namespace_dir) else {
                continue;
            };
            let id = match advancement_id(&namespace, relative) {
                None => continue,
                Some(Ok(id)) => id,
                Some(Err(err)) => {
                    error!("Skipping {}: {err:#}", path.display());
                    continue;
                }
            };
            match read_definition(path) {
                Ok(builder) => {
                    definitions.insert(id, builder);
                }
                Err(err) => error!("Parsing error loading advancement {id}: {err:#}"),
            }
        }
    }
    definitions
}

fn read_definition(path: &Path) -> Result<AdvancementBuilder> {
    let contents =
        fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    AdvancementBuilder::from_json(&contents)
        .with_context(|| format!("Invalid definition in {}", path.display()))
}

/// Definitions of all enabled packs under `root`; later packs replace ids
/// defined by earlier ones.
pub fn load_advancements(root: &Path) -> Result<BTreeMap<AdvancementId, AdvancementBuilder>> {
    let mut definitions = BTreeMap::new();
    for pack in discover_packs(root)? {
        let loaded = load_pack_advancements(&pack);
        debug!(pack = %pack.id, count = loaded.len(), "Loaded data pack advancements");
        for (id, builder) in loaded {
            if definitions.insert(id.clone(), builder).is_some() {
                debug!(pack = %pack.id, "Overriding advancement {id}");
            }
        }
    }
    Ok(definitions)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(path: &Path, contents: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    const ROOT: &str = r#"{ "display": { "title": "Minecraft", "icon": "grass_block" },
        "criteria": { "crafting_table": { "trigger": "minecraft:inventory_changed" } } }"#;

    #[test]
    fn manifests_control_pack_order_and_enablement() {
        let root = tempfile::tempdir().unwrap();
        write(&root.path().join("b_pack").join(PACK_MANIFEST_FILE), r#"{"priority":-5}"#);
        write(&root.path().join("a_pack").join(PACK_MANIFEST_FILE), r#"{"priority":10}"#);
        fs::create_dir_all(root.path().join("c_pack")).unwrap();
        write(
            &root.path().join("d_pack").join(PACK_MANIFEST_FILE),
            r#"{"enabled":false,"priority":-100}"#,
        );
        write(&root.path().join("e_pack").join(PACK_MANIFEST_FILE), "{ broken");

        let packs = discover_packs(root.path()).unwrap();
        let ids: Vec<&str> = packs.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["b_pack", "c_pack", "a_pack"]);
        let c = packs.iter().find(|p| p.id == "c_pack").unwrap();
        assert_eq!(c.manifest.name.as_deref(), Some("c_pack"));
    }

    #[test]
    fn definitions_are_namespaced_by_path() {
        let root = tempfile::tempdir().unwrap();
        let adv = root.path().join("base").join(ADVANCEMENTS_DIR);
        write(&adv.join("minecraft/story/root.json"), ROOT);
        write(&adv.join("minecraft/story/notes.txt"), "ignored");
        write(&adv.join("mymod/extra/deep/thing.json"), ROOT);
        write(&adv.join("minecraft/story/broken.json"), "{ nope");

        let definitions = load_advancements(root.path()).unwrap();
        let ids: Vec<String> = definitions.keys().map(ToString::to_string).collect();
        assert_eq!(ids, vec!["minecraft:story/root", "mymod:extra/deep/thing"]);
    }

    #[test]
    fn later_packs_override_earlier_definitions() {
        let root = tempfile::tempdir().unwrap();
        write(
            &root.path().join("a/advancements/minecraft/story/root.json"),
            ROOT,
        );
        write(
            &root.path().join("b/advancements/minecraft/story/root.json"),
            r#"{ "display": { "title": "Override", "icon": "dirt" } }"#,
        );

        let definitions = load_advancements(root.path()).unwrap();
        let builder = &definitions[&AdvancementId::parse("story/root").unwrap()];
        assert_eq!(builder.display_info().unwrap().title, "Override");
    }

    #[test]
    fn missing_root_has_no_definitions() {
        let root = tempfile::tempdir().unwrap();
        assert!(load_advancements(&root.path().join("nope")).unwrap().is_empty());
    }
}
