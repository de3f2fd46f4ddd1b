//! Per-player advancement progress files.
//!
//! One JSON object per player, keyed by advancement id, plus a `DataVersion`
//! entry. Older files are migrated forward on the raw JSON before any record
//! is interpreted.

use chrono::{TimeZone, Utc};
use mdadvance_core::{AdvancementId, AdvancementProgress, PlayerId, DATE_FORMAT};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::io;
use std::path::PathBuf;
use thiserror::Error;
use tracing::{debug, warn};

/// Data version written by this build.
pub const CURRENT_DATA_VERSION: u64 = 2;

/// Version assumed for files without a `DataVersion` entry.
pub const LEGACY_DATA_VERSION: u64 = 1;

const DATA_VERSION_KEY: &str = "DataVersion";

/// Progress records read from or written to a store.
pub type ProgressRecords = BTreeMap<AdvancementId, AdvancementProgress>;

/// Failure reading or writing a player file.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Filesystem failure.
    #[error("failed to access {}: {source}", path.display())]
    Io {
        /// File involved.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: io::Error,
    },
    /// Invalid JSON or record shape.
    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        /// File involved.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: serde_json::Error,
    },
    /// Valid JSON that is not a progress file.
    #[error("malformed progress file {}: {message}", path.display())]
    Malformed {
        /// File involved.
        path: PathBuf,
        /// What was wrong.
        message: String,
    },
    /// Written by a newer build.
    #[error(
        "{} has data version {version}, newest supported is {}",
        path.display(),
        CURRENT_DATA_VERSION
    )]
    UnsupportedVersion {
        /// File involved.
        path: PathBuf,
        /// Version found in the file.
        version: u64,
    },
}

/// Upgrades a file from version `n` to `n + 1`, indexed by `n - LEGACY_DATA_VERSION`.
type Migration = fn(&mut Map<String, Value>) -> Result<(), String>;

const MIGRATIONS: &[Migration] = &[millis_to_formatted_dates];

/// Version 1 stored obtained times as epoch milliseconds.
fn millis_to_formatted_dates(root: &mut Map<String, Value>) -> Result<(), String> {
    for (id, record) in root.iter_mut() {
        let Some(criteria) = record.get_mut("criteria").and_then(Value::as_object_mut) else {
            continue;
        };
        for (name, obtained) in criteria.iter_mut() {
            let Some(millis) = obtained.as_i64() else {
                continue;
            };
            let date = Utc
                .timestamp_millis_opt(millis)
                .single()
                .ok_or_else(|| format!("{id}/{name}: timestamp {millis} out of range"))?;
            *obtained = Value::String(date.format(DATE_FORMAT).to_string());
        }
    }
    Ok(())
}

/// Directory of per-player progress files.
#[derive(Debug, Clone)]
pub struct ProgressStore {
    dir: PathBuf,
}

impl ProgressStore {
    /// Store rooted at `dir`. The directory is created on first save.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// File holding `player`'s progress.
    pub fn path_for(&self, player: PlayerId) -> PathBuf {
        self.dir.join(format!("{}.json", player.0))
    }

    /// Read a player's records. `Ok(None)` when the player has no file yet.
    ///
    /// Records are returned as stored, with empty requirements; the caller
    /// reconciles them against the current definitions.
    pub fn load(&self, player: PlayerId) -> Result<Option<ProgressRecords>, StoreError> {
        let path = self.path_for(player);
        let text = match std::fs::read_to_string(&path) {
            Ok(text) => text,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(StoreError::Io { path, source }),
        };
        let value: Value = serde_json::from_str(&text).map_err(|source| StoreError::Parse {
            path: path.clone(),
            source,
        })?;
        let Value::Object(mut root) = value else {
            return Err(StoreError::Malformed {
                path,
                message: "expected a JSON object".to_string(),
            });
        };

        let version = match root.remove(DATA_VERSION_KEY) {
            None => LEGACY_DATA_VERSION,
            Some(value) => value.as_u64().ok_or_else(|| StoreError::Malformed {
                path: path.clone(),
                message: format!("{DATA_VERSION_KEY} must be a non-negative integer"),
            })?,
        };
        if version > CURRENT_DATA_VERSION {
            return Err(StoreError::UnsupportedVersion { path, version });
        }
        let first = version.max(LEGACY_DATA_VERSION);
        for from in first..CURRENT_DATA_VERSION {
            debug!(player = player.0, from, "Migrating advancement progress");
            let migration = MIGRATIONS[(from - LEGACY_DATA_VERSION) as usize];
            migration(&mut root).map_err(|message| StoreError::Malformed {
                path: path.clone(),
                message,
            })?;
        }

        let mut records = ProgressRecords::new();
        for (key, value) in root {
            let id = match AdvancementId::parse(&key) {
                Ok(id) => id,
                Err(err) => {
                    warn!(player = player.0, "Ignoring invalid advancement id {key:?}: {err}");
                    continue;
                }
            };
            let progress =
                serde_json::from_value(value).map_err(|source| StoreError::Parse {
                    path: path.clone(),
                    source,
                })?;
            records.insert(id, progress);
        }
        Ok(Some(records))
    }

    /// Write the records that have progress, replacing the player's file.
    pub fn save(&self, player: PlayerId, records: &ProgressRecords) -> Result<(), StoreError> {
        std::fs::create_dir_all(&self.dir).map_err(|source| StoreError::Io {
            path: self.dir.clone(),
            source,
        })?;
        let path = self.path_for(player);

        let mut root = Map::new();
        for (id, progress) in records.iter().filter(|(_, p)| p.has_progress()) {
            let value = serde_json::to_value(progress).map_err(|source| StoreError::Parse {
                path: path.clone(),
                source,
            })?;
            root.insert(id.to_string(), value);
        }
        root.insert(DATA_VERSION_KEY.to_string(), Value::from(CURRENT_DATA_VERSION));

        let text = serde_json::to_string_pretty(&Value::Object(root)).map_err(|source| {
            StoreError::Parse {
                path: path.clone(),
                source,
            }
        })?;
        std::fs::write(&path, text).map_err(|source| StoreError::Io { path, source })
    }
}
