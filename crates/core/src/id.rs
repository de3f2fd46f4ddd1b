//! Namespaced advancement identifiers.
//!
//! Identifiers are stable string keys of the form `namespace:path`
//! (e.g., `minecraft:story/mine_stone`). They are ordered and validated so
//! graph iteration and persisted player files stay deterministic.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Default namespace used when an identifier omits an explicit namespace.
pub const DEFAULT_NAMESPACE: &str = "minecraft";

/// Error returned when parsing an invalid [`AdvancementId`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct AdvancementIdError {
    message: String,
}

impl AdvancementIdError {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// A namespaced key of the form `namespace:path`.
///
/// Ordering is lexical by `(namespace, path)` and is stable across runs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AdvancementId {
    namespace: String,
    path: String,
}

impl AdvancementId {
    /// Parse an identifier.
    ///
    /// Accepts either:
    /// - `namespace:path`
    /// - `path` (uses [`DEFAULT_NAMESPACE`])
    pub fn parse(input: &str) -> Result<Self, AdvancementIdError> {
        Self::parse_with_default_namespace(input, DEFAULT_NAMESPACE)
    }

    /// Parse an identifier using a caller-provided default namespace.
    pub fn parse_with_default_namespace(
        input: &str,
        default_namespace: &str,
    ) -> Result<Self, AdvancementIdError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(AdvancementIdError::new("AdvancementId cannot be empty"));
        }

        let (namespace, path) = match input.split_once(':') {
            Some((ns, p)) => (ns, p),
            None => (default_namespace, input),
        };

        Self::new(namespace.trim(), path.trim())
    }

    /// Build an identifier from already separated parts.
    pub fn new(namespace: &str, path: &str) -> Result<Self, AdvancementIdError> {
        validate_namespace(namespace)?;
        validate_path(path)?;

        Ok(Self {
            namespace: namespace.to_string(),
            path: path.to_string(),
        })
    }

    /// Identifier from parts known to be valid.
    pub(crate) fn from_static(namespace: &'static str, path: &'static str) -> Self {
        Self {
            namespace: namespace.to_string(),
            path: path.to_string(),
        }
    }

    /// Identifier namespace.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Identifier path.
    pub fn path(&self) -> &str {
        &self.path
    }
}

impl fmt::Display for AdvancementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.namespace, self.path)
    }
}

impl FromStr for AdvancementId {
    type Err = AdvancementIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for AdvancementId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for AdvancementId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

fn validate_namespace(ns: &str) -> Result<(), AdvancementIdError> {
    if ns.is_empty() {
        return Err(AdvancementIdError::new(
            "AdvancementId namespace cannot be empty",
        ));
    }
    if ns.len() > 64 {
        return Err(AdvancementIdError::new(
            "AdvancementId namespace too long (max 64)",
        ));
    }
    if !ns
        .chars()
        .all(|c| matches!(c, 'a'..='z' | '0'..='9' | '_' | '-' | '.'))
    {
        return Err(AdvancementIdError::new(
            "AdvancementId namespace has invalid characters (allowed: a-z0-9_.-)",
        ));
    }
    Ok(())
}

fn validate_path(path: &str) -> Result<(), AdvancementIdError> {
    if path.is_empty() {
        return Err(AdvancementIdError::new("AdvancementId path cannot be empty"));
    }
    if path.len() > 256 {
        return Err(AdvancementIdError::new(
            "AdvancementId path too long (max 256)",
        ));
    }
    if !path
        .chars()
        .all(|c| matches!(c, 'a'..='z' | '0'..='9' | '_' | '-' | '.' | '/'))
    {
        return Err(AdvancementIdError::new(
            "AdvancementId path has invalid characters (allowed: a-z0-9_./-)",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_namespaced_id() {
        let id = AdvancementId::parse("minecraft:story/root").unwrap();
        assert_eq!(id.namespace(), "minecraft");
        assert_eq!(id.path(), "story/root");
        assert_eq!(id.to_string(), "minecraft:story/root");
    }

    #[test]
    fn parses_with_default_namespace() {
        let id = AdvancementId::parse("story/root").unwrap();
        assert_eq!(id.to_string(), "minecraft:story/root");
    }

    #[test]
    fn rejects_invalid_ids() {
        assert!(AdvancementId::parse("").is_err());
        assert!(AdvancementId::parse("   ").is_err());
        assert!(AdvancementId::parse("minecraft:Story").is_err());
        assert!(AdvancementId::parse("minecraft:").is_err());
        assert!(AdvancementId::parse(":root").is_err());
    }

    #[test]
    fn serializes_as_plain_string() {
        let id = AdvancementId::parse("custom:a/b").unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"custom:a/b\"");
        let back: AdvancementId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
        assert!(serde_json::from_str::<AdvancementId>("\"Bad Id\"").is_err());
    }
}
