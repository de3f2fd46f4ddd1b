//! Per-advancement criterion progress.
//!
//! A record tracks which criteria of one advancement a player has obtained and
//! caches the requirement formula it is evaluated against. Only obtained
//! criteria are ever serialized; everything else is implicitly not done.

use crate::{Advancement, Criterion, Requirements};
use chrono::{DateTime, SubsecRound, Utc};
use serde::ser::SerializeStruct;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Format used for obtained timestamps in player files and on the wire.
pub const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S %z";

/// Criterion name used for advancements that define no criteria at all.
/// Such advancements are granted automatically through this name.
pub const AUTOMATIC_CRITERION: &str = "";

/// Progress of a single criterion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CriterionProgress {
    obtained: Option<DateTime<Utc>>,
}

impl CriterionProgress {
    /// Whether the criterion has been obtained.
    pub fn is_obtained(&self) -> bool {
        self.obtained.is_some()
    }

    /// When the criterion was obtained.
    pub fn obtained(&self) -> Option<DateTime<Utc>> {
        self.obtained
    }

    fn obtain_at(&mut self, at: DateTime<Utc>) {
        self.obtained = Some(at);
    }

    fn reset(&mut self) {
        self.obtained = None;
    }
}

/// Criterion progress for one (player, advancement) pair.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AdvancementProgress {
    criteria: BTreeMap<String, CriterionProgress>,
    requirements: Requirements,
}

impl AdvancementProgress {
    /// Empty record with no criteria and no requirements.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reconcile against the current definition.
    ///
    /// Criteria missing from `criteria` are dropped, new ones are added as not
    /// obtained and the cached requirements are replaced wholesale.
    pub fn update(&mut self, criteria: &BTreeMap<String, Criterion>, requirements: &Requirements) {
        self.criteria.retain(|name, _| criteria.contains_key(name));
        for name in criteria.keys() {
            self.criteria.entry(name.clone()).or_default();
        }
        self.requirements = requirements.clone();
    }

    /// Reconcile against an advancement. Advancements without criteria track
    /// the single [`AUTOMATIC_CRITERION`].
    pub fn update_from(&mut self, advancement: &Advancement) {
        if advancement.criteria().is_empty() {
            let automatic = AUTOMATIC_CRITERION.to_string();
            self.update_names([&automatic], &Requirements::all_of([automatic.clone()]));
        } else {
            self.update(advancement.criteria(), advancement.requirements());
        }
    }

    /// Same as [`Self::update`] for callers that only know criterion names.
    pub fn update_names<'a>(
        &mut self,
        names: impl IntoIterator<Item = &'a String>,
        requirements: &Requirements,
    ) {
        let names: Vec<&String> = names.into_iter().collect();
        self.criteria.retain(|name, _| names.contains(&name));
        for name in names {
            self.criteria.entry(name.clone()).or_default();
        }
        self.requirements = requirements.clone();
    }

    /// True when every requirement group has an obtained member.
    ///
    /// Empty requirements are never done; names without a record count as
    /// not obtained.
    pub fn is_done(&self) -> bool {
        self.requirements.test(|name| self.is_obtained(name))
    }

    /// True when at least one criterion is obtained.
    pub fn has_progress(&self) -> bool {
        self.criteria.values().any(CriterionProgress::is_obtained)
    }

    /// Obtain a criterion now. Returns false when unknown or already obtained.
    pub fn grant(&mut self, name: &str) -> bool {
        self.grant_at(name, Utc::now())
    }

    /// Obtain a criterion at an explicit time (truncated to whole seconds so
    /// it survives a save/load cycle unchanged).
    pub fn grant_at(&mut self, name: &str, at: DateTime<Utc>) -> bool {
        match self.criteria.get_mut(name) {
            Some(progress) if !progress.is_obtained() => {
                progress.obtain_at(at.trunc_subsecs(0));
                true
            }
            _ => false,
        }
    }

    /// Reset a criterion. Returns false when unknown or not obtained.
    pub fn revoke(&mut self, name: &str) -> bool {
        match self.criteria.get_mut(name) {
            Some(progress) if progress.is_obtained() => {
                progress.reset();
                true
            }
            _ => false,
        }
    }

    /// Progress of one criterion.
    pub fn criterion(&self, name: &str) -> Option<&CriterionProgress> {
        self.criteria.get(name)
    }

    /// Cached requirement formula.
    pub fn requirements(&self) -> &Requirements {
        &self.requirements
    }

    /// Fraction of requirement groups completed, `0.0` without criteria.
    pub fn percent(&self) -> f32 {
        if self.criteria.is_empty() || self.requirements.is_empty() {
            return 0.0;
        }
        self.completed_groups() as f32 / self.requirements.len() as f32
    }

    /// `"done/total"` text, only shown when there is more than one group.
    pub fn progress_text(&self) -> Option<String> {
        if self.criteria.is_empty() {
            return None;
        }
        let total = self.requirements.len();
        if total <= 1 {
            return None;
        }
        Some(format!("{}/{}", self.completed_groups(), total))
    }

    /// Names of criteria not yet obtained.
    pub fn remaining_criteria(&self) -> impl Iterator<Item = &str> {
        self.criteria
            .iter()
            .filter(|(_, p)| !p.is_obtained())
            .map(|(name, _)| name.as_str())
    }

    /// Names of obtained criteria.
    pub fn completed_criteria(&self) -> impl Iterator<Item = &str> {
        self.criteria
            .iter()
            .filter(|(_, p)| p.is_obtained())
            .map(|(name, _)| name.as_str())
    }

    /// Earliest obtained timestamp, if any.
    pub fn first_progress_date(&self) -> Option<DateTime<Utc>> {
        self.criteria.values().filter_map(|p| p.obtained).min()
    }

    /// Order by first progress date; records without progress sort last.
    pub fn cmp_by_first_progress(&self, other: &Self) -> Ordering {
        match (self.first_progress_date(), other.first_progress_date()) {
            (None, Some(_)) => Ordering::Greater,
            (Some(_), None) => Ordering::Less,
            (None, None) => Ordering::Equal,
            (Some(a), Some(b)) => a.cmp(&b),
        }
    }

    fn is_obtained(&self, name: &str) -> bool {
        self.criteria
            .get(name)
            .is_some_and(CriterionProgress::is_obtained)
    }

    fn completed_groups(&self) -> usize {
        self.requirements
            .count_completed(|name| self.is_obtained(name))
    }
}

#[derive(Clone, Copy)]
struct Stamp(DateTime<Utc>);

impl Serialize for Stamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&self.0.format(DATE_FORMAT))
    }
}

impl<'de> Deserialize<'de> for Stamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        DateTime::parse_from_str(&raw, DATE_FORMAT)
            .map(|date| Stamp(date.with_timezone(&Utc)))
            .map_err(serde::de::Error::custom)
    }
}

impl Serialize for AdvancementProgress {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let obtained: BTreeMap<&str, Stamp> = self
            .criteria
            .iter()
            .filter_map(|(name, p)| p.obtained.map(|at| (name.as_str(), Stamp(at))))
            .collect();
        let mut state = serializer.serialize_struct("AdvancementProgress", 2)?;
        state.serialize_field("criteria", &obtained)?;
        state.serialize_field("done", &self.is_done())?;
        state.end()
    }
}

#[derive(Deserialize)]
struct RawProgress {
    #[serde(default)]
    criteria: BTreeMap<String, Stamp>,
    #[serde(default)]
    #[allow(dead_code)]
    done: bool,
}

impl<'de> Deserialize<'de> for AdvancementProgress {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = RawProgress::deserialize(deserializer)?;
        Ok(Self {
            criteria: raw
                .criteria
                .into_iter()
                .map(|(name, stamp)| {
                    (
                        name,
                        CriterionProgress {
                            obtained: Some(stamp.0),
                        },
                    )
                })
                .collect(),
            requirements: Requirements::empty(),
        })
    }
}
