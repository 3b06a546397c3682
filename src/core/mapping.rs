//! Bidirectional title ↔ marker lookup table.
//!
//! Every `title → "[n]"` pair has its reverse `"[n]" → title`. Updates are
//! pure: a new mapping is returned and the input is never touched.

use std::collections::HashSet;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::core::marker::is_marker_token;
use crate::core::plan::RenamePlan;

/// Title ↔ marker table, insertion ordered
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReferenceMapping {
    entries: IndexMap<String, String>,
}

impl ReferenceMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `title → marker` and `marker → title`
    pub fn link(&mut self, title: impl Into<String>, marker: impl Into<String>) {
        let (title, marker) = (title.into(), marker.into());
        self.entries.insert(marker.clone(), title.clone());
        self.entries.insert(title, marker);
    }

    /// Insert a single directed pair without its reverse
    pub fn insert_raw(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(key.into(), value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.entries.shift_remove(key)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Keys that are marker tokens
    pub fn marker_keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str).filter(|k| is_marker_token(k))
    }

    /// Title whose forward entry points at `marker`
    pub fn title_for(&self, marker: &str) -> Option<&str> {
        self.iter()
            .find(|(k, v)| *v == marker && !is_marker_token(k))
            .map(|(k, _)| k)
    }

    /// Pairs whose reverse entry is absent or points elsewhere, checked from
    /// the title side and from the marker side
    pub fn bidirectional_violations(&self) -> Vec<String> {
        self.iter()
            .filter(|(k, v)| is_marker_token(k) != is_marker_token(v))
            .filter_map(|(k, v)| match self.get(v) {
                Some(back) if back == k => None,
                Some(back) => Some(format!("{k} → {v} but {v} → {back}")),
                None => Some(format!("{k} → {v} has no reverse entry")),
            })
            .collect()
    }

    pub fn is_bidirectional(&self) -> bool {
        self.bidirectional_violations().is_empty()
    }
}

impl FromIterator<(String, String)> for ReferenceMapping {
    /// Builds from `(title, marker)` pairs, linking both directions
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        let mut mapping = Self::new();
        for (title, marker) in iter {
            mapping.link(title, marker);
        }
        mapping
    }
}

/// Rewrite `old` so its markers follow `plan`.
///
/// Titles are looked up in `old`, all affected pairs are removed, then the
/// renamed pairs are linked. Removing before linking keeps chained renames
/// (`[17]→[18]`, `[18]→[19]`) from deleting each other's fresh entries.
/// Entries without a known title are skipped. The inserted marker never takes
/// the title of a shifted marker whose old number it happens to share.
pub fn update_reference_mapping(old: &ReferenceMapping, plan: &RenamePlan) -> ReferenceMapping {
    let shifted: HashSet<&str> =
        plan.iter().filter(|e| !e.is_new_marker).map(|e| e.old_marker.as_str()).collect();

    let mut renames: Vec<(String, &str, &str)> = Vec::with_capacity(plan.len());
    for entry in plan {
        if entry.is_new_marker && shifted.contains(entry.old_marker.as_str()) {
            trace!(old = %entry.old_marker, "inserted marker shares a shifted number, skipping");
            continue;
        }
        match old.title_for(&entry.old_marker) {
            Some(title) => renames.push((
                title.to_string(),
                entry.old_marker.as_str(),
                entry.new_marker.as_str(),
            )),
            None => trace!(old = %entry.old_marker, "no title mapped, skipping"),
        }
    }

    let mut next = old.clone();
    for (title, old_marker, _) in &renames {
        next.remove(title);
        next.remove(old_marker);
    }
    for (title, _, new_marker) in renames.iter() {
        next.link(title.clone(), *new_marker);
    }

    debug!(renamed = renames.len(), size = next.len(), "reference mapping updated");
    next
}
