use crate::{MappingError, Result};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A curated flat → hierarchical assignment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct ManualOverride {
    pub target_code: String,

    /// Used only when the target is missing from the hierarchy
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_description: Option<String>,

    /// Category the curator filed this under; defaults to the target's prefix
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<char>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl ManualOverride {
    pub fn to_target(target_code: impl Into<String>) -> Self {
        Self {
            target_code: target_code.into(),
            target_description: None,
            category: None,
            note: None,
        }
    }
}

/// Hand-written tables may list bare target codes.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawOverride {
    Code(String),
    Full(ManualOverride),
}

/// Override table keyed by flat source code.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManualOverrides {
    by_source: BTreeMap<String, Vec<ManualOverride>>,
}

impl ManualOverrides {
    /// Parse `{"<source>": ["<target>" | {"target_code": ...}, ...]}`.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let raw: BTreeMap<String, Vec<RawOverride>> = serde_json::from_str(json)?;
        let mut table = Self::default();
        for (source, entries) in raw {
            let source = source.trim().to_string();
            if source.is_empty() {
                return Err(MappingError::InvalidOverrides(
                    "empty source code key".to_string(),
                ));
            }
            for entry in entries {
                let entry = match entry {
                    RawOverride::Code(code) => ManualOverride::to_target(code),
                    RawOverride::Full(full) => full,
                };
                table.insert(&source, entry);
            }
        }
        Ok(table)
    }

    /// Add an override. A repeated target for the same source is ignored.
    pub fn insert(&mut self, source_code: &str, mut entry: ManualOverride) {
        entry.target_code = entry.target_code.trim().to_string();
        if entry.target_code.is_empty() {
            log::warn!("override for {source_code} has an empty target code; ignored");
            return;
        }
        let list = self.by_source.entry(source_code.to_string()).or_default();
        if list.iter().any(|e| e.target_code == entry.target_code) {
            log::warn!(
                "override {source_code} -> {} listed twice; keeping the first",
                entry.target_code
            );
            return;
        }
        list.push(entry);
    }

    /// Overrides for `source_code`, in file order.
    #[must_use]
    pub fn get(&self, source_code: &str) -> &[ManualOverride] {
        self.by_source
            .get(source_code)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Number of source codes with at least one override.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_source.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_source.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[ManualOverride])> {
        self.by_source
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_slice()))
    }
}
