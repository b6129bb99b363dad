//! Shared record types for the nomenclature mapping pipeline.
//!
//! Everything here is plain data: the loaders, the mapping builder, the reference normalizer and
//! the validator all exchange these types, and the JSON outputs consumed by the browsing UI are
//! serialized straight from them.

use anyhow::Result;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

pub mod findings;

pub use findings::{FindingKind, Severity, ValidationFinding};

/// Format version written into every mapping store.
pub const MAPPING_STORE_VERSION: &str = "1";

/// Whether a candidate came from the curated override table or the similarity scorer.
#[derive(
    Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    Manual,
    Automatic,
}

impl Provenance {
    /// Lower rank sorts first and wins merges.
    #[must_use]
    pub const fn rank(self) -> u8 {
        match self {
            Self::Manual => 0,
            Self::Automatic => 1,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::Automatic => "automatic",
        }
    }
}

/// Lifecycle status of a flat-taxonomy reference term.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceStatus {
    Active,
    Obsolete,
    Unknown,
}

impl ReferenceStatus {
    /// Parse a raw status column. Unrecognised values map to `Unknown`.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "active" => Self::Active,
            "obsolete" | "inactive" | "retired" => Self::Obsolete,
            _ => Self::Unknown,
        }
    }

    /// Preference order used when several reference rows compete: Active, then Unknown, then
    /// Obsolete.
    #[must_use]
    pub const fn preference(self) -> u8 {
        match self {
            Self::Active => 0,
            Self::Unknown => 1,
            Self::Obsolete => 2,
        }
    }
}

/// A flat-taxonomy term, one per code.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, JsonSchema)]
pub struct FlatCode {
    pub code: String,
    pub description: String,
}

/// A row of the authoritative flat-taxonomy reference list.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, JsonSchema)]
pub struct ReferenceEntry {
    pub code: String,
    pub description: String,
    pub status: ReferenceStatus,
}

impl ReferenceEntry {
    #[must_use]
    pub fn to_flat_code(&self) -> FlatCode {
        FlatCode {
            code: self.code.clone(),
            description: self.description.clone(),
        }
    }
}

/// A hierarchical-taxonomy node. `parent_code` is derived from the code string at load time.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, JsonSchema)]
pub struct HierarchicalEntry {
    pub code: String,
    pub description: String,
    pub category_prefix: char,
    pub depth: u8,
    pub is_terminal: bool,
    #[serde(default)]
    pub parent_code: Option<String>,
}

/// A proposed hierarchical target for a flat code.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, JsonSchema)]
pub struct MatchCandidate {
    pub target_code: String,
    pub target_description: String,
    pub score: u32,
    pub provenance: Provenance,
    pub category_prefix: char,
}

impl MatchCandidate {
    /// True when `self` should replace `other` for the same target code: manual beats automatic,
    /// and among equal provenance the higher score wins. Equal candidates prefer `self`.
    #[must_use]
    pub fn supersedes(&self, other: &Self) -> bool {
        match self.provenance.rank().cmp(&other.provenance.rank()) {
            std::cmp::Ordering::Less => true,
            std::cmp::Ordering::Greater => false,
            std::cmp::Ordering::Equal => self.score >= other.score,
        }
    }
}

/// All candidates for one flat code. Matches are kept in rank order: manual first, then score
/// descending, then target code ascending.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, JsonSchema)]
pub struct MappingRecord {
    pub source_code: String,
    pub source_description: String,
    pub matches: Vec<MatchCandidate>,
}

impl MappingRecord {
    #[must_use]
    pub fn find_match(&self, target_code: &str) -> Option<&MatchCandidate> {
        self.matches.iter().find(|m| m.target_code == target_code)
    }

    #[must_use]
    pub fn manual_count(&self) -> usize {
        self.matches
            .iter()
            .filter(|m| m.provenance == Provenance::Manual)
            .count()
    }

    #[must_use]
    pub fn best(&self) -> Option<&MatchCandidate> {
        self.matches.first()
    }
}

/// Serialize a document the way every pipeline output is written: pretty JSON with a trailing
/// newline, so identical inputs give identical bytes.
pub fn to_output_json<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    let mut bytes = serde_json::to_vec_pretty(value)?;
    bytes.push(b'\n');
    Ok(bytes)
}
