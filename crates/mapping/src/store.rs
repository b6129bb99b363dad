use crate::Result;
use nomap_protocol::{MappingRecord, MatchCandidate, Provenance, MAPPING_STORE_VERSION};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Sort matches into rank order: manual first, then score descending, then target code.
pub fn rank_matches(matches: &mut [MatchCandidate]) {
    matches.sort_by(|a, b| {
        a.provenance
            .rank()
            .cmp(&b.provenance.rank())
            .then_with(|| b.score.cmp(&a.score))
            .then_with(|| a.target_code.cmp(&b.target_code))
    });
}

/// Union two match lists by target code.
///
/// For a shared target, `incoming` replaces `existing` when it supersedes it (manual over
/// automatic, then higher or equal score). The result is ranked.
pub fn merge_matches(
    existing: Vec<MatchCandidate>,
    incoming: Vec<MatchCandidate>,
) -> Vec<MatchCandidate> {
    let mut by_target: BTreeMap<String, MatchCandidate> = BTreeMap::new();
    for candidate in existing {
        by_target.insert(candidate.target_code.clone(), candidate);
    }
    for candidate in incoming {
        match by_target.get(&candidate.target_code) {
            Some(current) if !candidate.supersedes(current) => {}
            _ => {
                by_target.insert(candidate.target_code.clone(), candidate);
            }
        }
    }
    let mut merged: Vec<MatchCandidate> = by_target.into_values().collect();
    rank_matches(&mut merged);
    merged
}

/// Cap a ranked list at `limit`, never dropping a manual match.
fn truncate_ranked(matches: &mut Vec<MatchCandidate>, limit: usize) {
    let manual = matches
        .iter()
        .filter(|m| m.provenance == Provenance::Manual)
        .count();
    matches.truncate(limit.max(manual));
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
pub struct MappingStats {
    /// Flat codes offered to the builder
    pub flat_codes: usize,
    /// Records in the store
    pub mapped: usize,
    /// Flat codes without any candidate
    pub unmapped: usize,
    pub manual_matches: usize,
    pub automatic_matches: usize,
    pub total_candidates: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
pub struct StoreMetadata {
    /// Build time, unix milliseconds
    pub generated: u64,
    pub version: String,
    pub stats: MappingStats,
}

impl Default for StoreMetadata {
    fn default() -> Self {
        Self {
            generated: 0,
            version: MAPPING_STORE_VERSION.to_string(),
            stats: MappingStats::default(),
        }
    }
}

/// What [`MappingStore::upsert`] did with a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Merged,
}

/// The versioned mapping store: at most one record per source code.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
pub struct MappingStore {
    pub metadata: StoreMetadata,
    pub mappings: BTreeMap<String, MappingRecord>,
}

impl MappingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json_slice(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    #[must_use]
    pub fn get(&self, source_code: &str) -> Option<&MappingRecord> {
        self.mappings.get(source_code)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.mappings.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }

    /// Records in source-code order.
    pub fn records(&self) -> impl Iterator<Item = &MappingRecord> {
        self.mappings.values()
    }

    /// Insert a record, or merge it into the record already stored under its key.
    ///
    /// Merging unions matches per [`merge_matches`] and keeps the incoming description. `limit`
    /// caps the automatic tail of the merged list.
    pub fn upsert(&mut self, mut record: MappingRecord, limit: Option<usize>) -> UpsertOutcome {
        rank_matches(&mut record.matches);
        let Some(existing) = self.mappings.remove(&record.source_code) else {
            if let Some(limit) = limit {
                truncate_ranked(&mut record.matches, limit);
            }
            self.mappings.insert(record.source_code.clone(), record);
            return UpsertOutcome::Inserted;
        };

        if existing.source_description != record.source_description {
            log::warn!(
                "{}: description changed on merge ({:?} -> {:?})",
                record.source_code,
                existing.source_description,
                record.source_description
            );
        }
        let mut matches = merge_matches(existing.matches, record.matches);
        if let Some(limit) = limit {
            truncate_ranked(&mut matches, limit);
        }
        record.matches = matches;
        self.mappings.insert(record.source_code.clone(), record);
        UpsertOutcome::Merged
    }

    /// Merge every record of `delta` into this store.
    pub fn merge_store(&mut self, delta: MappingStore, limit: Option<usize>) -> usize {
        let mut merged = 0usize;
        for record in delta.mappings.into_values() {
            if self.upsert(record, limit) == UpsertOutcome::Merged {
                merged += 1;
            }
        }
        self.metadata.stats.flat_codes = self
            .metadata
            .stats
            .flat_codes
            .max(delta.metadata.stats.flat_codes);
        self.refresh_stats();
        merged
    }

    /// Recompute every counter except `flat_codes`.
    pub fn refresh_stats(&mut self) {
        let stats = &mut self.metadata.stats;
        stats.mapped = self.mappings.len();
        stats.flat_codes = stats.flat_codes.max(stats.mapped);
        stats.unmapped = stats.flat_codes - stats.mapped;
        stats.manual_matches = 0;
        stats.automatic_matches = 0;
        for m in self.mappings.values().flat_map(|r| &r.matches) {
            match m.provenance {
                Provenance::Manual => stats.manual_matches += 1,
                Provenance::Automatic => stats.automatic_matches += 1,
            }
        }
        stats.total_candidates = stats.manual_matches + stats.automatic_matches;
    }

    /// Set the `generated` timestamp. The only field that differs between identical runs.
    pub fn stamp(&mut self, generated_unix_ms: u64) {
        self.metadata.generated = generated_unix_ms;
    }
}

/// A reverse-lookup row: which source maps to a target, and how strongly.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
pub struct ReverseLink {
    pub source_code: String,
    pub score: u32,
    pub provenance: Provenance,
}

/// Forward and reverse lookup tables derived from a store.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
pub struct LookupIndices {
    pub source_to_targets: BTreeMap<String, Vec<String>>,
    pub target_to_sources: BTreeMap<String, Vec<ReverseLink>>,
}

impl LookupIndices {
    pub fn build(store: &MappingStore) -> Self {
        let mut indices = Self::default();
        for record in store.records() {
            indices.source_to_targets.insert(
                record.source_code.clone(),
                record.matches.iter().map(|m| m.target_code.clone()).collect(),
            );
            for m in &record.matches {
                indices
                    .target_to_sources
                    .entry(m.target_code.clone())
                    .or_default()
                    .push(ReverseLink {
                        source_code: record.source_code.clone(),
                        score: m.score,
                        provenance: m.provenance,
                    });
            }
        }
        for links in indices.target_to_sources.values_mut() {
            links.sort_by(|a, b| {
                a.provenance
                    .rank()
                    .cmp(&b.provenance.rank())
                    .then_with(|| b.score.cmp(&a.score))
                    .then_with(|| a.source_code.cmp(&b.source_code))
            });
        }
        indices
    }

    #[must_use]
    pub fn targets_for(&self, source_code: &str) -> &[String] {
        self.source_to_targets
            .get(source_code)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    #[must_use]
    pub fn sources_for(&self, target_code: &str) -> &[ReverseLink] {
        self.target_to_sources
            .get(target_code)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn candidate(target: &str, score: u32, provenance: Provenance) -> MatchCandidate {
        MatchCandidate {
            target_code: target.to_string(),
            target_description: format!("term {target}"),
            score,
            provenance,
            category_prefix: target.chars().next().unwrap(),
        }
    }

    fn record(source: &str, matches: Vec<MatchCandidate>) -> MappingRecord {
        MappingRecord {
            source_code: source.to_string(),
            source_description: format!("flat {source}"),
            matches,
        }
    }

    #[test]
    fn ranking_puts_manual_first_then_score_then_code() {
        let mut matches = vec![
            candidate("B02", 40, Provenance::Automatic),
            candidate("A01", 100, Provenance::Manual),
            candidate("B01", 40, Provenance::Automatic),
            candidate("C01", 160, Provenance::Automatic),
        ];
        rank_matches(&mut matches);
        let order: Vec<&str> = matches.iter().map(|m| m.target_code.as_str()).collect();
        assert_eq!(order, vec!["A01", "C01", "B01", "B02"]);
    }

    #[test]
    fn merge_prefers_manual_then_higher_score() {
        let existing = vec![
            candidate("M030405", 145, Provenance::Automatic),
            candidate("M0304", 60, Provenance::Automatic),
        ];
        let incoming = vec![
            candidate("M030405", 100, Provenance::Manual),
            candidate("M0304", 45, Provenance::Automatic),
        ];
        let merged = merge_matches(existing, incoming);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].provenance, Provenance::Manual);
        assert_eq!(merged[0].score, 100);
        assert_eq!(merged[1].score, 60);
    }

    #[test]
    fn upsert_merges_instead_of_duplicating() {
        let mut store = MappingStore::new();
        let first = store.upsert(
            record("42811", vec![candidate("M0304", 60, Provenance::Automatic)]),
            Some(5),
        );
        let second = store.upsert(
            record("42811", vec![candidate("M030405", 100, Provenance::Manual)]),
            Some(5),
        );
        assert_eq!(first, UpsertOutcome::Inserted);
        assert_eq!(second, UpsertOutcome::Merged);
        assert_eq!(store.len(), 1);
        let rec = store.get("42811").unwrap();
        assert_eq!(rec.matches.len(), 2);
        assert_eq!(rec.matches[0].target_code, "M030405");
    }

    #[test]
    fn limit_never_drops_manual_matches() {
        let mut store = MappingStore::new();
        store.upsert(
            record(
                "10001",
                vec![
                    candidate("A01", 100, Provenance::Manual),
                    candidate("A02", 100, Provenance::Manual),
                    candidate("A03", 90, Provenance::Automatic),
                ],
            ),
            Some(1),
        );
        let rec = store.get("10001").unwrap();
        assert_eq!(rec.matches.len(), 2);
        assert!(rec.matches.iter().all(|m| m.provenance == Provenance::Manual));
    }

    #[test]
    fn stats_and_indices_follow_records() {
        let mut store = MappingStore::new();
        store.metadata.stats.flat_codes = 3;
        store.upsert(
            record(
                "10001",
                vec![
                    candidate("A01", 100, Provenance::Manual),
                    candidate("A02", 40, Provenance::Automatic),
                ],
            ),
            None,
        );
        store.upsert(
            record("10002", vec![candidate("A02", 70, Provenance::Automatic)]),
            None,
        );
        store.refresh_stats();
        let stats = &store.metadata.stats;
        assert_eq!(stats.mapped, 2);
        assert_eq!(stats.unmapped, 1);
        assert_eq!(stats.manual_matches, 1);
        assert_eq!(stats.automatic_matches, 2);

        let indices = LookupIndices::build(&store);
        assert_eq!(indices.targets_for("10001"), ["A01".to_string(), "A02".to_string()]);
        let reverse: Vec<&str> = indices
            .sources_for("A02")
            .iter()
            .map(|l| l.source_code.as_str())
            .collect();
        assert_eq!(reverse, vec!["10002", "10001"]);
        assert!(indices.sources_for("Z99").is_empty());
    }

    #[test]
    fn merge_store_applies_delta() {
        let mut base = MappingStore::new();
        base.upsert(
            record("10001", vec![candidate("A01", 50, Provenance::Automatic)]),
            None,
        );
        let mut delta = MappingStore::new();
        delta.upsert(
            record("10001", vec![candidate("A01", 70, Provenance::Automatic)]),
            None,
        );
        delta.upsert(
            record("10002", vec![candidate("B01", 30, Provenance::Automatic)]),
            None,
        );
        let merged = base.merge_store(delta, Some(5));
        assert_eq!(merged, 1);
        assert_eq!(base.len(), 2);
        assert_eq!(base.get("10001").unwrap().matches[0].score, 70);
        assert_eq!(base.metadata.stats.mapped, 2);
    }
}
