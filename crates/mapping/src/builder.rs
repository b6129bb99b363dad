use crate::config::BuilderConfig;
use crate::overrides::{ManualOverride, ManualOverrides};
use crate::scorer::{PreparedText, SimilarityScorer};
use crate::store::{rank_matches, MappingStore};
use nomap_protocol::{FlatCode, HierarchicalEntry, MappingRecord, MatchCandidate, Provenance};
use nomap_taxonomy::HierarchyIndex;

/// Assembles one mapping record per flat code from overrides and scored candidates.
///
/// Hierarchical descriptions are prepared once at construction; each flat code is then scored
/// against the prepared set.
pub struct MappingBuilder<'a> {
    config: &'a BuilderConfig,
    scorer: &'a SimilarityScorer,
    hierarchy: &'a HierarchyIndex,
    overrides: &'a ManualOverrides,
    targets: Vec<(&'a HierarchicalEntry, PreparedText)>,
}

impl<'a> MappingBuilder<'a> {
    pub fn new(
        config: &'a BuilderConfig,
        scorer: &'a SimilarityScorer,
        hierarchy: &'a HierarchyIndex,
        overrides: &'a ManualOverrides,
    ) -> Self {
        let terminal_only = scorer.config().terminal_only;
        let targets = hierarchy
            .iter()
            .filter(|e| !terminal_only || e.is_terminal)
            .map(|e| (e, scorer.prepare(&e.description)))
            .collect::<Vec<_>>();
        log::debug!("prepared {} scoring targets", targets.len());
        Self {
            config,
            scorer,
            hierarchy,
            overrides,
            targets,
        }
    }

    /// Build a fresh store for `flat_codes`.
    pub fn build(&self, flat_codes: &[FlatCode]) -> MappingStore {
        let mut store = MappingStore::new();
        store.metadata.stats.flat_codes = flat_codes.len();
        self.build_into(&mut store, flat_codes);
        log::info!(
            "built {} mapping records for {} flat codes ({} unmapped)",
            store.metadata.stats.mapped,
            store.metadata.stats.flat_codes,
            store.metadata.stats.unmapped
        );
        store
    }

    /// Build records for `flat_codes` and merge them into an existing store.
    pub fn build_into(&self, store: &mut MappingStore, flat_codes: &[FlatCode]) {
        for flat in flat_codes {
            if let Some(record) = self.build_record(flat) {
                store.upsert(record, Some(self.config.max_candidates));
            } else {
                log::debug!("{}: no candidate above threshold", flat.code);
            }
        }
        store.refresh_stats();
    }

    /// Candidates for one flat code, or `None` when nothing qualifies.
    #[must_use]
    pub fn build_record(&self, flat: &FlatCode) -> Option<MappingRecord> {
        let mut matches: Vec<MatchCandidate> = self
            .overrides
            .get(&flat.code)
            .iter()
            .map(|o| self.manual_candidate(&flat.code, o))
            .collect();

        if matches.len() < self.config.min_manual_matches {
            let room = self.config.max_candidates.saturating_sub(matches.len());
            let automatic = self
                .automatic_candidates(&flat.description)
                .into_iter()
                .filter(|c| !matches.iter().any(|m| m.target_code == c.target_code))
                .take(room)
                .collect::<Vec<_>>();
            matches.extend(automatic);
        }

        if matches.is_empty() {
            return None;
        }
        rank_matches(&mut matches);
        Some(MappingRecord {
            source_code: flat.code.clone(),
            source_description: flat.description.clone(),
            matches,
        })
    }

    /// Every hierarchical entry that clears the scorer's rules, best first (ties by code).
    #[must_use]
    pub fn automatic_candidates(&self, flat_description: &str) -> Vec<MatchCandidate> {
        let flat = self.scorer.prepare(flat_description);
        let mut candidates: Vec<MatchCandidate> = self
            .targets
            .iter()
            .filter_map(|(entry, prepared)| {
                let breakdown = self.scorer.compare(&flat, prepared, entry.category_prefix);
                if !self.scorer.accepts(&breakdown) {
                    return None;
                }
                Some(MatchCandidate {
                    target_code: entry.code.clone(),
                    target_description: entry.description.clone(),
                    score: breakdown.total(),
                    provenance: Provenance::Automatic,
                    category_prefix: entry.category_prefix,
                })
            })
            .collect();
        candidates.sort_by(|a, b| {
            b.score
                .cmp(&a.score)
                .then_with(|| a.target_code.cmp(&b.target_code))
        });
        candidates
    }

    fn manual_candidate(&self, source_code: &str, o: &ManualOverride) -> MatchCandidate {
        let (description, prefix) = match self.hierarchy.get(&o.target_code) {
            Some(entry) => (entry.description.clone(), entry.category_prefix),
            None => {
                log::warn!(
                    "override {source_code} -> {}: target not in hierarchy",
                    o.target_code
                );
                (
                    o.target_description.clone().unwrap_or_default(),
                    o.target_code.chars().next().unwrap_or_default(),
                )
            }
        };
        MatchCandidate {
            target_code: o.target_code.clone(),
            target_description: description,
            score: self.config.manual_score,
            provenance: Provenance::Manual,
            category_prefix: o.category.unwrap_or(prefix),
        }
    }
}
