use nomap_mapping::{MappingStore, UpsertOutcome};
use nomap_protocol::ReferenceEntry;
use nomap_taxonomy::{canonicalize, ReferenceList, Tokenizer};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default, deny_unknown_fields)]
pub struct NormalizerConfig {
    /// Lowest token Jaccard similarity accepted by the fallback tier
    pub min_jaccard: f64,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self { min_jaccard: 0.3 }
    }
}

impl NormalizerConfig {
    pub fn validate(&self) -> Result<(), String> {
        if !(0.0..=1.0).contains(&self.min_jaccard) {
            return Err(format!(
                "normalizer.min_jaccard must be within 0..=1 (got {})",
                self.min_jaccard
            ));
        }
        Ok(())
    }
}

/// Which rule resolved a description.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionTier {
    Exact,
    CaseInsensitive,
    Canonical,
    TokenOverlap,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Resolution {
    pub code: String,
    pub tier: ResolutionTier,
    /// 1.0 for the string tiers, the Jaccard score for the token tier
    pub similarity: f64,
    /// Codes that tied with `code` after the preference rule, ascending
    pub tied_with: Vec<String>,
}

/// Best reference entry below the acceptance threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Suggestion {
    pub code: String,
    pub description: String,
    pub similarity: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Lookup {
    Resolved(Resolution),
    Unresolved(Option<Suggestion>),
}

struct PreparedEntry<'a> {
    entry: &'a ReferenceEntry,
    canonical: String,
    tokens: BTreeSet<String>,
}

/// Resolves free-text descriptions against the authoritative reference list.
///
/// Lookup tables are built once; every bucket lists entries in code order.
pub struct ReferenceMatcher<'a> {
    reference: &'a ReferenceList,
    entries: Vec<PreparedEntry<'a>>,
    exact: HashMap<&'a str, Vec<usize>>,
    lowercase: HashMap<String, Vec<usize>>,
    canonical: HashMap<String, Vec<usize>>,
    by_token: HashMap<String, Vec<usize>>,
    min_jaccard: f64,
}

impl<'a> ReferenceMatcher<'a> {
    pub fn new(reference: &'a ReferenceList, tokenizer: &Tokenizer, config: &NormalizerConfig) -> Self {
        let mut matcher = Self {
            reference,
            entries: Vec::with_capacity(reference.len()),
            exact: HashMap::new(),
            lowercase: HashMap::new(),
            canonical: HashMap::new(),
            by_token: HashMap::new(),
            min_jaccard: config.min_jaccard,
        };

        for (idx, entry) in reference.iter().enumerate() {
            let prepared = PreparedEntry {
                entry,
                canonical: canonicalize(&entry.description),
                tokens: tokenizer.tokenize(&entry.description),
            };
            matcher
                .exact
                .entry(entry.description.as_str())
                .or_default()
                .push(idx);
            matcher
                .lowercase
                .entry(entry.description.to_lowercase())
                .or_default()
                .push(idx);
            matcher
                .canonical
                .entry(prepared.canonical.clone())
                .or_default()
                .push(idx);
            for token in &prepared.tokens {
                matcher.by_token.entry(token.clone()).or_default().push(idx);
            }
            matcher.entries.push(prepared);
        }
        matcher
    }

    /// Resolve one description, trying each tier in order.
    pub fn resolve(&self, description: &str, tokenizer: &Tokenizer) -> Lookup {
        self.resolve_record(None, description, tokenizer)
    }

    /// Like [`Self::resolve`], but a record whose own code is among the best candidates keeps it.
    pub fn resolve_record(
        &self,
        current: Option<&str>,
        description: &str,
        tokenizer: &Tokenizer,
    ) -> Lookup {
        if let Some(resolution) = self
            .exact
            .get(description)
            .and_then(|hits| self.pick(hits, current, ResolutionTier::Exact, 1.0))
        {
            return Lookup::Resolved(resolution);
        }
        if let Some(resolution) = self
            .lowercase
            .get(&description.to_lowercase())
            .and_then(|hits| self.pick(hits, current, ResolutionTier::CaseInsensitive, 1.0))
        {
            return Lookup::Resolved(resolution);
        }
        let canonical = canonicalize(description);
        if let Some(resolution) = self
            .canonical
            .get(&canonical)
            .and_then(|hits| self.pick(hits, current, ResolutionTier::Canonical, 1.0))
        {
            return Lookup::Resolved(resolution);
        }

        let tokens = tokenizer.tokenize(description);
        let Some((similarity, hits)) = self.closest(&tokens) else {
            return Lookup::Unresolved(None);
        };
        let Some(best) = self.pick(&hits, current, ResolutionTier::TokenOverlap, similarity)
        else {
            return Lookup::Unresolved(None);
        };
        if similarity >= self.min_jaccard {
            return Lookup::Resolved(best);
        }
        let description = self
            .reference
            .get(&best.code)
            .map(|e| e.description.clone())
            .unwrap_or_default();
        Lookup::Unresolved(Some(Suggestion {
            code: best.code,
            description,
            similarity,
        }))
    }

    /// Reference descriptions shared by more than one code, by description.
    #[must_use]
    pub fn duplicate_references(&self) -> Vec<DuplicateReference> {
        let mut duplicates: Vec<DuplicateReference> = self
            .exact
            .iter()
            .filter(|(_, hits)| hits.len() > 1)
            .map(|(description, hits)| DuplicateReference {
                description: (*description).to_string(),
                codes: hits
                    .iter()
                    .map(|&idx| self.entries[idx].entry.code.clone())
                    .collect(),
            })
            .collect();
        duplicates.sort_by(|a, b| a.description.cmp(&b.description));
        duplicates
    }

    #[must_use]
    pub fn entry(&self, code: &str) -> Option<&ReferenceEntry> {
        self.reference.get(code)
    }

    /// Apply the preference rule (status, then shorter canonical form). A `current` code among the
    /// survivors wins outright; otherwise what remains is broken by code.
    fn pick(
        &self,
        hits: &[usize],
        current: Option<&str>,
        tier: ResolutionTier,
        similarity: f64,
    ) -> Option<Resolution> {
        let key = |idx: usize| {
            let prepared = &self.entries[idx];
            (
                prepared.entry.status.preference(),
                prepared.canonical.chars().count(),
            )
        };
        let best = hits.iter().map(|&idx| key(idx)).min()?;
        let mut tied: Vec<&str> = hits
            .iter()
            .filter(|&&idx| key(idx) == best)
            .map(|&idx| self.entries[idx].entry.code.as_str())
            .collect();
        if let Some(code) = current.filter(|c| tied.contains(c)) {
            return Some(Resolution {
                code: code.to_string(),
                tier,
                similarity,
                tied_with: Vec::new(),
            });
        }
        tied.sort_unstable();
        tied.dedup();
        let (code, rest) = tied.split_first()?;
        Some(Resolution {
            code: (*code).to_string(),
            tier,
            similarity,
            tied_with: rest.iter().map(|c| (*c).to_string()).collect(),
        })
    }

    /// Highest Jaccard similarity among entries sharing at least one token, with every entry
    /// reaching it.
    fn closest(&self, tokens: &BTreeSet<String>) -> Option<(f64, Vec<usize>)> {
        let mut shared: BTreeMap<usize, usize> = BTreeMap::new();
        for token in tokens {
            for &idx in self.by_token.get(token).into_iter().flatten() {
                *shared.entry(idx).or_default() += 1;
            }
        }

        let mut best: Option<(f64, Vec<usize>)> = None;
        for (idx, intersection) in shared {
            let union = tokens.len() + self.entries[idx].tokens.len() - intersection;
            let similarity = intersection as f64 / union as f64;
            match &mut best {
                Some((score, hits)) if similarity == *score => hits.push(idx),
                Some((score, _)) if similarity < *score => {}
                _ => best = Some((similarity, vec![idx])),
            }
        }
        best
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ConflictKind {
    /// Records with different descriptions collapsed onto one code
    MergedDescriptions,
    /// Several reference codes were equally good
    AmbiguousTie,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ConflictMember {
    pub code: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ResolutionConflict {
    /// The code the records now live under
    pub code: String,
    pub kind: ConflictKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tier: Option<ResolutionTier>,
    pub members: Vec<ConflictMember>,
    pub detail: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct UnresolvedEntry {
    pub source_code: String,
    pub description: String,
    pub suggestion: Option<Suggestion>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct DuplicateReference {
    pub description: String,
    pub codes: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct NormalizationStats {
    pub records_in: usize,
    pub records_out: usize,
    pub exact: usize,
    pub case_insensitive: usize,
    pub canonical: usize,
    pub token_overlap: usize,
    pub unresolved: usize,
    /// Records whose source code changed
    pub rekeyed: usize,
    /// Records folded into another record
    pub merged: usize,
    pub ambiguous: usize,
}

impl NormalizationStats {
    fn count(&mut self, tier: ResolutionTier) {
        match tier {
            ResolutionTier::Exact => self.exact += 1,
            ResolutionTier::CaseInsensitive => self.case_insensitive += 1,
            ResolutionTier::Canonical => self.canonical += 1,
            ResolutionTier::TokenOverlap => self.token_overlap += 1,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct NormalizationReport {
    pub stats: NormalizationStats,
    pub unresolved: Vec<UnresolvedEntry>,
    pub conflicts: Vec<ResolutionConflict>,
    pub duplicate_references: Vec<DuplicateReference>,
}

#[derive(Debug, Clone)]
pub struct NormalizationOutcome {
    pub store: MappingStore,
    pub report: NormalizationReport,
}

/// Re-key every record onto its reference code and merge records that collide.
///
/// Resolved records adopt the reference description. Unresolved records stay under their
/// original code. The input store is left untouched.
pub fn normalize(
    store: &MappingStore,
    matcher: &ReferenceMatcher<'_>,
    tokenizer: &Tokenizer,
) -> NormalizationOutcome {
    let mut normalized = MappingStore {
        metadata: store.metadata.clone(),
        mappings: BTreeMap::new(),
    };
    let mut report = NormalizationReport {
        duplicate_references: matcher.duplicate_references(),
        ..NormalizationReport::default()
    };
    report.stats.records_in = store.len();
    let mut origins: BTreeMap<String, Vec<ConflictMember>> = BTreeMap::new();

    for record in store.records() {
        let mut record = record.clone();
        let original = ConflictMember {
            code: record.source_code.clone(),
            description: record.source_description.clone(),
        };

        match matcher.resolve_record(
            Some(&record.source_code),
            &record.source_description,
            tokenizer,
        ) {
            Lookup::Resolved(resolution) => {
                report.stats.count(resolution.tier);
                if !resolution.tied_with.is_empty() {
                    report.stats.ambiguous += 1;
                    log::warn!(
                        "{}: {:?} tie between {} and {:?}; taking {}",
                        record.source_code,
                        resolution.tier,
                        resolution.code,
                        resolution.tied_with,
                        resolution.code
                    );
                    report
                        .conflicts
                        .push(ambiguity_conflict(&record.source_code, &resolution, matcher));
                }
                if resolution.code != record.source_code {
                    report.stats.rekeyed += 1;
                    log::info!(
                        "re-keyed {} -> {} ({:?})",
                        record.source_code,
                        resolution.code,
                        resolution.tier
                    );
                }
                if let Some(entry) = matcher.entry(&resolution.code) {
                    record.source_description = entry.description.clone();
                }
                record.source_code = resolution.code;
            }
            Lookup::Unresolved(suggestion) => {
                report.stats.unresolved += 1;
                match &suggestion {
                    Some(s) => log::warn!(
                        "{}: {:?} unresolved (closest {} {:?}, similarity {:.3})",
                        record.source_code,
                        record.source_description,
                        s.code,
                        s.description,
                        s.similarity
                    ),
                    None => log::warn!(
                        "{}: {:?} unresolved (no reference shares a token)",
                        record.source_code,
                        record.source_description
                    ),
                }
                report.unresolved.push(UnresolvedEntry {
                    source_code: record.source_code.clone(),
                    description: record.source_description.clone(),
                    suggestion,
                });
            }
        }

        origins
            .entry(record.source_code.clone())
            .or_default()
            .push(original);
        if normalized.upsert(record, None) == UpsertOutcome::Merged {
            report.stats.merged += 1;
        }
    }

    for (code, members) in origins {
        let differs = members
            .windows(2)
            .any(|pair| pair[0].description != pair[1].description);
        if members.len() < 2 || !differs {
            continue;
        }
        log::warn!(
            "{code}: merged {} records with differing descriptions",
            members.len()
        );
        report.conflicts.push(ResolutionConflict {
            detail: format!(
                "{} records with differing descriptions merged under {code}",
                members.len()
            ),
            code,
            kind: ConflictKind::MergedDescriptions,
            tier: None,
            members,
        });
    }

    normalized.refresh_stats();
    report.stats.records_out = normalized.len();
    log::info!(
        "normalized {} records into {} (exact {}, case-insensitive {}, canonical {}, token {}, unresolved {}, merged {})",
        report.stats.records_in,
        report.stats.records_out,
        report.stats.exact,
        report.stats.case_insensitive,
        report.stats.canonical,
        report.stats.token_overlap,
        report.stats.unresolved,
        report.stats.merged
    );
    NormalizationOutcome {
        store: normalized,
        report,
    }
}

fn ambiguity_conflict(
    source_code: &str,
    resolution: &Resolution,
    matcher: &ReferenceMatcher<'_>,
) -> ResolutionConflict {
    let members = std::iter::once(&resolution.code)
        .chain(&resolution.tied_with)
        .map(|code| ConflictMember {
            code: code.clone(),
            description: matcher
                .entry(code)
                .map(|e| e.description.clone())
                .unwrap_or_default(),
        })
        .collect();
    ResolutionConflict {
        code: resolution.code.clone(),
        kind: ConflictKind::AmbiguousTie,
        tier: Some(resolution.tier),
        members,
        detail: format!(
            "{source_code}: {} equally preferred reference codes, lowest code taken",
            resolution.tied_with.len() + 1
        ),
    }
}
