use crate::rules::{default_cross_checks, CrossCheckRule};
use nomap_mapping::MappingStore;
use nomap_protocol::{
    FindingKind, MappingRecord, MatchCandidate, Provenance, Severity, ValidationFinding,
};
use nomap_taxonomy::{canonicalize, tokens_related, HierarchyIndex, Tokenizer};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default, deny_unknown_fields)]
pub struct ValidatorConfig {
    /// Shortest token considered by the semantic check
    pub semantic_min_token_chars: usize,
    pub cross_checks: Vec<CrossCheckRule>,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            semantic_min_token_chars: 4,
            cross_checks: default_cross_checks(),
        }
    }
}

impl ValidatorConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.semantic_min_token_chars == 0 {
            return Err("validator.semantic_min_token_chars must be > 0".to_string());
        }
        for rule in &self.cross_checks {
            rule.validate()?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ReportMetadata {
    pub total_mappings: usize,
    pub critical_issues: usize,
    pub high_issues: usize,
    pub medium_warnings: usize,
    pub low_notices: usize,
}

/// Findings for a whole store, in source-code then candidate order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ValidationReport {
    pub metadata: ReportMetadata,
    pub results: Vec<ValidationFinding>,
}

impl ValidationReport {
    fn from_findings(total_mappings: usize, results: Vec<ValidationFinding>) -> Self {
        let mut metadata = ReportMetadata {
            total_mappings,
            ..ReportMetadata::default()
        };
        for finding in &results {
            match finding.severity {
                Severity::Critical => metadata.critical_issues += 1,
                Severity::High => metadata.high_issues += 1,
                Severity::Medium => metadata.medium_warnings += 1,
                Severity::Low => metadata.low_notices += 1,
            }
        }
        Self { metadata, results }
    }

    #[must_use]
    pub fn count(&self, severity: Severity) -> usize {
        self.results
            .iter()
            .filter(|f| f.severity == severity)
            .count()
    }

    pub fn findings_for<'a>(
        &'a self,
        source_code: &'a str,
    ) -> impl Iterator<Item = &'a ValidationFinding> + 'a {
        self.results
            .iter()
            .filter(move |f| f.source_code == source_code)
    }

    #[must_use]
    pub fn has_critical(&self) -> bool {
        self.metadata.critical_issues > 0
    }
}

/// Checks a mapping store against the hierarchical index. Read-only.
pub struct Validator<'a> {
    config: &'a ValidatorConfig,
    hierarchy: &'a HierarchyIndex,
    tokenizer: &'a Tokenizer,
}

impl<'a> Validator<'a> {
    pub fn new(
        config: &'a ValidatorConfig,
        hierarchy: &'a HierarchyIndex,
        tokenizer: &'a Tokenizer,
    ) -> Self {
        Self {
            config,
            hierarchy,
            tokenizer,
        }
    }

    pub fn validate(&self, store: &MappingStore) -> ValidationReport {
        let findings: Vec<ValidationFinding> =
            store.records().flat_map(|r| self.check_record(r)).collect();
        let report = ValidationReport::from_findings(store.len(), findings);
        log::info!(
            "validated {} mappings: {} critical, {} high, {} medium, {} low",
            report.metadata.total_mappings,
            report.metadata.critical_issues,
            report.metadata.high_issues,
            report.metadata.medium_warnings,
            report.metadata.low_notices
        );
        report
    }

    /// Findings for every candidate of one record.
    #[must_use]
    pub fn check_record(&self, record: &MappingRecord) -> Vec<ValidationFinding> {
        let canonical_source = canonicalize(&record.source_description);
        let source_tokens = self.tokenizer.tokenize(&record.source_description);
        let rules: Vec<&CrossCheckRule> = self
            .config
            .cross_checks
            .iter()
            .filter(|rule| rule.applies_to(&canonical_source))
            .collect();

        let mut findings = Vec::new();
        for candidate in &record.matches {
            self.check_candidate(record, candidate, &source_tokens, &rules, &mut findings);
        }
        for finding in &findings {
            log::debug!(
                "{} -> {}: {:?} ({})",
                finding.source_code,
                finding.target_code,
                finding.kind,
                finding.detail
            );
        }
        findings
    }

    fn check_candidate(
        &self,
        record: &MappingRecord,
        candidate: &MatchCandidate,
        source_tokens: &BTreeSet<String>,
        rules: &[&CrossCheckRule],
        findings: &mut Vec<ValidationFinding>,
    ) {
        let finding = |kind, severity, detail: String| {
            ValidationFinding::new(
                record.source_code.as_str(),
                candidate.target_code.as_str(),
                kind,
                severity,
                detail,
            )
        };

        let Some(entry) = self.hierarchy.get(&candidate.target_code) else {
            findings.push(finding(
                FindingKind::MissingTarget,
                Severity::Critical,
                format!("{} is not in the hierarchy", candidate.target_code),
            ));
            return;
        };

        if candidate.target_description.trim() != entry.description.trim() {
            findings.push(finding(
                FindingKind::DescriptionMismatch,
                Severity::Critical,
                format!(
                    "stored {:?}, hierarchy has {:?}",
                    candidate.target_description, entry.description
                ),
            ));
        }

        let manual = candidate.provenance == Provenance::Manual;
        if manual && candidate.category_prefix != entry.category_prefix {
            findings.push(finding(
                FindingKind::CategoryMismatch,
                Severity::Medium,
                format!(
                    "recorded category {}, hierarchy has {}",
                    candidate.category_prefix, entry.category_prefix
                ),
            ));
        }

        if manual && !self.related(source_tokens, &entry.description) {
            findings.push(finding(
                FindingKind::SemanticMismatch,
                Severity::Low,
                format!(
                    "{:?} and {:?} share no related terms",
                    record.source_description, entry.description
                ),
            ));
        }

        for rule in rules {
            if rule.manual_only && !manual {
                continue;
            }
            if let Some(detail) = rule.violation(&candidate.target_code) {
                findings.push(finding(FindingKind::CategoryMismatch, rule.severity, detail));
            }
        }
    }

    fn related(&self, source_tokens: &BTreeSet<String>, target_description: &str) -> bool {
        let min = self.config.semantic_min_token_chars;
        let target_tokens = self.tokenizer.tokenize(target_description);
        source_tokens
            .iter()
            .any(|s| target_tokens.iter().any(|t| tokens_related(s, t, min)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nomap_protocol::HierarchicalEntry;
    use nomap_taxonomy::{reconstruct, DEFAULT_DEPTH_LENGTHS};
    use pretty_assertions::assert_eq;

    fn hierarchy() -> HierarchyIndex {
        let entry = |code: &str, description: &str, depth: u8| HierarchicalEntry {
            code: code.to_string(),
            description: description.to_string(),
            category_prefix: code.chars().next().unwrap(),
            depth,
            is_terminal: true,
            parent_code: None,
        };
        reconstruct(
            vec![
                entry("M030405", "COMPRESSION STOCKINGS", 4),
                entry("T0102", "NON-STERILE GLOVES", 3),
                entry("L0901", "SURGICAL SCREWDRIVERS", 3),
            ],
            &DEFAULT_DEPTH_LENGTHS,
        )
    }

    fn candidate(
        target: &str,
        description: &str,
        provenance: Provenance,
        prefix: char,
    ) -> MatchCandidate {
        MatchCandidate {
            target_code: target.to_string(),
            target_description: description.to_string(),
            score: 100,
            provenance,
            category_prefix: prefix,
        }
    }

    fn store_with(description: &str, matches: Vec<MatchCandidate>) -> MappingStore {
        let mut store = MappingStore::new();
        store.upsert(
            MappingRecord {
                source_code: "42811".to_string(),
                source_description: description.to_string(),
                matches,
            },
            None,
        );
        store
    }

    fn run(store: &MappingStore) -> ValidationReport {
        let hierarchy = hierarchy();
        let config = ValidatorConfig::default();
        let tokenizer = Tokenizer::default();
        Validator::new(&config, &hierarchy, &tokenizer).validate(store)
    }

    #[test]
    fn clean_manual_mapping_has_no_findings() {
        let store = store_with(
            "Compression/pressure sock/stocking, reusable",
            vec![candidate(
                "M030405",
                "COMPRESSION STOCKINGS",
                Provenance::Manual,
                'M',
            )],
        );
        let report = run(&store);
        assert_eq!(report.results, vec![]);
        assert_eq!(report.metadata.total_mappings, 1);
    }

    #[test]
    fn missing_target_yields_exactly_one_finding() {
        let store = store_with(
            "Compression/pressure sock/stocking, reusable",
            vec![candidate("M999999", "UNKNOWN", Provenance::Manual, 'T')],
        );
        let report = run(&store);
        assert_eq!(report.results.len(), 1);
        assert_eq!(report.results[0].kind, FindingKind::MissingTarget);
        assert_eq!(report.results[0].severity, Severity::Critical);
        assert_eq!(report.metadata.critical_issues, 1);
        assert!(report.has_critical());
    }

    #[test]
    fn description_drift_is_critical() {
        let store = store_with(
            "Compression stocking",
            vec![candidate(
                "M030405",
                "COMPRESSION STOCKINGS (OLD)",
                Provenance::Automatic,
                'M',
            )],
        );
        let report = run(&store);
        assert_eq!(report.results.len(), 1);
        assert_eq!(report.results[0].kind, FindingKind::DescriptionMismatch);

        let padded = store_with(
            "Compression stocking",
            vec![candidate(
                "M030405",
                " COMPRESSION STOCKINGS ",
                Provenance::Automatic,
                'M',
            )],
        );
        assert!(run(&padded).results.is_empty());
    }

    #[test]
    fn manual_checks_category_semantics_and_rules() {
        let store = store_with(
            "Compression/pressure sock/stocking, reusable",
            vec![candidate(
                "T0102",
                "NON-STERILE GLOVES",
                Provenance::Manual,
                'M',
            )],
        );
        let report = run(&store);
        let kinds: Vec<(FindingKind, Severity)> =
            report.results.iter().map(|f| (f.kind, f.severity)).collect();
        assert_eq!(
            kinds,
            vec![
                (FindingKind::CategoryMismatch, Severity::Medium),
                (FindingKind::SemanticMismatch, Severity::Low),
                (FindingKind::CategoryMismatch, Severity::Critical),
            ]
        );
        assert_eq!(report.count(Severity::Critical), 1);
        assert_eq!(report.findings_for("42811").count(), 3);
    }

    #[test]
    fn automatic_candidates_skip_manual_only_checks() {
        let store = store_with(
            "Compression/pressure sock/stocking, reusable",
            vec![candidate(
                "L0901",
                "SURGICAL SCREWDRIVERS",
                Provenance::Automatic,
                'T',
            )],
        );
        assert!(run(&store).results.is_empty());
    }

    #[test]
    fn validation_does_not_mutate_the_store() {
        let store = store_with(
            "Compression stocking",
            vec![candidate("X0001", "GONE", Provenance::Manual, 'X')],
        );
        let before = store.clone();
        let _ = run(&store);
        assert_eq!(store, before);
    }
}
