use crate::config::ScoringConfig;
use nomap_protocol::HierarchicalEntry;
use nomap_taxonomy::{canonicalize, mentions, substring_related, Tokenizer};
use serde::{Deserialize, Serialize};

/// Per-signal contributions to a similarity score.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub containment: u32,
    pub token_overlap: u32,
    pub keyword: u32,
    pub category: u32,
    pub modifier: u32,
}

impl ScoreBreakdown {
    #[must_use]
    pub const fn total(&self) -> u32 {
        self.containment
            .saturating_add(self.token_overlap)
            .saturating_add(self.keyword)
            .saturating_add(self.category)
            .saturating_add(self.modifier)
    }

    /// Points earned from the descriptions' wording rather than from category hints.
    #[must_use]
    pub const fn textual(&self) -> u32 {
        self.containment
            .saturating_add(self.token_overlap)
            .saturating_add(self.keyword)
    }
}

/// A description reduced to what the scorer compares.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PreparedText {
    pub canonical: String,
    pub tokens: Vec<String>,
    /// Indices into the scorer's keyword vocabulary
    keywords: Vec<usize>,
    /// Indices into the scorer's modifier vocabulary
    modifiers: Vec<usize>,
    /// Category from the keyword → prefix table
    pub category: Option<char>,
}

/// Weighted textual similarity between flat and hierarchical descriptions.
#[derive(Debug, Clone)]
pub struct SimilarityScorer {
    config: ScoringConfig,
    tokenizer: Tokenizer,
    keywords: Vec<String>,
    modifiers: Vec<String>,
    rules: Vec<(String, char)>,
}

fn canonical_vocabulary(words: &[String]) -> Vec<String> {
    words
        .iter()
        .map(|w| canonicalize(w))
        .filter(|w| !w.is_empty())
        .collect()
}

fn shared(a: &[usize], b: &[usize]) -> u32 {
    let count = a.iter().filter(|idx| b.contains(*idx)).count();
    u32::try_from(count).unwrap_or(u32::MAX)
}

impl SimilarityScorer {
    pub fn new(config: &ScoringConfig, tokenizer: Tokenizer) -> Self {
        let rules = config
            .category_rules
            .iter()
            .map(|r| (canonicalize(&r.keyword), r.prefix.to_ascii_uppercase()))
            .filter(|(k, _)| !k.is_empty())
            .collect();
        Self {
            keywords: canonical_vocabulary(&config.keywords),
            modifiers: canonical_vocabulary(&config.modifiers),
            rules,
            tokenizer,
            config: config.clone(),
        }
    }

    #[must_use]
    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    #[must_use]
    pub fn tokenizer(&self) -> &Tokenizer {
        &self.tokenizer
    }

    /// Canonicalize and tokenize once so a description can be compared against many others.
    #[must_use]
    pub fn prepare(&self, text: &str) -> PreparedText {
        let canonical = canonicalize(text);
        let hits = |vocab: &[String]| -> Vec<usize> {
            vocab
                .iter()
                .enumerate()
                .filter(|(_, term)| mentions(&canonical, term))
                .map(|(idx, _)| idx)
                .collect()
        };
        let keywords = hits(&self.keywords);
        let modifiers = hits(&self.modifiers);
        let category = self
            .rules
            .iter()
            .find(|(keyword, _)| mentions(&canonical, keyword))
            .map(|(_, prefix)| *prefix);
        PreparedText {
            tokens: self.tokenizer.tokenize(text).into_iter().collect(),
            canonical,
            keywords,
            modifiers,
            category,
        }
    }

    /// Keyword-derived category of a description, if any rule fires.
    #[must_use]
    pub fn category_for(&self, text: &str) -> Option<char> {
        self.prepare(text).category
    }

    /// Total similarity between a flat description and a hierarchical entry.
    #[must_use]
    pub fn score(&self, flat_description: &str, entry: &HierarchicalEntry) -> u32 {
        self.breakdown(flat_description, entry).total()
    }

    #[must_use]
    pub fn breakdown(&self, flat_description: &str, entry: &HierarchicalEntry) -> ScoreBreakdown {
        let flat = self.prepare(flat_description);
        let target = self.prepare(&entry.description);
        self.compare(&flat, &target, entry.category_prefix)
    }

    /// Score two prepared descriptions.
    #[must_use]
    pub fn compare(
        &self,
        flat: &PreparedText,
        target: &PreparedText,
        target_prefix: char,
    ) -> ScoreBreakdown {
        ScoreBreakdown {
            containment: self.containment_score(flat, target),
            token_overlap: self.token_overlap_score(flat, target),
            keyword: shared(&flat.keywords, &target.keywords)
                .saturating_mul(self.config.keyword_bonus),
            category: self.category_score(flat, target_prefix),
            modifier: shared(&flat.modifiers, &target.modifiers)
                .saturating_mul(self.config.modifier_bonus),
        }
    }

    /// Does a breakdown clear the retention rules?
    #[must_use]
    pub fn accepts(&self, breakdown: &ScoreBreakdown) -> bool {
        if self.config.require_textual_evidence && breakdown.textual() == 0 {
            return false;
        }
        breakdown.total() >= self.config.min_score
    }

    fn containment_score(&self, flat: &PreparedText, target: &PreparedText) -> u32 {
        if flat.canonical.is_empty() || target.canonical.is_empty() {
            return 0;
        }
        if substring_related(&flat.canonical, &target.canonical) {
            self.config.containment_bonus
        } else {
            0
        }
    }

    fn token_overlap_score(&self, flat: &PreparedText, target: &PreparedText) -> u32 {
        let related = flat
            .tokens
            .iter()
            .filter(|t| t.chars().count() >= self.config.min_overlap_token_chars)
            .filter(|t| target.tokens.iter().any(|h| substring_related(t, h)))
            .count();
        u32::try_from(related)
            .unwrap_or(u32::MAX)
            .saturating_mul(self.config.token_overlap_weight)
    }

    fn category_score(&self, flat: &PreparedText, target_prefix: char) -> u32 {
        match flat.category {
            Some(prefix) if prefix == target_prefix.to_ascii_uppercase() => {
                self.config.category_bonus
            }
            _ => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CategoryRule;

    fn entry(code: &str, description: &str) -> HierarchicalEntry {
        HierarchicalEntry {
            code: code.to_string(),
            description: description.to_string(),
            category_prefix: code.chars().next().unwrap(),
            depth: 4,
            is_terminal: true,
            parent_code: None,
        }
    }

    fn scorer() -> SimilarityScorer {
        SimilarityScorer::new(&ScoringConfig::default(), Tokenizer::default())
    }

    #[test]
    fn containment_clears_threshold() {
        let s = scorer();
        let target = entry("M030405", "COMPRESSION STOCKINGS");
        let breakdown = s.breakdown("Compression stocking", &target);
        assert_eq!(breakdown.containment, 100);
        assert_eq!(breakdown.token_overlap, 30);
        assert!(s.score("Compression stocking", &target) > s.config().min_score);
        assert!(s.accepts(&breakdown));
    }

    #[test]
    fn unrelated_terms_stay_below_threshold() {
        let s = scorer();
        let target = entry("L0901", "SURGICAL SCREWDRIVERS");
        let score = s.score("Syringe", &target);
        assert!(score < s.config().min_score, "score {score}");
    }

    #[test]
    fn keyword_and_category_bonuses() {
        let s = scorer();
        let target = entry("C0104", "CENTRAL VENOUS CATHETERS");
        let breakdown = s.breakdown("Catheter, tunnelled, reusable", &target);
        assert_eq!(breakdown.containment, 0);
        assert_eq!(breakdown.keyword, 30);
        assert_eq!(breakdown.category, 30);
        assert_eq!(breakdown.modifier, 0);
        assert_eq!(breakdown.token_overlap, 15);
    }

    #[test]
    fn modifiers_count_when_shared() {
        let s = scorer();
        let target = entry("T0102", "NON-STERILE GLOVES, SINGLE-USE");
        let breakdown = s.breakdown("Examination glove, single-use, non-sterile", &target);
        // "single use", "sterile" and "non sterile" are all mentioned by both
        assert_eq!(breakdown.modifier, 30);
        assert_eq!(breakdown.category, 30);
    }

    #[test]
    fn category_hint_alone_is_not_evidence() {
        let s = scorer();
        let target = entry("M9999", "ZINC PASTE");
        let breakdown = s.breakdown("Compression hosiery", &target);
        assert_eq!(breakdown.textual(), 0);
        assert_eq!(breakdown.category, 30);
        assert!(!s.accepts(&breakdown));
    }

    #[test]
    fn first_matching_rule_decides_category() {
        let config = ScoringConfig {
            category_rules: vec![
                CategoryRule::new("stent", 'P'),
                CategoryRule::new("catheter", 'C'),
            ],
            ..ScoringConfig::default()
        };
        let s = SimilarityScorer::new(&config, Tokenizer::default());
        assert_eq!(s.category_for("Stent delivery catheter"), Some('P'));
        assert_eq!(s.category_for("Catheter"), Some('C'));
        assert_eq!(s.category_for("Tongue depressor"), None);
    }

    #[test]
    fn empty_descriptions_score_zero() {
        let s = scorer();
        assert_eq!(s.score("", &entry("A01", "")), 0);
        assert_eq!(s.score("---", &entry("A01", "NEEDLES")), 0);
    }
}
