use serde::{Deserialize, Serialize};

/// Keyword → hierarchical category prefix. Rules are tried in order; the first keyword mentioned
/// by a description decides its category.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct CategoryRule {
    pub keyword: String,
    pub prefix: char,
}

impl CategoryRule {
    pub fn new(keyword: impl Into<String>, prefix: char) -> Self {
        Self {
            keyword: keyword.into(),
            prefix,
        }
    }
}

/// Weights, thresholds and vocabularies of the similarity scorer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct ScoringConfig {
    /// Awarded when one canonical description contains the other
    pub containment_bonus: u32,

    /// Awarded per flat token related to some hierarchical token
    pub token_overlap_weight: u32,

    /// Flat tokens shorter than this do not earn overlap points
    pub min_overlap_token_chars: usize,

    /// Awarded per domain keyword mentioned by both descriptions
    pub keyword_bonus: u32,

    /// Awarded when the flat description's keyword-derived category equals the entry prefix
    pub category_bonus: u32,

    /// Awarded per usage modifier mentioned by both descriptions
    pub modifier_bonus: u32,

    /// Candidates below this total are dropped
    pub min_score: u32,

    /// Drop candidates whose containment, overlap and keyword sub-scores are all zero
    pub require_textual_evidence: bool,

    /// Only score terminal hierarchical entries
    pub terminal_only: bool,

    /// Domain keywords (catheter, implant, stent, ...)
    pub keywords: Vec<String>,

    /// Usage modifiers (reusable, single-use, sterile, ...)
    pub modifiers: Vec<String>,

    /// Keyword → category prefix table
    pub category_rules: Vec<CategoryRule>,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            containment_bonus: 100,
            token_overlap_weight: 15,
            min_overlap_token_chars: 4,
            keyword_bonus: 30,
            category_bonus: 30,
            modifier_bonus: 10,
            min_score: 20,
            require_textual_evidence: true,
            terminal_only: false,
            keywords: default_keywords(),
            modifiers: default_modifiers(),
            category_rules: default_category_rules(),
        }
    }
}

impl ScoringConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.min_score == 0 {
            return Err("scoring.min_score must be > 0".to_string());
        }
        if self.min_overlap_token_chars == 0 {
            return Err("scoring.min_overlap_token_chars must be > 0".to_string());
        }
        if let Some(rule) = self
            .category_rules
            .iter()
            .find(|r| r.keyword.trim().is_empty() || !r.prefix.is_ascii_alphabetic())
        {
            return Err(format!(
                "scoring.category_rules: invalid rule {:?} -> {:?}",
                rule.keyword, rule.prefix
            ));
        }
        Ok(())
    }
}

fn default_keywords() -> Vec<String> {
    [
        "catheter", "implant", "stent", "syringe", "needle", "glove", "dressing", "bandage",
        "gauze", "suture", "staple", "prosthesis", "electrode", "cannula", "tube", "mask",
        "stocking", "compression", "valve", "pacemaker", "defibrillator", "lens", "wheelchair",
        "pump", "drain", "screw", "plate", "scalpel", "forceps", "scissors", "endoscope",
        "dialysis", "infusion", "ostomy", "urinary", "orthosis", "splint",
    ]
    .iter()
    .map(|s| (*s).to_string())
    .collect()
}

fn default_modifiers() -> Vec<String> {
    [
        "reusable", "single use", "disposable", "sterile", "non sterile", "latex", "powder free",
        "paediatric", "pediatric", "adult", "neonatal",
    ]
    .iter()
    .map(|s| (*s).to_string())
    .collect()
}

fn default_category_rules() -> Vec<CategoryRule> {
    [
        ("pacemaker", 'J'),
        ("defibrillator", 'J'),
        ("cochlear", 'J'),
        ("stent", 'P'),
        ("prosthesis", 'P'),
        ("implant", 'P'),
        ("glove", 'T'),
        ("gown", 'T'),
        ("drape", 'T'),
        ("compression", 'M'),
        ("stocking", 'M'),
        ("dressing", 'M'),
        ("bandage", 'M'),
        ("gauze", 'M'),
        ("suture", 'H'),
        ("staple", 'H'),
        ("dialysis", 'F'),
        ("haemodialysis", 'F'),
        ("laparoscopic", 'K'),
        ("trocar", 'K'),
        ("scalpel", 'L'),
        ("forceps", 'L'),
        ("scissors", 'L'),
        ("screwdriver", 'L'),
        ("syringe", 'A'),
        ("needle", 'A'),
        ("infusion", 'A'),
        ("ostomy", 'A'),
        ("catheter", 'C'),
        ("urinary", 'U'),
        ("tracheal", 'R'),
        ("oxygen", 'R'),
        ("nebuliser", 'R'),
        ("nebulizer", 'R'),
        ("dental", 'Q'),
        ("contact lens", 'Q'),
        ("wheelchair", 'Y'),
        ("walker", 'Y'),
        ("orthosis", 'Y'),
        ("reagent", 'W'),
        ("assay", 'W'),
        ("disinfectant", 'D'),
        ("steriliser", 'S'),
        ("sterilizer", 'S'),
    ]
    .iter()
    .map(|(k, p)| CategoryRule::new(*k, *p))
    .collect()
}

/// Candidate assembly limits.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct BuilderConfig {
    /// Fixed score given to manual overrides
    pub manual_score: u32,

    /// Automatic candidates are added while a record has fewer manual matches than this
    pub min_manual_matches: usize,

    /// Upper bound on candidates per record (manual matches are never dropped)
    pub max_candidates: usize,

    /// Map obsolete flat terms too
    pub include_obsolete: bool,
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self {
            manual_score: 100,
            min_manual_matches: 3,
            max_candidates: 5,
            include_obsolete: false,
        }
    }
}

impl BuilderConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.max_candidates == 0 {
            return Err("builder.max_candidates must be > 0".to_string());
        }
        if self.manual_score == 0 {
            return Err("builder.manual_score must be > 0".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_configs_valid() {
        assert!(ScoringConfig::default().validate().is_ok());
        assert!(BuilderConfig::default().validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut scoring = ScoringConfig::default();
        scoring.min_score = 0;
        assert!(scoring.validate().is_err());

        let mut scoring = ScoringConfig::default();
        scoring.category_rules.push(CategoryRule::new("widget", '7'));
        assert!(scoring.validate().is_err());

        let builder = BuilderConfig {
            max_candidates: 0,
            ..BuilderConfig::default()
        };
        assert!(builder.validate().is_err());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let cfg: ScoringConfig = toml::from_str("min_score = 25\nkeyword_bonus = 40\n").unwrap();
        assert_eq!(cfg.min_score, 25);
        assert_eq!(cfg.keyword_bonus, 40);
        assert_eq!(cfg.containment_bonus, 100);
        assert!(!cfg.category_rules.is_empty());
    }

    #[test]
    fn test_unknown_field_rejected() {
        let parsed: Result<ScoringConfig, _> = toml::from_str("min_scroe = 25\n");
        assert!(parsed.is_err());
    }
}
