use nomap_protocol::Severity;
use nomap_taxonomy::{canonicalize, mentions};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A domain rule: sources mentioning any keyword must land under an allowed prefix and never
/// under a forbidden one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct CrossCheckRule {
    pub name: String,
    pub source_keywords: Vec<String>,
    #[serde(default)]
    pub allowed_prefixes: Vec<String>,
    #[serde(default)]
    pub forbidden_prefixes: Vec<String>,
    #[serde(default = "default_severity")]
    pub severity: Severity,
    /// Only check manual matches
    #[serde(default = "default_manual_only")]
    pub manual_only: bool,
}

fn default_severity() -> Severity {
    Severity::High
}

fn default_manual_only() -> bool {
    true
}

impl CrossCheckRule {
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("validator.cross_checks: rule name must not be empty".to_string());
        }
        if self.source_keywords.iter().all(|k| canonicalize(k).is_empty()) {
            return Err(format!(
                "validator.cross_checks.{}: source_keywords must not be empty",
                self.name
            ));
        }
        if self.allowed_prefixes.is_empty() && self.forbidden_prefixes.is_empty() {
            return Err(format!(
                "validator.cross_checks.{}: needs allowed_prefixes or forbidden_prefixes",
                self.name
            ));
        }
        if !matches!(self.severity, Severity::Critical | Severity::High) {
            return Err(format!(
                "validator.cross_checks.{}: severity must be critical or high",
                self.name
            ));
        }
        Ok(())
    }

    /// Does the canonical source description trigger this rule?
    #[must_use]
    pub fn applies_to(&self, canonical_source: &str) -> bool {
        self.source_keywords
            .iter()
            .any(|k| mentions(canonical_source, &canonicalize(k)))
    }

    /// Why `target_code` breaks this rule, if it does.
    #[must_use]
    pub fn violation(&self, target_code: &str) -> Option<String> {
        if let Some(prefix) = self
            .forbidden_prefixes
            .iter()
            .find(|p| target_code.starts_with(p.as_str()))
        {
            return Some(format!(
                "{}: {target_code} sits under forbidden prefix {prefix}",
                self.name
            ));
        }
        if !self.allowed_prefixes.is_empty()
            && !self
                .allowed_prefixes
                .iter()
                .any(|p| target_code.starts_with(p.as_str()))
        {
            return Some(format!(
                "{}: {target_code} is outside {}",
                self.name,
                self.allowed_prefixes.join("/")
            ));
        }
        None
    }
}

/// Built-in rules for well-known misfilings.
pub fn default_cross_checks() -> Vec<CrossCheckRule> {
    let strings = |items: &[&str]| items.iter().map(|s| (*s).to_string()).collect::<Vec<_>>();
    let rule = |name: &str,
                keywords: &[&str],
                allowed: &[&str],
                forbidden: &[&str],
                severity: Severity| CrossCheckRule {
        name: name.to_string(),
        source_keywords: strings(keywords),
        allowed_prefixes: strings(allowed),
        forbidden_prefixes: strings(forbidden),
        severity,
        manual_only: true,
    };
    vec![
        rule(
            "compression-garments",
            &["stocking", "hosiery", "compression garment", "compression sleeve"],
            &["M"],
            &["T01"],
            Severity::Critical,
        ),
        rule("gloves", &["glove"], &["T"], &[], Severity::High),
        rule("vascular-stents", &["stent"], &["P"], &[], Severity::High),
    ]
}
