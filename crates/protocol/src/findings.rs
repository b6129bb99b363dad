use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Defect class raised by the validator.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum FindingKind {
    /// Target code is absent from the hierarchical index.
    MissingTarget,
    /// Stored target description drifted from the source of truth.
    DescriptionMismatch,
    /// Recorded category disagrees with the authoritative prefix, or a cross-check rule fired.
    CategoryMismatch,
    /// Source and target descriptions share no related tokens. Review signal only.
    SemanticMismatch,
}

#[derive(
    Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
}

impl Severity {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Critical => "critical",
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, JsonSchema)]
pub struct ValidationFinding {
    pub source_code: String,
    pub target_code: String,
    pub kind: FindingKind,
    pub severity: Severity,
    pub detail: String,
}

impl ValidationFinding {
    pub fn new(
        source_code: impl Into<String>,
        target_code: impl Into<String>,
        kind: FindingKind,
        severity: Severity,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            source_code: source_code.into(),
            target_code: target_code.into(),
            kind,
            severity,
            detail: detail.into(),
        }
    }
}
