//! # Nomap Reconcile
//!
//! Post-build passes over a mapping store.
//!
//! ```text
//! MappingStore
//!     │
//!     ├──> Reference Normalizer (authoritative flat list)
//!     │      ├─ tier 1: exact description
//!     │      ├─ tier 2: case-insensitive
//!     │      ├─ tier 3: canonical text (status preference)
//!     │      ├─ tier 4: token Jaccard ≥ threshold
//!     │      └─ merge records that land on the same code
//!     │
//!     └──> Validator (hierarchical index)
//!            ├─ missing target / description drift       (critical)
//!            ├─ manual category drift                     (medium)
//!            ├─ manual with no related tokens             (low, review only)
//!            └─ domain cross-check rules                  (per rule)
//! ```
//!
//! Neither pass raises errors for bad data: ambiguities and defects become report entries.

mod normalizer;
mod report;
mod rules;
mod validator;

pub use normalizer::{
    normalize, ConflictKind, ConflictMember, DuplicateReference, Lookup, NormalizationOutcome,
    NormalizationReport, NormalizationStats, NormalizerConfig, ReferenceMatcher, Resolution,
    ResolutionConflict, ResolutionTier, Suggestion, UnresolvedEntry,
};
pub use report::render_markdown;
pub use rules::{default_cross_checks, CrossCheckRule};
pub use validator::{ReportMetadata, ValidationReport, Validator, ValidatorConfig};
