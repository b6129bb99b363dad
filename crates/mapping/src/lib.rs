//! # Nomap Mapping
//!
//! Builds the flat → hierarchical mapping store.
//!
//! ## Architecture
//!
//! ```text
//! FlatCode[]
//!     │
//!     ├──> Manual overrides (exact source-code key)
//!     │      └─ fixed confidence, provenance = manual
//!     │
//!     ├──> Similarity Scorer (when manual matches are scarce)
//!     │      ├─ containment bonus
//!     │      ├─ token overlap
//!     │      ├─ domain keywords
//!     │      ├─ keyword → category prefix agreement
//!     │      └─ usage modifiers
//!     │
//!     └──> MappingStore (one record per source code, merge on collision)
//!            └─> LookupIndices (forward + reverse)
//! ```
//!
//! Every weight and vocabulary comes from [`ScoringConfig`]; nothing is read from process-wide
//! state.

mod builder;
mod config;
mod error;
mod overrides;
mod scorer;
mod store;

pub use builder::MappingBuilder;
pub use config::{BuilderConfig, CategoryRule, ScoringConfig};
pub use error::{MappingError, Result};
pub use overrides::{ManualOverride, ManualOverrides};
pub use scorer::{PreparedText, ScoreBreakdown, SimilarityScorer};
pub use store::{
    merge_matches, rank_matches, LookupIndices, MappingStats, MappingStore, ReverseLink,
    StoreMetadata, UpsertOutcome,
};
