//! # Nomap Taxonomy
//!
//! Loading and shaping of the two source nomenclatures.
//!
//! ## Pipeline
//!
//! ```text
//! flat reference (pipe-delimited)          hierarchical table (tab-delimited)
//!     │                                        │
//!     ├──> strict row reader                   ├──> strict row reader
//!     │      └─> LoadReport (skips)            │      └─> LoadReport (skips)
//!     │                                        │
//!     └──> ReferenceList                       └──> Hierarchy Reconstructor
//!            └─ one row per code                      └─> HierarchyIndex (parents, orphans)
//! ```
//!
//! The canonicalizer lives here too because every downstream stage compares text through it.
//!
//! ## Example
//!
//! ```rust
//! use nomap_taxonomy::{canonicalize, parent_code_for, tokenize, DEFAULT_DEPTH_LENGTHS};
//! use std::collections::HashSet;
//!
//! assert_eq!(canonicalize("Compression/pressure sock"), "compression pressure sock");
//! assert!(tokenize("Single-use kit").is_empty());
//!
//! let known: HashSet<&str> = ["A", "A01"].into_iter().collect();
//! assert_eq!(
//!     parent_code_for("A0101", &known, &DEFAULT_DEPTH_LENGTHS).as_deref(),
//!     Some("A01")
//! );
//! ```

mod canonical;
mod error;
mod hierarchy;
mod reader;
mod reference;
mod sources;

pub use canonical::{
    canonicalize, mentions, substring_related, tokenize, tokens_related, Tokenizer,
    DEFAULT_STOP_WORDS,
};
pub use error::{Result, TaxonomyError};
pub use hierarchy::{
    depth_for_length, parent_code_for, reconstruct, HierarchyIndex, HierarchyStats,
    DEFAULT_DEPTH_LENGTHS,
};
pub use reader::{read_rows, LoadReport, SkippedRow, MAX_SKIP_SAMPLES};
pub use reference::ReferenceList;
pub use sources::{
    load_flat_reference, load_hierarchy, parse_flat_reference, parse_hierarchy_table,
    read_source, FLAT_CODE_LENGTH,
};
