use crate::context::PipelineContext;
use crate::output::{unix_now_ms, FileDigest};
use nomap_mapping::{ManualOverrides, MappingBuilder, MappingStore, SimilarityScorer};
use nomap_protocol::MAPPING_STORE_VERSION;
use nomap_reconcile::{normalize, NormalizationOutcome, ReferenceMatcher, ValidationReport, Validator};
use nomap_taxonomy::{HierarchyIndex, LoadReport, ReferenceList};
use serde::{Deserialize, Serialize};

/// Build a mapping store for every flat code in `reference`.
///
/// With a `base` store the new build is merged into it, so earlier records that no longer
/// appear in the reference survive.
pub fn build_store(
    ctx: &PipelineContext,
    reference: &ReferenceList,
    hierarchy: &HierarchyIndex,
    overrides: &ManualOverrides,
    base: Option<MappingStore>,
) -> MappingStore {
    let config = &ctx.config;
    let flat = reference.flat_codes(config.builder.include_obsolete);
    let scorer = SimilarityScorer::new(&config.scoring, ctx.tokenizer.clone());
    let builder = MappingBuilder::new(&config.builder, &scorer, hierarchy, overrides);
    let delta = builder.build(&flat);

    let mut store = match base {
        Some(mut base) => {
            let merged = base.merge_store(delta, Some(config.builder.max_candidates));
            log::info!("merged build into base store ({merged} records updated)");
            base
        }
        None => delta,
    };
    store.stamp(unix_now_ms());
    store
}

pub fn normalize_store(
    ctx: &PipelineContext,
    store: &MappingStore,
    reference: &ReferenceList,
) -> NormalizationOutcome {
    let matcher = ReferenceMatcher::new(reference, &ctx.tokenizer, &ctx.config.normalizer);
    let mut outcome = normalize(store, &matcher, &ctx.tokenizer);
    outcome.store.stamp(unix_now_ms());
    outcome
}

pub fn validate_store(
    ctx: &PipelineContext,
    store: &MappingStore,
    hierarchy: &HierarchyIndex,
) -> ValidationReport {
    Validator::new(&ctx.config.validator, hierarchy, &ctx.tokenizer).validate(store)
}

/// Inputs and outputs of a full run with their digests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunManifest {
    pub generated: u64,
    pub version: String,
    pub inputs: Vec<FileDigest>,
    pub outputs: Vec<FileDigest>,
    /// Row counters per delimited input; malformed rows are skipped, never fatal
    pub loads: Vec<LoadReport>,
    pub rows_skipped: usize,
    pub mapped: usize,
    pub unmapped: usize,
    pub unresolved: usize,
    pub critical_issues: usize,
}

impl RunManifest {
    pub fn new(
        ctx: &PipelineContext,
        outputs: Vec<FileDigest>,
        normalized: &NormalizationOutcome,
        validation: &ValidationReport,
    ) -> Self {
        let stats = &normalized.store.metadata.stats;
        Self {
            generated: normalized.store.metadata.generated,
            version: MAPPING_STORE_VERSION.to_string(),
            inputs: ctx.inputs().to_vec(),
            outputs,
            loads: ctx.load_reports().to_vec(),
            rows_skipped: ctx.load_reports().iter().map(|l| l.rows_skipped).sum(),
            mapped: stats.mapped,
            unmapped: stats.unmapped,
            unresolved: normalized.report.stats.unresolved,
            critical_issues: validation.metadata.critical_issues,
        }
    }
}
