use crate::config::PipelineConfig;
use crate::output::FileDigest;
use anyhow::{Context, Result};
use nomap_mapping::{ManualOverrides, MappingStore};
use nomap_protocol::MAPPING_STORE_VERSION;
use nomap_taxonomy::{
    load_flat_reference, load_hierarchy, read_source, HierarchyIndex, LoadReport, ReferenceList,
    Tokenizer,
};
use std::path::Path;

/// Per-run state shared by every stage. Built once at start-up and passed by reference.
pub struct PipelineContext {
    pub config: PipelineConfig,
    pub tokenizer: Tokenizer,
    inputs: Vec<FileDigest>,
    loads: Vec<LoadReport>,
}

impl PipelineContext {
    pub fn new(config: PipelineConfig) -> Self {
        let tokenizer = config.tokenizer();
        Self {
            config,
            tokenizer,
            inputs: Vec::new(),
            loads: Vec::new(),
        }
    }

    /// Digests of every input loaded so far, in load order.
    pub fn inputs(&self) -> &[FileDigest] {
        &self.inputs
    }

    /// Row counters of every delimited source loaded so far, in load order.
    pub fn load_reports(&self) -> &[LoadReport] {
        &self.loads
    }

    pub fn load_reference(&mut self, path: &Path) -> Result<ReferenceList> {
        let (reference, load) =
            load_flat_reference(path, self.config.hierarchy.flat_code_length)
                .with_context(|| format!("Failed to load flat reference {}", path.display()))?;
        log::info!(
            "flat reference: {} codes ({} duplicate rows dropped)",
            reference.len(),
            reference.dropped_duplicates()
        );
        self.record_input(path)?;
        self.loads.push(load);
        Ok(reference)
    }

    pub fn load_hierarchy(&mut self, path: &Path) -> Result<HierarchyIndex> {
        let (hierarchy, load) = load_hierarchy(path, &self.config.hierarchy.depth_lengths)
            .with_context(|| format!("Failed to load hierarchy {}", path.display()))?;
        self.record_input(path)?;
        self.loads.push(load);
        Ok(hierarchy)
    }

    pub fn load_overrides(&mut self, path: &Path) -> Result<ManualOverrides> {
        let raw = read_source(path)
            .with_context(|| format!("Failed to load overrides {}", path.display()))?;
        let overrides = ManualOverrides::from_json_str(&raw)
            .with_context(|| format!("Invalid override table {}", path.display()))?;
        log::info!("manual overrides for {} source codes", overrides.len());
        self.record_input(path)?;
        Ok(overrides)
    }

    pub fn load_store(&mut self, path: &Path) -> Result<MappingStore> {
        let raw = read_source(path)
            .with_context(|| format!("Failed to load mapping store {}", path.display()))?;
        let store = MappingStore::from_json_slice(raw.as_bytes())
            .with_context(|| format!("Invalid mapping store {}", path.display()))?;
        if store.metadata.version != MAPPING_STORE_VERSION {
            log::warn!(
                "{}: store version {} differs from {}",
                path.display(),
                store.metadata.version,
                MAPPING_STORE_VERSION
            );
        }
        log::info!("mapping store {}: {} records", path.display(), store.len());
        self.record_input(path)?;
        Ok(store)
    }

    fn record_input(&mut self, path: &Path) -> Result<()> {
        let bytes =
            std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
        self.inputs
            .push(FileDigest::of(path.display().to_string(), &bytes));
        Ok(())
    }
}
