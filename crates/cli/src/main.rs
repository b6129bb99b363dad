use anyhow::{Context as AnyhowContext, Result};
use clap::{Args, Parser, Subcommand};
use config::PipelineConfig;
use context::PipelineContext;
use nomap_mapping::{LookupIndices, MappingStore};
use nomap_reconcile::{render_markdown, NormalizationReport, ValidationReport};
use output::{commit, PendingOutput};
use pipeline::{build_store, normalize_store, validate_store, RunManifest};
use std::path::{Path, PathBuf};

mod config;
mod context;
mod output;
mod pipeline;

#[derive(Parser)]
#[command(name = "nomap")]
#[command(about = "Map a flat device nomenclature onto a hierarchical one", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Pipeline configuration (TOML); defaults apply when omitted
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet mode: log only warnings/errors
    #[arg(long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the mapping store from the taxonomies and manual overrides
    Build(BuildArgs),

    /// Re-key a mapping store onto the authoritative reference list
    Normalize(NormalizeArgs),

    /// Check a mapping store against the hierarchical taxonomy
    Validate(ValidateArgs),

    /// Build, normalize and validate in one pass
    Run(RunArgs),

    /// Print the JSON schema of the output documents
    Schema,
}

#[derive(Args)]
struct BuildArgs {
    /// Flat reference list (name|definition|code|status)
    #[arg(long)]
    flat: PathBuf,

    /// Hierarchical taxonomy table (tab-delimited)
    #[arg(long)]
    hierarchy: PathBuf,

    /// Manual override table (JSON)
    #[arg(long)]
    overrides: PathBuf,

    /// Existing mapping store to merge the build into
    #[arg(long)]
    base: Option<PathBuf>,

    /// Mapping store output
    #[arg(long)]
    out: PathBuf,

    /// Lookup indices output
    #[arg(long)]
    indices: Option<PathBuf>,
}

#[derive(Args)]
struct NormalizeArgs {
    /// Mapping store to normalize
    #[arg(long)]
    mappings: PathBuf,

    /// Authoritative flat reference list
    #[arg(long)]
    reference: PathBuf,

    /// Normalized mapping store output
    #[arg(long)]
    out: PathBuf,

    /// Normalization report output
    #[arg(long)]
    report: PathBuf,
}

#[derive(Args)]
struct ValidateArgs {
    /// Mapping store to validate
    #[arg(long)]
    mappings: PathBuf,

    /// Hierarchical taxonomy table
    #[arg(long)]
    hierarchy: PathBuf,

    /// Validation report output (JSON)
    #[arg(long)]
    out: PathBuf,

    /// Markdown rendering of the report
    #[arg(long)]
    markdown: Option<PathBuf>,
}

#[derive(Args)]
struct RunArgs {
    #[arg(long)]
    flat: PathBuf,

    #[arg(long)]
    hierarchy: PathBuf,

    #[arg(long)]
    overrides: PathBuf,

    /// Directory receiving every output of the run
    #[arg(long)]
    out_dir: PathBuf,
}

const MAPPINGS_FILE: &str = "mappings.json";
const INDICES_FILE: &str = "lookup_indices.json";
const NORMALIZATION_FILE: &str = "normalization_report.json";
const VALIDATION_FILE: &str = "validation_report.json";
const VALIDATION_MARKDOWN_FILE: &str = "validation_report.md";
const MANIFEST_FILE: &str = "manifest.json";

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if cli.quiet {
        builder.filter_level(log::LevelFilter::Warn);
    } else if cli.verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.target(env_logger::Target::Stderr).init();

    let config = cli.config.as_deref();
    match cli.command {
        Commands::Build(args) => run_build(&mut load_context(config)?, args)?,
        Commands::Normalize(args) => run_normalize(&mut load_context(config)?, args)?,
        Commands::Validate(args) => run_validate(&mut load_context(config)?, args)?,
        Commands::Run(args) => run_all(&mut load_context(config)?, args)?,
        Commands::Schema => print_schema()?,
    }

    Ok(())
}

fn load_context(config: Option<&Path>) -> Result<PipelineContext> {
    Ok(PipelineContext::new(PipelineConfig::load(config)?))
}

fn run_build(ctx: &mut PipelineContext, args: BuildArgs) -> Result<()> {
    let reference = ctx.load_reference(&args.flat)?;
    let hierarchy = ctx.load_hierarchy(&args.hierarchy)?;
    let overrides = ctx.load_overrides(&args.overrides)?;
    let base = match &args.base {
        Some(path) => Some(ctx.load_store(path)?),
        None => None,
    };

    let store = build_store(ctx, &reference, &hierarchy, &overrides, base);
    let mut outputs = vec![PendingOutput::json(&args.out, &store)?];
    if let Some(path) = &args.indices {
        outputs.push(PendingOutput::json(path, &LookupIndices::build(&store))?);
    }
    commit(&outputs)?;
    Ok(())
}

fn run_normalize(ctx: &mut PipelineContext, args: NormalizeArgs) -> Result<()> {
    let store = ctx.load_store(&args.mappings)?;
    let reference = ctx.load_reference(&args.reference)?;

    let outcome = normalize_store(ctx, &store, &reference);
    commit(&[
        PendingOutput::json(&args.out, &outcome.store)?,
        PendingOutput::json(&args.report, &outcome.report)?,
    ])?;
    Ok(())
}

fn run_validate(ctx: &mut PipelineContext, args: ValidateArgs) -> Result<()> {
    let store = ctx.load_store(&args.mappings)?;
    let hierarchy = ctx.load_hierarchy(&args.hierarchy)?;

    let report = validate_store(ctx, &store, &hierarchy);
    let mut outputs = vec![PendingOutput::json(&args.out, &report)?];
    if let Some(path) = &args.markdown {
        outputs.push(PendingOutput::text(path, render_markdown(&report, None)));
    }
    commit(&outputs)?;
    Ok(())
}

fn run_all(ctx: &mut PipelineContext, args: RunArgs) -> Result<()> {
    let reference = ctx.load_reference(&args.flat)?;
    let hierarchy = ctx.load_hierarchy(&args.hierarchy)?;
    let overrides = ctx.load_overrides(&args.overrides)?;

    let built = build_store(ctx, &reference, &hierarchy, &overrides, None);
    let normalized = normalize_store(ctx, &built, &reference);
    let validation = validate_store(ctx, &normalized.store, &hierarchy);

    let dir = &args.out_dir;
    let outputs = vec![
        PendingOutput::json(&dir.join(MAPPINGS_FILE), &normalized.store)?,
        PendingOutput::json(
            &dir.join(INDICES_FILE),
            &LookupIndices::build(&normalized.store),
        )?,
        PendingOutput::json(&dir.join(NORMALIZATION_FILE), &normalized.report)?,
        PendingOutput::json(&dir.join(VALIDATION_FILE), &validation)?,
        PendingOutput::text(
            &dir.join(VALIDATION_MARKDOWN_FILE),
            render_markdown(&validation, Some(&normalized.report)),
        ),
    ];
    let written = commit(&outputs)?;

    let manifest = RunManifest::new(ctx, written, &normalized, &validation);
    commit(&[PendingOutput::json(&dir.join(MANIFEST_FILE), &manifest)?])?;
    println!(
        "{}",
        serde_json::to_string_pretty(&manifest).context("Failed to render manifest")?
    );
    Ok(())
}

fn print_schema() -> Result<()> {
    let schema = serde_json::json!({
        "mapping_store": schemars::schema_for!(MappingStore),
        "lookup_indices": schemars::schema_for!(LookupIndices),
        "normalization_report": schemars::schema_for!(NormalizationReport),
        "validation_report": schemars::schema_for!(ValidationReport),
    });
    println!("{}", serde_json::to_string_pretty(&schema)?);
    Ok(())
}
