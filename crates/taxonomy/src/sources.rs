use crate::hierarchy::{reconstruct, HierarchyIndex};
use crate::reader::{read_rows, LoadReport};
use crate::reference::ReferenceList;
use crate::{Result, TaxonomyError};
use nomap_protocol::{HierarchicalEntry, ReferenceEntry, ReferenceStatus};
use std::path::Path;

/// Length of a flat-taxonomy code.
pub const FLAT_CODE_LENGTH: usize = 5;

// name | definition | code | status
const FLAT_COLUMNS: usize = 4;
const FLAT_NAME: usize = 0;
const FLAT_CODE: usize = 2;
const FLAT_STATUS: usize = 3;

// category | category description | code | term | depth | terminal flag
const HIERARCHY_COLUMNS: usize = 6;
const HIER_CATEGORY: usize = 0;
const HIER_CODE: usize = 2;
const HIER_TERM: usize = 3;
const HIER_DEPTH: usize = 4;
const HIER_TERMINAL: usize = 5;

/// Read an authoritative input file. A missing file is a fatal configuration error.
pub fn read_source(path: &Path) -> Result<String> {
    if !path.is_file() {
        return Err(TaxonomyError::MissingInput(path.to_path_buf()));
    }
    let text = std::fs::read_to_string(path)?;
    if let Some(stripped) = text.strip_prefix('\u{feff}') {
        return Ok(stripped.to_string());
    }
    Ok(text)
}

fn source_label(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn is_flat_code(code: &str, code_len: usize) -> bool {
    code.len() == code_len && code.bytes().all(|b| b.is_ascii_digit())
}

fn is_hierarchical_code(code: &str) -> bool {
    let mut chars = code.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric())
}

/// Line number of the first non-blank line, where a header row may sit.
fn header_line(text: &str) -> Option<usize> {
    text.lines()
        .position(|l| !l.trim().is_empty())
        .map(|idx| idx + 1)
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "s" | "si" | "y" | "yes" | "1" | "true" | "t" => Some(true),
        "n" | "no" | "0" | "false" | "f" => Some(false),
        _ => None,
    }
}

/// Parse a pipe-delimited flat reference (`name|definition|code|status`).
///
/// A leading header row (non-numeric code column on the first row) is ignored.
pub fn parse_flat_reference(
    text: &str,
    source: &str,
    code_len: usize,
) -> (Vec<ReferenceEntry>, LoadReport) {
    let mut report = LoadReport::new(source);
    let rows = read_rows(text, '|', FLAT_COLUMNS, &mut report);
    let mut entries = Vec::with_capacity(rows.len());

    let header = header_line(text);

    for (line, fields) in rows {
        let code = fields[FLAT_CODE];
        if !is_flat_code(code, code_len) {
            if Some(line) == header && code.eq_ignore_ascii_case("code") {
                report.rows_read -= 1;
                continue;
            }
            report.record_skip(line, format!("invalid flat code {code:?}"));
            continue;
        }
        let name = fields[FLAT_NAME];
        if name.is_empty() {
            report.record_skip(line, "empty term name");
            continue;
        }
        entries.push(ReferenceEntry {
            code: code.to_string(),
            description: name.to_string(),
            status: ReferenceStatus::parse(fields[FLAT_STATUS]),
        });
        report.record_loaded();
    }
    (entries, report)
}

/// Parse a tab-delimited hierarchical table. `parent_code` is left empty; see
/// [`crate::reconstruct`].
pub fn parse_hierarchy_table(
    text: &str,
    source: &str,
    max_depth: usize,
) -> (Vec<HierarchicalEntry>, LoadReport) {
    let mut report = LoadReport::new(source);
    let rows = read_rows(text, '\t', HIERARCHY_COLUMNS, &mut report);
    let mut entries = Vec::with_capacity(rows.len());

    let header = header_line(text);

    for (line, fields) in rows {
        let depth_raw = fields[HIER_DEPTH];
        let depth = match depth_raw.parse::<u8>() {
            Ok(d) if d >= 1 && usize::from(d) <= max_depth => d,
            Ok(d) => {
                report.record_skip(line, format!("depth {d} outside 1..={max_depth}"));
                continue;
            }
            Err(_) => {
                if Some(line) == header {
                    report.rows_read -= 1;
                    continue;
                }
                report.record_skip(line, format!("unparseable depth {depth_raw:?}"));
                continue;
            }
        };

        let code = fields[HIER_CODE];
        if !is_hierarchical_code(code) {
            report.record_skip(line, format!("invalid hierarchical code {code:?}"));
            continue;
        }
        let term = fields[HIER_TERM];
        if term.is_empty() {
            report.record_skip(line, "empty term");
            continue;
        }
        let Some(is_terminal) = parse_flag(fields[HIER_TERMINAL]) else {
            report.record_skip(
                line,
                format!("unparseable terminal flag {:?}", fields[HIER_TERMINAL]),
            );
            continue;
        };

        let category_prefix = code.chars().next().unwrap_or_default();
        let category_col = fields[HIER_CATEGORY];
        if !category_col.is_empty() && !category_col.starts_with(category_prefix) {
            log::debug!("{code}: category column {category_col:?} disagrees with code prefix");
        }

        entries.push(HierarchicalEntry {
            code: code.to_string(),
            description: term.to_string(),
            category_prefix,
            depth,
            is_terminal,
            parent_code: None,
        });
        report.record_loaded();
    }
    (entries, report)
}

/// Load and deduplicate the flat reference list.
pub fn load_flat_reference(path: &Path, code_len: usize) -> Result<(ReferenceList, LoadReport)> {
    let text = read_source(path)?;
    let (entries, report) = parse_flat_reference(&text, &source_label(path), code_len);
    report.log_summary();
    if entries.is_empty() {
        return Err(TaxonomyError::EmptyInput {
            input: report.source.clone(),
            read: report.rows_read,
            skipped: report.rows_skipped,
        });
    }
    Ok((ReferenceList::from_entries(entries), report))
}

/// Load the hierarchical table and reconstruct parent links.
pub fn load_hierarchy(
    path: &Path,
    depth_lengths: &[usize],
) -> Result<(HierarchyIndex, LoadReport)> {
    if depth_lengths.is_empty() {
        return Err(TaxonomyError::invalid_config("depth length table is empty"));
    }
    let text = read_source(path)?;
    let (entries, report) = parse_hierarchy_table(&text, &source_label(path), depth_lengths.len());
    report.log_summary();
    if entries.is_empty() {
        return Err(TaxonomyError::EmptyInput {
            input: report.source.clone(),
            read: report.rows_read,
            skipped: report.rows_skipped,
        });
    }
    let index = reconstruct(entries, depth_lengths);
    let stats = index.stats();
    log::info!(
        "hierarchy: {} entries, {} roots, {} orphans, {} terminal",
        stats.entries,
        stats.roots,
        stats.orphans,
        stats.terminal
    );
    Ok((index, report))
}
