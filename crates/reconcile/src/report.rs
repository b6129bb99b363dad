use crate::normalizer::NormalizationReport;
use crate::validator::ValidationReport;
use nomap_protocol::Severity;

const MAX_DETAIL_CHARS: usize = 120;

/// Human-readable summary of a validation run, optionally with the normalization pass that
/// preceded it.
pub fn render_markdown(
    validation: &ValidationReport,
    normalization: Option<&NormalizationReport>,
) -> String {
    let meta = &validation.metadata;
    let mut md = String::new();
    md.push_str("# Mapping validation report\n\n");
    md.push_str(&format!("- Mappings: `{}`\n", meta.total_mappings));
    md.push_str(&format!("- Critical: `{}`\n", meta.critical_issues));
    md.push_str(&format!("- High: `{}`\n", meta.high_issues));
    md.push_str(&format!("- Medium: `{}`\n", meta.medium_warnings));
    md.push_str(&format!("- Low: `{}`\n\n", meta.low_notices));

    if let Some(normalization) = normalization {
        let stats = &normalization.stats;
        md.push_str("## Normalization\n\n");
        md.push_str("| records_in | records_out | exact | case_insensitive | canonical | token_overlap | unresolved | rekeyed | merged |\n");
        md.push_str("|---:|---:|---:|---:|---:|---:|---:|---:|---:|\n");
        md.push_str(&format!(
            "| `{}` | `{}` | `{}` | `{}` | `{}` | `{}` | `{}` | `{}` | `{}` |\n\n",
            stats.records_in,
            stats.records_out,
            stats.exact,
            stats.case_insensitive,
            stats.canonical,
            stats.token_overlap,
            stats.unresolved,
            stats.rekeyed,
            stats.merged
        ));
        if !normalization.conflicts.is_empty() {
            md.push_str("| code | conflict | detail |\n");
            md.push_str("|---|---|---|\n");
            for conflict in &normalization.conflicts {
                md.push_str(&format!(
                    "| `{}` | `{}` | {} |\n",
                    conflict.code,
                    format!("{:?}", conflict.kind).to_lowercase(),
                    table_cell(&conflict.detail)
                ));
            }
            md.push('\n');
        }
    }

    md.push_str("## Findings\n\n");
    if validation.results.is_empty() {
        md.push_str("No findings.\n");
        return md;
    }
    for severity in [
        Severity::Critical,
        Severity::High,
        Severity::Medium,
        Severity::Low,
    ] {
        let findings: Vec<_> = validation
            .results
            .iter()
            .filter(|f| f.severity == severity)
            .collect();
        if findings.is_empty() {
            continue;
        }
        md.push_str(&format!("### {} ({})\n\n", severity.as_str(), findings.len()));
        md.push_str("| source | target | kind | detail |\n");
        md.push_str("|---|---|---|---|\n");
        for finding in findings {
            md.push_str(&format!(
                "| `{}` | `{}` | `{:?}` | {} |\n",
                finding.source_code,
                finding.target_code,
                finding.kind,
                table_cell(&finding.detail)
            ));
        }
        md.push('\n');
    }
    md
}

/// Single-line table cell: whitespace runs collapse, pipes are escaped, long text is cut with an
/// ellipsis.
fn table_cell(text: &str) -> String {
    let mut cell = String::new();
    for (count, word) in text.split_whitespace().enumerate() {
        if count > 0 {
            cell.push(' ');
        }
        cell.push_str(word);
    }
    if let Some((cut, _)) = cell.char_indices().nth(MAX_DETAIL_CHARS) {
        let keep = cell[..cut].char_indices().last().map_or(0, |(idx, _)| idx);
        cell.truncate(keep);
        cell.push('…');
    }
    cell.replace('|', "\\|")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validator::ReportMetadata;
    use nomap_protocol::{FindingKind, ValidationFinding};

    #[test]
    fn table_cells_stay_on_one_line() {
        assert_eq!(table_cell("a\n b\t| c"), "a b \\| c");
        let long = "x".repeat(MAX_DETAIL_CHARS + 10);
        let cell = table_cell(&long);
        assert_eq!(cell.chars().count(), MAX_DETAIL_CHARS);
        assert!(cell.ends_with('…'));
        let exact = "y".repeat(MAX_DETAIL_CHARS);
        assert_eq!(table_cell(&exact), exact);
    }

    #[test]
    fn empty_report_says_so() {
        let md = render_markdown(&ValidationReport::default(), None);
        assert!(md.starts_with("# Mapping validation report\n"));
        assert!(md.contains("No findings."));
        assert!(!md.contains("## Normalization"));
    }

    #[test]
    fn findings_are_grouped_by_severity_and_escaped() {
        let report = ValidationReport {
            metadata: ReportMetadata {
                total_mappings: 2,
                critical_issues: 1,
                low_notices: 1,
                ..ReportMetadata::default()
            },
            results: vec![
                ValidationFinding::new(
                    "42811",
                    "M999999",
                    FindingKind::MissingTarget,
                    Severity::Critical,
                    "M999999 is not in the hierarchy",
                ),
                ValidationFinding::new(
                    "35213",
                    "C0104",
                    FindingKind::SemanticMismatch,
                    Severity::Low,
                    "a | b\nshare nothing",
                ),
            ],
        };
        let md = render_markdown(&report, Some(&NormalizationReport::default()));
        assert!(md.contains("- Critical: `1`"));
        assert!(md.contains("## Normalization"));
        assert!(md.contains("### critical (1)"));
        assert!(md.contains("### low (1)"));
        assert!(!md.contains("### high"));
        assert!(md.contains("a \\| b share nothing"));
        assert!(md.find("### critical").unwrap() < md.find("### low").unwrap());
    }
}
