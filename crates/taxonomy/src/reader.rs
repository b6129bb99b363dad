use serde::{Deserialize, Serialize};

/// How many skipped rows are kept (and logged) per source.
pub const MAX_SKIP_SAMPLES: usize = 5;

/// A row that failed validation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SkippedRow {
    /// 1-indexed line number in the source file
    pub line: usize,
    pub reason: String,
}

/// Counters for one source file. Malformed rows are never fatal; they end up here.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoadReport {
    /// Label used in logs (usually the file name)
    pub source: String,

    /// Non-blank data rows seen (header excluded)
    pub rows_read: usize,

    /// Rows that produced a record
    pub rows_loaded: usize,

    /// Rows rejected by validation
    pub rows_skipped: usize,

    /// First few rejected rows
    pub samples: Vec<SkippedRow>,
}

impl LoadReport {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            ..Self::default()
        }
    }

    pub fn record_loaded(&mut self) {
        self.rows_loaded += 1;
    }

    pub fn record_skip(&mut self, line: usize, reason: impl Into<String>) {
        self.rows_skipped += 1;
        if self.samples.len() < MAX_SKIP_SAMPLES {
            let reason = reason.into();
            log::warn!("{}:{line}: skipping row: {reason}", self.source);
            self.samples.push(SkippedRow { line, reason });
        }
    }

    /// Emit the summary line for this source.
    pub fn log_summary(&self) {
        if self.rows_skipped > 0 {
            log::warn!(
                "{}: loaded {} rows, skipped {} of {} (showing first {})",
                self.source,
                self.rows_loaded,
                self.rows_skipped,
                self.rows_read,
                self.samples.len()
            );
        } else {
            log::info!("{}: loaded {} rows", self.source, self.rows_loaded);
        }
    }
}

/// Split `text` into rows of exactly `expected_columns` fields.
///
/// Blank lines are ignored. Rows with a different column count are recorded as skipped. Fields are
/// trimmed. Returned tuples carry the 1-indexed line number.
pub fn read_rows<'a>(
    text: &'a str,
    delimiter: char,
    expected_columns: usize,
    report: &mut LoadReport,
) -> Vec<(usize, Vec<&'a str>)> {
    let mut rows = Vec::new();
    for (idx, raw_line) in text.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw_line.trim_end_matches('\r');
        if line.trim().is_empty() {
            continue;
        }
        report.rows_read += 1;

        let fields: Vec<&str> = line.split(delimiter).map(str::trim).collect();
        if fields.len() != expected_columns {
            report.record_skip(
                line_no,
                format!(
                    "expected {expected_columns} columns, found {}",
                    fields.len()
                ),
            );
            continue;
        }
        rows.push((line_no, fields));
    }
    rows
}
