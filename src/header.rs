//! Header-row location for card-statement CSV files.
//!
//! Statements start with a few metadata lines (card holder, billing
//! period, ...) before the real column header. Only the first
//! [`HEADER_SCAN_LINES`] lines are searched; everything before the header
//! is kept verbatim as pre-header content.

use crate::constants::{HEADER_SCAN_LINES, REQUIRED_COLUMNS};
use crate::error::{Result, SaisonError};
use std::path::Path;
use tracing::debug;

/// Location of the header row inside decoded text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderLocation {
    /// Zero-based line index of the header
    pub line_index: usize,
    /// Byte offset where the header line starts
    pub byte_offset: usize,
    /// Lines before the header, without their terminators
    pub pre_header: Vec<String>,
}

/// Split a single line into trimmed CSV fields.
pub fn split_header_fields(line: &str) -> Vec<String> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(line.as_bytes());

    match reader.records().next() {
        Some(Ok(record)) => record
            .iter()
            .map(|field| field.trim_start_matches('\u{feff}').trim().to_string())
            .collect(),
        _ => Vec::new(),
    }
}

/// Required columns absent from a candidate header line, in declaration order
fn missing_columns(fields: &[String]) -> Vec<&'static str> {
    REQUIRED_COLUMNS
        .iter()
        .copied()
        .filter(|required| !fields.iter().any(|field| field == required))
        .collect()
}

/// Find the header row within the scan window.
///
/// Fails with `HeaderNotFound` when no scanned line mentions any required
/// column, and with `MissingColumn` when the best candidate line carries
/// some but not all of them.
pub fn locate_header(text: &str, path: &Path) -> Result<HeaderLocation> {
    let mut offset = 0usize;
    let mut pre_header = Vec::new();
    let mut best_partial: Option<(usize, &'static str)> = None;
    let mut scanned = 0usize;

    for (index, raw_line) in text.split_inclusive('\n').take(HEADER_SCAN_LINES).enumerate() {
        scanned = index + 1;
        let line = raw_line.trim_end_matches(['\n', '\r']);
        let fields = split_header_fields(line);
        let missing = missing_columns(&fields);

        if missing.is_empty() {
            debug!(
                "Header found at line {} of {} ({} pre-header lines)",
                index + 1,
                path.display(),
                pre_header.len()
            );
            return Ok(HeaderLocation {
                line_index: index,
                byte_offset: offset,
                pre_header,
            });
        }

        let present = REQUIRED_COLUMNS.len() - missing.len();
        if present > 0 {
            let better = best_partial.is_none_or(|(best, _)| present > best);
            if better {
                best_partial = Some((present, missing[0]));
            }
        }

        pre_header.push(line.to_string());
        offset += raw_line.len();
    }

    match best_partial {
        Some((_, column)) => Err(SaisonError::MissingColumn {
            path: path.to_path_buf(),
            column: column.to_string(),
        }),
        None => Err(SaisonError::HeaderNotFound {
            path: path.to_path_buf(),
            scanned,
        }),
    }
}
