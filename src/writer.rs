//! Enhanced CSV output.
//!
//! Every input row is written back out (pre-header lines verbatim, then the
//! header, then all data rows) with the attendee columns appended. Files
//! are UTF-8 with a byte-order mark so spreadsheet tools pick the right
//! encoding.

use crate::constants::{ATTENDEE_COUNT_COLUMN, ATTENDEE_SLOTS, FIRST_COLLISION_SUFFIX, attendee_id_column};
use crate::error::{Result, SaisonError};
use crate::reader::TransactionTable;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Paired output artifacts for one input file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputPaths {
    pub csv: PathBuf,
    pub html: PathBuf,
}

impl OutputPaths {
    fn for_stem(output_dir: &Path, stem: &str) -> Self {
        Self {
            csv: output_dir.join(format!("{}.csv", stem)),
            html: output_dir.join(format!("{}.html", stem)),
        }
    }

    fn any_exists(&self) -> bool {
        self.csv.exists() || self.html.exists()
    }
}

/// Choose output paths for `stem`, appending `_2`, `_3`, ... until neither
/// the CSV nor the HTML name is taken. Both artifacts always share a stem.
pub fn resolve_output_paths(output_dir: &Path, stem: &str) -> OutputPaths {
    let plain = OutputPaths::for_stem(output_dir, stem);
    if !plain.any_exists() {
        return plain;
    }

    let mut suffix = FIRST_COLLISION_SUFFIX;
    loop {
        let candidate = OutputPaths::for_stem(output_dir, &format!("{}_{}", stem, suffix));
        if !candidate.any_exists() {
            debug!("Output stem '{}' taken, using suffix _{}", stem, suffix);
            return candidate;
        }
        suffix += 1;
    }
}

/// Columns before the attendee groups: the header or the widest row
fn record_width(table: &TransactionTable) -> usize {
    table
        .rows
        .iter()
        .map(|row| row.fields.len())
        .fold(table.headers.len(), usize::max)
}

/// Header row of the enhanced CSV; unnamed extra columns stay blank
pub fn output_headers(table: &TransactionTable) -> Vec<String> {
    let mut headers = table.headers.clone();
    headers.resize(record_width(table), String::new());
    headers.push(ATTENDEE_COUNT_COLUMN.to_string());
    headers.extend((1..=ATTENDEE_SLOTS).map(attendee_id_column));
    headers
}

/// Write the enhanced CSV for `table` to `path`.
///
/// Every row is padded with blank cells to the widest record so the
/// attendee columns stay aligned under their headers.
pub fn write_enhanced_csv(table: &TransactionTable, path: &Path) -> Result<usize> {
    let file = File::create(path).map_err(|e| SaisonError::io(path, e))?;
    let mut out = BufWriter::new(file);

    out.write_all(UTF8_BOM).map_err(|e| SaisonError::io(path, e))?;
    for line in &table.pre_header {
        out.write_all(line.as_bytes())
            .and_then(|_| out.write_all(b"\n"))
            .map_err(|e| SaisonError::io(path, e))?;
    }

    let mut writer = csv::WriterBuilder::new()
        .flexible(true)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(out);
    writer
        .write_record(output_headers(table))
        .map_err(|e| SaisonError::csv(path, e))?;

    let width = record_width(table);
    let blanks = std::iter::repeat_n("", ATTENDEE_SLOTS + 1);

    for row in &table.rows {
        let mut record: Vec<&str> = row.fields.iter().map(String::as_str).collect();
        if record.len() < width {
            record.resize(width, "");
        }

        match (&row.attendance, row.is_reimbursable) {
            (Some(attendance), true) => {
                let count = attendance.count.to_string();
                let mut full: Vec<&str> = record;
                full.push(&count);
                full.extend(attendance.ids.cells());
                writer
                    .write_record(&full)
                    .map_err(|e| SaisonError::csv(path, e))?;
            }
            _ => {
                record.extend(blanks.clone());
                writer
                    .write_record(&record)
                    .map_err(|e| SaisonError::csv(path, e))?;
            }
        }
    }

    writer
        .flush()
        .map_err(|e| SaisonError::io(path, e))?;

    debug!("Wrote {} rows to {}", table.rows.len(), path.display());
    Ok(table.rows.len())
}
