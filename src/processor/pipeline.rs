//! Per-file processing: decode, parse, classify, estimate, sample, emit.
//!
//! Each step either succeeds or returns the error that fails the file.
//! Row-level problems (malformed amounts, too few roster entries) are kept
//! as row issues and never fail the file.

use crate::classifier::classify;
use crate::encoding::read_decoded;
use crate::error::Result;
use crate::estimator::AttendanceEstimator;
use crate::models::{Attendance, RowIssue};
use crate::reader::{TransactionTable, parse_table};
use crate::report::{ReportContext, ReportRenderer, write_report};
use crate::roster::Roster;
use crate::sampler::RosterSampler;
use crate::writer::{OutputPaths, resolve_output_paths, write_enhanced_csv};
use rand::Rng;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Result of steps 1-6 for one file
#[derive(Debug, Clone)]
pub struct ProcessedFile {
    pub encoding: &'static str,
    pub rows_total: usize,
    pub rows_reimbursable: usize,
    pub row_issues: Vec<RowIssue>,
    pub outputs: OutputPaths,
}

/// Everything needed to turn one statement into its outputs
pub struct FilePipeline {
    roster: Roster,
    estimator: AttendanceEstimator,
    sampler: RosterSampler,
    output_dir: PathBuf,
    renderer: Box<dyn ReportRenderer>,
}

impl std::fmt::Debug for FilePipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilePipeline")
            .field("roster", &self.roster.len())
            .field("estimator", &self.estimator)
            .field("output_dir", &self.output_dir)
            .finish_non_exhaustive()
    }
}

impl FilePipeline {
    pub fn new(
        roster: Roster,
        estimator: AttendanceEstimator,
        sampler: RosterSampler,
        output_dir: PathBuf,
        renderer: Box<dyn ReportRenderer>,
    ) -> Self {
        Self {
            roster,
            estimator,
            sampler,
            output_dir,
            renderer,
        }
    }

    pub fn set_renderer(&mut self, renderer: Box<dyn ReportRenderer>) {
        self.renderer = renderer;
    }

    /// Run every step for `path` and write both outputs
    pub fn process_file<R: Rng + ?Sized>(&self, path: &Path, rng: &mut R) -> Result<ProcessedFile> {
        let decoded = read_decoded(path)?;
        let mut table = parse_table(&decoded, path)?;
        let rows_reimbursable = classify(&mut table);

        let mut row_issues = table.issues.clone();
        row_issues.extend(self.assign_attendees(&mut table, rng));

        let outputs = resolve_output_paths(&self.output_dir, &output_stem(path));
        write_enhanced_csv(&table, &outputs.csv)?;

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let context = ReportContext::build(&table, &self.roster, &file_name);
        write_report(&context, self.renderer.as_ref(), &outputs.html)?;

        info!(
            "{}: {} rows, {} reimbursable, {} row issues",
            file_name,
            table.rows.len(),
            rows_reimbursable,
            row_issues.len()
        );

        Ok(ProcessedFile {
            encoding: decoded.codec.label(),
            rows_total: table.rows.len(),
            rows_reimbursable,
            row_issues,
            outputs,
        })
    }

    /// Estimate and sample attendees for every reimbursable row
    fn assign_attendees<R: Rng + ?Sized>(
        &self,
        table: &mut TransactionTable,
        rng: &mut R,
    ) -> Vec<RowIssue> {
        let mut issues = Vec::new();

        for row in table.rows.iter_mut().filter(|r| r.is_reimbursable) {
            let Some(amount) = row.amount else {
                continue;
            };
            let count = self.estimator.estimate(amount, rng);

            match self.sampler.sample(count, &self.roster, rng) {
                Ok(ids) => {
                    debug!("Line {}: {} attendees", row.line_number, count);
                    row.attendance = Some(Attendance { count, ids });
                }
                Err(err) => {
                    // Row keeps blank attendee columns
                    warn!("Line {}: {}", row.line_number, err);
                    issues.push(RowIssue {
                        line: row.line_number,
                        kind: err.kind().to_string(),
                        message: err.to_string(),
                    });
                }
            }
        }

        issues
    }
}

fn output_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string())
}
