//! Batch processing engine.
//!
//! Runs the per-file pipeline over every selected month, one file at a
//! time, and drives the archive state machine: skip archived months, move
//! each good file into the archive right away, keep the retry marker in
//! step with failures, and reconcile at the end of each month.

pub mod discovery;
pub mod pipeline;

#[cfg(test)]
pub mod tests;

use self::discovery::{FileDiscovery, MonthFiles, file_name};
use self::pipeline::FilePipeline;

use crate::archive::{ArchiveManager, FileOps, MonthState};
use crate::config::Config;
use crate::error::{Result, SaisonError};
use crate::models::{FileOutcome, FileStatus, Month, MonthOutcome, MonthStatus, ProcessingStats};
use crate::report::{HtmlReportRenderer, ReportRenderer};
use crate::roster::Roster;

use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::path::Path;
use std::time::Instant;
use tracing::{error, info, warn};

/// Main processor for a batch of monthly statements
#[derive(Debug)]
pub struct BatchProcessor<R: Rng = StdRng> {
    config: Config,
    pipeline: FilePipeline,
    archive: ArchiveManager,
    rng: R,
    show_progress: bool,
}

impl BatchProcessor<StdRng> {
    /// Create a processor, loading the roster from the reference directory.
    ///
    /// Uses `config.seed` when set, otherwise an entropy-seeded RNG.
    pub fn new(config: Config) -> Result<Self> {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let roster = Roster::load(&config.roster_path())?;
        Ok(Self::with_roster(config, roster, rng))
    }
}

impl<R: Rng> BatchProcessor<R> {
    /// Create a processor from an already-loaded roster and random source
    pub fn with_roster(config: Config, roster: Roster, rng: R) -> Self {
        let pipeline = FilePipeline::new(
            roster,
            config.estimator(),
            config.sampler(),
            config.output_dir.clone(),
            Box::new(HtmlReportRenderer),
        );
        Self {
            archive: ArchiveManager::new(config.archive_dir.clone()),
            pipeline,
            config,
            rng,
            show_progress: false,
        }
    }

    /// Replace the random source
    pub fn with_rng<R2: Rng>(self, rng: R2) -> BatchProcessor<R2> {
        BatchProcessor {
            config: self.config,
            pipeline: self.pipeline,
            archive: self.archive,
            rng,
            show_progress: self.show_progress,
        }
    }

    /// Replace the filesystem steps used to move sources into the archive
    pub fn with_archive_ops(mut self, ops: Box<dyn FileOps>) -> Self {
        self.archive = self.archive.with_file_ops(ops);
        self
    }

    /// Replace the HTML renderer
    pub fn with_renderer(mut self, renderer: Box<dyn ReportRenderer>) -> Self {
        self.pipeline.set_renderer(renderer);
        self
    }

    /// Show per-file lines and a progress bar on the console
    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Main processing entry point.
    ///
    /// Only start-up problems (missing Input, unwritable Output) are
    /// returned as errors; per-file failures end up in the statistics.
    pub fn process(&mut self) -> Result<ProcessingStats> {
        let start_time = Instant::now();
        let mut stats = ProcessingStats::default();

        std::fs::create_dir_all(&self.config.output_dir)
            .map_err(|e| SaisonError::io(&self.config.output_dir, e))?;

        let discovery = FileDiscovery::new(self.config.input_dir.clone())
            .discover(&self.config.months)?;

        if self.show_progress {
            println!(
                "{}",
                "Starting Saison statement processing".bright_green().bold()
            );
            println!(
                "  {} {}",
                "Input:".bright_cyan(),
                self.config.input_dir.display()
            );
            println!(
                "  {} {} files in {} months",
                "Found".bright_green(),
                discovery.file_count().to_string().bright_white().bold(),
                discovery.months.len().to_string().bright_white().bold()
            );
        }

        for path in &discovery.unprefixed {
            stats.record(FileOutcome::new(file_name(path), None).skipped("no YYYYMM prefix"));
        }

        for month_files in &discovery.months {
            let outcome = self.process_month(month_files, &mut stats);
            stats.months.push(outcome);
        }

        stats.processing_time_ms = start_time.elapsed().as_millis();
        Ok(stats)
    }

    fn process_month(&mut self, month_files: &MonthFiles, stats: &mut ProcessingStats) -> MonthOutcome {
        let month = month_files.month;

        if self.archive.should_skip(month, self.config.force) {
            info!("Month {} already archived, skipping", month);
            if self.show_progress {
                println!(
                    "\n{} {} (already archived, use --force to reprocess)",
                    "Skipping".bright_yellow(),
                    month.to_string().bright_white()
                );
            }
            return MonthOutcome {
                month,
                status: MonthStatus::Skipped,
                files_attempted: 0,
                files_failed: 0,
            };
        }

        if self.archive.month_state(month) == MonthState::PartiallyFailed {
            match self.archive.read_marker(month) {
                Ok(Some(marker)) => info!(
                    "Retrying month {} ({} files failed previously)",
                    month,
                    marker.failed_files.len()
                ),
                Ok(None) => {}
                Err(e) => warn!("Ignoring unreadable retry marker: {}", e),
            }
        }

        if self.show_progress {
            println!("\n{} {}", "Processing month".bright_yellow(), month);
        }

        let mut batch = match self.archive.begin_month(month, month_files.file_names()) {
            Ok(batch) => batch,
            Err(e) => return self.abandon_month(month_files, &e, stats),
        };

        let progress = self.progress_bar(month_files.files.len() as u64);
        let mut failed = 0;

        for path in &month_files.files {
            progress.set_message(file_name(path));
            let mut outcome =
                process_one(&self.pipeline, &self.archive, &mut self.rng, path, month);

            let recorded = match outcome.status {
                FileStatus::Succeeded => batch.record_success(&outcome.file_name),
                _ => {
                    failed += 1;
                    let message = outcome.error.clone().unwrap_or_default();
                    batch.record_failure(&outcome.file_name, &message)
                }
            };
            if let Err(e) = recorded {
                warn!("Could not update retry marker: {}", e);
                outcome.warnings.push(e.to_string());
            }

            if self.show_progress {
                progress.suspend(|| print_file_line(&outcome));
            }
            stats.record(outcome);
            progress.inc(1);
        }
        progress.finish_and_clear();

        let status = batch.finish().unwrap_or_else(|e| {
            error!("Could not reconcile month {}: {}", month, e);
            MonthStatus::PartiallyFailed {
                retry_marker: self.archive.marker_path(month),
            }
        });
        MonthOutcome {
            month,
            status,
            files_attempted: month_files.files.len(),
            files_failed: failed,
        }
    }

    /// Marker could not be written: fail every file of the month untouched
    fn abandon_month(
        &self,
        month_files: &MonthFiles,
        err: &SaisonError,
        stats: &mut ProcessingStats,
    ) -> MonthOutcome {
        error!("Cannot start month {}: {}", month_files.month, err);
        for name in month_files.file_names() {
            stats.record(
                FileOutcome::new(name, Some(month_files.month))
                    .failed(format!("{}: {}", err.kind(), err)),
            );
        }
        MonthOutcome {
            month: month_files.month,
            status: MonthStatus::PartiallyFailed {
                retry_marker: self.archive.marker_path(month_files.month),
            },
            files_attempted: 0,
            files_failed: month_files.files.len(),
        }
    }

    fn progress_bar(&self, len: u64) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }
        let pb = ProgressBar::new(len);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        {
            pb.set_style(style.progress_chars("#>-"));
        }
        pb
    }
}

/// Steps 1-6 followed by the archive move
fn process_one<R: Rng>(
    pipeline: &FilePipeline,
    archive: &ArchiveManager,
    rng: &mut R,
    path: &Path,
    month: Month,
) -> FileOutcome {
    let outcome = FileOutcome::new(file_name(path), Some(month));

    let processed = match pipeline.process_file(path, rng) {
        Ok(processed) => processed,
        Err(e) => {
            error!("{}: {}", outcome.file_name, e);
            return outcome.failed(format!("{}: {}", e.kind(), e));
        }
    };

    let mut outcome = FileOutcome {
        encoding: Some(processed.encoding.to_string()),
        rows_total: processed.rows_total,
        rows_reimbursable: processed.rows_reimbursable,
        row_issues: processed.row_issues,
        csv_output: Some(processed.outputs.csv),
        html_output: Some(processed.outputs.html),
        ..outcome
    };

    match archive.archive_file(path, month) {
        Ok(archived) => {
            outcome.archived_to = Some(archived.destination);
            outcome.warnings.extend(archived.warning);
            outcome.status = FileStatus::Succeeded;
            outcome
        }
        Err(e) => {
            error!("{}: {}", outcome.file_name, e);
            outcome.failed(format!("{}: {}", e.kind(), e))
        }
    }
}

fn print_file_line(outcome: &FileOutcome) {
    match outcome.status {
        FileStatus::Succeeded => {
            println!(
                "  {} {} ({} rows, {} reimbursable, {})",
                "✓".bright_green(),
                outcome.file_name,
                outcome.rows_total,
                outcome.rows_reimbursable.to_string().bright_white(),
                outcome.encoding.as_deref().unwrap_or("?")
            );
            for issue in &outcome.row_issues {
                println!("    {} line {}: {}", "!".yellow(), issue.line, issue.message);
            }
            for warning in &outcome.warnings {
                println!("    {} {}", "!".yellow(), warning);
            }
        }
        FileStatus::Failed => println!(
            "  {} {}: {}",
            "✗".bright_red(),
            outcome.file_name,
            outcome.error.as_deref().unwrap_or("unknown error").bright_red()
        ),
        FileStatus::Skipped => {}
    }
}

/// Print the batch summary
pub fn print_summary(stats: &ProcessingStats) {
    println!("\n{}", "Processing Summary".bright_green().bold());
    println!(
        "  {} {}ms",
        "Time elapsed:".bright_cyan(),
        stats.processing_time_ms.to_string().bright_white()
    );
    println!(
        "  {} {}",
        "Files processed:".bright_cyan(),
        stats.files_processed.to_string().bright_white()
    );
    if stats.files_failed > 0 {
        println!(
            "  {} {}",
            "Files failed:".bright_red(),
            stats.files_failed.to_string().bright_red().bold()
        );
    }
    if stats.files_skipped > 0 {
        println!(
            "  {} {}",
            "Files skipped:".bright_yellow(),
            stats.files_skipped.to_string().bright_white()
        );
    }

    for month in &stats.months {
        match &month.status {
            MonthStatus::Skipped => println!(
                "  {} {} (already archived)",
                "Month skipped:".bright_yellow(),
                month.month
            ),
            MonthStatus::Archived => println!(
                "  {} {} ({} files)",
                "Month archived:".bright_cyan(),
                month.month,
                month.files_attempted
            ),
            MonthStatus::PartiallyFailed { retry_marker } => println!(
                "  {} {} ({} of {} failed, see {})",
                "Month incomplete:".bright_red(),
                month.month,
                month.files_failed,
                month.files_attempted,
                retry_marker.display()
            ),
        }
    }

    for outcome in stats.outcomes.iter().filter(|o| o.status == FileStatus::Failed) {
        println!(
            "  {} {}: {}",
            "✗".bright_red(),
            outcome.file_name,
            outcome.error.as_deref().unwrap_or("unknown error")
        );
    }
}
