//! Core data structures and types for Saison processing.
//!
//! Defines months, transaction rows, attendee records, amount brackets,
//! retry markers and the per-file / per-batch statistics used throughout
//! the library.

use crate::constants::{ATTENDEE_SLOTS, MAX_MONTH_YEAR, MIN_MONTH_YEAR};
use chrono::{DateTime, Local, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Calendar month in `YYYYMM` form
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Month {
    year: i32,
    month: u32,
}

impl Month {
    /// Build a month, rejecting years outside 1900..=2100 and months outside 1..=12
    pub fn new(year: i32, month: u32) -> Option<Self> {
        if !(MIN_MONTH_YEAR..=MAX_MONTH_YEAR).contains(&year) {
            return None;
        }
        NaiveDate::from_ymd_opt(year, month, 1)?;
        Some(Self { year, month })
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }
}

impl fmt::Display for Month {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}{:02}", self.year, self.month)
    }
}

impl FromStr for Month {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != 6 || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(format!("'{}' is not in YYYYMM format", s));
        }
        let year: i32 = s[..4].parse().map_err(|_| format!("invalid year in '{}'", s))?;
        let month: u32 = s[4..].parse().map_err(|_| format!("invalid month in '{}'", s))?;
        Month::new(year, month).ok_or_else(|| format!("'{}' is not a valid calendar month", s))
    }
}

impl TryFrom<String> for Month {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Month> for String {
    fn from(month: Month) -> Self {
        month.to_string()
    }
}

/// One reference-roster entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attendee {
    #[serde(alias = "ID", alias = "Id")]
    pub id: String,
    #[serde(alias = "Name", default)]
    pub name: String,
    #[serde(alias = "Title", default)]
    pub title: String,
    #[serde(alias = "Company", default)]
    pub company: String,
}

/// Fixed-width attendee-id slots, sorted numerically and right-padded with blanks
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AttendeeSlots([Option<String>; ATTENDEE_SLOTS]);

impl AttendeeSlots {
    /// Fill slots from already-ordered ids; ids beyond the slot count are dropped
    pub fn from_ids(ids: impl IntoIterator<Item = String>) -> Self {
        let mut slots: [Option<String>; ATTENDEE_SLOTS] = Default::default();
        for (slot, id) in slots.iter_mut().zip(ids) {
            *slot = Some(id);
        }
        Self(slots)
    }

    /// Number of populated slots
    pub fn filled(&self) -> usize {
        self.0.iter().filter(|slot| slot.is_some()).count()
    }

    /// Populated ids in slot order
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.0.iter().filter_map(|slot| slot.as_deref())
    }

    /// All slots rendered as CSV cells (blank for unused slots)
    pub fn cells(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|slot| slot.as_deref().unwrap_or(""))
    }
}

/// Attendee assignment for a reimbursable row
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Attendance {
    pub count: usize,
    pub ids: AttendeeSlots,
}

/// One parsed input data record
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionRow {
    /// 1-based line number in the decoded source text
    pub line_number: usize,
    /// Raw field values in header order
    pub fields: Vec<String>,
    /// Parsed amount, `None` when the row is malformed
    pub amount: Option<f64>,
    pub is_reimbursable: bool,
    /// Populated only for reimbursable rows whose sampling succeeded
    pub attendance: Option<Attendance>,
}

impl TransactionRow {
    pub fn new(line_number: usize, fields: Vec<String>, amount: Option<f64>) -> Self {
        Self {
            line_number,
            fields,
            amount,
            is_reimbursable: false,
            attendance: None,
        }
    }

    /// Field value by column index, empty when the row is short
    pub fn field(&self, index: usize) -> &str {
        self.fields.get(index).map(String::as_str).unwrap_or("")
    }

    pub fn is_malformed(&self) -> bool {
        self.amount.is_none()
    }
}

/// Amount range `[min_amount, max_amount)` mapped to an inclusive attendee range
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AmountBracket {
    pub min_amount: f64,
    pub max_amount: f64,
    pub min_attendees: usize,
    pub max_attendees: usize,
}

impl AmountBracket {
    pub fn contains(&self, amount: f64) -> bool {
        amount >= self.min_amount && amount < self.max_amount
    }
}

/// Persisted failure record for one month
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryMarker {
    pub month: Month,
    pub failed_files: Vec<String>,
    pub errors: Vec<String>,
    pub timestamp: DateTime<Local>,
}

/// Issue affecting a single row; the file itself still succeeds
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowIssue {
    pub line: usize,
    pub kind: String,
    pub message: String,
}

/// Final state of one input file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FileStatus {
    /// Processed, written and archived
    Succeeded,
    /// A component or archive error stopped this file
    Failed,
    /// Not eligible for processing (no month prefix)
    Skipped,
}

/// Outcome record for one input file
#[derive(Debug, Clone, Serialize)]
pub struct FileOutcome {
    pub file_name: String,
    pub month: Option<Month>,
    pub status: FileStatus,
    pub encoding: Option<String>,
    pub rows_total: usize,
    pub rows_reimbursable: usize,
    pub row_issues: Vec<RowIssue>,
    pub csv_output: Option<PathBuf>,
    pub html_output: Option<PathBuf>,
    pub archived_to: Option<PathBuf>,
    pub error: Option<String>,
    pub warnings: Vec<String>,
}

impl FileOutcome {
    pub fn new(file_name: impl Into<String>, month: Option<Month>) -> Self {
        Self {
            file_name: file_name.into(),
            month,
            status: FileStatus::Failed,
            encoding: None,
            rows_total: 0,
            rows_reimbursable: 0,
            row_issues: Vec::new(),
            csv_output: None,
            html_output: None,
            archived_to: None,
            error: None,
            warnings: Vec::new(),
        }
    }

    pub fn failed(mut self, error: impl Into<String>) -> Self {
        self.status = FileStatus::Failed;
        self.error = Some(error.into());
        self
    }

    pub fn skipped(mut self, reason: impl Into<String>) -> Self {
        self.status = FileStatus::Skipped;
        self.warnings.push(reason.into());
        self
    }
}

/// How a month was handled in this run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum MonthStatus {
    /// Already archived and no force override
    Skipped,
    /// Every file succeeded; any previous retry marker was removed
    Archived,
    /// At least one file failed; retry marker left in place
    PartiallyFailed { retry_marker: PathBuf },
}

#[derive(Debug, Clone, Serialize)]
pub struct MonthOutcome {
    pub month: Month,
    pub status: MonthStatus,
    pub files_attempted: usize,
    pub files_failed: usize,
}

/// Processing statistics for one batch run
#[derive(Debug, Default, Serialize)]
pub struct ProcessingStats {
    pub files_processed: usize,
    pub files_failed: usize,
    pub files_skipped: usize,
    pub months: Vec<MonthOutcome>,
    pub outcomes: Vec<FileOutcome>,
    pub processing_time_ms: u128,
}

impl ProcessingStats {
    pub fn has_failures(&self) -> bool {
        self.files_failed > 0
    }

    /// Process exit code: non-zero iff any file failed
    pub fn exit_code(&self) -> i32 {
        if self.has_failures() { 1 } else { 0 }
    }

    pub fn skipped_months(&self) -> impl Iterator<Item = &MonthOutcome> {
        self.months
            .iter()
            .filter(|m| m.status == MonthStatus::Skipped)
    }

    /// Record a finished file and update counters
    pub fn record(&mut self, outcome: FileOutcome) {
        match outcome.status {
            FileStatus::Succeeded => self.files_processed += 1,
            FileStatus::Failed => self.files_failed += 1,
            FileStatus::Skipped => self.files_skipped += 1,
        }
        self.outcomes.push(outcome);
    }
}
