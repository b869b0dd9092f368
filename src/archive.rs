//! Month-partitioned archive and retry markers.
//!
//! A month moves through `unprocessed -> processing -> archived |
//! partially-failed`. `Archive/<YYYYMM>/` holding processed sources marks a
//! month as done; `Archive/.retry_<YYYYMM>.json` marks it as incomplete.
//!
//! While a month is being processed its marker lists every file not yet
//! archived, so a run killed half-way leaves a marker behind and the next
//! run picks the month up again.

use crate::constants::FIRST_COLLISION_SUFFIX;
use crate::error::{Result, SaisonError};
use crate::models::{Month, MonthStatus, RetryMarker};
use crate::months::retry_marker_name;
use chrono::Local;
use std::fs;
use std::fmt;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Archive state of a month before a run touches it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonthState {
    Unprocessed,
    Archived,
    PartiallyFailed,
}

/// Result of moving one source file into the archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchivedFile {
    pub destination: PathBuf,
    /// Set when the source could not be removed after a successful copy
    pub warning: Option<String>,
}

/// Filesystem steps behind an archive move
pub trait FileOps {
    fn rename(&self, from: &Path, to: &Path) -> io::Result<()>;
    fn copy(&self, from: &Path, to: &Path) -> io::Result<u64>;
    fn remove(&self, path: &Path) -> io::Result<()>;
}

/// `std::fs` implementation of [`FileOps`]
#[derive(Debug, Clone, Copy, Default)]
pub struct StdFileOps;

impl FileOps for StdFileOps {
    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        fs::rename(from, to)
    }

    fn copy(&self, from: &Path, to: &Path) -> io::Result<u64> {
        fs::copy(from, to)
    }

    fn remove(&self, path: &Path) -> io::Result<()> {
        fs::remove_file(path)
    }
}

pub struct ArchiveManager {
    archive_dir: PathBuf,
    ops: Box<dyn FileOps>,
}

impl fmt::Debug for ArchiveManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArchiveManager")
            .field("archive_dir", &self.archive_dir)
            .finish_non_exhaustive()
    }
}

impl ArchiveManager {
    pub fn new(archive_dir: impl Into<PathBuf>) -> Self {
        Self {
            archive_dir: archive_dir.into(),
            ops: Box::new(StdFileOps),
        }
    }

    /// Replace the filesystem steps used by [`ArchiveManager::archive_file`]
    pub fn with_file_ops(mut self, ops: Box<dyn FileOps>) -> Self {
        self.ops = ops;
        self
    }

    pub fn archive_dir(&self) -> &Path {
        &self.archive_dir
    }

    pub fn month_dir(&self, month: Month) -> PathBuf {
        self.archive_dir.join(month.to_string())
    }

    pub fn marker_path(&self, month: Month) -> PathBuf {
        self.archive_dir.join(retry_marker_name(month))
    }

    pub fn month_state(&self, month: Month) -> MonthState {
        if self.marker_path(month).exists() {
            MonthState::PartiallyFailed
        } else if self.month_dir(month).is_dir() {
            MonthState::Archived
        } else {
            MonthState::Unprocessed
        }
    }

    /// Whole month is skipped when archived cleanly and not forced
    pub fn should_skip(&self, month: Month, force: bool) -> bool {
        !force && self.month_state(month) == MonthState::Archived
    }

    pub fn read_marker(&self, month: Month) -> Result<Option<RetryMarker>> {
        let path = self.marker_path(month);
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&path).map_err(|e| SaisonError::io(&path, e))?;
        let marker = serde_json::from_str(&content).map_err(|e| SaisonError::RetryMarker {
            path: path.clone(),
            reason: e.to_string(),
        })?;
        Ok(Some(marker))
    }

    /// Write `marker` atomically (temp file in the archive root, then rename)
    pub fn write_marker(&self, marker: &RetryMarker) -> Result<PathBuf> {
        let path = self.marker_path(marker.month);
        let marker_err = |reason: String| SaisonError::RetryMarker {
            path: path.clone(),
            reason,
        };

        fs::create_dir_all(&self.archive_dir).map_err(|e| SaisonError::io(&self.archive_dir, e))?;
        let json = serde_json::to_string_pretty(marker).map_err(|e| marker_err(e.to_string()))?;

        let mut temp = tempfile::NamedTempFile::new_in(&self.archive_dir)
            .map_err(|e| SaisonError::io(&self.archive_dir, e))?;
        temp.write_all(json.as_bytes())
            .and_then(|_| temp.as_file().sync_all())
            .map_err(|e| SaisonError::io(temp.path(), e))?;
        temp.persist(&path)
            .map_err(|e| marker_err(e.error.to_string()))?;

        debug!(
            "Retry marker for {} lists {} files",
            marker.month,
            marker.failed_files.len()
        );
        Ok(path)
    }

    /// Remove the marker for `month`; returns whether one existed
    pub fn clear_marker(&self, month: Month) -> Result<bool> {
        let path = self.marker_path(month);
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(SaisonError::io(&path, e)),
        }
    }

    /// Move `source` into `Archive/<YYYYMM>/`.
    ///
    /// Uses a rename when possible and falls back to copy-then-delete. A
    /// failed delete after a good copy is reported as a warning only. An
    /// existing archived file of the same name is never overwritten.
    pub fn archive_file(&self, source: &Path, month: Month) -> Result<ArchivedFile> {
        let month_dir = self.month_dir(month);
        fs::create_dir_all(&month_dir)
            .map_err(|e| SaisonError::archive_move(source, format!("cannot create {}: {}", month_dir.display(), e)))?;

        let destination = free_destination(&month_dir, source)
            .ok_or_else(|| SaisonError::archive_move(source, "source has no file name"))?;

        let warning = move_file(self.ops.as_ref(), source, &destination)?;
        debug!("Archived {} to {}", source.display(), destination.display());
        Ok(ArchivedFile {
            destination,
            warning,
        })
    }

    /// Enter the `processing` state for `month`, marking all files pending
    pub fn begin_month(&self, month: Month, files: Vec<String>) -> Result<MonthBatch<'_>> {
        let batch = MonthBatch {
            manager: self,
            month,
            pending: files,
            failed: Vec::new(),
            errors: Vec::new(),
        };
        batch.persist()?;
        Ok(batch)
    }
}

/// Rename `source` to `destination`, falling back to copy-then-remove.
///
/// Returns a warning when the copy succeeded but the source stayed behind.
fn move_file(ops: &dyn FileOps, source: &Path, destination: &Path) -> Result<Option<String>> {
    let Err(rename_err) = ops.rename(source, destination) else {
        return Ok(None);
    };
    debug!(
        "Rename of {} failed ({}), copying instead",
        source.display(),
        rename_err
    );
    ops.copy(source, destination)
        .map_err(|e| SaisonError::archive_move(source, format!("copy failed: {}", e)))?;

    match ops.remove(source) {
        Ok(()) => Ok(None),
        Err(e) => {
            let warning = format!(
                "archived copy at {} but could not remove source: {}",
                destination.display(),
                e
            );
            warn!("{}: {}", source.display(), warning);
            Ok(Some(warning))
        }
    }
}

/// First name under `dir` not already taken: `name`, `name_2`, `name_3`, ...
fn free_destination(dir: &Path, source: &Path) -> Option<PathBuf> {
    let file_name = source.file_name()?;
    let plain = dir.join(file_name);
    if !plain.exists() {
        return Some(plain);
    }

    let stem = source.file_stem()?.to_string_lossy();
    let extension = source
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    (FIRST_COLLISION_SUFFIX..)
        .map(|n| dir.join(format!("{}_{}{}", stem, n, extension)))
        .find(|candidate| !candidate.exists())
}

/// One month in the `processing` state
#[derive(Debug)]
pub struct MonthBatch<'a> {
    manager: &'a ArchiveManager,
    month: Month,
    pending: Vec<String>,
    failed: Vec<String>,
    errors: Vec<String>,
}

impl MonthBatch<'_> {
    pub fn month(&self) -> Month {
        self.month
    }

    pub fn failed(&self) -> &[String] {
        &self.failed
    }

    /// File fully processed and archived
    pub fn record_success(&mut self, file_name: &str) -> Result<()> {
        self.pending.retain(|f| f != file_name);
        self.persist()
    }

    /// File failed; it stays listed in the marker with its error
    pub fn record_failure(&mut self, file_name: &str, error: &str) -> Result<()> {
        self.pending.retain(|f| f != file_name);
        if !self.failed.iter().any(|f| f == file_name) {
            self.failed.push(file_name.to_string());
        }
        self.errors.push(format!("{}: {}", file_name, error));
        self.persist()
    }

    /// End-of-month reconciliation.
    ///
    /// Files never reported are treated as failed. With no failures the
    /// marker is removed; otherwise it lists only the failing files.
    pub fn finish(mut self) -> Result<MonthStatus> {
        for file_name in std::mem::take(&mut self.pending) {
            self.errors
                .push(format!("{}: not processed", file_name));
            self.failed.push(file_name);
        }

        if self.failed.is_empty() {
            self.manager.clear_marker(self.month)?;
            info!("Month {} fully archived", self.month);
            return Ok(MonthStatus::Archived);
        }

        let retry_marker = self.persist_marker()?;
        warn!(
            "Month {} has {} failed files, see {}",
            self.month,
            self.failed.len(),
            retry_marker.display()
        );
        Ok(MonthStatus::PartiallyFailed { retry_marker })
    }

    fn persist(&self) -> Result<()> {
        if self.pending.is_empty() && self.failed.is_empty() {
            self.manager.clear_marker(self.month)?;
            return Ok(());
        }
        self.persist_marker().map(|_| ())
    }

    fn persist_marker(&self) -> Result<PathBuf> {
        let mut failed_files = self.pending.clone();
        failed_files.extend(self.failed.iter().cloned());
        failed_files.sort();
        failed_files.dedup();

        self.manager.write_marker(&RetryMarker {
            month: self.month,
            failed_files,
            errors: self.errors.clone(),
            timestamp: Local::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn month(s: &str) -> Month {
        s.parse().unwrap()
    }

    #[test]
    fn test_month_state_transitions() {
        let temp_dir = TempDir::new().unwrap();
        let manager = ArchiveManager::new(temp_dir.path().join("Archive"));
        let m = month("202510");

        assert_eq!(manager.month_state(m), MonthState::Unprocessed);
        assert!(!manager.should_skip(m, false));

        fs::create_dir_all(manager.month_dir(m)).unwrap();
        assert_eq!(manager.month_state(m), MonthState::Archived);
        assert!(manager.should_skip(m, false));
        assert!(!manager.should_skip(m, true));

        fs::write(manager.marker_path(m), "{}").unwrap();
        assert_eq!(manager.month_state(m), MonthState::PartiallyFailed);
        assert!(!manager.should_skip(m, false));
    }

    #[test]
    fn test_archive_file_moves_source() {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("202510_card.csv");
        fs::write(&source, "data").unwrap();
        let manager = ArchiveManager::new(temp_dir.path().join("Archive"));

        let archived = manager.archive_file(&source, month("202510")).unwrap();
        assert!(!source.exists());
        assert_eq!(
            archived.destination,
            temp_dir.path().join("Archive/202510/202510_card.csv")
        );
        assert_eq!(fs::read_to_string(&archived.destination).unwrap(), "data");
        assert!(archived.warning.is_none());
    }

    /// Behaves like a move across filesystems: rename always fails
    struct CrossDevice {
        remove_fails: bool,
    }

    impl FileOps for CrossDevice {
        fn rename(&self, _from: &Path, _to: &Path) -> io::Result<()> {
            Err(io::Error::other("cross-device link"))
        }

        fn copy(&self, from: &Path, to: &Path) -> io::Result<u64> {
            fs::copy(from, to)
        }

        fn remove(&self, path: &Path) -> io::Result<()> {
            if self.remove_fails {
                Err(io::Error::new(io::ErrorKind::PermissionDenied, "read-only"))
            } else {
                fs::remove_file(path)
            }
        }
    }

    #[test]
    fn test_failed_rename_falls_back_to_copy() {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("202510_card.csv");
        fs::write(&source, "data").unwrap();
        let manager = ArchiveManager::new(temp_dir.path().join("Archive"))
            .with_file_ops(Box::new(CrossDevice { remove_fails: false }));

        let archived = manager.archive_file(&source, month("202510")).unwrap();
        assert!(!source.exists());
        assert_eq!(fs::read_to_string(&archived.destination).unwrap(), "data");
        assert!(archived.warning.is_none());
    }

    #[test]
    fn test_failed_source_removal_is_a_warning() {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("202510_card.csv");
        fs::write(&source, "data").unwrap();
        let manager = ArchiveManager::new(temp_dir.path().join("Archive"))
            .with_file_ops(Box::new(CrossDevice { remove_fails: true }));

        let archived = manager.archive_file(&source, month("202510")).unwrap();
        assert!(source.exists());
        assert_eq!(fs::read_to_string(&archived.destination).unwrap(), "data");
        let warning = archived.warning.unwrap();
        assert!(warning.contains("could not remove source"));
    }

    #[test]
    fn test_archive_file_never_overwrites() {
        let temp_dir = TempDir::new().unwrap();
        let manager = ArchiveManager::new(temp_dir.path().join("Archive"));
        let m = month("202510");
        fs::create_dir_all(manager.month_dir(m)).unwrap();
        fs::write(manager.month_dir(m).join("202510_card.csv"), "old").unwrap();

        let source = temp_dir.path().join("202510_card.csv");
        fs::write(&source, "new").unwrap();
        let archived = manager.archive_file(&source, m).unwrap();

        assert_eq!(archived.destination, manager.month_dir(m).join("202510_card_2.csv"));
        assert_eq!(
            fs::read_to_string(manager.month_dir(m).join("202510_card.csv")).unwrap(),
            "old"
        );
    }

    #[test]
    fn test_missing_source_is_archive_error() {
        let temp_dir = TempDir::new().unwrap();
        let manager = ArchiveManager::new(temp_dir.path().join("Archive"));
        let err = manager
            .archive_file(&temp_dir.path().join("202510_gone.csv"), month("202510"))
            .unwrap_err();
        assert!(matches!(err, SaisonError::ArchiveMove { .. }));
    }

    #[test]
    fn test_marker_lists_pending_files_while_processing() {
        let temp_dir = TempDir::new().unwrap();
        let manager = ArchiveManager::new(temp_dir.path().join("Archive"));
        let m = month("202511");

        let mut batch = manager
            .begin_month(m, vec!["202511_a.csv".to_string(), "202511_b.csv".to_string()])
            .unwrap();
        let marker = manager.read_marker(m).unwrap().unwrap();
        assert_eq!(marker.failed_files, vec!["202511_a.csv", "202511_b.csv"]);

        batch.record_success("202511_a.csv").unwrap();
        let marker = manager.read_marker(m).unwrap().unwrap();
        assert_eq!(marker.failed_files, vec!["202511_b.csv"]);

        batch.record_success("202511_b.csv").unwrap();
        assert_eq!(batch.finish().unwrap(), MonthStatus::Archived);
        assert!(!manager.marker_path(m).exists());
    }

    #[test]
    fn test_failed_file_keeps_marker() {
        let temp_dir = TempDir::new().unwrap();
        let manager = ArchiveManager::new(temp_dir.path().join("Archive"));
        let m = month("202511");

        let mut batch = manager
            .begin_month(m, vec!["202511_a.csv".to_string(), "202511_b.csv".to_string()])
            .unwrap();
        batch.record_success("202511_a.csv").unwrap();
        batch
            .record_failure("202511_b.csv", "Required column '備考' missing")
            .unwrap();

        let status = batch.finish().unwrap();
        assert_eq!(
            status,
            MonthStatus::PartiallyFailed {
                retry_marker: manager.marker_path(m)
            }
        );

        let marker = manager.read_marker(m).unwrap().unwrap();
        assert_eq!(marker.month, m);
        assert_eq!(marker.failed_files, vec!["202511_b.csv"]);
        assert_eq!(marker.errors.len(), 1);
        assert!(marker.errors[0].contains("備考"));
    }

    #[test]
    fn test_unreported_files_count_as_failed() {
        let temp_dir = TempDir::new().unwrap();
        let manager = ArchiveManager::new(temp_dir.path().join("Archive"));
        let m = month("202511");

        let batch = manager.begin_month(m, vec!["202511_a.csv".to_string()]).unwrap();
        assert!(matches!(batch.finish().unwrap(), MonthStatus::PartiallyFailed { .. }));
        let marker = manager.read_marker(m).unwrap().unwrap();
        assert_eq!(marker.failed_files, vec!["202511_a.csv"]);
    }

    #[test]
    fn test_recovery_removes_stale_marker() {
        let temp_dir = TempDir::new().unwrap();
        let manager = ArchiveManager::new(temp_dir.path().join("Archive"));
        let m = month("202511");
        manager
            .write_marker(&RetryMarker {
                month: m,
                failed_files: vec!["202511_b.csv".to_string()],
                errors: vec!["old failure".to_string()],
                timestamp: Local::now(),
            })
            .unwrap();

        let mut batch = manager.begin_month(m, vec!["202511_b.csv".to_string()]).unwrap();
        batch.record_success("202511_b.csv").unwrap();
        assert_eq!(batch.finish().unwrap(), MonthStatus::Archived);
        assert!(manager.read_marker(m).unwrap().is_none());
    }

    #[test]
    fn test_corrupt_marker_is_reported() {
        let temp_dir = TempDir::new().unwrap();
        let manager = ArchiveManager::new(temp_dir.path());
        let m = month("202511");
        fs::write(manager.marker_path(m), "not json").unwrap();
        let err = manager.read_marker(m).unwrap_err();
        assert!(matches!(err, SaisonError::RetryMarker { .. }));
    }
}
