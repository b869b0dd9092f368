//! Month utilities: `YYYYMM` filename prefixes, latest-month selection and
//! archived-month detection.

use crate::constants::{INPUT_FILE_PATTERN, RETRY_MARKER_PREFIX, RETRY_MARKER_SUFFIX};
use crate::error::{Result, SaisonError};
use crate::models::Month;
use regex::Regex;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tracing::debug;
use walkdir::WalkDir;

static MONTH_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{6})(?:\D|$)").expect("month prefix pattern is valid"));

/// Month prefix of a file name such as `202510_card.csv`
pub fn month_from_filename(file_name: &str) -> Option<Month> {
    let captures = MONTH_PREFIX.captures(file_name)?;
    captures.get(1)?.as_str().parse().ok()
}

/// Month of a path's file name
pub fn month_of(path: &Path) -> Option<Month> {
    path.file_name()
        .and_then(|n| n.to_str())
        .and_then(month_from_filename)
}

/// Name of the retry marker for `month` (`.retry_YYYYMM.json`)
pub fn retry_marker_name(month: Month) -> String {
    format!("{}{}{}", RETRY_MARKER_PREFIX, month, RETRY_MARKER_SUFFIX)
}

/// All `*.csv` files directly inside `input_dir`, sorted by name
pub fn list_input_files(input_dir: &Path) -> Result<Vec<PathBuf>> {
    let escaped = glob::Pattern::escape(&input_dir.to_string_lossy());
    let pattern = Path::new(&escaped).join(INPUT_FILE_PATTERN);
    let pattern = pattern.to_string_lossy();

    let entries = glob::glob(&pattern).map_err(|e| {
        SaisonError::configuration(format!("invalid input pattern '{}': {}", pattern, e))
    })?;

    let mut files = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| {
            let path = e.path().to_path_buf();
            SaisonError::io(path, e.into())
        })?;
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    debug!("Found {} input files in {}", files.len(), input_dir.display());
    Ok(files)
}

/// The `n` most recent months among `files`, newest first
pub fn latest_months(files: &[PathBuf], n: usize) -> Vec<Month> {
    let months: BTreeSet<Month> = files.iter().filter_map(|p| month_of(p)).collect();
    months.into_iter().rev().take(n).collect()
}

/// Months with an `Archive/<YYYYMM>/` directory, regardless of retry markers
pub fn archived_months(archive_dir: &Path) -> BTreeSet<Month> {
    if !archive_dir.is_dir() {
        return BTreeSet::new();
    }

    WalkDir::new(archive_dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_dir())
        .filter_map(|e| {
            let name = e.file_name().to_str()?;
            if name.len() == 6 { name.parse().ok() } else { None }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn month(s: &str) -> Month {
        s.parse().unwrap()
    }

    #[test]
    fn test_month_from_filename() {
        assert_eq!(month_from_filename("202510_card.csv"), Some(month("202510")));
        assert_eq!(month_from_filename("202511-data.csv"), Some(month("202511")));
        assert_eq!(month_from_filename("202512.csv"), Some(month("202512")));
        assert_eq!(month_from_filename("202510"), Some(month("202510")));
        assert_eq!(month_from_filename("2025100_card.csv"), None);
        assert_eq!(month_from_filename("202513_card.csv"), None);
        assert_eq!(month_from_filename("180001_card.csv"), None);
        assert_eq!(month_from_filename("card_202510.csv"), None);
    }

    #[test]
    fn test_retry_marker_name() {
        assert_eq!(retry_marker_name(month("202511")), ".retry_202511.json");
    }

    #[test]
    fn test_latest_months_newest_first() {
        let files: Vec<PathBuf> = ["202509_c.csv", "202511_b.csv", "202510_a.csv", "202511_d.csv", "x.csv"]
            .iter()
            .map(PathBuf::from)
            .collect();
        assert_eq!(latest_months(&files, 2), vec![month("202511"), month("202510")]);
        assert_eq!(latest_months(&files, 5).len(), 3);
        assert!(latest_months(&[], 2).is_empty());
    }

    #[test]
    fn test_list_input_files_only_csv() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("202510_b.csv"), "").unwrap();
        fs::write(temp_dir.path().join("202510_a.csv"), "").unwrap();
        fs::write(temp_dir.path().join("notes.txt"), "").unwrap();
        fs::create_dir(temp_dir.path().join("sub.csv")).unwrap();

        let files = list_input_files(temp_dir.path()).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap())
            .collect();
        assert_eq!(names, vec!["202510_a.csv", "202510_b.csv"]);
    }

    #[test]
    fn test_list_input_files_with_glob_characters_in_directory() {
        let temp_dir = TempDir::new().unwrap();
        let input = temp_dir.path().join("In[1]");
        let lookalike = temp_dir.path().join("In1");
        fs::create_dir(&input).unwrap();
        fs::create_dir(&lookalike).unwrap();
        fs::write(input.join("202510_a.csv"), "").unwrap();
        fs::write(lookalike.join("202510_x.csv"), "").unwrap();

        let files = list_input_files(&input).unwrap();
        assert_eq!(files, vec![input.join("202510_a.csv")]);
    }

    #[test]
    fn test_archived_months() {
        let temp_dir = TempDir::new().unwrap();
        fs::create_dir(temp_dir.path().join("202510")).unwrap();
        fs::create_dir(temp_dir.path().join("202511")).unwrap();
        fs::create_dir(temp_dir.path().join("202513")).unwrap();
        fs::create_dir(temp_dir.path().join("misc")).unwrap();
        fs::write(temp_dir.path().join("202512"), "").unwrap();

        let months = archived_months(temp_dir.path());
        assert_eq!(
            months.into_iter().collect::<Vec<_>>(),
            vec![month("202510"), month("202511")]
        );
        assert!(archived_months(&temp_dir.path().join("missing")).is_empty());
    }
}
