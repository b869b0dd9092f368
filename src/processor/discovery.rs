//! Input discovery for statement batches
//!
//! Lists `*.csv` files in the Input directory, groups them by their
//! `YYYYMM` prefix and selects the months for this run: the explicit month
//! filter when given, otherwise the latest months found.

use crate::constants::DEFAULT_LATEST_MONTHS;
use crate::error::{Result, SaisonError};
use crate::models::Month;
use crate::months::{latest_months, list_input_files, month_of};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Files of one month, sorted by name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonthFiles {
    pub month: Month,
    pub files: Vec<PathBuf>,
}

impl MonthFiles {
    pub fn file_names(&self) -> Vec<String> {
        self.files.iter().map(|p| file_name(p)).collect()
    }
}

/// What a run will work on
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Discovery {
    /// Selected months, oldest first
    pub months: Vec<MonthFiles>,
    /// CSV files without a month prefix; never processed
    pub unprefixed: Vec<PathBuf>,
}

impl Discovery {
    pub fn file_count(&self) -> usize {
        self.months.iter().map(|m| m.files.len()).sum()
    }
}

/// File discovery component for the Input directory
#[derive(Debug)]
pub struct FileDiscovery {
    input_dir: PathBuf,
}

impl FileDiscovery {
    pub fn new(input_dir: PathBuf) -> Self {
        Self { input_dir }
    }

    /// Discover input files for `requested` months (latest months when empty)
    pub fn discover(&self, requested: &[Month]) -> Result<Discovery> {
        if !self.input_dir.is_dir() {
            return Err(SaisonError::configuration(format!(
                "input directory {} does not exist",
                self.input_dir.display()
            )));
        }

        let files = list_input_files(&self.input_dir)?;

        let selected: Vec<Month> = if requested.is_empty() {
            let latest = latest_months(&files, DEFAULT_LATEST_MONTHS);
            debug!(
                "No month filter, using latest: {}",
                latest.iter().map(Month::to_string).collect::<Vec<_>>().join(", ")
            );
            latest
        } else {
            requested.to_vec()
        };

        let mut grouped: BTreeMap<Month, Vec<PathBuf>> =
            selected.iter().map(|m| (*m, Vec::new())).collect();
        let mut unprefixed = Vec::new();

        for path in files {
            match month_of(&path) {
                Some(month) => match grouped.get_mut(&month) {
                    Some(bucket) => bucket.push(path),
                    None => debug!("{} not in selected months", path.display()),
                },
                None => {
                    warn!("Skipping {}: name has no YYYYMM prefix", path.display());
                    unprefixed.push(path);
                }
            }
        }

        let months = grouped
            .into_iter()
            .filter_map(|(month, files)| {
                if files.is_empty() {
                    warn!("No input files found for month {}", month);
                    None
                } else {
                    Some(MonthFiles { month, files })
                }
            })
            .collect();

        Ok(Discovery { months, unprefixed })
    }
}

/// File name as a string, used as the key in outcomes and retry markers
pub fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
