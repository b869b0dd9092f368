//! Configuration management and validation.
//!
//! Settings are resolved once at start-up from four layers, lowest first:
//! built-in defaults, a TOML file, environment variables for the four
//! directories, and command-line flags (applied by the caller through the
//! `with_*` builders). The pipeline never re-reads configuration mid-run.
//!
//! ```toml
//! [paths]
//! input_dir = "../Input"
//!
//! [processing]
//! min_attendees = 2
//! max_attendees = 8
//! primary_id_weights = { "2" = 0.9, "1" = 0.1 }
//!
//! [processing.amount_based_attendees]
//! enabled = true
//! cost_per_person = 3000
//! brackets = { "0-5000" = { min = 2, max = 2 }, "5000-10000" = { min = 3, max = 4 } }
//! ```

use crate::constants::{
    APP_CONFIG_DIR, ATTENDEE_SLOTS, CONFIG_FILE_NAME, DEFAULT_ARCHIVE_DIR, DEFAULT_COST_PER_PERSON,
    DEFAULT_INPUT_DIR, DEFAULT_MAX_ATTENDEES, DEFAULT_MIN_ATTENDEES, DEFAULT_OUTPUT_DIR,
    DEFAULT_REFERENCE_DIR, DEFAULT_ROSTER_FILE, env_vars,
};
use crate::error::{Result, SaisonError};
use crate::estimator::{AmountBased, AttendanceEstimator, BracketTable};
use crate::models::{AmountBracket, Month};
use crate::sampler::{PrimaryWeights, RosterSampler};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// On-disk TOML layout; every field is optional
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigFile {
    pub paths: PathsSection,
    pub processing: ProcessingSection,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsSection {
    pub input_dir: Option<PathBuf>,
    pub reference_dir: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
    pub archive_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingSection {
    pub min_attendees: Option<usize>,
    pub max_attendees: Option<usize>,
    pub primary_id_weights: Option<BTreeMap<String, f64>>,
    pub roster_file: Option<String>,
    pub amount_based_attendees: Option<AmountBasedSection>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AmountBasedSection {
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    pub cost_per_person: Option<f64>,
    /// `"MIN-MAX" = { min = a, max = b }`
    #[serde(default)]
    pub brackets: BTreeMap<String, BracketAttendees>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BracketAttendees {
    pub min: usize,
    pub max: usize,
}

fn enabled_by_default() -> bool {
    true
}

/// Resolved settings for one run
#[derive(Debug, Clone)]
pub struct Config {
    pub input_dir: PathBuf,
    pub reference_dir: PathBuf,
    pub output_dir: PathBuf,
    pub archive_dir: PathBuf,

    /// Roster file name inside the reference directory
    pub roster_file: String,

    pub min_attendees: usize,
    pub max_attendees: usize,
    pub primary_id_weights: PrimaryWeights,

    /// Validated bracket table; `None` means uniform estimation
    pub amount_based: Option<AmountBased>,

    /// Reprocess months that are already archived
    pub force: bool,

    /// Months to process; empty means the latest months found in Input
    pub months: Vec<Month>,

    /// Fixed RNG seed for reproducible runs
    pub seed: Option<u64>,

    /// TOML file the settings came from, if any
    pub source: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from(DEFAULT_INPUT_DIR),
            reference_dir: PathBuf::from(DEFAULT_REFERENCE_DIR),
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            archive_dir: PathBuf::from(DEFAULT_ARCHIVE_DIR),
            roster_file: DEFAULT_ROSTER_FILE.to_string(),
            min_attendees: DEFAULT_MIN_ATTENDEES,
            max_attendees: DEFAULT_MAX_ATTENDEES,
            primary_id_weights: PrimaryWeights::default(),
            amount_based: None,
            force: false,
            months: Vec::new(),
            seed: None,
            source: None,
        }
    }
}

impl Config {
    /// Load configuration using the process environment.
    ///
    /// File lookup: `explicit`, else `./config.toml`, else the user config
    /// directory (`<config_dir>/saison-processor/config.toml`).
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let file = locate_config_file(explicit)?;
        Self::load_with_env(file.as_deref(), |key| std::env::var(key).ok())
    }

    /// Load from an optional TOML file with a custom environment lookup
    pub fn load_with_env<F>(file: Option<&Path>, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let cwd = std::env::current_dir().map_err(|e| SaisonError::io(".", e))?;

        let (parsed, base_dir) = match file {
            Some(path) => {
                let content =
                    std::fs::read_to_string(path).map_err(|e| SaisonError::io(path, e))?;
                let parsed: ConfigFile = toml::from_str(&content).map_err(|e| {
                    SaisonError::configuration(format!("{}: {}", path.display(), e))
                })?;
                let base = match path.parent() {
                    Some(parent) if !parent.as_os_str().is_empty() => cwd.join(parent),
                    _ => cwd.clone(),
                };
                info!("Loaded configuration from {}", path.display());
                (parsed, base)
            }
            None => {
                debug!("No configuration file found, using defaults");
                (ConfigFile::default(), cwd)
            }
        };

        let mut config = Self::from_file(parsed, &base_dir)?;
        config.source = file.map(Path::to_path_buf);
        config.apply_env(&base_dir, env);
        Ok(config)
    }

    /// Apply the TOML layer on top of the defaults
    pub fn from_file(file: ConfigFile, base_dir: &Path) -> Result<Self> {
        let defaults = Self::default();
        let resolve = |value: Option<PathBuf>, default: PathBuf| {
            resolve_path(base_dir, &value.unwrap_or(default))
        };

        let processing = file.processing;
        let primary_id_weights = match processing.primary_id_weights {
            Some(weights) => PrimaryWeights::new(weights)?,
            None => defaults.primary_id_weights,
        };

        let config = Self {
            input_dir: resolve(file.paths.input_dir, defaults.input_dir),
            reference_dir: resolve(file.paths.reference_dir, defaults.reference_dir),
            output_dir: resolve(file.paths.output_dir, defaults.output_dir),
            archive_dir: resolve(file.paths.archive_dir, defaults.archive_dir),
            roster_file: processing.roster_file.unwrap_or(defaults.roster_file),
            min_attendees: processing.min_attendees.unwrap_or(defaults.min_attendees),
            max_attendees: processing.max_attendees.unwrap_or(defaults.max_attendees),
            primary_id_weights,
            amount_based: processing
                .amount_based_attendees
                .and_then(|section| parse_amount_based(&section)),
            ..defaults
        };
        config.validate()?;
        Ok(config)
    }

    /// Environment overrides for the four directories
    fn apply_env<F>(&mut self, base_dir: &Path, env: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let targets: [(&str, &mut PathBuf); 4] = [
            (env_vars::INPUT_DIR, &mut self.input_dir),
            (env_vars::REFERENCE_DIR, &mut self.reference_dir),
            (env_vars::OUTPUT_DIR, &mut self.output_dir),
            (env_vars::ARCHIVE_DIR, &mut self.archive_dir),
        ];
        for (key, target) in targets {
            if let Some(value) = env(key).filter(|v| !v.trim().is_empty()) {
                debug!("{} overridden from environment", key);
                *target = resolve_path(base_dir, Path::new(value.trim()));
            }
        }
    }

    /// Fatal checks: attendee bounds and primary weights
    pub fn validate(&self) -> Result<()> {
        if self.min_attendees < 1
            || self.min_attendees > self.max_attendees
            || self.max_attendees > ATTENDEE_SLOTS
        {
            return Err(SaisonError::configuration(format!(
                "attendee range {}..={} must satisfy 1 <= min <= max <= {}",
                self.min_attendees, self.max_attendees, ATTENDEE_SLOTS
            )));
        }
        if self.roster_file.trim().is_empty() {
            return Err(SaisonError::configuration("roster_file must not be empty"));
        }
        Ok(())
    }

    pub fn with_input_dir(mut self, dir: PathBuf) -> Self {
        self.input_dir = dir;
        self
    }

    pub fn with_reference_dir(mut self, dir: PathBuf) -> Self {
        self.reference_dir = dir;
        self
    }

    pub fn with_output_dir(mut self, dir: PathBuf) -> Self {
        self.output_dir = dir;
        self
    }

    pub fn with_archive_dir(mut self, dir: PathBuf) -> Self {
        self.archive_dir = dir;
        self
    }

    /// Reprocess already-archived months
    pub fn with_force(mut self) -> Self {
        self.force = true;
        self
    }

    pub fn with_months(mut self, months: Vec<Month>) -> Self {
        self.months = months;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Set uniform-estimation bounds (checked again by [`Config::validate`])
    pub fn with_attendee_range(mut self, min_attendees: usize, max_attendees: usize) -> Self {
        self.min_attendees = min_attendees;
        self.max_attendees = max_attendees;
        self
    }

    pub fn with_primary_weights(mut self, weights: PrimaryWeights) -> Self {
        self.primary_id_weights = weights;
        self
    }

    pub fn with_amount_based(mut self, amount_based: AmountBased) -> Self {
        self.amount_based = Some(amount_based);
        self
    }

    pub fn roster_path(&self) -> PathBuf {
        self.reference_dir.join(&self.roster_file)
    }

    pub fn estimator(&self) -> AttendanceEstimator {
        let estimator = AttendanceEstimator::uniform(self.min_attendees, self.max_attendees);
        match &self.amount_based {
            Some(amount_based) => estimator.with_amount_based(amount_based.clone()),
            None => estimator,
        }
    }

    pub fn sampler(&self) -> RosterSampler {
        RosterSampler::new(self.primary_id_weights.clone())
    }
}

/// Find the configuration file to use, if any
pub fn locate_config_file(explicit: Option<&Path>) -> Result<Option<PathBuf>> {
    if let Some(path) = explicit {
        if !path.is_file() {
            return Err(SaisonError::configuration(format!(
                "configuration file {} does not exist",
                path.display()
            )));
        }
        return Ok(Some(path.to_path_buf()));
    }

    let local = PathBuf::from(CONFIG_FILE_NAME);
    if local.is_file() {
        return Ok(Some(local));
    }

    Ok(dirs::config_dir()
        .map(|dir| dir.join(APP_CONFIG_DIR).join(CONFIG_FILE_NAME))
        .filter(|path| path.is_file()))
}

fn resolve_path(base_dir: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base_dir.join(path)
    }
}

/// Parse and validate the amount-based section.
///
/// Any problem disables amount-based estimation with a warning instead of
/// failing the run.
fn parse_amount_based(section: &AmountBasedSection) -> Option<AmountBased> {
    if !section.enabled {
        debug!("Amount-based attendee estimation disabled");
        return None;
    }

    let cost_per_person = section.cost_per_person.unwrap_or(DEFAULT_COST_PER_PERSON);
    if !(cost_per_person.is_finite() && cost_per_person > 0.0) {
        warn!(
            "cost_per_person {} must be positive; using uniform attendee estimation",
            cost_per_person
        );
        return None;
    }

    let mut brackets = Vec::with_capacity(section.brackets.len());
    for (key, attendees) in &section.brackets {
        let Some((min_amount, max_amount)) = parse_bracket_key(key) else {
            warn!(
                "Amount bracket key '{}' is not MIN-MAX; using uniform attendee estimation",
                key
            );
            return None;
        };
        brackets.push(AmountBracket {
            min_amount,
            max_amount,
            min_attendees: attendees.min,
            max_attendees: attendees.max,
        });
    }

    match BracketTable::new(brackets) {
        Ok(table) => {
            debug!(
                "Amount-based estimation with {} brackets",
                table.brackets().len()
            );
            Some(AmountBased {
                brackets: table,
                cost_per_person,
            })
        }
        Err(e) => {
            warn!("Invalid amount brackets ({}); using uniform attendee estimation", e);
            None
        }
    }
}

/// `"5000-10000"` -> `(5000.0, 10000.0)`
fn parse_bracket_key(key: &str) -> Option<(f64, f64)> {
    let (min, max) = key.split_once('-')?;
    let min = min.trim().replace('_', "").parse::<f64>().ok()?;
    let max = max.trim().replace('_', "").parse::<f64>().ok()?;
    Some((min, max))
}
