//! Application constants for the Saison processor
//!
//! This module contains the fixed column names, category markers, scan
//! windows and default values used throughout the pipeline.

// =============================================================================
// Input Layout
// =============================================================================

/// Transaction date column
pub const COLUMN_DATE: &str = "利用日";

/// Merchant / description column
pub const COLUMN_MERCHANT: &str = "ご利用店名及び商品名";

/// Amount column (numeric)
pub const COLUMN_AMOUNT: &str = "利用金額";

/// Remarks column holding the expense category text
pub const COLUMN_REMARKS: &str = "備考";

/// Columns that must all appear in the header row (exact, case-sensitive)
pub const REQUIRED_COLUMNS: &[&str] = &[COLUMN_DATE, COLUMN_MERCHANT, COLUMN_AMOUNT, COLUMN_REMARKS];

/// Maximum number of leading lines scanned for the header row
pub const HEADER_SCAN_LINES: usize = 10;

/// Input file pattern inside the Input directory
pub const INPUT_FILE_PATTERN: &str = "*.csv";

// =============================================================================
// Encoding Detection
// =============================================================================

/// Detections below this confidence go straight to the fallback chain
pub const ENCODING_CONFIDENCE_THRESHOLD: f32 = 0.7;

// =============================================================================
// Classification
// =============================================================================

/// Remarks markers for reimbursable rows (meeting, entertainment)
pub const CATEGORY_MARKERS: &[&str] = &["会議費", "接待費"];

// =============================================================================
// Attendee Estimation and Sampling
// =============================================================================

/// Number of attendee-id slots written per row
pub const ATTENDEE_SLOTS: usize = 8;

/// Default lower bound for uniform attendee estimation
pub const DEFAULT_MIN_ATTENDEES: usize = 2;

/// Default upper bound for uniform attendee estimation
pub const DEFAULT_MAX_ATTENDEES: usize = 8;

/// Floor applied by the per-person fallback estimate
pub const FALLBACK_MIN_ATTENDEES: usize = 2;

/// Default divisor for the per-person fallback estimate
pub const DEFAULT_COST_PER_PERSON: f64 = 3000.0;

/// Default weights for the primary attendee slot
pub const DEFAULT_PRIMARY_ID_WEIGHTS: &[(&str, f64)] = &[("2", 0.9), ("1", 0.1)];

/// Allowed drift when checking that primary weights sum to 1.0
pub const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

// =============================================================================
// Output
// =============================================================================

/// Column holding the estimated attendee count
pub const ATTENDEE_COUNT_COLUMN: &str = "attendee_count";

/// Prefix of the attendee-id columns (`attendee_id_1` .. `attendee_id_8`)
pub const ATTENDEE_ID_COLUMN_PREFIX: &str = "attendee_id_";

/// First numeric suffix tried when an output stem is already taken
pub const FIRST_COLLISION_SUFFIX: usize = 2;

// =============================================================================
// Reference, Archive and Month Handling
// =============================================================================

/// Default roster file name inside the Reference directory
pub const DEFAULT_ROSTER_FILE: &str = "NameList.csv";

/// Number of most recent months processed when no month filter is given
pub const DEFAULT_LATEST_MONTHS: usize = 2;

/// Retry marker file name prefix (`.retry_YYYYMM.json`)
pub const RETRY_MARKER_PREFIX: &str = ".retry_";

/// Retry marker file name suffix
pub const RETRY_MARKER_SUFFIX: &str = ".json";

/// Earliest accepted year in a month prefix
pub const MIN_MONTH_YEAR: i32 = 1900;

/// Latest accepted year in a month prefix
pub const MAX_MONTH_YEAR: i32 = 2100;

// =============================================================================
// Configuration Defaults
// =============================================================================

/// Default Input directory, relative to the configuration root
pub const DEFAULT_INPUT_DIR: &str = "../Input";

/// Default Reference directory
pub const DEFAULT_REFERENCE_DIR: &str = "../Reference";

/// Default Output directory
pub const DEFAULT_OUTPUT_DIR: &str = "../Output";

/// Default Archive directory
pub const DEFAULT_ARCHIVE_DIR: &str = "../Archive";

/// Configuration file name looked up in the working directory
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Application directory name under the user configuration directory
pub const APP_CONFIG_DIR: &str = "saison-processor";

/// Environment variables overriding the configured directories
pub mod env_vars {
    pub const INPUT_DIR: &str = "INPUT_DIR";
    pub const REFERENCE_DIR: &str = "REFERENCE_DIR";
    pub const OUTPUT_DIR: &str = "OUTPUT_DIR";
    pub const ARCHIVE_DIR: &str = "ARCHIVE_DIR";
}

/// Attendee-id column name for a 1-based slot
pub fn attendee_id_column(slot: usize) -> String {
    format!("{}{}", ATTENDEE_ID_COLUMN_PREFIX, slot)
}
