//! Error handling for Saison processing operations.
//!
//! Every variant carries enough context (file path, line, column) to be
//! reported as a per-file or per-row outcome without aborting the batch.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SaisonError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Could not decode {path} with any supported encoding (tried: {tried})")]
    Encoding { path: PathBuf, tried: String },

    #[error("No header row found in the first {scanned} lines of {path}")]
    HeaderNotFound { path: PathBuf, scanned: usize },

    #[error("Required column '{column}' missing from header of {path}")]
    MissingColumn { path: PathBuf, column: String },

    #[error("Malformed row at line {line}: {reason}")]
    MalformedRow { line: usize, reason: String },

    #[error("Cannot select {requested} attendees from a roster of {available}")]
    InsufficientAttendees { requested: usize, available: usize },

    #[error("Failed to archive {path}: {reason}")]
    ArchiveMove { path: PathBuf, reason: String },

    #[error("CSV error in {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("Roster error in {path}: {reason}")]
    Roster { path: PathBuf, reason: String },

    #[error("Retry marker error at {path}: {reason}")]
    RetryMarker { path: PathBuf, reason: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },
}

impl SaisonError {
    /// Create an I/O error bound to a path
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create a CSV error bound to a path
    pub fn csv(path: impl Into<PathBuf>, source: csv::Error) -> Self {
        Self::Csv {
            path: path.into(),
            source,
        }
    }

    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create a malformed row error
    pub fn malformed_row(line: usize, reason: impl Into<String>) -> Self {
        Self::MalformedRow {
            line,
            reason: reason.into(),
        }
    }

    /// Create an archive move error
    pub fn archive_move(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::ArchiveMove {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Short kind name used in summaries and retry markers
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Io { .. } => "IoError",
            Self::Encoding { .. } => "EncodingError",
            Self::HeaderNotFound { .. } => "HeaderNotFoundError",
            Self::MissingColumn { .. } => "MissingColumnError",
            Self::MalformedRow { .. } => "MalformedRowError",
            Self::InsufficientAttendees { .. } => "InsufficientAttendeesError",
            Self::ArchiveMove { .. } => "ArchiveMoveError",
            Self::Csv { .. } => "CsvError",
            Self::Roster { .. } => "RosterError",
            Self::RetryMarker { .. } => "RetryMarkerError",
            Self::Configuration { .. } => "ConfigurationError",
        }
    }
}

pub type Result<T> = std::result::Result<T, SaisonError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_column_message_names_column() {
        let err = SaisonError::MissingColumn {
            path: PathBuf::from("202510_card.csv"),
            column: "備考".to_string(),
        };
        let message = err.to_string();
        assert!(message.contains("備考"));
        assert!(message.contains("202510_card.csv"));
        assert_eq!(err.kind(), "MissingColumnError");
    }

    #[test]
    fn test_io_error_keeps_source() {
        use std::error::Error as _;

        let err = SaisonError::io(
            "missing.csv",
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        );
        assert!(err.source().is_some());
        assert_eq!(err.kind(), "IoError");
    }
}
