//! Saison Processor Library
//!
//! Turns monthly Saison card statement CSVs into enhanced CSVs and HTML
//! expense reports. Meeting and entertainment rows get an estimated
//! attendee count and a weighted sample of attendee ids from a reference
//! roster; processed statements are moved into per-month archive folders.
//!
//! This library provides tools for:
//! - Detecting statement encodings (UTF-8 with or without BOM, CP932)
//! - Locating the header row below free-form pre-header lines
//! - Classifying reimbursable rows by their remarks text
//! - Estimating attendee counts, uniformly or by amount bracket
//! - Sampling attendee ids with a weighted primary slot
//! - Writing the enhanced CSV and the HTML report
//! - Archiving months with retry markers for partial failures

pub mod archive;
pub mod classifier;
pub mod cli;
pub mod commands;
pub mod config;
pub mod constants;
pub mod encoding;
pub mod error;
pub mod estimator;
pub mod header;
pub mod models;
pub mod months;
pub mod processor;
pub mod reader;
pub mod report;
pub mod roster;
pub mod sampler;
pub mod writer;

// Re-export commonly used types
pub use config::Config;
pub use error::{Result, SaisonError};
pub use models::{Month, ProcessingStats};
pub use processor::BatchProcessor;
