//! Command-line interface components.

use crate::config::Config;
use crate::models::Month;
use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "saison-processor")]
#[command(about = "Assign attendees to meeting and entertainment expenses in Saison card statements")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Process statement CSV files from the Input directory
    Run(RunArgs),
    /// Show resolved configuration and check that directories exist
    ValidateConfig(ConfigArgs),
}

/// Directory and configuration flags shared by every subcommand
#[derive(ClapArgs, Debug, Clone, Default)]
pub struct ConfigArgs {
    /// Path to configuration file (TOML)
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Input directory holding YYYYMM_*.csv statements
    #[arg(short, long, value_name = "DIR")]
    pub input: Option<PathBuf>,

    /// Reference directory holding the attendee roster
    #[arg(short, long, value_name = "DIR")]
    pub reference: Option<PathBuf>,

    /// Output directory for enhanced CSV and HTML reports
    #[arg(short, long, value_name = "DIR")]
    pub output: Option<PathBuf>,

    /// Archive directory for processed statements
    #[arg(short, long, value_name = "DIR")]
    pub archive: Option<PathBuf>,
}

#[derive(ClapArgs, Debug, Clone, Default)]
pub struct RunArgs {
    #[command(flatten)]
    pub paths: ConfigArgs,

    /// Months to process (YYYYMM, repeatable or comma-separated); defaults to the latest two
    #[arg(short, long, value_name = "YYYYMM", value_delimiter = ',', value_parser = parse_month)]
    pub month: Vec<Month>,

    /// Reprocess months that are already archived
    #[arg(short, long)]
    pub force: bool,

    /// Seed for the random source (reproducible attendee assignment)
    #[arg(long, value_name = "SEED")]
    pub seed: Option<u64>,

    /// Increase logging verbosity (-v: info, -vv: debug, -vvv: trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Only show errors; hides progress output
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,
}

impl ConfigArgs {
    /// Layer command-line directories over a loaded configuration
    pub fn apply(&self, mut config: Config) -> Config {
        if let Some(dir) = &self.input {
            config = config.with_input_dir(dir.clone());
        }
        if let Some(dir) = &self.reference {
            config = config.with_reference_dir(dir.clone());
        }
        if let Some(dir) = &self.output {
            config = config.with_output_dir(dir.clone());
        }
        if let Some(dir) = &self.archive {
            config = config.with_archive_dir(dir.clone());
        }
        config
    }
}

impl RunArgs {
    /// Layer all run flags over a loaded configuration
    pub fn apply(&self, config: Config) -> Config {
        let mut config = self.paths.apply(config).with_months(self.month.clone());
        if self.force {
            config = config.with_force();
        }
        if let Some(seed) = self.seed {
            config = config.with_seed(seed);
        }
        config
    }

    pub fn get_log_level(&self) -> &'static str {
        if self.quiet {
            return "error";
        }
        match self.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    }

    pub fn show_progress(&self) -> bool {
        !self.quiet
    }
}

fn parse_month(value: &str) -> Result<Month, String> {
    value.trim().parse()
}
