//! Command runners behind the CLI
//!
//! `run` loads the configuration, processes the selected months and prints
//! the summary. `validate-config` only resolves and checks the setup.

use crate::cli::{Args, Command, ConfigArgs, RunArgs};
use crate::config::Config;
use crate::months::archived_months;
use crate::processor::{BatchProcessor, print_summary};
use crate::roster::Roster;
use anyhow::{Context, Result};
use colored::*;
use std::path::Path;
use tracing::debug;

/// Dispatch the parsed arguments; returns the process exit code
pub fn run(args: Args) -> Result<i32> {
    match args.command {
        Command::Run(run_args) => run_process(run_args),
        Command::ValidateConfig(config_args) => run_validate_config(config_args),
    }
}

/// Process statements and report per-month results
pub fn run_process(args: RunArgs) -> Result<i32> {
    setup_logging(args.get_log_level(), args.quiet)?;
    debug!("Run arguments: {:?}", args);

    let config = Config::load(args.paths.config.as_deref())
        .context("Failed to load configuration")?;
    let config = args.apply(config);
    config.validate().context("Invalid configuration")?;

    let mut processor = BatchProcessor::new(config)
        .context("Failed to initialize processor")?
        .with_progress(args.show_progress());
    let stats = processor.process().context("Processing failed")?;

    if !args.quiet {
        print_summary(&stats);
    }
    Ok(stats.exit_code())
}

/// Print the resolved configuration and check the directory layout
pub fn run_validate_config(args: ConfigArgs) -> Result<i32> {
    setup_logging("warn", false)?;

    let config = Config::load(args.config.as_deref()).context("Failed to load configuration")?;
    let config = args.apply(config);

    println!("{}", "Configuration".bright_green().bold());
    match &config.source {
        Some(path) => println!("  {} {}", "File:".bright_cyan(), path.display()),
        None => println!("  {} {}", "File:".bright_cyan(), "(defaults)".bright_white()),
    }

    let mut ok = true;
    ok &= check_dir("Input:", &config.input_dir);
    ok &= check_dir("Reference:", &config.reference_dir);
    ok &= check_dir("Output:", &config.output_dir);
    if config.archive_dir.is_dir() {
        let archived: Vec<String> = archived_months(&config.archive_dir)
            .iter()
            .map(|m| m.to_string())
            .collect();
        println!("  {} {}", "Archive:".bright_cyan(), config.archive_dir.display());
        if !archived.is_empty() {
            println!("  {} {}", "Archived months:".bright_cyan(), archived.join(", "));
        }
    } else {
        println!(
            "  {} {} (created on first archive)",
            "Archive:".bright_cyan(),
            config.archive_dir.display()
        );
    }

    let roster_path = config.roster_path();
    match Roster::load(&roster_path) {
        Ok(roster) => println!(
            "  {} {} ({} attendees)",
            "Roster:".bright_cyan(),
            roster_path.display(),
            roster.len().to_string().bright_white()
        ),
        Err(e) => {
            ok = false;
            println!("  {} {}: {}", "Roster:".bright_red(), roster_path.display(), e);
        }
    }

    let (min, max) = config.estimator().bounds();
    println!(
        "  {} {}-{}{}",
        "Attendees:".bright_cyan(),
        min,
        max,
        if config.amount_based.is_some() { " (amount based)" } else { "" }
    );
    for (id, weight) in config.primary_id_weights.iter() {
        println!("  {} id {} = {:.2}", "Primary weight:".bright_cyan(), id, weight);
    }

    if let Err(e) = config.validate() {
        ok = false;
        println!("  {} {}", "Invalid:".bright_red(), e);
    }

    if ok {
        println!("\n{}", "Configuration is valid".bright_green());
        Ok(0)
    } else {
        println!("\n{}", "Configuration has problems".bright_red().bold());
        Ok(1)
    }
}

fn check_dir(label: &str, dir: &Path) -> bool {
    if dir.is_dir() {
        println!("  {} {}", label.bright_cyan(), dir.display());
        true
    } else {
        println!("  {} {} (missing)", label.bright_red(), dir.display());
        false
    }
}

/// Set up structured logging on stderr
pub fn setup_logging(log_level: &str, quiet: bool) -> Result<()> {
    use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("saison_processor={}", log_level)));

    if quiet {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_level(true)
                    .with_writer(std::io::stderr)
                    .compact(),
            )
            .try_init()
            .context("Failed to initialize logging")?;
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_level(true)
                    .with_timer(fmt::time::uptime())
                    .with_writer(std::io::stderr),
            )
            .try_init()
            .context("Failed to initialize logging")?;
    }

    debug!("Logging initialized at level: {}", log_level);
    Ok(())
}
