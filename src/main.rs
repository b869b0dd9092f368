use clap::Parser;
use saison_processor::cli::Args;
use saison_processor::commands;
use std::process;

fn main() {
    let args = Args::parse();

    match commands::run(args) {
        Ok(code) => process::exit(code),
        Err(error) => {
            eprintln!("Error: {:#}", error);
            process::exit(1);
        }
    }
}
