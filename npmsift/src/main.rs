mod cli;
mod commands;
mod observability;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};
use commands::GlobalArgs;
use std::process::ExitCode;

/// Exit code when `clones` found at least one match.
const EXIT_CLONES_FOUND: u8 = 1;
/// Exit code for errors that stopped the command.
const EXIT_ERROR: u8 = 2;

fn main() -> ExitCode {
    npmsift_core::config::load_dotenv();
    observability::init_tracing();
    let cli = Cli::parse();

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(EXIT_ERROR)
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    let global = GlobalArgs {
        config: cli.config,
        workers: cli.workers,
        package_timeout: cli.package_timeout,
    };

    match cli.command {
        Commands::Hash {
            dir,
            layout,
            output,
            resume,
        } => {
            commands::hash::hash_dataset(&global, &dir, layout, output.as_deref(), resume)?;
        }
        Commands::Features {
            dir,
            layout,
            label,
            output,
            resume,
        } => {
            commands::features::extract_dataset(
                &global,
                &dir,
                layout,
                label.as_deref(),
                output.as_deref(),
                resume,
            )?;
        }
        Commands::Clones {
            known,
            candidates,
            output,
        } => {
            let matches = commands::clones::detect_clones(&known, &candidates, output.as_deref())?;
            if !matches.is_empty() {
                return Ok(ExitCode::from(EXIT_CLONES_FOUND));
            }
        }
        Commands::Scan {
            dir,
            layout,
            hashes,
            features,
            label,
            resume,
        } => {
            commands::scan::scan_dataset(
                &global,
                commands::scan::ScanArgs {
                    dir: &dir,
                    layout,
                    hashes: &hashes,
                    features: &features,
                    label: label.as_deref(),
                    resume,
                },
            )?;
        }
        Commands::Inspect {
            package_dir,
            compact,
        } => {
            let report = commands::inspect::inspect_package(&global, &package_dir)?;
            if compact {
                println!("{}", serde_json::to_string(&report)?);
            } else {
                println!("{}", serde_json::to_string_pretty(&report)?);
            }
        }
    }
    Ok(ExitCode::SUCCESS)
}
