//! `antler` command-line driver.
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use clap::Parser;

use antler::cli::Cli;
use antler::config::{self, LoadOptions};
use antler::error::BuildError;
use antler::logging::{self, Logger};
use antler::project::{BuildOptions, Project};
use antler::tasks::TaskRegistry;

fn main() -> ExitCode {
    let _ = enable_ansi_support::enable_ansi_support();
    let args = Cli::parse();
    logging::init_subscriber(args.verbose);

    match run(&args) {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Cli) -> Result<ExitCode> {
    let fs = antler::fs::detect()?;
    let options = LoadOptions {
        properties: args.define.clone(),
        build: BuildOptions {
            keep_going: args.keep_going,
            parallel: args.parallel,
        },
        ..LoadOptions::default()
    };
    let logger = Arc::new(Logger::new());
    let project = config::load(&args.file, fs, &TaskRegistry::with_builtins(), options)?
        .with_sink(logger.clone());

    if args.list {
        print_listing(&project);
        return Ok(ExitCode::SUCCESS);
    }

    let started = Instant::now();
    let result = if args.targets.is_empty() {
        project.execute_default()
    } else {
        project.execute_targets(&args.targets)
    };
    logger.print_summary();
    tracing::info!("Total time: {:.1?}", started.elapsed());

    match result {
        Ok(_) => Ok(ExitCode::SUCCESS),
        Err(BuildError::BuildFailed { failures }) => {
            for failure in &failures {
                tracing::error!("{failure}");
            }
            Ok(ExitCode::FAILURE)
        }
        Err(e) => {
            tracing::error!("{e}");
            Ok(ExitCode::FAILURE)
        }
    }
}

/// `--list` output goes to stdout so it can be piped.
#[allow(clippy::print_stdout)]
fn print_listing(project: &Project) {
    if let Some(default) = project.default_target() {
        println!("Default target: {default}");
    }
    for (name, description) in project.describe_targets() {
        println!("  {name:<20} {description}");
    }
}
