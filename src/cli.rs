//! Command-line arguments for the `antler` driver.
use std::path::PathBuf;

use clap::Parser;

/// Run targets from a declarative project descriptor.
#[derive(Parser, Debug)]
#[command(
    name = "antler",
    about = "Declarative target-graph build engine",
    version = option_env!("ANTLER_VERSION").unwrap_or(env!("CARGO_PKG_VERSION"))
)]
pub struct Cli {
    /// Targets to run (the project default when omitted)
    pub targets: Vec<String>,

    /// Project descriptor to load
    #[arg(short = 'f', long = "file", default_value = "build.toml")]
    pub file: PathBuf,

    /// Set a property (overrides the descriptor)
    #[arg(short = 'D', value_name = "NAME=VALUE", value_parser = parse_define)]
    pub define: Vec<(String, String)>,

    /// Keep running unaffected targets after a failure
    #[arg(short = 'k', long)]
    pub keep_going: bool,

    /// Run independent targets in parallel
    #[arg(short = 'j', long)]
    pub parallel: bool,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// List described targets and exit
    #[arg(short = 'l', long)]
    pub list: bool,
}

/// Split `name=value`; a bare `name` sets the empty string.
fn parse_define(raw: &str) -> Result<(String, String), String> {
    let (name, value) = raw.split_once('=').unwrap_or((raw, ""));
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("invalid property definition '{raw}': empty name"));
    }
    Ok((name.to_string(), value.to_string()))
}
