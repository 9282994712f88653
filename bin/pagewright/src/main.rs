//! pagewright CLI
//!
//! Runs a build cycle against the external compiler and bundler, and keeps
//! rebuilding on content changes when the compiler asks for watch mode.
//!
//! This is the binary entry point. The library functionality is in `lib.rs`.

use std::{path::PathBuf, process::ExitCode};

use clap::Parser;
use color_eyre::eyre::Result;

/// Name the compiler sees as the first forwarded argument.
const PROGRAM_NAME: &str = "pagewright";

/// Command-line interface for pagewright.
#[derive(Parser)]
#[command(
    name = "pagewright",
    version,
    about = "Static site build glue for an external compiler and bundler",
    trailing_var_arg = true
)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "pagewright.toml")]
    config: PathBuf,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Arguments forwarded to the compiler
    #[arg(allow_hyphen_values = true)]
    args: Vec<String>,
}

impl Cli {
    fn forwarded_argv(&self) -> Vec<String> {
        std::iter::once(PROGRAM_NAME.to_string())
            .chain(self.args.iter().cloned())
            .collect()
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    color_eyre::install()?;

    let cli = Cli::parse();
    pagewright::init_tracing(cli.verbose);

    pagewright::cmd::run::run(&cli.config, cli.forwarded_argv()).await
}
