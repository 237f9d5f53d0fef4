// SPDX-FileCopyrightText: 2026 Vigil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Vigil - an always-on client channel monitor.
//!
//! This is the binary entry point.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod config;
mod serve;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use vigil_config::{ConfigError, VigilConfig};

/// Vigil - watches client channels and escalates fires, praise and unanswered questions.
#[derive(Parser, Debug)]
#[command(name = "vigil", version, about, long_about = None)]
struct Cli {
    /// Read configuration from this file instead of the standard locations.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start monitoring.
    Serve,
    /// Print the effective configuration with secrets redacted.
    Config,
}

fn load_config(path: Option<&PathBuf>) -> Result<VigilConfig, Vec<ConfigError>> {
    match path {
        Some(path) => vigil_config::load_and_validate_path(path),
        None => vigil_config::load_and_validate(),
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match load_config(cli.config.as_ref()) {
        Ok(config) => config,
        Err(errors) => {
            vigil_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    match cli.command {
        Some(Commands::Serve) => {
            if let Err(e) = serve::run_serve(config).await {
                eprintln!("error: {e}");
                std::process::exit(1);
            }
        }
        Some(Commands::Config) => match config::render_redacted(&config) {
            Ok(rendered) => print!("{rendered}"),
            Err(e) => {
                eprintln!("error: {e}");
                std::process::exit(1);
            }
        },
        None => {
            println!("vigil: use --help for available commands");
        }
    }
}
