//! Modgate CLI - resolve module graphs and check access between them

#![warn(missing_docs)]

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::Level;

mod commands;
mod config;

use commands::{check, describe, reads, resolve, ModuleSource, Operand};

#[derive(Parser)]
#[command(name = "modgate")]
#[command(about = "Module readability and access checking", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug output
    #[arg(long, global = true)]
    debug: bool,

    /// JSON layout describing every module
    #[arg(long, global = true, conflicts_with = "module_path", env = "MODGATE_LAYOUT")]
    layout: Option<PathBuf>,

    /// Directory of descriptor files (repeatable)
    #[arg(long = "module-path", global = true)]
    module_path: Vec<PathBuf>,

    /// Root module to resolve (repeatable). Replaces the roots of a layout;
    /// on a module path defaults to every module found.
    #[arg(long = "root", global = true)]
    roots: Vec<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve the modules and print the reads graph
    Resolve {
        /// Print the graph as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check whether one module reads another
    Reads {
        /// Reading module
        a: String,

        /// Read module
        b: String,
    },

    /// Check access from one package to another
    Check {
        /// Accessing package, module/package or unnamed:<loader>/package
        from: Operand,

        /// Accessed package, module/package or unnamed:<loader>/package
        to: Operand,

        /// Export module/package to every unnamed module first (repeatable)
        #[arg(long)]
        widen: Vec<Operand>,

        /// Open module/package to every unnamed module first (repeatable)
        #[arg(long = "widen-opens")]
        widen_opens: Vec<Operand>,

        /// Check deep reflective access instead of linkage
        #[arg(long)]
        reflect: bool,
    },

    /// Print a module descriptor
    Describe {
        /// Module name
        module: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = config::load_config(cli.config)?;

    // Initialize logging
    let level = if cli.debug {
        Level::DEBUG
    } else {
        config.log.max_level()
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    let source = match cli.layout {
        Some(path) => ModuleSource::Layout {
            path,
            roots: cli.roots,
        },
        None => ModuleSource::Directories {
            module_path: cli.module_path,
            roots: cli.roots,
        },
    };
    let layer = commands::load_layer(&source, &config.modules)?;

    // Handle commands
    match cli.command {
        Commands::Resolve { json } => {
            resolve::resolve(&layer, json)?;
        }

        Commands::Reads { a, b } => {
            if !reads::reads(&layer, &a, &b) {
                std::process::exit(1);
            }
        }

        Commands::Check {
            from,
            to,
            widen,
            widen_opens,
            reflect,
        } => {
            let check_config = check::CheckConfig {
                widen,
                widen_opens,
                reflect,
            };
            if !check::check(&layer, &from, &to, &check_config)? {
                std::process::exit(1);
            }
        }

        Commands::Describe { module } => {
            describe::describe(&layer, &module)?;
        }
    }

    Ok(())
}
