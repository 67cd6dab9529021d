//! Starline CLI Library
//!
//! Command-line front-end for the Starline warehouse pipeline. Each
//! invocation runs one stage; stages hand work to each other through JSON
//! manifests:
//!
//! - **Extract**: stage new source rows (`starline extract --output extracted.json`)
//! - **Transform**: shape staged rows (`starline transform --manifest extracted.json`)
//! - **Load**: insert shaped rows into the warehouse (`starline load --manifest transformed.json`)
//! - **Run**: all three in sequence (`starline run`)

#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod commands;

use clap::{Parser, Subcommand};
use starline_common::logging::{ConsoleStream, LogConfig, LogLevel, LogOutput};
use std::path::PathBuf;

/// Starline - incremental warehouse pipeline
#[derive(Parser, Debug)]
#[command(name = "starline")]
#[command(author, version, about, long_about = None)]
#[command(arg_required_else_help = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Stage rows changed since the last run into the ingest bucket
    Extract {
        /// Write the extraction manifest here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Shape the artifacts of an extraction run into warehouse tables
    Transform {
        /// Extraction manifest produced by `starline extract`
        #[arg(short, long)]
        manifest: PathBuf,

        /// Write the transform manifest here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Insert the artifacts of a transform run into the warehouse
    Load {
        /// Transform manifest produced by `starline transform`
        #[arg(short, long)]
        manifest: PathBuf,
    },

    /// Extract, transform and load in one go
    Run,
}

/// Logging defaults before `LOG_*` overrides
///
/// Console logs go to stderr: stdout is reserved for manifests.
pub fn log_defaults(verbose: bool) -> LogConfig {
    LogConfig::builder()
        .level(if verbose { LogLevel::Debug } else { LogLevel::Info })
        .output(LogOutput::Console)
        .console_stream(ConsoleStream::Stderr)
        .log_file_prefix("starline")
        .build()
}
