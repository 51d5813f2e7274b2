//! Command-line interface for implantpass.
//!
//! This module provides the CLI structure for the `ipass` binary. Handlers
//! live in the binary; the pieces worth testing live here.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub use commands::{
    ConfigCommand, DecodeCommand, EncodeCommand, InspectCommand, Inspection, OutputFormat,
    SampleCommand, ScanCommand,
};

/// ipass - Carry your implant records as a QR code
///
/// Encodes surgical procedures and their implants as QR codes and decodes
/// scanned payloads, including those written by older app releases.
#[derive(Debug, Parser)]
#[command(name = "ipass")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to custom configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// The command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Encode procedures from a JSON file as a QR code
    Encode(EncodeCommand),

    /// Decode a scanned payload into procedures
    Decode(DecodeCommand),

    /// Describe a scanned payload without printing its records
    Inspect(InspectCommand),

    /// Read a keyboard-wedge scanner from stdin and decode each scan
    Scan(ScanCommand),

    /// Print or encode a sample procedure
    Sample(SampleCommand),

    /// View or validate configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

impl Cli {
    /// Get the verbosity level based on flags.
    #[must_use]
    pub fn verbosity(&self) -> crate::logging::Verbosity {
        if self.quiet {
            crate::logging::Verbosity::Quiet
        } else {
            match self.verbose {
                0 => crate::logging::Verbosity::Normal,
                1 => crate::logging::Verbosity::Verbose,
                _ => crate::logging::Verbosity::Trace,
            }
        }
    }
}
