//! CLI command definitions.
//!
//! This module defines the structure of all CLI subcommands.

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Args, Subcommand, ValueEnum};
use serde::Serialize;

use crate::codec::{Decoded, EnvelopeKind};

/// Encode command arguments.
#[derive(Debug, Args)]
pub struct EncodeCommand {
    /// JSON file holding a procedure object or an array of procedures
    pub input: PathBuf,

    /// Always use the collection envelope, even for one procedure
    #[arg(short, long)]
    pub all: bool,

    /// Write the QR code as PNG to this path
    #[arg(short, long, value_name = "OUT.png", required_unless_present = "data_url")]
    pub output: Option<PathBuf>,

    /// Print the QR code as a `data:image/png;base64,` URL
    #[arg(long)]
    pub data_url: bool,
}

/// Decode command arguments.
#[derive(Debug, Args)]
pub struct DecodeCommand {
    /// File holding the payload text (reads stdin when omitted)
    pub input: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "json")]
    pub format: OutputFormat,
}

/// Inspect command arguments.
#[derive(Debug, Args)]
pub struct InspectCommand {
    /// File holding the payload text (reads stdin when omitted)
    pub input: Option<PathBuf>,

    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Scan command arguments.
#[derive(Debug, Args)]
pub struct ScanCommand {
    /// Idle gap that completes a scan, overriding the configuration
    #[arg(long, value_name = "MS")]
    pub timeout_ms: Option<u64>,
}

/// Sample command arguments.
#[derive(Debug, Args)]
pub struct SampleCommand {
    /// Procedure date (defaults to today)
    #[arg(long, value_name = "YYYY-MM-DD")]
    pub date: Option<NaiveDate>,

    /// Encode the sample as PNG to this path instead of printing it
    #[arg(long, value_name = "OUT.png")]
    pub encode: Option<PathBuf>,
}

/// Configuration commands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show the configuration file path
    Path,

    /// Validate configuration
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}

/// Output format for decoded records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Pretty-printed JSON
    #[default]
    Json,
    /// One summary line per procedure
    Plain,
}

/// Summary of a decoded payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Inspection {
    /// Recognized payload shape.
    pub kind: String,
    /// The `formatVersion`, if any.
    pub format_version: Option<String>,
    /// Procedures recovered.
    pub procedures: usize,
    /// Implants across all procedures.
    pub implants: usize,
    /// The declared `count` of a collection.
    pub declared_count: Option<u64>,
    /// Whether the declared count matches.
    pub count_matches: bool,
    /// The `generatedAt` timestamp.
    pub generated_at: Option<String>,
    /// The `appName` tag.
    pub app_name: Option<String>,
    /// Whether a legacy object matched only on `id` and `date`.
    pub ambiguous: bool,
    /// Payload size in bytes.
    pub bytes: usize,
}

impl Inspection {
    /// Summarize `decoded`, which was decoded from `raw`.
    #[must_use]
    pub fn new(raw: &str, decoded: &Decoded) -> Self {
        let kind = decoded.kind();
        let mut inspection = Self {
            kind: kind.to_string(),
            format_version: None,
            procedures: decoded.len(),
            implants: 0,
            declared_count: None,
            count_matches: true,
            generated_at: None,
            app_name: None,
            ambiguous: decoded.is_ambiguous(),
            bytes: raw.len(),
        };

        match decoded {
            Decoded::Single {
                procedure,
                format_version,
                ..
            } => {
                inspection.format_version.clone_from(format_version);
                inspection.implants = procedure.implant_count();
            }
            Decoded::Collection(collection) => {
                inspection.format_version.clone_from(&collection.format_version);
                inspection.implants = collection
                    .procedures
                    .iter()
                    .map(crate::model::Procedure::implant_count)
                    .sum();
                inspection.declared_count = collection.declared_count;
                inspection.count_matches = collection.count_matches();
                inspection.generated_at.clone_from(&collection.generated_at);
                inspection.app_name.clone_from(&collection.app_name);
            }
        }
        inspection
    }

    /// Human-readable lines, one `label: value` per line.
    #[must_use]
    pub fn lines(&self) -> Vec<String> {
        let or_dash = |value: Option<&str>| value.unwrap_or("-").to_string();
        let mut lines = vec![
            format!("Kind:           {}", self.kind),
            format!("Format version: {}", or_dash(self.format_version.as_deref())),
            format!("Procedures:     {}", self.procedures),
            format!("Implants:       {}", self.implants),
            format!("Payload bytes:  {}", self.bytes),
        ];
        if let Some(count) = self.declared_count {
            let status = if self.count_matches { "ok" } else { "MISMATCH" };
            lines.push(format!("Declared count: {count} ({status})"));
        }
        if self.kind == EnvelopeKind::CurrentCollection.to_string() {
            lines.push(format!("Generated at:   {}", or_dash(self.generated_at.as_deref())));
            lines.push(format!("App name:       {}", or_dash(self.app_name.as_deref())));
        }
        if self.ambiguous {
            lines.push("Warning:        matched only on id and date".to_string());
        }
        lines
    }
}
