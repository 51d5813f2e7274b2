//! `ipass` - CLI for implantpass
//!
//! This binary encodes procedure records as QR codes and decodes scanned
//! payloads from files, stdin or a keyboard-wedge scanner.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use std::fs;
use std::io::{self, BufRead, Read};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::{info, warn};

use implantpass::cli::{
    Cli, Command, ConfigCommand, DecodeCommand, EncodeCommand, InspectCommand, Inspection,
    OutputFormat, SampleCommand, ScanCommand,
};
use implantpass::codec::procedures_from_json;
use implantpass::sample::sample_procedure;
use implantpass::{decode, init_logging, BarcodeImage, Config, Encoder, Procedure, ScanBuffer};

fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbosity());

    // `config validate` reports on its own file instead of failing up front.
    if let Command::Config(ConfigCommand::Validate { file }) = &cli.command {
        return handle_validate(file.clone().or_else(|| cli.config.clone()));
    }

    let config = Config::load_from(cli.config.clone()).context("failed to load configuration")?;

    match cli.command {
        Command::Encode(cmd) => handle_encode(&config, &cmd),
        Command::Decode(cmd) => handle_decode(&cmd),
        Command::Inspect(cmd) => handle_inspect(&cmd),
        Command::Scan(cmd) => handle_scan(&config, &cmd),
        Command::Sample(cmd) => handle_sample(&config, &cmd),
        Command::Config(cmd) => handle_config(&config, cmd),
    }
}

fn read_input(path: Option<&Path>) -> Result<String> {
    match path {
        Some(path) => fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display())),
        None => {
            let mut text = String::new();
            io::stdin()
                .read_to_string(&mut text)
                .context("failed to read stdin")?;
            Ok(text)
        }
    }
}

fn write_image(image: &BarcodeImage, output: Option<&Path>, data_url: bool) -> Result<()> {
    if image.is_fallback() {
        warn!("Payload could not be encoded, writing fallback QR code");
    }
    if let Some(path) = output {
        fs::write(path, image.to_png()?)
            .with_context(|| format!("failed to write {}", path.display()))?;
        info!(
            path = %path.display(),
            width = image.width(),
            bytes = image.payload().len(),
            "Wrote QR code"
        );
    }
    if data_url {
        println!("{}", image.to_data_url()?);
    }
    Ok(())
}

fn handle_encode(config: &Config, cmd: &EncodeCommand) -> Result<()> {
    let text = read_input(Some(&cmd.input))?;
    let value: serde_json::Value = serde_json::from_str(&text)
        .with_context(|| format!("{} is not valid JSON", cmd.input.display()))?;
    let procedures = procedures_from_json(&value);

    let encoder = Encoder::from_config(config);
    let image = match procedures.as_slice() {
        [] => bail!("{} contains no procedures", cmd.input.display()),
        [procedure] if !cmd.all && !value.is_array() => encoder.encode_single(procedure),
        _ => encoder.encode_collection(&procedures)?,
    };

    write_image(&image, cmd.output.as_deref(), cmd.data_url)?;
    if image.is_fallback() {
        bail!("payload too large or not encodable; fallback QR code written instead");
    }
    Ok(())
}

fn print_procedures(procedures: &[Procedure], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(procedures)?),
        OutputFormat::Plain => {
            for procedure in procedures {
                println!(
                    "{}  {}  {}  {}  {} implant(s)",
                    procedure.date,
                    procedure.procedure_type,
                    procedure.surgeon,
                    procedure.hospital,
                    procedure.implant_count()
                );
            }
        }
    }
    Ok(())
}

fn handle_decode(cmd: &DecodeCommand) -> Result<()> {
    let raw = read_input(cmd.input.as_deref())?;
    let decoded = decode(raw.trim())?;
    if decoded.is_legacy() {
        info!(kind = %decoded.kind(), "Decoded legacy payload");
    }
    print_procedures(&decoded.into_procedures(), cmd.format)
}

fn handle_inspect(cmd: &InspectCommand) -> Result<()> {
    let raw = read_input(cmd.input.as_deref())?;
    let raw = raw.trim();
    let decoded = decode(raw)?;
    let inspection = Inspection::new(raw, &decoded);

    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&inspection)?);
    } else {
        for line in inspection.lines() {
            println!("{line}");
        }
    }
    Ok(())
}

fn handle_scan(config: &Config, cmd: &ScanCommand) -> Result<()> {
    let timeout = cmd
        .timeout_ms
        .map_or_else(|| config.scanner_timeout(), Duration::from_millis);
    let mut buffer = ScanBuffer::new(timeout);
    info!(timeout_ms = timeout.as_millis(), "Waiting for scans on stdin");

    let emit = |text: &str| match decode(text) {
        Ok(decoded) => print_procedures(&decoded.into_procedures(), OutputFormat::Json),
        Err(e) => {
            warn!(error = %e, "Scan could not be decoded");
            Ok(())
        }
    };

    for line in io::stdin().lock().lines() {
        let mut line = line.context("failed to read stdin")?;
        line.push('\n');
        for scan in buffer.feed_str(&line, Instant::now()) {
            emit(&scan.text)?;
        }
    }
    if let Some(scan) = buffer.finish() {
        emit(&scan.text)?;
    }
    Ok(())
}

fn handle_sample(config: &Config, cmd: &SampleCommand) -> Result<()> {
    let today = cmd
        .date
        .unwrap_or_else(|| chrono::Local::now().date_naive());
    let procedure = sample_procedure(today);

    match &cmd.encode {
        Some(path) => {
            let image = Encoder::from_config(config).encode_single(&procedure);
            write_image(&image, Some(path), false)
        }
        None => print_procedures(&[procedure], OutputFormat::Json),
    }
}

fn handle_validate(file: Option<PathBuf>) -> Result<()> {
    let path = file.unwrap_or_else(Config::default_config_path);
    println!("Validating configuration: {}", path.display());
    match Config::load_from(Some(path)) {
        Ok(_) => {
            println!("Configuration is valid.");
            Ok(())
        }
        Err(e) => bail!("configuration error: {e}"),
    }
}

fn handle_config(config: &Config, cmd: ConfigCommand) -> Result<()> {
    match cmd {
        ConfigCommand::Show { json } => {
            if json {
                println!("{}", serde_json::to_string_pretty(config)?);
            } else {
                println!("Current Configuration");
                println!("=====================");
                for (section, options) in [
                    ("render.single", &config.render.single),
                    ("render.collection", &config.render.collection),
                    ("render.fallback", &config.render.fallback),
                ] {
                    println!();
                    println!("[{section}]");
                    println!("  Error correction:   {}", options.ec_level);
                    println!("  Width:              {}", options.width);
                    println!("  Scale:              {}", options.scale);
                    println!("  Margin:             {}", options.margin);
                    println!("  Colors:             {} on {}", options.dark, options.light);
                }
                println!();
                println!("[codec]");
                println!("  App name:           {}", config.codec.app_name);
                println!("  Fallback message:   {}", config.codec.fallback_message);
                println!("  Max payload bytes:  {}", config.codec.max_payload_bytes);
                println!();
                println!("[scanner]");
                println!("  Timeout (ms):       {}", config.scanner.timeout_ms);
            }
        }
        ConfigCommand::Path => {
            println!("{}", Config::default_config_path().display());
        }
        ConfigCommand::Validate { file } => handle_validate(file)?,
    }
    Ok(())
}
