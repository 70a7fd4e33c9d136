//! Command-line arguments.

use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(version, about = "Render and patch typed values in process memory")]
pub struct Cli {
    /// Schema file (`.json` or `.json.xz`).
    #[arg(short, long)]
    pub schema: PathBuf,

    /// Struct type to overlay.
    #[arg(short = 't', long = "type")]
    pub type_name: String,

    /// Address of the instance.
    #[arg(short, long, value_parser = parse_address)]
    pub address: Option<u64>,

    /// Inspect the live process with this pid.
    #[arg(short, long, conflicts_with = "dump")]
    pub pid: Option<u32>,

    /// Inspect a raw memory dump instead of a live process.
    #[arg(short, long, requires = "base")]
    pub dump: Option<PathBuf>,

    /// Address the first byte of the dump was taken from.
    #[arg(short, long, value_parser = parse_address)]
    pub base: Option<u64>,

    /// JSON configuration file.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Annotate values with their types.
    #[arg(long)]
    pub rich: bool,

    /// Render on a single line.
    #[arg(long)]
    pub compact: bool,

    /// Mark dereferenced pointers with `*`.
    #[arg(long)]
    pub show_pointers: bool,

    /// Print the C declaration of the type and exit.
    #[arg(long)]
    pub declaration: bool,

    /// Limit for null-terminated scans.
    #[arg(long)]
    pub max_scan: Option<usize>,

    /// Assign `path=value` before rendering, e.g. `ob_refcnt=1` or `items.0.key=7`.
    #[arg(long, value_parser = parse_assignment)]
    pub set: Vec<(String, String)>,
}

/// Parse `0x`-prefixed hex or decimal.
pub fn parse_address(text: &str) -> Result<u64, String> {
    let text = text.trim();
    let parsed = match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(&hex.replace('_', ""), 16),
        None => text.parse::<u64>(),
    };
    parsed.map_err(|e| format!("invalid address {:?}: {}", text, e))
}

/// Split `path=value`.
pub fn parse_assignment(text: &str) -> Result<(String, String), String> {
    match text.split_once('=') {
        Some((path, value)) if !path.trim().is_empty() => {
            Ok((path.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected path=value, got {:?}", text)),
    }
}
