//! memlens: render and patch typed values inside a live process or a memory
//! dump, using a JSON schema of the struct layouts involved.
//!
//! ```text
//! memlens --schema objects.json --type List --address 0x7f3a1c2d40 --pid 4242
//! memlens --schema objects.json --type List --address 0x7f3a1c2d40 \
//!         --dump heap.bin --base 0x7f3a1c0000 --set size=3
//! ```

mod cli;
mod store;

use anyhow::{bail, Context, Result};
use clap::Parser;
use cli::Cli;
use overlay::{parse_schema_file, Overlay, OverlayConfig, ReprLayout, ReprStyle, StructView, View};
use std::io::Write;
use tracing_subscriber::EnvFilter;

/// Used when `RUST_LOG` is unset.
const DEFAULT_LOG_FILTER: &str = "info";

fn main() -> Result<()> {
    // Logs go to stderr so rendered values on stdout can be piped.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let stdout = std::io::stdout();
    run(&cli, &mut stdout.lock())
}

fn run(cli: &Cli, out: &mut impl Write) -> Result<()> {
    let schema = parse_schema_file(&cli.schema)
        .with_context(|| format!("loading schema {}", cli.schema.display()))?;
    let layout = schema.resolve(&cli.type_name)?;

    if cli.declaration {
        writeln!(out, "{}", layout.declaration())?;
        return Ok(());
    }

    let address = cli
        .address
        .context("--address is required unless --declaration is given")?;
    let config = build_config(cli)?;
    let store = store::open(cli)?;
    tracing::info!("Overlaying {} at {:#x} in {}", cli.type_name, address, store.name());

    let view = Overlay::new(&schema, store.backing())
        .with_config(&config)
        .structure(&cli.type_name, address)?;

    for (path, text) in &cli.set {
        assign(&view, path, text).with_context(|| format!("setting {}", path))?;
        tracing::info!("Set {} = {}", path, text);
    }
    if !cli.set.is_empty() {
        store.flush()?;
    }

    writeln!(out, "{}", view.as_element().render(&config.repr)?)?;
    Ok(())
}

/// Configuration file (if any) overridden by command-line flags.
fn build_config(cli: &Cli) -> Result<OverlayConfig> {
    let mut config = match &cli.config {
        Some(path) => OverlayConfig::from_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => OverlayConfig::default(),
    };
    if cli.rich {
        config.repr.style = ReprStyle::Rich;
    }
    if cli.compact {
        config.repr.layout = ReprLayout::Compact;
    }
    if cli.show_pointers {
        config.repr.hide_pointers = false;
    }
    if let Some(max_scan) = cli.max_scan {
        config.max_scan = max_scan;
    }
    Ok(config)
}

/// Write one textual value to the element at `path`.
fn assign(view: &StructView<'_>, path: &str, text: &str) -> Result<()> {
    let element = view.as_element().path(path)?;
    match element.view()? {
        View::Scalar(scalar) => scalar.set_from_str(text)?,
        View::Pointer(pointer) => {
            pointer.write(cli::parse_address(text).map_err(anyhow::Error::msg)?)?
        }
        View::String(string) => string.set(text)?,
        _ => bail!(
            "{} has type {}; only scalars, pointers and strings can be set",
            path,
            element.type_name()
        ),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use tempfile::NamedTempFile;
    use tracing_subscriber::filter::LevelFilter;

    const SCHEMA: &str = r#"{ "structs": [
        { "name": "Pair", "fields": [
            { "name": "a", "type": "int" },
            { "name": "b", "type": "int" } ] }
    ] }"#;

    fn temp_with(contents: &[u8]) -> NamedTempFile {
        let mut tmpfile = NamedTempFile::new().unwrap();
        tmpfile.write_all(contents).unwrap();
        tmpfile.flush().unwrap();
        tmpfile
    }

    fn cli(schema: &Path, extra: &[&str]) -> Cli {
        let schema = schema.to_str().unwrap();
        let mut args = vec!["memlens", "--schema", schema, "--type", "Pair"];
        args.extend_from_slice(extra);
        Cli::try_parse_from(args).unwrap()
    }

    fn pair_bytes(a: i32, b: i32) -> Vec<u8> {
        let mut bytes = a.to_ne_bytes().to_vec();
        bytes.extend_from_slice(&b.to_ne_bytes());
        bytes
    }

    #[test]
    fn test_default_filter_shows_progress() {
        let filter = EnvFilter::new(DEFAULT_LOG_FILTER);
        assert_eq!(filter.max_level_hint(), Some(LevelFilter::INFO));
    }

    #[test]
    fn test_declaration() {
        let schema = temp_with(SCHEMA.as_bytes());
        let mut out = Vec::new();
        run(&cli(schema.path(), &["--declaration"]), &mut out).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "struct Pair {\n    int a;\n    int b;\n}\n"
        );
    }

    #[test]
    fn test_render_dump() {
        let schema = temp_with(SCHEMA.as_bytes());
        let dump = temp_with(&pair_bytes(1, 2));
        let dump_path = dump.path().to_str().unwrap();
        let args = [
            "--dump", dump_path, "--base", "0x1000", "--address", "0x1000", "--compact",
        ];

        let mut out = Vec::new();
        run(&cli(schema.path(), &args), &mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "Pair(a=1, b=2)\n");
    }

    #[test]
    fn test_set_writes_dump() {
        let schema = temp_with(SCHEMA.as_bytes());
        let dump = temp_with(&pair_bytes(1, 2));
        let dump_path = dump.path().to_str().unwrap();
        let args = [
            "--dump", dump_path, "--base", "0x1000", "--address", "0x1000", "--compact",
            "--rich", "--set", "b=99",
        ];

        let mut out = Vec::new();
        run(&cli(schema.path(), &args), &mut out).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "Pair(a=int(1), b=int(99))\n"
        );
        assert_eq!(std::fs::read(dump.path()).unwrap(), pair_bytes(1, 99));
    }

    #[test]
    fn test_bad_assignment_leaves_dump() {
        let schema = temp_with(SCHEMA.as_bytes());
        let dump = temp_with(&pair_bytes(1, 2));
        let dump_path = dump.path().to_str().unwrap();
        let args = [
            "--dump", dump_path, "--base", "0x1000", "--address", "0x1000", "--set", "b=huge",
        ];

        let mut out = Vec::new();
        assert!(run(&cli(schema.path(), &args), &mut out).is_err());
        assert_eq!(std::fs::read(dump.path()).unwrap(), pair_bytes(1, 2));
    }

    #[test]
    fn test_missing_address() {
        let schema = temp_with(SCHEMA.as_bytes());
        let dump = temp_with(&pair_bytes(1, 2));
        let dump_path = dump.path().to_str().unwrap();
        let mut out = Vec::new();
        let err = run(
            &cli(schema.path(), &["--dump", dump_path, "--base", "0"]),
            &mut out,
        )
        .unwrap_err();
        assert!(err.to_string().contains("--address"));
    }

    #[test]
    fn test_unknown_type() {
        let schema = temp_with(SCHEMA.as_bytes());
        let schema_path = schema.path().to_str().unwrap();
        let args = ["memlens", "--schema", schema_path, "--type", "Nope", "--declaration"];
        let mut out = Vec::new();
        assert!(run(&Cli::try_parse_from(args).unwrap(), &mut out).is_err());
    }

    #[test]
    fn test_config_overrides() {
        let config = temp_with(br#"{ "repr": { "layout": "compact" }, "max_scan": 10 }"#);
        let schema = temp_with(SCHEMA.as_bytes());
        let config_path = config.path().to_str().unwrap();

        let built = build_config(&cli(schema.path(), &["--config", config_path])).unwrap();
        assert_eq!(built.repr.layout, ReprLayout::Compact);
        assert_eq!(built.max_scan, 10);
        assert!(built.repr.hide_pointers);

        let built = build_config(&cli(
            schema.path(),
            &["--config", config_path, "--show-pointers", "--max-scan", "5"],
        ))
        .unwrap();
        assert!(!built.repr.hide_pointers);
        assert_eq!(built.max_scan, 5);
    }
}
