use crate::{format_json, open_local, open_store};
use anyhow::{Context, Result, bail};
use clap::Subcommand;
use serde_json::{Map, Value};
use std::io::{self, Read};
use std::path::PathBuf;
use worklog_store::{Store, export_all, import_all};

#[derive(Subcommand, Debug)]
pub enum StoreOp {
    /// Print the value stored under a key
    Read {
        /// Store key
        key: String,

        /// JSON value to seed and return when the key does not exist
        #[arg(long, default_value = "null")]
        default: String,
    },
    /// Replace a key with a JSON value read from stdin
    Write {
        /// Store key
        key: String,
    },
    /// List stored keys
    Keys,
    /// Dump every key into a single JSON object
    Export {
        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Write every key of an exported JSON object back into the store
    Import {
        /// Input file (use - for stdin)
        input: String,
    },
}

pub fn run(op: StoreOp, data_dir: Option<&PathBuf>, pretty: bool) -> Result<()> {
    match op {
        StoreOp::Read { key, default } => run_read(&key, &default, data_dir, pretty),
        StoreOp::Write { key } => run_write(&key, data_dir),
        StoreOp::Keys => run_keys(data_dir),
        StoreOp::Export { output } => run_export(output, data_dir, pretty),
        StoreOp::Import { input } => run_import(&input, data_dir),
    }
}

fn read_stdin() -> Result<String> {
    let mut buf = String::new();
    io::stdin()
        .read_to_string(&mut buf)
        .context("failed to read stdin")?;
    Ok(buf)
}

fn read_input(input: &str) -> Result<String> {
    if input == "-" {
        read_stdin()
    } else {
        std::fs::read_to_string(input).with_context(|| format!("Failed to read {input}"))
    }
}

fn run_read(key: &str, default: &str, data_dir: Option<&PathBuf>, pretty: bool) -> Result<()> {
    let default: Value = serde_json::from_str(default).context("--default is not valid JSON")?;
    let store = open_local(data_dir)?;
    let value = store.read(key, default);
    println!("{}", format_json(&value, pretty)?);
    Ok(())
}

fn run_write(key: &str, data_dir: Option<&PathBuf>) -> Result<()> {
    let value: Value = serde_json::from_str(&read_stdin()?).context("stdin is not valid JSON")?;
    let store = open_store(data_dir)?;
    store
        .write(key, &value)
        .with_context(|| format!("Failed to write key {key:?}"))
}

fn run_keys(data_dir: Option<&PathBuf>) -> Result<()> {
    let store = open_local(data_dir)?;
    for key in store.keys().context("Failed to list keys")? {
        println!("{key}");
    }
    Ok(())
}

fn run_export(output: Option<PathBuf>, data_dir: Option<&PathBuf>, pretty: bool) -> Result<()> {
    let store = open_local(data_dir)?;
    let bundle = export_all(&store).context("Failed to export store")?;
    let json = format_json(&bundle, pretty)?;
    match output {
        Some(path) => {
            std::fs::write(&path, format!("{json}\n"))
                .with_context(|| format!("Failed to write {:?}", path))?;
            eprintln!("Exported {} key(s) to {}", bundle.len(), path.display());
        }
        None => println!("{json}"),
    }
    Ok(())
}

fn run_import(input: &str, data_dir: Option<&PathBuf>) -> Result<()> {
    let bundle = parse_bundle(&read_input(input)?)?;
    let store = open_store(data_dir)?;
    let report = import_all(&store, &bundle);

    eprintln!("Imported {} key(s)", report.written.len());
    if !report.is_complete() {
        for (key, reason) in &report.failed {
            eprintln!("  {key}: {reason}");
        }
        bail!("{} key(s) could not be imported", report.failed.len());
    }
    Ok(())
}

fn parse_bundle(content: &str) -> Result<Map<String, Value>> {
    match serde_json::from_str(content).context("Import file is not valid JSON")? {
        Value::Object(map) => Ok(map),
        _ => bail!("Import file must be a JSON object mapping keys to values"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_bundle() {
        let bundle = parse_bundle(r#"{"clients": [], "settings": {"a": 1}}"#).unwrap();
        assert_eq!(bundle.len(), 2);
        assert_eq!(bundle["settings"], json!({"a": 1}));
    }

    #[test]
    fn test_parse_bundle_rejects_non_object() {
        assert!(parse_bundle("[1, 2]").is_err());
        assert!(parse_bundle("{oops").is_err());
    }

    #[test]
    fn test_read_input_missing_file() {
        let err = read_input("/nonexistent/bundle.json").unwrap_err();
        assert!(err.to_string().contains("Failed to read"));
    }
}
