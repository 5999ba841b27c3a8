use crate::{format_json, open_local};
use anyhow::{Context, Result, bail};
use clap::Subcommand;
use serde_json::{Value, json};
use std::path::PathBuf;
use worklog_store::{MirrorConfig, RemoteMirror, SETTINGS_KEY, Store};

#[derive(Subcommand, Debug)]
pub enum MirrorOp {
    /// Show whether a remote mirror is configured
    Status,
    /// Pull every row of a remote table
    Fetch {
        /// Remote table name
        table: String,
    },
    /// Upsert the rows stored under a local key into the table of the same name
    Push {
        /// Store key holding an array of records
        key: String,
    },
}

pub fn run(op: MirrorOp, data_dir: Option<&PathBuf>, pretty: bool) -> Result<()> {
    let store = open_local(data_dir)?;
    match op {
        MirrorOp::Status => run_status(&store, pretty),
        MirrorOp::Fetch { table } => run_fetch(&store, &table, pretty),
        MirrorOp::Push { key } => run_push(&store, &key),
    }
}

fn status(store: &dyn Store) -> Value {
    let settings = store.read(SETTINGS_KEY, json!({}));
    match MirrorConfig::from_settings(&settings) {
        Some(config) => json!({ "configured": true, "url": config.url }),
        None => json!({ "configured": false }),
    }
}

fn run_status(store: &dyn Store, pretty: bool) -> Result<()> {
    println!("{}", format_json(&status(store), pretty)?);
    Ok(())
}

fn enabled_mirror(store: &dyn Store) -> Result<RemoteMirror> {
    let mirror = RemoteMirror::init(store);
    if !mirror.is_enabled() {
        bail!(
            "Remote mirror is not configured; set {}.url and {}.key in the {SETTINGS_KEY:?} key",
            MirrorConfig::SETTINGS_FIELD,
            MirrorConfig::SETTINGS_FIELD
        );
    }
    Ok(mirror)
}

fn run_fetch(store: &dyn Store, table: &str, pretty: bool) -> Result<()> {
    let mirror = enabled_mirror(store)?;
    let rows = mirror
        .fetch_table(table)
        .with_context(|| format!("Failed to fetch table {table:?}"))?;
    println!("{}", format_json(&rows, pretty)?);
    Ok(())
}

fn run_push(store: &dyn Store, key: &str) -> Result<()> {
    let mirror = enabled_mirror(store)?;
    let rows = match store.read(key, json!([])) {
        Value::Array(rows) => rows,
        _ => bail!("Key {key:?} does not hold an array of records"),
    };
    mirror
        .try_sync_table(key, &rows)
        .with_context(|| format!("Failed to push {key:?}"))?;
    eprintln!("Pushed {} row(s) to {key}", rows.len());
    Ok(())
}
