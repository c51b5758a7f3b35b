use std::path::Path;

use anyhow::Context;
use clap::Subcommand;
use draftline_core::DraftlineConfig;

use crate::workspace::Workspace;

// ── CLI Schema ──

#[derive(Subcommand)]
pub enum ConfigCmd {
    /// Set a config value
    Set {
        /// Config key (e.g. debounce_ms)
        key: String,
        /// Config value (number or string)
        value: String,
    },
    /// Get a config value
    Get {
        /// Config key
        key: String,
    },
    /// List effective config values
    List,
}

// ── Dispatch ──

pub fn run(cmd: ConfigCmd, ws: &Workspace) -> anyhow::Result<()> {
    let path = ws.config_path();
    match cmd {
        ConfigCmd::Set { key, value } => set(&path, &key, &value),
        ConfigCmd::Get { key } => get(&path, &key),
        ConfigCmd::List => list(&path),
    }
}

// ── Command Implementations ──

type ConfigMap = serde_json::Map<String, serde_json::Value>;

/// Read the raw config file. Returns an empty map if it doesn't exist.
fn read_config(path: &Path) -> anyhow::Result<ConfigMap> {
    if !path.exists() {
        return Ok(ConfigMap::new());
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    let val: serde_json::Value = serde_json::from_str(&content)
        .with_context(|| format!("parsing {}", path.display()))?;
    match val {
        serde_json::Value::Object(map) => Ok(map),
        _ => Ok(ConfigMap::new()),
    }
}

fn write_config(path: &Path, config: &ConfigMap) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(config)?;
    draftline_store::write_atomic(path, json.as_bytes())
        .with_context(|| format!("writing {}", path.display()))
}

/// Parse a string value into a JSON number when it looks like one.
fn parse_value(s: &str) -> serde_json::Value {
    match s.parse::<u64>() {
        Ok(n) => serde_json::Value::Number(n.into()),
        Err(_) => serde_json::Value::String(s.to_string()),
    }
}

fn check_key(key: &str) -> anyhow::Result<()> {
    if !DraftlineConfig::KEYS.contains(&key) {
        anyhow::bail!(
            "unknown config key {key:?} (expected one of: {})",
            DraftlineConfig::KEYS.join(", ")
        );
    }
    Ok(())
}

/// Settings with defaults filled in, as a JSON map.
fn effective(config: &ConfigMap) -> anyhow::Result<ConfigMap> {
    let parsed: DraftlineConfig = serde_json::from_value(serde_json::Value::Object(config.clone()))?;
    match serde_json::to_value(parsed)? {
        serde_json::Value::Object(map) => Ok(map),
        _ => Ok(ConfigMap::new()),
    }
}

/// `draftline config set <key> <value>`
pub fn set(path: &Path, key: &str, value: &str) -> anyhow::Result<()> {
    check_key(key)?;
    let mut config = read_config(path)?;
    config.insert(key.to_string(), parse_value(value));
    effective(&config).with_context(|| format!("invalid value for {key}: {value}"))?;
    write_config(path, &config)?;
    println!("{key} = {value}");
    Ok(())
}

/// `draftline config get <key>`
pub fn get(path: &Path, key: &str) -> anyhow::Result<()> {
    check_key(key)?;
    let config = effective(&read_config(path)?)?;
    match config.get(key) {
        Some(val) => println!("{val}"),
        None => println!("(not set)"),
    }
    Ok(())
}

/// `draftline config list`
pub fn list(path: &Path) -> anyhow::Result<()> {
    let config = effective(&read_config(path)?)?;
    for key in DraftlineConfig::KEYS {
        match config.get(*key) {
            Some(val) => println!("{key} = {val}"),
            None => println!("{key} = (not set)"),
        }
    }
    Ok(())
}
