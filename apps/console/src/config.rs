use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, Result};
use console_core::{ConfigKey, MemoryConfigStore};
use engine_client::{DispatchConfig, WriterTimeouts};
use serde::Deserialize;
use serde_json::{json, Value};
use shared::{
    domain::ColourEntry,
    protocol::{PayloadTemplate, WireContract, WireFormat, DEFAULT_COLOUR_POINTER},
};

const CONFIG_FILE: &str = "console.toml";
const CONFIG_DIR: &str = "colour-console";

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LayerSetting {
    pub column: String,
    pub target: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub webserver_ip: String,
    pub webserver_port: u16,
    pub wire_contract: WireContract,
    pub workers: usize,
    pub queue_capacity: usize,
    pub connect_timeout_ms: u64,
    pub read_timeout_ms: u64,
    pub heartbeat_interval_ms: u64,
    pub heartbeat_timeout_ms: u64,
    pub colour_pointer: String,
    pub payload_template: Option<PathBuf>,
    pub colours: Vec<ColourEntry>,
    pub layers: Vec<LayerSetting>,
}

impl Default for Settings {
    fn default() -> Self {
        let colours = [
            ("1 - Red", "#FF0000"),
            ("2 - Blue", "#0000FF"),
            ("3 - Yellow", "#FFFF00"),
            ("4 - Orange", "#FFA500"),
            ("5 - Green", "#00B050"),
            ("6 - Purple", "#800080"),
            ("7 - Pink", "#FF69B4"),
            ("8 - White", "#FFFFFF"),
        ]
        .into_iter()
        .map(|(label, hex)| ColourEntry {
            label: label.into(),
            hex: hex.into(),
        })
        .collect();
        let layers = [
            ("ALL", json!("aggregate")),
            ("Outer", json!(3)),
            ("Middle", json!(2)),
            ("Inner", json!(1)),
            ("DJ", json!(4)),
        ]
        .into_iter()
        .map(|(column, target)| LayerSetting {
            column: column.into(),
            target,
        })
        .collect();

        Self {
            webserver_ip: "localhost".into(),
            webserver_port: 8080,
            wire_contract: WireContract::ColourWrite,
            workers: engine_client::dispatch::DEFAULT_WORKERS,
            queue_capacity: engine_client::dispatch::DEFAULT_QUEUE_CAPACITY,
            connect_timeout_ms: 50,
            read_timeout_ms: 200,
            heartbeat_interval_ms: 3000,
            heartbeat_timeout_ms: 2000,
            colour_pointer: DEFAULT_COLOUR_POINTER.into(),
            payload_template: None,
            colours,
            layers,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct FileSettings {
    webserver_ip: Option<String>,
    webserver_port: Option<u16>,
    wire_contract: Option<String>,
    workers: Option<usize>,
    queue_capacity: Option<usize>,
    connect_timeout_ms: Option<u64>,
    read_timeout_ms: Option<u64>,
    heartbeat_interval_ms: Option<u64>,
    heartbeat_timeout_ms: Option<u64>,
    colour_pointer: Option<String>,
    payload_template: Option<PathBuf>,
    colours: Option<Vec<ColourEntry>>,
    layers: Option<Vec<LayerSetting>>,
}

impl Settings {
    pub fn writer_timeouts(&self) -> WriterTimeouts {
        WriterTimeouts {
            connect: Duration::from_millis(self.connect_timeout_ms),
            read: Duration::from_millis(self.read_timeout_ms),
        }
    }

    pub fn dispatch_config(&self) -> DispatchConfig {
        DispatchConfig {
            workers: self.workers,
            queue_capacity: self.queue_capacity,
        }
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    pub fn heartbeat_timeout(&self) -> Duration {
        Duration::from_millis(self.heartbeat_timeout_ms)
    }

    pub fn wire_format(&self) -> Result<WireFormat> {
        let template = match &self.payload_template {
            Some(path) => {
                let raw = fs::read_to_string(path).with_context(|| {
                    format!("failed to read payload template '{}'", path.display())
                })?;
                let document: Value = serde_json::from_str(&raw).with_context(|| {
                    format!("payload template '{}' is not valid JSON", path.display())
                })?;
                PayloadTemplate::new(document, self.colour_pointer.clone())?
            }
            None if self.colour_pointer == DEFAULT_COLOUR_POINTER => PayloadTemplate::default(),
            None => PayloadTemplate::new(
                PayloadTemplate::default().render("#FFFFFF"),
                self.colour_pointer.clone(),
            )?,
        };
        Ok(WireFormat::new(self.wire_contract, template))
    }

    /// Runtime store seeded with the catalog, layer map and engine address.
    pub fn seed_store(&self) -> MemoryConfigStore {
        let layers = self
            .layers
            .iter()
            .map(|layer| json!({ "column": layer.column, "target": layer.target }))
            .collect::<Vec<_>>();
        MemoryConfigStore::new()
            .with_value(
                ConfigKey::ColourSet,
                serde_json::to_value(&self.colours).unwrap_or(Value::Array(Vec::new())),
            )
            .with_value(ConfigKey::LayerMap, Value::Array(layers))
            .with_value(ConfigKey::WebserverIp, json!(self.webserver_ip))
            .with_value(ConfigKey::WebserverPort, json!(self.webserver_port))
    }

    fn apply_file(&mut self, file: FileSettings) -> Result<()> {
        if let Some(v) = file.webserver_ip {
            self.webserver_ip = v;
        }
        if let Some(v) = file.webserver_port {
            self.webserver_port = v;
        }
        if let Some(v) = file.wire_contract {
            self.wire_contract = v.parse()?;
        }
        if let Some(v) = file.workers {
            self.workers = v;
        }
        if let Some(v) = file.queue_capacity {
            self.queue_capacity = v;
        }
        if let Some(v) = file.connect_timeout_ms {
            self.connect_timeout_ms = v;
        }
        if let Some(v) = file.read_timeout_ms {
            self.read_timeout_ms = v;
        }
        if let Some(v) = file.heartbeat_interval_ms {
            self.heartbeat_interval_ms = v;
        }
        if let Some(v) = file.heartbeat_timeout_ms {
            self.heartbeat_timeout_ms = v;
        }
        if let Some(v) = file.colour_pointer {
            self.colour_pointer = v;
        }
        if file.payload_template.is_some() {
            self.payload_template = file.payload_template;
        }
        if let Some(v) = file.colours {
            self.colours = v;
        }
        if let Some(v) = file.layers {
            self.layers = v;
        }
        Ok(())
    }

    fn apply_env(&mut self, env: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(v) = env("APP__WEBSERVER_IP") {
            self.webserver_ip = v;
        }
        if let Some(v) = env("APP__WEBSERVER_PORT") {
            self.webserver_port = v
                .parse()
                .with_context(|| format!("APP__WEBSERVER_PORT '{v}' is not a port"))?;
        }
        if let Some(v) = env("APP__WIRE_CONTRACT") {
            self.wire_contract = v.parse()?;
        }
        if let Some(v) = env("APP__PAYLOAD_TEMPLATE") {
            self.payload_template = Some(PathBuf::from(v));
        }
        if let Some(v) = env("APP__WORKERS").and_then(|v| v.parse().ok()) {
            self.workers = v;
        }
        if let Some(v) = env("APP__QUEUE_CAPACITY").and_then(|v| v.parse().ok()) {
            self.queue_capacity = v;
        }
        if let Some(v) = env("APP__CONNECT_TIMEOUT_MS").and_then(|v| v.parse().ok()) {
            self.connect_timeout_ms = v;
        }
        if let Some(v) = env("APP__READ_TIMEOUT_MS").and_then(|v| v.parse().ok()) {
            self.read_timeout_ms = v;
        }
        if let Some(v) = env("APP__HEARTBEAT_INTERVAL_MS").and_then(|v| v.parse().ok()) {
            self.heartbeat_interval_ms = v;
        }
        if let Some(v) = env("APP__HEARTBEAT_TIMEOUT_MS").and_then(|v| v.parse().ok()) {
            self.heartbeat_timeout_ms = v;
        }
        Ok(())
    }
}

pub fn load_settings(explicit: Option<&Path>) -> Result<Settings> {
    load_settings_with(explicit, default_config_path(), |key| std::env::var(key).ok())
}

fn load_settings_with(
    explicit: Option<&Path>,
    fallback: Option<PathBuf>,
    env: impl Fn(&str) -> Option<String>,
) -> Result<Settings> {
    let mut settings = Settings::default();

    match explicit {
        Some(path) => settings.apply_file(read_file_settings(path)?)?,
        None => {
            if let Some(path) = fallback.filter(|path| path.exists()) {
                settings.apply_file(read_file_settings(&path)?)?;
            }
        }
    }

    settings.apply_env(env)?;
    Ok(settings)
}

fn read_file_settings(path: &Path) -> Result<FileSettings> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read settings '{}'", path.display()))?;
    toml::from_str(&raw).with_context(|| format!("invalid settings file '{}'", path.display()))
}

fn default_config_path() -> Option<PathBuf> {
    let local = PathBuf::from(CONFIG_FILE);
    if local.exists() {
        return Some(local);
    }
    dirs::config_dir().map(|dir| dir.join(CONFIG_DIR).join(CONFIG_FILE))
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
