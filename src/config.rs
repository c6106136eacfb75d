use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::links;

const DEFAULT_ENV_PREFIX: &str = "GALLERY";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Config {
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub links: LinksConfig,
    #[serde(default)]
    pub ui: UIConfig,
    #[serde(default)]
    pub notifier: NotifierConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SourceConfig {
    #[serde(default)]
    pub base_url: String,
    #[serde(default = "default_manifest_path")]
    pub manifest_path: String,
    #[serde(default = "default_data_path")]
    pub data_path: String,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_timeout", with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            manifest_path: default_manifest_path(),
            data_path: default_data_path(),
            user_agent: default_user_agent(),
            timeout: default_timeout(),
        }
    }
}

fn default_manifest_path() -> String {
    crate::client::DEFAULT_MANIFEST_PATH.to_string()
}

fn default_data_path() -> String {
    crate::client::DEFAULT_DATA_PATH.to_string()
}

fn default_user_agent() -> String {
    format!("gallery-tui/{}", crate::VERSION)
}

fn default_timeout() -> Duration {
    Duration::from_secs(20)
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LinksConfig {
    #[serde(default = "default_redirect_base")]
    pub redirect_base: String,
    #[serde(default = "links::default_redirect_domains")]
    pub redirect_domains: Vec<String>,
}

impl Default for LinksConfig {
    fn default() -> Self {
        Self {
            redirect_base: default_redirect_base(),
            redirect_domains: links::default_redirect_domains(),
        }
    }
}

fn default_redirect_base() -> String {
    links::DEFAULT_REDIRECT_BASE.to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UIConfig {
    #[serde(default = "default_transition_delay", with = "humantime_serde")]
    pub transition_delay: Duration,
}

impl Default for UIConfig {
    fn default() -> Self {
        Self {
            transition_delay: default_transition_delay(),
        }
    }
}

fn default_transition_delay() -> Duration {
    Duration::from_millis(300)
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NotifierConfig {
    #[serde(default = "default_poll_interval", with = "humantime_serde")]
    pub poll_interval: Duration,
    #[serde(default = "default_background_sync")]
    pub background_sync: bool,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            poll_interval: default_poll_interval(),
            background_sync: default_background_sync(),
        }
    }
}

fn default_poll_interval() -> Duration {
    crate::notify::DEFAULT_POLL_INTERVAL
}

fn default_background_sync() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct StorageConfig {
    #[serde(default)]
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

fn default_log_level() -> String {
    "info".into()
}

#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    pub config_file: Option<PathBuf>,
    pub env_prefix: Option<String>,
}

pub fn load(options: LoadOptions) -> Result<Config> {
    let mut cfg = Config::default();

    if let Some(path) = options.config_file.as_ref() {
        if path.exists() {
            let from_file = read_config_file(path)?;
            cfg = merge_config(cfg, from_file);
        }
    } else if let Some(default_path) = default_config_path() {
        if default_path.exists() {
            let from_file = read_config_file(&default_path)?;
            cfg = merge_config(cfg, from_file);
        }
    }

    let prefix = options.env_prefix.as_deref().unwrap_or(DEFAULT_ENV_PREFIX);
    apply_env(&mut cfg, prefix);

    Ok(cfg)
}

fn read_config_file(path: &Path) -> Result<Config> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file at {}", path.display()))?;
    let config: Config = serde_yaml::from_str(&data)
        .with_context(|| format!("Failed to parse config file at {}", path.display()))?;
    Ok(config)
}

fn merge_config(mut base: Config, other: Config) -> Config {
    if !other.source.base_url.is_empty() {
        base.source.base_url = other.source.base_url;
    }
    if !other.source.manifest_path.is_empty() {
        base.source.manifest_path = other.source.manifest_path;
    }
    if !other.source.data_path.is_empty() {
        base.source.data_path = other.source.data_path;
    }
    if !other.source.user_agent.is_empty() {
        base.source.user_agent = other.source.user_agent;
    }
    if !other.source.timeout.is_zero() {
        base.source.timeout = other.source.timeout;
    }

    if !other.links.redirect_base.is_empty() {
        base.links.redirect_base = other.links.redirect_base;
    }
    base.links.redirect_domains = other.links.redirect_domains;

    base.ui.transition_delay = other.ui.transition_delay;

    if !other.notifier.poll_interval.is_zero() {
        base.notifier.poll_interval = other.notifier.poll_interval;
    }
    base.notifier.background_sync = other.notifier.background_sync;

    if other.storage.path.is_some() {
        base.storage.path = other.storage.path;
    }

    if !other.logging.level.is_empty() {
        base.logging.level = other.logging.level;
    }
    if other.logging.file.is_some() {
        base.logging.file = other.logging.file;
    }

    base
}

/// Applies `PREFIX_SECTION__KEY` overrides on top of what files provided.
fn apply_env(cfg: &mut Config, prefix: &str) {
    let mut map: HashMap<String, String> = HashMap::new();
    let upper_prefix = format!("{}_", prefix.to_uppercase());

    for (key, value) in env::vars() {
        if let Some(stripped) = key.strip_prefix(&upper_prefix) {
            let normalized = stripped.to_ascii_lowercase().replace("__", ".");
            map.insert(normalized, value);
        }
    }

    for (key, value) in map {
        apply_env_value(cfg, &key, value);
    }
}

fn apply_env_value(cfg: &mut Config, key: &str, value: String) {
    match key {
        "source.base_url" => cfg.source.base_url = value,
        "source.manifest_path" => cfg.source.manifest_path = value,
        "source.data_path" => cfg.source.data_path = value,
        "source.user_agent" => cfg.source.user_agent = value,
        "source.timeout" => {
            if let Ok(duration) = humantime::parse_duration(&value) {
                cfg.source.timeout = duration;
            }
        }
        "links.redirect_base" => cfg.links.redirect_base = value,
        "links.redirect_domains" => {
            cfg.links.redirect_domains = value
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }
        "ui.transition_delay" => {
            if let Ok(duration) = humantime::parse_duration(&value) {
                cfg.ui.transition_delay = duration;
            }
        }
        "notifier.poll_interval" => {
            if let Ok(duration) = humantime::parse_duration(&value) {
                cfg.notifier.poll_interval = duration;
            }
        }
        "notifier.background_sync" => {
            cfg.notifier.background_sync =
                matches!(value.as_str(), "1" | "true" | "TRUE" | "True");
        }
        "storage.path" => cfg.storage.path = Some(PathBuf::from(value)),
        "logging.level" => cfg.logging.level = value,
        "logging.file" => cfg.logging.file = Some(PathBuf::from(value)),
        _ => {}
    }
}

pub fn default_path() -> Option<PathBuf> {
    default_config_path()
}

fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("gallery-tui").join("config.yaml"))
}
