use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use collabsync_store::Store;
use serde::{Deserialize, Serialize};

const CONFIG_FILE_NAME: &str = "config.toml";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CliConfig {
    #[serde(default)]
    pub remote: RemoteConfig,
    #[serde(default)]
    pub store: StoreConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RemoteConfig {
    #[serde(default)]
    pub base_url: String,
    #[serde(default)]
    pub token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StoreConfig {
    /// Empty means the default, `~/.local/share/collabsync/mirror.db`.
    #[serde(default)]
    pub db_path: String,
}

/// Config directory, `~/.config/collabsync/`.
pub fn config_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .context("Could not determine home directory")?;
    Ok(PathBuf::from(home).join(".config").join("collabsync"))
}

pub fn config_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load config from disk, returning defaults when no file exists yet.
pub fn load_config() -> Result<CliConfig> {
    let path = config_path()?;
    if !path.exists() {
        return Ok(CliConfig::default());
    }
    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read config at {}", path.display()))?;
    toml::from_str(&content)
        .with_context(|| format!("Failed to parse config at {}", path.display()))
}

pub fn save_config(config: &CliConfig) -> Result<()> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create config dir at {}", dir.display()))?;
    let content = toml::to_string_pretty(config).context("Failed to serialize config")?;
    let path = config_path()?;
    std::fs::write(&path, content)
        .with_context(|| format!("Failed to write config at {}", path.display()))?;
    Ok(())
}

/// Open the store at the explicit override, the configured path, or the
/// default location, in that order.
pub fn open_store(db_override: Option<&Path>) -> Result<Store> {
    if let Some(path) = db_override {
        return Store::open_path(path);
    }
    let config = load_config()?;
    if config.store.db_path.trim().is_empty() {
        Store::open()
    } else {
        Store::open_path(Path::new(&config.store.db_path))
    }
}

/// Print current config.
pub fn show_config() -> Result<()> {
    let config = load_config()?;
    let path = config_path()?;
    println!("Config file: {}", path.display());
    println!();
    println!("[remote]");
    println!(
        "  base_url = {}",
        if config.remote.base_url.is_empty() {
            "(not set)"
        } else {
            &config.remote.base_url
        }
    );
    println!(
        "  token    = {}",
        if config.remote.token.is_empty() {
            "(not set)".to_string()
        } else {
            format!("{}...", token_preview(&config.remote.token))
        }
    );
    println!();
    println!("[store]");
    println!(
        "  db_path  = {}",
        if config.store.db_path.is_empty() {
            "(default)"
        } else {
            &config.store.db_path
        }
    );
    Ok(())
}

/// First few characters of the token, safe on any UTF-8 content.
fn token_preview(token: &str) -> String {
    token.chars().take(8).collect()
}

/// Update config with the provided values.
pub fn set_config(
    base_url: Option<String>,
    token: Option<String>,
    db_path: Option<String>,
) -> Result<()> {
    let mut config = load_config()?;
    if let Some(url) = base_url {
        config.remote.base_url = url;
    }
    if let Some(token) = token {
        config.remote.token = token;
    }
    if let Some(db_path) = db_path {
        config.store.db_path = db_path;
    }
    save_config(&config)?;
    println!("Configuration updated.");
    show_config()
}
