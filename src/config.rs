use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
  #[serde(default)]
  pub endpoint: EndpointConfig,
  #[serde(default)]
  pub cache: CacheConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EndpointConfig {
  /// Base URL that relative hrefs are resolved against
  pub base_url: Option<String>,
  /// Transport timeout for a single request
  pub timeout_secs: u64,
  /// Accept header sent with every request
  pub accept: String,
}

impl Default for EndpointConfig {
  fn default() -> Self {
    Self {
      base_url: None,
      timeout_secs: 30,
      accept: "application/vnd.siren+json, application/json".to_string(),
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
  /// Let concurrent cached reads of one address share a single request
  pub coalesce_reads: bool,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      coalesce_reads: true,
    }
  }
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./siren-cache.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/siren-cache/config.yaml
  ///
  /// Falls back to defaults when no file is found and none was requested.
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    match path {
      Some(p) => Self::load_from_path(&p),
      None => Ok(Self::default()),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("siren-cache.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("siren-cache").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::parse(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  fn parse(contents: &str) -> std::result::Result<Self, serde_yaml::Error> {
    // An empty file is a valid, all-defaults config
    if contents.trim().is_empty() {
      return Ok(Self::default());
    }
    serde_yaml::from_str(contents)
  }

  /// Get the bearer credential from environment variables.
  ///
  /// Checks SIREN_CACHE_TOKEN first, then SIREN_TOKEN as fallback.
  /// `None` means anonymous access.
  pub fn get_token() -> Option<String> {
    std::env::var("SIREN_CACHE_TOKEN")
      .or_else(|_| std::env::var("SIREN_TOKEN"))
      .ok()
      .filter(|t| !t.is_empty())
  }
}
