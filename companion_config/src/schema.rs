use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq, Eq)]
pub struct Config {
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub reveal: RevealConfig,
    #[serde(default)]
    pub export: ExportConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    #[serde(default = "ServiceConfig::default_base_url")]
    pub base_url: String,
    #[serde(default = "ServiceConfig::default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            base_url: Self::default_base_url(),
            timeout_secs: Self::default_timeout_secs(),
        }
    }
}

impl ServiceConfig {
    fn default_base_url() -> String {
        "http://127.0.0.1:5000".to_string()
    }

    const fn default_timeout_secs() -> u64 {
        30
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq, Eq)]
pub struct StorageConfig {
    /// Directory holding the persisted session records.
    /// Defaults to `~/companion/state`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct RevealConfig {
    /// Delay between two revealed characters, in milliseconds.
    #[serde(default = "RevealConfig::default_tick_ms")]
    pub tick_ms: u64,
}

impl Default for RevealConfig {
    fn default() -> Self {
        Self {
            tick_ms: Self::default_tick_ms(),
        }
    }
}

impl RevealConfig {
    const fn default_tick_ms() -> u64 {
        15
    }
}

/// Layout of exported documents. Vertical values are in PDF points.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct ExportConfig {
    #[serde(default = "ExportConfig::default_line_width")]
    pub line_width: usize,
    #[serde(default = "ExportConfig::default_page_height")]
    pub page_height: u32,
    #[serde(default = "ExportConfig::default_margin")]
    pub margin: u32,
    #[serde(default = "ExportConfig::default_line_height")]
    pub line_height: u32,
    #[serde(default = "ExportConfig::default_block_gap")]
    pub block_gap: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<PathBuf>,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            line_width: Self::default_line_width(),
            page_height: Self::default_page_height(),
            margin: Self::default_margin(),
            line_height: Self::default_line_height(),
            block_gap: Self::default_block_gap(),
            output_dir: None,
        }
    }
}

impl ExportConfig {
    const fn default_line_width() -> usize {
        90
    }

    // A4 portrait
    const fn default_page_height() -> u32 {
        842
    }

    const fn default_margin() -> u32 {
        40
    }

    const fn default_line_height() -> u32 {
        14
    }

    const fn default_block_gap() -> u32 {
        10
    }
}

const CONFIG_TEMPLATE: &str = r#"{
  "service": {
    "base_url": "http://127.0.0.1:5000",
    "timeout_secs": 30
  },
  "storage": {},
  "reveal": {
    "tick_ms": 15
  },
  "export": {
    "line_width": 90,
    "page_height": 842,
    "margin": 40,
    "line_height": 14,
    "block_gap": 10
  }
}"#;

impl Config {
    pub fn config_dir() -> anyhow::Result<PathBuf> {
        Ok(dirs::home_dir()
            .ok_or_else(|| anyhow::anyhow!("Cannot find home directory"))?
            .join("companion"))
    }

    pub fn load() -> anyhow::Result<Self> {
        let config_path = Self::config_dir()?.join("config.json");

        if !config_path.exists() {
            anyhow::bail!(
                "Config file not found at: {}. Please run 'companion init' to create config.",
                config_path.display()
            );
        }

        Self::load_from(&config_path)
    }

    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Like [`Config::load`], but a missing or unreadable file yields defaults.
    #[must_use]
    pub fn load_or_default() -> Self {
        match Self::load() {
            Ok(config) => config,
            Err(e) => {
                warn!("Using default configuration: {e}");
                Self::default()
            }
        }
    }

    pub fn ensure_config_dir() -> anyhow::Result<PathBuf> {
        let config_dir = Self::config_dir()?;
        std::fs::create_dir_all(&config_dir)?;
        Ok(config_dir)
    }

    pub fn create_config() -> anyhow::Result<PathBuf> {
        let config_dir = Self::ensure_config_dir()?;
        let config_path = config_dir.join("config.json");
        Self::write_template(&config_path)?;
        Ok(config_path)
    }

    fn write_template(config_path: &Path) -> anyhow::Result<()> {
        if config_path.exists() {
            anyhow::bail!(
                "Config file already exists at: {}. Please edit it directly.",
                config_path.display()
            );
        }

        std::fs::write(config_path, CONFIG_TEMPLATE)?;
        info!("Created config file at: {}", config_path.display());
        Ok(())
    }

    /// Directory for the persisted session records.
    pub fn state_dir(&self) -> anyhow::Result<PathBuf> {
        match &self.storage.dir {
            Some(dir) => Ok(dir.clone()),
            None => Ok(Self::config_dir()?.join("state")),
        }
    }

    /// Directory exports are written to; the current directory unless set.
    #[must_use]
    pub fn export_dir(&self) -> PathBuf {
        self.export
            .output_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from("."))
    }
}
