use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::services::dispatch::WebhookMode;

pub const CONFIG_FILE: &str = "config.yml";

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Config {
    #[serde(default = "default_storage")]
    pub storage_folder: String,

    #[serde(default = "default_output")]
    pub output_folder: String,

    #[serde(default = "default_max_image_bytes")]
    pub max_image_bytes: u64,

    #[serde(default)]
    pub webhook: WebhookConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct WebhookConfig {
    #[serde(default)]
    pub mode: WebhookMode,
    #[serde(default = "default_proxy_prefix")]
    pub proxy_prefix: String,
    #[serde(default = "default_proxy_target")]
    pub proxy_target: String,
    #[serde(default = "default_local_port")]
    pub local_port: u16,
    #[serde(default = "default_test_segment")]
    pub test_segment: String,
    #[serde(default = "default_production_segment")]
    pub production_segment: String,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            mode: WebhookMode::default(),
            proxy_prefix: default_proxy_prefix(),
            proxy_target: default_proxy_target(),
            local_port: default_local_port(),
            test_segment: default_test_segment(),
            production_segment: default_production_segment(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            storage_folder: default_storage(),
            output_folder: default_output(),
            max_image_bytes: default_max_image_bytes(),
            webhook: WebhookConfig::default(),
        }
    }
}

fn default_storage() -> String {
    "data".to_string()
}
fn default_output() -> String {
    "output".to_string()
}
fn default_max_image_bytes() -> u64 {
    2 * 1024 * 1024
}
fn default_proxy_prefix() -> String {
    "/n8n".to_string()
}
fn default_proxy_target() -> String {
    "http://localhost:5678".to_string()
}
fn default_local_port() -> u16 {
    5678
}
fn default_test_segment() -> String {
    "/webhook-test/".to_string()
}
fn default_production_segment() -> String {
    "/webhook/".to_string()
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new(CONFIG_FILE))
    }

    /// Missing file means defaults; a file that exists must parse.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::info!("{} not found, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config: Config = serde_yaml_ng::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        let content = serde_yaml_ng::to_string(self)?;
        fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(())
    }

    pub fn ensure_directories(&self) -> Result<()> {
        fs::create_dir_all(&self.storage_folder)?;
        fs::create_dir_all(&self.output_folder)?;
        Ok(())
    }
}
