//! Configuration management for treescan
//!
//! Settings are layered with figment, lowest priority first:
//! 1. embedded `default-config.toml`
//! 2. user config (`~/.config/treescan/config.toml`) and repository config
//!    (`treescan.{toml,json,yaml,yml}`), or a single custom file when given
//! 3. `TREESCAN_*` environment variables

use crate::error::Result;
use crate::parallel;
use figment::{
    Figment,
    providers::{Env, Format, Json, Toml, Yaml},
};
use serde::{Deserialize, Serialize};
use std::path::Path;

// Embed the default config at compile time
const DEFAULT_CONFIG: &str = include_str!("../../default-config.toml");

/// Scan settings that can come from configuration files
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// String prepended to every emitted path
    pub root_prefix: String,

    /// Emit matching files
    pub return_files: bool,

    /// Emit matching directories
    pub return_directories: bool,

    /// Absolute worker limit (0 = no limit)
    pub max_threads: usize,

    /// Percentage of CPU cores to use (1-100)
    pub thread_percentage: u8,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            root_prefix: String::new(),
            return_files: true,
            return_directories: false,
            max_threads: 0,
            thread_percentage: 100,
        }
    }
}

impl ScanConfig {
    pub fn load() -> Result<Self> {
        Self::load_with_custom_config(None)
    }

    pub fn load_with_custom_config(custom_config: Option<&str>) -> Result<Self> {
        Ok(Self::figment(custom_config).extract()?)
    }

    /// The layered figment, before extraction
    pub fn figment(custom_config: Option<&str>) -> Figment {
        let mut figment = Figment::new().merge(Toml::string(DEFAULT_CONFIG));

        if let Some(custom_path) = custom_config {
            // If custom config is specified, use only that + defaults + env vars
            figment = merge_file(figment, custom_path);
        } else {
            let user_config = Self::user_config_path();
            figment = merge_file(figment, &user_config)
                .merge(Toml::file("treescan.toml"))
                .merge(Json::file("treescan.json"))
                .merge(Yaml::file("treescan.yaml"))
                .merge(Yaml::file("treescan.yml"));
        }

        // Environment variables always have highest priority
        figment.merge(Env::prefixed("TREESCAN_"))
    }

    /// Worker cap derived from the configured limits
    pub fn max_workers(&self) -> usize {
        parallel::max_workers(self.max_threads, self.thread_percentage)
    }

    fn user_config_path() -> String {
        match std::env::var("HOME") {
            Ok(home) => format!("{home}/.config/treescan/config.toml"),
            Err(_) => "~/.config/treescan/config.toml".to_string(),
        }
    }
}

fn merge_file(figment: Figment, path: &str) -> Figment {
    match Path::new(path).extension().and_then(|ext| ext.to_str()) {
        Some("json") => figment.merge(Json::file(path)),
        Some("yaml" | "yml") => figment.merge(Yaml::file(path)),
        _ => figment.merge(Toml::file(path)),
    }
}
