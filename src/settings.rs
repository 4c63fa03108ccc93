use std::path::PathBuf;

use anyhow::{Context, Result};
use config::{Config, Environment};
use serde::Deserialize;

/// Sent with every request unless a user agent is configured.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Values picked up from the environment (`OBSIDIAN_PATH`, `USER_AGENT`).
#[derive(Debug, Default, Clone, Deserialize)]
pub struct Settings {
    pub obsidian_path: Option<PathBuf>,
    pub user_agent: Option<String>,
}

impl Settings {
    pub fn load() -> Result<Self> {
        Self::from_source(Environment::default())
    }

    fn from_source(env: Environment) -> Result<Self> {
        Config::builder()
            .add_source(env)
            .build()
            .context("Failed to read settings from environment")?
            .try_deserialize()
            .context("Invalid settings in environment")
    }

    /// Explicit value first, then the environment, then the built-in default.
    pub fn resolve_user_agent(&self, explicit: Option<String>) -> String {
        explicit
            .or_else(|| self.user_agent.clone())
            .filter(|ua| !ua.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string())
    }

    /// Explicit value first, then `OBSIDIAN_PATH`. `None` means ask the user.
    pub fn resolve_output_dir(&self, explicit: Option<PathBuf>) -> Option<PathBuf> {
        explicit
            .or_else(|| self.obsidian_path.clone())
            .filter(|p| !p.as_os_str().is_empty())
    }
}
