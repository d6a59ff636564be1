// src/config.rs

//! Configuration loading utilities.
//!
//! This module loads the TOML configuration, applies environment overrides
//! and validates the result before any component sees it.

use std::path::Path;

use crate::error::Result;
use crate::models::Config;

/// Environment variable holding the API token.
pub const TOKEN_ENV: &str = "GITHUB_TOKEN";

/// Load configuration from a TOML file.
///
/// Falls back to defaults if the file does not exist; a file that exists but
/// does not parse is an error.
pub fn load_config(path: &Path) -> Result<Config> {
    let mut config = if path.exists() {
        Config::load(path)?
    } else {
        log::warn!(
            "Config file {} not found, using default configuration",
            path.display()
        );
        Config::default()
    };

    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    Ok(config)
}

/// Load, apply overrides and validate.
pub fn load_validated(path: &Path) -> Result<Config> {
    let config = load_config(path)?;
    config.validate()?;
    Ok(config)
}

/// Apply overrides from an environment lookup.
pub fn apply_env_overrides<F>(config: &mut Config, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(token) = lookup(TOKEN_ENV).filter(|t| !t.trim().is_empty()) {
        config.github.token = Some(token);
    }
}
