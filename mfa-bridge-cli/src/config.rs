//! Configuration loading and parsing
//!
//! Connection settings come from a TOML file and/or command-line flags
//! (flags win). Custom mapping profiles are TOML files with the same
//! shape as the built-in profiles and are simply appended to the
//! selection list.

use anyhow::{Context, Result};
use mfa_bridge::Profile;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Main application configuration (loaded from config.toml)
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub connection: ConnectionConfig,
    /// Extra profile files to load besides the built-ins
    #[serde(default)]
    pub profiles: Vec<PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ConnectionConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub api_key: Option<String>,
    /// Serial device path; empty means autodetect
    pub serial_port: Option<String>,
}

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;
    let config: AppConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;
    Ok(config)
}

/// Load one mapping profile from a TOML file
pub fn load_profile(path: &Path) -> Result<Profile> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read profile file: {:?}", path))?;
    let profile: Profile = toml::from_str(&content)
        .with_context(|| format!("Failed to parse profile file: {:?}", path))?;
    if profile.mappings.is_empty() {
        log::warn!("Profile '{}' has no mappings", profile.name);
    }
    Ok(profile)
}

/// Locate the simulator API key.
///
/// Precedence: explicit value, `MFA_BRIDGE_API_KEY` environment variable,
/// then the key file the simulator writes next to its saved config.
pub fn find_api_key(explicit: Option<&str>) -> Option<String> {
    if let Some(key) = explicit {
        return Some(key.to_string());
    }
    if let Ok(key) = std::env::var("MFA_BRIDGE_API_KEY") {
        if !key.trim().is_empty() {
            return Some(key.trim().to_string());
        }
    }
    for base in [std::env::var("USERPROFILE"), std::env::var("HOME")]
        .into_iter()
        .flatten()
    {
        let candidate = PathBuf::from(base)
            .join("Documents")
            .join("My Games")
            .join("TrainSimWorld6")
            .join("Saved")
            .join("Config")
            .join("CommAPIKey.txt");
        if let Ok(key) = fs::read_to_string(&candidate) {
            let key = key.trim();
            if !key.is_empty() {
                log::info!("API key found at {:?}", candidate);
                return Some(key.to_string());
            }
        }
    }
    None
}
