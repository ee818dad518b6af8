use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{bail, Context, Result};
use client_core::{normalize_base_url, SessionConfig, ADD_MODE_TIMEOUT};
use serde::Deserialize;

const CONFIG_DIR_NAME: &str = "inventory-scanner";
const CONFIG_FILE_NAME: &str = "scanner.toml";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub backend_url: Option<String>,
    pub add_mode_timeout_secs: u64,
    pub request_timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            backend_url: None,
            add_mode_timeout_secs: ADD_MODE_TIMEOUT.as_secs(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

impl Settings {
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            add_mode_timeout: Duration::from_secs(self.add_mode_timeout_secs),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            ..SessionConfig::default()
        }
    }
}

/// Values given on the command line; these win over file and environment.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub backend_url: Option<String>,
    pub add_mode_timeout_secs: Option<u64>,
    pub request_timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct FileSettings {
    backend_url: Option<String>,
    add_mode_timeout_secs: Option<u64>,
    request_timeout_secs: Option<u64>,
}

pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
}

/// Resolves settings from defaults, the TOML file, `SCANNER_*` environment
/// variables and command-line overrides, in that order.
pub fn load_settings(explicit_path: Option<&Path>, overrides: &Overrides) -> Result<Settings> {
    let mut settings = Settings::default();

    match explicit_path {
        Some(path) => {
            let raw = fs::read_to_string(path)
                .with_context(|| format!("failed to read config file '{}'", path.display()))?;
            apply_file(&mut settings, &raw)
                .with_context(|| format!("invalid config file '{}'", path.display()))?;
        }
        None => {
            if let Some(path) = default_config_path() {
                if let Ok(raw) = fs::read_to_string(&path) {
                    apply_file(&mut settings, &raw)
                        .with_context(|| format!("invalid config file '{}'", path.display()))?;
                }
            }
        }
    }

    apply_env(&mut settings, |key| std::env::var(key).ok())?;
    apply_overrides(&mut settings, overrides);
    validate(&mut settings)?;
    Ok(settings)
}

fn apply_file(settings: &mut Settings, raw: &str) -> Result<()> {
    let file_cfg: FileSettings = toml::from_str(raw)?;
    if let Some(v) = file_cfg.backend_url {
        settings.backend_url = Some(v);
    }
    if let Some(v) = file_cfg.add_mode_timeout_secs {
        settings.add_mode_timeout_secs = v;
    }
    if let Some(v) = file_cfg.request_timeout_secs {
        settings.request_timeout_secs = v;
    }
    Ok(())
}

fn apply_env<F>(settings: &mut Settings, lookup: F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(v) = lookup("SCANNER_BACKEND_URL") {
        settings.backend_url = Some(v);
    }
    if let Some(v) = lookup("SCANNER_ADD_TIMEOUT_SECS") {
        settings.add_mode_timeout_secs = v
            .trim()
            .parse()
            .with_context(|| format!("SCANNER_ADD_TIMEOUT_SECS is not a number: '{v}'"))?;
    }
    if let Some(v) = lookup("SCANNER_REQUEST_TIMEOUT_SECS") {
        settings.request_timeout_secs = v
            .trim()
            .parse()
            .with_context(|| format!("SCANNER_REQUEST_TIMEOUT_SECS is not a number: '{v}'"))?;
    }
    Ok(())
}

fn apply_overrides(settings: &mut Settings, overrides: &Overrides) {
    if let Some(v) = &overrides.backend_url {
        settings.backend_url = Some(v.clone());
    }
    if let Some(v) = overrides.add_mode_timeout_secs {
        settings.add_mode_timeout_secs = v;
    }
    if let Some(v) = overrides.request_timeout_secs {
        settings.request_timeout_secs = v;
    }
}

fn validate(settings: &mut Settings) -> Result<()> {
    // A blank URL anywhere in the chain means "not configured".
    settings.backend_url = settings
        .backend_url
        .take()
        .map(|url| url.trim().to_string())
        .filter(|url| !url.is_empty());

    if let Some(url) = &settings.backend_url {
        normalize_base_url(url)?;
    }
    if settings.add_mode_timeout_secs == 0 {
        bail!("add mode timeout must be at least one second");
    }
    if settings.request_timeout_secs == 0 {
        bail!("request timeout must be at least one second");
    }
    Ok(())
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
