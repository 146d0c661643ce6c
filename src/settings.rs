use std::path::{Path, PathBuf};

use chrono::format::{Item, StrftimeItems};
use serde::{Deserialize, Serialize};

use crate::categorizer::{load_ruleset, Ruleset};
use crate::error::{ConfigError, Result};
use crate::importer::{ParseOptions, ValidationPolicy, DEFAULT_CURRENCY_SYMBOLS, DEFAULT_DATE_FORMATS};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_date_formats")]
    pub date_formats: Vec<String>,
    #[serde(default)]
    pub policy: ValidationPolicy,
    /// Relative paths resolve against the settings file's directory.
    #[serde(default)]
    pub rules_file: Option<String>,
    #[serde(default = "default_currency_symbols")]
    pub currency_symbols: Vec<String>,
}

fn default_date_formats() -> Vec<String> {
    DEFAULT_DATE_FORMATS.iter().map(|s| s.to_string()).collect()
}

fn default_currency_symbols() -> Vec<String> {
    DEFAULT_CURRENCY_SYMBOLS.iter().map(|s| s.to_string()).collect()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            date_formats: default_date_formats(),
            policy: ValidationPolicy::default(),
            rules_file: None,
            currency_symbols: default_currency_symbols(),
        }
    }
}

impl Settings {
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if self.date_formats.is_empty() {
            return Err(ConfigError::NoDateFormats);
        }
        for fmt in &self.date_formats {
            if fmt.trim().is_empty() || StrftimeItems::new(fmt).any(|i| matches!(i, Item::Error)) {
                return Err(ConfigError::InvalidDateFormat(fmt.clone()));
            }
        }
        Ok(())
    }

    pub fn parse_options(&self) -> ParseOptions {
        ParseOptions {
            date_formats: self.date_formats.clone(),
            currency_symbols: self.currency_symbols.clone(),
        }
    }

    /// Absolute location of the rules file, if one is configured.
    pub fn rules_path(&self, settings_file: &Path) -> Option<PathBuf> {
        let raw = self.rules_file.as_deref()?;
        let path = PathBuf::from(expand_tilde(raw));
        if path.is_absolute() {
            Some(path)
        } else {
            let base = settings_file.parent().unwrap_or_else(|| Path::new("."));
            Some(base.join(path))
        }
    }

    /// The configured ruleset, or an empty one when no rules file is set.
    /// An explicit `override_path` wins over the settings entry.
    pub fn ruleset(&self, settings_file: &Path, override_path: Option<&str>) -> Result<Ruleset> {
        let path = override_path
            .map(|p| PathBuf::from(expand_tilde(p)))
            .or_else(|| self.rules_path(settings_file));
        match path {
            Some(path) => load_ruleset(&path),
            None => {
                log::warn!("no rules file configured, every transaction stays uncategorized (run `tally init` or pass --rules)");
                Ok(Ruleset::default())
            }
        }
    }
}

pub fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("tally")
}

/// `--config` / `TALLY_CONFIG` if given, otherwise `~/.config/tally/settings.json`.
pub fn settings_path(explicit: Option<&str>) -> PathBuf {
    match explicit {
        Some(p) => PathBuf::from(expand_tilde(p)),
        None => config_dir().join("settings.json"),
    }
}

/// A missing file yields defaults. A file that exists but cannot be read or
/// parsed is an error.
pub fn load_settings(path: &Path) -> Result<Settings> {
    if !path.exists() {
        log::debug!("{} not found, using default settings", path.display());
        return Ok(Settings::default());
    }
    let unreadable = |message: String| ConfigError::Unreadable {
        path: path.display().to_string(),
        message,
    };
    let content = std::fs::read_to_string(path).map_err(|e| unreadable(e.to_string()))?;
    let settings: Settings = serde_json::from_str(&content).map_err(|e| unreadable(e.to_string()))?;
    settings.validate()?;
    log::debug!("loaded settings from {}", path.display());
    Ok(settings)
}

pub fn save_settings(path: &Path, settings: &Settings) -> Result<()> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    let json = serde_json::to_string_pretty(settings)?;
    std::fs::write(path, format!("{json}\n"))?;
    Ok(())
}

pub fn expand_tilde(path: &str) -> String {
    if path.starts_with('~') {
        if let Some(home) = dirs::home_dir() {
            return path.replacen('~', &home.to_string_lossy(), 1);
        }
    }
    path.to_string()
}
