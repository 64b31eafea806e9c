//! User settings.
//!
//! Settings live in a TOML file (default: `~/.config/folio/settings.toml`,
//! overridable with `FOLIO_SETTINGS`). A missing file yields defaults and
//! unknown keys are ignored. The model service connection can additionally
//! be overridden per process:
//!
//! - `FOLIO_AI_BASE_URL`
//! - `FOLIO_AI_MODEL`
//! - `FOLIO_AI_TIMEOUT_SECS`
//!
//! # Example
//!
//! ```rust,no_run
//! use folio_core::settings::AppSettings;
//!
//! let settings = AppSettings::load().expect("Failed to load settings");
//! settings.validate().expect("Invalid settings");
//! ```

use std::env;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::defaults;
use crate::error::{Error, Result};
use crate::models::CitationStyle;

/// Environment variable naming an alternative settings file.
pub const SETTINGS_PATH_ENV: &str = "FOLIO_SETTINGS";
pub const AI_BASE_URL_ENV: &str = "FOLIO_AI_BASE_URL";
pub const AI_MODEL_ENV: &str = "FOLIO_AI_MODEL";
pub const AI_TIMEOUT_ENV: &str = "FOLIO_AI_TIMEOUT_SECS";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    pub language: String,
    pub default_citation_style: CitationStyle,
    pub ai_enabled: bool,
    pub ai_model: String,
    pub ai_base_url: String,
    pub ai_timeout_secs: u64,
    pub pdf_zoom_default: u32,
    pub auto_backup: bool,
    pub backup_interval_minutes: u32,
    /// Most recent first.
    pub recent_projects: Vec<PathBuf>,
    pub last_project: Option<PathBuf>,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            language: defaults::LANGUAGE.to_string(),
            default_citation_style: CitationStyle::default(),
            ai_enabled: false,
            ai_model: defaults::GEN_MODEL.to_string(),
            ai_base_url: defaults::OLLAMA_URL.to_string(),
            ai_timeout_secs: defaults::GEN_TIMEOUT_SECS,
            pdf_zoom_default: defaults::PDF_ZOOM,
            auto_backup: true,
            backup_interval_minutes: defaults::BACKUP_INTERVAL_MINUTES,
            recent_projects: Vec::new(),
            last_project: None,
        }
    }
}

impl AppSettings {
    /// `$FOLIO_SETTINGS`, or `<config dir>/folio/settings.toml`.
    pub fn default_path() -> PathBuf {
        if let Ok(path) = env::var(SETTINGS_PATH_ENV) {
            if !path.trim().is_empty() {
                return PathBuf::from(path);
            }
        }
        let mut path = dirs::config_dir().unwrap_or_else(|| PathBuf::from(".config"));
        path.push("folio");
        path.push("settings.toml");
        path
    }

    /// Load from the default path and apply environment overrides.
    pub fn load() -> Result<Self> {
        let mut settings = Self::load_from(&Self::default_path())?;
        settings.apply_overrides(|key| env::var(key).ok());
        Ok(settings)
    }

    /// Load from `path`; a missing file yields defaults.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(
                subsystem = "settings",
                path = %path.display(),
                "Settings file not found, using defaults"
            );
            return Ok(Self::default());
        }
        info!(subsystem = "settings", path = %path.display(), "Loading settings");
        let content = fs::read_to_string(path)?;
        toml::from_str(&content)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))
    }

    /// Write to `path`, replacing any existing file atomically.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::Serialization(e.to_string()))?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let temp_path = path.with_extension("toml.tmp");
        {
            let mut file = fs::File::create(&temp_path)?;
            file.write_all(content.as_bytes())?;
            file.sync_all()?;
        }
        fs::rename(&temp_path, path)?;
        debug!(subsystem = "settings", path = %path.display(), "Settings saved");
        Ok(())
    }

    /// Apply model-service overrides. `lookup` maps a variable name to its value.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(AI_BASE_URL_ENV).filter(|v| !v.trim().is_empty()) {
            self.ai_base_url = url;
        }
        if let Some(model) = lookup(AI_MODEL_ENV).filter(|v| !v.trim().is_empty()) {
            self.ai_model = model;
        }
        if let Some(secs) = lookup(AI_TIMEOUT_ENV).and_then(|v| v.trim().parse().ok()) {
            self.ai_timeout_secs = secs;
        }
    }

    /// Validate the model-service connection settings.
    pub fn validate(&self) -> Result<()> {
        if self.ai_model.trim().is_empty() {
            return Err(Error::Config("ai_model cannot be empty".to_string()));
        }
        if self.ai_base_url.is_empty() {
            return Err(Error::Config("ai_base_url cannot be empty".to_string()));
        }
        if !self.ai_base_url.starts_with("http://") && !self.ai_base_url.starts_with("https://") {
            return Err(Error::Config(format!(
                "ai_base_url must start with http:// or https://, got: {}",
                self.ai_base_url
            )));
        }
        if self.ai_timeout_secs == 0 {
            return Err(Error::Config("ai_timeout_secs must be positive".to_string()));
        }
        Ok(())
    }
}
