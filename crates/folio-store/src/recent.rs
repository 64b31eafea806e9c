//! Recently opened projects.

use std::fs;
use std::path::{Path, PathBuf};

use folio_core::{defaults, AppSettings, Result};
use tracing::warn;

/// Most-recent-first list of project roots plus the currently open one.
///
/// When built with a settings path, every change is written back to the
/// settings file (`recent_projects`, `last_project`). Persistence failures
/// are logged and do not fail the calling operation.
#[derive(Debug, Clone, Default)]
pub struct RecentProjects {
    entries: Vec<PathBuf>,
    current: Option<PathBuf>,
    settings_path: Option<PathBuf>,
}

impl RecentProjects {
    /// Tracking that lives only for this process.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Seed from the settings file at `settings_path` and persist changes there.
    pub fn persisted(settings_path: impl Into<PathBuf>) -> Result<Self> {
        let settings_path = settings_path.into();
        let settings = AppSettings::load_from(&settings_path)?;
        let mut entries = settings.recent_projects;
        entries.truncate(defaults::RECENT_PROJECTS_MAX);
        Ok(Self {
            entries,
            current: None,
            settings_path: Some(settings_path),
        })
    }

    pub fn entries(&self) -> &[PathBuf] {
        &self.entries
    }

    /// Entries whose directory still exists.
    pub fn existing(&self) -> Vec<PathBuf> {
        self.entries.iter().filter(|p| p.is_dir()).cloned().collect()
    }

    pub fn current(&self) -> Option<&Path> {
        self.current.as_deref()
    }

    /// Move `path` to the front, trim to the cap, and make it current.
    pub fn record(&mut self, path: &Path) {
        let path = fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
        self.entries.retain(|p| p != &path);
        self.entries.insert(0, path.clone());
        self.entries.truncate(defaults::RECENT_PROJECTS_MAX);
        self.current = Some(path);
        self.persist();
    }

    pub fn clear_current(&mut self) {
        self.current = None;
    }

    fn persist(&self) {
        let Some(settings_path) = &self.settings_path else {
            return;
        };
        let result = AppSettings::load_from(settings_path).and_then(|mut settings| {
            settings.recent_projects = self.entries.clone();
            settings.last_project = self.entries.first().cloned();
            settings.save_to(settings_path)
        });
        if let Err(e) = result {
            warn!(
                subsystem = "store",
                component = "recent_projects",
                path = %settings_path.display(),
                error = %e,
                "Failed to persist recent projects"
            );
        }
    }
}
