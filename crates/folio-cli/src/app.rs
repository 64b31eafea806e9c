//! Settings and repositories shared by every command.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use folio_core::{AppSettings, Job, JobStatus, JobType, NotificationBus};
use folio_inference::OllamaBackend;
use folio_jobs::{JobQueue, QueueConfig};
use folio_store::{DocumentStore, Project, ProjectRepository, RecentProjects, Source, SourceRepository};
use serde_json::{Map, Value as JsonValue};
use tracing::debug;

/// Extra time allowed past the request timeout before giving up on a job.
const JOB_WAIT_SLACK_SECS: u64 = 10;

pub struct App {
    pub settings: AppSettings,
    pub bus: Arc<NotificationBus>,
    pub projects: ProjectRepository,
    pub sources: SourceRepository,
}

impl App {
    /// Load settings from `settings_path` (or the default location), apply
    /// environment overrides, and wire up the repositories.
    pub fn load(settings_path: Option<PathBuf>) -> Result<Self> {
        let settings_path = settings_path.unwrap_or_else(AppSettings::default_path);
        let mut settings = AppSettings::load_from(&settings_path)
            .with_context(|| format!("loading settings from {}", settings_path.display()))?;
        settings.apply_overrides(|key| std::env::var(key).ok());
        settings.validate()?;
        debug!(path = %settings_path.display(), "Settings loaded");

        let store = Arc::new(DocumentStore::default());
        let bus = Arc::new(NotificationBus::new());
        let recent = RecentProjects::persisted(&settings_path)?;
        Ok(Self {
            projects: ProjectRepository::with_recent(store.clone(), bus.clone(), recent),
            sources: SourceRepository::new(store, bus.clone()),
            settings,
            bus,
        })
    }

    /// Open `explicit`, or else the most recently opened project.
    pub fn open_project(&self, explicit: Option<&Path>) -> Result<Project> {
        let path = match explicit {
            Some(path) => path.to_path_buf(),
            None => self
                .projects
                .recent()
                .entries()
                .first()
                .cloned()
                .context("no project given and none opened before; pass --project")?,
        };
        self.projects
            .open(&path)
            .with_context(|| format!("opening project {}", path.display()))
    }

    /// Load the source stored in `folder` under the project's sources folder.
    pub fn source(&self, project: &Project, folder: &str) -> Result<Source> {
        self.sources
            .load(&project.sources_dir().join(folder))
            .with_context(|| format!("loading source {}", folder))
    }

    pub fn backend(&self) -> Result<OllamaBackend> {
        Ok(OllamaBackend::from_settings(&self.settings)?)
    }

    /// Submit one job, block until it finishes, and return it if it completed.
    pub fn run_job(&self, job_type: JobType, input: String, model: Option<String>) -> Result<Job> {
        if !self.settings.ai_enabled {
            bail!("AI features are disabled; set ai_enabled = true in the settings file");
        }
        let queue = JobQueue::new(
            Arc::new(self.backend()?),
            self.bus.clone(),
            QueueConfig::from_settings(&self.settings),
        );

        let mut params = Map::new();
        if let Some(model) = model {
            params.insert("model".to_string(), JsonValue::String(model));
        }
        let id = queue.add_job(job_type, input, params);
        let wait = Duration::from_secs(self.settings.ai_timeout_secs + JOB_WAIT_SLACK_SECS);
        let job = queue.wait_for(&id, wait).context("job disappeared from the queue")?;
        queue.stop();

        match job.status {
            JobStatus::Completed => Ok(job),
            JobStatus::Failed => bail!(
                "{} job failed: {}",
                job_type,
                job.error.unwrap_or_default()
            ),
            other => bail!("{} job did not finish (status: {})", job_type, other),
        }
    }
}
