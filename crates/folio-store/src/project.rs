//! Project repository.
//!
//! A project is a directory holding the marker document `project.liproj`,
//! project-level notes and tasks, and a sources folder with one subfolder per
//! source.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use folio_core::{
    defaults, CitationStyle, Collection, CollectionItem, DocumentKind, Error, EventKind,
    EventPayload, Notes, NotificationBus, ProjectConfig, Result, Task, Tasks,
};
use tracing::{debug, info, instrument, trace};

use crate::document::DocumentStore;
use crate::recent::RecentProjects;
use crate::source::{load_source, Source};

/// An open project: its root directory and loaded configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct Project {
    pub root: PathBuf,
    pub config: ProjectConfig,
}

impl Project {
    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn config_path(&self) -> PathBuf {
        self.root.join(defaults::PROJECT_FILE)
    }

    pub fn sources_dir(&self) -> PathBuf {
        self.root.join(&self.config.sources_folder)
    }

    pub fn notes_path(&self) -> PathBuf {
        self.root.join(defaults::PROJECT_NOTES_FILE)
    }

    pub fn tasks_path(&self) -> PathBuf {
        self.root.join(defaults::PROJECT_TASKS_FILE)
    }

    /// Path of project-level collection `C`. Projects hold notes and tasks.
    pub fn collection_path<C: Collection>(&self) -> Result<PathBuf> {
        match C::KIND {
            DocumentKind::Notes => Ok(self.notes_path()),
            DocumentKind::Tasks => Ok(self.tasks_path()),
            other => Err(Error::InvalidInput(format!(
                "projects have no {} collection",
                other
            ))),
        }
    }

    fn item_payload(&self, item_id: &str) -> EventPayload {
        EventPayload::Item {
            owner: self.root.clone(),
            item_id: item_id.to_string(),
        }
    }

    fn payload(&self) -> EventPayload {
        EventPayload::Project {
            root: self.root.clone(),
            name: self.config.name.clone(),
        }
    }
}

/// A source folder found under a project's sources folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRef {
    /// Folder name, e.g. `Smith2024_Understanding_AI`.
    pub name: String,
    pub path: PathBuf,
}

/// Creates, opens, and inspects projects.
pub struct ProjectRepository {
    store: Arc<DocumentStore>,
    bus: Arc<NotificationBus>,
    recent: Mutex<RecentProjects>,
}

impl ProjectRepository {
    pub fn new(store: Arc<DocumentStore>, bus: Arc<NotificationBus>) -> Self {
        Self::with_recent(store, bus, RecentProjects::in_memory())
    }

    pub fn with_recent(
        store: Arc<DocumentStore>,
        bus: Arc<NotificationBus>,
        recent: RecentProjects,
    ) -> Self {
        Self {
            store,
            bus,
            recent: Mutex::new(recent),
        }
    }

    /// Snapshot of the recent-projects list.
    pub fn recent(&self) -> RecentProjects {
        self.recent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Create a new project at `path`.
    ///
    /// `path` must not exist or must be an empty directory.
    #[instrument(skip(self, description), fields(
        subsystem = "store",
        component = "project_repo",
        op = "create",
    ))]
    pub fn create(
        &self,
        path: &Path,
        name: &str,
        description: Option<String>,
        citation_style: CitationStyle,
    ) -> Result<Project> {
        if path.exists() && !is_empty_dir(path)? {
            return Err(Error::AlreadyExists(path.to_path_buf()));
        }
        fs::create_dir_all(path)?;

        let mut config = ProjectConfig::new(name);
        config.description = description;
        config.citation_style = citation_style;

        let project = Project {
            root: path.to_path_buf(),
            config,
        };
        self.store.save(&project.config_path(), &project.config)?;
        fs::create_dir_all(project.sources_dir())?;
        self.store.save(&project.notes_path(), &Notes::default())?;
        self.store.save(&project.tasks_path(), &Tasks::default())?;

        info!(root = %project.root.display(), name = %project.name(), "Project created");
        self.opened(&project);
        Ok(project)
    }

    /// Open the project at `path`.
    #[instrument(skip(self), fields(subsystem = "store", component = "project_repo", op = "open"))]
    pub fn open(&self, path: &Path) -> Result<Project> {
        if !self.is_project(path) {
            return Err(Error::NotAProject(path.to_path_buf()));
        }
        let config: ProjectConfig = self.store.load(&path.join(defaults::PROJECT_FILE))?;
        let project = Project {
            root: path.to_path_buf(),
            config,
        };
        info!(root = %project.root.display(), name = %project.name(), "Project opened");
        self.opened(&project);
        Ok(project)
    }

    fn opened(&self, project: &Project) {
        self.recent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .record(&project.root);
        self.bus.publish(EventKind::ProjectOpened, project.payload());
    }

    pub fn is_project(&self, path: &Path) -> bool {
        path.join(defaults::PROJECT_FILE).is_file()
    }

    pub fn close(&self, project: &Project) {
        self.recent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear_current();
        info!(root = %project.root.display(), "Project closed");
        self.bus.publish(EventKind::ProjectClosed, project.payload());
    }

    /// Persist the configuration, bumping `updated_at`.
    pub fn save_config(&self, project: &mut Project) -> Result<()> {
        project.config.touch();
        self.store.save(&project.config_path(), &project.config)?;
        self.bus.publish(EventKind::ProjectSaved, project.payload());
        Ok(())
    }

    /// Source folders of `project`, sorted by name.
    ///
    /// Subdirectories without a metadata document are skipped.
    pub fn list_sources(&self, project: &Project) -> Result<Vec<SourceRef>> {
        let dir = project.sources_dir();
        if !dir.is_dir() {
            debug!(path = %dir.display(), "No sources folder");
            return Ok(Vec::new());
        }

        let mut refs = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }
            if !path.join(defaults::META_FILE).is_file() {
                trace!(path = %path.display(), "Skipping folder without metadata");
                continue;
            }
            refs.push(SourceRef {
                name: entry.file_name().to_string_lossy().into_owned(),
                path,
            });
        }
        refs.sort_by(|a, b| a.name.cmp(&b.name));
        debug!(result_count = refs.len(), "Listed sources");
        Ok(refs)
    }

    /// Load every source of `project`.
    pub fn load_sources(&self, project: &Project) -> Result<Vec<Source>> {
        self.list_sources(project)?
            .iter()
            .map(|r| load_source(&self.store, &r.path))
            .collect()
    }

    pub fn project_notes(&self, project: &Project) -> Result<Notes> {
        self.store.load_or_default(&project.notes_path())
    }

    /// Replace the project notes wholesale and ask consumers to reload.
    pub fn save_project_notes(&self, project: &Project, notes: &Notes) -> Result<()> {
        self.store.save(&project.notes_path(), notes)?;
        self.bus.publish(EventKind::RefreshRequested, project.payload());
        Ok(())
    }

    pub fn project_tasks(&self, project: &Project) -> Result<Tasks> {
        self.store.load_or_default(&project.tasks_path())
    }

    /// Replace the project tasks wholesale and ask consumers to reload.
    pub fn save_project_tasks(&self, project: &Project, tasks: &Tasks) -> Result<()> {
        self.store.save(&project.tasks_path(), tasks)?;
        self.bus.publish(EventKind::RefreshRequested, project.payload());
        Ok(())
    }

    fn collection<C: Collection>(&self, project: &Project) -> Result<(PathBuf, C)> {
        let path = project.collection_path::<C>()?;
        let collection = self.store.load_or_default(&path)?;
        Ok((path, collection))
    }

    /// Append a project-level item, save, and announce it.
    pub fn add_item<C: Collection>(&self, project: &Project, new: C::NewItem) -> Result<C::Item> {
        let (path, mut collection) = self.collection::<C>(project)?;
        let item = collection.add(new);
        self.store.save(&path, &collection)?;
        debug!(item_id = %item.id(), document_kind = %C::KIND, "Project item added");
        self.bus.publish(C::ADDED, project.item_payload(item.id()));
        Ok(item)
    }

    /// Remove a project-level item. Returns whether anything was removed;
    /// only then is the document saved and the deletion announced.
    pub fn remove_item<C: Collection>(&self, project: &Project, id: &str) -> Result<bool> {
        let (path, mut collection) = self.collection::<C>(project)?;
        if !collection.remove(id) {
            return Ok(false);
        }
        self.store.save(&path, &collection)?;
        self.bus.publish(C::DELETED, project.item_payload(id));
        Ok(true)
    }

    /// Apply `edit` to a project-level item, save, and announce the update.
    pub fn update_item<C, F>(&self, project: &Project, id: &str, edit: F) -> Result<C::Item>
    where
        C: Collection,
        F: FnOnce(&mut C::Item),
    {
        let (path, mut collection) = self.collection::<C>(project)?;
        let item = {
            let item = collection
                .get_mut(id)
                .ok_or_else(|| Error::NotFound(format!("{} item {}", C::KIND, id)))?;
            edit(item);
            item.clone()
        };
        self.store.save(&path, &collection)?;
        self.bus.publish(C::UPDATED, project.item_payload(id));
        Ok(item)
    }

    /// Mark a project task done.
    pub fn complete_task(&self, project: &Project, id: &str) -> Result<Task> {
        self.update_item::<Tasks, _>(project, id, Task::complete)
    }
}

fn is_empty_dir(path: &Path) -> Result<bool> {
    if !path.is_dir() {
        return Ok(false);
    }
    Ok(fs::read_dir(path)?.next().is_none())
}

#[cfg(test)]
mod tests {
    use super::*;
    use folio_core::{NewNote, NewTask, Quotes, TaskStatus};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    fn repo() -> (ProjectRepository, Arc<NotificationBus>) {
        let bus = Arc::new(NotificationBus::new());
        let repo = ProjectRepository::new(Arc::new(DocumentStore::default()), bus.clone());
        (repo, bus)
    }

    #[test]
    fn test_create_writes_layout() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("P");
        let (repo, _) = repo();

        let project = repo
            .create(&root, "P", Some("Thesis".into()), CitationStyle::Apa)
            .unwrap();

        assert!(root.join("project.liproj").is_file());
        assert!(root.join("project_notes.linote").is_file());
        assert!(root.join("project_tasks.litask").is_file());
        assert!(root.join("Sources").is_dir());
        assert_eq!(project.name(), "P");
        assert!(repo.is_project(&root));
        assert!(repo.list_sources(&project).unwrap().is_empty());
    }

    #[test]
    fn test_create_into_empty_existing_dir() {
        let dir = TempDir::new().unwrap();
        let (repo, _) = repo();
        repo.create(dir.path(), "Here", None, CitationStyle::Mla).unwrap();
        assert!(repo.is_project(dir.path()));
    }

    #[test]
    fn test_create_into_non_empty_dir_fails() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("stray.txt"), b"x").unwrap();
        let (repo, _) = repo();
        let err = repo
            .create(dir.path(), "P", None, CitationStyle::Apa)
            .unwrap_err();
        assert!(matches!(err, Error::AlreadyExists(_)));
        assert!(!repo.is_project(dir.path()));
    }

    #[test]
    fn test_open_non_project() {
        let dir = TempDir::new().unwrap();
        let (repo, _) = repo();
        assert!(matches!(repo.open(dir.path()), Err(Error::NotAProject(_))));
    }

    #[test]
    fn test_open_publishes_and_records_recent() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("P");
        let (repo, bus) = repo();
        let opened = Arc::new(AtomicUsize::new(0));
        let o = opened.clone();
        bus.on(EventKind::ProjectOpened, move |_| {
            o.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        let created = repo.create(&root, "P", None, CitationStyle::Apa).unwrap();
        let reopened = repo.open(&root).unwrap();
        assert_eq!(created.config, reopened.config);
        assert_eq!(opened.load(Ordering::SeqCst), 2);

        let recent = repo.recent();
        assert_eq!(recent.entries().len(), 1);
        assert!(recent.current().is_some());

        repo.close(&reopened);
        assert!(repo.recent().current().is_none());
    }

    #[test]
    fn test_save_config_bumps_updated_at() {
        let dir = TempDir::new().unwrap();
        let (repo, _) = repo();
        let mut project = repo
            .create(&dir.path().join("P"), "P", None, CitationStyle::Apa)
            .unwrap();
        let before = project.config.updated_at;
        std::thread::sleep(std::time::Duration::from_millis(2));
        project.config.citation_style = CitationStyle::Chicago;
        repo.save_config(&mut project).unwrap();

        assert!(project.config.updated_at > before);
        let reopened = repo.open(&project.root).unwrap();
        assert_eq!(reopened.config.citation_style, CitationStyle::Chicago);
    }

    #[test]
    fn test_list_sources_skips_and_sorts() {
        let dir = TempDir::new().unwrap();
        let (repo, _) = repo();
        let project = repo
            .create(&dir.path().join("P"), "P", None, CitationStyle::Apa)
            .unwrap();
        let sources = project.sources_dir();
        for name in ["Zed2020_Z", "Alpha2019_A"] {
            fs::create_dir(sources.join(name)).unwrap();
            fs::write(sources.join(name).join("meta.limeta"), b"{}").unwrap();
        }
        fs::create_dir(sources.join("empty_folder")).unwrap();
        fs::write(sources.join("loose.pdf"), b"%PDF").unwrap();

        let names: Vec<String> = repo
            .list_sources(&project)
            .unwrap()
            .into_iter()
            .map(|r| r.name)
            .collect();
        assert_eq!(names, vec!["Alpha2019_A", "Zed2020_Z"]);
    }

    #[test]
    fn test_missing_sources_folder_is_empty() {
        let dir = TempDir::new().unwrap();
        let (repo, _) = repo();
        let project = repo
            .create(&dir.path().join("P"), "P", None, CitationStyle::Apa)
            .unwrap();
        fs::remove_dir(project.sources_dir()).unwrap();
        assert!(repo.list_sources(&project).unwrap().is_empty());
    }

    #[test]
    fn test_project_level_collections() {
        let dir = TempDir::new().unwrap();
        let (repo, _) = repo();
        let project = repo
            .create(&dir.path().join("P"), "P", None, CitationStyle::Apa)
            .unwrap();

        let mut tasks = repo.project_tasks(&project).unwrap();
        tasks.add(NewTask::new("Write intro"));
        repo.save_project_tasks(&project, &tasks).unwrap();
        assert_eq!(repo.project_tasks(&project).unwrap(), tasks);

        fs::remove_file(project.notes_path()).unwrap();
        assert!(repo.project_notes(&project).unwrap().is_empty());
    }

    #[test]
    fn test_project_items_publish_events() {
        let dir = TempDir::new().unwrap();
        let (repo, bus) = repo();
        let project = repo
            .create(&dir.path().join("P"), "P", None, CitationStyle::Apa)
            .unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        for kind in [
            EventKind::NoteAdded,
            EventKind::NoteDeleted,
            EventKind::TaskAdded,
            EventKind::TaskUpdated,
        ] {
            let s = seen.clone();
            bus.on(kind, move |e| {
                s.lock().unwrap().push((e.kind, e.payload.clone()));
                Ok(())
            });
        }

        let note = repo
            .add_item::<Notes>(&project, NewNote::new("Scope of chapter 2"))
            .unwrap();
        let task = repo
            .add_item::<Tasks>(&project, NewTask::new("Write intro"))
            .unwrap();
        let done = repo.complete_task(&project, &task.id).unwrap();
        assert_eq!(done.status, TaskStatus::Done);
        assert!(repo.remove_item::<Notes>(&project, &note.id).unwrap());
        assert!(!repo.remove_item::<Notes>(&project, &note.id).unwrap());

        let seen = seen.lock().unwrap();
        let kinds: Vec<EventKind> = seen.iter().map(|(k, _)| *k).collect();
        assert_eq!(
            kinds,
            vec![
                EventKind::NoteAdded,
                EventKind::TaskAdded,
                EventKind::TaskUpdated,
                EventKind::NoteDeleted,
            ]
        );
        assert_eq!(
            seen[0].1,
            EventPayload::Item {
                owner: project.root.clone(),
                item_id: note.id.clone(),
            }
        );

        let tasks = repo.project_tasks(&project).unwrap();
        assert_eq!(tasks.get(&task.id).unwrap().status, TaskStatus::Done);
        assert!(repo.project_notes(&project).unwrap().is_empty());
    }

    #[test]
    fn test_project_item_errors() {
        let dir = TempDir::new().unwrap();
        let (repo, _) = repo();
        let project = repo
            .create(&dir.path().join("P"), "P", None, CitationStyle::Apa)
            .unwrap();
        assert!(matches!(
            repo.complete_task(&project, "t_missing"),
            Err(Error::NotFound(_))
        ));
        assert!(matches!(
            repo.remove_item::<Quotes>(&project, "q_1"),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_bulk_save_requests_refresh() {
        let dir = TempDir::new().unwrap();
        let (repo, bus) = repo();
        let project = repo
            .create(&dir.path().join("P"), "P", None, CitationStyle::Apa)
            .unwrap();
        let refreshes = Arc::new(AtomicUsize::new(0));
        let r = refreshes.clone();
        bus.on(EventKind::RefreshRequested, move |_| {
            r.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        let mut notes = repo.project_notes(&project).unwrap();
        notes.add(NewNote::new("n"));
        repo.save_project_notes(&project, &notes).unwrap();
        repo.save_project_tasks(&project, &Tasks::default()).unwrap();
        assert_eq!(refreshes.load(Ordering::SeqCst), 2);
    }
}
