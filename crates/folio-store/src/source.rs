//! Source repository.
//!
//! Each source lives in its own folder under the project's sources folder,
//! named deterministically from its metadata (see [`folio_core::naming`]).
//! The folder holds `meta.limeta`, the four collection documents, and
//! optionally one copied artifact (usually a PDF).

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use folio_core::{
    defaults, naming, Collection, CollectionItem, Error, EventKind, EventPayload, Notes,
    NotificationBus, Quotes, Result, SourceMeta, Summaries, Task, Tasks,
};
use tracing::{debug, error, info, instrument, warn};

use crate::document::DocumentStore;
use crate::project::Project;

/// A source folder and its loaded metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct Source {
    pub path: PathBuf,
    pub meta: SourceMeta,
}

impl Source {
    /// Folder name.
    pub fn name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    pub fn meta_path(&self) -> PathBuf {
        self.path.join(defaults::META_FILE)
    }

    /// Path of collection `C` inside this source.
    pub fn collection_path<C: Collection>(&self) -> PathBuf {
        self.path.join(C::FILE_NAME)
    }

    fn payload(&self) -> EventPayload {
        EventPayload::Source {
            folder: self.path.clone(),
            title: self.meta.title.clone(),
        }
    }

    fn item_payload(&self, item_id: &str) -> EventPayload {
        EventPayload::Item {
            owner: self.path.clone(),
            item_id: item_id.to_string(),
        }
    }
}

/// Load the source at `path`. A folder without metadata is `NotFound`.
pub(crate) fn load_source(store: &DocumentStore, path: &Path) -> Result<Source> {
    let meta_path = path.join(defaults::META_FILE);
    if !meta_path.is_file() {
        return Err(Error::NotFound(format!(
            "no source metadata in {}",
            path.display()
        )));
    }
    let meta = store.load(&meta_path)?;
    Ok(Source {
        path: path.to_path_buf(),
        meta,
    })
}

/// File names a source folder uses for its own documents.
fn reserved_file_names() -> [&'static str; 5] {
    [
        defaults::META_FILE,
        Notes::FILE_NAME,
        Quotes::FILE_NAME,
        Tasks::FILE_NAME,
        Summaries::FILE_NAME,
    ]
}

/// Whether `name` would collide with a source document or its temp file.
/// Compared case-insensitively for case-folding filesystems.
fn is_reserved_file_name(name: &str) -> bool {
    let lower = name.to_lowercase();
    let base = lower.strip_suffix(".tmp").unwrap_or(&lower);
    reserved_file_names().iter().any(|reserved| *reserved == base)
}

/// Name the copy of `artifact` gets inside the source folder.
fn artifact_file_name(artifact: &Path) -> Result<String> {
    let name = artifact
        .file_name()
        .map(|n| naming::sanitize_filename(&n.to_string_lossy()))
        .filter(|n| !n.is_empty())
        .ok_or_else(|| Error::InvalidInput(format!("{} has no file name", artifact.display())))?;
    if is_reserved_file_name(&name) {
        Ok(format!("artifact_{}", name))
    } else {
        Ok(name)
    }
}

/// Creates, loads, and mutates sources and their collections.
pub struct SourceRepository {
    store: Arc<DocumentStore>,
    bus: Arc<NotificationBus>,
}

impl SourceRepository {
    pub fn new(store: Arc<DocumentStore>, bus: Arc<NotificationBus>) -> Self {
        Self { store, bus }
    }

    /// Folder name `meta` maps to. Pure.
    pub fn folder_name(meta: &SourceMeta) -> String {
        meta.folder_name()
    }

    /// Create a new source folder in `project`.
    ///
    /// Fails with `FolderConflict` when the derived folder already exists;
    /// an existing folder is never overwritten. When `artifact` is given it
    /// must exist; it is copied into the folder and recorded as `source_file`.
    /// An artifact named like one of the folder's own documents is stored as
    /// `artifact_<name>`. If any step after the folder is made fails, the
    /// folder is removed again.
    #[instrument(skip(self, project, meta, artifact), fields(
        subsystem = "store",
        component = "source_repo",
        op = "create",
        title = %meta.title,
    ))]
    pub fn create(
        &self,
        project: &Project,
        mut meta: SourceMeta,
        artifact: Option<&Path>,
    ) -> Result<Source> {
        self.store.validate(&meta)?;
        let artifact = match artifact {
            Some(artifact) => {
                if !artifact.is_file() {
                    return Err(Error::NotFound(artifact.display().to_string()));
                }
                Some((artifact, artifact_file_name(artifact)?))
            }
            None => None,
        };

        let folder = meta.folder_name();
        let sources_dir = project.sources_dir();
        fs::create_dir_all(&sources_dir)?;
        let path = sources_dir.join(&folder);
        if path.exists() {
            return Err(Error::FolderConflict(folder));
        }
        fs::create_dir(&path).map_err(|e| match e.kind() {
            std::io::ErrorKind::AlreadyExists => Error::FolderConflict(folder.clone()),
            _ => Error::Io(e),
        })?;

        let populated = (|| -> Result<Source> {
            if let Some((artifact, file_name)) = artifact {
                fs::copy(artifact, path.join(&file_name))?;
                debug!(artifact = %file_name, "Artifact copied");
                meta.source_file = Some(file_name);
            }

            let source = Source {
                path: path.clone(),
                meta,
            };
            self.store.save(&source.meta_path(), &source.meta)?;
            self.store.save(&source.collection_path::<Notes>(), &Notes::default())?;
            self.store.save(&source.collection_path::<Quotes>(), &Quotes::default())?;
            self.store.save(&source.collection_path::<Tasks>(), &Tasks::default())?;
            self.store
                .save(&source.collection_path::<Summaries>(), &Summaries::default())?;
            Ok(source)
        })();

        let source = match populated {
            Ok(source) => source,
            Err(e) => {
                warn!(folder = %folder, error = %e, "Source creation failed, removing folder");
                if let Err(cleanup) = fs::remove_dir_all(&path) {
                    error!(
                        path = %path.display(),
                        error = %cleanup,
                        "Failed to remove partially created source folder"
                    );
                }
                return Err(e);
            }
        };

        info!(folder = %folder, "Source created");
        self.bus.publish(EventKind::SourceCreated, source.payload());
        Ok(source)
    }

    pub fn load(&self, path: &Path) -> Result<Source> {
        load_source(&self.store, path)
    }

    /// Persist metadata changes, bumping `updated_at`.
    ///
    /// The folder is not renamed when the derived name changes.
    pub fn update(&self, source: &mut Source) -> Result<()> {
        source.meta.touch();
        self.store.save(&source.meta_path(), &source.meta)?;
        self.bus.publish(EventKind::SourceUpdated, source.payload());
        Ok(())
    }

    /// Announce `source` as the selected one.
    pub fn select(&self, source: &Source) {
        self.bus.publish(EventKind::SourceSelected, source.payload());
    }

    /// Case-insensitive substring search over title, authors, and tags.
    ///
    /// Results keep the order of `sources`. An empty query matches everything.
    pub fn search<'a>(query: &str, sources: &'a [Source]) -> Vec<&'a Source> {
        let query = query.to_lowercase();
        sources
            .iter()
            .filter(|s| {
                let meta = &s.meta;
                meta.title.to_lowercase().contains(&query)
                    || meta.authors.iter().any(|a| a.to_lowercase().contains(&query))
                    || meta.tags.iter().any(|t| t.to_lowercase().contains(&query))
            })
            .collect()
    }

    /// Remove the source folder and everything in it.
    pub fn delete(&self, source: &Source) -> Result<()> {
        if source.path.exists() {
            fs::remove_dir_all(&source.path)?;
        }
        info!(folder = %source.path.display(), "Source deleted");
        self.bus.publish(EventKind::SourceDeleted, source.payload());
        Ok(())
    }

    /// The recorded artifact, or else the first PDF in the folder (by name).
    pub fn artifact_path(&self, source: &Source) -> Option<PathBuf> {
        if let Some(file) = &source.meta.source_file {
            return Some(source.path.join(file));
        }
        let mut pdfs: Vec<PathBuf> = fs::read_dir(&source.path)
            .ok()?
            .filter_map(|e| e.ok().map(|e| e.path()))
            .filter(|p| {
                p.is_file()
                    && p.extension()
                        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"))
            })
            .collect();
        pdfs.sort();
        pdfs.into_iter().next()
    }

    // ------------------------------------------------------------------
    // Collections
    // ------------------------------------------------------------------

    /// Load collection `C` of `source`; a missing document is empty.
    pub fn collection<C: Collection>(&self, source: &Source) -> Result<C> {
        self.store.load_or_default(&source.collection_path::<C>())
    }

    pub fn save_collection<C: Collection>(&self, source: &Source, collection: &C) -> Result<()> {
        self.store.save(&source.collection_path::<C>(), collection)
    }

    /// Load, add, save, and announce a new item.
    pub fn add_item<C: Collection>(&self, source: &Source, new: C::NewItem) -> Result<C::Item> {
        let mut collection: C = self.collection(source)?;
        let item = collection.add(new);
        self.save_collection(source, &collection)?;
        debug!(item_id = %item.id(), document_kind = %C::KIND, "Item added");
        self.bus.publish(C::ADDED, source.item_payload(item.id()));
        Ok(item)
    }

    /// Remove an item. Returns whether anything was removed; only then is
    /// the document saved and the deletion announced.
    pub fn remove_item<C: Collection>(&self, source: &Source, id: &str) -> Result<bool> {
        let mut collection: C = self.collection(source)?;
        if !collection.remove(id) {
            return Ok(false);
        }
        self.save_collection(source, &collection)?;
        self.bus.publish(C::DELETED, source.item_payload(id));
        Ok(true)
    }

    /// Apply `edit` to an item, save, and announce the update.
    pub fn update_item<C, F>(&self, source: &Source, id: &str, edit: F) -> Result<C::Item>
    where
        C: Collection,
        F: FnOnce(&mut C::Item),
    {
        let mut collection: C = self.collection(source)?;
        let item = {
            let item = collection
                .get_mut(id)
                .ok_or_else(|| Error::NotFound(format!("{} item {}", C::KIND, id)))?;
            edit(item);
            item.clone()
        };
        self.save_collection(source, &collection)?;
        self.bus.publish(C::UPDATED, source.item_payload(id));
        Ok(item)
    }

    /// Mark a task done.
    pub fn complete_task(&self, source: &Source, id: &str) -> Result<Task> {
        self.update_item::<Tasks, _>(source, id, Task::complete)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::ProjectRepository;
    use crate::schema::{Schema, SchemaRegistry};
    use folio_core::{CitationStyle, DocumentKind, NewNote, NewQuote, NewTask, TaskStatus};
    use serde_json::json;
    use std::sync::Mutex;
    use tempfile::TempDir;

    struct Fixture {
        _dir: TempDir,
        project: Project,
        repo: SourceRepository,
        bus: Arc<NotificationBus>,
    }

    fn fixture() -> Fixture {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(DocumentStore::default());
        let bus = Arc::new(NotificationBus::new());
        let projects = ProjectRepository::new(store.clone(), bus.clone());
        let project = projects
            .create(&dir.path().join("P"), "P", None, CitationStyle::Apa)
            .unwrap();
        Fixture {
            _dir: dir,
            project,
            repo: SourceRepository::new(store, bus.clone()),
            bus,
        }
    }

    fn smith() -> SourceMeta {
        SourceMeta::new("Understanding AI", vec!["Smith, John".into()], Some(2024))
    }

    fn record(bus: &NotificationBus, kinds: &[EventKind]) -> Arc<Mutex<Vec<EventKind>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        for kind in kinds {
            let s = seen.clone();
            bus.on(*kind, move |e| {
                s.lock().unwrap().push(e.kind);
                Ok(())
            });
        }
        seen
    }

    #[test]
    fn test_create_layout() {
        let f = fixture();
        let source = f.repo.create(&f.project, smith(), None).unwrap();

        assert_eq!(source.name(), "Smith2024_Understanding_AI");
        for file in ["meta.limeta", "notes.linote", "quotes.liquote", "tasks.litask", "summaries.lisum"] {
            assert!(source.path.join(file).is_file(), "missing {}", file);
        }
        assert_eq!(f.repo.load(&source.path).unwrap(), source);
    }

    #[test]
    fn test_folder_conflict_never_overwrites() {
        let f = fixture();
        let mut first = smith();
        first.title = "Identical prefix of thirty chs: part one".into();
        let mut second = smith();
        second.title = "Identical prefix of thirty chs: part two".into();

        let created = f.repo.create(&f.project, first, None).unwrap();
        let err = f.repo.create(&f.project, second, None).unwrap_err();
        assert!(matches!(err, Error::FolderConflict(_)));

        let still = f.repo.load(&created.path).unwrap();
        assert!(still.meta.title.ends_with("part one"));
    }

    #[test]
    fn test_create_with_artifact() {
        let f = fixture();
        let pdf = f.project.root.join("paper.pdf");
        fs::write(&pdf, b"%PDF-1.4").unwrap();

        let source = f.repo.create(&f.project, smith(), Some(&pdf)).unwrap();
        assert_eq!(source.meta.source_file.as_deref(), Some("paper.pdf"));
        let copied = f.repo.artifact_path(&source).unwrap();
        assert_eq!(fs::read(copied).unwrap(), b"%PDF-1.4");

        let reloaded = f.repo.load(&source.path).unwrap();
        assert_eq!(reloaded.meta.source_file.as_deref(), Some("paper.pdf"));
    }

    #[test]
    fn test_artifact_named_like_a_document_is_kept() {
        let f = fixture();
        let upload = f.project.root.join("upload");
        fs::create_dir_all(&upload).unwrap();
        let artifact = upload.join("notes.linote");
        fs::write(&artifact, b"%PDF-1.4 precious bytes").unwrap();

        let source = f.repo.create(&f.project, smith(), Some(&artifact)).unwrap();
        assert_eq!(
            source.meta.source_file.as_deref(),
            Some("artifact_notes.linote")
        );
        let copied = f.repo.artifact_path(&source).unwrap();
        assert_eq!(fs::read(copied).unwrap(), b"%PDF-1.4 precious bytes");
        assert!(f.repo.collection::<Notes>(&source).unwrap().is_empty());
    }

    #[test]
    fn test_reserved_file_names() {
        assert!(is_reserved_file_name("meta.limeta"));
        assert!(is_reserved_file_name("Quotes.LIQUOTE"));
        assert!(is_reserved_file_name("summaries.lisum.tmp"));
        assert!(is_reserved_file_name("tasks.litask"));
        assert!(!is_reserved_file_name("paper.pdf"));
        assert!(!is_reserved_file_name("artifact_notes.linote"));

        assert_eq!(
            artifact_file_name(Path::new("/in/meta.limeta.tmp")).unwrap(),
            "artifact_meta.limeta.tmp"
        );
        assert_eq!(artifact_file_name(Path::new("/in/paper.pdf")).unwrap(), "paper.pdf");
    }

    #[test]
    fn test_failed_create_removes_folder() {
        let f = fixture();
        let pdf = f.project.root.join("paper.pdf");
        fs::write(&pdf, b"%PDF-1.4").unwrap();
        let created = record(&f.bus, &[EventKind::SourceCreated]);

        // Notes can never be saved under this registry.
        let mut schemas = SchemaRegistry::builtin();
        schemas.register(
            DocumentKind::Notes,
            Schema::compile(&json!({"required": ["reviewed_by"]})).unwrap(),
        );
        let strict = SourceRepository::new(Arc::new(DocumentStore::new(schemas)), f.bus.clone());

        let err = strict.create(&f.project, smith(), Some(&pdf)).unwrap_err();
        assert!(matches!(err, Error::Validation(_)), "got {:?}", err);
        let folder = f.project.sources_dir().join("Smith2024_Understanding_AI");
        assert!(!folder.exists());
        assert!(created.lock().unwrap().is_empty());

        // The same metadata can be created again afterwards.
        let source = f.repo.create(&f.project, smith(), Some(&pdf)).unwrap();
        assert_eq!(source.path, folder);
        assert_eq!(created.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_missing_artifact_creates_nothing() {
        let f = fixture();
        let err = f
            .repo
            .create(&f.project, smith(), Some(Path::new("/nonexistent/paper.pdf")))
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
        assert!(!f.project.sources_dir().join("Smith2024_Understanding_AI").exists());
    }

    #[test]
    fn test_invalid_meta_creates_nothing() {
        let f = fixture();
        let meta = SourceMeta::new("", vec![], None);
        assert!(matches!(
            f.repo.create(&f.project, meta, None),
            Err(Error::Validation(_))
        ));
        assert_eq!(fs::read_dir(f.project.sources_dir()).unwrap().count(), 0);
    }

    #[test]
    fn test_artifact_fallback_finds_pdf() {
        let f = fixture();
        let source = f.repo.create(&f.project, smith(), None).unwrap();
        assert!(f.repo.artifact_path(&source).is_none());

        fs::write(source.path.join("b.PDF"), b"x").unwrap();
        fs::write(source.path.join("a.pdf"), b"x").unwrap();
        assert_eq!(f.repo.artifact_path(&source), Some(source.path.join("a.pdf")));
    }

    #[test]
    fn test_load_without_meta() {
        let f = fixture();
        let empty = f.project.sources_dir().join("Empty");
        fs::create_dir(&empty).unwrap();
        assert!(matches!(f.repo.load(&empty), Err(Error::NotFound(_))));
    }

    #[test]
    fn test_update_and_select_publish() {
        let f = fixture();
        let seen = record(&f.bus, &[EventKind::SourceUpdated, EventKind::SourceSelected]);
        let mut source = f.repo.create(&f.project, smith(), None).unwrap();

        source.meta.verified = true;
        f.repo.update(&mut source).unwrap();
        f.repo.select(&source);

        assert!(f.repo.load(&source.path).unwrap().meta.verified);
        assert_eq!(
            *seen.lock().unwrap(),
            vec![EventKind::SourceUpdated, EventKind::SourceSelected]
        );
    }

    #[test]
    fn test_search_fields() {
        let mut tagged = SourceMeta::new("Deep Nets", vec!["Lee, Ann".into()], Some(2019));
        tagged.tags = vec!["Machine-Learning".into()];
        let sources = vec![
            Source {
                path: PathBuf::from("/s/a"),
                meta: smith(),
            },
            Source {
                path: PathBuf::from("/s/b"),
                meta: tagged,
            },
        ];

        assert_eq!(SourceRepository::search("understanding", &sources).len(), 1);
        assert_eq!(SourceRepository::search("LEE", &sources).len(), 1);
        assert_eq!(SourceRepository::search("machine", &sources)[0].path, PathBuf::from("/s/b"));
        assert_eq!(SourceRepository::search("", &sources).len(), 2);
        assert!(SourceRepository::search("quantum", &sources).is_empty());
    }

    #[test]
    fn test_search_includes_source_once() {
        let mut meta = smith();
        meta.tags = vec!["smith-lab".into()];
        let sources = vec![Source {
            path: PathBuf::from("/s/a"),
            meta,
        }];
        assert_eq!(SourceRepository::search("smith", &sources).len(), 1);
    }

    #[test]
    fn test_delete_removes_folder() {
        let f = fixture();
        let seen = record(&f.bus, &[EventKind::SourceDeleted]);
        let source = f.repo.create(&f.project, smith(), None).unwrap();
        f.repo.delete(&source).unwrap();
        assert!(!source.path.exists());
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_add_and_remove_items() {
        let f = fixture();
        let seen = record(&f.bus, &[EventKind::NoteAdded, EventKind::NoteDeleted]);
        let source = f.repo.create(&f.project, smith(), None).unwrap();

        let p1 = f
            .repo
            .add_item::<Notes>(&source, NewNote::new("first").with_page(1))
            .unwrap();
        f.repo
            .add_item::<Notes>(&source, NewNote::new("fifth").with_page(5))
            .unwrap();

        let notes: Notes = f.repo.collection(&source).unwrap();
        assert_eq!(notes.len(), 2);
        assert_eq!(notes.get_by_page(1).len(), 1);

        assert!(f.repo.remove_item::<Notes>(&source, &p1.id).unwrap());
        assert!(!f.repo.remove_item::<Notes>(&source, &p1.id).unwrap());
        assert_eq!(f.repo.collection::<Notes>(&source).unwrap().len(), 1);

        assert_eq!(
            *seen.lock().unwrap(),
            vec![EventKind::NoteAdded, EventKind::NoteAdded, EventKind::NoteDeleted]
        );
    }

    #[test]
    fn test_update_item_and_complete_task() {
        let f = fixture();
        let seen = record(&f.bus, &[EventKind::QuoteUpdated, EventKind::TaskUpdated]);
        let source = f.repo.create(&f.project, smith(), None).unwrap();

        let quote = f
            .repo
            .add_item::<Quotes>(&source, NewQuote::new("Cogito").with_pages(3, None))
            .unwrap();
        let edited = f
            .repo
            .update_item::<Quotes, _>(&source, &quote.id, |q| q.comment = Some("classic".into()))
            .unwrap();
        assert_eq!(edited.comment.as_deref(), Some("classic"));

        let task = f
            .repo
            .add_item::<Tasks>(&source, NewTask::new("Verify citation"))
            .unwrap();
        let done = f.repo.complete_task(&source, &task.id).unwrap();
        assert_eq!(done.status, TaskStatus::Done);
        let tasks: Tasks = f.repo.collection(&source).unwrap();
        assert_eq!(tasks.open_count(), 0);

        assert!(matches!(
            f.repo.complete_task(&source, "t_missing"),
            Err(Error::NotFound(_))
        ));
        assert_eq!(
            *seen.lock().unwrap(),
            vec![EventKind::QuoteUpdated, EventKind::TaskUpdated]
        );
    }

    #[test]
    fn test_missing_collection_is_empty() {
        let f = fixture();
        let source = f.repo.create(&f.project, smith(), None).unwrap();
        fs::remove_file(source.collection_path::<Summaries>()).unwrap();
        let sums: Summaries = f.repo.collection(&source).unwrap();
        assert!(sums.is_empty());
    }
}
