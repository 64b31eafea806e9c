//! folio: command-line front end for folder-based reference projects.
//!
//! Environment variables:
//!   FOLIO_SETTINGS - settings file (default: ~/.config/folio/settings.toml)
//!   FOLIO_PROJECT  - project used when `--project` is omitted
//!   LOG_FORMAT     - "json" or "text" (default: "text")
//!   RUST_LOG       - standard env filter (default: "folio=info")

mod app;

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use folio_core::{
    timestamp, CitationStyle, Collection, EventKind, EventPayload, GenerationBackend, JobType,
    NewNote, NewTask, Notes, SourceMeta, SourceType, TaskPriority, Tasks,
};
use folio_jobs::{store_metadata, store_quotes, store_summary};
use folio_store::SourceRepository;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::app::App;

#[derive(Parser)]
#[command(name = "folio")]
#[command(author, version, about = "Folder-based reference management")]
#[command(propagate_version = true)]
struct Cli {
    /// Settings file
    #[arg(long, global = true, env = "FOLIO_SETTINGS")]
    settings: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct ProjectArg {
    /// Project directory (default: most recently opened project)
    #[arg(short, long, env = "FOLIO_PROJECT")]
    project: Option<PathBuf>,
}

#[derive(Args)]
struct JobInput {
    /// Source folder name
    #[arg(short, long)]
    source: String,

    /// Text to process (default: the source's abstract)
    #[arg(long, conflicts_with = "text_file")]
    text: Option<String>,

    /// Read the text to process from a file
    #[arg(long)]
    text_file: Option<PathBuf>,

    /// Model to use instead of the configured one
    #[arg(short, long)]
    model: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new project
    Init {
        /// Directory to create (must be absent or empty)
        path: PathBuf,

        /// Project name (default: directory name)
        #[arg(short, long)]
        name: Option<String>,

        #[arg(short, long)]
        description: Option<String>,

        /// Citation style: apa, mla, chicago, din, harvard
        #[arg(long, default_value = "apa")]
        style: CitationStyle,
    },

    /// Open a project and list its sources
    Open {
        path: PathBuf,
    },

    /// Add a source to a project
    AddSource {
        #[command(flatten)]
        project: ProjectArg,

        #[arg(short, long)]
        title: String,

        /// Author as "Surname, Given" (repeatable)
        #[arg(short, long = "author")]
        authors: Vec<String>,

        #[arg(short, long)]
        year: Option<i32>,

        /// Source type: article, book, chapter, thesis, conference, website, other
        #[arg(long = "type", default_value = "article")]
        source_type: SourceType,

        #[arg(long)]
        doi: Option<String>,

        /// Tag (repeatable)
        #[arg(long = "tag")]
        tags: Vec<String>,

        /// File to copy into the source folder (usually a PDF)
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// List the sources of a project
    List {
        #[command(flatten)]
        project: ProjectArg,
    },

    /// Search sources by title, author, or tag
    Search {
        #[command(flatten)]
        project: ProjectArg,

        query: String,
    },

    /// Add a note to a source
    Note {
        #[command(flatten)]
        project: ProjectArg,

        /// Source folder name
        #[arg(short, long)]
        source: String,

        content: String,

        #[arg(long)]
        page: Option<u32>,

        /// Tag (repeatable)
        #[arg(long = "tag")]
        tags: Vec<String>,
    },

    /// Manage project or source tasks
    Task {
        #[command(flatten)]
        project: ProjectArg,

        /// Source folder name (default: project tasks)
        #[arg(short, long)]
        source: Option<String>,

        #[command(subcommand)]
        action: TaskAction,
    },

    /// Summarize text with the model service and store the summary
    Summarize {
        #[command(flatten)]
        project: ProjectArg,

        #[command(flatten)]
        input: JobInput,

        /// Title of the stored summary
        #[arg(long, default_value = "AI summary")]
        title: String,
    },

    /// Extract quotes with the model service and store them
    ExtractQuotes {
        #[command(flatten)]
        project: ProjectArg,

        #[command(flatten)]
        input: JobInput,
    },

    /// Fill missing metadata fields with the model service
    LookupMetadata {
        #[command(flatten)]
        project: ProjectArg,

        #[command(flatten)]
        input: JobInput,
    },

    /// Show model service status and installed models
    Models,

    /// Show recently opened projects
    Recent,
}

#[derive(Subcommand)]
enum TaskAction {
    /// Add a task
    Add {
        title: String,

        /// low, normal, high, urgent
        #[arg(long, default_value = "normal")]
        priority: TaskPriority,

        /// Due date (YYYY-MM-DD)
        #[arg(long)]
        due: Option<String>,
    },

    /// Mark a task done
    Done {
        id: String,
    },

    /// List tasks
    List {
        /// Include finished tasks
        #[arg(long)]
        all: bool,
    },
}

fn init_tracing() {
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "folio=info".into());
    let registry = tracing_subscriber::registry().with(env_filter);

    // stdout carries command output; logs go to stderr.
    if log_format == "json" {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    init_tracing();
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let app = App::load(cli.settings)?;

    match cli.command {
        Commands::Init {
            path,
            name,
            description,
            style,
        } => cmd_init(&app, path, name, description, style),
        Commands::Open { path } => cmd_list(&app, Some(path)),
        Commands::AddSource {
            project,
            title,
            authors,
            year,
            source_type,
            doi,
            tags,
            file,
        } => {
            let mut meta = SourceMeta::new(title, authors, year);
            meta.source_type = source_type;
            meta.doi = doi;
            meta.tags = tags;
            cmd_add_source(&app, project.project, meta, file)
        }
        Commands::List { project } => cmd_list(&app, project.project),
        Commands::Search { project, query } => cmd_search(&app, project.project, &query),
        Commands::Note {
            project,
            source,
            content,
            page,
            tags,
        } => {
            let mut note = NewNote::new(content).with_tags(tags);
            if let Some(page) = page {
                note = note.with_page(page);
            }
            cmd_note(&app, project.project, &source, note)
        }
        Commands::Task {
            project,
            source,
            action,
        } => cmd_task(&app, project.project, source.as_deref(), action),
        Commands::Summarize {
            project,
            input,
            title,
        } => cmd_model_job(&app, project.project, input, JobType::Summarize, &title),
        Commands::ExtractQuotes { project, input } => {
            cmd_model_job(&app, project.project, input, JobType::ExtractQuotes, "")
        }
        Commands::LookupMetadata { project, input } => {
            cmd_model_job(&app, project.project, input, JobType::MetadataLookup, "")
        }
        Commands::Models => cmd_models(&app),
        Commands::Recent => cmd_recent(&app),
    }
}

fn cmd_init(
    app: &App,
    path: PathBuf,
    name: Option<String>,
    description: Option<String>,
    style: CitationStyle,
) -> Result<()> {
    let name = match name {
        Some(name) => name,
        None => path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .context("cannot derive a project name from the path; pass --name")?,
    };
    let project = app.projects.create(&path, &name, description, style)?;
    println!(
        "Created project {} at {}",
        project.name(),
        project.root.display()
    );
    Ok(())
}

fn cmd_add_source(
    app: &App,
    project: Option<PathBuf>,
    meta: SourceMeta,
    file: Option<PathBuf>,
) -> Result<()> {
    let project = app.open_project(project.as_deref())?;
    let source = app.sources.create(&project, meta, file.as_deref())?;
    println!(
        "Created source {} ({})",
        source.name(),
        source.meta.citation_key()
    );
    Ok(())
}

fn cmd_list(app: &App, project: Option<PathBuf>) -> Result<()> {
    let project = app.open_project(project.as_deref())?;
    let sources = app.projects.load_sources(&project)?;
    println!("{} ({} sources)", project.name(), sources.len());
    for source in &sources {
        println!("{}\t{}", source.name(), source.meta);
    }
    Ok(())
}

fn cmd_search(app: &App, project: Option<PathBuf>, query: &str) -> Result<()> {
    let project = app.open_project(project.as_deref())?;
    let sources = app.projects.load_sources(&project)?;
    let matches = SourceRepository::search(query, &sources);
    if matches.is_empty() {
        println!("No matches for \"{}\"", query);
    }
    for source in matches {
        println!("{}\t{}", source.name(), source.meta);
    }
    Ok(())
}

fn cmd_note(app: &App, project: Option<PathBuf>, folder: &str, note: NewNote) -> Result<()> {
    let project = app.open_project(project.as_deref())?;
    let source = app.source(&project, folder)?;
    let note = app.sources.add_item::<Notes>(&source, note)?;
    println!("Added note {} to {}", note.id, source.name());
    Ok(())
}

fn cmd_task(
    app: &App,
    project: Option<PathBuf>,
    folder: Option<&str>,
    action: TaskAction,
) -> Result<()> {
    let project = app.open_project(project.as_deref())?;
    let source = folder.map(|f| app.source(&project, f)).transpose()?;

    match action {
        TaskAction::Add {
            title,
            priority,
            due,
        } => {
            let mut task = NewTask::new(title).with_priority(priority);
            if let Some(due) = due {
                if timestamp::parse_due_date(&due).is_none() {
                    bail!("invalid due date {:?}; expected YYYY-MM-DD", due);
                }
                task = task.with_due_date(due);
            }
            let task = match &source {
                Some(source) => app.sources.add_item::<Tasks>(source, task)?,
                None => app.projects.add_item::<Tasks>(&project, task)?,
            };
            println!("Added task {}", task.id);
        }
        TaskAction::Done { id } => {
            match &source {
                Some(source) => {
                    app.sources.complete_task(source, &id)?;
                }
                None => {
                    app.projects.complete_task(&project, &id)?;
                }
            }
            println!("Completed task {}", id);
        }
        TaskAction::List { all } => {
            let tasks: Tasks = match &source {
                Some(source) => app.sources.collection(source)?,
                None => app.projects.project_tasks(&project)?,
            };
            for task in tasks.items().iter().filter(|t| all || t.is_open()) {
                let flag = if task.is_overdue() { " (overdue)" } else { "" };
                println!(
                    "{}\t{}\t{}\t{}{}\t{}",
                    task.id,
                    task.status,
                    task.priority,
                    task.due_date.as_deref().unwrap_or("-"),
                    flag,
                    task.title
                );
            }
        }
    }
    Ok(())
}

fn cmd_model_job(
    app: &App,
    project: Option<PathBuf>,
    input: JobInput,
    job_type: JobType,
    title: &str,
) -> Result<()> {
    let project = app.open_project(project.as_deref())?;
    let mut source = app.source(&project, &input.source)?;

    let text = match (input.text, input.text_file) {
        (Some(text), _) => text,
        (None, Some(path)) => fs::read_to_string(&path)
            .with_context(|| format!("reading {}", path.display()))?,
        (None, None) => source
            .meta
            .abstract_text
            .clone()
            .filter(|a| !a.trim().is_empty())
            .context("source has no abstract; pass --text or --text-file")?,
    };

    app.bus.on(EventKind::JobStarted, |event| {
        if let EventPayload::Job {
            job_id, job_type, ..
        } = &event.payload
        {
            eprintln!("Running {} job {}...", job_type, job_id);
        }
        Ok(())
    });

    let job = app.run_job(job_type, text, input.model)?;
    match job_type {
        JobType::Summarize => {
            let summary = store_summary(&app.sources, &source, &job, title)?;
            println!("{}", summary.content);
            println!("Saved summary {} to {}", summary.id, source.name());
        }
        JobType::ExtractQuotes => {
            let quotes = store_quotes(&app.sources, &source, &job)?;
            for quote in &quotes {
                println!("\"{}\"", quote.text);
            }
            println!("Saved {} quotes to {}", quotes.len(), source.name());
        }
        JobType::MetadataLookup => {
            let filled = store_metadata(&app.sources, &mut source, &job)?;
            if filled.is_empty() {
                println!("No new metadata for {}", source.name());
            } else {
                println!("Filled {} for {}", filled.join(", "), source.name());
            }
        }
    }
    Ok(())
}

fn cmd_models(app: &App) -> Result<()> {
    let backend = app.backend()?;
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("building async runtime")?;

    if !runtime.block_on(backend.is_available()) {
        println!("Model service at {} is not reachable", backend.base_url());
        return Ok(());
    }
    println!("Model service at {} is available", backend.base_url());
    for model in runtime.block_on(backend.list_models())? {
        let marker = if model == backend.default_model() { " (default)" } else { "" };
        println!("  {}{}", model, marker);
    }
    Ok(())
}

fn cmd_recent(app: &App) -> Result<()> {
    let recent = app.projects.recent();
    if recent.entries().is_empty() {
        println!("No recent projects");
    }
    for path in recent.entries() {
        let marker = if path.is_dir() { "" } else { " (missing)" };
        println!("{}{}", path.display(), marker);
    }
    Ok(())
}
