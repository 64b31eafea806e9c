//! Reading and follow-up tasks.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::defaults;
use crate::error::Error;
use crate::events::EventKind;
use crate::ids;
use crate::timestamp;
use crate::traits::{Collection, CollectionItem, Document, DocumentKind};
use crate::version::default_schema_version;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Open,
    InProgress,
    Done,
    Cancelled,
}

impl TaskStatus {
    pub fn is_open(&self) -> bool {
        matches!(self, TaskStatus::Open | TaskStatus::InProgress)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TaskStatus::Open => "open",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Done => "done",
            TaskStatus::Cancelled => "cancelled",
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    Low,
    #[default]
    Normal,
    High,
    Urgent,
}

impl fmt::Display for TaskPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TaskPriority::Low => "low",
            TaskPriority::Normal => "normal",
            TaskPriority::High => "high",
            TaskPriority::Urgent => "urgent",
        })
    }
}

impl FromStr for TaskPriority {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(TaskPriority::Low),
            "normal" => Ok(TaskPriority::Normal),
            "high" => Ok(TaskPriority::High),
            "urgent" => Ok(TaskPriority::Urgent),
            other => Err(Error::InvalidInput(format!("unknown task priority: {}", other))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: TaskStatus,
    #[serde(default)]
    pub priority: TaskPriority,
    /// ISO date or datetime; see [`timestamp::parse_due_date`].
    #[serde(default)]
    pub due_date: Option<String>,
    #[serde(default)]
    pub page: Option<u32>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(with = "timestamp", default = "timestamp::unknown")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "timestamp::option", default)]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Task {
    pub fn complete(&mut self) {
        self.status = TaskStatus::Done;
        self.completed_at = Some(timestamp::now());
    }

    pub fn is_open(&self) -> bool {
        self.status.is_open()
    }

    /// Due date as an instant, if set and parseable.
    pub fn due(&self) -> Option<DateTime<Utc>> {
        self.due_date.as_deref().and_then(timestamp::parse_due_date)
    }

    /// Open and past its due date at `now`. Unparseable due dates never count.
    pub fn is_overdue_at(&self, now: DateTime<Utc>) -> bool {
        self.is_open() && self.due().is_some_and(|due| now > due)
    }

    pub fn is_overdue(&self) -> bool {
        self.is_overdue_at(Utc::now())
    }
}

impl CollectionItem for Task {
    fn id(&self) -> &str {
        &self.id
    }

    fn tags(&self) -> &[String] {
        &self.tags
    }
}

/// Fields supplied when adding a task.
#[derive(Debug, Clone, Default)]
pub struct NewTask {
    pub title: String,
    pub description: Option<String>,
    pub priority: TaskPriority,
    pub due_date: Option<String>,
    pub page: Option<u32>,
    pub tags: Vec<String>,
}

impl NewTask {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }

    pub fn with_priority(mut self, priority: TaskPriority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_due_date(mut self, due_date: impl Into<String>) -> Self {
        self.due_date = Some(due_date.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tasks {
    #[serde(default = "default_schema_version")]
    pub schema_version: String,
    #[serde(default)]
    pub tasks: Vec<Task>,
}

impl Default for Tasks {
    fn default() -> Self {
        Self {
            schema_version: default_schema_version(),
            tasks: Vec::new(),
        }
    }
}

impl Tasks {
    pub fn get_open(&self) -> Vec<&Task> {
        self.tasks.iter().filter(|t| t.is_open()).collect()
    }

    pub fn get_overdue(&self) -> Vec<&Task> {
        let now = Utc::now();
        self.tasks.iter().filter(|t| t.is_overdue_at(now)).collect()
    }

    pub fn get_by_priority(&self, priority: TaskPriority) -> Vec<&Task> {
        self.tasks.iter().filter(|t| t.priority == priority).collect()
    }

    /// Mark the task done. Returns `false` for an unknown id.
    pub fn complete(&mut self, id: &str) -> bool {
        match self.get_mut(id) {
            Some(task) => {
                task.complete();
                true
            }
            None => false,
        }
    }

    pub fn open_count(&self) -> usize {
        self.tasks.iter().filter(|t| t.is_open()).count()
    }
}

impl Document for Tasks {
    const KIND: DocumentKind = DocumentKind::Tasks;

    fn schema_version(&self) -> &str {
        &self.schema_version
    }
}

impl Collection for Tasks {
    type Item = Task;
    type NewItem = NewTask;

    const FILE_NAME: &'static str = defaults::TASKS_FILE;
    const ID_PREFIX: &'static str = ids::TASK_PREFIX;

    const ADDED: EventKind = EventKind::TaskAdded;
    const UPDATED: EventKind = EventKind::TaskUpdated;
    const DELETED: EventKind = EventKind::TaskDeleted;

    fn items(&self) -> &[Task] {
        &self.tasks
    }

    fn items_mut(&mut self) -> &mut Vec<Task> {
        &mut self.tasks
    }

    fn build_item(id: String, new: NewTask) -> Task {
        Task {
            id,
            title: new.title,
            description: new.description,
            status: TaskStatus::Open,
            priority: new.priority,
            due_date: new.due_date,
            page: new.page,
            tags: new.tags,
            created_at: timestamp::now(),
            completed_at: None,
        }
    }
}
