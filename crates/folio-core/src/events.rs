//! Notification bus for keeping consumers in sync with mutations.
//!
//! Repositories and the job worker publish an [`Event`] after every change.
//! Subscribers register a handler per [`EventKind`]; handlers run
//! synchronously on the publishing thread, in registration order. A failing
//! or panicking handler is logged and recorded but never reaches the
//! publisher, and never stops later handlers from running.
//!
//! Async consumers can additionally call [`NotificationBus::stream`] to get a
//! broadcast receiver of every published event.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{trace, warn};
use uuid::Uuid;

use crate::defaults;
use crate::ids::new_v7;
use crate::models::{JobId, JobStatus, JobType};

// ============================================================================
// Event catalog
// ============================================================================

/// Every kind of event the bus carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    ProjectOpened,
    ProjectClosed,
    ProjectSaved,
    SourceCreated,
    SourceUpdated,
    SourceDeleted,
    SourceSelected,
    NoteAdded,
    NoteUpdated,
    NoteDeleted,
    QuoteAdded,
    QuoteUpdated,
    QuoteDeleted,
    TaskAdded,
    TaskUpdated,
    TaskDeleted,
    SummaryAdded,
    SummaryUpdated,
    SummaryDeleted,
    JobStarted,
    JobCompleted,
    JobFailed,
    StatusMessage,
    ErrorMessage,
    RefreshRequested,
}

impl EventKind {
    pub const ALL: [EventKind; 25] = [
        EventKind::ProjectOpened,
        EventKind::ProjectClosed,
        EventKind::ProjectSaved,
        EventKind::SourceCreated,
        EventKind::SourceUpdated,
        EventKind::SourceDeleted,
        EventKind::SourceSelected,
        EventKind::NoteAdded,
        EventKind::NoteUpdated,
        EventKind::NoteDeleted,
        EventKind::QuoteAdded,
        EventKind::QuoteUpdated,
        EventKind::QuoteDeleted,
        EventKind::TaskAdded,
        EventKind::TaskUpdated,
        EventKind::TaskDeleted,
        EventKind::SummaryAdded,
        EventKind::SummaryUpdated,
        EventKind::SummaryDeleted,
        EventKind::JobStarted,
        EventKind::JobCompleted,
        EventKind::JobFailed,
        EventKind::StatusMessage,
        EventKind::ErrorMessage,
        EventKind::RefreshRequested,
    ];

    /// Dot-namespaced name (e.g., `"note.added"`, `"job.started"`).
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::ProjectOpened => "project.opened",
            EventKind::ProjectClosed => "project.closed",
            EventKind::ProjectSaved => "project.saved",
            EventKind::SourceCreated => "source.created",
            EventKind::SourceUpdated => "source.updated",
            EventKind::SourceDeleted => "source.deleted",
            EventKind::SourceSelected => "source.selected",
            EventKind::NoteAdded => "note.added",
            EventKind::NoteUpdated => "note.updated",
            EventKind::NoteDeleted => "note.deleted",
            EventKind::QuoteAdded => "quote.added",
            EventKind::QuoteUpdated => "quote.updated",
            EventKind::QuoteDeleted => "quote.deleted",
            EventKind::TaskAdded => "task.added",
            EventKind::TaskUpdated => "task.updated",
            EventKind::TaskDeleted => "task.deleted",
            EventKind::SummaryAdded => "summary.added",
            EventKind::SummaryUpdated => "summary.updated",
            EventKind::SummaryDeleted => "summary.deleted",
            EventKind::JobStarted => "job.started",
            EventKind::JobCompleted => "job.completed",
            EventKind::JobFailed => "job.failed",
            EventKind::StatusMessage => "status.message",
            EventKind::ErrorMessage => "error.message",
            EventKind::RefreshRequested => "refresh.requested",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Event envelope
// ============================================================================

/// Domain data carried by an event.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventPayload {
    None,
    Project {
        root: PathBuf,
        name: String,
    },
    Source {
        folder: PathBuf,
        title: String,
    },
    /// A collection item; `owner` is the source folder or project root.
    Item {
        owner: PathBuf,
        item_id: String,
    },
    Job {
        job_id: JobId,
        job_type: JobType,
        status: JobStatus,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    Message {
        text: String,
    },
}

/// A published event.
#[derive(Debug, Clone, Serialize)]
pub struct Event {
    /// Unique event identifier (UUIDv7 for temporal ordering).
    pub event_id: Uuid,
    pub kind: EventKind,
    pub occurred_at: DateTime<Utc>,
    pub payload: EventPayload,
}

impl Event {
    pub fn new(kind: EventKind, payload: EventPayload) -> Self {
        Self {
            event_id: new_v7(),
            kind,
            occurred_at: Utc::now(),
            payload,
        }
    }
}

// ============================================================================
// Bus
// ============================================================================

/// A subscriber callback. Identity (for unsubscribe) is the `Arc` allocation.
pub type Handler = Arc<dyn Fn(&Event) -> anyhow::Result<()> + Send + Sync>;

/// A handler invocation that returned an error or panicked.
#[derive(Debug, Clone)]
pub struct HandlerFailure {
    pub event_id: Uuid,
    pub kind: EventKind,
    pub message: String,
}

fn same_handler(a: &Handler, b: &Handler) -> bool {
    std::ptr::eq(Arc::as_ptr(a) as *const (), Arc::as_ptr(b) as *const ())
}

/// Publish/subscribe hub shared as `Arc<NotificationBus>`.
pub struct NotificationBus {
    handlers: RwLock<HashMap<EventKind, Vec<Handler>>>,
    failures: Mutex<VecDeque<HandlerFailure>>,
    tx: broadcast::Sender<Event>,
}

impl NotificationBus {
    pub fn new() -> Self {
        Self::with_capacity(defaults::EVENT_BUS_CAPACITY)
    }

    /// Create a bus whose [`stream`](Self::stream) buffers `capacity` events.
    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self {
            handlers: RwLock::new(HashMap::new()),
            failures: Mutex::new(VecDeque::new()),
            tx,
        }
    }

    /// Register `handler` for `kind`. Registering the same handler twice is a no-op.
    pub fn subscribe(&self, kind: EventKind, handler: Handler) {
        let mut handlers = self.handlers.write().unwrap_or_else(PoisonError::into_inner);
        let list = handlers.entry(kind).or_default();
        if !list.iter().any(|h| same_handler(h, &handler)) {
            list.push(handler);
        }
    }

    /// Wrap `f` as a handler, register it, and return it for later unsubscribe.
    pub fn on<F>(&self, kind: EventKind, f: F) -> Handler
    where
        F: Fn(&Event) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let handler: Handler = Arc::new(f);
        self.subscribe(kind, handler.clone());
        handler
    }

    /// Remove `handler` from `kind`. Returns whether it was registered.
    pub fn unsubscribe(&self, kind: EventKind, handler: &Handler) -> bool {
        let mut handlers = self.handlers.write().unwrap_or_else(PoisonError::into_inner);
        match handlers.get_mut(&kind) {
            Some(list) => {
                let before = list.len();
                list.retain(|h| !same_handler(h, handler));
                list.len() != before
            }
            None => false,
        }
    }

    /// Remove every handler.
    pub fn clear(&self) {
        self.handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    pub fn handler_count(&self, kind: EventKind) -> usize {
        self.handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&kind)
            .map_or(0, Vec::len)
    }

    /// Deliver an event to every handler registered for `kind`.
    ///
    /// Dispatch iterates a snapshot, so handlers may subscribe, unsubscribe,
    /// or publish re-entrantly. Changes apply from the next publish.
    pub fn publish(&self, kind: EventKind, payload: EventPayload) {
        let event = Event::new(kind, payload);
        let snapshot: Vec<Handler> = self
            .handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&kind)
            .cloned()
            .unwrap_or_default();

        trace!(
            subsystem = "events",
            component = "notification_bus",
            event_kind = %kind,
            event_id = %event.event_id,
            handler_count = snapshot.len(),
            "Dispatching event"
        );

        for handler in snapshot {
            let outcome = catch_unwind(AssertUnwindSafe(|| handler(&event)));
            let message = match outcome {
                Ok(Ok(())) => continue,
                Ok(Err(e)) => format!("{:#}", e),
                Err(panic) => panic_message(panic.as_ref()),
            };
            warn!(
                subsystem = "events",
                component = "notification_bus",
                event_kind = %kind,
                event_id = %event.event_id,
                error = %message,
                "Event handler failed"
            );
            self.record_failure(HandlerFailure {
                event_id: event.event_id,
                kind,
                message,
            });
        }

        // No receivers is fine.
        let _ = self.tx.send(event);
    }

    /// Convenience for `StatusMessage`.
    pub fn status(&self, text: impl Into<String>) {
        self.publish(
            EventKind::StatusMessage,
            EventPayload::Message { text: text.into() },
        );
    }

    /// Convenience for `ErrorMessage`.
    pub fn error(&self, text: impl Into<String>) {
        self.publish(
            EventKind::ErrorMessage,
            EventPayload::Message { text: text.into() },
        );
    }

    /// Receive every published event asynchronously. Slow receivers lag and drop events.
    pub fn stream(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }

    /// Most recent handler failures, oldest first.
    pub fn failures(&self) -> Vec<HandlerFailure> {
        self.failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }

    fn record_failure(&self, failure: HandlerFailure) {
        let mut failures = self.failures.lock().unwrap_or_else(PoisonError::into_inner);
        if failures.len() == defaults::EVENT_FAILURES_RETAINED {
            failures.pop_front();
        }
        failures.push_back(failure);
    }
}

impl Default for NotificationBus {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for NotificationBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let handlers = self.handlers.read().unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("NotificationBus")
            .field("kinds", &handlers.len())
            .field("stream_receivers", &self.tx.receiver_count())
            .finish()
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        format!("handler panicked: {}", s)
    } else if let Some(s) = panic.downcast_ref::<String>() {
        format!("handler panicked: {}", s)
    } else {
        "handler panicked".to_string()
    }
}

// ============================================================================
// Tests
// ============================================================================
