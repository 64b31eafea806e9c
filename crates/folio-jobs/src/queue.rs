//! Single-worker job queue.
//!
//! Jobs are recorded in a [`JobTable`] guarded by one mutex and their ids are
//! sent over an unbounded channel to a dedicated worker thread. The worker
//! runs a current-thread tokio runtime and processes one job at a time in
//! submission order. It is started by the first [`JobQueue::add_job`] and
//! again by the first submission after [`JobQueue::stop`].

use std::collections::HashMap;
use std::sync::mpsc::{self as std_mpsc, RecvTimeoutError};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use folio_core::{
    defaults, AppSettings, EventKind, EventPayload, GenerationBackend, Job, JobId, JobStatus,
    JobType, NotificationBus, Result,
};
use folio_inference::build_prompt;
use serde_json::{Map, Value as JsonValue};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, instrument, warn};

/// Name of the worker thread.
pub const WORKER_THREAD_NAME: &str = "folio-job-worker";

/// Configuration for the job queue.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Upper bound on a single backend call, in seconds.
    pub job_timeout_secs: u64,
    /// How long `stop` waits for the worker, in milliseconds.
    pub stop_grace_ms: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            job_timeout_secs: defaults::GEN_TIMEOUT_SECS,
            stop_grace_ms: defaults::JOB_STOP_GRACE_MS,
        }
    }
}

impl QueueConfig {
    /// Take the request timeout from `ai_timeout_secs`.
    pub fn from_settings(settings: &AppSettings) -> Self {
        Self::default().with_job_timeout_secs(settings.ai_timeout_secs)
    }

    pub fn with_job_timeout_secs(mut self, secs: u64) -> Self {
        self.job_timeout_secs = secs.max(1);
        self
    }

    pub fn with_stop_grace_ms(mut self, ms: u64) -> Self {
        self.stop_grace_ms = ms;
        self
    }
}

/// Every job this queue has seen, in submission order.
#[derive(Debug, Default)]
struct JobTable {
    jobs: HashMap<JobId, Job>,
    order: Vec<JobId>,
    counter: u64,
}

impl JobTable {
    fn insert(&mut self, job_type: JobType, input_text: String, params: Map<String, JsonValue>) -> JobId {
        self.counter += 1;
        let id = JobId::generate(self.counter);
        self.order.push(id.clone());
        self.jobs
            .insert(id.clone(), Job::new(id.clone(), job_type, input_text, params));
        id
    }

    fn pending(&self) -> Vec<JobId> {
        self.order
            .iter()
            .filter(|id| {
                self.jobs
                    .get(*id)
                    .is_some_and(|job| job.status == JobStatus::Pending)
            })
            .cloned()
            .collect()
    }
}

/// State shared between callers and the worker.
struct Shared {
    table: Mutex<JobTable>,
    /// Signalled after every status change.
    changed: Condvar,
    backend: Arc<dyn GenerationBackend>,
    bus: Arc<NotificationBus>,
    job_timeout: Duration,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, JobTable> {
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Handle to a running worker thread.
struct Worker {
    tx: mpsc::UnboundedSender<JobId>,
    shutdown: oneshot::Sender<()>,
    exited: std_mpsc::Receiver<()>,
    thread: JoinHandle<()>,
}

/// FIFO queue of model jobs served by one background worker.
///
/// Dropping the queue signals the worker to exit after its current job.
pub struct JobQueue {
    shared: Arc<Shared>,
    config: QueueConfig,
    worker: Mutex<Option<Worker>>,
}

impl JobQueue {
    pub fn new(
        backend: Arc<dyn GenerationBackend>,
        bus: Arc<NotificationBus>,
        config: QueueConfig,
    ) -> Self {
        let shared = Shared {
            table: Mutex::new(JobTable::default()),
            changed: Condvar::new(),
            backend,
            bus,
            job_timeout: Duration::from_secs(config.job_timeout_secs),
        };
        Self {
            shared: Arc::new(shared),
            config,
            worker: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    /// Record a pending job and hand it to the worker. Never blocks on the
    /// job itself.
    pub fn add_job(
        &self,
        job_type: JobType,
        input_text: impl Into<String>,
        params: Map<String, JsonValue>,
    ) -> JobId {
        let mut worker = self.worker.lock().unwrap_or_else(PoisonError::into_inner);
        let id = self.shared.lock().insert(job_type, input_text.into(), params);
        debug!(
            subsystem = "jobs",
            component = "job_queue",
            job_id = %id,
            job_type = %job_type,
            "Job queued"
        );

        if let Some(running) = worker.as_ref() {
            if running.tx.send(id.clone()).is_ok() {
                return id;
            }
            debug!("Worker channel closed, starting a new worker");
        }

        // A new worker picks up every pending job, this one included.
        match self.spawn_worker() {
            Ok(started) => *worker = Some(started),
            Err(e) => error!(
                subsystem = "jobs",
                component = "job_queue",
                error = %e,
                "Failed to start job worker; job stays pending"
            ),
        }
        id
    }

    fn spawn_worker(&self) -> std::io::Result<Worker> {
        let (tx, rx) = mpsc::unbounded_channel();
        let pending = self.shared.lock().pending();
        let backlog = pending.len();
        for id in pending {
            let _ = tx.send(id);
        }

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let (exited_tx, exited_rx) = std_mpsc::channel();
        let shared = self.shared.clone();
        let thread = thread::Builder::new()
            .name(WORKER_THREAD_NAME.to_string())
            .spawn(move || {
                run_worker(shared, rx, shutdown_rx);
                let _ = exited_tx.send(());
            })?;

        info!(
            subsystem = "jobs",
            component = "job_queue",
            backlog,
            "Job worker started"
        );
        Ok(Worker {
            tx,
            shutdown: shutdown_tx,
            exited: exited_rx,
            thread,
        })
    }

    /// Snapshot of a job.
    pub fn get_job(&self, id: &JobId) -> Option<Job> {
        self.shared.lock().jobs.get(id).cloned()
    }

    /// Snapshots of every job in submission order.
    pub fn jobs(&self) -> Vec<Job> {
        let table = self.shared.lock();
        table
            .order
            .iter()
            .filter_map(|id| table.jobs.get(id).cloned())
            .collect()
    }

    pub fn pending_count(&self) -> usize {
        self.shared.lock().pending().len()
    }

    /// Cancel a job that has not started. Returns whether it was cancelled.
    pub fn cancel_job(&self, id: &JobId) -> bool {
        let cancelled = self.shared.lock().jobs.get_mut(id).is_some_and(Job::cancel);
        if cancelled {
            self.shared.changed.notify_all();
            info!(
                subsystem = "jobs",
                component = "job_queue",
                job_id = %id,
                "Job cancelled"
            );
        }
        cancelled
    }

    /// Block until `id` reaches a terminal state or `timeout` elapses, then
    /// return its snapshot. `None` for an unknown id.
    pub fn wait_for(&self, id: &JobId, timeout: Duration) -> Option<Job> {
        let deadline = Instant::now() + timeout;
        let mut table = self.shared.lock();
        loop {
            let job = table.jobs.get(id)?;
            let now = Instant::now();
            if job.status.is_terminal() || now >= deadline {
                return Some(job.clone());
            }
            table = self
                .shared
                .changed
                .wait_timeout(table, deadline - now)
                .map(|(guard, _)| guard)
                .unwrap_or_else(|poisoned| poisoned.into_inner().0);
        }
    }

    /// Whether a worker thread is currently alive.
    pub fn is_running(&self) -> bool {
        self.worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|w| !w.thread.is_finished())
    }

    /// Signal the worker to exit and wait up to the configured grace period.
    ///
    /// A job in flight is not interrupted; if it outlasts the grace period
    /// the worker is detached and exits once the job ends. Queued jobs stay
    /// pending until the next `add_job` starts a new worker.
    pub fn stop(&self) {
        let Some(worker) = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        else {
            return;
        };
        let Worker {
            tx,
            shutdown,
            exited,
            thread,
        } = worker;
        let _ = shutdown.send(());
        drop(tx);

        let grace = Duration::from_millis(self.config.stop_grace_ms);
        match exited.recv_timeout(grace) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                if thread.join().is_err() {
                    warn!(subsystem = "jobs", component = "job_queue", "Job worker panicked");
                }
                info!(subsystem = "jobs", component = "job_queue", "Job worker stopped");
            }
            Err(RecvTimeoutError::Timeout) => warn!(
                subsystem = "jobs",
                component = "job_queue",
                grace_ms = self.config.stop_grace_ms,
                "Job worker still busy after grace period, detaching"
            ),
        }
    }

    /// Whether the model service is reachable.
    pub async fn is_available(&self) -> bool {
        self.shared.backend.is_available().await
    }

    /// Models installed on the model service.
    pub async fn list_models(&self) -> Result<Vec<String>> {
        self.shared.backend.list_models().await
    }
}

fn run_worker(
    shared: Arc<Shared>,
    mut rx: mpsc::UnboundedReceiver<JobId>,
    mut shutdown: oneshot::Receiver<()>,
) {
    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!(
                subsystem = "jobs",
                component = "job_worker",
                error = %e,
                "Failed to build worker runtime"
            );
            return;
        }
    };

    runtime.block_on(async {
        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => break,
                next = rx.recv() => match next {
                    Some(id) => process_job(&shared, id).await,
                    None => break,
                },
            }
        }
    });
    debug!(subsystem = "jobs", component = "job_worker", "Worker loop exited");
}

fn job_payload(job: &Job) -> EventPayload {
    EventPayload::Job {
        job_id: job.id.clone(),
        job_type: job.job_type,
        status: job.status,
        error: job.error.clone(),
    }
}

#[instrument(skip(shared), fields(subsystem = "jobs", component = "job_worker", op = "process", job_id = %id))]
async fn process_job(shared: &Shared, id: JobId) {
    let start = Instant::now();
    let job = {
        let mut table = shared.lock();
        let Some(job) = table.jobs.get_mut(&id) else {
            return;
        };
        if !job.mark_running() {
            debug!(status = %job.status, "Job no longer pending, skipping");
            return;
        }
        if job.model().is_none() {
            job.params.insert(
                "model".to_string(),
                JsonValue::String(shared.backend.default_model().to_string()),
            );
        }
        job.clone()
    };
    shared.changed.notify_all();
    info!(job_type = %job.job_type, model = job.model().unwrap_or_default(), "Processing job");
    shared.bus.publish(EventKind::JobStarted, job_payload(&job));

    let prompt = build_prompt(job.job_type, &job.input_text);
    let outcome = match tokio::time::timeout(
        shared.job_timeout,
        shared.backend.generate(job.model(), &prompt),
    )
    .await
    {
        Ok(result) => result.map_err(|e| e.to_string()),
        Err(_) => Err(format!(
            "Job exceeded timeout of {}s",
            shared.job_timeout.as_secs()
        )),
    };

    let finished = {
        let mut table = shared.lock();
        let Some(entry) = table.jobs.get_mut(&id) else {
            return;
        };
        match outcome {
            Ok(text) => entry.mark_completed(text),
            Err(message) => entry.mark_failed(message),
        };
        entry.clone()
    };
    shared.changed.notify_all();

    let duration_ms = start.elapsed().as_millis() as u64;
    let kind = if finished.status == JobStatus::Completed {
        info!(
            duration_ms,
            response_len = finished.result.as_deref().map_or(0, str::len),
            "Job completed"
        );
        EventKind::JobCompleted
    } else {
        warn!(
            duration_ms,
            error = finished.error.as_deref().unwrap_or_default(),
            "Job failed"
        );
        EventKind::JobFailed
    };
    shared.bus.publish(kind, job_payload(&finished));
}
