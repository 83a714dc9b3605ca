pub mod runner;
pub mod scheduler;
pub mod worker;

pub use runner::{BatchOutcome, CheckSignalOutcome, TaskRunner, WarningsOutcome};
pub use scheduler::{run_expiration_scheduler, SchedulerConfig};
pub use worker::run_task_worker;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use uuid::Uuid;

/// Named background task payloads. The wire names are the queue's
/// contract with schedulers and the manual-enqueue API.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "name", content = "payload", rename_all = "kebab-case")]
pub enum Task {
    CheckSignalExpiration { signal_id: Uuid },
    CheckAllExpirations,
    CheckGracePeriods,
    SendExpirationWarnings { minutes_before: i64 },
    HandleSignalCancellation { signal_id: Uuid },
}

impl Task {
    pub fn name(&self) -> &'static str {
        match self {
            Task::CheckSignalExpiration { .. } => "check-signal-expiration",
            Task::CheckAllExpirations => "check-all-expirations",
            Task::CheckGracePeriods => "check-grace-periods",
            Task::SendExpirationWarnings { .. } => "send-expiration-warnings",
            Task::HandleSignalCancellation { .. } => "handle-signal-cancellation",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Queued,
    Running,
    Completed,
    Failed,
}

/// Bookkeeping for one enqueued task, queryable by handle.
#[derive(Debug, Clone, Serialize)]
pub struct JobRecord {
    pub id: Uuid,
    pub task_name: String,
    pub state: JobState,
    pub enqueued_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

type JobRegistry = Arc<Mutex<HashMap<Uuid, JobRecord>>>;

/// Terminal (completed/failed) records retained for status lookups.
/// The scheduler enqueues tasks indefinitely, so the registry must not
/// grow without bound.
const MAX_TERMINAL_JOBS: usize = 256;

fn evict_terminal_jobs(jobs: &mut HashMap<Uuid, JobRecord>) {
    let mut terminal: Vec<(Uuid, DateTime<Utc>)> = jobs
        .values()
        .filter(|r| matches!(r.state, JobState::Completed | JobState::Failed))
        .map(|r| (r.id, r.finished_at.unwrap_or(r.enqueued_at)))
        .collect();
    if terminal.len() <= MAX_TERMINAL_JOBS {
        return;
    }

    terminal.sort_by_key(|(_, finished)| *finished);
    let excess = terminal.len() - MAX_TERMINAL_JOBS;
    for (id, _) in terminal.into_iter().take(excess) {
        jobs.remove(&id);
    }
}

/// In-process task queue: enqueue returns a handle, a single worker
/// drains the channel. The host scheduler's retry/backoff policy lives
/// outside this engine; handlers only report success or failure.
#[derive(Clone)]
pub struct TaskQueue {
    tx: mpsc::Sender<(Uuid, Task)>,
    registry: JobRegistry,
}

impl TaskQueue {
    /// Create the queue and the receiving end for `run_task_worker`.
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<(Uuid, Task)>) {
        let (tx, rx) = mpsc::channel(capacity);
        let queue = Self {
            tx,
            registry: Arc::new(Mutex::new(HashMap::new())),
        };
        (queue, rx)
    }

    pub async fn enqueue(&self, task: Task) -> anyhow::Result<Uuid> {
        let id = Uuid::new_v4();
        let record = JobRecord {
            id,
            task_name: task.name().to_string(),
            state: JobState::Queued,
            enqueued_at: Utc::now(),
            started_at: None,
            finished_at: None,
            result: None,
            error: None,
        };
        self.registry.lock().unwrap().insert(id, record);

        self.tx
            .send((id, task))
            .await
            .map_err(|_| anyhow::anyhow!("task queue is closed"))?;

        Ok(id)
    }

    pub fn job(&self, id: Uuid) -> Option<JobRecord> {
        self.registry.lock().unwrap().get(&id).cloned()
    }

    pub(crate) fn mark_running(&self, id: Uuid) {
        if let Some(record) = self.registry.lock().unwrap().get_mut(&id) {
            record.state = JobState::Running;
            record.started_at = Some(Utc::now());
        }
    }

    pub(crate) fn mark_completed(&self, id: Uuid, result: serde_json::Value) {
        let mut jobs = self.registry.lock().unwrap();
        if let Some(record) = jobs.get_mut(&id) {
            record.state = JobState::Completed;
            record.finished_at = Some(Utc::now());
            record.result = Some(result);
        }
        evict_terminal_jobs(&mut jobs);
    }

    pub(crate) fn mark_failed(&self, id: Uuid, error: String) {
        let mut jobs = self.registry.lock().unwrap();
        if let Some(record) = jobs.get_mut(&id) {
            record.state = JobState::Failed;
            record.finished_at = Some(Utc::now());
            record.error = Some(error);
        }
        evict_terminal_jobs(&mut jobs);
    }

    // Convenience wrappers mirroring the scheduler's entry points.

    pub async fn queue_expiration_check(&self, signal_id: Uuid) -> anyhow::Result<Uuid> {
        self.enqueue(Task::CheckSignalExpiration { signal_id }).await
    }

    pub async fn queue_batch_expiration_check(&self) -> anyhow::Result<Uuid> {
        self.enqueue(Task::CheckAllExpirations).await
    }

    pub async fn queue_grace_period_check(&self) -> anyhow::Result<Uuid> {
        self.enqueue(Task::CheckGracePeriods).await
    }

    pub async fn queue_expiration_warnings(&self, minutes_before: i64) -> anyhow::Result<Uuid> {
        self.enqueue(Task::SendExpirationWarnings { minutes_before })
            .await
    }
}
