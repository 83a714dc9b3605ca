use std::sync::Arc;

use metrics::counter;
use tokio::sync::mpsc;
use uuid::Uuid;

use super::{Task, TaskQueue, TaskRunner};

/// Drain the task channel, dispatching each task to the runner and
/// recording its outcome in the job registry. A failing handler marks
/// its job failed and the loop keeps going.
pub async fn run_task_worker(
    mut rx: mpsc::Receiver<(Uuid, Task)>,
    queue: TaskQueue,
    runner: Arc<TaskRunner>,
) {
    while let Some((job_id, task)) = rx.recv().await {
        tracing::debug!(job_id = %job_id, task = task.name(), "Processing task");
        queue.mark_running(job_id);

        match runner.run(&task).await {
            Ok(result) => {
                counter!("tasks_processed_total").increment(1);
                tracing::debug!(job_id = %job_id, task = task.name(), "Task completed");
                queue.mark_completed(job_id, result);
            }
            Err(e) => {
                counter!("tasks_failed_total").increment(1);
                tracing::error!(
                    job_id = %job_id,
                    task = task.name(),
                    error = %e,
                    "Task failed"
                );
                queue.mark_failed(job_id, e.to_string());
            }
        }
    }

    tracing::warn!("Task channel closed, worker exiting");
}
