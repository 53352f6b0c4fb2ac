//! Task queue scheduler.
//!
//! The `TaskQueue` owns the task collection and its persisted mirror. It
//! repeatedly selects a bounded batch of runnable tasks (dependencies met,
//! concurrency ceiling respected), dispatches the batch to the executor
//! concurrently with each invocation gated by the shared rate limiter, and
//! records per-task outcomes. A task failure never aborts the batch or the
//! run loop.
//!
//! All mutation of the task map and the in-flight set happens under one
//! mutex, so the read-check-mark sequence in batch selection is atomic with
//! respect to concurrent selection attempts and completion callbacks.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use futures::future::join_all;

use crate::error::{Result, TaskqError};
use crate::executor::{ExecutionRequest, Executor, parse_output_markers};
use crate::limiter::RateLimiter;
use crate::task::{Task, TaskStatus};

/// Delay before re-polling when no task is runnable.
const IDLE_BACKOFF: Duration = Duration::from_secs(1);

/// Interval at which `stop()` re-checks the in-flight set.
const SHUTDOWN_POLL: Duration = Duration::from_millis(500);

/// Default context file handed to the executor ahead of task context paths.
pub const DEFAULT_CONTEXT_FILE: &str = "system_context.md";

/// Default concurrency ceiling.
pub const DEFAULT_MAX_PARALLEL: usize = 3;

/// Mutable queue state, guarded by one mutex.
struct QueueState {
    /// Task name -> task. The persisted mirror is keyed the same way.
    tasks: HashMap<String, Task>,
    /// Names selected for the current batch but not yet finished.
    in_flight: HashSet<String>,
    /// Next insertion sequence number, for the priority tie-break.
    next_seq: u64,
}

impl QueueState {
    /// Whether every dependency of `task` is satisfied.
    ///
    /// A dependency naming a task absent from the queue is treated as
    /// satisfied. This mirrors the original system's behavior and is covered
    /// by a dedicated test rather than silently changed.
    fn dependencies_met(&self, task: &Task) -> bool {
        task.dependencies.iter().all(|dep| match self.tasks.get(dep) {
            Some(t) => t.status == TaskStatus::Completed,
            None => true,
        })
    }
}

/// Queue of tasks for AI-assisted development.
///
/// Exclusively owns the in-memory task collection and the queue file. Shared
/// across the run loop and dispatched task executions via `Arc`.
pub struct TaskQueue {
    queue_file: PathBuf,
    state: Mutex<QueueState>,
    max_parallel: usize,
    default_context: String,
    shutdown: AtomicBool,
    limiter: RateLimiter,
    executor: Arc<dyn Executor>,
}

impl TaskQueue {
    /// Open a queue backed by `queue_file`.
    ///
    /// If the file exists it is loaded; a missing or malformed file yields an
    /// empty queue (logged, never raised).
    pub fn open(
        queue_file: impl Into<PathBuf>,
        max_parallel: usize,
        limiter: RateLimiter,
        executor: Arc<dyn Executor>,
    ) -> Self {
        let queue_file = queue_file.into();

        // Persisted seq values restore insertion order; entries without one
        // (older queue files) fall back to name order.
        let mut loaded: Vec<(String, Task)> = load_tasks(&queue_file).into_iter().collect();
        loaded.sort_by(|a, b| (a.1.seq, &a.0).cmp(&(b.1.seq, &b.0)));

        let mut tasks = HashMap::new();
        let mut next_seq = 0u64;
        for (name, mut task) in loaded {
            task.seq = next_seq;
            next_seq += 1;
            tasks.insert(name, task);
        }

        Self {
            queue_file,
            state: Mutex::new(QueueState {
                tasks,
                in_flight: HashSet::new(),
                next_seq,
            }),
            max_parallel,
            default_context: DEFAULT_CONTEXT_FILE.to_string(),
            shutdown: AtomicBool::new(false),
            limiter,
            executor,
        }
    }

    /// Override the default context file handed to every execution.
    pub fn with_default_context(mut self, path: impl Into<String>) -> Self {
        self.default_context = path.into();
        self
    }

    /// Add a task to the queue. A task with the same name is overwritten.
    pub fn add_task(&self, mut task: Task) {
        tracing::info!(task = %task.name, priority = task.priority, "Adding task");
        let mut state = self.state.lock().unwrap();
        task.seq = state.next_seq;
        state.next_seq += 1;
        state.tasks.insert(task.name.clone(), task);
        self.save_locked(&state);
    }

    /// Add a context file path to a task. Unknown names are a logged no-op.
    pub fn add_context(&self, task_name: &str, context_path: impl Into<String>) {
        let mut state = self.state.lock().unwrap();
        match state.tasks.get_mut(task_name) {
            Some(task) => {
                task.context_paths.insert(context_path.into());
            }
            None => {
                tracing::error!(task = %task_name, "Task not found");
                return;
            }
        }
        self.save_locked(&state);
    }

    /// Set a task's priority. Unknown names are an error.
    pub fn set_priority(&self, task_name: &str, priority: i64) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let task = state
            .tasks
            .get_mut(task_name)
            .ok_or_else(|| TaskqError::TaskNotFound(task_name.to_string()))?;
        task.priority = priority;
        tracing::info!(task = %task_name, priority, "Updated task priority");
        self.save_locked(&state);
        Ok(())
    }

    /// Add a dependency to a task. Unknown task names are an error.
    pub fn add_dependency(&self, task_name: &str, dep: impl Into<String>) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let task = state
            .tasks
            .get_mut(task_name)
            .ok_or_else(|| TaskqError::TaskNotFound(task_name.to_string()))?;
        task.dependencies.insert(dep.into());
        self.save_locked(&state);
        Ok(())
    }

    /// Remove a dependency from a task. Unknown task names are an error; a
    /// dependency that was never present is not.
    pub fn remove_dependency(&self, task_name: &str, dep: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let task = state
            .tasks
            .get_mut(task_name)
            .ok_or_else(|| TaskqError::TaskNotFound(task_name.to_string()))?;
        task.dependencies.remove(dep);
        self.save_locked(&state);
        Ok(())
    }

    /// Apply a status change, union any reported outputs, and persist.
    ///
    /// Stamps `completed_at` iff the new status is Completed. Unknown names
    /// are a logged no-op.
    pub fn update_status(&self, task_name: &str, status: TaskStatus, outputs: Option<BTreeSet<String>>) {
        let mut state = self.state.lock().unwrap();
        let Some(task) = state.tasks.get_mut(task_name) else {
            tracing::error!(task = %task_name, "Task not found");
            return;
        };

        task.status = status;
        if let Some(outputs) = outputs {
            task.outputs.extend(outputs);
        }
        if status == TaskStatus::Completed {
            task.completed_at = Some(Utc::now());
        }

        tracing::info!(task = %task_name, status = %status, "Updated task status");
        self.save_locked(&state);
    }

    /// Select the next batch of runnable tasks and mark them in progress.
    ///
    /// Candidates are Pending tasks with satisfied dependencies that are not
    /// already in flight, ordered by priority then insertion order, truncated
    /// to the free concurrency slots. Selection and marking are one atomic
    /// step so a task can never be dispatched twice.
    pub fn next_batch(&self) -> Vec<Task> {
        let mut state = self.state.lock().unwrap();

        let mut ready: Vec<(i64, u64, String)> = state
            .tasks
            .values()
            .filter(|t| {
                t.status == TaskStatus::Pending
                    && !state.in_flight.contains(&t.name)
                    && state.dependencies_met(t)
            })
            .map(|t| (t.priority, t.seq, t.name.clone()))
            .collect();

        if ready.is_empty() {
            return Vec::new();
        }

        ready.sort();
        let available = self.max_parallel.saturating_sub(state.in_flight.len());
        ready.truncate(available);
        if ready.is_empty() {
            return Vec::new();
        }

        let mut selected = Vec::with_capacity(ready.len());
        for (_, _, name) in ready {
            state.in_flight.insert(name.clone());
            let task = state.tasks.get_mut(&name).expect("selected task exists");
            task.status = TaskStatus::InProgress;
            selected.push(task.clone());
        }

        self.save_locked(&state);
        selected
    }

    /// Run queue processing until no Pending tasks remain or `stop()` is
    /// called. Final state is persisted on exit.
    pub async fn run(&self) -> Result<()> {
        tracing::info!("Starting task queue processing");

        while !self.shutdown.load(Ordering::SeqCst) && self.has_pending() {
            let batch = self.next_batch();

            if batch.is_empty() {
                tokio::time::sleep(IDLE_BACKOFF).await;
                continue;
            }

            tracing::info!(count = batch.len(), "Processing batch");
            let results = join_all(batch.iter().map(|task| self.process_task(task))).await;

            {
                let mut state = self.state.lock().unwrap();
                for task in &batch {
                    state.in_flight.remove(&task.name);
                }
            }

            for (task, ok) in batch.iter().zip(results) {
                if !ok {
                    tracing::error!(task = %task.name, "Task did not complete successfully");
                }
            }
        }

        tracing::info!("Task queue processing completed");
        let state = self.state.lock().unwrap();
        self.save_locked(&state);
        Ok(())
    }

    /// Execute a single task through the rate limiter and the executor.
    ///
    /// Returns whether the task completed. Every failure path marks the task
    /// Failed and is recovered locally; nothing propagates to siblings in the
    /// batch.
    pub async fn process_task(&self, task: &Task) -> bool {
        self.limiter.acquire().await;

        let mut context_files = vec![self.default_context.clone()];
        context_files.extend(task.context_paths.iter().cloned());

        let request = ExecutionRequest {
            description: task.description.clone(),
            template_type: task.template_type,
            context_files,
        };

        match self.executor.execute(request).await {
            Ok(outcome) if outcome.success() => {
                let outputs: BTreeSet<String> = parse_output_markers(&outcome.stdout).into_iter().collect();
                self.update_status(&task.name, TaskStatus::Completed, Some(outputs));
                true
            }
            Ok(outcome) => {
                tracing::error!(
                    task = %task.name,
                    exit_code = outcome.exit_code,
                    stderr = %outcome.stderr.trim_end(),
                    "Task failed"
                );
                self.update_status(&task.name, TaskStatus::Failed, None);
                false
            }
            Err(e) => {
                tracing::error!(task = %task.name, error = %e, "Error processing task");
                self.update_status(&task.name, TaskStatus::Failed, None);
                false
            }
        }
    }

    /// Request a graceful stop and wait for in-flight tasks to finish.
    ///
    /// Running work is never interrupted; the run loop simply starts no new
    /// batches once the flag is observed.
    pub async fn stop(&self) {
        tracing::info!("Initiating graceful shutdown");
        self.shutdown.store(true, Ordering::SeqCst);

        loop {
            let in_flight = self.state.lock().unwrap().in_flight.len();
            if in_flight == 0 {
                break;
            }
            tracing::info!(in_flight, "Waiting for tasks to complete");
            tokio::time::sleep(SHUTDOWN_POLL).await;
        }

        tracing::info!("Shutdown complete");
    }

    /// Whether any task is still Pending.
    pub fn has_pending(&self) -> bool {
        let state = self.state.lock().unwrap();
        state.tasks.values().any(|t| t.status == TaskStatus::Pending)
    }

    /// Current number of in-flight tasks.
    pub fn in_flight_count(&self) -> usize {
        self.state.lock().unwrap().in_flight.len()
    }

    /// Snapshot of one task by name.
    pub fn task(&self, name: &str) -> Option<Task> {
        self.state.lock().unwrap().tasks.get(name).cloned()
    }

    /// Snapshot of one task, erroring on unknown names.
    pub fn require_task(&self, name: &str) -> Result<Task> {
        self.task(name).ok_or_else(|| TaskqError::TaskNotFound(name.to_string()))
    }

    /// Current status of a task, if it exists.
    pub fn task_status(&self, name: &str) -> Option<TaskStatus> {
        self.state.lock().unwrap().tasks.get(name).map(|t| t.status)
    }

    /// Names of all tasks that depend on the given task.
    pub fn dependents_of(&self, name: &str) -> BTreeSet<String> {
        let state = self.state.lock().unwrap();
        state
            .tasks
            .values()
            .filter(|t| t.dependencies.contains(name))
            .map(|t| t.name.clone())
            .collect()
    }

    /// Snapshot of all tasks, ordered by priority then insertion order.
    pub fn tasks(&self) -> Vec<Task> {
        let state = self.state.lock().unwrap();
        let mut tasks: Vec<Task> = state.tasks.values().cloned().collect();
        tasks.sort_by_key(|t| (t.priority, t.seq));
        tasks
    }

    /// Path of the queue file.
    pub fn queue_file(&self) -> &Path {
        &self.queue_file
    }

    /// Serialize the whole task map to the queue file.
    ///
    /// Write failures are logged and swallowed; in-memory state stays
    /// authoritative until a later write succeeds.
    fn save_locked(&self, state: &QueueState) {
        let map: BTreeMap<&String, &Task> = state.tasks.iter().collect();
        let json = match serde_json::to_string_pretty(&map) {
            Ok(json) => json,
            Err(e) => {
                tracing::error!(error = %e, "Failed to serialize queue");
                return;
            }
        };

        if let Err(e) = fs::write(&self.queue_file, json) {
            tracing::error!(file = %self.queue_file.display(), error = %e, "Failed to save queue");
        } else {
            tracing::debug!(count = state.tasks.len(), file = %self.queue_file.display(), "Saved queue");
        }
    }
}

/// Load the persisted task map, treating any failure as an empty queue.
fn load_tasks(queue_file: &Path) -> BTreeMap<String, Task> {
    if !queue_file.exists() {
        return BTreeMap::new();
    }

    let text = match fs::read_to_string(queue_file) {
        Ok(text) => text,
        Err(e) => {
            tracing::error!(file = %queue_file.display(), error = %e, "Failed to read queue file");
            return BTreeMap::new();
        }
    };

    match serde_json::from_str::<BTreeMap<String, Task>>(&text) {
        Ok(tasks) => {
            tracing::info!(count = tasks.len(), file = %queue_file.display(), "Loaded queue");
            tasks
        }
        Err(e) => {
            tracing::error!(file = %queue_file.display(), error = %e, "Failed to parse queue file");
            BTreeMap::new()
        }
    }
}
