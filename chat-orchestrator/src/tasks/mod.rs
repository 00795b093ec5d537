//! Asynchronous task manager.
//!
//! Report requests pause for a delivery-mode choice before running; this
//! module owns that interruption protocol and the task registry behind it.
//! The registry is the only shared mutable state: every status transition
//! happens under its lock, moves only forward through the lifecycle, and the
//! last valid transition wins.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use serde_json::json;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::sdk::{
    Interruption, Message, MessageKind, OrchestratorError, ResponseMode, Route, StreamEvent,
    StreamPayload, SupervisorOutput, TaskSnapshot, TaskStatus, WorkflowEvent,
};
use crate::stream::{stream_message_parts, EventStream};
use crate::supervisor::Supervisor;

/// Progress milestones reported while an async report runs.
const PROGRESS_STARTED: u8 = 10;
const PROGRESS_ANALYZED: u8 = 30;
const PROGRESS_RESEARCHED: u8 = 60;
const PROGRESS_WRITTEN: u8 = 90;
const PROGRESS_DONE: u8 = 100;

/// What `submit` resolved to.
pub enum SubmitOutcome {
    /// The message ran synchronously; no task was created.
    Completed(SupervisorOutput),
    /// A report task is waiting for a delivery-mode choice.
    NeedsChoice(Interruption),
}

/// What `choose_mode` handed back.
pub enum ChosenDelivery {
    /// Consume this stream; the task completes when it ends.
    Stream(EventStream),
    /// The task is running in the background; poll `get_status`.
    Async(Uuid),
}

impl std::fmt::Debug for ChosenDelivery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChosenDelivery::Stream(_) => f.write_str("Stream(..)"),
            ChosenDelivery::Async(task_id) => f.debug_tuple("Async").field(task_id).finish(),
        }
    }
}

struct TaskEntry {
    snapshot: TaskSnapshot,
    text: String,
    handle: Option<JoinHandle<()>>,
}

type Registry = Arc<Mutex<HashMap<Uuid, TaskEntry>>>;

pub struct TaskManager {
    supervisor: Arc<Supervisor>,
    tasks: Registry,
}

impl TaskManager {
    pub fn new(supervisor: Arc<Supervisor>) -> Self {
        Self {
            supervisor,
            tasks: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Classify and either run synchronously (simple routes) or create a
    /// task awaiting a delivery-mode choice (report routes).
    pub async fn submit(
        &self,
        thread_id: &str,
        text: &str,
    ) -> Result<SubmitOutcome, OrchestratorError> {
        let decision = self.supervisor.classify(text);
        match decision.route {
            Route::Simple => {
                let output = self.supervisor.handle(thread_id, text).await?;
                Ok(SubmitOutcome::Completed(output))
            }
            Route::Report => {
                let task_id = Uuid::new_v4();
                let now = Utc::now();
                let mut snapshot = TaskSnapshot {
                    id: task_id,
                    thread_id: thread_id.to_string(),
                    status: TaskStatus::Pending,
                    progress: 0,
                    message: "Task created".to_string(),
                    result_text: None,
                    error_text: None,
                    created_at: now,
                    updated_at: now,
                };
                // Report routes always need a mode choice, so the task moves
                // straight on from Pending.
                apply(
                    &mut snapshot,
                    TaskStatus::AwaitingChoice,
                    0,
                    "Awaiting response mode choice",
                );
                self.with_registry(|tasks| {
                    tasks.insert(
                        task_id,
                        TaskEntry {
                            snapshot,
                            text: text.to_string(),
                            handle: None,
                        },
                    );
                })?;

                let interruption = Interruption::new(task_id, thread_id);
                let prompt_message = Message::agent(thread_id, interruption.prompt.clone())
                    .with_kind(MessageKind::Choice)
                    .with_metadata(json!({ "task_id": task_id }));
                self.supervisor
                    .record_message(thread_id, prompt_message)
                    .await?;

                info!(%task_id, thread_id, "report task awaiting mode choice");
                Ok(SubmitOutcome::NeedsChoice(interruption))
            }
        }
    }

    /// Record the user's delivery-mode choice and start the task. Valid only
    /// while the task is awaiting a choice.
    pub fn choose_mode(
        &self,
        task_id: Uuid,
        mode: ResponseMode,
    ) -> Result<ChosenDelivery, OrchestratorError> {
        let (thread_id, text) = self.with_registry(|tasks| {
            let entry = tasks
                .get_mut(&task_id)
                .ok_or(OrchestratorError::TaskNotFound(task_id))?;
            if entry.snapshot.status != TaskStatus::AwaitingChoice {
                return Err(OrchestratorError::InvalidTaskState {
                    expected: TaskStatus::AwaitingChoice.to_string(),
                    actual: entry.snapshot.status,
                });
            }
            apply(
                &mut entry.snapshot,
                TaskStatus::Running,
                PROGRESS_STARTED,
                "Initializing report generation",
            );
            Ok((entry.snapshot.thread_id.clone(), entry.text.clone()))
        })??;

        info!(%task_id, ?mode, "task mode chosen");
        match mode {
            ResponseMode::Stream => Ok(ChosenDelivery::Stream(
                self.spawn_stream(task_id, thread_id, text)?,
            )),
            ResponseMode::Async => {
                self.spawn_async(task_id, thread_id, text)?;
                Ok(ChosenDelivery::Async(task_id))
            }
        }
    }

    /// Stable snapshot of a task. Terminal tasks are retained until
    /// `cleanup_finished`.
    pub fn get_status(&self, task_id: Uuid) -> Result<TaskSnapshot, OrchestratorError> {
        self.with_registry(|tasks| {
            tasks
                .get(&task_id)
                .map(|entry| entry.snapshot.clone())
                .ok_or(OrchestratorError::TaskNotFound(task_id))
        })?
    }

    /// Cancel a task. Terminal tasks are left untouched; cancelling them is
    /// an idempotent success.
    pub fn cancel(&self, task_id: Uuid) -> Result<TaskSnapshot, OrchestratorError> {
        let (snapshot, handle) = self.with_registry(|tasks| {
            let entry = tasks
                .get_mut(&task_id)
                .ok_or(OrchestratorError::TaskNotFound(task_id))?;
            if entry.snapshot.status.is_terminal() {
                return Ok((entry.snapshot.clone(), None));
            }
            let progress = entry.snapshot.progress;
            apply(
                &mut entry.snapshot,
                TaskStatus::Cancelled,
                progress,
                "Task cancelled",
            );
            Ok((entry.snapshot.clone(), entry.handle.take()))
        })??;

        if let Some(handle) = handle {
            handle.abort();
        }
        info!(%task_id, status = %snapshot.status, "cancel requested");
        Ok(snapshot)
    }

    /// All tasks for a thread, oldest first.
    pub fn tasks_for_thread(&self, thread_id: &str) -> Result<Vec<TaskSnapshot>, OrchestratorError> {
        self.with_registry(|tasks| {
            let mut snapshots: Vec<TaskSnapshot> = tasks
                .values()
                .filter(|entry| entry.snapshot.thread_id == thread_id)
                .map(|entry| entry.snapshot.clone())
                .collect();
            snapshots.sort_by_key(|s| s.created_at);
            snapshots
        })
    }

    /// Drop terminal tasks from the registry. Returns how many were removed.
    pub fn cleanup_finished(&self) -> Result<usize, OrchestratorError> {
        self.with_registry(|tasks| {
            let before = tasks.len();
            tasks.retain(|_, entry| !entry.snapshot.status.is_terminal());
            let removed = before - tasks.len();
            if removed > 0 {
                debug!(removed, "terminal tasks cleaned up");
            }
            removed
        })
    }

    fn spawn_stream(
        &self,
        task_id: Uuid,
        thread_id: String,
        text: String,
    ) -> Result<EventStream, OrchestratorError> {
        let (inner, pump) = stream_message_parts(Arc::clone(&self.supervisor), thread_id, text);
        let (tx, rx) = mpsc::unbounded_channel::<StreamEvent>();
        let tasks = Arc::clone(&self.tasks);

        tokio::spawn(async move {
            use futures::StreamExt;
            let mut inner = inner;
            let mut content = String::new();
            let mut error: Option<String> = None;
            let mut saw_end = false;
            while let Some(event) = inner.next().await {
                match &event.payload {
                    StreamPayload::Content { text, .. } => content.push_str(text),
                    StreamPayload::Error { message } => error = Some(message.clone()),
                    _ => {}
                }
                saw_end = event.is_end();
                let _ = tx.send(event);
                if saw_end {
                    break;
                }
            }
            if !saw_end {
                // The pump was aborted mid-run; close out the stream
                // contract for the consumer before recording the outcome.
                let _ = tx.send(StreamEvent::error(
                    "The task was cancelled before the response finished.",
                ));
                let _ = tx.send(StreamEvent::end());
                error = Some("task cancelled".to_string());
            }
            match error {
                None => finish(&tasks, task_id, Ok(content)),
                Some(message) => finish(&tasks, task_id, Err(message)),
            }
        });

        // The pump handle is the cancellation point for stream mode.
        self.with_registry(|tasks| {
            if let Some(entry) = tasks.get_mut(&task_id) {
                if entry.snapshot.status == TaskStatus::Running {
                    entry.handle = Some(pump);
                } else {
                    pump.abort();
                }
            }
        })?;

        Ok(EventStream::new(rx))
    }

    fn spawn_async(
        &self,
        task_id: Uuid,
        thread_id: String,
        text: String,
    ) -> Result<(), OrchestratorError> {
        let supervisor = Arc::clone(&self.supervisor);
        let tasks = Arc::clone(&self.tasks);

        let (progress_tx, mut progress_rx) = mpsc::unbounded_channel::<WorkflowEvent>();
        let milestone_tasks = Arc::clone(&self.tasks);
        tokio::spawn(async move {
            while let Some(event) = progress_rx.recv().await {
                if let WorkflowEvent::PhaseCompleted { phase } = event {
                    let (progress, message) = match phase.as_str() {
                        "analyze" => (PROGRESS_ANALYZED, "Analyzing request"),
                        "research" => (PROGRESS_RESEARCHED, "Researching sources"),
                        "write" => (PROGRESS_WRITTEN, "Writing report sections"),
                        _ => continue,
                    };
                    advance(&milestone_tasks, task_id, progress, message);
                }
            }
        });

        let handle = tokio::spawn(async move {
            let progress = crate::sdk::ProgressSender::new(progress_tx);
            let result = supervisor
                .handle_with_progress(&thread_id, &text, &progress)
                .await;
            match result {
                Ok(output) => finish(&tasks, task_id, Ok(output.text)),
                Err(err) => {
                    warn!(%task_id, %err, "async task failed");
                    finish(&tasks, task_id, Err(err.user_message()));
                }
            }
        });

        self.with_registry(|tasks| {
            if let Some(entry) = tasks.get_mut(&task_id) {
                if entry.snapshot.status == TaskStatus::Running {
                    entry.handle = Some(handle);
                } else {
                    // Cancelled between spawn and registration.
                    handle.abort();
                }
            }
        })
    }

    fn with_registry<T>(
        &self,
        f: impl FnOnce(&mut HashMap<Uuid, TaskEntry>) -> T,
    ) -> Result<T, OrchestratorError> {
        let mut tasks = self
            .tasks
            .lock()
            .map_err(|_| OrchestratorError::Persistence("task registry poisoned".to_string()))?;
        Ok(f(&mut tasks))
    }
}

/// Apply a forward transition to a snapshot. Progress never decreases and
/// `updated_at` never moves backwards.
fn apply(snapshot: &mut TaskSnapshot, status: TaskStatus, progress: u8, message: &str) {
    snapshot.status = status;
    snapshot.progress = snapshot.progress.max(progress);
    snapshot.message = message.to_string();
    snapshot.updated_at = snapshot.updated_at.max(Utc::now());
}

/// Best-effort progress bump for a running task from a background task.
fn advance(tasks: &Registry, task_id: Uuid, progress: u8, message: &str) {
    if let Ok(mut tasks) = tasks.lock() {
        if let Some(entry) = tasks.get_mut(&task_id) {
            if entry.snapshot.status == TaskStatus::Running {
                apply(&mut entry.snapshot, TaskStatus::Running, progress, message);
            }
        }
    }
}

/// Record a task's final result. The status is re-checked under the lock so
/// a result arriving after cancellation is discarded rather than applied.
fn finish(tasks: &Registry, task_id: Uuid, result: Result<String, String>) {
    if let Ok(mut tasks) = tasks.lock() {
        if let Some(entry) = tasks.get_mut(&task_id) {
            if entry.snapshot.status != TaskStatus::Running {
                debug!(%task_id, status = %entry.snapshot.status, "late result discarded");
                return;
            }
            match result {
                Ok(text) => {
                    apply(
                        &mut entry.snapshot,
                        TaskStatus::Completed,
                        PROGRESS_DONE,
                        "Report generation completed",
                    );
                    entry.snapshot.result_text = Some(text);
                }
                Err(message) => {
                    let progress = entry.snapshot.progress;
                    apply(
                        &mut entry.snapshot,
                        TaskStatus::Failed,
                        progress,
                        "Report generation failed",
                    );
                    entry.snapshot.error_text = Some(message);
                }
            }
            entry.handle = None;
        }
    }
}
