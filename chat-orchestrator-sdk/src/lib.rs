//! Shared types for the chat orchestration core.
//!
//! Everything a front end (CLI, HTTP layer, UI) needs to talk to the
//! orchestrator lives here: the message/thread data model, the routing
//! decision, task snapshots and the interruption protocol, the stream event
//! union, and the error taxonomy. The core crate depends on this; front ends
//! can depend on it without pulling in the workflows themselves.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// Messages
// ============================================================================

/// Who authored a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Author {
    User,
    Agent,
}

/// What kind of content a message carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Text,
    Document,
    /// A prompt asking the user to pick one of a fixed set of choices.
    Choice,
}

/// One message in a conversation thread.
///
/// Messages are immutable once created. The single exception is `metadata`,
/// which the owning workflow may merge additional keys into (for example to
/// mark a streamed message as finished).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub thread_id: String,
    pub author: Author,
    pub text: String,
    pub kind: MessageKind,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

impl Message {
    pub fn new(thread_id: impl Into<String>, author: Author, text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            thread_id: thread_id.into(),
            author,
            text: text.into(),
            kind: MessageKind::Text,
            created_at: Utc::now(),
            metadata: serde_json::Value::Null,
        }
    }

    pub fn user(thread_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(thread_id, Author::User, text)
    }

    pub fn agent(thread_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(thread_id, Author::Agent, text)
    }

    pub fn with_kind(mut self, kind: MessageKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }

    /// Merge keys into the message metadata. Only the owning workflow should
    /// call this; existing keys are overwritten by the incoming ones.
    pub fn merge_metadata(&mut self, extra: serde_json::Value) {
        match (&mut self.metadata, extra) {
            (serde_json::Value::Object(base), serde_json::Value::Object(incoming)) => {
                for (k, v) in incoming {
                    base.insert(k, v);
                }
            }
            (slot, incoming) if slot.is_null() => *slot = incoming,
            _ => {}
        }
    }
}

// ============================================================================
// Routing
// ============================================================================

/// The workflow selected for a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Route {
    Simple,
    Report,
}

impl std::fmt::Display for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Route::Simple => write!(f, "simple"),
            Route::Report => write!(f, "report"),
        }
    }
}

/// Outcome of classifying one user message.
///
/// Derived, never mutated; recomputed for every new user message. `ambiguous`
/// records the non-fatal classification-ambiguous condition: the default
/// route has been applied and the rationale explains why.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingDecision {
    pub route: Route,
    pub confidence: f64,
    pub rationale: String,
    pub matched_keywords: Vec<String>,
    pub ambiguous: bool,
}

/// Which report template family a request resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisType {
    General,
    Market,
    Technical,
}

impl std::fmt::Display for AnalysisType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AnalysisType::General => write!(f, "general"),
            AnalysisType::Market => write!(f, "market"),
            AnalysisType::Technical => write!(f, "technical"),
        }
    }
}

/// Normalized result of one supervisor invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupervisorOutput {
    pub text: String,
    pub workflow_used: Route,
    pub confidence: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analysis_type: Option<AnalysisType>,
}

// ============================================================================
// Tasks and the interruption protocol
// ============================================================================

/// Task lifecycle states, ordered. A task only ever moves forward:
/// `Pending -> AwaitingChoice -> Running -> {Completed, Failed, Cancelled}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    AwaitingChoice,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl TaskStatus {
    /// Position in the forward ordering. Terminal states share a rank.
    pub fn rank(&self) -> u8 {
        match self {
            TaskStatus::Pending => 0,
            TaskStatus::AwaitingChoice => 1,
            TaskStatus::Running => 2,
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Cancelled => 3,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.rank() == 3
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TaskStatus::Pending => "pending",
            TaskStatus::AwaitingChoice => "awaiting_choice",
            TaskStatus::Running => "running",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
            TaskStatus::Cancelled => "cancelled",
        };
        write!(f, "{s}")
    }
}

/// Read-only view of an asynchronous task. Snapshots returned by the task
/// manager are stable: polling a terminal task always yields the same view.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskSnapshot {
    pub id: Uuid,
    pub thread_id: String,
    pub status: TaskStatus,
    /// Completion percentage, 0..=100. Never decreases.
    pub progress: u8,
    /// Human-readable progress message.
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_text: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// How the user wants a report delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseMode {
    Stream,
    Async,
}

impl std::str::FromStr for ResponseMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "stream" => Ok(ResponseMode::Stream),
            "async" => Ok(ResponseMode::Async),
            other => Err(format!("unknown response mode: {other}")),
        }
    }
}

/// A pending request for the user to pick an execution mode before a task
/// proceeds. Created exactly once per task that needs a mode choice and
/// superseded by the running task once a choice is recorded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Interruption {
    pub task_id: Uuid,
    pub thread_id: String,
    pub prompt: String,
    pub choices: [ResponseMode; 2],
}

impl Interruption {
    pub fn new(task_id: Uuid, thread_id: impl Into<String>) -> Self {
        Self {
            task_id,
            thread_id: thread_id.into(),
            prompt: MODE_CHOICE_PROMPT.to_string(),
            choices: [ResponseMode::Stream, ResponseMode::Async],
        }
    }
}

/// The two-option menu shown when a report task awaits a mode choice.
pub const MODE_CHOICE_PROMPT: &str = "I understand you want a report generated. How would you like to receive the response?\n\n1. **Streaming Response**: Get real-time updates as I generate the report\n2. **Async Response**: Get the complete report when finished (you can continue chatting meanwhile)\n\nPlease choose your preferred response mode.";

// ============================================================================
// Stream events
// ============================================================================

/// Payload of one stream event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum StreamPayload {
    /// Routing/progress information for the consumer.
    Metadata(serde_json::Value),
    /// An incremental text fragment. Concatenating all fragments in emission
    /// order yields the exact synchronous response text.
    Content { text: String, is_partial: bool },
    /// A human-readable failure. At most one per stream, always followed by
    /// exactly one `End`.
    Error { message: String },
    /// Stream terminator. Exactly one per stream, always last.
    End,
}

/// One event on the ordered output stream of a request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamEvent {
    #[serde(flatten)]
    pub payload: StreamPayload,
    pub timestamp: DateTime<Utc>,
}

impl StreamEvent {
    pub fn metadata(data: serde_json::Value) -> Self {
        Self::from(StreamPayload::Metadata(data))
    }

    pub fn content(text: impl Into<String>, is_partial: bool) -> Self {
        Self::from(StreamPayload::Content {
            text: text.into(),
            is_partial,
        })
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::from(StreamPayload::Error {
            message: message.into(),
        })
    }

    pub fn end() -> Self {
        Self::from(StreamPayload::End)
    }

    pub fn is_end(&self) -> bool {
        matches!(self.payload, StreamPayload::End)
    }
}

impl From<StreamPayload> for StreamEvent {
    fn from(payload: StreamPayload) -> Self {
        Self {
            payload,
            timestamp: Utc::now(),
        }
    }
}

// ============================================================================
// Workflow progress events
// ============================================================================

/// Structured progress events emitted by workflows while they run.
///
/// The stream multiplexer bridges these into `Metadata` stream events; the
/// synchronous path discards them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkflowEvent {
    RoutingDecided {
        route: Route,
        confidence: f64,
        rationale: String,
    },
    PhaseStarted {
        phase: String,
        total_phases: usize,
    },
    PhaseCompleted {
        phase: String,
    },
    PhaseFailed {
        phase: String,
        error: String,
    },
    Progress {
        message: String,
    },
}

/// Handle a workflow uses to report progress. A no-op sender is used on the
/// synchronous path so workflows never need to care whether anyone listens.
#[derive(Debug, Clone)]
pub struct ProgressSender {
    tx: Option<tokio::sync::mpsc::UnboundedSender<WorkflowEvent>>,
}

impl ProgressSender {
    pub fn new(tx: tokio::sync::mpsc::UnboundedSender<WorkflowEvent>) -> Self {
        Self { tx: Some(tx) }
    }

    pub fn noop() -> Self {
        Self { tx: None }
    }

    /// Send an event; a closed or absent channel is not an error.
    pub fn send(&self, event: WorkflowEvent) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(event);
        }
    }
}

// ============================================================================
// Error taxonomy
// ============================================================================

/// Typed failures crossing the orchestration core's boundary.
///
/// The classification-ambiguous condition is deliberately absent: it is
/// non-fatal, the default route is applied, and the condition is recorded on
/// the `RoutingDecision` instead.
#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    /// Arithmetic input contained something other than numeric literals and
    /// `+ - * / ( )`. Rejected outright, never partially evaluated.
    #[error("invalid arithmetic expression: {0}")]
    InvalidExpression(String),

    /// The report workflow could not find a usable topic in the request.
    /// Recoverable: the supervisor asks the user to restate.
    #[error("could not extract a report topic from the request")]
    TopicExtractionFailed,

    /// A report phase failed; the job is terminated without retry.
    #[error("report phase '{phase}' failed: {reason}")]
    PhaseFailed { phase: String, reason: String },

    /// The caller requested a task transition that is not valid from the
    /// task's current state. No side effect was applied.
    #[error("invalid task state: expected {expected}, task is {actual}")]
    InvalidTaskState {
        expected: String,
        actual: TaskStatus,
    },

    #[error("operation timed out: {operation}")]
    Timeout { operation: String },

    /// The thread already has a message in flight; retry after it completes.
    #[error("thread '{thread_id}' is busy with another request")]
    ThreadBusy { thread_id: String },

    #[error("persistence failure: {0}")]
    Persistence(String),

    #[error("model call failed: {0}")]
    ModelCall(String),

    #[error("task not found: {0}")]
    TaskNotFound(Uuid),
}

impl OrchestratorError {
    /// Generic user-facing message. Full detail stays in the log channel;
    /// this is what streaming/async surfaces show.
    pub fn user_message(&self) -> String {
        match self {
            OrchestratorError::InvalidExpression(_) => {
                "I can only evaluate plain arithmetic with numbers, + - * / and parentheses."
                    .to_string()
            }
            OrchestratorError::TopicExtractionFailed => {
                "I couldn't work out what topic to report on. Could you restate your request with the topic spelled out?".to_string()
            }
            OrchestratorError::ThreadBusy { .. } => {
                "This conversation is still processing a previous message. Please try again in a moment.".to_string()
            }
            OrchestratorError::Timeout { .. } => {
                "The request took too long and was stopped.".to_string()
            }
            OrchestratorError::InvalidTaskState { .. } => {
                "That action isn't valid for this task anymore.".to_string()
            }
            _ => "I encountered an error while processing your request. Please try again or rephrase your question.".to_string(),
        }
    }
}
