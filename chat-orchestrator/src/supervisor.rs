//! Supervisor: classify, dispatch, persist.
//!
//! The supervisor owns the full lifecycle of one message: routing decision,
//! per-thread in-flight guard, persistence of both sides of the exchange,
//! workflow dispatch, and the routing checkpoint. Workflows stay free of
//! persistence concerns because everything store-shaped happens here.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use serde_json::json;
use tracing::{error, info, warn};

use crate::classifier;
use crate::config::OrchestratorConfig;
use crate::model::ModelClient;
use crate::sdk::{
    Message, OrchestratorError, ProgressSender, Route, RoutingDecision, SupervisorOutput,
    WorkflowEvent,
};
use crate::store::ThreadStore;
use crate::workflows::{report, simple_chat};

pub struct Supervisor {
    store: Arc<dyn ThreadStore>,
    model: Arc<dyn ModelClient>,
    config: OrchestratorConfig,
    in_flight: Arc<Mutex<HashSet<String>>>,
}

/// Releases the thread's in-flight slot when the dispatch ends, normally or
/// by error.
struct ThreadGuard {
    in_flight: Arc<Mutex<HashSet<String>>>,
    thread_id: String,
}

impl Drop for ThreadGuard {
    fn drop(&mut self) {
        if let Ok(mut set) = self.in_flight.lock() {
            set.remove(&self.thread_id);
        }
    }
}

impl Supervisor {
    pub fn new(
        store: Arc<dyn ThreadStore>,
        model: Arc<dyn ModelClient>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            store,
            model,
            config,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Route a message without executing anything. A report route whose
    /// confidence falls below the configured threshold is downgraded to the
    /// cost-conservative default.
    pub fn classify(&self, text: &str) -> RoutingDecision {
        let mut decision = classifier::classify(text);
        if decision.route == Route::Report
            && decision.confidence < self.config.confidence_threshold
        {
            decision.route = Route::Simple;
            decision.rationale = format!(
                "{} (below confidence threshold {}, downgraded to simple)",
                decision.rationale, self.config.confidence_threshold
            );
        }
        decision
    }

    /// Persist an agent-authored message that did not come out of a
    /// dispatch, such as the mode-choice prompt shown for a report task.
    pub(crate) async fn record_message(
        &self,
        thread_id: &str,
        message: Message,
    ) -> Result<(), OrchestratorError> {
        self.store.append_message(thread_id, message).await
    }

    /// Handle one message end to end and return the normalized output.
    pub async fn handle(
        &self,
        thread_id: &str,
        text: &str,
    ) -> Result<SupervisorOutput, OrchestratorError> {
        self.handle_with_progress(thread_id, text, &ProgressSender::noop())
            .await
    }

    /// Same as `handle` but reports workflow events to `progress`.
    pub async fn handle_with_progress(
        &self,
        thread_id: &str,
        text: &str,
        progress: &ProgressSender,
    ) -> Result<SupervisorOutput, OrchestratorError> {
        let decision = self.classify(text);
        if decision.ambiguous {
            warn!(thread_id, rationale = %decision.rationale, "ambiguous routing");
        }
        info!(
            thread_id,
            route = %decision.route,
            confidence = decision.confidence,
            "message routed"
        );
        progress.send(WorkflowEvent::RoutingDecided {
            route: decision.route,
            confidence: decision.confidence,
            rationale: decision.rationale.clone(),
        });

        let _guard = self.acquire_thread(thread_id)?;

        let history = self.store.load_thread_history(thread_id).await?;
        self.store
            .append_message(thread_id, Message::user(thread_id, text))
            .await?;

        let result = self
            .dispatch(thread_id, text, &decision, &history, progress)
            .await;
        let (output, extra_metadata) = match result {
            Ok(pair) => pair,
            Err(OrchestratorError::TopicExtractionFailed) => {
                // Recoverable: ask the user to restate instead of failing.
                info!(thread_id, "topic extraction failed, asking for restatement");
                (
                    SupervisorOutput {
                        text: "I couldn't work out what topic the report should cover. \
                               Could you restate your request, for example 'write a report \
                               about <topic>'?"
                            .to_string(),
                        workflow_used: Route::Report,
                        confidence: decision.confidence,
                        analysis_type: None,
                    },
                    serde_json::Value::Null,
                )
            }
            Err(err) => {
                error!(thread_id, %err, "workflow dispatch failed");
                return Err(err);
            }
        };

        let mut agent_message = Message::agent(thread_id, output.text.clone());
        agent_message.merge_metadata(json!({
            "workflow_used": output.workflow_used.to_string(),
            "confidence": output.confidence,
            "analysis_type": output.analysis_type.map(|t| t.to_string()),
        }));
        agent_message.merge_metadata(extra_metadata);
        self.store.append_message(thread_id, agent_message).await?;

        self.store
            .save_checkpoint(
                thread_id,
                json!({
                    "route": decision.route.to_string(),
                    "confidence": decision.confidence,
                    "rationale": decision.rationale,
                    "ambiguous": decision.ambiguous,
                    "decided_at": chrono::Utc::now().to_rfc3339(),
                }),
            )
            .await?;

        Ok(output)
    }

    async fn dispatch(
        &self,
        thread_id: &str,
        text: &str,
        decision: &RoutingDecision,
        history: &[Message],
        progress: &ProgressSender,
    ) -> Result<(SupervisorOutput, serde_json::Value), OrchestratorError> {
        match decision.route {
            Route::Simple => {
                let response =
                    simple_chat::run(self.model.as_ref(), &self.config, history, text, progress)
                        .await?;
                Ok((
                    SupervisorOutput {
                        text: response,
                        workflow_used: Route::Simple,
                        confidence: decision.confidence,
                        analysis_type: None,
                    },
                    serde_json::Value::Null,
                ))
            }
            Route::Report => {
                let output =
                    report::workflow::run(self.model.as_ref(), &self.config, text, progress)
                        .await?;
                info!(thread_id, title = %output.title, "report completed");
                let metadata = json!({
                    "report_title": output.title,
                    "topic": output.topic,
                });
                Ok((
                    SupervisorOutput {
                        text: output.report,
                        workflow_used: Route::Report,
                        confidence: decision.confidence,
                        analysis_type: Some(output.analysis_type),
                    },
                    metadata,
                ))
            }
        }
    }

    fn acquire_thread(&self, thread_id: &str) -> Result<ThreadGuard, OrchestratorError> {
        let mut set = self
            .in_flight
            .lock()
            .map_err(|_| OrchestratorError::Persistence("in-flight set poisoned".to_string()))?;
        if !set.insert(thread_id.to_string()) {
            return Err(OrchestratorError::ThreadBusy {
                thread_id: thread_id.to_string(),
            });
        }
        Ok(ThreadGuard {
            in_flight: Arc::clone(&self.in_flight),
            thread_id: thread_id.to_string(),
        })
    }
}
