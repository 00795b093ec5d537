//! Orchestrator tunables.

use serde::Deserialize;
use std::time::Duration;

/// Configuration for the orchestration core.
///
/// All fields have working defaults; a front end can deserialize overrides
/// from JSON. A second message on a busy thread is always rejected with
/// `ThreadBusy` rather than queued, so there is no knob for it.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Routing confidence below this keeps the cost-conservative default
    /// (`simple`) even when report signals matched.
    pub confidence_threshold: f64,
    /// How many trailing thread messages are handed to workflows as context.
    pub history_window: usize,
    /// Characters per `content` fragment on the streaming path.
    pub content_chunk_chars: usize,
    /// Upper bound on a single model call, seconds.
    pub model_timeout_secs: u64,
    /// Upper bound on one report phase, seconds.
    pub phase_timeout_secs: u64,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.5,
            history_window: 10,
            content_chunk_chars: 100,
            model_timeout_secs: 60,
            phase_timeout_secs: 120,
        }
    }
}

impl OrchestratorConfig {
    pub fn model_timeout(&self) -> Duration {
        Duration::from_secs(self.model_timeout_secs)
    }

    pub fn phase_timeout(&self) -> Duration {
        Duration::from_secs(self.phase_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = OrchestratorConfig::default();
        assert_eq!(config.confidence_threshold, 0.5);
        assert_eq!(config.content_chunk_chars, 100);
        assert_eq!(config.model_timeout(), Duration::from_secs(60));
    }

    #[test]
    fn test_partial_override_from_json() {
        let config: OrchestratorConfig =
            serde_json::from_str(r#"{"content_chunk_chars": 50}"#).unwrap();
        assert_eq!(config.content_chunk_chars, 50);
        assert_eq!(config.history_window, 10);
    }
}
