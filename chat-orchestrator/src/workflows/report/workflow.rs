//! Report workflow orchestration.
//!
//! Drives the four phases in strict order, each under the configured phase
//! timeout. Any phase failure terminates the job without retry; progress is
//! reported through the workflow event channel.

use tracing::{error, info};

use crate::config::OrchestratorConfig;
use crate::model::ModelClient;
use crate::sdk::{OrchestratorError, ProgressSender, WorkflowEvent};
use crate::workflows::report::types::ReportOutput;
use crate::workflows::report::{phase1_analyze, phase2_research, phase3_write, phase4_review};

const TOTAL_PHASES: usize = 4;
const PHASES: [&str; TOTAL_PHASES] = ["analyze", "research", "write", "review"];

/// Run the full report pipeline for one request.
pub async fn run(
    model: &dyn ModelClient,
    config: &OrchestratorConfig,
    text: &str,
    progress: &ProgressSender,
) -> Result<ReportOutput, OrchestratorError> {
    let started = |phase: &str| {
        progress.send(WorkflowEvent::PhaseStarted {
            phase: phase.to_string(),
            total_phases: TOTAL_PHASES,
        });
    };
    let completed = |phase: &str| {
        progress.send(WorkflowEvent::PhaseCompleted {
            phase: phase.to_string(),
        });
    };

    started(PHASES[0]);
    let plan = guard(config, PHASES[0], async { phase1_analyze::run(text) })
        .await
        .map_err(|e| fail(progress, PHASES[0], e))?;
    info!(topic = %plan.topic, analysis_type = %plan.analysis_type, "analyze phase done");
    completed(PHASES[0]);

    started(PHASES[1]);
    let research = guard(config, PHASES[1], async { phase2_research::run(&plan) })
        .await
        .map_err(|e| fail(progress, PHASES[1], e))?;
    completed(PHASES[1]);

    started(PHASES[2]);
    let draft = guard(config, PHASES[2], phase3_write::run(model, config, &plan, &research))
        .await
        .map_err(|e| fail(progress, PHASES[2], e))?;
    completed(PHASES[2]);

    started(PHASES[3]);
    let report = guard(config, PHASES[3], async { phase4_review::run(&plan, &draft) })
        .await
        .map_err(|e| fail(progress, PHASES[3], e))?;
    completed(PHASES[3]);

    let title = extract_title(&report, &plan.topic);
    Ok(ReportOutput {
        report,
        title,
        topic: plan.topic,
        analysis_type: plan.analysis_type,
    })
}

async fn guard<T>(
    config: &OrchestratorConfig,
    phase: &str,
    fut: impl std::future::Future<Output = Result<T, OrchestratorError>>,
) -> Result<T, OrchestratorError> {
    tokio::time::timeout(config.phase_timeout(), fut)
        .await
        .map_err(|_| OrchestratorError::Timeout {
            operation: format!("report phase '{phase}'"),
        })?
}

fn fail(progress: &ProgressSender, phase: &str, err: OrchestratorError) -> OrchestratorError {
    error!(phase, %err, "report phase failed");
    progress.send(WorkflowEvent::PhaseFailed {
        phase: phase.to_string(),
        error: err.to_string(),
    });
    err
}

/// First markdown heading of the report, falling back to the topic.
pub fn extract_title(report: &str, topic: &str) -> String {
    for line in report.lines() {
        let trimmed = line.trim();
        if let Some(title) = trimmed
            .strip_prefix("# ")
            .or_else(|| trimmed.strip_prefix("## "))
        {
            let title = title.trim();
            if !title.is_empty() {
                return title.to_string();
            }
        }
    }
    topic.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TemplateModel;
    use crate::sdk::AnalysisType;

    #[tokio::test]
    async fn test_full_pipeline_produces_report() {
        let model = TemplateModel::new();
        let config = OrchestratorConfig::default();
        let output = run(
            &model,
            &config,
            "Create a market analysis report about electric scooters",
            &ProgressSender::noop(),
        )
        .await
        .unwrap();

        assert_eq!(output.analysis_type, AnalysisType::Market);
        assert!(output.report.contains("## Executive Summary"));
        assert!(output.report.contains("## Review Notes"));
        assert!(output.title.contains("Electric Scooters"));
    }

    #[tokio::test]
    async fn test_unextractable_topic_fails_in_analyze() {
        let model = TemplateModel::new();
        let config = OrchestratorConfig::default();
        let err = run(&model, &config, "report about ???", &ProgressSender::noop())
            .await
            .unwrap_err();
        assert!(matches!(err, OrchestratorError::TopicExtractionFailed));
    }

    #[tokio::test]
    async fn test_progress_events_cover_all_phases() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let model = TemplateModel::new();
        let config = OrchestratorConfig::default();
        run(
            &model,
            &config,
            "report about honey bees",
            &ProgressSender::new(tx),
        )
        .await
        .unwrap();

        let mut completed = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let WorkflowEvent::PhaseCompleted { phase } = event {
                completed.push(phase);
            }
        }
        assert_eq!(completed, vec!["analyze", "research", "write", "review"]);
    }

    #[test]
    fn test_extract_title_prefers_first_heading() {
        assert_eq!(
            extract_title("# Solar - Report\n\n## Intro\n", "solar"),
            "Solar - Report"
        );
        assert_eq!(extract_title("no headings here", "solar"), "solar");
    }
}
