//! Phase 3: drafting.
//!
//! Synthesizes prose for each planned section through the model capability.
//! The prompt carries the analysis framework's dimensions so drafts follow
//! the same structure regardless of which model implementation answers.

use tracing::debug;

use crate::config::OrchestratorConfig;
use crate::model::{CompletionRequest, ModelClient};
use crate::sdk::OrchestratorError;
use crate::workflows::report::types::{DraftReport, ReportPlan, ResearchPlan, SectionDraft};

pub async fn run(
    model: &dyn ModelClient,
    config: &OrchestratorConfig,
    plan: &ReportPlan,
    research: &ResearchPlan,
) -> Result<DraftReport, OrchestratorError> {
    if research.sections.is_empty() {
        return Err(OrchestratorError::PhaseFailed {
            phase: "write".to_string(),
            reason: "research plan is empty".to_string(),
        });
    }

    let framework_guide = plan
        .framework
        .dimensions()
        .iter()
        .map(|(name, description)| format!("{name}: {description}"))
        .collect::<Vec<_>>()
        .join("\n");

    let mut sections = Vec::with_capacity(research.sections.len());
    for section in &research.sections {
        let system_prompt = format!(
            "You are a professional report writer specializing in {} analysis. \
             Write the '{}' section of a report on {}. \
             Structure the analysis along the {} framework:\n{}\n\
             Write in a professional, analytical style with clear structure \
             and actionable insights.",
            plan.analysis_type,
            section.section,
            plan.topic,
            plan.framework.name(),
            framework_guide,
        );
        let input = format!(
            "Draft the '{}' section. Points to cover: {}.",
            section.section,
            section.data_points.join("; "),
        );

        let request = CompletionRequest::new(system_prompt, input);
        let body = tokio::time::timeout(config.model_timeout(), model.complete(request))
            .await
            .map_err(|_| OrchestratorError::Timeout {
                operation: format!("drafting section '{}'", section.section),
            })??;

        debug!(section = %section.section, chars = body.len(), "section drafted");
        sections.push(SectionDraft {
            title: section.section.clone(),
            body,
        });
    }

    Ok(DraftReport { sections })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TemplateModel;
    use crate::workflows::report::{phase1_analyze, phase2_research};

    #[tokio::test]
    async fn test_drafts_every_section() {
        let plan = phase1_analyze::run("technical report about container runtimes").unwrap();
        let research = phase2_research::run(&plan).unwrap();
        let model = TemplateModel::new();
        let config = OrchestratorConfig::default();

        let draft = run(&model, &config, &plan, &research).await.unwrap();
        assert_eq!(draft.sections.len(), plan.outline.len());
        assert!(draft.sections.iter().all(|s| !s.body.is_empty()));
    }

    #[tokio::test]
    async fn test_empty_research_plan_fails() {
        let plan = phase1_analyze::run("report about tea").unwrap();
        let research = ResearchPlan { sections: vec![] };
        let model = TemplateModel::new();
        let config = OrchestratorConfig::default();

        let err = run(&model, &config, &plan, &research).await.unwrap_err();
        assert!(matches!(err, OrchestratorError::PhaseFailed { phase, .. } if phase == "write"));
    }
}
