//! Phase 2: research planning.
//!
//! Per outline section, pairs the section with the source catalog for the
//! plan's analysis type and lists the data points to verify. No network
//! access; the catalogs are static guidance.

use tracing::debug;

use crate::sdk::OrchestratorError;
use crate::workflows::report::types::{
    source_catalog, ReportPlan, ResearchPlan, SectionResearch,
};

pub fn run(plan: &ReportPlan) -> Result<ResearchPlan, OrchestratorError> {
    if plan.outline.is_empty() {
        return Err(OrchestratorError::PhaseFailed {
            phase: "research".to_string(),
            reason: "outline is empty".to_string(),
        });
    }

    let catalog = source_catalog(plan.analysis_type);
    let sections = plan
        .outline
        .iter()
        .map(|section| SectionResearch {
            section: section.title.clone(),
            source_categories: catalog.clone(),
            data_points: section
                .points
                .iter()
                .map(|point| format!("Verify {} for {}", point.to_lowercase(), plan.topic))
                .collect(),
        })
        .collect();

    debug!(topic = %plan.topic, "research plan built");
    Ok(ResearchPlan { sections })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::report::phase1_analyze;

    #[test]
    fn test_research_covers_every_outline_section() {
        let plan = phase1_analyze::run("market report about coffee shops").unwrap();
        let research = run(&plan).unwrap();
        assert_eq!(research.sections.len(), plan.outline.len());
        for (section, research_section) in plan.outline.iter().zip(&research.sections) {
            assert_eq!(section.title, research_section.section);
            assert!(!research_section.source_categories.is_empty());
            assert_eq!(research_section.data_points.len(), section.points.len());
        }
    }

    #[test]
    fn test_empty_outline_fails() {
        let mut plan = phase1_analyze::run("report about tea").unwrap();
        plan.outline.clear();
        let err = run(&plan).unwrap_err();
        assert!(matches!(err, OrchestratorError::PhaseFailed { phase, .. } if phase == "research"));
    }
}
