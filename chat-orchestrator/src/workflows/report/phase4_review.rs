//! Phase 4: review and assembly.
//!
//! Structural check over the draft: every outline section must have a
//! non-empty body. Missing or empty sections are flagged in the review notes
//! rather than silently dropped. Produces the final markdown document.

use chrono::Local;
use tracing::{debug, warn};

use crate::sdk::OrchestratorError;
use crate::workflows::report::types::{DraftReport, ReportPlan};

pub fn run(plan: &ReportPlan, draft: &DraftReport) -> Result<String, OrchestratorError> {
    if draft.sections.is_empty() {
        return Err(OrchestratorError::PhaseFailed {
            phase: "review".to_string(),
            reason: "draft has no sections".to_string(),
        });
    }

    let mut review_notes = Vec::new();
    for section in &plan.outline {
        let drafted = draft
            .sections
            .iter()
            .find(|s| s.title == section.title)
            .map(|s| !s.body.trim().is_empty())
            .unwrap_or(false);
        if !drafted {
            warn!(section = %section.title, "section missing from draft");
            review_notes.push(format!(
                "Section '{}' is missing or empty and needs content.",
                section.title
            ));
        }
    }

    let mut report = format!(
        "# {} - {} Analysis Report\n",
        title_case(&plan.topic),
        title_case(&plan.analysis_type.to_string()),
    );
    for section in &draft.sections {
        report.push_str(&format!("\n## {}\n\n{}\n", section.title, section.body));
    }

    report.push_str("\n## Review Notes\n\n");
    if review_notes.is_empty() {
        report.push_str(&format!(
            "All {} planned sections are present with content. The report follows \
             the {} framework and covers {} from {} perspectives.\n",
            plan.outline.len(),
            plan.framework.name(),
            plan.topic,
            plan.framework.dimensions().len(),
        ));
    } else {
        for note in &review_notes {
            report.push_str(&format!("- {note}\n"));
        }
    }

    report.push_str(&format!(
        "\n---\n*Report generated on {}*\n",
        Local::now().format("%Y-%m-%d"),
    ));

    debug!(
        sections = draft.sections.len(),
        flagged = review_notes.len(),
        "report assembled"
    );
    Ok(report)
}

fn title_case(text: &str) -> String {
    text.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
