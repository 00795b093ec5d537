//! Phase 1: request analysis.
//!
//! Determines the analysis type from keyword families, extracts the report
//! topic from the request text, and builds the outline from the per-type
//! section templates. Pure: no model call, no I/O.

use tracing::debug;

use crate::sdk::{AnalysisType, OrchestratorError};
use crate::workflows::report::types::{outline_template, Framework, ReportPlan};

const MARKET_KEYWORDS: &[&str] = &["market", "business", "industry", "competitive"];
const TECHNICAL_KEYWORDS: &[&str] = &["technical", "technology", "system", "implementation"];

/// Words that introduce the topic in phrasing like "generate a report on X".
const TOPIC_PREPOSITIONS: &[&str] = &["about", "on", "regarding", "concerning", "for"];

/// Maximum words taken from a preposition scan as the topic.
const TOPIC_WORD_LIMIT: usize = 7;

pub fn run(text: &str) -> Result<ReportPlan, OrchestratorError> {
    let analysis_type = detect_analysis_type(text);
    let topic = extract_topic(text)?;
    let framework = framework_for(analysis_type);
    let outline = outline_template(analysis_type);

    debug!(%topic, ?analysis_type, sections = outline.len(), "report plan built");

    Ok(ReportPlan {
        topic,
        analysis_type,
        framework,
        outline,
    })
}

pub fn detect_analysis_type(text: &str) -> AnalysisType {
    let lower = text.to_lowercase();
    if MARKET_KEYWORDS.iter().any(|k| lower.contains(k)) {
        AnalysisType::Market
    } else if TECHNICAL_KEYWORDS.iter().any(|k| lower.contains(k)) {
        AnalysisType::Technical
    } else {
        AnalysisType::General
    }
}

fn framework_for(analysis_type: AnalysisType) -> Framework {
    match analysis_type {
        AnalysisType::Market => Framework::FiveForces,
        AnalysisType::Technical => Framework::Pest,
        AnalysisType::General => Framework::Swot,
    }
}

/// Extract the report topic from the request text.
///
/// Tries marker phrases ("report about", "report on", "analysis of") first,
/// then a preposition scan over the words, then the whole message. A topic
/// with no alphabetic content is unusable.
pub fn extract_topic(text: &str) -> Result<String, OrchestratorError> {
    let lower = text.to_lowercase();

    let candidate = if let Some(rest) = split_after(&lower, "report about") {
        rest
    } else if let Some(rest) = split_after(&lower, "report on") {
        rest
    } else if let Some(rest) = split_after(&lower, "analysis of") {
        rest
    } else if let Some(rest) = preposition_scan(text) {
        rest
    } else {
        text.to_string()
    };

    let topic = candidate
        .replace(['?', '!'], "")
        .trim()
        .trim_end_matches('.')
        .trim()
        .to_string();

    if topic.chars().any(|c| c.is_alphabetic()) {
        Ok(topic)
    } else {
        Err(OrchestratorError::TopicExtractionFailed)
    }
}

fn split_after(lower: &str, marker: &str) -> Option<String> {
    lower
        .find(marker)
        .map(|idx| lower[idx + marker.len()..].trim().to_string())
}

fn preposition_scan(text: &str) -> Option<String> {
    let words: Vec<&str> = text.split_whitespace().collect();
    for (i, word) in words.iter().enumerate() {
        let bare = word
            .trim_matches(|c: char| !c.is_alphanumeric())
            .to_lowercase();
        if TOPIC_PREPOSITIONS.contains(&bare.as_str()) && i + 1 < words.len() {
            let end = (i + 1 + TOPIC_WORD_LIMIT).min(words.len());
            return Some(words[i + 1..end].join(" "));
        }
    }
    None
}
