//! Keyword-based message routing.
//!
//! `classify` is pure and total: no model call, no I/O, defined for every
//! input including the empty string. It gates whether the expensive report
//! path is taken, so it must stay computable offline.

use crate::sdk::{Route, RoutingDecision};

/// Terms that suggest a report/research request.
const REPORT_SIGNALS: &[&str] = &[
    "report",
    "analysis",
    "research",
    "study",
    "investigate",
    "analyze",
    "market analysis",
    "business analysis",
    "financial analysis",
    "data analysis",
    "swot",
    "pest",
    "competitive analysis",
    "industry analysis",
    "feasibility study",
    "white paper",
    "case study",
    "outline",
    "findings",
    "recommendations",
    "assessment",
];

/// Terms that suggest ordinary conversation.
const CHAT_SIGNALS: &[&str] = &[
    "hello",
    "hey",
    "how are you",
    "what time",
    "calculate",
    "math",
    "weather",
    "news",
    "joke",
    "story",
    "explain",
    "define",
    "what is",
    "how do",
    "tell me about",
];

/// Saturation constant for `net / (net + K)`: one uncontested keyword is
/// enough to clear the 0.5 routing threshold.
const SATURATION_K: f64 = 0.5;

/// Confidence reported when both signal sets matched equally.
const AMBIGUOUS_CONFIDENCE: f64 = 0.25;

fn matches_in(text_lower: &str, signals: &[&str]) -> Vec<String> {
    signals
        .iter()
        .filter(|keyword| text_lower.contains(*keyword))
        .map(|keyword| keyword.to_string())
        .collect()
}

fn saturate(net: usize) -> f64 {
    let net = net as f64;
    net / (net + SATURATION_K)
}

/// Classify a user message into a route with a confidence score.
///
/// Counts case-insensitive substring matches against the two signal sets and
/// saturates the difference into `[0, 1]`. Ties and no-match inputs fall back
/// to `simple` with the ambiguity recorded in the rationale.
pub fn classify(text: &str) -> RoutingDecision {
    let text_lower = text.to_lowercase();

    let report_matches = matches_in(&text_lower, REPORT_SIGNALS);
    let chat_matches = matches_in(&text_lower, CHAT_SIGNALS);

    let mut matched_keywords = report_matches.clone();
    matched_keywords.extend(chat_matches.iter().cloned());

    let (route, confidence, ambiguous) = if report_matches.len() > chat_matches.len() {
        let net = report_matches.len() - chat_matches.len();
        (Route::Report, saturate(net), false)
    } else if chat_matches.len() > report_matches.len() {
        let net = chat_matches.len() - report_matches.len();
        (Route::Simple, saturate(net), false)
    } else if matched_keywords.is_empty() {
        // Nothing matched at all; empty input lands here too.
        (Route::Simple, 0.0, true)
    } else {
        // Equal pull from both sets: cost-conservative default.
        (Route::Simple, AMBIGUOUS_CONFIDENCE, true)
    };

    let rationale = if matched_keywords.is_empty() {
        "no routing keywords matched; defaulting to simple".to_string()
    } else if ambiguous {
        format!(
            "ambiguous: {} report keyword(s) [{}] vs {} chat keyword(s) [{}]; defaulting to simple",
            report_matches.len(),
            report_matches.join(", "),
            chat_matches.len(),
            chat_matches.join(", "),
        )
    } else {
        format!(
            "{} report keyword(s) [{}], {} chat keyword(s) [{}]",
            report_matches.len(),
            report_matches.join(", "),
            chat_matches.len(),
            chat_matches.join(", "),
        )
    };

    RoutingDecision {
        route,
        confidence,
        rationale,
        matched_keywords,
        ambiguous,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_signal_routes_report_with_high_confidence() {
        let decision = classify("Please write a market analysis of electric bikes");
        assert_eq!(decision.route, Route::Report);
        assert!(decision.confidence > 0.5);
        assert!(!decision.ambiguous);
    }

    #[test]
    fn test_swot_request_routes_report() {
        let decision = classify("Create a SWOT analysis for a startup");
        assert_eq!(decision.route, Route::Report);
        assert!(decision.confidence > 0.5);
        assert!(decision
            .matched_keywords
            .iter()
            .any(|k| k == "swot"));
    }

    #[test]
    fn test_empty_input_routes_simple_with_zero_confidence() {
        let decision = classify("");
        assert_eq!(decision.route, Route::Simple);
        assert_eq!(decision.confidence, 0.0);
        assert!(decision.ambiguous);
    }

    #[test]
    fn test_pure_chat_routes_simple() {
        let decision = classify("Hello, tell me a joke about the weather");
        assert_eq!(decision.route, Route::Simple);
        assert!(decision.confidence > 0.5);
    }

    #[test]
    fn test_calculation_routes_simple() {
        let decision = classify("Calculate 25 * 4 + 10");
        assert_eq!(decision.route, Route::Simple);
    }

    #[test]
    fn test_tie_defaults_to_simple_and_records_ambiguity() {
        // One keyword from each set.
        let decision = classify("explain this report");
        assert_eq!(decision.route, Route::Simple);
        assert!(decision.ambiguous);
        assert!(decision.rationale.contains("ambiguous"));
        assert!(decision.confidence < 0.5);
    }

    #[test]
    fn test_rationale_enumerates_matches() {
        let decision = classify("research report on rust");
        assert!(decision.rationale.contains("research"));
        assert!(decision.rationale.contains("report"));
    }

    #[test]
    fn test_never_panics_on_odd_input() {
        for text in ["?", "!!!", "   ", "\u{1F600} unicode", "a"] {
            let decision = classify(text);
            assert!((0.0..=1.0).contains(&decision.confidence));
        }
    }
}
