//! Data carried between report phases, plus the static content tables
//! (outline sections, source catalogs, analysis frameworks) the phases
//! draw from.

use serde::{Deserialize, Serialize};

use crate::sdk::AnalysisType;

/// Analytical framework applied during the writing phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Framework {
    Swot,
    Pest,
    FiveForces,
}

impl Framework {
    pub fn name(&self) -> &'static str {
        match self {
            Framework::Swot => "SWOT",
            Framework::Pest => "PEST",
            Framework::FiveForces => "Five Forces",
        }
    }

    /// Dimension name and what the writer should cover under it.
    pub fn dimensions(&self) -> &'static [(&'static str, &'static str)] {
        match self {
            Framework::Swot => &[
                ("Strengths", "Internal positive factors and advantages"),
                ("Weaknesses", "Internal negative factors and limitations"),
                ("Opportunities", "External positive factors and potential gains"),
                ("Threats", "External negative factors and potential risks"),
            ],
            Framework::Pest => &[
                (
                    "Political",
                    "Government policies, regulations, political stability",
                ),
                (
                    "Economic",
                    "Economic conditions, inflation, exchange rates",
                ),
                ("Social", "Social trends, demographics, cultural factors"),
                (
                    "Technological",
                    "Technology trends, innovation, digital transformation",
                ),
            ],
            Framework::FiveForces => &[
                (
                    "Threat of New Entrants",
                    "Barriers to entry, market saturation",
                ),
                (
                    "Bargaining Power of Suppliers",
                    "Supplier concentration, switching costs",
                ),
                (
                    "Bargaining Power of Buyers",
                    "Buyer concentration, price sensitivity",
                ),
                (
                    "Threat of Substitutes",
                    "Alternative products, switching costs",
                ),
                (
                    "Industry Rivalry",
                    "Competitor concentration, market growth",
                ),
            ],
        }
    }
}

/// One section of the planned report with the points it should cover.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutlineSection {
    pub title: String,
    pub points: Vec<String>,
}

/// Output of the analyze phase: everything later phases need to know about
/// the request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportPlan {
    pub topic: String,
    pub analysis_type: AnalysisType,
    pub framework: Framework,
    pub outline: Vec<OutlineSection>,
}

/// A named group of suggested sources, e.g. "Academic" or "Market Data".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceCategory {
    pub name: String,
    pub sources: Vec<String>,
}

/// Research guidance for one outline section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionResearch {
    pub section: String,
    pub source_categories: Vec<SourceCategory>,
    pub data_points: Vec<String>,
}

/// Output of the research phase.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchPlan {
    pub sections: Vec<SectionResearch>,
}

/// One drafted section produced by the writing phase.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionDraft {
    pub title: String,
    pub body: String,
}

/// Output of the writing phase, consumed by review.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DraftReport {
    pub sections: Vec<SectionDraft>,
}

/// Final result handed back to the supervisor.
#[derive(Debug, Clone)]
pub struct ReportOutput {
    pub report: String,
    pub title: String,
    pub topic: String,
    pub analysis_type: AnalysisType,
}

/// Outline section templates per analysis type.
pub fn outline_template(analysis_type: AnalysisType) -> Vec<OutlineSection> {
    let sections: &[(&str, &[&str])] = match analysis_type {
        AnalysisType::General => &[
            (
                "Executive Summary",
                &["Key findings", "Main conclusions", "Recommendations"],
            ),
            (
                "Introduction",
                &[
                    "Background and context",
                    "Problem statement",
                    "Objectives and scope",
                ],
            ),
            (
                "Methodology",
                &["Research approach", "Data sources", "Analysis framework"],
            ),
            (
                "Analysis and Findings",
                &["Key insights", "Data interpretation", "Trend analysis"],
            ),
            (
                "Discussion",
                &[
                    "Implications of findings",
                    "Limitations",
                    "Comparative analysis",
                ],
            ),
            (
                "Conclusions and Recommendations",
                &[
                    "Summary of key points",
                    "Actionable recommendations",
                    "Future considerations",
                ],
            ),
        ],
        AnalysisType::Market => &[
            (
                "Executive Summary",
                &[
                    "Market overview",
                    "Key market trends",
                    "Strategic recommendations",
                ],
            ),
            (
                "Market Overview",
                &[
                    "Market size and growth",
                    "Market segmentation",
                    "Key players",
                ],
            ),
            (
                "Market Analysis",
                &[
                    "SWOT analysis",
                    "Competitive landscape",
                    "Market opportunities",
                ],
            ),
            (
                "Consumer Analysis",
                &[
                    "Target demographics",
                    "Consumer behavior",
                    "Market demand",
                ],
            ),
            (
                "Financial Analysis",
                &[
                    "Market valuation",
                    "Revenue projections",
                    "Investment opportunities",
                ],
            ),
            (
                "Strategic Recommendations",
                &[
                    "Market entry strategies",
                    "Risk assessment",
                    "Action plan",
                ],
            ),
        ],
        AnalysisType::Technical => &[
            (
                "Executive Summary",
                &["Technical overview", "Key findings", "Recommendations"],
            ),
            (
                "Technical Background",
                &[
                    "Technology overview",
                    "Current state",
                    "Technical challenges",
                ],
            ),
            (
                "Technical Analysis",
                &[
                    "System architecture",
                    "Performance metrics",
                    "Technical evaluation",
                ],
            ),
            (
                "Implementation Analysis",
                &[
                    "Implementation approach",
                    "Resource requirements",
                    "Timeline considerations",
                ],
            ),
            (
                "Risk Assessment",
                &[
                    "Technical risks",
                    "Mitigation strategies",
                    "Contingency plans",
                ],
            ),
            (
                "Recommendations",
                &[
                    "Technical solutions",
                    "Implementation roadmap",
                    "Success metrics",
                ],
            ),
        ],
    };

    sections
        .iter()
        .map(|(title, points)| OutlineSection {
            title: (*title).to_string(),
            points: points.iter().map(|p| (*p).to_string()).collect(),
        })
        .collect()
}

/// Suggested source catalogs per analysis type.
pub fn source_catalog(analysis_type: AnalysisType) -> Vec<SourceCategory> {
    let categories: &[(&str, &[&str])] = match analysis_type {
        AnalysisType::General => &[
            (
                "Academic",
                &["Google Scholar", "JSTOR", "ResearchGate", "ScienceDirect"],
            ),
            (
                "News",
                &["Reuters", "BBC News", "The Guardian", "Financial Times"],
            ),
            (
                "Reports",
                &["McKinsey Global Institute", "PwC", "Deloitte", "KPMG"],
            ),
            (
                "Government",
                &[
                    "Government websites (.gov)",
                    "OECD",
                    "World Bank",
                    "UN reports",
                ],
            ),
        ],
        AnalysisType::Market => &[
            (
                "Market Data",
                &[
                    "Statista",
                    "IBISWorld",
                    "Market Research Reports",
                    "Grand View Research",
                ],
            ),
            (
                "Financial",
                &["Bloomberg", "Reuters", "Yahoo Finance", "MarketWatch"],
            ),
            (
                "Industry",
                &[
                    "Industry associations",
                    "Trade publications",
                    "Company annual reports",
                ],
            ),
            (
                "Consumer",
                &[
                    "Nielsen",
                    "Kantar",
                    "Consumer surveys",
                    "Social media analytics",
                ],
            ),
        ],
        AnalysisType::Technical => &[
            (
                "Technical",
                &["IEEE Xplore", "ACM Digital Library", "ArXiv", "GitHub"],
            ),
            (
                "Standards",
                &["ISO standards", "IEEE standards", "RFC documents"],
            ),
            (
                "Documentation",
                &[
                    "Official documentation",
                    "Technical blogs",
                    "Stack Overflow",
                ],
            ),
            (
                "Tools",
                &[
                    "Technical forums",
                    "Developer communities",
                    "Open source projects",
                ],
            ),
        ],
    };

    categories
        .iter()
        .map(|(name, sources)| SourceCategory {
            name: (*name).to_string(),
            sources: sources.iter().map(|s| (*s).to_string()).collect(),
        })
        .collect()
}
