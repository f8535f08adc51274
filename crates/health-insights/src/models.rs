//! Health Insight Data Models

use std::collections::BTreeMap;

use health_core::HealthCategory;
use serde::{Deserialize, Serialize};

/// Kind of finding an insight reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InsightType {
    Pattern,
    Correlation,
    Trend,
    Opportunity,
    Concern,
    Achievement,
}

impl InsightType {
    pub fn as_str(&self) -> &'static str {
        match self {
            InsightType::Pattern => "pattern",
            InsightType::Correlation => "correlation",
            InsightType::Trend => "trend",
            InsightType::Opportunity => "opportunity",
            InsightType::Concern => "concern",
            InsightType::Achievement => "achievement",
        }
    }
}

/// How well a recommendation is backed by external guidelines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EvidenceLevel {
    Strong,
    Moderate,
    Weak,
    /// Derived from the user's own data only
    PatternBased,
}

impl EvidenceLevel {
    pub fn weight(&self) -> f64 {
        match self {
            EvidenceLevel::Strong => 20.0,
            EvidenceLevel::Moderate => 15.0,
            EvidenceLevel::Weak => 10.0,
            EvidenceLevel::PatternBased => 5.0,
        }
    }

    /// Baseline confidence for goals derived from a guideline at this level
    pub fn base_confidence(&self) -> f64 {
        match self {
            EvidenceLevel::Strong => 90.0,
            EvidenceLevel::Moderate => 75.0,
            EvidenceLevel::Weak => 60.0,
            EvidenceLevel::PatternBased => 50.0,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            EvidenceLevel::Strong => "Strong evidence",
            EvidenceLevel::Moderate => "Moderate evidence",
            EvidenceLevel::Weak => "Limited evidence",
            EvidenceLevel::PatternBased => "Based on your data",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InsightPriority {
    High,
    Medium,
    Low,
}

impl InsightPriority {
    pub fn weight(&self) -> f64 {
        match self {
            InsightPriority::High => 30.0,
            InsightPriority::Medium => 20.0,
            InsightPriority::Low => 10.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ImpactLevel {
    High,
    Medium,
    Low,
}

impl ImpactLevel {
    pub fn weight(&self) -> f64 {
        match self {
            ImpactLevel::High => 20.0,
            ImpactLevel::Medium => 10.0,
            ImpactLevel::Low => 5.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Achievability {
    Easy,
    Moderate,
    Challenging,
}

impl Achievability {
    pub fn weight(&self) -> f64 {
        match self {
            Achievability::Easy => 20.0,
            Achievability::Moderate => 15.0,
            Achievability::Challenging => 10.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Timeframe {
    Immediate,
    ShortTerm,
    LongTerm,
}

impl Timeframe {
    pub fn label(&self) -> &'static str {
        match self {
            Timeframe::Immediate => "this week",
            Timeframe::ShortTerm => "next few weeks",
            Timeframe::LongTerm => "next few months",
        }
    }
}

/// Suggested chart form for presenting an insight
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VisualHint {
    LineChart,
    BarChart,
    ScatterPlot,
    ProgressBar,
    BigNumber,
}

/// Editorial presentation metadata: a short headline, one highlighted
/// figure and a chart suggestion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsightPresentation {
    pub headline: String,
    pub key_figure: Option<String>,
    pub visual: VisualHint,
}

/// Evidence-backed finding about the user's metrics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthInsight {
    pub id: String,
    pub category: HealthCategory,
    pub insight_type: InsightType,
    pub title: String,
    pub description: String,
    pub recommendation: String,
    pub evidence_level: EvidenceLevel,
    pub evidence_sources: Vec<String>,
    /// Confidence in 0-100
    pub confidence: f64,
    pub priority: InsightPriority,
    pub impact: ImpactLevel,
    pub achievability: Achievability,
    pub timeframe: Timeframe,
    pub supporting_data: BTreeMap<String, serde_json::Value>,
    /// Filled in by the validator
    pub medical_disclaimer: String,
    pub presentation: InsightPresentation,
}

impl HealthInsight {
    /// Actionability in 0-1 from achievability and impact
    pub fn actionability(&self) -> f64 {
        let ease = match self.achievability {
            Achievability::Easy => 1.0,
            Achievability::Moderate => 0.7,
            Achievability::Challenging => 0.4,
        };
        let impact = match self.impact {
            ImpactLevel::High => 1.0,
            ImpactLevel::Medium => 0.7,
            ImpactLevel::Low => 0.4,
        };
        match self.insight_type {
            // Praise and correlations are informative rather than actionable
            InsightType::Achievement | InsightType::Correlation => ease * impact * 0.6,
            _ => ease * impact,
        }
    }

    /// Metric this insight was derived from, if recorded
    pub fn metric(&self) -> Option<&str> {
        self.supporting_data.get("metric").and_then(|v| v.as_str())
    }
}

/// Builder used by the analysis passes
#[derive(Debug, Clone)]
pub struct InsightBuilder {
    insight: HealthInsight,
}

impl InsightBuilder {
    pub fn new(
        category: HealthCategory,
        insight_type: InsightType,
        title: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        let title = title.into();
        Self {
            insight: HealthInsight {
                id: String::new(),
                category,
                insight_type,
                presentation: InsightPresentation {
                    headline: title.clone(),
                    key_figure: None,
                    visual: VisualHint::LineChart,
                },
                title,
                description: description.into(),
                recommendation: String::new(),
                evidence_level: EvidenceLevel::PatternBased,
                evidence_sources: Vec::new(),
                confidence: 50.0,
                priority: InsightPriority::Medium,
                impact: ImpactLevel::Medium,
                achievability: Achievability::Moderate,
                timeframe: Timeframe::ShortTerm,
                supporting_data: BTreeMap::new(),
                medical_disclaimer: String::new(),
            },
        }
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.insight.id = id.into();
        self
    }

    pub fn recommendation(mut self, text: impl Into<String>) -> Self {
        self.insight.recommendation = text.into();
        self
    }

    pub fn evidence(mut self, level: EvidenceLevel, sources: Vec<String>) -> Self {
        self.insight.evidence_level = level;
        self.insight.evidence_sources = sources;
        self
    }

    pub fn confidence(mut self, confidence: f64) -> Self {
        self.insight.confidence = confidence.clamp(0.0, 100.0);
        self
    }

    pub fn priority(mut self, priority: InsightPriority) -> Self {
        self.insight.priority = priority;
        self
    }

    pub fn impact(mut self, impact: ImpactLevel) -> Self {
        self.insight.impact = impact;
        self
    }

    pub fn achievability(mut self, achievability: Achievability) -> Self {
        self.insight.achievability = achievability;
        self
    }

    pub fn timeframe(mut self, timeframe: Timeframe) -> Self {
        self.insight.timeframe = timeframe;
        self
    }

    pub fn data(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.insight.supporting_data.insert(key.to_string(), value.into());
        self
    }

    pub fn presentation(
        mut self,
        headline: impl Into<String>,
        key_figure: Option<String>,
        visual: VisualHint,
    ) -> Self {
        self.insight.presentation = InsightPresentation {
            headline: headline.into(),
            key_figure,
            visual,
        };
        self
    }

    pub fn build(self) -> HealthInsight {
        self.insight
    }
}
