//! Health Insights
//!
//! Evidence-backed insight generation over daily health metrics:
//! statistical pattern detection, cross-metric correlation, recent trends
//! and guideline-based goals, validated for medical safety and ranked.

pub mod correlation;
pub mod engine;
pub mod evidence;
pub mod goals;
pub mod models;
pub mod patterns;
pub mod summary;
pub mod trend;
pub mod validator;
pub mod worker;

pub use correlation::{pearson, CorrelationFinding, CorrelationInsightGenerator, CorrelationStrength};
pub use engine::{score_insight, EnhancedHealthInsightsEngine};
pub use evidence::{EvidenceDatabase, MedicalGuideline, Recommendation};
pub use goals::{EvidenceBasedGoalGenerator, GoalMilestone, PersonalizedGoal};
pub use models::{
    Achievability, EvidenceLevel, HealthInsight, ImpactLevel, InsightBuilder, InsightPresentation,
    InsightPriority, InsightType, Timeframe, VisualHint,
};
pub use patterns::{
    linear_regression, percentile_sorted, RegressionResult, StatisticalPatternAnalyzer, TrendAnalysis,
    WeeklyPattern,
};
pub use summary::weekly_summary;
pub use trend::{RecentTrend, TrendInsightGenerator};
pub use validator::{EvidenceValidation, MedicalEvidenceValidator};
pub use worker::InsightWorker;
