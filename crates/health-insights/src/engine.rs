//! Enhanced Health Insights Engine
//!
//! Runs the behavioral-pattern, correlation, trend and goal-opportunity
//! passes, validates every candidate for medical safety and ranks the
//! survivors with a fixed weighted score.

use std::sync::Arc;

use health_core::{higher_is_better, metric_label, HealthCategory, InsightsConfig, MetricSeries, TrendDirection};
use serde_json::json;

use crate::correlation::{CorrelationFinding, CorrelationInsightGenerator, CorrelationStrength};
use crate::evidence::EvidenceDatabase;
use crate::goals::EvidenceBasedGoalGenerator;
use crate::models::{
    Achievability, EvidenceLevel, HealthInsight, ImpactLevel, InsightBuilder, InsightPriority,
    InsightType, Timeframe, VisualHint,
};
use crate::patterns::{StatisticalPatternAnalyzer, WeeklyPattern};
use crate::trend::{RecentTrend, TrendInsightGenerator};
use crate::validator::MedicalEvidenceValidator;

/// Minimum valid points before a consistency finding is reported
const MIN_CONSISTENCY_POINTS: usize = 7;
/// Days averaged for the "current value" in goal opportunities
const CURRENT_VALUE_DAYS: i64 = 7;

/// Ranking score: priority + evidence + impact + achievability + confidence/10
pub fn score_insight(insight: &HealthInsight) -> f64 {
    insight.priority.weight()
        + insight.evidence_level.weight()
        + insight.impact.weight()
        + insight.achievability.weight()
        + insight.confidence / 10.0
}

pub struct EnhancedHealthInsightsEngine {
    config: InsightsConfig,
    database: Arc<EvidenceDatabase>,
    validator: MedicalEvidenceValidator,
    patterns: StatisticalPatternAnalyzer,
    correlations: CorrelationInsightGenerator,
    trends: TrendInsightGenerator,
    goals: EvidenceBasedGoalGenerator,
}

impl Default for EnhancedHealthInsightsEngine {
    fn default() -> Self {
        Self::new(InsightsConfig::default())
    }
}

impl EnhancedHealthInsightsEngine {
    pub fn new(config: InsightsConfig) -> Self {
        let database = Arc::new(EvidenceDatabase::new());
        Self {
            validator: MedicalEvidenceValidator::new(config.min_confidence),
            patterns: StatisticalPatternAnalyzer::new(),
            correlations: CorrelationInsightGenerator::new(),
            trends: TrendInsightGenerator::new(config.min_trend_points, config.min_trend_confidence),
            goals: EvidenceBasedGoalGenerator::new(Arc::clone(&database)),
            database,
            config,
        }
    }

    pub fn config(&self) -> &InsightsConfig {
        &self.config
    }

    pub fn database(&self) -> &EvidenceDatabase {
        &self.database
    }

    /// Ranked insights using the configured maximum
    pub fn generate(&self, series: &[MetricSeries]) -> Vec<HealthInsight> {
        self.generate_insights(series, self.config.max_insights)
    }

    /// Run every analysis pass, validate, rank and truncate to `max_insights`
    pub fn generate_insights(&self, series: &[MetricSeries], max_insights: usize) -> Vec<HealthInsight> {
        let sorted: Vec<MetricSeries> = series
            .iter()
            .filter(|s| !s.is_empty())
            .map(|s| s.sorted())
            .collect();

        let mut candidates = Vec::new();
        candidates.extend(self.analyze_behavioral_patterns(&sorted));
        candidates.extend(self.analyze_correlations(&sorted));
        candidates.extend(self.analyze_trends(&sorted));
        candidates.extend(self.analyze_goal_opportunities(&sorted));

        let candidate_count = candidates.len();

        let mut scored: Vec<(f64, HealthInsight)> = candidates
            .into_iter()
            .filter_map(|c| self.validator.ensure_medical_safety(c))
            .map(|i| (score_insight(&i), i))
            .collect();

        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

        tracing::info!(
            "Insights: {} metrics, {} candidates, {} validated, returning up to {}",
            sorted.len(),
            candidate_count,
            scored.len(),
            max_insights
        );

        scored
            .into_iter()
            .take(max_insights)
            .map(|(_, i)| i)
            .collect()
    }

    /// Weekly rhythms and schedule consistency
    pub fn analyze_behavioral_patterns(&self, series: &[MetricSeries]) -> Vec<HealthInsight> {
        let mut insights = Vec::new();

        for s in series {
            let weekly = self.patterns.find_weekly_patterns(s);
            if weekly.pattern_found {
                if let Some(insight) = self.weekly_pattern_insight(s, &weekly) {
                    insights.push(insight);
                }
            }

            if HealthCategory::for_metric(&s.metric) == HealthCategory::Sleep {
                if let Some(insight) = self.sleep_consistency_insight(s) {
                    insights.push(insight);
                }
            }
        }

        tracing::debug!("Behavioral pass produced {} candidates", insights.len());
        insights
    }

    fn weekly_pattern_insight(&self, s: &MetricSeries, weekly: &WeeklyPattern) -> Option<HealthInsight> {
        let best = weekly.day_means.iter().find(|d| Some(&d.day) == weekly.best_days.first())?;
        let worst = weekly.day_means.iter().find(|d| Some(&d.day) == weekly.worst_days.first())?;
        let label = metric_label(&s.metric);

        let spread = if worst.mean != 0.0 {
            (best.mean - worst.mean) / worst.mean.abs() * 100.0
        } else {
            0.0
        };

        let (strong_day, weak_day) = if higher_is_better(&s.metric) {
            (best.day, worst.day)
        } else {
            (worst.day, best.day)
        };

        Some(
            InsightBuilder::new(
                HealthCategory::for_metric(&s.metric),
                InsightType::Pattern,
                format!("{} follows a weekly rhythm", label),
                format!(
                    "Your {} is highest on {:?} and lowest on {:?} (ANOVA p = {:.3}).",
                    label.to_lowercase(),
                    best.day,
                    worst.day,
                    weekly.p_value
                ),
            )
            .id(format!("pattern_weekly_{}", s.metric))
            .recommendation(format!(
                "Try carrying what works on {:?} into your {:?} routine.",
                strong_day, weak_day
            ))
            .evidence(
                EvidenceLevel::PatternBased,
                vec!["Personal data analysis (one-way ANOVA)".to_string()],
            )
            .confidence(((1.0 - weekly.p_value) * 100.0).min(95.0))
            .priority(InsightPriority::Medium)
            .impact(ImpactLevel::Medium)
            .achievability(Achievability::Easy)
            .timeframe(Timeframe::Immediate)
            .data("metric", s.metric.clone())
            .data("p_value", weekly.p_value)
            .data("f_statistic", weekly.f_statistic)
            .data("best_days", json!(weekly.best_days.iter().map(|d| format!("{:?}", d)).collect::<Vec<_>>()))
            .data("worst_days", json!(weekly.worst_days.iter().map(|d| format!("{:?}", d)).collect::<Vec<_>>()))
            .presentation(
                format!("{} peaks on {:?}", label, best.day),
                Some(format!("{:+.0}%", spread)),
                VisualHint::BarChart,
            )
            .build(),
        )
    }

    fn sleep_consistency_insight(&self, s: &MetricSeries) -> Option<HealthInsight> {
        let (values, measure) = if s.has_extra("bedtime") {
            // Bedtimes after midnight continue the previous evening
            let bedtimes: Vec<f64> = s
                .extra_column("bedtime")
                .into_iter()
                .map(|h| if h < 12.0 { h + 24.0 } else { h })
                .collect();
            (bedtimes, "bedtime")
        } else {
            (s.valid_values(), "sleep duration")
        };

        if values.len() < MIN_CONSISTENCY_POINTS {
            return None;
        }

        let score = self
            .patterns
            .calculate_consistency_score(&values, self.config.consistency_target_variance);

        let builder = if score < 0.5 {
            InsightBuilder::new(
                HealthCategory::Sleep,
                InsightType::Opportunity,
                "Irregular sleep schedule",
                format!(
                    "Your {} varies considerably from night to night (consistency {:.0}/100).",
                    measure,
                    score * 100.0
                ),
            )
            .recommendation("Consider keeping the same bedtime and wake time, including weekends.")
            .evidence(
                EvidenceLevel::Moderate,
                vec!["AASM".to_string(), "National Sleep Foundation".to_string()],
            )
            .confidence(70.0)
            .priority(InsightPriority::High)
            .impact(ImpactLevel::High)
            .achievability(Achievability::Moderate)
            .timeframe(Timeframe::ShortTerm)
        } else if score >= 0.85 {
            InsightBuilder::new(
                HealthCategory::Sleep,
                InsightType::Achievement,
                "Consistent sleep schedule",
                format!(
                    "Your {} has been very regular (consistency {:.0}/100).",
                    measure,
                    score * 100.0
                ),
            )
            .recommendation("Keep your current routine; regular timing may support sleep quality.")
            .evidence(EvidenceLevel::Moderate, vec!["AASM".to_string()])
            .confidence(75.0)
            .priority(InsightPriority::Low)
            .impact(ImpactLevel::Medium)
            .achievability(Achievability::Easy)
            .timeframe(Timeframe::Immediate)
        } else {
            return None;
        };

        Some(
            builder
                .id(format!("pattern_consistency_{}", s.metric))
                .data("metric", s.metric.clone())
                .data("consistency_score", score)
                .data("measure", measure)
                .presentation(
                    "How regular is your sleep?",
                    Some(format!("{:.0}/100", score * 100.0)),
                    VisualHint::BigNumber,
                )
                .build(),
        )
    }

    /// Significant cross-metric correlations
    pub fn analyze_correlations(&self, series: &[MetricSeries]) -> Vec<HealthInsight> {
        self.correlations
            .find_significant_correlations(
                series,
                self.config.min_correlation,
                self.config.min_correlation_points,
            )
            .iter()
            .map(|f| self.correlation_insight(f))
            .collect()
    }

    fn correlation_insight(&self, f: &CorrelationFinding) -> HealthInsight {
        let a = metric_label(&f.metric_a);
        let b = metric_label(&f.metric_b).to_lowercase();
        let relation = if f.correlation > 0.0 {
            "move together"
        } else {
            "move in opposite directions"
        };

        let priority = match f.strength {
            CorrelationStrength::Strong => InsightPriority::Medium,
            CorrelationStrength::Moderate => InsightPriority::Low,
        };

        InsightBuilder::new(
            HealthCategory::for_metric(&f.metric_a),
            InsightType::Correlation,
            format!("{} and {} {}", a, b, relation),
            format!(
                "Across {} days your {} and {} show a {} correlation (r = {:.2}).",
                f.n,
                a.to_lowercase(),
                b,
                f.strength.as_str(),
                f.correlation
            ),
        )
        .id(format!("correlation_{}_{}", f.metric_a, f.metric_b))
        .recommendation(format!(
            "Consider how changes in your {} may relate to your {}.",
            a.to_lowercase(),
            b
        ))
        .evidence(
            EvidenceLevel::PatternBased,
            vec!["Personal data analysis (Pearson correlation)".to_string()],
        )
        .confidence((50.0 + f.correlation.abs() * 50.0) * (1.0 - f.p_value))
        .priority(priority)
        .impact(ImpactLevel::Medium)
        .achievability(Achievability::Moderate)
        .timeframe(Timeframe::ShortTerm)
        .data("metric", f.metric_a.clone())
        .data("metric_b", f.metric_b.clone())
        .data("correlation", f.correlation)
        .data("p_value", f.p_value)
        .data("n", f.n)
        .presentation(
            format!("{} and {}", a, b),
            Some(format!("r = {:.2}", f.correlation)),
            VisualHint::ScatterPlot,
        )
        .build()
    }

    /// Confident recent trends, framed as progress or concern
    pub fn analyze_trends(&self, series: &[MetricSeries]) -> Vec<HealthInsight> {
        series
            .iter()
            .filter_map(|s| self.trends.detect_recent_trend(s, self.config.trend_lookback_days))
            .filter(|t| t.analysis.is_significant())
            .map(|t| self.trend_insight(&t))
            .collect()
    }

    fn trend_insight(&self, t: &RecentTrend) -> HealthInsight {
        let label = metric_label(&t.metric);
        let improving = (t.direction == TrendDirection::Increasing) == higher_is_better(&t.metric);
        let magnitude = t.percent_change.abs();
        let direction = if t.direction == TrendDirection::Increasing {
            "up"
        } else {
            "down"
        };

        let impact = if magnitude >= 20.0 {
            ImpactLevel::High
        } else if magnitude >= 10.0 {
            ImpactLevel::Medium
        } else {
            ImpactLevel::Low
        };

        let (insight_type, priority, recommendation) = if improving {
            (
                InsightType::Trend,
                InsightPriority::Medium,
                "Keep it up; consider noting what changed recently so you can sustain it.".to_string(),
            )
        } else {
            (
                InsightType::Concern,
                if magnitude >= 10.0 {
                    InsightPriority::High
                } else {
                    InsightPriority::Medium
                },
                format!(
                    "Consider reviewing recent routine changes that may be affecting your {}.",
                    label.to_lowercase()
                ),
            )
        };

        InsightBuilder::new(
            HealthCategory::for_metric(&t.metric),
            insight_type,
            format!("{} is trending {}", label, direction),
            format!(
                "Your {} changed {:+.1}% between {} and {}.",
                label.to_lowercase(),
                t.percent_change,
                t.start_date,
                t.end_date
            ),
        )
        .id(format!("trend_{}", t.metric))
        .recommendation(recommendation)
        .evidence(
            EvidenceLevel::PatternBased,
            vec!["Personal data analysis (linear regression)".to_string()],
        )
        .confidence(t.analysis.confidence)
        .priority(priority)
        .impact(impact)
        .achievability(Achievability::Moderate)
        .timeframe(Timeframe::ShortTerm)
        .data("metric", t.metric.clone())
        .data("direction", t.direction.as_str())
        .data("percent_change", t.percent_change)
        .data("p_value", t.analysis.p_value)
        .data("r_squared", t.analysis.r_squared)
        .data("start_date", t.start_date.to_string())
        .data("end_date", t.end_date.to_string())
        .presentation(
            format!("{} {} {:.0}%", label, direction, magnitude),
            Some(format!("{:+.1}%", t.percent_change)),
            VisualHint::LineChart,
        )
        .build()
    }

    /// Guideline gaps turned into personalized goals
    pub fn analyze_goal_opportunities(&self, series: &[MetricSeries]) -> Vec<HealthInsight> {
        let mut insights = Vec::new();

        for s in series {
            let category = HealthCategory::for_metric(&s.metric);
            let Some(guideline) = self.database.guideline(category, &s.metric) else {
                continue;
            };

            let recent = s.last_n_days(CURRENT_VALUE_DAYS).valid_values();
            if recent.len() < 3 {
                continue;
            }
            let current = recent.iter().sum::<f64>() / recent.len() as f64;

            let Some(goal) = self.goals.generate_goal(
                &s.metric,
                category,
                current,
                self.config.demographic.as_deref(),
            ) else {
                continue;
            };

            let label = metric_label(&s.metric);
            let mut sources = vec![guideline.source.clone(), guideline.citation.clone()];
            sources.dedup();

            let builder = if goal.within_guideline {
                InsightBuilder::new(
                    category,
                    InsightType::Achievement,
                    format!("{} is within the recommended range", label),
                    format!(
                        "Your recent average of {:.1} {} meets {} guidance.",
                        current, goal.unit, guideline.source
                    ),
                )
                .recommendation("Keep your current habits; consistency matters more than perfection.")
                .priority(InsightPriority::Low)
                .impact(ImpactLevel::Low)
                .achievability(Achievability::Easy)
                .timeframe(Timeframe::Immediate)
            } else {
                let first_step = goal.milestones.first().map(|m| m.target).unwrap_or(goal.target_value);
                let (achievability, timeframe) = if goal.gap_percent < 10.0 {
                    (Achievability::Easy, Timeframe::Immediate)
                } else if goal.gap_percent < 25.0 {
                    (Achievability::Moderate, Timeframe::ShortTerm)
                } else {
                    (Achievability::Challenging, Timeframe::LongTerm)
                };
                let insight_type = if category.is_high_risk() {
                    InsightType::Concern
                } else {
                    InsightType::Opportunity
                };

                InsightBuilder::new(
                    category,
                    insight_type,
                    format!("Room to improve {}", label.to_lowercase()),
                    format!(
                        "Your recent average is {:.1} {}; {} guidance suggests {:.1} {}.",
                        current, goal.unit, guideline.source, goal.target_value, goal.unit
                    ),
                )
                .recommendation(format!(
                    "Aim for {:.1} {} first, then work toward {:.1} {} over {}.",
                    first_step, goal.unit, goal.target_value, goal.unit, goal.timeline
                ))
                .priority(if goal.gap_percent >= 25.0 {
                    InsightPriority::High
                } else {
                    InsightPriority::Medium
                })
                .impact(if goal.evidence_level == EvidenceLevel::Strong {
                    ImpactLevel::High
                } else {
                    ImpactLevel::Medium
                })
                .achievability(achievability)
                .timeframe(timeframe)
            };

            insights.push(
                builder
                    .id(format!("goal_{}", s.metric))
                    .evidence(goal.evidence_level, sources)
                    .confidence(goal.confidence)
                    .data("metric", s.metric.clone())
                    .data("current_value", current)
                    .data("target_value", goal.target_value)
                    .data("gap_percent", goal.gap_percent)
                    .data("timeline", goal.timeline.clone())
                    .data(
                        "milestones",
                        json!(goal.milestones.iter().map(|m| m.target).collect::<Vec<_>>()),
                    )
                    .presentation(
                        format!("{}: {:.0} of {:.0} {}", label, current, goal.target_value, goal.unit),
                        Some(format!("{:.0} → {:.0} {}", current, goal.target_value, goal.unit)),
                        VisualHint::ProgressBar,
                    )
                    .build(),
            );
        }

        tracing::debug!("Goal pass produced {} candidates", insights.len());
        insights
    }
}
