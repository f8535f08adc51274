use crate::{
    Anomaly, Goal, GoalProgress, HealthResult, InsightSummary, MetricSeries, PersonalRecord,
    TrendFinding,
};

/// Trait for anomaly detection systems
pub trait AnomalyDetector: Send + Sync {
    fn detect_anomalies(
        &self,
        series: &MetricSeries,
        metric: &str,
        sensitivity: f64,
    ) -> HealthResult<Vec<Anomaly>>;
}

/// Trait for personal record trackers
pub trait RecordsTracker: Send + Sync {
    fn find_records(
        &self,
        series: &MetricSeries,
        metric: &str,
        lookback_days: i64,
    ) -> HealthResult<Vec<PersonalRecord>>;
}

/// Trait for trend analysis engines
pub trait TrendEngine: Send + Sync {
    fn analyze_trends(
        &self,
        series: &MetricSeries,
        metric: &str,
        min_confidence: f64,
    ) -> HealthResult<Vec<TrendFinding>>;
}

/// Trait for goal management systems
pub trait GoalManager: Send + Sync {
    fn active_goals(&self, metric: &str) -> HealthResult<Vec<Goal>>;

    fn goal_progress(&self, goal: &Goal, current_value: f64) -> GoalProgress;
}

/// Trait for anything that can rank insights about a single metric
pub trait InsightSource: Send + Sync {
    fn top_insights(
        &self,
        series: &MetricSeries,
        metric: &str,
        limit: usize,
    ) -> HealthResult<Vec<InsightSummary>>;
}
