//! Built-in collaborators for the annotation system
//!
//! Each one implements a `health_core` trait so callers can swap in their own
//! detector, tracker or goal store.

use std::sync::Arc;

use chrono::NaiveDate;
use health_core::{
    days_after, days_before, higher_is_better, metric_label, Anomaly, AnomalyDetector, DataPoint,
    Goal, GoalManager, GoalProgress, HealthError, HealthResult, InsightSource, InsightSummary,
    MetricSeries, PersonalRecord, RecordType, RecordsTracker, TrendEngine, TrendFinding,
};
use health_insights::patterns::SIGNIFICANCE_LEVEL;
use health_insights::{percentile_sorted, EnhancedHealthInsightsEngine, StatisticalPatternAnalyzer};
use statrs::statistics::Statistics;

/// Flags points whose z-score against the series reaches the sensitivity
#[derive(Debug, Clone)]
pub struct ZScoreAnomalyDetector {
    min_points: usize,
}

impl Default for ZScoreAnomalyDetector {
    fn default() -> Self {
        Self::new(7)
    }
}

impl ZScoreAnomalyDetector {
    pub fn new(min_points: usize) -> Self {
        Self { min_points }
    }
}

impl AnomalyDetector for ZScoreAnomalyDetector {
    fn detect_anomalies(
        &self,
        series: &MetricSeries,
        metric: &str,
        sensitivity: f64,
    ) -> HealthResult<Vec<Anomaly>> {
        if sensitivity.is_nan() || sensitivity <= 0.0 {
            return Err(HealthError::InvalidData(format!(
                "anomaly sensitivity must be positive, got {}",
                sensitivity
            )));
        }

        let points: Vec<&DataPoint> = series.points.iter().filter(|p| p.is_valid()).collect();
        if points.len() < self.min_points {
            return Ok(Vec::new());
        }

        let values: Vec<f64> = points.iter().map(|p| p.value).collect();
        let mean = values.iter().mean();
        let std = values.iter().std_dev();
        if std.is_nan() || std <= 0.0 {
            return Ok(Vec::new());
        }

        let expected_range = (mean - sensitivity * std, mean + sensitivity * std);
        let label = metric_label(metric);

        Ok(points
            .iter()
            .filter_map(|p| {
                let z = (p.value - mean) / std;
                if z.abs() < sensitivity {
                    return None;
                }
                // |z| at twice the sensitivity saturates to 1
                let severity = (z.abs() / (2.0 * sensitivity)).min(1.0);
                Some(Anomaly {
                    date: p.date,
                    value: p.value,
                    severity,
                    expected_range,
                    z_score: z,
                    description: format!(
                        "{} of {:.1} is {:.1} standard deviations {} your average of {:.1}",
                        label,
                        p.value,
                        z.abs(),
                        if z > 0.0 { "above" } else { "below" },
                        mean
                    ),
                })
            })
            .collect())
    }
}

/// New all-time bests and the longest better-than-median run
#[derive(Debug, Clone)]
pub struct PersonalRecordsTracker {
    /// Observations needed before a new best counts as a record
    min_history: usize,
    min_streak_days: u32,
}

impl Default for PersonalRecordsTracker {
    fn default() -> Self {
        Self::new(7, 7)
    }
}

impl PersonalRecordsTracker {
    pub fn new(min_history: usize, min_streak_days: u32) -> Self {
        Self {
            min_history,
            min_streak_days,
        }
    }

    fn longest_streak(
        &self,
        points: &[&DataPoint],
        higher_better: bool,
        cutoff: Option<NaiveDate>,
    ) -> Option<PersonalRecord> {
        let window: Vec<&DataPoint> = points
            .iter()
            .copied()
            .filter(|p| after_cutoff(p.date, cutoff))
            .collect();
        if window.len() < self.min_streak_days as usize {
            return None;
        }

        let mut sorted: Vec<f64> = window.iter().map(|p| p.value).collect();
        sorted.sort_by(|a, b| a.total_cmp(b));
        let median = percentile_sorted(&sorted, 50.0);

        let good = |v: f64| if higher_better { v > median } else { v < median };

        let mut best: Option<(u32, &DataPoint)> = None;
        let mut run = 0u32;
        let mut prev_date: Option<NaiveDate> = None;
        for p in &window {
            let consecutive = prev_date.is_some_and(|d| days_after(d, 1) == Some(p.date));
            run = if !good(p.value) {
                0
            } else if consecutive {
                run + 1
            } else {
                1
            };
            if run > 0 && !best.is_some_and(|(len, _)| run <= len) {
                best = Some((run, *p));
            }
            prev_date = Some(p.date);
        }

        let (streak_days, end) = best?;
        if streak_days < self.min_streak_days {
            return None;
        }

        Some(PersonalRecord {
            date: end.date,
            value: end.value,
            record_type: RecordType::LongestStreak,
            previous_best: None,
            improvement_percent: 0.0,
            streak_days,
        })
    }
}

impl RecordsTracker for PersonalRecordsTracker {
    fn find_records(
        &self,
        series: &MetricSeries,
        metric: &str,
        lookback_days: i64,
    ) -> HealthResult<Vec<PersonalRecord>> {
        let sorted = series.sorted();
        let points: Vec<&DataPoint> = sorted.points.iter().filter(|p| p.is_valid()).collect();
        let Some(latest) = points.last() else {
            return Ok(Vec::new());
        };

        // Unbounded when the lookback reaches past the representable calendar
        let cutoff = days_before(latest.date, lookback_days);
        let higher_better = higher_is_better(metric);

        let mut records = Vec::new();
        let mut best: Option<f64> = None;
        for (i, p) in points.iter().enumerate() {
            let Some(prev) = best else {
                best = Some(p.value);
                continue;
            };
            let improved = if higher_better {
                p.value > prev
            } else {
                p.value < prev
            };
            if !improved {
                continue;
            }
            if i >= self.min_history && after_cutoff(p.date, cutoff) {
                let improvement_percent = if prev != 0.0 {
                    (p.value - prev).abs() / prev.abs() * 100.0
                } else {
                    0.0
                };
                records.push(PersonalRecord {
                    date: p.date,
                    value: p.value,
                    record_type: RecordType::PersonalBest,
                    previous_best: Some(prev),
                    improvement_percent,
                    streak_days: 0,
                });
            }
            best = Some(p.value);
        }

        records.extend(self.longest_streak(&points, higher_better, cutoff));
        Ok(records)
    }
}

/// Linear regression over consecutive fixed-length windows
#[derive(Debug, Clone)]
pub struct RegressionTrendEngine {
    analyzer: StatisticalPatternAnalyzer,
    window_days: i64,
    min_points: usize,
}

impl Default for RegressionTrendEngine {
    fn default() -> Self {
        Self::new(30, 7)
    }
}

impl RegressionTrendEngine {
    pub fn new(window_days: i64, min_points: usize) -> Self {
        Self {
            analyzer: StatisticalPatternAnalyzer::new(),
            window_days: window_days.max(1),
            min_points,
        }
    }

    fn window_finding(&self, window: &[&DataPoint], min_confidence: f64) -> Option<TrendFinding> {
        if window.len() < self.min_points.max(3) {
            return None;
        }

        let values: Vec<f64> = window.iter().map(|p| p.value).collect();
        let analysis = self.analyzer.detect_trend(&values, self.min_points);
        if analysis.confidence < min_confidence {
            return None;
        }

        let start_value = values[..3].iter().sum::<f64>() / 3.0;
        let end_value = values[values.len() - 3..].iter().sum::<f64>() / 3.0;
        let percent_change = if start_value != 0.0 {
            (end_value - start_value) / start_value.abs() * 100.0
        } else {
            0.0
        };

        Some(TrendFinding {
            start_date: window[0].date,
            end_date: window[window.len() - 1].date,
            direction: analysis.trend,
            percent_change,
            confidence: analysis.confidence,
            p_value: analysis.p_value,
            is_significant: analysis.is_significant() && analysis.p_value < SIGNIFICANCE_LEVEL,
        })
    }
}

impl TrendEngine for RegressionTrendEngine {
    fn analyze_trends(
        &self,
        series: &MetricSeries,
        metric: &str,
        min_confidence: f64,
    ) -> HealthResult<Vec<TrendFinding>> {
        let sorted = series.sorted();
        let points: Vec<&DataPoint> = sorted.points.iter().filter(|p| p.is_valid()).collect();

        let mut findings = Vec::new();
        let mut idx = 0;
        while idx < points.len() {
            let window_start = points[idx].date;
            let window_end = days_after(window_start, self.window_days);
            let len = points[idx..]
                .iter()
                .take_while(|p| !window_end.is_some_and(|end| p.date >= end))
                .count();
            findings.extend(self.window_finding(&points[idx..idx + len], min_confidence));
            idx += len;
        }

        tracing::debug!(
            "Trend engine: {} windows above confidence for {}",
            findings.len(),
            metric
        );
        Ok(findings)
    }
}

fn after_cutoff(date: NaiveDate, cutoff: Option<NaiveDate>) -> bool {
    match cutoff {
        Some(c) => date > c,
        None => true,
    }
}

/// Goal store held in memory; every registered goal is active
#[derive(Debug, Clone, Default)]
pub struct InMemoryGoalManager {
    goals: Vec<Goal>,
}

impl InMemoryGoalManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_goal(mut self, goal: Goal) -> Self {
        self.goals.push(goal);
        self
    }

    pub fn add_goal(&mut self, goal: Goal) {
        self.goals.push(goal);
    }
}

impl GoalManager for InMemoryGoalManager {
    fn active_goals(&self, metric: &str) -> HealthResult<Vec<Goal>> {
        Ok(self
            .goals
            .iter()
            .filter(|g| g.metric == metric)
            .cloned()
            .collect())
    }

    fn goal_progress(&self, goal: &Goal, current_value: f64) -> GoalProgress {
        let span = goal.target_value - goal.start_value;
        let progress_percent = if span.abs() < f64::EPSILON {
            100.0
        } else {
            ((current_value - goal.start_value) / span * 100.0).clamp(0.0, 100.0)
        };
        let completed = progress_percent >= 100.0;
        let milestone_reached = if completed {
            None
        } else {
            [75u8, 50, 25]
                .into_iter()
                .find(|m| progress_percent >= f64::from(*m))
        };

        GoalProgress {
            goal_id: goal.id.clone(),
            current_value,
            progress_percent,
            milestone_reached,
            completed,
        }
    }
}

/// Exposes the insights engine's ranked output for one metric
#[derive(Clone)]
pub struct InsightsEngineSource {
    engine: Arc<EnhancedHealthInsightsEngine>,
}

impl Default for InsightsEngineSource {
    fn default() -> Self {
        Self::new(Arc::new(EnhancedHealthInsightsEngine::default()))
    }
}

impl InsightsEngineSource {
    pub fn new(engine: Arc<EnhancedHealthInsightsEngine>) -> Self {
        Self { engine }
    }
}

impl InsightSource for InsightsEngineSource {
    fn top_insights(
        &self,
        series: &MetricSeries,
        metric: &str,
        limit: usize,
    ) -> HealthResult<Vec<InsightSummary>> {
        let named = MetricSeries::new(metric, series.points.clone());
        let insights = self
            .engine
            .generate_insights(std::slice::from_ref(&named), usize::MAX);

        Ok(insights
            .iter()
            .filter(|i| !i.metric().is_some_and(|m| m != metric))
            .take(limit)
            .map(|i| InsightSummary {
                title: i.title.clone(),
                description: i.description.clone(),
                category: i.category,
                actionability: i.actionability(),
                relevant_date: i
                    .supporting_data
                    .get("end_date")
                    .and_then(|v| v.as_str())
                    .and_then(|s| s.parse::<NaiveDate>().ok()),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use health_core::TrendDirection;

    fn start() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
    }

    #[test]
    fn test_single_spike_is_only_anomaly() {
        let mut values = vec![60.0; 30];
        values[15] = 100.0;
        let series = MetricSeries::from_values("resting_heart_rate", start(), &values);

        let anomalies = ZScoreAnomalyDetector::default()
            .detect_anomalies(&series, "resting_heart_rate", 2.0)
            .unwrap();
        assert_eq!(anomalies.len(), 1);
        assert_eq!(anomalies[0].date, start() + Duration::days(15));
        assert_eq!(anomalies[0].severity, 1.0);
        assert!(anomalies[0].z_score > 0.0);
        assert!(anomalies[0].description.contains("above"));
    }

    #[test]
    fn test_flat_or_short_series_has_no_anomalies() {
        let detector = ZScoreAnomalyDetector::default();
        let flat = MetricSeries::from_values("steps", start(), &[5000.0; 20]);
        assert!(detector.detect_anomalies(&flat, "steps", 2.0).unwrap().is_empty());

        let short = MetricSeries::from_values("steps", start(), &[1.0, 100.0]);
        assert!(detector.detect_anomalies(&short, "steps", 2.0).unwrap().is_empty());

        assert!(detector.detect_anomalies(&flat, "steps", 0.0).is_err());
    }

    #[test]
    fn test_personal_best_after_history() {
        let mut values = vec![8000.0; 20];
        values[4] = 9000.0; // too early to count
        values[12] = 12000.0;
        let series = MetricSeries::from_values("steps", start(), &values);

        let records = PersonalRecordsTracker::default()
            .find_records(&series, "steps", 365)
            .unwrap();
        let bests: Vec<_> = records
            .iter()
            .filter(|r| r.record_type == RecordType::PersonalBest)
            .collect();
        assert_eq!(bests.len(), 1);
        assert_eq!(bests[0].value, 12000.0);
        assert_eq!(bests[0].previous_best, Some(9000.0));
        assert!((bests[0].improvement_percent - 100.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_lower_is_better_records_and_streak() {
        // Resting heart rate drops for ten straight days at the end
        let mut values = vec![70.0; 20];
        values.extend(vec![60.0; 10]);
        let series = MetricSeries::from_values("resting_heart_rate", start(), &values);

        let records = PersonalRecordsTracker::default()
            .find_records(&series, "resting_heart_rate", 365)
            .unwrap();
        assert!(records
            .iter()
            .any(|r| r.record_type == RecordType::PersonalBest && r.value == 60.0));
        let streak = records
            .iter()
            .find(|r| r.record_type == RecordType::LongestStreak)
            .unwrap();
        assert_eq!(streak.streak_days, 10);
        assert_eq!(streak.date, start() + Duration::days(29));
    }

    #[test]
    fn test_records_respect_lookback() {
        let mut values = vec![100.0; 60];
        values[10] = 200.0;
        let series = MetricSeries::from_values("steps", start(), &values);
        let records = PersonalRecordsTracker::default()
            .find_records(&series, "steps", 30)
            .unwrap();
        assert!(records
            .iter()
            .all(|r| r.record_type != RecordType::PersonalBest));
    }

    #[test]
    fn test_nan_sensitivity_is_rejected() {
        let series = MetricSeries::from_values("steps", start(), &[5000.0; 10]);
        let detector = ZScoreAnomalyDetector::default();
        assert!(detector.detect_anomalies(&series, "steps", f64::NAN).is_err());
        assert!(detector.detect_anomalies(&series, "steps", 0.0).is_err());
    }

    #[test]
    fn test_lookback_beyond_calendar_scans_everything() {
        let mut values = vec![100.0; 60];
        values[10] = 200.0;
        let series = MetricSeries::from_values("steps", start(), &values);
        let tracker = PersonalRecordsTracker::default();

        for lookback in [i64::MAX, 400_000_000] {
            let records = tracker.find_records(&series, "steps", lookback).unwrap();
            assert!(records
                .iter()
                .any(|r| r.record_type == RecordType::PersonalBest && r.value == 200.0));
        }
    }

    #[test]
    fn test_oversized_trend_window_covers_whole_series() {
        let values: Vec<f64> = (0..60).map(|i| 5000.0 + 100.0 * i as f64).collect();
        let series = MetricSeries::from_values("steps", start(), &values);

        let findings = RegressionTrendEngine::new(i64::MAX, 7)
            .analyze_trends(&series, "steps", 60.0)
            .unwrap();
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].start_date, start());
        assert_eq!(findings[0].end_date, start() + Duration::days(59));
    }

    #[test]
    fn test_trend_windows() {
        // 30 rising days then 30 flat days
        let mut values: Vec<f64> = (0..30).map(|i| 5000.0 + 100.0 * i as f64).collect();
        values.extend(vec![8000.0; 30]);
        let series = MetricSeries::from_values("steps", start(), &values);

        let findings = RegressionTrendEngine::default()
            .analyze_trends(&series, "steps", 60.0)
            .unwrap();
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].direction, TrendDirection::Increasing);
        assert!(findings[0].is_significant);
        assert_eq!(findings[0].start_date, start());
        assert_eq!(findings[0].end_date, start() + Duration::days(29));
    }

    #[test]
    fn test_goal_progress_milestones() {
        let goal = Goal {
            id: "g1".to_string(),
            name: "Walk more".to_string(),
            metric: "steps".to_string(),
            start_value: 4000.0,
            target_value: 8000.0,
            deadline: None,
        };
        let manager = InMemoryGoalManager::new().with_goal(goal.clone());
        assert_eq!(manager.active_goals("steps").unwrap().len(), 1);
        assert!(manager.active_goals("sleep_duration").unwrap().is_empty());

        let halfway = manager.goal_progress(&goal, 6100.0);
        assert_eq!(halfway.milestone_reached, Some(50));
        assert!(!halfway.completed);

        let early = manager.goal_progress(&goal, 4500.0);
        assert_eq!(early.milestone_reached, None);

        let done = manager.goal_progress(&goal, 9000.0);
        assert!(done.completed);
        assert_eq!(done.progress_percent, 100.0);
    }

    #[test]
    fn test_goal_progress_for_decreasing_target() {
        let goal = Goal {
            id: "g2".to_string(),
            name: "Lower RHR".to_string(),
            metric: "resting_heart_rate".to_string(),
            start_value: 80.0,
            target_value: 60.0,
            deadline: None,
        };
        let progress = InMemoryGoalManager::new().goal_progress(&goal, 65.0);
        assert_eq!(progress.progress_percent, 75.0);
        assert_eq!(progress.milestone_reached, Some(75));
    }
}
