//! Recent Trend Detection
//!
//! Looks at the most recent window of a metric and reports a trend only
//! when the regression behind it is confident enough.

use chrono::NaiveDate;
use health_core::{MetricSeries, TrendDirection};
use serde::{Deserialize, Serialize};

use crate::patterns::{StatisticalPatternAnalyzer, TrendAnalysis};

/// Trend over the recent window of one metric
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecentTrend {
    pub metric: String,
    pub direction: TrendDirection,
    /// Change between the first three and last three values of the window
    pub percent_change: f64,
    pub start_value: f64,
    pub end_value: f64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub analysis: TrendAnalysis,
}

#[derive(Debug, Clone)]
pub struct TrendInsightGenerator {
    analyzer: StatisticalPatternAnalyzer,
    min_points: usize,
    min_confidence: f64,
}

impl Default for TrendInsightGenerator {
    fn default() -> Self {
        Self::new(7, 60.0)
    }
}

impl TrendInsightGenerator {
    pub fn new(min_points: usize, min_confidence: f64) -> Self {
        Self {
            analyzer: StatisticalPatternAnalyzer::new(),
            min_points,
            min_confidence,
        }
    }

    /// Trend over the last `lookback_days`, or `None` when there are fewer
    /// than the minimum rows or the trend is not confident enough
    pub fn detect_recent_trend(
        &self,
        series: &MetricSeries,
        lookback_days: i64,
    ) -> Option<RecentTrend> {
        let window = series.last_n_days(lookback_days);
        let points: Vec<_> = window.points.iter().filter(|p| p.is_valid()).collect();
        if points.len() < self.min_points.max(3) {
            return None;
        }

        let values: Vec<f64> = points.iter().map(|p| p.value).collect();
        let analysis = self.analyzer.detect_trend(&values, self.min_points);
        if analysis.confidence < self.min_confidence {
            return None;
        }

        // Edge-smoothed endpoints rather than fitted values
        let start_value = values[..3].iter().sum::<f64>() / 3.0;
        let end_value = values[values.len() - 3..].iter().sum::<f64>() / 3.0;
        let percent_change = if start_value != 0.0 {
            (end_value - start_value) / start_value.abs() * 100.0
        } else {
            0.0
        };

        Some(RecentTrend {
            metric: series.metric.clone(),
            direction: analysis.trend,
            percent_change,
            start_value,
            end_value,
            start_date: points[0].date,
            end_date: points[points.len() - 1].date,
            analysis,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn start() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, 1).unwrap()
    }

    #[test]
    fn test_too_few_rows_in_window() {
        let gen = TrendInsightGenerator::default();
        let series = MetricSeries::from_values("steps", start(), &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        assert!(gen.detect_recent_trend(&series, 30).is_none());
    }

    #[test]
    fn test_only_recent_window_is_used() {
        let gen = TrendInsightGenerator::default();
        // 60 flat days followed by 30 rising days
        let mut values = vec![5000.0; 60];
        values.extend((0..30).map(|i| 5000.0 + 100.0 * i as f64));
        let series = MetricSeries::from_values("steps", start(), &values);

        let trend = gen.detect_recent_trend(&series, 30).unwrap();
        assert_eq!(trend.direction, TrendDirection::Increasing);
        assert_eq!(trend.analysis.n, 30);
        // first three mean 5100, last three mean 7800
        assert!((trend.percent_change - (2700.0 / 5100.0 * 100.0)).abs() < 1e-9);
    }

    #[test]
    fn test_low_confidence_is_rejected() {
        let gen = TrendInsightGenerator::default();
        let values: Vec<f64> = (0..30).map(|i| if i % 2 == 0 { 10.0 } else { 12.0 }).collect();
        let series = MetricSeries::from_values("steps", start(), &values);
        assert!(gen.detect_recent_trend(&series, 30).is_none());
    }

    #[test]
    fn test_zero_start_guards_percent_change() {
        let gen = TrendInsightGenerator::default();
        let values: Vec<f64> = vec![0.0, 0.0, 0.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0];
        let series = MetricSeries::from_values("exercise_minutes", start(), &values);
        let trend = gen.detect_recent_trend(&series, 30).unwrap();
        assert_eq!(trend.percent_change, 0.0);
    }
}
