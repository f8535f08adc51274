//! Pipeline configuration
//!
//! Every component takes its configuration by value at construction.
//! `Default` carries the documented constants; `from_env` lets a host
//! override individual fields through `HEALTH_*` variables.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::Priority;

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

/// Configuration for the insights engine and its generators
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsightsConfig {
    /// Maximum insights returned per generation call
    pub max_insights: usize,
    /// Insights below this post-validation confidence are dropped
    pub min_confidence: f64,
    pub min_correlation: f64,
    pub min_correlation_points: usize,
    pub trend_lookback_days: i64,
    pub min_trend_points: usize,
    pub min_trend_confidence: f64,
    /// Coefficient of variation considered fully inconsistent
    pub consistency_target_variance: f64,
    /// Demographic bucket for guideline lookups (e.g. "older_adult")
    pub demographic: Option<String>,
}

impl Default for InsightsConfig {
    fn default() -> Self {
        Self {
            max_insights: 10,
            min_confidence: 50.0,
            min_correlation: 0.3,
            min_correlation_points: 30,
            trend_lookback_days: 30,
            min_trend_points: 7,
            min_trend_confidence: 60.0,
            consistency_target_variance: 0.15,
            demographic: None,
        }
    }
}

impl InsightsConfig {
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            max_insights: env_or("HEALTH_MAX_INSIGHTS", d.max_insights),
            min_confidence: env_or("HEALTH_MIN_CONFIDENCE", d.min_confidence),
            min_correlation: env_or("HEALTH_MIN_CORRELATION", d.min_correlation),
            min_correlation_points: env_or("HEALTH_MIN_CORRELATION_POINTS", d.min_correlation_points),
            trend_lookback_days: env_or("HEALTH_TREND_LOOKBACK_DAYS", d.trend_lookback_days),
            min_trend_points: env_or("HEALTH_MIN_TREND_POINTS", d.min_trend_points),
            min_trend_confidence: env_or("HEALTH_MIN_TREND_CONFIDENCE", d.min_trend_confidence),
            consistency_target_variance: env_or(
                "HEALTH_CONSISTENCY_TARGET_VARIANCE",
                d.consistency_target_variance,
            ),
            demographic: std::env::var("HEALTH_DEMOGRAPHIC").ok().filter(|s| !s.is_empty()),
        }
    }
}

/// Configuration for chart annotation generation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotationConfig {
    pub min_annotation_spacing_days: i64,
    pub priority_threshold: Priority,
    pub max_annotations_per_chart: usize,
    /// Sensitivity handed to the anomaly detector (z-score scale)
    pub anomaly_sensitivity: f64,
    pub min_anomaly_severity: f64,
    pub achievement_lookback_days: i64,
    pub trend_min_confidence: f64,
    pub max_insight_annotations: usize,
    pub comparison_window_days: usize,
    /// Tail percentile for comparison annotations (5 = top/bottom 5%)
    pub comparison_percentile: f64,
}

impl Default for AnnotationConfig {
    fn default() -> Self {
        Self {
            min_annotation_spacing_days: 7,
            priority_threshold: Priority::Medium,
            max_annotations_per_chart: 10,
            anomaly_sensitivity: 2.0,
            min_anomaly_severity: 0.7,
            achievement_lookback_days: 365,
            trend_min_confidence: 60.0,
            max_insight_annotations: 3,
            comparison_window_days: 30,
            comparison_percentile: 5.0,
        }
    }
}

impl AnnotationConfig {
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            min_annotation_spacing_days: env_or(
                "HEALTH_ANNOTATION_SPACING_DAYS",
                d.min_annotation_spacing_days,
            ),
            priority_threshold: env_or("HEALTH_ANNOTATION_PRIORITY_THRESHOLD", d.priority_threshold),
            max_annotations_per_chart: env_or("HEALTH_MAX_ANNOTATIONS", d.max_annotations_per_chart),
            anomaly_sensitivity: env_or("HEALTH_ANOMALY_SENSITIVITY", d.anomaly_sensitivity),
            min_anomaly_severity: env_or("HEALTH_MIN_ANOMALY_SEVERITY", d.min_anomaly_severity),
            achievement_lookback_days: env_or(
                "HEALTH_ACHIEVEMENT_LOOKBACK_DAYS",
                d.achievement_lookback_days,
            ),
            trend_min_confidence: env_or("HEALTH_ANNOTATION_TREND_CONFIDENCE", d.trend_min_confidence),
            max_insight_annotations: env_or("HEALTH_MAX_INSIGHT_ANNOTATIONS", d.max_insight_annotations),
            comparison_window_days: env_or("HEALTH_COMPARISON_WINDOW_DAYS", d.comparison_window_days),
            comparison_percentile: env_or("HEALTH_COMPARISON_PERCENTILE", d.comparison_percentile),
        }
    }
}

/// Configuration for annotation placement on the chart canvas (pixels)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutConfig {
    pub annotation_width: f64,
    pub annotation_height: f64,
    pub marker_size: f64,
    pub margin: f64,
    pub max_leader_length: f64,
    pub edge_samples: usize,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            annotation_width: 250.0,
            annotation_height: 120.0,
            marker_size: 8.0,
            margin: 10.0,
            max_leader_length: 100.0,
            edge_samples: 10,
        }
    }
}

impl LayoutConfig {
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            annotation_width: env_or("HEALTH_ANNOTATION_WIDTH", d.annotation_width),
            annotation_height: env_or("HEALTH_ANNOTATION_HEIGHT", d.annotation_height),
            marker_size: env_or("HEALTH_MARKER_SIZE", d.marker_size),
            margin: env_or("HEALTH_LAYOUT_MARGIN", d.margin),
            max_leader_length: env_or("HEALTH_MAX_LEADER_LENGTH", d.max_leader_length),
            edge_samples: env_or("HEALTH_EDGE_SAMPLES", d.edge_samples),
        }
    }
}
