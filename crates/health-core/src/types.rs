use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

/// Single daily observation of a metric
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataPoint {
    pub date: NaiveDate,
    pub value: f64,
    /// Optional extra columns (e.g. `bedtime`, `wake_time` in decimal hours)
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extras: BTreeMap<String, f64>,
}

impl DataPoint {
    pub fn new(date: NaiveDate, value: f64) -> Self {
        Self {
            date,
            value,
            extras: BTreeMap::new(),
        }
    }

    pub fn with_extra(mut self, name: impl Into<String>, value: f64) -> Self {
        self.extras.insert(name.into(), value);
        self
    }

    /// NaN and infinite values count as missing
    pub fn is_valid(&self) -> bool {
        self.value.is_finite()
    }
}

/// Inclusive date range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        if start <= end {
            Self { start, end }
        } else {
            Self { start: end, end: start }
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

/// Time series for one metric, as supplied by the data-access layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSeries {
    pub metric: String,
    pub points: Vec<DataPoint>,
}

impl MetricSeries {
    pub fn new(metric: impl Into<String>, points: Vec<DataPoint>) -> Self {
        Self {
            metric: metric.into(),
            points,
        }
    }

    /// Build a series of consecutive daily values starting at `start`.
    /// Values that would land past the last representable date are dropped.
    pub fn from_values(metric: impl Into<String>, start: NaiveDate, values: &[f64]) -> Self {
        let points = values
            .iter()
            .enumerate()
            .map_while(|(i, &v)| days_after(start, i as i64).map(|d| DataPoint::new(d, v)))
            .collect();
        Self::new(metric, points)
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn values(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.value).collect()
    }

    /// Values with missing entries removed, in series order
    pub fn valid_values(&self) -> Vec<f64> {
        self.points
            .iter()
            .filter(|p| p.is_valid())
            .map(|p| p.value)
            .collect()
    }

    /// Copy of the series ordered by date
    pub fn sorted(&self) -> MetricSeries {
        let mut points = self.points.clone();
        points.sort_by_key(|p| p.date);
        Self::new(self.metric.clone(), points)
    }

    pub fn filter_range(&self, range: &DateRange) -> MetricSeries {
        let points = self
            .points
            .iter()
            .filter(|p| range.contains(p.date))
            .cloned()
            .collect();
        Self::new(self.metric.clone(), points)
    }

    /// Points within the most recent `days` calendar days, relative to the
    /// latest date in the series. A window reaching past the representable
    /// calendar keeps the whole series.
    pub fn last_n_days(&self, days: i64) -> MetricSeries {
        let mut window = self.sorted();
        let Some(latest) = window.points.last().map(|p| p.date) else {
            return window;
        };
        if let Some(cutoff) = days_before(latest, days) {
            window.points.retain(|p| p.date > cutoff);
        }
        window
    }

    /// Values of an extra column, skipping rows where it is absent or NaN
    pub fn extra_column(&self, name: &str) -> Vec<f64> {
        self.points
            .iter()
            .filter_map(|p| p.extras.get(name).copied())
            .filter(|v| v.is_finite())
            .collect()
    }

    pub fn has_extra(&self, name: &str) -> bool {
        self.points.iter().any(|p| p.extras.contains_key(name))
    }

    /// Latest valid observation
    pub fn latest(&self) -> Option<&DataPoint> {
        self.points
            .iter()
            .filter(|p| p.is_valid())
            .max_by_key(|p| p.date)
    }
}

/// Health domain a metric belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum HealthCategory {
    Sleep,
    Activity,
    Recovery,
    Nutrition,
    BodyMetrics,
    HeartHealth,
}

impl HealthCategory {
    /// Map a metric name (e.g. `sleep_duration`, `resting_heart_rate`) to its category
    pub fn for_metric(metric: &str) -> Self {
        let m = metric.to_ascii_lowercase();
        let has = |keys: &[&str]| keys.iter().any(|k| m.contains(k));

        if has(&["sleep", "bedtime", "wake"]) {
            HealthCategory::Sleep
        } else if has(&["hrv", "heart_rate_variability", "recovery", "respiratory"]) {
            HealthCategory::Recovery
        } else if has(&["heart_rate", "blood_pressure", "vo2", "cardio"]) {
            HealthCategory::HeartHealth
        } else if has(&["weight", "bmi", "body_fat", "body_mass", "lean_mass", "waist"]) {
            HealthCategory::BodyMetrics
        } else if has(&["dietary", "consumed", "protein", "water", "carb", "nutrition", "caffeine"]) {
            HealthCategory::Nutrition
        } else {
            HealthCategory::Activity
        }
    }

    /// Categories where wording errors carry higher risk
    pub fn is_high_risk(&self) -> bool {
        matches!(self, HealthCategory::HeartHealth | HealthCategory::BodyMetrics)
    }

    pub fn label(&self) -> &'static str {
        match self {
            HealthCategory::Sleep => "Sleep",
            HealthCategory::Activity => "Activity",
            HealthCategory::Recovery => "Recovery",
            HealthCategory::Nutrition => "Nutrition",
            HealthCategory::BodyMetrics => "Body Metrics",
            HealthCategory::HeartHealth => "Heart Health",
        }
    }
}

/// `date` moved back by `days`, or `None` outside the representable calendar
pub fn days_before(date: NaiveDate, days: i64) -> Option<NaiveDate> {
    Duration::try_days(days).and_then(|d| date.checked_sub_signed(d))
}

/// `date` moved forward by `days`, or `None` outside the representable calendar
pub fn days_after(date: NaiveDate, days: i64) -> Option<NaiveDate> {
    Duration::try_days(days).and_then(|d| date.checked_add_signed(d))
}

/// Whether larger values of the metric are desirable
pub fn higher_is_better(metric: &str) -> bool {
    let m = metric.to_ascii_lowercase();
    !["resting_heart_rate", "weight", "bmi", "body_fat", "blood_pressure", "waist"]
        .iter()
        .any(|k| m.contains(k))
}

/// Human-readable metric name (`resting_heart_rate` -> `Resting heart rate`)
pub fn metric_label(metric: &str) -> String {
    let spaced = metric.replace('_', " ");
    let mut chars = spaced.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Annotation priority, ordered from least to most urgent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Priority {
    Low,
    Medium,
    High,
    Critical,
}

impl Priority {
    pub fn label(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
            Priority::Critical => "critical",
        }
    }
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Priority::Low),
            "medium" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            "critical" => Ok(Priority::Critical),
            other => Err(format!("unknown priority: {}", other)),
        }
    }
}

/// Direction of a detected trend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TrendDirection {
    Increasing,
    Decreasing,
    Stable,
    InsufficientData,
}

impl TrendDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrendDirection::Increasing => "increasing",
            TrendDirection::Decreasing => "decreasing",
            TrendDirection::Stable => "stable",
            TrendDirection::InsufficientData => "insufficient_data",
        }
    }
}

/// Unusual observation reported by an anomaly detector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Anomaly {
    pub date: NaiveDate,
    pub value: f64,
    /// Severity in 0-1
    pub severity: f64,
    pub expected_range: (f64, f64),
    pub z_score: f64,
    pub description: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordType {
    PersonalBest,
    LongestStreak,
}

impl RecordType {
    pub fn label(&self) -> &'static str {
        match self {
            RecordType::PersonalBest => "Personal best",
            RecordType::LongestStreak => "Longest streak",
        }
    }
}

/// Personal record reported by a records tracker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonalRecord {
    pub date: NaiveDate,
    pub value: f64,
    pub record_type: RecordType,
    pub previous_best: Option<f64>,
    pub improvement_percent: f64,
    pub streak_days: u32,
}

/// Trend segment reported by a trend engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendFinding {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub direction: TrendDirection,
    pub percent_change: f64,
    /// Confidence in 0-100
    pub confidence: f64,
    pub p_value: f64,
    pub is_significant: bool,
}

/// User goal tracked by a goal manager
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Goal {
    pub id: String,
    pub name: String,
    pub metric: String,
    pub start_value: f64,
    pub target_value: f64,
    pub deadline: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoalProgress {
    pub goal_id: String,
    pub current_value: f64,
    pub progress_percent: f64,
    /// Highest milestone (percent) reached, if any
    pub milestone_reached: Option<u8>,
    pub completed: bool,
}

/// Insight reduced to what a chart annotation needs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsightSummary {
    pub title: String,
    pub description: String,
    pub category: HealthCategory,
    /// Actionability in 0-1
    pub actionability: f64,
    /// Date the insight is most relevant to, when the source knows it
    pub relevant_date: Option<NaiveDate>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    #[test]
    fn test_category_mapping() {
        assert_eq!(HealthCategory::for_metric("sleep_duration"), HealthCategory::Sleep);
        assert_eq!(HealthCategory::for_metric("heart_rate_variability"), HealthCategory::Recovery);
        assert_eq!(HealthCategory::for_metric("resting_heart_rate"), HealthCategory::HeartHealth);
        assert_eq!(HealthCategory::for_metric("body_fat_percentage"), HealthCategory::BodyMetrics);
        assert_eq!(HealthCategory::for_metric("dietary_protein"), HealthCategory::Nutrition);
        assert_eq!(HealthCategory::for_metric("steps"), HealthCategory::Activity);
        assert!(HealthCategory::HeartHealth.is_high_risk());
        assert!(!HealthCategory::Sleep.is_high_risk());
    }

    #[test]
    fn test_last_n_days_relative_to_latest() {
        let series = MetricSeries::from_values("steps", day(1), &[1.0; 20]);
        let window = series.last_n_days(7);
        assert_eq!(window.len(), 7);
        assert_eq!(window.points[0].date, day(14));
    }

    #[test]
    fn test_huge_window_keeps_whole_series() {
        let series = MetricSeries::from_values("steps", day(1), &[1.0; 20]);
        assert_eq!(series.last_n_days(400_000_000).len(), 20);
        assert_eq!(series.last_n_days(i64::MAX).len(), 20);
        assert!(series.last_n_days(-5).is_empty());
    }

    #[test]
    fn test_day_offsets_are_checked() {
        assert_eq!(days_before(day(10), 3), Some(day(7)));
        assert_eq!(days_after(day(10), 3), Some(day(13)));
        assert_eq!(days_before(day(10), 400_000_000), None);
        assert_eq!(days_after(day(10), i64::MAX), None);

        let tail = MetricSeries::from_values("steps", NaiveDate::MAX, &[1.0, 2.0]);
        assert_eq!(tail.len(), 1);
    }

    #[test]
    fn test_filter_range_and_valid_values() {
        let series = MetricSeries::from_values("steps", day(1), &[1.0, f64::NAN, 3.0, 4.0]);
        assert_eq!(series.valid_values(), vec![1.0, 3.0, 4.0]);

        let filtered = series.filter_range(&DateRange::new(day(3), day(2)));
        assert_eq!(filtered.len(), 2);
    }

    #[test]
    fn test_priority_ordering_and_parse() {
        assert!(Priority::Critical > Priority::High);
        assert!(Priority::Medium > Priority::Low);
        assert_eq!("High".parse::<Priority>().unwrap(), Priority::High);
        assert!("urgent".parse::<Priority>().is_err());
    }

    #[test]
    fn test_metric_label() {
        assert_eq!(metric_label("resting_heart_rate"), "Resting heart rate");
        assert!(!higher_is_better("resting_heart_rate"));
        assert!(higher_is_better("steps"));
    }
}
