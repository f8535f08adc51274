//! Health Annotation System
//!
//! Generates typed chart annotations for one metric series, prioritizes
//! them, keeps them apart in time and caps how many reach the chart.
//! Results are cached per series content, date range and requested types.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::NaiveDate;
use health_core::{
    days_after, days_before, metric_label, AnnotationConfig, AnomalyDetector, DataPoint, DateRange, GoalManager,
    HealthError, HealthResult, InsightSource, MetricSeries, Priority, RecordType,
    RecordsTracker, TrendDirection, TrendEngine,
};
use health_insights::percentile_sorted;
use sha2::{Digest, Sha256};
use statrs::statistics::Statistics;

use crate::detectors::{
    InMemoryGoalManager, InsightsEngineSource, PersonalRecordsTracker, RegressionTrendEngine,
    ZScoreAnomalyDetector,
};
use crate::models::{AnnotationKind, AnnotationType, Extreme, HealthAnnotation};

/// Callback invoked with the metric and the final annotations of every
/// freshly generated (non-cached) result
pub type AnnotationListener = Box<dyn Fn(&str, &[HealthAnnotation]) + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    metric: String,
    fingerprint: String,
    date_range: Option<DateRange>,
    types: Vec<AnnotationType>,
}

/// sha256 over every point's date, value bits and extra columns
fn fingerprint(series: &MetricSeries) -> String {
    let mut hasher = Sha256::new();
    for p in &series.points {
        hasher.update(p.date.to_string().as_bytes());
        hasher.update(p.value.to_bits().to_le_bytes());
        hasher.update((p.extras.len() as u64).to_le_bytes());
        for (name, v) in &p.extras {
            hasher.update((name.len() as u64).to_le_bytes());
            hasher.update(name.as_bytes());
            hasher.update(v.to_bits().to_le_bytes());
        }
    }
    hex::encode(hasher.finalize())
}

pub struct HealthAnnotationSystem {
    config: AnnotationConfig,
    anomaly_detector: Option<Box<dyn AnomalyDetector>>,
    records_tracker: Option<Box<dyn RecordsTracker>>,
    trend_engine: Option<Box<dyn TrendEngine>>,
    goal_manager: Option<Box<dyn GoalManager>>,
    insight_source: Option<Box<dyn InsightSource>>,
    cache: HashMap<CacheKey, Arc<[HealthAnnotation]>>,
    listeners: Vec<AnnotationListener>,
}

impl Default for HealthAnnotationSystem {
    fn default() -> Self {
        Self::new(AnnotationConfig::default())
    }
}

impl HealthAnnotationSystem {
    /// System wired to the built-in collaborators
    pub fn new(config: AnnotationConfig) -> Self {
        Self::bare(config)
            .with_anomaly_detector(ZScoreAnomalyDetector::default())
            .with_records_tracker(PersonalRecordsTracker::default())
            .with_trend_engine(RegressionTrendEngine::default())
            .with_goal_manager(InMemoryGoalManager::new())
            .with_insight_source(InsightsEngineSource::default())
    }

    /// System without collaborators; only milestone and comparison
    /// annotations can be produced until some are installed
    pub fn bare(config: AnnotationConfig) -> Self {
        Self {
            config,
            anomaly_detector: None,
            records_tracker: None,
            trend_engine: None,
            goal_manager: None,
            insight_source: None,
            cache: HashMap::new(),
            listeners: Vec::new(),
        }
    }

    pub fn with_anomaly_detector(mut self, detector: impl AnomalyDetector + 'static) -> Self {
        self.anomaly_detector = Some(Box::new(detector));
        self
    }

    pub fn with_records_tracker(mut self, tracker: impl RecordsTracker + 'static) -> Self {
        self.records_tracker = Some(Box::new(tracker));
        self
    }

    pub fn with_trend_engine(mut self, engine: impl TrendEngine + 'static) -> Self {
        self.trend_engine = Some(Box::new(engine));
        self
    }

    pub fn with_goal_manager(mut self, manager: impl GoalManager + 'static) -> Self {
        self.goal_manager = Some(Box::new(manager));
        self
    }

    pub fn with_insight_source(mut self, source: impl InsightSource + 'static) -> Self {
        self.insight_source = Some(Box::new(source));
        self
    }

    pub fn config(&self) -> &AnnotationConfig {
        &self.config
    }

    pub fn add_listener(
        &mut self,
        listener: impl Fn(&str, &[HealthAnnotation]) + Send + Sync + 'static,
    ) {
        self.listeners.push(Box::new(listener));
    }

    pub fn clear_cache(&mut self) {
        self.cache.clear();
    }

    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    /// Annotations for `series`, restricted to `date_range` when given.
    ///
    /// An empty `types` slice requests every annotation type. Repeated calls
    /// with the same series content, range and types return the cached slice.
    pub fn generate_annotations(
        &mut self,
        series: &MetricSeries,
        metric: &str,
        date_range: Option<DateRange>,
        types: &[AnnotationType],
    ) -> HealthResult<Arc<[HealthAnnotation]>> {
        if series.is_empty() {
            return Ok(Arc::from(Vec::new()));
        }

        let mut requested = if types.is_empty() {
            AnnotationType::all().to_vec()
        } else {
            types.to_vec()
        };
        requested.sort();
        requested.dedup();

        let key = CacheKey {
            metric: metric.to_string(),
            fingerprint: fingerprint(series),
            date_range,
            types: requested.clone(),
        };
        if let Some(cached) = self.cache.get(&key) {
            tracing::debug!(
                "Annotation cache hit for {} ({} annotations)",
                metric,
                cached.len()
            );
            return Ok(Arc::clone(cached));
        }

        let mut data = series.sorted();
        if let Some(range) = &date_range {
            data = data.filter_range(range);
        }

        let mut annotations = Vec::new();
        for kind in &requested {
            let generated = match kind {
                AnnotationType::Anomaly => self.anomaly_annotations(&data, metric)?,
                AnnotationType::Achievement => self.achievement_annotations(&data, metric)?,
                AnnotationType::Trend => self.trend_annotations(&data, metric)?,
                AnnotationType::Insight => self.insight_annotations(&data, metric)?,
                AnnotationType::Milestone => milestone_annotations(&data, metric),
                AnnotationType::Comparison => self.comparison_annotations(&data, metric),
                AnnotationType::Goal => self.goal_annotations(&data, metric)?,
            };
            tracing::debug!(
                "Generated {} {} candidates for {}",
                generated.len(),
                kind,
                metric
            );
            annotations.extend(generated);
        }

        let candidates = annotations.len();
        prioritize(&mut annotations);
        let spaced = prevent_overlap(annotations, self.config.min_annotation_spacing_days);
        let kept = limit(
            spaced,
            self.config.priority_threshold,
            self.config.max_annotations_per_chart,
        );

        tracing::info!(
            "Annotations for {}: kept {} of {} candidates",
            metric,
            kept.len(),
            candidates
        );

        let result: Arc<[HealthAnnotation]> = Arc::from(kept);
        self.cache.insert(key, Arc::clone(&result));
        for listener in &self.listeners {
            listener(metric, &result[..]);
        }
        Ok(result)
    }

    fn anomaly_annotations(
        &self,
        data: &MetricSeries,
        metric: &str,
    ) -> HealthResult<Vec<HealthAnnotation>> {
        let Some(detector) = &self.anomaly_detector else {
            return Ok(Vec::new());
        };
        let anomalies = detector
            .detect_anomalies(data, metric, self.config.anomaly_sensitivity)
            .map_err(|e| HealthError::collaborator("anomaly_detector", e.to_string()))?;

        let label = metric_label(metric);
        Ok(anomalies
            .into_iter()
            .filter(|a| a.severity >= self.config.min_anomaly_severity)
            .map(|a| {
                let description = if a.description.is_empty() {
                    format!(
                        "{:.1} is outside the expected range {:.1} to {:.1}",
                        a.value, a.expected_range.0, a.expected_range.1
                    )
                } else {
                    a.description
                };
                HealthAnnotation::new(
                    metric,
                    a.date,
                    a.value,
                    anomaly_priority(a.severity),
                    format!("Unusual {}", label.to_lowercase()),
                    description,
                    AnnotationKind::Anomaly {
                        severity: a.severity,
                        expected_range: a.expected_range,
                    },
                )
            })
            .collect())
    }

    fn achievement_annotations(
        &self,
        data: &MetricSeries,
        metric: &str,
    ) -> HealthResult<Vec<HealthAnnotation>> {
        let Some(tracker) = &self.records_tracker else {
            return Ok(Vec::new());
        };
        let records = tracker
            .find_records(data, metric, self.config.achievement_lookback_days)
            .map_err(|e| HealthError::collaborator("records_tracker", e.to_string()))?;

        let label = metric_label(metric).to_lowercase();
        Ok(records
            .into_iter()
            .map(|r| {
                let (title, description, priority) = match r.record_type {
                    RecordType::PersonalBest => (
                        format!("{} {}", r.record_type.label(), label),
                        match r.previous_best {
                            Some(prev) => format!(
                                "{:.1} beats your previous best of {:.1} by {:.1}%",
                                r.value, prev, r.improvement_percent
                            ),
                            None => format!("{:.1} is your best so far", r.value),
                        },
                        if r.improvement_percent >= 10.0 {
                            Priority::High
                        } else {
                            Priority::Medium
                        },
                    ),
                    RecordType::LongestStreak => (
                        format!("{}: {} days", r.record_type.label(), r.streak_days),
                        format!(
                            "Your longest run of better-than-usual {} days",
                            label
                        ),
                        if r.streak_days >= 14 {
                            Priority::High
                        } else {
                            Priority::Medium
                        },
                    ),
                };
                HealthAnnotation::new(
                    metric,
                    r.date,
                    r.value,
                    priority,
                    title,
                    description,
                    AnnotationKind::Achievement {
                        record_type: r.record_type,
                        improvement_percent: r.improvement_percent,
                        streak_days: r.streak_days,
                    },
                )
            })
            .collect())
    }

    fn trend_annotations(
        &self,
        data: &MetricSeries,
        metric: &str,
    ) -> HealthResult<Vec<HealthAnnotation>> {
        let Some(engine) = &self.trend_engine else {
            return Ok(Vec::new());
        };
        let findings = engine
            .analyze_trends(data, metric, self.config.trend_min_confidence)
            .map_err(|e| HealthError::collaborator("trend_engine", e.to_string()))?;

        let label = metric_label(metric);
        Ok(findings
            .into_iter()
            .filter(|t| t.is_significant)
            .filter_map(|t| {
                let value = value_at(data, t.end_date).or_else(|| data.latest().map(|p| p.value))?;
                let direction = match t.direction {
                    TrendDirection::Increasing => "up",
                    TrendDirection::Decreasing => "down",
                    _ => "steady",
                };
                Some(HealthAnnotation::new(
                    metric,
                    t.end_date,
                    value,
                    trend_priority(t.percent_change.abs(), t.confidence),
                    format!("{} trending {}", label, direction),
                    format!(
                        "{:+.1}% between {} and {} ({:.0}% confidence)",
                        t.percent_change, t.start_date, t.end_date, t.confidence
                    ),
                    AnnotationKind::Trend {
                        direction: t.direction,
                        percent_change: t.percent_change,
                        confidence: t.confidence,
                        start_date: t.start_date,
                    },
                ))
            })
            .collect())
    }

    fn insight_annotations(
        &self,
        data: &MetricSeries,
        metric: &str,
    ) -> HealthResult<Vec<HealthAnnotation>> {
        let Some(source) = &self.insight_source else {
            return Ok(Vec::new());
        };
        let summaries = source
            .top_insights(data, metric, self.config.max_insight_annotations)
            .map_err(|e| HealthError::collaborator("insight_source", e.to_string()))?;

        let fallback = most_relevant_point(data);
        Ok(summaries
            .into_iter()
            .take(self.config.max_insight_annotations)
            .filter_map(|s| {
                let anchor = s
                    .relevant_date
                    .and_then(|d| value_at(data, d).map(|v| (d, v)))
                    .or_else(|| fallback.map(|p| (p.date, p.value)))?;
                Some(HealthAnnotation::new(
                    metric,
                    anchor.0,
                    anchor.1,
                    insight_priority(s.actionability),
                    s.title,
                    s.description,
                    AnnotationKind::Insight {
                        category: s.category,
                        actionability: s.actionability,
                    },
                ))
            })
            .collect())
    }

    fn comparison_annotations(&self, data: &MetricSeries, metric: &str) -> Vec<HealthAnnotation> {
        let window = self.config.comparison_window_days;
        let points: Vec<&DataPoint> = data.points.iter().filter(|p| p.is_valid()).collect();
        if window == 0 || points.len() <= window {
            return Vec::new();
        }

        let mut sorted: Vec<f64> = points.iter().map(|p| p.value).collect();
        sorted.sort_by(|a, b| a.total_cmp(b));
        let tail = self.config.comparison_percentile.clamp(0.0, 50.0);
        let low = percentile_sorted(&sorted, tail);
        let high = percentile_sorted(&sorted, 100.0 - tail);
        if high <= low {
            return Vec::new();
        }

        let mut annotations = Vec::new();
        for i in window..points.len() {
            let p = points[i];
            let extreme = if p.value >= high {
                Extreme::High
            } else if p.value <= low {
                Extreme::Low
            } else {
                continue;
            };

            let baseline = points[i - window..i].iter().map(|q| q.value).mean();
            if baseline == 0.0 {
                continue;
            }
            let percent_difference = (p.value - baseline) / baseline.abs() * 100.0;
            let magnitude = percent_difference.abs();
            let priority = if magnitude >= 50.0 {
                Priority::High
            } else if magnitude >= 20.0 {
                Priority::Medium
            } else {
                Priority::Low
            };
            let side = match extreme {
                Extreme::High => "above",
                Extreme::Low => "below",
            };

            annotations.push(HealthAnnotation::new(
                metric,
                p.date,
                p.value,
                priority,
                format!("{:.0}% {} your {}-day average", magnitude, side, window),
                format!(
                    "{} of {:.1} against a trailing average of {:.1}",
                    metric_label(metric),
                    p.value,
                    baseline
                ),
                AnnotationKind::Comparison {
                    baseline,
                    percent_difference,
                    extreme,
                },
            ));
        }
        annotations
    }

    fn goal_annotations(
        &self,
        data: &MetricSeries,
        metric: &str,
    ) -> HealthResult<Vec<HealthAnnotation>> {
        let Some(manager) = &self.goal_manager else {
            return Ok(Vec::new());
        };
        let Some(latest) = data.latest() else {
            return Ok(Vec::new());
        };
        let goals = manager
            .active_goals(metric)
            .map_err(|e| HealthError::collaborator("goal_manager", e.to_string()))?;

        Ok(goals
            .into_iter()
            .filter_map(|goal| {
                let progress = manager.goal_progress(&goal, latest.value);
                let (title, priority) = if progress.completed {
                    (format!("Goal reached: {}", goal.name), Priority::High)
                } else {
                    let milestone = progress.milestone_reached?;
                    (
                        format!("{}% of the way to {}", milestone, goal.name),
                        Priority::Medium,
                    )
                };
                Some(HealthAnnotation::new(
                    metric,
                    latest.date,
                    latest.value,
                    priority,
                    title,
                    format!(
                        "{:.1} of a {:.1} target ({:.0}% complete)",
                        latest.value, goal.target_value, progress.progress_percent
                    ),
                    AnnotationKind::Goal {
                        goal_name: goal.name,
                        target: goal.target_value,
                        progress_percent: progress.progress_percent,
                        completed: progress.completed,
                    },
                ))
            })
            .collect())
    }
}

/// Fixed milestone thresholds and their unit for metrics that have them
pub fn milestone_thresholds(metric: &str) -> Option<(&'static [f64], &'static str)> {
    match metric {
        "steps" => Some((&[10_000.0, 15_000.0, 20_000.0], "steps")),
        "exercise_minutes" => Some((&[30.0, 60.0, 90.0], "minutes")),
        "active_calories" => Some((&[500.0, 750.0, 1_000.0], "kcal")),
        "distance" | "distance_walking_running" => Some((&[5.0, 10.0, 21.1], "km")),
        "flights_climbed" => Some((&[10.0, 25.0, 50.0], "flights")),
        "sleep_duration" => Some((&[7.0, 8.0], "hours")),
        _ => None,
    }
}

/// First day each threshold was reached
fn milestone_annotations(data: &MetricSeries, metric: &str) -> Vec<HealthAnnotation> {
    let Some((thresholds, unit)) = milestone_thresholds(metric) else {
        return Vec::new();
    };

    thresholds
        .iter()
        .enumerate()
        .filter_map(|(i, &threshold)| {
            let first = data
                .points
                .iter()
                .find(|p| p.is_valid() && p.value >= threshold)?;
            let priority = if i + 1 == thresholds.len() {
                Priority::High
            } else {
                Priority::Medium
            };
            Some(HealthAnnotation::new(
                metric,
                first.date,
                first.value,
                priority,
                format!("First {} {} day", format_threshold(threshold), unit),
                format!("{:.0} {} on {}", first.value, unit, first.date),
                AnnotationKind::Milestone {
                    threshold,
                    unit: unit.to_string(),
                },
            ))
        })
        .collect()
}

fn format_threshold(threshold: f64) -> String {
    if threshold >= 1_000.0 && threshold % 1_000.0 == 0.0 {
        format!("{}K", threshold / 1_000.0)
    } else {
        format!("{}", threshold)
    }
}

fn value_at(data: &MetricSeries, date: NaiveDate) -> Option<f64> {
    data.points
        .iter()
        .find(|p| p.date == date && p.is_valid())
        .map(|p| p.value)
}

/// Point farthest from the series mean
fn most_relevant_point(data: &MetricSeries) -> Option<&DataPoint> {
    let values = data.valid_values();
    if values.is_empty() {
        return None;
    }
    let mean = values.iter().mean();
    data.points
        .iter()
        .filter(|p| p.is_valid())
        .max_by(|a, b| (a.value - mean).abs().total_cmp(&(b.value - mean).abs()))
}

pub fn anomaly_priority(severity: f64) -> Priority {
    if severity >= 0.9 {
        Priority::Critical
    } else if severity >= 0.8 {
        Priority::High
    } else if severity >= 0.6 {
        Priority::Medium
    } else {
        Priority::Low
    }
}

/// `percent_change` is the absolute change in percent
pub fn trend_priority(percent_change: f64, confidence: f64) -> Priority {
    if percent_change >= 20.0 && confidence >= 80.0 {
        Priority::High
    } else if percent_change >= 10.0 && confidence >= 60.0 {
        Priority::Medium
    } else {
        Priority::Low
    }
}

pub fn insight_priority(actionability: f64) -> Priority {
    if actionability >= 0.8 {
        Priority::High
    } else if actionability >= 0.5 {
        Priority::Medium
    } else {
        Priority::Low
    }
}

/// Highest priority first, then most recent
pub fn prioritize(annotations: &mut [HealthAnnotation]) {
    annotations.sort_by(|a, b| b.priority.cmp(&a.priority).then(b.date.cmp(&a.date)));
}

/// Keep annotations at least `spacing_days` apart.
///
/// Candidates are taken in input order. A candidate that falls within the
/// spacing of kept annotations replaces all of them only when it outranks
/// every one; otherwise it is dropped. Survivors keep their input order.
pub fn prevent_overlap(annotations: Vec<HealthAnnotation>, spacing_days: i64) -> Vec<HealthAnnotation> {
    if spacing_days <= 0 {
        return annotations;
    }

    // A reach past the representable calendar conflicts with every date
    let reach = spacing_days - 1;
    let mut kept: BTreeMap<NaiveDate, Vec<usize>> = BTreeMap::new();

    for (idx, candidate) in annotations.iter().enumerate() {
        let lo = days_before(candidate.date, reach).unwrap_or(NaiveDate::MIN);
        let hi = days_after(candidate.date, reach).unwrap_or(NaiveDate::MAX);
        let conflicts: Vec<usize> = kept
            .range(lo..=hi)
            .flat_map(|(_, ids)| ids.iter().copied())
            .collect();

        if !conflicts.is_empty() {
            let outranks_all = conflicts
                .iter()
                .all(|&k| candidate.priority > annotations[k].priority);
            if !outranks_all {
                continue;
            }
            for k in conflicts {
                if let Some(ids) = kept.get_mut(&annotations[k].date) {
                    ids.retain(|&i| i != k);
                }
            }
            kept.retain(|_, ids| !ids.is_empty());
        }
        kept.entry(candidate.date).or_default().push(idx);
    }

    let mut keep = vec![false; annotations.len()];
    for idx in kept.into_values().flatten() {
        keep[idx] = true;
    }
    annotations
        .into_iter()
        .zip(keep)
        .filter_map(|(a, k)| k.then_some(a))
        .collect()
}

/// Drop annotations below `threshold` and cap the rest at `max`
pub fn limit(annotations: Vec<HealthAnnotation>, threshold: Priority, max: usize) -> Vec<HealthAnnotation> {
    annotations
        .into_iter()
        .filter(|a| a.priority >= threshold)
        .take(max)
        .collect()
}
