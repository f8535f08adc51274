use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::{Duration, NaiveDate};
use health_annotations::{
    AnnotationKind, AnnotationLayoutManager, AnnotationType, HealthAnnotation,
    HealthAnnotationSystem, InMemoryGoalManager, InsightsEngineSource, PlacementStrategy, Point,
};
use health_core::{
    Anomaly, AnomalyDetector, AnnotationConfig, DataPoint, DateRange, Goal, HealthCategory,
    HealthError, HealthResult, InsightSource, InsightSummary, LayoutConfig, MetricSeries,
    Priority,
};

fn start() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
}

fn day(offset: i64) -> NaiveDate {
    start() + Duration::days(offset)
}

/// Reports a fixed set of anomalies and counts how often it is asked
struct ScriptedDetector {
    calls: Arc<AtomicUsize>,
    anomalies: Vec<(i64, f64)>,
}

impl ScriptedDetector {
    fn new(anomalies: Vec<(i64, f64)>) -> (Self, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        (
            Self {
                calls: Arc::clone(&calls),
                anomalies,
            },
            calls,
        )
    }
}

impl AnomalyDetector for ScriptedDetector {
    fn detect_anomalies(
        &self,
        series: &MetricSeries,
        _metric: &str,
        _sensitivity: f64,
    ) -> HealthResult<Vec<Anomaly>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .anomalies
            .iter()
            .filter(|(offset, _)| series.points.iter().any(|p| p.date == day(*offset)))
            .map(|&(offset, severity)| Anomaly {
                date: day(offset),
                value: 100.0,
                severity,
                expected_range: (50.0, 70.0),
                z_score: 3.0,
                description: String::new(),
            })
            .collect())
    }
}

struct FailingDetector;

impl AnomalyDetector for FailingDetector {
    fn detect_anomalies(&self, _: &MetricSeries, _: &str, _: f64) -> HealthResult<Vec<Anomaly>> {
        Err(HealthError::CalculationError("model unavailable".to_string()))
    }
}

fn flat_series(metric: &str, days: usize) -> MetricSeries {
    MetricSeries::from_values(metric, start(), &vec![60.0; days])
}

#[test]
fn repeated_calls_hit_the_cache() {
    let (detector, calls) = ScriptedDetector::new(vec![(3, 0.95)]);
    let mut system =
        HealthAnnotationSystem::bare(AnnotationConfig::default()).with_anomaly_detector(detector);
    let series = flat_series("resting_heart_rate", 20);

    let first = system
        .generate_annotations(&series, "resting_heart_rate", None, &[AnnotationType::Anomaly])
        .unwrap();
    let second = system
        .generate_annotations(&series, "resting_heart_rate", None, &[AnnotationType::Anomaly])
        .unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(first.len(), 1);
    assert_eq!(first[0].priority, Priority::Critical);
    assert_eq!(system.cache_len(), 1);

    // Requested types are normalized before keying
    system
        .generate_annotations(
            &series,
            "resting_heart_rate",
            None,
            &[AnnotationType::Milestone, AnnotationType::Anomaly],
        )
        .unwrap();
    system
        .generate_annotations(
            &series,
            "resting_heart_rate",
            None,
            &[AnnotationType::Anomaly, AnnotationType::Milestone, AnnotationType::Anomaly],
        )
        .unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[test]
fn changed_values_or_cleared_cache_regenerate() {
    let (detector, calls) = ScriptedDetector::new(vec![(3, 0.95)]);
    let mut system =
        HealthAnnotationSystem::bare(AnnotationConfig::default()).with_anomaly_detector(detector);
    let series = flat_series("resting_heart_rate", 20);
    let types = [AnnotationType::Anomaly];

    system.generate_annotations(&series, "resting_heart_rate", None, &types).unwrap();

    let mut edited = series.clone();
    edited.points[5].value = 61.0;
    system.generate_annotations(&edited, "resting_heart_rate", None, &types).unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    let range = DateRange::new(day(0), day(9));
    system
        .generate_annotations(&series, "resting_heart_rate", Some(range), &types)
        .unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 3);

    system.clear_cache();
    assert_eq!(system.cache_len(), 0);
    system.generate_annotations(&series, "resting_heart_rate", None, &types).unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 4);
}

/// Reads the `bedtime` column and counts how often it is asked
struct BedtimeSource {
    calls: Arc<AtomicUsize>,
}

impl InsightSource for BedtimeSource {
    fn top_insights(
        &self,
        series: &MetricSeries,
        _metric: &str,
        _limit: usize,
    ) -> HealthResult<Vec<InsightSummary>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let late_nights = series
            .points
            .iter()
            .filter(|p| p.extras.get("bedtime").is_some_and(|&h| h >= 24.0))
            .count();
        let title = if late_nights > 0 {
            "Irregular sleep schedule"
        } else {
            "Steady bedtime"
        };
        Ok(vec![InsightSummary {
            title: title.to_string(),
            description: format!("{} nights after midnight", late_nights),
            category: HealthCategory::Sleep,
            actionability: 0.9,
            relevant_date: series.points.last().map(|p| p.date),
        }])
    }
}

fn nights_with_bedtimes(bedtimes: &[f64]) -> MetricSeries {
    let points = bedtimes
        .iter()
        .enumerate()
        .map(|(i, &b)| DataPoint::new(day(i as i64), 7.5).with_extra("bedtime", b))
        .collect();
    MetricSeries::new("sleep_duration", points)
}

#[test]
fn changed_extra_columns_regenerate() {
    let (detector, calls) = ScriptedDetector::new(vec![(3, 0.95)]);
    let mut system =
        HealthAnnotationSystem::bare(AnnotationConfig::default()).with_anomaly_detector(detector);
    let types = [AnnotationType::Anomaly];
    let series = nights_with_bedtimes(&[22.5; 14]);

    system.generate_annotations(&series, "sleep_duration", None, &types).unwrap();
    system.generate_annotations(&series, "sleep_duration", None, &types).unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    // Same dates and values, one bedtime moved
    let mut edited = series.clone();
    edited.points[6] = DataPoint::new(day(6), 7.5).with_extra("bedtime", 23.0);
    system.generate_annotations(&edited, "sleep_duration", None, &types).unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(system.cache_len(), 2);
}

#[test]
fn bedtime_driven_insights_follow_the_extra_column() {
    let calls = Arc::new(AtomicUsize::new(0));
    let mut system = HealthAnnotationSystem::bare(AnnotationConfig::default())
        .with_insight_source(BedtimeSource {
            calls: Arc::clone(&calls),
        });
    let types = [AnnotationType::Insight];

    let regular = nights_with_bedtimes(&[22.5; 14]);
    let irregular_bedtimes: Vec<f64> = (0..14)
        .map(|i| if i % 2 == 0 { 21.0 } else { 26.0 })
        .collect();
    let irregular = nights_with_bedtimes(&irregular_bedtimes);
    assert_eq!(
        regular.points.iter().map(|p| (p.date, p.value)).collect::<Vec<_>>(),
        irregular.points.iter().map(|p| (p.date, p.value)).collect::<Vec<_>>()
    );

    let steady = system
        .generate_annotations(&regular, "sleep_duration", None, &types)
        .unwrap();
    let flagged = system
        .generate_annotations(&irregular, "sleep_duration", None, &types)
        .unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert!(!Arc::ptr_eq(&steady, &flagged));
    assert_eq!(steady[0].title, "Steady bedtime");
    assert_eq!(flagged[0].title, "Irregular sleep schedule");
}

#[test]
fn warm_cache_matches_fresh_engine_insights() {
    let types = [AnnotationType::Insight];
    let regular = nights_with_bedtimes(&[22.5; 14]);
    let irregular_bedtimes: Vec<f64> = (0..14)
        .map(|i| if i % 2 == 0 { 21.0 } else { 26.0 })
        .collect();
    let irregular = nights_with_bedtimes(&irregular_bedtimes);
    let engine_system = || {
        HealthAnnotationSystem::bare(AnnotationConfig::default())
            .with_insight_source(InsightsEngineSource::default())
    };

    let fresh = engine_system()
        .generate_annotations(&irregular, "sleep_duration", None, &types)
        .unwrap();

    let mut warm = engine_system();
    warm.generate_annotations(&regular, "sleep_duration", None, &types)
        .unwrap();
    let after_regular = warm
        .generate_annotations(&irregular, "sleep_duration", None, &types)
        .unwrap();

    let titles = |a: &[HealthAnnotation]| {
        a.iter().map(|x| x.title.clone()).collect::<Vec<_>>()
    };
    assert_eq!(warm.cache_len(), 2);
    assert_eq!(titles(&after_regular), titles(&fresh));
}

#[test]
fn oversized_day_settings_do_not_panic() {
    let values: Vec<f64> = (0..120)
        .map(|i| match i {
            45 => 25000.0,
            _ => 7000.0 + ((i * 37) % 11) as f64 * 150.0 + i as f64 * 20.0,
        })
        .collect();
    let series = MetricSeries::from_values("steps", start(), &values);

    for (spacing, lookback) in [(400_000_000, i64::MAX), (i64::MAX, 400_000_000)] {
        let config = AnnotationConfig {
            min_annotation_spacing_days: spacing,
            achievement_lookback_days: lookback,
            ..AnnotationConfig::default()
        };
        let mut system = HealthAnnotationSystem::new(config);
        let result = system.generate_annotations(&series, "steps", None, &[]).unwrap();

        // Every candidate conflicts with every other, so only the top one survives
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].priority, Priority::Critical);
    }
}

#[test]
fn listeners_fire_once_per_fresh_result() {
    let (detector, _) = ScriptedDetector::new(vec![(3, 0.95)]);
    let mut system =
        HealthAnnotationSystem::bare(AnnotationConfig::default()).with_anomaly_detector(detector);

    let notified = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&notified);
    system.add_listener(move |metric, annotations| {
        assert_eq!(metric, "resting_heart_rate");
        seen.fetch_add(annotations.len(), Ordering::SeqCst);
    });

    let series = flat_series("resting_heart_rate", 20);
    for _ in 0..3 {
        system
            .generate_annotations(&series, "resting_heart_rate", None, &[AnnotationType::Anomaly])
            .unwrap();
    }
    assert_eq!(notified.load(Ordering::SeqCst), 1);
}

#[test]
fn empty_series_short_circuits() {
    let (detector, calls) = ScriptedDetector::new(vec![]);
    let mut system =
        HealthAnnotationSystem::bare(AnnotationConfig::default()).with_anomaly_detector(detector);

    let empty = MetricSeries::new("steps", Vec::new());
    let result = system.generate_annotations(&empty, "steps", None, &[]).unwrap();
    assert!(result.is_empty());
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(system.cache_len(), 0);
}

#[test]
fn crowded_anomalies_are_spaced_out() {
    let (detector, _) = ScriptedDetector::new(vec![(0, 0.85), (1, 0.85), (2, 0.85), (10, 0.85)]);
    let mut system =
        HealthAnnotationSystem::bare(AnnotationConfig::default()).with_anomaly_detector(detector);
    let series = flat_series("resting_heart_rate", 20);

    let result = system
        .generate_annotations(&series, "resting_heart_rate", None, &[AnnotationType::Anomaly])
        .unwrap();
    assert_eq!(result.len(), 2);
    for (i, a) in result.iter().enumerate() {
        for b in &result[i + 1..] {
            assert!((a.date - b.date).num_days().abs() >= 7);
        }
    }
}

#[test]
fn mild_anomalies_are_dropped() {
    let (detector, _) = ScriptedDetector::new(vec![(2, 0.65), (12, 0.75)]);
    let mut system =
        HealthAnnotationSystem::bare(AnnotationConfig::default()).with_anomaly_detector(detector);
    let series = flat_series("resting_heart_rate", 20);

    let result = system
        .generate_annotations(&series, "resting_heart_rate", None, &[AnnotationType::Anomaly])
        .unwrap();
    assert_eq!(result.len(), 1);
    assert_eq!(result[0].date, day(12));
    assert_eq!(result[0].priority, Priority::Medium);
    assert!(matches!(result[0].kind, AnnotationKind::Anomaly { severity, .. } if severity == 0.75));
}

#[test]
fn collaborator_failures_propagate() {
    let mut system =
        HealthAnnotationSystem::bare(AnnotationConfig::default()).with_anomaly_detector(FailingDetector);
    let series = flat_series("resting_heart_rate", 20);

    let err = system
        .generate_annotations(&series, "resting_heart_rate", None, &[AnnotationType::Anomaly])
        .unwrap_err();
    match err {
        HealthError::Collaborator { component, message } => {
            assert_eq!(component, "anomaly_detector");
            assert!(message.contains("model unavailable"));
        }
        other => panic!("unexpected error {:?}", other),
    }
    assert_eq!(system.cache_len(), 0);
}

#[test]
fn date_range_limits_milestones() {
    let mut values = vec![8000.0; 30];
    values[2] = 10500.0;
    values[20] = 11000.0;
    let series = MetricSeries::from_values("steps", start(), &values);
    let mut system = HealthAnnotationSystem::bare(AnnotationConfig::default());

    let all = system
        .generate_annotations(&series, "steps", None, &[AnnotationType::Milestone])
        .unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].date, day(2));

    let later = system
        .generate_annotations(
            &series,
            "steps",
            Some(DateRange::new(day(10), day(29))),
            &[AnnotationType::Milestone],
        )
        .unwrap();
    assert_eq!(later.len(), 1);
    assert_eq!(later[0].date, day(20));
}

#[test]
fn only_reached_goal_milestones_surface() {
    let goal = |id: &str, target: f64| Goal {
        id: id.to_string(),
        name: format!("Reach {}", target),
        metric: "steps".to_string(),
        start_value: 4000.0,
        target_value: target,
        deadline: None,
    };
    let manager = InMemoryGoalManager::new()
        .with_goal(goal("done", 8000.0))
        .with_goal(goal("half", 12000.0))
        .with_goal(goal("barely", 40000.0));
    let mut system =
        HealthAnnotationSystem::bare(AnnotationConfig::default()).with_goal_manager(manager);

    let series = MetricSeries::from_values("steps", start(), &[5000.0, 7000.0, 8500.0]);
    let result = system
        .generate_annotations(&series, "steps", None, &[AnnotationType::Goal])
        .unwrap();

    // Both surviving goals anchor on the latest day, so spacing keeps the
    // higher-priority completion only
    assert_eq!(result.len(), 1);
    assert_eq!(result[0].title, "Goal reached: Reach 8000");
    assert_eq!(result[0].priority, Priority::High);
    assert_eq!(result[0].date, day(2));
}

#[test]
fn built_in_pipeline_respects_spacing_and_caps() {
    let values: Vec<f64> = (0..120)
        .map(|i| match i {
            45 => 25000.0,
            90 => 900.0,
            _ => 7000.0 + ((i * 37) % 11) as f64 * 150.0 + i as f64 * 20.0,
        })
        .collect();
    let series = MetricSeries::from_values("steps", start(), &values);
    let config = AnnotationConfig::default();
    let mut system = HealthAnnotationSystem::new(config.clone());

    let result = system.generate_annotations(&series, "steps", None, &[]).unwrap();
    assert!(!result.is_empty());
    assert!(result.len() <= config.max_annotations_per_chart);
    assert!(result.iter().all(|a| a.priority >= config.priority_threshold));
    for (i, a) in result.iter().enumerate() {
        for b in &result[i + 1..] {
            assert!((a.date - b.date).num_days().abs() >= config.min_annotation_spacing_days);
        }
    }
    // The spike is the most severe observation in the series
    assert!(result
        .iter()
        .any(|a| a.date == day(45) && a.priority == Priority::Critical));
}

#[test]
fn separated_anchors_need_no_leaders() {
    let (detector, _) = ScriptedDetector::new(vec![(2, 0.95), (15, 0.95)]);
    let mut system =
        HealthAnnotationSystem::bare(AnnotationConfig::default()).with_anomaly_detector(detector);
    let series = flat_series("resting_heart_rate", 20);
    let annotations = system
        .generate_annotations(&series, "resting_heart_rate", None, &[AnnotationType::Anomaly])
        .unwrap();
    assert_eq!(annotations.len(), 2);

    let manager = AnnotationLayoutManager::new(LayoutConfig::default(), 1000.0, 1000.0);
    let bounds = manager.optimize_layout(&annotations, |date, _| {
        if date == day(2) {
            Point::new(200.0, 200.0)
        } else {
            Point::new(700.0, 700.0)
        }
    });

    assert_eq!(bounds.len(), 2);
    assert!(bounds.iter().all(|b| !b.needs_leader));
    assert!(!bounds[0].rect.intersects(&bounds[1].rect));
}

#[test]
fn identical_anchors_get_leader_or_fallback() {
    let (detector, _) = ScriptedDetector::new(vec![(2, 0.95), (15, 0.85)]);
    let mut system =
        HealthAnnotationSystem::bare(AnnotationConfig::default()).with_anomaly_detector(detector);
    let series = flat_series("resting_heart_rate", 20);
    let annotations = system
        .generate_annotations(&series, "resting_heart_rate", None, &[AnnotationType::Anomaly])
        .unwrap();

    let manager = AnnotationLayoutManager::new(LayoutConfig::default(), 1000.0, 1000.0);
    let bounds = manager.optimize_layout(&annotations, |_, _| Point::new(500.0, 500.0));

    assert_eq!(bounds.len(), 2);
    assert!(!bounds[0].rect.intersects(&bounds[1].rect));
    let second = &bounds[1];
    assert!(
        second.needs_leader
            || matches!(
                second.strategy,
                PlacementStrategy::EdgeScan | PlacementStrategy::Stacked
            )
    );
}

#[test]
fn crowded_canvas_keeps_boxes_apart() {
    let (detector, _) = ScriptedDetector::new((0..6).map(|i| (i * 8, 0.95)).collect());
    let mut system =
        HealthAnnotationSystem::bare(AnnotationConfig::default()).with_anomaly_detector(detector);
    let series = flat_series("resting_heart_rate", 60);
    let annotations = system
        .generate_annotations(&series, "resting_heart_rate", None, &[AnnotationType::Anomaly])
        .unwrap();
    assert_eq!(annotations.len(), 6);

    let manager = AnnotationLayoutManager::new(LayoutConfig::default(), 1000.0, 1000.0);
    let bounds = manager.optimize_layout(&annotations, |_, _| Point::new(500.0, 500.0));

    for (i, a) in bounds.iter().enumerate() {
        for b in &bounds[i + 1..] {
            assert!(!a.rect.intersects(&b.rect));
        }
    }
}
