//! Chart annotations for health metric series
//!
//! Turns a daily metric series into typed, prioritized annotations that do
//! not crowd each other in time, and lays them out on a chart canvas without
//! overlapping boxes.

pub mod detectors;
pub mod layout;
pub mod models;
pub mod system;

pub use detectors::{
    InMemoryGoalManager, InsightsEngineSource, PersonalRecordsTracker, RegressionTrendEngine,
    ZScoreAnomalyDetector,
};
pub use layout::{AnnotationBounds, AnnotationLayoutManager, PlacementStrategy, Point, Rect};
pub use models::{annotation_id, AnnotationKind, AnnotationType, Extreme, HealthAnnotation};
pub use system::{
    anomaly_priority, insight_priority, limit, milestone_thresholds, prevent_overlap, prioritize,
    trend_priority, AnnotationListener, HealthAnnotationSystem,
};
