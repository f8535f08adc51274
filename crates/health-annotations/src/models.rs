use std::fmt;

use chrono::NaiveDate;
use health_core::{HealthCategory, Priority, RecordType, TrendDirection};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Tag for each annotation variant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnnotationType {
    Anomaly,
    Achievement,
    Trend,
    Insight,
    Milestone,
    Comparison,
    Goal,
}

impl AnnotationType {
    pub fn all() -> [AnnotationType; 7] {
        [
            AnnotationType::Anomaly,
            AnnotationType::Achievement,
            AnnotationType::Trend,
            AnnotationType::Insight,
            AnnotationType::Milestone,
            AnnotationType::Comparison,
            AnnotationType::Goal,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AnnotationType::Anomaly => "anomaly",
            AnnotationType::Achievement => "achievement",
            AnnotationType::Trend => "trend",
            AnnotationType::Insight => "insight",
            AnnotationType::Milestone => "milestone",
            AnnotationType::Comparison => "comparison",
            AnnotationType::Goal => "goal",
        }
    }
}

impl fmt::Display for AnnotationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which tail of the distribution a comparison day sits in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Extreme {
    High,
    Low,
}

/// Type-specific payload of an annotation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AnnotationKind {
    Anomaly {
        severity: f64,
        expected_range: (f64, f64),
    },
    Achievement {
        record_type: RecordType,
        improvement_percent: f64,
        streak_days: u32,
    },
    Trend {
        direction: TrendDirection,
        percent_change: f64,
        confidence: f64,
        start_date: NaiveDate,
    },
    Insight {
        category: HealthCategory,
        actionability: f64,
    },
    Milestone {
        threshold: f64,
        unit: String,
    },
    Comparison {
        /// Trailing average the day is compared against
        baseline: f64,
        percent_difference: f64,
        extreme: Extreme,
    },
    Goal {
        goal_name: String,
        target: f64,
        progress_percent: f64,
        completed: bool,
    },
}

impl AnnotationKind {
    pub fn annotation_type(&self) -> AnnotationType {
        match self {
            AnnotationKind::Anomaly { .. } => AnnotationType::Anomaly,
            AnnotationKind::Achievement { .. } => AnnotationType::Achievement,
            AnnotationKind::Trend { .. } => AnnotationType::Trend,
            AnnotationKind::Insight { .. } => AnnotationType::Insight,
            AnnotationKind::Milestone { .. } => AnnotationType::Milestone,
            AnnotationKind::Comparison { .. } => AnnotationType::Comparison,
            AnnotationKind::Goal { .. } => AnnotationType::Goal,
        }
    }
}

/// Chart marker anchored to one `(date, value)` point
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthAnnotation {
    pub id: String,
    pub metric: String,
    pub date: NaiveDate,
    pub value: f64,
    pub priority: Priority,
    pub title: String,
    pub description: String,
    pub kind: AnnotationKind,
}

impl HealthAnnotation {
    pub fn new(
        metric: impl Into<String>,
        date: NaiveDate,
        value: f64,
        priority: Priority,
        title: impl Into<String>,
        description: impl Into<String>,
        kind: AnnotationKind,
    ) -> Self {
        let metric = metric.into();
        let title = title.into();
        let id = annotation_id(&metric, kind.annotation_type(), date, &title);
        Self {
            id,
            metric,
            date,
            value,
            priority,
            title,
            description: description.into(),
            kind,
        }
    }

    pub fn annotation_type(&self) -> AnnotationType {
        self.kind.annotation_type()
    }
}

/// Stable id: first 16 hex chars of sha256 over metric, type, date and title
pub fn annotation_id(metric: &str, kind: AnnotationType, date: NaiveDate, title: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(metric.as_bytes());
    hasher.update(b"|");
    hasher.update(kind.as_str().as_bytes());
    hasher.update(b"|");
    hasher.update(date.to_string().as_bytes());
    hasher.update(b"|");
    hasher.update(title.as_bytes());
    hex::encode(&hasher.finalize()[..8])
}
