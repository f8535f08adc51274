//! Evidence-Based Goal Generation
//!
//! Turns a guideline recommendation and the user's current value into a
//! personalized target, timeline and milestone ladder.

use std::sync::Arc;

use health_core::HealthCategory;
use serde::{Deserialize, Serialize};

use crate::evidence::EvidenceDatabase;
use crate::models::EvidenceLevel;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoalMilestone {
    pub step: usize,
    pub target: f64,
}

/// Target derived from a guideline for one metric
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonalizedGoal {
    pub metric: String,
    pub category: HealthCategory,
    pub current_value: f64,
    pub target_value: f64,
    pub unit: String,
    /// Distance to target as a percentage of the current value
    pub gap_percent: f64,
    pub timeline: String,
    pub milestones: Vec<GoalMilestone>,
    /// Confidence in 0-100
    pub confidence: f64,
    pub evidence_source: Option<String>,
    pub evidence_level: EvidenceLevel,
    /// Current value already satisfies the guideline
    pub within_guideline: bool,
}

#[derive(Debug, Clone)]
pub struct EvidenceBasedGoalGenerator {
    database: Arc<EvidenceDatabase>,
}

impl Default for EvidenceBasedGoalGenerator {
    fn default() -> Self {
        Self::new(Arc::new(EvidenceDatabase::new()))
    }
}

impl EvidenceBasedGoalGenerator {
    pub fn new(database: Arc<EvidenceDatabase>) -> Self {
        Self { database }
    }

    /// Goal for `metric`, or `None` when no guideline gives a usable target
    pub fn generate_goal(
        &self,
        metric: &str,
        category: HealthCategory,
        current_value: f64,
        demographic: Option<&str>,
    ) -> Option<PersonalizedGoal> {
        if !current_value.is_finite() {
            return None;
        }

        let guideline = self.database.guideline(category, metric)?;
        let rec = guideline.recommendation_for(demographic)?;

        let (target_value, within_guideline) = if let Some(optimal) = rec.optimal {
            (optimal, current_value == optimal)
        } else {
            match (rec.min, rec.max) {
                (Some(min), Some(max)) => {
                    if current_value < min {
                        (min, false)
                    } else if current_value > max {
                        (max, false)
                    } else {
                        ((min + max) / 2.0, true)
                    }
                }
                (Some(min), None) => {
                    if current_value < min {
                        (min, false)
                    } else {
                        (current_value, true)
                    }
                }
                (None, Some(max)) => {
                    if current_value > max {
                        (max, false)
                    } else {
                        (current_value, true)
                    }
                }
                (None, None) => return None,
            }
        };

        let gap_percent = gap_percent(current_value, target_value);

        Some(PersonalizedGoal {
            metric: metric.to_string(),
            category,
            current_value,
            target_value,
            unit: rec.unit.clone(),
            gap_percent,
            timeline: timeline_for_gap(gap_percent).to_string(),
            milestones: milestones(current_value, target_value, gap_percent),
            confidence: guideline.evidence_level.base_confidence(),
            evidence_source: Some(guideline.source.clone()),
            evidence_level: guideline.evidence_level,
            within_guideline,
        })
    }
}

fn gap_percent(current: f64, target: f64) -> f64 {
    if current == 0.0 {
        if target == 0.0 {
            0.0
        } else {
            100.0
        }
    } else {
        (target - current).abs() / current.abs() * 100.0
    }
}

fn timeline_for_gap(gap_percent: f64) -> &'static str {
    if gap_percent < 10.0 {
        "2-4 weeks"
    } else if gap_percent < 25.0 {
        "1-2 months"
    } else {
        "2-3 months"
    }
}

/// Between two and four equally spaced steps ending at the target
fn milestones(current: f64, target: f64, gap_percent: f64) -> Vec<GoalMilestone> {
    let count = ((gap_percent / 10.0).floor() as usize).clamp(2, 4);
    let step = (target - current) / count as f64;
    (1..=count)
        .map(|k| GoalMilestone {
            step: k,
            target: if k == count {
                target
            } else {
                current + step * k as f64
            },
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_below_min_targets_min_exactly() {
        let gen = EvidenceBasedGoalGenerator::default();
        let goal = gen
            .generate_goal("sleep_duration", HealthCategory::Sleep, 6.0, None)
            .unwrap();
        assert_eq!(goal.target_value, 7.0);
        assert!(!goal.within_guideline);
        assert_eq!(goal.evidence_source.as_deref(), Some("AASM"));
    }

    #[test]
    fn test_within_range_targets_midpoint() {
        let gen = EvidenceBasedGoalGenerator::default();
        let goal = gen
            .generate_goal("sleep_duration", HealthCategory::Sleep, 7.5, None)
            .unwrap();
        assert_eq!(goal.target_value, 8.0);
        assert!(goal.within_guideline);
    }

    #[test]
    fn test_above_max_targets_max() {
        let gen = EvidenceBasedGoalGenerator::default();
        let goal = gen
            .generate_goal("resting_heart_rate", HealthCategory::HeartHealth, 110.0, None)
            .unwrap();
        assert_eq!(goal.target_value, 100.0);
    }

    #[test]
    fn test_optimal_takes_precedence() {
        let gen = EvidenceBasedGoalGenerator::default();
        let goal = gen
            .generate_goal("active_calories", HealthCategory::Activity, 300.0, None)
            .unwrap();
        assert_eq!(goal.target_value, 500.0);
    }

    #[test]
    fn test_missing_guideline_is_none() {
        let gen = EvidenceBasedGoalGenerator::default();
        assert!(gen
            .generate_goal("flights_climbed", HealthCategory::Activity, 10.0, None)
            .is_none());
    }

    #[test]
    fn test_timeline_and_milestones() {
        let gen = EvidenceBasedGoalGenerator::default();
        // 4000 -> 8000 steps is a 100% gap
        let goal = gen
            .generate_goal("steps", HealthCategory::Activity, 4000.0, None)
            .unwrap();
        assert_eq!(goal.timeline, "2-3 months");
        assert_eq!(goal.milestones.len(), 4);
        assert_eq!(goal.milestones[0].target, 5000.0);
        assert_eq!(goal.milestones[3].target, 8000.0);

        // 6.5 -> 7 hours is a ~7.7% gap
        let goal = gen
            .generate_goal("sleep_duration", HealthCategory::Sleep, 6.5, None)
            .unwrap();
        assert_eq!(goal.timeline, "2-4 weeks");
        assert_eq!(goal.milestones.len(), 2);
        assert_eq!(goal.milestones[1].target, 7.0);
    }

    #[test]
    fn test_demographic_bucket() {
        let gen = EvidenceBasedGoalGenerator::default();
        let goal = gen
            .generate_goal("steps", HealthCategory::Activity, 4000.0, Some("older_adult"))
            .unwrap();
        assert_eq!(goal.target_value, 6000.0);
        assert_eq!(goal.timeline, "2-3 months");
    }
}
