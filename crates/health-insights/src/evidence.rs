//! Medical Guideline Reference Data
//!
//! Static thresholds from public health organizations, keyed by category
//! and metric. Built once and never mutated.

use std::collections::BTreeMap;

use health_core::HealthCategory;
use serde::{Deserialize, Serialize};

use crate::models::EvidenceLevel;

/// Default demographic bucket
pub const GENERAL: &str = "general";

/// Numeric recommendation for one demographic bucket
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub optimal: Option<f64>,
    pub unit: String,
}

impl Recommendation {
    fn range(min: f64, max: f64, unit: &str) -> Self {
        Self {
            min: Some(min),
            max: Some(max),
            optimal: None,
            unit: unit.to_string(),
        }
    }

    fn at_least(min: f64, unit: &str) -> Self {
        Self {
            min: Some(min),
            max: None,
            optimal: None,
            unit: unit.to_string(),
        }
    }

    fn optimal(value: f64, unit: &str) -> Self {
        Self {
            min: None,
            max: None,
            optimal: Some(value),
            unit: unit.to_string(),
        }
    }
}

/// Guideline from an external organization for one metric
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MedicalGuideline {
    pub category: HealthCategory,
    pub metric: String,
    pub source: String,
    pub citation: String,
    pub evidence_level: EvidenceLevel,
    /// Demographic bucket -> recommendation
    pub recommendations: BTreeMap<String, Recommendation>,
}

impl MedicalGuideline {
    fn new(
        category: HealthCategory,
        metric: &str,
        source: &str,
        citation: &str,
        evidence_level: EvidenceLevel,
        buckets: Vec<(&str, Recommendation)>,
    ) -> Self {
        Self {
            category,
            metric: metric.to_string(),
            source: source.to_string(),
            citation: citation.to_string(),
            evidence_level,
            recommendations: buckets
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
        }
    }

    /// Recommendation for a demographic bucket, falling back to `general`
    pub fn recommendation_for(&self, demographic: Option<&str>) -> Option<&Recommendation> {
        demographic
            .and_then(|d| self.recommendations.get(d))
            .or_else(|| self.recommendations.get(GENERAL))
    }
}

/// Read-only guideline lookup
#[derive(Debug, Clone)]
pub struct EvidenceDatabase {
    guidelines: Vec<MedicalGuideline>,
}

impl Default for EvidenceDatabase {
    fn default() -> Self {
        Self::new()
    }
}

impl EvidenceDatabase {
    pub fn new() -> Self {
        use EvidenceLevel::*;
        use HealthCategory::*;

        let guidelines = vec![
            MedicalGuideline::new(
                Sleep,
                "sleep_duration",
                "AASM",
                "American Academy of Sleep Medicine and Sleep Research Society consensus statement (2015)",
                Strong,
                vec![
                    (GENERAL, Recommendation::range(7.0, 9.0, "hours")),
                    ("teen", Recommendation::range(8.0, 10.0, "hours")),
                    ("older_adult", Recommendation::range(7.0, 8.0, "hours")),
                ],
            ),
            MedicalGuideline::new(
                Sleep,
                "sleep_efficiency",
                "NSF",
                "National Sleep Foundation sleep quality recommendations (2017)",
                Moderate,
                vec![(GENERAL, Recommendation::range(85.0, 100.0, "%"))],
            ),
            MedicalGuideline::new(
                Activity,
                "steps",
                "CDC",
                "Paluch et al., daily steps and all-cause mortality meta-analysis, Lancet Public Health (2022)",
                Strong,
                vec![
                    (GENERAL, Recommendation::at_least(8000.0, "steps")),
                    ("older_adult", Recommendation::at_least(6000.0, "steps")),
                ],
            ),
            MedicalGuideline::new(
                Activity,
                "exercise_minutes",
                "WHO",
                "WHO guidelines on physical activity and sedentary behaviour (2020): 150-300 min/week",
                Strong,
                vec![(GENERAL, Recommendation::range(22.0, 43.0, "min/day"))],
            ),
            MedicalGuideline::new(
                Activity,
                "active_calories",
                "ACSM",
                "ACSM Guidelines for Exercise Testing and Prescription, 11th ed.",
                Moderate,
                vec![(GENERAL, Recommendation::optimal(500.0, "kcal"))],
            ),
            MedicalGuideline::new(
                HeartHealth,
                "resting_heart_rate",
                "AHA",
                "American Heart Association: normal resting heart rate 60-100 bpm",
                Strong,
                vec![
                    (GENERAL, Recommendation::range(60.0, 100.0, "bpm")),
                    ("athlete", Recommendation::range(40.0, 60.0, "bpm")),
                ],
            ),
            MedicalGuideline::new(
                Recovery,
                "heart_rate_variability",
                "Personal baseline",
                "HRV norms vary widely between individuals; personal trend matters more than absolute value",
                PatternBased,
                vec![(GENERAL, Recommendation::at_least(20.0, "ms"))],
            ),
            MedicalGuideline::new(
                BodyMetrics,
                "bmi",
                "WHO",
                "WHO body mass index classification for adults",
                Strong,
                vec![(GENERAL, Recommendation::range(18.5, 24.9, "kg/m²"))],
            ),
            MedicalGuideline::new(
                BodyMetrics,
                "body_fat_percentage",
                "ACSM",
                "ACSM body composition norms for adults",
                Moderate,
                vec![
                    (GENERAL, Recommendation::range(10.0, 25.0, "%")),
                    ("female", Recommendation::range(18.0, 32.0, "%")),
                ],
            ),
            MedicalGuideline::new(
                Nutrition,
                "water_intake",
                "NASEM",
                "National Academies dietary reference intakes for water (2004)",
                Moderate,
                vec![(GENERAL, Recommendation::range(2.7, 3.7, "L"))],
            ),
            MedicalGuideline::new(
                Nutrition,
                "dietary_protein",
                "USDA",
                "Dietary Guidelines for Americans 2020-2025",
                Moderate,
                vec![(GENERAL, Recommendation::range(46.0, 56.0, "g"))],
            ),
        ];

        Self { guidelines }
    }

    pub fn guideline(&self, category: HealthCategory, metric: &str) -> Option<&MedicalGuideline> {
        self.guidelines
            .iter()
            .find(|g| g.category == category && g.metric == metric)
    }

    pub fn recommendation(
        &self,
        category: HealthCategory,
        metric: &str,
        demographic: Option<&str>,
    ) -> Option<&Recommendation> {
        self.guideline(category, metric)?.recommendation_for(demographic)
    }

    pub fn guidelines_for(&self, category: HealthCategory) -> Vec<&MedicalGuideline> {
        self.guidelines
            .iter()
            .filter(|g| g.category == category)
            .collect()
    }

    /// Distinct source organizations, in table order
    pub fn sources(&self) -> Vec<&str> {
        let mut seen = Vec::new();
        for g in &self.guidelines {
            if !seen.contains(&g.source.as_str()) {
                seen.push(g.source.as_str());
            }
        }
        seen
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_by_category_and_metric() {
        let db = EvidenceDatabase::new();
        let g = db.guideline(HealthCategory::Sleep, "sleep_duration").unwrap();
        assert_eq!(g.source, "AASM");
        assert!(db.guideline(HealthCategory::Activity, "sleep_duration").is_none());
    }

    #[test]
    fn test_demographic_fallback_to_general() {
        let db = EvidenceDatabase::new();
        let teen = db
            .recommendation(HealthCategory::Sleep, "sleep_duration", Some("teen"))
            .unwrap();
        assert_eq!(teen.min, Some(8.0));

        let unknown = db
            .recommendation(HealthCategory::Sleep, "sleep_duration", Some("astronaut"))
            .unwrap();
        assert_eq!(unknown.min, Some(7.0));
        assert_eq!(unknown.max, Some(9.0));
    }

    #[test]
    fn test_sources_are_distinct() {
        let db = EvidenceDatabase::new();
        let sources = db.sources();
        assert!(sources.contains(&"WHO"));
        assert_eq!(sources.iter().filter(|s| **s == "WHO").count(), 1);
        assert_eq!(db.guidelines_for(HealthCategory::BodyMetrics).len(), 2);
    }
}
