//! Medical Safety Validation
//!
//! Checks the evidence behind a generated insight, downgrades claims that
//! no credible source supports, softens clinical wording and attaches the
//! applicable disclaimers.

use health_core::HealthCategory;
use serde::{Deserialize, Serialize};

use crate::models::{EvidenceLevel, HealthInsight, InsightType};

pub const GENERAL_DISCLAIMER: &str =
    "This information is for general wellness purposes only and is not medical advice.";
pub const HIGH_RISK_DISCLAIMER: &str =
    "Consult a healthcare professional before making changes based on heart or body-composition data.";
pub const PATTERN_BASED_DISCLAIMER: &str =
    "This insight is based on patterns in your personal data, not on clinical guidelines.";
pub const LOW_CONFIDENCE_DISCLAIMER: &str =
    "Confidence in this insight is limited; more data may change the picture.";
pub const CORRELATION_DISCLAIMER: &str =
    "Correlation does not imply causation; other factors may explain this relationship.";

/// Confidence multiplier applied when evidence is downgraded
const DOWNGRADE_PENALTY: f64 = 0.85;
const LOW_CONFIDENCE_THRESHOLD: f64 = 70.0;

const CREDIBLE_CODES: &[&str] = &[
    "WHO", "CDC", "AHA", "AASM", "NSF", "ACSM", "NIH", "NASEM", "USDA", "ADA", "AAP", "NHS",
];

const CREDIBLE_NAMES: &[&str] = &[
    "world health organization",
    "centers for disease control",
    "american heart association",
    "american academy of sleep medicine",
    "national sleep foundation",
    "american college of sports medicine",
    "national institutes of health",
    "national academies",
    "mayo clinic",
    "cochrane",
];

const RESEARCH_INDICATORS: &[&str] = &[
    "study",
    "peer-reviewed",
    "peer reviewed",
    "meta-analysis",
    "clinical trial",
    "systematic review",
    "journal",
];

const TERM_REPLACEMENTS: &[(&str, &str)] = &[
    ("diagnose", "notice"),
    ("diagnosed", "noticed"),
    ("diagnosis", "observation"),
    ("treat", "support"),
    ("treats", "supports"),
    ("treatment", "approach"),
    ("cure", "improve"),
    ("cures", "improves"),
    ("prescription", "plan"),
    ("prescribe", "suggest"),
    ("medication", "routine"),
    ("disease", "condition"),
    ("disorder", "pattern"),
    ("therapy", "practice"),
    ("symptom", "sign"),
    ("symptoms", "signs"),
];

const HEDGING_WORDS: &[&str] = &[
    "consider", "may", "might", "could", "try", "aim", "suggest", "perhaps",
];

/// Outcome of an evidence check
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EvidenceValidation {
    pub credible_sources: Vec<String>,
    pub uncredible_sources: Vec<String>,
    pub requires_downgrade: bool,
    pub issues: Vec<String>,
}

/// Validates evidence and wording of generated insights
#[derive(Debug, Clone)]
pub struct MedicalEvidenceValidator {
    min_confidence: f64,
}

impl Default for MedicalEvidenceValidator {
    fn default() -> Self {
        Self::new(50.0)
    }
}

impl MedicalEvidenceValidator {
    pub fn new(min_confidence: f64) -> Self {
        Self { min_confidence }
    }

    /// Allow-list and keyword heuristic, not a verified registry
    pub fn is_credible_source(&self, source: &str) -> bool {
        let lower = source.to_lowercase();
        let tokens: Vec<String> = source
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
            .map(|t| t.to_uppercase())
            .collect();

        CREDIBLE_CODES.iter().any(|code| tokens.iter().any(|t| t == code))
            || CREDIBLE_NAMES.iter().any(|name| lower.contains(name))
            || RESEARCH_INDICATORS.iter().any(|kw| lower.contains(kw))
    }

    pub fn validate_evidence(&self, insight: &HealthInsight) -> EvidenceValidation {
        let mut result = EvidenceValidation::default();

        for source in &insight.evidence_sources {
            if self.is_credible_source(source) {
                result.credible_sources.push(source.clone());
            } else {
                result.uncredible_sources.push(source.clone());
            }
        }

        if insight.evidence_sources.is_empty() {
            result.issues.push("no evidence sources cited".to_string());
        }
        if !result.uncredible_sources.is_empty() {
            result.issues.push(format!(
                "unrecognized sources: {}",
                result.uncredible_sources.join(", ")
            ));
        }

        result.requires_downgrade = result.credible_sources.is_empty()
            && insight.evidence_level != EvidenceLevel::PatternBased;
        if result.requires_downgrade {
            result.issues.push(format!(
                "{:?} evidence claimed without a credible source",
                insight.evidence_level
            ));
        }

        result
    }

    /// Disclaimer sentences applicable to the insight, first-seen order, no duplicates
    pub fn generate_medical_disclaimer(&self, insight: &HealthInsight) -> String {
        let mut parts: Vec<&str> = vec![GENERAL_DISCLAIMER, category_disclaimer(insight.category)];

        if insight.category.is_high_risk() {
            parts.push(HIGH_RISK_DISCLAIMER);
        }
        if insight.evidence_level == EvidenceLevel::PatternBased {
            parts.push(PATTERN_BASED_DISCLAIMER);
        }
        if insight.confidence < LOW_CONFIDENCE_THRESHOLD {
            parts.push(LOW_CONFIDENCE_DISCLAIMER);
        }
        if insight.insight_type == InsightType::Correlation {
            parts.push(CORRELATION_DISCLAIMER);
        }

        let mut unique: Vec<&str> = Vec::with_capacity(parts.len());
        for part in parts {
            if !unique.contains(&part) {
                unique.push(part);
            }
        }
        unique.join(" ")
    }

    /// Soften clinical wording and make sure the text reads as a suggestion
    pub fn sanitize_recommendation(&self, text: &str) -> String {
        if text.trim().is_empty() {
            return String::new();
        }

        let mut out = String::with_capacity(text.len() + 10);
        let mut word = String::new();
        let mut hedged = false;

        for c in text.chars() {
            if c.is_alphanumeric() || c == '\'' {
                word.push(c);
            } else {
                flush_word(&mut word, &mut out, &mut hedged);
                out.push(c);
            }
        }
        flush_word(&mut word, &mut out, &mut hedged);

        if hedged {
            out
        } else {
            format!("Consider: {}", out)
        }
    }

    /// Validate, downgrade, sanitize and attach disclaimers.
    ///
    /// Returns `None` when post-validation confidence falls below the minimum.
    pub fn ensure_medical_safety(&self, mut insight: HealthInsight) -> Option<HealthInsight> {
        let validation = self.validate_evidence(&insight);

        if validation.requires_downgrade {
            tracing::debug!(
                "Downgrading evidence for insight '{}' ({:?} -> PatternBased)",
                insight.title,
                insight.evidence_level
            );
            insight.evidence_level = EvidenceLevel::PatternBased;
            insight.confidence *= DOWNGRADE_PENALTY;
        }

        insight.recommendation = self.sanitize_recommendation(&insight.recommendation);
        insight.medical_disclaimer = self.generate_medical_disclaimer(&insight);

        if insight.confidence < self.min_confidence {
            tracing::debug!(
                "Rejecting insight '{}': confidence {:.1} below {:.1}",
                insight.title,
                insight.confidence,
                self.min_confidence
            );
            return None;
        }

        Some(insight)
    }
}

fn category_disclaimer(category: HealthCategory) -> &'static str {
    match category {
        HealthCategory::Sleep => {
            "Persistent sleep difficulties are worth discussing with a healthcare provider."
        }
        HealthCategory::Activity => {
            "Check with a healthcare provider before significantly increasing physical activity."
        }
        HealthCategory::Recovery => {
            "Recovery metrics from wearables are estimates and vary between devices."
        }
        HealthCategory::Nutrition => {
            "Nutritional needs vary; a registered dietitian can provide personalized guidance."
        }
        HealthCategory::BodyMetrics => {
            "Body composition readings from consumer devices are approximate."
        }
        HealthCategory::HeartHealth => {
            "Heart rate readings from consumer devices are not diagnostic."
        }
    }
}

fn flush_word(word: &mut String, out: &mut String, hedged: &mut bool) {
    if word.is_empty() {
        return;
    }
    let lower = word.to_lowercase();
    if HEDGING_WORDS.contains(&lower.as_str()) {
        *hedged = true;
    }
    match TERM_REPLACEMENTS.iter().find(|(from, _)| *from == lower) {
        Some((_, to)) => out.push_str(&match_case(word, to)),
        None => out.push_str(word),
    }
    word.clear();
}

fn match_case(original: &str, replacement: &str) -> String {
    if original.chars().next().is_some_and(|c| c.is_uppercase()) {
        let mut chars = replacement.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => String::new(),
        }
    } else {
        replacement.to_string()
    }
}
