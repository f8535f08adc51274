//! Cross-Metric Correlation
//!
//! Pairwise Pearson correlation across metric series joined on date.
//! Quadratic in the number of metrics; intended for small metric sets.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use health_core::MetricSeries;
use serde::{Deserialize, Serialize};

use crate::patterns::{t_two_tailed_p, SIGNIFICANCE_LEVEL};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CorrelationStrength {
    Strong,
    Moderate,
}

impl CorrelationStrength {
    pub fn from_r(r: f64) -> Self {
        if r.abs() > 0.7 {
            CorrelationStrength::Strong
        } else {
            CorrelationStrength::Moderate
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CorrelationStrength::Strong => "strong",
            CorrelationStrength::Moderate => "moderate",
        }
    }
}

/// Significant correlation between two metrics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorrelationFinding {
    pub metric_a: String,
    pub metric_b: String,
    pub correlation: f64,
    pub p_value: f64,
    /// Overlapping days used
    pub n: usize,
    pub strength: CorrelationStrength,
}

#[derive(Debug, Clone, Default)]
pub struct CorrelationInsightGenerator;

impl CorrelationInsightGenerator {
    pub fn new() -> Self {
        Self
    }

    /// Every unordered metric pair with `|r| >= min_correlation` and
    /// `p < 0.05` over at least `min_points` shared days, strongest first.
    pub fn find_significant_correlations(
        &self,
        series: &[MetricSeries],
        min_correlation: f64,
        min_points: usize,
    ) -> Vec<CorrelationFinding> {
        let indexed: Vec<(&str, BTreeMap<NaiveDate, f64>)> = series
            .iter()
            .map(|s| (s.metric.as_str(), by_date(s)))
            .collect();

        let mut findings = Vec::new();

        for i in 0..indexed.len() {
            for j in (i + 1)..indexed.len() {
                let (name_a, a) = &indexed[i];
                let (name_b, b) = &indexed[j];

                let (xs, ys): (Vec<f64>, Vec<f64>) = a
                    .iter()
                    .filter_map(|(date, x)| b.get(date).map(|y| (*x, *y)))
                    .unzip();

                if xs.len() < min_points {
                    continue;
                }

                let Some((r, p)) = pearson(&xs, &ys) else {
                    continue;
                };

                if r.abs() >= min_correlation && p < SIGNIFICANCE_LEVEL {
                    findings.push(CorrelationFinding {
                        metric_a: name_a.to_string(),
                        metric_b: name_b.to_string(),
                        correlation: r,
                        p_value: p,
                        n: xs.len(),
                        strength: CorrelationStrength::from_r(r),
                    });
                }
            }
        }

        findings.sort_by(|a, b| {
            b.correlation
                .abs()
                .partial_cmp(&a.correlation.abs())
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        tracing::debug!(
            "Correlation scan over {} metrics found {} significant pairs",
            series.len(),
            findings.len()
        );

        findings
    }
}

/// Pearson r and its two-tailed p-value. `None` below 3 points or for a
/// constant input.
pub fn pearson(x: &[f64], y: &[f64]) -> Option<(f64, f64)> {
    let n = x.len().min(y.len());
    if n < 3 {
        return None;
    }

    let mean_x = x[..n].iter().sum::<f64>() / n as f64;
    let mean_y = y[..n].iter().sum::<f64>() / n as f64;

    let mut sxy = 0.0;
    let mut sxx = 0.0;
    let mut syy = 0.0;
    for i in 0..n {
        let dx = x[i] - mean_x;
        let dy = y[i] - mean_y;
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }

    if sxx <= f64::EPSILON || syy <= f64::EPSILON {
        return None;
    }

    let r = (sxy / (sxx * syy).sqrt()).clamp(-1.0, 1.0);
    let df = (n - 2) as f64;

    let p = if 1.0 - r.abs() < 1e-12 {
        0.0
    } else {
        let t = r * (df / (1.0 - r * r)).sqrt();
        t_two_tailed_p(t, df)
    };

    Some((r, p))
}

/// Valid values keyed by date; a later duplicate date wins
fn by_date(series: &MetricSeries) -> BTreeMap<NaiveDate, f64> {
    series
        .points
        .iter()
        .filter(|p| p.is_valid())
        .map(|p| (p.date, p.value))
        .collect()
}
