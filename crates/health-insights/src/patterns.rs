//! Statistical Pattern Analysis
//!
//! Consistency scoring, linear trend detection and day-of-week pattern
//! detection over daily metric series. Every entry point fails soft: short
//! or degenerate input yields a documented sentinel rather than an error.

use chrono::{Datelike, Weekday};
use health_core::{MetricSeries, TrendDirection};
use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, FisherSnedecor, StudentsT};
use statrs::statistics::Statistics;

/// Significance level used throughout the pipeline
pub const SIGNIFICANCE_LEVEL: f64 = 0.05;

/// Ordinary least squares fit of values against their index
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegressionResult {
    pub slope: f64,
    pub intercept: f64,
    pub r_squared: f64,
    /// Pearson correlation of value with index
    pub correlation: f64,
    pub standard_error: f64,
    /// Two-tailed p-value for slope != 0
    pub p_value: f64,
    pub n: usize,
}

/// Result of trend detection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrendAnalysis {
    pub trend: TrendDirection,
    pub slope: f64,
    pub intercept: f64,
    pub r_squared: f64,
    pub p_value: f64,
    /// Confidence in 0-100
    pub confidence: f64,
    /// Number of valid samples used
    pub n: usize,
}

impl TrendAnalysis {
    /// Sentinel for series below the minimum sample count
    pub fn insufficient(n: usize) -> Self {
        Self {
            trend: TrendDirection::InsufficientData,
            slope: 0.0,
            intercept: 0.0,
            r_squared: 0.0,
            p_value: 1.0,
            confidence: 0.0,
            n,
        }
    }

    pub fn is_significant(&self) -> bool {
        matches!(
            self.trend,
            TrendDirection::Increasing | TrendDirection::Decreasing
        )
    }
}

/// Mean value for one day of the week
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DayMean {
    pub day: Weekday,
    pub mean: f64,
    pub count: usize,
}

/// Result of day-of-week pattern detection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeeklyPattern {
    pub pattern_found: bool,
    pub f_statistic: f64,
    pub p_value: f64,
    /// Means for every day with at least one sample, Monday first
    pub day_means: Vec<DayMean>,
    /// Two highest-mean days
    pub best_days: Vec<Weekday>,
    /// Two lowest-mean days
    pub worst_days: Vec<Weekday>,
}

impl WeeklyPattern {
    pub fn not_found() -> Self {
        Self {
            pattern_found: false,
            f_statistic: 0.0,
            p_value: 1.0,
            day_means: Vec::new(),
            best_days: Vec::new(),
            worst_days: Vec::new(),
        }
    }
}

/// Pattern analyzer over daily metric series
#[derive(Debug, Clone, Default)]
pub struct StatisticalPatternAnalyzer;

impl StatisticalPatternAnalyzer {
    pub fn new() -> Self {
        Self
    }

    /// Consistency score in 0-1: `1 - cv / target_variance`, clamped.
    ///
    /// Returns 0 for fewer than 3 valid points or a zero mean.
    pub fn calculate_consistency_score(&self, values: &[f64], target_variance: f64) -> f64 {
        let valid: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
        if valid.len() < 3 || target_variance <= 0.0 {
            return 0.0;
        }

        let mean = valid.iter().mean();
        if mean == 0.0 {
            return 0.0;
        }

        let cv = valid.iter().std_dev() / mean.abs();
        (1.0 - cv / target_variance).clamp(0.0, 1.0)
    }

    /// Detect a linear trend against the sample index.
    ///
    /// Below `min_points` valid samples the result is
    /// [`TrendAnalysis::insufficient`].
    pub fn detect_trend(&self, values: &[f64], min_points: usize) -> TrendAnalysis {
        let valid: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
        if valid.len() < min_points.max(3) {
            return TrendAnalysis::insufficient(valid.len());
        }

        let Some(reg) = linear_regression(&valid) else {
            return TrendAnalysis::insufficient(valid.len());
        };

        let trend = if reg.p_value > SIGNIFICANCE_LEVEL {
            TrendDirection::Stable
        } else if reg.slope > 0.0 {
            TrendDirection::Increasing
        } else if reg.slope < 0.0 {
            TrendDirection::Decreasing
        } else {
            TrendDirection::Stable
        };

        let confidence = (reg.r_squared * 100.0 * (1.0 - reg.p_value)).clamp(0.0, 100.0);

        TrendAnalysis {
            trend,
            slope: reg.slope,
            intercept: reg.intercept,
            r_squared: reg.r_squared,
            p_value: reg.p_value,
            confidence,
            n: reg.n,
        }
    }

    /// One-way ANOVA across day-of-week buckets.
    ///
    /// Requires at least 14 valid rows and at least two weekdays with two or
    /// more samples each.
    pub fn find_weekly_patterns(&self, series: &MetricSeries) -> WeeklyPattern {
        let rows: Vec<(Weekday, f64)> = series
            .points
            .iter()
            .filter(|p| p.is_valid())
            .map(|p| (p.date.weekday(), p.value))
            .collect();

        if rows.len() < 14 {
            return WeeklyPattern::not_found();
        }

        let mut buckets: [Vec<f64>; 7] = Default::default();
        for (day, value) in &rows {
            buckets[day.num_days_from_monday() as usize].push(*value);
        }

        let groups: Vec<&Vec<f64>> = buckets.iter().filter(|b| b.len() >= 2).collect();
        if groups.len() < 2 {
            return WeeklyPattern::not_found();
        }

        let (f_statistic, p_value) = one_way_anova(&groups);

        let day_means: Vec<DayMean> = buckets
            .iter()
            .enumerate()
            .filter(|(_, b)| !b.is_empty())
            .map(|(i, b)| DayMean {
                day: weekday_from_index(i),
                mean: b.iter().mean(),
                count: b.len(),
            })
            .collect();

        let mut ranked: Vec<&DayMean> = day_means.iter().collect();
        ranked.sort_by(|a, b| {
            b.mean
                .partial_cmp(&a.mean)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        let best_days = ranked.iter().take(2).map(|d| d.day).collect();
        let worst_days = ranked.iter().rev().take(2).map(|d| d.day).collect();

        WeeklyPattern {
            pattern_found: p_value < SIGNIFICANCE_LEVEL,
            f_statistic,
            p_value,
            day_means,
            best_days,
            worst_days,
        }
    }
}

/// OLS regression of `values` against `0..n`. `None` below 3 points.
pub fn linear_regression(values: &[f64]) -> Option<RegressionResult> {
    let n = values.len();
    if n < 3 {
        return None;
    }

    let nf = n as f64;
    let mean_x = (nf - 1.0) / 2.0;
    let mean_y = values.iter().sum::<f64>() / nf;

    let mut sxx = 0.0;
    let mut sxy = 0.0;
    let mut syy = 0.0;
    for (i, &y) in values.iter().enumerate() {
        let dx = i as f64 - mean_x;
        let dy = y - mean_y;
        sxx += dx * dx;
        sxy += dx * dy;
        syy += dy * dy;
    }

    let slope = sxy / sxx;
    let intercept = mean_y - slope * mean_x;
    let df = (n - 2) as f64;

    // Constant series: no trend at all
    if syy <= f64::EPSILON * mean_y.abs().max(1.0) {
        return Some(RegressionResult {
            slope: 0.0,
            intercept: mean_y,
            r_squared: 0.0,
            correlation: 0.0,
            standard_error: 0.0,
            p_value: 1.0,
            n,
        });
    }

    let correlation = (sxy / (sxx * syy).sqrt()).clamp(-1.0, 1.0);
    let sse = (syy - slope * sxy).max(0.0);
    let standard_error = (sse / df).sqrt();
    let se_slope = standard_error / sxx.sqrt();

    // Perfect fit
    let p_value = if sse <= 1e-12 * syy || se_slope == 0.0 {
        0.0
    } else {
        t_two_tailed_p(slope / se_slope, df)
    };

    Some(RegressionResult {
        slope,
        intercept,
        r_squared: correlation * correlation,
        correlation,
        standard_error,
        p_value,
        n,
    })
}

/// Two-tailed p-value of a t statistic
pub(crate) fn t_two_tailed_p(t: f64, df: f64) -> f64 {
    if !t.is_finite() {
        return 0.0;
    }
    match StudentsT::new(0.0, 1.0, df) {
        Ok(dist) => (2.0 * (1.0 - dist.cdf(t.abs()))).clamp(0.0, 1.0),
        Err(_) => 1.0,
    }
}

/// F statistic and p-value for a one-way ANOVA over `groups`
fn one_way_anova(groups: &[&Vec<f64>]) -> (f64, f64) {
    let k = groups.len();
    let total: usize = groups.iter().map(|g| g.len()).sum();
    if k < 2 || total <= k {
        return (0.0, 1.0);
    }

    let grand_mean = groups.iter().flat_map(|g| g.iter()).sum::<f64>() / total as f64;

    let mut ss_between = 0.0;
    let mut ss_within = 0.0;
    for g in groups {
        let m = g.iter().sum::<f64>() / g.len() as f64;
        ss_between += g.len() as f64 * (m - grand_mean).powi(2);
        ss_within += g.iter().map(|x| (x - m).powi(2)).sum::<f64>();
    }

    let df_between = (k - 1) as f64;
    let df_within = (total - k) as f64;

    if ss_within <= f64::EPSILON {
        return if ss_between > f64::EPSILON {
            (f64::INFINITY, 0.0)
        } else {
            (0.0, 1.0)
        };
    }

    let f = (ss_between / df_between) / (ss_within / df_within);
    let p = match FisherSnedecor::new(df_between, df_within) {
        Ok(dist) => (1.0 - dist.cdf(f)).clamp(0.0, 1.0),
        Err(_) => 1.0,
    };
    (f, p)
}

fn weekday_from_index(i: usize) -> Weekday {
    match i {
        0 => Weekday::Mon,
        1 => Weekday::Tue,
        2 => Weekday::Wed,
        3 => Weekday::Thu,
        4 => Weekday::Fri,
        5 => Weekday::Sat,
        _ => Weekday::Sun,
    }
}

/// Nearest-rank percentile of an ascending slice
pub fn percentile_sorted(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let idx = ((p / 100.0) * (sorted.len() - 1) as f64).round() as usize;
    sorted[idx.min(sorted.len() - 1)]
}
