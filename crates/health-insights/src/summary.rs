//! Weekly Digest
//!
//! Markdown-ish text summary of a ranked insight list.

use std::fmt::Write;

use health_core::HealthCategory;

use crate::models::HealthInsight;
use crate::validator::GENERAL_DISCLAIMER;

/// Digest of `insights`, grouped by category in the order given
pub fn weekly_summary(insights: &[HealthInsight]) -> String {
    let mut out = String::from("## Your Weekly Health Summary\n\n");

    if insights.is_empty() {
        out.push_str("Not enough data this week to surface reliable insights. Keep logging and check back soon.\n");
        return out;
    }

    let mut categories: Vec<HealthCategory> = Vec::new();
    for insight in insights {
        if !categories.contains(&insight.category) {
            categories.push(insight.category);
        }
    }

    for category in categories {
        let _ = writeln!(out, "### {}\n", category.label());
        for insight in insights.iter().filter(|i| i.category == category) {
            let figure = insight
                .presentation
                .key_figure
                .as_deref()
                .map(|f| format!(" ({})", f))
                .unwrap_or_default();
            let _ = writeln!(out, "- **{}**{}: {}", insight.presentation.headline, figure, insight.description);
            if !insight.recommendation.is_empty() {
                let _ = writeln!(out, "  - {}", insight.recommendation);
            }
            let _ = writeln!(
                out,
                "  - _{}; {}_",
                insight.evidence_level.label(),
                insight.timeframe.label()
            );
        }
        out.push('\n');
    }

    let _ = writeln!(out, "_{}_", GENERAL_DISCLAIMER);
    out
}
