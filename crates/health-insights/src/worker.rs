//! Background Insight Worker
//!
//! Runs one generation request off the caller's thread. The request is
//! one-shot: the full list or an error string comes back, nothing partial.

use std::sync::Arc;

use health_core::MetricSeries;

use crate::engine::EnhancedHealthInsightsEngine;
use crate::models::HealthInsight;

#[derive(Clone)]
pub struct InsightWorker {
    engine: Arc<EnhancedHealthInsightsEngine>,
}

impl InsightWorker {
    pub fn new(engine: Arc<EnhancedHealthInsightsEngine>) -> Self {
        Self { engine }
    }

    pub async fn generate(
        &self,
        series: Vec<MetricSeries>,
        max_insights: usize,
    ) -> Result<Vec<HealthInsight>, String> {
        let engine = Arc::clone(&self.engine);
        let metric_count = series.len();

        let result = tokio::task::spawn_blocking(move || engine.generate_insights(&series, max_insights)).await;

        match result {
            Ok(insights) => {
                tracing::info!(
                    "Insight worker finished: {} insights from {} metrics",
                    insights.len(),
                    metric_count
                );
                Ok(insights)
            }
            Err(e) => {
                tracing::error!("Insight worker failed: {}", e);
                Err(format!("Insight generation failed: {}", e))
            }
        }
    }
}
