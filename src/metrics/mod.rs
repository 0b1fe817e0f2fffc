use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};

// ============================================================================
// Metrics Module - Prometheus metrics for observability
// ============================================================================
//
// Provides metrics for:
// - Orders created and updated
// - Failed operations (reads and lists included), by operation and reason
// - Store operation latency
//
// All metrics are registered with Prometheus and can be scraped via /metrics
// ============================================================================

/// Central metrics registry for the order service
pub struct Metrics {
    registry: Registry,

    pub orders_created: IntCounter,
    pub orders_updated: IntCounter,
    pub operations_failed: IntCounterVec,
    pub operation_duration: HistogramVec,
}

impl Metrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let orders_created = IntCounter::new("orders_created_total", "Total orders created")?;
        registry.register(Box::new(orders_created.clone()))?;

        let orders_updated = IntCounter::new("orders_updated_total", "Total successful order updates")?;
        registry.register(Box::new(orders_updated.clone()))?;

        let operations_failed = IntCounterVec::new(
            Opts::new("order_operations_failed_total", "Order operations that failed"),
            &["operation", "reason"],
        )?;
        registry.register(Box::new(operations_failed.clone()))?;

        let operation_duration = HistogramVec::new(
            HistogramOpts::new("order_operation_duration_seconds", "Order store operation duration")
                .buckets(vec![0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0]),
            &["operation"],
        )?;
        registry.register(Box::new(operation_duration.clone()))?;

        Ok(Self {
            registry,
            orders_created,
            orders_updated,
            operations_failed,
            operation_duration,
        })
    }

    /// Get the Prometheus registry for exposing metrics via HTTP
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Helper to record the outcome of one store operation
    pub fn record_operation(&self, operation: &str, duration_secs: f64, failure: Option<&str>) {
        self.operation_duration
            .with_label_values(&[operation])
            .observe(duration_secs);
        if let Some(reason) = failure {
            self.operations_failed.with_label_values(&[operation, reason]).inc();
        }
    }

    /// Text exposition format for the /metrics endpoint
    pub fn render(&self) -> anyhow::Result<Vec<u8>> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_creation() {
        let metrics = Metrics::new().unwrap();
        metrics.orders_created.inc();
        assert!(!metrics.registry.gather().is_empty());
    }

    #[test]
    fn test_record_operation_failure() {
        let metrics = Metrics::new().unwrap();
        metrics.record_operation("update", 0.002, Some("validation"));
        metrics.record_operation("update", 0.001, Some("validation"));
        metrics.record_operation("update", 0.001, None);

        let gathered = metrics.registry.gather();
        let failed = gathered
            .iter()
            .find(|m| m.name() == "order_operations_failed_total")
            .unwrap();
        assert_eq!(failed.metric[0].counter.value, Some(2.0));

        let duration = gathered
            .iter()
            .find(|m| m.name() == "order_operation_duration_seconds")
            .unwrap();
        assert_eq!(duration.metric[0].histogram.sample_count, Some(3));
    }

    #[test]
    fn test_render_text_format() {
        let metrics = Metrics::new().unwrap();
        metrics.orders_created.inc();

        let text = String::from_utf8(metrics.render().unwrap()).unwrap();
        assert!(text.contains("orders_created_total 1"));
    }
}
