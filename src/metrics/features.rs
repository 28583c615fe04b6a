use crate::metrics::{phase_metric, MetricDoc, MetricType, PhaseMetrics};

pub struct FeatureMetrics;

impl FeatureMetrics {
    pub fn record_step(step: &'static str) {
        ::metrics::counter!(phase_metric!(counter, "features", "steps_applied"), "step" => step)
            .increment(1);
    }

    pub fn record_clamped(column: &str, cells: usize) {
        ::metrics::counter!(
            phase_metric!(counter, "features", "negative_inputs_clamped"),
            "column" => column.to_string()
        )
        .increment(cells as u64);
    }

    pub fn record_reconcile_failure() {
        ::metrics::counter!(phase_metric!(counter, "features", "reconcile_failures")).increment(1);
    }
}

impl PhaseMetrics for FeatureMetrics {
    fn register_metrics() {
        let _ = ::metrics::counter!(phase_metric!(counter, "features", "steps_applied"));
        let _ = ::metrics::counter!(phase_metric!(counter, "features", "negative_inputs_clamped"));
        let _ = ::metrics::counter!(phase_metric!(counter, "features", "reconcile_failures"));
    }

    fn phase_name() -> &'static str {
        "features"
    }

    fn metrics_documentation() -> Vec<MetricDoc> {
        vec![
            MetricDoc {
                name: phase_metric!(counter, "features", "steps_applied"),
                metric_type: MetricType::Counter,
                help: "Feature engineering steps applied",
                labels: vec!["step"],
            },
            MetricDoc {
                name: phase_metric!(counter, "features", "negative_inputs_clamped"),
                metric_type: MetricType::Counter,
                help: "Negative count values clamped to zero before the log transform",
                labels: vec!["column"],
            },
            MetricDoc {
                name: phase_metric!(counter, "features", "reconcile_failures"),
                metric_type: MetricType::Counter,
                help: "Bucket reconciliation checks that failed",
                labels: vec![],
            },
        ]
    }
}
