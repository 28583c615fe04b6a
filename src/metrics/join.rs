//! Join phase metrics

use crate::metrics::{phase_metric, MetricDoc, MetricType, PhaseMetrics};

pub struct JoinMetrics;

impl JoinMetrics {
    pub fn record_excluded(table: &str, rows: usize) {
        ::metrics::counter!(phase_metric!(counter, "join", "excluded_rows"), "table" => table.to_string())
            .increment(rows as u64);
    }

    pub fn record_output(rows: usize) {
        ::metrics::gauge!(phase_metric!(gauge, "join", "output_rows")).set(rows as f64);
    }

    pub fn record_duplicate_key() {
        ::metrics::counter!(phase_metric!(counter, "join", "duplicate_keys")).increment(1);
    }
}

impl PhaseMetrics for JoinMetrics {
    fn register_metrics() {
        let _ = ::metrics::counter!(phase_metric!(counter, "join", "excluded_rows"));
        let _ = ::metrics::counter!(phase_metric!(counter, "join", "duplicate_keys"));
        let _ = ::metrics::gauge!(phase_metric!(gauge, "join", "output_rows"));
    }

    fn phase_name() -> &'static str {
        "join"
    }

    fn metrics_documentation() -> Vec<MetricDoc> {
        vec![
            MetricDoc {
                name: phase_metric!(counter, "join", "excluded_rows"),
                metric_type: MetricType::Counter,
                help: "Rows left out of the join because their key is ignore",
                labels: vec!["table"],
            },
            MetricDoc {
                name: phase_metric!(counter, "join", "duplicate_keys"),
                metric_type: MetricType::Counter,
                help: "Duplicate join keys found in unique-keyed tables",
                labels: vec![],
            },
            MetricDoc {
                name: phase_metric!(gauge, "join", "output_rows"),
                metric_type: MetricType::Gauge,
                help: "Rows in the last joined table",
                labels: vec![],
            },
        ]
    }
}
