//! Country-key resolution phase metrics
//!
//! The ignored-row counter is how unmapped country keys stay auditable
//! across runs.

use crate::metrics::{phase_metric, MetricDoc, MetricType, PhaseMetrics};
use crate::pipeline::processing::country::ResolutionReport;

pub struct ResolveMetrics;

impl ResolveMetrics {
    pub fn record(table: &str, report: &ResolutionReport) {
        let table = table.to_string();
        ::metrics::counter!(phase_metric!(counter, "resolve", "resolved_rows"), "table" => table.clone())
            .increment(report.resolved as u64);
        ::metrics::counter!(phase_metric!(counter, "resolve", "ignored_rows"), "table" => table.clone())
            .increment(report.ignored as u64);
        ::metrics::counter!(phase_metric!(counter, "resolve", "excluded_rows"), "table" => table.clone())
            .increment(report.excluded as u64);
        ::metrics::gauge!(phase_metric!(gauge, "resolve", "distinct_ignored_keys"), "table" => table)
            .set(report.ignored_keys.len() as f64);
    }
}

impl PhaseMetrics for ResolveMetrics {
    fn register_metrics() {
        let _ = ::metrics::counter!(phase_metric!(counter, "resolve", "resolved_rows"));
        let _ = ::metrics::counter!(phase_metric!(counter, "resolve", "ignored_rows"));
        let _ = ::metrics::counter!(phase_metric!(counter, "resolve", "excluded_rows"));
        let _ = ::metrics::gauge!(phase_metric!(gauge, "resolve", "distinct_ignored_keys"));
    }

    fn phase_name() -> &'static str {
        "resolve"
    }

    fn metrics_documentation() -> Vec<MetricDoc> {
        vec![
            MetricDoc {
                name: phase_metric!(counter, "resolve", "resolved_rows"),
                metric_type: MetricType::Counter,
                help: "Rows attached to a canonical country identity",
                labels: vec!["table"],
            },
            MetricDoc {
                name: phase_metric!(counter, "resolve", "ignored_rows"),
                metric_type: MetricType::Counter,
                help: "Rows whose raw country key is unmapped or curated as ignore",
                labels: vec!["table"],
            },
            MetricDoc {
                name: phase_metric!(counter, "resolve", "excluded_rows"),
                metric_type: MetricType::Counter,
                help: "Rows without year or country context",
                labels: vec!["table"],
            },
            MetricDoc {
                name: phase_metric!(gauge, "resolve", "distinct_ignored_keys"),
                metric_type: MetricType::Gauge,
                help: "Distinct raw country keys marked ignore in the last pass",
                labels: vec!["table"],
            },
        ]
    }
}
