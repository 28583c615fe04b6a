//! Schema cleaning phase metrics

use crate::metrics::{phase_metric, MetricDoc, MetricType, PhaseMetrics};
use crate::pipeline::processing::schema::CleanReport;

pub struct CleanMetrics;

impl CleanMetrics {
    pub fn record(report: &CleanReport) {
        let source = report.source_id.clone();
        ::metrics::counter!(phase_metric!(counter, "clean", "raw_rows"), "source" => source.clone())
            .increment(report.raw_rows as u64);
        ::metrics::counter!(
            phase_metric!(counter, "clean", "sentinel_replacements"),
            "source" => source.clone()
        )
        .increment(report.sentinel_replacements as u64);
        ::metrics::counter!(
            phase_metric!(counter, "clean", "rows_without_core_data"),
            "source" => source.clone()
        )
        .increment(report.rows_without_core_data as u64);
        ::metrics::counter!(phase_metric!(counter, "clean", "rows_out"), "source" => source)
            .increment(report.rows_out as u64);
    }
}

impl PhaseMetrics for CleanMetrics {
    fn register_metrics() {
        let _ = ::metrics::counter!(phase_metric!(counter, "clean", "raw_rows"));
        let _ = ::metrics::counter!(phase_metric!(counter, "clean", "sentinel_replacements"));
        let _ = ::metrics::counter!(phase_metric!(counter, "clean", "rows_without_core_data"));
        let _ = ::metrics::counter!(phase_metric!(counter, "clean", "rows_out"));
    }

    fn phase_name() -> &'static str {
        "clean"
    }

    fn metrics_documentation() -> Vec<MetricDoc> {
        vec![
            MetricDoc {
                name: phase_metric!(counter, "clean", "raw_rows"),
                metric_type: MetricType::Counter,
                help: "Rows read from a raw source",
                labels: vec!["source"],
            },
            MetricDoc {
                name: phase_metric!(counter, "clean", "sentinel_replacements"),
                metric_type: MetricType::Counter,
                help: "Cells replaced by the canonical missing marker",
                labels: vec!["source"],
            },
            MetricDoc {
                name: phase_metric!(counter, "clean", "rows_without_core_data"),
                metric_type: MetricType::Counter,
                help: "Rows dropped because every core field was missing",
                labels: vec!["source"],
            },
            MetricDoc {
                name: phase_metric!(counter, "clean", "rows_out"),
                metric_type: MetricType::Counter,
                help: "Rows kept after cleaning",
                labels: vec!["source"],
            },
        ]
    }
}
