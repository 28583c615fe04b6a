use crate::metrics::{phase_metric, MetricDoc, MetricType, PhaseMetrics};

pub struct StoreMetrics;

impl StoreMetrics {
    pub fn record_write(table: &str, rows: usize) {
        ::metrics::counter!(phase_metric!(counter, "store", "tables_written"), "table" => table.to_string())
            .increment(1);
        ::metrics::counter!(phase_metric!(counter, "store", "rows_written"), "table" => table.to_string())
            .increment(rows as u64);
    }
}

impl PhaseMetrics for StoreMetrics {
    fn register_metrics() {
        let _ = ::metrics::counter!(phase_metric!(counter, "store", "tables_written"));
        let _ = ::metrics::counter!(phase_metric!(counter, "store", "rows_written"));
    }

    fn phase_name() -> &'static str {
        "store"
    }

    fn metrics_documentation() -> Vec<MetricDoc> {
        vec![
            MetricDoc {
                name: phase_metric!(counter, "store", "tables_written"),
                metric_type: MetricType::Counter,
                help: "Tables atomically replaced in the store",
                labels: vec!["table"],
            },
            MetricDoc {
                name: phase_metric!(counter, "store", "rows_written"),
                metric_type: MetricType::Counter,
                help: "Rows written to the store",
                labels: vec!["table"],
            },
        ]
    }
}
