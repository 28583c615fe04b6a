//! Registers every phase's metrics and detects naming conflicts early.

use crate::metrics::{MetricDoc, PhaseMetrics};
use std::collections::HashMap;
use tracing::{debug, info, warn};

pub fn register_all_metrics() {
    let mut all_metrics = HashMap::new();

    register_phase_metrics::<super::CleanMetrics>(&mut all_metrics);
    register_phase_metrics::<super::ResolveMetrics>(&mut all_metrics);
    register_phase_metrics::<super::JoinMetrics>(&mut all_metrics);
    register_phase_metrics::<super::FeatureMetrics>(&mut all_metrics);
    register_phase_metrics::<super::StoreMetrics>(&mut all_metrics);

    info!(
        "Registered {} total metrics across all phases",
        all_metrics.len()
    );
    for doc in all_metrics.values() {
        debug!(name = doc.name, kind = ?doc.metric_type, labels = ?doc.labels, "{}", doc.help);
    }
}

fn register_phase_metrics<T: PhaseMetrics>(all_metrics: &mut HashMap<&'static str, MetricDoc>) {
    T::register_metrics();
    let phase_name = T::phase_name();
    for doc in T::metrics_documentation() {
        if all_metrics.contains_key(doc.name) {
            warn!(
                "Metric name conflict detected: '{}' registered again by phase '{}'",
                doc.name, phase_name
            );
        } else {
            all_metrics.insert(doc.name, doc);
        }
    }
}

/// Every documented metric, for listing and conflict tests.
pub fn all_metric_docs() -> Vec<MetricDoc> {
    let mut docs = Vec::new();
    docs.extend(super::CleanMetrics::metrics_documentation());
    docs.extend(super::ResolveMetrics::metrics_documentation());
    docs.extend(super::JoinMetrics::metrics_documentation());
    docs.extend(super::FeatureMetrics::metrics_documentation());
    docs.extend(super::StoreMetrics::metrics_documentation());
    docs
}
