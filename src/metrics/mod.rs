//! Centralized metrics infrastructure for the reconciliation pipeline
//!
//! Each pipeline phase defines its own counters in a dedicated submodule.
//! A Prometheus recorder is installed in-process and its rendered snapshot
//! is written next to the run outputs, since a batch run is too short-lived
//! to be scraped.

pub mod clean;
pub mod features;
pub mod join;
pub mod registry;
pub mod resolve;
pub mod store;

pub use clean::CleanMetrics;
pub use features::FeatureMetrics;
pub use join::JoinMetrics;
pub use resolve::ResolveMetrics;
pub use store::StoreMetrics;

use std::path::{Path, PathBuf};
use std::sync::{Once, OnceLock};
use tracing::{info, warn};

static INIT: Once = Once::new();
static HANDLE: OnceLock<metrics_exporter_prometheus::PrometheusHandle> = OnceLock::new();

/// Initialize the global metrics recorder. Idempotent.
pub fn init_metrics() {
    INIT.call_once(|| {
        match metrics_exporter_prometheus::PrometheusBuilder::new().install_recorder() {
            Ok(handle) => {
                if HANDLE.set(handle).is_err() {
                    warn!("Metrics handle already set");
                }
                registry::register_all_metrics();
                info!("Prometheus recorder installed");
            }
            Err(e) => {
                warn!("Failed to install Prometheus recorder: {}", e);
            }
        }
    });
}

/// Write the current metrics snapshot in Prometheus text format to
/// `<output_dir>/metrics.prom`. Returns `None` when no recorder is installed.
pub fn write_snapshot(output_dir: &Path) -> std::io::Result<Option<PathBuf>> {
    let Some(handle) = HANDLE.get() else {
        return Ok(None);
    };
    std::fs::create_dir_all(output_dir)?;
    let path = output_dir.join("metrics.prom");
    std::fs::write(&path, handle.render())?;
    Ok(Some(path))
}

/// Trait for phase-specific metrics collections
pub trait PhaseMetrics {
    /// Register all metrics for this phase so they appear in the snapshot
    /// even when never incremented.
    fn register_metrics();

    fn phase_name() -> &'static str;

    fn metrics_documentation() -> Vec<MetricDoc>;
}

/// Documentation for a single metric
#[derive(Debug, Clone)]
pub struct MetricDoc {
    pub name: &'static str,
    pub metric_type: MetricType,
    pub help: &'static str,
    pub labels: Vec<&'static str>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricType {
    Counter,
    Gauge,
}

/// Metric names follow `ptx_{phase}_{name}_total` for counters and
/// `ptx_{phase}_{name}` for gauges.
macro_rules! phase_metric {
    (counter, $phase:literal, $name:literal) => {
        concat!("ptx_", $phase, "_", $name, "_total")
    };
    (gauge, $phase:literal, $name:literal) => {
        concat!("ptx_", $phase, "_", $name)
    };
}

pub(crate) use phase_metric;
