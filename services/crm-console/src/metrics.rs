//! Prometheus recorder for the client counters
//!
//! The console is short-lived, so instead of serving `/metrics` it renders
//! the text exposition once at exit when `--metrics` is passed.

use anyhow::{Context, Result};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Install the global recorder and return a handle for rendering.
pub fn install_recorder() -> Result<PrometheusHandle> {
    PrometheusBuilder::new()
        .install_recorder()
        .context("failed to install Prometheus recorder")
}
