use crate::ErrorKind;
use metrics::{register_counter, register_gauge, register_histogram, Counter, Gauge, Histogram};
use std::net::SocketAddr;
use std::time::Duration;
use tracing::info;

/// Handles for the converter's metrics.
///
/// Handles are registered against whatever recorder is installed when
/// [`Metrics::new`] runs; without one they are no-ops.
pub struct Metrics {
    pub conversions_succeeded: Counter,
    pub conversions_failed: Counter,
    pub conversion_duration: Histogram,
    pub output_bytes: Histogram,
    pub active_conversions: Gauge,
    pub browser_launches: Counter,
    pub browser_launch_failures: Counter,
    pub validation_errors: Counter,
    pub timeout_errors: Counter,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            conversions_succeeded: register_counter!("html2pdf_conversions_succeeded_total"),
            conversions_failed: register_counter!("html2pdf_conversions_failed_total"),
            conversion_duration: register_histogram!("html2pdf_conversion_duration_seconds"),
            output_bytes: register_histogram!("html2pdf_output_bytes"),
            active_conversions: register_gauge!("html2pdf_active_conversions"),
            browser_launches: register_counter!("html2pdf_browser_launches_total"),
            browser_launch_failures: register_counter!("html2pdf_browser_launch_failures_total"),
            validation_errors: register_counter!("html2pdf_validation_errors_total"),
            timeout_errors: register_counter!("html2pdf_timeout_errors_total"),
        }
    }

    pub fn conversion_started(&self) {
        self.active_conversions.increment(1.0);
    }

    pub fn record_success(&self, duration: Duration, file_size: Option<u64>) {
        self.active_conversions.decrement(1.0);
        self.conversions_succeeded.increment(1);
        self.conversion_duration.record(duration.as_secs_f64());

        if let Some(bytes) = file_size {
            self.output_bytes.record(bytes as f64);
        }
    }

    pub fn record_failure(&self, duration: Duration, kind: ErrorKind, timed_out: bool) {
        self.active_conversions.decrement(1.0);
        self.conversions_failed.increment(1);
        self.conversion_duration.record(duration.as_secs_f64());

        if kind == ErrorKind::Validation {
            self.validation_errors.increment(1);
        }
        if timed_out {
            self.timeout_errors.increment(1);
        }
    }

    pub fn record_browser_launch(&self, success: bool) {
        if success {
            self.browser_launches.increment(1);
        } else {
            self.browser_launch_failures.increment(1);
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Install the Prometheus recorder with an HTTP scrape endpoint on `addr`.
///
/// Must run inside a tokio runtime and before [`Metrics::new`].
pub fn install_prometheus_exporter(addr: SocketAddr) -> Result<(), Box<dyn std::error::Error>> {
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;

    info!("Prometheus metrics available on http://{}/metrics", addr);
    Ok(())
}
