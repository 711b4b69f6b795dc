//! # Prometheus Metrics
//!
//! HTTP-level metrics (request counts, latency, errors) are recorded in
//! middleware. Domain gauges (escrows, refund requests, fraud records,
//! offenders) are refreshed on each `/metrics` scrape; see the metrics
//! handler in `lib.rs`.

use std::sync::Arc;
use std::time::Instant;

use axum::extract::Request;
use axum::middleware::Next;
use axum::response::Response;
use prometheus::{
    core::Collector, Encoder, Gauge, GaugeVec, HistogramOpts, HistogramVec, IntCounterVec, Opts,
    Registry, TextEncoder,
};

/// Shared metrics state backed by a Prometheus registry.
#[derive(Clone)]
pub struct ApiMetrics {
    inner: Arc<Inner>,
}

struct Inner {
    registry: Registry,

    // -- HTTP middleware metrics (push model) --
    http_requests_total: IntCounterVec,
    http_request_duration_seconds: HistogramVec,
    http_errors_total: IntCounterVec,

    // -- Domain gauges (pull model, updated on /metrics scrape) --
    escrows_total: GaugeVec,
    escrow_platform_balance: Gauge,
    ledger_entries_total: Gauge,
    refund_requests_total: GaugeVec,
    fraud_records_total: Gauge,
    offenders_total: GaugeVec,
}

impl std::fmt::Debug for ApiMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiMetrics")
            .field("requests", &self.requests())
            .field("errors", &self.errors())
            .finish()
    }
}

fn register<C: Collector + Clone + 'static>(
    registry: &Registry,
    collector: C,
) -> Result<C, prometheus::Error> {
    registry.register(Box::new(collector.clone()))?;
    Ok(collector)
}

impl ApiMetrics {
    /// Create a metrics instance with a fresh Prometheus registry.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let http_requests_total = register(
            &registry,
            IntCounterVec::new(
                Opts::new("packs_http_requests_total", "Total HTTP requests"),
                &["method", "path", "status"],
            )?,
        )?;
        let http_request_duration_seconds = register(
            &registry,
            HistogramVec::new(
                HistogramOpts::new(
                    "packs_http_request_duration_seconds",
                    "HTTP request duration in seconds",
                )
                .buckets(vec![
                    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
                ]),
                &["method", "path"],
            )?,
        )?;
        let http_errors_total = register(
            &registry,
            IntCounterVec::new(
                Opts::new("packs_http_errors_total", "Total HTTP errors (4xx and 5xx)"),
                &["method", "path", "status"],
            )?,
        )?;
        let escrows_total = register(
            &registry,
            GaugeVec::new(
                Opts::new("packs_escrows_total", "Escrows by status"),
                &["status"],
            )?,
        )?;
        let escrow_platform_balance = register(
            &registry,
            Gauge::new("packs_platform_balance_tokens", "Platform fee account balance")?,
        )?;
        let ledger_entries_total = register(
            &registry,
            Gauge::new("packs_ledger_entries_total", "Journal entries recorded")?,
        )?;
        let refund_requests_total = register(
            &registry,
            GaugeVec::new(
                Opts::new("packs_refund_requests_total", "Refund requests by status"),
                &["status"],
            )?,
        )?;
        let fraud_records_total = register(
            &registry,
            Gauge::new("packs_fraud_records_total", "Fraud detection records")?,
        )?;
        let offenders_total = register(
            &registry,
            GaugeVec::new(
                Opts::new("packs_abuse_offenders_total", "Abuse offenders by sanction"),
                &["sanction"],
            )?,
        )?;

        Ok(Self {
            inner: Arc::new(Inner {
                registry,
                http_requests_total,
                http_request_duration_seconds,
                http_errors_total,
                escrows_total,
                escrow_platform_balance,
                ledger_entries_total,
                refund_requests_total,
                fraud_records_total,
                offenders_total,
            }),
        })
    }

    /// Total request count across all labels.
    pub fn requests(&self) -> u64 {
        sum_counters(&self.inner.http_requests_total)
    }

    /// Total 4xx/5xx count across all labels.
    pub fn errors(&self) -> u64 {
        sum_counters(&self.inner.http_errors_total)
    }

    fn record_request(&self, method: &str, path: &str, status: u16, duration_secs: f64) {
        let status_str = status.to_string();
        self.inner
            .http_requests_total
            .with_label_values(&[method, path, &status_str])
            .inc();

        self.inner
            .http_request_duration_seconds
            .with_label_values(&[method, path])
            .observe(duration_secs);

        if status >= 400 {
            self.inner
                .http_errors_total
                .with_label_values(&[method, path, &status_str])
                .inc();
        }
    }

    // -- Domain gauge accessors (used by the /metrics handler) --

    /// Escrows by status.
    pub fn escrows_total(&self) -> &GaugeVec {
        &self.inner.escrows_total
    }

    /// Platform fee balance.
    pub fn platform_balance(&self) -> &Gauge {
        &self.inner.escrow_platform_balance
    }

    /// Journal length.
    pub fn ledger_entries_total(&self) -> &Gauge {
        &self.inner.ledger_entries_total
    }

    /// Refund requests by status.
    pub fn refund_requests_total(&self) -> &GaugeVec {
        &self.inner.refund_requests_total
    }

    /// Fraud audit log length.
    pub fn fraud_records_total(&self) -> &Gauge {
        &self.inner.fraud_records_total
    }

    /// Offenders by sanction.
    pub fn offenders_total(&self) -> &GaugeVec {
        &self.inner.offenders_total
    }

    /// Gather all metrics and encode to Prometheus text format.
    pub fn gather_and_encode(&self) -> Result<String, String> {
        let encoder = TextEncoder::new();
        let metric_families = self.inner.registry.gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .map_err(|e| format!("failed to encode metrics: {e}"))?;
        String::from_utf8(buffer).map_err(|e| format!("metrics encoding produced invalid UTF-8: {e}"))
    }
}

fn sum_counters(counter: &IntCounterVec) -> u64 {
    counter
        .collect()
        .iter()
        .flat_map(|mf| mf.get_metric())
        .map(|m| m.get_counter().get_value() as u64)
        .sum()
}

/// Replace UUID path segments with `{id}` to bound label cardinality.
fn normalize_path(path: &str) -> String {
    path.split('/')
        .map(|segment| {
            if segment.len() == 36
                && segment.chars().enumerate().all(|(i, c)| {
                    if i == 8 || i == 13 || i == 18 || i == 23 {
                        c == '-'
                    } else {
                        c.is_ascii_hexdigit()
                    }
                })
            {
                "{id}"
            } else {
                segment
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Middleware that records HTTP request metrics via Prometheus.
pub async fn metrics_middleware(request: Request, next: Next) -> Response {
    let metrics = request.extensions().get::<ApiMetrics>().cloned();
    let method = request.method().to_string();
    let path = normalize_path(request.uri().path());
    let start = Instant::now();

    let response = next.run(request).await;

    if let Some(m) = metrics {
        let duration = start.elapsed().as_secs_f64();
        let status = response.status().as_u16();
        m.record_request(&method, &path, status, duration);
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_requests_and_errors() {
        let m = ApiMetrics::new().unwrap();
        assert_eq!(m.requests(), 0);
        m.record_request("GET", "/v1/escrows/{id}", 200, 0.01);
        m.record_request("POST", "/v1/refunds", 409, 0.02);
        m.record_request("POST", "/v1/refunds", 500, 0.02);
        assert_eq!(m.requests(), 3);
        assert_eq!(m.errors(), 2);
    }

    #[test]
    fn concurrent_recording() {
        let m = ApiMetrics::new().unwrap();
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let m = m.clone();
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        m.record_request("GET", "/v1/jobs", 200, 0.001);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(m.requests(), 800);
    }

    #[test]
    fn uuid_segments_normalized() {
        assert_eq!(
            normalize_path("/v1/escrows/550e8400-e29b-41d4-a716-446655440000/release"),
            "/v1/escrows/{id}/release"
        );
        assert_eq!(normalize_path("/v1/refunds/queue"), "/v1/refunds/queue");
    }

    #[test]
    fn gauges_appear_in_output() {
        let m = ApiMetrics::new().unwrap();
        m.escrows_total().with_label_values(&["HELD"]).set(3.0);
        m.fraud_records_total().set(2.0);
        let text = m.gather_and_encode().unwrap();
        assert!(text.contains("packs_escrows_total{status=\"HELD\"} 3"));
        assert!(text.contains("packs_fraud_records_total 2"));
    }
}
