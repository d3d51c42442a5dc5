//! Prometheus metrics for the API server.

use std::sync::OnceLock;
use std::time::Instant;

use axum::body::Body;
use axum::http::{Request, Response};
use axum::middleware::Next;
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use regex_lite::Regex;

/// Install the Prometheus recorder and return a handle for rendering.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new().install_recorder()
}

/// Metric names as constants for consistency.
pub mod names {
    // HTTP metrics
    pub const HTTP_REQUESTS_TOTAL: &str = "burnin_http_requests_total";
    pub const HTTP_REQUEST_DURATION_SECONDS: &str = "burnin_http_request_duration_seconds";
    pub const HTTP_REQUESTS_IN_FLIGHT: &str = "burnin_http_requests_in_flight";

    // Delivery metrics
    pub const DELIVERIES_TOTAL: &str = "burnin_deliveries_total";
    pub const DELIVERY_BYTES_TOTAL: &str = "burnin_delivery_bytes_total";
    pub const OUTPUTS_SWEPT_TOTAL: &str = "burnin_outputs_swept_total";
}

/// Record an HTTP request.
pub fn record_http_request(method: &str, path: &str, status: u16, duration_secs: f64) {
    let labels = [
        ("method", method.to_string()),
        ("path", sanitize_path(path)),
        ("status", status.to_string()),
    ];

    counter!(names::HTTP_REQUESTS_TOTAL, &labels).increment(1);
    histogram!(names::HTTP_REQUEST_DURATION_SECONDS, &labels).record(duration_secs);
}

/// Record the end of a file delivery, full or partial.
pub fn record_delivery(outcome: &'static str, bytes: u64) {
    counter!(names::DELIVERIES_TOTAL, "outcome" => outcome).increment(1);
    counter!(names::DELIVERY_BYTES_TOTAL, "outcome" => outcome).increment(bytes);
}

pub fn record_outputs_swept(count: usize) {
    counter!(names::OUTPUTS_SWEPT_TOTAL).increment(count as u64);
}

fn token_segment() -> &'static Regex {
    static TOKEN: OnceLock<Regex> = OnceLock::new();
    TOKEN.get_or_init(|| {
        Regex::new(r"/(exports|downloads)/[A-Za-z0-9_-]+").expect("token path pattern is valid")
    })
}

/// Sanitize path for metrics labels (replace tokens with placeholders).
fn sanitize_path(path: &str) -> String {
    token_segment()
        .replace_all(path, "/$1/:token")
        .into_owned()
}

/// Metrics middleware for HTTP requests.
pub async fn metrics_middleware(request: Request<Body>, next: Next) -> Response<Body> {
    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let start = Instant::now();

    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).increment(1.0);
    let response = next.run(request).await;
    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).decrement(1.0);

    let status = response.status().as_u16();
    let duration = start.elapsed().as_secs_f64();

    record_http_request(&method, &path, status, duration);

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_path() {
        assert_eq!(
            sanitize_path("/api/exports/3f2a9c0b1d7e4a55b6c8d9e0f1a2b3c4/download"),
            "/api/exports/:token/download"
        );
        assert_eq!(sanitize_path("/api/downloads/abc-123"), "/api/downloads/:token");
        assert_eq!(sanitize_path("/api/exports"), "/api/exports");
        assert_eq!(sanitize_path("/health"), "/health");
    }
}
