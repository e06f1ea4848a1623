//! Per-request counters and latencies, exported in the Prometheus text format.

use prometheus::{Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder};
use warp::log::{Info, Log};

use crate::{auth::Auth, error::AuthError};

/// Each instance owns its registry, so several services can live in one process.
#[derive(Clone)]
pub struct RequestMetrics {
    registry: Registry,
    requests: IntCounterVec,
    latency: HistogramVec,
}

impl RequestMetrics {
    pub fn new() -> Result<Self, AuthError> {
        let registry = Registry::new();

        let requests = IntCounterVec::new(
            Opts::new("auth_http_requests_total", "HTTP requests handled"),
            &["method", "route", "status"],
        )?;
        let latency = HistogramVec::new(
            HistogramOpts::new(
                "auth_http_request_duration_seconds",
                "HTTP request latency",
            ),
            &["method", "route"],
        )?;

        registry.register(Box::new(requests.clone()))?;
        registry.register(Box::new(latency.clone()))?;

        Ok(Self {
            registry,
            requests,
            latency,
        })
    }

    pub fn observe(&self, method: &str, path: &str, status: u16, elapsed_secs: f64) {
        let route = route_label(path);
        self.requests
            .with_label_values(&[method, route, &status.to_string()])
            .inc();
        self.latency
            .with_label_values(&[method, route])
            .observe(elapsed_secs);
    }

    pub fn request_count(&self, method: &str, path: &str, status: u16) -> u64 {
        self.requests
            .with_label_values(&[method, route_label(path), &status.to_string()])
            .get()
    }

    pub fn render(&self) -> Result<String, AuthError> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}

/// Collapse ids so the label set stays bounded: `/users/17` becomes `/users/{id}`.
/// Paths outside the API share a single label.
pub fn route_label(path: &str) -> &'static str {
    let segments: Vec<&str> = path.trim_matches('/').split('/').collect();

    match segments.as_slice() {
        ["login"] => "/login",
        ["refresh"] => "/refresh",
        ["verify"] => "/verify",
        ["health"] => "/health",
        ["metrics"] => "/metrics",
        ["users"] => "/users",
        ["users", "me"] => "/users/me",
        ["users", id] if id.parse::<i64>().is_ok() => "/users/{id}",
        _ => "other",
    }
}

/// Wrap a filter so every reply, rejected or not, is counted under its final status.
pub fn track_requests(auth: &Auth) -> Log<impl Fn(Info<'_>) + Clone + Send> {
    let metrics = auth.metrics().clone();

    warp::log::custom(move |info: Info<'_>| {
        metrics.observe(
            info.method().as_str(),
            info.path(),
            info.status().as_u16(),
            info.elapsed().as_secs_f64(),
        );
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_collapsed_into_one_route() {
        assert_eq!(route_label("/users/1"), "/users/{id}");
        assert_eq!(route_label("/users/9001"), "/users/{id}");
        assert_eq!(route_label("/users/me"), "/users/me");
        assert_eq!(route_label("/users"), "/users");
        assert_eq!(route_label("/users/abc"), "other");
        assert_eq!(route_label("/wp-admin/login.php"), "other");
    }

    #[test]
    fn counts_by_route_and_status() {
        let metrics = RequestMetrics::new().unwrap();

        metrics.observe("GET", "/users/1", 200, 0.01);
        metrics.observe("GET", "/users/2", 200, 0.02);
        metrics.observe("GET", "/users/3", 403, 0.01);

        assert_eq!(metrics.request_count("GET", "/users/7", 200), 2);
        assert_eq!(metrics.request_count("GET", "/users/7", 403), 1);
        assert_eq!(metrics.request_count("POST", "/login", 200), 0);

        let text = metrics.render().unwrap();
        assert!(text.contains("auth_http_requests_total"));
        assert!(text.contains("auth_http_request_duration_seconds"));
        assert!(text.contains(r#"route="/users/{id}""#));
    }

    #[test]
    fn registries_are_independent() {
        let first = RequestMetrics::new().unwrap();
        let second = RequestMetrics::new().unwrap();

        first.observe("GET", "/health", 200, 0.0);
        assert_eq!(first.request_count("GET", "/health", 200), 1);
        assert_eq!(second.request_count("GET", "/health", 200), 0);
    }
}
