//! Prometheus scrape endpoint.

use axum::{
    http::{StatusCode, header::CONTENT_TYPE},
    response::{IntoResponse, Response},
};

/// Content type of the Prometheus text exposition format.
pub const PROMETHEUS_CONTENT_TYPE: &str = "text/plain; version=0.0.4";

/// Render a scrape for `GET /metrics`.
///
/// `None` means no recorder is installed; the endpoint then answers 404.
#[must_use]
pub fn metrics_response(rendered: Option<String>) -> Response {
    match rendered {
        Some(body) => (StatusCode::OK, [(CONTENT_TYPE, PROMETHEUS_CONTENT_TYPE)], body).into_response(),
        None => (StatusCode::NOT_FOUND, "metrics disabled").into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_prometheus_text() {
        let response = metrics_response(Some("booking_admissions_total 3\n".to_string()));
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(CONTENT_TYPE).and_then(|v| v.to_str().ok()),
            Some(PROMETHEUS_CONTENT_TYPE)
        );
    }

    #[test]
    fn disabled_metrics_are_not_found() {
        assert_eq!(metrics_response(None).status(), StatusCode::NOT_FOUND);
    }
}
