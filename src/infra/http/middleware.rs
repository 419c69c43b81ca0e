use std::time::Instant;

use axum::{
    body::{Body, HttpBody},
    extract::MatchedPath,
    http::Request,
    middleware::Next,
    response::Response,
};
use metrics::{counter, gauge, histogram};
use tracing::{error, warn};
use uuid::Uuid;

use crate::{
    application::error::ErrorReport,
    infra::telemetry::{
        METRIC_HTTP_IN_FLIGHT, METRIC_HTTP_REQUEST_DURATION, METRIC_HTTP_REQUESTS,
        METRIC_HTTP_RESPONSE_SIZE,
    },
};

#[derive(Clone)]
pub struct RequestContext {
    pub request_id: String,
}

pub async fn set_request_context(mut request: Request<Body>, next: Next) -> Response {
    let request_id = Uuid::new_v4().to_string();
    let ctx = RequestContext {
        request_id: request_id.clone(),
    };
    request.extensions_mut().insert(ctx.clone());

    let mut response = next.run(request).await;
    response.extensions_mut().insert(ctx);
    response
}

/// Holds one unit of the in-flight gauge until dropped, including when the
/// request future is cancelled mid-flight.
struct InFlightGuard;

impl InFlightGuard {
    fn new() -> Self {
        gauge!(METRIC_HTTP_IN_FLIGHT).increment(1.0);
        Self
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        gauge!(METRIC_HTTP_IN_FLIGHT).decrement(1.0);
    }
}

/// Request counters, latency and response size, labelled by the matched route.
///
/// Installed with `route_layer` so that `MatchedPath` is available.
pub async fn track_metrics(request: Request<Body>, next: Next) -> Response {
    let method = request.method().to_string();
    let handler = request
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());
    let start = Instant::now();

    let in_flight = InFlightGuard::new();
    let response = next.run(request).await;
    drop(in_flight);

    counter!(
        METRIC_HTTP_REQUESTS,
        "method" => method.clone(),
        "code" => response.status().as_u16().to_string()
    )
    .increment(1);
    histogram!(
        METRIC_HTTP_REQUEST_DURATION,
        "handler" => handler.clone(),
        "method" => method.clone()
    )
    .record(start.elapsed().as_secs_f64());

    // Streaming bodies without a known length are not sized.
    if let Some(bytes) = response.body().size_hint().exact() {
        histogram!(
            METRIC_HTTP_RESPONSE_SIZE,
            "handler" => handler,
            "method" => method
        )
        .record(bytes as f64);
    }

    response
}

pub async fn log_responses(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = Instant::now();

    let request_id = request
        .extensions()
        .get::<RequestContext>()
        .map(|ctx| ctx.request_id.clone())
        .unwrap_or_default();

    let mut response = next.run(request).await;
    let status = response.status();

    if status.is_client_error() || status.is_server_error() {
        let elapsed_ms = start.elapsed().as_millis();
        let report = response.extensions_mut().remove::<ErrorReport>();
        let (source, messages) = match report {
            Some(report) => (report.source, report.messages),
            None => ("unknown", Vec::new()),
        };
        let detail = messages
            .first()
            .cloned()
            .unwrap_or_else(|| "no diagnostic available".to_string());

        if status.is_server_error() {
            error!(
                target = "letter_generator::http::response",
                status = status.as_u16(),
                method = %method,
                path = %uri.path(),
                elapsed_ms = elapsed_ms,
                source = source,
                detail = %detail,
                chain = ?messages,
                request_id = request_id,
                "request failed",
            );
        } else {
            warn!(
                target = "letter_generator::http::response",
                status = status.as_u16(),
                method = %method,
                path = %uri.path(),
                elapsed_ms = elapsed_ms,
                source = source,
                detail = %detail,
                chain = ?messages,
                request_id = request_id,
                "client request error",
            );
        }
    }

    response
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use axum::{Router, middleware, routing::get};
    use metrics_util::debugging::{DebugValue, DebuggingRecorder, Snapshotter};
    use tower::ServiceExt;

    use super::*;

    fn in_flight(snapshotter: &Snapshotter) -> Option<f64> {
        snapshotter
            .snapshot()
            .into_vec()
            .into_iter()
            .find(|(key, _, _, _)| key.key().name() == METRIC_HTTP_IN_FLIGHT)
            .and_then(|(_, _, _, value)| match value {
                DebugValue::Gauge(value) => Some(value.into_inner()),
                _ => None,
            })
    }

    #[tokio::test]
    async fn cancelled_request_releases_in_flight_gauge() {
        let recorder = DebuggingRecorder::new();
        let snapshotter = recorder.snapshotter();
        let _guard = metrics::set_default_local_recorder(&recorder);

        let app = Router::new()
            .route("/slow", get(std::future::pending::<&'static str>))
            .route_layer(middleware::from_fn(track_metrics));
        let request = Request::builder()
            .uri("/slow")
            .body(Body::empty())
            .expect("request should build");

        let outcome = tokio::time::timeout(Duration::from_millis(50), app.oneshot(request)).await;
        assert!(outcome.is_err(), "handler should never complete");

        assert_eq!(in_flight(&snapshotter), Some(0.0));
    }

    #[tokio::test]
    async fn completed_request_records_response_size() {
        let recorder = DebuggingRecorder::new();
        let snapshotter = recorder.snapshotter();
        let _guard = metrics::set_default_local_recorder(&recorder);

        let app = Router::new()
            .route("/hello", get(|| async { "hello" }))
            .route_layer(middleware::from_fn(track_metrics));
        let request = Request::builder()
            .uri("/hello")
            .body(Body::empty())
            .expect("request should build");
        app.oneshot(request).await.expect("router should respond");

        let snapshot = snapshotter.snapshot().into_vec();
        let sizes: Vec<f64> = snapshot
            .iter()
            .filter(|(key, _, _, _)| key.key().name() == METRIC_HTTP_RESPONSE_SIZE)
            .flat_map(|(_, _, _, value)| match value {
                DebugValue::Histogram(values) => {
                    values.iter().map(|value| value.into_inner()).collect()
                }
                _ => Vec::new(),
            })
            .collect();
        assert_eq!(sizes, vec![5.0]);
        assert_eq!(in_flight(&snapshotter), Some(0.0));
    }
}
