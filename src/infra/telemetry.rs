use std::sync::Once;

use axum::{
    Router,
    extract::State,
    http::{HeaderValue, header::CONTENT_TYPE},
    response::{IntoResponse, Response},
    routing::get,
};
use metrics::{Unit, describe_counter, describe_gauge, describe_histogram, gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::{
    application::observer::{
        METRIC_ARTIFACT_BYTES, METRIC_LETTERS_FAILED, METRIC_LETTERS_GENERATED,
        METRIC_LETTERS_REQUESTED, METRIC_RENDER_DURATION_MS,
    },
    config::{LogFormat, LoggingSettings},
};

use super::error::InfraError;

pub const METRIC_HTTP_REQUESTS: &str = "letter_generator_http_requests_total";
pub const METRIC_HTTP_REQUEST_DURATION: &str = "letter_generator_http_request_duration_seconds";
pub const METRIC_HTTP_IN_FLIGHT: &str = "letter_generator_http_requests_in_flight";
pub const METRIC_HTTP_RESPONSE_SIZE: &str = "letter_generator_http_response_size_bytes";
pub const METRIC_BUILD_INFO: &str = "letter_generator_build_info";

const PROMETHEUS_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Install a global tracing subscriber using the provided logging settings.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .boxed(),
        LogFormat::Compact => fmt::layer().compact().with_target(true).boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(ErrorLayer::default())
        .with(fmt_layer)
        .try_init()
        .map_err(|err| {
            InfraError::telemetry(format!("failed to install tracing subscriber: {err}"))
        })
}

/// Install the Prometheus recorder as the global `metrics` recorder.
///
/// Must run before [`init`] so metric descriptions reach the exporter.
pub fn install_metrics_exporter() -> Result<PrometheusHandle, InfraError> {
    PrometheusBuilder::new().install_recorder().map_err(|err| {
        InfraError::telemetry(format!("failed to install metrics exporter: {err}"))
    })
}

/// Router serving the text exposition format on `GET /metrics`.
pub fn metrics_router(handle: PrometheusHandle) -> Router {
    Router::new()
        .route("/metrics", get(render_metrics))
        .with_state(handle)
}

async fn render_metrics(State(handle): State<PrometheusHandle>) -> Response {
    let mut response = handle.render().into_response();
    response.headers_mut().insert(
        CONTENT_TYPE,
        HeaderValue::from_static(PROMETHEUS_CONTENT_TYPE),
    );
    response
}

/// Publish the running version as a constant `1` gauge.
pub fn record_build_info() {
    gauge!(METRIC_BUILD_INFO, "version" => env!("CARGO_PKG_VERSION")).set(1.0);
}

fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            METRIC_HTTP_REQUESTS,
            Unit::Count,
            "Total number of HTTP requests by method and status code."
        );
        describe_histogram!(
            METRIC_HTTP_REQUEST_DURATION,
            Unit::Seconds,
            "HTTP request latency in seconds by handler and method."
        );
        describe_gauge!(
            METRIC_HTTP_IN_FLIGHT,
            Unit::Count,
            "Number of HTTP requests currently being served."
        );
        describe_histogram!(
            METRIC_HTTP_RESPONSE_SIZE,
            Unit::Bytes,
            "HTTP response body size in bytes by handler and method."
        );
        describe_gauge!(
            METRIC_BUILD_INFO,
            Unit::Count,
            "Build information, labelled with the crate version."
        );
        describe_counter!(
            METRIC_LETTERS_REQUESTED,
            Unit::Count,
            "Total number of letter generation requests."
        );
        describe_counter!(
            METRIC_LETTERS_GENERATED,
            Unit::Count,
            "Total number of letters rendered successfully."
        );
        describe_counter!(
            METRIC_LETTERS_FAILED,
            Unit::Count,
            "Total number of failed letter requests by pipeline stage."
        );
        describe_histogram!(
            METRIC_RENDER_DURATION_MS,
            Unit::Milliseconds,
            "End-to-end letter rendering latency in milliseconds."
        );
        describe_histogram!(
            METRIC_ARTIFACT_BYTES,
            Unit::Bytes,
            "Size of generated PDF documents in bytes."
        );
    });
}
