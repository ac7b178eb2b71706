pub mod config;
pub mod error;
pub mod metrics;

use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{rejection::JsonRejection, DefaultBodyLimit, Request, State},
    http::{header, HeaderMap, HeaderName, HeaderValue, Method, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use tower::ServiceBuilder;
use tower_governor::{governor::GovernorConfigBuilder, key_extractor::GlobalKeyExtractor, GovernorLayer};
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer};
use tracing::{debug, info, warn};

use tts_core::{AuthDecision, SynthesisError, SynthesisPipeline, SynthesisRequest};

use crate::config::ServerConfig;
use crate::error::ApiError;
use crate::metrics::{system_metrics, AppMetrics, DetailedMetricsResponse, EndpointMetricsResponse};

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<SynthesisPipeline>,
    pub metrics: AppMetrics,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    pub fn new(pipeline: SynthesisPipeline, config: ServerConfig) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            metrics: AppMetrics::new(),
            config: Arc::new(config),
        }
    }
}

/// Build the full application router with its middleware stack.
pub fn build_router(state: AppState) -> anyhow::Result<Router> {
    let config = state.config.clone();

    // CORS configuration - environment-aware
    let cors = match config.cors_allowed_origins.as_deref() {
        Some(allowed) if !allowed.is_empty() => {
            let origins: Vec<HeaderValue> = allowed
                .iter()
                .filter_map(|origin| origin.parse::<HeaderValue>().ok())
                .collect();
            info!("CORS configured for {} origin(s)", origins.len());
            CorsLayer::new().allow_origin(tower_http::cors::AllowOrigin::list(origins))
        }
        _ => {
            warn!("CORS_ALLOWED_ORIGINS not set, allowing all origins (development mode)");
            CorsLayer::new().allow_origin(tower_http::cors::Any)
        }
    }
    .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
    .allow_headers(tower_http::cors::Any)
    .allow_credentials(false);

    // Global rate limit: all callers share one bucket, which also behaves
    // behind proxies where peer addresses are meaningless.
    let per_minute = config.rate_limit_per_minute.max(1);
    let governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_millisecond((60_000 / per_minute).max(1) as u64)
            .burst_size(per_minute)
            .key_extractor(GlobalKeyExtractor)
            .finish()
            .ok_or_else(|| anyhow::anyhow!("invalid rate limit configuration"))?,
    );
    info!("Rate limiting: {} requests per minute", per_minute);

    let middleware_stack = ServiceBuilder::new()
        .layer(TraceLayer::new_for_http())
        .layer(GovernorLayer::new(governor_conf))
        .layer(TimeoutLayer::new(config.request_timeout()))
        .layer(cors)
        .into_inner();

    let api = Router::new()
        .route("/health", get(health_check))
        .route("/healthz", get(health_check))
        .route("/metrics", get(metrics_endpoint))
        .route("/text-to-speech", post(text_to_speech));

    Ok(Router::new()
        .merge(api.clone()) // root paths
        .nest("/api", api) // /api prefix
        .layer(DefaultBodyLimit::max(config.max_body_bytes))
        .layer(axum::middleware::from_fn(add_request_id))
        .layer(middleware_stack)
        .with_state(state))
}

// Request ID middleware for tracing
async fn add_request_id(mut request: Request, next: Next) -> Response {
    let request_id = HeaderValue::from_str(&uuid::Uuid::new_v4().to_string())
        .unwrap_or_else(|_| HeaderValue::from_static("unknown"));
    request
        .headers_mut()
        .insert("x-request-id", request_id.clone());
    let mut response = next.run(request).await;
    response.headers_mut().insert("x-request-id", request_id);
    response
}

pub async fn health_check() -> &'static str {
    "ok"
}

pub async fn metrics_endpoint(State(state): State<AppState>) -> Json<DetailedMetricsResponse> {
    let metrics = &state.metrics;
    Json(DetailedMetricsResponse {
        timestamp: chrono::Utc::now(),
        system: system_metrics(metrics.uptime_seconds()),
        endpoints: EndpointMetricsResponse {
            text_to_speech: metrics.text_to_speech.stats(),
        },
        synthesis: metrics.synthesis.summary(),
    })
}

pub async fn text_to_speech(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<SynthesisRequest>, JsonRejection>,
) -> Response {
    let start = Instant::now();
    let result = synthesize(&state, &headers, payload).await;
    let latency_ms = start.elapsed().as_millis() as u64;

    let endpoint = &state.metrics.text_to_speech;
    endpoint.record_request(latency_ms);
    match result {
        Ok(response) => response,
        Err(e) => {
            endpoint.record_error();
            state.metrics.synthesis.record_failure(e.kind());
            e.into_response_with_detail(state.config.expose_error_details)
        }
    }
}

async fn synthesize(
    state: &AppState,
    headers: &HeaderMap,
    payload: Result<Json<SynthesisRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let credential = headers
        .get(state.config.auth_header.as_str())
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    // A malformed body from an unauthenticated caller is still a 401.
    let Json(request) = match payload {
        Ok(json) => json,
        Err(rejection) => {
            if state.pipeline.auth().authorize(credential.as_deref()) == AuthDecision::Denied {
                return Err(SynthesisError::Unauthorized.into());
            }
            if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
                return Err(ApiError::PayloadTooLarge(state.config.max_body_bytes));
            }
            return Err(ApiError::InvalidInput(rejection.body_text()));
        }
    };
    debug!(chars = request.text.chars().count(), "text-to-speech request");

    let pipeline = state.pipeline.clone();
    let started = Instant::now();
    let timeout = state.config.synthesis_timeout();
    let outcome = tokio::time::timeout(
        timeout,
        tokio::task::spawn_blocking(move || pipeline.handle(&request, credential.as_deref())),
    )
    .await;

    let result = match outcome {
        Ok(Ok(Ok(result))) => result,
        Ok(Ok(Err(e))) => return Err(e.into()),
        Ok(Err(join_err)) => {
            return Err(ApiError::InternalError(format!("Task join error: {join_err}")))
        }
        Err(_) => return Err(ApiError::Timeout(timeout.as_secs())),
    };

    let elapsed_ms = started.elapsed().as_millis() as u64;
    state
        .metrics
        .synthesis
        .record_synthesis(elapsed_ms, result.sample_count);
    info!(
        samples = result.sample_count,
        duration_ms = result.duration_ms,
        elapsed_ms,
        "synthesized speech"
    );

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, HeaderValue::from_static("audio/wav")),
            (
                HeaderName::from_static("x-sample-rate"),
                HeaderValue::from(result.sample_rate),
            ),
            (
                HeaderName::from_static("x-duration-ms"),
                HeaderValue::from(result.duration_ms),
            ),
        ],
        result.audio,
    )
        .into_response())
}
