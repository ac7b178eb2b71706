//! Common utilities for integration tests

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::{to_bytes, Body},
    http::{Request, Response},
    Router,
};
use ndarray::{Array, ArrayView2, IxDyn};
use server::{build_router, config::ServerConfig, AppState};
use tower::ServiceExt;
use tts_core::{
    AcousticModel, AcousticOutput, AuthGate, SynthesisPipeline, Vocoder, MEL_OUTPUT_SLOT,
};

pub const TEST_KEY: &str = "test-auth-key";

/// Acoustic model stand-in: a `(1, batch, frames, 80)` mel with one frame per character.
pub struct MockAcoustic {
    pub calls: AtomicUsize,
    pub slot: &'static str,
    pub batch: usize,
    pub failure: Option<&'static str>,
}

impl MockAcoustic {
    pub fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            slot: MEL_OUTPUT_SLOT,
            batch: 1,
            failure: None,
        }
    }

    pub fn without_mel_slot() -> Self {
        Self {
            slot: "decoder-output",
            ..Self::new()
        }
    }

    /// Two utterances in one output, which the normalizer cannot squeeze.
    pub fn batched() -> Self {
        Self {
            batch: 2,
            ..Self::new()
        }
    }

    pub fn failing(message: &'static str) -> Self {
        Self {
            failure: Some(message),
            ..Self::new()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl AcousticModel for MockAcoustic {
    fn predict(&self, text: &str) -> anyhow::Result<AcousticOutput> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = self.failure {
            anyhow::bail!("{message}");
        }
        let frames = text.chars().count();
        Ok(AcousticOutput::new().with_slot(
            self.slot,
            Array::from_elem(IxDyn(&[1, self.batch, frames, 80]), -4.0f32),
        ))
    }
}

/// Vocoder stand-in: 256 samples of a sine per frame, optionally slow.
pub struct MockVocoder {
    pub delay: Option<Duration>,
}

impl Vocoder for MockVocoder {
    fn synthesize(&self, mel: ArrayView2<'_, f32>) -> anyhow::Result<Vec<f32>> {
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }
        let n = mel.nrows() * 256;
        Ok((0..n)
            .map(|i| (i as f32 * 440.0 * std::f32::consts::TAU / 22050.0).sin() * 0.5)
            .collect())
    }
}

pub fn test_config() -> ServerConfig {
    ServerConfig {
        auth_required: true,
        auth_key: Some(TEST_KEY.to_string()),
        rate_limit_per_minute: 600,
        ..ServerConfig::default()
    }
}

/// Create a test app instance around the given models and configuration
pub fn create_app_with(
    acoustic: Arc<MockAcoustic>,
    vocoder: MockVocoder,
    config: ServerConfig,
) -> Router {
    let pipeline = SynthesisPipeline::new(
        acoustic,
        Arc::new(vocoder),
        AuthGate::new(config.auth_policy()),
        config.pipeline_config(),
    );
    build_router(AppState::new(pipeline, config)).expect("router should build")
}

/// Create a test app with working models and authentication required
pub fn create_test_app() -> (Router, Arc<MockAcoustic>) {
    let acoustic = Arc::new(MockAcoustic::new());
    let app = create_app_with(acoustic.clone(), MockVocoder { delay: None }, test_config());
    (app, acoustic)
}

pub fn tts_request(body: &str, key: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/text-to-speech")
        .header("content-type", "application/json");
    if let Some(key) = key {
        builder = builder.header("Authorization", key);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

pub async fn send(app: Router, request: Request<Body>) -> (Response<Body>, Vec<u8>) {
    let response = app.oneshot(request).await.unwrap();
    let (parts, body) = response.into_parts();
    let bytes = to_bytes(body, usize::MAX).await.unwrap().to_vec();
    (Response::from_parts(parts, Body::empty()), bytes)
}
