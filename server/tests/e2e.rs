//! End-to-end tests for the complete synthesis pipeline
//! Tests: JSON text -> acoustic model -> normalizer -> vocoder -> WAV bytes

mod common;

use axum::{body::Body, http::{Request, StatusCode}};
use tts_core::{decode_wav, pcm16_to_float};

use common::*;

#[tokio::test]
async fn test_complete_tts_pipeline() {
    let (app, acoustic) = create_test_app();
    let (response, body) = send(app, tts_request(r#"{"text":"Hello"}"#, Some(TEST_KEY))).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("content-type").unwrap(),
        "audio/wav"
    );
    assert!(!body.is_empty());

    // "Hello" -> 5 frames -> 5 * 256 samples
    let (samples, spec) = decode_wav(&body).expect("body should be a valid WAV container");
    assert_eq!(spec.sample_rate, 22050);
    assert_eq!(spec.channels, 1);
    assert_eq!(spec.bits_per_sample, 16);
    assert_eq!(samples.len(), 5 * 256);

    // Header sizes agree with the payload.
    let riff_size = u32::from_le_bytes(body[4..8].try_into().unwrap()) as usize;
    assert_eq!(riff_size, body.len() - 8);

    assert_eq!(response.headers().get("x-sample-rate").unwrap(), "22050");
    assert_eq!(response.headers().get("x-duration-ms").unwrap(), "58");
    assert_eq!(acoustic.calls(), 1);
}

#[tokio::test]
async fn test_waveform_survives_fixed_point_conversion() {
    let (app, _) = create_test_app();
    let (response, body) = send(app, tts_request(r#"{"text":"Hi"}"#, Some(TEST_KEY))).await;
    assert_eq!(response.status(), StatusCode::OK);

    let (samples, _) = decode_wav(&body).unwrap();
    let lsb = 1.0 / i16::MAX as f32;
    for (i, pcm) in samples.iter().enumerate() {
        let expected = (i as f32 * 440.0 * std::f32::consts::TAU / 22050.0).sin() * 0.5;
        assert!((pcm16_to_float(*pcm) - expected).abs() <= lsb);
    }
}

#[tokio::test]
async fn test_pipeline_under_api_prefix() {
    let (app, _) = create_test_app();
    let request = Request::builder()
        .method("POST")
        .uri("/api/text-to-speech")
        .header("content-type", "application/json")
        .header("Authorization", TEST_KEY)
        .body(Body::from(r#"{"text":"Prefixed"}"#))
        .unwrap();
    let (response, body) = send(app, request).await;

    assert_eq!(response.status(), StatusCode::OK);
    let (samples, _) = decode_wav(&body).unwrap();
    assert_eq!(samples.len(), 8 * 256);
}

#[tokio::test]
async fn test_concurrent_requests_share_models() {
    let (app, acoustic) = create_test_app();
    let texts = ["one", "three", "sixteen characte"];

    let handles: Vec<_> = texts
        .iter()
        .map(|text| {
            let app = app.clone();
            let body = format!(r#"{{"text":"{text}"}}"#);
            tokio::spawn(async move { send(app, tts_request(&body, Some(TEST_KEY))).await })
        })
        .collect();

    for (text, handle) in texts.iter().zip(handles) {
        let (response, body) = handle.await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let (samples, _) = decode_wav(&body).unwrap();
        assert_eq!(samples.len(), text.chars().count() * 256);
    }
    assert_eq!(acoustic.calls(), texts.len());
}
