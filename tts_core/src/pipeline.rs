//! One synthesis request, from text to WAV bytes.

use std::sync::Arc;
use std::time::Instant;

use serde::Deserialize;
use tracing::{debug, warn};

use crate::auth::{AuthDecision, AuthGate};
use crate::error::SynthesisError;
use crate::melspec::{check_feature_width, normalize};
use crate::model::{AcousticModel, Vocoder, MEL_OUTPUT_SLOT};
use crate::validation::{validate_text, MAX_TEXT_LENGTH};
use crate::{wav, SAMPLE_RATE};

#[derive(Debug, Clone, Deserialize)]
pub struct SynthesisRequest {
    pub text: String,
}

impl SynthesisRequest {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

/// Encoded audio for one request.
#[derive(Debug, Clone)]
pub struct SynthesisResult {
    /// Complete WAV container.
    pub audio: Vec<u8>,
    pub sample_count: usize,
    pub sample_rate: u32,
    pub duration_ms: u64,
}

/// Stages a request moves through. The first failure is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    Received,
    Authorized,
    Synthesized,
    Normalized,
    Vocoded,
    Encoded,
}

impl PipelineStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineStage::Received => "received",
            PipelineStage::Authorized => "authorized",
            PipelineStage::Synthesized => "synthesized",
            PipelineStage::Normalized => "normalized",
            PipelineStage::Vocoded => "vocoded",
            PipelineStage::Encoded => "encoded",
        }
    }
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Expected width of the mel feature axis; `None` skips the check.
    pub mel_channels: Option<usize>,
    pub max_text_length: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            mel_channels: Some(80),
            max_text_length: MAX_TEXT_LENGTH,
        }
    }
}

/// Runs acoustic model, normalizer, vocoder and encoder for a single request.
///
/// Models are shared between every concurrent request and are only read.
pub struct SynthesisPipeline {
    acoustic: Arc<dyn AcousticModel>,
    vocoder: Arc<dyn Vocoder>,
    auth: AuthGate,
    config: PipelineConfig,
}

impl std::fmt::Debug for SynthesisPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SynthesisPipeline")
            .field("acoustic", &"<AcousticModel>")
            .field("vocoder", &"<Vocoder>")
            .field("auth", &self.auth)
            .field("config", &self.config)
            .finish()
    }
}

impl SynthesisPipeline {
    pub fn new(
        acoustic: Arc<dyn AcousticModel>,
        vocoder: Arc<dyn Vocoder>,
        auth: AuthGate,
        config: PipelineConfig,
    ) -> Self {
        Self {
            acoustic,
            vocoder,
            auth,
            config,
        }
    }

    pub fn auth(&self) -> &AuthGate {
        &self.auth
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Authorize, then synthesize. Nothing past the gate runs on denial.
    pub fn handle(
        &self,
        request: &SynthesisRequest,
        credential: Option<&str>,
    ) -> Result<SynthesisResult, SynthesisError> {
        let start = Instant::now();
        let mut stage = PipelineStage::Received;

        let result = self.run(request, credential, &mut stage);
        match &result {
            Ok(out) => debug!(
                samples = out.sample_count,
                bytes = out.audio.len(),
                elapsed_ms = start.elapsed().as_millis() as u64,
                "synthesis delivered"
            ),
            Err(e) if e.kind().is_client_error() => {
                debug!(kind = %e.kind(), last_stage = stage.as_str(), "synthesis rejected: {e}")
            }
            Err(e) => warn!(
                kind = %e.kind(),
                last_stage = stage.as_str(),
                "synthesis failed: {e}"
            ),
        }
        result
    }

    fn run(
        &self,
        request: &SynthesisRequest,
        credential: Option<&str>,
        stage: &mut PipelineStage,
    ) -> Result<SynthesisResult, SynthesisError> {
        if self.auth.authorize(credential) == AuthDecision::Denied {
            return Err(SynthesisError::Unauthorized);
        }
        *stage = PipelineStage::Authorized;

        validate_text(&request.text, self.config.max_text_length)?;

        let mut acoustic = self
            .acoustic
            .predict(&request.text)
            .map_err(SynthesisError::acoustic)?;
        *stage = PipelineStage::Synthesized;
        for (slot, tensor) in acoustic.iter() {
            debug!(slot, shape = ?tensor.shape(), "acoustic output");
        }

        let mel = acoustic
            .take(MEL_OUTPUT_SLOT)
            .ok_or_else(|| SynthesisError::MissingOutputSlot {
                slot: MEL_OUTPUT_SLOT.to_string(),
                available: acoustic.slot_names().collect::<Vec<_>>().join(", "),
            })?;
        let mel = normalize(mel)?;
        if let Some(width) = self.config.mel_channels {
            check_feature_width(&mel, width)?;
        }
        *stage = PipelineStage::Normalized;
        debug!(shape = ?mel.shape(), "normalized spectrogram");

        let waveform = self
            .vocoder
            .synthesize(mel.view())
            .map_err(SynthesisError::vocoder)?;
        *stage = PipelineStage::Vocoded;

        let audio = wav::encode_wav(&waveform, SAMPLE_RATE)?;
        *stage = PipelineStage::Encoded;

        Ok(SynthesisResult {
            audio,
            sample_count: waveform.len(),
            sample_rate: SAMPLE_RATE,
            duration_ms: wav::duration_ms(waveform.len(), SAMPLE_RATE),
        })
    }
}
