//! Text-to-speech synthesis core.
//!
//! Text goes through an acoustic model, the resulting mel spectrogram is
//! squeezed to `(time_steps, feature_width)`, a vocoder turns it into float
//! samples, and the samples are written as a 16-bit mono WAV container. The
//! whole run sits behind a shared-secret [`AuthGate`].

mod auth;
mod bridge;
mod error;
mod melspec;
mod model;
mod pipeline;
mod validation;
mod wav;

pub use auth::{AuthDecision, AuthGate, AuthPolicy};
pub use bridge::{ModelBridge, WireTensor, DEFAULT_LOCK_TIMEOUT};
pub use error::{EncodeError, ErrorKind, ModelStage, SynthesisError};
pub use melspec::{check_feature_width, normalize};
pub use model::{AcousticModel, AcousticOutput, Vocoder, MEL_OUTPUT_SLOT};
pub use pipeline::{
    PipelineConfig, PipelineStage, SynthesisPipeline, SynthesisRequest, SynthesisResult,
};
pub use validation::{validate_text, MAX_TEXT_LENGTH};
pub use wav::{decode_wav, duration_ms, encode_wav, float_to_pcm16, pcm16_to_float};

/// Output sample rate of the vocoder. Fixed for the whole service.
pub const SAMPLE_RATE: u32 = 22_050;
