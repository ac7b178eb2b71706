use serde::Serialize;
use thiserror::Error;

/// Classification of a failed synthesis, reported alongside the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorKind {
    Unauthorized,
    InvalidInput,
    MissingOutputSlot,
    ShapeMismatch,
    ModelFailure,
    EncodingFailure,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Unauthorized => "Unauthorized",
            ErrorKind::InvalidInput => "InvalidInput",
            ErrorKind::MissingOutputSlot => "MissingOutputSlot",
            ErrorKind::ShapeMismatch => "ShapeMismatch",
            ErrorKind::ModelFailure => "ModelFailure",
            ErrorKind::EncodingFailure => "EncodingFailure",
        }
    }

    /// Whether the caller, rather than the service, is at fault.
    pub fn is_client_error(&self) -> bool {
        matches!(self, ErrorKind::Unauthorized | ErrorKind::InvalidInput)
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which model produced a `ModelFailure`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelStage {
    Acoustic,
    Vocoder,
}

impl std::fmt::Display for ModelStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModelStage::Acoustic => f.write_str("acoustic model"),
            ModelStage::Vocoder => f.write_str("vocoder"),
        }
    }
}

/// Failures of the waveform-to-container step.
#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("waveform is empty, refusing to encode zero-length audio")]
    EmptyWaveform,

    #[error("wav write error: {0}")]
    Wav(#[from] hound::Error),
}

/// Terminal failure of one synthesis request.
#[derive(Debug, Error)]
pub enum SynthesisError {
    #[error("Invalid API Key")]
    Unauthorized,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Expected '{slot}' key not found in acoustic model output (available: {available})")]
    MissingOutputSlot { slot: String, available: String },

    #[error("Spectrogram shape mismatch: {0}")]
    ShapeMismatch(String),

    #[error("{stage} error: {source}")]
    ModelFailure {
        stage: ModelStage,
        #[source]
        source: anyhow::Error,
    },

    #[error("Encoding error: {0}")]
    EncodingFailure(#[from] EncodeError),
}

impl SynthesisError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SynthesisError::Unauthorized => ErrorKind::Unauthorized,
            SynthesisError::InvalidInput(_) => ErrorKind::InvalidInput,
            SynthesisError::MissingOutputSlot { .. } => ErrorKind::MissingOutputSlot,
            SynthesisError::ShapeMismatch(_) => ErrorKind::ShapeMismatch,
            SynthesisError::ModelFailure { .. } => ErrorKind::ModelFailure,
            SynthesisError::EncodingFailure(_) => ErrorKind::EncodingFailure,
        }
    }

    pub(crate) fn acoustic(source: anyhow::Error) -> Self {
        SynthesisError::ModelFailure {
            stage: ModelStage::Acoustic,
            source,
        }
    }

    pub(crate) fn vocoder(source: anyhow::Error) -> Self {
        SynthesisError::ModelFailure {
            stage: ModelStage::Vocoder,
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_classification() {
        assert_eq!(SynthesisError::Unauthorized.kind(), ErrorKind::Unauthorized);
        assert_eq!(
            SynthesisError::EncodingFailure(EncodeError::EmptyWaveform).kind(),
            ErrorKind::EncodingFailure
        );
        assert!(ErrorKind::InvalidInput.is_client_error());
        assert!(!ErrorKind::ShapeMismatch.is_client_error());
    }

    #[test]
    fn test_model_failure_preserves_message() {
        let err = SynthesisError::vocoder(anyhow::anyhow!("out of memory"));
        assert_eq!(err.kind(), ErrorKind::ModelFailure);
        assert_eq!(err.to_string(), "vocoder error: out of memory");
    }
}
