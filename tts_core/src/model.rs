//! Interfaces to the acoustic model and vocoder.
//!
//! Both models are opaque collaborators: they are loaded once at startup,
//! shared read-only between requests, and only ever reached through these
//! traits. Any thread-safety the underlying runtime needs is the
//! implementation's own business.

use std::collections::BTreeMap;

use ndarray::{ArrayD, ArrayView2};

/// Slot name under which the acoustic model returns its mel spectrogram.
pub const MEL_OUTPUT_SLOT: &str = "mel-output";

/// Named tensors produced by one acoustic model prediction.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AcousticOutput {
    slots: BTreeMap<String, ArrayD<f32>>,
}

impl AcousticOutput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_slot(mut self, name: impl Into<String>, tensor: ArrayD<f32>) -> Self {
        self.insert(name, tensor);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, tensor: ArrayD<f32>) {
        self.slots.insert(name.into(), tensor);
    }

    /// Remove a slot, handing ownership of the tensor to the caller.
    pub fn take(&mut self, name: &str) -> Option<ArrayD<f32>> {
        self.slots.remove(name)
    }

    pub fn slot_names(&self) -> impl Iterator<Item = &str> {
        self.slots.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ArrayD<f32>)> {
        self.slots.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl FromIterator<(String, ArrayD<f32>)> for AcousticOutput {
    fn from_iter<I: IntoIterator<Item = (String, ArrayD<f32>)>>(iter: I) -> Self {
        Self {
            slots: iter.into_iter().collect(),
        }
    }
}

/// Text to acoustic features.
pub trait AcousticModel: Send + Sync {
    fn predict(&self, text: &str) -> anyhow::Result<AcousticOutput>;
}

/// Mel spectrogram `(time_steps, feature_width)` to waveform samples.
pub trait Vocoder: Send + Sync {
    fn synthesize(&self, mel: ArrayView2<'_, f32>) -> anyhow::Result<Vec<f32>>;
}
