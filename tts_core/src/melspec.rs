//! Shape repair between acoustic model output and vocoder input.
//!
//! Acoustic models commonly return the mel spectrogram with extra leading
//! singleton axes (a batch axis of size 1, sometimes more). The vocoder wants
//! exactly `(time_steps, feature_width)`, so those axes are squeezed away here.
//! Nothing else is touched: no values change, no axis other than a leading
//! singleton is ever dropped.

use ndarray::{Array2, ArrayD, Axis, Ix2};

use crate::error::SynthesisError;

/// Squeeze leading singleton axes until the tensor is 2-D.
///
/// Fails with `ShapeMismatch` when a non-singleton leading axis blocks the
/// squeeze, or when the input has fewer than two axes to begin with.
pub fn normalize(tensor: ArrayD<f32>) -> Result<Array2<f32>, SynthesisError> {
    let original_shape = tensor.shape().to_vec();
    if tensor.ndim() < 2 {
        return Err(SynthesisError::ShapeMismatch(format!(
            "expected at least 2 dimensions, got shape {:?}",
            original_shape
        )));
    }

    let mut tensor = tensor;
    // Each pass removes one axis, so the rank bounds the loop.
    for _ in 0..original_shape.len() {
        if tensor.ndim() <= 2 || tensor.shape()[0] != 1 {
            break;
        }
        tensor = tensor.index_axis_move(Axis(0), 0);
    }

    if tensor.ndim() != 2 {
        return Err(SynthesisError::ShapeMismatch(format!(
            "cannot reduce shape {:?} to (time_steps, feature_width): leading axis of size {} is not a singleton",
            original_shape,
            tensor.shape()[0]
        )));
    }

    tensor.into_dimensionality::<Ix2>().map_err(|e| {
        SynthesisError::ShapeMismatch(format!("shape {:?}: {e}", original_shape))
    })
}

/// Check the trailing (feature) axis against the width the vocoder was trained on.
pub fn check_feature_width(mel: &Array2<f32>, expected: usize) -> Result<(), SynthesisError> {
    let width = mel.ncols();
    if width != expected {
        return Err(SynthesisError::ShapeMismatch(format!(
            "expected feature width {expected}, got {width} (shape {:?})",
            mel.shape()
        )));
    }
    Ok(())
}
