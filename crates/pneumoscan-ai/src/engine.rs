//! Single-shot inference over a loaded model.

use std::sync::Arc;
use std::time::Instant;

use pneumoscan_core::InferenceResult;
use tracing::{debug, warn};

use crate::{ClassifyError, ImageTensor, ModelState};

/// Run one forward pass and extract the positive-class probability.
///
/// Fails with [`ClassifyError::ModelNotReady`] unless `model` is `Ready`,
/// even if the caller already checked. The computation runs on the blocking
/// pool; neither `model` nor `tensor` is modified. Failures are returned,
/// never retried.
pub async fn infer(
    model: &ModelState,
    tensor: &ImageTensor,
) -> Result<InferenceResult, ClassifyError> {
    let ModelState::Ready(classifier) = model else {
        return Err(ClassifyError::ModelNotReady(model.status()));
    };

    let expected = classifier.input_shape();
    if tensor.shape() != expected {
        return Err(ClassifyError::InvalidShape(format!(
            "tensor is {}, model expects {expected}",
            tensor.shape()
        )));
    }

    let classifier = Arc::clone(classifier);
    let input = tensor.clone();
    let start = Instant::now();
    let output = tokio::task::spawn_blocking(move || classifier.predict(&input))
        .await
        .map_err(|e| ClassifyError::Inference(format!("inference task aborted: {e}")))?
        .map_err(|e| ClassifyError::Inference(format!("{e:#}")))?;

    let probability = first_probability(&output)?;
    debug!(
        probability,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "inference complete"
    );
    Ok(InferenceResult::new(probability))
}

/// First output value, which must be a probability.
fn first_probability(output: &[f32]) -> Result<f32, ClassifyError> {
    let Some(&p) = output.first() else {
        return Err(ClassifyError::Inference("model produced no output".into()));
    };
    if !p.is_finite() || !(0.0..=1.0).contains(&p) {
        warn!(value = p, "model output is not a probability");
        return Err(ClassifyError::Inference(format!(
            "model output {p} is not a probability in [0, 1]"
        )));
    }
    Ok(p)
}
