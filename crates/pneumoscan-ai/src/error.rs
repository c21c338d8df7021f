use pneumoscan_core::ModelStatus;
use thiserror::Error;

/// Failures of a single identify request.
///
/// Model load failures are not in here: the loader records them as
/// `ModelState::Failed` instead of returning them.
#[derive(Debug, Error)]
pub enum ClassifyError {
    #[error("could not decode image {source_name}: {reason}")]
    Decode { source_name: String, reason: String },

    #[error("model is not ready (state: {0})")]
    ModelNotReady(ModelStatus),

    #[error("inference failed: {0}")]
    Inference(String),

    #[error("tensor shape mismatch: {0}")]
    InvalidShape(String),
}

impl ClassifyError {
    pub(crate) fn decode(source_name: impl Into<String>, reason: impl ToString) -> Self {
        Self::Decode {
            source_name: source_name.into(),
            reason: reason.to_string(),
        }
    }
}

/// Why a model load ended in `ModelState::Failed`.
#[derive(Debug, Error)]
pub enum ModelLoadError {
    #[error("fetching model artifact: {0}")]
    Fetch(#[from] pneumoscan_fetch::FetchError),

    #[error("instantiating model: {0:#}")]
    Instantiate(anyhow::Error),

    #[error("model expects input {actual}, configured for {expected}")]
    ShapeMismatch {
        expected: pneumoscan_core::InputShape,
        actual: pneumoscan_core::InputShape,
    },

    #[error("model load task aborted: {0}")]
    Aborted(String),
}
