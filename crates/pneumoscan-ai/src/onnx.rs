//! ONNX Runtime backend for the pneumonia classifier.
//!
//! The artifact is a single `.onnx` file whose first input takes a
//! `[1, H, W, 1]` float tensor and whose first output holds the positive-class
//! probability (sigmoid already applied).

use std::path::Path;
use std::sync::Mutex;

use ort::session::Session;
use ort::value::Tensor;
use pneumoscan_core::InputShape;
use tracing::info;

use crate::{Classifier, ImageTensor, ModelBackend};

/// Builds [`OnnxClassifier`]s from artifact bytes.
#[derive(Debug, Default, Clone, Copy)]
pub struct OnnxBackend;

impl ModelBackend for OnnxBackend {
    fn instantiate(
        &self,
        artifact: &[u8],
        shape: InputShape,
    ) -> anyhow::Result<Box<dyn Classifier>> {
        Ok(Box::new(OnnxClassifier::from_bytes(artifact, shape)?))
    }
}

/// A binary image classifier running on ONNX Runtime.
///
/// `Session::run` needs exclusive access, so the session sits behind a mutex;
/// concurrent predictions are serialized.
pub struct OnnxClassifier {
    session: Mutex<Session>,
    input_name: String,
    shape: InputShape,
}

impl OnnxClassifier {
    /// Load a model from an `.onnx` file on disk.
    pub fn load(model_path: &Path, shape: InputShape) -> anyhow::Result<Self> {
        anyhow::ensure!(model_path.exists(), "model not found at {model_path:?}");
        let session = Session::builder()?.commit_from_file(model_path)?;
        Self::from_session(session, shape, &model_path.display().to_string())
    }

    /// Load a model from serialized ONNX bytes.
    pub fn from_bytes(artifact: &[u8], shape: InputShape) -> anyhow::Result<Self> {
        let session = Session::builder()?.commit_from_memory(artifact)?;
        Self::from_session(session, shape, "<memory>")
    }

    fn from_session(session: Session, shape: InputShape, origin: &str) -> anyhow::Result<Self> {
        let input = session
            .inputs()
            .first()
            .ok_or_else(|| anyhow::anyhow!("model declares no inputs"))?;
        let input_name = input.name().to_string();

        // Models exported with a fixed input size must match the configured one.
        if let Some(declared) = declared_dims(input.dtype()) {
            anyhow::ensure!(
                shape.accepts(&declared),
                "model input '{input_name}' has shape {declared:?}, configured for {shape}"
            );
        }
        anyhow::ensure!(!session.outputs().is_empty(), "model declares no outputs");

        info!(input = %input_name, %shape, model = origin, "loaded ONNX classifier");
        Ok(Self {
            session: Mutex::new(session),
            input_name,
            shape,
        })
    }
}

impl Classifier for OnnxClassifier {
    fn input_shape(&self) -> InputShape {
        self.shape
    }

    fn predict(&self, input: &ImageTensor) -> anyhow::Result<Vec<f32>> {
        let dims = input.dims().map(|d| d as i64);
        let tensor = Tensor::from_array((dims, input.as_slice().to_vec().into_boxed_slice()))?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| anyhow::anyhow!("ONNX session lock poisoned"))?;
        let outputs = session.run(ort::inputs![self.input_name.as_str() => tensor])?;

        let (_, data) = outputs[0].try_extract_tensor::<f32>()?;
        Ok(data.to_vec())
    }

    fn describe(&self) -> String {
        format!("onnx '{}' {}", self.input_name, self.shape)
    }
}

/// Input dimensions declared by the model, with `-1` for dynamic axes.
fn declared_dims(input_type: &ort::value::ValueType) -> Option<Vec<i64>> {
    match input_type {
        ort::value::ValueType::Tensor { shape, .. } => Some(shape.iter().copied().collect()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn model_path() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("..")
            .join("..")
            .join("models")
            .join("covid-pneumonia")
            .join("model.onnx")
    }

    #[test]
    fn garbage_bytes_fail_to_load() {
        assert!(OnnxClassifier::from_bytes(b"not an onnx model", InputShape::square(200)).is_err());
    }

    #[test]
    fn missing_file_fails_to_load() {
        let err = OnnxClassifier::load(Path::new("/nonexistent/model.onnx"), InputShape::square(200));
        assert!(err.is_err());
    }

    #[test]
    #[ignore = "needs models/covid-pneumonia/model.onnx"]
    fn predicts_probability_for_blank_image() {
        let shape = InputShape::square(200);
        let model = OnnxClassifier::load(&model_path(), shape).unwrap();
        let input = ImageTensor::new(shape, vec![0.0; shape.len()]).unwrap();
        let output = model.predict(&input).unwrap();
        assert!(!output.is_empty());
        assert!((0.0..=1.0).contains(&output[0]));
    }

    #[test]
    #[ignore = "needs models/covid-pneumonia/model.onnx"]
    fn rejects_wrong_configured_size() {
        assert!(OnnxClassifier::load(&model_path(), InputShape::square(224)).is_err());
    }
}
