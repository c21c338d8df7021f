//! Runtime capabilities the pipeline is built on.
//!
//! A [`ModelBackend`] turns artifact bytes into a [`Classifier`]; a
//! [`Classifier`] runs a forward pass over one `[1, H, W, 1]` tensor. The
//! ONNX Runtime implementation lives in `onnx` behind the `onnx` feature.

use pneumoscan_core::InputShape;

use crate::ImageTensor;

/// A loaded binary image classifier.
///
/// `predict` is called from the blocking pool and must not keep state
/// between calls that would make results depend on call order.
pub trait Classifier: Send + Sync {
    /// Input geometry the model was built for.
    fn input_shape(&self) -> InputShape;

    /// Run the forward pass and return the raw output values.
    fn predict(&self, input: &ImageTensor) -> anyhow::Result<Vec<f32>>;

    /// Short description for logs, e.g. the artifact name.
    fn describe(&self) -> String {
        format!("classifier {}", self.input_shape())
    }
}

/// Instantiates classifiers from serialized artifacts.
pub trait ModelBackend: Send + Sync {
    /// Parse `artifact` into a classifier expecting `shape`.
    ///
    /// Implementations should fail if the artifact declares an input shape
    /// that `shape` does not accept.
    fn instantiate(
        &self,
        artifact: &[u8],
        shape: InputShape,
    ) -> anyhow::Result<Box<dyn Classifier>>;
}
