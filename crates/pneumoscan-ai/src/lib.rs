//! Inference layer: model loading, image preprocessing, and classification.
//!
//! The ONNX Runtime backend is behind the `onnx` feature; everything else is
//! runtime-agnostic and works against the [`Classifier`] and [`ModelBackend`]
//! capabilities.

mod classifier;
mod engine;
mod error;
mod loader;
mod preprocess;

pub use classifier::{Classifier, ModelBackend};
pub use engine::infer;
pub use error::{ClassifyError, ModelLoadError};
pub use loader::{ModelLoader, ModelState};
pub use preprocess::{ImageTensor, Preprocessor};

#[cfg(feature = "onnx")]
mod onnx;
#[cfg(feature = "onnx")]
pub use onnx::{OnnxBackend, OnnxClassifier};
