pub mod config;
pub mod model;
pub mod result;
pub mod source;

pub use config::{ConfigError, PixelScale, SessionConfig};
pub use model::{InputShape, ModelStatus};
pub use result::{HistoryEntry, HistoryView, InferenceResult};
pub use source::{
    ImageHandle, ImageInput, ImageOrigin, ImageView, SourceError, UploadedFile, UploadedImage,
    resolve,
};
