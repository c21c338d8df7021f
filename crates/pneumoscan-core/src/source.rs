//! Image sources: normalizes an uploaded file or a URL string into an [`ImageHandle`].
//!
//! Uploaded bytes live in a reference-counted buffer shared by every handle
//! that points at them (the current image and any history entries). The
//! buffer is freed as soon as the last of those handles is dropped.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("invalid image source: {0}")]
    InvalidSource(String),

    #[error("could not read {path}: {source}")]
    Read {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Where an image came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageOrigin {
    Uploaded,
    RemoteUrl,
}

/// A file picked by the user, as handed over by the file-picker.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub name: String,
    /// MIME type reported by the picker, if any.
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl UploadedFile {
    pub fn new(name: impl Into<String>, content_type: Option<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            content_type,
            bytes,
        }
    }

    /// Read a local file, guessing its content type from the extension.
    pub async fn from_path(path: &Path) -> Result<Self, SourceError> {
        let bytes = tokio::fs::read(path).await.map_err(|source| SourceError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let content_type = image::ImageFormat::from_path(path)
            .ok()
            .map(|f| f.to_mime_type().to_string());
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self::new(name, content_type, bytes))
    }
}

/// Raw user input from either of the two entry points.
#[derive(Debug, Clone)]
pub enum ImageInput {
    /// The file-picker selection. May be empty when the user cancels.
    Upload(Vec<UploadedFile>),
    /// Free-text URL field.
    Url(String),
}

/// Bytes of an uploaded image plus the name it was picked under.
#[derive(Clone)]
pub struct UploadedImage {
    name: String,
    bytes: Arc<[u8]>,
}

impl UploadedImage {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl fmt::Debug for UploadedImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadedImage")
            .field("name", &self.name)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// Reference to image data plus its origin.
///
/// Handles are never mutated: a new selection produces a new handle. Two
/// uploaded handles are equal only when they share the same byte buffer, so
/// uploading the same file twice yields two distinct handles.
#[derive(Debug, Clone)]
pub enum ImageHandle {
    Uploaded(UploadedImage),
    Remote(String),
}

impl ImageHandle {
    pub fn remote(url: impl Into<String>) -> Self {
        Self::Remote(url.into())
    }

    pub fn uploaded(name: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        Self::Uploaded(UploadedImage {
            name: name.into(),
            bytes: bytes.into(),
        })
    }

    pub fn origin(&self) -> ImageOrigin {
        match self {
            Self::Uploaded(_) => ImageOrigin::Uploaded,
            Self::Remote(_) => ImageOrigin::RemoteUrl,
        }
    }

    /// Human-readable locator shown by the display layer.
    pub fn locator(&self) -> String {
        match self {
            Self::Uploaded(img) => format!("upload:{}", img.name),
            Self::Remote(url) => url.clone(),
        }
    }
}

impl PartialEq for ImageHandle {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Uploaded(a), Self::Uploaded(b)) => Arc::ptr_eq(&a.bytes, &b.bytes),
            (Self::Remote(a), Self::Remote(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for ImageHandle {}

impl fmt::Display for ImageHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.locator())
    }
}

/// Serializable view of a handle for snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageView {
    pub origin: ImageOrigin,
    pub locator: String,
}

impl From<&ImageHandle> for ImageView {
    fn from(handle: &ImageHandle) -> Self {
        Self {
            origin: handle.origin(),
            locator: handle.locator(),
        }
    }
}

/// Normalize user input into a handle.
///
/// `Ok(None)` means the selection is empty and the current image should be
/// cleared. URLs are passed through without checking the remote resource;
/// problems there surface when the image is decoded.
pub fn resolve(input: ImageInput) -> Result<Option<ImageHandle>, SourceError> {
    match input {
        ImageInput::Upload(files) => {
            let Some(file) = files.into_iter().next() else {
                return Ok(None);
            };
            if file.bytes.is_empty() {
                return Err(SourceError::InvalidSource(format!(
                    "uploaded file '{}' is empty",
                    file.name
                )));
            }
            if let Some(ct) = &file.content_type
                && !ct.starts_with("image/")
            {
                return Err(SourceError::InvalidSource(format!(
                    "uploaded file '{}' has content type {ct}, expected image/*",
                    file.name
                )));
            }
            debug!(name = %file.name, len = file.bytes.len(), "resolved uploaded image");
            Ok(Some(ImageHandle::uploaded(file.name, file.bytes)))
        }
        ImageInput::Url(url) => {
            let url = url.trim();
            if url.is_empty() {
                return Ok(None);
            }
            debug!(url, "resolved remote image");
            Ok(Some(ImageHandle::remote(url)))
        }
    }
}
