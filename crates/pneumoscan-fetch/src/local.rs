//! Local file reads for `file://` URIs and bare paths.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::FetchError;

/// Map `file:///abs/path` or a bare path to a filesystem path.
pub fn to_path(location: &str) -> PathBuf {
    PathBuf::from(location.strip_prefix("file://").unwrap_or(location))
}

pub async fn read(path: &Path) -> Result<Vec<u8>, FetchError> {
    let bytes = tokio::fs::read(path).await.map_err(|source| FetchError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(path = %path.display(), len = bytes.len(), "read local file");
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_file_scheme() {
        assert_eq!(to_path("file:///tmp/model.onnx"), PathBuf::from("/tmp/model.onnx"));
        assert_eq!(to_path("models/model.onnx"), PathBuf::from("models/model.onnx"));
    }

    #[tokio::test]
    async fn reads_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.onnx");
        std::fs::write(&path, b"onnx").unwrap();
        assert_eq!(read(&path).await.unwrap(), b"onnx");
    }

    #[tokio::test]
    async fn missing_file_is_io_error() {
        let err = read(Path::new("/nonexistent/model.onnx")).await.unwrap_err();
        assert!(matches!(err, FetchError::Io { .. }));
    }
}
