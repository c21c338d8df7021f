//! Fetch layer: turns a location string into bytes.
//!
//! `http://` and `https://` go over the network, `file://` URIs and bare
//! paths are read from disk. Used for both the model artifact and remote images.

pub mod http;
pub mod local;

use async_trait::async_trait;
use thiserror::Error;

pub use http::HttpClient;

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server returned {status}: {body}")]
    Server { status: u16, body: String },
    #[error("could not read {path}: {source}")]
    Io {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Capability for obtaining the bytes behind a location.
#[async_trait]
pub trait Fetch: Send + Sync {
    async fn fetch(&self, location: &str) -> Result<Vec<u8>, FetchError>;
}

/// Scheme-dispatching fetcher.
#[derive(Default)]
pub struct Fetcher {
    http: HttpClient,
}

impl Fetcher {
    pub fn new() -> Self {
        Self::default()
    }
}

pub fn is_remote(location: &str) -> bool {
    let lower = location.trim_start().to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

#[async_trait]
impl Fetch for Fetcher {
    async fn fetch(&self, location: &str) -> Result<Vec<u8>, FetchError> {
        if is_remote(location) {
            self.http.get_bytes(location).await
        } else {
            local::read(&local::to_path(location)).await
        }
    }
}
