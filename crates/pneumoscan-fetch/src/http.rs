//! HTTP client for model artifacts and remote images.

use tracing::info;

use crate::FetchError;

/// Anonymous HTTP client: no cookies, no credentials, no auth headers.
pub struct HttpClient {
    client: reqwest::Client,
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpClient {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    /// GET `url` and return the full body.
    ///
    /// Non-2xx responses are returned as [`FetchError::Server`] with the body
    /// text for diagnostics.
    pub async fn get_bytes(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        info!(url = %url, "fetching");
        let resp = self.client.get(url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(FetchError::Server {
                status: status.as_u16(),
                body,
            });
        }

        let bytes = resp.bytes().await?;
        info!(url = %url, len = bytes.len(), "fetched");
        Ok(bytes.to_vec())
    }
}
