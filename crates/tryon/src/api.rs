use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response};

use crate::{
    error::{Result, TryOnError},
    wire::{RunRequest, RunResponse, StatusResponse},
};

/// The remote inference service, as seen by the job client
#[async_trait]
pub trait TryOnApi: Send + Sync {
    /// `POST /run`
    async fn run(&self, request: &RunRequest) -> Result<RunResponse>;

    /// `GET /status/{id}`
    async fn status(&self, job_id: &str) -> Result<StatusResponse>;

    /// Fetch an output image
    async fn download(&self, url: &str) -> Result<Vec<u8>>;
}

/// reqwest-backed [`TryOnApi`] with bearer-token auth
pub struct HttpTryOnApi {
    client: Client,
    base_url: String,
    api_key: String,
}

impl fmt::Debug for HttpTryOnApi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpTryOnApi")
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

impl HttpTryOnApi {
    /// Create a client for `base_url` (e.g. `https://api.fashn.ai/v1`)
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        })
    }

    /// Read the key from the environment variable `var`
    pub fn from_env(base_url: impl Into<String>, var: &str, timeout: Duration) -> Result<Self> {
        let api_key = std::env::var(var)
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| TryOnError::MissingApiKey(var.to_string()))?;
        Self::new(base_url, api_key, timeout)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }
}

/// Body text of a non-2xx response as an error
async fn http_error(response: Response) -> TryOnError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    TryOnError::Http { status, body }
}

#[async_trait]
impl TryOnApi for HttpTryOnApi {
    async fn run(&self, request: &RunRequest) -> Result<RunResponse> {
        let response = self
            .client
            .post(self.endpoint("run"))
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await?;

        if response.status().is_success() {
            return Ok(response.json().await?);
        }

        // Rejections usually still carry a structured `{error}` body
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        match serde_json::from_str::<RunResponse>(&body) {
            Ok(parsed) if parsed.error.is_some() => Ok(parsed),
            _ => Err(TryOnError::Http { status, body }),
        }
    }

    async fn status(&self, job_id: &str) -> Result<StatusResponse> {
        let response = self
            .client
            .get(self.endpoint(&format!("status/{job_id}")))
            .bearer_auth(&self.api_key)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(http_error(response).await);
        }
        Ok(response.json().await?)
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>> {
        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(http_error(response).await);
        }
        Ok(response.bytes().await?.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_joins_paths() {
        let api = HttpTryOnApi::new("https://api.example.com/v1/", "secret", Duration::from_secs(5)).unwrap();
        assert_eq!(api.endpoint("run"), "https://api.example.com/v1/run");
        assert_eq!(api.endpoint("status/abc"), "https://api.example.com/v1/status/abc");
    }

    #[test]
    fn test_debug_hides_key() {
        let api = HttpTryOnApi::new("https://api.example.com", "super-secret", Duration::from_secs(5)).unwrap();
        let printed = format!("{api:?}");
        assert!(!printed.contains("super-secret"));
    }

    #[test]
    fn test_missing_env_key() {
        let err = HttpTryOnApi::from_env(
            "https://api.example.com",
            "TRYON_TEST_KEY_THAT_IS_NEVER_SET",
            Duration::from_secs(5),
        )
        .unwrap_err();
        assert!(matches!(err, TryOnError::MissingApiKey(var) if var == "TRYON_TEST_KEY_THAT_IS_NEVER_SET"));
    }
}
