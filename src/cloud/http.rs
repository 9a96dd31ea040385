//! HTTP utilities for control-plane calls

use anyhow::{anyhow, Context, Result};
use reqwest::{Client, RequestBuilder};
use serde_json::Value;

/// Maximum length of response body kept in errors and logs
const MAX_LOG_BODY_LENGTH: usize = 200;

/// Truncate a response body and strip non-printable characters
pub fn sanitize_for_log(body: &str) -> String {
    let truncated = if body.len() > MAX_LOG_BODY_LENGTH {
        let mut end = MAX_LOG_BODY_LENGTH;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}... [truncated, {} bytes total]", &body[..end], body.len())
    } else {
        body.to_string()
    };

    truncated.replace(|c: char| !c.is_ascii_graphic() && c != ' ', "")
}

/// HTTP client wrapper with optional bearer auth
#[derive(Clone)]
pub struct ControlPlaneHttp {
    client: Client,
    token: Option<String>,
}

impl ControlPlaneHttp {
    pub fn new(token: Option<String>) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("cloudbox/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client, token })
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// POST a JSON body, returning the decoded JSON response
    pub async fn post_json(&self, url: &str, body: &Value) -> Result<Value> {
        tracing::debug!("POST {}", url);

        let response = self
            .authorized(self.client.post(url).json(body))
            .send()
            .await
            .context("Failed to send request")?;

        let body = Self::checked_body(response).await?;
        if body.is_empty() {
            return Ok(Value::Null);
        }
        let text = String::from_utf8_lossy(&body);
        serde_json::from_str(&text).context("Failed to parse response JSON")
    }

    /// GET raw bytes
    pub async fn get_bytes(&self, url: &str) -> Result<Vec<u8>> {
        tracing::debug!("GET {}", url);

        let response = self
            .authorized(self.client.get(url))
            .send()
            .await
            .context("Failed to send request")?;

        Self::checked_body(response).await
    }

    /// PUT raw bytes
    pub async fn put_bytes(&self, url: &str, body: Vec<u8>) -> Result<()> {
        tracing::debug!("PUT {} ({} bytes)", url, body.len());

        let response = self
            .authorized(self.client.put(url).body(body))
            .send()
            .await
            .context("Failed to send request")?;

        Self::checked_body(response).await.map(|_| ())
    }

    /// Response body, or an error carrying the status and a sanitized excerpt
    async fn checked_body(response: reqwest::Response) -> Result<Vec<u8>> {
        let status = response.status();
        let body = response
            .bytes()
            .await
            .context("Failed to read response body")?;

        if !status.is_success() {
            let excerpt = sanitize_for_log(&String::from_utf8_lossy(&body));
            tracing::error!("API error: {} - {}", status, excerpt);
            return Err(anyhow!("API request failed: {}: {}", status, excerpt));
        }

        Ok(body.to_vec())
    }
}
