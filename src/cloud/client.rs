//! Control-plane client
//!
//! Every action is `POST {base}/{service}/{Action}` with a JSON body.
//! List actions page with `pageToken` in the request and `nextPageToken` in
//! the response. Objects live under `{base}/s3/{bucket}/{key}`.

use super::http::ControlPlaneHttp;
use crate::config::Config;
use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use url::Url;

/// Upper bound on pages fetched by one list call
const MAX_PAGES: usize = 100;

#[derive(Clone)]
pub struct ControlPlaneClient {
    pub http: ControlPlaneHttp,
    base_url: Url,
}

impl ControlPlaneClient {
    pub fn new(base_url: &str, token: Option<String>) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .with_context(|| format!("invalid control plane url: {}", base_url))?;
        Ok(Self {
            http: ControlPlaneHttp::new(token)?,
            base_url,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(&config.control_plane_url, config.control_plane_token.clone())
    }

    fn base(&self) -> &str {
        self.base_url.as_str().trim_end_matches('/')
    }

    /// Build an action URL
    pub fn action_url(&self, service: &str, action: &str) -> String {
        format!("{}/{}/{}", self.base(), service, action)
    }

    /// Build an object URL, encoding each key segment
    pub fn object_url(&self, bucket: &str, key: &str) -> String {
        let key = key
            .split('/')
            .map(|segment| urlencoding::encode(segment).into_owned())
            .collect::<Vec<_>>()
            .join("/");
        format!("{}/s3/{}/{}", self.base(), urlencoding::encode(bucket), key)
    }

    /// Invoke one action
    pub async fn call(&self, service: &str, action: &str, body: Value) -> Result<Value> {
        self.http
            .post_json(&self.action_url(service, action), &body)
            .await
            .with_context(|| format!("{}.{}", service, action))
    }

    /// Invoke an action and decode one response field
    pub async fn call_field<T: DeserializeOwned>(
        &self,
        service: &str,
        action: &str,
        body: Value,
        field: &str,
    ) -> Result<T> {
        let response = self.call(service, action, body).await?;
        let value = response.get(field).cloned().unwrap_or(Value::Null);
        serde_json::from_value(value)
            .with_context(|| format!("Failed to parse {} from {}", field, action))
    }

    /// Invoke a list action, following `nextPageToken` until exhausted
    pub async fn call_paginated<T: DeserializeOwned>(
        &self,
        service: &str,
        action: &str,
        body: Value,
        items_key: &str,
    ) -> Result<Vec<T>> {
        let mut items = Vec::new();
        let mut page_token: Option<String> = None;

        for _ in 0..MAX_PAGES {
            let mut request = body.clone();
            if let (Some(map), Some(token)) = (request.as_object_mut(), page_token.as_ref()) {
                map.insert("pageToken".to_string(), json!(token));
            }

            let response = self.call(service, action, request).await?;
            if let Some(page) = response.get(items_key).and_then(Value::as_array) {
                for item in page {
                    items.push(
                        serde_json::from_value(item.clone())
                            .with_context(|| format!("Failed to parse item of {}", action))?,
                    );
                }
            }

            page_token = response
                .get("nextPageToken")
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(str::to_string);
            if page_token.is_none() {
                return Ok(items);
            }
            tracing::debug!(action, fetched = items.len(), "fetching next page");
        }

        tracing::warn!(action, "stopped paging after {} pages", MAX_PAGES);
        Ok(items)
    }

    pub async fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>> {
        self.http
            .get_bytes(&self.object_url(bucket, key))
            .await
            .with_context(|| format!("get {}/{}", bucket, key))
    }

    pub async fn put_object(&self, bucket: &str, key: &str, body: Vec<u8>) -> Result<()> {
        self.http
            .put_bytes(&self.object_url(bucket, key), body)
            .await
            .with_context(|| format!("put {}/{}", bucket, key))
    }
}
