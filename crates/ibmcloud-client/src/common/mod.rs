//! Common utilities for IBM Cloud API clients
//!
//! Provides the authenticated HTTP wrapper shared by the VPC, PowerVS and
//! Resource Controller clients.

pub mod query;

use crate::auth::IamAuthenticator;
use crate::error::IbmCloudError;
use reqwest::{Client, RequestBuilder, Response};
use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;

/// HTTP client wrapper with IAM authentication
pub struct HttpClient {
    client: Client,
    base_url: String,
    auth: Arc<IamAuthenticator>,
    /// Query parameters appended to every relative request path
    default_query: Vec<(String, String)>,
    /// Extra headers sent with every request
    headers: Vec<(String, String)>,
}

impl HttpClient {
    /// Create a new HTTP client wrapper
    pub fn new(client: Client, base_url: String, auth: Arc<IamAuthenticator>) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            auth,
            default_query: Vec::new(),
            headers: Vec::new(),
        }
    }

    /// Append a query parameter to every request built from a relative path
    pub fn with_query(mut self, key: &str, value: &str) -> Self {
        self.default_query.push((key.to_string(), value.to_string()));
        self
    }

    /// Send an extra header with every request
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Build a full URL from a path
    ///
    /// Absolute URLs (pagination links) keep their base; default query
    /// parameters they are missing are appended.
    pub fn build_url(&self, path: &str) -> String {
        let url = if path.starts_with("http") {
            path.to_string()
        } else {
            format!("{}{}", self.base_url, path)
        };
        let missing: Vec<(&str, &str)> = self
            .default_query
            .iter()
            .filter(|(k, _)| !url.contains(&format!("{}=", k)))
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        if missing.is_empty() {
            return url;
        }
        let separator = if url.contains('?') { '&' } else { '?' };
        format!("{}{}{}", url, separator, build_query_string(&missing))
    }

    async fn authorized(&self, builder: RequestBuilder) -> Result<RequestBuilder, IbmCloudError> {
        let mut builder = builder
            .header("Authorization", self.auth.authorization_header().await?)
            .header("Accept", "application/json");
        for (name, value) in &self.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        Ok(builder)
    }

    /// Make a GET request
    pub async fn get<T: for<'de> Deserialize<'de>>(&self, path: &str) -> Result<T, IbmCloudError> {
        let url = self.build_url(path);
        debug!("GET {}", url);

        let request = self.authorized(self.client.get(&url)).await?;
        let response = request.send().await.map_err(IbmCloudError::Http)?;
        let response = check_status("GET", path, response).await?;
        decode(response).await
    }

    /// Make a POST request
    pub async fn post<T: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<T, IbmCloudError> {
        let url = self.build_url(path);
        debug!("POST {} with body: {}", url, serde_json::to_string_pretty(body).unwrap_or_default());

        let request = self.authorized(self.client.post(&url)).await?;
        let response = request.json(body).send().await.map_err(IbmCloudError::Http)?;
        let response = check_status("POST", path, response).await?;
        decode(response).await
    }

    /// Make a PUT request
    pub async fn put<T: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<T, IbmCloudError> {
        let url = self.build_url(path);
        debug!("PUT {} with body: {}", url, serde_json::to_string_pretty(body).unwrap_or_default());

        let request = self.authorized(self.client.put(&url)).await?;
        let response = request.json(body).send().await.map_err(IbmCloudError::Http)?;
        let response = check_status("PUT", path, response).await?;
        decode(response).await
    }

    /// Make a DELETE request
    pub async fn delete(&self, path: &str) -> Result<(), IbmCloudError> {
        let url = self.build_url(path);
        debug!("DELETE {}", url);

        let request = self.authorized(self.client.delete(&url)).await?;
        let response = request.send().await.map_err(IbmCloudError::Http)?;
        check_status("DELETE", path, response).await?;
        Ok(())
    }
}

/// Map non-success responses onto `IbmCloudError`
async fn check_status(method: &str, path: &str, response: Response) -> Result<Response, IbmCloudError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    match status.as_u16() {
        404 => Err(IbmCloudError::NotFound(format!("{} {} - {}", method, path, body))),
        401 | 403 => Err(IbmCloudError::Authentication(format!(
            "{} {} failed: {} - {}",
            method, path, status, body
        ))),
        code => Err(IbmCloudError::Api {
            status: code,
            message: format!("{} {} failed: {}", method, path, body),
        }),
    }
}

/// Decode a JSON body, keeping a prefix of the payload on failure
async fn decode<T: for<'de> Deserialize<'de>>(response: Response) -> Result<T, IbmCloudError> {
    let text = response.text().await.map_err(IbmCloudError::Http)?;
    // DELETE-style responses and 202s can be empty
    let text = if text.trim().is_empty() { "null" } else { text.as_str() };
    serde_json::from_str(text).map_err(|e| IbmCloudError::Api {
        status: 200,
        message: format!(
            "error decoding response body: {} - Response (first 500 chars): {}",
            e,
            text.chars().take(500).collect::<String>()
        ),
    })
}

/// Build query string from filters
pub fn build_query_string(filters: &[(&str, &str)]) -> String {
    filters
        .iter()
        .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}
