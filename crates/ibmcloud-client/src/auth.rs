//! IAM API key authentication
//!
//! IBM Cloud APIs take a short-lived bearer token that is obtained by
//! exchanging an API key at the IAM token endpoint. The token is cached and
//! refreshed shortly before it expires; concurrent callers share one refresh.

use crate::error::IbmCloudError;
use chrono::Utc;
use reqwest::Client;
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::debug;

/// Refresh this many seconds before the token expires
const REFRESH_MARGIN_SECONDS: i64 = 60;

const APIKEY_GRANT_TYPE: &str = "urn:ibm:params:oauth:grant-type:apikey";

/// IAM token endpoint response
#[derive(Debug, Clone, Deserialize)]
struct TokenResponse {
    access_token: String,
    /// Unix timestamp (seconds) at which the token expires
    expiration: i64,
}

/// Cached bearer token
#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    expiration: i64,
}

impl CachedToken {
    fn is_fresh(&self, now: i64) -> bool {
        self.expiration - REFRESH_MARGIN_SECONDS > now
    }
}

/// Exchanges an API key for IAM bearer tokens
pub struct IamAuthenticator {
    client: Client,
    iam_url: String,
    api_key: String,
    token: Mutex<Option<CachedToken>>,
}

impl std::fmt::Debug for IamAuthenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IamAuthenticator")
            .field("iam_url", &self.iam_url)
            .finish_non_exhaustive()
    }
}

impl IamAuthenticator {
    /// Create an authenticator
    ///
    /// # Arguments
    /// * `client` - Shared HTTP client
    /// * `iam_url` - IAM base URL (e.g. "https://iam.cloud.ibm.com")
    /// * `api_key` - IBM Cloud API key
    pub fn new(client: Client, iam_url: String, api_key: String) -> Self {
        Self {
            client,
            iam_url: iam_url.trim_end_matches('/').to_string(),
            api_key,
            token: Mutex::new(None),
        }
    }

    /// Value for the `Authorization` header, refreshing the token if needed
    pub async fn authorization_header(&self) -> Result<String, IbmCloudError> {
        Ok(format!("Bearer {}", self.token().await?))
    }

    /// Current access token, refreshing it if it is about to expire
    pub async fn token(&self) -> Result<String, IbmCloudError> {
        let mut cached = self.token.lock().await;
        let now = Utc::now().timestamp();
        if let Some(token) = cached.as_ref().filter(|t| t.is_fresh(now)) {
            return Ok(token.access_token.clone());
        }

        debug!("Requesting IAM token from {}", self.iam_url);
        let fresh = self.request_token().await?;
        let access_token = fresh.access_token.clone();
        *cached = Some(fresh);
        Ok(access_token)
    }

    /// Validate the API key by forcing a token exchange
    pub async fn validate(&self) -> Result<(), IbmCloudError> {
        let fresh = self.request_token().await?;
        *self.token.lock().await = Some(fresh);
        Ok(())
    }

    async fn request_token(&self) -> Result<CachedToken, IbmCloudError> {
        let url = format!("{}/identity/token", self.iam_url);
        let body = format!(
            "grant_type={}&apikey={}",
            urlencoding::encode(APIKEY_GRANT_TYPE),
            urlencoding::encode(&self.api_key)
        );

        let response = self
            .client
            .post(&url)
            .header("Content-Type", "application/x-www-form-urlencoded")
            .header("Accept", "application/json")
            .body(body)
            .send()
            .await
            .map_err(IbmCloudError::Http)?;

        let status = response.status();
        if status == 400 || status == 401 || status == 403 {
            let body = response.text().await.unwrap_or_default();
            return Err(IbmCloudError::Authentication(format!(
                "IAM rejected API key: {} - {}",
                status, body
            )));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(IbmCloudError::Api {
                status: status.as_u16(),
                message: format!("IAM token request failed: {}", body),
            });
        }

        let token: TokenResponse = response.json().await.map_err(IbmCloudError::Http)?;
        debug!("IAM token obtained, expires at {}", token.expiration);
        Ok(CachedToken {
            access_token: token.access_token,
            expiration: token.expiration,
        })
    }
}
