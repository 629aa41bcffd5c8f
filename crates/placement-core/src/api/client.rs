//! API client for the placement agent backend.
//!
//! Thin wrappers over the handful of endpoints the client consumes. Session
//! bookkeeping lives in `auth::SessionManager`; this type never stores a token.

use std::time::Duration;

use reqwest::{Client, Method, Response};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::models::{
    CurrentUserResponse, HealthResponse, HealthStatus, ServerInfo, TokenResponse,
};

use super::ApiError;

/// HTTP request timeout in seconds.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// API client for the placement agent backend.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    /// Create a new API client rooted at `base_url`
    pub fn new(base_url: impl Into<String>) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(response: Response) -> Result<Response, ApiError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }

    async fn parse_json<T: DeserializeOwned>(response: Response, what: &str) -> Result<T, ApiError> {
        let text = response.text().await?;
        serde_json::from_str(&text)
            .map_err(|e| ApiError::InvalidResponse(format!("{}: {}", what, e)))
    }

    /// Poll `/health`. Anything other than a successful `{ok: true}` counts as unreachable.
    pub async fn health(&self) -> HealthStatus {
        let response = match self.client.get(self.url("/health")).send().await {
            Ok(r) => r,
            Err(e) => {
                debug!(error = %e, "Health check failed");
                return HealthStatus::Unreachable;
            }
        };

        if !response.status().is_success() {
            debug!(status = %response.status(), "Health check returned error status");
            return HealthStatus::Unreachable;
        }

        match Self::parse_json::<HealthResponse>(response, "health").await {
            Ok(HealthResponse { ok: true }) => HealthStatus::Online,
            Ok(_) => HealthStatus::Unreachable,
            Err(e) => {
                debug!(error = %e, "Unexpected health payload");
                HealthStatus::Unreachable
            }
        }
    }

    /// Fetch `/info` (backend status and whether generation is configured)
    pub async fn info(&self) -> Result<ServerInfo, ApiError> {
        let response = self.client.get(self.url("/info")).send().await?;
        let response = Self::check_response(response).await?;
        Self::parse_json(response, "info").await
    }

    /// Ask the identity endpoint who owns `token`.
    ///
    /// A successful status with a missing or malformed body yields `Ok(None)`.
    pub async fn current_user(&self, token: &str) -> Result<Option<String>, ApiError> {
        let response = self
            .client
            .get(self.url("/auth/me"))
            .bearer_auth(token)
            .send()
            .await?;

        let response = Self::check_response(response).await?;

        let text = response.text().await.unwrap_or_default();
        match serde_json::from_str::<CurrentUserResponse>(&text) {
            Ok(me) => Ok(me.username.filter(|u| !u.is_empty())),
            Err(e) => {
                debug!(error = %e, "Identity payload ignored");
                Ok(None)
            }
        }
    }

    /// Exchange credentials for an access token at `/auth/token`.
    pub async fn request_token(&self, username: &str, password: &str) -> Result<String, ApiError> {
        let response = self
            .client
            .post(self.url("/auth/token"))
            .form(&[("username", username), ("password", password)])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            warn!(%status, "Token request rejected");
            return Err(ApiError::login_rejected(&body));
        }

        let token: TokenResponse = Self::parse_json(response, "token response").await?;
        if token.access_token.is_empty() {
            return Err(ApiError::InvalidResponse(
                "token response: empty access_token".to_string(),
            ));
        }
        Ok(token.access_token)
    }

    /// Send a request carrying `token` as a bearer credential.
    ///
    /// Non-success statuses are mapped through `ApiError::from_status`, so a
    /// rejected credential always comes back as `ApiError::Unauthorized`.
    pub async fn send_authenticated(
        &self,
        method: Method,
        path: &str,
        token: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<Response, ApiError> {
        let mut request = self
            .client
            .request(method, self.url(path))
            .bearer_auth(token);

        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        Self::check_response(response).await
    }

    /// Fetch an arbitrary URL and report whether it answered with success.
    /// Used to see whether the embeddable assistant widget is reachable.
    pub async fn probe(&self, url: &str) -> bool {
        match self.client.get(url).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                debug!(url = url, error = %e, "Probe failed");
                false
            }
        }
    }

    pub(crate) async fn read_json<T: DeserializeOwned>(
        response: Response,
        what: &str,
    ) -> Result<T, ApiError> {
        Self::parse_json(response, what).await
    }
}
