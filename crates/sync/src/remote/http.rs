//! HTTP backend client.

use std::sync::Arc;

use ginvoice_core::BusinessSnapshot;
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::{debug, instrument, warn};
use url::Url;

use super::{AuthSession, Credentials, PushAck, RemoteBackend, RemoteError};
use crate::config::RemoteConfig;
use crate::delta::SnapshotDelta;

const HEALTH_PATH: &str = "api/health";
const LOGIN_PATH: &str = "api/auth/login";
const PUSH_PATH: &str = "api/sync/push";
const STATE_PATH: &str = "api/sync/state";

/// JSON client for the Ginvoice backend.
///
/// Clones share the HTTP connection pool and the session token.
#[derive(Clone)]
pub struct HttpBackend {
    inner: Arc<HttpBackendInner>,
}

struct HttpBackendInner {
    client: reqwest::Client,
    base_url: Url,
    token: RwLock<Option<SecretString>>,
}

impl std::fmt::Debug for HttpBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpBackend")
            .field("base_url", &self.inner.base_url.as_str())
            .field("token", &"[REDACTED]")
            .finish()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoginResponse {
    token: Option<String>,
    #[serde(default)]
    requires_verification: bool,
    business_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

fn error_message(body: &str) -> String {
    serde_json::from_str::<ErrorBody>(body).map_or_else(|_| body.to_string(), |b| b.message)
}

fn status_error(status: StatusCode, body: String) -> RemoteError {
    match status {
        StatusCode::UNAUTHORIZED => RemoteError::Unauthorized,
        StatusCode::CONFLICT => RemoteError::Conflict(error_message(&body)),
        _ => RemoteError::Response {
            status: status.as_u16(),
            body,
        },
    }
}

async fn error_for_status(response: reqwest::Response) -> Result<reqwest::Response, RemoteError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(status_error(status, body))
}

impl HttpBackend {
    /// Create a client for the configured backend.
    ///
    /// # Errors
    ///
    /// Returns `RemoteError::Network` if the HTTP client cannot be built.
    pub fn new(config: &RemoteConfig) -> Result<Self, RemoteError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| RemoteError::Network(e.to_string()))?;

        Ok(Self {
            inner: Arc::new(HttpBackendInner {
                client,
                base_url: config.base_url.clone(),
                token: RwLock::new(config.api_token.clone()),
            }),
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, RemoteError> {
        self.inner
            .base_url
            .join(path)
            .map_err(|e| RemoteError::InvalidUrl(e.to_string()))
    }

    async fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.inner.token.read().await.as_ref() {
            Some(token) => request.bearer_auth(token.expose_secret()),
            None => request,
        }
    }

    /// Replace the session token (e.g. one restored from the keychain).
    pub async fn set_token(&self, token: Option<SecretString>) {
        *self.inner.token.write().await = token;
    }

    /// Reachability check, used as a connectivity signal.
    #[instrument(skip(self))]
    pub async fn is_reachable(&self) -> bool {
        let Ok(url) = self.endpoint(HEALTH_PATH) else {
            return false;
        };
        match self.inner.client.get(url).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                debug!(error = %e, "health check failed");
                false
            }
        }
    }
}

impl RemoteBackend for HttpBackend {
    #[instrument(skip(self, delta))]
    async fn push(&self, delta: &SnapshotDelta) -> Result<PushAck, RemoteError> {
        let url = self.endpoint(PUSH_PATH)?;
        let request = self.authorized(self.inner.client.post(url).json(delta)).await;
        let response = error_for_status(request.send().await?).await?;

        // Some deployments answer 204 with no body.
        let body = response.text().await?;
        if body.trim().is_empty() {
            return Ok(PushAck::default());
        }
        serde_json::from_str(&body).map_err(|e| RemoteError::Decode(e.to_string()))
    }

    #[instrument(skip(self))]
    async fn fetch_state(&self) -> Result<BusinessSnapshot, RemoteError> {
        let url = self.endpoint(STATE_PATH)?;
        let request = self.authorized(self.inner.client.get(url)).await;
        let response = error_for_status(request.send().await?).await?;
        Ok(response.json().await?)
    }

    #[instrument(skip(self, credentials), fields(email = %credentials.email))]
    async fn login(&self, credentials: &Credentials) -> Result<AuthSession, RemoteError> {
        let url = self.endpoint(LOGIN_PATH)?;
        let response = self
            .inner
            .client
            .post(url)
            .json(&serde_json::json!({
                "email": credentials.email.as_str(),
                "pin": credentials.pin.expose_secret(),
            }))
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        let parsed = serde_json::from_str::<LoginResponse>(&body).ok();

        if parsed.as_ref().is_some_and(|r| r.requires_verification) {
            warn!("login rejected until email is verified");
            return Err(RemoteError::VerificationRequired);
        }
        if !status.is_success() {
            return Err(status_error(status, body));
        }

        let parsed = parsed.ok_or_else(|| RemoteError::Decode("malformed login response".into()))?;
        let token = parsed
            .token
            .map(SecretString::from)
            .ok_or_else(|| RemoteError::Decode("login response missing token".into()))?;

        *self.inner.token.write().await = Some(token.clone());

        Ok(AuthSession {
            token,
            business_name: parsed.business_name,
        })
    }
}
