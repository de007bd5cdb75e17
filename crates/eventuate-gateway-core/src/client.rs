//! HTTP client for the Eventuate gateway API.
//!
//! Every call is a single request without retry. Non-success statuses are
//! classified here into [`GatewayError`] variants and logged once.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use serde_json::Value;
use url::Url;

use crate::error::{API_KEY_ID_ENV, API_KEY_SECRET_ENV, GatewayError, Result};
use crate::identity::GatewayId;
use crate::types::{Ack, GatewayConfig, GatewayState, Space};

/// Default gateway API endpoint.
pub const DEFAULT_GATEWAY_URL: &str = "https://api.eventuate.io/gateway";

/// Header carrying a session token.
pub const JWT_HEADER: &str = "x-user-info-jwt";

/// Operations on remote gateway resources, keyed by `(space, id)`.
#[async_trait]
pub trait GatewayApi: Send + Sync {
    /// Creates a gateway. Fails with [`GatewayError::Conflict`] if it exists.
    async fn create(&self, space: &Space, id: &GatewayId, config: &GatewayConfig) -> Result<Ack>;

    /// Fetches a gateway. `Ok(None)` when the API reports it absent.
    async fn get(&self, space: &Space, id: &GatewayId) -> Result<Option<GatewayState>>;

    /// Replaces the configuration of an existing gateway.
    async fn update(&self, space: &Space, id: &GatewayId, config: &GatewayConfig) -> Result<Ack>;

    /// Deletes a gateway. Deleting an absent gateway succeeds.
    async fn delete(&self, space: &Space, id: &GatewayId) -> Result<Ack>;

    /// Toggles routing without touching the rest of the configuration.
    async fn set_enabled(&self, space: &Space, id: &GatewayId, enabled: bool) -> Result<Ack>;
}

pub type DynGatewayApi = Arc<dyn GatewayApi>;

/// How requests authenticate. Exactly one mode is active per client.
#[derive(Clone)]
pub enum ApiAuth {
    /// Session token sent in `x-user-info-jwt`.
    Jwt(String),
    /// API key pair sent as HTTP Basic credentials.
    ApiKey { key_id: String, key_secret: String },
}

impl ApiAuth {
    /// Uses the session token when one is configured, otherwise the API key
    /// pair from `EVENTUATE_API_KEY_ID` / `EVENTUATE_API_KEY_SECRET`.
    pub fn resolve(jwt_token: Option<&str>) -> Result<Self> {
        Self::resolve_with(jwt_token, |name| std::env::var(name).ok())
    }

    pub fn resolve_with(
        jwt_token: Option<&str>,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        if let Some(token) = jwt_token.filter(|t| !t.trim().is_empty()) {
            return Ok(Self::Jwt(token.to_string()));
        }

        let key_id = lookup(API_KEY_ID_ENV).filter(|v| !v.is_empty());
        let key_secret = lookup(API_KEY_SECRET_ENV).filter(|v| !v.is_empty());
        match (key_id, key_secret) {
            (Some(key_id), Some(key_secret)) => Ok(Self::ApiKey { key_id, key_secret }),
            _ => Err(GatewayError::configuration(format!(
                "Eventuate credentials not found: set {API_KEY_ID_ENV} and {API_KEY_SECRET_ENV}, or configure a JWT token"
            ))),
        }
    }

    pub fn mode(&self) -> &'static str {
        match self {
            Self::Jwt(_) => "jwt",
            Self::ApiKey { .. } => "basic",
        }
    }
}

impl std::fmt::Debug for ApiAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Jwt(_) => f.write_str("Jwt(***)"),
            Self::ApiKey { key_id, .. } => f
                .debug_struct("ApiKey")
                .field("key_id", key_id)
                .field("key_secret", &"***")
                .finish(),
        }
    }
}

/// reqwest-backed [`GatewayApi`].
pub struct HttpGatewayClient {
    http: reqwest::Client,
    base_url: Url,
    auth: ApiAuth,
}

impl HttpGatewayClient {
    pub fn new(base_url: &str, auth: ApiAuth) -> Result<Self> {
        Self::with_http_client(reqwest::Client::new(), base_url, auth)
    }

    pub fn with_http_client(http: reqwest::Client, base_url: &str, auth: ApiAuth) -> Result<Self> {
        let base_url = Url::parse(base_url.trim_end_matches('/')).map_err(|e| {
            GatewayError::configuration(format!("Invalid gateway URL \"{base_url}\": {e}"))
        })?;
        if base_url.cannot_be_a_base() {
            return Err(GatewayError::configuration(format!(
                "Gateway URL \"{base_url}\" cannot carry a path"
            )));
        }
        Ok(Self {
            http,
            base_url,
            auth,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Builds `<base>/<space>/<id>[/<subpath>]`, escaping each segment.
    pub fn gateway_url(&self, space: &Space, id: &GatewayId, subpath: Option<&str>) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push(space.as_str()).push(id.as_str());
            if let Some(subpath) = subpath {
                segments.push(subpath);
            }
        }
        url
    }

    fn request(&self, method: Method, url: Url) -> reqwest::RequestBuilder {
        tracing::debug!(%method, %url, auth = self.auth.mode(), "Gateway API request");
        let req = self.http.request(method, url);
        match &self.auth {
            ApiAuth::Jwt(token) => req.header(JWT_HEADER, token),
            ApiAuth::ApiKey { key_id, key_secret } => req.basic_auth(key_id, Some(key_secret)),
        }
    }

    async fn execute(
        &self,
        req: reqwest::RequestBuilder,
        space: &Space,
        id: &GatewayId,
    ) -> Result<Value> {
        let resp = req.send().await.map_err(|e| {
            tracing::error!(space = %space, gateway_id = %id, error = %e, "Gateway API unreachable");
            GatewayError::transport(None, e.to_string())
        })?;

        let status = resp.status();
        let body = resp.text().await.map_err(|e| {
            GatewayError::transport(Some(status.as_u16()), format!("Failed to read response: {e}"))
        })?;

        if status.is_success() {
            return Ok(parse_body(&body));
        }

        let err = classify(status, body, space, id);
        log_failure(&err, space, id);
        Err(err)
    }
}

/// Maps a non-success response to its error variant.
pub fn classify(status: StatusCode, body: String, space: &Space, id: &GatewayId) -> GatewayError {
    match status {
        StatusCode::UNAUTHORIZED => GatewayError::Unauthorized,
        StatusCode::NOT_FOUND => GatewayError::not_found(space.as_str(), id.as_str()),
        StatusCode::CONFLICT => GatewayError::conflict(space.as_str(), id.as_str()),
        other => GatewayError::transport(Some(other.as_u16()), body),
    }
}

fn log_failure(err: &GatewayError, space: &Space, id: &GatewayId) {
    match err {
        GatewayError::Unauthorized => {
            tracing::error!("401 Unauthorized");
            tracing::error!(
                "Setup correct Eventuate credentials using env variables: {API_KEY_ID_ENV}, {API_KEY_SECRET_ENV}"
            );
        }
        GatewayError::NotFound { .. } => {
            tracing::info!(space = %space, gateway_id = %id, "Eventuate gateway not found");
        }
        GatewayError::Conflict { .. } => {
            tracing::info!(space = %space, gateway_id = %id, "Eventuate gateway already exists");
        }
        other => {
            tracing::error!(
                space = %space,
                gateway_id = %id,
                status = ?other.status_code(),
                error = %other,
                "Gateway API request failed"
            );
        }
    }
}

fn parse_body(body: &str) -> Value {
    if body.trim().is_empty() {
        return Value::Null;
    }
    serde_json::from_str(body).unwrap_or_else(|_| Value::String(body.to_string()))
}

#[async_trait]
impl GatewayApi for HttpGatewayClient {
    async fn create(&self, space: &Space, id: &GatewayId, config: &GatewayConfig) -> Result<Ack> {
        let url = self.gateway_url(space, id, None);
        let req = self.request(Method::POST, url).json(config);
        let body = self.execute(req, space, id).await?;
        tracing::debug!(space = %space, gateway_id = %id, "Eventuate gateway created");
        Ok(Ack { body })
    }

    async fn get(&self, space: &Space, id: &GatewayId) -> Result<Option<GatewayState>> {
        let url = self.gateway_url(space, id, None);
        let req = self.request(Method::GET, url);
        match self.execute(req, space, id).await {
            Ok(body) => {
                let body = match body {
                    Value::String(raw) => serde_json::from_str(&raw)?,
                    other => other,
                };
                Ok(Some(serde_json::from_value(body)?))
            }
            Err(GatewayError::NotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn update(&self, space: &Space, id: &GatewayId, config: &GatewayConfig) -> Result<Ack> {
        let url = self.gateway_url(space, id, None);
        let req = self.request(Method::PUT, url).json(config);
        let body = self.execute(req, space, id).await?;
        tracing::debug!(space = %space, gateway_id = %id, "Eventuate gateway updated");
        Ok(Ack { body })
    }

    async fn delete(&self, space: &Space, id: &GatewayId) -> Result<Ack> {
        let url = self.gateway_url(space, id, None);
        let req = self.request(Method::DELETE, url);
        match self.execute(req, space, id).await {
            Ok(body) => Ok(Ack { body }),
            Err(GatewayError::NotFound { .. }) => Ok(Ack::default()),
            Err(e) => Err(e),
        }
    }

    async fn set_enabled(&self, space: &Space, id: &GatewayId, enabled: bool) -> Result<Ack> {
        let url = self.gateway_url(space, id, Some("state"));
        let req = self
            .request(Method::PUT, url)
            .json(&serde_json::json!({ "enabled": enabled }));
        let body = self.execute(req, space, id).await?;
        Ok(Ack { body })
    }
}
