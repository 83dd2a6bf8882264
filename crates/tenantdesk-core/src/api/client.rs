//! API client for communicating with the tenantdesk backend.
//!
//! This module provides the `ApiClient` struct for making authenticated
//! requests. Credentials come from the `Session` the client holds; an expired
//! access token is renewed once per request with the stored refresh token.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{Client, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::error::ApiResult;
use super::{ApiError, RequestDescriptor};
use crate::auth::Session;
use crate::config::Config;

// ============================================================================
// Constants
// ============================================================================

/// Endpoint exchanging a refresh token for a new access token
pub const REFRESH_PATH: &str = "/api/v1/auth/refresh";

pub const LOGIN_PATH: &str = "/api/v1/auth/login";

pub const LOGOUT_PATH: &str = "/api/v1/auth/logout";

/// HTTP request timeout in seconds.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Number of times a request may be re-sent after a token refresh.
const MAX_AUTH_RETRIES: u32 = 1;

#[derive(Debug, Serialize)]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
}

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

/// Tokens returned by a successful login
#[derive(Debug, Deserialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
}

/// A successful (2xx) response, fully read.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: String,
}

impl ApiResponse {
    /// Decode the body as JSON. An empty body decodes as `null`.
    pub fn json<T: DeserializeOwned>(&self) -> ApiResult<T> {
        let text = if self.body.trim().is_empty() { "null" } else { self.body.as_str() };
        serde_json::from_str(text).map_err(|e| {
            ApiError::InvalidResponse(format!("failed to parse response body: {}", e))
        })
    }
}

/// API client for the tenantdesk backend.
/// Clone is cheap - reqwest::Client and Session both share their internals.
#[derive(Clone, Debug)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    session: Session,
}

impl ApiClient {
    /// Create a client for `base_url` using `session` for credentials
    pub fn new(base_url: &str, session: Session) -> ApiResult<Self> {
        Self::with_timeout(base_url, session, Duration::from_secs(REQUEST_TIMEOUT_SECS))
    }

    pub fn with_timeout(base_url: &str, session: Session, timeout: Duration) -> ApiResult<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            session,
        })
    }

    /// Build a client from loaded configuration. The base URL is resolved
    /// here, once.
    pub fn from_config(config: &Config, session: Session) -> ApiResult<Self> {
        Self::with_timeout(
            &config.api_base_url(),
            session,
            config.request_timeout(),
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    // ===== Request Pipeline =====

    /// Send a request with the stored bearer credential, refreshing the access
    /// token and retrying once if the backend answers 401.
    pub async fn request(&self, req: &RequestDescriptor) -> ApiResult<ApiResponse> {
        self.execute(req, 0).await
    }

    async fn execute(&self, req: &RequestDescriptor, mut attempt: u32) -> ApiResult<ApiResponse> {
        loop {
            let token = self.session.access_token();
            let response = self.send(req, token.as_deref()).await?;

            if response.status() != StatusCode::UNAUTHORIZED {
                return Self::check_response(response).await;
            }

            if attempt >= MAX_AUTH_RETRIES {
                debug!(path = req.path(), attempt, "Still unauthorized after refresh");
                return Err(ApiError::Unauthorized);
            }

            debug!(path = req.path(), "Access token rejected, refreshing");
            self.refresh_access_token().await?;
            attempt += 1;
        }
    }

    async fn send(&self, req: &RequestDescriptor, token: Option<&str>) -> ApiResult<reqwest::Response> {
        let url = req.url(&self.base_url);
        debug!(method = %req.method(), url = %url, authenticated = token.is_some(), "Sending request");

        let mut builder = self
            .client
            .request(req.method().clone(), &url)
            .headers(Self::auth_headers(req.headers(), token)?);
        if let Some(body) = req.body() {
            builder = builder.json(body);
        }
        Ok(builder.send().await?)
    }

    fn auth_headers(base: &HeaderMap, token: Option<&str>) -> ApiResult<HeaderMap> {
        let mut headers = base.clone();
        headers.remove(AUTHORIZATION);
        if let Some(token) = token {
            let mut value = HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|_| ApiError::InvalidRequest("access token is not a valid header value".into()))?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }
        Ok(headers)
    }

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(response: reqwest::Response) -> ApiResult<ApiResponse> {
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.text().await?;

        if status.is_success() {
            debug!(status = %status, "Response received");
            Ok(ApiResponse { status, headers, body })
        } else {
            debug!(status = %status, "Request failed");
            Err(ApiError::from_status(status, &body))
        }
    }

    // ===== Token Refresh =====

    /// Exchange the stored refresh token for a new access token.
    ///
    /// Fails with `AuthExpired` when no refresh token is stored. Any failure of
    /// the exchange itself clears the session and yields `SessionInvalid`.
    pub async fn refresh_access_token(&self) -> ApiResult<()> {
        let Some(refresh_token) = self.session.refresh_token() else {
            debug!("No refresh token stored");
            return Err(ApiError::AuthExpired);
        };

        match self.exchange_refresh_token(&refresh_token).await {
            Ok(tokens) => {
                self.session
                    .set_access_token(&tokens.access_token)
                    .map_err(ApiError::Storage)?;
                if let Some(ref rotated) = tokens.refresh_token {
                    self.session.set_refresh_token(rotated).map_err(ApiError::Storage)?;
                }
                info!(rotated = tokens.refresh_token.is_some(), "Access token refreshed");
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "Token refresh failed, clearing session");
                if let Err(clear_err) = self.session.clear() {
                    warn!(error = %clear_err, "Failed to clear session");
                }
                Err(ApiError::SessionInvalid(e.to_string()))
            }
        }
    }

    async fn exchange_refresh_token(&self, refresh_token: &str) -> ApiResult<RefreshResponse> {
        let url = RequestDescriptor::post(REFRESH_PATH).url(&self.base_url);
        debug!(url = %url, "Refreshing access token");

        let response = self
            .client
            .post(&url)
            .json(&RefreshRequest { refresh_token })
            .send()
            .await?;

        let tokens: RefreshResponse = Self::check_response(response).await?.json()?;
        if tokens.access_token.trim().is_empty() {
            return Err(ApiError::InvalidResponse("refresh returned an empty access token".into()));
        }
        Ok(tokens)
    }

    // ===== Login / Logout =====

    /// Authenticate with email and password and persist the returned tokens
    pub async fn login(&self, email: &str, password: &str) -> ApiResult<LoginResponse> {
        let url = RequestDescriptor::post(LOGIN_PATH).url(&self.base_url);

        let response = self
            .client
            .post(&url)
            .json(&LoginRequest { email, password })
            .send()
            .await?;

        if response.status() == StatusCode::UNAUTHORIZED {
            return Err(ApiError::InvalidCredentials);
        }

        let tokens: LoginResponse = Self::check_response(response).await?.json()?;
        self.session
            .set_tokens(&tokens.access_token, &tokens.refresh_token)
            .map_err(ApiError::Storage)?;

        info!(email = email, "Logged in");
        Ok(tokens)
    }

    /// Tell the backend to end the session, then forget the tokens locally.
    /// Local state is cleared even if the backend call fails.
    pub async fn logout(&self) -> ApiResult<()> {
        if let Some(token) = self.session.access_token() {
            let req = RequestDescriptor::post(LOGOUT_PATH);
            match self.send(&req, Some(token.as_str())).await {
                Ok(response) if !response.status().is_success() => {
                    debug!(status = %response.status(), "Backend logout rejected");
                }
                Ok(_) => {}
                Err(e) => warn!(error = %e, "Backend logout failed"),
            }
        }

        self.session.clear().map_err(ApiError::Storage)?;
        info!("Logged out");
        Ok(())
    }

    // ===== Typed Helpers =====

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> ApiResult<T> {
        self.request(&RequestDescriptor::get(path)).await?.json()
    }

    pub async fn post<T: DeserializeOwned, B: Serialize + ?Sized>(&self, path: &str, body: &B) -> ApiResult<T> {
        self.request(&RequestDescriptor::post(path).with_json(body)?).await?.json()
    }

    pub async fn put<T: DeserializeOwned, B: Serialize + ?Sized>(&self, path: &str, body: &B) -> ApiResult<T> {
        self.request(&RequestDescriptor::put(path).with_json(body)?).await?.json()
    }

    pub async fn patch<T: DeserializeOwned, B: Serialize + ?Sized>(&self, path: &str, body: &B) -> ApiResult<T> {
        self.request(&RequestDescriptor::patch(path).with_json(body)?).await?.json()
    }

    /// DELETE, ignoring any response body
    pub async fn delete(&self, path: &str) -> ApiResult<()> {
        self.request(&RequestDescriptor::delete(path)).await?;
        Ok(())
    }
}
