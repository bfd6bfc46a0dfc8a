use std::future::Future;
use std::sync::Arc;

use reqwest::{Method, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use tokio_util::sync::CancellationToken;

use crate::api::endpoints;
use crate::config::ClientConfig;
use crate::error::Error;
use crate::guard::Navigator;
use crate::session::SessionStore;
use crate::types::AuthOutcome;

enum Recovery {
    /// A usable token is held; rebuild the call with it.
    Retry,
    /// The refresh response was refused and the session store cleared itself.
    SessionCleared,
}

#[derive(Debug, Clone)]
enum Body {
    Empty,
    Json(JsonValue),
    Form(Vec<(String, String)>),
}

/// Method, path and body of one backend call. Kept as data so a call can
/// be rebuilt with fresh credentials after a token refresh.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    method: Method,
    path: String,
    body: Body,
}

impl ApiRequest {
    #[must_use]
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: Body::Empty,
        }
    }

    #[must_use]
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    #[must_use]
    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    #[must_use]
    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    #[must_use]
    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// JSON body (`Content-Type: application/json`).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Decode`] if `body` cannot be serialized.
    pub fn json<T: Serialize + ?Sized>(mut self, body: &T) -> Result<Self, Error> {
        let value = serde_json::to_value(body).map_err(|e| Error::Decode(e.to_string()))?;
        self.body = Body::Json(value);
        Ok(self)
    }

    /// Form body (`Content-Type: application/x-www-form-urlencoded`).
    #[must_use]
    pub fn form<K, V>(mut self, pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.body = Body::Form(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        );
        self
    }

    #[must_use]
    pub fn method(&self) -> &Method {
        &self.method
    }

    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }
}

/// Outbound call pipeline.
///
/// Attaches `Authorization: Bearer <token>` whenever a token is held. A 401
/// triggers one refresh attempt with the stored refresh token; on success the
/// call is rebuilt with the new token and retried exactly once. Otherwise the
/// session is cleared, the navigator (if any) is sent to the login path and
/// the call fails with [`Error::Unauthorized`].
#[derive(Clone)]
pub struct RequestPipeline {
    http: reqwest::Client,
    config: Arc<ClientConfig>,
    session: SessionStore,
    navigator: Option<Arc<dyn Navigator>>,
    cancel: Option<CancellationToken>,
    refresh_lock: Arc<tokio::sync::Mutex<()>>,
}

impl std::fmt::Debug for RequestPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestPipeline")
            .field("base_url", &self.config.base_url().as_str())
            .field("has_navigator", &self.navigator.is_some())
            .field("cancellable", &self.cancel.is_some())
            .finish_non_exhaustive()
    }
}

impl RequestPipeline {
    #[must_use]
    pub fn new(config: Arc<ClientConfig>, session: SessionStore, http: reqwest::Client) -> Self {
        Self {
            http,
            config,
            session,
            navigator: None,
            cancel: None,
            refresh_lock: Arc::new(tokio::sync::Mutex::new(())),
        }
    }

    #[must_use]
    pub fn with_http_client(mut self, http: reqwest::Client) -> Self {
        self.http = http;
        self
    }

    #[must_use]
    pub fn with_navigator(mut self, navigator: Arc<dyn Navigator>) -> Self {
        self.navigator = Some(navigator);
        self
    }

    /// Copy whose calls abort with [`Error::Cancelled`] once `cancel` fires.
    #[must_use]
    pub fn scoped(&self, cancel: CancellationToken) -> Self {
        let mut scoped = self.clone();
        scoped.cancel = Some(cancel);
        scoped
    }

    #[must_use]
    pub fn session(&self) -> &SessionStore {
        &self.session
    }

    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Authenticated call. Returns the successful response.
    ///
    /// # Errors
    ///
    /// - [`Error::Unauthorized`] if the 401 could not be recovered
    /// - [`Error::Api`] for any other non-success status
    /// - [`Error::Http`] on transport failure
    /// - [`Error::Cancelled`] if the scope was cancelled
    pub async fn send(&self, request: &ApiRequest) -> Result<reqwest::Response, Error> {
        let token = self.session.token();
        let response = self.execute(request, token.as_deref()).await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return self.ensure_success(response, None).await;
        }

        tracing::info!(path = %request.path, "Access token rejected; attempting refresh");
        let rejected = response;

        match self.recover(token.as_deref()).await {
            Ok(Recovery::Retry) => {
                let token = self.session.token();
                let retried = self.execute(request, token.as_deref()).await?;
                if retried.status() != StatusCode::UNAUTHORIZED {
                    return self.ensure_success(retried, None).await;
                }
                let message = self.error_message(retried, "Unauthorized").await?;
                tracing::warn!(path = %request.path, "Retry after refresh still unauthorized");
                self.end_session(true);
                Err(Error::Unauthorized { message })
            }
            Ok(Recovery::SessionCleared) => {
                tracing::warn!("Refresh response refused; session already cleared");
                let message = self.error_message(rejected, "Unauthorized").await?;
                self.end_session(false);
                Err(Error::Unauthorized { message })
            }
            Err(Error::Cancelled) => Err(Error::Cancelled),
            Err(e) => {
                tracing::warn!(error = %e, "Session recovery failed");
                let message = self.error_message(rejected, "Unauthorized").await?;
                self.end_session(true);
                Err(Error::Unauthorized { message })
            }
        }
    }

    /// Authenticated call with a JSON response body.
    ///
    /// # Errors
    ///
    /// As [`send`](Self::send), plus [`Error::Decode`] if the body does not match `T`.
    pub async fn send_json<T: DeserializeOwned>(&self, request: &ApiRequest) -> Result<T, Error> {
        let response = self.send(request).await?;
        self.read_json(response).await
    }

    /// Single attempt with an explicit token and no status handling.
    pub(crate) async fn send_raw(
        &self,
        request: &ApiRequest,
        token: Option<&str>,
    ) -> Result<reqwest::Response, Error> {
        self.execute(request, token).await
    }

    /// Unauthenticated call. Non-success statuses become [`Error::Api`]
    /// carrying the server message, or `fallback` when there is none.
    pub(crate) async fn send_public(
        &self,
        request: &ApiRequest,
        fallback: &str,
    ) -> Result<reqwest::Response, Error> {
        let response = self.execute(request, None).await?;
        self.ensure_success(response, Some(fallback)).await
    }

    /// Exchange the stored refresh token for a new session.
    ///
    /// Does not clear the session on failure; callers decide. A response the
    /// session store refuses has already cleared it and comes back as
    /// [`AuthOutcome::NotSignedIn`].
    ///
    /// # Errors
    ///
    /// [`Error::NoRefreshToken`] if none is held; otherwise the failed call's error.
    pub(crate) async fn refresh_session(&self) -> Result<AuthOutcome, Error> {
        let refresh_token = self.session.refresh_token().ok_or(Error::NoRefreshToken)?;

        let request = ApiRequest::post(endpoints::REFRESH_TOKEN)
            .json(&serde_json::json!({ "refreshToken": refresh_token }))?;
        self.start_session(&request, "Token refresh failed").await
    }

    /// Unauthenticated call whose JSON body is handed to the session store.
    pub(crate) async fn start_session(
        &self,
        request: &ApiRequest,
        fallback: &str,
    ) -> Result<AuthOutcome, Error> {
        let response = self.send_public(request, fallback).await?;
        let payload: JsonValue = self.read_json(response).await?;

        Ok(match self.session.set_auth(payload.clone()) {
            Some(auth) => AuthOutcome::SignedIn(auth),
            None => AuthOutcome::NotSignedIn(payload),
        })
    }

    /// Serialise refreshes: a caller whose token was already replaced by a
    /// concurrent refresh just retries with the new one.
    async fn recover(&self, rejected_token: Option<&str>) -> Result<Recovery, Error> {
        let _guard = self.cancellable(self.refresh_lock.lock()).await?;

        let current = self.session.token();
        if current.is_some() && current.as_deref() != rejected_token {
            tracing::debug!("Token already refreshed by another request");
            return Ok(Recovery::Retry);
        }

        Ok(match self.refresh_session().await? {
            AuthOutcome::SignedIn(_) => {
                tracing::info!("Access token refreshed");
                Recovery::Retry
            }
            AuthOutcome::NotSignedIn(_) => Recovery::SessionCleared,
        })
    }

    fn end_session(&self, clear: bool) {
        if clear {
            self.session.clear_auth();
        }
        if let Some(navigator) = &self.navigator {
            navigator.navigate(self.config.login_path());
        }
    }

    async fn execute(
        &self,
        request: &ApiRequest,
        token: Option<&str>,
    ) -> Result<reqwest::Response, Error> {
        let mut builder = self
            .http
            .request(request.method.clone(), self.config.endpoint(&request.path));
        if let Some(token) = token {
            builder = builder.bearer_auth(token);
        }
        builder = match &request.body {
            Body::Empty => builder,
            Body::Json(value) => builder.json(value),
            Body::Form(pairs) => builder.form(pairs),
        };

        let response = self.cancellable(builder.send()).await??;
        tracing::trace!(
            method = %request.method,
            path = %request.path,
            status = response.status().as_u16(),
            "Backend call"
        );
        Ok(response)
    }

    async fn ensure_success(
        &self,
        response: reqwest::Response,
        fallback: Option<&str>,
    ) -> Result<reqwest::Response, Error> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let generic = format!("API error: {status}");
        let message = self
            .error_message(response, fallback.unwrap_or(&generic))
            .await?;
        Err(Error::Api { status, message })
    }

    async fn error_message(
        &self,
        response: reqwest::Response,
        fallback: &str,
    ) -> Result<String, Error> {
        // An unreadable body is treated like an absent one.
        let body = self
            .cancellable(response.bytes())
            .await?
            .unwrap_or_default();
        Ok(extract_message(&body).unwrap_or_else(|| fallback.to_string()))
    }

    pub(crate) async fn read_json<T: DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, Error> {
        let body = self.cancellable(response.bytes()).await??;
        serde_json::from_slice(&body).map_err(|e| Error::Decode(e.to_string()))
    }

    /// Race `fut` against the scope's cancellation token. A result that
    /// arrives after cancellation is discarded.
    async fn cancellable<F: Future>(&self, fut: F) -> Result<F::Output, Error> {
        let Some(cancel) = &self.cancel else {
            return Ok(fut.await);
        };
        tokio::select! {
            () = cancel.cancelled() => Err(Error::Cancelled),
            output = fut => {
                if cancel.is_cancelled() {
                    Err(Error::Cancelled)
                } else {
                    Ok(output)
                }
            }
        }
    }
}

/// `message`, else a string `detail`, from a JSON error body.
fn extract_message(body: &[u8]) -> Option<String> {
    let value: JsonValue = serde_json::from_slice(body).ok()?;
    ["message", "detail"]
        .iter()
        .filter_map(|key| value.get(*key).and_then(JsonValue::as_str))
        .find(|msg| !msg.is_empty())
        .map(str::to_owned)
}
