//! Transport client: credential injection and transparent refresh.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;

use crate::error::{detail_from_body, ReplayKitError};
use crate::http_request::Request;
use crate::session::Session;
use crate::types::{TokenPair, TokenResponse};

const REFRESH_PATH: &str = "/api/auth/refresh";
const LOGOUT_PATH: &str = "/api/auth/logout";

/// Single point of outbound request dispatch.
///
/// Injects the bearer credential held by the [`Session`], and on a 401
/// response runs exactly one refresh-and-retry cycle per original request.
/// Credential refresh is single-flight: concurrent 401 handlers share one
/// exchange instead of racing their own.
pub struct ApiClient {
    http: Request,
    session: Arc<Session>,
    refresh_gate: RefreshGate,
}

/// Single-flight gate for credential refresh.
///
/// Callers record the epoch before queueing on the async mutex; a waiter
/// that observes an epoch advance after acquiring it knows the leader
/// already completed an exchange and reuses that outcome.
struct RefreshGate {
    lock: tokio::sync::Mutex<()>,
    epoch: AtomicU64,
}

impl ApiClient {
    /// Creates a client for the given API base URL.
    #[must_use]
    pub fn new(base_url: &str, session: Arc<Session>) -> Self {
        Self {
            http: Request::new(base_url),
            session,
            refresh_gate: RefreshGate {
                lock: tokio::sync::Mutex::new(()),
                epoch: AtomicU64::new(0),
            },
        }
    }

    /// The configured API base URL, without a trailing slash.
    #[must_use]
    pub fn base_url(&self) -> &str {
        self.http.base_url()
    }

    /// The shared session context.
    #[must_use]
    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    pub(crate) fn http(&self) -> &Request {
        &self.http
    }

    /// Sends an authenticated request, driving the refresh-retry protocol.
    ///
    /// `build` constructs the request anew for each attempt; the current
    /// access token is attached as a bearer header on top. The retry marker
    /// is a per-call local, so one original request can never run more than
    /// one refresh cycle even if the retried attempt fails with 401 again.
    pub(crate) async fn dispatch<F>(&self, build: F) -> Result<Response, ReplayKitError>
    where
        F: Fn() -> RequestBuilder,
    {
        let mut retried = false;
        loop {
            let mut builder = build();
            if let Some(token) = self.session.access_token() {
                builder = builder.bearer_auth(token);
            }
            let response = self.http.handle(builder).await?;

            if response.status() == StatusCode::UNAUTHORIZED && !retried {
                retried = true;
                if self.refresh().await {
                    // resend once with the renewed credential
                    continue;
                }
                // refresh already tore the session down; surface the
                // original failure to the caller
            }
            return Ok(response);
        }
    }

    /// Authenticated GET returning a decoded JSON body.
    pub(crate) async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, ReplayKitError> {
        let response = self
            .dispatch(|| {
                let builder = self.http.get(path);
                if query.is_empty() {
                    builder
                } else {
                    builder.query(query)
                }
            })
            .await?;
        decode(response).await
    }

    /// Authenticated DELETE; the response body is ignored.
    pub(crate) async fn delete(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<(), ReplayKitError> {
        let response = self
            .dispatch(|| self.http.delete(path).query(query))
            .await?;
        check(response).await.map(|_| ())
    }

    /// Authenticated multipart POST returning a decoded JSON body.
    ///
    /// `make_form` is invoked per attempt; multipart bodies cannot be
    /// cloned for a refresh-retry, so the form is rebuilt instead.
    pub(crate) async fn post_multipart<T, F>(
        &self,
        path: &str,
        make_form: F,
    ) -> Result<T, ReplayKitError>
    where
        T: DeserializeOwned,
        F: Fn() -> reqwest::multipart::Form,
    {
        let response = self
            .dispatch(|| self.http.post(path).multipart(make_form()))
            .await?;
        decode(response).await
    }

    /// Exchanges the refresh token for a new credential pair.
    ///
    /// Single-flight: among concurrent callers exactly one exchange reaches
    /// the server; the rest reuse its outcome. Returns `false` when no
    /// refresh token is held or the exchange fails — failure tears the
    /// session down (best-effort server logout, then local clear).
    pub async fn refresh(&self) -> bool {
        let entered = self.refresh_gate.epoch.load(Ordering::Acquire);
        let _guard = self.refresh_gate.lock.lock().await;
        if self.refresh_gate.epoch.load(Ordering::Acquire) != entered {
            // the leader completed an exchange while we queued; reuse it
            return self.session.access_token().is_some();
        }

        let Some(refresh_token) = self.session.refresh_token() else {
            return false;
        };

        match self.exchange(&refresh_token).await {
            Ok(pair) => {
                self.session.set_tokens(pair);
                self.refresh_gate.epoch.fetch_add(1, Ordering::Release);
                true
            }
            Err(err) => {
                log::warn!("credential refresh failed, tearing session down: {err}");
                self.teardown().await;
                false
            }
        }
    }

    async fn exchange(&self, refresh_token: &str) -> Result<TokenPair, ReplayKitError> {
        let body = serde_json::json!({ "refresh_token": refresh_token });
        let response = self
            .http
            .handle(self.http.post(REFRESH_PATH).json(&body))
            .await?;
        let envelope: TokenResponse = decode(response).await?;
        Ok(envelope.into_pair())
    }

    /// Best-effort server-side invalidation followed by an unconditional
    /// local clear. Server failures never prevent the local logout.
    pub(crate) async fn teardown(&self) {
        if let Some(token) = self.session.access_token() {
            // single attempt, no refresh-retry: the credential may already
            // be dead and the clear below must happen regardless
            let builder = self.http.post(LOGOUT_PATH).bearer_auth(token);
            if let Err(err) = self.http.handle(builder).await {
                log::debug!("server-side logout failed: {err}");
            }
        }
        self.session.clear();
    }
}

/// Maps a failure-status response to the crate error, extracting the
/// server's `detail` message.
pub(crate) async fn check(response: Response) -> Result<Response, ReplayKitError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let detail = detail_from_body(status, &body);
    if status == StatusCode::UNAUTHORIZED {
        Err(ReplayKitError::Unauthorized { detail })
    } else {
        Err(ReplayKitError::Api {
            status: status.as_u16(),
            detail,
        })
    }
}

/// Checks the status and decodes the JSON body.
pub(crate) async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ReplayKitError> {
    let response = check(response).await?;
    response
        .json()
        .await
        .map_err(|err| ReplayKitError::Serialization {
            error: format!("failed to decode response body: {err}"),
        })
}
