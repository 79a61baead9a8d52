//! Session manager: login, logout, refresh and profile operations.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crate::client::{self, ApiClient};
use crate::error::ReplayKitError;
use crate::session::Session;
use crate::types::{TokenResponse, UserProfile};

const LOGIN_PATH: &str = "/api/auth/login";
const ME_PATH: &str = "/api/auth/me";

const LOGIN_FALLBACK_MESSAGE: &str = "Login failed. Check your credentials.";

/// Owns the session lifecycle: authentication, credential renewal and
/// profile hydration.
///
/// Operations never propagate transport faults to callers; failures land in
/// the boolean/option contracts and the user-facing [`error`](Self::error)
/// slot. Authorization predicates live on the shared [`Session`] context,
/// which route guards consume directly.
pub struct SessionManager {
    api: Arc<ApiClient>,
    loading: AtomicBool,
    error: Mutex<Option<String>>,
}

impl SessionManager {
    /// Creates a manager over the given transport client.
    #[must_use]
    pub fn new(api: Arc<ApiClient>) -> Self {
        Self {
            api,
            loading: AtomicBool::new(false),
            error: Mutex::new(None),
        }
    }

    /// The shared session context.
    #[must_use]
    pub fn session(&self) -> &Arc<Session> {
        self.api.session()
    }

    /// Authenticates with username and password.
    ///
    /// On success the returned credential pair is stored atomically and the
    /// profile is fetched. On failure the error slot carries the server's
    /// detail message, or a generic fallback.
    pub async fn login(&self, username: &str, password: &str) -> bool {
        self.loading.store(true, Ordering::Release);
        self.set_error(None);

        let result = self.login_inner(username, password).await;
        self.loading.store(false, Ordering::Release);

        match result {
            Ok(()) => true,
            Err(err) => {
                log::warn!("login failed: {err}");
                let message = match err {
                    ReplayKitError::Unauthorized { detail } | ReplayKitError::Api { detail, .. } => {
                        detail
                    }
                    _ => LOGIN_FALLBACK_MESSAGE.to_string(),
                };
                self.set_error(Some(message));
                false
            }
        }
    }

    async fn login_inner(&self, username: &str, password: &str) -> Result<(), ReplayKitError> {
        // dispatched unauthenticated: a rejected login is a bad credential,
        // not an expired session, and must not enter the refresh-retry path
        let http = self.api.http();
        let body = serde_json::json!({ "username": username, "password": password });
        let response = http.handle(http.post(LOGIN_PATH).json(&body)).await?;
        let envelope: TokenResponse = client::decode(response).await?;
        self.session().set_tokens(envelope.into_pair());

        // profile hydration is best-effort here; login already succeeded
        self.fetch_profile().await;
        Ok(())
    }

    /// Fetches the authenticated profile into the session.
    ///
    /// Returns `None` without an access token. The request runs through the
    /// transparent-refresh transport; a 401 that survives that one retry
    /// means the session is dead beyond repair, so it is logged out.
    pub async fn fetch_profile(&self) -> Option<UserProfile> {
        self.session().access_token()?;

        match self.api.get_json::<UserProfile>(ME_PATH, &[]).await {
            Ok(profile) => {
                self.session().set_profile(Some(profile.clone()));
                Some(profile)
            }
            Err(ReplayKitError::Unauthorized { .. }) => {
                self.logout().await;
                None
            }
            Err(err) => {
                log::warn!("profile fetch failed: {err}");
                None
            }
        }
    }

    /// Exchanges the refresh token for a new credential pair.
    ///
    /// Delegates to the transport's single shared refresh routine, so a
    /// manual renewal and concurrent 401 handlers can never race separate
    /// exchanges. Returns `false` when no refresh token is held or the
    /// exchange fails; failure tears the session down.
    pub async fn refresh(&self) -> bool {
        self.api.refresh().await
    }

    /// Logs out: best-effort server-side invalidation, then an
    /// unconditional local clear of tokens and profile.
    pub async fn logout(&self) {
        self.api.teardown().await;
    }

    /// Rehydrates a session restored from persistence by fetching the
    /// profile; a no-op when no access token was restored.
    pub async fn init(&self) {
        if self.session().access_token().is_some() {
            self.fetch_profile().await;
        }
    }

    /// True while a login is in flight.
    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.loading.load(Ordering::Acquire)
    }

    /// Current user-facing error message, if any.
    #[must_use]
    pub fn error(&self) -> Option<String> {
        self.error
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Clears the error slot.
    pub fn clear_error(&self) {
        self.set_error(None);
    }

    fn set_error(&self, message: Option<String>) {
        *self.error.lock().unwrap_or_else(PoisonError::into_inner) = message;
    }
}
