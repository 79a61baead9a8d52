//! Shared session context owning the credential pair and user profile.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::storage::{KeyValueStore, ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY};
use crate::types::{Role, TokenPair, UserProfile};

/// Context object owning the credential pair and the authenticated profile.
///
/// One instance is shared by dependency injection (`Arc`) between the
/// session manager, the transport client and any route-guard layer. All
/// credential mutation funnels through here, so the persisted pair always
/// comes from a single exchange: access and refresh token are written and
/// cleared together.
pub struct Session {
    store: Arc<dyn KeyValueStore>,
    tokens: Mutex<Option<TokenPair>>,
    profile: Mutex<Option<UserProfile>>,
}

impl Session {
    /// Creates a session context, restoring a persisted credential pair.
    ///
    /// A half-persisted pair (one token without the other) violates the
    /// pair invariant and is scrubbed from the store instead of restored.
    #[must_use]
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        let tokens = match (store.get(ACCESS_TOKEN_KEY), store.get(REFRESH_TOKEN_KEY)) {
            (Some(access_token), Some(refresh_token)) => Some(TokenPair {
                access_token,
                refresh_token,
            }),
            (None, None) => None,
            _ => {
                store.remove(ACCESS_TOKEN_KEY);
                store.remove(REFRESH_TOKEN_KEY);
                None
            }
        };

        Self {
            store,
            tokens: Mutex::new(tokens),
            profile: Mutex::new(None),
        }
    }

    fn lock_tokens(&self) -> MutexGuard<'_, Option<TokenPair>> {
        self.tokens.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_profile(&self) -> MutexGuard<'_, Option<UserProfile>> {
        self.profile.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replaces the credential pair, persisting both tokens together.
    pub fn set_tokens(&self, pair: TokenPair) {
        let mut guard = self.lock_tokens();
        self.store.set(ACCESS_TOKEN_KEY, &pair.access_token);
        self.store.set(REFRESH_TOKEN_KEY, &pair.refresh_token);
        *guard = Some(pair);
    }

    /// Clears tokens and profile, in memory and in the store.
    pub fn clear(&self) {
        {
            let mut guard = self.lock_tokens();
            self.store.remove(ACCESS_TOKEN_KEY);
            self.store.remove(REFRESH_TOKEN_KEY);
            *guard = None;
        }
        *self.lock_profile() = None;
    }

    /// The current access token, if a pair is held.
    #[must_use]
    pub fn access_token(&self) -> Option<String> {
        self.lock_tokens()
            .as_ref()
            .map(|pair| pair.access_token.clone())
    }

    /// The current refresh token, if a pair is held.
    #[must_use]
    pub fn refresh_token(&self) -> Option<String> {
        self.lock_tokens()
            .as_ref()
            .map(|pair| pair.refresh_token.clone())
    }

    /// Replaces the authenticated profile.
    pub fn set_profile(&self, profile: Option<UserProfile>) {
        *self.lock_profile() = profile;
    }

    /// The authenticated profile, if fetched.
    #[must_use]
    pub fn profile(&self) -> Option<UserProfile> {
        self.lock_profile().clone()
    }

    /// True once an access token and a profile are both held.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.access_token().is_some() && self.lock_profile().is_some()
    }

    /// The authenticated role, `Viewer` when no profile is held.
    #[must_use]
    pub fn role(&self) -> Role {
        self.lock_profile()
            .as_ref()
            .map_or_else(Role::default, |profile| profile.role)
    }

    /// True for administrators.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role() == Role::Admin
    }

    /// True for auditors and administrators.
    #[must_use]
    pub fn is_auditor_or_admin(&self) -> bool {
        matches!(self.role(), Role::Admin | Role::Auditor)
    }

    /// Display name of the authenticated user, falling back to the
    /// username, then to the empty string.
    #[must_use]
    pub fn display_name(&self) -> String {
        self.lock_profile().as_ref().map_or_else(String::new, |p| {
            p.display_name.clone().unwrap_or_else(|| p.username.clone())
        })
    }
}
