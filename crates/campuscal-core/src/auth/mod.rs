//! Bearer credential tracking.
//!
//! [`AuthTokenGuard`] owns the current credential, answers whether it is
//! still valid, and hands out the `Authorization` header for remote calls.
//! It never refreshes a token itself; whoever logs the user in replaces it
//! through [`AuthTokenGuard::save_auth_data`].
//!
//! Authentication transitions are published as a plain [`AuthState`] value
//! on a `tokio::sync::watch` channel so any front end can follow them.

mod store;

pub use store::{DatabaseTokenStore, KeyringTokenStore, MemoryTokenStore, TokenStore};

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::DateTime;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::clock::{Clock, SystemClock};
use crate::error::AuthError;

/// Who a credential belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
}

impl UserIdentity {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            email: None,
            display_name: None,
        }
    }
}

/// A stored bearer credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthToken {
    pub value: String,
    /// RFC 3339 timestamp as received. Kept raw so an unparsable value is
    /// still stored and still reads as expired.
    pub expires_at: String,
    pub user: UserIdentity,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthState {
    Unauthenticated,
    Authenticated(UserIdentity),
    Error(String),
}

pub struct AuthTokenGuard {
    store: Box<dyn TokenStore>,
    clock: Arc<dyn Clock>,
    token: Mutex<Option<AuthToken>>,
    state: watch::Sender<AuthState>,
}

impl AuthTokenGuard {
    /// Load any stored credential using the system clock.
    pub fn new(store: impl TokenStore + 'static) -> Result<Self, AuthError> {
        Self::with_clock(store, Arc::new(SystemClock))
    }

    pub fn with_clock(
        store: impl TokenStore + 'static,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, AuthError> {
        let token = store.load()?;
        let guard = Self {
            store: Box::new(store),
            clock,
            token: Mutex::new(None),
            state: watch::channel(AuthState::Unauthenticated).0,
        };

        let initial = match &token {
            Some(t) if !guard.is_expired(Some(&t.expires_at)) => {
                AuthState::Authenticated(t.user.clone())
            }
            _ => AuthState::Unauthenticated,
        };
        *guard.lock() = token;
        guard.state.send_replace(initial);
        Ok(guard)
    }

    fn lock(&self) -> MutexGuard<'_, Option<AuthToken>> {
        self.token.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Missing or unparsable expiry counts as expired.
    pub fn is_expired(&self, expiry: Option<&str>) -> bool {
        let Some(raw) = expiry else {
            return true;
        };
        match DateTime::parse_from_rfc3339(raw.trim()) {
            Ok(at) => self.clock.now() >= at,
            Err(_) => true,
        }
    }

    /// Token present and not expired.
    pub fn is_authenticated(&self) -> bool {
        self.lock()
            .as_ref()
            .is_some_and(|t| !self.is_expired(Some(&t.expires_at)))
    }

    /// `Bearer <token>` while authenticated, otherwise `None`.
    ///
    /// `None` means the call must not be made.
    pub fn auth_header(&self) -> Option<String> {
        let guard = self.lock();
        let token = guard.as_ref()?;
        if self.is_expired(Some(&token.expires_at)) {
            return None;
        }
        Some(format!("Bearer {}", token.value))
    }

    /// Owner of the current credential while authenticated.
    pub fn current_user(&self) -> Option<UserIdentity> {
        let guard = self.lock();
        guard
            .as_ref()
            .filter(|t| !self.is_expired(Some(&t.expires_at)))
            .map(|t| t.user.clone())
    }

    /// Replace token, expiry and identity in one step.
    ///
    /// Nothing changes if the store rejects the write.
    pub fn save_auth_data(
        &self,
        value: impl Into<String>,
        expires_at: impl Into<String>,
        user: UserIdentity,
    ) -> Result<(), AuthError> {
        let token = AuthToken {
            value: value.into(),
            expires_at: expires_at.into(),
            user,
        };

        let mut guard = self.lock();
        self.store.save(&token)?;
        let state = if self.is_expired(Some(&token.expires_at)) {
            AuthState::Unauthenticated
        } else {
            AuthState::Authenticated(token.user.clone())
        };
        *guard = Some(token);
        self.publish(state);
        Ok(())
    }

    /// Wipe the credential. Memory is cleared even if the store fails.
    pub fn clear_auth_data(&self) -> Result<(), AuthError> {
        let mut guard = self.lock();
        *guard = None;
        self.publish(AuthState::Unauthenticated);
        self.store.clear()
    }

    /// Publish a login failure without touching the stored credential.
    pub fn report_error(&self, message: impl Into<String>) {
        self.publish(AuthState::Error(message.into()));
    }

    /// Re-evaluate expiry and publish `Unauthenticated` if the token lapsed.
    pub fn refresh_state(&self) -> AuthState {
        let authenticated = self.is_authenticated();
        if !authenticated && matches!(*self.state.borrow(), AuthState::Authenticated(_)) {
            self.publish(AuthState::Unauthenticated);
        }
        self.state()
    }

    pub fn state(&self) -> AuthState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.state.subscribe()
    }

    fn publish(&self, state: AuthState) {
        tracing::debug!(?state, "auth state changed");
        self.state.send_replace(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use chrono::{Duration, TimeZone, Utc};

    fn clock() -> ManualClock {
        ManualClock::new(Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap())
    }

    fn guard_with(store: MemoryTokenStore, clock: &ManualClock) -> AuthTokenGuard {
        AuthTokenGuard::with_clock(store, Arc::new(clock.clone())).unwrap()
    }

    #[test]
    fn starts_unauthenticated_with_empty_store() {
        let clock = clock();
        let guard = guard_with(MemoryTokenStore::default(), &clock);
        assert!(!guard.is_authenticated());
        assert_eq!(guard.auth_header(), None);
        assert_eq!(guard.state(), AuthState::Unauthenticated);
    }

    #[test]
    fn save_then_header() {
        let clock = clock();
        let guard = guard_with(MemoryTokenStore::default(), &clock);
        guard
            .save_auth_data("abc", "2025-03-01T10:00:00Z", UserIdentity::new("u1"))
            .unwrap();

        assert!(guard.is_authenticated());
        assert_eq!(guard.auth_header().as_deref(), Some("Bearer abc"));
        assert_eq!(
            guard.state(),
            AuthState::Authenticated(UserIdentity::new("u1"))
        );
    }

    #[test]
    fn past_expiry_hides_header_but_keeps_token() {
        let clock = clock();
        let store = MemoryTokenStore::default();
        let guard = guard_with(store.clone(), &clock);
        guard
            .save_auth_data("abc", "2025-03-01T08:00:00Z", UserIdentity::new("u1"))
            .unwrap();

        assert_eq!(guard.auth_header(), None);
        assert!(!guard.is_authenticated());
        assert!(store.load().unwrap().is_some());
    }

    #[test]
    fn header_disappears_when_clock_passes_expiry() {
        let clock = clock();
        let guard = guard_with(MemoryTokenStore::default(), &clock);
        guard
            .save_auth_data("abc", "2025-03-01T09:30:00Z", UserIdentity::new("u1"))
            .unwrap();
        assert!(guard.auth_header().is_some());

        clock.advance(Duration::minutes(31));
        assert_eq!(guard.auth_header(), None);
        assert_eq!(guard.refresh_state(), AuthState::Unauthenticated);
    }

    #[test]
    fn missing_or_garbage_expiry_is_expired() {
        let clock = clock();
        let guard = guard_with(MemoryTokenStore::default(), &clock);
        assert!(guard.is_expired(None));
        assert!(guard.is_expired(Some("")));
        assert!(guard.is_expired(Some("next tuesday")));
        assert!(!guard.is_expired(Some("2030-01-01T00:00:00+01:00")));
    }

    #[test]
    fn clear_resets_signal() {
        let clock = clock();
        let store = MemoryTokenStore::default();
        let guard = guard_with(store.clone(), &clock);
        let rx = guard.subscribe();
        guard
            .save_auth_data("abc", "2025-03-02T00:00:00Z", UserIdentity::new("u1"))
            .unwrap();
        guard.clear_auth_data().unwrap();

        assert_eq!(*rx.borrow(), AuthState::Unauthenticated);
        assert!(store.load().unwrap().is_none());
        assert_eq!(guard.current_user(), None);
    }

    #[test]
    fn loads_stored_credential_on_construction() {
        let clock = clock();
        let store = MemoryTokenStore::default();
        store
            .save(&AuthToken {
                value: "persisted".into(),
                expires_at: "2025-03-05T00:00:00Z".into(),
                user: UserIdentity::new("u9"),
            })
            .unwrap();

        let guard = guard_with(store, &clock);
        assert_eq!(guard.auth_header().as_deref(), Some("Bearer persisted"));
        assert_eq!(guard.current_user().map(|u| u.id), Some("u9".to_string()));
    }

    #[test]
    fn report_error_keeps_credential() {
        let clock = clock();
        let guard = guard_with(MemoryTokenStore::default(), &clock);
        guard
            .save_auth_data("abc", "2025-03-02T00:00:00Z", UserIdentity::new("u1"))
            .unwrap();
        guard.report_error("login rejected");
        assert_eq!(guard.state(), AuthState::Error("login rejected".into()));
        assert!(guard.is_authenticated());
    }
}
