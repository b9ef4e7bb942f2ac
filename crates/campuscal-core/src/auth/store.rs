//! Credential persistence backends.

use std::sync::{Arc, Mutex};

use super::AuthToken;
use crate::error::AuthError;
use crate::storage::Database;

/// Where the guard keeps its credential between runs.
pub trait TokenStore: Send + Sync {
    fn load(&self) -> Result<Option<AuthToken>, AuthError>;
    fn save(&self, token: &AuthToken) -> Result<(), AuthError>;
    fn clear(&self) -> Result<(), AuthError>;
}

fn store_err(e: impl std::fmt::Display) -> AuthError {
    AuthError::Store(e.to_string())
}

/// OS keyring, one JSON entry per account.
pub struct KeyringTokenStore {
    service: String,
    account: String,
}

impl KeyringTokenStore {
    const SERVICE: &'static str = "campuscal";

    pub fn new(account: impl Into<String>) -> Self {
        Self {
            service: Self::SERVICE.to_string(),
            account: account.into(),
        }
    }

    fn entry(&self) -> Result<keyring::Entry, AuthError> {
        keyring::Entry::new(&self.service, &self.account).map_err(store_err)
    }
}

impl Default for KeyringTokenStore {
    fn default() -> Self {
        Self::new("session")
    }
}

impl TokenStore for KeyringTokenStore {
    fn load(&self) -> Result<Option<AuthToken>, AuthError> {
        match self.entry()?.get_password() {
            Ok(json) => serde_json::from_str(&json).map(Some).map_err(store_err),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(store_err(e)),
        }
    }

    fn save(&self, token: &AuthToken) -> Result<(), AuthError> {
        let json = serde_json::to_string(token).map_err(store_err)?;
        self.entry()?.set_password(&json).map_err(store_err)
    }

    fn clear(&self) -> Result<(), AuthError> {
        match self.entry()?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(store_err(e)),
        }
    }
}

/// Credential kept in the cache database's kv table.
pub struct DatabaseTokenStore {
    db: Arc<Database>,
}

impl DatabaseTokenStore {
    const KEY: &'static str = "auth.token";

    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }
}

impl TokenStore for DatabaseTokenStore {
    fn load(&self) -> Result<Option<AuthToken>, AuthError> {
        match self.db.kv_get(Self::KEY).map_err(store_err)? {
            Some(json) => serde_json::from_str(&json).map(Some).map_err(store_err),
            None => Ok(None),
        }
    }

    fn save(&self, token: &AuthToken) -> Result<(), AuthError> {
        let json = serde_json::to_string(token).map_err(store_err)?;
        self.db.kv_set(Self::KEY, &json).map_err(store_err)
    }

    fn clear(&self) -> Result<(), AuthError> {
        self.db.kv_delete(Self::KEY).map_err(store_err)
    }
}

/// In-process store. Clones share the same slot.
#[derive(Debug, Clone, Default)]
pub struct MemoryTokenStore {
    slot: Arc<Mutex<Option<AuthToken>>>,
}

impl TokenStore for MemoryTokenStore {
    fn load(&self) -> Result<Option<AuthToken>, AuthError> {
        Ok(self.slot.lock().unwrap_or_else(|e| e.into_inner()).clone())
    }

    fn save(&self, token: &AuthToken) -> Result<(), AuthError> {
        *self.slot.lock().unwrap_or_else(|e| e.into_inner()) = Some(token.clone());
        Ok(())
    }

    fn clear(&self) -> Result<(), AuthError> {
        *self.slot.lock().unwrap_or_else(|e| e.into_inner()) = None;
        Ok(())
    }
}
