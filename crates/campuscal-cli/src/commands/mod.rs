//! Subcommand handlers and the shared session setup they use.

pub mod auth;
pub mod calendar;
pub mod catalog;
pub mod config;
pub mod event;
pub mod sync;

use std::error::Error;
use std::sync::Arc;

use campuscal_core::{
    AuthTokenGuard, Config, Database, HttpCatalog, KeyringTokenStore, SyncCoordinator,
};

pub type CmdResult = Result<(), Box<dyn Error>>;

pub fn open_database() -> Result<Arc<Database>, Box<dyn Error>> {
    Ok(Arc::new(Database::open()?))
}

/// Credential guard backed by the OS keyring.
pub fn auth_guard() -> Result<Arc<AuthTokenGuard>, Box<dyn Error>> {
    Ok(Arc::new(AuthTokenGuard::new(KeyringTokenStore::default())?))
}

/// Sync coordinator wired to the configured remote, the cache and the
/// keyring credential.
pub fn coordinator() -> Result<SyncCoordinator<HttpCatalog>, Box<dyn Error>> {
    let config = Config::load()?;
    let db = open_database()?;
    let auth = auth_guard()?;
    let catalog = HttpCatalog::new(&config.remote, Arc::clone(&auth))?;
    Ok(SyncCoordinator::new(catalog, db, auth, config.sync))
}

pub fn runtime() -> Result<tokio::runtime::Runtime, Box<dyn Error>> {
    Ok(tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?)
}
