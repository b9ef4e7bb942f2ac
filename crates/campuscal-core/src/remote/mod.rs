//! Remote catalog of organizations, channels and subscriptions.
//!
//! [`RemoteCatalog`] is the seam the sync layer talks to; [`HttpCatalog`]
//! is the production implementation.

mod http;
pub mod models;

pub use http::HttpCatalog;
pub use models::{Channel, Organization, Page, Subscription};

use std::future::Future;

use crate::error::RemoteError;

pub trait RemoteCatalog: Send + Sync {
    fn list_organizations(
        &self,
    ) -> impl Future<Output = Result<Page<Organization>, RemoteError>> + Send;

    fn list_channels(&self) -> impl Future<Output = Result<Page<Channel>, RemoteError>> + Send;

    fn list_subscriptions(
        &self,
        user_id: &str,
    ) -> impl Future<Output = Result<Page<Subscription>, RemoteError>> + Send;

    fn subscribe(
        &self,
        user_id: &str,
        channel_id: &str,
    ) -> impl Future<Output = Result<Subscription, RemoteError>> + Send;

    fn unsubscribe(
        &self,
        user_id: &str,
        channel_id: &str,
    ) -> impl Future<Output = Result<(), RemoteError>> + Send;
}
