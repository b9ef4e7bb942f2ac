//! HTTP client for the remote catalog.

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::AUTHORIZATION;
use reqwest::{Client, Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde_json::json;
use url::Url;

use super::models::{Channel, Organization, Page, Subscription};
use super::RemoteCatalog;
use crate::auth::AuthTokenGuard;
use crate::error::RemoteError;
use crate::storage::RemoteConfig;

pub struct HttpCatalog {
    client: Client,
    base_url: Url,
    client_type: String,
    auth: Arc<AuthTokenGuard>,
}

impl HttpCatalog {
    /// Marker header sent with every request.
    pub const CLIENT_TYPE_HEADER: &'static str = "X-Client-Type";

    pub fn new(config: &RemoteConfig, auth: Arc<AuthTokenGuard>) -> Result<Self, RemoteError> {
        let base_url = Url::parse(&config.base_url)?;
        if base_url.cannot_be_a_base() {
            return Err(RemoteError::InvalidUrl(url::ParseError::RelativeUrlWithCannotBeABaseBase));
        }
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url,
            client_type: config.client_type.clone(),
            auth,
        })
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// Authenticated request builder. Fails fast without a valid credential.
    fn request(&self, method: Method, url: Url) -> Result<RequestBuilder, RemoteError> {
        let header = self.auth.auth_header().ok_or(RemoteError::NotAuthenticated)?;
        Ok(self
            .client
            .request(method, url)
            .header(AUTHORIZATION, header)
            .header(Self::CLIENT_TYPE_HEADER, &self.client_type))
    }

    async fn send(&self, request: RequestBuilder) -> Result<reqwest::Response, RemoteError> {
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RemoteError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    async fn get_json<T: DeserializeOwned>(&self, segments: &[&str]) -> Result<T, RemoteError> {
        let url = self.endpoint(segments);
        tracing::debug!(%url, "GET");
        let request = self.request(Method::GET, url)?;
        let bytes = self.send(request).await?.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| RemoteError::Decode(e.to_string()))
    }
}

impl RemoteCatalog for HttpCatalog {
    async fn list_organizations(&self) -> Result<Page<Organization>, RemoteError> {
        self.get_json(&["organizations"]).await
    }

    async fn list_channels(&self) -> Result<Page<Channel>, RemoteError> {
        self.get_json(&["channels"]).await
    }

    async fn list_subscriptions(&self, user_id: &str) -> Result<Page<Subscription>, RemoteError> {
        self.get_json(&["users", user_id, "subscriptions"]).await
    }

    async fn subscribe(&self, user_id: &str, channel_id: &str) -> Result<Subscription, RemoteError> {
        let url = self.endpoint(&["users", user_id, "subscriptions"]);
        let request = self
            .request(Method::POST, url)?
            .json(&json!({ "channelId": channel_id }));
        let bytes = self.send(request).await?.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| RemoteError::Decode(e.to_string()))
    }

    async fn unsubscribe(&self, user_id: &str, channel_id: &str) -> Result<(), RemoteError> {
        let url = self.endpoint(&["users", user_id, "subscriptions", channel_id]);
        let request = self.request(Method::DELETE, url)?;
        self.send(request).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{MemoryTokenStore, UserIdentity};

    fn guard(authenticated: bool) -> Arc<AuthTokenGuard> {
        let guard = AuthTokenGuard::new(MemoryTokenStore::default()).unwrap();
        if authenticated {
            guard
                .save_auth_data("tok-123", "2099-01-01T00:00:00Z", UserIdentity::new("u1"))
                .unwrap();
        }
        Arc::new(guard)
    }

    fn catalog(base_url: String, auth: Arc<AuthTokenGuard>) -> HttpCatalog {
        let config = RemoteConfig {
            base_url,
            ..RemoteConfig::default()
        };
        HttpCatalog::new(&config, auth).unwrap()
    }

    #[tokio::test]
    async fn list_organizations_sends_bearer_and_client_type() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/organizations")
            .match_header("authorization", "Bearer tok-123")
            .match_header("x-client-type", "desktop")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"items":[{"id":"o1","name":"Engineering"}],"total":1}"#)
            .create_async()
            .await;

        let page = catalog(server.url(), guard(true))
            .list_organizations()
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].name, "Engineering");
    }

    #[tokio::test]
    async fn base_path_is_preserved() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/v1/users/u1/subscriptions")
            .with_status(200)
            .with_body(r#"{"items":[],"total":0}"#)
            .create_async()
            .await;

        let page = catalog(format!("{}/v1", server.url()), guard(true))
            .list_subscriptions("u1")
            .await
            .unwrap();

        mock.assert_async().await;
        assert!(page.items.is_empty());
    }

    #[tokio::test]
    async fn unauthenticated_calls_never_reach_the_server() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/channels")
            .expect(0)
            .create_async()
            .await;

        let err = catalog(server.url(), guard(false))
            .list_channels()
            .await
            .unwrap_err();

        mock.assert_async().await;
        assert!(matches!(err, RemoteError::NotAuthenticated));
    }

    #[tokio::test]
    async fn error_status_is_reported() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/channels")
            .with_status(503)
            .with_body("maintenance")
            .create_async()
            .await;

        let err = catalog(server.url(), guard(true))
            .list_channels()
            .await
            .unwrap_err();

        match err {
            RemoteError::Status { status, body } => {
                assert_eq!(status, 503);
                assert_eq!(body, "maintenance");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn malformed_body_is_a_decode_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/organizations")
            .with_status(200)
            .with_body("<html>oops</html>")
            .create_async()
            .await;

        let err = catalog(server.url(), guard(true))
            .list_organizations()
            .await
            .unwrap_err();
        assert!(matches!(err, RemoteError::Decode(_)));
    }

    #[tokio::test]
    async fn subscribe_posts_channel_id() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/users/u1/subscriptions")
            .match_body(mockito::Matcher::Json(json!({ "channelId": "ch-9" })))
            .with_status(201)
            .with_body(
                r#"{"id":"s1","userId":"u1","channelId":"ch-9","createdAt":"2025-02-01T10:00:00Z"}"#,
            )
            .create_async()
            .await;

        let sub = catalog(server.url(), guard(true))
            .subscribe("u1", "ch-9")
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(sub.channel_id, "ch-9");
    }

    #[tokio::test]
    async fn unsubscribe_deletes_channel_path() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("DELETE", "/users/u1/subscriptions/ch-9")
            .with_status(204)
            .create_async()
            .await;

        catalog(server.url(), guard(true))
            .unsubscribe("u1", "ch-9")
            .await
            .unwrap();
        mock.assert_async().await;
    }

    #[test]
    fn rejects_unusable_base_url() {
        let config = RemoteConfig {
            base_url: "mailto:someone@example.com".into(),
            ..RemoteConfig::default()
        };
        assert!(matches!(
            HttpCatalog::new(&config, guard(false)),
            Err(RemoteError::InvalidUrl(_))
        ));
    }
}
