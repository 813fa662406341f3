//! Path-scoped views of a [`Resource`].

use crate::client::config::CallConfig;
use crate::client::resource::Resource;
use crate::client::utils::join_route;
use crate::error::Result;
use crate::events::EventEmitter;
use crate::types::{QueryValue, Response};
use serde_json::Value;
use std::fmt;
use std::time::SystemTime;

/// A [`Resource`] seen through a fixed path prefix.
///
/// Every verb prefixes its URL with the route path. Headers, credentials and
/// tokens are the origin resource's own, so changes through either handle
/// are visible through both.
pub struct Route {
    origin: Resource,
    path: String,
}

impl Route {
    pub(crate) fn new(origin: Resource, path: &str) -> Self {
        Route {
            origin,
            path: path.trim().trim_end_matches('/').to_string(),
        }
    }

    /// Path prefix of this route
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Resource this route scopes
    pub fn resource(&self) -> &Resource {
        &self.origin
    }

    /// Base URL of the resource extended by the route path
    pub fn base_url(&self) -> Result<String> {
        self.origin.prepare_url(&self.path)
    }

    /// Fully qualified URL of `uri` below the route path.
    pub fn prepare_url(&self, uri: &str) -> Result<String> {
        self.origin.prepare_url(&join_route(&self.path, uri))
    }

    /// Route nested below this one
    pub fn route(&self, path: &str) -> Route {
        Route::new(self.origin.handle(), &join_route(&self.path, path))
    }

    fn scoped(&self, call: CallConfig) -> CallConfig {
        let url = join_route(&self.path, call.url.as_deref().unwrap_or_default());
        CallConfig {
            url: Some(url),
            ..call
        }
    }

    // Forwarded to the origin resource

    /// Observer list of the origin resource
    pub fn events(&self) -> &EventEmitter {
        self.origin.events()
    }

    /// Set a header on the origin resource
    pub fn set_header(&self, name: &str, value: &str) {
        self.origin.set_header(name, value)
    }

    /// Remove a header from the origin resource
    pub fn remove_header(&self, name: &str) -> Option<String> {
        self.origin.remove_header(name)
    }

    /// Set a query parameter on the origin resource
    pub fn set_parameter(&self, name: &str, value: impl Into<QueryValue>) {
        self.origin.set_parameter(name, value)
    }

    /// Remove a query parameter from the origin resource
    pub fn remove_parameter(&self, name: &str) -> Option<QueryValue> {
        self.origin.remove_parameter(name)
    }

    /// Basic-auth username of the origin resource
    pub fn username(&self) -> Option<String> {
        self.origin.username()
    }

    /// Set the basic-auth username of the origin resource
    pub fn set_username(&self, value: Option<&str>) {
        self.origin.set_username(value)
    }

    /// Set the basic-auth password of the origin resource
    pub fn set_password(&self, value: Option<&str>) {
        self.origin.set_password(value)
    }

    /// Set the access token of the origin resource
    pub fn set_access_token(
        &self,
        token: Option<&str>,
        token_type: Option<&str>,
        expiration: Option<SystemTime>,
    ) {
        self.origin.set_access_token(token, token_type, expiration)
    }

    // Requests

    /// Send `call` below the route path with an explicit method
    pub async fn request(&self, method: &str, call: impl Into<CallConfig>) -> Result<Response> {
        self.origin.request(method, self.scoped(call.into())).await
    }

    /// `OPTIONS` request
    pub async fn options(&self, call: impl Into<CallConfig>) -> Result<Response> {
        self.origin.options(self.scoped(call.into())).await
    }

    /// `HEAD` request
    pub async fn head(&self, call: impl Into<CallConfig>) -> Result<Response> {
        self.origin.head(self.scoped(call.into())).await
    }

    /// `GET` request
    pub async fn get(&self, call: impl Into<CallConfig>) -> Result<Response> {
        self.origin.get(self.scoped(call.into())).await
    }

    /// `POST` request
    pub async fn post(&self, call: impl Into<CallConfig>) -> Result<Response> {
        self.origin.post(self.scoped(call.into())).await
    }

    /// `PUT` request
    pub async fn put(&self, call: impl Into<CallConfig>) -> Result<Response> {
        self.origin.put(self.scoped(call.into())).await
    }

    /// `DELETE` request
    pub async fn delete(&self, call: impl Into<CallConfig>) -> Result<Response> {
        self.origin.delete(self.scoped(call.into())).await
    }

    /// `TRACE` request
    pub async fn trace(&self, call: impl Into<CallConfig>) -> Result<Response> {
        self.origin.trace(self.scoped(call.into())).await
    }

    /// JSON `GET` request
    pub async fn json(&self, call: impl Into<CallConfig>) -> Result<Value> {
        self.origin.json(self.scoped(call.into())).await
    }
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("path", &self.path)
            .field("origin", &self.origin)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::config::ResourceConfig;
    use crate::client::http_client::Client;
    use crate::client::runtime::RuntimeCapabilities;
    use crate::client::transport::testing::RecordingTransport;
    use std::sync::Arc;

    fn api() -> (Resource, Arc<RecordingTransport>) {
        let transport = Arc::new(RecordingTransport::default());
        let client = Client::with_transport(transport.clone(), RuntimeCapabilities::native());
        let config = ResourceConfig {
            base_url: Some("https://api.example.com/api".to_string()),
            ..Default::default()
        };
        (Resource::with_client(config, client).unwrap(), transport)
    }

    #[tokio::test]
    async fn test_verbs_prefix_path() {
        let (api, transport) = api();
        let v1 = api.route("/v1");

        v1.get("items").await.unwrap();
        assert_eq!(transport.last().url, "https://api.example.com/api/v1/items");
        v1.delete("/items/3").await.unwrap();
        assert_eq!(transport.last().method, "DELETE");
        assert_eq!(transport.last().url, "https://api.example.com/api/v1/items/3");
        v1.get("").await.unwrap();
        assert_eq!(transport.last().url, "https://api.example.com/api/v1");
    }

    #[tokio::test]
    async fn test_nested_route() {
        let (api, transport) = api();
        let users = api.route("v1").route("users/");
        assert_eq!(users.path(), "v1/users");
        users.get("7").await.unwrap();
        assert_eq!(transport.last().url, "https://api.example.com/api/v1/users/7");
    }

    #[test]
    fn test_urls() {
        let (api, _) = api();
        let v1 = api.route("/v1");
        assert_eq!(v1.base_url().unwrap(), "https://api.example.com/api/v1");
        assert_eq!(
            v1.prepare_url("items?x=1").unwrap(),
            "https://api.example.com/api/v1/items?x=1"
        );
    }

    #[tokio::test]
    async fn test_route_shares_credentials() {
        let (api, transport) = api();
        let v1 = api.route("/v1");
        v1.set_access_token(Some("shared"), None, None);
        v1.set_header("X-Route", "1");

        api.get("a").await.unwrap();
        let sent = transport.last();
        assert_eq!(sent.header("authorization"), Some("Bearer shared"));
        assert_eq!(sent.header("x-route"), Some("1"));
    }
}
