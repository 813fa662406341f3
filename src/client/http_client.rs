//! Verb-oriented HTTP client.
//!
//! [`Client`] turns a [`CallConfig`] into a [`Request`], runs an optional
//! [`Preflight`] hook over it and sends it through its transport.
//!
//! ```ignore
//! use uniform_http::{CallConfig, Client};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = Client::new();
//!     let page = client.get("https://example.com/").await?;
//!
//!     let created = client
//!         .post(CallConfig {
//!             url: Some("https://example.com/items".into()),
//!             body: Some(serde_json::json!({ "name": "x" }).into()),
//!             ..Default::default()
//!         })
//!         .await?;
//!     println!("{} {}", page.status, created.status);
//!     Ok(())
//! }
//! ```

use crate::client::config::{CallConfig, RequestConfig};
use crate::client::fetch::ReqwestTransport;
use crate::client::request::Request;
use crate::client::runtime::RuntimeCapabilities;
use crate::client::transport::Transport;
use crate::error::Result;
use crate::protocol::constants::headers::ACCEPT;
use crate::protocol::constants::JSON_ACCEPT;
use crate::types::Response;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tracing::warn;

/// Hook that adjusts every request before it is sent.
pub trait Preflight: Send + Sync {
    /// Adjust `request`; `call` holds the caller's per-call overrides.
    fn preflight(&self, request: &mut Request, call: &CallConfig) -> Result<()>;
}

impl From<&str> for CallConfig {
    fn from(url: &str) -> Self {
        CallConfig::url(url)
    }
}

impl From<String> for CallConfig {
    fn from(url: String) -> Self {
        CallConfig::url(url)
    }
}

/// HTTP client bound to a transport and a runtime.
#[derive(Clone)]
pub struct Client {
    transport: Arc<dyn Transport>,
    runtime: RuntimeCapabilities,
    preflight: Option<Arc<dyn Preflight>>,
}

impl Client {
    /// Native client over [`ReqwestTransport`]
    pub fn new() -> Self {
        Self::with_transport(Arc::new(ReqwestTransport::new()), RuntimeCapabilities::native())
    }

    /// Client over a custom transport
    pub fn with_transport(transport: Arc<dyn Transport>, runtime: RuntimeCapabilities) -> Self {
        Client {
            transport,
            runtime,
            preflight: None,
        }
    }

    /// Install a hook run before every request.
    pub fn with_preflight(mut self, hook: Arc<dyn Preflight>) -> Self {
        self.preflight = Some(hook);
        self
    }

    /// Runtime requests are built for
    pub fn runtime(&self) -> &RuntimeCapabilities {
        &self.runtime
    }

    /// Transport requests go through
    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    /// Build the request `call` describes, without preflight.
    pub fn build_request(&self, method: &str, call: &CallConfig) -> Result<Request> {
        let config = RequestConfig {
            url: call.url.clone().unwrap_or_default(),
            method: Some(method.to_string()),
            headers: call.headers.clone(),
            body: call.body.clone(),
            cache: call.cache,
            mode: call.mode,
            credentials: call.credentials,
            redirect: call.redirect,
            referrer: call.referrer.clone(),
            referrer_policy: call.referrer_policy,
            sri: call.sri.clone(),
            timeout_ms: call.timeout_ms,
            username: call.username.clone(),
            password: call.password.clone(),
            access_token: call.access_token.clone(),
            access_token_type: call.access_token_type.clone(),
            signing_key: call.signing_key.clone(),
            verification_key: call.verification_key.clone(),
            encryption_key: call.encryption_key.clone(),
            decryption_key: call.decryption_key.clone(),
            ..Default::default()
        };
        Request::with_config(config, self.runtime.clone())
    }

    /// Build, preflight and send a request.
    ///
    /// The client's own hook runs first, then `extra`. Call-level
    /// attributes are applied last so they always win.
    pub async fn execute(
        &self,
        method: &str,
        call: CallConfig,
        extra: Option<&dyn Preflight>,
    ) -> Result<Response> {
        let mut request = self.build_request(method, &call)?;
        if let Some(hook) = self.preflight.as_deref() {
            hook.preflight(&mut request, &call)?;
        }
        if let Some(hook) = extra {
            hook.preflight(&mut request, &call)?;
        }
        apply_call_attributes(&mut request, &call)?;
        request.send(self.transport.as_ref()).await
    }

    /// Send `call` with an explicit method
    pub async fn request(&self, method: &str, call: impl Into<CallConfig>) -> Result<Response> {
        self.execute(method, call.into(), None).await
    }

    /// `OPTIONS` request
    pub async fn options(&self, call: impl Into<CallConfig>) -> Result<Response> {
        self.request("OPTIONS", call).await
    }

    /// `HEAD` request
    pub async fn head(&self, call: impl Into<CallConfig>) -> Result<Response> {
        self.request("HEAD", call).await
    }

    /// `GET` request
    pub async fn get(&self, call: impl Into<CallConfig>) -> Result<Response> {
        self.request("GET", call).await
    }

    /// `POST` request
    pub async fn post(&self, call: impl Into<CallConfig>) -> Result<Response> {
        self.request("POST", call).await
    }

    /// `PUT` request
    pub async fn put(&self, call: impl Into<CallConfig>) -> Result<Response> {
        self.request("PUT", call).await
    }

    /// `DELETE` request
    pub async fn delete(&self, call: impl Into<CallConfig>) -> Result<Response> {
        self.request("DELETE", call).await
    }

    /// `TRACE` request, logged as a warning
    pub async fn trace(&self, call: impl Into<CallConfig>) -> Result<Response> {
        warn!("an HTTP TRACE request was made");
        self.request("TRACE", call).await
    }

    /// `GET` with a JSON `Accept` header, yielding the parsed body.
    ///
    /// A body that is not JSON yields `Value::Null`.
    pub async fn json(&self, call: impl Into<CallConfig>) -> Result<Value> {
        let mut call = call.into();
        call.headers
            .entry(ACCEPT.to_string())
            .or_insert_with(|| JSON_ACCEPT.to_string());
        Ok(self.request("GET", call).await?.json())
    }
}

impl Default for Client {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("runtime", &self.runtime)
            .field("preflight", &self.preflight.is_some())
            .finish()
    }
}

/// Apply the per-call overrides that must win over any preflight.
pub(crate) fn apply_call_attributes(request: &mut Request, call: &CallConfig) -> Result<()> {
    request.set_query(call.query.iter().map(|(k, v)| (k.as_str(), v.clone())), true);

    if let Some(token) = call.access_token.as_deref() {
        request.set_access_token(Some(token));
    } else {
        if let Some(username) = call.username.as_deref() {
            request.set_username(Some(username));
        }
        if request.username().is_some() {
            if let Some(password) = call.password.as_deref() {
                request.set_password(Some(password));
            }
        }
    }
    if request.auth().has_access_token() {
        if let Some(kind) = call.access_token_type.as_deref() {
            request.set_access_token_type(Some(kind));
        }
    }

    if let Some(redirect) = call.redirect {
        request.set_redirect(redirect);
    }
    if let Some(hash) = call.hash.as_deref() {
        request.url_mut().set_hash(hash);
    }
    if let Some(port) = call.port {
        request.url_mut().set_port(port)?;
    }
    if let Some(path) = call.path.as_deref() {
        request.url_mut().set_path(path);
    }
    if let Some(hostname) = call.hostname.as_deref() {
        request.url_mut().set_hostname(hostname);
    }
    if let Some(policy) = call.referrer_policy {
        request.set_referrer_policy(policy);
    }
    if let Some(mode) = call.mode {
        request.set_mode(Some(mode));
    }
    if let Some(cache) = call.cache {
        request.set_cache(cache);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::transport::testing::RecordingTransport;
    use crate::types::QueryValue;
    use bytes::Bytes;

    fn client(transport: &Arc<RecordingTransport>) -> Client {
        Client::with_transport(transport.clone(), RuntimeCapabilities::native())
    }

    struct Tagging;

    impl Preflight for Tagging {
        fn preflight(&self, request: &mut Request, _call: &CallConfig) -> Result<()> {
            request.set_header("X-Tag", "hook", false);
            request.set_query_parameter("page", 1, true);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_verbs_set_method() {
        let transport = Arc::new(RecordingTransport::default());
        let client = client(&transport);

        client.options("https://example.com").await.unwrap();
        assert_eq!(transport.last().method, "OPTIONS");
        client.head("https://example.com").await.unwrap();
        assert_eq!(transport.last().method, "HEAD");
        client.delete("https://example.com").await.unwrap();
        assert_eq!(transport.last().method, "DELETE");
        client.trace("https://example.com").await.unwrap();
        assert_eq!(transport.last().method, "TRACE");
    }

    #[tokio::test]
    async fn test_post_body() {
        let transport = Arc::new(RecordingTransport::default());
        let call = CallConfig {
            url: Some("https://example.com/items".to_string()),
            body: Some(serde_json::json!({ "name": "x" }).into()),
            ..Default::default()
        };
        client(&transport).post(call).await.unwrap();

        let sent = transport.last();
        assert_eq!(sent.method, "POST");
        assert_eq!(sent.header("content-type"), Some("application/json"));
        assert_eq!(sent.body, Some(Bytes::from_static(b"{\"name\":\"x\"}")));
    }

    #[tokio::test]
    async fn test_json_sets_accept_and_parses() {
        let transport = Arc::new(RecordingTransport::replying(Response {
            status: 200,
            ok: true,
            body: Bytes::from_static(b"[1,2]"),
            ..Default::default()
        }));
        let value = client(&transport).json("https://example.com/list").await.unwrap();
        assert_eq!(value, serde_json::json!([1, 2]));
        assert_eq!(transport.last().header("accept"), Some(JSON_ACCEPT));

        *transport.response.lock() = Response {
            body: Bytes::from_static(b"not json"),
            ..Default::default()
        };
        let value = client(&transport).json("https://example.com/list").await.unwrap();
        assert_eq!(value, Value::Null);
    }

    #[tokio::test]
    async fn test_preflight_then_call_attributes() {
        let transport = Arc::new(RecordingTransport::default());
        let client = client(&transport).with_preflight(Arc::new(Tagging));

        let mut call = CallConfig::url("https://example.com/a");
        call.query.insert("page".to_string(), QueryValue::from(3));
        call.hash = Some("top".to_string());
        call.port = Some(8443);
        client.get(call).await.unwrap();

        let sent = transport.last();
        assert_eq!(sent.header("x-tag"), Some("hook"));
        assert_eq!(sent.url, "https://example.com:8443/a?page=3#top");
    }

    #[tokio::test]
    async fn test_call_credentials() {
        let transport = Arc::new(RecordingTransport::default());
        let mut call = CallConfig::url("https://example.com");
        call.access_token = Some("abc".to_string());
        call.access_token_type = Some("Token".to_string());
        client(&transport).get(call).await.unwrap();
        assert_eq!(transport.last().header("authorization"), Some("Token abc"));
    }
}
