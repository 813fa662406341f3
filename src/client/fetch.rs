//! Native transport built on `reqwest`.
//!
//! Provides [`ReqwestTransport`], the [`Transport`] used by
//! [`Client::new`](crate::Client::new) outside of browsers.
//!
//! | Descriptor field | Handling |
//! |------------------|----------|
//! | `redirect` | `follow` (up to 10 hops), `manual` returns the 3xx, `error` rejects it |
//! | `timeout` | per-request timeout, reported as [`HttpError::Timeout`] |
//! | `referrer` | sent as `Referer`, filtered through the referrer policy |
//! | `integrity` | response body checked against the SRI metadata |
//! | `cache`, `mode`, `credentials` | ignored; there is no HTTP cache or cookie jar |
//!
//! # Examples
//!
//! ```ignore
//! use uniform_http::client::{ReqwestTransport, Transport};
//! use uniform_http::Request;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let transport = ReqwestTransport::new();
//!     let mut request = Request::new("http://example.com/api/data")?;
//!     let response = request.send(&transport).await?;
//!     println!("Status: {}", response.status);
//!     Ok(())
//! }
//! ```

use crate::client::transport::{Transport, TransportRequest};
use crate::client::utils::{is_redirect_status, is_success_status, referer_for};
use crate::error::{HttpError, Result};
use crate::protocol::constants::headers::{LOCATION, REFERER};
use crate::protocol::constants::MAX_REDIRECTS;
use crate::protocol::{verify_integrity, RedirectMode};
use crate::types::Response;
use async_trait::async_trait;
use bytes::Bytes;
use http::Method;
use reqwest::redirect::Policy;
use std::collections::BTreeMap;
use std::time::Duration;

/// HTTP transport over `reqwest`.
///
/// Cheap to clone; clones share connection pools.
#[derive(Clone)]
pub struct ReqwestTransport {
    following: reqwest::Client,
    direct: reqwest::Client,
}

impl ReqwestTransport {
    /// Transport with default connection settings.
    ///
    /// If the configured clients cannot be built, this logs a warning and
    /// falls back to stock `reqwest` clients, which always follow redirects.
    /// Use [`try_new`](Self::try_new) to get the error instead.
    pub fn new() -> Self {
        Self::try_new().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "falling back to default reqwest clients");
            ReqwestTransport {
                following: reqwest::Client::default(),
                direct: reqwest::Client::default(),
            }
        })
    }

    /// Transport with default connection settings, failing if the clients
    /// cannot be built
    pub fn try_new() -> Result<Self> {
        Self::build(None)
    }

    /// Transport that routes every request through `proxy_url`.
    pub fn with_proxy(proxy_url: &str) -> Result<Self> {
        let proxy = reqwest::Proxy::all(proxy_url)
            .map_err(|e| HttpError::config(format!("invalid proxy {}: {}", proxy_url, e)))?;
        Self::build(Some(proxy))
    }

    fn build(proxy: Option<reqwest::Proxy>) -> Result<Self> {
        let builder = |policy: Policy| {
            let mut builder = reqwest::Client::builder()
                .redirect(policy)
                .pool_idle_timeout(Duration::from_secs(90));
            if let Some(proxy) = proxy.clone() {
                builder = builder.proxy(proxy);
            }
            builder.build()
        };
        Ok(ReqwestTransport {
            following: builder(Policy::limited(MAX_REDIRECTS))?,
            direct: builder(Policy::none())?,
        })
    }

    async fn perform(&self, request: TransportRequest) -> Result<Response> {
        let method = Method::from_bytes(request.method.as_bytes())
            .map_err(|_| HttpError::invalid(format!("invalid HTTP method {}", request.method)))?;
        if method == Method::CONNECT {
            return Err(HttpError::invalid("CONNECT is not supported by this transport"));
        }

        let client = match request.redirect {
            RedirectMode::Follow => &self.following,
            RedirectMode::Manual | RedirectMode::Error => &self.direct,
        };

        let mut builder = client.request(method.clone(), &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if request.header(REFERER).is_none() {
            if let Some(referer) = request
                .referrer
                .as_deref()
                .and_then(|r| referer_for(r, request.referrer_policy, &request.url))
            {
                builder = builder.header(REFERER, referer);
            }
        }
        if let Some(timeout) = request.timeout {
            builder = builder.timeout(timeout);
        }
        if let Some(body) = request.body.clone() {
            builder = builder.body(body);
        }

        let response = builder.send().await?;
        let status = response.status();

        if request.redirect == RedirectMode::Error && is_redirect_status(status.as_u16()) {
            let location = response
                .headers()
                .get(LOCATION)
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default()
                .to_string();
            return Err(HttpError::Transport(format!(
                "Refused to redirect {} to {}",
                request.url, location
            )));
        }

        let url = response.url().to_string();
        let redirected = request.redirect == RedirectMode::Follow && !same_url(&url, &request.url);

        let mut headers = BTreeMap::new();
        for (name, value) in response.headers() {
            if let Ok(value) = value.to_str() {
                headers
                    .entry(name.as_str().to_lowercase())
                    .and_modify(|existing: &mut String| {
                        existing.push_str(", ");
                        existing.push_str(value);
                    })
                    .or_insert_with(|| value.to_string());
            }
        }

        let body = if method == Method::HEAD {
            Bytes::new()
        } else {
            response.bytes().await?
        };

        if let Some(metadata) = request.integrity.as_deref() {
            if !verify_integrity(metadata, &body) {
                return Err(HttpError::Transport(format!(
                    "integrity check failed for {}",
                    url
                )));
            }
        }

        tracing::debug!(status = status.as_u16(), url = %url, redirected, "response received");

        Ok(Response {
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or_default().to_string(),
            headers,
            ok: is_success_status(status.as_u16()),
            redirected,
            url,
            body,
        })
    }
}

fn same_url(a: &str, b: &str) -> bool {
    match (url::Url::parse(a), url::Url::parse(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

impl Default for ReqwestTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: TransportRequest) -> Result<Response> {
        self.perform(request).await
    }
}
