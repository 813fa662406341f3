//! Configuration structs.
//!
//! All three structs deserialize from JSON (or any serde format) and default
//! every field, so callers only spell out what they change:
//!
//! ```
//! use uniform_http::client::{RequestConfig, ResourceConfig};
//!
//! let request = RequestConfig {
//!     url: "https://api.example.com/items".to_string(),
//!     method: Some("post".to_string()),
//!     ..Default::default()
//! };
//!
//! let resource: ResourceConfig = serde_json::from_value(serde_json::json!({
//!     "base_url": "https://api.example.com/v1",
//!     "headers": { "X-Client": "demo" },
//!     "unique": true
//! })).unwrap();
//! assert!(resource.unique);
//! ```
//!
//! Enumerated modes are validated while deserializing, so a bad value such
//! as `"redirect": "sometimes"` fails up front.

use crate::client::crypto::CryptoKey;
use crate::protocol::{CacheMode, CorsMode, CredentialsMode, RedirectMode, ReferrerPolicy};
use crate::types::{Body, QueryValue};
use serde::Deserialize;
use std::collections::BTreeMap;

/// Construction parameters of a [`Request`](crate::Request).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RequestConfig {
    /// Absolute or relative URL; blank resolves to the runtime origin
    pub url: String,
    /// HTTP method, `GET` when absent
    pub method: Option<String>,
    /// Initial headers
    pub headers: BTreeMap<String, String>,
    /// Body; content type is inferred from its shape
    pub body: Option<Body>,
    /// Cache mode; runtime default when absent
    pub cache: Option<CacheMode>,
    /// CORS mode
    pub mode: Option<CorsMode>,
    /// Ambient credentials mode
    pub credentials: Option<CredentialsMode>,
    /// Redirect mode, `follow` when absent
    pub redirect: Option<RedirectMode>,
    /// Referrer URL
    pub referrer: Option<String>,
    /// Referrer policy, `no-referrer-when-downgrade` when absent
    pub referrer_policy: Option<ReferrerPolicy>,
    /// Subresource integrity metadata
    pub sri: Option<String>,
    /// Timeout in milliseconds; `0` disables it, 30 seconds when absent
    pub timeout_ms: Option<u64>,
    /// Drop bodies of safe methods (default `true`)
    pub enforce_method_safety: Option<bool>,
    /// Basic-auth username
    pub username: Option<String>,
    /// Basic-auth password
    pub password: Option<String>,
    /// Access token, overrides basic auth
    pub access_token: Option<String>,
    /// Access token type, `Bearer` when absent
    pub access_token_type: Option<String>,
    /// Proxy basic-auth username
    pub proxy_username: Option<String>,
    /// Proxy basic-auth password
    pub proxy_password: Option<String>,
    /// Proxy access token
    pub proxy_access_token: Option<String>,
    /// Proxy access token type
    pub proxy_access_token_type: Option<String>,
    /// Key used to sign the body
    pub signing_key: Option<CryptoKey>,
    /// Key used to verify response signatures
    pub verification_key: Option<CryptoKey>,
    /// Key used to encrypt the body
    pub encryption_key: Option<CryptoKey>,
    /// Key used to decrypt the response
    pub decryption_key: Option<CryptoKey>,
}

impl RequestConfig {
    /// Config for `url` with every other field defaulted
    pub fn new(url: impl Into<String>) -> Self {
        RequestConfig {
            url: url.into(),
            ..Default::default()
        }
    }
}

/// Per-call overrides consumed by resource preflight.
///
/// Everything here takes precedence over the resource defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CallConfig {
    /// URL, relative to the resource base unless absolute
    pub url: Option<String>,
    /// HTTP method
    pub method: Option<String>,
    /// Body
    pub body: Option<Body>,
    /// Extra headers
    pub headers: BTreeMap<String, String>,
    /// Extra query parameters
    pub query: BTreeMap<String, QueryValue>,
    /// Basic-auth username
    pub username: Option<String>,
    /// Basic-auth password
    pub password: Option<String>,
    /// Access token
    pub access_token: Option<String>,
    /// Access token type
    pub access_token_type: Option<String>,
    /// Signing key, else the resource's
    pub signing_key: Option<CryptoKey>,
    /// Verification key, else the resource's
    pub verification_key: Option<CryptoKey>,
    /// Encryption key, else the resource's
    pub encryption_key: Option<CryptoKey>,
    /// Decryption key, else the resource's decryption or encryption key
    pub decryption_key: Option<CryptoKey>,
    /// Encrypt this call's body (overrides `encrypt_all`)
    pub encrypt: Option<bool>,
    /// Decrypt this call's response (overrides `decrypt_all`)
    pub decrypt: Option<bool>,
    /// Sign this call's body (overrides `sign_all`)
    pub sign: Option<bool>,
    /// Verify this call's response (overrides `verify_all`)
    pub verify: Option<bool>,
    /// Redirect mode
    pub redirect: Option<RedirectMode>,
    /// URL hash
    pub hash: Option<String>,
    /// URL port
    pub port: Option<u16>,
    /// URL path
    pub path: Option<String>,
    /// URL hostname
    pub hostname: Option<String>,
    /// Referrer policy
    pub referrer_policy: Option<ReferrerPolicy>,
    /// CORS mode
    pub mode: Option<CorsMode>,
    /// Cache mode
    pub cache: Option<CacheMode>,
    /// Ambient credentials mode
    pub credentials: Option<CredentialsMode>,
    /// Referrer URL
    pub referrer: Option<String>,
    /// Timeout in milliseconds
    pub timeout_ms: Option<u64>,
    /// Subresource integrity metadata
    pub sri: Option<String>,
}

impl CallConfig {
    /// Overrides for `url`
    pub fn url(url: impl Into<String>) -> Self {
        CallConfig {
            url: Some(url.into()),
            ..Default::default()
        }
    }
}

/// Defaults shared by every request issued through a [`Resource`](crate::Resource).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ResourceConfig {
    /// Base URL every relative call URL is prefixed with
    pub base_url: Option<String>,
    /// Headers applied to every request
    pub headers: BTreeMap<String, String>,
    /// Query parameters applied to every request
    pub query: BTreeMap<String, QueryValue>,
    /// Basic-auth username
    pub username: Option<String>,
    /// Basic-auth password
    pub password: Option<String>,
    /// Access token
    pub access_token: Option<String>,
    /// Access token type
    pub access_token_type: Option<String>,
    /// Milliseconds since the epoch at which the access token expires
    pub access_token_expiration_ms: Option<u64>,
    /// Fire `token.expiration.pending` this many milliseconds before expiry
    pub token_renewal_notice_ms: u64,
    /// Cache mode
    pub cache: Option<CacheMode>,
    /// CORS mode
    pub mode: Option<CorsMode>,
    /// Ambient credentials mode
    pub credentials: Option<CredentialsMode>,
    /// Redirect mode
    pub redirect: Option<RedirectMode>,
    /// Referrer URL
    pub referrer: Option<String>,
    /// Referrer policy
    pub referrer_policy: Option<ReferrerPolicy>,
    /// Timeout in milliseconds
    pub timeout_ms: Option<u64>,
    /// Force the `https` protocol on the base and every prepared URL
    pub https_only: bool,
    /// Force the `no-cache` cache mode
    pub nocache: bool,
    /// Append a unique cache-busting query parameter to every request
    pub unique: bool,
    /// Custom `User-Agent` (refused in browser-like runtimes)
    pub user_agent: Option<String>,
    /// Suffix the `User-Agent` with a unique `ID#` token
    pub unique_agent: bool,
    /// Default signing key
    pub signing_key: Option<CryptoKey>,
    /// Default verification key
    pub verification_key: Option<CryptoKey>,
    /// Default encryption key
    pub encryption_key: Option<CryptoKey>,
    /// Default decryption key
    pub decryption_key: Option<CryptoKey>,
    /// Encrypt every request body
    pub encrypt_all: bool,
    /// Decrypt every response body
    pub decrypt_all: bool,
    /// Sign every request body
    pub sign_all: bool,
    /// Verify every response signature
    pub verify_all: bool,
}
