//! Request lifecycle engine.
//!
//! A [`Request`] composes a URL, headers, body, credentials and fetch modes
//! into a [`TransportRequest`], hands it to a [`Transport`] and post-processes
//! the response.
//!
//! # Lifecycle
//!
//! ```text
//! configured ──send()──> sending ──┬──> completed
//!                                  ├──> failed
//!                                  └──> aborted
//! ```
//!
//! A request is sent at most once; a second `send()` fails with
//! [`HttpError::AlreadySent`]. [`Request::clone`] yields a fresh configured
//! copy for another attempt.
//!
//! # Body inference
//!
//! | Body | Payload | `Content-Type` |
//! |------|---------|----------------|
//! | `{"form": {..}}` | URL-encoded fields | `application/x-www-form-urlencoded` |
//! | other object or array | JSON text | `application/json` |
//! | text | as-is | sniffed: form, data URL, XML, HTML, else `text/plain` |
//! | bytes | as-is | `application/octet-stream` |
//! | number, boolean | none (warning) | unchanged |
//!
//! An explicit `Content-Type` header is never replaced by inference, and
//! `Content-Length` always tracks the payload.
//!
//! # Examples
//!
//! ```
//! use uniform_http::{Body, Request};
//! use serde_json::json;
//!
//! let mut request = Request::new("https://api.example.com/items").unwrap();
//! request.set_method("post");
//! request.set_body(Body::Json(json!({ "a": 1 })));
//!
//! assert_eq!(request.method(), "POST");
//! assert_eq!(request.header("content-type"), Some("application/json"));
//! assert_eq!(request.header("content-length"), Some("7"));
//! ```

use crate::address::Address;
use crate::client::config::RequestConfig;
use crate::client::crypto::{Crypto, CryptoKey, CryptoKeys};
use crate::client::runtime::RuntimeCapabilities;
use crate::client::transport::{AbortSignal, Transport, TransportRequest};
use crate::credential::{AuthType, Credential};
use crate::error::{HttpError, Result};
use crate::events::EventEmitter;
use crate::protocol::constants::headers::{
    AUTHORIZATION, CONTENT_ENCODING, CONTENT_LENGTH, CONTENT_TRANSFER_ENCODING, CONTENT_TYPE,
    PROXY_AUTHORIZATION, SIGNATURE,
};
use crate::protocol::constants::DEFAULT_TIMEOUT_MS;
use crate::protocol::headers::{self as content, encode_form, form_fields, sniff_text_content_type};
use crate::protocol::{
    is_idempotent_method, is_nobody_method, is_standard_method, CacheMode, CorsMode,
    CredentialsMode, RedirectMode, ReferrerPolicy,
};
use crate::store::HeaderStore;
use crate::types::{Body, QueryValue, Response};
use bytes::Bytes;
use serde_json::{json, Value};
use std::fmt;
use std::time::Duration;
use tracing::{debug, warn};

/// Position of a request in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestState {
    /// Not sent yet
    Configured,
    /// Waiting on the transport
    Sending,
    /// A response was delivered
    Completed,
    /// Transport, crypto or verification failure
    Failed,
    /// Cancelled through the abort signal
    Aborted,
}

impl RequestState {
    /// Lowercase name
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestState::Configured => "configured",
            RequestState::Sending => "sending",
            RequestState::Completed => "completed",
            RequestState::Failed => "failed",
            RequestState::Aborted => "aborted",
        }
    }
}

/// A single HTTP call.
pub struct Request {
    method: String,
    url: Address,
    configured_url: String,
    headers: HeaderStore,
    body: Option<Body>,
    payload: Option<Bytes>,
    cache: CacheMode,
    mode: Option<CorsMode>,
    credentials: Option<CredentialsMode>,
    redirect: RedirectMode,
    referrer: Option<String>,
    referrer_policy: ReferrerPolicy,
    timeout: Option<Duration>,
    sri: Option<String>,
    enforce_method_safety: bool,
    auth: Credential,
    proxy_auth: Credential,
    keys: CryptoKeys,
    runtime: RuntimeCapabilities,
    state: RequestState,
    signal: AbortSignal,
    events: EventEmitter,
}

impl Request {
    /// `GET` request for `url` in a native runtime.
    pub fn new(url: &str) -> Result<Self> {
        Self::with_config(RequestConfig::new(url), RuntimeCapabilities::default())
    }

    /// Build a request from `config`.
    ///
    /// Fails with [`HttpError::InvalidUrl`] when the URL does not parse.
    pub fn with_config(config: RequestConfig, runtime: RuntimeCapabilities) -> Result<Self> {
        let mut request = Request::blank(runtime);
        request.set_url(&config.url)?;
        if let Some(method) = &config.method {
            request.set_method(method);
        }
        for (name, value) in config.headers {
            request.headers.set(&name, value);
        }

        if let Some(cache) = config.cache {
            request.set_cache(cache);
        }
        if let Some(mode) = config.mode {
            request.set_mode(Some(mode));
        }
        request.credentials = config.credentials;
        request.redirect = config.redirect.unwrap_or_default();
        request.referrer = config.referrer.filter(|r| !r.trim().is_empty());
        request.referrer_policy = config.referrer_policy.unwrap_or_default();
        request.sri = config.sri.filter(|s| !s.trim().is_empty());
        request.set_timeout_ms(config.timeout_ms.unwrap_or(DEFAULT_TIMEOUT_MS));
        request.enforce_method_safety = config.enforce_method_safety.unwrap_or(true);

        if let Some(username) = config.username.as_deref() {
            request.auth.set_username(Some(username));
        }
        if let Some(password) = config.password.as_deref() {
            request.auth.set_password(Some(password));
        }
        if let Some(token) = config.access_token.as_deref() {
            request.auth.set_access_token(Some(token));
        }
        request.auth.set_access_token_type(config.access_token_type.as_deref());
        request.proxy_auth.set_username(config.proxy_username.as_deref());
        request.proxy_auth.set_password(config.proxy_password.as_deref());
        request.proxy_auth.set_access_token(config.proxy_access_token.as_deref());
        request
            .proxy_auth
            .set_access_token_type(config.proxy_access_token_type.as_deref());
        request.install_auth_headers();

        request.keys = CryptoKeys {
            signing: config.signing_key,
            verification: config.verification_key,
            encryption: config.encryption_key,
            decryption: config.decryption_key,
        };

        request.apply_body(config.body, true);
        Ok(request)
    }

    fn blank(runtime: RuntimeCapabilities) -> Self {
        Request {
            method: "GET".to_string(),
            url: Address::default(),
            configured_url: String::new(),
            headers: HeaderStore::headers(),
            body: None,
            payload: None,
            cache: runtime.default_cache_mode(),
            mode: None,
            credentials: None,
            redirect: RedirectMode::default(),
            referrer: None,
            referrer_policy: ReferrerPolicy::default(),
            timeout: Some(Duration::from_millis(DEFAULT_TIMEOUT_MS)),
            sri: None,
            enforce_method_safety: true,
            auth: Credential::new(),
            proxy_auth: Credential::new(),
            keys: CryptoKeys::default(),
            runtime,
            state: RequestState::Configured,
            signal: AbortSignal::new(),
            events: EventEmitter::new(),
        }
    }

    /// Observer list of this request
    pub fn events(&self) -> &EventEmitter {
        &self.events
    }

    /// Runtime this request was built for
    pub fn runtime(&self) -> &RuntimeCapabilities {
        &self.runtime
    }

    /// Current lifecycle state
    pub fn state(&self) -> RequestState {
        self.state
    }

    // Method and URL

    /// Uppercase HTTP method
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Set the HTTP method.
    ///
    /// Blank falls back to `GET`. Non-standard methods and `TRACE` are
    /// accepted with a warning.
    pub fn set_method(&mut self, method: &str) {
        let mut method = method.trim().to_uppercase();
        if method.is_empty() {
            warn!("blank HTTP method, using GET");
            method = "GET".to_string();
        }
        if !is_standard_method(&method) {
            warn!(method = %method, "non-standard HTTP method");
        } else if method == "TRACE" {
            warn!("TRACE echoes request headers, including credentials, back to the caller");
        }
        if method != self.method {
            let old = std::mem::replace(&mut self.method, method);
            self.events
                .emit("update.method", json!({ "old": old, "new": self.method }));
        }
    }

    /// Target address
    pub fn url(&self) -> &Address {
        &self.url
    }

    /// Mutable target address
    pub fn url_mut(&mut self) -> &mut Address {
        &mut self.url
    }

    /// URL as it was last passed to [`set_url`](Self::set_url)
    pub fn configured_url(&self) -> &str {
        &self.configured_url
    }

    /// Replace the target URL.
    ///
    /// Relative and blank URLs resolve against the runtime origin. A
    /// username and password embedded in the URL are moved into the
    /// request credentials.
    pub fn set_url(&mut self, raw: &str) -> Result<()> {
        if raw.trim().is_empty() {
            warn!(origin = %self.runtime.origin, "blank URL, defaulting to the runtime origin");
        }
        let mut address = Address::resolve(raw, &self.runtime.origin)?;

        let embedded_user = address.username().map(str::to_string);
        let embedded_password = address.raw_password().map(str::to_string);
        address.clear_credentials();

        let old = self.url.href();
        self.url = address;
        self.configured_url = raw.to_string();
        self.events
            .emit("update.url", json!({ "old": old, "new": self.url.href() }));

        if embedded_user.is_some() || embedded_password.is_some() {
            self.update_auth(|auth| {
                let user = embedded_user
                    .as_deref()
                    .is_some_and(|u| auth.set_username(Some(u)));
                let password = embedded_password
                    .as_deref()
                    .is_some_and(|p| auth.set_password(Some(p)));
                user | password
            });
        }
        Ok(())
    }

    /// Whether `url` points at a different host than this request
    pub fn is_cross_origin(&self, url: &str) -> bool {
        !self.url.is_same_origin(url, false)
    }

    // Query parameters

    /// Set a query parameter. Without `overwrite` an existing value wins.
    pub fn set_query_parameter(&mut self, name: &str, value: impl Into<QueryValue>, overwrite: bool) {
        if overwrite || self.url.query_parameter(name).is_none() {
            self.url.set_query_parameter(name, value);
        }
    }

    /// Set several query parameters at once.
    pub fn set_query<I, K, V>(&mut self, params: I, overwrite: bool)
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<QueryValue>,
    {
        for (name, value) in params {
            self.set_query_parameter(name.as_ref(), value, overwrite);
        }
    }

    /// Remove a query parameter
    pub fn remove_query_parameter(&mut self, name: &str) -> Option<QueryValue> {
        self.url.remove_query_parameter(name)
    }

    /// Remove every query parameter
    pub fn clear_query_parameters(&mut self) {
        self.url.clear_query_parameters();
    }

    // Headers

    /// Header store (lowercase names)
    pub fn headers(&self) -> &HeaderStore {
        &self.headers
    }

    /// Header value by case-insensitive name
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }

    /// Set a header. Without `overwrite` an existing value wins.
    pub fn set_header(&mut self, name: &str, value: impl Into<String>, overwrite: bool) {
        if overwrite || !self.headers.has(name) {
            self.headers.set(name, value.into());
        }
    }

    /// Append to a header with `", "`, creating it if needed.
    pub fn append_header(&mut self, name: &str, value: &str) {
        self.headers.append(name, value);
    }

    /// Remove a header
    pub fn remove_header(&mut self, name: &str) -> Option<String> {
        self.headers.delete(name)
    }

    // Body

    /// Body as configured
    pub fn body(&self) -> Option<&Body> {
        self.body.as_ref()
    }

    /// Bytes that will be transmitted, before crypto and method safety
    pub fn payload(&self) -> Option<&Bytes> {
        self.payload.as_ref()
    }

    /// Replace the body and infer its content type.
    ///
    /// Any previous `Content-Type` is dropped first so it cannot mislabel
    /// the new body.
    pub fn set_body(&mut self, body: impl Into<Body>) {
        self.apply_body(Some(body.into()), false);
    }

    /// Remove the body together with its content headers.
    pub fn clear_body(&mut self) {
        self.apply_body(None, false);
    }

    fn apply_body(&mut self, body: Option<Body>, keep_content_type: bool) {
        if !keep_content_type {
            self.headers.delete(CONTENT_TYPE);
        }
        self.headers.delete(CONTENT_LENGTH);
        self.payload = None;

        let Some(body) = body else {
            self.body = None;
            return;
        };

        let inferred: Option<(Bytes, String)> = match &body {
            Body::Text(text) => Some((Bytes::from(text.clone()), sniff_text_content_type(text))),
            Body::Bytes(bytes) => Some((bytes.clone(), content::OCTET_STREAM.to_string())),
            Body::Json(value) => match value {
                Value::String(text) => {
                    Some((Bytes::from(text.clone()), sniff_text_content_type(text)))
                }
                Value::Object(_) | Value::Array(_) => match form_fields(value) {
                    Some(fields) => Some((Bytes::from(encode_form(fields)), content::FORM.to_string())),
                    None => Some((Bytes::from(value.to_string()), content::JSON.to_string())),
                },
                Value::Null => None,
                other => {
                    warn!(body = %other, "unsupported body type, nothing will be transmitted");
                    None
                }
            },
        };

        if let Some((payload, content_type)) = inferred {
            if !self.headers.has(CONTENT_TYPE) {
                self.headers.set(CONTENT_TYPE, content_type);
            }
            self.headers.set(CONTENT_LENGTH, payload.len().to_string());
            self.payload = Some(payload);
        }
        self.body = Some(body);
    }

    // Fetch modes

    /// Cache mode
    pub fn cache(&self) -> CacheMode {
        self.cache
    }

    /// Set the cache mode. `only-if-cached` forces the `same-origin` CORS mode.
    pub fn set_cache(&mut self, cache: CacheMode) {
        self.cache = cache;
        if cache == CacheMode::OnlyIfCached && self.mode != Some(CorsMode::SameOrigin) {
            warn!("only-if-cached requires the same-origin CORS mode");
            self.mode = Some(CorsMode::SameOrigin);
        }
    }

    /// CORS mode
    pub fn mode(&self) -> Option<CorsMode> {
        self.mode
    }

    /// Set the CORS mode
    pub fn set_mode(&mut self, mode: Option<CorsMode>) {
        self.mode = mode;
    }

    /// Ambient credentials mode
    pub fn credentials_mode(&self) -> Option<CredentialsMode> {
        self.credentials
    }

    /// Set the ambient credentials mode
    pub fn set_credentials_mode(&mut self, mode: Option<CredentialsMode>) {
        self.credentials = mode;
    }

    /// Redirect mode
    pub fn redirect(&self) -> RedirectMode {
        self.redirect
    }

    /// Set the redirect mode
    pub fn set_redirect(&mut self, redirect: RedirectMode) {
        self.redirect = redirect;
    }

    /// Referrer URL
    pub fn referrer(&self) -> Option<&str> {
        self.referrer.as_deref()
    }

    /// Set or clear the referrer URL
    pub fn set_referrer(&mut self, referrer: Option<&str>) {
        self.referrer = referrer.map(str::trim).filter(|r| !r.is_empty()).map(str::to_string);
    }

    /// Referrer policy
    pub fn referrer_policy(&self) -> ReferrerPolicy {
        self.referrer_policy
    }

    /// Set the referrer policy
    pub fn set_referrer_policy(&mut self, policy: ReferrerPolicy) {
        self.referrer_policy = policy;
    }

    /// Timeout, `None` when disabled
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Set the timeout in milliseconds; `0` disables it.
    pub fn set_timeout_ms(&mut self, millis: u64) {
        self.timeout = (millis > 0).then(|| Duration::from_millis(millis));
    }

    /// Subresource integrity metadata
    pub fn sri(&self) -> Option<&str> {
        self.sri.as_deref()
    }

    /// Set or clear the subresource integrity metadata
    pub fn set_sri(&mut self, sri: Option<&str>) {
        self.sri = sri.map(str::trim).filter(|s| !s.is_empty()).map(str::to_string);
    }

    /// Whether bodies of `OPTIONS`, `HEAD` and `GET` are dropped on send
    pub fn enforce_method_safety(&self) -> bool {
        self.enforce_method_safety
    }

    /// Toggle method safety enforcement
    pub fn set_enforce_method_safety(&mut self, enforce: bool) {
        self.enforce_method_safety = enforce;
    }

    // Credentials

    /// Credential behind `Authorization`
    pub fn auth(&self) -> &Credential {
        &self.auth
    }

    /// Credential behind `Proxy-Authorization`
    pub fn proxy_auth(&self) -> &Credential {
        &self.proxy_auth
    }

    /// Kind of credential behind `Authorization`
    pub fn auth_type(&self) -> AuthType {
        self.auth.auth_type()
    }

    /// Basic-auth username
    pub fn username(&self) -> Option<&str> {
        self.auth.username()
    }

    /// Set or clear the basic-auth username
    pub fn set_username(&mut self, value: Option<&str>) {
        self.update_auth(|auth| auth.set_username(value));
    }

    /// Set or clear the basic-auth password
    pub fn set_password(&mut self, value: Option<&str>) {
        self.update_auth(|auth| auth.set_password(value));
    }

    /// Set or clear the access token. A token clears username and password.
    pub fn set_access_token(&mut self, value: Option<&str>) {
        self.update_auth(|auth| auth.set_access_token(value));
    }

    /// Set the access token type; blank resets it to `Bearer`.
    pub fn set_access_token_type(&mut self, value: Option<&str>) {
        self.update_auth(|auth| auth.set_access_token_type(value));
    }

    /// Replace the whole credential with a copy of `credential`.
    pub fn set_auth(&mut self, credential: &Credential) {
        self.auth = credential.clone();
        self.refresh_auth_headers();
    }

    /// Set or clear the proxy username
    pub fn set_proxy_username(&mut self, value: Option<&str>) {
        self.update_proxy_auth(|auth| auth.set_username(value));
    }

    /// Set or clear the proxy password
    pub fn set_proxy_password(&mut self, value: Option<&str>) {
        self.update_proxy_auth(|auth| auth.set_password(value));
    }

    /// Set or clear the proxy access token
    pub fn set_proxy_access_token(&mut self, value: Option<&str>) {
        self.update_proxy_auth(|auth| auth.set_access_token(value));
    }

    /// Set the proxy access token type
    pub fn set_proxy_access_token_type(&mut self, value: Option<&str>) {
        self.update_proxy_auth(|auth| auth.set_access_token_type(value));
    }

    /// Replace the proxy credential with a copy of `credential`.
    pub fn set_proxy_auth(&mut self, credential: &Credential) {
        self.proxy_auth = credential.clone();
        self.refresh_auth_headers();
    }

    fn update_auth(&mut self, change: impl FnOnce(&mut Credential) -> bool) {
        if change(&mut self.auth) {
            self.refresh_auth_headers();
        }
    }

    fn update_proxy_auth(&mut self, change: impl FnOnce(&mut Credential) -> bool) {
        if change(&mut self.proxy_auth) {
            self.refresh_auth_headers();
        }
    }

    /// Write both credential headers, removing the ones without a credential.
    fn refresh_auth_headers(&mut self) {
        for (name, value) in [
            (AUTHORIZATION, self.auth.header()),
            (PROXY_AUTHORIZATION, self.proxy_auth.header()),
        ] {
            match value {
                Some(value) => self.headers.set(name, value),
                None => {
                    self.headers.delete(name);
                }
            }
        }
    }

    /// Write the credential headers that have a credential, leaving
    /// explicitly configured headers alone otherwise.
    fn install_auth_headers(&mut self) {
        if let Some(value) = self.auth.header() {
            self.headers.set(AUTHORIZATION, value);
        }
        if let Some(value) = self.proxy_auth.header() {
            self.headers.set(PROXY_AUTHORIZATION, value);
        }
    }

    // Crypto keys

    /// Configured crypto keys
    pub fn keys(&self) -> &CryptoKeys {
        &self.keys
    }

    /// Replace every crypto key
    pub fn set_keys(&mut self, keys: CryptoKeys) {
        self.keys = keys;
    }

    /// Set or clear the signing key
    pub fn set_signing_key(&mut self, key: Option<CryptoKey>) {
        self.keys.signing = key;
    }

    /// Set or clear the verification key
    pub fn set_verification_key(&mut self, key: Option<CryptoKey>) {
        self.keys.verification = key;
    }

    /// Set or clear the encryption key
    pub fn set_encryption_key(&mut self, key: Option<CryptoKey>) {
        self.keys.encryption = key;
    }

    /// Set or clear the decryption key
    pub fn set_decryption_key(&mut self, key: Option<CryptoKey>) {
        self.keys.decryption = key;
    }

    // Merging

    /// Merge `other` into this request.
    ///
    /// With `override_existing` the values of `other` win; without it
    /// `other` only fills what this request leaves unset. Credentials move
    /// as a whole, so a password always travels with its username. The URL
    /// itself is not copied, only its query parameters.
    pub fn assign(&mut self, other: &Request, override_existing: bool) {
        fn pick<T: Clone>(mine: &Option<T>, theirs: &Option<T>, prefer_theirs: bool) -> Option<T> {
            if prefer_theirs {
                theirs.clone().or_else(|| mine.clone())
            } else {
                mine.clone().or_else(|| theirs.clone())
            }
        }

        if override_existing {
            self.set_method(&other.method);
            self.cache = other.cache;
            self.redirect = other.redirect;
            self.referrer_policy = other.referrer_policy;
            self.enforce_method_safety = other.enforce_method_safety;
        }
        self.mode = pick(&self.mode, &other.mode, override_existing);
        if self.cache == CacheMode::OnlyIfCached {
            self.mode = Some(CorsMode::SameOrigin);
        }
        self.credentials = pick(&self.credentials, &other.credentials, override_existing);
        self.referrer = pick(&self.referrer, &other.referrer, override_existing);
        self.timeout = pick(&self.timeout, &other.timeout, override_existing);
        self.sri = pick(&self.sri, &other.sri, override_existing);

        self.keys = CryptoKeys {
            signing: pick(&self.keys.signing, &other.keys.signing, override_existing),
            verification: pick(&self.keys.verification, &other.keys.verification, override_existing),
            encryption: pick(&self.keys.encryption, &other.keys.encryption, override_existing),
            decryption: pick(&self.keys.decryption, &other.keys.decryption, override_existing),
        };

        // An explicit header without a credential behind it is kept as is
        let adopt = |mine: &Credential, theirs: &Credential, explicit: bool| {
            let theirs_set = theirs.auth_type() != AuthType::None;
            let mine_set = mine.auth_type() != AuthType::None;
            theirs_set && (override_existing || (!mine_set && !explicit))
        };
        if adopt(&self.auth, &other.auth, self.headers.has(AUTHORIZATION)) {
            self.auth = other.auth.clone();
        }
        if adopt(&self.proxy_auth, &other.proxy_auth, self.headers.has(PROXY_AUTHORIZATION)) {
            self.proxy_auth = other.proxy_auth.clone();
        }

        for (name, value) in other.headers.iter() {
            if name.eq_ignore_ascii_case(AUTHORIZATION) || name.eq_ignore_ascii_case(PROXY_AUTHORIZATION) {
                continue;
            }
            self.set_header(name, value.clone(), override_existing);
        }
        for (name, value) in other.url.query().iter() {
            self.set_query_parameter(name, value.clone(), override_existing);
        }

        if other.body.is_some() && (override_existing || self.body.is_none()) {
            self.apply_body(other.body.clone(), true);
        }
        self.install_auth_headers();
    }

    // Sending

    /// Handle that aborts this request from another task.
    pub fn abort_signal(&self) -> AbortSignal {
        self.signal.clone()
    }

    /// Abort the request. Returns `false` if it was already aborted.
    pub fn abort(&self) -> bool {
        self.signal.abort()
    }

    /// The descriptor that `send()` would hand to the transport, before crypto.
    pub fn descriptor(&self) -> TransportRequest {
        let (headers, payload) = self.outgoing();
        self.build_descriptor(headers, payload)
    }

    /// Headers and payload to transmit once method safety is applied.
    fn outgoing(&self) -> (HeaderStore, Option<Bytes>) {
        let mut headers = self.headers.clone();
        let mut payload = self.payload.clone();
        let safe = self.enforce_method_safety && is_idempotent_method(&self.method);
        if payload.is_some() && (safe || is_nobody_method(&self.method)) {
            debug!(method = %self.method, "dropping body the method cannot carry");
            payload = None;
            for name in [CONTENT_LENGTH, CONTENT_TYPE, CONTENT_ENCODING, CONTENT_TRANSFER_ENCODING] {
                headers.delete(name);
            }
        }
        (headers, payload)
    }

    fn build_descriptor(&self, headers: HeaderStore, payload: Option<Bytes>) -> TransportRequest {
        let mode = if self.cache == CacheMode::OnlyIfCached {
            Some(CorsMode::SameOrigin)
        } else {
            self.mode
        };
        TransportRequest {
            url: self.url.href(),
            method: self.method.clone(),
            headers: headers.entries(),
            body: payload.filter(|_| !is_nobody_method(&self.method)),
            cache: self.cache,
            mode,
            credentials: self.credentials,
            redirect: self.redirect,
            referrer: self.referrer.clone(),
            referrer_policy: self.referrer_policy,
            timeout: self.timeout,
            integrity: self.sri.clone(),
        }
    }

    /// Send the request through `transport`.
    ///
    /// Fails with [`HttpError::Configuration`] before any I/O when crypto
    /// keys are configured but the runtime has no crypto capability.
    pub async fn send(&mut self, transport: &dyn Transport) -> Result<Response> {
        if self.state != RequestState::Configured {
            return Err(HttpError::AlreadySent);
        }
        let crypto = self.runtime.crypto.clone();
        if self.keys.any() && crypto.is_none() {
            return Err(HttpError::config(
                "crypto keys are configured but the runtime has no crypto capability",
            ));
        }

        self.transition(RequestState::Sending);
        let result = self.dispatch(transport, crypto.as_deref()).await;
        match &result {
            Ok(response) => {
                self.events.emit(
                    "response",
                    json!({ "status": response.status, "url": response.url }),
                );
                self.transition(RequestState::Completed);
            }
            Err(HttpError::Aborted) => {
                self.events.emit("abort", Value::Null);
                self.transition(RequestState::Aborted);
            }
            Err(error) => {
                self.events.emit("error", json!({ "message": error.to_string() }));
                self.transition(RequestState::Failed);
            }
        }
        result
    }

    async fn dispatch(
        &self,
        transport: &dyn Transport,
        crypto: Option<&dyn Crypto>,
    ) -> Result<Response> {
        let (mut headers, mut payload) = self.outgoing();

        if let (Some(crypto), Some(key), Some(plain)) =
            (crypto, self.keys.encryption.as_ref(), payload.as_ref())
        {
            let sealed = crypto.encrypt(plain, key).await?;
            headers.set(CONTENT_TYPE, content::ENCRYPTED.to_string());
            headers.append(CONTENT_ENCODING, &crypto.encryption_algorithm(key));
            if !headers.has(CONTENT_TRANSFER_ENCODING) {
                headers.set(CONTENT_TRANSFER_ENCODING, "base64".to_string());
            }
            headers.set(CONTENT_LENGTH, sealed.len().to_string());
            payload = Some(sealed);
        }
        if let (Some(crypto), Some(key), Some(body)) =
            (crypto, self.keys.signing.as_ref(), payload.as_ref())
        {
            headers.set(SIGNATURE, crypto.sign(body, key).await?);
        }

        let descriptor = self.build_descriptor(headers, payload);
        debug!(method = %descriptor.method, url = %descriptor.url, "sending request");
        self.events.emit(
            "send",
            json!({ "method": descriptor.method, "url": descriptor.url }),
        );

        let signal = self.signal.clone();
        let mut response = tokio::select! {
            biased;
            _ = signal.aborted() => return Err(HttpError::Aborted),
            result = transport.send(descriptor) => result?,
        };

        if let (Some(crypto), Some(key)) = (crypto, self.keys.verification.as_ref()) {
            if let Some(signature) = response.header(SIGNATURE).map(str::to_string) {
                if !crypto.verify(&response.body, &signature, key).await? {
                    return Err(HttpError::Verification { signature });
                }
            }
        }
        if let (Some(crypto), Some(key)) = (crypto, self.keys.response_key()) {
            if response.has_body() {
                match crypto.decrypt(key, &response.body).await {
                    Ok(plain) => response.body = plain,
                    Err(error) => {
                        warn!(error = %error, "response body could not be decrypted, keeping it as received")
                    }
                }
            }
        }
        Ok(response)
    }

    fn transition(&mut self, next: RequestState) {
        let previous = std::mem::replace(&mut self.state, next);
        debug!(from = previous.as_str(), to = next.as_str(), url = %self.url, "request state");
        self.events.emit(
            "state",
            json!({ "old": previous.as_str(), "new": next.as_str() }),
        );
    }
}

impl Clone for Request {
    /// Configured copy with the same settings and copied credentials.
    ///
    /// The clone has its own abort signal and no listeners.
    fn clone(&self) -> Self {
        Request {
            method: self.method.clone(),
            url: self.url.clone(),
            configured_url: self.configured_url.clone(),
            headers: self.headers.clone(),
            body: self.body.clone(),
            payload: self.payload.clone(),
            cache: self.cache,
            mode: self.mode,
            credentials: self.credentials,
            redirect: self.redirect,
            referrer: self.referrer.clone(),
            referrer_policy: self.referrer_policy,
            timeout: self.timeout,
            sri: self.sri.clone(),
            enforce_method_safety: self.enforce_method_safety,
            auth: self.auth.clone(),
            proxy_auth: self.proxy_auth.clone(),
            keys: self.keys.clone(),
            runtime: self.runtime.clone(),
            state: RequestState::Configured,
            signal: AbortSignal::new(),
            events: EventEmitter::new(),
        }
    }
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("method", &self.method)
            .field("url", &self.url.href())
            .field("state", &self.state)
            .field("cache", &self.cache)
            .field("redirect", &self.redirect)
            .field("auth", &self.auth)
            .finish()
    }
}
