//! Long-lived remote resource.
//!
//! A [`Resource`] holds the defaults shared by every call to one backend:
//! base URL, headers, query parameters, credentials, fetch modes, crypto
//! keys and cache-busting flags. Each call runs through a preflight that
//! layers these defaults under the call's own overrides.
//!
//! # Precedence
//!
//! | Setting | Winner |
//! |---------|--------|
//! | headers, query, credentials | call, then resource |
//! | cache, mode, redirect, referrer, timeout | call, then resource, then request default |
//! | crypto keys | call key, then resource key (only when the operation is enabled) |
//!
//! # Access tokens
//!
//! [`Resource::set_access_token`] accepts an expiry. A future expiry emits
//! `token.update` and schedules `token.expired` (and `token.expiration.pending`
//! ahead of it when a renewal notice is configured); a past expiry emits
//! `token.expired` at once. Expiry clears the token so later requests carry
//! no `Authorization` header.
//!
//! # Examples
//!
//! ```ignore
//! use uniform_http::{Resource, ResourceConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let api = Resource::new(ResourceConfig {
//!         base_url: Some("https://api.example.com".into()),
//!         access_token: Some("secret".into()),
//!         ..Default::default()
//!     })?;
//!     let v1 = api.route("/v1");
//!     let items = v1.get("items").await?; // GET https://api.example.com/v1/items
//!     println!("{}", items.status);
//!     Ok(())
//! }
//! ```

use crate::address::{collapse_slashes, Address};
use crate::client::config::{CallConfig, RequestConfig, ResourceConfig};
use crate::client::crypto::{CryptoKey, CryptoKeys};
use crate::client::http_client::{Client, Preflight};
use crate::client::request::Request;
use crate::client::route::Route;
use crate::client::utils::{cache_busting_parameter, is_absolute_url, unique_token};
use crate::credential::AuthType;
use crate::error::{HttpError, Result};
use crate::events::{EventEmitter, ListenerId};
use crate::protocol::constants::headers::{ACCEPT, AUTHORIZATION, PROXY_AUTHORIZATION, USER_AGENT};
use crate::protocol::constants::JSON_ACCEPT;
use crate::protocol::{CacheMode, CorsMode, CredentialsMode, RedirectMode, ReferrerPolicy};
use crate::store::{HeaderStore, MapStore};
use crate::types::{QueryValue, Response};
use parking_lot::{Mutex, RwLock};
use serde_json::{json, Value};
use std::fmt;
use std::sync::{Arc, Weak};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

struct ResourceState {
    base: Address,
    template: Request,
    cache: Option<CacheMode>,
    mode: Option<CorsMode>,
    credentials: Option<CredentialsMode>,
    redirect: Option<RedirectMode>,
    referrer: Option<String>,
    referrer_policy: Option<ReferrerPolicy>,
    timeout_ms: Option<u64>,
    https_only: bool,
    nocache: bool,
    unique: bool,
    user_agent: Option<String>,
    unique_agent: bool,
    keys: CryptoKeys,
    encrypt_all: bool,
    decrypt_all: bool,
    sign_all: bool,
    verify_all: bool,
    token_expiration: Option<SystemTime>,
    // Bumped by every token change; stale expiry timers compare against it
    token_generation: u64,
    renewal_notice: Duration,
}

pub(crate) struct ResourceShared {
    client: Client,
    state: RwLock<ResourceState>,
    events: EventEmitter,
    timers: Mutex<Vec<JoinHandle<()>>>,
    // Relay from the resource this one was cloned from
    relay: Mutex<Option<(EventEmitter, ListenerId)>>,
}

/// A remote resource with shared request defaults.
///
/// Handles created by [`route`](Resource::route) share this state;
/// [`clone_with`](Resource::clone_with) creates an independent copy.
pub struct Resource {
    shared: Arc<ResourceShared>,
}

fn epoch_millis(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value.map(str::trim).filter(|v| !v.is_empty()).map(str::to_string)
}

/// Effective key of one crypto operation.
///
/// Disabled operations only use a key given on the call itself.
fn resolve_key(
    call_key: Option<&CryptoKey>,
    resource_key: Option<&CryptoKey>,
    call_flag: Option<bool>,
    enabled_for_all: bool,
    failure: &str,
) -> Result<Option<CryptoKey>> {
    if !call_flag.unwrap_or(enabled_for_all) {
        return Ok(call_key.cloned());
    }
    call_key
        .or(resource_key)
        .cloned()
        .map(Some)
        .ok_or_else(|| HttpError::config(failure))
}

impl ResourceState {
    fn prepare_url(&self, uri: &str) -> Result<String> {
        let uri = uri.trim();
        let mut address = if is_absolute_url(uri) {
            Address::parse(uri)?
        } else if uri.starts_with("..") {
            Address::resolve(uri, &self.base.href())?
        } else {
            let split = uri.find(|c| c == '?' || c == '#').unwrap_or(uri.len());
            let (path, suffix) = uri.split_at(split);
            let path = if path.is_empty() {
                self.base.path().to_string()
            } else {
                collapse_slashes(&format!("{}/{}", self.base.path(), path))
            };
            Address::resolve(&format!("{}{}", path, suffix), &self.base.origin())?
        };
        if self.https_only {
            address.set_protocol("https");
        }
        Ok(address.href())
    }

    fn snapshot(&self) -> ResourceConfig {
        let auth = self.template.auth();
        let headers = self
            .template
            .headers()
            .iter()
            .filter(|(name, _)| {
                !name.eq_ignore_ascii_case(AUTHORIZATION)
                    && !name.eq_ignore_ascii_case(PROXY_AUTHORIZATION)
            })
            .map(|(name, value)| (name.to_string(), value.clone()))
            .collect();
        let query = self
            .template
            .url()
            .query()
            .iter()
            .map(|(name, value)| (name.to_string(), value.clone()))
            .collect();

        ResourceConfig {
            base_url: Some(self.base.href()),
            headers,
            query,
            username: auth.username().map(str::to_string),
            password: auth.password().map(str::to_string),
            access_token: auth.access_token().map(str::to_string),
            access_token_type: Some(auth.access_token_type().to_string()),
            access_token_expiration_ms: None,
            token_renewal_notice_ms: self.renewal_notice.as_millis() as u64,
            cache: self.cache,
            mode: self.mode,
            credentials: self.credentials,
            redirect: self.redirect,
            referrer: self.referrer.clone(),
            referrer_policy: self.referrer_policy,
            timeout_ms: self.timeout_ms,
            https_only: self.https_only,
            nocache: self.nocache,
            unique: self.unique,
            user_agent: self.user_agent.clone(),
            unique_agent: self.unique_agent,
            signing_key: self.keys.signing.clone(),
            verification_key: self.keys.verification.clone(),
            encryption_key: self.keys.encryption.clone(),
            decryption_key: self.keys.decryption.clone(),
            encrypt_all: self.encrypt_all,
            decrypt_all: self.decrypt_all,
            sign_all: self.sign_all,
            verify_all: self.verify_all,
        }
    }
}

impl Preflight for ResourceShared {
    fn preflight(&self, request: &mut Request, call: &CallConfig) -> Result<()> {
        let state = self.state.read();

        let keys = CryptoKeys {
            encryption: resolve_key(
                call.encryption_key.as_ref(),
                state.keys.encryption.as_ref(),
                call.encrypt,
                state.encrypt_all,
                "cannot encrypt request body without an encryption key",
            )?,
            decryption: resolve_key(
                call.decryption_key.as_ref(),
                state.keys.decryption.as_ref().or(state.keys.encryption.as_ref()),
                call.decrypt,
                state.decrypt_all,
                "cannot decrypt response body without a decryption key",
            )?,
            signing: resolve_key(
                call.signing_key.as_ref(),
                state.keys.signing.as_ref(),
                call.sign,
                state.sign_all,
                "cannot sign request body without a private key",
            )?,
            verification: resolve_key(
                call.verification_key.as_ref(),
                state.keys.verification.as_ref(),
                call.verify,
                state.verify_all,
                "cannot verify response body without a public key",
            )?,
        };
        request.set_keys(keys);

        request.assign(&state.template, false);

        if call.cache.is_none() {
            if state.nocache {
                request.set_cache(CacheMode::NoCache);
            } else if let Some(cache) = state.cache {
                request.set_cache(cache);
            }
        }
        if let (None, Some(mode)) = (call.mode, state.mode) {
            request.set_mode(Some(mode));
        }
        if let (None, Some(credentials)) = (call.credentials, state.credentials) {
            request.set_credentials_mode(Some(credentials));
        }
        if let (None, Some(redirect)) = (call.redirect, state.redirect) {
            request.set_redirect(redirect);
        }
        if let (None, Some(referrer)) = (&call.referrer, &state.referrer) {
            request.set_referrer(Some(referrer.as_str()));
        }
        if let (None, Some(policy)) = (call.referrer_policy, state.referrer_policy) {
            request.set_referrer_policy(policy);
        }
        if let (None, Some(timeout)) = (call.timeout_ms, state.timeout_ms) {
            request.set_timeout_ms(timeout);
        }

        if state.unique {
            request.set_query_parameter(&cache_busting_parameter(), "", true);
        }

        let mut agent = state.user_agent.clone().unwrap_or_default();
        if state.unique_agent {
            agent = format!("{} ID#{}", agent, unique_token());
        }
        let agent = agent.trim();
        if !agent.is_empty() {
            if request.runtime().browser {
                request.remove_header(USER_AGENT);
                warn!(
                    user_agent = agent,
                    "browsers refuse a custom User-Agent, the header was not set"
                );
            } else {
                request.set_header(USER_AGENT, agent, true);
            }
        }

        debug!(method = request.method(), url = %request.url().href(), "preflight complete");
        Ok(())
    }
}

impl ResourceShared {
    fn cancel_timers(&self) {
        for timer in self.timers.lock().drain(..) {
            timer.abort();
        }
    }

    fn expire(&self, manually: bool) {
        self.cancel_timers();
        self.clear_token();
        warn!("HTTP resource access token expired");
        self.events.emit("token.expired", json!({ "manually": manually }));
    }

    /// Expiry fired by a timer. Does nothing if the token changed since
    /// the timer was scheduled.
    fn expire_scheduled(&self, generation: u64) {
        {
            let mut state = self.state.write();
            if state.token_generation != generation {
                debug!("access token replaced, skipping stale expiry");
                return;
            }
            state.template.set_access_token(None);
            state.token_expiration = None;
            state.token_generation += 1;
            self.cancel_timers();
        }
        warn!("HTTP resource access token expired");
        self.events.emit("token.expired", json!({ "manually": false }));
    }

    fn clear_token(&self) {
        let mut state = self.state.write();
        state.template.set_access_token(None);
        state.token_expiration = None;
        state.token_generation += 1;
    }

    fn schedule_expiry(
        self: &Arc<Self>,
        remaining: Duration,
        expires_at: SystemTime,
        generation: u64,
    ) {
        let expires = epoch_millis(expires_at);
        self.events.emit("token.update", json!({ "expires": expires }));

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!("no tokio runtime available, access token expiry will not fire");
            return;
        };

        let mut timers = Vec::with_capacity(2);
        let weak: Weak<Self> = Arc::downgrade(self);
        timers.push(runtime.spawn(async move {
            tokio::time::sleep(remaining).await;
            if let Some(shared) = weak.upgrade() {
                shared.expire_scheduled(generation);
            }
        }));

        let notice = self.state.read().renewal_notice;
        if !notice.is_zero() {
            let weak: Weak<Self> = Arc::downgrade(self);
            let lead = remaining.saturating_sub(notice);
            timers.push(runtime.spawn(async move {
                tokio::time::sleep(lead).await;
                if let Some(shared) = weak.upgrade() {
                    if shared.state.read().token_generation == generation {
                        shared
                            .events
                            .emit("token.expiration.pending", json!({ "expires": expires }));
                    }
                }
            }));
        }
        *self.timers.lock() = timers;
    }
}

impl Drop for ResourceShared {
    fn drop(&mut self) {
        for timer in self.timers.get_mut().drain(..) {
            timer.abort();
        }
        if let Some((origin, id)) = self.relay.get_mut().take() {
            origin.off(id);
        }
    }
}

impl Resource {
    /// Resource over a native [`Client`].
    pub fn new(config: ResourceConfig) -> Result<Self> {
        Self::with_client(config, Client::new())
    }

    /// Resource issuing its requests through `client`.
    ///
    /// A missing base URL defaults to the runtime origin.
    pub fn with_client(config: ResourceConfig, client: Client) -> Result<Self> {
        let runtime = client.runtime().clone();
        let mut base = Address::resolve(config.base_url.as_deref().unwrap_or_default(), &runtime.origin)?;
        if config.https_only {
            base.set_protocol("https");
        }

        let mut template = Request::with_config(
            RequestConfig {
                url: base.href(),
                headers: config.headers,
                username: config.username,
                password: config.password,
                access_token: config.access_token.clone(),
                access_token_type: config.access_token_type.clone(),
                ..Default::default()
            },
            runtime,
        )?;
        template.set_query(config.query, true);

        let state = ResourceState {
            base,
            template,
            cache: config.cache,
            mode: config.mode,
            credentials: config.credentials,
            redirect: config.redirect,
            referrer: non_blank(config.referrer.as_deref()),
            referrer_policy: config.referrer_policy,
            timeout_ms: config.timeout_ms,
            https_only: config.https_only,
            nocache: config.nocache,
            unique: config.unique,
            user_agent: non_blank(config.user_agent.as_deref()),
            unique_agent: config.unique_agent,
            keys: CryptoKeys {
                signing: config.signing_key,
                verification: config.verification_key,
                encryption: config.encryption_key,
                decryption: config.decryption_key,
            },
            encrypt_all: config.encrypt_all,
            decrypt_all: config.decrypt_all,
            sign_all: config.sign_all,
            verify_all: config.verify_all,
            token_expiration: None,
            token_generation: 0,
            renewal_notice: Duration::from_millis(config.token_renewal_notice_ms),
        };

        let resource = Resource {
            shared: Arc::new(ResourceShared {
                client,
                state: RwLock::new(state),
                events: EventEmitter::new(),
                timers: Mutex::new(Vec::new()),
                relay: Mutex::new(None),
            }),
        };

        if let (Some(token), Some(millis)) = (
            config.access_token.as_deref(),
            config.access_token_expiration_ms,
        ) {
            resource.set_access_token(
                Some(token),
                config.access_token_type.as_deref(),
                Some(UNIX_EPOCH + Duration::from_millis(millis)),
            );
        }
        Ok(resource)
    }

    pub(crate) fn handle(&self) -> Resource {
        Resource {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Observer list: `token.*`, `update.baseurl` and relayed `origin.*` events
    pub fn events(&self) -> &EventEmitter {
        &self.shared.events
    }

    /// Client requests go through
    pub fn client(&self) -> &Client {
        &self.shared.client
    }

    // Base URL

    /// Base URL every relative call is prefixed with
    pub fn base_url(&self) -> String {
        self.shared.state.read().base.href()
    }

    /// Replace the base URL. The change is logged as a warning.
    pub fn set_base_url(&self, url: &str) -> Result<()> {
        let (old, new) = {
            let mut state = self.shared.state.write();
            let origin = state.template.runtime().origin.clone();
            let mut base = Address::resolve(url, &origin)?;
            if state.https_only {
                base.set_protocol("https");
            }
            let old = std::mem::replace(&mut state.base, base);
            (old.href(), state.base.href())
        };
        warn!(old = %old, new = %new, "HTTP resource base URL changed");
        self.shared
            .events
            .emit("update.baseurl", json!({ "old": old, "new": new }));
        Ok(())
    }

    /// Fully qualified URL for `uri`.
    ///
    /// Relative input is appended to the base path unless it starts with
    /// `..`, which resolves against the base URL instead. Absolute URLs are
    /// kept. With `https_only` the protocol is forced to `https`.
    pub fn prepare_url(&self, uri: &str) -> Result<String> {
        self.shared.state.read().prepare_url(uri)
    }

    // Headers and query parameters

    /// Copy of the shared headers
    pub fn headers(&self) -> HeaderStore {
        self.shared.state.read().template.headers().clone()
    }

    /// Set a header sent on every request
    pub fn set_header(&self, name: &str, value: &str) {
        self.shared
            .state
            .write()
            .template
            .set_header(name, value, true);
    }

    /// Stop sending a shared header
    pub fn remove_header(&self, name: &str) -> Option<String> {
        self.shared.state.write().template.remove_header(name)
    }

    /// Remove every shared header except the credential headers
    pub fn clear_headers(&self) {
        let mut state = self.shared.state.write();
        let names: Vec<String> = state
            .template
            .headers()
            .keys()
            .into_iter()
            .filter(|name| {
                !name.eq_ignore_ascii_case(AUTHORIZATION)
                    && !name.eq_ignore_ascii_case(PROXY_AUTHORIZATION)
            })
            .collect();
        for name in names {
            state.template.remove_header(&name);
        }
    }

    /// Copy of the shared query parameters
    pub fn parameters(&self) -> MapStore<QueryValue> {
        self.shared.state.read().template.url().query().clone()
    }

    /// Set a query parameter sent on every request
    pub fn set_parameter(&self, name: &str, value: impl Into<QueryValue>) {
        self.shared
            .state
            .write()
            .template
            .set_query_parameter(name, value, true);
    }

    /// Set several shared query parameters
    pub fn set_query<I, K, V>(&self, params: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<QueryValue>,
    {
        self.shared.state.write().template.set_query(params, true);
    }

    /// Stop sending a shared query parameter
    pub fn remove_parameter(&self, name: &str) -> Option<QueryValue> {
        self.shared
            .state
            .write()
            .template
            .remove_query_parameter(name)
    }

    /// Remove every shared query parameter
    pub fn clear_parameters(&self) {
        self.shared.state.write().template.clear_query_parameters();
    }

    // Credentials

    /// Basic-auth username
    pub fn username(&self) -> Option<String> {
        self.shared
            .state
            .read()
            .template
            .username()
            .map(str::to_string)
    }

    /// Set or clear the basic-auth username
    pub fn set_username(&self, value: Option<&str>) {
        self.shared.state.write().template.set_username(value);
    }

    /// Set or clear the basic-auth password
    pub fn set_password(&self, value: Option<&str>) {
        self.shared.state.write().template.set_password(value);
    }

    /// Kind of credential in effect
    pub fn auth_type(&self) -> AuthType {
        self.shared.state.read().template.auth_type()
    }

    /// Current `Authorization` value
    pub fn authorization(&self) -> Option<String> {
        self.shared.state.read().template.auth().header()
    }

    /// Set or clear the access token.
    ///
    /// Pending expiry timers are always cancelled. With `expiration` in the
    /// past `token.expired` fires immediately; in the future it is scheduled
    /// on the current tokio runtime.
    pub fn set_access_token(
        &self,
        token: Option<&str>,
        token_type: Option<&str>,
        expiration: Option<SystemTime>,
    ) {
        self.shared.cancel_timers();
        let (has_token, generation) = {
            let mut state = self.shared.state.write();
            state.template.set_access_token(token);
            state.template.set_access_token_type(token_type);
            state.token_expiration = expiration;
            state.token_generation += 1;
            (state.template.auth().has_access_token(), state.token_generation)
        };

        let Some(expiration) = expiration.filter(|_| has_token) else {
            return;
        };
        match expiration.duration_since(SystemTime::now()) {
            Ok(remaining) if !remaining.is_zero() => {
                self.shared.schedule_expiry(remaining, expiration, generation)
            }
            _ => self.shared.expire(false),
        }
    }

    /// When the current access token expires, if scheduled
    pub fn access_token_expiration(&self) -> Option<SystemTime> {
        self.shared.state.read().token_expiration
    }

    /// Expire the access token now.
    pub fn expire_access_token(&self) {
        self.shared.expire(true);
    }

    /// Lead time of `token.expiration.pending`; zero disables it.
    ///
    /// Applies to tokens set afterwards.
    pub fn set_token_renewal_notice(&self, notice: Duration) {
        self.shared.state.write().renewal_notice = notice;
    }

    // Fetch modes

    /// Shared cache mode
    pub fn cache(&self) -> Option<CacheMode> {
        self.shared.state.read().cache
    }

    /// Set the shared cache mode
    pub fn set_cache(&self, cache: Option<CacheMode>) {
        self.shared.state.write().cache = cache;
    }

    /// Shared CORS mode
    pub fn mode(&self) -> Option<CorsMode> {
        self.shared.state.read().mode
    }

    /// Set the shared CORS mode
    pub fn set_mode(&self, mode: Option<CorsMode>) {
        self.shared.state.write().mode = mode;
    }

    /// Shared credentials mode
    pub fn credentials_mode(&self) -> Option<CredentialsMode> {
        self.shared.state.read().credentials
    }

    /// Set the shared credentials mode
    pub fn set_credentials_mode(&self, mode: Option<CredentialsMode>) {
        self.shared.state.write().credentials = mode;
    }

    /// Shared redirect mode
    pub fn redirect(&self) -> Option<RedirectMode> {
        self.shared.state.read().redirect
    }

    /// Set the shared redirect mode
    pub fn set_redirect(&self, redirect: Option<RedirectMode>) {
        self.shared.state.write().redirect = redirect;
    }

    /// Shared referrer
    pub fn referrer(&self) -> Option<String> {
        self.shared.state.read().referrer.clone()
    }

    /// Set the shared referrer
    pub fn set_referrer(&self, referrer: Option<&str>) {
        self.shared.state.write().referrer = non_blank(referrer);
    }

    /// Shared referrer policy
    pub fn referrer_policy(&self) -> Option<ReferrerPolicy> {
        self.shared.state.read().referrer_policy
    }

    /// Set the shared referrer policy
    pub fn set_referrer_policy(&self, policy: Option<ReferrerPolicy>) {
        self.shared.state.write().referrer_policy = policy;
    }

    /// Set the shared timeout in milliseconds
    pub fn set_timeout_ms(&self, millis: Option<u64>) {
        self.shared.state.write().timeout_ms = millis;
    }

    /// Force `no-cache` on every request
    pub fn set_nocache(&self, nocache: bool) {
        self.shared.state.write().nocache = nocache;
    }

    /// Add a cache-busting query parameter to every request
    pub fn set_unique(&self, unique: bool) {
        self.shared.state.write().unique = unique;
    }

    /// Set or clear the custom `User-Agent`
    pub fn set_user_agent(&self, agent: Option<&str>) {
        self.shared.state.write().user_agent = non_blank(agent);
    }

    /// Suffix the `User-Agent` with a unique `ID#` token
    pub fn set_unique_agent(&self, unique: bool) {
        self.shared.state.write().unique_agent = unique;
    }

    /// Force the `https` protocol on the base and every prepared URL
    pub fn set_https_only(&self, https_only: bool) {
        let mut state = self.shared.state.write();
        state.https_only = https_only;
        if https_only {
            state.base.set_protocol("https");
        }
    }

    // Crypto

    /// Resource-level crypto keys
    pub fn keys(&self) -> CryptoKeys {
        self.shared.state.read().keys.clone()
    }

    /// Replace the resource-level crypto keys
    pub fn set_keys(&self, keys: CryptoKeys) {
        self.shared.state.write().keys = keys;
    }

    /// Encrypt every request body
    pub fn set_encrypt_all(&self, enabled: bool) {
        self.shared.state.write().encrypt_all = enabled;
    }

    /// Decrypt every response body
    pub fn set_decrypt_all(&self, enabled: bool) {
        self.shared.state.write().decrypt_all = enabled;
    }

    /// Sign every request body
    pub fn set_sign_all(&self, enabled: bool) {
        self.shared.state.write().sign_all = enabled;
    }

    /// Verify every response signature
    pub fn set_verify_all(&self, enabled: bool) {
        self.shared.state.write().verify_all = enabled;
    }

    // Derived resources

    /// Path-scoped view sharing all state with this resource.
    pub fn route(&self, path: &str) -> Route {
        Route::new(self.handle(), path)
    }

    /// Independent resource seeded from the current settings.
    ///
    /// Fields set in `overrides` replace the current values; boolean flags
    /// can only be switched on. Every future event of this resource is
    /// relayed onto the clone with an `origin.` prefix.
    pub fn clone_with(&self, overrides: ResourceConfig) -> Result<Resource> {
        let current = self.shared.state.read().snapshot();

        let token_override = overrides.access_token.is_some();
        let basic_override = overrides.username.is_some() || overrides.password.is_some();
        let access_token = if basic_override && !token_override {
            None
        } else {
            overrides.access_token.or(current.access_token)
        };

        let merged = ResourceConfig {
            base_url: overrides.base_url.or(current.base_url),
            headers: if overrides.headers.is_empty() {
                current.headers
            } else {
                overrides.headers
            },
            query: if overrides.query.is_empty() {
                current.query
            } else {
                overrides.query
            },
            username: overrides.username.or(current.username),
            password: overrides.password.or(current.password),
            access_token,
            access_token_type: overrides.access_token_type.or(current.access_token_type),
            access_token_expiration_ms: overrides.access_token_expiration_ms,
            token_renewal_notice_ms: if overrides.token_renewal_notice_ms > 0 {
                overrides.token_renewal_notice_ms
            } else {
                current.token_renewal_notice_ms
            },
            cache: overrides.cache.or(current.cache),
            mode: overrides.mode.or(current.mode),
            credentials: overrides.credentials.or(current.credentials),
            redirect: overrides.redirect.or(current.redirect),
            referrer: overrides.referrer.or(current.referrer),
            referrer_policy: overrides.referrer_policy.or(current.referrer_policy),
            timeout_ms: overrides.timeout_ms.or(current.timeout_ms),
            https_only: overrides.https_only || current.https_only,
            nocache: overrides.nocache || current.nocache,
            unique: overrides.unique || current.unique,
            user_agent: overrides.user_agent.or(current.user_agent),
            unique_agent: overrides.unique_agent || current.unique_agent,
            signing_key: overrides.signing_key.or(current.signing_key),
            verification_key: overrides.verification_key.or(current.verification_key),
            encryption_key: overrides.encryption_key.or(current.encryption_key),
            decryption_key: overrides.decryption_key.or(current.decryption_key),
            encrypt_all: overrides.encrypt_all || current.encrypt_all,
            decrypt_all: overrides.decrypt_all || current.decrypt_all,
            sign_all: overrides.sign_all || current.sign_all,
            verify_all: overrides.verify_all || current.verify_all,
        };

        let clone = Resource::with_client(merged, self.shared.client.clone())?;
        let id = self
            .shared
            .events
            .relay(&clone.shared.events, Some("origin"));
        *clone.shared.relay.lock() = Some((self.shared.events.share(), id));
        Ok(clone)
    }

    // Requests

    /// Build the request a call would send, preflight included.
    pub fn preflight(&self, method: &str, call: CallConfig) -> Result<Request> {
        let call = self.scope(call)?;
        let mut request = self.shared.client.build_request(method, &call)?;
        self.shared.preflight(&mut request, &call)?;
        crate::client::http_client::apply_call_attributes(&mut request, &call)?;
        Ok(request)
    }

    fn scope(&self, mut call: CallConfig) -> Result<CallConfig> {
        let url = self.prepare_url(call.url.as_deref().unwrap_or_default())?;
        call.url = Some(url);
        Ok(call)
    }

    /// Send `call` with an explicit method
    pub async fn request(&self, method: &str, call: impl Into<CallConfig>) -> Result<Response> {
        let call = self.scope(call.into())?;
        self.shared
            .client
            .execute(method, call, Some(self.shared.as_ref()))
            .await
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

    /// `GET` with a JSON `Accept` header, yielding the parsed body
    pub async fn json(&self, call: impl Into<CallConfig>) -> Result<Value> {
        let mut call = call.into();
        call.headers
            .entry(ACCEPT.to_string())
            .or_insert_with(|| JSON_ACCEPT.to_string());
        Ok(self.request("GET", call).await?.json())
    }
}

impl fmt::Debug for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.shared.state.read();
        f.debug_struct("Resource")
            .field("base_url", &state.base.href())
            .field("auth", state.template.auth())
            .field("https_only", &state.https_only)
            .field("unique", &state.unique)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::crypto::testing::MirrorCrypto;
    use crate::client::runtime::RuntimeCapabilities;
    use crate::client::transport::testing::RecordingTransport;

    fn resource_with(config: ResourceConfig, runtime: RuntimeCapabilities) -> (Resource, Arc<RecordingTransport>) {
        let transport = Arc::new(RecordingTransport::default());
        let client = Client::with_transport(transport.clone(), runtime);
        (Resource::with_client(config, client).unwrap(), transport)
    }

    fn resource(base: &str) -> (Resource, Arc<RecordingTransport>) {
        resource_with(
            ResourceConfig {
                base_url: Some(base.to_string()),
                ..Default::default()
            },
            RuntimeCapabilities::native(),
        )
    }

    fn collect(resource: &Resource, pattern: &str) -> Arc<Mutex<Vec<String>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        resource
            .events()
            .on(pattern, move |e| sink.lock().push(e.name.clone()));
        seen
    }

    #[test]
    fn test_prepare_url() {
        let (api, _) = resource("https://api.example.com/v1");
        assert_eq!(api.prepare_url("items").unwrap(), "https://api.example.com/v1/items");
        assert_eq!(api.prepare_url("/items?x=1").unwrap(), "https://api.example.com/v1/items?x=1");
        assert_eq!(api.prepare_url("./items").unwrap(), "https://api.example.com/v1/items");
        assert_eq!(api.prepare_url("//items").unwrap(), "https://api.example.com/v1/items");
        assert_eq!(api.prepare_url("").unwrap(), "https://api.example.com/v1");
        assert_eq!(api.prepare_url("../other").unwrap(), "https://api.example.com/other");
        assert_eq!(api.prepare_url("https://different.com/x").unwrap(), "https://different.com/x");
    }

    #[test]
    fn test_https_only() {
        let (api, _) = resource_with(
            ResourceConfig {
                base_url: Some("http://api.example.com".to_string()),
                https_only: true,
                ..Default::default()
            },
            RuntimeCapabilities::native(),
        );
        assert_eq!(api.base_url(), "https://api.example.com/");
        assert_eq!(api.prepare_url("http://other.com/a").unwrap(), "https://other.com/a");
    }

    #[test]
    fn test_missing_base_uses_runtime_origin() {
        let (api, _) = resource_with(
            ResourceConfig::default(),
            RuntimeCapabilities::browser("https://app.example.com"),
        );
        assert_eq!(api.base_url(), "https://app.example.com/");
    }

    #[tokio::test]
    async fn test_shared_headers_query_and_call_precedence() {
        let (api, transport) = resource("https://api.example.com");
        api.set_header("X-Shared", "resource");
        api.set_header("X-Other", "resource");
        api.set_parameter("v", "1");
        api.set_parameter("lang", "en");

        let mut call = CallConfig::url("items");
        call.headers.insert("X-Shared".to_string(), "call".to_string());
        call.query.insert("lang".to_string(), QueryValue::from("fr"));
        api.get(call).await.unwrap();

        let sent = transport.last();
        assert_eq!(sent.header("x-shared"), Some("call"));
        assert_eq!(sent.header("x-other"), Some("resource"));
        assert_eq!(sent.url, "https://api.example.com/items?v=1&lang=fr");
    }

    #[tokio::test]
    async fn test_modes_and_nocache() {
        let (api, transport) = resource_with(
            ResourceConfig {
                base_url: Some("https://api.example.com".to_string()),
                redirect: Some(RedirectMode::Manual),
                referrer_policy: Some(ReferrerPolicy::NoReferrer),
                nocache: true,
                ..Default::default()
            },
            RuntimeCapabilities::native(),
        );
        api.get("a").await.unwrap();
        let sent = transport.last();
        assert_eq!(sent.cache, CacheMode::NoCache);
        assert_eq!(sent.redirect, RedirectMode::Manual);
        assert_eq!(sent.referrer_policy, ReferrerPolicy::NoReferrer);

        let mut call = CallConfig::url("a");
        call.redirect = Some(RedirectMode::Error);
        call.cache = Some(CacheMode::Reload);
        api.get(call).await.unwrap();
        let sent = transport.last();
        assert_eq!(sent.redirect, RedirectMode::Error);
        assert_eq!(sent.cache, CacheMode::Reload);
    }

    #[tokio::test]
    async fn test_unique_adds_cache_busting_parameter() {
        let (api, transport) = resource("https://api.example.com");
        api.set_unique(true);
        api.get("a").await.unwrap();
        let first = transport.last().url;
        api.get("a").await.unwrap();
        let second = transport.last().url;
        assert!(first.starts_with("https://api.example.com/a?nocache"));
        assert_ne!(first, second);
        assert!(api.parameters().is_empty());
    }

    #[tokio::test]
    async fn test_user_agent_native_and_browser() {
        let (api, transport) = resource("https://api.example.com");
        api.set_user_agent(Some("my-agent/1.0"));
        api.get("a").await.unwrap();
        assert_eq!(transport.last().header("user-agent"), Some("my-agent/1.0"));

        api.set_unique_agent(true);
        api.get("a").await.unwrap();
        let agent = transport.last().header("user-agent").unwrap().to_string();
        assert!(agent.starts_with("my-agent/1.0 ID#"));

        let (browser, transport) = resource_with(
            ResourceConfig {
                base_url: Some("https://api.example.com".to_string()),
                user_agent: Some("my-agent/1.0".to_string()),
                ..Default::default()
            },
            RuntimeCapabilities::browser("https://app.example.com"),
        );
        let mut call = CallConfig::url("a");
        call.headers.insert("User-Agent".to_string(), "forced".to_string());
        browser.get(call).await.unwrap();
        assert_eq!(transport.last().header("user-agent"), None);
    }

    #[tokio::test]
    async fn test_credentials_and_call_overrides() {
        let (api, transport) = resource_with(
            ResourceConfig {
                base_url: Some("https://api.example.com".to_string()),
                username: Some("user".to_string()),
                password: Some("pass".to_string()),
                ..Default::default()
            },
            RuntimeCapabilities::native(),
        );
        api.get("a").await.unwrap();
        assert_eq!(transport.last().header("authorization"), Some("Basic dXNlcjpwYXNz"));

        let mut call = CallConfig::url("a");
        call.access_token = Some("tok".to_string());
        api.get(call).await.unwrap();
        assert_eq!(transport.last().header("authorization"), Some("Bearer tok"));

        // The call override does not leak into the resource
        api.get("a").await.unwrap();
        assert_eq!(transport.last().header("authorization"), Some("Basic dXNlcjpwYXNz"));
    }

    #[tokio::test]
    async fn test_call_authorization_header_beats_resource_token() {
        let (api, transport) = resource("https://api.example.com");
        api.set_access_token(Some("resource"), None, None);

        let mut call = CallConfig::url("a");
        call.headers
            .insert("Authorization".to_string(), "Custom call-level".to_string());
        api.get(call).await.unwrap();
        assert_eq!(transport.last().header("authorization"), Some("Custom call-level"));

        api.get("a").await.unwrap();
        assert_eq!(transport.last().header("authorization"), Some("Bearer resource"));
    }

    #[test]
    fn test_crypto_flag_without_key_is_configuration_error() {
        let (api, _) = resource("https://api.example.com");
        api.set_encrypt_all(true);
        let result = api.preflight("POST", CallConfig::url("a"));
        assert!(matches!(result, Err(HttpError::Configuration(_))));

        let mut call = CallConfig::url("a");
        call.encrypt = Some(false);
        assert!(api.preflight("POST", call).is_ok());
    }

    #[test]
    fn test_crypto_key_precedence() {
        let (api, _) = resource("https://api.example.com");
        api.set_keys(CryptoKeys {
            encryption: Some(CryptoKey::new("resource-enc")),
            signing: Some(CryptoKey::new("resource-sig")),
            ..Default::default()
        });
        api.set_encrypt_all(true);
        api.set_decrypt_all(true);

        let request = api.preflight("POST", CallConfig::url("a")).unwrap();
        assert_eq!(request.keys().encryption.as_ref().map(CryptoKey::as_str), Some("resource-enc"));
        // Decryption falls back to the shared encryption key
        assert_eq!(request.keys().decryption.as_ref().map(CryptoKey::as_str), Some("resource-enc"));
        // Signing is disabled, so the resource key is not used
        assert!(request.keys().signing.is_none());

        let mut call = CallConfig::url("a");
        call.encryption_key = Some(CryptoKey::new("call-enc"));
        call.sign = Some(true);
        let request = api.preflight("POST", call).unwrap();
        assert_eq!(request.keys().encryption.as_ref().map(CryptoKey::as_str), Some("call-enc"));
        assert_eq!(request.keys().signing.as_ref().map(CryptoKey::as_str), Some("resource-sig"));
    }

    #[tokio::test]
    async fn test_encrypt_all_end_to_end() {
        let (api, transport) = resource_with(
            ResourceConfig {
                base_url: Some("https://api.example.com".to_string()),
                encryption_key: Some(CryptoKey::new("k")),
                encrypt_all: true,
                ..Default::default()
            },
            RuntimeCapabilities::native().with_crypto(Arc::new(MirrorCrypto)),
        );
        let mut call = CallConfig::url("a");
        call.body = Some("secret".into());
        api.post(call).await.unwrap();
        let sent = transport.last();
        assert_eq!(sent.header("content-encoding"), Some("mirror-b64"));
        assert_ne!(sent.body.as_deref(), Some(&b"secret"[..]));
    }

    #[test]
    fn test_route_shares_state_clone_does_not() {
        let (api, _) = resource("https://api.example.com/api");
        let v1 = api.route("/v1");
        assert_eq!(v1.base_url().unwrap(), format!("{}/v1", api.base_url()));

        let copy = api.clone_with(ResourceConfig::default()).unwrap();
        api.set_username(Some("changed"));
        assert_eq!(v1.resource().username().as_deref(), Some("changed"));
        assert_eq!(copy.username(), None);
    }

    #[tokio::test]
    async fn test_clone_with_token_is_independent() {
        let (api, transport) = resource("https://api.example.com");
        let copy = api
            .clone_with(ResourceConfig {
                access_token: Some("x".to_string()),
                ..Default::default()
            })
            .unwrap();

        copy.get("a").await.unwrap();
        assert_eq!(transport.last().header("authorization"), Some("Bearer x"));
        api.get("a").await.unwrap();
        assert_eq!(transport.last().header("authorization"), None);
    }

    #[test]
    fn test_clone_relays_origin_events() {
        let (api, _) = resource("https://api.example.com");
        let copy = api.clone_with(ResourceConfig::default()).unwrap();
        let seen = collect(&copy, "origin.*");
        api.set_base_url("https://api2.example.com").unwrap();
        copy.set_base_url("https://api3.example.com").unwrap();
        assert_eq!(seen.lock().as_slice(), ["origin.update.baseurl"]);
    }

    #[test]
    fn test_dropped_clone_releases_origin_listener() {
        let (api, _) = resource("https://api.example.com");
        let baseline = api.events().listener_count();

        let copies: Vec<_> = (0..3)
            .map(|_| api.clone_with(ResourceConfig::default()).unwrap())
            .collect();
        assert_eq!(api.events().listener_count(), baseline + 3);

        drop(copies);
        assert_eq!(api.events().listener_count(), baseline);
        api.set_base_url("https://api2.example.com").unwrap();
    }

    #[test]
    fn test_past_expiration_expires_immediately() {
        let (api, _) = resource("https://api.example.com");
        let seen = collect(&api, "token.*");
        api.set_access_token(Some("abc"), None, Some(SystemTime::now() - Duration::from_secs(5)));
        assert_eq!(seen.lock().as_slice(), ["token.expired"]);
        assert_eq!(api.authorization(), None);
        assert!(!api.headers().has("authorization"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_future_expiration_schedules_timers() {
        let (api, _) = resource("https://api.example.com");
        api.set_token_renewal_notice(Duration::from_secs(3));
        let seen = collect(&api, "token.*");

        api.set_access_token(Some("abc"), None, Some(SystemTime::now() + Duration::from_secs(10)));
        assert_eq!(seen.lock().as_slice(), ["token.update"]);
        assert_eq!(api.authorization().as_deref(), Some("Bearer abc"));

        tokio::time::sleep(Duration::from_secs(8)).await;
        tokio::task::yield_now().await;
        assert_eq!(seen.lock().as_slice(), ["token.update", "token.expiration.pending"]);
        assert!(api.authorization().is_some());

        tokio::time::sleep(Duration::from_secs(3)).await;
        tokio::task::yield_now().await;
        assert_eq!(
            seen.lock().as_slice(),
            ["token.update", "token.expiration.pending", "token.expired"]
        );
        assert_eq!(api.authorization(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_new_token_cancels_previous_timers() {
        let (api, _) = resource("https://api.example.com");
        let seen = collect(&api, "token.expired");

        api.set_access_token(Some("a"), None, Some(SystemTime::now() + Duration::from_secs(5)));
        api.set_access_token(Some("b"), None, None);
        tokio::time::sleep(Duration::from_secs(10)).await;
        tokio::task::yield_now().await;
        assert!(seen.lock().is_empty());
        assert_eq!(api.authorization().as_deref(), Some("Bearer b"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_expiry_leaves_new_token() {
        let (api, _) = resource("https://api.example.com");
        let seen = collect(&api, "token.expired");

        api.set_access_token(Some("a"), None, Some(SystemTime::now() + Duration::from_secs(5)));
        let stale = api.shared.state.read().token_generation;
        api.set_access_token(Some("b"), None, None);

        // A timer that woke before it could be aborted
        api.shared.expire_scheduled(stale);
        assert!(seen.lock().is_empty());
        assert_eq!(api.authorization().as_deref(), Some("Bearer b"));

        let current = api.shared.state.read().token_generation;
        api.shared.expire_scheduled(current);
        assert_eq!(seen.lock().as_slice(), ["token.expired"]);
        assert_eq!(api.authorization(), None);
    }

    #[test]
    fn test_manual_expiry() {
        let (api, _) = resource("https://api.example.com");
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        api.events()
            .on("token.expired", move |e| sink.lock().push(e.payload["manually"].clone()));
        api.set_access_token(Some("abc"), None, None);
        api.expire_access_token();
        assert_eq!(seen.lock().as_slice(), [json!(true)]);
        assert_eq!(api.auth_type(), AuthType::None);
    }

    #[test]
    fn test_clear_headers_keeps_credentials() {
        let (api, _) = resource("https://api.example.com");
        api.set_header("X-A", "1");
        api.set_access_token(Some("abc"), None, None);
        api.clear_headers();
        let headers = api.headers();
        assert!(!headers.has("x-a"));
        assert_eq!(headers.get("authorization").map(String::as_str), Some("Bearer abc"));
    }

    #[tokio::test]
    async fn test_concurrent_calls_are_independent() {
        let (api, transport) = resource("https://api.example.com");
        api.set_header("X-Shared", "1");
        let calls = (0..5).map(|i| {
            let mut call = CallConfig::url(format!("item/{}", i));
            call.headers.insert("X-Call".to_string(), i.to_string());
            api.get(call)
        });
        let results = futures::future::join_all(calls).await;
        assert!(results.iter().all(|r| r.is_ok()));

        let requests = transport.requests.lock();
        assert_eq!(requests.len(), 5);
        for sent in requests.iter() {
            let index = sent.header("x-call").unwrap();
            assert_eq!(sent.url, format!("https://api.example.com/item/{}", index));
            assert_eq!(sent.header("x-shared"), Some("1"));
        }
        assert_eq!(api.headers().get("x-call"), None);
    }

    #[test]
    fn test_debug_does_not_leak_token() {
        let (api, _) = resource("https://api.example.com");
        api.set_access_token(Some("very-secret"), None, None);
        assert!(!format!("{:?}", api).contains("very-secret"));
    }
}
