//! HTTP client implementation.
//!
//! This module turns the URL, header and credential models into requests
//! that can be sent from any runtime:
//!
//! - **Compose requests** with validated fetch modes, credentials and bodies
//! - **Send them** through a pluggable [`Transport`]
//! - **Share defaults** across calls with a [`Resource`] and its [`Route`]s
//! - **Encrypt, sign, decrypt and verify** bodies through a [`Crypto`] capability
//! - **Expire access tokens** on a schedule
//!
//! # Module Organization
//!
//! ```text
//! client/
//! ├── request      - Request lifecycle engine
//! ├── transport    - Transport trait, descriptor and abort signal
//! ├── fetch        - reqwest-backed transport
//! ├── http_client  - Verb helpers and the preflight hook
//! ├── resource     - Shared defaults, preflight and token timers
//! ├── route        - Path-scoped views of a resource
//! ├── crypto       - Crypto capability and keys
//! ├── runtime      - Runtime capabilities
//! ├── callback     - Callback delivery
//! ├── config       - Request, call and resource configuration
//! └── utils        - Utility functions
//! ```
//!
//! # Key Types
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Request`] | One HTTP exchange, sent at most once |
//! | [`Client`] | Verb-oriented client over a transport |
//! | [`Resource`] | Long-lived defaults for one backend |
//! | [`Route`] | Path prefix over a resource |
//! | [`ReqwestTransport`] | Native transport |
//! | [`RequestConfig`] | Request configuration options |
//!
//! # Examples
//!
//! ## Configuring a Request
//!
//! ```
//! use uniform_http::client::{Request, RequestConfig, RuntimeCapabilities};
//! use uniform_http::protocol::RedirectMode;
//!
//! let config = RequestConfig {
//!     url: "https://api.example.com/items".into(),
//!     method: Some("put".into()),
//!     redirect: Some(RedirectMode::Manual),
//!     access_token: Some("abc".into()),
//!     ..Default::default()
//! };
//! let request = Request::with_config(config, RuntimeCapabilities::native()).unwrap();
//!
//! assert_eq!(request.method(), "PUT");
//! assert_eq!(request.header("authorization"), Some("Bearer abc"));
//! ```
//!
//! ## Utility Functions
//!
//! ```
//! use uniform_http::client::{is_success_status, join_route};
//!
//! assert!(is_success_status(204));
//! assert_eq!(join_route("/v1", "items"), "/v1/items");
//! ```

mod callback;
mod config;
mod crypto;
mod fetch;
mod http_client;
mod request;
mod resource;
mod route;
mod runtime;
mod transport;
mod utils;

pub use callback::deliver;
pub use config::{CallConfig, RequestConfig, ResourceConfig};
pub use crypto::{Crypto, CryptoKey, CryptoKeys};
pub use fetch::ReqwestTransport;
pub use http_client::{Client, Preflight};
pub use request::{Request, RequestState};
pub use resource::Resource;
pub use route::Route;
pub use runtime::RuntimeCapabilities;
pub use transport::{AbortSignal, Transport, TransportRequest};
pub use utils::*;
