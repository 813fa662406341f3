#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

//! # Uniform HTTP: one request model for every runtime
//!
//! This crate describes HTTP requests once and sends them through whichever
//! transport the host runtime offers. The same URL model, header store,
//! credential model and request lifecycle apply whether requests end up on
//! `reqwest`, a browser fetch binding or a test double.
//!
//! ## Overview
//!
//! The crate is layered:
//!
//! 1. **Models** - [`Address`] (URL), [`HeaderStore`] / [`MapStore`] (headers
//!    and query parameters) and [`Credential`] (basic auth or access token)
//! 2. **Request engine** - [`Request`] validates fetch modes, infers the body
//!    content type, runs optional crypto and hands a descriptor to a
//!    [`Transport`](client::Transport)
//! 3. **Client surface** - [`Client`] verbs, [`Resource`] defaults with
//!    preflight and token expiry, and path-scoped [`Route`]s
//!
//! Every mutable model owns an [`EventEmitter`] and reports changes as named
//! events, e.g. `update.port` or `header.create`.
//!
//! ## Key Features
//!
//! - **URL model** with per-instance default ports, typed query values and
//!   template formatting
//! - **Validated fetch modes**: cache, CORS, credentials, redirect and
//!   referrer policy, with safe fallbacks and warnings
//! - **Body inference**: JSON, form, text sniffing and `Content-Length`
//! - **Optional body crypto**: encrypt, sign, verify and decrypt through a
//!   pluggable capability
//! - **Subresource integrity** checks on the native transport
//! - **Access-token expiry** with renewal notices
//!
//! ## Client Usage
//!
//! ```ignore
//! use uniform_http::{CallConfig, Resource, ResourceConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let api = Resource::new(ResourceConfig {
//!         base_url: Some("https://api.example.com/v1".into()),
//!         access_token: Some("secret".into()),
//!         nocache: true,
//!         ..Default::default()
//!     })?;
//!
//!     let users = api.route("users");
//!     let list = users.json("").await?;
//!     let created = users
//!         .post(CallConfig {
//!             body: Some(serde_json::json!({ "name": "ada" }).into()),
//!             ..Default::default()
//!         })
//!         .await?;
//!
//!     println!("{} users, created with {}", list.as_array().map_or(0, Vec::len), created.status);
//!     Ok(())
//! }
//! ```
//!
//! ## Module Structure
//!
//! - **[address]** - URL model
//! - **[store]** - Header and query parameter stores
//! - **[credential]** - Credential model
//! - **[events]** - Change notifications
//! - **[types]** - Bodies, query values and responses
//! - **[error]** - Error types and result handling
//! - **[client]** - Request engine, transports, client, resources and routes
//! - **[protocol]** - Constants, fetch modes, content-type helpers and SRI

pub mod address;
pub mod client;
pub mod credential;
pub mod error;
pub mod events;
pub mod protocol;
pub mod store;
pub mod types;

pub use address::{Address, FormatOptions, PortValue, QueryMode};
pub use client::{CallConfig, Client, Request, RequestConfig, Resource, ResourceConfig, Route};
pub use credential::{AuthType, Credential};
pub use error::{HttpError, Result};
pub use events::{Event, EventEmitter};
pub use store::{HeaderStore, KeyCase, MapStore};
pub use types::{Body, QueryValue, Response};
