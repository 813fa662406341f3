//! HTTP protocol vocabulary shared by the client.
//!
//! # Module Organization
//!
//! ```text
//! protocol/
//! ├── constants  - Default ports, method classes, header names
//! ├── modes      - Cache/CORS/redirect/credentials modes and referrer policy
//! ├── headers    - Body content-type inference and form encoding
//! └── integrity  - Subresource integrity verification
//! ```
//!
//! # Examples
//!
//! ```
//! use uniform_http::protocol::{default_port, is_idempotent_method, CacheMode};
//!
//! assert_eq!(default_port("https"), Some(443));
//! assert!(is_idempotent_method("GET"));
//! assert!("reload".parse::<CacheMode>().is_ok());
//! ```

pub mod constants;
pub mod headers;
pub mod integrity;
pub mod modes;

pub use constants::{
    default_port, is_idempotent_method, is_nobody_method, is_standard_method, DEFAULT_PORTS,
};
pub use headers::{
    data_url_mimetype, encode_form, form_fields, is_form_encoded, sniff_text_content_type,
};
pub use integrity::{integrity_for, verify_integrity, IntegrityAlgorithm};
pub use modes::{CacheMode, CorsMode, CredentialsMode, RedirectMode, ReferrerPolicy};
