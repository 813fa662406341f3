//! Host runtime capabilities.
//!
//! Behavior that depends on where the client runs is driven by an explicit
//! [`RuntimeCapabilities`] value instead of ambient detection.
//!
//! | Flag | Effect |
//! |------|--------|
//! | `browser` | custom `User-Agent` is refused; default cache mode is `default` instead of `no-store` |
//! | `origin` | base for relative URLs and blank URLs |
//! | `crypto` | enables body encryption, decryption, signing and verification |

use crate::client::crypto::Crypto;
use crate::protocol::constants::DEFAULT_HOSTNAME;
use crate::protocol::CacheMode;
use std::fmt;
use std::sync::Arc;

/// Capabilities of the host runtime.
#[derive(Clone)]
pub struct RuntimeCapabilities {
    /// Browser-like runtime with a DOM and a policy-restricted header set
    pub browser: bool,
    /// Origin relative URLs resolve against, e.g. `http://localhost`
    pub origin: String,
    /// Crypto capability, if installed
    pub crypto: Option<Arc<dyn Crypto>>,
}

impl RuntimeCapabilities {
    /// Native (non-browser) runtime with a `http://localhost` origin.
    pub fn native() -> Self {
        RuntimeCapabilities {
            browser: false,
            origin: format!("http://{}", DEFAULT_HOSTNAME),
            crypto: None,
        }
    }

    /// Browser-like runtime serving `origin`.
    pub fn browser(origin: impl Into<String>) -> Self {
        RuntimeCapabilities {
            browser: true,
            origin: origin.into(),
            crypto: None,
        }
    }

    /// Install a crypto capability.
    pub fn with_crypto(mut self, crypto: Arc<dyn Crypto>) -> Self {
        self.crypto = Some(crypto);
        self
    }

    /// Replace the origin.
    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = origin.into();
        self
    }

    /// Whether a crypto capability is available
    pub fn supports_crypto(&self) -> bool {
        self.crypto.is_some()
    }

    /// Cache mode of requests that do not configure one.
    ///
    /// Native runtimes have no HTTP cache, so they default to `no-store`.
    pub fn default_cache_mode(&self) -> CacheMode {
        if self.browser {
            CacheMode::Default
        } else {
            CacheMode::NoStore
        }
    }
}

impl Default for RuntimeCapabilities {
    fn default() -> Self {
        Self::native()
    }
}

impl fmt::Debug for RuntimeCapabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuntimeCapabilities")
            .field("browser", &self.browser)
            .field("origin", &self.origin)
            .field("crypto", &self.crypto.is_some())
            .finish()
    }
}
