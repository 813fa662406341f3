//! Enumerated request modes.
//!
//! Each mode parses case-insensitively through [`FromStr`]; unknown values are
//! rejected with [`HttpError::Validation`] listing the accepted values.
//!
//! | Type | Values |
//! |------|--------|
//! | [`CacheMode`] | `default`, `no-store`, `reload`, `no-cache`, `force-cache`, `only-if-cached` |
//! | [`CorsMode`] | `cors`, `no-cors`, `same-origin` |
//! | [`RedirectMode`] | `follow`, `error`, `manual` |
//! | [`CredentialsMode`] | `omit`, `same-origin`, `include` |
//! | [`ReferrerPolicy`] | the W3C referrer-policy tokens, including the empty policy |

use crate::error::{HttpError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

macro_rules! request_mode {
    (
        $(#[$meta:meta])*
        $name:ident, $label:literal {
            $( $(#[$vmeta:meta])* $variant:ident => $text:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub enum $name {
            $( $(#[$vmeta])* $variant ),+
        }

        impl $name {
            /// Every accepted value, in declaration order.
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// Wire representation
            pub fn as_str(&self) -> &'static str {
                match self {
                    $( $name::$variant => $text ),+
                }
            }

            fn expected() -> String {
                Self::ALL
                    .iter()
                    .map(|m| format!("\"{}\"", m.as_str()))
                    .collect::<Vec<_>>()
                    .join(", ")
            }
        }

        impl FromStr for $name {
            type Err = HttpError;

            fn from_str(value: &str) -> Result<Self> {
                let normalized = value.trim().to_lowercase();
                match normalized.as_str() {
                    $( $text => Ok($name::$variant), )+
                    _ => Err(HttpError::invalid(format!(
                        "\"{}\" is an invalid {}. Must be one of: {}",
                        value,
                        $label,
                        Self::expected()
                    ))),
                }
            }
        }

        impl TryFrom<String> for $name {
            type Error = HttpError;

            fn try_from(value: String) -> Result<Self> {
                value.parse()
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> String {
                value.as_str().to_string()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

request_mode! {
    /// Cache mode of a request.
    ///
    /// `only-if-cached` forces the CORS mode to `same-origin`.
    CacheMode, "cache mode" {
        /// Use the cache normally
        Default => "default",
        /// Bypass the cache entirely
        NoStore => "no-store",
        /// Fetch from the network and refresh the cache
        Reload => "reload",
        /// Revalidate before using a cached response
        NoCache => "no-cache",
        /// Prefer any cached response
        ForceCache => "force-cache",
        /// Only answer from cache
        OnlyIfCached => "only-if-cached",
    }
}

request_mode! {
    /// CORS mode of a request.
    CorsMode, "CORS mode" {
        /// Cross-origin allowed under CORS rules
        Cors => "cors",
        /// Opaque cross-origin request
        NoCors => "no-cors",
        /// Same-origin only
        SameOrigin => "same-origin",
    }
}

request_mode! {
    /// How redirects are handled.
    RedirectMode, "redirect mode" {
        /// Follow redirects
        Follow => "follow",
        /// Fail on a redirect
        Error => "error",
        /// Hand the redirect response back to the caller
        Manual => "manual",
    }
}

request_mode! {
    /// Whether the transport sends ambient credentials (cookies, TLS certs).
    CredentialsMode, "credentials mode" {
        /// Never send
        Omit => "omit",
        /// Send for same-origin requests
        SameOrigin => "same-origin",
        /// Always send
        Include => "include",
    }
}

request_mode! {
    /// W3C referrer policy.
    ReferrerPolicy, "referrer policy" {
        /// Empty policy, defers to the transport's default
        Empty => "",
        /// `no-referrer`
        NoReferrer => "no-referrer",
        /// `no-referrer-when-downgrade`
        NoReferrerWhenDowngrade => "no-referrer-when-downgrade",
        /// `same-origin`
        SameOrigin => "same-origin",
        /// `origin`
        Origin => "origin",
        /// `strict-origin`
        StrictOrigin => "strict-origin",
        /// `origin-when-cross-origin`
        OriginWhenCrossOrigin => "origin-when-cross-origin",
        /// `strict-origin-when-cross-origin`
        StrictOriginWhenCrossOrigin => "strict-origin-when-cross-origin",
        /// `unsafe-url`
        UnsafeUrl => "unsafe-url",
    }
}

impl Default for CacheMode {
    fn default() -> Self {
        CacheMode::Default
    }
}

impl Default for RedirectMode {
    fn default() -> Self {
        RedirectMode::Follow
    }
}

impl Default for ReferrerPolicy {
    fn default() -> Self {
        ReferrerPolicy::NoReferrerWhenDowngrade
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_case_insensitive() {
        assert_eq!("No-Cache".parse::<CacheMode>().unwrap(), CacheMode::NoCache);
        assert_eq!(" manual ".parse::<RedirectMode>().unwrap(), RedirectMode::Manual);
        assert_eq!("".parse::<ReferrerPolicy>().unwrap(), ReferrerPolicy::Empty);
    }

    #[test]
    fn test_rejects_unknown_values() {
        let err = "sometimes".parse::<RedirectMode>().unwrap_err();
        assert!(err.is_validation());
        assert!(err.to_string().contains("\"follow\""));
        assert!("anywhere".parse::<CorsMode>().is_err());
        assert!("always".parse::<CredentialsMode>().is_err());
        assert!("whenever".parse::<ReferrerPolicy>().is_err());
    }

    #[test]
    fn test_serde_uses_wire_names() {
        let mode: CacheMode = serde_json::from_str("\"only-if-cached\"").unwrap();
        assert_eq!(mode, CacheMode::OnlyIfCached);
        assert_eq!(
            serde_json::to_string(&CorsMode::NoCors).unwrap(),
            "\"no-cors\""
        );
        assert!(serde_json::from_str::<CacheMode>("\"bogus\"").is_err());
    }
}
