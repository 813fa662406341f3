//! Utility functions for the HTTP client.
//!
//! This module provides helper functions for:
//! - Unique tokens for cache busting and user agents
//! - Status code classification
//! - `Referer` computation under a referrer policy
//! - Path joining for routes

use crate::protocol::ReferrerPolicy;
use std::time::{SystemTime, UNIX_EPOCH};
use url::Url;
use uuid::Uuid;

/// Time-plus-random token, unique per call.
///
/// Milliseconds since the epoch followed by a random UUID in simple form.
pub fn unique_token() -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default();
    format!("{}{}", millis, Uuid::new_v4().simple())
}

/// Name of a throwaway query parameter that makes a URL unique.
///
/// # Examples
///
/// ```
/// use uniform_http::client::cache_busting_parameter;
///
/// let a = cache_busting_parameter();
/// assert!(a.starts_with("nocache"));
/// assert_ne!(a, cache_busting_parameter());
/// ```
pub fn cache_busting_parameter() -> String {
    format!("nocache{}", unique_token())
}

/// Check if status code indicates success (2xx)
pub fn is_success_status(status: u16) -> bool {
    (200..300).contains(&status)
}

/// Check if status code is a redirect carrying a `Location`
pub fn is_redirect_status(status: u16) -> bool {
    matches!(status, 301 | 302 | 303 | 307 | 308)
}

/// Whether `uri` carries its own scheme and host, e.g. `https://x.com/a`.
pub fn is_absolute_url(uri: &str) -> bool {
    Url::parse(uri.trim()).is_ok_and(|u| u.has_host() || u.scheme() == "file")
}

/// Join a route path and a sub-path with a single `/`.
///
/// Absolute URLs are returned untouched.
pub fn join_route(path: &str, sub: &str) -> String {
    if is_absolute_url(sub) {
        return sub.to_string();
    }
    let path = path.trim_end_matches('/');
    let sub = sub.trim_start_matches('/');
    if sub.is_empty() {
        path.to_string()
    } else {
        format!("{}/{}", path, sub)
    }
}

/// `Referer` value for a request to `target` under `policy`.
///
/// Returns `None` when the policy withholds the referrer or the referrer is
/// not an `http`/`https` URL. The URL fragment and credentials are never
/// included.
pub fn referer_for(referrer: &str, policy: ReferrerPolicy, target: &str) -> Option<String> {
    let mut source = Url::parse(referrer.trim()).ok()?;
    if !matches!(source.scheme(), "http" | "https") {
        return None;
    }
    source.set_fragment(None);
    source.set_username("").ok()?;
    source.set_password(None).ok()?;
    let target = Url::parse(target).ok()?;

    let full = source.to_string();
    let origin = format!("{}/", source.origin().ascii_serialization());
    let same_origin = source.origin() == target.origin();
    let downgrade = source.scheme() == "https" && target.scheme() != "https";

    match policy {
        ReferrerPolicy::NoReferrer => None,
        ReferrerPolicy::UnsafeUrl => Some(full),
        ReferrerPolicy::Origin => Some(origin),
        ReferrerPolicy::SameOrigin => same_origin.then_some(full),
        ReferrerPolicy::StrictOrigin => (!downgrade).then_some(origin),
        ReferrerPolicy::OriginWhenCrossOrigin => Some(if same_origin { full } else { origin }),
        ReferrerPolicy::StrictOriginWhenCrossOrigin => {
            if same_origin {
                Some(full)
            } else {
                (!downgrade).then_some(origin)
            }
        }
        ReferrerPolicy::Empty | ReferrerPolicy::NoReferrerWhenDowngrade => {
            (!downgrade).then_some(full)
        }
    }
}
