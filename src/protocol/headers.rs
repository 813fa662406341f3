//! Body content-type inference and header value helpers.
//!
//! The request engine infers `Content-Type` from the shape of the body:
//!
//! | Body | Content-Type |
//! |------|--------------|
//! | `{"form": {..}}` | `application/x-www-form-urlencoded` (URL-encoded) |
//! | other object or array | `application/json` unless already set |
//! | `key=value&..` text | `application/x-www-form-urlencoded` |
//! | `data:<mime>;..` text | `<mime>` |
//! | `<?xml ..` text | `application/xml` |
//! | `<html ..` text | `text/html` |
//! | any other text | `text/plain` |
//! | binary | `application/octet-stream` unless already set |
//!
//! # Examples
//!
//! ```
//! use uniform_http::protocol::{sniff_text_content_type, encode_form};
//! use serde_json::json;
//!
//! assert_eq!(sniff_text_content_type("a=1&b=2"), "application/x-www-form-urlencoded");
//! assert_eq!(sniff_text_content_type("<?xml version=\"1.0\"?>"), "application/xml");
//!
//! let form = json!({ "name": "Jo Doe" });
//! assert_eq!(encode_form(form.as_object().unwrap()), "name=Jo+Doe");
//! ```

use regex::Regex;
use serde_json::{Map, Value};
use std::sync::OnceLock;

/// `application/json`
pub const JSON: &str = "application/json";
/// `application/x-www-form-urlencoded`
pub const FORM: &str = "application/x-www-form-urlencoded";
/// `application/xml`
pub const XML: &str = "application/xml";
/// `text/html`
pub const HTML: &str = "text/html";
/// `text/plain`
pub const TEXT: &str = "text/plain";
/// `application/octet-stream`
pub const OCTET_STREAM: &str = "application/octet-stream";
/// Content type of an encrypted body
pub const ENCRYPTED: &str = "application/octet-stream; charset=UTF-8";

fn form_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"([^=]+)=([^&]+)").ok())
        .as_ref()
}

fn data_url_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"(?i)^data:(.*?);").ok())
        .as_ref()
}

fn starts_with_ignore_case(text: &str, prefix: &str) -> bool {
    text.len() >= prefix.len()
        && text.is_char_boundary(prefix.len())
        && text[..prefix.len()].eq_ignore_ascii_case(prefix)
}

/// Whether a text body looks like `key=value` pairs.
///
/// Data URLs and markup are never form data even when they contain `=`.
pub fn is_form_encoded(text: &str) -> bool {
    let trimmed = text.trim();
    form_pattern().is_some_and(|re| re.is_match(text))
        && !starts_with_ignore_case(trimmed, "data:")
        && !trimmed.starts_with('<')
}

/// Mimetype declared by a data URL (`data:<mime>;...`).
pub fn data_url_mimetype(text: &str) -> Option<String> {
    data_url_pattern()?
        .captures(text.trim())
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .filter(|m| !m.is_empty())
}

/// Infer the content type of a text body.
pub fn sniff_text_content_type(text: &str) -> String {
    if is_form_encoded(text) {
        return FORM.to_string();
    }

    let trimmed = text.trim();
    if starts_with_ignore_case(trimmed, "data:") {
        return data_url_mimetype(trimmed).unwrap_or_else(|| TEXT.to_string());
    }
    if starts_with_ignore_case(trimmed, "<?xml") {
        return XML.to_string();
    }
    if starts_with_ignore_case(trimmed, "<html") {
        return HTML.to_string();
    }
    TEXT.to_string()
}

/// The `form` object of a `{"form": {..}}` body.
///
/// Only matches when `form` is the sole key.
pub fn form_fields(value: &Value) -> Option<&Map<String, Value>> {
    let object = value.as_object()?;
    if object.len() != 1 {
        return None;
    }
    object.get("form")?.as_object()
}

/// URL-encode form fields as `k=v&k2=v2`.
///
/// Strings are encoded as-is, nested objects and arrays as JSON text.
pub fn encode_form(fields: &Map<String, Value>) -> String {
    fields
        .iter()
        .map(|(key, value)| {
            let text = match value {
                Value::String(s) => s.clone(),
                Value::Null => String::new(),
                other => other.to_string(),
            };
            format!("{}={}", encode_component(key), encode_component(&text))
        })
        .collect::<Vec<_>>()
        .join("&")
}

fn encode_component(text: &str) -> String {
    url::form_urlencoded::byte_serialize(text.as_bytes()).collect()
}

/// Join two header values with `", "`.
#[inline]
pub fn join_values(existing: &str, value: &str) -> String {
    if existing.is_empty() {
        value.to_string()
    } else {
        format!("{}, {}", existing, value)
    }
}
