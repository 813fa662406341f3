//! Value types shared across the crate.
//!
//! - [`QueryValue`]: typed query parameter value
//! - [`Body`]: request body before content-type inference
//! - [`Response`]: normalized transport response

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// A query parameter value.
///
/// Values parsed from a query string are coerced: `true`/`false` become
/// [`QueryValue::Bool`] and numeric strings become [`QueryValue::Number`].
/// Programmatic writes are stored as given.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QueryValue {
    /// Plain string
    Text(String),
    /// Numeric value
    Number(f64),
    /// Boolean flag
    Bool(bool),
    /// Absent-marker for bare keys in `null` query mode
    Null,
}

impl QueryValue {
    /// Coerce a raw query string value.
    pub fn coerce(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.eq_ignore_ascii_case("true") {
            return QueryValue::Bool(true);
        }
        if trimmed.eq_ignore_ascii_case("false") {
            return QueryValue::Bool(false);
        }
        if !trimmed.is_empty() {
            if let Ok(n) = trimmed.parse::<f64>() {
                if n.is_finite() {
                    return QueryValue::Number(n);
                }
            }
        }
        QueryValue::Text(raw.to_string())
    }

    /// The string value, if this is text
    pub fn as_str(&self) -> Option<&str> {
        match self {
            QueryValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// The boolean value, if this is a flag
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            QueryValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// The numeric value, if this is a number
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            QueryValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Whether this value serializes to nothing after the key.
    pub(crate) fn is_blank(&self) -> bool {
        match self {
            QueryValue::Text(s) => s.trim().is_empty(),
            QueryValue::Null => true,
            _ => false,
        }
    }
}

impl fmt::Display for QueryValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryValue::Text(s) => f.write_str(s),
            QueryValue::Number(n) => {
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    write!(f, "{}", *n as i64)
                } else {
                    write!(f, "{}", n)
                }
            }
            QueryValue::Bool(b) => write!(f, "{}", b),
            QueryValue::Null => Ok(()),
        }
    }
}

impl From<&str> for QueryValue {
    fn from(value: &str) -> Self {
        QueryValue::Text(value.to_string())
    }
}

impl From<String> for QueryValue {
    fn from(value: String) -> Self {
        QueryValue::Text(value)
    }
}

impl From<bool> for QueryValue {
    fn from(value: bool) -> Self {
        QueryValue::Bool(value)
    }
}

impl From<i32> for QueryValue {
    fn from(value: i32) -> Self {
        QueryValue::Number(value as f64)
    }
}

impl From<i64> for QueryValue {
    fn from(value: i64) -> Self {
        QueryValue::Number(value as f64)
    }
}

impl From<u64> for QueryValue {
    fn from(value: u64) -> Self {
        QueryValue::Number(value as f64)
    }
}

impl From<f64> for QueryValue {
    fn from(value: f64) -> Self {
        QueryValue::Number(value)
    }
}

/// A request body.
///
/// Structured bodies are converted to text when the request infers the
/// content type, see [`Request::set_body`](crate::Request::set_body).
#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    /// Text body, content type sniffed from its shape
    Text(String),
    /// Structured body; `{"form": {..}}` is URL-encoded, anything else is JSON
    Json(Value),
    /// Raw binary body
    Bytes(Bytes),
}

impl Body {
    /// Serialize a value into a structured body.
    pub fn json<T: Serialize>(value: &T) -> crate::Result<Self> {
        Ok(Body::Json(serde_json::to_value(value)?))
    }

    /// A body that will be sent as `application/x-www-form-urlencoded`.
    pub fn form<T: Serialize>(fields: &T) -> crate::Result<Self> {
        Ok(Body::Json(serde_json::json!({ "form": fields })))
    }

    /// Bytes that would be transmitted for this body.
    pub fn to_bytes(&self) -> Bytes {
        match self {
            Body::Text(s) => Bytes::from(s.clone()),
            Body::Bytes(b) => b.clone(),
            Body::Json(v) => Bytes::from(v.to_string()),
        }
    }

    /// The text, if this is a text body
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Body::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&str> for Body {
    fn from(value: &str) -> Self {
        Body::Text(value.to_string())
    }
}

impl From<String> for Body {
    fn from(value: String) -> Self {
        Body::Text(value)
    }
}

impl From<Value> for Body {
    fn from(value: Value) -> Self {
        Body::Json(value)
    }
}

impl From<Vec<u8>> for Body {
    fn from(value: Vec<u8>) -> Self {
        Body::Bytes(Bytes::from(value))
    }
}

impl From<Bytes> for Body {
    fn from(value: Bytes) -> Self {
        Body::Bytes(value)
    }
}

impl<'de> Deserialize<'de> for Body {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match Value::deserialize(deserializer)? {
            Value::String(s) => Body::Text(s),
            other => Body::Json(other),
        })
    }
}

/// Normalized response returned by a [`Transport`](crate::client::Transport).
///
/// Header names are lowercase.
#[derive(Debug, Clone, Default)]
pub struct Response {
    /// HTTP status code
    pub status: u16,
    /// Reason phrase
    pub status_text: String,
    /// Response headers
    pub headers: BTreeMap<String, String>,
    /// Status is 2xx
    pub ok: bool,
    /// The response came from a followed redirect
    pub redirected: bool,
    /// Final URL of the response
    pub url: String,
    /// Response body (decrypted when a decryption key applied)
    pub body: Bytes,
}

impl Response {
    /// Header value by case-insensitive name
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_lowercase()).map(String::as_str)
    }

    /// Whether a non-empty body was received
    pub fn has_body(&self) -> bool {
        !self.body.is_empty()
    }

    /// Body decoded as UTF-8 (lossy)
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Body parsed as JSON; `Value::Null` when it does not parse.
    ///
    /// Parsing is done on every call, so it always reflects the current body.
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).unwrap_or(Value::Null)
    }

    /// Body deserialized into `T`, or `None` when it does not parse.
    pub fn json_as<T: DeserializeOwned>(&self) -> Option<T> {
        serde_json::from_slice(&self.body).ok()
    }
}
