//! Credentials for `Authorization` and `Proxy-Authorization`.
//!
//! A [`Credential`] holds either a username/password pair (basic auth) or an
//! access token. Setting a token clears the username and password. The
//! password and token are write-only from outside the crate.
//!
//! | State | [`Credential::header`] |
//! |-------|------------------------|
//! | token set | `<type> <token>` |
//! | username and password set | `Basic base64(user:pass)` |
//! | otherwise | `None` |
//!
//! Every effective change emits `update.<field>` followed by `update.header`
//! carrying the new header value.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::{json, Value};
use std::fmt;

use crate::events::EventEmitter;

/// Token type used when none is configured.
pub const DEFAULT_TOKEN_TYPE: &str = "Bearer";

/// Kind of credential in effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthType {
    /// Nothing usable is configured
    None,
    /// Username and password
    Basic,
    /// Access token
    Token,
}

impl AuthType {
    /// Lowercase name
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthType::None => "none",
            AuthType::Basic => "basic",
            AuthType::Token => "token",
        }
    }
}

/// Authentication state of a request or resource.
pub struct Credential {
    username: Option<String>,
    password: Option<String>,
    access_token: Option<String>,
    access_token_type: String,
    events: EventEmitter,
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value.map(str::trim).filter(|v| !v.is_empty()).map(str::to_string)
}

impl Credential {
    /// Empty credential
    pub fn new() -> Self {
        Credential {
            username: None,
            password: None,
            access_token: None,
            access_token_type: DEFAULT_TOKEN_TYPE.to_string(),
            events: EventEmitter::new(),
        }
    }

    /// Basic-auth credential
    pub fn basic(username: &str, password: &str) -> Self {
        let mut credential = Self::new();
        credential.username = non_blank(Some(username));
        credential.password = non_blank(Some(password));
        credential
    }

    /// Token credential; `token_type` defaults to `Bearer`.
    pub fn token(token: &str, token_type: Option<&str>) -> Self {
        let mut credential = Self::new();
        credential.access_token = non_blank(Some(token));
        if let Some(kind) = non_blank(token_type) {
            credential.access_token_type = kind;
        }
        credential
    }

    /// Observer list
    pub fn events(&self) -> &EventEmitter {
        &self.events
    }

    /// Header value, or `None` when no credential is configured.
    pub fn header(&self) -> Option<String> {
        match self.auth_type() {
            AuthType::Token => Some(format!(
                "{} {}",
                self.access_token_type,
                self.access_token.as_deref().unwrap_or_default()
            )),
            AuthType::Basic => Some(basic_auth_token(
                self.username.as_deref().unwrap_or_default(),
                self.password.as_deref().unwrap_or_default(),
            )),
            AuthType::None => None,
        }
    }

    /// Which credential is in effect
    pub fn auth_type(&self) -> AuthType {
        if self.access_token.is_some() {
            AuthType::Token
        } else if self.username.is_some() && self.password.is_some() {
            AuthType::Basic
        } else {
            AuthType::None
        }
    }

    /// Username used for basic auth
    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    /// Whether a password is set. The password itself cannot be read back.
    pub fn has_password(&self) -> bool {
        self.password.is_some()
    }

    pub(crate) fn password(&self) -> Option<&str> {
        self.password.as_deref()
    }

    pub(crate) fn access_token(&self) -> Option<&str> {
        self.access_token.as_deref()
    }

    /// Whether an access token is set
    pub fn has_access_token(&self) -> bool {
        self.access_token.is_some()
    }

    /// Token type, `Bearer` by default
    pub fn access_token_type(&self) -> &str {
        &self.access_token_type
    }

    /// Set or clear the username. Returns whether it changed.
    pub fn set_username(&mut self, value: Option<&str>) -> bool {
        let value = non_blank(value);
        if value == self.username {
            return false;
        }
        let old = std::mem::replace(&mut self.username, value);
        self.events.emit(
            "update.username",
            json!({ "old": old, "new": self.username }),
        );
        self.emit_header();
        true
    }

    /// Set or clear the password. Returns whether it changed.
    pub fn set_password(&mut self, value: Option<&str>) -> bool {
        let value = non_blank(value);
        if value == self.password {
            return false;
        }
        self.password = value;
        self.events.emit("update.password", Value::Null);
        self.emit_header();
        true
    }

    /// Set or clear the access token. Returns whether it changed.
    ///
    /// A token clears the username and password.
    pub fn set_access_token(&mut self, value: Option<&str>) -> bool {
        let value = non_blank(value);
        let mut changed = false;
        if value.is_some() {
            changed |= self.set_username(None);
            changed |= self.set_password(None);
        }
        if value != self.access_token {
            self.access_token = value;
            self.events.emit("update.accessToken", Value::Null);
            self.emit_header();
            changed = true;
        }
        changed
    }

    /// Set the token type. Blank resets it to `Bearer`.
    pub fn set_access_token_type(&mut self, value: Option<&str>) -> bool {
        let value = non_blank(value).unwrap_or_else(|| DEFAULT_TOKEN_TYPE.to_string());
        if value == self.access_token_type {
            return false;
        }
        let old = std::mem::replace(&mut self.access_token_type, value);
        self.events.emit(
            "update.accessTokenType",
            json!({ "old": old, "new": self.access_token_type }),
        );
        self.emit_header();
        true
    }

    /// Remove every credential.
    pub fn clear(&mut self) -> bool {
        let mut changed = self.set_access_token(None);
        changed |= self.set_username(None);
        changed |= self.set_password(None);
        changed
    }

    fn emit_header(&self) {
        self.events.emit("update.header", json!(self.header()));
    }
}

/// `Basic base64(user:secret)`
pub fn basic_auth_token(user: &str, secret: &str) -> String {
    format!("Basic {}", STANDARD.encode(format!("{}:{}", user, secret)))
}

impl Default for Credential {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for Credential {
    /// Independent copy with the same effective credentials and no listeners.
    fn clone(&self) -> Self {
        Credential {
            username: self.username.clone(),
            password: self.password.clone(),
            access_token: self.access_token.clone(),
            access_token_type: self.access_token_type.clone(),
            events: EventEmitter::new(),
        }
    }
}

impl PartialEq for Credential {
    fn eq(&self, other: &Self) -> bool {
        self.username == other.username
            && self.password == other.password
            && self.access_token == other.access_token
            && self.access_token_type == other.access_token_type
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("access_token", &self.access_token.as_ref().map(|_| "<redacted>"))
            .field("access_token_type", &self.access_token_type)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_basic_header() {
        let credential = Credential::basic("user", "pass");
        assert_eq!(credential.auth_type(), AuthType::Basic);
        assert_eq!(credential.header().as_deref(), Some("Basic dXNlcjpwYXNz"));
    }

    #[test]
    fn test_incomplete_basic_is_none() {
        let mut credential = Credential::new();
        credential.set_username(Some("user"));
        assert_eq!(credential.auth_type(), AuthType::None);
        assert_eq!(credential.header(), None);
    }

    #[test]
    fn test_token_clears_basic() {
        let mut credential = Credential::basic("user", "pass");
        credential.set_access_token(Some("abc"));
        assert_eq!(credential.username(), None);
        assert!(!credential.has_password());
        assert_eq!(credential.header().as_deref(), Some("Bearer abc"));

        credential.set_access_token_type(Some("Token"));
        assert_eq!(credential.header().as_deref(), Some("Token abc"));
        credential.set_access_token_type(None);
        assert_eq!(credential.access_token_type(), "Bearer");
    }

    #[test]
    fn test_header_events() {
        let mut credential = Credential::new();
        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        credential
            .events()
            .on("*", move |e| sink.lock().push((e.name.clone(), e.payload.clone())));

        credential.set_username(Some("user"));
        credential.set_username(Some("user"));
        credential.set_password(Some("pass"));

        let events = seen.lock();
        let names: Vec<&str> = events.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(
            names,
            ["update.username", "update.header", "update.password", "update.header"]
        );
        assert_eq!(events[3].1, json!("Basic dXNlcjpwYXNz"));
    }

    #[test]
    fn test_clone_is_independent() {
        let original = Credential::basic("user", "pass");
        let mut copy = original.clone();
        assert_eq!(copy, original);
        copy.set_username(Some("other"));
        assert_eq!(original.username(), Some("user"));
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let credential = Credential::token("secret-token", None);
        assert!(!format!("{:?}", credential).contains("secret-token"));
    }
}
