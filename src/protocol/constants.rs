//! Protocol constants: default ports, method classes and header names.

/// Protocol to default port table every [`Address`](crate::Address) starts from.
pub const DEFAULT_PORTS: &[(&str, u16)] = &[
    ("http", 80),
    ("https", 443),
    ("ssh", 22),
    ("ldap", 389),
    ("sldap", 689),
    ("ftp", 20),
    ("ftps", 989),
    ("sftp", 21),
];

/// Port used for protocols missing from the table (except `file`).
pub const FALLBACK_PORT: u16 = 80;

/// Standard RFC 7231 methods. Anything else is accepted with a warning.
pub const HTTP_METHODS: &[&str] = &[
    "OPTIONS", "HEAD", "GET", "POST", "PUT", "DELETE", "TRACE", "CONNECT", "PATCH",
];

/// Safe methods whose bodies are dropped when method safety is enforced.
pub const IDEMPOTENT_METHODS: &[&str] = &["OPTIONS", "HEAD", "GET"];

/// Methods for which the transport descriptor never carries a body.
pub const NOBODY_METHODS: &[&str] = &["HEAD", "GET"];

/// Hostname used when no origin is configured.
pub const DEFAULT_HOSTNAME: &str = "localhost";

/// Hostnames recognized as the local machine.
pub const LOCAL_INTERFACES: &[&str] = &["127.0.0.1", "localhost", "::1", "[::1]"];

/// Default request timeout.
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// Redirect hops followed before the transport gives up.
pub const MAX_REDIRECTS: usize = 10;

/// `Accept` value sent by [`Client::json`](crate::Client::json).
pub const JSON_ACCEPT: &str =
    "application/json, application/ld+json, application/vnd.api+json, */json, */*json;q=0.8";

/// Header names used by the request engine.
pub mod headers {
    /// `Authorization`
    pub const AUTHORIZATION: &str = "Authorization";
    /// `Proxy-Authorization`
    pub const PROXY_AUTHORIZATION: &str = "Proxy-Authorization";
    /// `Content-Type`
    pub const CONTENT_TYPE: &str = "Content-Type";
    /// `Content-Length`
    pub const CONTENT_LENGTH: &str = "Content-Length";
    /// `Content-Encoding`
    pub const CONTENT_ENCODING: &str = "Content-Encoding";
    /// `Content-Transfer-Encoding`
    pub const CONTENT_TRANSFER_ENCODING: &str = "Content-Transfer-Encoding";
    /// `Signature`, carries the body signature in both directions
    pub const SIGNATURE: &str = "Signature";
    /// `User-Agent`
    pub const USER_AGENT: &str = "User-Agent";
    /// `Accept`
    pub const ACCEPT: &str = "Accept";
    /// `Referer`
    pub const REFERER: &str = "Referer";
    /// `Location`
    pub const LOCATION: &str = "Location";
}

/// Default port of `protocol` in the built-in table.
pub fn default_port(protocol: &str) -> Option<u16> {
    let protocol = protocol.trim().to_lowercase();
    DEFAULT_PORTS
        .iter()
        .find(|(p, _)| *p == protocol)
        .map(|(_, port)| *port)
}

/// Whether `method` (uppercase) is a standard method
pub fn is_standard_method(method: &str) -> bool {
    HTTP_METHODS.contains(&method)
}

/// Whether `method` (uppercase) is safe/idempotent
pub fn is_idempotent_method(method: &str) -> bool {
    IDEMPOTENT_METHODS.contains(&method)
}

/// Whether `method` (uppercase) never carries a body on the wire
pub fn is_nobody_method(method: &str) -> bool {
    NOBODY_METHODS.contains(&method)
}
