//! Transport strategy.
//!
//! The request engine never touches the network itself. It builds a
//! [`TransportRequest`] descriptor and hands it to a [`Transport`] chosen by
//! the host application. [`ReqwestTransport`](crate::client::ReqwestTransport)
//! is the native implementation; tests substitute their own.

use crate::error::Result;
use crate::protocol::{CacheMode, CorsMode, CredentialsMode, RedirectMode, ReferrerPolicy};
use crate::types::Response;
use async_trait::async_trait;
use bytes::Bytes;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

/// Cooperative cancellation shared between a request and its caller.
///
/// Aborting does not guarantee the underlying I/O stops immediately; the
/// engine stops waiting and reports [`HttpError::Aborted`](crate::HttpError::Aborted).
#[derive(Clone, Default)]
pub struct AbortSignal {
    inner: Arc<AbortInner>,
}

#[derive(Default)]
struct AbortInner {
    aborted: AtomicBool,
    notify: Notify,
}

impl AbortSignal {
    /// A signal that has not fired
    pub fn new() -> Self {
        Self::default()
    }

    /// Fire the signal. Returns `false` if it had already fired.
    pub fn abort(&self) -> bool {
        let first = !self.inner.aborted.swap(true, Ordering::SeqCst);
        if first {
            self.inner.notify.notify_waiters();
        }
        first
    }

    /// Whether the signal has fired
    pub fn is_aborted(&self) -> bool {
        self.inner.aborted.load(Ordering::SeqCst)
    }

    /// Resolves once the signal fires.
    pub async fn aborted(&self) {
        loop {
            let notified = self.inner.notify.notified();
            if self.is_aborted() {
                return;
            }
            notified.await;
        }
    }
}

impl fmt::Debug for AbortSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AbortSignal")
            .field("aborted", &self.is_aborted())
            .finish()
    }
}

/// Transport-ready request descriptor.
#[derive(Debug, Clone)]
pub struct TransportRequest {
    /// Absolute URL
    pub url: String,
    /// Uppercase method
    pub method: String,
    /// Header name/value pairs, lowercase names
    pub headers: Vec<(String, String)>,
    /// Body; always `None` for `GET` and `HEAD`
    pub body: Option<Bytes>,
    /// Cache mode
    pub cache: CacheMode,
    /// CORS mode; `same-origin` whenever the cache mode is `only-if-cached`
    pub mode: Option<CorsMode>,
    /// Ambient credentials mode
    pub credentials: Option<CredentialsMode>,
    /// Redirect handling
    pub redirect: RedirectMode,
    /// Referrer URL
    pub referrer: Option<String>,
    /// Referrer policy
    pub referrer_policy: ReferrerPolicy,
    /// Give up after this long
    pub timeout: Option<Duration>,
    /// Subresource integrity metadata
    pub integrity: Option<String>,
}

impl TransportRequest {
    /// Header value by case-insensitive name
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Executes requests on behalf of the engine.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Perform the request and normalize the response.
    ///
    /// Network failures, timeouts and refused redirects are reported as
    /// errors; HTTP error statuses are not.
    async fn send(&self, request: TransportRequest) -> Result<Response>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn send(&self, request: TransportRequest) -> Result<Response> {
        (**self).send(request).await
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use parking_lot::Mutex;

    /// Records every descriptor and answers with a canned response.
    #[derive(Default)]
    pub(crate) struct RecordingTransport {
        pub(crate) requests: Mutex<Vec<TransportRequest>>,
        pub(crate) response: Mutex<Response>,
    }

    impl RecordingTransport {
        pub(crate) fn replying(response: Response) -> Self {
            RecordingTransport {
                requests: Mutex::new(Vec::new()),
                response: Mutex::new(response),
            }
        }

        pub(crate) fn last(&self) -> TransportRequest {
            self.requests.lock().last().cloned().unwrap()
        }
    }

    #[async_trait]
    impl Transport for RecordingTransport {
        async fn send(&self, request: TransportRequest) -> Result<Response> {
            self.requests.lock().push(request);
            Ok(self.response.lock().clone())
        }
    }

    /// Never answers, so only an abort ends the call.
    pub(crate) struct StalledTransport;

    #[async_trait]
    impl Transport for StalledTransport {
        async fn send(&self, _request: TransportRequest) -> Result<Response> {
            std::future::pending().await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_abort_wakes_waiters() {
        let signal = AbortSignal::new();
        let waiter = signal.clone();
        let task = tokio::spawn(async move { waiter.aborted().await });
        tokio::task::yield_now().await;

        assert!(signal.abort());
        assert!(!signal.abort());
        task.await.unwrap();
        assert!(signal.is_aborted());
    }

    #[tokio::test]
    async fn test_already_aborted_resolves_immediately() {
        let signal = AbortSignal::new();
        signal.abort();
        signal.aborted().await;
    }
}
