//! Callback delivery on top of the async result.
//!
//! Every operation of this crate yields one future. [`deliver`] adapts it for
//! callers that also want a completion callback: the callback sees the
//! outcome, and the same outcome is still returned to the awaiting caller.

use crate::error::{HttpError, Result};
use std::future::Future;

/// Await `future`, hand its outcome to `callback`, then return it.
///
/// The callback runs exactly once on both success and failure.
///
/// # Examples
///
/// ```ignore
/// use uniform_http::client::deliver;
/// use uniform_http::Client;
///
/// # async fn run() -> uniform_http::Result<()> {
/// let client = Client::new();
/// let response = deliver(client.get("https://example.com/"), |outcome| match outcome {
///     Ok(response) => println!("status {}", response.status),
///     Err(e) => eprintln!("failed: {}", e),
/// })
/// .await?;
/// # Ok(())
/// # }
/// ```
pub async fn deliver<T, Fut, C>(future: Fut, callback: C) -> Result<T>
where
    Fut: Future<Output = Result<T>>,
    C: FnOnce(std::result::Result<&T, &HttpError>),
{
    let outcome = future.await;
    callback(outcome.as_ref());
    outcome
}
