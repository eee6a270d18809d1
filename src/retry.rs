//! Retry-around-call helper
//!
//! Transient RPC failures are retried immediately at the call site, with no
//! delay between attempts. The last error is returned once the budget is spent.

use anyhow::Result;
use std::future::Future;
use tracing::warn;

/// Run `call` up to `attempts` times, returning the first success.
///
/// An `attempts` of zero is treated as one.
pub async fn with_retries<T, F, Fut>(attempts: u32, operation: &str, mut call: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let attempts = attempts.max(1);
    let mut attempt = 1;
    loop {
        match call().await {
            Ok(value) => return Ok(value),
            Err(err) if attempt < attempts => {
                let error = format!("{:#}", err);
                warn!(operation, attempt, attempts, %error, "RPC call failed, retrying");
                attempt += 1;
            }
            Err(err) => {
                return Err(err.context(format!("{} failed after {} attempts", operation, attempts)));
            }
        }
    }
}
