use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

/// Core trait for limiters that scope their state by an operation key
pub trait KeyedRateLimiter: Send + Sync {
    /// Wait until a call under `key` may proceed, then record it.
    ///
    /// Never fails. Keys are created implicitly on first use.
    fn acquire<'a>(&'a self, key: &'a str) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>>;

    /// Minimum spacing enforced between two calls sharing a key
    fn interval(&self) -> Duration;

    /// Forget every recorded key
    fn reset(&self);
}
