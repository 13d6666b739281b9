//! # xc_ratelimit
//!
//! Per-key minimum spacing between calls to exchange endpoints.

pub mod limiter;
pub mod spacing;

pub use limiter::KeyedRateLimiter;
pub use spacing::MinSpacing;
pub use spacing::DEFAULT_INTERVAL;
