//! skylift-gate — per-client admission control.
//!
//! A sliding-window-log [`RateLimiter`] decides, before any work happens,
//! whether a client may submit another request. Rejections are cheap and
//! leave no trace in the client's history.

pub mod limiter;

pub use limiter::RateLimiter;
