//! skylift-metrics — process-wide request and deployment counters.
//!
//! A single [`MetricsRegistry`] lives for the whole process: handlers and
//! workers update it with lock-free atomics, and any reader can take a
//! consistent-enough [`MetricsSnapshot`] at any time.

pub mod registry;

pub use registry::{MetricsRegistry, MetricsSnapshot};
