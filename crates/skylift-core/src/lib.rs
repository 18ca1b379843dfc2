//! skylift-core — shared domain types for the skylift deployment service.
//!
//! Holds the pieces every other crate agrees on:
//! - [`DeployRequest`] — the immutable deployment order created at intake
//! - field validation with the caller-facing error messages
//! - [`ServiceConfig`] — TOML-backed configuration where every field has a
//!   default, so the service runs with no config file at all

pub mod config;
pub mod error;
pub mod request;

pub use config::{AdmissionConfig, DeployConfig, ServerConfig, ServiceConfig};
pub use error::{ConfigError, ValidationError};
pub use request::DeployRequest;
