//! Error types for configuration loading and request validation.

use thiserror::Error;

/// Errors raised while loading or parsing the service configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Read(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(&'static str),
}

/// Validation failures for inbound deployment requests.
///
/// The messages are part of the API contract: 400 responses surface them
/// verbatim to the caller.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("campaign_id is required and cannot be empty")]
    CampaignIdMissing,

    #[error("campaign_id too long (max 100 characters)")]
    CampaignIdTooLong,

    #[error("landing_page_id is required and cannot be empty")]
    LandingPageIdMissing,

    #[error("landing_page_id too long (max 100 characters)")]
    LandingPageIdTooLong,

    #[error("subdomain is required and cannot be empty")]
    SubdomainMissing,

    #[error("subdomain too long (max 50 characters)")]
    SubdomainTooLong,

    #[error("invalid subdomain format")]
    SubdomainFormat,
}
