//! Deployment request model and validation.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// A single landing-page deployment order.
///
/// Created once at intake — `request_id` is assigned there and the value is
/// never mutated afterwards. Exactly one worker consumes it exactly once.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeployRequest {
    pub campaign_id: String,
    pub landing_page_id: String,
    pub subdomain: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tracking_domain: Option<String>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub request_id: String,
}

impl Default for DeployRequest {
    fn default() -> Self {
        Self {
            campaign_id: String::new(),
            landing_page_id: String::new(),
            subdomain: String::new(),
            tracking_domain: None,
            request_id: String::new(),
        }
    }
}

impl DeployRequest {
    /// Check the caller-supplied fields.
    ///
    /// Missing JSON fields deserialize to empty strings, so absent and
    /// empty inputs produce the same message.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.campaign_id.trim().is_empty() {
            return Err(ValidationError::CampaignIdMissing);
        }
        if self.campaign_id.len() > 100 {
            return Err(ValidationError::CampaignIdTooLong);
        }
        if self.landing_page_id.trim().is_empty() {
            return Err(ValidationError::LandingPageIdMissing);
        }
        if self.landing_page_id.len() > 100 {
            return Err(ValidationError::LandingPageIdTooLong);
        }
        if self.subdomain.trim().is_empty() {
            return Err(ValidationError::SubdomainMissing);
        }
        if self.subdomain.len() > 50 {
            return Err(ValidationError::SubdomainTooLong);
        }
        if !valid_subdomain(&self.subdomain) {
            return Err(ValidationError::SubdomainFormat);
        }
        Ok(())
    }

    /// Fully-qualified deployment domain: bare names get `.{base_domain}`
    /// appended, anything already containing a dot is used as-is.
    pub fn full_domain(&self, base_domain: &str) -> String {
        if self.subdomain.contains('.') {
            self.subdomain.clone()
        } else {
            format!("{}.{base_domain}", self.subdomain)
        }
    }

    /// Tracking domain to use, falling back to the configured default when
    /// the caller supplied none (or an empty string).
    pub fn tracking_domain_or<'a>(&'a self, default: &'a str) -> &'a str {
        match self.tracking_domain.as_deref() {
            Some(t) if !t.is_empty() => t,
            _ => default,
        }
    }
}

/// Letters, digits, hyphens, dots, and forward slashes (for path-based
/// deployment targets like `promo.example.com/2`).
fn valid_subdomain(subdomain: &str) -> bool {
    subdomain
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | '/'))
}
