//! Service configuration — TOML file with per-section defaults.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;

/// Top-level service configuration, deserializable from TOML.
///
/// Every section and field has a default, so a partial file (or no file at
/// all) still yields a runnable configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub server: ServerConfig,
    pub admission: AdmissionConfig,
    pub deploy: DeployConfig,
}

/// HTTP listener configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Maximum accepted request body size in bytes.
    pub max_request_bytes: usize,
    /// Budget for draining queued deployments on shutdown.
    pub shutdown_timeout_secs: u64,
}

/// Per-client admission limits (sliding-window log).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AdmissionConfig {
    /// Requests allowed per client key within `window_secs`.
    pub limit: usize,
    pub window_secs: u64,
}

/// Deployment pipeline configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DeployConfig {
    pub queue_size: usize,
    pub worker_pool_size: usize,
    /// Provisioning script run for each deployment.
    pub script_path: String,
    /// Root under which per-domain site directories live.
    pub web_root: String,
    /// Template tree copied into path-based deployments.
    pub template_dir: String,
    /// nginx sites directory scanned for the landers listing.
    pub sites_dir: String,
    /// Appended to bare subdomains to form the deployment domain.
    pub base_domain: String,
    /// Default tracking domain injected into deployed pages.
    pub tracking_domain: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            max_request_bytes: 1 << 20,
            shutdown_timeout_secs: 30,
        }
    }
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            limit: 100,
            window_secs: 60,
        }
    }
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            queue_size: 100,
            worker_pool_size: 4,
            script_path: "/root/templates/quick-deploy.sh".to_string(),
            web_root: "/var/www".to_string(),
            template_dir: "/var/www/template".to_string(),
            sites_dir: "/etc/nginx/sites-available".to_string(),
            base_domain: "example.com".to_string(),
            tracking_domain: "track.example.com".to_string(),
        }
    }
}

impl ServiceConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// `host:port` string for the TCP listener.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// Reject values the service cannot run with. Checked once at
    /// startup, after CLI overrides are applied: the queue needs a
    /// capacity of at least one, and a pool of zero workers would
    /// accept deployments that nothing ever drains.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.deploy.queue_size == 0 {
            return Err(ConfigError::Invalid("deploy.queue_size must be at least 1"));
        }
        if self.deploy.worker_pool_size == 0 {
            return Err(ConfigError::Invalid(
                "deploy.worker_pool_size must be at least 1",
            ));
        }
        Ok(())
    }
}

impl ServerConfig {
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

impl AdmissionConfig {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }
}
