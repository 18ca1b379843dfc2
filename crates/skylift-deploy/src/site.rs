//! Site catalog — lists provisioned sites from the nginx directory.
//!
//! Provisioned state lives on disk, one nginx config file per domain;
//! the catalog is a read-only view over that directory, not a database.

use std::path::PathBuf;
use std::time::UNIX_EPOCH;

use anyhow::{Context, Result};
use serde::Serialize;

/// One provisioned site, derived from its nginx config file.
#[derive(Debug, Clone, Serialize)]
pub struct SiteEntry {
    pub domain: String,
    pub url: String,
    pub status: String,
    /// Config file modification time, seconds since the epoch.
    pub deployed_epoch: u64,
}

/// Read-only view over the nginx sites directory.
#[derive(Debug, Clone)]
pub struct SiteCatalog {
    sites_dir: PathBuf,
    base_domain: String,
}

impl SiteCatalog {
    pub fn new(sites_dir: impl Into<PathBuf>, base_domain: impl Into<String>) -> Self {
        Self {
            sites_dir: sites_dir.into(),
            base_domain: base_domain.into(),
        }
    }

    /// Every non-directory entry whose name contains `.{base_domain}`,
    /// sorted by domain for a stable listing.
    pub fn list(&self) -> Result<Vec<SiteEntry>> {
        let marker = format!(".{}", self.base_domain);
        let entries = std::fs::read_dir(&self.sites_dir).with_context(|| {
            format!(
                "failed to read sites directory {}",
                self.sites_dir.display()
            )
        })?;

        let mut sites = Vec::new();
        for entry in entries {
            let entry = entry?;
            let Ok(file_type) = entry.file_type() else {
                continue;
            };
            let name = entry.file_name().to_string_lossy().into_owned();
            if file_type.is_dir() || !name.contains(&marker) {
                continue;
            }
            let deployed_epoch = entry
                .metadata()
                .ok()
                .and_then(|meta| meta.modified().ok())
                .and_then(|mtime| mtime.duration_since(UNIX_EPOCH).ok())
                .map(|age| age.as_secs())
                .unwrap_or(0);
            sites.push(SiteEntry {
                url: format!("https://{name}"),
                domain: name,
                status: "active".to_string(),
                deployed_epoch,
            });
        }
        sites.sort_by(|a, b| a.domain.cmp(&b.domain));
        Ok(sites)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn lists_only_config_files_for_the_base_domain() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("promo.example.com"), "server {}").unwrap();
        std::fs::write(tmp.path().join("beta.example.com"), "server {}").unwrap();
        std::fs::write(tmp.path().join("other.net"), "server {}").unwrap();
        std::fs::write(tmp.path().join("default"), "server {}").unwrap();
        std::fs::create_dir(tmp.path().join("dir.example.com")).unwrap();

        let catalog = SiteCatalog::new(tmp.path(), "example.com");
        let sites = catalog.list().unwrap();

        let domains: Vec<&str> = sites.iter().map(|s| s.domain.as_str()).collect();
        assert_eq!(domains, vec!["beta.example.com", "promo.example.com"]);
        assert!(sites.iter().all(|s| s.status == "active"));
        assert!(sites.iter().all(|s| s.deployed_epoch > 0));
        assert_eq!(sites[0].url, "https://beta.example.com");
    }

    #[test]
    fn empty_directory_lists_nothing() {
        let tmp = TempDir::new().unwrap();
        let catalog = SiteCatalog::new(tmp.path(), "example.com");
        assert!(catalog.list().unwrap().is_empty());
    }

    #[test]
    fn missing_directory_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let catalog = SiteCatalog::new(tmp.path().join("absent"), "example.com");
        let err = catalog.list().unwrap_err();
        assert!(err.to_string().contains("failed to read sites directory"));
    }
}
