//! Script-driven deployment executor.
//!
//! Two target shapes come through the queue:
//!
//! - domain only (`promo` / `promo.example.com`): run the provisioning
//!   script for the domain, then rewrite the tracking snippet in the
//!   deployed `index.html`;
//! - path-based (`promo.example.com/2/`): duplicate the shared template
//!   into a numbered (or named) subdirectory of an existing site,
//!   bootstrapping the base site first when it was never provisioned.
//!
//! Failures never propagate as errors: the worker pool only wants an
//! [`ExecOutcome`] it can log and count, because the HTTP caller was
//! answered at admission time.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use regex::{NoExpand, Regex};
use tokio::fs;
use tokio::process::Command;
use tracing::{debug, warn};
use walkdir::WalkDir;

use skylift_core::{DeployConfig, DeployRequest};
use skylift_queue::{DeployExecutor, ExecFuture, ExecOutcome};

/// Production [`DeployExecutor`]: shells out to the provisioning script
/// and patches the deployed HTML in place.
pub struct ScriptExecutor {
    config: DeployConfig,
}

impl ScriptExecutor {
    pub fn new(config: DeployConfig) -> Self {
        Self { config }
    }

    async fn run(&self, request: &DeployRequest) -> Result<String> {
        let full_domain = request.full_domain(&self.config.base_domain);
        if full_domain.contains('/') {
            self.deploy_path(request, &full_domain).await
        } else {
            self.deploy_domain(request, &full_domain).await
        }
    }

    async fn deploy_domain(&self, request: &DeployRequest, full_domain: &str) -> Result<String> {
        let output = self.run_deploy_script(request, full_domain).await?;
        let index = self.site_dir(full_domain).join("index.html");
        let url = format!("https://{full_domain}");
        self.inject_campaign_params(&index, request, &url).await?;
        Ok(output)
    }

    /// Path-based target: `{domain}/{path}` gets its own copy of the
    /// template under the base site's directory.
    async fn deploy_path(&self, request: &DeployRequest, full_target: &str) -> Result<String> {
        let (domain, requested) = full_target
            .split_once('/')
            .context("invalid path format")?;
        let base_dir = self.site_dir(domain);

        let mut path = requested.trim_end_matches('/').to_string();
        if path.is_empty() {
            path = next_available_path(&base_dir);
        }

        // Bootstrap the base site when its directory or nginx config is
        // missing; the script provisions both.
        let nginx_config = Path::new(&self.config.sites_dir).join(domain);
        let mut output = String::new();
        if !base_dir.exists() || !nginx_config.exists() {
            output = self
                .run_deploy_script(request, domain)
                .await
                .context("failed to create base domain")?;
        }

        let path_dir = base_dir.join(&path);
        fs::create_dir_all(&path_dir)
            .await
            .context("failed to create path directory")?;

        copy_dir_contents(Path::new(&self.config.template_dir), &path_dir)
            .context("failed to copy template")?;

        // nginx serves as www-data; ownership is best-effort here.
        let chown = Command::new("chown")
            .arg("-R")
            .arg("www-data:www-data")
            .arg(&path_dir)
            .output()
            .await;
        if !matches!(&chown, Ok(out) if out.status.success()) {
            warn!(
                request_id = %request.request_id,
                path = %path_dir.display(),
                "failed to set ownership"
            );
        }

        let url = format!("https://{full_target}");
        self.inject_campaign_params(&path_dir.join("index.html"), request, &url)
            .await?;
        Ok(output)
    }

    async fn run_deploy_script(&self, request: &DeployRequest, domain: &str) -> Result<String> {
        let tracking = request.tracking_domain_or(&self.config.tracking_domain);
        let mut cmd = Command::new("bash");
        cmd.arg(&self.config.script_path)
            .arg(domain)
            .arg(&request.campaign_id)
            .arg(&request.landing_page_id)
            .arg(tracking);
        debug!("Running: {:?}", cmd);
        let output = cmd.output().await.context("failed to run deploy script")?;
        let combined = format!(
            "{}{}",
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        );
        if !output.status.success() {
            bail!("deploy script failed: {}", combined.trim_end());
        }
        Ok(combined)
    }

    /// Rewrite the tracking snippet of a deployed page in place: the
    /// `cpid`/`lpid`/`lpurl` variables take the request's values, and
    /// every default tracking URL is pointed at the requested domain.
    async fn inject_campaign_params(
        &self,
        html_path: &Path,
        request: &DeployRequest,
        deployment_url: &str,
    ) -> Result<()> {
        let content = fs::read_to_string(html_path)
            .await
            .with_context(|| format!("failed to read HTML file {}", html_path.display()))?;

        let tracking = request.tracking_domain_or(&self.config.tracking_domain);

        let cpid_re = Regex::new(r"var cpid = '[^']*';")?;
        let lpid_re = Regex::new(r"var lpid = '[^']*';")?;
        let lpurl_re = Regex::new(r"var lpurl = '[^']*';")?;
        let tracking_url_re = Regex::new(&format!(
            "https://{}",
            regex::escape(&self.config.tracking_domain)
        ))?;

        let html = cpid_re.replace_all(
            &content,
            NoExpand(&format!("var cpid = '{}';", request.campaign_id)),
        );
        let html = lpid_re.replace_all(
            &html,
            NoExpand(&format!("var lpid = '{}';", request.landing_page_id)),
        );
        let html = lpurl_re.replace_all(&html, NoExpand(&format!("var lpurl = '{deployment_url}';")));
        let html = tracking_url_re.replace_all(&html, NoExpand(&format!("https://{tracking}")));

        fs::write(html_path, html.as_ref())
            .await
            .with_context(|| format!("failed to write HTML file {}", html_path.display()))?;
        Ok(())
    }

    fn site_dir(&self, domain: &str) -> PathBuf {
        Path::new(&self.config.web_root).join(domain)
    }
}

impl DeployExecutor for ScriptExecutor {
    fn execute<'a>(&'a self, request: &'a DeployRequest) -> ExecFuture<'a> {
        Box::pin(async move {
            match self.run(request).await {
                Ok(output) => ExecOutcome::ok(output),
                Err(err) => ExecOutcome::failed(format!("{err:#}")),
            }
        })
    }
}

/// First numeric subdirectory of `base_dir` not yet taken, checking 1
/// through 1000.
fn next_available_path(base_dir: &Path) -> String {
    for i in 1..=1000 {
        if !base_dir.join(i.to_string()).exists() {
            return i.to_string();
        }
    }
    "1".to_string()
}

/// Recursive copy of `from`'s contents into `to`. `to` must exist.
fn copy_dir_contents(from: &Path, to: &Path) -> Result<()> {
    for entry in WalkDir::new(from) {
        let entry = entry?;
        let rel = entry
            .path()
            .strip_prefix(from)
            .context("walked outside the template directory")?;
        if rel.as_os_str().is_empty() {
            continue;
        }
        let target = to.join(rel);
        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&target)
                .with_context(|| format!("failed to create {}", target.display()))?;
        } else {
            std::fs::copy(entry.path(), &target)
                .with_context(|| format!("failed to copy {}", entry.path().display()))?;
        }
    }
    Ok(())
}
