//! skylift-deploy — site provisioning via the deploy script.
//!
//! Implements the [`skylift_queue::DeployExecutor`] seam for production:
//! [`ScriptExecutor`] shells out to the provisioning script, duplicates
//! the shared template for path-based targets, and patches campaign
//! parameters into the deployed HTML. [`SiteCatalog`] is the read side,
//! listing what has been provisioned so far.

pub mod executor;
pub mod site;

pub use executor::ScriptExecutor;
pub use site::{SiteCatalog, SiteEntry};
