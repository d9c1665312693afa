//! Legacy component location migration.
//!
//! Components used to be published from a single monorepo
//! (`terraform-aws-components`, one directory per component under `modules/`).
//! Starting with [`MIGRATION_THRESHOLD`](crate::defaults::MIGRATION_THRESHOLD)
//! every component lives in its own repository under the
//! `cloudposse-terraform-components` organization, with the module under `src/`.
//! This module rewrites a monorepo source locator into the per-component one.

use semver::Version;

use crate::error::Result;

const LEGACY_REPO: &str = "github.com/cloudposse/terraform-aws-components";
const LEGACY_MODULES_DIR: &str = "modules/";
const TARGET_ORGANIZATION: &str = "github.com/cloudposse-terraform-components";
const TARGET_MODULE_PATH: &str = "src";

/// Components whose repository name does not follow the `aws-<module>` rule.
const REPOSITORY_NAME_OVERRIDES: &[(&str, &str)] = &[
    ("aws-sso", "aws-identity-center"),
    ("sso", "aws-identity-center"),
    ("account-map/modules/iam-roles", "aws-account-map"),
    ("tfstate-backend", "aws-tfstate-backend"),
    ("spacelift/admin-stack", "aws-spacelift-admin-stack"),
    ("eks/alb-controller", "aws-eks-alb-controller"),
];

/// Version-gated rewrite of monorepo locators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacyMigration {
    threshold: Version,
}

impl Default for LegacyMigration {
    fn default() -> Self {
        Self {
            threshold: Version::new(1, 532, 0),
        }
    }
}

impl LegacyMigration {
    /// Creates a migration that applies from `threshold` onwards.
    pub fn new(threshold: &str) -> Result<Self> {
        let threshold = Version::parse(threshold.trim().trim_start_matches('v'))?;
        Ok(Self { threshold })
    }

    /// Returns true when `version` is at or above the threshold.
    pub fn applies_to_version(&self, version: &str) -> bool {
        Version::parse(version.trim().trim_start_matches('v'))
            .map(|v| v >= self.threshold)
            .unwrap_or(false)
    }

    /// Rewrites `uri_repo` + `uri_path` (+ `query`) into the per-component
    /// location, or returns `None` when the locator is not the legacy monorepo.
    ///
    /// `uri_repo` may carry a forced getter or scheme prefix
    /// (`git::https://`), which is preserved.
    pub fn migrate_uri(&self, uri_repo: &str, uri_path: &str, query: &str) -> Option<String> {
        let host_start = uri_repo.find("github.com/")?;
        let (prefix, locator) = uri_repo.split_at(host_start);

        let locator = locator.trim_end_matches('/');
        let locator = locator.strip_suffix(".git").unwrap_or(locator);
        if locator != LEGACY_REPO {
            return None;
        }

        let module = uri_path.trim_matches('/');
        let module = module.strip_prefix(LEGACY_MODULES_DIR).unwrap_or(module);

        Some(format!(
            "{prefix}{TARGET_ORGANIZATION}/{}.git//{TARGET_MODULE_PATH}{query}",
            repository_name(module)
        ))
    }
}

/// Maps a legacy module path (`eks/cluster`) to its repository name (`aws-eks-cluster`).
pub fn repository_name(module: &str) -> String {
    if let Some((_, name)) = REPOSITORY_NAME_OVERRIDES
        .iter()
        .find(|(legacy, _)| *legacy == module)
    {
        return name.to_string();
    }

    let flattened = module.replace('/', "-");
    if flattened.starts_with("aws-") {
        flattened
    } else {
        format!("aws-{flattened}")
    }
}
