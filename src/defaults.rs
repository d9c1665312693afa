//! Default values for component-updater configuration.
//!
//! This module provides centralized default values used by the configuration
//! layer and the update engine, ensuring consistency and avoiding duplication.

use std::path::PathBuf;

/// File name of a component manifest.
pub const COMPONENT_YAML: &str = "component.yaml";

/// Extension of documentation files that never force an update on their own.
pub const README_EXTENSION: &str = ".md";

/// Components root scanned when none is configured.
pub const TERRAFORM_COMPONENTS_DIR: &str = "components/terraform";

/// Prefix shared by every branch the updater creates.
pub const BRANCH_PREFIX: &str = "component-update";

/// Default number of successful updates per run.
pub const MAX_NUMBER_OF_PRS: usize = 10;

/// Hard ceiling on the number of successful updates per run.
pub const MAX_NUMBER_OF_PRS_CEILING: usize = 50;

/// Number of changed files whose diff is written to the log.
pub const MAX_NUMBER_OF_DIFFS_TO_SHOW: usize = 3;

/// Default location of the affected-components artifact.
pub const AFFECTED_COMPONENTS_FILE: &str = "affected-components.json";

/// Default repository fetcher binary.
pub const GO_GETTER_TOOL: &str = "go-getter";

/// Default label attached to every pull request.
pub const PR_LABEL: &str = "component-update";

/// Public GitHub REST endpoint.
pub const GITHUB_API_URL: &str = "https://api.github.com";

/// Versions at or above this one are published per component, not in the monorepo.
pub const MIGRATION_THRESHOLD: &str = "1.532.0";

/// Commit message for an updated component.
pub const COMMIT_MESSAGE_TEMPLATE: &str =
    "Updated component '{component_name}' to version '{component_version}'";

/// Returns the default directory that fetched component repositories land in.
///
/// Uses the platform-appropriate cache directory:
/// - Linux: `~/.cache/component-updater/repos`
/// - macOS: `~/Library/Caches/component-updater/repos`
/// - Windows: `{FOLDERID_LocalAppData}\component-updater\repos`
///
/// Falls back to `.component-updater-cache/repos` in the current directory if
/// the platform cache directory cannot be determined.
pub fn default_components_download_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from(".component-updater-cache"))
        .join("component-updater")
        .join("repos")
}

/// Renders the commit message for a component update.
pub fn commit_message(component_name: &str, component_version: &str) -> String {
    COMMIT_MESSAGE_TEMPLATE
        .replace("{component_name}", component_name)
        .replace("{component_version}", component_version)
}
