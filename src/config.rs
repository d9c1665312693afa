//! # Configuration
//!
//! [`Config`] holds every setting of an update run. Values come from three
//! layers, lowest precedence first:
//!
//! 1.  **Defaults** from the [`defaults`](crate::defaults) module.
//! 2.  **A YAML file** given with `--config`. Any subset of fields may be set:
//!
//!     ```yaml
//!     infra_repo_name: acme/infrastructure
//!     infra_terraform_dirs: [components/terraform]
//!     include: ["eks/*", "vpc"]
//!     max_number_of_prs: 5
//!     pr_labels: component-update, automated
//!     ```
//!
//! 3.  **Command-line flags and environment variables**, applied by the binary.
//!
//! List-valued fields accept either a YAML sequence or a single string with
//! comma- or newline-separated items, which is how CI systems usually pass
//! them through environment variables.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Deserializer};

use crate::defaults;
use crate::error::{Error, Result};

/// Settings of one update run.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Checkout of the infrastructure repository.
    pub infra_repo_dir: PathBuf,
    /// `owner/repo` of the infrastructure repository on GitHub.
    pub infra_repo_name: String,
    /// Components roots, relative to `infra_repo_dir`, scanned in order.
    #[serde(deserialize_with = "deserialize_list")]
    pub infra_terraform_dirs: Vec<String>,
    /// Shell-style globs of component names to process.
    #[serde(deserialize_with = "deserialize_list")]
    pub include: Vec<String>,
    /// Shell-style globs of component names to skip.
    #[serde(deserialize_with = "deserialize_list")]
    pub exclude: Vec<String>,
    /// Number of pull requests a run may open.
    pub max_number_of_prs: usize,
    /// Only bump manifests of components that were never vendored.
    pub skip_component_vendoring: bool,
    /// Decide everything, publish nothing.
    pub dry_run: bool,
    /// Where the JSON list of updated component names is written.
    pub affected_components_file: PathBuf,
    pub go_getter_tool: PathBuf,
    pub components_download_dir: PathBuf,
    /// Use `components_download_dir` as the upstream checkout of every
    /// component instead of fetching.
    pub skip_component_repo_fetching: bool,
    pub pr_title_template: Option<PathBuf>,
    pub pr_body_template: Option<PathBuf>,
    #[serde(deserialize_with = "deserialize_list")]
    pub pr_labels: Vec<String>,
    pub migration_threshold: String,
    pub max_diffs_to_show: usize,
    pub github_api_url: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            infra_repo_dir: PathBuf::from("."),
            infra_repo_name: String::new(),
            infra_terraform_dirs: vec![defaults::TERRAFORM_COMPONENTS_DIR.to_string()],
            include: Vec::new(),
            exclude: Vec::new(),
            max_number_of_prs: defaults::MAX_NUMBER_OF_PRS,
            skip_component_vendoring: false,
            dry_run: false,
            affected_components_file: PathBuf::from(defaults::AFFECTED_COMPONENTS_FILE),
            go_getter_tool: PathBuf::from(defaults::GO_GETTER_TOOL),
            components_download_dir: defaults::default_components_download_dir(),
            skip_component_repo_fetching: false,
            pr_title_template: None,
            pr_body_template: None,
            pr_labels: vec![defaults::PR_LABEL.to_string()],
            migration_threshold: defaults::MIGRATION_THRESHOLD.to_string(),
            max_diffs_to_show: defaults::MAX_NUMBER_OF_DIFFS_TO_SHOW,
            github_api_url: defaults::GITHUB_API_URL.to_string(),
        }
    }
}

impl Config {
    /// Loads a YAML config file. Fields it does not set keep their defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| Error::Config {
            message: format!("Failed to read config file {}: {}", path.display(), e),
        })?;
        Self::from_yaml(&content).map_err(|e| Error::Config {
            message: format!("Invalid config file {}: {}", path.display(), e),
        })
    }

    /// Parses YAML config content.
    pub fn from_yaml(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(content)?)
    }

    /// Checks settings that cannot be verified while parsing.
    pub fn validate(&self) -> Result<()> {
        if self.max_number_of_prs > defaults::MAX_NUMBER_OF_PRS_CEILING {
            return Err(Error::Config {
                message: format!(
                    "max_number_of_prs is {}, at most {} pull requests may be opened per run",
                    self.max_number_of_prs,
                    defaults::MAX_NUMBER_OF_PRS_CEILING
                ),
            });
        }

        if self.infra_terraform_dirs.is_empty() {
            return Err(Error::Config {
                message: "infra_terraform_dirs must name at least one directory".to_string(),
            });
        }

        if let Some(dir) = self
            .infra_terraform_dirs
            .iter()
            .find(|dir| Path::new(dir).is_absolute())
        {
            return Err(Error::Config {
                message: format!(
                    "infra_terraform_dirs entry '{dir}' must be relative to infra_repo_dir"
                ),
            });
        }

        semver::Version::parse(self.migration_threshold.trim_start_matches('v')).map_err(
            |e| Error::Config {
                message: format!(
                    "migration_threshold '{}' is not a semantic version: {}",
                    self.migration_threshold, e
                ),
            },
        )?;

        Ok(())
    }
}

/// Splits a comma- or newline-separated list, dropping empty items.
pub fn parse_list(value: &str) -> Vec<String> {
    value
        .split([',', '\n'])
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

fn deserialize_list<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum ListOrString {
        List(Vec<String>),
        Text(String),
    }

    Ok(match Option::<ListOrString>::deserialize(deserializer)? {
        Some(ListOrString::List(items)) => items
            .iter()
            .map(String::as_str)
            .flat_map(parse_list)
            .collect(),
        Some(ListOrString::Text(text)) => parse_list(&text),
        None => Vec::new(),
    })
}
