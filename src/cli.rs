//! CLI argument parsing and run setup

use std::path::PathBuf;

use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;
use log::{debug, info};

use component_updater::change_request::ChangeRequestProvider;
use component_updater::config::{parse_list, Config};
use component_updater::github::GitHubProvider;
use component_updater::repository::DefaultGitOperations;
use component_updater::tools::{AtmosVendoringTool, GoGetterFetcher};
use component_updater::updater::{Collaborators, ComponentUpdater};

/// Opens pull requests that update vendored atmos components to their latest
/// upstream versions
#[derive(Parser, Debug)]
#[command(name = "component-updater")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// YAML file with configuration; flags given here take precedence
    #[arg(long, value_name = "FILE", env = "COMPONENT_UPDATER_CONFIG")]
    config: Option<PathBuf>,

    /// GitHub API token
    #[arg(long, value_name = "TOKEN", env = "REPO_ACCESS_TOKEN", hide_env_values = true)]
    github_api_token: Option<String>,

    /// Infrastructure repository in 'owner/repo' form, e.g. 'acme/infra'
    #[arg(long, value_name = "OWNER/REPO")]
    infra_repo_name: Option<String>,

    /// Path to the checked out infrastructure repository
    #[arg(long, value_name = "DIR")]
    infra_repo_dir: Option<PathBuf>,

    /// Comma-separated components roots, relative to the infrastructure repository
    #[arg(long, value_name = "DIRS")]
    infra_terraform_dirs: Option<String>,

    /// Comma-separated globs of component names to process
    #[arg(long, value_name = "PATTERNS")]
    include: Option<String>,

    /// Comma-separated globs of component names to skip
    #[arg(long, value_name = "PATTERNS")]
    exclude: Option<String>,

    /// Maximum number of pull requests to open in one run
    #[arg(long, value_name = "N")]
    max_number_of_prs: Option<usize>,

    /// Only bump manifests of components that were never vendored
    #[arg(long)]
    skip_component_vendoring: bool,

    /// Decide updates without creating branches or pull requests
    #[arg(long)]
    dry_run: bool,

    /// Where to write the JSON list of updated components
    #[arg(long, value_name = "FILE")]
    affected_components_file: Option<PathBuf>,

    /// go-getter binary used to fetch component repositories
    #[arg(long, value_name = "PATH")]
    go_getter_tool: Option<PathBuf>,

    /// atmos binary used to vendor components
    #[arg(long, value_name = "PATH", default_value = "atmos")]
    atmos_tool: PathBuf,

    /// Directory component repositories are fetched into
    #[arg(long, value_name = "DIR")]
    components_download_dir: Option<PathBuf>,

    /// Use the download directory as the repository of every component
    #[arg(long)]
    skip_component_repo_fetching: bool,

    /// Tera template file for pull request titles
    #[arg(long, value_name = "FILE")]
    pr_title_template: Option<PathBuf>,

    /// Tera template file for pull request bodies
    #[arg(long, value_name = "FILE")]
    pr_body_template: Option<PathBuf>,

    /// Comma-separated labels added to every pull request
    #[arg(long, value_name = "LABELS")]
    pr_labels: Option<String>,

    /// First version published outside the legacy components monorepo
    #[arg(long, value_name = "VERSION")]
    migration_threshold: Option<String>,

    /// Number of changed files whose diff is logged per component
    #[arg(long, value_name = "N")]
    max_diffs_to_show: Option<usize>,

    /// GitHub REST API endpoint
    #[arg(long, value_name = "URL")]
    github_api_url: Option<String>,

    /// Set log level (error, warn, info, debug, trace)
    #[arg(long, value_name = "LEVEL", default_value = "info")]
    log_level: String,
}

impl Cli {
    /// Initializes logging. `RUST_LOG` wins over `--log-level` when set.
    pub fn init_logging(&self) {
        env_logger::Builder::from_env(
            env_logger::Env::default().default_filter_or(self.log_level.as_str()),
        )
        .format_timestamp_secs()
        .init();
    }

    /// Merges defaults, the config file and flags, lowest precedence first.
    fn build_config(&self) -> Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::from_file(path)?,
            None => Config::default(),
        };

        if let Some(value) = &self.infra_repo_name {
            config.infra_repo_name = value.clone();
        }
        if let Some(value) = &self.infra_repo_dir {
            config.infra_repo_dir = value.clone();
        }
        if let Some(value) = &self.infra_terraform_dirs {
            config.infra_terraform_dirs = parse_list(value);
        }
        if let Some(value) = &self.include {
            config.include = parse_list(value);
        }
        if let Some(value) = &self.exclude {
            config.exclude = parse_list(value);
        }
        if let Some(value) = self.max_number_of_prs {
            config.max_number_of_prs = value;
        }
        if self.skip_component_vendoring {
            config.skip_component_vendoring = true;
        }
        if self.dry_run {
            config.dry_run = true;
        }
        if let Some(value) = &self.affected_components_file {
            config.affected_components_file = value.clone();
        }
        if let Some(value) = &self.go_getter_tool {
            config.go_getter_tool = value.clone();
        }
        if let Some(value) = &self.components_download_dir {
            config.components_download_dir = value.clone();
        }
        if self.skip_component_repo_fetching {
            config.skip_component_repo_fetching = true;
        }
        if let Some(value) = &self.pr_title_template {
            config.pr_title_template = Some(value.clone());
        }
        if let Some(value) = &self.pr_body_template {
            config.pr_body_template = Some(value.clone());
        }
        if let Some(value) = &self.pr_labels {
            config.pr_labels = parse_list(value);
        }
        if let Some(value) = &self.migration_threshold {
            config.migration_threshold = value.clone();
        }
        if let Some(value) = self.max_diffs_to_show {
            config.max_diffs_to_show = value;
        }
        if let Some(value) = &self.github_api_url {
            config.github_api_url = value.clone();
        }

        config.validate()?;
        Ok(config)
    }

    /// Execute the update run
    pub fn execute(self) -> Result<()> {
        let config = self.build_config()?;
        debug!("Configuration: {:?}", config);

        if !config.infra_repo_dir.is_dir() {
            bail!(
                "Infrastructure repository directory '{}' does not exist",
                config.infra_repo_dir.display()
            );
        }

        let token = self.github_api_token.as_deref().ok_or_else(|| {
            anyhow!("A GitHub API token is required (--github-api-token or REPO_ACCESS_TOKEN)")
        })?;
        let provider: Box<dyn ChangeRequestProvider> = Box::new(
            GitHubProvider::new(&config.github_api_url, &config.infra_repo_name, token)
                .with_context(|| format!("Failed to connect to {}", config.infra_repo_name))?,
        );

        let collaborators = Collaborators {
            git_ops: Box::new(DefaultGitOperations),
            vendoring: Box::new(AtmosVendoringTool::new(self.atmos_tool.clone())),
            fetcher: Box::new(GoGetterFetcher::new(config.go_getter_tool.clone())),
            provider,
        };

        let mut updater = ComponentUpdater::new(config, collaborators)?;
        let outcomes = updater.update().context("Component update run failed")?;
        info!("Done. {} components processed", outcomes.len());

        Ok(())
    }
}
