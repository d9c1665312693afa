//! # Update Engine
//!
//! [`ComponentUpdater`] walks every component manifest under the configured
//! components roots and takes each one through a fixed sequence of checks.
//! The first check that fails ends processing of that component with a
//! terminal [`UpdateState`]; a component that passes all of them ends as
//! [`UpdateState::Updated`] with a pull request opened for it.
//!
//! ## Per-Component Sequence
//!
//! 1.  **Manifest**: the declared version must be semver and the source must
//!     split into repository and sub-path. The source block must also be
//!     rewritable in place; a flow-style `source: {...}` is not.
//! 2.  **Quota**: no more than `max_number_of_prs` updates per run.
//! 3.  **Upstream**: the (migrated) source repository is fetched and must be
//!     a git checkout with at least one semver tag.
//! 4.  **Freshness**: the latest tag must differ from the declared version.
//! 5.  **Duplicates**: neither the update branch nor a pull request for it
//!     may exist yet.
//! 6.  **Snapshots**: the component is vendored at the new version
//!     (candidate) and at its current version (baseline), each in a private
//!     copy of the repository.
//! 7.  **Comparison**: the snapshots must differ in something other than the
//!     manifest and documentation. A component that was never vendored always
//!     counts as changed.
//! 8.  **Publication**: the candidate copy becomes the work tree the update
//!     branch is committed from; older pull requests for the component are
//!     closed in favour of the new one.
//!
//! Conditions that concern a single component never abort the run. Errors
//! that would affect every component, such as a tool that cannot be started,
//! do, after the affected-components file has been written.
//!
//! Infrastructure repository branches are listed once, before the first
//! component is processed. A branch pushed for a pull request that could
//! then not be opened is deleted again, so the next run retries it instead
//! of finding the branch and skipping the component.

use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};

use log::{debug, error, info, warn};
use serde::Serialize;
use walkdir::WalkDir;

use crate::change_request::{
    branch_name, ChangeRequestProvider, PullRequest, PullRequestTemplates, TemplateContext,
};
use crate::changeset::{self, ChangeSet, ComparisonScope, ExcludePolicy};
use crate::component::{component_name, ComponentDescriptor};
use crate::config::Config;
use crate::defaults::{commit_message, COMPONENT_YAML};
use crate::error::{Error, Result};
use crate::migration::LegacyMigration;
use crate::path::ComponentFilter;
use crate::report;
use crate::repository::{GitOperations, SourceRepositories};
use crate::snapshot::{Snapshot, SnapshotBuilder};
use crate::tools::{RepoFetcher, VendoringTool};
use crate::version::{TagLookup, VersionResolver};

/// Where processing of a component ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateState {
    Undefined,
    NoVersion,
    InvalidSource,
    NotAVersionControlRepo,
    NoTagFound,
    AlreadyUpToDate,
    MaxBatchQuotaReached,
    BranchAlreadyExists,
    ChangeRequestAlreadyExists,
    VendoringFailed,
    VendoredButVendoringDisabled,
    NoChangesFound,
    Updated,
}

impl UpdateState {
    pub fn as_str(&self) -> &'static str {
        match self {
            UpdateState::Undefined => "undefined",
            UpdateState::NoVersion => "no version",
            UpdateState::InvalidSource => "invalid source",
            UpdateState::NotAVersionControlRepo => "not a version control repository",
            UpdateState::NoTagFound => "no tag found",
            UpdateState::AlreadyUpToDate => "already up to date",
            UpdateState::MaxBatchQuotaReached => "max batch quota reached",
            UpdateState::BranchAlreadyExists => "branch already exists",
            UpdateState::ChangeRequestAlreadyExists => "change request already exists",
            UpdateState::VendoringFailed => "vendoring failed",
            UpdateState::VendoredButVendoringDisabled => "vendored but vendoring disabled",
            UpdateState::NoChangesFound => "no changes found",
            UpdateState::Updated => "updated",
        }
    }
}

impl fmt::Display for UpdateState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What publishing an update produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Publication {
    /// The opened pull request; `None` in dry-run mode.
    pub pull_request: Option<PullRequest>,
    /// Numbers of older pull requests closed in favour of this one.
    pub closed: Vec<u64>,
}

/// Result of processing one component.
#[derive(Debug, Clone)]
pub struct UpdateOutcome {
    /// The component as it was decided on: the original descriptor for early
    /// exits, the updated one once a new version was resolved.
    pub component: ComponentDescriptor,
    pub state: UpdateState,
    pub branch_name: Option<String>,
    pub files_to_publish: Option<Vec<String>>,
    pub files_to_remove: Option<Vec<String>>,
    pub publication: Option<Publication>,
}

impl UpdateOutcome {
    fn new(component: ComponentDescriptor) -> Self {
        Self {
            component,
            state: UpdateState::Undefined,
            branch_name: None,
            files_to_publish: None,
            files_to_remove: None,
            publication: None,
        }
    }

    fn finish(mut self, state: UpdateState) -> Option<Self> {
        self.state = state;
        Some(self)
    }
}

/// External systems the engine talks to.
pub struct Collaborators {
    pub git_ops: Box<dyn GitOperations>,
    pub vendoring: Box<dyn VendoringTool>,
    pub fetcher: Box<dyn RepoFetcher>,
    pub provider: Box<dyn ChangeRequestProvider>,
}

/// Runs the update decision for every selected component.
pub struct ComponentUpdater {
    config: Config,
    git_ops: Box<dyn GitOperations>,
    vendoring: Box<dyn VendoringTool>,
    provider: Box<dyn ChangeRequestProvider>,
    repositories: SourceRepositories,
    filter: ComponentFilter,
    migration: LegacyMigration,
    templates: PullRequestTemplates,
    policy: ExcludePolicy,
    branches: BTreeSet<String>,
    num_updates: usize,
}

impl ComponentUpdater {
    /// Creates an updater with templates loaded from the configured files.
    pub fn new(config: Config, collaborators: Collaborators) -> Result<Self> {
        let templates = PullRequestTemplates::from_files(
            config.pr_title_template.as_deref(),
            config.pr_body_template.as_deref(),
            config.pr_labels.clone(),
        )?;
        Self::with_templates(config, collaborators, templates)
    }

    pub fn with_templates(
        config: Config,
        collaborators: Collaborators,
        templates: PullRequestTemplates,
    ) -> Result<Self> {
        config.validate()?;

        let Collaborators {
            git_ops,
            vendoring,
            fetcher,
            provider,
        } = collaborators;

        Ok(Self {
            filter: ComponentFilter::new(&config.include, &config.exclude)?,
            migration: LegacyMigration::new(&config.migration_threshold)?,
            policy: ExcludePolicy::with_max_diffs(config.max_diffs_to_show),
            repositories: SourceRepositories::new(
                fetcher,
                config.components_download_dir.clone(),
                config.skip_component_repo_fetching,
            ),
            git_ops,
            vendoring,
            provider,
            templates,
            branches: BTreeSet::new(),
            num_updates: 0,
            config,
        })
    }

    /// Processes every component and returns one outcome per selected
    /// component, in processing order.
    ///
    /// The affected-components file is written in every case, including when
    /// a run-fatal error cuts the run short.
    pub fn update(&mut self) -> Result<Vec<UpdateOutcome>> {
        let mut outcomes = Vec::new();
        let result = self
            .load_branches()
            .and_then(|()| self.update_all(&mut outcomes));

        let written =
            report::write_affected_components(&self.config.affected_components_file, &outcomes);
        report::log_summary(&outcomes);

        result?;
        written?;
        Ok(outcomes)
    }

    fn update_all(&mut self, outcomes: &mut Vec<UpdateOutcome>) -> Result<()> {
        let terraform_dirs = self.config.infra_terraform_dirs.clone();

        for terraform_dir in &terraform_dirs {
            let manifests = self.find_manifests(terraform_dir)?;
            info!(
                "Found {} components in {}",
                manifests.len(),
                terraform_dir
            );

            for manifest in manifests {
                if let Some(outcome) = self.update_component(Path::new(terraform_dir), &manifest)? {
                    outcomes.push(outcome);
                }
            }
        }

        Ok(())
    }

    fn find_manifests(&self, terraform_dir: &str) -> Result<Vec<PathBuf>> {
        let root = self.config.infra_repo_dir.join(terraform_dir);
        if !root.is_dir() {
            return Err(Error::ComponentsRoot {
                path: root,
                message: "directory does not exist".to_string(),
            });
        }

        let mut manifests = Vec::new();
        for entry in WalkDir::new(&root).sort_by_file_name() {
            let entry = entry.map_err(|e| Error::ComponentsRoot {
                path: root.clone(),
                message: e.to_string(),
            })?;
            if entry.file_type().is_file() && entry.file_name() == COMPONENT_YAML {
                manifests.push(entry.into_path());
            }
        }
        manifests.sort();
        Ok(manifests)
    }

    fn update_component(
        &mut self,
        terraform_dir: &Path,
        manifest: &Path,
    ) -> Result<Option<UpdateOutcome>> {
        let components_root = self.config.infra_repo_dir.join(terraform_dir);
        let name = component_name(&components_root, manifest);
        if !self.filter.should_process(&name) {
            debug!("Component '{}' filtered out. Skipping", name);
            return Ok(None);
        }

        let original =
            ComponentDescriptor::parse(&self.config.infra_repo_dir, terraform_dir, manifest)?;
        info!("Processing component: {}", original.name());
        debug!("Original component:\n{}", original);

        let outcome = UpdateOutcome::new(original.clone());

        if !original.has_version() {
            error!(
                "Component '{}' doesn't have a valid 'version' specified. Skipping",
                original.name()
            );
            return Ok(outcome.finish(UpdateState::NoVersion));
        }

        let (Some(current_version), true) = (original.version(), original.has_valid_source())
        else {
            error!(
                "Component '{}' doesn't have a valid 'uri' specified. Skipping",
                original.name()
            );
            return Ok(outcome.finish(UpdateState::InvalidSource));
        };
        let current_version = current_version.to_string();

        if self.num_updates >= self.config.max_number_of_prs {
            warn!(
                "Reached max number of updates ({}). Skipping component '{}'",
                self.config.max_number_of_prs,
                original.name()
            );
            return Ok(outcome.finish(UpdateState::MaxBatchQuotaReached));
        }

        let Some(migrated) =
            component_scoped(original.migrate_legacy_location(&self.migration))?
        else {
            return Ok(outcome.finish(UpdateState::InvalidSource));
        };
        let Some(uri_repo) = migrated.uri_repo() else {
            return Ok(outcome.finish(UpdateState::InvalidSource));
        };
        let checkout = self.repositories.checkout(uri_repo)?;

        let latest = match VersionResolver::new(self.git_ops.as_ref()).latest_tag(&checkout)? {
            TagLookup::NotARepository => {
                error!(
                    "Component '{}' uri is not a git repository. Can't figure out latest version. Skipping",
                    original.name()
                );
                return Ok(outcome.finish(UpdateState::NotAVersionControlRepo));
            }
            TagLookup::NoTag => {
                error!(
                    "Unable to figure out latest tag for component '{}'. Skipping",
                    original.name()
                );
                return Ok(outcome.finish(UpdateState::NoTagFound));
            }
            TagLookup::Latest(tag) => tag,
        };
        info!(
            "Latest tag for component '{}' is '{}'",
            original.name(),
            latest
        );

        if original.is_at_version(&latest) {
            info!("Component '{}' already updated. Skipping", original.name());
            return Ok(outcome.finish(UpdateState::AlreadyUpToDate));
        }

        let rewritten = migrated
            .with_version(&latest)
            .and_then(|component| component.migrate_legacy_location(&self.migration));
        let Some(candidate) = component_scoped(rewritten)? else {
            return Ok(outcome.finish(UpdateState::InvalidSource));
        };
        debug!("Updated component:\n{}", candidate);

        let branch = branch_name(&candidate.normalized_name(), &latest);
        let mut outcome = UpdateOutcome {
            component: candidate.clone(),
            branch_name: Some(branch.clone()),
            ..outcome
        };

        if self.branches.contains(&branch) {
            warn!("Branch '{}' already exists. Skipping", branch);
            return Ok(outcome.finish(UpdateState::BranchAlreadyExists));
        }

        if self.provider.request_exists_for_branch(&branch)? {
            warn!("PR for branch '{}' already exists. Skipping", branch);
            return Ok(outcome.finish(UpdateState::ChangeRequestAlreadyExists));
        }

        let builder = SnapshotBuilder::new(self.vendoring.as_ref());
        let Some(candidate_snapshot) = component_scoped(builder.materialize(&candidate, &latest))?
        else {
            return Ok(outcome.finish(UpdateState::VendoringFailed));
        };
        let Some(baseline_snapshot) =
            component_scoped(builder.materialize(&original, &current_version))?
        else {
            return Ok(outcome.finish(UpdateState::VendoringFailed));
        };

        let manifest_path = original.relative_path();
        let component_dir = original.relative_dir();
        let scope = ComparisonScope {
            baseline_root: baseline_snapshot.root(),
            candidate_root: candidate_snapshot.root(),
            reference_root: original.infra_repo_dir(),
            component_dir: &component_dir,
            manifest_path: &manifest_path,
        };
        let mut changes = changeset::compare(&scope, &self.policy)?;

        let was_vendored = baseline_snapshot.was_vendored();
        if !was_vendored {
            info!(
                "Component '{}' has not been vendored yet. Updating",
                original.name()
            );
            changes.needs_update = true;
            let manifest = relative_string(&manifest_path);
            if !changes.files_to_publish.contains(&manifest) {
                changes.files_to_publish.push(manifest);
            }
        }

        if self.config.skip_component_vendoring {
            if was_vendored && changes.needs_update {
                error!(
                    "Component '{}' is vendored but vendoring is disabled. Skipping",
                    original.name()
                );
                return Ok(outcome.finish(UpdateState::VendoredButVendoringDisabled));
            }
            if !was_vendored {
                changes.files_to_publish = vec![relative_string(&manifest_path)];
                changes.files_to_remove.clear();
            }
        }

        if !changes.needs_update {
            info!("Looking good. No changes found for '{}'", original.name());
            return Ok(outcome.finish(UpdateState::NoChangesFound));
        }

        info!(
            "Component '{}' needs to be updated from {} to {}",
            original.name(),
            current_version,
            latest
        );
        let publication =
            self.publish(&original, &candidate, &candidate_snapshot, &branch, &changes)?;

        outcome.files_to_publish = Some(changes.files_to_publish);
        outcome.files_to_remove = Some(changes.files_to_remove);
        outcome.publication = Some(publication);
        Ok(outcome.finish(UpdateState::Updated))
    }

    fn load_branches(&mut self) -> Result<()> {
        let branches = self.git_ops.list_branches(&self.config.infra_repo_dir)?;
        debug!("Found {} branches in infra repository", branches.len());
        self.branches = branches.into_iter().collect();
        Ok(())
    }

    fn publish(
        &mut self,
        original: &ComponentDescriptor,
        candidate: &ComponentDescriptor,
        work_tree: &Snapshot,
        branch: &str,
        changes: &ChangeSet,
    ) -> Result<Publication> {
        if self.config.dry_run {
            info!(
                "Dry run: would create branch '{}' with {} files to add and {} to remove",
                branch,
                changes.files_to_publish.len(),
                changes.files_to_remove.len()
            );
            self.num_updates += 1;
            return Ok(Publication::default());
        }

        let version = candidate.version().unwrap_or_default();
        self.git_ops.create_branch_and_commit(
            work_tree.root(),
            &changes.files_to_publish,
            &changes.files_to_remove,
            branch,
            &commit_message(candidate.name(), version),
        )?;
        info!("Created branch: {} in 'origin'", branch);
        self.branches.insert(branch.to_string());

        let pull_request = match self.open_request(original, candidate, branch) {
            Ok(pull_request) => pull_request,
            Err(e) => {
                self.rollback_branch(work_tree.root(), branch);
                return Err(e);
            }
        };
        info!("Opened PR #{}: {}", pull_request.number, pull_request.url);
        self.num_updates += 1;

        let mut closed = Vec::new();
        for other in self
            .provider
            .open_requests_for_component(&candidate.normalized_name())?
        {
            if other.number == pull_request.number {
                continue;
            }
            self.provider.close_request(
                other.number,
                &format!("Closing in favor of PR #{}", pull_request.number),
            )?;
            info!(
                "Closed PR #{} in favor of #{}",
                other.number, pull_request.number
            );
            closed.push(other.number);
        }

        Ok(Publication {
            pull_request: Some(pull_request),
            closed,
        })
    }

    fn open_request(
        &self,
        original: &ComponentDescriptor,
        candidate: &ComponentDescriptor,
        branch: &str,
    ) -> Result<PullRequest> {
        let request = self
            .templates
            .render(branch, &TemplateContext::new(original, candidate))?;
        info!("Opening PR for branch {}", branch);
        self.provider.open_request(&request)
    }

    /// Deletes a pushed branch whose pull request could not be opened.
    fn rollback_branch(&mut self, work_tree: &Path, branch: &str) {
        warn!("Failed to open PR for branch '{}'. Deleting it", branch);
        match self.git_ops.delete_branch(work_tree, branch) {
            Ok(()) => {
                self.branches.remove(branch);
            }
            Err(e) => error!("Failed to delete branch '{}': {}", branch, e),
        }
    }
}

/// Turns a component-scoped failure into `None`.
fn component_scoped<T>(result: Result<T>) -> Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.is_component_scoped() => {
            error!("{}", e);
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

fn relative_string(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}
