//! # Repository Access
//!
//! This module gives the update engine two things it needs from version
//! control: queries and commits against checkouts, and local copies of the
//! upstream repositories components are vendored from.
//!
//! ## Design
//!
//! Both sit behind traits so that tests can swap in doubles:
//!
//! - **`GitOperations`**: tag and branch listing, plus creating a branch with
//!   a commit of exactly the files an update touched. `DefaultGitOperations`
//!   wraps the system `git` command.
//!
//! - **`RepoFetcher`** (see [`crate::tools`]): downloads an upstream
//!   repository. `SourceRepositories` wraps a fetcher with a per-run cache
//!   keyed by repository locator, so components sharing an upstream only
//!   fetch it once.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, warn};

use crate::error::{Error, Result};
use crate::path::encode_url_path;
use crate::tools::RepoFetcher;

/// Trait for git operations - allows mocking in tests
pub trait GitOperations: Send + Sync {
    /// True if `dir` is a git checkout.
    fn is_repository(&self, dir: &Path) -> bool;

    /// Lists all tags of the checkout at `dir`, most recently created first.
    fn list_tags(&self, dir: &Path) -> Result<Vec<String>>;

    /// Lists local and remote branch names of the checkout at `dir`.
    fn list_branches(&self, dir: &Path) -> Result<Vec<String>>;

    /// Creates `branch` in `work_tree`, stages the given additions and
    /// removals, commits them with `message` and pushes the branch.
    fn create_branch_and_commit(
        &self,
        work_tree: &Path,
        files_to_add: &[String],
        files_to_remove: &[String],
        branch: &str,
        message: &str,
    ) -> Result<()>;

    /// Deletes `branch` from the `origin` remote of `work_tree`.
    fn delete_branch(&self, work_tree: &Path, branch: &str) -> Result<()>;
}

/// The default implementation of `GitOperations`, which uses the system's
/// `git` command to perform real Git operations.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultGitOperations;

impl GitOperations for DefaultGitOperations {
    fn is_repository(&self, dir: &Path) -> bool {
        crate::git::is_repository(dir)
    }

    fn list_tags(&self, dir: &Path) -> Result<Vec<String>> {
        crate::git::list_tags(dir)
    }

    fn list_branches(&self, dir: &Path) -> Result<Vec<String>> {
        crate::git::list_branches(dir)
    }

    fn create_branch_and_commit(
        &self,
        work_tree: &Path,
        files_to_add: &[String],
        files_to_remove: &[String],
        branch: &str,
        message: &str,
    ) -> Result<()> {
        crate::git::create_branch_and_commit(
            work_tree,
            files_to_add,
            files_to_remove,
            branch,
            message,
        )
    }

    fn delete_branch(&self, work_tree: &Path, branch: &str) -> Result<()> {
        crate::git::delete_branch(work_tree, branch)
    }
}

/// Local copies of upstream component repositories for one run.
pub struct SourceRepositories {
    fetcher: Box<dyn RepoFetcher>,
    download_dir: PathBuf,
    skip_fetching: bool,
    fetched: HashMap<String, PathBuf>,
}

impl SourceRepositories {
    /// Creates a cache that fetches into `download_dir`.
    ///
    /// With `skip_fetching`, nothing is downloaded and `download_dir` itself
    /// is handed out as the checkout of every repository.
    pub fn new(fetcher: Box<dyn RepoFetcher>, download_dir: PathBuf, skip_fetching: bool) -> Self {
        Self {
            fetcher,
            download_dir,
            skip_fetching,
            fetched: HashMap::new(),
        }
    }

    /// Directory `uri_repo` is fetched into.
    pub fn cache_path(&self, uri_repo: &str) -> PathBuf {
        self.download_dir.join(encode_url_path(uri_repo))
    }

    /// Returns the local checkout of `uri_repo`, fetching it on first use.
    ///
    /// A fetch that fails for this repository is logged and still yields the
    /// destination path; the caller's repository check then rejects it. Only
    /// a fetcher that cannot run at all is returned as an error.
    pub fn checkout(&mut self, uri_repo: &str) -> Result<PathBuf> {
        if self.skip_fetching {
            return Ok(self.download_dir.clone());
        }

        if let Some(path) = self.fetched.get(uri_repo) {
            debug!("Using already fetched repository for {}", uri_repo);
            return Ok(path.clone());
        }

        let destination = self.cache_path(uri_repo);
        if destination.exists() {
            fs::remove_dir_all(&destination)?;
        }
        fs::create_dir_all(&self.download_dir)?;

        match self.fetcher.fetch(uri_repo, &destination) {
            Ok(()) => {}
            Err(e @ Error::ToolUnavailable { .. }) => return Err(e),
            Err(e) => warn!("Failed to fetch component repository {}: {}", uri_repo, e),
        }

        self.fetched
            .insert(uri_repo.to_string(), destination.clone());
        Ok(destination)
    }
}
