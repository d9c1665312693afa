//! Shared test utilities for integration and E2E tests.
//!
//! This module provides fixtures and test doubles for every collaborator the
//! update engine talks to, so a whole run can be exercised without git,
//! atmos, go-getter or GitHub.
//!
//! ## Usage
//!
//! Add `mod common;` to your test file, then use the helpers:
//!
//! ```rust,ignore
//! mod common;
//! use common::prelude::*;
//!
//! #[test]
//! fn test_example() {
//!     let fixture = TestFixture::new().with_tags(&["2.0.0", "1.0.0"]);
//!     fixture.upstream("1.0.0", "vpc", &[("main.tf", "v1")]);
//!     fixture.component("vpc", LEGACY_URI_VPC, "1.0.0", &[("main.tf", "v1")]);
//!     let outcomes = fixture.run().unwrap();
//! }
//! ```

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use assert_fs::prelude::*;
use assert_fs::TempDir;

use component_updater::change_request::{
    is_component_branch, ChangeRequest, ChangeRequestProvider, PullRequest,
};
use component_updater::component::ComponentDescriptor;
use component_updater::config::Config;
use component_updater::error::{Error, Result};
use component_updater::filesystem::copy_tree;
use component_updater::repository::GitOperations;
use component_updater::tools::{RepoFetcher, VendoringTool};
use component_updater::updater::{Collaborators, ComponentUpdater, UpdateOutcome};

/// Re-export commonly used test dependencies for convenience.
pub mod prelude {
    #[allow(unused_imports)]
    pub use assert_cmd::cargo::cargo_bin_cmd;
    #[allow(unused_imports)]
    pub use assert_fs::prelude::*;
    #[allow(unused_imports)]
    pub use predicates::prelude::*;

    #[allow(unused_imports)]
    pub use super::{component_uri, manifest, TestFixture, TERRAFORM_DIR};
}

/// Components root used by every fixture.
pub const TERRAFORM_DIR: &str = "components/terraform";

/// Manifest as written by `atmos` users, with a mixin whose version must
/// never be touched.
pub fn manifest(name: &str, uri: &str, version: &str) -> String {
    format!(
        r#"apiVersion: atmos/v1
kind: ComponentVendorConfig
metadata:
  name: {name}
  description: Terraform component
spec:
  source:
    uri: {uri}
    version: {version}
    included_paths:
      - "**/**"
    excluded_paths: []
  mixins:
    - uri: https://raw.githubusercontent.com/cloudposse/terraform-null-label/0.25.0/exports/context.tf
      version: 0.25.0
      filename: context.tf
"#
    )
}

/// Per-component repository locator.
pub fn component_uri(name: &str) -> String {
    format!(
        "github.com/cloudposse-terraform-components/aws-{}.git//src?ref={{{{.Version}}}}",
        name.replace('/', "-")
    )
}

/// A commit made through [`FakeGit`], with the manifest content at the time.
#[derive(Debug, Clone)]
pub struct Commit {
    pub branch: String,
    pub message: String,
    pub files_to_add: Vec<String>,
    pub files_to_remove: Vec<String>,
    /// Content of every added file, read from the work tree at commit time.
    pub contents: BTreeMap<String, String>,
}

/// Git double: fixed tags and branches, records commits and deletions.
pub struct FakeGit {
    pub is_repository: bool,
    pub tags: Vec<String>,
    pub branches: Vec<String>,
    pub branch_listings: Arc<Mutex<usize>>,
    pub commits: Arc<Mutex<Vec<Commit>>>,
    pub deleted_branches: Arc<Mutex<Vec<String>>>,
}

impl GitOperations for FakeGit {
    fn is_repository(&self, _dir: &Path) -> bool {
        self.is_repository
    }

    fn list_tags(&self, _dir: &Path) -> Result<Vec<String>> {
        Ok(self.tags.clone())
    }

    fn list_branches(&self, _dir: &Path) -> Result<Vec<String>> {
        *self.branch_listings.lock().unwrap() += 1;
        Ok(self.branches.clone())
    }

    fn create_branch_and_commit(
        &self,
        work_tree: &Path,
        files_to_add: &[String],
        files_to_remove: &[String],
        branch: &str,
        message: &str,
    ) -> Result<()> {
        let contents = files_to_add
            .iter()
            .map(|file| {
                let content = fs::read_to_string(work_tree.join(file)).unwrap_or_default();
                (file.clone(), content)
            })
            .collect();

        self.commits.lock().unwrap().push(Commit {
            branch: branch.to_string(),
            message: message.to_string(),
            files_to_add: files_to_add.to_vec(),
            files_to_remove: files_to_remove.to_vec(),
            contents,
        });
        Ok(())
    }

    fn delete_branch(&self, _work_tree: &Path, branch: &str) -> Result<()> {
        self.deleted_branches.lock().unwrap().push(branch.to_string());
        Ok(())
    }
}

/// Vendoring double: copies `<upstream>/<version>/<component name>` into the
/// component directory, using the version from the copy's manifest.
pub struct FakeVendoring {
    pub upstream: PathBuf,
    pub calls: Arc<Mutex<Vec<(String, String)>>>,
    pub unavailable: bool,
}

impl VendoringTool for FakeVendoring {
    fn vendor(
        &self,
        repo_root: &Path,
        components_base_path: &Path,
        component_name: &str,
    ) -> Result<()> {
        if self.unavailable {
            return Err(Error::ToolUnavailable {
                tool: "atmos".to_string(),
                message: "'atmos' was not found in PATH".to_string(),
            });
        }

        let component_dir = repo_root.join(components_base_path).join(component_name);
        let component = ComponentDescriptor::parse(
            repo_root,
            components_base_path,
            &component_dir.join("component.yaml"),
        )?;
        let version = component.version().unwrap_or_default().to_string();
        self.calls
            .lock()
            .unwrap()
            .push((component_name.to_string(), version.clone()));

        let source = self.upstream.join(&version).join(component_name);
        if !source.is_dir() {
            return Err(Error::VendoringFailed {
                component: component_name.to_string(),
                code: Some(1),
                stdout: String::new(),
                stderr: format!("version {version} of {component_name} not found"),
            });
        }
        copy_tree(&source, &component_dir)
    }
}

/// Fetcher double that only counts calls.
pub struct FakeFetcher {
    pub calls: Arc<Mutex<Vec<String>>>,
}

impl RepoFetcher for FakeFetcher {
    fn fetch(&self, uri_repo: &str, destination: &Path) -> Result<()> {
        self.calls.lock().unwrap().push(uri_repo.to_string());
        fs::create_dir_all(destination)?;
        Ok(())
    }
}

/// Pull request host double.
pub struct FakeProvider {
    pub open: Arc<Mutex<Vec<PullRequest>>>,
    pub opened: Arc<Mutex<Vec<ChangeRequest>>>,
    pub closed: Arc<Mutex<Vec<(u64, String)>>>,
    /// Rejects every new pull request the way GitHub does for invalid input.
    pub rejects_requests: bool,
}

impl ChangeRequestProvider for FakeProvider {
    fn open_request(&self, request: &ChangeRequest) -> Result<PullRequest> {
        if self.rejects_requests {
            return Err(Error::GitHub {
                message: "422 Validation Failed".to_string(),
            });
        }
        let mut open = self.open.lock().unwrap();
        let number = open.iter().map(|pr| pr.number).fold(100, u64::max) + 1;
        let pull_request = PullRequest {
            number,
            url: format!("https://github.com/acme/infra/pull/{number}"),
            head_branch: request.branch.clone(),
        };
        open.push(pull_request.clone());
        self.opened.lock().unwrap().push(request.clone());
        Ok(pull_request)
    }

    fn request_exists_for_branch(&self, branch: &str) -> Result<bool> {
        Ok(self
            .open
            .lock()
            .unwrap()
            .iter()
            .any(|pr| pr.head_branch == branch))
    }

    fn open_requests_for_component(&self, normalized_name: &str) -> Result<Vec<PullRequest>> {
        Ok(self
            .open
            .lock()
            .unwrap()
            .iter()
            .filter(|pr| is_component_branch(&pr.head_branch, normalized_name))
            .cloned()
            .collect())
    }

    fn close_request(&self, number: u64, comment: &str) -> Result<()> {
        self.open.lock().unwrap().retain(|pr| pr.number != number);
        self.closed
            .lock()
            .unwrap()
            .push((number, comment.to_string()));
        Ok(())
    }
}

/// An infrastructure repository, an upstream with versioned component trees
/// and recorders for everything the engine does.
pub struct TestFixture {
    pub temp: TempDir,
    pub config: Config,
    pub is_repository: bool,
    pub vendoring_unavailable: bool,
    pub rejects_requests: bool,
    pub tags: Vec<String>,
    pub branches: Vec<String>,
    pub open_requests: Arc<Mutex<Vec<PullRequest>>>,
    pub opened: Arc<Mutex<Vec<ChangeRequest>>>,
    pub closed: Arc<Mutex<Vec<(u64, String)>>>,
    pub commits: Arc<Mutex<Vec<Commit>>>,
    pub vendor_calls: Arc<Mutex<Vec<(String, String)>>>,
    pub fetch_calls: Arc<Mutex<Vec<String>>>,
    pub branch_listings: Arc<Mutex<usize>>,
    pub deleted_branches: Arc<Mutex<Vec<String>>>,
}

impl TestFixture {
    pub fn new() -> Self {
        let temp = TempDir::new().unwrap();
        temp.child("infra").child(TERRAFORM_DIR).create_dir_all().unwrap();
        temp.child("upstream").create_dir_all().unwrap();
        temp.child("downloads").create_dir_all().unwrap();

        let config = Config {
            infra_repo_dir: temp.child("infra").path().to_path_buf(),
            infra_repo_name: "acme/infra".to_string(),
            components_download_dir: temp.child("downloads").path().to_path_buf(),
            skip_component_repo_fetching: true,
            affected_components_file: temp.child("affected-components.json").path().to_path_buf(),
            max_diffs_to_show: 0,
            ..Config::default()
        };

        Self {
            temp,
            config,
            is_repository: true,
            vendoring_unavailable: false,
            rejects_requests: false,
            tags: Vec::new(),
            branches: vec!["main".to_string()],
            open_requests: Arc::new(Mutex::new(Vec::new())),
            opened: Arc::new(Mutex::new(Vec::new())),
            closed: Arc::new(Mutex::new(Vec::new())),
            commits: Arc::new(Mutex::new(Vec::new())),
            vendor_calls: Arc::new(Mutex::new(Vec::new())),
            fetch_calls: Arc::new(Mutex::new(Vec::new())),
            branch_listings: Arc::new(Mutex::new(0)),
            deleted_branches: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Upstream tags, most recently created first.
    pub fn with_tags(mut self, tags: &[&str]) -> Self {
        self.tags = tags.iter().map(|t| t.to_string()).collect();
        self
    }

    pub fn with_branches(mut self, branches: &[&str]) -> Self {
        self.branches = branches.iter().map(|b| b.to_string()).collect();
        self
    }

    pub fn with_open_request(self, number: u64, branch: &str) -> Self {
        self.open_requests.lock().unwrap().push(PullRequest {
            number,
            url: format!("https://github.com/acme/infra/pull/{number}"),
            head_branch: branch.to_string(),
        });
        self
    }

    pub fn infra_dir(&self) -> &Path {
        &self.config.infra_repo_dir
    }

    pub fn component_dir(&self, name: &str) -> PathBuf {
        self.infra_dir().join(TERRAFORM_DIR).join(name)
    }

    /// Declares `name` in the infrastructure repository with its currently
    /// vendored `files`.
    pub fn component(&self, name: &str, uri: &str, version: &str, files: &[(&str, &str)]) {
        let dir = self.component_dir(name);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("component.yaml"), manifest(name, uri, version)).unwrap();
        write_files(&dir, files);
    }

    /// Publishes `files` as version `version` of `name` upstream.
    pub fn upstream(&self, version: &str, name: &str, files: &[(&str, &str)]) {
        let dir = self.temp.child("upstream").path().join(version).join(name);
        fs::create_dir_all(&dir).unwrap();
        write_files(&dir, files);
    }

    pub fn updater(&self) -> Result<ComponentUpdater> {
        let collaborators = Collaborators {
            git_ops: Box::new(FakeGit {
                is_repository: self.is_repository,
                tags: self.tags.clone(),
                branches: self.branches.clone(),
                branch_listings: self.branch_listings.clone(),
                commits: self.commits.clone(),
                deleted_branches: self.deleted_branches.clone(),
            }),
            vendoring: Box::new(FakeVendoring {
                upstream: self.temp.child("upstream").path().to_path_buf(),
                calls: self.vendor_calls.clone(),
                unavailable: self.vendoring_unavailable,
            }),
            fetcher: Box::new(FakeFetcher {
                calls: self.fetch_calls.clone(),
            }),
            provider: Box::new(FakeProvider {
                open: self.open_requests.clone(),
                opened: self.opened.clone(),
                closed: self.closed.clone(),
                rejects_requests: self.rejects_requests,
            }),
        };
        ComponentUpdater::new(self.config.clone(), collaborators)
    }

    pub fn run(&self) -> Result<Vec<UpdateOutcome>> {
        self.updater()?.update()
    }

    /// Parsed affected-components file.
    pub fn affected_components(&self) -> Vec<String> {
        let content = fs::read_to_string(&self.config.affected_components_file).unwrap();
        serde_json::from_str(&content).unwrap()
    }

    pub fn commits(&self) -> Vec<Commit> {
        self.commits.lock().unwrap().clone()
    }

    pub fn opened(&self) -> Vec<ChangeRequest> {
        self.opened.lock().unwrap().clone()
    }

    pub fn vendor_calls(&self) -> Vec<(String, String)> {
        self.vendor_calls.lock().unwrap().clone()
    }

    pub fn deleted_branches(&self) -> Vec<String> {
        self.deleted_branches.lock().unwrap().clone()
    }

    pub fn branch_listings(&self) -> usize {
        *self.branch_listings.lock().unwrap()
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}

fn write_files(dir: &Path, files: &[(&str, &str)]) {
    for (name, content) in files {
        let path = dir.join(name);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }
}
