//! # Change Requests
//!
//! A change request is the reviewable unit an update ends in: a pull request
//! from the update branch into the default branch. This module defines the
//! provider interface the engine talks to and renders pull request titles and
//! bodies from `tera` templates.
//!
//! Templates see these variables:
//!
//! | Variable                      | Example                                    |
//! |:------------------------------|:-------------------------------------------|
//! | `component_name`              | `eks/cluster`                              |
//! | `old_version`                 | `1.107.0`                                  |
//! | `new_version`                 | `1.532.0`                                  |
//! | `old_version_link`            | link to the old source tree, or empty      |
//! | `new_version_link`            | link to the new source tree, or empty      |
//! | `old_component_release_link`  | release page of the old version, or empty  |
//! | `new_component_release_link`  | release page of the new version, or empty  |
//! | `source_link`                 | link to the new source repository, or empty |
//!
//! Links are only known for repositories hosted on GitHub.

use std::fs;
use std::path::Path;

use serde::Serialize;
use tera::{Context, Tera};

use crate::component::ComponentDescriptor;
use crate::defaults::{BRANCH_PREFIX, PR_LABEL};
use crate::error::{Error, Result};

/// Default pull request title.
pub const DEFAULT_TITLE_TEMPLATE: &str =
    "Component `{{ component_name }}` update from {{ old_version }} → {{ new_version }}";

/// Default pull request body.
pub const DEFAULT_BODY_TEMPLATE: &str = r#"## what

This is an auto-generated PR that updates component `{{ component_name }}` to version `{{ new_version }}`.

| Meta               | Details             |
|:-------------------|:--------------------|
| **Component**      | `{{ component_name }}`                 |
| **Old Version**    | {% if old_version_link %}[`{{ old_version }}`]({{ old_version_link }}){% else %}`{{ old_version }}`{% endif %} |
| **New Version**    | {% if new_version_link %}[`{{ new_version }}`]({{ new_version_link }}){% else %}`{{ new_version }}`{% endif %} |

## why

[Cloud Posse](https://cloudposse.com) recommends upgrading Terraform components regularly to maintain a secure, efficient, and well-supported infrastructure.
{% if source_link %}
## references

- [Source repository]({{ source_link }})
{%- if new_component_release_link %}
- [Release notes for `{{ new_version }}`]({{ new_component_release_link }})
{%- endif %}
{% endif %}"#;

/// A pull request to open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeRequest {
    pub branch: String,
    pub title: String,
    pub body: String,
    pub labels: Vec<String>,
}

/// An opened pull request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequest {
    pub number: u64,
    pub url: String,
    pub head_branch: String,
}

/// Hosting service pull requests are opened against.
pub trait ChangeRequestProvider: Send + Sync {
    /// Opens `request` against the default branch.
    fn open_request(&self, request: &ChangeRequest) -> Result<PullRequest>;

    /// True if an open pull request already has `branch` as its head.
    fn request_exists_for_branch(&self, branch: &str) -> Result<bool>;

    /// Open pull requests whose head branch belongs to the component.
    fn open_requests_for_component(&self, normalized_name: &str) -> Result<Vec<PullRequest>>;

    /// Closes pull request `number`, leaving `comment` on it.
    fn close_request(&self, number: u64, comment: &str) -> Result<()>;
}

/// Branch an update of `normalized_name` to `version` is published on.
pub fn branch_name(normalized_name: &str, version: &str) -> String {
    format!("{BRANCH_PREFIX}/{normalized_name}/{version}")
}

/// True if `branch` is an update branch of `normalized_name`, for any version.
pub fn is_component_branch(branch: &str, normalized_name: &str) -> bool {
    branch.starts_with(&format!("{BRANCH_PREFIX}/{normalized_name}/"))
}

/// Variables available to the title and body templates.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct TemplateContext {
    pub component_name: String,
    pub old_version: String,
    pub new_version: String,
    pub old_version_link: String,
    pub new_version_link: String,
    pub old_component_release_link: String,
    pub new_component_release_link: String,
    pub source_link: String,
}

impl TemplateContext {
    pub fn new(original: &ComponentDescriptor, updated: &ComponentDescriptor) -> Self {
        let old_version = original.version().unwrap_or_default().to_string();
        let new_version = updated.version().unwrap_or_default().to_string();

        let old_repo = original.uri_repo().and_then(github_web_url);
        let new_repo = updated.uri_repo().and_then(github_web_url);

        Self {
            component_name: updated.name().to_string(),
            old_version_link: tree_link(old_repo.as_deref(), &old_version, original.uri_path()),
            new_version_link: tree_link(new_repo.as_deref(), &new_version, updated.uri_path()),
            old_component_release_link: release_link(old_repo.as_deref(), &old_version),
            new_component_release_link: release_link(new_repo.as_deref(), &new_version),
            source_link: new_repo.unwrap_or_default(),
            old_version,
            new_version,
        }
    }
}

fn tree_link(repo: Option<&str>, version: &str, path: Option<&str>) -> String {
    match (repo, path) {
        (Some(repo), Some(path)) => format!("{repo}/tree/{version}/{}", path.trim_matches('/')),
        (Some(repo), None) => format!("{repo}/tree/{version}"),
        _ => String::new(),
    }
}

fn release_link(repo: Option<&str>, version: &str) -> String {
    repo.map(|repo| format!("{repo}/releases/tag/{version}"))
        .unwrap_or_default()
}

/// Browser URL of a GitHub-hosted repository locator.
///
/// Accepts getter prefixes and schemes: `git::https://github.com/org/repo.git`
/// and `github.com/org/repo` both yield `https://github.com/org/repo`.
pub fn github_web_url(uri_repo: &str) -> Option<String> {
    let start = uri_repo.find("github.com/")?;
    let locator = uri_repo[start..].trim_end_matches('/');
    let locator = locator.strip_suffix(".git").unwrap_or(locator);

    // github.com/<owner>/<repo>
    let mut parts = locator.splitn(4, '/');
    let (_, owner, repo) = (parts.next()?, parts.next()?, parts.next()?);
    if owner.is_empty() || repo.is_empty() {
        return None;
    }
    Some(format!("https://github.com/{owner}/{repo}"))
}

/// Title, body and labels of every pull request in a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequestTemplates {
    title: String,
    body: String,
    labels: Vec<String>,
}

impl Default for PullRequestTemplates {
    fn default() -> Self {
        Self {
            title: DEFAULT_TITLE_TEMPLATE.to_string(),
            body: DEFAULT_BODY_TEMPLATE.to_string(),
            labels: vec![PR_LABEL.to_string()],
        }
    }
}

impl PullRequestTemplates {
    pub fn new(title: String, body: String, labels: Vec<String>) -> Self {
        Self {
            title,
            body,
            labels,
        }
    }

    /// Loads templates from files, falling back to the defaults for any not given.
    pub fn from_files(
        title: Option<&Path>,
        body: Option<&Path>,
        labels: Vec<String>,
    ) -> Result<Self> {
        let read = |path: Option<&Path>, default: &str| -> Result<String> {
            match path {
                Some(path) => fs::read_to_string(path).map_err(|e| Error::Template {
                    template: path.display().to_string(),
                    message: e.to_string(),
                }),
                None => Ok(default.to_string()),
            }
        };

        let templates = Self {
            title: read(title, DEFAULT_TITLE_TEMPLATE)?,
            body: read(body, DEFAULT_BODY_TEMPLATE)?,
            labels,
        };
        templates.validate()?;
        Ok(templates)
    }

    /// Fails early if either template does not compile.
    pub fn validate(&self) -> Result<()> {
        self.engine().map(|_| ())
    }

    fn engine(&self) -> Result<Tera> {
        let mut tera = Tera::default();
        tera.add_raw_template("title", &self.title)
            .map_err(|e| template_error("title", e))?;
        tera.add_raw_template("body", &self.body)
            .map_err(|e| template_error("body", e))?;
        Ok(tera)
    }

    /// Renders the pull request for publishing `context` on `branch`.
    pub fn render(&self, branch: &str, context: &TemplateContext) -> Result<ChangeRequest> {
        let tera = self.engine()?;
        let context = Context::from_serialize(context).map_err(|e| template_error("context", e))?;

        let title = tera
            .render("title", &context)
            .map_err(|e| template_error("title", e))?;
        let body = tera
            .render("body", &context)
            .map_err(|e| template_error("body", e))?;

        Ok(ChangeRequest {
            branch: branch.to_string(),
            title: title.trim().to_string(),
            body,
            labels: self.labels.clone(),
        })
    }
}

fn template_error(template: &str, error: tera::Error) -> Error {
    // tera keeps the useful part of the message in the source chain
    let mut message = error.to_string();
    let mut source = std::error::Error::source(&error);
    while let Some(cause) = source {
        message.push_str(&format!(": {cause}"));
        source = cause.source();
    }

    Error::Template {
        template: template.to_string(),
        message,
    }
}
