//! # Component Descriptor
//!
//! A component is a unit of infrastructure code vendored from an upstream
//! repository. Each one is declared by a `component.yaml` manifest:
//!
//! ```yaml
//! apiVersion: atmos/v1
//! kind: ComponentVendorConfig
//! spec:
//!   source:
//!     uri: github.com/cloudposse/terraform-aws-components.git//modules/vpc?ref={{.Version}}
//!     version: 1.107.0
//!   mixins:
//!     - uri: https://example.com/context.tf
//!       version: 0.25.0
//! ```
//!
//! [`ComponentDescriptor`] is a parsed view over one such file. Only
//! `spec.source.version` and `spec.source.uri` are interpreted; everything
//! else is carried verbatim in the raw content. Derived fields are always
//! re-parsed from the content, and every mutation returns a new descriptor.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use semver::Version;
use serde_yaml::Value;

use crate::error::{Error, Result};
use crate::manifest;
use crate::migration::LegacyMigration;

const SOURCE_BLOCK: &[&str] = &["spec", "source"];

/// Fields derived from the manifest content.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct SourceFields {
    version: Option<String>,
    uri: Option<String>,
    uri_repo: Option<String>,
    uri_path: Option<String>,
    uri_query: String,
}

impl SourceFields {
    fn parse(path: &Path, content: &str) -> Result<Self> {
        let document: Value =
            serde_yaml::from_str(content).map_err(|e| Error::ManifestParse {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;

        let source = document.get("spec").and_then(|spec| spec.get("source"));
        let version = source.and_then(|s| s.get("version")).and_then(scalar);
        let uri = source.and_then(|s| s.get("uri")).and_then(scalar);

        let (uri_repo, uri_path, uri_query) = match uri.as_deref() {
            Some(uri) => split_uri(uri),
            None => (None, None, String::new()),
        };

        Ok(Self {
            version,
            uri,
            uri_repo,
            uri_path,
            uri_query,
        })
    }
}

fn scalar(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}

/// Splits a go-getter style locator into repository, sub-path and query.
///
/// `github.com/org/repo.git//modules/vpc?ref=1.0.0` yields
/// `github.com/org/repo.git`, `modules/vpc` and `?ref=1.0.0`. The `://` of a
/// scheme is never taken for the sub-path separator.
fn split_uri(uri: &str) -> (Option<String>, Option<String>, String) {
    let search_from = uri.find("://").map(|i| i + 3).unwrap_or(0);

    let Some(separator) = uri[search_from..].find("//").map(|i| i + search_from) else {
        return (non_empty(uri), None, String::new());
    };

    let repo = &uri[..separator];
    let rest = &uri[separator + 2..];
    let (path, query) = match rest.find('?') {
        Some(i) => (&rest[..i], &rest[i..]),
        None => (rest, ""),
    };

    (non_empty(repo), non_empty(path), query.to_string())
}

fn non_empty(s: &str) -> Option<String> {
    let s = s.trim();
    (!s.is_empty()).then(|| s.to_string())
}

/// Strips a leading `v` so `v1.2.3` and `1.2.3` compare equal.
pub fn normalize_version(version: &str) -> &str {
    let version = version.trim();
    version.strip_prefix('v').unwrap_or(version)
}

/// Parsed view over a single component manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentDescriptor {
    infra_repo_dir: PathBuf,
    infra_terraform_dir: PathBuf,
    manifest_path: PathBuf,
    name: String,
    content: String,
    fields: SourceFields,
}

impl ComponentDescriptor {
    /// Reads and parses the manifest at `manifest_path`.
    ///
    /// `infra_terraform_dir` is the components root relative to
    /// `infra_repo_dir`; the component name is the manifest's directory
    /// relative to that root.
    pub fn parse(
        infra_repo_dir: &Path,
        infra_terraform_dir: &Path,
        manifest_path: &Path,
    ) -> Result<Self> {
        let content = fs::read_to_string(manifest_path).map_err(|source| Error::ManifestRead {
            path: manifest_path.to_path_buf(),
            source,
        })?;

        let fields = SourceFields::parse(manifest_path, &content)?;
        let components_root = infra_repo_dir.join(infra_terraform_dir);
        let name = component_name(&components_root, manifest_path);

        Ok(Self {
            infra_repo_dir: infra_repo_dir.to_path_buf(),
            infra_terraform_dir: infra_terraform_dir.to_path_buf(),
            manifest_path: manifest_path.to_path_buf(),
            name,
            content,
            fields,
        })
    }

    /// Component name, e.g. `eks/cluster`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Component name usable in branch names, e.g. `eks-cluster`.
    pub fn normalized_name(&self) -> String {
        self.name.replace('/', "-")
    }

    pub fn version(&self) -> Option<&str> {
        self.fields.version.as_deref()
    }

    pub fn uri(&self) -> Option<&str> {
        self.fields.uri.as_deref()
    }

    /// Repository locator part of the URI.
    pub fn uri_repo(&self) -> Option<&str> {
        self.fields.uri_repo.as_deref()
    }

    /// Sub-path within the repository, without any query string.
    pub fn uri_path(&self) -> Option<&str> {
        self.fields.uri_path.as_deref()
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn infra_repo_dir(&self) -> &Path {
        &self.infra_repo_dir
    }

    /// Components root relative to the repository root.
    pub fn infra_terraform_dir(&self) -> &Path {
        &self.infra_terraform_dir
    }

    pub fn manifest_path(&self) -> &Path {
        &self.manifest_path
    }

    pub fn component_dir(&self) -> &Path {
        self.manifest_path.parent().unwrap_or(&self.infra_repo_dir)
    }

    /// Manifest path relative to the repository root.
    pub fn relative_path(&self) -> PathBuf {
        self.manifest_path
            .strip_prefix(&self.infra_repo_dir)
            .map(Path::to_path_buf)
            .unwrap_or_else(|_| self.manifest_path.clone())
    }

    /// Component directory relative to the repository root.
    pub fn relative_dir(&self) -> PathBuf {
        self.relative_path()
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default()
    }

    /// True iff a non-empty version that parses as semver is declared.
    pub fn has_version(&self) -> bool {
        self.version()
            .map(|v| Version::parse(normalize_version(v)).is_ok())
            .unwrap_or(false)
    }

    /// True iff the URI splits into a non-empty repository and sub-path.
    pub fn has_valid_source(&self) -> bool {
        self.fields.uri_repo.is_some() && self.fields.uri_path.is_some()
    }

    /// True if `other` names the same version as this descriptor, ignoring a `v` prefix.
    pub fn is_at_version(&self, other: &str) -> bool {
        self.version()
            .map(|v| normalize_version(v) == normalize_version(other))
            .unwrap_or(false)
    }

    /// Returns a copy with `spec.source.version` rewritten to `new_version`.
    pub fn with_version(&self, new_version: &str) -> Result<Self> {
        self.with_source_field("version", new_version)
    }

    /// Returns a copy with `spec.source.uri` rewritten to `new_uri`.
    pub fn with_uri(&self, new_uri: &str) -> Result<Self> {
        self.with_source_field("uri", new_uri)
    }

    fn with_source_field(&self, field: &str, value: &str) -> Result<Self> {
        let content = manifest::replace_field(&self.content, SOURCE_BLOCK, field, value)
            .ok_or_else(|| Error::ManifestField {
                path: self.manifest_path.clone(),
                field: field.to_string(),
            })?;
        let fields = SourceFields::parse(&self.manifest_path, &content)?;

        Ok(Self {
            content,
            fields,
            ..self.clone()
        })
    }

    /// Points a monorepo-sourced component at its per-component repository.
    ///
    /// A no-op unless the declared version is at or above the migration
    /// threshold and the source is the legacy monorepo. Applying it to an
    /// already migrated descriptor changes nothing.
    pub fn migrate_legacy_location(&self, migration: &LegacyMigration) -> Result<Self> {
        let (Some(version), Some(repo), Some(path)) =
            (self.version(), self.uri_repo(), self.uri_path())
        else {
            return Ok(self.clone());
        };

        if !migration.applies_to_version(version) {
            return Ok(self.clone());
        }

        match migration.migrate_uri(repo, path, &self.fields.uri_query) {
            Some(new_uri) => self.with_uri(&new_uri),
            None => Ok(self.clone()),
        }
    }

    /// Returns the same descriptor located at the same relative path under
    /// another repository root. The content is carried over unchanged.
    pub fn rebased(&self, infra_repo_dir: &Path) -> Self {
        Self {
            infra_repo_dir: infra_repo_dir.to_path_buf(),
            manifest_path: infra_repo_dir.join(self.relative_path()),
            ..self.clone()
        }
    }

    /// Writes the content verbatim to `path`, or back to the manifest path.
    pub fn persist(&self, path: Option<&Path>) -> Result<()> {
        let path = path.unwrap_or(&self.manifest_path);
        fs::write(path, &self.content)?;
        Ok(())
    }
}

impl fmt::Display for ComponentDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "- name: {}", self.name)?;
        writeln!(f, "- version: {}", self.version().unwrap_or("<none>"))?;
        writeln!(f, "- uri: {}", self.uri().unwrap_or("<none>"))?;
        writeln!(f, "- manifest: {}", self.manifest_path.display())?;
        write!(f, "- content:\n{}", self.content)
    }
}

/// Name of the component whose manifest is at `manifest_path`: its directory
/// relative to `components_root`, with `/` separators.
pub fn component_name(components_root: &Path, manifest_path: &Path) -> String {
    let dir = manifest_path.parent().unwrap_or(manifest_path);
    let relative = dir.strip_prefix(components_root).unwrap_or(dir);

    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}
