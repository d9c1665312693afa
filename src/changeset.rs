//! # Change-Set Computation
//!
//! Decides whether vendoring a new version actually changes a component, by
//! comparing two snapshots file by file:
//!
//! - the **baseline**: the repository with the component re-vendored at its
//!   current version
//! - the **candidate**: the repository with the component vendored at the new
//!   version
//!
//! A third tree, the **reference**, is the untouched repository. It tells a
//! file that was removed upstream apart from one that was never vendored, and
//! it decides which candidate files differ from what is committed today.
//!
//! The manifest itself never decides an update. Documentation files
//! (`*.md`) are published along with everything else but never force an
//! update on their own.

use std::collections::BTreeSet;
use std::path::{Component, Path};

use log::{debug, info};

use crate::defaults::{COMPONENT_YAML, MAX_NUMBER_OF_DIFFS_TO_SHOW, README_EXTENSION};
use crate::error::Result;
use crate::filesystem::{file_digest, list_files};
use crate::tools::render_diff;

/// How a file differs between the baseline and the candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Added,
    Changed,
    Unchanged,
    Removed,
}

/// One compared file, relative to the repository root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeRecord {
    pub path: String,
    pub kind: ChangeKind,
}

/// Result of comparing two snapshots.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    pub needs_update: bool,
    pub records: Vec<ChangeRecord>,
    pub files_to_publish: Vec<String>,
    pub files_to_remove: Vec<String>,
}

/// Locations being compared.
#[derive(Debug, Clone, Copy)]
pub struct ComparisonScope<'a> {
    pub baseline_root: &'a Path,
    pub candidate_root: &'a Path,
    pub reference_root: &'a Path,
    /// Component directory relative to each root.
    pub component_dir: &'a Path,
    /// Manifest path relative to each root.
    pub manifest_path: &'a Path,
}

/// Which files are excluded from the decision, and how much is logged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExcludePolicy {
    pub manifest_name: String,
    pub documentation_extension: String,
    pub max_diffs_to_show: usize,
}

impl Default for ExcludePolicy {
    fn default() -> Self {
        Self {
            manifest_name: COMPONENT_YAML.to_string(),
            documentation_extension: README_EXTENSION.to_string(),
            max_diffs_to_show: MAX_NUMBER_OF_DIFFS_TO_SHOW,
        }
    }
}

impl ExcludePolicy {
    pub fn with_max_diffs(max_diffs_to_show: usize) -> Self {
        Self {
            max_diffs_to_show,
            ..Self::default()
        }
    }

    fn is_manifest(&self, path: &Path) -> bool {
        path.file_name()
            .is_some_and(|name| name == self.manifest_name.as_str())
    }

    fn is_documentation(&self, path: &str) -> bool {
        path.ends_with(&self.documentation_extension)
    }
}

/// Compares the candidate snapshot against the baseline.
pub fn compare(scope: &ComparisonScope<'_>, policy: &ExcludePolicy) -> Result<ChangeSet> {
    let mut changes = ChangeSet::default();
    let mut published = BTreeSet::new();
    let mut diffs_shown = 0;

    let candidate_dir = scope.candidate_root.join(scope.component_dir);
    for file in list_files(&candidate_dir)? {
        if policy.is_manifest(&file) {
            continue;
        }
        let Some(relative) = relative_to(&file, scope.candidate_root) else {
            continue;
        };

        let baseline_file = scope.baseline_root.join(&relative);
        let digest = file_digest(&file)?;
        let kind = if !baseline_file.is_file() {
            info!("New file: {}", relative);
            ChangeKind::Added
        } else if file_digest(&baseline_file)? != digest {
            info!("File changed: {}", relative);
            if diffs_shown < policy.max_diffs_to_show {
                if let Some(diff) = render_diff(&baseline_file, &file) {
                    info!("diff: {}", diff);
                }
                diffs_shown += 1;
            }
            ChangeKind::Changed
        } else {
            ChangeKind::Unchanged
        };

        if kind != ChangeKind::Unchanged && !policy.is_documentation(&relative) {
            changes.needs_update = true;
        }

        let reference_file = scope.reference_root.join(&relative);
        let differs_from_reference =
            !reference_file.is_file() || file_digest(&reference_file)? != digest;
        if (kind != ChangeKind::Unchanged || differs_from_reference)
            && published.insert(relative.clone())
        {
            changes.files_to_publish.push(relative.clone());
        }

        changes.records.push(ChangeRecord {
            path: relative,
            kind,
        });
    }

    let baseline_dir = scope.baseline_root.join(scope.component_dir);
    for file in list_files(&baseline_dir)? {
        let Some(relative) = relative_to(&file, scope.baseline_root) else {
            continue;
        };

        if scope.reference_root.join(&relative).is_file()
            && !scope.candidate_root.join(&relative).is_file()
        {
            info!("Remove file: {}", relative);
            if !policy.is_documentation(&relative) {
                changes.needs_update = true;
            }
            changes.files_to_remove.push(relative.clone());
            changes.records.push(ChangeRecord {
                path: relative,
                kind: ChangeKind::Removed,
            });
        }
    }

    if changes.needs_update {
        if let Some(manifest) = path_string(scope.manifest_path) {
            debug!("Component manifest {} needs to be updated", manifest);
            if published.insert(manifest.clone()) {
                changes.files_to_publish.push(manifest);
            }
        }
    }

    Ok(changes)
}

fn relative_to(path: &Path, root: &Path) -> Option<String> {
    path.strip_prefix(root).ok().and_then(path_string)
}

/// Joins normal path components with `/`, the separator git expects.
fn path_string(path: &Path) -> Option<String> {
    let parts: Vec<_> = path
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();
    (!parts.is_empty()).then(|| parts.join("/"))
}
