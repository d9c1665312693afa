//! Disposable copies of the infrastructure repository with one component
//! vendored at a given version.

use std::fs;
use std::path::Path;

use log::debug;
use tempfile::TempDir;

use crate::component::ComponentDescriptor;
use crate::defaults::COMPONENT_YAML;
use crate::error::Result;
use crate::filesystem;
use crate::tools::VendoringTool;

/// A private copy of the repository tree. Removed when dropped.
#[derive(Debug)]
pub struct Snapshot {
    dir: TempDir,
    component: ComponentDescriptor,
    was_vendored: bool,
}

impl Snapshot {
    /// Root of the copied repository.
    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// The component as written into this copy.
    pub fn component(&self) -> &ComponentDescriptor {
        &self.component
    }

    /// True if the component directory held more than its manifest before
    /// vendoring ran.
    pub fn was_vendored(&self) -> bool {
        self.was_vendored
    }
}

/// True if `component` has been vendored in its own tree.
pub fn is_vendored(component: &ComponentDescriptor) -> Result<bool> {
    filesystem::has_files_besides(component.component_dir(), COMPONENT_YAML)
}

/// Deletes everything the vendoring tool would produce, leaving the manifest.
fn clear_vendored_files(component_dir: &Path) -> Result<()> {
    for file in filesystem::list_files(component_dir)? {
        if file.file_name().is_some_and(|name| name == COMPONENT_YAML) {
            continue;
        }
        fs::remove_file(&file)?;
    }
    Ok(())
}

/// Builds snapshots by copying and re-vendoring.
pub struct SnapshotBuilder<'a> {
    vendoring: &'a dyn VendoringTool,
}

impl<'a> SnapshotBuilder<'a> {
    pub fn new(vendoring: &'a dyn VendoringTool) -> Self {
        Self { vendoring }
    }

    /// Copies `component`'s repository, pins the copy's manifest to `version`
    /// and vendors the component inside the copy.
    ///
    /// Previously vendored files are deleted from the copy first, so the
    /// component directory ends up holding exactly what `version` provides.
    ///
    /// The source tree is never modified. Vendoring failures are returned
    /// unchanged, so the caller can tell a per-component failure from a tool
    /// that cannot run.
    pub fn materialize(&self, component: &ComponentDescriptor, version: &str) -> Result<Snapshot> {
        let dir = TempDir::new()?;
        filesystem::copy_tree(component.infra_repo_dir(), dir.path())?;

        let component = component.rebased(dir.path()).with_version(version)?;
        let was_vendored = is_vendored(&component)?;
        clear_vendored_files(component.component_dir())?;
        component.persist(None)?;

        debug!(
            "Vendoring '{}' at {} in {}",
            component.name(),
            version,
            dir.path().display()
        );
        self.vendoring.vendor(
            dir.path(),
            component.infra_terraform_dir(),
            component.name(),
        )?;

        Ok(Snapshot {
            dir,
            component,
            was_vendored,
        })
    }
}
