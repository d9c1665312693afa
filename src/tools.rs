//! # External Tools
//!
//! The update engine never shells out directly. It talks to two capabilities
//! defined here as traits, so that tests can substitute doubles that copy
//! fixture trees instead of running the real binaries:
//!
//! - **`VendoringTool`** materializes one component's files from the pinned
//!   source declared in its manifest. The default implementation runs
//!   `atmos vendor pull -c <component>`.
//! - **`RepoFetcher`** downloads a whole upstream repository so its tags can
//!   be inspected. The default implementation runs `go-getter`.
//!
//! The components base path that `atmos` needs is passed to the child process
//! explicitly and never through the updater's own environment.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use log::{debug, info};

use crate::error::{Error, Result};

/// Environment variable `atmos` reads the components base path from.
const ATMOS_BASE_PATH_ENV: &str = "ATMOS_COMPONENTS_TERRAFORM_BASE_PATH";

/// Materializes a component's files from its manifest.
pub trait VendoringTool: Send + Sync {
    /// Vendors `component_name` inside `repo_root`.
    ///
    /// `components_base_path` is the components root relative to `repo_root`.
    /// A tool-reported failure is returned as [`Error::VendoringFailed`]; an
    /// inability to run the tool at all as [`Error::ToolUnavailable`].
    fn vendor(
        &self,
        repo_root: &Path,
        components_base_path: &Path,
        component_name: &str,
    ) -> Result<()>;
}

/// Downloads an upstream repository.
pub trait RepoFetcher: Send + Sync {
    /// Materializes a full copy of `uri_repo` at `destination`.
    fn fetch(&self, uri_repo: &str, destination: &Path) -> Result<()>;
}

fn spawn(tool: &str, command: &mut Command) -> Result<Output> {
    command.output().map_err(|e| Error::ToolUnavailable {
        tool: tool.to_string(),
        message: if e.kind() == ErrorKind::NotFound {
            format!("'{tool}' was not found in PATH")
        } else {
            e.to_string()
        },
    })
}

/// Vendors components with `atmos vendor pull`.
#[derive(Debug, Clone)]
pub struct AtmosVendoringTool {
    binary: PathBuf,
}

impl Default for AtmosVendoringTool {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("atmos"),
        }
    }
}

impl AtmosVendoringTool {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

impl VendoringTool for AtmosVendoringTool {
    fn vendor(
        &self,
        repo_root: &Path,
        components_base_path: &Path,
        component_name: &str,
    ) -> Result<()> {
        info!(
            "Executing 'atmos vendor pull -c {}' in {}",
            component_name,
            repo_root.display()
        );

        let output = spawn(
            "atmos",
            Command::new(&self.binary)
                .args(["vendor", "pull", "-c", component_name])
                .env(ATMOS_BASE_PATH_ENV, components_base_path)
                .current_dir(repo_root),
        )?;

        if !output.status.success() {
            return Err(Error::VendoringFailed {
                component: component_name.to_string(),
                code: output.status.code(),
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }

        info!("Successfully vendored component: {}", component_name);
        Ok(())
    }
}

/// Fetches repositories with `go-getter`.
#[derive(Debug, Clone)]
pub struct GoGetterFetcher {
    binary: PathBuf,
}

impl GoGetterFetcher {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

impl RepoFetcher for GoGetterFetcher {
    fn fetch(&self, uri_repo: &str, destination: &Path) -> Result<()> {
        debug!(
            "Executing: '{} {} {}'",
            self.binary.display(),
            uri_repo,
            destination.display()
        );

        let output = spawn(
            "go-getter",
            Command::new(&self.binary).arg(uri_repo).arg(destination),
        )?;

        if !output.status.success() {
            return Err(Error::ToolExecution {
                tool: "go-getter".to_string(),
                message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        debug!("Pulled whole component repo successfully: {}", uri_repo);
        Ok(())
    }
}

/// Renders a unified diff of two files for the log.
///
/// Returns `None` when `diff` is unavailable or produced no output; the
/// caller only uses the result for diagnostics.
pub fn render_diff(before: &Path, after: &Path) -> Option<String> {
    let output = Command::new("diff")
        .arg("-u")
        .arg(before)
        .arg(after)
        .output()
        .map_err(|e| debug!("Could not run diff: {}", e))
        .ok()?;

    let rendered = String::from_utf8_lossy(&output.stdout).trim().to_string();
    (!rendered.is_empty()).then_some(rendered)
}
