//! # Error Handling
//!
//! This module defines the centralized error type for the `component-updater`
//! library. It uses `thiserror` to derive a single `Error` enum covering every
//! failure the update run can encounter.
//!
//! Errors fall into two groups:
//!
//! - **Per-component failures** such as [`Error::VendoringFailed`] or
//!   [`Error::ManifestField`]. The update engine catches these and records
//!   them as an outcome state for the component in question; they never
//!   cross component boundaries.
//! - **Run-fatal failures** such as [`Error::ComponentsRoot`] or
//!   [`Error::ToolUnavailable`]. These abort the whole run.
//!
//! [`Error::is_component_scoped`] tells the two groups apart.

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for component-updater operations
#[derive(Error, Debug)]
pub enum Error {
    /// A component manifest could not be read from disk.
    #[error("Failed to read manifest {path}: {source}")]
    ManifestRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A component manifest is not valid YAML.
    #[error("Failed to parse manifest {path}: {message}")]
    ManifestParse { path: PathBuf, message: String },

    /// A manifest field could not be rewritten in place, either because it is
    /// missing or because it is not written as a block-style mapping entry.
    #[error("Cannot rewrite '{field}' under 'spec.source' in manifest {path}")]
    ManifestField { path: PathBuf, field: String },

    /// A configured components root could not be enumerated.
    #[error("Could not get components from '{path}': {message}")]
    ComponentsRoot { path: PathBuf, message: String },

    /// The vendoring tool ran but reported a failure for one component.
    #[error("Failed to vendor component '{component}' (exit code {code:?}): {}", diagnostic(.stdout, .stderr))]
    VendoringFailed {
        component: String,
        code: Option<i32>,
        stdout: String,
        stderr: String,
    },

    /// An external tool could not be launched at all.
    #[error("Tool '{tool}' is unavailable: {message}")]
    ToolUnavailable { tool: String, message: String },

    /// An external tool ran but failed outside of vendoring.
    #[error("Tool '{tool}' failed: {message}")]
    ToolExecution { tool: String, message: String },

    /// A git command failed.
    #[error("Git command failed in {dir}: {command} - {stderr}")]
    GitCommand {
        command: String,
        dir: PathBuf,
        stderr: String,
    },

    /// A GitHub API request failed.
    #[error("GitHub API error: {message}")]
    GitHub { message: String },

    /// A pull request template could not be rendered.
    #[error("Template rendering error for {template}: {message}")]
    Template { template: String, message: String },

    /// Invalid configuration.
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// An I/O error, wrapped from `std::io::Error`.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A YAML error, wrapped from `serde_yaml::Error`.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A JSON error, wrapped from `serde_json::Error`.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A glob pattern error, wrapped from `glob::PatternError`.
    #[error("Glob pattern error: {0}")]
    Glob(#[from] glob::PatternError),

    /// A semantic versioning parsing error, wrapped from `semver::Error`.
    #[error("Semver parsing error: {0}")]
    Semver(#[from] semver::Error),

    /// A directory traversal error, wrapped from `walkdir::Error`.
    #[error("Directory walk error: {0}")]
    Walk(#[from] walkdir::Error),

    /// An HTTP transport error, wrapped from `reqwest::Error`.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// A URL parsing error, wrapped from `url::ParseError`.
    #[error("URL parsing error: {0}")]
    UrlParse(#[from] url::ParseError),
}

impl Error {
    /// Returns true for failures that only affect the component being processed.
    pub fn is_component_scoped(&self) -> bool {
        matches!(
            self,
            Error::VendoringFailed { .. } | Error::ManifestField { .. }
        )
    }
}

fn diagnostic(stdout: &str, stderr: &str) -> String {
    // atmos reports some failures on stdout only
    let stderr = stderr.trim();
    if stderr.is_empty() {
        stdout.trim().to_string()
    } else {
        stderr.to_string()
    }
}

/// A convenient type alias for `Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;
