//! # Component Updater Library
//!
//! This library keeps the vendored components of an atmos infrastructure
//! repository in step with their upstream releases. It is designed to be used
//! by the `component-updater` command-line tool, but the engine only talks to
//! the outside world through traits and can be driven by other front ends.
//!
//! ## Quick Example
//!
//! ```
//! use component_updater::change_request::branch_name;
//! use component_updater::migration::LegacyMigration;
//! use component_updater::path::ComponentFilter;
//!
//! // Only process EKS components, except the cluster itself
//! let filter = ComponentFilter::new(&["eks/*".to_string()], &["eks/cluster".to_string()]).unwrap();
//! assert!(filter.should_process("eks/alb-controller"));
//! assert!(!filter.should_process("eks/cluster"));
//!
//! // Updates are published on deterministic branches
//! assert_eq!(branch_name("eks-alb-controller", "1.2.0"), "component-update/eks-alb-controller/1.2.0");
//!
//! // Monorepo sources move to per-component repositories from 1.532.0 on
//! let migration = LegacyMigration::default();
//! assert!(migration.applies_to_version("1.532.0"));
//! ```
//!
//! ## Core Concepts
//!
//! - **Component descriptor (`component`, `manifest`, `migration`)**: a parsed
//!   `component.yaml`, rewritten field by field without disturbing the rest.
//! - **Version resolution (`version`)**: the newest semver tag of the upstream
//!   repository, by creation date.
//! - **Snapshots (`snapshot`)**: disposable repository copies with the
//!   component vendored at a given version.
//! - **Change sets (`changeset`)**: the file-level comparison that decides
//!   whether an update is needed and what to commit.
//! - **Update engine (`updater`)**: the per-component decision sequence and
//!   its terminal states.
//! - **Collaborators (`repository`, `git`, `tools`, `change_request`,
//!   `github`)**: git, the fetch and vendoring tools, and the pull request
//!   host, each behind a trait.

pub mod change_request;
pub mod changeset;
pub mod component;
pub mod config;
pub mod defaults;
pub mod error;
pub mod filesystem;
pub mod git;
pub mod github;
pub mod manifest;
pub mod migration;
pub mod path;
pub mod report;
pub mod repository;
pub mod snapshot;
pub mod tools;
pub mod updater;
pub mod version;

#[cfg(test)]
mod component_proptest;
