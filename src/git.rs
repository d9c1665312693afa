//! Thin wrappers around the system `git` command.
//!
//! Using the system binary means authentication is handled the same way as
//! for the user's own git usage:
//! - SSH keys from ~/.ssh/
//! - Git credential helpers
//! - Personal access tokens
//! - Any authentication configured in ~/.gitconfig

use std::path::Path;
use std::process::{Command, Output};

use log::debug;

use crate::error::{Error, Result};

fn run(dir: &Path, args: &[&str]) -> Result<Output> {
    debug!("Executing: 'git {}' in {}", args.join(" "), dir.display());

    Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .map_err(|e| Error::ToolUnavailable {
            tool: "git".to_string(),
            message: e.to_string(),
        })
}

fn run_checked(dir: &Path, args: &[&str]) -> Result<String> {
    let output = run(dir, args)?;

    if !output.status.success() {
        return Err(Error::GitCommand {
            command: args.join(" "),
            dir: dir.to_path_buf(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// True if `dir` is the root of a git checkout.
pub fn is_repository(dir: &Path) -> bool {
    dir.join(".git").exists()
}

/// Lists all tags in the checkout, most recently created first.
///
/// Annotated tags sort by their tagger date, lightweight tags by the date of
/// the commit they point at.
pub fn list_tags(dir: &Path) -> Result<Vec<String>> {
    let stdout = run_checked(
        dir,
        &[
            "for-each-ref",
            "--sort=-creatordate",
            "--format=%(refname:short)",
            "refs/tags",
        ],
    )?;

    Ok(stdout
        .lines()
        .map(|line| line.trim().trim_matches('\'').to_string())
        .filter(|tag| !tag.is_empty())
        .collect())
}

/// Lists local and remote-tracking branch names, without remote prefixes.
pub fn list_branches(dir: &Path) -> Result<Vec<String>> {
    let stdout = run_checked(
        dir,
        &[
            "for-each-ref",
            "--format=%(refname)",
            "refs/heads",
            "refs/remotes",
        ],
    )?;

    let mut branches: Vec<String> = stdout
        .lines()
        .filter_map(|line| parse_branch_ref(line.trim()))
        .collect();
    branches.sort();
    branches.dedup();
    Ok(branches)
}

fn parse_branch_ref(full_ref: &str) -> Option<String> {
    if let Some(local) = full_ref.strip_prefix("refs/heads/") {
        return Some(local.to_string());
    }

    // refs/remotes/<remote>/<branch>
    let remote = full_ref.strip_prefix("refs/remotes/")?;
    let (_, branch) = remote.split_once('/')?;
    (branch != "HEAD").then(|| branch.to_string())
}

/// Creates `branch` in `work_tree`, commits exactly the given paths and
/// pushes the branch to `origin`.
pub fn create_branch_and_commit(
    work_tree: &Path,
    files_to_add: &[String],
    files_to_remove: &[String],
    branch: &str,
    message: &str,
) -> Result<()> {
    run_checked(work_tree, &["checkout", "-b", branch])?;

    if !files_to_add.is_empty() {
        let mut args = vec!["add", "--"];
        args.extend(files_to_add.iter().map(String::as_str));
        run_checked(work_tree, &args)?;
    }

    if !files_to_remove.is_empty() {
        let mut args = vec!["rm", "--cached", "--ignore-unmatch", "--quiet", "--"];
        args.extend(files_to_remove.iter().map(String::as_str));
        run_checked(work_tree, &args)?;
    }

    run_checked(work_tree, &["commit", "-m", message])?;
    run_checked(work_tree, &["push", "--set-upstream", "origin", branch])?;

    Ok(())
}

/// Removes `branch` from `origin`.
pub fn delete_branch(work_tree: &Path, branch: &str) -> Result<()> {
    run_checked(work_tree, &["push", "origin", "--delete", branch])?;
    Ok(())
}
