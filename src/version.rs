//! # Latest Version Resolution
//!
//! Finds the version a component should be updated to: the most recently
//! created tag of its upstream repository that is a valid semantic version.
//!
//! ## Process
//!
//! 1.  **Checkout Validation**: the fetched upstream directory must be a git
//!     checkout. A missing or broken checkout is reported as
//!     [`TagLookup::NotARepository`], distinct from a checkout without tags.
//!
//! 2.  **Tag Listing**: tags are listed in creation order, newest first.
//!
//! 3.  **Semantic Version Filtering**: tags that do not parse as semver
//!     (tolerating a leading `v`) are dropped.
//!
//! 4.  **Selection**: the first remaining tag wins. Recency of creation
//!     decides, not version ordering, so a patch release of an older line
//!     published last is what gets picked.

use std::path::Path;

use log::{debug, warn};
use semver::Version;

use crate::error::{Error, Result};
use crate::repository::GitOperations;

/// Outcome of looking up the latest version tag of a checkout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagLookup {
    /// The directory is not a version-control checkout.
    NotARepository,
    /// The checkout has no tag that is a valid semantic version.
    NoTag,
    /// The most recently created valid tag, verbatim.
    Latest(String),
}

/// Resolves latest version tags through a [`GitOperations`] implementation.
pub struct VersionResolver<'a> {
    git_ops: &'a dyn GitOperations,
}

impl<'a> VersionResolver<'a> {
    pub fn new(git_ops: &'a dyn GitOperations) -> Self {
        Self { git_ops }
    }

    /// Looks up the latest version tag of the checkout at `checkout`.
    ///
    /// Failing to list tags of a valid checkout is treated as having no tags;
    /// only an inability to run git at all is returned as an error.
    pub fn latest_tag(&self, checkout: &Path) -> Result<TagLookup> {
        if !self.git_ops.is_repository(checkout) {
            return Ok(TagLookup::NotARepository);
        }

        let tags = match self.git_ops.list_tags(checkout) {
            Ok(tags) => tags,
            Err(e @ Error::ToolUnavailable { .. }) => return Err(e),
            Err(e) => {
                warn!("Failed to list tags in {}: {}", checkout.display(), e);
                return Ok(TagLookup::NoTag);
            }
        };
        debug!("Found {} tags in {}", tags.len(), checkout.display());

        Ok(filter_semver_tags(&tags)
            .into_iter()
            .next()
            .map_or(TagLookup::NoTag, TagLookup::Latest))
    }
}

/// Filter git tags to semantic versions only, preserving their order
pub fn filter_semver_tags(tags: &[String]) -> Vec<String> {
    tags.iter()
        .filter(|tag| extract_semver_from_ref(tag).is_some())
        .cloned()
        .collect()
}

/// Extract semantic version from a git reference (tag or ref)
fn extract_semver_from_ref(ref_str: &str) -> Option<Version> {
    // Common patterns: v1.2.3, 1.2.3, refs/tags/v1.2.3, refs/tags/1.2.3
    let tag = ref_str.strip_prefix("refs/tags/").unwrap_or(ref_str);
    let tag = tag.strip_prefix('v').unwrap_or(tag);

    Version::parse(tag).ok()
}
