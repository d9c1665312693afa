//! Path and name matching utilities for component-updater

use crate::error::{Error, Result};
use glob::Pattern;

/// Include/exclude selection over component names
///
/// Patterns are shell-style globs. `*` also matches `/`, so `eks/*` and
/// `*cluster*` both select `eks/cluster`.
#[derive(Debug, Clone, Default)]
pub struct ComponentFilter {
    include: Vec<Pattern>,
    exclude: Vec<Pattern>,
}

impl ComponentFilter {
    /// Compiles the include and exclude pattern lists.
    pub fn new(include: &[String], exclude: &[String]) -> Result<Self> {
        let compile = |patterns: &[String]| -> Result<Vec<Pattern>> {
            patterns
                .iter()
                .map(|p| Pattern::new(p).map_err(Error::Glob))
                .collect()
        };

        Ok(Self {
            include: compile(include)?,
            exclude: compile(exclude)?,
        })
    }

    /// Returns true if the component should be processed.
    ///
    /// With no patterns at all every component is selected. Otherwise a name
    /// must match at least one include pattern and no exclude pattern.
    pub fn should_process(&self, component_name: &str) -> bool {
        if self.include.is_empty() && self.exclude.is_empty() {
            return true;
        }

        let included = self.include.iter().any(|p| p.matches(component_name));
        let excluded = self.exclude.iter().any(|p| p.matches(component_name));

        included && !excluded
    }
}

/// Encode a repository locator to be filesystem-safe
///
/// This converts URL characters that are problematic for filesystems
/// into safe alternatives.
pub fn encode_url_path(url: &str) -> String {
    url.chars()
        .map(|c| match c {
            '/' => '-',
            '\\' => '-',
            ':' => '_',
            '*' => '_',
            '?' => '_',
            '"' => '_',
            '<' => '_',
            '>' => '_',
            '|' => '_',
            // Keep alphanumeric, dots, dashes, underscores as-is
            c if c.is_alphanumeric() || c == '.' || c == '-' || c == '_' => c,
            _ => '_',
        })
        .collect()
}
