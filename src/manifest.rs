//! # Structural Manifest Editing
//!
//! Component manifests are hand-maintained YAML files with comments, quoting
//! and key ordering that must survive an automated version bump. Round-tripping
//! them through a YAML serializer would lose all of that, so edits are done as
//! text transforms over the exact line that holds a field.
//!
//! The field is located structurally: the block for a key path such as
//! `spec` → `source` is found by indentation, and only *direct* children of
//! that block are considered. A `version:` key that lives inside a sibling
//! block (for example an item of `spec.mixins`) can therefore never be hit.

/// Byte span of a scalar field's value within a manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSpan {
    /// Byte offset of the first character of the value (after `key: `).
    pub start: usize,
    /// Byte offset one past the last character of the value, excluding any
    /// trailing comment, whitespace or line terminator.
    pub end: usize,
    /// Quote character wrapping the value, if any.
    pub quote: Option<char>,
}

struct Line<'a> {
    offset: usize,
    text: &'a str,
}

impl Line<'_> {
    fn indent(&self) -> usize {
        self.text.len() - self.text.trim_start_matches(' ').len()
    }

    /// Blank lines and comments do not delimit blocks.
    fn is_structural(&self) -> bool {
        let trimmed = self.text.trim();
        !trimmed.is_empty() && !trimmed.starts_with('#')
    }

    /// Matches `key:`, `"key":` and `'key':`.
    fn key_matches(&self, key: &str) -> bool {
        let trimmed = self.text.trim_start();
        let rest = ['"', '\''].into_iter().find_map(|q| {
            trimmed
                .strip_prefix(q)
                .and_then(|t| t.strip_prefix(key))
                .and_then(|t| t.strip_prefix(q))
        });
        match rest.or_else(|| trimmed.strip_prefix(key)) {
            Some(rest) => {
                let mut chars = rest.chars();
                chars.next() == Some(':') && chars.next().is_none_or(char::is_whitespace)
            }
            None => false,
        }
    }
}

fn split_lines(content: &str) -> Vec<Line<'_>> {
    let mut offset = 0;
    content
        .split_inclusive('\n')
        .map(|raw| {
            let line = Line {
                offset,
                text: raw.trim_end_matches(['\n', '\r']),
            };
            offset += raw.len();
            line
        })
        .collect()
}

/// Index range of the direct children of the block opened by `lines[header]`.
fn block_body(lines: &[Line<'_>], header: usize) -> std::ops::Range<usize> {
    let header_indent = lines[header].indent();
    let end = lines[header + 1..]
        .iter()
        .position(|line| line.is_structural() && line.indent() <= header_indent)
        .map(|pos| header + 1 + pos)
        .unwrap_or(lines.len());
    header + 1..end
}

/// Finds the line index of `key` among the direct children of `range`.
fn find_child(lines: &[Line<'_>], range: std::ops::Range<usize>, key: &str) -> Option<usize> {
    let child_indent = lines[range.clone()]
        .iter()
        .find(|line| line.is_structural())
        .map(Line::indent)?;

    range
        .into_iter()
        .find(|&i| lines[i].indent() == child_indent && lines[i].key_matches(key))
}

/// Locates the value of `field` directly under the block addressed by `path`.
///
/// Returns `None` when any block along the path, or the field itself, is
/// missing.
pub fn locate_field(content: &str, path: &[&str], field: &str) -> Option<FieldSpan> {
    let lines = split_lines(content);
    let mut range = 0..lines.len();

    for key in path {
        let header = find_child(&lines, range, key)?;
        range = block_body(&lines, header);
    }

    let index = find_child(&lines, range, field)?;
    let line = &lines[index];

    let colon = line.text.find(':')?;
    let after_colon = &line.text[colon + 1..];
    let value_offset = colon + 1 + (after_colon.len() - after_colon.trim_start().len());
    let raw_value = &line.text[value_offset..];

    let (value_len, quote) = match raw_value.chars().next() {
        Some(q @ ('"' | '\'')) => {
            let closing = raw_value[1..].find(q).map(|i| i + 2).unwrap_or(raw_value.len());
            (closing, Some(q))
        }
        _ => {
            let without_comment = match raw_value.find(" #") {
                Some(i) => &raw_value[..i],
                None => raw_value,
            };
            (without_comment.trim_end().len(), None)
        }
    };

    Some(FieldSpan {
        start: line.offset + value_offset,
        end: line.offset + value_offset + value_len,
        quote,
    })
}

/// Replaces the value of `field` under `path`, keeping indentation, quoting
/// and trailing comments intact.
///
/// Returns `None` if the field could not be located.
pub fn replace_field(content: &str, path: &[&str], field: &str, value: &str) -> Option<String> {
    let span = locate_field(content, path, field)?;

    let mut replacement = match span.quote {
        Some(q) => format!("{q}{value}{q}"),
        None => value.to_string(),
    };
    if content[..span.start].ends_with(':') {
        replacement.insert(0, ' ');
    }

    let mut updated = String::with_capacity(content.len() + replacement.len());
    updated.push_str(&content[..span.start]);
    updated.push_str(&replacement);
    updated.push_str(&content[span.end..]);
    Some(updated)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SOURCE_PATH: &[&str] = &["spec", "source"];

    const MANIFEST: &str = r#"apiVersion: atmos/v1
kind: ComponentVendorConfig
metadata:
  name: vpc
spec:
  source:
    # pinned release
    uri: github.com/cloudposse/terraform-aws-components.git//modules/vpc?ref={{.Version}}
    version: 1.107.0
    included_paths:
      - "**/*.tf"
  mixins:
    - uri: https://raw.githubusercontent.com/cloudposse/terraform-null-label/0.25.0/exports/context.tf
      version: 0.25.0
      filename: context.tf
"#;

    #[test]
    fn test_replace_source_version_only() {
        let updated = replace_field(MANIFEST, SOURCE_PATH, "version", "2.0.0").unwrap();
        assert!(updated.contains("    version: 2.0.0\n"));
        assert!(updated.contains("      version: 0.25.0\n"));
        assert_eq!(updated.len(), MANIFEST.len());
    }

    #[test]
    fn test_mixins_before_source_are_ignored() {
        let manifest = r#"spec:
  mixins:
    - uri: https://example.com/context.tf
      version: 0.25.0
  source:
    uri: github.com/org/repo.git//modules/vpc
    version: 1.0.0
"#;
        let updated = replace_field(manifest, SOURCE_PATH, "version", "1.1.0").unwrap();
        assert!(updated.contains("      version: 0.25.0\n"));
        assert!(updated.contains("    version: 1.1.0\n"));
    }

    #[test]
    fn test_preserves_quotes_and_comments() {
        let manifest = "spec:\n  source:\n    version: \"1.0.0\" # keep me\n";
        let updated = replace_field(manifest, SOURCE_PATH, "version", "1.2.0").unwrap();
        assert_eq!(updated, "spec:\n  source:\n    version: \"1.2.0\" # keep me\n");

        let manifest = "spec:\n  source:\n    version: 1.0.0   # keep me\n";
        let updated = replace_field(manifest, SOURCE_PATH, "version", "1.2.0").unwrap();
        assert_eq!(updated, "spec:\n  source:\n    version: 1.2.0   # keep me\n");
    }

    #[test]
    fn test_empty_value_is_replaced() {
        let manifest = "spec:\n  source:\n    version:\n    uri: a//b\n";
        let updated = replace_field(manifest, SOURCE_PATH, "version", "1.0.0").unwrap();
        assert_eq!(updated, "spec:\n  source:\n    version: 1.0.0\n    uri: a//b\n");
    }

    #[test]
    fn test_crlf_line_endings() {
        let manifest = "spec:\r\n  source:\r\n    version: 1.0.0\r\n";
        let updated = replace_field(manifest, SOURCE_PATH, "version", "3.0.0").unwrap();
        assert_eq!(updated, "spec:\r\n  source:\r\n    version: 3.0.0\r\n");
    }

    #[test]
    fn test_missing_block_or_field() {
        assert!(locate_field("spec:\n  mixins: []\n", SOURCE_PATH, "version").is_none());
        assert!(locate_field("spec:\n  source:\n    uri: a//b\n", SOURCE_PATH, "version").is_none());
        assert!(locate_field("", SOURCE_PATH, "version").is_none());
    }

    #[test]
    fn test_quoted_keys() {
        let manifest = "\"spec\":\n  'source':\n    \"version\": \"1.0.0\"\n";
        let updated = replace_field(manifest, SOURCE_PATH, "version", "2.0.0").unwrap();
        assert_eq!(updated, "\"spec\":\n  'source':\n    \"version\": \"2.0.0\"\n");
    }

    #[test]
    fn test_flow_mapping_is_not_addressable() {
        let manifest = "spec:\n  source: {uri: 'a//b', version: 1.0.0}\n";
        assert!(locate_field(manifest, SOURCE_PATH, "version").is_none());
        assert!(replace_field(manifest, SOURCE_PATH, "version", "2.0.0").is_none());
    }

    #[test]
    fn test_similarly_prefixed_keys_do_not_match() {
        let manifest = "spec:\n  source:\n    version_constraint: ~> 1.0\n    version: 1.0.0\n";
        let span = locate_field(manifest, SOURCE_PATH, "version").unwrap();
        assert_eq!(&manifest[span.start..span.end], "1.0.0");
    }
}
