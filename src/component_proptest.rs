//! Property-based tests for manifest rewriting and location migration.
//!
//! These tests use proptest to generate random inputs and verify that
//! invariants hold for all possible inputs.

#[cfg(test)]
mod proptest_tests {
    use crate::component::ComponentDescriptor;
    use crate::defaults::{COMPONENT_YAML, TERRAFORM_COMPONENTS_DIR};
    use crate::manifest::replace_field;
    use crate::migration::LegacyMigration;
    use crate::path::{encode_url_path, ComponentFilter};
    use proptest::prelude::*;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    fn manifest(uri: &str, version: &str) -> String {
        format!(
            "apiVersion: atmos/v1\nkind: ComponentVendorConfig\nspec:\n  source:\n    uri: {uri}\n    version: {version}\n  mixins:\n    - uri: https://example.com/context.tf\n      version: 0.25.0\n"
        )
    }

    fn descriptor(repo: &TempDir, name: &str, content: &str) -> ComponentDescriptor {
        let dir = repo.path().join(TERRAFORM_COMPONENTS_DIR).join(name);
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join(COMPONENT_YAML);
        fs::write(&path, content).unwrap();
        ComponentDescriptor::parse(repo.path(), Path::new(TERRAFORM_COMPONENTS_DIR), &path).unwrap()
    }

    fn version() -> impl Strategy<Value = String> {
        (0u64..3, 0u64..2000, 0u64..20).prop_map(|(ma, mi, pa)| format!("{ma}.{mi}.{pa}"))
    }

    fn module() -> impl Strategy<Value = String> {
        "[a-z]{2,8}(/[a-z]{2,8})?"
    }

    // ============================================================================
    // ComponentDescriptor property tests
    // ============================================================================

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        /// Property: migrating twice gives the same descriptor as migrating once
        #[test]
        fn migration_is_idempotent(module in module(), version in version()) {
            let repo = TempDir::new().unwrap();
            let uri = format!(
                "github.com/cloudposse/terraform-aws-components.git//modules/{module}?ref={{{{.Version}}}}"
            );
            let component = descriptor(&repo, "c", &manifest(&uri, &version));
            let migration = LegacyMigration::default();

            let once = component.migrate_legacy_location(&migration).unwrap();
            let twice = once.migrate_legacy_location(&migration).unwrap();
            prop_assert_eq!(&once, &twice);
            prop_assert_eq!(once.version(), Some(version.as_str()));
        }

        /// Property: rewriting the version and back restores the original content
        #[test]
        fn version_rewrite_round_trips(old in version(), new in version()) {
            let repo = TempDir::new().unwrap();
            let component = descriptor(
                &repo,
                "vpc",
                &manifest("github.com/org/repo.git//modules/vpc", &old),
            );

            let updated = component.with_version(&new).unwrap();
            prop_assert_eq!(updated.version(), Some(new.as_str()));
            prop_assert!(updated.content().contains("      version: 0.25.0"));

            let restored = updated.with_version(&old).unwrap();
            prop_assert_eq!(restored.content(), component.content());
        }

        /// Property: replace_field only changes the line holding the field
        #[test]
        fn replace_field_changes_one_line(value in "[a-z0-9.]{1,12}") {
            let content = manifest("github.com/org/repo.git//src", "1.0.0");
            let replaced = replace_field(&content, &["spec", "source"], "version", &value).unwrap();

            let changed = content
                .lines()
                .zip(replaced.lines())
                .filter(|(a, b)| a != b)
                .count();
            prop_assert!(changed <= 1);
            prop_assert_eq!(content.lines().count(), replaced.lines().count());
        }
    }

    // ============================================================================
    // encode_url_path and ComponentFilter property tests
    // ============================================================================

    proptest! {
        /// Property: encode_url_path never produces filesystem-unsafe characters
        #[test]
        fn encode_url_path_never_produces_unsafe_chars(input in ".*") {
            let result = encode_url_path(&input);
            let unsafe_chars = ['/', '\\', ':', '*', '?', '"', '<', '>', '|'];
            for ch in unsafe_chars {
                prop_assert!(
                    !result.contains(ch),
                    "encode_url_path produced unsafe character '{}' from input '{}'",
                    ch,
                    input
                );
            }
        }

        /// Property: without patterns every component is processed
        #[test]
        fn empty_filter_selects_everything(name in "[a-z/_-]{1,30}") {
            let filter = ComponentFilter::new(&[], &[]).unwrap();
            prop_assert!(filter.should_process(&name));
        }

        /// Property: an exclude always wins over an include
        #[test]
        fn exclude_wins_over_include(name in "[a-z]{1,10}/[a-z]{1,10}") {
            let filter = ComponentFilter::new(&["*".to_string()], &[name.clone()]).unwrap();
            prop_assert!(!filter.should_process(&name));
        }
    }
}
