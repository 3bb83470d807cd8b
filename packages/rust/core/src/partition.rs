//! Group partitioner: buckets atomic entries by `(read, base, watch)`.

use std::collections::HashMap;

use tracing::trace;

use recipeloader_shared::{AtomicEntry, Group, GroupSignature};

/// Partition `entries` into groups, resolving unset attributes first
/// (`read` and `watch` default to true, `base` to `default_base`).
///
/// Group order is the order in which each signature is first seen; within a
/// group, patterns keep their original order and duplicates are kept.
pub fn partition(entries: &[AtomicEntry], default_base: &str) -> Vec<Group> {
    let mut index: HashMap<GroupSignature, usize> = HashMap::new();
    let mut groups: Vec<Group> = Vec::new();

    for entry in entries {
        let signature = GroupSignature {
            read: entry.read.unwrap_or(true),
            base: entry
                .base
                .clone()
                .unwrap_or_else(|| default_base.to_string()),
            watch: entry.watch.unwrap_or(true),
        };

        let slot = *index.entry(signature.clone()).or_insert_with(|| {
            groups.push(Group {
                patterns: Vec::new(),
                read: signature.read,
                watch: signature.watch,
                base: signature.base.clone(),
            });
            groups.len() - 1
        });
        groups[slot].patterns.push(entry.pattern.clone());
    }

    trace!(
        entries = entries.len(),
        groups = groups.len(),
        "entries partitioned"
    );
    groups
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(pattern: &str, base: Option<&str>, watch: Option<bool>) -> AtomicEntry {
        AtomicEntry {
            pattern: pattern.into(),
            base: base.map(String::from),
            watch,
            ..AtomicEntry::default()
        }
    }

    #[test]
    fn defaults_are_applied() {
        let groups = partition(&[AtomicEntry::new("app/*.js")], "app/");
        assert_eq!(
            groups,
            vec![Group {
                patterns: vec!["app/*.js".into()],
                read: true,
                watch: true,
                base: "app/".into(),
            }]
        );
    }

    #[test]
    fn first_seen_group_order() {
        // signatures X Y X Z
        let groups = partition(
            &[
                entry("x1", Some("x/"), None),
                entry("y1", Some("y/"), None),
                entry("x2", Some("x/"), None),
                entry("z1", Some("z/"), None),
            ],
            ".",
        );

        let bases: Vec<&str> = groups.iter().map(|g| g.base.as_str()).collect();
        assert_eq!(bases, vec!["x/", "y/", "z/"]);
        assert_eq!(groups[0].patterns, vec!["x1", "x2"]);
    }

    #[test]
    fn explicit_default_base_joins_implicit_one() {
        let groups = partition(
            &[entry("a", None, None), entry("b", Some("app/"), None)],
            "app/",
        );
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].patterns, vec!["a", "b"]);
    }

    #[test]
    fn watch_flag_splits_groups() {
        let groups = partition(
            &[
                entry("app/*.js", None, Some(true)),
                entry("app/*.scss", None, Some(false)),
                entry("app/*.css", None, None),
            ],
            "app/",
        );
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].patterns, vec!["app/*.js", "app/*.css"]);
        assert!(groups[0].watch);
        assert_eq!(groups[1].patterns, vec!["app/*.scss"]);
        assert!(!groups[1].watch);
    }

    #[test]
    fn read_flag_splits_groups() {
        let mut unread = AtomicEntry::new("img/*.png");
        unread.read = Some(false);
        let groups = partition(&[AtomicEntry::new("img/*.svg"), unread], "img/");
        assert_eq!(groups.len(), 2);
        assert!(!groups[1].read);
    }

    #[test]
    fn duplicate_patterns_are_kept() {
        let groups = partition(&[AtomicEntry::new("a"), AtomicEntry::new("a")], ".");
        assert_eq!(groups[0].patterns, vec!["a", "a"]);
    }
}
