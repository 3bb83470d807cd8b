//! Core domain types: raw source specs, normalized entries, groups, and
//! the frozen metadata attached to every pipeline.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ---------------------------------------------------------------------------
// SourceSpec
// ---------------------------------------------------------------------------

/// A raw, user-authored source specification.
///
/// Any JSON/TOML value converts into a `SourceSpec`; shapes that cannot be
/// normalized land in [`SourceSpec::Invalid`] and are rejected later by the
/// normalizer, so deserializing a config never fails on a bad source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "Value", into = "Value")]
pub enum SourceSpec {
    /// `null`; discarded when it appears inside a sequence.
    Absent,
    /// A single file pattern.
    Pattern(String),
    /// An ordered, possibly nested, sequence of specs.
    List(Vec<SourceSpec>),
    /// A record with a `files` field and optional attributes.
    Record(Map<String, Value>),
    /// Anything else (numbers, booleans).
    Invalid(Value),
}

impl From<Value> for SourceSpec {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Self::Absent,
            Value::String(pattern) => Self::Pattern(pattern),
            Value::Array(items) => Self::List(items.into_iter().map(Self::from).collect()),
            Value::Object(fields) => Self::Record(fields),
            other => Self::Invalid(other),
        }
    }
}

impl From<SourceSpec> for Value {
    fn from(spec: SourceSpec) -> Self {
        match spec {
            SourceSpec::Absent => Value::Null,
            SourceSpec::Pattern(pattern) => Value::String(pattern),
            SourceSpec::List(items) => Value::Array(items.into_iter().map(Value::from).collect()),
            SourceSpec::Record(fields) => Value::Object(fields),
            SourceSpec::Invalid(value) => value,
        }
    }
}

impl From<&str> for SourceSpec {
    fn from(pattern: &str) -> Self {
        Self::Pattern(pattern.to_string())
    }
}

// ---------------------------------------------------------------------------
// AtomicEntry
// ---------------------------------------------------------------------------

/// One normalized file pattern with the attributes inherited from its
/// enclosing records. Unset attributes are resolved by the partitioner.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AtomicEntry {
    pub pattern: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub watch: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base: Option<String>,
    /// Extra record fields broadcast onto this entry, in first-seen order.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub extra: Map<String, Value>,
}

impl AtomicEntry {
    /// An entry carrying only a pattern.
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            ..Self::default()
        }
    }
}

// ---------------------------------------------------------------------------
// Group
// ---------------------------------------------------------------------------

/// The `(read, base, watch)` key entries are grouped by.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GroupSignature {
    pub read: bool,
    pub base: String,
    pub watch: bool,
}

/// Entries sharing one signature, merged into a single pattern list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub patterns: Vec<String>,
    pub read: bool,
    pub watch: bool,
    pub base: String,
}

impl Group {
    pub fn signature(&self) -> GroupSignature {
        GroupSignature {
            read: self.read,
            base: self.base.clone(),
            watch: self.watch,
        }
    }
}

/// One original (pre-merge) group, as handed to watch setup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistinctGroup {
    pub globs: Vec<String>,
    pub base: String,
    pub watch: bool,
    pub read: bool,
}

impl From<&Group> for DistinctGroup {
    fn from(group: &Group) -> Self {
        Self {
            globs: group.patterns.clone(),
            base: group.base.clone(),
            watch: group.watch,
            read: group.read,
        }
    }
}

// ---------------------------------------------------------------------------
// SourceMeta
// ---------------------------------------------------------------------------

/// Metadata describing what a pipeline draws from.
///
/// The default value is the metadata of the empty pipeline.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceMeta {
    /// Every contributing pattern, value-unique, first-seen order.
    pub globs: Vec<String>,
    /// Distinct base paths, first-seen order.
    pub bases: Vec<String>,
    /// True if at least one contributing group is watchable.
    pub watch: bool,
    /// Read flag, only carried by a pipeline built from a single group.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read: Option<bool>,
    /// The original groups, needed to issue one watch per group.
    pub distinct: Vec<DistinctGroup>,
}

impl SourceMeta {
    /// Metadata of a pipeline built from exactly one group.
    pub fn from_group(group: &Group) -> Self {
        Self {
            globs: group.patterns.clone(),
            bases: vec![group.base.clone()],
            watch: group.watch,
            read: Some(group.read),
            distinct: vec![DistinctGroup::from(group)],
        }
    }

    /// Metadata of a pipeline watching one distinct group.
    pub fn from_distinct(distinct: &DistinctGroup) -> Self {
        Self {
            globs: distinct.globs.clone(),
            bases: vec![distinct.base.clone()],
            watch: distinct.watch,
            read: Some(distinct.read),
            distinct: vec![distinct.clone()],
        }
    }

    /// Union of several metadata values: globs, bases and distinct groups
    /// are deduplicated by value keeping first occurrences.
    pub fn union<'a>(metas: impl IntoIterator<Item = &'a SourceMeta>) -> Self {
        let mut merged = Self::default();
        for meta in metas {
            extend_unique(&mut merged.globs, &meta.globs);
            extend_unique(&mut merged.bases, &meta.bases);
            extend_unique(&mut merged.distinct, &meta.distinct);
            merged.watch |= meta.watch;
        }
        merged
    }

    pub fn is_empty(&self) -> bool {
        self.globs.is_empty() && self.distinct.is_empty()
    }
}

fn extend_unique<T: Clone + PartialEq>(dest: &mut Vec<T>, src: &[T]) {
    for item in src {
        if !dest.contains(item) {
            dest.push(item.clone());
        }
    }
}

// ---------------------------------------------------------------------------
// SourceFile
// ---------------------------------------------------------------------------

/// A file flowing through a pipeline, as produced by filesystem steps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    /// Full path of the file.
    pub path: PathBuf,
    /// Base directory the file was matched relative to.
    pub base: PathBuf,
    /// File contents; `None` when the source was declared with `read = false`.
    pub contents: Option<Vec<u8>>,
}

impl SourceFile {
    /// Path relative to [`SourceFile::base`], or the full path if it lies outside.
    pub fn relative(&self) -> &std::path::Path {
        self.path.strip_prefix(&self.base).unwrap_or(&self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn group(patterns: &[&str], base: &str, watch: bool) -> Group {
        Group {
            patterns: patterns.iter().map(|p| p.to_string()).collect(),
            read: true,
            watch,
            base: base.into(),
        }
    }

    #[test]
    fn spec_from_json_shapes() {
        let spec = SourceSpec::from(json!(["a", null, {"files": "b"}, 3]));
        let SourceSpec::List(items) = spec else {
            panic!("expected list");
        };
        assert_eq!(items[0], SourceSpec::Pattern("a".into()));
        assert_eq!(items[1], SourceSpec::Absent);
        assert!(matches!(items[2], SourceSpec::Record(_)));
        assert_eq!(items[3], SourceSpec::Invalid(json!(3)));
    }

    #[test]
    fn spec_deserializes_from_toml() {
        let parsed: toml::Table = toml::from_str(
            r#"
js = ["app/*.js", { files = ["tmp/*.js"], base = "tmp/" }]
"#,
        )
        .expect("parse");
        let spec: SourceSpec = parsed["js"].clone().try_into().expect("deserialize");
        let back = Value::from(spec);
        assert_eq!(back, json!(["app/*.js", {"files": ["tmp/*.js"], "base": "tmp/"}]));
    }

    #[test]
    fn meta_union_dedupes_in_first_seen_order() {
        let a = SourceMeta::from_group(&group(&["app/*.js", "app/*.css"], "app/", true));
        let b = SourceMeta::from_group(&group(&["tmp/*.js", "app/*.js"], "tmp/", false));
        let merged = SourceMeta::union([&a, &b, &a]);

        assert_eq!(merged.globs, vec!["app/*.js", "app/*.css", "tmp/*.js"]);
        assert_eq!(merged.bases, vec!["app/", "tmp/"]);
        assert_eq!(merged.distinct.len(), 2);
        assert!(merged.watch);
        assert_eq!(merged.read, None);
    }

    #[test]
    fn meta_union_of_nothing_is_empty() {
        let merged = SourceMeta::union(std::iter::empty());
        assert_eq!(merged, SourceMeta::default());
        assert!(merged.is_empty());
        assert!(!merged.watch);
    }

    #[test]
    fn source_file_relative_path() {
        let file = SourceFile {
            path: PathBuf::from("app/js/main.js"),
            base: PathBuf::from("app"),
            contents: None,
        };
        assert_eq!(file.relative(), std::path::Path::new("js/main.js"));
    }
}
