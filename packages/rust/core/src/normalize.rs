//! Spec normalizer: flattens a raw [`SourceSpec`] into atomic entries.
//!
//! Strings become one entry, sequences are flattened in order (absent and
//! empty elements dropped), and records expand their `files` while
//! broadcasting every other field onto the resulting entries. The nearest
//! enclosing record wins when the same field is set at several levels.

use serde_json::{Map, Value};
use tracing::trace;

use recipeloader_shared::{AtomicEntry, RecipeError, Result, SourceSpec};

/// Normalize `spec` into its ordered atomic entries.
///
/// Fails with [`RecipeError::InvalidSpec`] on any unrecognized shape; no
/// partial result is returned.
pub fn normalize(spec: &SourceSpec) -> Result<Vec<AtomicEntry>> {
    let mut entries = Vec::new();
    match spec {
        SourceSpec::Absent => return Err(RecipeError::invalid_spec("source is absent")),
        other => expand(other, &mut entries)?,
    }
    trace!(entries = entries.len(), "source normalized");
    Ok(entries)
}

fn expand(spec: &SourceSpec, out: &mut Vec<AtomicEntry>) -> Result<()> {
    match spec {
        SourceSpec::Pattern(pattern) => {
            out.push(AtomicEntry::new(pattern.as_str()));
            Ok(())
        }
        SourceSpec::List(items) => {
            for item in items {
                if is_blank(item) {
                    continue;
                }
                expand(item, out)?;
            }
            Ok(())
        }
        SourceSpec::Record(fields) => expand_record(fields, out),
        SourceSpec::Absent => Ok(()),
        SourceSpec::Invalid(value) => Err(RecipeError::invalid_spec(format!(
            "unsupported value `{value}`"
        ))),
    }
}

fn is_blank(spec: &SourceSpec) -> bool {
    match spec {
        SourceSpec::Absent => true,
        SourceSpec::Pattern(pattern) => pattern.is_empty(),
        _ => false,
    }
}

fn expand_record(fields: &Map<String, Value>, out: &mut Vec<AtomicEntry>) -> Result<()> {
    let files = fields
        .get("files")
        .ok_or_else(|| RecipeError::invalid_spec("record without `files`"))?;

    match files {
        Value::String(pattern) => {
            let mut entry = AtomicEntry::new(pattern.as_str());
            broadcast(&mut entry, fields)?;
            out.push(entry);
            Ok(())
        }
        Value::Array(_) => {
            let start = out.len();
            expand(&SourceSpec::from(files.clone()), out)?;
            for entry in &mut out[start..] {
                broadcast(entry, fields)?;
            }
            Ok(())
        }
        other => Err(RecipeError::invalid_spec(format!(
            "`files` must be a string or a list, got `{other}`"
        ))),
    }
}

/// Copy the record's fields onto `entry`, keeping anything the entry
/// already inherited from a deeper record.
fn broadcast(entry: &mut AtomicEntry, fields: &Map<String, Value>) -> Result<()> {
    for (name, value) in fields {
        if name == "files" || value.is_null() {
            continue;
        }
        match name.as_str() {
            "base" => {
                let base = value.as_str().ok_or_else(|| {
                    RecipeError::invalid_spec(format!("`base` must be a string, got `{value}`"))
                })?;
                entry.base.get_or_insert_with(|| base.to_string());
            }
            "read" => {
                let read = flag(name, value)?;
                entry.read.get_or_insert(read);
            }
            "watch" => {
                let watch = flag(name, value)?;
                entry.watch.get_or_insert(watch);
            }
            _ => {
                entry
                    .extra
                    .entry(name.clone())
                    .or_insert_with(|| value.clone());
            }
        }
    }
    Ok(())
}

fn flag(name: &str, value: &Value) -> Result<bool> {
    value.as_bool().ok_or_else(|| {
        RecipeError::invalid_spec(format!("`{name}` must be a boolean, got `{value}`"))
    })
}
