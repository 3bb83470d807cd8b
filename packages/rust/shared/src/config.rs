//! Application configuration for recipeloader.
//!
//! Config lives in `recipeloader.toml`, looked up in this order: an explicit
//! `--config` path, the working directory, then `~/.recipeloader/`.
//! Built-in defaults apply when no file is found.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{RecipeError, Result};
use crate::types::SourceSpec;

/// Default configuration file name.
pub const CONFIG_FILE_NAME: &str = "recipeloader.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".recipeloader";

// ---------------------------------------------------------------------------
// Config structs (matching recipeloader.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Source definitions.
    #[serde(default)]
    pub sources: SourcesConfig,

    /// Composition tuning.
    #[serde(default)]
    pub compose: ComposeConfig,
}

/// `[sources]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourcesConfig {
    /// Base path for entries that do not declare one.
    #[serde(default = "default_base")]
    pub default_base: String,

    /// Named source specs, e.g. `js = ["app/**/*.js"]`.
    #[serde(default)]
    pub defs: BTreeMap<String, SourceSpec>,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            default_base: default_base(),
            defs: BTreeMap::new(),
        }
    }
}

fn default_base() -> String {
    ".".into()
}

/// `[compose]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComposeConfig {
    /// Items buffered per held-back queued pipeline; 0 means unbounded.
    #[serde(default = "default_queue_buffer")]
    pub queue_buffer: usize,
}

impl Default for ComposeConfig {
    fn default() -> Self {
        Self {
            queue_buffer: default_queue_buffer(),
        }
    }
}

fn default_queue_buffer() -> usize {
    1024
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the user config directory (`~/.recipeloader/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| RecipeError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Find the config file to load. An explicit path is returned as is, even
/// if it does not exist, so loading reports it.
pub fn resolve_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    resolve_in(explicit, Path::new(""), config_dir().ok().as_deref())
}

fn resolve_in(
    explicit: Option<&Path>,
    local_dir: &Path,
    user_dir: Option<&Path>,
) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }

    let local = local_dir.join(CONFIG_FILE_NAME);
    if local.exists() {
        return Some(local);
    }

    user_dir
        .map(|dir| dir.join(CONFIG_FILE_NAME))
        .filter(|path| path.exists())
}

/// Load the application config. Returns defaults if no file is found.
pub fn load_config(explicit: Option<&Path>) -> Result<AppConfig> {
    match resolve_config_path(explicit) {
        Some(path) => load_config_from(&path),
        None => {
            tracing::debug!("config file not found, using defaults");
            Ok(AppConfig::default())
        }
    }
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| RecipeError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| RecipeError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Write a starter config file into `dir`. Refuses to overwrite an existing one.
/// Returns the path to the created file.
pub fn init_config(dir: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(dir).map_err(|e| RecipeError::io(dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    if path.exists() {
        return Err(RecipeError::config(format!(
            "{} already exists",
            path.display()
        )));
    }

    let mut config = AppConfig::default();
    config.sources.defs.insert(
        "scripts".into(),
        SourceSpec::List(vec![SourceSpec::from("src/**/*.js")]),
    );
    let content = toml::to_string_pretty(&config).map_err(|e| RecipeError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| RecipeError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

// ---------------------------------------------------------------------------
// Mandatory fields
// ---------------------------------------------------------------------------

/// Check that every `field` path exists in `config`.
///
/// Paths use dots and bracketed indexes: `sources.defs.js`, `items[0].name`.
/// A `null` value counts as present.
pub fn check_mandatory(config: &Value, fields: &[&str]) -> Result<()> {
    for field in fields {
        if lookup(config, field).is_none() {
            return Err(RecipeError::MissingField {
                field: (*field).to_string(),
            });
        }
    }
    Ok(())
}

fn lookup<'a>(config: &'a Value, field: &str) -> Option<&'a Value> {
    static INDEX: OnceLock<Regex> = OnceLock::new();
    let index = INDEX.get_or_init(|| Regex::new(r"\[(\w+)\]").expect("valid index regex"));

    let dotted = index.replace_all(field, ".$1");
    dotted
        .trim_start_matches('.')
        .split('.')
        .try_fold(config, |node, part| match node {
            Value::Object(map) => map.get(part),
            Value::Array(items) => part.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("default_base"));
        assert!(toml_str.contains("queue_buffer"));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.sources.default_base, ".");
        assert_eq!(parsed.compose.queue_buffer, 1024);
    }

    #[test]
    fn config_with_defs() {
        let toml_str = r#"
[sources]
default_base = "app/"

[sources.defs]
js = "app/**/*.js"
styles = ["app/*.css", { files = ["tmp/*.css"], base = "tmp/", watch = false }]
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.sources.default_base, "app/");
        assert_eq!(config.sources.defs.len(), 2);
        assert_eq!(
            config.sources.defs["js"],
            SourceSpec::Pattern("app/**/*.js".into())
        );
        assert!(matches!(config.sources.defs["styles"], SourceSpec::List(_)));
    }

    #[test]
    fn invalid_source_shape_still_loads() {
        let config: AppConfig = toml::from_str("[sources.defs]\nbad = 42\n").expect("parse");
        assert_eq!(config.sources.defs["bad"], SourceSpec::Invalid(json!(42)));
    }

    #[test]
    fn init_then_load() {
        let dir = std::env::temp_dir().join(format!("rl-config-test-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);

        let path = init_config(&dir).expect("init");
        let config = load_config_from(&path).expect("load");
        assert!(config.sources.defs.contains_key("scripts"));
        assert!(init_config(&dir).is_err());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn lookup_prefers_local_file_over_user_dir() {
        let root = std::env::temp_dir().join(format!("rl-lookup-test-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&root);
        let local = root.join("project");
        let user = root.join("home");
        std::fs::create_dir_all(&local).expect("create local dir");
        std::fs::create_dir_all(&user).expect("create user dir");

        assert_eq!(resolve_in(None, &local, Some(&user)), None);

        std::fs::write(user.join(CONFIG_FILE_NAME), "").expect("write user config");
        assert_eq!(
            resolve_in(None, &local, Some(&user)),
            Some(user.join(CONFIG_FILE_NAME))
        );

        std::fs::write(local.join(CONFIG_FILE_NAME), "").expect("write local config");
        assert_eq!(
            resolve_in(None, &local, Some(&user)),
            Some(local.join(CONFIG_FILE_NAME))
        );

        let explicit = root.join("other.toml");
        assert_eq!(
            resolve_in(Some(&explicit), &local, Some(&user)),
            Some(explicit.clone())
        );

        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn load_missing_explicit_path_fails() {
        let err = load_config(Some(Path::new("/nonexistent/recipeloader.toml"))).unwrap_err();
        assert!(matches!(err, RecipeError::Io { .. }));
    }

    #[test]
    fn mandatory_fields() {
        let config = json!({
            "sources": { "defs": { "js": "app/*.js" } },
            "items": [{ "name": "first" }],
            "empty": null
        });

        assert!(check_mandatory(&config, &["sources.defs.js", "items[0].name", "empty"]).is_ok());

        let err = check_mandatory(&config, &["sources.defs.css"]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "mandatory config field `sources.defs.css` is missing"
        );
        assert!(check_mandatory(&config, &["items[1].name"]).is_err());
        assert!(check_mandatory(&config, &["sources.defs.js.deeper"]).is_err());
    }
}
