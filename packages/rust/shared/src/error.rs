//! Error types for recipeloader.
//!
//! Library crates use [`RecipeError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all recipeloader operations.
#[derive(Debug, thiserror::Error)]
pub enum RecipeError {
    /// A source specification has a shape the normalizer does not accept.
    #[error("invalid source: {message}")]
    InvalidSpec { message: String },

    /// Composition inputs are not tagged the way the requested operator needs.
    #[error("invalid composition: {message}")]
    InvalidComposition { message: String },

    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// A mandatory configuration field is absent.
    #[error("mandatory config field `{field}` is missing")]
    MissingField { field: String },

    /// A source definition failed to build; carries the configuration key.
    #[error("source `{key}`: {source}")]
    Source {
        key: String,
        source: Box<RecipeError>,
    },

    /// Failure attributed to a named recipe.
    #[error("recipe `{name}`: {source}")]
    Recipe {
        name: String,
        source: Box<RecipeError>,
    },

    /// Runtime failure raised by an external pipeline step.
    #[error("step error: {0}")]
    Step(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, RecipeError>;

impl RecipeError {
    /// Create an invalid-source error from any displayable message.
    pub fn invalid_spec(msg: impl Into<String>) -> Self {
        Self::InvalidSpec {
            message: msg.into(),
        }
    }

    /// Create an invalid-composition error from any displayable message.
    pub fn invalid_composition(msg: impl Into<String>) -> Self {
        Self::InvalidComposition {
            message: msg.into(),
        }
    }

    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a step error from any displayable message.
    pub fn step(msg: impl Into<String>) -> Self {
        Self::Step(msg.into())
    }

    /// Attach the configuration key a source definition was declared under.
    pub fn for_source(key: impl Into<String>, err: RecipeError) -> Self {
        Self::Source {
            key: key.into(),
            source: Box::new(err),
        }
    }

    /// Attribute an error to the recipe that raised it.
    pub fn recipe(name: impl Into<String>, err: RecipeError) -> Self {
        Self::Recipe {
            name: name.into(),
            source: Box::new(err),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// True for [`RecipeError::InvalidSpec`], also when wrapped by a
    /// source key or recipe name.
    pub fn is_invalid_spec(&self) -> bool {
        match self {
            Self::InvalidSpec { .. } => true,
            Self::Source { source, .. } | Self::Recipe { source, .. } => source.is_invalid_spec(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = RecipeError::invalid_spec("record without `files`");
        assert_eq!(err.to_string(), "invalid source: record without `files`");

        let err = RecipeError::MissingField {
            field: "sources.defs".into(),
        };
        assert!(err.to_string().contains("`sources.defs`"));
    }

    #[test]
    fn wrapped_errors_keep_context() {
        let err = RecipeError::for_source("scripts", RecipeError::invalid_spec("bad"));
        assert_eq!(err.to_string(), "source `scripts`: invalid source: bad");
        assert!(err.is_invalid_spec());

        let err = RecipeError::recipe("sass", err);
        assert!(err.to_string().starts_with("recipe `sass`"));
        assert!(err.is_invalid_spec());
        assert!(!RecipeError::step("boom").is_invalid_spec());
    }
}
