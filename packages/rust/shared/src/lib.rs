//! Shared types, error model, and configuration for recipeloader.
//!
//! This crate is the foundation depended on by all other recipeloader crates.
//! It provides:
//! - [`RecipeError`], the unified error type
//! - Domain types ([`SourceSpec`], [`AtomicEntry`], [`Group`], [`SourceMeta`], [`SourceFile`])
//! - Configuration ([`AppConfig`], [`SourcesConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, CONFIG_FILE_NAME, ComposeConfig, SourcesConfig, check_mandatory, config_dir,
    init_config, load_config, load_config_from, resolve_config_path,
};
pub use error::{RecipeError, Result};
pub use types::{
    AtomicEntry, DistinctGroup, Group, GroupSignature, SourceFile, SourceMeta, SourceSpec,
};
